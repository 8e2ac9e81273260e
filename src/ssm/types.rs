use serde::{Deserialize, Serialize};

use crate::dna::{reverse_complement, validate_dna};
use crate::errs::{MakerError, MakerResult};
use crate::mutation::{parse_amino_mutation, AminoMutation};
use crate::thermo::TemperatureConfig;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinOptMax {
    pub min: f64,
    pub opt: f64,
    pub max: f64,
}

impl MinOptMax {
    pub fn around(opt: f64, half_range: f64) -> Self {
        Self { min: opt - half_range, opt, max: opt + half_range }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// A plasmid with optional positional hints for the gene of interest.
/// Flanking sequences are cut out between the flanking primers and the
/// gene, wrapping around the origin when needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plasmid {
    pub plasmid_sequence: String,
    #[serde(default)]
    pub gene_start_in_plasmid: Option<usize>,
    #[serde(default)]
    pub gene_end_in_plasmid: Option<usize>,
}

impl Plasmid {
    fn locate_unique(&self, needle: &str, name: &str) -> MakerResult<usize> {
        let occurrences = self
            .plasmid_sequence
            .match_indices(needle)
            .map(|(i, _)| i)
            .collect::<Vec<usize>>();
        match occurrences.as_slice() {
            [] => Err(MakerError::SequenceNotFound(name.to_string())),
            [position] => Ok(*position),
            _ => Err(MakerError::AmbiguousSequence(name.to_string())),
        }
    }

    pub fn five_end(
        &self,
        gene_of_interest: &str,
        forward_primer: &str,
    ) -> MakerResult<String> {
        let forward_position =
            self.locate_unique(forward_primer, "Forward primer")?;
        let gene_start = match self.gene_start_in_plasmid {
            Some(start) => start,
            None => {
                self.locate_unique(gene_of_interest, "Gene of interest")?
            }
        };
        if forward_position <= gene_start {
            Ok(self.plasmid_sequence[forward_position..gene_start]
                .to_string())
        } else {
            // the forward primer sits upstream across the origin
            Ok(format!(
                "{}{}",
                &self.plasmid_sequence[forward_position..],
                &self.plasmid_sequence[..gene_start]
            ))
        }
    }

    pub fn three_end(
        &self,
        gene_of_interest: &str,
        reverse_primer: &str,
    ) -> MakerResult<String> {
        let anneal_site = reverse_complement(reverse_primer);
        let reverse_position =
            self.locate_unique(&anneal_site, "Reverse primer")?;
        let gene_end = match self.gene_end_in_plasmid {
            Some(end) => end,
            None => {
                self.locate_unique(gene_of_interest, "Gene of interest")?
                    + gene_of_interest.len()
            }
        };
        let reverse_primer_end = reverse_position + reverse_primer.len();
        if reverse_primer_end > gene_end {
            Ok(self.plasmid_sequence[gene_end..reverse_primer_end]
                .to_string())
        } else {
            Ok(format!(
                "{}{}",
                &self.plasmid_sequence[gene_end..],
                &self.plasmid_sequence[..reverse_primer_end]
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsmSequences {
    pub forward_primer: String,
    pub reverse_primer: String,
    pub gene_of_interest: String,
    #[serde(default)]
    pub five_end_flanking_sequence: Option<String>,
    #[serde(default)]
    pub three_end_flanking_sequence: Option<String>,
    #[serde(default)]
    pub plasmid: Option<Plasmid>,
}

impl SsmSequences {
    /// Assemble the full working sequence and the [start, end) range of
    /// the gene of interest within it.
    pub fn full_sequence_with_goi_range(
        &self,
    ) -> MakerResult<(String, (usize, usize))> {
        let (five_end, three_end) = match &self.plasmid {
            Some(plasmid) => {
                if self.five_end_flanking_sequence.is_some()
                    || self.three_end_flanking_sequence.is_some()
                {
                    return Err(MakerError::AmbiguousSequence(
                        "flanking sequences with plasmid".to_string(),
                    ));
                }
                (
                    plasmid.five_end(
                        &self.gene_of_interest,
                        &self.forward_primer,
                    )?,
                    plasmid.three_end(
                        &self.gene_of_interest,
                        &self.reverse_primer,
                    )?,
                )
            }
            None => (
                self.five_end_flanking_sequence.clone().ok_or(
                    MakerError::MissingSequence(
                        "five_end_flanking_sequence",
                    ),
                )?,
                self.three_end_flanking_sequence.clone().ok_or(
                    MakerError::MissingSequence(
                        "three_end_flanking_sequence",
                    ),
                )?,
            ),
        };

        let full_sequence =
            format!("{}{}{}", five_end, self.gene_of_interest, three_end);
        if full_sequence.is_empty() {
            return Err(MakerError::EmptySequence);
        }
        validate_dna(&full_sequence)?;
        let offset = five_end.len();
        Ok((full_sequence, (offset, offset + self.gene_of_interest.len())))
    }
}

fn default_min_primer_size() -> usize {
    33
}
fn default_opt_primer_size() -> usize {
    33
}
fn default_max_primer_size() -> usize {
    60
}
fn default_min_gc() -> f64 {
    40.0
}
fn default_opt_gc() -> f64 {
    50.0
}
fn default_max_gc() -> f64 {
    60.0
}
fn default_min_three_end_size() -> usize {
    15
}
fn default_max_three_end_size() -> usize {
    42
}
fn default_min_overlap_size() -> usize {
    33
}
fn default_opt_overlap_size() -> usize {
    33
}
fn default_max_overlap_size() -> usize {
    60
}
fn default_min_three_end_temperature() -> f64 {
    57.0
}
fn default_max_three_end_temperature() -> f64 {
    85.0
}
fn default_min_overlap_temperature() -> f64 {
    57.0
}
fn default_max_overlap_temperature() -> f64 {
    85.0
}
fn default_gc_clamp() -> usize {
    1
}
fn default_min_five_end_size() -> usize {
    3
}
fn default_max_five_end_size() -> usize {
    60
}
fn default_temp_range() -> f64 {
    5.0
}
fn default_three_end_temp_weight() -> f64 {
    16.0
}
fn default_three_end_size_weight() -> f64 {
    8.0
}
fn default_overlap_temp_weight() -> f64 {
    1.0
}
fn default_gc_content_weight() -> f64 {
    0.0
}
fn default_hairpin_temperature_weight() -> f64 {
    32.0
}
fn default_primer_dimer_temperature_weight() -> f64 {
    32.0
}
fn default_three_end_temp_range_step() -> f64 {
    2.0
}
fn default_overlap_temp_range_step() -> f64 {
    3.0
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsmConfig {
    pub min_primer_size: usize,
    pub opt_primer_size: usize,
    pub max_primer_size: usize,

    pub min_gc_content: f64,
    pub opt_gc_content: f64,
    pub max_gc_content: f64,

    pub min_three_end_size: usize,
    pub opt_three_end_size: usize,
    pub max_three_end_size: usize,

    pub min_overlap_size: usize,
    pub opt_overlap_size: usize,
    pub max_overlap_size: usize,

    // Only used when `exclude_flanking_primers` is set.
    pub min_three_end_temperature: f64,
    pub opt_three_end_temperature: f64,
    pub max_three_end_temperature: f64,

    pub min_overlap_temperature: f64,
    pub opt_overlap_temperature: f64,
    pub max_overlap_temperature: f64,

    pub gc_clamp: usize,

    pub min_five_end_size: usize,
    pub max_five_end_size: usize,

    pub three_end_temp_range: f64,
    pub overlap_temp_range: f64,

    // Weights used for non-optimality calculation.
    pub three_end_temp_weight: f64,
    pub three_end_size_weight: f64,
    pub overlap_temp_weight: f64,
    pub gc_content_weight: f64,
    pub hairpin_temperature_weight: f64,
    pub primer_dimer_temperature_weight: f64,

    pub compute_hairpin_homodimer: bool,

    pub three_end_temp_range_step: f64,
    pub overlap_temp_range_step: f64,

    // When false, all primers share one 3' temperature grid.
    pub separate_forward_reverse_temperatures: bool,

    // When true, the exhaustive candidate-enumeration search is replaced
    // by greedy overlap selection plus primer growth.
    pub use_fast_approximation_algorithm: bool,

    // Derive the 3' Tm grid from the explicit input range instead of the
    // flanking primer temperatures.
    pub exclude_flanking_primers: bool,

    pub temperature_config: TemperatureConfig,
}

impl Default for SsmConfig {
    fn default() -> Self {
        Self {
            min_primer_size: default_min_primer_size(),
            opt_primer_size: default_opt_primer_size(),
            max_primer_size: default_max_primer_size(),
            min_gc_content: default_min_gc(),
            opt_gc_content: default_opt_gc(),
            max_gc_content: default_max_gc(),
            min_three_end_size: default_min_three_end_size(),
            opt_three_end_size: default_min_three_end_size(),
            max_three_end_size: default_max_three_end_size(),
            min_overlap_size: default_min_overlap_size(),
            opt_overlap_size: default_opt_overlap_size(),
            max_overlap_size: default_max_overlap_size(),
            min_three_end_temperature: default_min_three_end_temperature(),
            opt_three_end_temperature: 60.0,
            max_three_end_temperature: default_max_three_end_temperature(),
            min_overlap_temperature: default_min_overlap_temperature(),
            opt_overlap_temperature: 60.0,
            max_overlap_temperature: default_max_overlap_temperature(),
            gc_clamp: default_gc_clamp(),
            min_five_end_size: default_min_five_end_size(),
            max_five_end_size: default_max_five_end_size(),
            three_end_temp_range: default_temp_range(),
            overlap_temp_range: default_temp_range(),
            three_end_temp_weight: default_three_end_temp_weight(),
            three_end_size_weight: default_three_end_size_weight(),
            overlap_temp_weight: default_overlap_temp_weight(),
            gc_content_weight: default_gc_content_weight(),
            hairpin_temperature_weight:
                default_hairpin_temperature_weight(),
            primer_dimer_temperature_weight:
                default_primer_dimer_temperature_weight(),
            compute_hairpin_homodimer: false,
            three_end_temp_range_step: default_three_end_temp_range_step(),
            overlap_temp_range_step: default_overlap_temp_range_step(),
            separate_forward_reverse_temperatures: default_true(),
            use_fast_approximation_algorithm: default_true(),
            exclude_flanking_primers: false,
            temperature_config: TemperatureConfig::default(),
        }
    }
}

fn default_degenerate_codon() -> String {
    "NNS".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsmInput {
    pub sequences: SsmSequences,
    #[serde(default)]
    pub config: SsmConfig,
    pub mutations: Vec<String>,
    #[serde(default = "default_degenerate_codon")]
    pub degenerate_codon: String,
}

impl SsmInput {
    pub fn parse_mutations(
        &self,
        goi_offset: usize,
    ) -> MakerResult<Vec<AminoMutation>> {
        self.mutations
            .iter()
            .map(|m| parse_amino_mutation(m, goi_offset))
            .collect()
    }
}

/// One primer of the fast-approximation search: a window with the size
/// and melting temperature of its 3' end. For overlaps the "3' end" slot
/// carries the overlap Tm itself.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SsmPrimerSpec {
    pub offset: usize,
    pub length: usize,
    pub three_end_size: usize,
    pub three_end_temp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsmPrimerOutput {
    pub direction: String,
    pub sequence: String,
    pub normal_order_sequence: String,
    pub normal_order_start: isize,
    pub length: usize,
    pub three_end_temperature: f64,
    pub gc_content: f64,
    pub parameters_in_range: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapOutput {
    pub length: usize,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsmMutationOutput {
    pub mutation: String,
    pub non_optimality: f64,
    pub parameters_in_range: bool,
    pub result_found: bool,
    pub forward_primer: SsmPrimerOutput,
    pub reverse_primer: SsmPrimerOutput,
    pub overlap: OverlapOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsmOutput {
    pub input_data: SsmInput,
    pub results: Vec<SsmMutationOutput>,
    pub full_sequence: String,
    pub goi_offset: usize,
    pub new_sequence_start: isize,

    pub forward_flanking_primer_temperature: f64,
    pub reverse_flanking_primer_temperature: f64,

    pub forward_temperature: MinOptMax,
    pub reverse_temperature: MinOptMax,
    pub overlap_temperature: MinOptMax,
}

#[cfg(test)]
mod ssm_types_tests {
    use super::*;

    fn plasmid(sequence: &str) -> Plasmid {
        Plasmid {
            plasmid_sequence: sequence.to_string(),
            gene_start_in_plasmid: None,
            gene_end_in_plasmid: None,
        }
    }

    #[test]
    fn test_plasmid_five_end() {
        // forward primer upstream of the gene of interest
        let p = plasmid("TTTTAAACCCGGGTTTT");
        let five = p.five_end("CCCGGG", "AAA").unwrap();
        assert_eq!(five, "AAA");
    }

    #[test]
    fn test_plasmid_missing_and_ambiguous() {
        let p = plasmid("TTTTAAACCCGGGTTTT");
        assert_eq!(
            p.five_end("CCCGGG", "GGA").unwrap_err(),
            MakerError::SequenceNotFound("Forward primer".to_string())
        );
        assert_eq!(
            p.five_end("TTTT", "AAA").unwrap_err(),
            MakerError::AmbiguousSequence("Gene of interest".to_string())
        );
    }

    #[test]
    fn test_full_sequence_from_flanks() {
        let sequences = SsmSequences {
            forward_primer: "AAA".to_string(),
            reverse_primer: "TTT".to_string(),
            gene_of_interest: "CCC".to_string(),
            five_end_flanking_sequence: Some("AAAA".to_string()),
            three_end_flanking_sequence: Some("GGGG".to_string()),
            plasmid: None,
        };
        let (full, range) =
            sequences.full_sequence_with_goi_range().unwrap();
        assert_eq!(full, "AAAACCCGGGG");
        assert_eq!(range, (4, 7));
    }

    #[test]
    fn test_missing_flank_is_error() {
        let sequences = SsmSequences {
            forward_primer: "AAA".to_string(),
            reverse_primer: "TTT".to_string(),
            gene_of_interest: "CCC".to_string(),
            five_end_flanking_sequence: None,
            three_end_flanking_sequence: Some("GGGG".to_string()),
            plasmid: None,
        };
        assert!(matches!(
            sequences.full_sequence_with_goi_range().unwrap_err(),
            MakerError::MissingSequence(_)
        ));
    }
}
