//! PCR-based accurate synthesis: split a gene into an even number of
//! overlapping fragments and emit per-fragment oligo mixtures realising
//! the requested codon-substitution distribution.

pub mod backtrack;
pub mod fragment;
pub mod oligos;

use std::time::Duration;

use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::codon::DegenerateCodon;
use crate::codon_usage::CodonUsage;
use crate::dna::{gc_percent, reverse_complement, validate_dna};
use crate::errs::{MakerError, MakerResult};
use crate::pas::backtrack::PasOptimizer;
use crate::pas::fragment::{
    compute_tm_distances, create_proto_fragments, evaluate_solution,
    PasFragment,
};
use crate::pas::oligos::OligoGenerator;
use crate::primer::MutagenesisDna;
use crate::revtrans::Translator;
use crate::thermo::{
    StructureCalculator, TemperatureCalculator, TemperatureConfig,
};
use crate::util::{arange, round_decimals};

// Wall-clock budget for the backtracking search at one threshold.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
// Oligo-mixture draws per fragment before giving up on motif avoidance.
const OLIGO_DRAWS: usize = 250;

fn default_min_oligo_size() -> usize {
    40
}
fn default_max_oligo_size() -> usize {
    90
}
fn default_opt_oligo_size() -> usize {
    56
}
fn default_min_overlap_tm() -> f64 {
    50.0
}
fn default_max_overlap_tm() -> f64 {
    65.0
}
fn default_opt_overlap_tm() -> f64 {
    56.0
}
fn default_min_overlap_length() -> usize {
    15
}
fn default_max_overlap_length() -> usize {
    25
}
fn default_opt_overlap_length() -> usize {
    21
}
fn default_gc_min() -> f64 {
    40.0
}
fn default_gc_max() -> f64 {
    60.0
}
fn default_organism() -> String {
    "e-coli".to_string()
}
fn default_usage_threshold() -> f64 {
    0.1
}
fn default_temp_range_size() -> f64 {
    5.0
}
fn default_unit_weight() -> f64 {
    1.0
}
fn default_hairpin_homodimer_weight() -> f64 {
    2.0
}
fn default_safe_temp_difference() -> f64 {
    10.0
}
fn default_temp_threshold_step() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasConfig {
    pub min_oligo_size: usize,
    pub max_oligo_size: usize,
    pub opt_oligo_size: usize,

    pub min_overlap_tm: f64,
    pub max_overlap_tm: f64,
    pub opt_overlap_tm: f64,

    pub min_overlap_length: usize,
    pub max_overlap_length: usize,
    pub opt_overlap_length: usize,

    pub min_gc_content: f64,
    pub max_gc_content: f64,

    pub use_degeneracy_codon: bool,

    pub organism: String,
    pub avoided_motifs: Vec<String>,
    pub codon_usage_frequency_threshold: f64,

    // The allowed range above the threshold for overlap Tms, in deg C.
    pub temp_range_size: f64,

    pub temperature_config: TemperatureConfig,

    // Weights used for non-optimality calculation.
    pub temp_weight: f64,
    pub gc_content_weight: f64,
    pub length_weight: f64,
    pub hairpin_homodimer_weight: f64,

    // "Safe" distance between a self-binding structure's Tm and the
    // reaction temperature.
    pub safe_temp_difference: f64,

    pub temp_threshold_step: f64,
}

impl Default for PasConfig {
    fn default() -> Self {
        Self {
            min_oligo_size: default_min_oligo_size(),
            max_oligo_size: default_max_oligo_size(),
            opt_oligo_size: default_opt_oligo_size(),
            min_overlap_tm: default_min_overlap_tm(),
            max_overlap_tm: default_max_overlap_tm(),
            opt_overlap_tm: default_opt_overlap_tm(),
            min_overlap_length: default_min_overlap_length(),
            max_overlap_length: default_max_overlap_length(),
            opt_overlap_length: default_opt_overlap_length(),
            min_gc_content: default_gc_min(),
            max_gc_content: default_gc_max(),
            use_degeneracy_codon: false,
            organism: default_organism(),
            avoided_motifs: Vec::new(),
            codon_usage_frequency_threshold: default_usage_threshold(),
            temp_range_size: default_temp_range_size(),
            temperature_config:
                TemperatureConfig::default_gc_quickchange(),
            temp_weight: default_unit_weight(),
            gc_content_weight: default_unit_weight(),
            length_weight: default_unit_weight(),
            hairpin_homodimer_weight:
                default_hairpin_homodimer_weight(),
            safe_temp_difference: default_safe_temp_difference(),
            temp_threshold_step: default_temp_threshold_step(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasSequences {
    pub gene_of_interest: String,
    #[serde(default)]
    pub five_end_flanking_sequence: String,
    #[serde(default)]
    pub three_end_flanking_sequence: String,
}

impl PasSequences {
    pub fn full_sequence_with_offset(&self) -> (String, usize) {
        let full = format!(
            "{}{}{}",
            self.five_end_flanking_sequence,
            self.gene_of_interest,
            self.three_end_flanking_sequence
        );
        (full, self.five_end_flanking_sequence.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasMutation {
    pub mutation: String,
    pub frequency: f64,
}

/// All mutations requested at one 1-based amino position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasMutationSite {
    pub position: usize,
    pub mutations: Vec<PasMutation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasMutationInput {
    pub mutants: Vec<String>,
    pub position: usize,
    pub frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasInput {
    pub sequences: PasSequences,
    pub is_dna_sequence: bool,
    #[serde(default)]
    pub config: PasConfig,
    #[serde(default)]
    pub mutations: Vec<PasMutationInput>,
    pub is_mutations_as_codons: bool,
}

/// Group the user's mutation list by position; comma-joined mutants are
/// expanded with the frequency shared between them. Positions are
/// one-based amino indices, so zero is an input error.
pub fn extract_mutations(
    input: &PasInput,
) -> MakerResult<Vec<PasMutationSite>> {
    let mut by_position: IndexMap<usize, PasMutationSite> =
        IndexMap::new();
    for entry in &input.mutations {
        if entry.position < 1 {
            return Err(MakerError::NonPositivePosition);
        }
        if by_position.contains_key(&entry.position) {
            continue;
        }
        let atoms = entry
            .mutants
            .iter()
            .flat_map(|m| m.split(','))
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .collect::<Vec<&str>>();
        let share = if atoms.is_empty() {
            entry.frequency
        } else {
            entry.frequency / atoms.len() as f64
        };
        by_position.insert(
            entry.position,
            PasMutationSite {
                position: entry.position,
                mutations: atoms
                    .into_iter()
                    .map(|m| PasMutation {
                        mutation: m.to_string(),
                        frequency: share,
                    })
                    .collect(),
            },
        );
    }
    Ok(by_position
        .into_values()
        .sorted_by_key(|site| site.position)
        .collect())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasMutationFormatted {
    pub position: usize,
    pub mutated_amino: String,
    pub wild_type_amino: String,
    pub wild_type_codon: String,
    pub mutated_codon: String,
    pub frequency: f64,
    pub wild_type: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasOligoOutput {
    pub sequence: String,
    pub mix_ratio: f64,
    pub mutations: Vec<usize>,
    pub reds: Vec<usize>,
    pub blues: Vec<usize>,
}

impl PasOligoOutput {
    /// Flip the oligo for assembly orientation; codon highlight offsets
    /// move from codon starts to codon starts on the opposite strand.
    fn make_reverse_complement(&mut self) {
        self.sequence = reverse_complement(&self.sequence);
        let length = self.sequence.len();
        let reindex = |offsets: &[usize]| {
            offsets
                .iter()
                .map(|i| length.saturating_sub(i + 3))
                .sorted()
                .collect::<Vec<usize>>()
        };
        self.reds = reindex(&self.reds);
        self.blues = reindex(&self.blues);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasResult {
    pub fragment: String,
    pub start: usize,
    pub end: usize,
    pub length: usize,
    pub overlap: Option<String>,
    #[serde(rename = "overlap_Tm")]
    pub overlap_tm: Option<f64>,
    #[serde(rename = "overlap_GC")]
    pub overlap_gc: Option<f64>,
    pub overlap_length: Option<usize>,
    pub mutations: Vec<PasMutationFormatted>,
    pub oligos: Vec<PasOligoOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasOutput {
    pub input_data: PasInput,
    pub results: Vec<PasResult>,
    #[serde(default)]
    pub message: Option<String>,
}

struct ChosenSolution {
    fragments: Vec<PasFragment>,
    tm: f64,
    score: f64,
}

pub struct PasSolver {
    config: PasConfig,
    calculator: TemperatureCalculator,
    structures: StructureCalculator,
    is_dna_sequence: bool,
    is_mutations_as_codons: bool,
}

impl PasSolver {
    pub fn new(
        config: PasConfig,
        is_dna_sequence: bool,
        is_mutations_as_codons: bool,
    ) -> Self {
        let calculator = config.temperature_config.create_calculator();
        let structures = StructureCalculator::from_temperature_config(
            &config.temperature_config,
        );
        Self {
            config,
            calculator,
            structures,
            is_dna_sequence,
            is_mutations_as_codons,
        }
    }

    /// Sweep overlap-Tm thresholds, run the backtracking search for each
    /// feasible one and keep the best-scoring split.
    fn find_best_fragments(
        &self,
        gene: &MutagenesisDna,
    ) -> MakerResult<ChosenSolution> {
        let tm_distances =
            compute_tm_distances(gene, &self.calculator);
        let eps = 1e-6;

        let mut any_proto_found = false;
        let mut best: Option<ChosenSolution> = None;

        for t_min in arange(
            self.config.min_overlap_tm,
            self.config.max_overlap_tm + eps,
            self.config.temp_threshold_step,
        ) {
            let Some(protos) = create_proto_fragments(
                t_min,
                gene,
                &tm_distances,
                &self.config,
                &self.calculator,
            ) else {
                debug!("no solvable proto-fragments at {t_min}");
                continue;
            };
            any_proto_found = true;

            let mut optimizer = PasOptimizer::new(
                protos,
                gene,
                &self.config,
                t_min,
                &self.calculator,
                &self.structures,
                SEARCH_TIMEOUT,
            );
            optimizer.optimize();
            if optimizer.timed_out {
                warn!(
                    "fragment optimisation timed out after {:?} at \
                     threshold {t_min}",
                    SEARCH_TIMEOUT
                );
            }
            let ranges = optimizer.self_binding_ranges().to_vec();
            if let Some((fragments, _)) =
                optimizer.into_optimal_solution()
            {
                let score = evaluate_solution(
                    &fragments,
                    gene,
                    &self.config,
                    &ranges,
                    t_min,
                    &self.calculator,
                );
                info!(
                    "threshold {t_min}: solution with {} fragments, \
                     score {score:.2}",
                    fragments.len()
                );
                let better = best
                    .as_ref()
                    .map(|b| score < b.score)
                    .unwrap_or(true);
                if better {
                    best = Some(ChosenSolution {
                        fragments,
                        tm: t_min,
                        score,
                    });
                }
            }
        }

        if !any_proto_found {
            return Err(MakerError::PasNoSolution(
                "the mutations cannot be separated into different \
                 fragments with the specified min overlap temperature \
                 and distance between mutations; try increasing max \
                 oligo size or decreasing min overlap length and \
                 temperature"
                    .to_string(),
            ));
        }
        best.ok_or_else(|| {
            MakerError::PasNoSolution(
                "no solution fits the parameters; try expanding the \
                 flanking sequences, especially the three end, or \
                 relaxing the constraints (increase max oligo size or \
                 decrease min overlap length and temperature)"
                    .to_string(),
            )
        })
    }

    /// Solve the PAS problem for the given sequences and mutations.
    pub fn find_solution(
        &self,
        sequences: &PasSequences,
        mutations: &[PasMutationSite],
        rng: &mut StdRng,
    ) -> MakerResult<Vec<PasResult>> {
        let mut sequences = sequences.clone();
        if !self.is_dna_sequence {
            let translator = Translator::new(
                self.config.codon_usage_frequency_threshold,
                (self.config.min_gc_content, self.config.max_gc_content),
                &self.config.avoided_motifs,
                0.05,
                600,
                &self.config.organism,
            )?;
            sequences.gene_of_interest = translator
                .translate(&sequences.gene_of_interest, rng)?;
        }

        let (full_sequence, goi_offset) =
            sequences.full_sequence_with_offset();
        if full_sequence.is_empty() {
            return Err(MakerError::EmptySequence);
        }
        validate_dna(&full_sequence)?;

        if mutations.iter().any(|site| site.position < 1) {
            return Err(MakerError::NonPositivePosition);
        }
        let offsets = mutations
            .iter()
            .map(|site| goi_offset + (site.position - 1) * 3)
            .collect::<Vec<usize>>();
        if let Some(site) = offsets.iter().find(|o| **o + 3 > full_sequence.len())
        {
            return Err(MakerError::PasNoSolution(format!(
                "mutation at offset {site} lies outside the gene"
            )));
        }
        let gene = MutagenesisDna::new(full_sequence, offsets);

        let chosen = self.find_best_fragments(&gene)?;
        info!(
            "best solution: Tm {}, score {:.2}, {} fragments",
            chosen.tm,
            chosen.score,
            chosen.fragments.len()
        );

        self.assemble_results(
            &gene,
            &sequences,
            mutations,
            &chosen,
            rng,
        )
    }

    fn assemble_results(
        &self,
        gene: &MutagenesisDna,
        sequences: &PasSequences,
        mutations: &[PasMutationSite],
        chosen: &ChosenSolution,
        rng: &mut StdRng,
    ) -> MakerResult<Vec<PasResult>> {
        let usage = CodonUsage::for_organism(&self.config.organism)?;
        let generator = OligoGenerator::new(
            &self.config,
            self.is_mutations_as_codons,
        )?;
        let goi_offset = sequences.five_end_flanking_sequence.len();

        let mut results = Vec::with_capacity(chosen.fragments.len());
        for (index, fragment) in chosen.fragments.iter().enumerate() {
            let fragment_sequence =
                fragment.sequence(&gene.sequence).to_string();
            let oligos = generator.generate(
                &fragment_sequence,
                mutations,
                fragment,
                goi_offset,
                OLIGO_DRAWS,
                rng,
            )?;

            let sites_on_fragment = mutations
                .iter()
                .filter(|site| {
                    let codon_start =
                        goi_offset + (site.position - 1) * 3;
                    codon_start >= fragment.start
                        && codon_start + 2 <= fragment.end()
                })
                .collect::<Vec<&PasMutationSite>>();

            let formatted = self.format_mutations(
                usage,
                &sites_on_fragment,
                &fragment_sequence,
                fragment.start,
                goi_offset,
                &oligos,
            );
            let mut oligo_outputs = combine_oligos(
                &oligos,
                &formatted,
                &sites_on_fragment,
                goi_offset,
                fragment,
            );

            let next = chosen.fragments.get(index + 1);
            let (overlap, overlap_tm, overlap_gc, overlap_length) =
                match next {
                    Some(next) => {
                        let overlap = fragment
                            .overlap_with(next, &gene.sequence)
                            .to_string();
                        let tm = self.calculator.duplex_tm(&overlap);
                        let gc =
                            round_decimals(gc_percent(&overlap), 2);
                        let length = overlap.len();
                        (Some(overlap), Some(tm), Some(gc), Some(length))
                    }
                    None => (None, None, None, None),
                };

            // every second fragment is flipped for assembly orientation
            let mut display_sequence = fragment_sequence.clone();
            if index % 2 == 1 {
                for oligo in oligo_outputs.iter_mut() {
                    oligo.make_reverse_complement();
                }
                display_sequence =
                    reverse_complement(&display_sequence);
            }

            results.push(PasResult {
                fragment: display_sequence,
                start: fragment.start,
                end: fragment.end(),
                length: fragment.length,
                overlap,
                overlap_tm,
                overlap_gc,
                overlap_length,
                mutations: formatted,
                oligos: oligo_outputs,
            });
        }
        Ok(results)
    }

    /// Describe each requested mutation on a fragment, plus synthetic
    /// wild-type rows completing the per-site frequency budget.
    fn format_mutations(
        &self,
        usage: &'static CodonUsage,
        sites_on_fragment: &[&PasMutationSite],
        fragment_sequence: &str,
        fragment_start: usize,
        goi_offset: usize,
        oligos: &[oligos::PasOligo],
    ) -> Vec<PasMutationFormatted> {
        let codon_at = |position: usize, sequence: &str| -> String {
            let relative =
                3 * (position - 1) + goi_offset - fragment_start;
            sequence[relative..relative + 3].to_string()
        };
        let decode = |codon: &str| -> String {
            DegenerateCodon::parse_str(codon)
                .map(|c| c.to_aminos(usage))
                .ok()
                .and_then(|aminos| aminos.first().copied())
                .map(|a| a.to_string())
                .unwrap_or_else(|| "*".to_string())
        };

        let mut formatted = Vec::new();
        for site in sites_on_fragment {
            let wild_type_codon =
                codon_at(site.position, fragment_sequence);
            let wild_type_amino = decode(&wild_type_codon);

            for mutation in &site.mutations {
                let mutated_amino = if self.is_mutations_as_codons {
                    decode(&mutation.mutation)
                } else {
                    mutation.mutation.clone()
                };
                // find the codon realising this amino in the oligo set
                let mutated_codon = oligos
                    .iter()
                    .map(|oligo| {
                        codon_at(site.position, &oligo.sequence)
                    })
                    .find(|codon| {
                        DegenerateCodon::parse_str(codon)
                            .map(|c| {
                                c.to_aminos(usage).iter().any(|a| {
                                    mutated_amino
                                        .contains(*a)
                                })
                            })
                            .unwrap_or(false)
                    })
                    .unwrap_or_else(|| wild_type_codon.clone());

                formatted.push(PasMutationFormatted {
                    position: site.position,
                    mutated_amino: mutated_amino.clone(),
                    wild_type_amino: wild_type_amino.clone(),
                    wild_type_codon: wild_type_codon.clone(),
                    mutated_codon,
                    frequency: mutation.frequency,
                    wild_type: false,
                });
            }

            let total: f64 =
                site.mutations.iter().map(|m| m.frequency).sum();
            if total < 1.0 {
                formatted.push(PasMutationFormatted {
                    position: site.position,
                    mutated_amino: wild_type_amino.clone(),
                    wild_type_amino,
                    wild_type_codon: wild_type_codon.clone(),
                    mutated_codon: wild_type_codon,
                    frequency: 1.0 - total,
                    wild_type: true,
                });
            }
        }
        formatted.sort_by_key(|m| m.position);
        formatted
    }
}

/// Attach mutation indices and highlight offsets to each oligo.
fn combine_oligos(
    oligos: &[oligos::PasOligo],
    formatted: &[PasMutationFormatted],
    sites_on_fragment: &[&PasMutationSite],
    goi_offset: usize,
    fragment: &PasFragment,
) -> Vec<PasOligoOutput> {
    oligos
        .iter()
        .map(|oligo| {
            let mut mutations = Vec::new();
            let mut reds = Vec::new();
            let mut blues = Vec::new();
            for site in sites_on_fragment {
                let relative = 3 * (site.position - 1) + goi_offset
                    - fragment.start;
                let codon = &oligo.sequence[relative..relative + 3];
                for (index, mutation) in formatted.iter().enumerate() {
                    if site.position == mutation.position
                        && codon == mutation.mutated_codon
                    {
                        mutations.push(index);
                        if mutation.wild_type {
                            if !blues.contains(&relative) {
                                blues.push(relative);
                            }
                        } else if !reds.contains(&relative) {
                            reds.push(relative);
                        }
                    }
                }
            }
            reds.sort();
            blues.sort();
            PasOligoOutput {
                sequence: oligo.sequence.clone(),
                mix_ratio: oligo.ratio,
                mutations,
                reds,
                blues,
            }
        })
        .collect()
}

/// Entry point for the PAS workflow; a no-solution failure is reported
/// in the output message rather than as a hard error.
pub fn pas_solve(
    input: &PasInput,
    rng: &mut StdRng,
) -> MakerResult<PasOutput> {
    let solver = PasSolver::new(
        input.config.clone(),
        input.is_dna_sequence,
        input.is_mutations_as_codons,
    );
    let mutations = extract_mutations(input)?;
    match solver.find_solution(&input.sequences, &mutations, rng) {
        Ok(results) => Ok(PasOutput {
            input_data: input.clone(),
            results,
            message: None,
        }),
        Err(MakerError::PasNoSolution(message)) => Ok(PasOutput {
            input_data: input.clone(),
            results: Vec::new(),
            message: Some(message),
        }),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod pas_tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;

    use super::*;

    fn goi() -> String {
        let unit = "ATGGCTAGCGTTCAAGGCCTAACGGATCGATTGCCA";
        unit.repeat(9)[..300].to_string()
    }

    fn test_input(positions: &[usize]) -> PasInput {
        let flank5 = "GGTCTCACCAGGTCAAGGCTTGCCAGGTAC".to_string();
        let flank3 = "GGTACCTGGCAAGCCTTGACCTGGTGAGAC".to_string();
        PasInput {
            sequences: PasSequences {
                gene_of_interest: goi(),
                five_end_flanking_sequence: flank5,
                three_end_flanking_sequence: flank3,
            },
            is_dna_sequence: true,
            config: PasConfig {
                min_overlap_tm: 54.0,
                max_overlap_tm: 64.0,
                ..PasConfig::default()
            },
            mutations: positions
                .iter()
                .map(|p| PasMutationInput {
                    mutants: vec!["K".to_string()],
                    position: *p,
                    frequency: 0.5,
                })
                .collect(),
            is_mutations_as_codons: false,
        }
    }

    #[test]
    fn test_extract_mutations_groups_and_splits() {
        let mut input = test_input(&[9]);
        input.mutations = vec![PasMutationInput {
            mutants: vec!["K,L".to_string()],
            position: 9,
            frequency: 0.5,
        }];
        let sites = extract_mutations(&input).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].mutations.len(), 2);
        assert_approx_eq!(sites[0].mutations[0].frequency, 0.25, 1e-9);
    }

    #[test]
    fn test_extract_mutations_rejects_zero_position() {
        let mut input = test_input(&[9]);
        input.mutations = vec![PasMutationInput {
            mutants: vec!["K".to_string()],
            position: 0,
            frequency: 0.5,
        }];
        assert_eq!(
            extract_mutations(&input).unwrap_err(),
            MakerError::NonPositivePosition
        );
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            pas_solve(&input, &mut rng).unwrap_err(),
            MakerError::NonPositivePosition
        );
    }

    #[test]
    fn test_pas_end_to_end_invariants() {
        let input = test_input(&[9, 10, 13, 19, 39]);
        let mut rng = StdRng::seed_from_u64(42);
        let output = pas_solve(&input, &mut rng).unwrap();
        assert!(
            output.message.is_none(),
            "unexpected failure: {:?}",
            output.message
        );
        let results = &output.results;
        assert!(!results.is_empty());
        assert_eq!(results.len() % 2, 0, "fragment count must be even");

        // contiguous cover of the whole gene
        assert_eq!(results[0].start, 0);
        let full_len = input.sequences.full_sequence_with_offset().0.len();
        assert_eq!(results.last().unwrap().end + 1, full_len);

        let config = &input.config;
        for (i, result) in results.iter().enumerate() {
            assert!(
                result.length >= config.min_oligo_size
                    && result.length <= config.max_oligo_size
            );
            if let Some(tm) = result.overlap_tm {
                assert!(
                    tm >= config.min_overlap_tm
                        && tm
                            <= config.max_overlap_tm
                                + config.temp_range_size,
                    "overlap Tm {tm} outside the accepted band"
                );
            }
            let ratio_total: f64 =
                result.oligos.iter().map(|o| o.mix_ratio).sum();
            assert_approx_eq!(ratio_total, 1.0, 1e-6);
            if i + 1 < results.len() {
                assert!(result.overlap.is_some());
            }
        }
    }

    #[test]
    fn test_pas_infeasible_reports_message() {
        let mut input = test_input(&[9]);
        // an overlap window that can never be satisfied
        input.config.min_overlap_tm = 95.0;
        input.config.max_overlap_tm = 96.0;
        let mut rng = StdRng::seed_from_u64(1);
        let output = pas_solve(&input, &mut rng).unwrap();
        assert!(output.results.is_empty());
        assert!(output.message.is_some());
    }
}
