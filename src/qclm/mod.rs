//! Multi-site directed mutagenesis: a minimum set of primers jointly
//! covering all requested substitutions, optimised over site splits and
//! a reaction-temperature grid.

pub mod primers;
pub mod site_split;
pub mod solution;

use std::time::{Duration, Instant};

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::codon::DegenerateCodon;
use crate::codon_usage::CodonUsage;
use crate::degeneracy::{
    contains_no_stop, fallback_per_amino, solve_set_cover,
};
use crate::dna::{gc_percent, validate_dna};
use crate::errs::{MakerError, MakerResult};
use crate::mutation::{group_mutations, parse_amino_mutation, MutationSite};
use crate::primer::{MutagenesisDna, PrimerSpec};
use crate::qclm::primers::QclmPrimers;
use crate::qclm::site_split::{
    enumerate_site_splits, SiteSequence, SiteSplits,
};
use crate::qclm::solution::{PrimerScoring, QclmSolution, ScoredPrimer};
use crate::thermo::{
    StructureCalculator, TemperatureCalculator, TemperatureConfig,
};
use crate::util::{arange, round_decimals};

// Primers longer than this skip the secondary-structure screen.
const MAX_STRUCTURE_PRIMER_SIZE: usize = 60;
// Budget for finding a stop-free degenerate set cover.
const DEGENERACY_BUDGET: Duration = Duration::from_secs(60);

fn default_min_primer_size() -> usize {
    23
}
fn default_max_primer_size() -> usize {
    60
}
fn default_gc_min() -> f64 {
    40.0
}
fn default_gc_opt() -> f64 {
    50.0
}
fn default_gc_max() -> f64 {
    60.0
}
fn default_end_size_min() -> usize {
    10
}
fn default_end_size_max() -> usize {
    40
}
fn default_min_temperature() -> f64 {
    75.0
}
fn default_max_temperature() -> f64 {
    90.0
}
fn default_gc_clamp() -> usize {
    1
}
fn default_true() -> bool {
    true
}
fn default_usage_threshold() -> f64 {
    0.1
}
fn default_temp_range_size() -> f64 {
    5.0
}
fn default_temp_weight() -> f64 {
    16.0
}
fn default_primer_size_weight() -> f64 {
    4.0
}
fn default_three_end_size_weight() -> f64 {
    8.0
}
fn default_five_end_size_weight() -> f64 {
    1.0
}
fn default_gc_content_weight() -> f64 {
    0.0
}
fn default_mutation_coverage_weight() -> f64 {
    160.0
}
fn default_structure_weight() -> f64 {
    32.0
}
fn default_temp_threshold_step() -> f64 {
    1.0
}
fn default_organism() -> String {
    "e-coli".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QclmConfig {
    pub min_primer_size: usize,
    pub opt_primer_size: usize,
    pub max_primer_size: usize,

    pub min_gc_content: f64,
    pub opt_gc_content: f64,
    pub max_gc_content: f64,

    pub min_three_end_size: usize,
    pub opt_three_end_size: usize,
    pub max_three_end_size: usize,

    pub min_five_end_size: usize,
    pub opt_five_end_size: usize,
    pub max_five_end_size: usize,

    pub min_temperature: f64,
    pub max_temperature: f64,

    pub gc_clamp: usize,
    pub use_degeneracy_codon: bool,
    pub codon_usage_frequency_threshold: f64,

    // Search only for solutions with non-overlapping primers?
    pub non_overlapping_primers: bool,

    // Enable the secondary-structure screen on generated primers.
    pub use_primer3: bool,

    // The allowed range for primer melting temperatures, in deg C.
    pub temp_range_size: f64,

    pub temperature_config: TemperatureConfig,

    // Weights used for non-optimality calculation.
    pub temp_weight: f64,
    pub primer_size_weight: f64,
    pub three_end_size_weight: f64,
    pub five_end_size_weight: f64,
    pub gc_content_weight: f64,
    // multiplies (1 - <total mutation coverage>)
    pub mutation_coverage_weight: f64,
    pub hairpin_temperature_weight: f64,
    pub primer_dimer_temperature_weight: f64,

    // Step for iteration over melting temperature thresholds, in deg C.
    pub temp_threshold_step: f64,

    pub organism: String,
}

impl Default for QclmConfig {
    fn default() -> Self {
        Self {
            min_primer_size: default_min_primer_size(),
            opt_primer_size: default_min_primer_size(),
            max_primer_size: default_max_primer_size(),
            min_gc_content: default_gc_min(),
            opt_gc_content: default_gc_opt(),
            max_gc_content: default_gc_max(),
            min_three_end_size: default_end_size_min(),
            opt_three_end_size: default_end_size_min(),
            max_three_end_size: default_end_size_max(),
            min_five_end_size: default_end_size_min(),
            opt_five_end_size: default_end_size_min(),
            max_five_end_size: default_end_size_max(),
            min_temperature: default_min_temperature(),
            max_temperature: default_max_temperature(),
            gc_clamp: default_gc_clamp(),
            use_degeneracy_codon: default_true(),
            codon_usage_frequency_threshold: default_usage_threshold(),
            non_overlapping_primers: false,
            use_primer3: default_true(),
            temp_range_size: default_temp_range_size(),
            temperature_config:
                TemperatureConfig::default_gc_quickchange(),
            temp_weight: default_temp_weight(),
            primer_size_weight: default_primer_size_weight(),
            three_end_size_weight: default_three_end_size_weight(),
            five_end_size_weight: default_five_end_size_weight(),
            gc_content_weight: default_gc_content_weight(),
            mutation_coverage_weight: default_mutation_coverage_weight(),
            hairpin_temperature_weight: default_structure_weight(),
            primer_dimer_temperature_weight: default_structure_weight(),
            temp_threshold_step: default_temp_threshold_step(),
            organism: default_organism(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QclmSequences {
    pub gene_of_interest: String,
    #[serde(default)]
    pub five_end_flanking_sequence: String,
    #[serde(default)]
    pub three_end_flanking_sequence: String,
}

impl QclmSequences {
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
pub struct QclmInput {
    pub sequences: QclmSequences,
    #[serde(default)]
    pub config: QclmConfig,
    pub mutations: Vec<String>,
}

impl QclmInput {
    pub fn parse_mutations(
        &self,
        goi_offset: usize,
    ) -> MakerResult<Vec<MutationSite>> {
        let parsed = self
            .mutations
            .iter()
            .map(|m| parse_amino_mutation(m, goi_offset))
            .collect::<MakerResult<Vec<_>>>()?;
        group_mutations(parsed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QclmPrimerOutput {
    pub sequence: String,
    pub start: usize,
    pub length: usize,
    pub temperature: f64,
    pub gc_content: f64,
    pub degenerate_codons: Vec<String>,
    #[serde(default)]
    pub overlap_with_following: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QclmMutationOutput {
    pub mutations: Vec<String>,
    pub result_found: bool,
    pub primers: Vec<QclmPrimerOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QclmOutput {
    pub input_data: QclmInput,
    pub full_sequence: String,
    pub goi_offset: usize,
    pub mutation_coverage: f64,
    pub results: Vec<QclmMutationOutput>,
}

pub struct QclmSolver {
    config: QclmConfig,
    usage: &'static CodonUsage,
    calculator: TemperatureCalculator,
    structures: StructureCalculator,
    sequence: String,
    goi_offset: usize,
}

impl QclmSolver {
    pub fn new(
        sequences: &QclmSequences,
        config: QclmConfig,
    ) -> MakerResult<Self> {
        let usage = CodonUsage::for_organism(&config.organism)?;
        let calculator = config.temperature_config.create_calculator();
        let structures = StructureCalculator::from_temperature_config(
            &config.temperature_config,
        );
        let (sequence, goi_offset) = sequences.full_sequence_with_offset();
        if sequence.is_empty() {
            return Err(MakerError::EmptySequence);
        }
        validate_dna(&sequence)?;
        Ok(Self {
            config,
            usage,
            calculator,
            structures,
            sequence,
            goi_offset,
        })
    }

    pub fn goi_offset(&self) -> usize {
        self.goi_offset
    }

    /// Pick the codon sets realising each site's amino set: a stop-free
    /// degenerate set cover when requested and found in time, otherwise
    /// random concrete codons with the wild-type codon taken from the
    /// template.
    fn select_codons(
        &self,
        mutations: &[MutationSite],
        rng: &mut StdRng,
    ) -> MakerResult<Vec<IndexSet<String>>> {
        let threshold = self.config.codon_usage_frequency_threshold;

        if self.config.use_degeneracy_codon {
            let deadline = Instant::now() + DEGENERACY_BUDGET;
            loop {
                let mut per_site: Vec<IndexSet<String>> =
                    Vec::with_capacity(mutations.len());
                let mut solved = true;
                for site in mutations {
                    match solve_set_cover(
                        &site.new_aminos,
                        self.usage,
                        threshold,
                        rng,
                        deadline,
                    )? {
                        Some(cover) if contains_no_stop(&cover) => {
                            per_site.push(
                                cover
                                    .keys()
                                    .map(|c| c.to_string())
                                    .collect(),
                            );
                        }
                        _ => {
                            solved = false;
                            break;
                        }
                    }
                }
                if solved {
                    return Ok(per_site);
                }
                if Instant::now() > deadline {
                    warn!(
                        "degenerate set cover not found in time, \
                         falling back to concrete codons"
                    );
                    break;
                }
            }
        }

        // Random concrete codons; the wild-type draw is replaced by the
        // codon present in the template so identity rows round-trip.
        mutations
            .iter()
            .map(|site| {
                let cover = fallback_per_amino(
                    &site.new_aminos,
                    self.usage,
                    threshold,
                    rng,
                )?;
                let mut codons = IndexSet::new();
                for (codon, aminos) in cover.iter() {
                    if aminos.contains(&site.old_amino) {
                        codons.insert(
                            self.sequence
                                [site.position..site.position + 3]
                                .to_string(),
                        );
                    } else {
                        codons.insert(codon.to_string());
                    }
                }
                Ok(codons)
            })
            .collect()
    }

    fn structure_tms(&self, spec: &PrimerSpec, sequence: &str) -> (f64, f64) {
        if self.config.use_primer3
            && spec.length <= MAX_STRUCTURE_PRIMER_SIZE
        {
            (
                self.structures.hairpin_tm(sequence),
                self.structures.homodimer_tm(sequence),
            )
        } else {
            (0f64, 0f64)
        }
    }

    /// Select the lowest-score primer for each (site sequence, codon
    /// tuple) at a reaction temperature.
    fn collect_best_primers(
        &self,
        primers: &QclmPrimers,
        base: &MutagenesisDna,
        score_fun: &PrimerScoring,
        temperature: f64,
    ) -> IndexMap<SiteSequence, Vec<ScoredPrimer>> {
        let mut best: IndexMap<SiteSequence, Vec<ScoredPrimer>> =
            IndexMap::new();
        for site_sequence in primers.site_sequences_sorted() {
            let mut selected = Vec::new();
            for codons in primers.primer_defs(&site_sequence) {
                let mut best_primer: Option<ScoredPrimer> = None;
                let store = match primers.primers(&site_sequence) {
                    Some(store) => store,
                    None => continue,
                };
                for (spec, tm) in store.get_by_codons(codons) {
                    let primer_sequence = spec.sequence(base);
                    let (hairpin_tm, homodimer_tm) =
                        self.structure_tms(&spec, &primer_sequence);
                    let score = score_fun.score(
                        &spec,
                        &site_sequence,
                        tm,
                        hairpin_tm,
                        homodimer_tm,
                        temperature,
                    );
                    if score.is_finite()
                        && best_primer
                            .as_ref()
                            .map(|b| score < b.score)
                            .unwrap_or(true)
                    {
                        best_primer =
                            Some(ScoredPrimer { spec, score, tm });
                    }
                }
                if let Some(primer) = best_primer {
                    selected.push(primer);
                }
            }
            best.insert(site_sequence, selected);
        }
        best
    }

    /// Heterodimer penalty of a primer against all primers already in
    /// the partial solution at other sites.
    fn heterodimer_penalty(
        &self,
        spec: &PrimerSpec,
        site_sequence: &SiteSequence,
        partial: &QclmSolution,
        base: &MutagenesisDna,
    ) -> f64 {
        let safe_limit =
            partial.temperature - 2.0 * self.config.temp_range_size;
        let this_sequence = spec.sequence(base);
        let mut penalty = 0f64;
        for (other_sequence, other_primers) in &partial.primers {
            if other_sequence == site_sequence {
                continue;
            }
            for other in other_primers {
                let other_seq = other.spec.sequence(base);
                let hb_tm = self
                    .structures
                    .heterodimer_tm(&this_sequence, &other_seq);
                if hb_tm > safe_limit {
                    penalty += self.config.hairpin_temperature_weight
                        * (hb_tm - safe_limit);
                }
            }
        }
        penalty
    }

    /// Assemble one solution per site split from the per-sequence best
    /// primers and keep the cheapest.
    fn select_best_site_split<'m>(
        &'m self,
        best_primers: &IndexMap<SiteSequence, Vec<ScoredPrimer>>,
        splits: &SiteSplits,
        temperature: f64,
        mutations: &'m [MutationSite],
        base: &MutagenesisDna,
    ) -> Option<QclmSolution<'m>> {
        let mut best: Option<QclmSolution> = None;
        for split in splits.splits() {
            let mut solution = QclmSolution::new(
                mutations,
                temperature,
                &self.config,
                self.usage,
            );
            for site_sequence in split {
                let Some(primers) = best_primers.get(site_sequence)
                else {
                    continue;
                };
                for primer in primers {
                    let penalty = if self.config.use_primer3 {
                        self.heterodimer_penalty(
                            &primer.spec,
                            site_sequence,
                            &solution,
                            base,
                        )
                    } else {
                        0f64
                    };
                    solution.add_primer(
                        site_sequence,
                        ScoredPrimer {
                            spec: primer.spec.clone(),
                            score: primer.score + penalty,
                            tm: primer.tm,
                        },
                    );
                }
            }
            if solution.is_empty() {
                continue;
            }
            let better = best
                .as_ref()
                .map(|b| solution.score() < b.score())
                .unwrap_or(true);
            if better {
                best = Some(solution);
            }
        }
        best
    }
}

/// Entry point for the QCLM/MSDM workflow.
pub fn qclm_solve(
    input: &QclmInput,
    rng: &mut StdRng,
) -> MakerResult<QclmOutput> {
    let solver = QclmSolver::new(&input.sequences, input.config.clone())?;
    let config = &solver.config;
    let mutations = input.parse_mutations(solver.goi_offset())?;
    if mutations.is_empty() {
        return Err(MakerError::InvalidMutationString(
            "no mutations given".to_string(),
        ));
    }
    info!(
        "QCLM solving mutations: {}",
        mutations.iter().map(|m| m.to_string()).join(",")
    );

    let codons_for_site = solver.select_codons(&mutations, rng)?;
    debug!("codons for sites: {codons_for_site:?}");

    let all_splits = enumerate_site_splits(
        &mutations,
        config.max_primer_size,
        config.min_five_end_size,
        config.min_three_end_size,
    )?;

    // With non-overlapping primers each split is optimised on its own;
    // otherwise all splits share one per-sequence primer cache.
    let split_sets: Vec<SiteSplits> = if config.non_overlapping_primers {
        all_splits
            .splits()
            .iter()
            .cloned()
            .map(SiteSplits::single)
            .collect()
    } else {
        let mut single = SiteSplits::default();
        for split in all_splits.splits() {
            single.add(split.clone());
        }
        vec![single]
    };

    let site_positions =
        mutations.iter().map(|m| m.position).collect::<Vec<usize>>();
    let index_of_site: IndexMap<usize, usize> = site_positions
        .iter()
        .enumerate()
        .map(|(i, p)| (*p, i))
        .collect();
    let base =
        MutagenesisDna::new(solver.sequence.clone(), site_positions);

    let score_fun = PrimerScoring::new(&base, config);
    let mutations_ref: &[MutationSite] = &mutations;

    let mut best_solution: Option<QclmSolution> = None;
    for splits in &split_sets {
        let mut primers =
            QclmPrimers::new(splits, &base, config, &solver.calculator);

        let sorted_sequences = primers.site_sequences_sorted();
        for (index, site_sequence) in sorted_sequences.iter().enumerate()
        {
            let codon_sets = site_sequence
                .iter()
                .map(|site| {
                    codons_for_site[index_of_site[site]]
                        .iter()
                        .cloned()
                        .collect::<Vec<String>>()
                })
                .collect::<Vec<Vec<String>>>();

            let min_primer_start = if config.non_overlapping_primers
                && index > 0
            {
                primers.range(&sorted_sequences[index - 1]).1
            } else {
                0
            };

            for codons in
                codon_sets.into_iter().multi_cartesian_product()
            {
                primers.add_minimal_primers(
                    site_sequence,
                    &codons,
                    min_primer_start,
                );
            }
        }

        let eps = 1e-6;
        let step = config.temp_threshold_step;
        for threshold in arange(
            config.min_temperature,
            config.max_temperature + eps,
            step,
        ) {
            primers.grow(threshold);
            let temperature = threshold + step / 2.0;
            let best = solver.collect_best_primers(
                &primers,
                &base,
                &score_fun,
                temperature,
            );
            if let Some(solution) = solver.select_best_site_split(
                &best,
                splits,
                temperature,
                mutations_ref,
                &base,
            ) {
                let better = best_solution
                    .as_ref()
                    .map(|b| solution.score() < b.score())
                    .unwrap_or(true);
                if better {
                    best_solution = Some(solution);
                }
            }
        }
    }

    let best_solution =
        best_solution.ok_or(MakerError::EmptySiteSplit)?;
    info!("QCLM best {best_solution}");

    let coverage = best_solution.mutation_coverage();
    if coverage < 1.0 - 1e-6 {
        warn!(
            "solution covers only {:.1}% of requested mutations",
            coverage * 100.0
        );
    }
    for failure in
        best_solution.breaking_primers(&base, &solver.structures)
    {
        warn!(
            "primer at {} breaks constraints: {}",
            failure.spec.offset, failure.errors
        );
    }

    Ok(build_output(input, &solver, &mutations, &best_solution, coverage))
}

/// Primer placement windows per site sequence, for overlap reporting.
fn site_boundaries(
    solution: &QclmSolution,
) -> IndexMap<SiteSequence, (usize, usize)> {
    solution
        .primers
        .iter()
        .map(|(sequence, primers)| {
            let min_start =
                primers.iter().map(|p| p.spec.offset).min().unwrap_or(0);
            let max_end =
                primers.iter().map(|p| p.spec.end()).max().unwrap_or(0);
            (sequence.clone(), (min_start, max_end))
        })
        .collect()
}

fn overlaps_other_site(
    boundaries: &IndexMap<SiteSequence, (usize, usize)>,
    site_sequence: &SiteSequence,
    start: usize,
    end: usize,
) -> bool {
    boundaries.iter().any(|(other, (lo, hi))| {
        other != site_sequence
            && ((*lo <= start && start <= *hi)
                || (*lo <= end && end <= *hi))
    })
}

fn build_output(
    input: &QclmInput,
    solver: &QclmSolver,
    mutations: &[MutationSite],
    solution: &QclmSolution,
    coverage: f64,
) -> QclmOutput {
    let boundaries = site_boundaries(solution);
    let mut results = Vec::new();

    for (site_sequence, primers) in &solution.primers {
        let narrowed = MutagenesisDna::new(
            solver.sequence.clone(),
            site_sequence.clone(),
        );
        let site_mutations = site_sequence
            .iter()
            .filter_map(|site| {
                mutations.iter().find(|m| m.position == *site)
            })
            .collect::<Vec<&MutationSite>>();

        for primer in primers {
            let primer_sequence = primer.spec.sequence(&narrowed);
            let user_mutation_strings = site_mutations
                .iter()
                .zip(primer.spec.codons.iter())
                .map(|(mutation, codon)| {
                    let aminos = DegenerateCodon::parse_str(codon)
                        .map(|c| c.to_aminos(solver.usage))
                        .unwrap_or_default();
                    mutation.user_string_with_aminos(&aminos)
                })
                .collect::<Vec<String>>();

            let overlap_with_following = overlaps_other_site(
                &boundaries,
                site_sequence,
                primer.spec.offset,
                primer.spec.end(),
            );

            results.push(QclmMutationOutput {
                mutations: user_mutation_strings,
                result_found: true,
                primers: vec![QclmPrimerOutput {
                    sequence: primer_sequence.clone(),
                    start: primer.spec.offset,
                    length: primer.spec.length,
                    temperature: round_decimals(primer.tm, 2),
                    gc_content: round_decimals(
                        gc_percent(&primer_sequence),
                        2,
                    ),
                    degenerate_codons: primer.spec.codons.clone(),
                    overlap_with_following,
                }],
            });
        }
    }

    QclmOutput {
        input_data: input.clone(),
        full_sequence: solver.sequence.clone(),
        goi_offset: solver.goi_offset,
        mutation_coverage: coverage,
        results,
    }
}
