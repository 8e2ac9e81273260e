//! Site-saturation mutagenesis: one forward/reverse primer pair per
//! mutation, sharing an overlap tuned against a melting-temperature grid.

pub mod grow;
pub mod types;

use itertools::Itertools;
use log::{debug, info};

use crate::dna::reverse_complement;
use crate::errs::{MakerError, MakerResult};
use crate::mutation::AminoMutation;
use crate::primer::{Direction, Primer};
use crate::ssm::grow::{
    compute_grown_solution_score, find_best_overlaps, grow_primers,
    pick_best_grown_solution, GrownSolution, SsmFlankingSequences,
};
use crate::ssm::types::{
    MinOptMax, OverlapOutput, SsmConfig, SsmInput, SsmMutationOutput,
    SsmOutput, SsmPrimerOutput, SsmPrimerSpec, SsmSequences,
};
use crate::thermo::{StructureCalculator, TemperatureCalculator};
use crate::util::arange;

/// A primer candidate annotated with its 3'-end size and temperature.
#[derive(Debug, Clone)]
struct MutagenicPrimer {
    primer: Primer,
    three_end_size: usize,
    three_end_temp: f64,
}

impl MutagenicPrimer {
    fn in_range(&self, config: &SsmConfig, temp_range: &MinOptMax) -> bool {
        let gc = self.primer.gc_content();
        let gc_in_range =
            config.min_gc_content <= gc && gc <= config.max_gc_content;
        gc_in_range && temp_range.contains(self.three_end_temp)
    }
}

/// One scored forward/reverse pair for a mutation.
#[derive(Debug, Clone)]
struct PrimerPair {
    mutation: AminoMutation,
    forward: MutagenicPrimer,
    reverse: MutagenicPrimer,
    overlap_length: usize,
    overlap_temp: f64,
    non_optimality: f64,
}

/// The reaction-temperature triple shared by every pair of a solution.
#[derive(Debug, Clone, Copy)]
struct ReactionTemps {
    forward: MinOptMax,
    reverse: MinOptMax,
    overlap: MinOptMax,
}

pub struct SsmSolver {
    config: SsmConfig,
    calculator: TemperatureCalculator,
    sequence: String,
    goi_range: (usize, usize),
    flanks: SsmFlankingSequences,
    forward_primer_temp: f64,
    reverse_primer_temp: f64,
}

impl SsmSolver {
    pub fn new(
        sequences: &SsmSequences,
        config: SsmConfig,
    ) -> MakerResult<Self> {
        let calculator = config.temperature_config.create_calculator();
        let (sequence, goi_range) =
            sequences.full_sequence_with_goi_range()?;
        let forward_primer_temp =
            calculator.duplex_tm(&sequences.forward_primer);
        let reverse_primer_temp =
            calculator.duplex_tm(&sequences.reverse_primer);
        let flanks = SsmFlankingSequences {
            forward_flank: Some(sequences.forward_primer.clone()),
            reverse_flank: Some(sequences.reverse_primer.clone()),
        };
        Ok(Self {
            config,
            calculator,
            sequence,
            goi_range,
            flanks,
            forward_primer_temp,
            reverse_primer_temp,
        })
    }

    pub fn goi_offset(&self) -> usize {
        self.goi_range.0
    }

    fn overlap_temps(&self) -> Vec<f64> {
        arange(
            self.config.min_overlap_temperature,
            self.config.max_overlap_temperature,
            self.config.overlap_temp_range_step,
        )
    }

    fn explicit_three_end_temps(&self) -> Vec<f64> {
        arange(
            self.config.min_three_end_temperature,
            self.config.max_three_end_temperature,
            self.config.three_end_temp_range,
        )
    }

    /// The (forward, reverse, overlap) reaction-temperature grid; the
    /// 3' grids are centred on the flanking-primer Tms unless the config
    /// asks for the explicit input range.
    fn temp_combinations(&self) -> Vec<(f64, f64, f64)> {
        let cfg = &self.config;
        let overlap_temps = self.overlap_temps();
        let mut combinations = Vec::new();

        if cfg.separate_forward_reverse_temperatures {
            let (forward_temps, reverse_temps) =
                if cfg.exclude_flanking_primers {
                    let explicit = self.explicit_three_end_temps();
                    (explicit.clone(), explicit)
                } else {
                    (
                        arange(
                            self.forward_primer_temp
                                - cfg.three_end_temp_range,
                            self.forward_primer_temp
                                + cfg.three_end_temp_range,
                            cfg.three_end_temp_range_step,
                        ),
                        arange(
                            self.reverse_primer_temp
                                - cfg.three_end_temp_range,
                            self.reverse_primer_temp
                                + cfg.three_end_temp_range,
                            cfg.three_end_temp_range_step,
                        ),
                    )
                };
            for fw in &forward_temps {
                for rw in &reverse_temps {
                    for overlap in &overlap_temps {
                        combinations.push((*fw, *rw, *overlap));
                    }
                }
            }
        } else {
            let three_end_temps = if cfg.exclude_flanking_primers {
                self.explicit_three_end_temps()
            } else {
                let min = self
                    .forward_primer_temp
                    .max(self.reverse_primer_temp)
                    - cfg.three_end_temp_range;
                let max = self
                    .forward_primer_temp
                    .min(self.reverse_primer_temp)
                    + cfg.three_end_temp_range;
                let mut temps =
                    arange(min, max, cfg.three_end_temp_range_step);
                if temps.is_empty() {
                    // flanking primers too far apart, fall back to a
                    // single temperature below the cooler one
                    temps = vec![
                        self.forward_primer_temp
                            .min(self.reverse_primer_temp)
                            - 1.0,
                    ];
                }
                temps
            };
            for three_end in &three_end_temps {
                for overlap in &overlap_temps {
                    combinations.push((*three_end, *three_end, *overlap));
                }
            }
        }
        combinations
    }

    /// The default fast search: greedy overlaps per target overlap Tm,
    /// then primer growth for every temperature triple.
    pub fn solve_fast(
        &self,
        mutations: &[AminoMutation],
    ) -> MakerResult<GrownSolution> {
        let temps = self.temp_combinations();
        let overlap_temps = self.overlap_temps();

        let mut overlaps_by_temp: Vec<(f64, Vec<SsmPrimerSpec>)> =
            Vec::with_capacity(overlap_temps.len());
        for overlap_temp in &overlap_temps {
            let overlaps = find_best_overlaps(
                &self.sequence,
                self.config.min_five_end_size,
                self.config.min_overlap_size,
                self.config.max_overlap_size,
                mutations,
                *overlap_temp,
                &self.calculator,
                self.config.overlap_temp_range / 2.0,
            )?;
            overlaps_by_temp.push((*overlap_temp, overlaps));
        }

        let mut solutions = Vec::with_capacity(temps.len());
        for (fw_temp, rw_temp, overlap_temp) in temps {
            let overlaps = overlaps_by_temp
                .iter()
                .min_by(|(a, _), (b, _)| {
                    (a - overlap_temp)
                        .abs()
                        .partial_cmp(&(b - overlap_temp).abs())
                        .expect("temperatures are finite")
                })
                .map(|(_, overlaps)| overlaps.clone())
                .expect("overlap grid is non-empty");

            let (fw_primers, rw_primers) = grow_primers(
                self.config.max_primer_size,
                self.config.min_three_end_size,
                &self.sequence,
                mutations,
                &overlaps,
                fw_temp,
                rw_temp,
                &self.calculator,
            );
            solutions.push(GrownSolution::new(
                overlaps, fw_primers, rw_primers,
            ));
        }

        Ok(pick_best_grown_solution(
            &self.config,
            &self.sequence,
            solutions,
            &self.flanks,
        ))
    }

    fn search_area(
        &self,
        mutation: &AminoMutation,
        direction: Direction,
    ) -> (isize, usize) {
        let cfg = &self.config;
        let max_five_end_size = cfg.max_primer_size
            - mutation.length()
            - cfg.min_three_end_size;
        let area_length =
            max_five_end_size + mutation.length() + cfg.max_three_end_size;
        let min_start = match direction {
            Direction::Forward => {
                mutation.position as isize - max_five_end_size as isize
            }
            Direction::Reverse => {
                mutation.position as isize - cfg.max_three_end_size as isize
            }
        };
        (min_start, area_length)
    }

    /// Enumerate every candidate primer for a mutation whose 3' and 5'
    /// end sizes are within configured limits.
    fn enumerate_primers(
        &self,
        mutation: &AminoMutation,
        direction: Direction,
    ) -> Vec<MutagenicPrimer> {
        let cfg = &self.config;
        let (min_start, area_length) =
            self.search_area(mutation, direction);
        let area_start = min_start.max(0) as usize;
        let area_end = std::cmp::min(
            (min_start + area_length as isize).max(0) as usize,
            self.sequence.len(),
        );

        let mut candidates = Vec::new();
        for normal_start in area_start..area_end {
            for length in cfg.min_primer_size..=cfg.max_primer_size {
                if normal_start + length > area_end {
                    break;
                }
                let start = match direction {
                    Direction::Forward => normal_start,
                    Direction::Reverse => normal_start + length - 1,
                };
                let primer = match Primer::try_new(
                    &self.sequence,
                    direction,
                    start,
                    length,
                ) {
                    Ok(primer) => primer,
                    Err(_) => continue,
                };
                let three_end = primer.three_end_size_from(mutation);
                let five_end = primer.five_end_size_from(mutation);
                let three_in_range = three_end
                    >= cfg.min_three_end_size as isize
                    && three_end <= cfg.max_three_end_size as isize;
                let five_in_range = five_end
                    >= cfg.min_five_end_size as isize
                    && five_end <= cfg.max_five_end_size as isize;
                if !(three_in_range && five_in_range) {
                    continue;
                }
                let three_end_temp =
                    primer.three_end_tm(mutation, &self.calculator);
                candidates.push(MutagenicPrimer {
                    primer,
                    three_end_size: three_end as usize,
                    three_end_temp,
                });
            }
        }
        candidates
    }

    /// Score one candidate pair against a temperature triple.
    fn pair_score(
        &self,
        forward: &MutagenicPrimer,
        reverse: &MutagenicPrimer,
        overlap_temp_observed: f64,
        temps: (f64, f64, f64),
    ) -> f64 {
        let cfg = &self.config;
        let half = cfg.three_end_temp_range / 2.0;
        let banded = |value: f64, target: f64| -> f64 {
            let diff = (value - target).abs();
            if diff < half {
                0f64
            } else {
                diff
            }
        };
        let fw_temp_diff = banded(forward.three_end_temp, temps.0);
        let rw_temp_diff = banded(reverse.three_end_temp, temps.1);
        let overlap_diff = banded(overlap_temp_observed, temps.2);

        let fw_extra =
            forward.three_end_size as f64 - cfg.min_three_end_size as f64;
        let rw_extra =
            reverse.three_end_size as f64 - cfg.min_three_end_size as f64;

        let gc_overflow = |primer: &MutagenicPrimer| -> f64 {
            let gc = primer.primer.gc_content();
            (cfg.min_gc_content - gc).max(0.0)
                + (gc - cfg.max_gc_content).max(0.0)
        };

        (cfg.three_end_temp_weight * fw_temp_diff.powi(2)
            + cfg.three_end_temp_weight * rw_temp_diff.powi(2)
            + cfg.overlap_temp_weight * overlap_diff.powi(2)
            + cfg.three_end_size_weight * fw_extra.powi(2)
            + cfg.three_end_size_weight * rw_extra.powi(2)
            + cfg.gc_content_weight * gc_overflow(forward).powi(2)
            + cfg.gc_content_weight * gc_overflow(reverse).powi(2))
        .sqrt()
    }

    fn structure_penalty(
        &self,
        pair: &PrimerPair,
        temps: (f64, f64),
        structures: &StructureCalculator,
    ) -> f64 {
        let cfg = &self.config;
        let fw_seq = &pair.forward.primer.normal_order_sequence;
        let rw_seq = &pair.reverse.primer.normal_order_sequence;

        let fw_hairpin =
            (temps.0 - structures.hairpin_tm(fw_seq)).powi(2);
        let rw_hairpin =
            (temps.1 - structures.hairpin_tm(rw_seq)).powi(2);
        let fw_homodimer =
            (temps.0 - structures.homodimer_tm(fw_seq)).powi(2);
        let rw_homodimer =
            (temps.1 - structures.homodimer_tm(rw_seq)).powi(2);
        let heterodimer = match (
            &self.flanks.forward_flank,
            &self.flanks.reverse_flank,
        ) {
            (Some(forward), Some(reverse)) => {
                structures.heterodimer_tm(fw_seq, reverse)
                    + structures.heterodimer_tm(rw_seq, forward)
            }
            _ => 0f64,
        };

        (cfg.hairpin_temperature_weight * fw_hairpin
            + cfg.hairpin_temperature_weight * rw_hairpin
            + cfg.primer_dimer_temperature_weight * fw_homodimer
            + cfg.primer_dimer_temperature_weight * rw_homodimer
            + cfg.primer_dimer_temperature_weight * heterodimer)
            .sqrt()
    }

    /// The exhaustive verification path: enumerate candidates and pairs,
    /// then minimise the pair score for every temperature triple.
    pub fn solve_enumerated(
        &self,
        mutations: &[AminoMutation],
    ) -> MakerResult<(Vec<PrimerPairsForMutation>, SolvedEnumeration)> {
        let cfg = &self.config;
        let mut per_mutation = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            let forwards =
                self.enumerate_primers(mutation, Direction::Forward);
            let reverses =
                self.enumerate_primers(mutation, Direction::Reverse);
            debug!(
                "mutation {}: {} forward, {} reverse candidates",
                mutation,
                forwards.len(),
                reverses.len()
            );

            let mut pairs = Vec::new();
            for (fi, fw) in forwards.iter().enumerate() {
                for (ri, rw) in reverses.iter().enumerate() {
                    let start = std::cmp::max(
                        fw.primer.normal_start(),
                        rw.primer.normal_start(),
                    );
                    let end = std::cmp::min(
                        fw.primer.normal_end(),
                        rw.primer.normal_end(),
                    );
                    if end <= start {
                        continue;
                    }
                    let overlap_length = end - start;
                    if overlap_length < cfg.min_overlap_size
                        || overlap_length > cfg.max_overlap_size
                    {
                        continue;
                    }
                    let overlap_temp = self
                        .calculator
                        .duplex_tm(&self.sequence[start..end]);
                    pairs.push((fi, ri, overlap_length, overlap_temp));
                }
            }
            if pairs.is_empty() {
                return Err(MakerError::NoOverlapWindow);
            }
            per_mutation.push(PrimerPairsForMutation {
                mutation: mutation.clone(),
                forwards,
                reverses,
                pairs,
            });
        }

        let structures = StructureCalculator::from_temperature_config(
            &cfg.temperature_config,
        );

        let mut best: Option<SolvedEnumeration> = None;
        for temps in self.temp_combinations() {
            let mut result = Vec::with_capacity(per_mutation.len());
            for options in &per_mutation {
                let (fi, ri, overlap_length, overlap_temp, score) = options
                    .pairs
                    .iter()
                    .map(|(fi, ri, len, overlap_temp)| {
                        let score = self.pair_score(
                            &options.forwards[*fi],
                            &options.reverses[*ri],
                            *overlap_temp,
                            temps,
                        );
                        (*fi, *ri, *len, *overlap_temp, score)
                    })
                    .min_by(|a, b| {
                        a.4.partial_cmp(&b.4).expect("finite scores")
                    })
                    .expect("pair list checked non-empty");

                let mut pair = PrimerPair {
                    mutation: options.mutation.clone(),
                    forward: options.forwards[fi].clone(),
                    reverse: options.reverses[ri].clone(),
                    overlap_length,
                    overlap_temp,
                    non_optimality: score,
                };
                if cfg.compute_hairpin_homodimer {
                    pair.non_optimality += self.structure_penalty(
                        &pair,
                        (temps.0, temps.1),
                        &structures,
                    );
                }
                result.push(pair);
            }

            let total: f64 =
                result.iter().map(|p| p.non_optimality).sum();
            let half = cfg.three_end_temp_range / 2.0;
            let candidate = SolvedEnumeration {
                pairs: result,
                temps: ReactionTemps {
                    forward: MinOptMax::around(temps.0, half),
                    reverse: MinOptMax::around(temps.1, half),
                    overlap: MinOptMax::around(temps.2, half),
                },
                total_non_optimality: total,
            };
            let better = best
                .as_ref()
                .map(|b| total < b.total_non_optimality)
                .unwrap_or(true);
            if better {
                best = Some(candidate);
            }
        }

        let best = best.ok_or(MakerError::NoOverlapWindow)?;
        Ok((per_mutation, best))
    }
}

/// Candidate primers and valid pairs for one mutation, kept around for
/// verification against the fast path.
pub struct PrimerPairsForMutation {
    mutation: AminoMutation,
    forwards: Vec<MutagenicPrimer>,
    reverses: Vec<MutagenicPrimer>,
    // (forward index, reverse index, overlap length, overlap Tm)
    pairs: Vec<(usize, usize, usize, f64)>,
}

pub struct SolvedEnumeration {
    pairs: Vec<PrimerPair>,
    temps: ReactionTemps,
    total_non_optimality: f64,
}

/// Trim the full sequence to the window spanned by the gene of interest
/// and all primers; returns the window and the new gene offset within it.
fn create_output_sequence(
    full_sequence: &str,
    goi_range: (usize, usize),
    primers: &[&Primer],
) -> (String, usize) {
    if primers.is_empty() {
        return (
            full_sequence[goi_range.0..goi_range.1].to_string(),
            0,
        );
    }
    let min_primer_start =
        primers.iter().map(|p| p.normal_start()).min().unwrap();
    let max_primer_end =
        primers.iter().map(|p| p.normal_end()).max().unwrap();
    let start = std::cmp::min(min_primer_start, goi_range.0);
    let end = std::cmp::max(max_primer_end, goi_range.1);
    (full_sequence[start..end].to_string(), goi_range.0 - start)
}

fn create_primer_output(
    mutagenic: &MutagenicPrimer,
    mutation: &AminoMutation,
    degenerate_codon: &str,
    new_sequence_start: isize,
    parameters_in_range: bool,
) -> SsmPrimerOutput {
    // the first listed degenerate codon is spliced into the display
    // sequence, the full set is expanded by the exporter
    let first_codon =
        degenerate_codon.split(',').next().unwrap_or(degenerate_codon);
    let mutated = mutagenic
        .primer
        .mutated_sequence(mutation.position, first_codon);
    let sequence = match mutagenic.primer.direction {
        Direction::Forward => mutated.clone(),
        Direction::Reverse => reverse_complement(&mutated),
    };
    SsmPrimerOutput {
        direction: mutagenic.primer.direction.as_str().to_string(),
        sequence,
        normal_order_sequence: mutated,
        normal_order_start: mutagenic.primer.normal_start() as isize
            - new_sequence_start,
        length: mutagenic.primer.length,
        three_end_temperature: mutagenic.three_end_temp,
        gc_content: mutagenic.primer.gc_content(),
        parameters_in_range,
    }
}

fn build_output(
    input: &SsmInput,
    solver: &SsmSolver,
    pairs: &[PrimerPair],
    temps: &ReactionTemps,
) -> SsmOutput {
    let all_primers = pairs
        .iter()
        .flat_map(|p| [&p.forward.primer, &p.reverse.primer])
        .collect::<Vec<&Primer>>();
    let (sequence, offset) = create_output_sequence(
        &solver.sequence,
        solver.goi_range,
        &all_primers,
    );
    let new_sequence_start = solver.goi_range.0 as isize - offset as isize;

    let results = pairs
        .iter()
        .map(|pair| {
            let fw_in_range =
                pair.forward.in_range(&solver.config, &temps.forward);
            let rw_in_range =
                pair.reverse.in_range(&solver.config, &temps.reverse);
            let overlap_in_range =
                temps.overlap.contains(pair.overlap_temp);
            let pair_in_range =
                fw_in_range && rw_in_range && overlap_in_range;
            SsmMutationOutput {
                mutation: pair.mutation.original_string.clone(),
                non_optimality: pair.non_optimality.round(),
                parameters_in_range: pair_in_range,
                result_found: true,
                forward_primer: create_primer_output(
                    &pair.forward,
                    &pair.mutation,
                    &input.degenerate_codon,
                    new_sequence_start,
                    fw_in_range,
                ),
                reverse_primer: create_primer_output(
                    &pair.reverse,
                    &pair.mutation,
                    &input.degenerate_codon,
                    new_sequence_start,
                    rw_in_range,
                ),
                overlap: OverlapOutput {
                    length: pair.overlap_length,
                    temperature: pair.overlap_temp,
                },
            }
        })
        .collect();

    SsmOutput {
        input_data: input.clone(),
        results,
        full_sequence: sequence,
        goi_offset: offset,
        new_sequence_start,
        forward_flanking_primer_temperature: solver.forward_primer_temp,
        reverse_flanking_primer_temperature: solver.reverse_primer_temp,
        forward_temperature: temps.forward,
        reverse_temperature: temps.reverse,
        overlap_temperature: temps.overlap,
    }
}

fn grown_solution_to_pairs(
    solver: &SsmSolver,
    mutations: &[AminoMutation],
    solution: &GrownSolution,
) -> MakerResult<Vec<PrimerPair>> {
    let structures = StructureCalculator::from_temperature_config(
        &solver.config.temperature_config,
    );
    let non_optimalities = compute_grown_solution_score(
        &solver.config,
        &solver.sequence,
        solution,
        &solver.flanks,
        &structures,
    );

    mutations
        .iter()
        .zip(&solution.overlaps)
        .zip(&solution.fw_primers)
        .zip(&solution.rw_primers)
        .zip(&non_optimalities)
        .map(|((((mutation, overlap), fw), rw), score)| {
            let fw_primer = Primer::try_new(
                &solver.sequence,
                Direction::Forward,
                fw.offset,
                fw.length,
            )?;
            let rw_primer = Primer::try_new(
                &solver.sequence,
                Direction::Reverse,
                rw.offset + rw.length - 1,
                rw.length,
            )?;
            Ok(PrimerPair {
                mutation: mutation.clone(),
                forward: MutagenicPrimer {
                    primer: fw_primer,
                    three_end_size: fw.three_end_size,
                    three_end_temp: fw.three_end_temp,
                },
                reverse: MutagenicPrimer {
                    primer: rw_primer,
                    three_end_size: rw.three_end_size,
                    three_end_temp: rw.three_end_temp,
                },
                overlap_length: overlap.length,
                overlap_temp: overlap.three_end_temp,
                non_optimality: *score,
            })
        })
        .collect()
}

/// Entry point for the SSM workflow.
pub fn ssm_solve(input: &SsmInput) -> MakerResult<SsmOutput> {
    let solver = SsmSolver::new(&input.sequences, input.config.clone())?;
    let mutations = input.parse_mutations(solver.goi_offset())?;
    if mutations.is_empty() {
        return Err(MakerError::InvalidMutationString(
            "no mutations given".to_string(),
        ));
    }
    info!(
        "SSM solving {} mutations: {}",
        mutations.len(),
        mutations.iter().join(",")
    );

    if input.config.use_fast_approximation_algorithm {
        let solution = solver.solve_fast(&mutations)?;
        let pairs =
            grown_solution_to_pairs(&solver, &mutations, &solution)?;
        let temps = ReactionTemps {
            forward: solution.forward_temp_range,
            reverse: solution.reverse_temp_range,
            overlap: solution.overlap_temp_range,
        };
        Ok(build_output(input, &solver, &pairs, &temps))
    } else {
        let (_, solved) = solver.solve_enumerated(&mutations)?;
        Ok(build_output(input, &solver, &solved.pairs, &solved.temps))
    }
}

#[cfg(test)]
mod ssm_tests {
    use super::*;
    use crate::ssm::types::{SsmConfig, SsmInput, SsmSequences};

    fn gene(len: usize) -> String {
        let unit = "ATGGCTAGCGTTCAAGGCCTAACGGATCGATTGCCA";
        unit.repeat(len / unit.len() + 1)[..len].to_string()
    }

    fn test_input(mutations: Vec<&str>) -> SsmInput {
        let goi = gene(600);
        SsmInput {
            sequences: SsmSequences {
                forward_primer: goi[..20].to_string(),
                reverse_primer: crate::dna::reverse_complement(
                    &goi[goi.len() - 20..],
                ),
                gene_of_interest: goi[100..500].to_string(),
                five_end_flanking_sequence: Some(goi[..100].to_string()),
                three_end_flanking_sequence: Some(goi[500..].to_string()),
                plasmid: None,
            },
            config: SsmConfig::default(),
            mutations: mutations
                .into_iter()
                .map(|m| m.to_string())
                .collect(),
            degenerate_codon: "NNS".to_string(),
        }
    }

    #[test]
    fn test_fast_solution_overlap_invariants() {
        let input = test_input(vec!["M40K"]);
        let output = ssm_solve(&input).unwrap();
        assert_eq!(output.results.len(), 1);
        let result = &output.results[0];
        let config = &input.config;
        assert!(
            result.overlap.length >= config.min_overlap_size
                && result.overlap.length <= config.max_overlap_size,
            "overlap length {} out of range",
            result.overlap.length
        );
        // forward and reverse overlap substrings are exact reverse
        // complements: the reverse output sequence is reported on the
        // opposite strand
        let fw = &result.forward_primer;
        let rv = &result.reverse_primer;
        assert_eq!(fw.direction, "forward");
        assert_eq!(rv.direction, "reverse");
        assert_eq!(
            rv.sequence,
            crate::dna::reverse_complement(&rv.normal_order_sequence)
        );
    }

    #[test]
    fn test_mutated_codon_is_spliced() {
        let input = test_input(vec!["M40K"]);
        let output = ssm_solve(&input).unwrap();
        let fw = &output.results[0].forward_primer;
        // mutation position within the trimmed output window
        let mutation_pos = (40 - 1) * 3 + output.goi_offset as isize;
        let primer_relative = mutation_pos - fw.normal_order_start;
        assert!(primer_relative >= 0);
        let codon = &fw.normal_order_sequence
            [primer_relative as usize..primer_relative as usize + 3];
        assert_eq!(codon, "NNS");
    }

    #[test]
    fn test_mutation_outside_window_rejected() {
        let input = test_input(vec!["M400K"]);
        assert!(ssm_solve(&input).is_err());
    }
}
