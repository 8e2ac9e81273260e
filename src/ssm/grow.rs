//! The fast-approximation SSM search: greedy overlap selection per
//! mutation followed by one-base-at-a-time primer growth until the 3'
//! melting temperature crosses the reaction threshold.

use rayon::prelude::*;

use crate::dna::gc_overflow;
use crate::errs::{MakerError, MakerResult};
use crate::mutation::AminoMutation;
use crate::ssm::types::{MinOptMax, SsmConfig, SsmPrimerSpec};
use crate::thermo::{StructureCalculator, TemperatureCalculator};

#[derive(Debug, Clone, Default)]
pub struct SsmFlankingSequences {
    pub forward_flank: Option<String>,
    pub reverse_flank: Option<String>,
}

/// For each mutation choose one overlap window whose Tm is closest to the
/// target, preferring the first window that lands within half the allowed
/// range. Overlaps must cover the mutated codon with at least the minimum
/// 5' margin on both sides.
pub fn find_best_overlaps(
    sequence: &str,
    min_five_end_size: usize,
    min_overlap_size: usize,
    max_overlap_size: usize,
    mutations: &[AminoMutation],
    overlap_temp: f64,
    calculator: &TemperatureCalculator,
    half_temp_range: f64,
) -> MakerResult<Vec<SsmPrimerSpec>> {
    mutations
        .par_iter()
        .map(|mutation| {
            best_overlap_for_mutation(
                sequence,
                min_five_end_size,
                min_overlap_size,
                max_overlap_size,
                mutation,
                overlap_temp,
                calculator,
                half_temp_range,
            )
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn best_overlap_for_mutation(
    sequence: &str,
    min_five_end_size: usize,
    min_overlap_size: usize,
    max_overlap_size: usize,
    mutation: &AminoMutation,
    overlap_temp: f64,
    calculator: &TemperatureCalculator,
    half_temp_range: f64,
) -> MakerResult<SsmPrimerSpec> {
    let mutation_end = mutation.end() as isize;
    let position = mutation.position as isize;
    let mut best: Option<SsmPrimerSpec> = None;

    'lengths: for length in min_overlap_size..max_overlap_size {
        let length_i = length as isize;
        for offset in (mutation_end - length_i)..(position - 1) {
            if offset < 0 || (offset + length_i) as usize > sequence.len() {
                continue;
            }
            // both primer arms need room to anneal beyond the codon
            let too_short_right = offset + length_i
                <= mutation_end + min_five_end_size as isize;
            let too_short_left =
                offset + min_five_end_size as isize >= position;
            if too_short_right || too_short_left {
                continue;
            }

            let offset = offset as usize;
            let tm = calculator.duplex_tm(&sequence[offset..offset + length]);
            let closer = best
                .map(|b| {
                    (tm - overlap_temp).abs()
                        < (b.three_end_temp - overlap_temp).abs()
                })
                .unwrap_or(true);
            if closer {
                best = Some(SsmPrimerSpec {
                    offset,
                    length,
                    three_end_size: 0,
                    three_end_temp: tm,
                });
            }
            if let Some(b) = best {
                if (b.three_end_temp - overlap_temp).abs() < half_temp_range
                {
                    break 'lengths;
                }
            }
        }
    }

    best.ok_or(MakerError::NoOverlapWindow)
}

/// Grow a forward primer 3'-wards from an overlap until its 3' Tm crosses
/// the threshold, bounded by the maximum primer size and sequence end.
pub fn grow_forward_primer(
    max_primer_size: usize,
    min_three_end_size: usize,
    sequence: &str,
    mutation: &AminoMutation,
    overlap: &SsmPrimerSpec,
    temp_threshold: f64,
    calculator: &TemperatureCalculator,
) -> SsmPrimerSpec {
    let mutation_end = mutation.end();
    let mut grown = SsmPrimerSpec {
        offset: overlap.offset,
        length: overlap.length,
        three_end_size: 0,
        three_end_temp: f64::NEG_INFINITY,
    };

    for length in (overlap.length + 1)..max_primer_size {
        if overlap.offset + length > sequence.len() {
            break;
        }
        let three_end_size = (overlap.offset + length) - mutation_end;
        let three_end =
            &sequence[mutation_end..mutation_end + three_end_size];
        let three_end_temp = calculator.duplex_tm(three_end);

        grown = SsmPrimerSpec {
            offset: overlap.offset,
            length,
            three_end_size,
            three_end_temp,
        };
        if three_end_temp > temp_threshold
            && three_end_size >= min_three_end_size
        {
            break;
        }
    }
    grown
}

/// Grow a reverse primer by stepping its template-side offset down from
/// the overlap start; its 3' end is the stretch before the mutation.
pub fn grow_reverse_primer(
    max_primer_size: usize,
    min_three_end_size: usize,
    sequence: &str,
    mutation: &AminoMutation,
    overlap: &SsmPrimerSpec,
    temp_threshold: f64,
    calculator: &TemperatureCalculator,
) -> SsmPrimerSpec {
    let overlap_end = overlap.offset + overlap.length;
    let min_offset = overlap_end.saturating_sub(max_primer_size);
    let mut grown = SsmPrimerSpec {
        offset: overlap.offset,
        length: overlap.length,
        three_end_size: 0,
        three_end_temp: f64::NEG_INFINITY,
    };

    for offset in (min_offset..overlap.offset).rev() {
        let three_end = &sequence[offset..mutation.position];
        let three_end_temp = calculator.duplex_tm(three_end);
        grown = SsmPrimerSpec {
            offset,
            length: overlap_end - offset,
            three_end_size: mutation.position - offset,
            three_end_temp,
        };
        if three_end_temp > temp_threshold
            && three_end.len() >= min_three_end_size
        {
            break;
        }
    }
    grown
}

pub fn grow_primers(
    max_primer_size: usize,
    min_three_end_size: usize,
    sequence: &str,
    mutations: &[AminoMutation],
    overlaps: &[SsmPrimerSpec],
    fw_temp_threshold: f64,
    rw_temp_threshold: f64,
    calculator: &TemperatureCalculator,
) -> (Vec<SsmPrimerSpec>, Vec<SsmPrimerSpec>) {
    let fw_primers = mutations
        .iter()
        .zip(overlaps.iter())
        .map(|(mutation, overlap)| {
            grow_forward_primer(
                max_primer_size,
                min_three_end_size,
                sequence,
                mutation,
                overlap,
                fw_temp_threshold,
                calculator,
            )
        })
        .collect();
    let rw_primers = mutations
        .iter()
        .zip(overlaps.iter())
        .map(|(mutation, overlap)| {
            grow_reverse_primer(
                max_primer_size,
                min_three_end_size,
                sequence,
                mutation,
                overlap,
                rw_temp_threshold,
                calculator,
            )
        })
        .collect();
    (fw_primers, rw_primers)
}

/// The reaction temperature that keeps the most primers within the
/// accepted band, scanned on a 0.1 degree grid over the observed Tms.
/// Primers that never grew report -inf and are excluded from the fit.
pub fn temp_with_most_in_range(temps: &[f64]) -> f64 {
    let finite =
        temps.iter().copied().filter(|t| t.is_finite()).collect::<Vec<f64>>();
    if finite.is_empty() {
        return 0f64;
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut best_temp = min;
    let mut best_count = 0usize;
    let mut candidate = min;
    while candidate <= max + 0.11 {
        let count =
            finite.iter().filter(|t| (*t - candidate).abs() < 2.5).count();
        if count > best_count {
            best_count = count;
            best_temp = candidate;
        }
        candidate += 0.1;
    }
    best_temp
}

/// A fully grown candidate solution for one temperature triple, with the
/// reconstructed optimal reaction temperatures.
#[derive(Debug, Clone)]
pub struct GrownSolution {
    pub overlaps: Vec<SsmPrimerSpec>,
    pub fw_primers: Vec<SsmPrimerSpec>,
    pub rw_primers: Vec<SsmPrimerSpec>,
    pub fw_temp: f64,
    pub rw_temp: f64,
    pub overlap_temp: f64,
    pub forward_temp_range: MinOptMax,
    pub reverse_temp_range: MinOptMax,
    pub overlap_temp_range: MinOptMax,
}

impl GrownSolution {
    pub fn new(
        overlaps: Vec<SsmPrimerSpec>,
        fw_primers: Vec<SsmPrimerSpec>,
        rw_primers: Vec<SsmPrimerSpec>,
    ) -> Self {
        let half_temp_range = 2.5;
        let fw_temps = fw_primers
            .iter()
            .map(|p| p.three_end_temp)
            .collect::<Vec<f64>>();
        let rw_temps = rw_primers
            .iter()
            .map(|p| p.three_end_temp)
            .collect::<Vec<f64>>();
        let overlap_temps = overlaps
            .iter()
            .map(|o| o.three_end_temp)
            .collect::<Vec<f64>>();

        // The growth threshold is a lower bound by construction, so the
        // reported reaction temperature is re-fitted to the actual Tms.
        let fw_temp = temp_with_most_in_range(&fw_temps);
        let rw_temp = temp_with_most_in_range(&rw_temps);
        let overlap_temp = temp_with_most_in_range(&overlap_temps);

        Self {
            overlaps,
            fw_primers,
            rw_primers,
            fw_temp,
            rw_temp,
            overlap_temp,
            forward_temp_range: MinOptMax::around(fw_temp, half_temp_range),
            reverse_temp_range: MinOptMax::around(rw_temp, half_temp_range),
            overlap_temp_range: MinOptMax::around(
                overlap_temp,
                half_temp_range,
            ),
        }
    }
}

fn heterodimer_err(
    fw_sequence: &str,
    rw_sequence: &str,
    solution: &GrownSolution,
    flanks: &SsmFlankingSequences,
    structures: &StructureCalculator,
) -> f64 {
    match (&flanks.forward_flank, &flanks.reverse_flank) {
        (Some(forward), Some(reverse)) => {
            let fw_err = structures.heterodimer_tm(fw_sequence, reverse)
                - solution.fw_temp;
            let rw_err = structures.heterodimer_tm(rw_sequence, forward)
                - solution.rw_temp;
            fw_err.powi(2) + rw_err.powi(2)
        }
        _ => 0f64,
    }
}

/// Per-mutation non-optimality of a grown solution: the root of the
/// weighted squared temperature, size and GC errors, plus the optional
/// structure penalty term.
pub fn compute_grown_solution_score(
    config: &SsmConfig,
    sequence: &str,
    solution: &GrownSolution,
    flanks: &SsmFlankingSequences,
    structures: &StructureCalculator,
) -> Vec<f64> {
    let mut scores = Vec::with_capacity(solution.fw_primers.len());
    let half_temp_range = config.three_end_temp_range / 2.0;

    for ((fw, rw), overlap) in solution
        .fw_primers
        .iter()
        .zip(solution.rw_primers.iter())
        .zip(solution.overlaps.iter())
    {
        let fw_sequence = &sequence[fw.offset..fw.offset + fw.length];
        let rw_sequence = &sequence[rw.offset..rw.offset + rw.length];

        let banded_sq = |tm: f64, target: f64| -> f64 {
            let err = (tm - target).abs();
            if err < half_temp_range {
                0f64
            } else {
                err.powi(2)
            }
        };
        let fw_temp_err = banded_sq(fw.three_end_temp, solution.fw_temp);
        let rw_temp_err = banded_sq(rw.three_end_temp, solution.rw_temp);
        let overlap_temp_err =
            banded_sq(overlap.three_end_temp, solution.overlap_temp);

        let fw_size_err =
            (fw.length as f64 - config.min_primer_size as f64).powi(2);
        let rw_size_err =
            (rw.length as f64 - config.min_primer_size as f64).powi(2);

        let gc_overflow_err = gc_overflow(
            fw_sequence,
            config.min_gc_content,
            config.max_gc_content,
        )
        .powi(2)
            + gc_overflow(
                rw_sequence,
                config.min_gc_content,
                config.max_gc_content,
            )
            .powi(2);

        let mut score = (config.three_end_temp_weight * fw_temp_err
            + config.three_end_temp_weight * rw_temp_err
            + config.overlap_temp_weight * overlap_temp_err
            + config.three_end_size_weight * fw_size_err
            + config.three_end_size_weight * rw_size_err
            + config.gc_content_weight * gc_overflow_err)
            .sqrt();

        if config.compute_hairpin_homodimer {
            let fw_hairpin_err = (solution.fw_temp
                - structures.hairpin_tm(fw_sequence))
            .powi(2);
            let rw_hairpin_err = (solution.rw_temp
                - structures.hairpin_tm(rw_sequence))
            .powi(2);
            let fw_homodimer_err = (solution.fw_temp
                - structures.homodimer_tm(fw_sequence))
            .powi(2);
            let rw_homodimer_err = (solution.rw_temp
                - structures.homodimer_tm(rw_sequence))
            .powi(2);
            let heterodimer_err = heterodimer_err(
                fw_sequence,
                rw_sequence,
                solution,
                flanks,
                structures,
            );
            score += (config.hairpin_temperature_weight * fw_hairpin_err
                + config.hairpin_temperature_weight * rw_hairpin_err
                + config.primer_dimer_temperature_weight * fw_homodimer_err
                + config.primer_dimer_temperature_weight * rw_homodimer_err
                + config.primer_dimer_temperature_weight * heterodimer_err)
                .sqrt();
        }

        scores.push(score);
    }
    scores
}

pub fn pick_best_grown_solution(
    config: &SsmConfig,
    sequence: &str,
    solutions: Vec<GrownSolution>,
    flanks: &SsmFlankingSequences,
) -> GrownSolution {
    let structures = StructureCalculator::from_temperature_config(
        &config.temperature_config,
    );
    solutions
        .into_iter()
        .map(|solution| {
            let total: f64 = compute_grown_solution_score(
                config, sequence, &solution, flanks, &structures,
            )
            .iter()
            .sum();
            (solution, total)
        })
        .min_by(|(_, a), (_, b)| {
            a.partial_cmp(b).expect("scores are finite")
        })
        .map(|(solution, _)| solution)
        .expect("at least one grown solution")
}

#[cfg(test)]
mod ssm_grow_tests {
    use super::*;
    use crate::mutation::parse_amino_mutation;
    use crate::thermo::TemperatureConfig;

    fn test_sequence() -> String {
        // deterministic mixed-GC sequence, 300 bp
        let unit = "ATGGCTAGCGTTCAAGGCCTAACGGATCGATTGCCA";
        unit.repeat(9)[..300].to_string()
    }

    #[test]
    fn test_overlap_covers_mutation_with_margin() {
        let sequence = test_sequence();
        let calc = TemperatureConfig::default().create_calculator();
        let mutation = parse_amino_mutation("A40L", 0).unwrap();
        let overlap = best_overlap_for_mutation(
            &sequence, 3, 33, 60, &mutation, 60.0, &calc, 2.5,
        )
        .unwrap();
        assert!(overlap.offset + 3 < mutation.position);
        assert!(
            overlap.offset + overlap.length > mutation.end() + 3,
            "overlap must extend past the codon"
        );
        assert!((33..60).contains(&overlap.length));
    }

    #[test]
    fn test_grow_forward_reaches_threshold_or_cap() {
        let sequence = test_sequence();
        let calc = TemperatureConfig::default().create_calculator();
        let mutation = parse_amino_mutation("A40L", 0).unwrap();
        let overlap = best_overlap_for_mutation(
            &sequence, 3, 33, 60, &mutation, 60.0, &calc, 2.5,
        )
        .unwrap();
        let fw = grow_forward_primer(
            60, 15, &sequence, &mutation, &overlap, 55.0, &calc,
        );
        assert!(fw.length <= 60);
        assert!(fw.three_end_size >= 15 || fw.length == 60 - 1);
        assert_eq!(fw.offset, overlap.offset);
    }

    #[test]
    fn test_grow_reverse_three_end_precedes_mutation() {
        let sequence = test_sequence();
        let calc = TemperatureConfig::default().create_calculator();
        let mutation = parse_amino_mutation("A40L", 0).unwrap();
        let overlap = best_overlap_for_mutation(
            &sequence, 3, 33, 60, &mutation, 60.0, &calc, 2.5,
        )
        .unwrap();
        let rw = grow_reverse_primer(
            60, 15, &sequence, &mutation, &overlap, 55.0, &calc,
        );
        assert!(rw.offset < overlap.offset);
        assert_eq!(
            rw.offset + rw.length,
            overlap.offset + overlap.length
        );
        assert_eq!(rw.three_end_size, mutation.position - rw.offset);
    }

    #[test]
    fn test_temp_with_most_in_range() {
        let temps = vec![58.0, 59.0, 60.0, 61.0, 80.0];
        let best = temp_with_most_in_range(&temps);
        assert!((58.0..=61.5).contains(&best), "got {best}");
    }
}
