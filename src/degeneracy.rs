//! Randomised set cover of an amino set by degenerate codons.
//!
//! Candidate degenerate codons are built as componentwise unions of random
//! concrete codons, one per amino, sampled proportionally to usage above a
//! frequency threshold. The most precise candidate wins each round and the
//! search recurses on the uncovered residual with a strictly smaller
//! combination size. The recursion is guarded by both a depth limit and a
//! wall-clock deadline; on exhaustion the caller falls back to per-amino
//! concrete codons.

use std::time::Instant;

use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::codon::DegenerateCodon;
use crate::codon_usage::CodonUsage;
use crate::dna::STOP_CODONS;
use crate::errs::MakerResult;

// Random codon unions drawn per candidate round.
const UNION_ROUNDS: usize = 50;
const MAX_RECURSION_DEPTH: usize = 24;

/// A degenerate codon set covering an amino set; the value union over the
/// map equals the requested aminos.
pub type DegeneracySolution = IndexMap<DegenerateCodon, Vec<char>>;

/// Draw a random concrete codon for an amino, weighted by usage among the
/// codons above the threshold.
pub fn random_codon(
    usage: &CodonUsage,
    threshold: f64,
    amino: char,
    rng: &mut StdRng,
) -> MakerResult<&'static str> {
    let candidates = usage.codons_above_threshold(amino, threshold)?;
    let weights =
        candidates.iter().map(|c| usage.usage(c)).collect::<Vec<f64>>();
    let dist = WeightedIndex::new(&weights)
        .expect("above-threshold usages are positive");
    Ok(candidates[dist.sample(rng)])
}

/// True when no concrete expansion of any codon in the solution is a stop.
pub fn contains_no_stop(solution: &DegeneracySolution) -> bool {
    solution.keys().all(|codon| {
        codon.expand().iter().all(|c| !STOP_CODONS.contains(&c.as_str()))
    })
}

/// One candidate round: union random picks for all aminos, keep the union
/// decoding to the fewest aminos, break ties by the largest product of
/// concrete-codon frequencies.
fn find_best_union(
    aminos: &[char],
    usage: &CodonUsage,
    threshold: f64,
    rng: &mut StdRng,
) -> MakerResult<(DegenerateCodon, Vec<char>)> {
    let mut candidates: IndexMap<DegenerateCodon, Vec<char>> =
        IndexMap::new();
    for _ in 0..UNION_ROUNDS {
        let picks = aminos
            .iter()
            .map(|a| random_codon(usage, threshold, *a, rng))
            .collect::<MakerResult<Vec<&'static str>>>()?;
        let parsed = picks
            .iter()
            .map(|c| DegenerateCodon::from_concrete(c))
            .collect::<MakerResult<Vec<DegenerateCodon>>>()?;
        let union = DegenerateCodon::union_all(parsed.iter());
        candidates.entry(union).or_insert_with(|| union.to_aminos(usage));
    }

    let fewest = candidates
        .values()
        .map(|aminos| aminos.len())
        .min()
        .expect("at least one candidate round ran");

    let (best, covered) = candidates
        .iter()
        .filter(|(_, aminos)| aminos.len() == fewest)
        .max_by(|(a, _), (b, _)| {
            let fa = usage.frequency_product(a.expand().iter());
            let fb = usage.frequency_product(b.expand().iter());
            fa.partial_cmp(&fb).expect("frequency products are finite")
        })
        .expect("non-empty candidate set");

    Ok((*best, covered.clone()))
}

fn per_amino_solution(
    aminos: &[char],
    usage: &CodonUsage,
    threshold: f64,
    rng: &mut StdRng,
) -> MakerResult<DegeneracySolution> {
    let mut solution = DegeneracySolution::new();
    for amino in aminos {
        let codon = random_codon(usage, threshold, *amino, rng)?;
        solution.insert(DegenerateCodon::from_concrete(codon)?, vec![*amino]);
    }
    Ok(solution)
}

fn solve_recursive(
    max_combination_size: usize,
    aminos: &[char],
    usage: &CodonUsage,
    threshold: f64,
    rng: &mut StdRng,
    deadline: Instant,
    depth: usize,
) -> MakerResult<Option<DegeneracySolution>> {
    if depth > MAX_RECURSION_DEPTH || Instant::now() > deadline {
        return Ok(None);
    }

    for size in (1..=max_combination_size).rev() {
        if size < 2 {
            return per_amino_solution(aminos, usage, threshold, rng)
                .map(Some);
        }
        for combination in aminos.iter().copied().combinations(size) {
            if Instant::now() > deadline {
                return Ok(None);
            }
            let (union, covered) =
                find_best_union(&combination, usage, threshold, rng)?;
            let mut solution = DegeneracySolution::new();
            solution.insert(union, covered);

            let residual = aminos
                .iter()
                .copied()
                .filter(|a| !combination.contains(a))
                .collect::<Vec<char>>();
            if !residual.is_empty() {
                match solve_recursive(
                    size, &residual, usage, threshold, rng, deadline,
                    depth + 1,
                )? {
                    Some(rest) => solution.extend(rest),
                    None => return Ok(None),
                }
            }

            let covered_union = solution
                .values()
                .flatten()
                .copied()
                .unique()
                .sorted()
                .collect::<Vec<char>>();
            let requested = aminos
                .iter()
                .copied()
                .unique()
                .sorted()
                .collect::<Vec<char>>();
            if covered_union == requested {
                return Ok(Some(solution));
            }
        }
    }
    Ok(None)
}

/// Cover an amino set with degenerate codons whose constituent concrete
/// codons all have usage above `threshold`. Returns `None` when no cover
/// was found within the deadline; the per-amino fallback is the caller's
/// decision because it also has to round-trip wild-type codons.
pub fn solve_set_cover(
    aminos: &[char],
    usage: &CodonUsage,
    threshold: f64,
    rng: &mut StdRng,
    deadline: Instant,
) -> MakerResult<Option<DegeneracySolution>> {
    let unique =
        aminos.iter().copied().unique().sorted().collect::<Vec<char>>();
    if unique.is_empty() {
        return Ok(Some(DegeneracySolution::new()));
    }
    let solution = solve_recursive(
        unique.len(),
        &unique,
        usage,
        threshold,
        rng,
        deadline,
        0,
    )?;
    if solution.is_none() {
        debug!(
            "degeneracy search exhausted for aminos {}",
            unique.iter().join(",")
        );
    }
    Ok(solution)
}

/// Fall back to one random concrete codon per amino.
pub fn fallback_per_amino(
    aminos: &[char],
    usage: &CodonUsage,
    threshold: f64,
    rng: &mut StdRng,
) -> MakerResult<DegeneracySolution> {
    let unique =
        aminos.iter().copied().unique().sorted().collect::<Vec<char>>();
    per_amino_solution(&unique, usage, threshold, rng)
}

#[cfg(test)]
mod degeneracy_tests {
    use std::time::Duration;

    use super::*;

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[test]
    fn test_cover_decodes_to_superset() {
        let usage = CodonUsage::for_organism("e-coli").unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let aminos = vec!['W', 'L', 'F', 'A'];
        let solution =
            solve_set_cover(&aminos, usage, 0.05, &mut rng, deadline())
                .unwrap()
                .expect("cover expected");

        let covered = solution
            .values()
            .flatten()
            .copied()
            .collect::<std::collections::HashSet<char>>();
        for amino in &aminos {
            assert!(covered.contains(amino), "missing {amino}");
        }
        // every constituent concrete codon is above the threshold
        for codon in solution.keys() {
            for concrete in codon.expand() {
                assert!(
                    usage.usage(&concrete) > 0.0,
                    "codon {concrete} unused"
                );
            }
        }
    }

    #[test]
    fn test_single_amino_is_concrete() {
        let usage = CodonUsage::for_organism("e-coli").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let solution =
            solve_set_cover(&['M'], usage, 0.05, &mut rng, deadline())
                .unwrap()
                .unwrap();
        assert_eq!(solution.len(), 1);
        let codon = solution.keys().next().unwrap();
        assert!(codon.is_concrete());
        assert_eq!(codon.to_string(), "ATG");
    }

    #[test]
    fn test_fallback_per_amino() {
        let usage = CodonUsage::for_organism("e-coli").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let solution =
            fallback_per_amino(&['K', 'E'], usage, 0.05, &mut rng).unwrap();
        assert_eq!(solution.len(), 2);
        for (codon, aminos) in solution.iter() {
            assert!(codon.is_concrete());
            assert_eq!(aminos.len(), 1);
            assert_eq!(
                usage.translate(&codon.to_string()),
                Some(aminos[0])
            );
        }
    }

    #[test]
    fn test_exhausted_deadline_returns_none() {
        let usage = CodonUsage::for_organism("e-coli").unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let past = Instant::now() - Duration::from_millis(1);
        let solution = solve_set_cover(
            &['W', 'L', 'F', 'A'],
            usage,
            0.05,
            &mut rng,
            past,
        )
        .unwrap();
        assert!(solution.is_none());
    }
}
