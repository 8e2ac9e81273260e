//! Per-fragment oligo-mixture synthesis: expand the mutations carried by
//! a fragment into a cartesian product of per-site codon options with
//! mixing ratios, avoiding forbidden motifs.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use rand::rngs::StdRng;
use regex::Regex;

use crate::codon::DegenerateCodon;
use crate::codon_usage::CodonUsage;
use crate::degeneracy::{random_codon, solve_set_cover};
use crate::dna::splice;
use crate::errs::{MakerError, MakerResult};
use crate::motifs::{any_motif_matches, compile_motifs};
use crate::pas::fragment::PasFragment;
use crate::pas::{PasConfig, PasMutationSite};

// Cap on accepted draws before picking the smallest mixture.
const MAX_ACCEPTED_SOLUTIONS: usize = 100;
// Budget for the optional per-site degeneracy merge.
const DEGENERACY_BUDGET: Duration = Duration::from_secs(5);

// The wild-type row key when the template codon translates to a stop.
const STOP_AMINO: char = '*';

#[derive(Debug, Clone, PartialEq)]
pub struct PasOligo {
    pub sequence: String,
    pub ratio: f64,
}

/// One parsed mutation atom: (1-based amino position, target amino or
/// codon, requested frequency).
type MutationAtom = (usize, String, f64);

pub(crate) struct OligoGenerator<'a> {
    config: &'a PasConfig,
    usage: &'static CodonUsage,
    motifs: Vec<Regex>,
    is_mutations_as_codons: bool,
}

impl<'a> OligoGenerator<'a> {
    pub(crate) fn new(
        config: &'a PasConfig,
        is_mutations_as_codons: bool,
    ) -> MakerResult<Self> {
        Ok(Self {
            config,
            usage: CodonUsage::for_organism(&config.organism)?,
            motifs: compile_motifs(&config.avoided_motifs)?,
            is_mutations_as_codons,
        })
    }

    fn parse_atoms(
        &self,
        mutations: &[PasMutationSite],
    ) -> Vec<MutationAtom> {
        let mut atoms = Vec::new();
        for site in mutations {
            for mutation in &site.mutations {
                let atom = if self.is_mutations_as_codons {
                    let codon =
                        mutation.mutation.chars().take(3).collect();
                    (site.position, codon, mutation.frequency)
                } else {
                    (
                        site.position,
                        mutation.mutation.clone(),
                        mutation.frequency,
                    )
                };
                atoms.push(atom);
            }
        }
        atoms
    }

    fn atoms_on_fragment(
        &self,
        atoms: Vec<MutationAtom>,
        fragment: &PasFragment,
        goi_offset: usize,
    ) -> Vec<MutationAtom> {
        atoms
            .into_iter()
            .filter(|(position, _, _)| {
                let codon_start = goi_offset + (position - 1) * 3;
                codon_start >= fragment.start
                    && codon_start + 2 <= fragment.end()
            })
            .collect()
    }

    fn wild_type_codon(
        position: usize,
        fragment_dna: &str,
        fragment_start: usize,
        goi_offset: usize,
    ) -> String {
        let relative = 3 * (position - 1) + goi_offset - fragment_start;
        fragment_dna[relative..relative + 3].to_string()
    }

    fn decode_first_amino(&self, codon: &str) -> char {
        DegenerateCodon::parse_str(codon)
            .map(|c| c.to_aminos(self.usage))
            .ok()
            .and_then(|aminos| aminos.first().copied())
            .unwrap_or(STOP_AMINO)
    }

    /// Merge equal-probability aminos at one site into a degenerate
    /// codon when the set cover shrinks the codon count.
    fn merge_degenerate(
        &self,
        codons: &mut IndexMap<char, String>,
        probabilities: &mut IndexMap<char, f64>,
        rng: &mut StdRng,
    ) -> MakerResult<()> {
        let groups = probabilities
            .iter()
            .map(|(amino, prob)| (*prob, *amino))
            .into_group_map_by(|(prob, _)| prob.to_bits())
            .into_values()
            .map(|members| {
                members
                    .into_iter()
                    .map(|(_, amino)| amino)
                    .collect::<Vec<char>>()
            })
            .filter(|aminos| {
                aminos.len() >= 2 && !aminos.contains(&STOP_AMINO)
            })
            .collect::<Vec<Vec<char>>>();

        for aminos in groups {
            let deadline = Instant::now() + DEGENERACY_BUDGET;
            let Some(cover) = solve_set_cover(
                &aminos,
                self.usage,
                self.config.codon_usage_frequency_threshold,
                rng,
                deadline,
            )?
            else {
                continue;
            };
            if cover.len() >= aminos.len() {
                continue;
            }
            for (degenerate, covered) in cover.iter() {
                if covered.len() < 2 {
                    continue;
                }
                let keeper = covered[0];
                let shared = probabilities[&keeper];
                *probabilities.get_mut(&keeper).unwrap() =
                    shared * covered.len() as f64;
                for amino in &covered[1..] {
                    probabilities.shift_remove(amino);
                    codons.shift_remove(amino);
                }
                codons.insert(keeper, degenerate.to_string());
            }
        }
        Ok(())
    }

    /// One randomised draw of the full oligo mixture for a fragment.
    fn generate_solution(
        &self,
        fragment_dna: &str,
        atoms: &[MutationAtom],
        fragment_start: usize,
        goi_offset: usize,
        rng: &mut StdRng,
    ) -> MakerResult<Vec<PasOligo>> {
        let sites: Vec<usize> = atoms
            .iter()
            .map(|(position, _, _)| *position)
            .unique()
            .sorted()
            .collect();

        let mut options_per_site: Vec<IndexMap<char, f64>> = Vec::new();
        let mut codons_per_site: Vec<IndexMap<char, String>> =
            Vec::new();

        for site in &sites {
            let mut codons: IndexMap<char, String> = IndexMap::new();
            let mut probabilities: IndexMap<char, f64> = IndexMap::new();
            for (position, target, frequency) in atoms {
                if position != site {
                    continue;
                }
                if self.is_mutations_as_codons {
                    let amino = self.decode_first_amino(target);
                    codons.insert(amino, target.clone());
                    probabilities.insert(amino, *frequency);
                } else {
                    let amino = target
                        .chars()
                        .next()
                        .ok_or_else(|| {
                            MakerError::InvalidAmino(target.clone())
                        })?;
                    let codon = random_codon(
                        self.usage,
                        self.config.codon_usage_frequency_threshold,
                        amino,
                        rng,
                    )?;
                    codons.insert(amino, codon.to_string());
                    probabilities.insert(amino, *frequency);
                }
            }

            let total: f64 = probabilities.values().sum();
            if total < 1.0 {
                let wt_codon = Self::wild_type_codon(
                    *site,
                    fragment_dna,
                    fragment_start,
                    goi_offset,
                );
                let wt_amino = self
                    .usage
                    .translate(&wt_codon)
                    .unwrap_or(STOP_AMINO);
                codons.insert(wt_amino, wt_codon);
                probabilities.insert(wt_amino, 1.0 - total);
            }

            if self.config.use_degeneracy_codon {
                self.merge_degenerate(
                    &mut codons,
                    &mut probabilities,
                    rng,
                )?;
            }

            options_per_site.push(probabilities);
            codons_per_site.push(codons);
        }

        let mut oligos = Vec::new();
        for combination in options_per_site
            .iter()
            .map(|options| options.iter().collect::<Vec<_>>())
            .multi_cartesian_product()
        {
            let mut sequence = fragment_dna.to_string();
            let mut ratio = 1f64;
            for (index, (amino, probability)) in
                combination.iter().enumerate()
            {
                let codon = &codons_per_site[index][*amino];
                let relative = 3 * (sites[index] - 1) + goi_offset
                    - fragment_start;
                sequence = splice(&sequence, relative, codon);
                ratio *= **probability;
            }
            oligos.push(PasOligo { sequence, ratio });
        }
        if oligos.is_empty() {
            oligos.push(PasOligo {
                sequence: fragment_dna.to_string(),
                ratio: 1.0,
            });
        }
        Ok(oligos)
    }

    /// Generate up to `draws` mixtures and keep the motif-free one with
    /// the fewest oligos. Exhausting the draw budget without a single
    /// motif-free mixture is a hard failure.
    pub(crate) fn generate(
        &self,
        fragment_dna: &str,
        mutations: &[PasMutationSite],
        fragment: &PasFragment,
        goi_offset: usize,
        draws: usize,
        rng: &mut StdRng,
    ) -> MakerResult<Vec<PasOligo>> {
        let atoms = self.atoms_on_fragment(
            self.parse_atoms(mutations),
            fragment,
            goi_offset,
        );
        if atoms.is_empty() {
            return Ok(vec![PasOligo {
                sequence: fragment_dna.to_string(),
                ratio: 1.0,
            }]);
        }

        let mut accepted: Vec<Vec<PasOligo>> = Vec::new();
        for draw in 0..draws {
            let solution = self.generate_solution(
                fragment_dna,
                &atoms,
                fragment.start,
                goi_offset,
                rng,
            )?;
            let motif_hit = solution.iter().any(|oligo| {
                any_motif_matches(&self.motifs, &oligo.sequence)
            });
            if !motif_hit {
                accepted.push(solution);
            }
            if accepted.len() >= MAX_ACCEPTED_SOLUTIONS {
                debug!("oligo draw budget met after {draw} draws");
                break;
            }
        }

        accepted
            .into_iter()
            .min_by_key(|solution| solution.len())
            .ok_or(MakerError::MotifAvoidanceExhausted)
    }
}

#[cfg(test)]
mod pas_oligos_tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;

    use super::*;
    use crate::pas::{PasConfig, PasMutation};

    fn fragment_and_dna() -> (PasFragment, String) {
        let unit = "ATGGCTAGCGTTCAAGGCCTAACGGATCGATTGCCA";
        let dna = unit.repeat(3)[..90].to_string();
        (PasFragment::new(vec![9], 0, 90), dna)
    }

    fn site(position: usize, aminos: &[(&str, f64)]) -> PasMutationSite {
        PasMutationSite {
            position,
            mutations: aminos
                .iter()
                .map(|(m, f)| PasMutation {
                    mutation: m.to_string(),
                    frequency: *f,
                })
                .collect(),
        }
    }

    #[test]
    fn test_ratios_sum_to_one_and_wild_type_present() {
        let config = PasConfig::default();
        let generator = OligoGenerator::new(&config, false).unwrap();
        let (fragment, dna) = fragment_and_dna();
        let mutations =
            vec![site(4, &[("K", 0.25), ("L", 0.25)])];
        let mut rng = StdRng::seed_from_u64(42);
        let oligos = generator
            .generate(&dna, &mutations, &fragment, 0, 50, &mut rng)
            .unwrap();
        let total: f64 = oligos.iter().map(|o| o.ratio).sum();
        assert_approx_eq!(total, 1.0, 1e-9);
        // one wild-type-everywhere oligo equal to the fragment sequence
        let wild_type = oligos
            .iter()
            .filter(|o| o.sequence == dna)
            .collect::<Vec<_>>();
        assert_eq!(wild_type.len(), 1);
        assert_approx_eq!(wild_type[0].ratio, 0.5, 1e-9);
    }

    #[test]
    fn test_codon_mutations_are_spliced_verbatim() {
        let config = PasConfig::default();
        let generator = OligoGenerator::new(&config, true).unwrap();
        let (fragment, dna) = fragment_and_dna();
        let mutations = vec![site(4, &[("AAA", 1.0)])];
        let mut rng = StdRng::seed_from_u64(7);
        let oligos = generator
            .generate(&dna, &mutations, &fragment, 0, 50, &mut rng)
            .unwrap();
        assert_eq!(oligos.len(), 1);
        assert_eq!(&oligos[0].sequence[9..12], "AAA");
        assert_approx_eq!(oligos[0].ratio, 1.0, 1e-9);
    }

    #[test]
    fn test_unavoidable_motif_fails() {
        let mut config = PasConfig::default();
        // N matches everything, so every draw is rejected
        config.avoided_motifs = vec!["N".to_string()];
        let generator = OligoGenerator::new(&config, false).unwrap();
        let (fragment, dna) = fragment_and_dna();
        let mutations = vec![site(4, &[("K", 0.5)])];
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            generator.generate(
                &dna, &mutations, &fragment, 0, 10, &mut rng
            ),
            Err(MakerError::MotifAvoidanceExhausted)
        );
    }
}
