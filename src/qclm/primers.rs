//! The shared primer store for the QCLM/MSDM search: minimal primers per
//! (site sequence, codon tuple, start offset), grown 3'-wards against a
//! temperature threshold.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;

use crate::dna::CODON_LENGTH;
use crate::primer::{MutagenesisDna, PrimerSpec};
use crate::qclm::site_split::{SiteSequence, SiteSplits};
use crate::qclm::QclmConfig;
use crate::thermo::TemperatureCalculator;

/// Primers with their mismatch-sequence melting temperatures, indexed by
/// codon tuple for best-primer collection.
#[derive(Debug, Default)]
pub(crate) struct PrimersAndTemps {
    primers: IndexMap<PrimerSpec, f64>,
    by_codons: FxHashMap<Vec<String>, IndexSet<PrimerSpec>>,
}

impl PrimersAndTemps {
    fn add_or_update(&mut self, primer: PrimerSpec, tm: f64) {
        self.by_codons
            .entry(primer.codons.clone())
            .or_default()
            .insert(primer.clone());
        self.primers.insert(primer, tm);
    }

    fn remove(&mut self, primer: &PrimerSpec) {
        if let Some(specs) = self.by_codons.get_mut(&primer.codons) {
            specs.shift_remove(primer);
        }
        self.primers.shift_remove(primer);
    }

    pub(crate) fn iter(
        &self,
    ) -> impl Iterator<Item = (&PrimerSpec, f64)> + '_ {
        self.primers.iter().map(|(spec, tm)| (spec, *tm))
    }

    pub(crate) fn get_by_codons(
        &self,
        codons: &[String],
    ) -> Vec<(PrimerSpec, f64)> {
        self.by_codons
            .get(codons)
            .map(|specs| {
                specs
                    .iter()
                    .filter_map(|spec| {
                        self.primers
                            .get(spec)
                            .map(|tm| (spec.clone(), *tm))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn count(&self) -> usize {
        self.primers.len()
    }
}

pub(crate) struct QclmPrimers<'a> {
    base: &'a MutagenesisDna,
    config: &'a QclmConfig,
    calculator: &'a TemperatureCalculator,
    primer_defs: IndexMap<SiteSequence, IndexSet<Vec<String>>>,
    primers: IndexMap<SiteSequence, PrimersAndTemps>,
}

impl<'a> QclmPrimers<'a> {
    pub(crate) fn new(
        splits: &SiteSplits,
        base: &'a MutagenesisDna,
        config: &'a QclmConfig,
        calculator: &'a TemperatureCalculator,
    ) -> Self {
        let mut primer_defs = IndexMap::new();
        let mut primers = IndexMap::new();
        for sequence in splits.site_sequences() {
            primer_defs.insert(sequence.clone(), IndexSet::new());
            primers.insert(sequence.clone(), PrimersAndTemps::default());
        }
        Self { base, config, calculator, primer_defs, primers }
    }

    pub(crate) fn primer_defs(
        &self,
        site_sequence: &SiteSequence,
    ) -> impl Iterator<Item = &Vec<String>> + '_ {
        self.primer_defs
            .get(site_sequence)
            .into_iter()
            .flat_map(|defs| defs.iter())
    }

    pub(crate) fn primers(
        &self,
        site_sequence: &SiteSequence,
    ) -> Option<&PrimersAndTemps> {
        self.primers.get(site_sequence)
    }

    pub(crate) fn site_sequences_sorted(&self) -> Vec<SiteSequence> {
        let mut sequences =
            self.primers.keys().cloned().collect::<Vec<SiteSequence>>();
        sequences.sort_by_key(|s| s[0]);
        sequences
    }

    /// [min, max) offset range occupied by the stored primers of a site
    /// sequence.
    pub(crate) fn range(
        &self,
        site_sequence: &SiteSequence,
    ) -> (usize, usize) {
        let mut min_start = usize::MAX;
        let mut max_limit = 0usize;
        if let Some(primers) = self.primers.get(site_sequence) {
            for (spec, _) in primers.iter() {
                min_start = std::cmp::min(min_start, spec.offset);
                max_limit = std::cmp::max(max_limit, spec.end());
            }
        }
        (min_start, max_limit)
    }

    /// Add the minimum-length primer for every admissible start offset of
    /// a codon tuple: the 5' arm respects the configured bounds and the
    /// previous mutation's codon, the 3' arm starts at its minimum size.
    pub(crate) fn add_minimal_primers(
        &mut self,
        site_sequence: &SiteSequence,
        codons: &[String],
        min_start: usize,
    ) {
        debug_assert!(self.primer_defs.contains_key(site_sequence));
        self.primer_defs
            .get_mut(site_sequence)
            .expect("site sequence registered")
            .insert(codons.to_vec());

        let first_site = site_sequence[0];
        let last_site = *site_sequence.last().unwrap();
        let site_offsets = &self.base.mutation_sites;
        let first_index = site_offsets
            .iter()
            .position(|o| *o == first_site)
            .expect("site sequence is drawn from the template sites");
        let last_index = site_offsets
            .iter()
            .position(|o| *o == last_site)
            .expect("site sequence is drawn from the template sites");

        let mut min_primer_offset = std::cmp::max(
            first_site
                .saturating_sub(self.config.max_five_end_size),
            min_start,
        );
        if first_index > 0 {
            min_primer_offset = std::cmp::max(
                min_primer_offset,
                site_offsets[first_index - 1] + CODON_LENGTH,
            );
        }
        let max_primer_offset =
            match first_site.checked_sub(self.config.min_five_end_size) {
                Some(offset) => offset,
                None => return,
            };

        for start in min_primer_offset..=max_primer_offset {
            let mut length = (last_site + CODON_LENGTH
                + self.config.min_three_end_size)
                - start;
            length = std::cmp::max(length, self.config.min_primer_size);
            if length > self.config.max_primer_size {
                continue;
            }
            if let Some(next_site) = site_offsets.get(last_index + 1) {
                if start + length > *next_site {
                    break;
                }
            }
            if start + length > self.base.len() {
                break;
            }

            let spec = PrimerSpec::new(start, length, codons.to_vec());
            let tm = self
                .calculator
                .duplex_tm(&spec.mismatch_sequence(self.base));
            self.primers
                .get_mut(site_sequence)
                .expect("site sequence registered")
                .add_or_update(spec, tm);
        }
    }

    fn primer_fits(
        &self,
        spec: &PrimerSpec,
        site_sequence: &SiteSequence,
        end_limit: usize,
    ) -> bool {
        if spec.end() >= end_limit {
            return false;
        }
        if spec.end() > self.base.len() {
            return false;
        }
        if spec.length > self.config.max_primer_size {
            return false;
        }

        let first_site = site_sequence[0];
        let last_site = *site_sequence.last().unwrap();
        let five_end_size = first_site as isize - spec.offset as isize;
        let three_end_size =
            spec.end() as isize - (last_site + CODON_LENGTH) as isize;
        if three_end_size > self.config.max_three_end_size as isize
            || five_end_size > self.config.max_five_end_size as isize
        {
            return false;
        }

        // a primer that cuts into a neighbouring mutated codon would
        // need a codon it does not carry
        let sites_covered = self
            .base
            .mutation_sites
            .iter()
            .filter(|o| {
                **o + CODON_LENGTH > spec.offset && **o < spec.end()
            })
            .count();
        sites_covered == spec.codons.len()
    }

    /// Grow each stored primer at the 3' end, one base at a time, until
    /// its mismatch-sequence Tm reaches the threshold. Growth stops one
    /// base short of any violated constraint.
    pub(crate) fn grow(&mut self, temp_threshold: f64) {
        let sequences = self.site_sequences_sorted();

        for (index, site_sequence) in sequences.iter().enumerate() {
            let end_limit = if self.config.non_overlapping_primers
                && index + 1 < sequences.len()
            {
                self.range(&sequences[index + 1]).0
            } else {
                usize::MAX
            };

            let snapshot: Vec<(PrimerSpec, f64)> = self
                .primers
                .get(site_sequence)
                .expect("site sequence registered")
                .iter()
                .map(|(spec, tm)| (spec.clone(), tm))
                .collect();

            for (spec, tm) in snapshot {
                if tm >= temp_threshold {
                    continue;
                }
                let last_site = *site_sequence.last().unwrap();
                let min_three_ok = |candidate: &PrimerSpec| {
                    candidate.end() as isize
                        - (last_site + CODON_LENGTH) as isize
                        >= self.config.min_three_end_size as isize
                };

                let mut grown = spec.clone();
                let mut grown_tm = tm;
                loop {
                    let candidate = PrimerSpec::new(
                        grown.offset,
                        grown.length + 1,
                        grown.codons.clone(),
                    );
                    if !self.primer_fits(
                        &candidate,
                        site_sequence,
                        end_limit,
                    ) {
                        break;
                    }
                    grown_tm = self.calculator.duplex_tm(
                        &candidate.mismatch_sequence(self.base),
                    );
                    grown = candidate;
                    if grown_tm >= temp_threshold && min_three_ok(&grown)
                    {
                        break;
                    }
                }

                if grown != spec {
                    let store = self
                        .primers
                        .get_mut(site_sequence)
                        .expect("site sequence registered");
                    store.remove(&spec);
                    store.add_or_update(grown, grown_tm);
                }
            }
        }
    }
}

#[cfg(test)]
mod qclm_primers_tests {
    use itertools::Itertools;

    use super::*;
    use crate::mutation::{
        group_mutations, parse_amino_mutation, MutationSite,
    };
    use crate::qclm::site_split::enumerate_site_splits;
    use crate::thermo::TemperatureConfig;

    fn template(len: usize) -> String {
        let unit = "ATGGCTAGCGTTCAAGGCCTAACGGATCGATTGCCA";
        unit.repeat(len / unit.len() + 1)[..len].to_string()
    }

    fn sites(mutations: &[&str]) -> Vec<MutationSite> {
        group_mutations(
            mutations
                .iter()
                .map(|m| parse_amino_mutation(m, 0).unwrap())
                .collect_vec(),
        )
        .unwrap()
    }

    #[test]
    fn test_minimal_primers_cover_constraints() {
        let config = QclmConfig::default();
        let calculator =
            TemperatureConfig::default().create_calculator();
        let mutations = sites(&["E30W"]);
        let splits = enumerate_site_splits(
            &mutations,
            config.max_primer_size,
            config.min_five_end_size,
            config.min_three_end_size,
        )
        .unwrap();
        let base = MutagenesisDna::new(
            template(400),
            mutations.iter().map(|m| m.position).collect_vec(),
        );
        let mut primers =
            QclmPrimers::new(&splits, &base, &config, &calculator);
        let sequence = vec![mutations[0].position];
        primers.add_minimal_primers(
            &sequence,
            &["TGG".to_string()],
            0,
        );
        let stored = primers.primers(&sequence).unwrap();
        assert!(stored.count() > 0);
        for (spec, _) in stored.iter() {
            let five = mutations[0].position - spec.offset;
            assert!(five >= config.min_five_end_size);
            assert!(five <= config.max_five_end_size);
            assert!(spec.length >= config.min_primer_size);
            assert!(spec.length <= config.max_primer_size);
        }
    }

    #[test]
    fn test_grow_reaches_threshold() {
        let config = QclmConfig::default();
        let calculator =
            TemperatureConfig::default().create_calculator();
        let mutations = sites(&["E30W"]);
        let splits = enumerate_site_splits(
            &mutations,
            config.max_primer_size,
            config.min_five_end_size,
            config.min_three_end_size,
        )
        .unwrap();
        let base = MutagenesisDna::new(
            template(400),
            mutations.iter().map(|m| m.position).collect_vec(),
        );
        let mut primers =
            QclmPrimers::new(&splits, &base, &config, &calculator);
        let sequence = vec![mutations[0].position];
        primers.add_minimal_primers(&sequence, &["TGG".to_string()], 0);
        primers.grow(70.0);
        let stored = primers.primers(&sequence).unwrap();
        let mut reached = 0usize;
        for (spec, tm) in stored.iter() {
            assert!(spec.length <= config.max_primer_size);
            if tm >= 70.0 {
                reached += 1;
            }
        }
        assert!(reached > 0, "no primer reached the threshold");
    }
}
