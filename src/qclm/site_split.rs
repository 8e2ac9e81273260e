//! Enumeration of ways to split the requested mutation sites into
//! position-disjoint runs that can each ride on a single primer.

use std::collections::HashSet;

use indexmap::IndexSet;

use crate::dna::CODON_LENGTH;
use crate::errs::{MakerError, MakerResult};
use crate::mutation::MutationSite;

/// A run of mutation-site offsets, sorted by position.
pub type SiteSequence = Vec<usize>;

/// A partition of all requested sites into disjoint site sequences.
pub type SiteSplit = Vec<SiteSequence>;

/// All enumerated site splits, plus the flat set of site sequences that
/// appear in any split so per-sequence primer search can be shared.
#[derive(Debug, Default)]
pub struct SiteSplits {
    splits: Vec<SiteSplit>,
    site_sequences: IndexSet<SiteSequence>,
}

impl SiteSplits {
    pub fn add(&mut self, split: SiteSplit) {
        for sequence in &split {
            self.site_sequences.insert(sequence.clone());
        }
        self.splits.push(split);
    }

    pub fn splits(&self) -> &[SiteSplit] {
        &self.splits
    }

    pub fn site_sequences(
        &self,
    ) -> impl Iterator<Item = &SiteSequence> + '_ {
        self.site_sequences.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    pub fn single(split: SiteSplit) -> Self {
        let mut this = Self::default();
        this.add(split);
        this
    }
}

/// The largest span a site sequence may cover so that one primer of at
/// most `max_primer_size` bases still leaves the minimum 5' and 3' arms.
fn max_sequence_span(
    max_primer_size: usize,
    min_five_end_size: usize,
    min_three_end_size: usize,
) -> isize {
    max_primer_size as isize
        - min_five_end_size as isize
        - min_three_end_size as isize
}

/// Per-anchor options: every run of consecutive sites containing the
/// anchor whose overall span fits within a single primer.
fn options_for_anchor(
    anchor: usize,
    positions: &[usize],
    span_limit: isize,
) -> Vec<SiteSequence> {
    let mut options = Vec::new();
    for first in 0..=anchor {
        for last in anchor..positions.len() {
            let span = (positions[last] + CODON_LENGTH) as isize
                - positions[first] as isize;
            if span <= span_limit {
                options.push(positions[first..=last].to_vec());
            }
        }
    }
    options
}

fn sequences_overlap(a: &SiteSequence, b: &SiteSequence) -> bool {
    a.iter().any(|site| b.contains(site))
}

fn combine_recursive(
    options: &[Vec<SiteSequence>],
    index: usize,
    partial: &mut Vec<SiteSequence>,
    total_sites: usize,
    seen: &mut HashSet<SiteSplit>,
    result: &mut SiteSplits,
) {
    if index == options.len() {
        let covered: usize = partial.iter().map(|s| s.len()).sum();
        if covered == total_sites {
            let mut split = partial.clone();
            split.sort();
            if seen.insert(split.clone()) {
                result.add(split);
            }
        }
        return;
    }
    for option in &options[index] {
        let disjoint =
            partial.iter().all(|s| !sequences_overlap(s, option));
        if disjoint {
            partial.push(option.clone());
            combine_recursive(
                options,
                index + 1,
                partial,
                total_sites,
                seen,
                result,
            );
            partial.pop();
        } else {
            // the anchor may already be covered by an earlier sequence
            combine_recursive(
                options,
                index + 1,
                partial,
                total_sites,
                seen,
                result,
            );
        }
    }
}

/// Enumerate all site splits: each mutation site anchors a set of
/// candidate runs, and the runs are combined into disjoint covers of the
/// full site set.
pub fn enumerate_site_splits(
    mutations: &[MutationSite],
    max_primer_size: usize,
    min_five_end_size: usize,
    min_three_end_size: usize,
) -> MakerResult<SiteSplits> {
    let positions =
        mutations.iter().map(|m| m.position).collect::<Vec<usize>>();
    let span_limit = max_sequence_span(
        max_primer_size,
        min_five_end_size,
        min_three_end_size,
    );

    let options = (0..positions.len())
        .map(|anchor| options_for_anchor(anchor, &positions, span_limit))
        .collect::<Vec<Vec<SiteSequence>>>();
    if options.iter().any(|o| o.is_empty()) {
        return Err(MakerError::EmptySiteSplit);
    }

    let mut result = SiteSplits::default();
    let mut seen = HashSet::new();
    combine_recursive(
        &options,
        0,
        &mut Vec::new(),
        positions.len(),
        &mut seen,
        &mut result,
    );
    if result.is_empty() {
        return Err(MakerError::EmptySiteSplit);
    }
    Ok(result)
}

#[cfg(test)]
mod site_split_tests {
    use itertools::Itertools;

    use super::*;
    use crate::mutation::{group_mutations, parse_amino_mutation};

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
    fn test_single_site_single_split() {
        let mutations = sites(&["E52W", "E52L"]);
        let splits =
            enumerate_site_splits(&mutations, 60, 10, 10).unwrap();
        assert_eq!(splits.splits().len(), 1);
        assert_eq!(splits.splits()[0], vec![vec![153]]);
    }

    #[test]
    fn test_adjacent_sites_offer_joint_run() {
        let mutations = sites(&["E52W", "E53W"]);
        let splits =
            enumerate_site_splits(&mutations, 60, 10, 10).unwrap();
        // either each site on its own primer, or both on a joint one
        let has_joint = splits
            .splits()
            .iter()
            .any(|s| s.len() == 1 && s[0] == vec![153, 156]);
        let has_separate = splits.splits().iter().any(|s| s.len() == 2);
        assert!(has_joint);
        assert!(has_separate);
        // the flat sequence set is shared across splits
        assert_eq!(splits.site_sequences().count(), 3);
    }

    #[test]
    fn test_distant_sites_cannot_share_primer() {
        let mutations = sites(&["E10W", "E200W"]);
        let splits =
            enumerate_site_splits(&mutations, 60, 10, 10).unwrap();
        assert_eq!(splits.splits().len(), 1);
        assert_eq!(splits.splits()[0].len(), 2);
    }

    #[test]
    fn test_every_split_covers_all_sites_disjointly() {
        let mutations = sites(&["E52W", "E53L", "E54K", "E90W"]);
        let splits =
            enumerate_site_splits(&mutations, 60, 10, 10).unwrap();
        let all = mutations.iter().map(|m| m.position).collect_vec();
        for split in splits.splits() {
            let mut covered =
                split.iter().flatten().copied().collect_vec();
            covered.sort();
            assert_eq!(covered, all, "split {split:?} is not a cover");
        }
    }
}
