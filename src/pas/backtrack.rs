//! Backtracking search over fragment splits for one overlap-temperature
//! threshold, with dynamic-programming pruning keyed by prefix length
//! and fragment-count parity.

use std::time::{Duration, Instant};

use log::debug;
use rustc_hash::FxHashMap;

use crate::dna::CODON_LENGTH;
use crate::pas::fragment::{
    fragment_score, solution_score, PasFragment, ProtoFragment,
    SelfBindingRange,
};
use crate::pas::PasConfig;
use crate::primer::MutagenesisDna;
use crate::thermo::{StructureCalculator, TemperatureCalculator};

// Window lengths screened for hairpins and homodimers when building the
// self-binding map of the gene.
const HAIRPIN_WINDOWS: [usize; 2] = [12, 24];
const HOMODIMER_WINDOWS: [usize; 2] = [25, 50];
const HOMODIMER_OFFSET_STEP: usize = 10;

pub struct PasOptimizer<'a> {
    proto_fragments: Vec<ProtoFragment>,
    gene: &'a MutagenesisDna,
    config: &'a PasConfig,
    calculator: &'a TemperatureCalculator,
    tm: f64,

    best_fragments: Option<Vec<PasFragment>>,
    best_score: f64,
    // Best average score for a prefix of this length covering an even
    // ('true') or odd number of fragments.
    best_partial_score: FxHashMap<(usize, bool), f64>,

    fragment_lengths_ordered: Vec<usize>,
    self_binding_ranges: Vec<SelfBindingRange>,

    timeout: Duration,
    started: Instant,
    pub timed_out: bool,
}

impl<'a> PasOptimizer<'a> {
    pub fn new(
        mut proto_fragments: Vec<ProtoFragment>,
        gene: &'a MutagenesisDna,
        config: &'a PasConfig,
        tm: f64,
        calculator: &'a TemperatureCalculator,
        structures: &StructureCalculator,
        timeout: Duration,
    ) -> Self {
        proto_fragments.sort_by_key(|p| p.first_site());
        let mut fragment_lengths_ordered = (config.min_oligo_size
            ..=config.max_oligo_size)
            .collect::<Vec<usize>>();
        fragment_lengths_ordered.sort_by_key(|length| {
            (*length as isize - config.opt_oligo_size as isize).abs()
        });
        let self_binding_ranges =
            find_self_binding_ranges(gene, config, tm, structures);

        Self {
            proto_fragments,
            gene,
            config,
            calculator,
            tm,
            best_fragments: None,
            best_score: f64::INFINITY,
            best_partial_score: FxHashMap::default(),
            fragment_lengths_ordered,
            self_binding_ranges,
            timeout,
            started: Instant::now(),
            timed_out: false,
        }
    }

    pub fn optimize(&mut self) {
        self.best_fragments = None;
        self.best_score = f64::INFINITY;
        self.best_partial_score.clear();
        self.timed_out = false;
        self.started = Instant::now();
        let protos = self.proto_fragments.clone();
        self.find_best_fragments(Vec::new(), 0f64, protos);
    }

    pub fn into_optimal_solution(
        self,
    ) -> Option<(Vec<PasFragment>, f64)> {
        self.best_fragments.map(|f| (f, self.best_score))
    }

    fn find_best_fragments(
        &mut self,
        partial: Vec<PasFragment>,
        avg_fragment_score: f64,
        proto_fragments: Vec<ProtoFragment>,
    ) {
        if self.started.elapsed() > self.timeout {
            self.timed_out = true;
            return;
        }
        if !self.record_if_best(&partial, avg_fragment_score) {
            return;
        }
        if self.accept(&partial) {
            return;
        }
        if let Some(last) = partial.last() {
            // complete but not best, or odd fragment count
            if last.end() + 1 == self.gene.len() {
                return;
            }
        }

        let (mut next, mut remaining) =
            self.optimal_length_fragment(&partial, &proto_fragments);
        while let Some(fragment) = next {
            let mut extended = partial.clone();
            let new_score = (avg_fragment_score * partial.len() as f64
                + fragment_score(
                    fragment.start,
                    fragment.end(),
                    self.config,
                    &self.self_binding_ranges,
                    self.tm,
                ))
                / (partial.len() + 1) as f64;
            extended.push(fragment.clone());

            self.find_best_fragments(
                extended,
                new_score,
                remaining.clone(),
            );
            if self.timed_out {
                return;
            }
            let (n, r) =
                self.next_fragment(&fragment, &proto_fragments);
            next = n;
            remaining = r;
        }
    }

    /// The next fragment linked to the last one of the partial solution,
    /// trying lengths closest to the optimum first.
    fn optimal_length_fragment(
        &self,
        partial: &[PasFragment],
        proto_fragments: &[ProtoFragment],
    ) -> (Option<PasFragment>, Vec<ProtoFragment>) {
        let start = if partial.is_empty() {
            0
        } else {
            match self.last_overlap_offset(partial) {
                Some(start) => start,
                None => return (None, proto_fragments.to_vec()),
            }
        };
        match self.first_valid_length_idx(start, 0, proto_fragments) {
            Some(idx) => {
                let end =
                    start + self.fragment_lengths_ordered[idx] - 1;
                consume_proto_fragments(start, end, proto_fragments)
            }
            None => (None, proto_fragments.to_vec()),
        }
    }

    /// Try the next length for a fragment starting at the same offset.
    fn next_fragment(
        &self,
        previous: &PasFragment,
        proto_fragments: &[ProtoFragment],
    ) -> (Option<PasFragment>, Vec<ProtoFragment>) {
        let start = previous.start;
        let previous_idx = self
            .fragment_lengths_ordered
            .iter()
            .position(|l| *l == previous.length)
            .expect("fragment lengths come from the ordered list");
        match self.first_valid_length_idx(
            start,
            previous_idx + 1,
            proto_fragments,
        ) {
            Some(idx) => {
                let end =
                    start + self.fragment_lengths_ordered[idx] - 1;
                consume_proto_fragments(start, end, proto_fragments)
            }
            None => (None, proto_fragments.to_vec()),
        }
    }

    /// First length index (from `init_idx` on) whose induced fragment
    /// end neither runs off the gene nor bisects a proto-fragment.
    fn first_valid_length_idx(
        &self,
        start: usize,
        init_idx: usize,
        proto_fragments: &[ProtoFragment],
    ) -> Option<usize> {
        for idx in init_idx..self.fragment_lengths_ordered.len() {
            let length = self.fragment_lengths_ordered[idx];
            let end = start + length - 1;
            if end >= self.gene.len() {
                continue;
            }

            let last_included = proto_fragments
                .iter()
                .take_while(|p| p.constraints().min_end <= end)
                .count();

            if proto_fragments.is_empty()
                || last_included == proto_fragments.len()
            {
                return Some(idx);
            }
            if start + length
                < proto_fragments[last_included].first_site()
            {
                // the fragment stops before the next proto-fragment
                return Some(idx);
            }
        }
        None
    }

    /// Record a partial solution in the pruning table; returns false
    /// when a better prefix of the same length and parity exists.
    fn record_if_best(
        &mut self,
        partial: &[PasFragment],
        score: f64,
    ) -> bool {
        let Some(first) = partial.first() else {
            return true;
        };
        if first.start > 0 {
            return false;
        }
        let length = partial.last().unwrap().end() - first.start + 1;
        if length == self.gene.len() {
            // complete solutions are not compared with the partial metric
            return true;
        }
        let parity = partial.len() % 2 == 0;
        let best_so_far =
            self.best_partial_score.get(&(length, parity));
        match best_so_far {
            Some(best) if score >= *best => false,
            _ => {
                self.best_partial_score
                    .insert((length, parity), score);
                true
            }
        }
    }

    /// Accept a complete, even-count cover if it beats the best so far.
    fn accept(&mut self, partial: &[PasFragment]) -> bool {
        if partial.is_empty()
            || partial.len() % 2 != 0
            || partial.last().unwrap().end() + 1 != self.gene.len()
        {
            return false;
        }
        let score = solution_score(
            partial,
            self.gene,
            self.config,
            &self.self_binding_ranges,
            self.tm,
            self.calculator,
        );
        if score < self.best_score {
            self.best_score = score;
            self.best_fragments = Some(partial.to_vec());
            debug!(
                "new best split with {} fragments, score {score:.2}",
                partial.len()
            );
            true
        } else {
            false
        }
    }

    /// The start of the next fragment: the offset of the shortest
    /// overlap at the tail of the last fragment with Tm above the
    /// threshold and below threshold + range.
    fn last_overlap_offset(
        &self,
        partial: &[PasFragment],
    ) -> Option<usize> {
        let last = partial.last()?;
        let last_bp_offset = last.end();

        let mut min_overlap_offset = if let Some(max_site) =
            last.sites.iter().max()
        {
            max_site + CODON_LENGTH
        } else if partial.len() > 1 {
            partial[partial.len() - 2].end() + 1
        } else {
            0
        };
        min_overlap_offset = std::cmp::max(
            min_overlap_offset,
            last_bp_offset
                .saturating_sub(self.config.max_overlap_length),
        );
        let max_overlap_offset = last_bp_offset
            .checked_sub(self.config.min_overlap_length)?;
        if max_overlap_offset < min_overlap_offset {
            return None;
        }

        let mut overlap_offset = max_overlap_offset;
        while self.calculator.duplex_tm(
            &self.gene.sequence[overlap_offset..last_bp_offset],
        ) <= self.tm
        {
            if overlap_offset == 0
                || overlap_offset - 1 < min_overlap_offset
            {
                return None;
            }
            overlap_offset -= 1;
        }

        let overlap_tm = self.calculator.duplex_tm(
            &self.gene.sequence[overlap_offset..last_bp_offset],
        );
        if overlap_tm <= self.tm + self.config.temp_range_size {
            Some(overlap_offset)
        } else {
            None
        }
    }

    pub fn self_binding_ranges(&self) -> &[SelfBindingRange] {
        &self.self_binding_ranges
    }
}

/// Build a fragment [start, end] from the proto-fragments it swallows,
/// and return the proto-fragments left over.
fn consume_proto_fragments(
    start: usize,
    end: usize,
    proto_fragments: &[ProtoFragment],
) -> (Option<PasFragment>, Vec<ProtoFragment>) {
    let mut included_sites = Vec::new();
    let mut remaining = Vec::new();
    for proto in proto_fragments {
        if proto.constraints().min_end <= end {
            included_sites.extend_from_slice(proto.sites());
        } else {
            remaining.push(proto.clone());
        }
    }
    (
        Some(PasFragment::new(included_sites, start, end - start + 1)),
        remaining,
    )
}

/// Screen the gene for regions able to form hairpins or homodimers
/// close to the reaction temperature.
fn find_self_binding_ranges(
    gene: &MutagenesisDna,
    config: &PasConfig,
    tm: f64,
    structures: &StructureCalculator,
) -> Vec<SelfBindingRange> {
    let threshold = tm - config.safe_temp_difference;
    let mut segments: Vec<SelfBindingRange> = Vec::new();

    let mut consider =
        |start: usize, end: usize, structure_tm: f64,
         segments: &mut Vec<SelfBindingRange>| {
            if structure_tm <= 0f64 || structure_tm <= threshold {
                return;
            }
            let already_covered = segments
                .iter()
                .any(|(s, e, _)| *s >= start && *e <= end);
            if !already_covered {
                segments.push((start, end, structure_tm));
            }
        };

    for length in HAIRPIN_WINDOWS {
        if gene.len() < length {
            continue;
        }
        for start in 0..gene.len() - length {
            let end = start + length - 1;
            let structure_tm =
                structures.hairpin_tm(&gene.sequence[start..end]);
            consider(start, end, structure_tm, &mut segments);
        }
    }
    for length in HOMODIMER_WINDOWS {
        if gene.len() < length {
            continue;
        }
        for start in
            (0..gene.len() - length).step_by(HOMODIMER_OFFSET_STEP)
        {
            let end = start + length - 1;
            let structure_tm =
                structures.homodimer_tm(&gene.sequence[start..end]);
            consider(start, end, structure_tm, &mut segments);
        }
    }
    segments
}

#[cfg(test)]
mod pas_backtrack_tests {
    use std::time::Duration;

    use super::*;
    use crate::pas::fragment::{
        compute_tm_distances, create_proto_fragments,
    };
    use crate::pas::PasConfig;
    use crate::thermo::TemperatureConfig;

    fn gene(len: usize, sites: Vec<usize>) -> MutagenesisDna {
        let unit = "ATGGCTAGCGTTCAAGGCCTAACGGATCGATTGCCA";
        MutagenesisDna::new(
            unit.repeat(len / unit.len() + 1)[..len].to_string(),
            sites,
        )
    }

    #[test]
    fn test_backtrack_finds_even_contiguous_cover() {
        let gene = gene(300, vec![27, 150]);
        let config = PasConfig::default();
        let calculator = TemperatureConfig::default_gc_quickchange()
            .create_calculator();
        let structures = StructureCalculator::new(50.0, 2.0, 0.2, 2);
        let distances = compute_tm_distances(&gene, &calculator);

        let mut found_any = false;
        for tm in [52.0, 54.0, 56.0] {
            let Some(protos) = create_proto_fragments(
                tm,
                &gene,
                &distances,
                &config,
                &calculator,
            ) else {
                continue;
            };
            let mut optimizer = PasOptimizer::new(
                protos,
                &gene,
                &config,
                tm,
                &calculator,
                &structures,
                Duration::from_secs(5),
            );
            optimizer.optimize();
            if let Some((fragments, score)) =
                optimizer.into_optimal_solution()
            {
                found_any = true;
                assert!(score.is_finite());
                assert_eq!(fragments.len() % 2, 0);
                assert_eq!(fragments[0].start, 0);
                assert_eq!(
                    fragments.last().unwrap().end() + 1,
                    gene.len()
                );
                for fragment in &fragments {
                    assert!(
                        fragment.length >= config.min_oligo_size
                            && fragment.length
                                <= config.max_oligo_size
                    );
                }
                // consecutive fragments overlap
                for pair in fragments.windows(2) {
                    assert!(pair[1].start < pair[0].end());
                }
            }
        }
        assert!(found_any, "no threshold produced a solution");
    }
}
