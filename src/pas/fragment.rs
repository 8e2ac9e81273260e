//! Proto-fragments, fragment constraints and scoring for the PAS
//! gene-synthesis workflow.

use log::debug;

use crate::dna::{gc_percent, CODON_LENGTH};
use crate::pas::PasConfig;
use crate::primer::MutagenesisDna;
use crate::thermo::TemperatureCalculator;

/// Minimum and maximum positions for the start/end of a fragment, in bp,
/// zero based. The end is the index of the first bp after the fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentConstraints {
    pub min_start: usize,
    pub max_start: usize,
    pub min_end: usize,
    pub max_end: usize,
}

/// A self-binding region of the gene: [start, end] with the Tm of the
/// structure it can form.
pub type SelfBindingRange = (usize, usize, f64);

/// Compute the placement constraints for a fragment that has to carry
/// the given mutation sites. `None` means the constraints cannot be met
/// for this overlap-temperature threshold.
pub fn fragment_constraints(
    fragment_mutations: &[usize],
    gene: &MutagenesisDna,
    config: &PasConfig,
    t_min: f64,
    calculator: &TemperatureCalculator,
) -> Option<FragmentConstraints> {
    let mut_start = *fragment_mutations.iter().min().expect("non-empty");
    let mut_end =
        *fragment_mutations.iter().max().expect("non-empty") + CODON_LENGTH;

    let previous_mutation_end = gene
        .mutation_sites
        .iter()
        .filter(|m| **m < mut_start)
        .last()
        .map(|m| m + CODON_LENGTH)
        .unwrap_or(0);
    let next_mutation_start = gene
        .mutation_sites
        .iter()
        .find(|m| **m >= mut_end)
        .copied()
        .unwrap_or(gene.len());

    let max_start =
        mut_start as isize - config.min_overlap_length as isize;
    let min_end = mut_end + config.min_overlap_length;
    let min_start = std::cmp::max(
        previous_mutation_end as isize,
        min_end as isize - config.max_oligo_size as isize,
    );
    let max_end = std::cmp::min(
        next_mutation_start as isize,
        max_start + config.max_oligo_size as isize,
    );

    if min_end as isize - max_start > config.max_oligo_size as isize
        || max_start < 0
        || min_end > gene.len()
        || min_start > max_start
        || min_end as isize > max_end
    {
        debug!(
            "fragment over sites {fragment_mutations:?} cannot satisfy \
             size constraints"
        );
        return None;
    }

    // Extend the left overlap outward until it reaches the threshold.
    let mut max_start = max_start as usize;
    while calculator.duplex_tm(&gene.sequence[max_start..mut_start])
        < t_min
    {
        if max_start == 0 || (max_start as isize - 1) < min_start {
            return None;
        }
        max_start -= 1;
    }

    // The same for the overlap after the fragment.
    let mut min_end = min_end;
    while calculator.duplex_tm(&gene.sequence[mut_end..min_end]) < t_min {
        if min_end as isize + 1 > max_end {
            return None;
        }
        min_end += 1;
    }

    Some(FragmentConstraints {
        min_start: min_start.max(0) as usize,
        max_start,
        min_end,
        max_end: max_end.max(0) as usize,
    })
}

/// A maximal run of consecutive mutation sites which must share one
/// fragment because the sequence between them cannot host an overlap.
#[derive(Debug, Clone)]
pub struct ProtoFragment {
    sites: Vec<usize>,
    constraints: Option<FragmentConstraints>,
}

impl ProtoFragment {
    pub fn new(sites: Vec<usize>) -> Self {
        Self { sites, constraints: None }
    }

    pub fn add_site(&mut self, site: usize) {
        self.sites.push(site);
    }

    pub fn sites(&self) -> &[usize] {
        &self.sites
    }

    pub fn first_site(&self) -> usize {
        *self.sites.iter().min().expect("proto fragment is non-empty")
    }

    pub fn constraints(&self) -> &FragmentConstraints {
        self.constraints
            .as_ref()
            .expect("constraints are initialised before the search")
    }

    /// Returns false when the constraints cannot be satisfied for this
    /// threshold.
    pub fn init_constraints(
        &mut self,
        gene: &MutagenesisDna,
        config: &PasConfig,
        t_min: f64,
        calculator: &TemperatureCalculator,
    ) -> bool {
        self.constraints = fragment_constraints(
            &self.sites,
            gene,
            config,
            t_min,
            calculator,
        );
        self.constraints.is_some()
    }
}

/// A DNA fragment of the final gene split. `end` is the index of the
/// last bp of the fragment (inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasFragment {
    pub sites: Vec<usize>,
    pub start: usize,
    pub length: usize,
}

impl PasFragment {
    pub fn new(sites: Vec<usize>, start: usize, length: usize) -> Self {
        Self { sites, start, length }
    }

    pub fn end(&self) -> usize {
        self.start + self.length - 1
    }

    pub fn sequence<'a>(&self, gene: &'a str) -> &'a str {
        &gene[self.start..=self.end()]
    }

    /// The overlap window shared with the following fragment.
    pub fn overlap_with<'a>(
        &self,
        next: &PasFragment,
        gene: &'a str,
    ) -> &'a str {
        &gene[next.start..self.end()]
    }
}

/// Score for one fragment: deviation from the optimal length plus the
/// self-binding regions inside it that melt too close to the reaction.
pub fn fragment_score(
    fragment_start: usize,
    fragment_end: usize,
    config: &PasConfig,
    self_binding_ranges: &[SelfBindingRange],
    tm: f64,
) -> f64 {
    let fragment_length = (fragment_end - fragment_start + 1) as f64;
    let mut score = config.length_weight
        * (fragment_length - config.opt_oligo_size as f64).powi(2);

    let safe_self_bind_limit = tm - config.safe_temp_difference;
    score += config.hairpin_homodimer_weight
        * self_binding_ranges
            .iter()
            .filter(|(start, end, range_tm)| {
                *start >= fragment_start
                    && *end <= fragment_end
                    && *range_tm > safe_self_bind_limit
            })
            .map(|(_, _, range_tm)| {
                (range_tm - safe_self_bind_limit).powi(2)
            })
            .sum::<f64>();

    score.sqrt()
}

/// Total score of a complete fragment list: fragment scores plus the
/// per-adjacent-pair overlap scores.
pub fn solution_score(
    fragments: &[PasFragment],
    gene: &MutagenesisDna,
    config: &PasConfig,
    self_binding_ranges: &[SelfBindingRange],
    tm: f64,
    calculator: &TemperatureCalculator,
) -> f64 {
    let fragment_scores: f64 = fragments
        .iter()
        .map(|f| {
            fragment_score(
                f.start,
                f.end(),
                config,
                self_binding_ranges,
                tm,
            )
        })
        .sum();

    let gc_mid = (config.min_gc_content + config.max_gc_content) / 2.0;
    let mut overlap_scores = 0f64;
    for pair in fragments.windows(2) {
        let overlap = pair[0].overlap_with(&pair[1], &gene.sequence);

        let length_err = (overlap.len() as f64
            - config.opt_overlap_length as f64)
            .powi(2);
        let gc_err = (gc_percent(overlap) - gc_mid).powi(2);
        let temp_err = (config.opt_overlap_tm
            - calculator.duplex_tm(overlap))
        .powi(2);

        overlap_scores += (config.temp_weight * temp_err
            + config.gc_content_weight * gc_err
            + config.temp_weight * length_err)
            .sqrt();
    }

    fragment_scores + overlap_scores
}

/// Average the solution score over the fragment count.
pub fn evaluate_solution(
    fragments: &[PasFragment],
    gene: &MutagenesisDna,
    config: &PasConfig,
    self_binding_ranges: &[SelfBindingRange],
    tm: f64,
    calculator: &TemperatureCalculator,
) -> f64 {
    solution_score(
        fragments,
        gene,
        config,
        self_binding_ranges,
        tm,
        calculator,
    ) / fragments.len() as f64
}

/// Group mutation sites into proto-fragments: two consecutive sites must
/// share a fragment when the sequence between them melts below the
/// overlap threshold.
pub fn create_proto_fragments(
    t_min: f64,
    gene: &MutagenesisDna,
    tm_distances: &[f64],
    config: &PasConfig,
    calculator: &TemperatureCalculator,
) -> Option<Vec<ProtoFragment>> {
    let sites = &gene.mutation_sites;
    if sites.is_empty() {
        return Some(Vec::new());
    }

    let mut proto_fragments = vec![ProtoFragment::new(vec![sites[0]])];
    for (i, tm_distance) in tm_distances.iter().enumerate() {
        if *tm_distance < t_min {
            proto_fragments
                .last_mut()
                .expect("at least one proto fragment")
                .add_site(sites[i + 1]);
        } else {
            proto_fragments.push(ProtoFragment::new(vec![sites[i + 1]]));
        }
    }

    for proto in proto_fragments.iter_mut() {
        if !proto.init_constraints(gene, config, t_min, calculator) {
            debug!(
                "proto fragments unsatisfiable for threshold {t_min}"
            );
            return None;
        }
    }
    Some(proto_fragments)
}

/// Melting temperatures of the windows between consecutive mutation
/// sites.
pub fn compute_tm_distances(
    gene: &MutagenesisDna,
    calculator: &TemperatureCalculator,
) -> Vec<f64> {
    gene.mutation_sites
        .windows(2)
        .map(|pair| {
            let from = pair[0] + CODON_LENGTH;
            let to = pair[1];
            calculator.duplex_tm(&gene.sequence[from..to])
        })
        .collect()
}

#[cfg(test)]
mod pas_fragment_tests {
    use super::*;
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
    fn test_close_sites_merge_into_one_proto() {
        let gene = gene(300, vec![30, 39, 150]);
        let config = PasConfig::default();
        let calculator =
            TemperatureConfig::default_gc_quickchange().create_calculator();
        let distances = compute_tm_distances(&gene, &calculator);
        assert_eq!(distances.len(), 2);
        // 6 bp between the first two sites cannot hold a 54 degree
        // overlap, 108 bp before the third one can
        let protos = create_proto_fragments(
            54.0,
            &gene,
            &distances,
            &config,
            &calculator,
        );
        if let Some(protos) = protos {
            assert!(protos.len() <= 2);
            assert_eq!(protos[0].sites(), &[30, 39]);
        }
    }

    #[test]
    fn test_constraints_reject_impossible_window() {
        let gene = gene(60, vec![30]);
        let mut config = PasConfig::default();
        config.min_overlap_length = 40;
        let calculator =
            TemperatureConfig::default_gc_quickchange().create_calculator();
        assert!(fragment_constraints(
            &[30],
            &gene,
            &config,
            54.0,
            &calculator
        )
        .is_none());
    }

    #[test]
    fn test_fragment_score_prefers_optimal_length() {
        let config = PasConfig::default();
        let optimal = fragment_score(
            0,
            config.opt_oligo_size - 1,
            &config,
            &[],
            56.0,
        );
        let long = fragment_score(
            0,
            config.max_oligo_size - 1,
            &config,
            &[],
            56.0,
        );
        assert!(optimal < long);
        assert_eq!(optimal, 0.0);
    }

    #[test]
    fn test_self_binding_penalty_counts_contained_ranges() {
        let mut config = PasConfig::default();
        config.length_weight = 0.0;
        let ranges: Vec<SelfBindingRange> =
            vec![(10, 20, 60.0), (100, 120, 60.0)];
        let with_range =
            fragment_score(0, 56, &config, &ranges, 56.0);
        let without =
            fragment_score(30, 86, &config, &ranges, 56.0);
        assert!(with_range > 0.0);
        assert_eq!(without, 0.0);
    }
}
