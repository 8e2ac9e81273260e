//! Scoring and solution bookkeeping for the QCLM/MSDM engine.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::codon::DegenerateCodon;
use crate::codon_usage::CodonUsage;
use crate::dna::{gc_percent, CODON_LENGTH};
use crate::mutation::MutationSite;
use crate::primer::{MutagenesisDna, PrimerSpec};
use crate::qclm::site_split::{SiteSequence, SiteSplit};
use crate::qclm::QclmConfig;
use crate::thermo::StructureCalculator;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPrimer {
    pub spec: PrimerSpec,
    pub score: f64,
    pub tm: f64,
}

/// Constraint-violation bits for a primer in a finished solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimerError(pub u32);

impl PrimerError {
    pub const LENGTH: u32 = 1;
    pub const THREE_END_SIZE: u32 = 2;
    pub const FIVE_END_SIZE: u32 = 4;
    pub const TM: u32 = 8;
    pub const HAIRPIN_TM: u32 = 16;
    pub const PRIMER_DIMER_TM: u32 = 32;
    pub const GC_CONTENT: u32 = 64;
}

impl Display for PrimerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let labels = [
            (Self::LENGTH, "length"),
            (Self::THREE_END_SIZE, "3'-size"),
            (Self::FIVE_END_SIZE, "5'-size"),
            (Self::TM, "Tm"),
            (Self::HAIRPIN_TM, "hairpin"),
            (Self::PRIMER_DIMER_TM, "primer-dimer"),
            (Self::GC_CONTENT, "GC"),
        ];
        let joined = labels
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, label)| *label)
            .join("|");
        write!(f, "{joined}")
    }
}

#[derive(Debug, Clone)]
pub struct PrimerFailure {
    pub spec: PrimerSpec,
    pub errors: PrimerError,
}

/// Function object scoring one primer against a reaction temperature.
/// Weights multiply the squared errors; the score is the root of their
/// sum.
pub(crate) struct PrimerScoring<'a> {
    base: &'a MutagenesisDna,
    config: &'a QclmConfig,
}

impl<'a> PrimerScoring<'a> {
    pub(crate) fn new(
        base: &'a MutagenesisDna,
        config: &'a QclmConfig,
    ) -> Self {
        Self { base, config }
    }

    pub(crate) fn score(
        &self,
        spec: &PrimerSpec,
        site_sequence: &SiteSequence,
        primer_tm: f64,
        hairpin_tm: f64,
        homodimer_tm: f64,
        reaction_temp: f64,
    ) -> f64 {
        let cfg = self.config;
        let primer_seq = spec.sequence(self.base);

        let opt_gc =
            (cfg.max_gc_content + cfg.min_gc_content) / 2.0;
        let melting_err = (primer_tm - reaction_temp).powi(2);
        let gc_err = (opt_gc - gc_percent(&primer_seq)).powi(2);
        let length_err =
            (spec.length as f64 - cfg.min_primer_size as f64).powi(2);

        let first_site = site_sequence[0];
        let last_site = *site_sequence.last().unwrap();
        let five_end_size = first_site as f64 - spec.offset as f64;
        let three_end_size =
            spec.end() as f64 - (last_site + CODON_LENGTH) as f64;
        let five_err =
            (five_end_size - cfg.min_five_end_size as f64).powi(2);
        let three_err =
            (three_end_size - cfg.min_three_end_size as f64).powi(2);

        let mut hairpin_err = 0f64;
        let mut dimer_err = 0f64;
        if cfg.use_primer3 {
            let safe_limit = reaction_temp - 2.0 * cfg.temp_range_size;
            if hairpin_tm > safe_limit {
                hairpin_err = (hairpin_tm - safe_limit).powi(2);
            }
            if homodimer_tm > safe_limit {
                dimer_err = (homodimer_tm - safe_limit).powi(2);
            }
        }

        (cfg.temp_weight * melting_err
            + cfg.gc_content_weight * gc_err
            + cfg.primer_size_weight * length_err
            + cfg.three_end_size_weight * three_err
            + cfg.five_end_size_weight * five_err
            + cfg.hairpin_temperature_weight * hairpin_err
            + cfg.primer_dimer_temperature_weight * dimer_err)
            .sqrt()
    }
}

/// One QCLM solution: a single site split with one scored primer per
/// codon tuple per site sequence.
pub struct QclmSolution<'a> {
    pub mutations: &'a [MutationSite],
    pub primers: IndexMap<SiteSequence, Vec<ScoredPrimer>>,
    pub temperature: f64,
    config: &'a QclmConfig,
    usage: &'static CodonUsage,
}

impl<'a> QclmSolution<'a> {
    pub fn new(
        mutations: &'a [MutationSite],
        temperature: f64,
        config: &'a QclmConfig,
        usage: &'static CodonUsage,
    ) -> Self {
        Self {
            mutations,
            primers: IndexMap::new(),
            temperature,
            config,
            usage,
        }
    }

    pub fn add_primer(
        &mut self,
        site_sequence: &SiteSequence,
        primer: ScoredPrimer,
    ) {
        self.primers
            .entry(site_sequence.clone())
            .or_default()
            .push(primer);
    }

    pub fn is_empty(&self) -> bool {
        self.primers.is_empty()
    }

    pub fn site_split(&self) -> SiteSplit {
        self.primers.keys().cloned().sorted().collect()
    }

    pub fn primer_temperatures(&self) -> Vec<f64> {
        self.primers
            .values()
            .flatten()
            .map(|p| p.tm)
            .collect()
    }

    pub fn temperature_interval(&self) -> (f64, f64) {
        let temps = self.primer_temperatures();
        let min =
            temps.iter().copied().fold(f64::INFINITY, f64::min);
        let max =
            temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    }

    /// Ratio of amino acids reachable by the selected primers to the
    /// amino acids requested, in [0, 1]; higher is better.
    pub fn mutation_coverage(&self) -> f64 {
        let requested: Vec<HashSet<char>> = self
            .mutations
            .iter()
            .map(|m| m.new_aminos.iter().copied().collect())
            .collect();
        let index_of_site: IndexMap<usize, usize> = self
            .mutations
            .iter()
            .enumerate()
            .map(|(i, m)| (m.position, i))
            .collect();

        let mut covered: Vec<HashSet<char>> =
            vec![HashSet::new(); self.mutations.len()];
        for (site_sequence, primers) in &self.primers {
            for primer in primers {
                for (i, codon) in primer.spec.codons.iter().enumerate() {
                    let site = site_sequence[i];
                    let Some(site_index) = index_of_site.get(&site)
                    else {
                        continue;
                    };
                    if let Ok(parsed) = DegenerateCodon::parse_str(codon)
                    {
                        covered[*site_index]
                            .extend(parsed.to_aminos(self.usage));
                    }
                }
            }
        }

        let total: usize = requested.iter().map(|s| s.len()).sum();
        let total_covered: usize = requested
            .iter()
            .zip(covered.iter())
            .map(|(req, cov)| req.intersection(cov).count())
            .sum();
        if total == 0 {
            0f64
        } else {
            total_covered as f64 / total as f64
        }
    }

    /// Mean primer score plus the weighted coverage shortfall. The
    /// coverage weight multiplies `1 - coverage` and is deliberately not
    /// normalised by primer count.
    pub fn score(&self) -> f64 {
        let mut total = 0f64;
        let mut count = 0usize;
        for primers in self.primers.values() {
            for primer in primers {
                total += primer.score;
                count += 1;
            }
        }
        if count == 0 {
            return f64::INFINITY;
        }
        let mean = total / count as f64;
        let non_coverage = 1.0 - self.mutation_coverage();
        self.config.mutation_coverage_weight * non_coverage + mean
    }

    /// Primers of the finished solution that violate input constraints,
    /// with bit-encoded reasons.
    pub fn breaking_primers(
        &self,
        base: &MutagenesisDna,
        structures: &StructureCalculator,
    ) -> Vec<PrimerFailure> {
        let cfg = self.config;
        let primer_temps = self.primer_temperatures();
        let temp_spread = {
            let (min, max) = self.temperature_interval();
            max - min
        };
        let mean_tm = primer_temps.iter().sum::<f64>()
            / primer_temps.len().max(1) as f64;

        let mut failures = Vec::new();
        for (site_sequence, primers) in &self.primers {
            let first_site = site_sequence[0];
            let last_site = *site_sequence.last().unwrap();
            for primer in primers {
                let mut errors = 0u32;
                let spec = &primer.spec;

                if cfg.primer_size_weight > 0.0
                    && !(cfg.min_primer_size..=cfg.max_primer_size)
                        .contains(&spec.length)
                {
                    errors |= PrimerError::LENGTH;
                }

                let five_end_size =
                    first_site as isize - spec.offset as isize;
                if cfg.five_end_size_weight > 0.0
                    && !(cfg.min_five_end_size as isize
                        ..=cfg.max_five_end_size as isize)
                        .contains(&five_end_size)
                {
                    errors |= PrimerError::FIVE_END_SIZE;
                }

                let three_end_size = spec.end() as isize
                    - (last_site + CODON_LENGTH) as isize;
                if cfg.three_end_size_weight > 0.0
                    && !(cfg.min_three_end_size as isize
                        ..=cfg.max_three_end_size as isize)
                        .contains(&three_end_size)
                {
                    errors |= PrimerError::THREE_END_SIZE;
                }

                if temp_spread > cfg.temp_range_size
                    && (primer.tm - mean_tm).abs()
                        > cfg.temp_range_size / 2.0
                {
                    errors |= PrimerError::TM;
                }

                let primer_sequence = spec.sequence(base);
                if cfg.use_primer3 {
                    let safe_limit =
                        self.temperature - 2.0 * cfg.temp_range_size;
                    if structures.hairpin_tm(&primer_sequence)
                        > safe_limit
                    {
                        errors |= PrimerError::HAIRPIN_TM;
                    }
                    if structures.homodimer_tm(&primer_sequence)
                        > safe_limit
                    {
                        errors |= PrimerError::PRIMER_DIMER_TM;
                    }
                }

                let gc = gc_percent(&primer_sequence);
                if cfg.gc_content_weight > 0.0
                    && !(cfg.min_gc_content..=cfg.max_gc_content)
                        .contains(&gc)
                {
                    errors |= PrimerError::GC_CONTENT;
                }

                if errors != 0 {
                    failures.push(PrimerFailure {
                        spec: spec.clone(),
                        errors: PrimerError(errors),
                    });
                }
            }
        }
        failures
    }
}

impl Display for QclmSolution<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let primer_count: usize =
            self.primers.values().map(|p| p.len()).sum();
        write!(
            f,
            "solution: split={:?}, primers={}, score={:.1}, \
             coverage={:.2}, reaction temperature={}",
            self.site_split(),
            primer_count,
            self.score(),
            self.mutation_coverage(),
            self.temperature
        )
    }
}
