//! Reverse translation of an amino-acid sequence into DNA honouring
//! codon usage, a GC window and a forbidden-motif list.

use std::time::{Duration, Instant};

use log::debug;
use rand::rngs::StdRng;
use regex::Regex;

use crate::codon_usage::{is_valid_amino, CodonUsage};
use crate::degeneracy::random_codon;
use crate::dna::gc_overflow;
use crate::errs::{MakerError, MakerResult};
use crate::motifs::{any_motif_matches, compile_motifs};

const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(600);
// Maximum accepted GC deviation, in fractional percentage points.
const GC_TOLERANCE: f64 = 0.1;

pub struct Translator {
    usage: &'static CodonUsage,
    threshold: f64,
    gc_range: (f64, f64),
    motifs: Vec<Regex>,
    epsilon: f64,
    stall_draws: usize,
    time_limit: Duration,
}

impl Translator {
    pub fn new(
        threshold: f64,
        gc_range: (f64, f64),
        avoided_motifs: &[String],
        epsilon: f64,
        stall_draws: usize,
        organism: &str,
    ) -> MakerResult<Self> {
        Ok(Self {
            usage: CodonUsage::for_organism(organism)?,
            threshold,
            gc_range,
            motifs: compile_motifs(avoided_motifs)?,
            epsilon,
            stall_draws,
            time_limit: DEFAULT_TIME_LIMIT,
        })
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    fn generate_dna(
        &self,
        aminos: &str,
        rng: &mut StdRng,
    ) -> MakerResult<String> {
        let mut dna = String::with_capacity(aminos.len() * 3);
        for amino in aminos.chars() {
            dna.push_str(random_codon(
                self.usage,
                self.threshold,
                amino,
                rng,
            )?);
        }
        Ok(dna)
    }

    /// Codon-adaptation-index-like score: geometric mean of the relative
    /// adaptiveness of each codon within its amino group.
    fn cai_score(&self, dna: &str) -> f64 {
        let codons = dna.as_bytes().chunks_exact(3);
        let n = codons.len();
        if n == 0 {
            return 0f64;
        }
        let log_sum: f64 = codons
            .map(|chunk| {
                let codon = std::str::from_utf8(chunk).expect("ASCII DNA");
                let amino = match self.usage.translate(codon) {
                    Some(a) => a,
                    None => return f64::NEG_INFINITY,
                };
                let w =
                    self.usage.usage(codon) / self.usage.max_usage(amino);
                w.max(1e-12).ln()
            })
            .sum();
        (log_sum / n as f64).exp()
    }

    fn gc_penalty(&self, dna: &str) -> f64 {
        gc_overflow(dna, self.gc_range.0, self.gc_range.1) / 100.0
    }

    /// Draw random translations until the score stops improving by more
    /// than epsilon for the configured number of draws, or the wall-clock
    /// limit runs out (which is a hard failure).
    pub fn translate(
        &self,
        aminos: &str,
        rng: &mut StdRng,
    ) -> MakerResult<String> {
        if aminos.is_empty() {
            return Ok(String::new());
        }
        if let Some(bad) = aminos.chars().find(|a| !is_valid_amino(*a)) {
            return Err(MakerError::InvalidAmino(bad.to_string()));
        }

        let deadline = Instant::now() + self.time_limit;
        let mut best: Option<(String, f64)> = None;
        let mut draws_since_improvement = 0usize;

        loop {
            if Instant::now() > deadline {
                return Err(MakerError::ReverseTranslationTimeout);
            }
            let dna = self.generate_dna(aminos, rng)?;
            if self.gc_penalty(&dna) > GC_TOLERANCE
                || any_motif_matches(&self.motifs, &dna)
            {
                continue;
            }
            let cai = self.cai_score(&dna);
            let best_cai = best.as_ref().map(|(_, cai)| *cai);
            match best_cai {
                Some(best_cai) if cai <= best_cai + self.epsilon => {
                    if cai > best_cai {
                        best = Some((dna, cai));
                    }
                    draws_since_improvement += 1;
                }
                _ => {
                    best = Some((dna, cai));
                    draws_since_improvement = 0;
                }
            }
            if draws_since_improvement >= self.stall_draws {
                let (dna, cai) = best.expect("stall implies a candidate");
                debug!("reverse translation converged with CAI {cai:.3}");
                return Ok(dna);
            }
        }
    }
}

#[cfg(test)]
mod revtrans_tests {
    use rand::SeedableRng;

    use super::*;
    use crate::codon_usage::CodonUsage;

    #[test]
    fn test_round_trip_translation() {
        let translator = Translator::new(
            0.05,
            (40.0, 60.0),
            &["AarI".to_string(), "AatII".to_string(), "NCT".to_string()],
            0.05,
            20,
            "e-coli",
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let aminos = "ACDEFGHIKLMNPQRSTVWY";
        let dna = translator.translate(aminos, &mut rng).unwrap();
        assert_eq!(dna.len(), aminos.len() * 3);

        let usage = CodonUsage::for_organism("e-coli").unwrap();
        assert_eq!(usage.translate_sequence(&dna), aminos);
    }

    #[test]
    fn test_invalid_amino_rejected() {
        let translator = Translator::new(
            0.05,
            (0.0, 100.0),
            &[],
            0.05,
            10,
            "e-coli",
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            translator.translate("AB", &mut rng),
            Err(MakerError::InvalidAmino(_))
        ));
    }

    #[test]
    fn test_wall_clock_failure() {
        let translator = Translator::new(
            0.05,
            // GC window nothing can hit, so no draw is ever accepted
            (99.0, 100.0),
            &[],
            0.05,
            10,
            "e-coli",
        )
        .unwrap()
        .with_time_limit(Duration::from_millis(50));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            translator.translate("ACDEFGHIK", &mut rng),
            Err(MakerError::ReverseTranslationTimeout)
        );
    }
}
