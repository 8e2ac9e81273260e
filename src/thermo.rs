//! Melting temperature evaluation for duplexes and secondary structures.
//!
//! The nearest-neighbour model follows SantaLucia & Hicks (2004) with the
//! entropic salt correction; the GC-empirical methods use the classic
//! valueset constants. All calculators memoise by input sequence and round
//! results to the configured precision before caching, so equal inputs
//! always return byte-identical values.

use std::sync::Mutex;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::dna::{gc_percent, reverse_complement};
use crate::errs::{MakerError, MakerResult};

// Universal gas constant (cal / (K * mol))
const GAS_CONSTANT: f64 = 1.987;

// Minimum paired stem length to call a secondary structure at all.
const MIN_STEM: usize = 4;
// Minimum unpaired loop between the two arms of a hairpin.
const MIN_HAIRPIN_LOOP: usize = 3;

/// Enthalpy (dH, kcal/mol) and entropy (dS, cal/(K*mol)) for adjacent
/// base pairs, SantaLucia & Hicks 2004, Table 1.
fn nn_dh_ds(a: u8, b: u8) -> (f64, f64) {
    match (a, b) {
        (b'A', b'A') | (b'T', b'T') => (-7.6, -21.3),
        (b'A', b'T') => (-7.2, -20.4),
        (b'T', b'A') => (-7.2, -21.3),
        (b'C', b'A') | (b'T', b'G') => (-8.5, -22.7),
        (b'G', b'T') | (b'A', b'C') => (-8.4, -22.4),
        (b'C', b'T') | (b'A', b'G') => (-7.8, -21.0),
        (b'G', b'A') | (b'T', b'C') => (-8.2, -22.2),
        (b'C', b'G') => (-10.6, -27.2),
        (b'G', b'C') => (-9.8, -24.4),
        (b'G', b'G') | (b'C', b'C') => (-8.0, -19.9),
        _ => (0.0, 0.0),
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default,
)]
pub enum TmMethod {
    Wallace,
    #[serde(rename = "GC")]
    Gc,
    #[default]
    #[serde(rename = "NN")]
    NearestNeighbour,
    #[serde(rename = "NEB_like")]
    NebLike,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default,
)]
pub enum GcValueSet {
    #[serde(rename = "Chester_1993")]
    Chester1993,
    #[default]
    QuickChange,
    #[serde(rename = "Schildkraut_1965")]
    Schildkraut1965,
    #[serde(rename = "Wetmur_Melting_1991")]
    WetmurMelting1991,
    Primer3,
    #[serde(rename = "Ahsen_2001")]
    Ahsen2001,
}

impl GcValueSet {
    /// (A, B) constants of Tm = A + 0.41 * GC% - B / N.
    fn constants(&self) -> (f64, f64) {
        match self {
            GcValueSet::Chester1993 => (69.3, 650.0),
            GcValueSet::QuickChange => (81.5, 675.0),
            GcValueSet::Schildkraut1965 => (81.5, 675.0),
            GcValueSet::WetmurMelting1991 => (81.5, 675.0),
            GcValueSet::Primer3 => (81.5, 600.0),
            GcValueSet::Ahsen2001 => (77.1, 675.0),
        }
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default,
)]
pub enum SaltCorrection {
    No,
    #[serde(rename = "Schildkraut_1965")]
    Schildkraut1965,
    #[serde(rename = "Wetmur_1991")]
    Wetmur1991,
    #[serde(rename = "SantaLucia_1996")]
    SantaLucia1996,
    #[default]
    #[serde(rename = "SantaLucia_1998")]
    SantaLucia1998,
}

fn default_dnac1() -> f64 {
    500.0
}
fn default_dnac2() -> f64 {
    25.0
}
fn default_na() -> f64 {
    50.0
}
fn default_k() -> f64 {
    50.0
}
fn default_tris() -> f64 {
    20.0
}
fn default_mg() -> f64 {
    2.0
}
fn default_dntp() -> f64 {
    0.2
}

/// Tm model and salt parameters, fixed at calculator construction.
/// Concentrations are in mM except the primer concentrations (nM).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub calculation_type: TmMethod,
    pub gc_value_set: GcValueSet,
    pub salt_correction: SaltCorrection,
    pub dnac1: f64,
    pub dnac2: f64,
    pub na: f64,
    pub k: f64,
    pub tris: f64,
    pub mg: f64,
    pub dntp: f64,
    pub precision: i32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            calculation_type: TmMethod::NearestNeighbour,
            gc_value_set: GcValueSet::QuickChange,
            salt_correction: SaltCorrection::default(),
            dnac1: default_dnac1(),
            dnac2: default_dnac2(),
            na: default_na(),
            k: default_k(),
            tris: default_tris(),
            mg: default_mg(),
            dntp: default_dntp(),
            precision: 0,
        }
    }
}

impl TemperatureConfig {
    /// The default configuration for QCLM and PAS reactions.
    pub fn default_gc_quickchange() -> Self {
        Self {
            calculation_type: TmMethod::Gc,
            gc_value_set: GcValueSet::QuickChange,
            salt_correction: SaltCorrection::No,
            na: 0.0,
            k: 50.0,
            tris: 20.0,
            mg: 2.0,
            dntp: 0.2,
            dnac1: 500.0,
            dnac2: 25.0,
            precision: 1,
        }
    }

    pub fn create_calculator(&self) -> TemperatureCalculator {
        TemperatureCalculator::new(self.clone(), true)
    }

    pub fn create_uncached_calculator(&self) -> TemperatureCalculator {
        TemperatureCalculator::new(self.clone(), false)
    }

    /// Total monovalent cation concentration in mM, with the divalent
    /// contribution folded in as in the nearest-neighbour literature.
    fn monovalent_millimolar(&self) -> f64 {
        let mut mon = self.na + self.k + self.tris / 2.0;
        if self.mg > self.dntp {
            mon += 120.0 * (self.mg - self.dntp).sqrt();
        }
        mon
    }
}

fn round_to(value: f64, precision: i32) -> f64 {
    let factor = 10f64.powi(precision);
    (value * factor).round() / factor
}

fn wallace_tm(seq: &str) -> f64 {
    let (mut at, mut gc) = (0f64, 0f64);
    for b in seq.bytes() {
        match b {
            b'A' | b'T' => at += 1.0,
            b'G' | b'C' => gc += 1.0,
            _ => {}
        }
    }
    2.0 * at + 4.0 * gc
}

fn gc_tm(seq: &str, cfg: &TemperatureConfig) -> f64 {
    let (a, b) = cfg.gc_value_set.constants();
    let mut tm = a + 0.41 * gc_percent(seq) - b / seq.len() as f64;
    let mon = (cfg.monovalent_millimolar() * 1e-3).max(1e-9);
    match cfg.salt_correction {
        SaltCorrection::No => {}
        SaltCorrection::Schildkraut1965 => tm += 16.6 * mon.log10(),
        SaltCorrection::Wetmur1991 => {
            tm += 16.6 * (mon / (1.0 + 0.7 * mon)).log10()
        }
        SaltCorrection::SantaLucia1996 => tm += 12.5 * mon.log10(),
        SaltCorrection::SantaLucia1998 => {
            tm += 0.368 * (seq.len() as f64 - 1.0) * mon.ln() / 10.0
        }
    }
    tm
}

/// Nearest-neighbour duplex Tm with entropic salt correction.
fn nn_tm(seq: &str, mon_millimolar: f64, dnac1: f64, dnac2: f64) -> f64 {
    let bytes = seq.as_bytes();
    // Initiation values (SantaLucia & Hicks 2004, Table 1)
    let mut dh = 0.2;
    let mut ds = -5.7;

    for &terminal in [bytes[0], bytes[bytes.len() - 1]].iter() {
        if terminal == b'A' || terminal == b'T' {
            dh += 2.2;
            ds += 6.9;
        }
    }

    for pair in bytes.windows(2) {
        let (dh_nn, ds_nn) = nn_dh_ds(pair[0], pair[1]);
        dh += dh_nn;
        ds += ds_nn;
    }

    let mon_molar = (mon_millimolar * 1e-3).max(1e-9);
    ds += 0.368 * (bytes.len() as f64 - 1.0) * mon_molar.ln();

    // primer excess over template
    let c_t = ((dnac1 - dnac2 / 2.0) * 1e-9).max(1e-12);
    1000.0 * dh / (ds + GAS_CONSTANT * c_t.ln()) - 273.15
}

/// Cached duplex melting temperature calculator. Empty input returns
/// negative infinity so that callers can grow primers monotonically.
pub struct TemperatureCalculator {
    config: TemperatureConfig,
    cached: bool,
    cache: Mutex<FxHashMap<String, f64>>,
}

impl TemperatureCalculator {
    pub fn new(config: TemperatureConfig, cached: bool) -> Self {
        Self { config, cached, cache: Mutex::new(FxHashMap::default()) }
    }

    pub fn precision(&self) -> i32 {
        self.config.precision
    }

    pub fn duplex_tm(&self, seq: &str) -> f64 {
        if seq.is_empty() {
            return f64::NEG_INFINITY;
        }
        if self.cached {
            if let Some(tm) = self.cache.lock().unwrap().get(seq) {
                return *tm;
            }
        }
        let tm = self.compute(seq);
        let tm = round_to(tm, self.config.precision);
        if self.cached {
            self.cache.lock().unwrap().insert(seq.to_string(), tm);
        }
        tm
    }

    fn compute(&self, seq: &str) -> f64 {
        let cfg = &self.config;
        match cfg.calculation_type {
            TmMethod::Wallace => wallace_tm(seq),
            TmMethod::Gc => gc_tm(seq, cfg),
            TmMethod::NearestNeighbour => nn_tm(
                seq,
                cfg.monovalent_millimolar(),
                cfg.dnac1,
                cfg.dnac2,
            ),
            // Offset the santalucia result by +3, which tracks the vendor
            // calculator for the high-fidelity product group.
            TmMethod::NebLike => {
                nn_tm(seq, 60.0 + 20.0, (500.0 / 6.0) * 7.0, 0.0) + 3.0
            }
        }
    }
}

/// Longest run of complementary pairing between `a` and the reverse
/// complement of the partner strand. Returns (start_a, start_b_rc, len).
fn longest_common_run(a: &[u8], b: &[u8]) -> Option<(usize, usize, usize)> {
    let mut best: Option<(usize, usize, usize)> = None;
    let mut prev = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut row = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                let run = prev[j] + 1;
                row[j + 1] = run;
                if best.map(|(_, _, len)| run > len).unwrap_or(true) {
                    best = Some((i + 1 - run, j + 1 - run, run));
                }
            }
        }
        prev = row;
    }
    best
}

/// Melting temperatures for hairpins, homodimers and heterodimers.
///
/// The structures are screened by the longest anti-parallel complementary
/// stem; a stem shorter than four pairs counts as "no structure" and
/// yields 0. The stem duplex Tm comes from the nearest-neighbour model
/// with the configured salt parameters.
pub struct StructureCalculator {
    monovalent: f64,
    dnac1: f64,
    precision: i32,
    cached: bool,
    hairpin_cache: Mutex<FxHashMap<String, f64>>,
    homodimer_cache: Mutex<FxHashMap<String, f64>>,
    heterodimer_cache: Mutex<FxHashMap<(String, String), f64>>,
}

impl StructureCalculator {
    pub fn new(
        monovalent: f64,
        divalent: f64,
        dntp: f64,
        precision: i32,
    ) -> Self {
        let mut mon = monovalent;
        if divalent > dntp {
            mon += 120.0 * (divalent - dntp).sqrt();
        }
        Self {
            monovalent: mon,
            dnac1: default_dnac1(),
            precision,
            cached: true,
            hairpin_cache: Mutex::new(FxHashMap::default()),
            homodimer_cache: Mutex::new(FxHashMap::default()),
            heterodimer_cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn from_temperature_config(cfg: &TemperatureConfig) -> Self {
        Self::new(cfg.k, cfg.mg, cfg.dntp, cfg.precision)
    }

    fn stem_tm(&self, stem: &str) -> f64 {
        if stem.len() < MIN_STEM {
            return 0f64;
        }
        let tm = nn_tm(stem, self.monovalent, self.dnac1, 0.0);
        round_to(tm.max(0f64), self.precision)
    }

    /// Tm of the best hairpin stem, 0 when no stem of at least four pairs
    /// with a three-base loop exists.
    pub fn hairpin_tm(&self, seq: &str) -> f64 {
        if seq.is_empty() {
            return 0f64;
        }
        if self.cached {
            if let Some(tm) = self.hairpin_cache.lock().unwrap().get(seq) {
                return *tm;
            }
        }
        let tm = self.compute_hairpin(seq);
        if self.cached {
            self.hairpin_cache
                .lock()
                .unwrap()
                .insert(seq.to_string(), tm);
        }
        tm
    }

    fn compute_hairpin(&self, seq: &str) -> f64 {
        let n = seq.len();
        let rc = reverse_complement(seq);
        let a = seq.as_bytes();
        let b = rc.as_bytes();
        let mut best_len = 0usize;
        let mut best_start = 0usize;
        // A run of k matches at (i, p) against the reverse complement
        // pairs seq[i..i+k] with seq[j..j+k] where j = n - p - k; it is a
        // hairpin when the partner arm lies downstream of a loop.
        let mut prev = vec![0usize; n + 1];
        for i in 0..n {
            let mut row = vec![0usize; n + 1];
            for p in 0..n {
                if a[i] == b[p] {
                    let run = prev[p] + 1;
                    row[p + 1] = run;
                    let start_a = i + 1 - run;
                    let partner = n - (p + 1);
                    if partner >= start_a + run + MIN_HAIRPIN_LOOP
                        && run > best_len
                    {
                        best_len = run;
                        best_start = start_a;
                    }
                }
            }
            prev = row;
        }
        if best_len < MIN_STEM {
            0f64
        } else {
            self.stem_tm(&seq[best_start..best_start + best_len])
        }
    }

    /// Tm of the best self-dimer stem between two copies of the primer.
    pub fn homodimer_tm(&self, seq: &str) -> f64 {
        if seq.is_empty() {
            return 0f64;
        }
        if self.cached {
            if let Some(tm) = self.homodimer_cache.lock().unwrap().get(seq) {
                return *tm;
            }
        }
        let rc = reverse_complement(seq);
        let tm = match longest_common_run(seq.as_bytes(), rc.as_bytes()) {
            Some((start, _, len)) if len >= MIN_STEM => {
                self.stem_tm(&seq[start..start + len])
            }
            _ => 0f64,
        };
        if self.cached {
            self.homodimer_cache
                .lock()
                .unwrap()
                .insert(seq.to_string(), tm);
        }
        tm
    }

    /// Tm of the best cross-dimer stem between two different primers.
    pub fn heterodimer_tm(&self, seq: &str, other: &str) -> f64 {
        if seq.is_empty() || other.is_empty() {
            return 0f64;
        }
        let key = (seq.to_string(), other.to_string());
        if self.cached {
            if let Some(tm) = self.heterodimer_cache.lock().unwrap().get(&key)
            {
                return *tm;
            }
        }
        let rc = reverse_complement(other);
        let tm = match longest_common_run(seq.as_bytes(), rc.as_bytes()) {
            Some((start, _, len)) if len >= MIN_STEM => {
                self.stem_tm(&seq[start..start + len])
            }
            _ => 0f64,
        };
        if self.cached {
            self.heterodimer_cache.lock().unwrap().insert(key, tm);
        }
        tm
    }
}

/// Validate a sequence before handing it to a calculator.
pub fn checked_duplex_tm(
    calculator: &TemperatureCalculator,
    seq: &str,
) -> MakerResult<f64> {
    if seq.is_empty() {
        return Err(MakerError::EmptySequence);
    }
    crate::dna::validate_dna(seq)?;
    Ok(calculator.duplex_tm(seq))
}

#[cfg(test)]
mod thermo_tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_wallace() {
        // 2*(A+T) + 4*(G+C)
        assert_approx_eq!(wallace_tm("AATT"), 8.0, 1e-9);
        assert_approx_eq!(wallace_tm("GGCC"), 16.0, 1e-9);
    }

    #[test]
    fn test_empty_sequence_semantics() {
        let calc = TemperatureConfig::default().create_calculator();
        assert_eq!(calc.duplex_tm(""), f64::NEG_INFINITY);
        let structs = StructureCalculator::new(50.0, 2.0, 0.2, 2);
        assert_eq!(structs.hairpin_tm(""), 0f64);
        assert_eq!(structs.homodimer_tm(""), 0f64);
        assert_eq!(structs.heterodimer_tm("", "ACGT"), 0f64);
    }

    #[test]
    fn test_rounding_is_stable() {
        let mut config = TemperatureConfig::default();
        config.precision = 1;
        let calc = config.create_calculator();
        let seq = "GATTACAGATTACAGATTACA";
        let first = calc.duplex_tm(seq);
        let second = calc.duplex_tm(seq);
        assert_eq!(first.to_bits(), second.to_bits());
        assert_approx_eq!(first * 10.0, (first * 10.0).round(), 1e-9);
    }

    #[test]
    fn test_nn_tm_reasonable_range() {
        let calc = TemperatureConfig::default().create_calculator();
        let tm = calc.duplex_tm("AGCGTCAGACCATAAGCTAGC");
        assert!(tm > 40.0 && tm < 75.0, "unexpected NN Tm {tm}");
        // longer and more GC-rich melts higher
        let tm_gc = calc.duplex_tm("AGCGTCAGACCGGGCCCTAGCGCG");
        assert!(tm_gc > tm);
    }

    #[test]
    fn test_gc_method_monotone_in_length() {
        let config = TemperatureConfig::default_gc_quickchange();
        let calc = config.create_calculator();
        let short = calc.duplex_tm("GATTACAGATTACA");
        let long = calc.duplex_tm("GATTACAGATTACAGATTACAGATTACA");
        assert!(long > short);
    }

    #[test]
    fn test_hairpin_detection() {
        let structs = StructureCalculator::new(50.0, 2.0, 0.2, 2);
        // GGGCGC ... GCGCCC carries a 6 bp stem around a 4 base loop
        let hp = structs.hairpin_tm("GGGCGCTTTTGCGCCC");
        assert!(hp > 0f64, "expected a hairpin, got {hp}");
        // no self complementarity
        assert_eq!(structs.hairpin_tm("AAAAAAAAAAAA"), 0f64);
    }

    #[test]
    fn test_heterodimer_symmetry_of_no_structure() {
        let structs = StructureCalculator::new(50.0, 2.0, 0.2, 2);
        assert_eq!(structs.heterodimer_tm("AAAAAAA", "CCCCCCC"), 0f64);
        let tm = structs.heterodimer_tm("AGCGTCAGACCA", "TGGTCTGACGCT");
        assert!(tm > 0f64);
    }
}
