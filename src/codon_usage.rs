use itertools::Itertools;
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::errs::{MakerError, MakerResult};

/// The 20 proteinogenic amino acids, IUPAC one-letter codes.
pub const IUPAC_AMINOS: &str = "ACDEFGHIKLMNPQRSTVWY";

pub fn is_valid_amino(a: char) -> bool {
    IUPAC_AMINOS.contains(a)
}

/// The standard genetic code. Stop codons translate to `None`.
pub fn translate_codon(codon: &str) -> Option<char> {
    let amino = match codon {
        "TTT" | "TTC" => 'F',
        "TTA" | "TTG" | "CTT" | "CTC" | "CTA" | "CTG" => 'L',
        "ATT" | "ATC" | "ATA" => 'I',
        "ATG" => 'M',
        "GTT" | "GTC" | "GTA" | "GTG" => 'V',
        "TCT" | "TCC" | "TCA" | "TCG" | "AGT" | "AGC" => 'S',
        "CCT" | "CCC" | "CCA" | "CCG" => 'P',
        "ACT" | "ACC" | "ACA" | "ACG" => 'T',
        "GCT" | "GCC" | "GCA" | "GCG" => 'A',
        "TAT" | "TAC" => 'Y',
        "CAT" | "CAC" => 'H',
        "CAA" | "CAG" => 'Q',
        "AAT" | "AAC" => 'N',
        "AAA" | "AAG" => 'K',
        "GAT" | "GAC" => 'D',
        "GAA" | "GAG" => 'E',
        "TGT" | "TGC" => 'C',
        "TGG" => 'W',
        "CGT" | "CGC" | "CGA" | "CGG" | "AGA" | "AGG" => 'R',
        "GGT" | "GGC" | "GGA" | "GGG" => 'G',
        "TAA" | "TAG" | "TGA" => return None,
        _ => return None,
    };
    Some(amino)
}

#[rustfmt::skip]
const E_COLI_USAGE: [(&str, f64); 64] = [
    ("TTT", 0.58), ("TTC", 0.42), ("TTA", 0.14), ("TTG", 0.13),
    ("TAT", 0.59), ("TAC", 0.41), ("TAA", 0.61), ("TAG", 0.09),
    ("CTT", 0.12), ("CTC", 0.10), ("CTA", 0.04), ("CTG", 0.47),
    ("CAT", 0.57), ("CAC", 0.43), ("CAA", 0.34), ("CAG", 0.66),
    ("ATT", 0.49), ("ATC", 0.39), ("ATA", 0.11), ("ATG", 1.00),
    ("AAT", 0.49), ("AAC", 0.51), ("AAA", 0.74), ("AAG", 0.26),
    ("TCT", 0.17), ("TCC", 0.15), ("TCA", 0.14), ("TCG", 0.14),
    ("TGT", 0.46), ("TGC", 0.54), ("TGA", 0.30), ("TGG", 1.00),
    ("CCT", 0.18), ("CCC", 0.13), ("CCA", 0.20), ("CCG", 0.49),
    ("CGT", 0.36), ("CGC", 0.36), ("CGA", 0.07), ("CGG", 0.11),
    ("ACT", 0.19), ("ACC", 0.40), ("ACA", 0.17), ("ACG", 0.25),
    ("AGT", 0.16), ("AGC", 0.25), ("AGA", 0.07), ("AGG", 0.04),
    ("GTT", 0.28), ("GTC", 0.20), ("GTA", 0.17), ("GTG", 0.35),
    ("GAT", 0.63), ("GAC", 0.37), ("GAA", 0.68), ("GAG", 0.32),
    ("GCT", 0.18), ("GCC", 0.26), ("GCA", 0.23), ("GCG", 0.33),
    ("GGT", 0.35), ("GGC", 0.37), ("GGA", 0.13), ("GGG", 0.15),
];

// S. cerevisiae
#[rustfmt::skip]
const YEAST_USAGE: [(&str, f64); 64] = [
    ("TTT", 0.59), ("TTC", 0.41), ("TTA", 0.28), ("TTG", 0.29),
    ("TAT", 0.56), ("TAC", 0.44), ("TAA", 0.47), ("TAG", 0.23),
    ("CTT", 0.13), ("CTC", 0.06), ("CTA", 0.14), ("CTG", 0.11),
    ("CAT", 0.64), ("CAC", 0.36), ("CAA", 0.69), ("CAG", 0.31),
    ("ATT", 0.46), ("ATC", 0.26), ("ATA", 0.27), ("ATG", 1.00),
    ("AAT", 0.59), ("AAC", 0.41), ("AAA", 0.58), ("AAG", 0.42),
    ("TCT", 0.26), ("TCC", 0.16), ("TCA", 0.21), ("TCG", 0.10),
    ("TGT", 0.63), ("TGC", 0.37), ("TGA", 0.30), ("TGG", 1.00),
    ("CCT", 0.31), ("CCC", 0.15), ("CCA", 0.42), ("CCG", 0.12),
    ("CGT", 0.14), ("CGC", 0.06), ("CGA", 0.07), ("CGG", 0.04),
    ("ACT", 0.35), ("ACC", 0.22), ("ACA", 0.30), ("ACG", 0.14),
    ("AGT", 0.16), ("AGC", 0.11), ("AGA", 0.47), ("AGG", 0.21),
    ("GTT", 0.39), ("GTC", 0.21), ("GTA", 0.21), ("GTG", 0.19),
    ("GAT", 0.65), ("GAC", 0.35), ("GAA", 0.70), ("GAG", 0.30),
    ("GCT", 0.38), ("GCC", 0.22), ("GCA", 0.29), ("GCG", 0.11),
    ("GGT", 0.47), ("GGC", 0.19), ("GGA", 0.22), ("GGG", 0.12),
];

/// Per-organism codon usage. Frequencies are relative within each amino
/// group; the reverse table maps amino -> codons. Loaded once per process
/// and treated as immutable.
pub struct CodonUsage {
    usages: FxHashMap<&'static str, f64>,
    back_table: FxHashMap<char, Vec<&'static str>>,
}

lazy_static! {
    static ref E_COLI: CodonUsage = CodonUsage::from_table(&E_COLI_USAGE);
    static ref YEAST: CodonUsage = CodonUsage::from_table(&YEAST_USAGE);
}

impl CodonUsage {
    fn from_table(table: &[(&'static str, f64)]) -> Self {
        let usages =
            table.iter().copied().collect::<FxHashMap<&'static str, f64>>();
        let mut back_table: FxHashMap<char, Vec<&'static str>> =
            FxHashMap::default();
        for (codon, _) in table.iter() {
            if let Some(amino) = translate_codon(codon) {
                back_table.entry(amino).or_default().push(codon);
            }
        }
        for codons in back_table.values_mut() {
            codons.sort();
        }
        Self { usages, back_table }
    }

    pub fn for_organism(name: &str) -> MakerResult<&'static CodonUsage> {
        match name {
            "e-coli" => Ok(&E_COLI),
            "yeast" => Ok(&YEAST),
            other => Err(MakerError::UnknownOrganism(other.to_string())),
        }
    }

    pub fn organisms() -> Vec<&'static str> {
        vec!["e-coli", "yeast"]
    }

    pub fn translate(&self, codon: &str) -> Option<char> {
        translate_codon(codon)
    }

    /// Relative usage of a concrete codon within its amino group.
    pub fn usage(&self, codon: &str) -> f64 {
        self.usages.get(codon).copied().unwrap_or(0f64)
    }

    pub fn codons_for(&self, amino: char) -> MakerResult<&[&'static str]> {
        self.back_table
            .get(&amino)
            .map(|v| v.as_slice())
            .ok_or_else(|| MakerError::InvalidAmino(amino.to_string()))
    }

    /// Codons for an amino with usage strictly above the threshold.
    pub fn codons_above_threshold(
        &self,
        amino: char,
        threshold: f64,
    ) -> MakerResult<Vec<&'static str>> {
        let candidates = self
            .codons_for(amino)?
            .iter()
            .copied()
            .filter(|codon| self.usage(codon) > threshold)
            .collect::<Vec<&'static str>>();
        if candidates.is_empty() {
            Err(MakerError::NoCodonAboveThreshold {
                amino,
                threshold: format!("{threshold}"),
            })
        } else {
            Ok(candidates)
        }
    }

    /// Product of usage frequencies over the concrete codons of a
    /// degenerate codon expansion.
    pub fn frequency_product<'a>(
        &self,
        codons: impl IntoIterator<Item = &'a String>,
    ) -> f64 {
        codons.into_iter().map(|c| self.usage(c)).product()
    }

    /// The highest-usage codon for an amino, used by the CAI-like score.
    pub fn max_usage(&self, amino: char) -> f64 {
        self.back_table
            .get(&amino)
            .map(|codons| {
                codons
                    .iter()
                    .map(|c| self.usage(c))
                    .fold(0f64, |a, b| a.max(b))
            })
            .unwrap_or(0f64)
    }

    /// Translate a DNA sequence codon by codon, stopping at a stop codon.
    pub fn translate_sequence(&self, dna: &str) -> String {
        dna.as_bytes()
            .chunks_exact(3)
            .map_while(|chunk| {
                let codon = std::str::from_utf8(chunk).ok()?;
                self.translate(codon)
            })
            .join("")
    }
}

#[cfg(test)]
mod codon_usage_tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_translate_codon() {
        assert_eq!(translate_codon("ATG"), Some('M'));
        assert_eq!(translate_codon("AAA"), Some('K'));
        assert_eq!(translate_codon("TAA"), None);
        assert_eq!(translate_codon("TGA"), None);
        assert_eq!(translate_codon("XYZ"), None);
    }

    #[test]
    fn test_usage_relative_within_groups() {
        let usage = CodonUsage::for_organism("e-coli").unwrap();
        // Lysine group sums to one
        let total: f64 =
            usage.codons_for('K').unwrap().iter().map(|c| usage.usage(c)).sum();
        assert_approx_eq!(total, 1.0, 1e-9);
        assert_approx_eq!(usage.usage("ATG"), 1.0, 1e-9);
        assert_eq!(usage.codons_for('W').unwrap(), &["TGG"]);
    }

    #[test]
    fn test_codons_above_threshold() {
        let usage = CodonUsage::for_organism("e-coli").unwrap();
        let leu = usage.codons_above_threshold('L', 0.1).unwrap();
        // CTA (0.04) must be filtered out
        assert!(!leu.contains(&"CTA"));
        assert!(leu.contains(&"CTG"));
        assert!(usage.codons_above_threshold('W', 1.5).is_err());
    }

    #[test]
    fn test_unknown_organism() {
        let err = CodonUsage::for_organism("martian").err().unwrap();
        assert_eq!(err, MakerError::UnknownOrganism("martian".to_string()));
    }

    #[test]
    fn test_translate_sequence() {
        let usage = CodonUsage::for_organism("e-coli").unwrap();
        assert_eq!(usage.translate_sequence("ATGAAATTTTAA"), "MKF");
    }
}
