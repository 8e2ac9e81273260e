use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::codon_usage::CodonUsage;
use crate::errs::{MakerError, MakerResult};

/// One IUPAC degenerate base, semantically a subset of {A, C, G, T}.
/// The bit mask is A=1, C=2, G=4, T=8; `Gap` is the empty set and only
/// ever appears as the identity of `union`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DegenerateBase(u8);

impl DegenerateBase {
    pub const GAP: DegenerateBase = DegenerateBase(0);

    pub fn parse_char(x: char) -> MakerResult<Self> {
        let mask = match x {
            'A' => 0b0001,
            'C' => 0b0010,
            'G' => 0b0100,
            'T' => 0b1000,
            'R' => 0b0101,
            'Y' => 0b1010,
            'S' => 0b0110,
            'W' => 0b1001,
            'K' => 0b1100,
            'M' => 0b0011,
            'B' => 0b1110,
            'D' => 0b1101,
            'H' => 0b1011,
            'V' => 0b0111,
            'N' => 0b1111,
            '_' => 0b0000,
            _ => return Err(MakerError::InvalidDegenerateBase(x)),
        };
        Ok(Self(mask))
    }

    pub fn to_char(self) -> char {
        match self.0 {
            0b0001 => 'A',
            0b0010 => 'C',
            0b0100 => 'G',
            0b1000 => 'T',
            0b0101 => 'R',
            0b1010 => 'Y',
            0b0110 => 'S',
            0b1001 => 'W',
            0b1100 => 'K',
            0b0011 => 'M',
            0b1110 => 'B',
            0b1101 => 'D',
            0b1011 => 'H',
            0b0111 => 'V',
            0b1111 => 'N',
            _ => '_',
        }
    }

    pub fn from_concrete(b: u8) -> MakerResult<Self> {
        match b {
            b'A' => Ok(Self(0b0001)),
            b'C' => Ok(Self(0b0010)),
            b'G' => Ok(Self(0b0100)),
            b'T' => Ok(Self(0b1000)),
            _ => Err(MakerError::InvalidBase(b as char)),
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(self, base: u8) -> bool {
        Self::from_concrete(base).map(|b| self.0 & b.0 == b.0).unwrap_or(false)
    }

    pub fn is_concrete(self) -> bool {
        self.0.count_ones() == 1
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The concrete bases of this degenerate base, in ACGT order.
    pub fn bases(self) -> Vec<u8> {
        [b'A', b'C', b'G', b'T']
            .into_iter()
            .filter(|b| self.contains(*b))
            .collect()
    }
}

impl Display for DegenerateBase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// A triple of degenerate bases. A concrete codon has three singleton
/// bases; the engines never emit the empty-set codon.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DegenerateCodon {
    bases: [DegenerateBase; 3],
}

impl DegenerateCodon {
    pub fn parse_str(codon: &str) -> MakerResult<Self> {
        if codon.len() != 3 {
            return Err(MakerError::InvalidCodon(codon.to_string()));
        }
        let mut bases = [DegenerateBase::GAP; 3];
        for (i, c) in codon.chars().enumerate() {
            bases[i] = DegenerateBase::parse_char(c)?;
        }
        Ok(Self { bases })
    }

    pub fn from_concrete(codon: &str) -> MakerResult<Self> {
        let parsed = Self::parse_str(codon)?;
        if parsed.bases.iter().all(|b| b.is_concrete()) {
            Ok(parsed)
        } else {
            Err(MakerError::InvalidCodon(codon.to_string()))
        }
    }

    pub fn base(&self, i: usize) -> DegenerateBase {
        self.bases[i]
    }

    /// Component-wise base union.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            bases: [
                self.bases[0].union(other.bases[0]),
                self.bases[1].union(other.bases[1]),
                self.bases[2].union(other.bases[2]),
            ],
        }
    }

    /// Union of a non-empty collection of codons.
    pub fn union_all<'a>(
        codons: impl IntoIterator<Item = &'a DegenerateCodon>,
    ) -> Self {
        codons.into_iter().fold(
            Self { bases: [DegenerateBase::GAP; 3] },
            |acc, c| acc.union(c),
        )
    }

    /// All concrete codons in the cartesian product of the base sets,
    /// at most 4^3 of them.
    pub fn expand(&self) -> Vec<String> {
        self.bases
            .iter()
            .map(|b| b.bases())
            .multi_cartesian_product()
            .map(|bs| {
                // three ASCII bases
                String::from_utf8(bs).expect("concrete bases are ASCII")
            })
            .collect()
    }

    /// Decode to the set of amino acids reached by any member of the
    /// cartesian product, stop codons dropped, deduplicated and sorted.
    pub fn to_aminos(&self, usage: &CodonUsage) -> Vec<char> {
        self.expand()
            .iter()
            .filter_map(|codon| usage.translate(codon))
            .unique()
            .sorted()
            .collect()
    }

    pub fn is_concrete(&self) -> bool {
        self.bases.iter().all(|b| b.is_concrete())
    }
}

impl Display for DegenerateCodon {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.bases[0], self.bases[1], self.bases[2])
    }
}

/// Count positions where two codon strings carry exactly the same letter.
/// Degenerate letters only count when identical on both sides.
pub fn count_same_bases(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).filter(|(x, y)| x == y).count()
}

#[cfg(test)]
mod codon_tests {
    use super::*;
    use crate::codon_usage::CodonUsage;

    #[test]
    fn test_base_union_associative_idempotent() {
        let bases =
            ['A', 'C', 'G', 'T', 'R', 'Y', 'S', 'W', 'K', 'M', 'B', 'N']
                .map(|c| DegenerateBase::parse_char(c).unwrap());
        for x in bases {
            assert_eq!(x.union(x), x);
            for y in bases {
                for z in bases {
                    assert_eq!(x.union(y).union(z), x.union(y.union(z)));
                }
            }
        }
        let a = DegenerateBase::parse_char('A').unwrap();
        let g = DegenerateBase::parse_char('G').unwrap();
        assert_eq!(a.union(g).to_char(), 'R');
        assert_eq!(a.union(DegenerateBase::GAP), a);
    }

    #[test]
    fn test_expand_non_degenerate_triplets() {
        let cases = [
            ("AAA", vec!["AAA"]),
            ("NAA", vec!["AAA", "CAA", "GAA", "TAA"]),
            ("KAK", vec!["GAG", "GAT", "TAG", "TAT"]),
            (
                "WSY",
                vec![
                    "ACC", "ACT", "AGC", "AGT", "TCC", "TCT", "TGC", "TGT",
                ],
            ),
        ];
        for (degenerate, expected) in cases {
            let mut expanded =
                DegenerateCodon::parse_str(degenerate).unwrap().expand();
            expanded.sort();
            assert_eq!(expanded, expected);
        }
    }

    #[test]
    fn test_decode_to_aminos() {
        let usage = CodonUsage::for_organism("e-coli").unwrap();
        let cases = [
            ("AAA", vec!['K']),
            ("KAT", vec!['D', 'Y']),
            ("BGG", vec!['G', 'R', 'W']),
            // TAA and TGA are stops and must be dropped
            ("TRA", vec![]),
        ];
        for (codon, aminos) in cases {
            let decoded =
                DegenerateCodon::parse_str(codon).unwrap().to_aminos(&usage);
            assert_eq!(decoded, aminos);
        }
    }

    #[test]
    fn test_codon_union() {
        let a = DegenerateCodon::parse_str("RAT").unwrap();
        let b = DegenerateCodon::parse_str("RAG").unwrap();
        assert_eq!(a.union(&b).to_string(), "RAK");
        let c = DegenerateCodon::parse_str("TTT").unwrap();
        let d = DegenerateCodon::parse_str("CTT").unwrap();
        assert_eq!(c.union(&d).to_string(), "YTT");
    }

    #[test]
    fn test_count_same_bases() {
        assert_eq!(count_same_bases("AAT", "TAG"), 1);
        assert_eq!(count_same_bases("AAT", "KAT"), 2);
        assert_eq!(count_same_bases("AAT", "TAT"), 2);
        assert_eq!(count_same_bases("RAT", "RAG"), 2);
        assert_eq!(count_same_bases("AAT", "NNN"), 0);
    }
}
