use std::fmt::{Display, Formatter};

use derive_new::new;

use crate::dna::gc_percent;
use crate::errs::{MakerError, MakerResult};
use crate::mutation::AminoMutation;
use crate::thermo::TemperatureCalculator;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The template sequence for a mutagenesis run together with the sorted,
/// zero-based codon-start offsets of its mutation sites.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct MutagenesisDna {
    pub sequence: String,
    pub mutation_sites: Vec<usize>,
}

impl MutagenesisDna {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// A primer as a directional window over a parent sequence. `start` is
/// the 5' anchor in the parent: for reverse primers it is the highest
/// offset of the window and the annealing sequence is the reverse
/// complement of `normal_order_sequence`.
#[derive(Debug, Clone, Eq)]
pub struct Primer {
    pub direction: Direction,
    pub start: usize,
    pub length: usize,
    pub normal_order_sequence: String,
    normal_start: usize,
    normal_end: usize,
}

impl PartialEq for Primer {
    fn eq(&self, other: &Self) -> bool {
        self.normal_order_sequence == other.normal_order_sequence
            && self.start == other.start
    }
}

impl std::hash::Hash for Primer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normal_order_sequence.hash(state);
        self.start.hash(state);
    }
}

impl Primer {
    pub fn try_new(
        parent_sequence: &str,
        direction: Direction,
        start: usize,
        length: usize,
    ) -> MakerResult<Self> {
        if length == 0 {
            return Err(MakerError::EmptySequence);
        }
        if start >= parent_sequence.len() {
            return Err(MakerError::InvalidCodon(format!(
                "primer start {start} is not in sequence"
            )));
        }
        let (normal_start, normal_end) = match direction {
            Direction::Forward => (start, start + length),
            Direction::Reverse => {
                let normal_start = (start + 1)
                    .checked_sub(length)
                    .ok_or(MakerError::EmptySequence)?;
                (normal_start, start + 1)
            }
        };
        if normal_end > parent_sequence.len() {
            return Err(MakerError::InvalidCodon(format!(
                "primer end {normal_end} is not in sequence"
            )));
        }
        let normal_order_sequence =
            parent_sequence[normal_start..normal_end].to_string();
        Ok(Self {
            direction,
            start,
            length,
            normal_order_sequence,
            normal_start,
            normal_end,
        })
    }

    pub fn normal_start(&self) -> usize {
        self.normal_start
    }

    pub fn normal_end(&self) -> usize {
        self.normal_end
    }

    pub fn five_end_size_from(&self, mutation: &AminoMutation) -> isize {
        match self.direction {
            Direction::Forward => {
                mutation.position as isize - self.normal_start as isize
            }
            Direction::Reverse => {
                self.normal_end as isize - mutation.end() as isize
            }
        }
    }

    pub fn three_end_size_from(&self, mutation: &AminoMutation) -> isize {
        match self.direction {
            Direction::Forward => {
                self.normal_end as isize - mutation.end() as isize
            }
            Direction::Reverse => {
                mutation.position as isize - self.normal_start as isize
            }
        }
    }

    pub fn gc_content(&self) -> f64 {
        gc_percent(&self.normal_order_sequence)
    }

    /// Leading G/C count from the 3' end of the annealing strand.
    pub fn gc_clamp(&self) -> usize {
        let bases: Box<dyn Iterator<Item = u8>> = match self.direction {
            Direction::Forward => {
                Box::new(self.normal_order_sequence.bytes().rev())
            }
            Direction::Reverse => {
                Box::new(self.normal_order_sequence.bytes())
            }
        };
        bases.take_while(|b| matches!(b, b'G' | b'C')).count()
    }

    /// The last `size` bases towards the 3' end of the annealing strand,
    /// in normal template order.
    pub fn three_end_with_size(&self, size: usize) -> &str {
        let size = std::cmp::min(size, self.length);
        match self.direction {
            Direction::Forward => {
                &self.normal_order_sequence[self.length - size..]
            }
            Direction::Reverse => &self.normal_order_sequence[..size],
        }
    }

    pub fn three_end_tm(
        &self,
        mutation: &AminoMutation,
        calculator: &TemperatureCalculator,
    ) -> f64 {
        let size = self.three_end_size_from(mutation);
        if size <= 0 {
            return -1f64;
        }
        calculator.duplex_tm(self.three_end_with_size(size as usize))
    }

    /// Overlapping window of two primers in normal order, with its length.
    pub fn overlap(&self, other: &Primer) -> (String, usize) {
        let start = std::cmp::max(self.normal_start, other.normal_start);
        let end = std::cmp::min(self.normal_end, other.normal_end);
        if start >= end {
            return (String::new(), 0);
        }
        let window = &self.normal_order_sequence
            [start - self.normal_start..end - self.normal_start];
        (window.to_string(), end - start)
    }

    pub fn mutated_sequence(
        &self,
        mutation_position: usize,
        replacement: &str,
    ) -> String {
        let offset = mutation_position - self.normal_start;
        crate::dna::splice(&self.normal_order_sequence, offset, replacement)
    }
}

impl Display for Primer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} primer {} on position {}",
            self.direction, self.normal_order_sequence, self.start
        )
    }
}

/// A primer over a mutagenesis template: offset, length and one codon per
/// mutation site inside [offset, offset + length). Identity and hashing
/// use all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct PrimerSpec {
    pub offset: usize,
    pub length: usize,
    pub codons: Vec<String>,
}

impl PrimerSpec {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    fn covered_sites<'a>(
        &self,
        base: &'a MutagenesisDna,
    ) -> impl Iterator<Item = usize> + 'a {
        let (offset, end) = (self.offset, self.end());
        base.mutation_sites
            .iter()
            .copied()
            .filter(move |site| (offset..end).contains(site))
    }

    /// Splice the codon tuple into the template window. The primer must
    /// carry a codon for every mutation site within its range.
    pub fn sequence(&self, base: &MutagenesisDna) -> String {
        let sites = self.covered_sites(base).collect::<Vec<usize>>();
        assert_eq!(
            sites.len(),
            self.codons.len(),
            "primer codons do not match covered sites"
        );
        let mut sequence =
            base.sequence[self.offset..self.end()].to_string();
        for (site, codon) in sites.iter().zip(self.codons.iter()) {
            let relative = site - self.offset;
            sequence = crate::dna::splice(&sequence, relative, codon);
        }
        sequence
    }

    /// The primer sequence with every base differing from the wild type
    /// replaced by the sentinel 'X', so that a melting temperature
    /// computed on it only reflects the annealing bases.
    pub fn mismatch_sequence(&self, base: &MutagenesisDna) -> String {
        let mutated = self.sequence(base);
        let original = &base.sequence[self.offset..self.end()];
        original
            .chars()
            .zip(mutated.chars())
            .map(|(o, m)| if o == m { o } else { 'X' })
            .collect()
    }

    pub fn five_end_size(&self, first_site: usize) -> isize {
        first_site as isize - self.offset as isize
    }

    pub fn three_end_size(&self, last_site: usize) -> isize {
        self.end() as isize - last_site as isize
    }
}

#[cfg(test)]
mod primer_tests {
    use super::*;
    use crate::mutation::parse_amino_mutation;

    const PARENT: &str = "AAACCCGGGTTTAAACCCGGGTTT";

    #[test]
    fn test_forward_reverse_windows() {
        let fw =
            Primer::try_new(PARENT, Direction::Forward, 3, 6).unwrap();
        assert_eq!(fw.normal_order_sequence, "CCCGGG");
        assert_eq!(fw.normal_start(), 3);
        assert_eq!(fw.normal_end(), 9);

        let rv =
            Primer::try_new(PARENT, Direction::Reverse, 8, 6).unwrap();
        assert_eq!(rv.normal_order_sequence, "CCCGGG");
        assert_eq!(rv.normal_start(), 3);
        assert_eq!(rv.normal_end(), 9);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        assert!(Primer::try_new(PARENT, Direction::Forward, 20, 10).is_err());
        assert!(Primer::try_new(PARENT, Direction::Reverse, 2, 6).is_err());
        assert!(Primer::try_new(PARENT, Direction::Forward, 0, 0).is_err());
    }

    #[test]
    fn test_end_sizes() {
        // mutation at amino 3 -> nucleotide 6
        let mutation = parse_amino_mutation("G3L", 0).unwrap();
        let fw =
            Primer::try_new(PARENT, Direction::Forward, 3, 12).unwrap();
        assert_eq!(fw.five_end_size_from(&mutation), 3);
        assert_eq!(fw.three_end_size_from(&mutation), 6);

        let rv =
            Primer::try_new(PARENT, Direction::Reverse, 14, 12).unwrap();
        assert_eq!(rv.three_end_size_from(&mutation), 3);
        assert_eq!(rv.five_end_size_from(&mutation), 6);
    }

    #[test]
    fn test_gc_clamp_direction() {
        let fw =
            Primer::try_new(PARENT, Direction::Forward, 3, 6).unwrap();
        // forward clamp reads from the right end: GGG -> 3 + CCC -> 6
        assert_eq!(fw.gc_clamp(), 6);
        let fw_at =
            Primer::try_new(PARENT, Direction::Forward, 9, 6).unwrap();
        assert_eq!(fw_at.gc_clamp(), 0);
    }

    #[test]
    fn test_overlap() {
        let fw =
            Primer::try_new(PARENT, Direction::Forward, 3, 9).unwrap();
        let rv =
            Primer::try_new(PARENT, Direction::Reverse, 14, 9).unwrap();
        let (overlap, len) = fw.overlap(&rv);
        assert_eq!(len, 6);
        assert_eq!(overlap, "GGGTTT");
    }

    #[test]
    fn test_spec_sequence_and_mismatch() {
        let base = MutagenesisDna::new(PARENT.to_string(), vec![6]);
        let spec = PrimerSpec::new(3, 9, vec!["TAT".to_string()]);
        assert_eq!(spec.sequence(&base), "CCCTATTTT");
        let mismatch = spec.mismatch_sequence(&base);
        assert_eq!(mismatch, "CCCXXXTTT");
    }
}
