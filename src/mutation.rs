use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use itertools::Itertools;
use nom::bytes::complete::take_while1;
use nom::character::complete::anychar;
use nom::combinator::{all_consuming, map_res};
use nom::sequence::tuple;
use nom::IResult;

use crate::codon_usage::is_valid_amino;
use crate::dna::CODON_LENGTH;
use crate::errs::{MakerError, MakerResult};

/// A requested substitution at a single site, e.g. `E42L`.
/// `position` is the zero-based nucleotide offset of the codon start in
/// the full working sequence; `original_position` the one-based amino
/// index the user wrote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AminoMutation {
    pub position: usize,
    pub old_amino: char,
    pub new_amino: char,
    pub original_string: String,
    pub original_position: usize,
}

impl AminoMutation {
    pub fn length(&self) -> usize {
        CODON_LENGTH
    }

    pub fn end(&self) -> usize {
        self.position + CODON_LENGTH
    }
}

impl Display for AminoMutation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.original_string)
    }
}

fn parse_mutation_inner(input: &str) -> IResult<&str, (char, usize, char)> {
    let position = map_res(
        take_while1(|c: char| c.is_ascii_digit()),
        |digits: &str| digits.parse::<usize>(),
    );
    all_consuming(tuple((anychar, position, anychar)))(input)
        .map(|(rest, parsed)| (rest, parsed))
}

/// Parse a mutation string like `E42L` into an [AminoMutation], shifting
/// the one-based amino position to a zero-based nucleotide offset within
/// the full sequence.
pub fn parse_amino_mutation(
    mutation: &str,
    gene_of_interest_offset: usize,
) -> MakerResult<AminoMutation> {
    let (_, (old_amino, one_based, new_amino)) =
        parse_mutation_inner(mutation).map_err(|_| {
            MakerError::InvalidMutationString(mutation.to_string())
        })?;

    if one_based < 1 {
        return Err(MakerError::NonPositivePosition);
    }
    if !is_valid_amino(old_amino) {
        return Err(MakerError::InvalidAmino(format!(
            "original {old_amino}"
        )));
    }
    if !is_valid_amino(new_amino) && new_amino != 'X' {
        return Err(MakerError::InvalidAmino(format!("target {new_amino}")));
    }

    Ok(AminoMutation {
        position: (one_based - 1) * CODON_LENGTH + gene_of_interest_offset,
        old_amino,
        new_amino,
        original_string: mutation.to_string(),
        original_position: one_based,
    })
}

/// A single mutation site carrying possibly multiple target aminos. The
/// wild-type amino is always included in `new_aminos` so that identity
/// rows round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSite {
    pub position: usize,
    pub original_position: usize,
    pub old_amino: char,
    pub new_aminos: Vec<char>,
    originals: BTreeMap<char, String>,
}

impl MutationSite {
    pub fn from_mutations(
        mutations: Vec<AminoMutation>,
    ) -> MakerResult<Self> {
        let positions =
            mutations.iter().map(|m| m.position).unique().collect_vec();
        if positions.len() != 1 {
            return Err(MakerError::ConflictingPositions);
        }
        let old_aminos =
            mutations.iter().map(|m| m.old_amino).unique().collect_vec();
        if old_aminos.len() != 1 {
            return Err(MakerError::ConflictingSourceAminos);
        }

        let old_amino = old_aminos[0];
        let new_aminos = mutations
            .iter()
            .map(|m| m.new_amino)
            .chain(std::iter::once(old_amino))
            .unique()
            .sorted()
            .collect_vec();
        let originals = mutations
            .iter()
            .map(|m| (m.new_amino, m.original_string.clone()))
            .collect::<BTreeMap<char, String>>();

        Ok(Self {
            position: positions[0],
            original_position: mutations[0].original_position,
            old_amino,
            new_aminos,
            originals,
        })
    }

    pub fn start(&self) -> usize {
        self.position
    }

    pub fn end(&self) -> usize {
        self.position + CODON_LENGTH
    }

    pub fn length(&self) -> usize {
        CODON_LENGTH
    }

    /// The user-facing code for one target amino; the identity mutation
    /// is synthesised even when the user did not ask for it explicitly.
    pub fn mutation_string(&self, target_amino: char) -> String {
        if target_amino == self.old_amino {
            return format!(
                "{}{}{}",
                target_amino, self.original_position, target_amino
            );
        }
        self.originals
            .get(&target_amino)
            .cloned()
            .unwrap_or_else(|| {
                format!(
                    "{}{}{}",
                    self.old_amino, self.original_position, target_amino
                )
            })
    }

    pub fn user_string_with_aminos(&self, aminos: &[char]) -> String {
        format!(
            "{}{}{}",
            self.old_amino,
            self.original_position,
            aminos.iter().join("")
        )
    }
}

impl Display for MutationSite {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.old_amino,
            self.original_position,
            self.new_aminos.iter().join("")
        )
    }
}

/// Group single-amino mutations by position into one site per position,
/// sorted by position. Conflicting source aminos at one position are an
/// input error.
pub fn group_mutations(
    mutations: Vec<AminoMutation>,
) -> MakerResult<Vec<MutationSite>> {
    let mut by_position: BTreeMap<usize, Vec<AminoMutation>> =
        BTreeMap::new();
    for mutation in mutations {
        by_position.entry(mutation.position).or_default().push(mutation);
    }
    by_position
        .into_values()
        .map(MutationSite::from_mutations)
        .collect::<MakerResult<Vec<MutationSite>>>()
}

#[cfg(test)]
mod mutation_tests {
    use super::*;

    #[test]
    fn test_parse_amino_mutation() {
        let m = parse_amino_mutation("E42L", 0).unwrap();
        assert_eq!(m.position, 123);
        assert_eq!(m.old_amino, 'E');
        assert_eq!(m.new_amino, 'L');
        assert_eq!(m.original_position, 42);

        let shifted = parse_amino_mutation("E42L", 30).unwrap();
        assert_eq!(shifted.position, 153);

        // X is allowed as a target (degenerate scan), not as a source
        assert!(parse_amino_mutation("E42X", 0).is_ok());
        assert!(parse_amino_mutation("X42L", 0).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            parse_amino_mutation("EL", 0),
            Err(MakerError::InvalidMutationString(_))
        ));
        assert!(matches!(
            parse_amino_mutation("E0L", 0),
            Err(MakerError::NonPositivePosition)
        ));
        assert!(matches!(
            parse_amino_mutation("E42", 0),
            Err(MakerError::InvalidMutationString(_))
        ));
        assert!(matches!(
            parse_amino_mutation("B42L", 0),
            Err(MakerError::InvalidAmino(_))
        ));
    }

    #[test]
    fn test_group_mutations() {
        let mutations = ["E52W", "E52L", "E53K"]
            .iter()
            .map(|s| parse_amino_mutation(s, 0).unwrap())
            .collect_vec();
        let sites = group_mutations(mutations).unwrap();
        assert_eq!(sites.len(), 2);
        // wild type amino joins the target set
        assert_eq!(sites[0].new_aminos, vec!['E', 'L', 'W']);
        assert_eq!(sites[0].position, 153);
        assert_eq!(sites[1].new_aminos, vec!['E', 'K']);
    }

    #[test]
    fn test_group_rejects_conflicting_sources() {
        let mutations = ["E52W", "K52L"]
            .iter()
            .map(|s| parse_amino_mutation(s, 0).unwrap())
            .collect_vec();
        assert_eq!(
            group_mutations(mutations).unwrap_err(),
            MakerError::ConflictingSourceAminos
        );
    }

    #[test]
    fn test_mutation_string_round_trip() {
        let mutations = ["E52W", "E52L"]
            .iter()
            .map(|s| parse_amino_mutation(s, 0).unwrap())
            .collect_vec();
        let site = group_mutations(mutations).unwrap().remove(0);
        assert_eq!(site.mutation_string('W'), "E52W");
        assert_eq!(site.mutation_string('E'), "E52E");
    }
}
