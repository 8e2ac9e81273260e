use thiserror::Error;

pub type MakerResult<T> = Result<T, MakerError>;

#[derive(Error, Debug, PartialEq)]
pub enum MakerError {
    #[error("invalid DNA base {0}")]
    InvalidBase(char),
    #[error("invalid degenerate base {0}")]
    InvalidDegenerateBase(char),
    #[error("invalid codon {0}, should be 3 IUPAC letters")]
    InvalidCodon(String),
    #[error(
        "{0} amino acid is not valid - should be from IUPAC one letter \
         amino acid code"
    )]
    InvalidAmino(String),
    #[error("failed to parse mutation {0}")]
    InvalidMutationString(String),
    #[error("position must be positive number")]
    NonPositivePosition,
    #[error("mutations on same positions must have same amino")]
    ConflictingSourceAminos,
    #[error("mutations for multi target amino mutation must be on same position")]
    ConflictingPositions,
    #[error("{0} was not found in plasmid")]
    SequenceNotFound(String),
    #[error("{0} position is ambiguous")]
    AmbiguousSequence(String),
    #[error("missing required sequence field: {0}")]
    MissingSequence(&'static str),
    #[error("empty sequence")]
    EmptySequence,
    #[error("unknown organism {0}")]
    UnknownOrganism(String),
    #[error("no codon with usage above threshold {threshold} for amino {amino}")]
    NoCodonAboveThreshold { amino: char, threshold: String },
    #[error(
        "primer parameters are too restrictive and resulted in no possible \
         overlap, consider lowering min 5' size"
    )]
    NoOverlapWindow,
    #[error("no valid site split covers the requested mutations")]
    EmptySiteSplit,
    #[error("{0}")]
    PasNoSolution(String),
    #[error("not possible to avoid specified combination of motifs")]
    MotifAvoidanceExhausted,
    #[error(
        "impossible to find reverse translation with specified configuration \
         of parameters in a reasonable amount of time, please try other values"
    )]
    ReverseTranslationTimeout,
    #[error("corrupt codon usage table: {0}")]
    CorruptUsageTable(String),
}
