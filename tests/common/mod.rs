//! Shared helpers for the workflow integration tests.

/// Deterministic mixed-GC DNA of the requested length.
pub fn synthetic_dna(length: usize) -> String {
    // simple linear-congruential walk over the alphabet keeps the GC
    // content near 50% without any RNG dependency in the fixtures
    let alphabet = [b'A', b'C', b'G', b'T'];
    let mut state = 0x2545_f491u64;
    let mut out = Vec::with_capacity(length);
    for _ in 0..length {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        out.push(alphabet[(state >> 33) as usize % 4]);
    }
    String::from_utf8(out).expect("alphabet is ASCII")
}

/// Synthetic DNA with the codon `GAA` (Glu) planted at the given
/// zero-based amino positions so that `E<position>X` mutations read
/// naturally against the template.
pub fn dna_with_glu_codons(length: usize, amino_positions: &[usize]) -> String {
    let mut dna = synthetic_dna(length);
    for position in amino_positions {
        let offset = position * 3;
        assert!(offset + 3 <= dna.len());
        dna.replace_range(offset..offset + 3, "GAA");
    }
    dna
}
