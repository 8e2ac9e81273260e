use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;

use mut_kit::dna::reverse_complement;
use mut_kit::pas::{
    pas_solve, PasConfig, PasInput, PasMutationInput, PasSequences,
};
use mut_kit::qclm::{qclm_solve, QclmInput, QclmSequences};
use mut_kit::ssm::types::{SsmConfig, SsmInput, SsmSequences};
use mut_kit::ssm::ssm_solve;

mod common;

use common::{dna_with_glu_codons, synthetic_dna};

#[test]
fn test_ssm_single_saturation_site_on_large_construct() {
    // ~5000 bp construct with one saturated glutamate at amino 160
    let goi = dna_with_glu_codons(600, &[159]);
    let five_flank = synthetic_dna(2200);
    let three_flank = synthetic_dna(2200);
    let input = SsmInput {
        sequences: SsmSequences {
            forward_primer: five_flank[..25].to_string(),
            reverse_primer: reverse_complement(
                &three_flank[three_flank.len() - 25..],
            ),
            gene_of_interest: goi,
            five_end_flanking_sequence: Some(five_flank),
            three_end_flanking_sequence: Some(three_flank),
            plasmid: None,
        },
        config: SsmConfig::default(),
        mutations: vec!["E160X".to_string()],
        degenerate_codon: "NNS".to_string(),
    };

    let output = ssm_solve(&input).unwrap();
    assert_eq!(output.results.len(), 1);
    let result = &output.results[0];

    // exactly one forward and one reverse primer
    assert_eq!(result.forward_primer.direction, "forward");
    assert_eq!(result.reverse_primer.direction, "reverse");

    // overlap length within the configured window
    assert!(
        (input.config.min_overlap_size..=input.config.max_overlap_size)
            .contains(&result.overlap.length),
        "overlap length {}",
        result.overlap.length
    );

    // the overlap substrings are reverse complements of each other:
    // both normal-order views agree and the reverse primer is emitted
    // on the opposite strand
    let fw = &result.forward_primer;
    let rv = &result.reverse_primer;
    let fw_start = fw.normal_order_start;
    let rv_start = rv.normal_order_start;
    let overlap_start = fw_start.max(rv_start);
    let fw_sub = &fw.normal_order_sequence[(overlap_start - fw_start)
        as usize
        ..(overlap_start - fw_start) as usize + result.overlap.length];
    let rv_sub = &rv.normal_order_sequence[(overlap_start - rv_start)
        as usize
        ..(overlap_start - rv_start) as usize + result.overlap.length];
    assert_eq!(fw_sub, rv_sub);
    assert_eq!(
        rv.sequence,
        reverse_complement(&rv.normal_order_sequence)
    );
    assert_eq!(
        reverse_complement(&rv.sequence),
        rv.normal_order_sequence
    );

    // the mutated codon inside each primer is the degenerate NNS
    let mutation_pos = (160 - 1) * 3 + output.goi_offset as isize;
    for primer in [fw, rv] {
        let relative = (mutation_pos - primer.normal_order_start) as usize;
        assert_eq!(&primer.normal_order_sequence[relative..relative + 3], "NNS");
    }

    // reported 3' temperatures fall in the reaction ranges when the
    // parameters are flagged in range
    if result.parameters_in_range {
        assert!(output
            .forward_temperature
            .contains(fw.three_end_temperature));
        assert!(output
            .reverse_temperature
            .contains(rv.three_end_temperature));
        assert!(output
            .overlap_temperature
            .contains(result.overlap.temperature));
    }
}

#[test]
fn test_qclm_four_substitutions_one_site() {
    let goi = dna_with_glu_codons(300, &[51]);
    let input = QclmInput {
        sequences: QclmSequences {
            gene_of_interest: goi,
            five_end_flanking_sequence: synthetic_dna(60),
            three_end_flanking_sequence: synthetic_dna(60),
        },
        config: Default::default(),
        mutations: ["E52W", "E52L", "E52F", "E52A"]
            .iter()
            .map(|m| m.to_string())
            .collect(),
    };
    assert!(input.config.use_degeneracy_codon);

    let mut rng = StdRng::seed_from_u64(42);
    let output = qclm_solve(&input, &mut rng).unwrap();
    assert!(!output.results.is_empty());

    // all primers sit at the single requested site and their degenerate
    // codons jointly decode to a superset of {W, L, F, A}
    let mut decoded: HashSet<char> = HashSet::new();
    for result in &output.results {
        assert_eq!(result.primers.len(), 1);
        for codons in
            result.primers.iter().map(|p| &p.degenerate_codons)
        {
            assert_eq!(codons.len(), 1);
            let parsed =
                mut_kit::codon::DegenerateCodon::parse_str(&codons[0])
                    .unwrap();
            decoded.extend(parsed.to_aminos(
                mut_kit::codon_usage::CodonUsage::for_organism("e-coli")
                    .unwrap(),
            ));
        }
    }
    for amino in ['W', 'L', 'F', 'A'] {
        assert!(decoded.contains(&amino), "missing {amino}");
    }
    assert!(output.mutation_coverage > 0.99);
}

#[test]
fn test_qclm_two_adjacent_sites_share_primer() {
    let goi = dna_with_glu_codons(300, &[51, 52]);
    let input = QclmInput {
        sequences: QclmSequences {
            gene_of_interest: goi,
            five_end_flanking_sequence: synthetic_dna(60),
            three_end_flanking_sequence: synthetic_dna(60),
        },
        config: Default::default(),
        mutations: ["E52W", "E52I", "E53W", "E53I"]
            .iter()
            .map(|m| m.to_string())
            .collect(),
    };

    let mut rng = StdRng::seed_from_u64(7);
    let output = qclm_solve(&input, &mut rng).unwrap();
    assert!(!output.results.is_empty());

    // positions of the two sites in the full sequence
    let site_a = 60 + 51 * 3;
    let site_b = 60 + 52 * 3;

    // every emitted primer covers a subset of the requested sites and
    // the union of covered sites is exactly the requested set
    let mut covered = HashSet::new();
    for result in &output.results {
        for primer in &result.primers {
            let start = primer.start;
            let end = primer.start + primer.length;
            for site in [site_a, site_b] {
                if (start..end).contains(&site) {
                    covered.insert(site);
                }
            }
            // two-codon tuples indicate a joint primer for both sites
            if primer.degenerate_codons.len() == 2 {
                assert!((start..end).contains(&site_a));
                assert!((start..end).contains(&site_b));
            }
        }
    }
    assert_eq!(covered, HashSet::from([site_a, site_b]));
}

#[test]
fn test_pas_motif_avoidance_failure_is_loud() {
    let goi = dna_with_glu_codons(300, &[9]);
    let input = PasInput {
        sequences: PasSequences {
            gene_of_interest: goi,
            five_end_flanking_sequence: synthetic_dna(30),
            three_end_flanking_sequence: synthetic_dna(30),
        },
        is_dna_sequence: true,
        config: PasConfig {
            min_overlap_tm: 54.0,
            max_overlap_tm: 64.0,
            // N matches every base, so no oligo can avoid it
            avoided_motifs: vec!["N".to_string()],
            ..PasConfig::default()
        },
        mutations: vec![PasMutationInput {
            mutants: vec!["K".to_string()],
            position: 10,
            frequency: 0.5,
        }],
        is_mutations_as_codons: false,
    };

    let mut rng = StdRng::seed_from_u64(5);
    let result = pas_solve(&input, &mut rng);
    assert!(matches!(
        result,
        Err(mut_kit::MakerError::MotifAvoidanceExhausted)
    ));
}

#[test]
fn test_pas_forbidden_motifs_absent_from_oligos() {
    let goi = dna_with_glu_codons(300, &[9, 19, 39]);
    let motifs =
        vec!["AarI".to_string(), "AatII".to_string(), "NCT".to_string()];
    let input = PasInput {
        sequences: PasSequences {
            gene_of_interest: goi,
            five_end_flanking_sequence: synthetic_dna(30),
            three_end_flanking_sequence: synthetic_dna(30),
        },
        is_dna_sequence: true,
        config: PasConfig {
            min_overlap_tm: 54.0,
            max_overlap_tm: 64.0,
            avoided_motifs: motifs.clone(),
            ..PasConfig::default()
        },
        mutations: vec![PasMutationInput {
            mutants: vec!["K".to_string()],
            position: 10,
            frequency: 0.5,
        }],
        is_mutations_as_codons: false,
    };

    let mut rng = StdRng::seed_from_u64(11);
    match pas_solve(&input, &mut rng) {
        Ok(output) if output.message.is_none() => {
            let compiled =
                mut_kit::motifs::compile_motifs(&motifs).unwrap();
            for result in &output.results {
                for oligo in &result.oligos {
                    // emitted oligos may be reverse complemented; the
                    // guarantee applies to the synthesis strand drawn
                    // by the generator
                    let forward =
                        reverse_complement(&oligo.sequence);
                    assert!(
                        !mut_kit::motifs::any_motif_matches(
                            &compiled,
                            &oligo.sequence
                        ) || !mut_kit::motifs::any_motif_matches(
                            &compiled,
                            &forward
                        )
                    );
                }
            }
        }
        // motif avoidance may legitimately exhaust its draws on this
        // template, which must surface as the dedicated error
        Ok(_) => {}
        Err(err) => assert!(matches!(
            err,
            mut_kit::MakerError::MotifAvoidanceExhausted
        )),
    }
}
