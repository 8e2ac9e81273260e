//! Restriction-site motif catalogue and degenerate-pattern expansion.
//!
//! Avoided motifs can be given either as a known enzyme name (AarI,
//! AatII, ...) or as a raw IUPAC-degenerate pattern such as `NCT`; both
//! compile down to regular expressions over concrete bases.

use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::errs::{MakerError, MakerResult};

#[rustfmt::skip]
const MOTIF_TABLE: &[(&str, &str)] = &[
    ("AarI", "CACCTGC"), ("AatII", "GACGTC"), ("Acc65I", "GGTACC"),
    ("AccI", "GTMKAC"), ("AclI", "AACGTT"), ("AcuI", "CTGAAG"),
    ("AfeI", "AGCGCT"), ("AflII", "CTTAAG"), ("AflIII", "ACRYGT"),
    ("AgeI", "ACCGGT"), ("AhdI", "GACNNNNNGTC"), ("AleI", "CACNNNNGTG"),
    ("AloI", "GAACNNNNNNTCC"), ("AlwNI", "CAGNNNCTG"), ("ApaI", "GGGCCC"),
    ("ApaLI", "GTGCAC"), ("ApoI", "RAATTY"), ("AscI", "GGCGCGCC"),
    ("AseI", "ATTAAT"), ("AsiSI", "GCGATCGC"), ("AvrII", "CCTAGG"),
    ("BaeI", "ACNNNNGTAYC"), ("BamHI", "GGATCC"), ("BanI", "GGYRCC"),
    ("BanII", "GRGCYC"), ("BbeI", "GGCGCC"), ("BbsI", "GAAGAC"),
    ("BbvCI", "CCTCAGC"), ("BcgI", "CGANNNNNNTGC"), ("BciVI", "GTATCC"),
    ("BclI", "TGATCA"), ("BfrBI", "ATGCAT"), ("BglI", "GCCNNNNNGGC"),
    ("BglII", "AGATCT"), ("BlpI", "GCTNAGC"), ("Bme1580I", "GKGCMC"),
    ("BmgBI", "CACGTC"), ("BmrI", "ACTGGG"), ("BmtI", "GCTAGC"),
    ("BplI", "GAGNNNNNCTC"), ("BpmI", "CTGGAG"), ("Bpu10I", "CCTNAGC"),
    ("BpuEI", "CTTGAG"), ("BsaAI", "YACGTR"), ("BsaBI", "GATNNNNATC"),
    ("BsaHI", "GRCGYC"), ("BsaI", "GGTCTC"), ("BsaWI", "WCCGGW"),
    ("BsaXI", "ACNNNNNCTCC"), ("BseRI", "GAGGAG"), ("BseYI", "CCCAGC"),
    ("BsgI", "GTGCAG"), ("BsiEI", "CGRYCG"), ("BsiHKAI", "GWGCWC"),
    ("BsiWI", "CGTACG"), ("BsmBI", "CGTCTC"), ("BsmI", "GAATGC"),
    ("Bsp1286I", "GDGCHC"), ("BspEI", "TCCGGA"), ("BspHI", "TCATGA"),
    ("BspMI", "ACCTGC"), ("BsrBI", "CCGCTC"), ("BsrDI", "GCAATG"),
    ("BsrFI", "RCCGGY"), ("BsrGI", "TGTACA"), ("BssHII", "GCGCGC"),
    ("BssSI", "CACGAG"), ("BstAPI", "GCANNNNNTGC"), ("BstBI", "TTCGAA"),
    ("BstEII", "GGTNACC"), ("BstXI", "CCANNNNNNTGG"), ("BstYI", "RGATCY"),
    ("BstZ17I", "GTATAC"), ("Bsu36I", "CCTNAGG"), ("BtgI", "CCRYGG"),
    ("BtsI", "GCAGTG"), ("ClaI", "ATCGAT"), ("DraI", "TTTAAA"),
    ("DraIII", "CACNNNGTG"), ("DrdI", "GACNNNNNNGTC"), ("EaeI", "YGGCCR"),
    ("EagI", "CGGCCG"), ("EarI", "CTCTTC"), ("EciI", "GGCGGA"),
    ("Eco57MI", "CTGRAG"), ("EcoICRI", "GAGCTC"), ("EcoNI", "CCTNNNNNAGG"),
    ("EcoO109I", "RGGNCCY"), ("EcoRI", "GAATTC"), ("EcoRV", "GATATC"),
    ("FalI", "AAGNNNNNCTT"), ("FseI", "GGCCGGCC"), ("FspAI", "RTGCGCAY"),
    ("FspI", "TGCGCA"), ("HaeII", "RGCGCY"), ("Hin4I", "GAYNNNNNVTC"),
    ("HincII", "GTYRAC"), ("HindIII", "AAGCTT"), ("HpaI", "GTTAAC"),
    ("KasI", "GGCGCC"), ("KpnI", "GGTACC"), ("MfeI", "CAATTG"),
    ("MluI", "ACGCGT"), ("MmeI", "TCCRAC"), ("MscI", "TGGCCA"),
    ("MslI", "CAYNNNNRTG"), ("NaeI", "GCCGGC"), ("NarI", "GGCGCC"),
    ("NcoI", "CCATGG"), ("NdeI", "CATATG"), ("NgoMIV", "GCCGGC"),
    ("NheI", "GCTAGC"), ("NotI", "GCGGCCGC"), ("NruI", "TCGCGA"),
    ("NsiI", "ATGCAT"), ("NspI", "RCATGY"), ("PacI", "TTAATTAA"),
    ("PciI", "ACATGT"), ("PflMI", "CCANNNNNTGG"), ("PfoI", "TCCNGGA"),
    ("PmeI", "GTTTAAAC"), ("PmlI", "CACGTG"), ("PpiI", "GAACNNNNNCTC"),
    ("PpuMI", "RGGWCCY"), ("PshAI", "GACNNNNGTC"), ("PsiI", "TTATAA"),
    ("PspOMI", "GGGCCC"), ("PsrI", "GAACNNNNNNTAC"), ("PstI", "CTGCAG"),
    ("PvuI", "CGATCG"), ("PvuII", "CAGCTG"), ("RsrII", "CGGWCCG"),
    ("SacI", "GAGCTC"), ("SacII", "CCGCGG"), ("SalI", "GTCGAC"),
    ("SanDI", "GGGWCCC"), ("SapI", "GCTCTTC"), ("SbfI", "CCTGCAGG"),
    ("ScaI", "AGTACT"), ("SexAI", "ACCWGGT"), ("SfcI", "CTRYAG"),
    ("SfiI", "GGCCNNNNNGGCC"), ("SfoI", "GGCGCC"), ("SgrAI", "CRCCGGYG"),
    ("SmaI", "CCCGGG"), ("SmlI", "CTYRAG"), ("SnaBI", "TACGTA"),
    ("SpeI", "ACTAGT"), ("SphI", "GCATGC"), ("SrfI", "GCCCGGGC"),
    ("SspI", "AATATT"), ("StuI", "AGGCCT"), ("StyI", "CCWWGG"),
    ("SwaI", "ATTTAAAT"), ("TaqII", "GACCGA"), ("Tth111I", "GACNNNGTC"),
    ("XbaI", "TCTAGA"), ("XcmI", "CCANNNNNNNNNTGG"), ("XhoI", "CTCGAG"),
    ("XmaI", "CCCGGG"), ("XmnI", "GAANNNNTTC"), ("ZraI", "GACGTC"),
    // Aliases occasionally seen in input files
    ("BspDI", "ATCGAT"), ("MabI", "ACCWGGT"), ("AccIII", "TCCGGA"),
    ("Eco47III", "AGCGCT"), ("EheI", "GGCGCC"), ("BsePI", "GCGCGC"),
    ("BseAI", "TCCGGA"), ("Bsp119I", "TTCGAA"), ("Bsp120I", "GGGCCC"),
    ("BspTI", "CTTAAG"), ("Bsp1407I", "TGTACA"), ("BssT1I", "CCWWGG"),
    ("Eco52I", "CGGCCG"), ("Eco72I", "CACGTG"), ("Eco81I", "CCTNAGG"),
    ("Eco88I", "CYCGRG"), ("Eco91I", "GGTNACC"), ("Eco105I", "TACGTA"),
    ("Eco130I", "CCWWGG"), ("Eco147I", "AGGCCT"), ("EcoT22I", "ATGCAT"),
    ("Esp3I", "CGTCTC"), ("FauNDI", "CATATG"), ("KspI", "CCGCGG"),
    ("Kpn2I", "TCCGGA"), ("KflI", "GGGWCCC"), ("MauBI", "CGCGCGCG"),
    ("Mph1103I", "ATGCAT"), ("MreI", "CGCCGGCG"), ("MssI", "GTTTAAAC"),
    ("PaeI", "GCATGC"), ("PagI", "TCATGA"), ("PauI", "GCGCGC"),
    ("PdmI", "GAANNNNTTC"), ("Pfl23II", "CGTACG"), ("PscI", "ACATGT"),
    ("Psp5II", "RGGWCCY"), ("PspXI", "VCTCGAGB"), ("PteI", "GCGCGC"),
    ("SdaI", "CCTGCAGG"), ("SmiI", "ATTTAAAT"), ("SspDI", "GGCGCC"),
    ("VspI", "ATTAAT"),
];

lazy_static! {
    static ref MOTIFS: FxHashMap<&'static str, &'static str> =
        MOTIF_TABLE.iter().copied().collect();
}

/// Expand IUPAC-degenerate letters into regex character classes.
fn degenerate_pattern(motif: &str) -> MakerResult<Regex> {
    let mut pattern = String::with_capacity(motif.len() * 4);
    for c in motif.chars() {
        match c {
            'A' | 'C' | 'G' | 'T' => pattern.push(c),
            'R' => pattern.push_str("[GA]"),
            'Y' => pattern.push_str("[TC]"),
            'M' => pattern.push_str("[AC]"),
            'K' => pattern.push_str("[GT]"),
            'S' => pattern.push_str("[GC]"),
            'W' => pattern.push_str("[AT]"),
            'H' => pattern.push_str("[ACT]"),
            'B' => pattern.push_str("[GTC]"),
            'V' => pattern.push_str("[GCA]"),
            'D' => pattern.push_str("[GAT]"),
            'N' => pattern.push_str("[GATC]"),
            other => {
                return Err(MakerError::InvalidDegenerateBase(other));
            }
        }
    }
    Regex::new(&pattern).map_err(|_| {
        MakerError::InvalidMutationString(format!("motif {motif}"))
    })
}

/// Compile a user motif list: known enzyme names resolve through the
/// catalogue, everything else is treated as a raw degenerate pattern.
pub fn compile_motifs(motifs: &[String]) -> MakerResult<Vec<Regex>> {
    motifs
        .iter()
        .map(|motif| match MOTIFS.get(motif.as_str()) {
            Some(pattern) => degenerate_pattern(pattern),
            None => degenerate_pattern(motif),
        })
        .collect()
}

pub fn any_motif_matches(motifs: &[Regex], seq: &str) -> bool {
    motifs.iter().any(|m| m.is_match(seq))
}

#[cfg(test)]
mod motifs_tests {
    use super::*;

    #[test]
    fn test_named_motif_lookup() {
        let motifs = compile_motifs(&[
            "AarI".to_string(),
            "AatII".to_string(),
        ])
        .unwrap();
        assert!(any_motif_matches(&motifs, "TTTCACCTGCTTT"));
        assert!(any_motif_matches(&motifs, "AAGACGTCAA"));
        assert!(!any_motif_matches(&motifs, "TTTTTTTTTT"));
    }

    #[test]
    fn test_degenerate_pattern() {
        let motifs = compile_motifs(&["NCT".to_string()]).unwrap();
        assert!(any_motif_matches(&motifs, "AAGCTAA"));
        assert!(any_motif_matches(&motifs, "ACTAAAA"));
        assert!(!any_motif_matches(&motifs, "AAAAAA"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(compile_motifs(&["XQZ".to_string()]).is_err());
    }
}
