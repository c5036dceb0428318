use serde::Deserialize;

use chemline::{
    parse, parse_with, AtomId, ErrorCategory, ErrorKind, ParseOptions, ParseResult,
};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn parsed(input: &str) -> ParseResult {
    parse(input).unwrap_or_else(|e| panic!("parse failed for {input:?}: {e}"))
}

fn strict(input: &str) -> ParseResult {
    parse_with(input, &ParseOptions::strict())
        .unwrap_or_else(|e| panic!("strict parse failed for {input:?}: {e}"))
}

fn element_multiset(r: &ParseResult) -> Vec<String> {
    let mut v: Vec<String> = r.atoms().map(|a| a.display_unit()).collect();
    v.sort();
    v
}

fn bond_multiset(r: &ParseResult) -> Vec<u8> {
    let mut v: Vec<u8> = r
        .atoms()
        .flat_map(|a| a.bonds.iter().map(|b| b.kind.order_class()))
        .collect();
    v.sort_unstable();
    v
}

// ---------------------------------------------------------------------------
// 1. Structural round trips
// ---------------------------------------------------------------------------

const ROUND_TRIP_CORPUS: &[&str] = &[
    "C",
    "CCO",
    "CC(C)C(=O)O",
    "C=(C)O",
    "C-C=C#C",
    "C1CCCCC1",
    "c1ccccc1",
    "c1cc[nH]cc1",
    "C1CC2CCC12",
    "C%10CCC%10",
    "[CH3][CH3]",
    "[13C]",
    "[2H]O[2H]",
    "[Fe+3]",
    "[O-2]",
    "C{+}N",
    "[NH4+].[Cl-]",
    "N#Cc1ccccc1",
    "CC>>CCO",
    "CC.CC>O>C",
];

#[test]
fn reserialized_text_reparses_to_the_same_shape() {
    for input in ROUND_TRIP_CORPUS {
        let first = parsed(input);
        let text = first.to_notation().unwrap();
        let second = parse(&text)
            .unwrap_or_else(|e| panic!("reparse of {text:?} (from {input:?}): {e}"));
        assert_eq!(
            element_multiset(&first),
            element_multiset(&second),
            "atom multiset diverged: {input:?} -> {text:?}"
        );
        assert_eq!(
            bond_multiset(&first),
            bond_multiset(&second),
            "bond multiset diverged: {input:?} -> {text:?}"
        );
        assert_eq!(
            first.reaction_marks().len(),
            second.reaction_marks().len(),
            "zone structure diverged: {input:?} -> {text:?}"
        );
    }
}

// ---------------------------------------------------------------------------
// 2. Strict mode saturates valences
// ---------------------------------------------------------------------------

#[test]
fn strict_mode_leaves_every_organic_atom_at_an_allowed_valence() {
    let corpus = [
        "C", "N", "CCO", "c1ccccc1", "CC(=O)O", "C#N", "CC(C)(C)C",
        "C1CCCCC1", "ClC(Cl)(Cl)Cl", "CC(=O)OC",
    ];
    for input in corpus {
        let r = strict(input);
        for mol in r.molecules() {
            for atom in mol.atoms() {
                if atom.charge != 0 || atom.radical {
                    continue;
                }
                let Some(allowed) =
                    chemline::element::organic_valences(atom.core_symbol())
                else {
                    continue;
                };
                let weight = chemline::graph::bond_weight(mol, atom.id);
                assert!(
                    allowed.iter().any(|&v| (weight - f64::from(v)).abs() < 1e-9),
                    "{input:?}: atom {} ({}) at weight {weight}, allowed {allowed:?}",
                    atom.id,
                    atom.core_symbol()
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Ring digit pairing
// ---------------------------------------------------------------------------

#[test]
fn closed_digit_resolves_to_a_ring_anchored_at_its_first_atom() {
    for input in ["C1CCC1", "C%12CCC%12", "C1CC2CCC12", "C1C1"] {
        let r = parsed(input);
        assert!(r.rings().count() > 0, "{input:?} produced no rings");
        for ring in r.rings() {
            assert!(ring.member_count() >= 2, "{input:?}: ring too small");
            assert_eq!(
                ring.members[0], ring.start,
                "{input:?}: ring does not start at its opening atom"
            );
        }
    }
    let fused = parsed("C1CC2CCC12");
    let starts: Vec<(u16, AtomId)> =
        fused.rings().map(|ring| (ring.digit, ring.start)).collect();
    assert_eq!(starts, vec![(1, AtomId(0)), (2, AtomId(2))]);
}

// ---------------------------------------------------------------------------
// 4. Canonical examples
// ---------------------------------------------------------------------------

#[test]
fn ethanol_is_a_three_atom_chain() {
    let r = parsed("CCO");
    let mol = &r.molecules()[0];
    assert_eq!(mol.atom_count(), 3);
    assert_eq!(mol.bond_count(), 2);
    let symbols: Vec<&str> = mol.atoms().map(|a| a.core_symbol()).collect();
    assert_eq!(symbols, vec!["C", "C", "O"]);
    assert_eq!(strict("CCO").molecular_formula(), "C2H6O");
}

#[test]
fn benzene_resolves_to_an_aromatic_six_ring() {
    let r = parsed("c1ccccc1");
    let mol = &r.molecules()[0];
    assert_eq!(mol.atom_count(), 6);
    assert!(mol.atoms().all(|a| a.aromatic && a.core_symbol() == "C"));
    let ring = &mol.rings()[0];
    assert_eq!(ring.aromatic, Some(true));
    assert_eq!(ring.member_count(), 6);

    let hydrogenated = strict("c1ccccc1");
    assert_eq!(hydrogenated.atom_count(), 12);
    let implicit = hydrogenated.atoms().filter(|a| a.implicit).count();
    assert_eq!(implicit, 6);
    assert_eq!(hydrogenated.molecular_formula(), "C6H6");
}

#[test]
fn cyclopropane_ring_is_plain() {
    let r = parsed("C1CC1");
    let ring = &r.molecules()[0].rings()[0];
    assert_eq!(ring.member_count(), 3);
    assert_eq!(ring.aromatic, Some(false));
}

// ---------------------------------------------------------------------------
// 5. Ring errors
// ---------------------------------------------------------------------------

#[test]
fn unclosed_digit_is_a_ring_error_naming_the_digit() {
    let err = parse("C1CC").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Ring);
    assert_eq!(*err.kind(), ErrorKind::UnclosedRing(1));
}

#[test]
fn digit_pair_on_one_atom_is_a_syntax_error() {
    let err = parse("C11").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Syntax);
    assert_eq!(*err.kind(), ErrorKind::DuplicateRingDigit(1));
}

#[test]
fn multibyte_input_errors_instead_of_panicking() {
    for input in ["Cé", "[xé]", "[Né]", "[é]", "C{1é}", "C{é}", "é"] {
        let err = parse(input)
            .map(|_| panic!("{input:?} should not parse"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax, "{input:?}");
    }
}

// ---------------------------------------------------------------------------
// 6. Reaction zones
// ---------------------------------------------------------------------------

#[test]
fn empty_reagent_zone_sits_between_two_marks() {
    let r = parsed("CC>>CCO");
    assert_eq!(r.reaction_marks().len(), 2);
    let zones = r.zones();
    assert_eq!(zones.len(), 3);
    assert_eq!(zones[0].len(), 1);
    assert!(zones[1].is_empty());
    assert_eq!(zones[2].len(), 1);
    assert_eq!(zones[0][0].atom_count(), 2);
    assert_eq!(zones[2][0].atom_count(), 3);
}

// ---------------------------------------------------------------------------
// 7. Formula and mass table
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FormulaCase {
    input: String,
    molecular: String,
    empirical: String,
    condensed: String,
    mass: f64,
}

#[test]
fn formula_table() {
    let cases: Vec<FormulaCase> =
        serde_json::from_str(include_str!("cases/formulas.json")).unwrap();

    let mut failures = Vec::new();
    for case in &cases {
        let r = match parse_with(&case.input, &ParseOptions::strict()) {
            Ok(r) => r,
            Err(e) => {
                failures.push(format!("[parse] {}: {e}", case.input));
                continue;
            }
        };
        let molecular = r.molecular_formula();
        if molecular != case.molecular {
            failures.push(format!(
                "[molecular] {}: expected {:?}, got {molecular:?}",
                case.input, case.molecular
            ));
        }
        let empirical = r.empirical_formula();
        if empirical != case.empirical {
            failures.push(format!(
                "[empirical] {}: expected {:?}, got {empirical:?}",
                case.input, case.empirical
            ));
        }
        let condensed = r.condensed_formula(true);
        if condensed != case.condensed {
            failures.push(format!(
                "[condensed] {}: expected {:?}, got {condensed:?}",
                case.input, case.condensed
            ));
        }
        let mass = r.relative_mass();
        if (mass - case.mass).abs() > 0.01 {
            failures.push(format!(
                "[mass] {}: expected {}, got {mass}",
                case.input, case.mass
            ));
        }
    }

    if !failures.is_empty() {
        panic!(
            "{} formula table failures:\n{}",
            failures.len(),
            failures.join("\n")
        );
    }
}
