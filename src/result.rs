//! The finished product of a parse: molecules, reaction boundaries, and
//! every derived computation the crate offers.

use tracing::debug;

use crate::atom::{AtomGroup, AtomId};
use crate::bond::BondKind;
use crate::formula::{self, FormulaMode, FormulaUnit};
use crate::graph::{self, ValenceViolation};
use crate::molecule::Molecule;
use crate::notation::writer::{self, RingDigitsExhausted};
use crate::options::ParseOptions;
use crate::ring::Ring;
use crate::substruct::{self, Match, Pattern};

/// A fully validated parse. Molecules sit in input order; reaction marks
/// index into that list, each recording where the zone after one `>` arrow
/// begins. Atom identities are unique across the whole result.
#[derive(Debug, Clone)]
pub struct ParseResult {
    input: String,
    options: ParseOptions,
    molecules: Vec<Molecule>,
    marks: Vec<usize>,
    next_id: usize,
}

impl ParseResult {
    pub(crate) fn from_parts(
        input: String,
        options: ParseOptions,
        molecules: Vec<Molecule>,
        marks: Vec<usize>,
        next_id: usize,
    ) -> Self {
        ParseResult {
            input,
            options,
            molecules,
            marks,
            next_id,
        }
    }

    /// The original notation text.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The options the parse ran with.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    pub fn molecule(&self, index: usize) -> Option<&Molecule> {
        self.molecules.get(index)
    }

    /// Mutable access to one molecule, e.g. for a layout pass writing its
    /// geometry record.
    pub fn molecule_mut(&mut self, index: usize) -> Option<&mut Molecule> {
        self.molecules.get_mut(index)
    }

    /// Molecule-list indices where each post-arrow zone begins.
    pub fn reaction_marks(&self) -> &[usize] {
        &self.marks
    }

    /// The molecule list cut at every reaction mark. A plain parse without
    /// arrows yields a single zone.
    pub fn zones(&self) -> Vec<&[Molecule]> {
        let mut bounds = Vec::with_capacity(self.marks.len() + 2);
        bounds.push(0);
        bounds.extend_from_slice(&self.marks);
        bounds.push(self.molecules.len());
        bounds
            .windows(2)
            .map(|w| &self.molecules[w[0]..w[1]])
            .collect()
    }

    /// Every atom in molecule order.
    pub fn atoms(&self) -> impl Iterator<Item = &AtomGroup> {
        self.molecules.iter().flat_map(|mol| mol.atoms())
    }

    pub fn atom_count(&self) -> usize {
        self.molecules.iter().map(|mol| mol.atom_count()).sum()
    }

    /// Global lookup across every molecule.
    pub fn atom(&self, id: AtomId) -> Option<&AtomGroup> {
        self.molecules.iter().find_map(|mol| mol.atom(id))
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut AtomGroup> {
        self.molecules.iter_mut().find_map(|mol| mol.atom_mut(id))
    }

    /// Index of the molecule owning `id`.
    pub fn molecule_of(&self, id: AtomId) -> Option<usize> {
        self.molecules.iter().position(|mol| mol.contains(id))
    }

    /// Every resolved ring across every molecule.
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.molecules.iter().flat_map(|mol| mol.rings().iter())
    }

    pub fn net_charge(&self) -> i32 {
        self.molecules.iter().map(|mol| mol.net_charge()).sum()
    }

    // ---- Serialization ----

    /// Regenerated notation, implicit atoms hidden. Fails only when more
    /// ring closures stay open at once than digits exist to spell them.
    pub fn to_notation(&self) -> Result<String, RingDigitsExhausted> {
        writer::write_molecules(&self.molecules, &self.marks, &self.options, false)
    }

    /// Regenerated notation with synthesized hydrogens spelled out.
    pub fn to_notation_with_implicit(&self) -> Result<String, RingDigitsExhausted> {
        writer::write_molecules(&self.molecules, &self.marks, &self.options, true)
    }

    // ---- Formulas ----

    /// Hill-ordered tally over every atom.
    pub fn hill_counts(&self, mode: FormulaMode, with_charge: bool) -> Vec<FormulaUnit> {
        formula::hill_counts(self.atoms(), mode, with_charge)
    }

    /// Hill formula with bracket groups kept whole.
    pub fn molecular_formula(&self) -> String {
        formula::render(&self.hill_counts(FormulaMode::Groups, false), false)
    }

    pub fn molecular_formula_html(&self) -> String {
        formula::render(&self.hill_counts(FormulaMode::Groups, false), true)
    }

    /// Hill formula with bracket groups decomposed to elements.
    pub fn empirical_formula(&self) -> String {
        formula::render(&self.hill_counts(FormulaMode::Decomposed, false), false)
    }

    pub fn empirical_formula_html(&self) -> String {
        formula::render(&self.hill_counts(FormulaMode::Decomposed, false), true)
    }

    /// Condensed structural formula, molecules joined with `.`.
    pub fn condensed_formula(&self, collapse_runs: bool) -> String {
        let parts: Vec<String> = self
            .molecules
            .iter()
            .map(|mol| formula::condensed(mol, collapse_runs))
            .filter(|s| !s.is_empty())
            .collect();
        parts.join(".")
    }

    /// Total relative mass over every atom, implicit hydrogens included.
    pub fn relative_mass(&self) -> f64 {
        formula::relative_mass(self.atoms())
    }

    // ---- Substructure ----

    pub fn find_first(&self, pattern: &Pattern) -> Option<Match> {
        substruct::find_first(&self.molecules, pattern)
    }

    pub fn find_all(&self, pattern: &Pattern) -> Vec<Match> {
        substruct::find_all(&self.molecules, pattern)
    }

    pub fn match_rings(&self, pattern: &Pattern) -> Vec<Match> {
        substruct::match_rings(&self.molecules, pattern)
    }

    // ---- Graph surgery ----

    /// First bond-count violation anywhere in the result, as data.
    pub fn check_valences(&self) -> Option<ValenceViolation> {
        self.molecules.iter().find_map(graph::check_valences)
    }

    /// Tops every eligible atom up to its smallest satisfiable valence.
    /// Safe to call again; already satisfied atoms gain nothing.
    pub fn add_implicit_hydrogens(&mut self) -> Vec<AtomId> {
        let mut added = Vec::new();
        for i in 0..self.molecules.len() {
            added.extend(graph::add_implicit_hydrogens(
                &mut self.molecules[i],
                &mut self.next_id,
            ));
        }
        added
    }

    /// Removes the stored bond between `a` and `b` and returns its kind.
    /// A ring that relied on the removed record is dropped. If the shared
    /// molecule falls apart, the piece not containing `a` becomes a new
    /// molecule right after it, staying in the same reaction zone.
    pub fn sever_bond(&mut self, a: AtomId, b: AtomId) -> Option<BondKind> {
        let index = self.molecule_of(a)?;
        if !self.molecules[index].contains(b) {
            return None;
        }
        let kind = graph::sever_bond(&mut self.molecules[index], a, b)?;

        if graph::bonds_between(&self.molecules[index], a, b).is_empty() {
            let dropped = self.molecules[index]
                .extract_rings_if(|ring| cycle_adjacent(ring, a, b));
            if !dropped.is_empty() {
                debug!(count = dropped.len(), "rings dropped with severed bond");
            }
        }

        if !graph::reachable_from(&self.molecules[index], a).contains(&b) {
            let evicted = graph::prune_unreachable(&mut self.molecules[index], a);
            if !evicted.is_empty() {
                debug!(
                    atoms = evicted.atom_count(),
                    "molecule split by severed bond"
                );
                self.molecules.insert(index + 1, evicted);
                for mark in &mut self.marks {
                    if *mark > index {
                        *mark += 1;
                    }
                }
            }
        }
        Some(kind)
    }

    /// Inserts a molecule at `position` (clamped to the list length). A
    /// reaction boundary sitting at `position` shifts right, so the new
    /// molecule joins the zone before it; this makes insertion undo a
    /// removal from any zone that still has other members.
    ///
    /// The caller is responsible for atom identities not colliding with
    /// existing ones; identities already seen push the internal id counter
    /// past them so later synthesized hydrogens stay unique.
    pub fn insert_molecule(&mut self, position: usize, molecule: Molecule) {
        let position = position.min(self.molecules.len());
        if let Some(max) = molecule.ids().last() {
            self.next_id = self.next_id.max(max.0 + 1);
        }
        self.molecules.insert(position, molecule);
        for mark in &mut self.marks {
            if *mark >= position {
                *mark += 1;
            }
        }
    }

    /// Removes and returns the molecule at `position`. A boundary at
    /// `position` stays put and now precedes the next molecule; its zone
    /// may become empty.
    pub fn remove_molecule(&mut self, position: usize) -> Option<Molecule> {
        if position >= self.molecules.len() {
            return None;
        }
        let removed = self.molecules.remove(position);
        for mark in &mut self.marks {
            if *mark > position {
                *mark -= 1;
            }
        }
        Some(removed)
    }
}

/// Whether `a` and `b` sit next to each other on the ring's cycle,
/// wraparound pair included.
fn cycle_adjacent(ring: &Ring, a: AtomId, b: AtomId) -> bool {
    let n = ring.members.len();
    if n < 2 {
        return false;
    }
    (0..n).any(|i| {
        let x = ring.members[i];
        let y = ring.members[(i + 1) % n];
        (x == a && y == b) || (x == b && y == a)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::MoleculeGeometry;
    use crate::notation::{parse, parse_with};
    use approx::assert_relative_eq;

    fn strict(input: &str) -> ParseResult {
        parse_with(input, &ParseOptions::strict()).unwrap()
    }

    // ---- Inspection ----

    #[test]
    fn keeps_input_and_options() {
        let r = parse("CCO").unwrap();
        assert_eq!(r.input(), "CCO");
        assert_eq!(*r.options(), ParseOptions::default());
    }

    #[test]
    fn zones_follow_reaction_marks() {
        let r = parse("CC>O>C").unwrap();
        let zones = r.zones();
        let lens: Vec<usize> = zones.iter().map(|z| z.len()).collect();
        assert_eq!(lens, vec![1, 1, 1]);

        let empty_middle = parse("CC>>CCO").unwrap();
        assert_eq!(empty_middle.reaction_marks().len(), 2);
        let lens: Vec<usize> =
            empty_middle.zones().iter().map(|z| z.len()).collect();
        assert_eq!(lens, vec![1, 0, 1]);
    }

    #[test]
    fn atom_lookup_spans_molecules() {
        let r = parse("CC.O").unwrap();
        assert_eq!(r.atom(AtomId(2)).unwrap().core_symbol(), "O");
        assert_eq!(r.molecule_of(AtomId(0)), Some(0));
        assert_eq!(r.molecule_of(AtomId(2)), Some(1));
        assert_eq!(r.molecule_of(AtomId(9)), None);
    }

    #[test]
    fn net_charge_sums_every_molecule() {
        assert_eq!(parse("[NH4+].[Cl-]").unwrap().net_charge(), 0);
        assert_eq!(parse("[Ca+2]").unwrap().net_charge(), 2);
    }

    // ---- Derived computations ----

    #[test]
    fn formula_methods_agree_with_spelled_out_forms() {
        let r = strict("CCO");
        assert_eq!(r.molecular_formula(), "C2H6O");
        assert_eq!(r.molecular_formula_html(), "C<sub>2</sub>H<sub>6</sub>O");
        assert_eq!(r.condensed_formula(false), "CH3CH2OH");
        assert_relative_eq!(r.relative_mass(), 46.069, epsilon = 1e-6);

        let salt = parse("[NH4+].[NH4+]").unwrap();
        assert_eq!(salt.molecular_formula(), "(NH4)2");
        assert_eq!(salt.empirical_formula(), "H8N2");
    }

    #[test]
    fn condensed_formula_joins_molecules() {
        let r = strict("C.C");
        assert_eq!(r.condensed_formula(false), "CH4.CH4");
    }

    #[test]
    fn valence_check_returns_data_not_errors() {
        let r = parse("C(C)(C)(C)(C)C").unwrap();
        let v = r.check_valences().unwrap();
        assert_eq!(v.element, "C");
        assert_eq!(v.found, 5.0);
        assert_eq!(v.allowed, &[4]);

        let mut ok = parse("CC").unwrap();
        ok.add_implicit_hydrogens();
        assert!(ok.check_valences().is_none());
    }

    #[test]
    fn implicit_hydrogens_fill_and_stay_idempotent() {
        let mut r = parse("CCO").unwrap();
        let added = r.add_implicit_hydrogens();
        assert_eq!(added.len(), 6);
        assert_eq!(r.atom_count(), 9);
        assert_eq!(added[0], AtomId(3));
        assert!(r.add_implicit_hydrogens().is_empty());
        assert!(r.check_valences().is_none());
    }

    #[test]
    fn substructure_queries_route_through_the_result() {
        let r = parse("CCO").unwrap();
        let pattern = Pattern::new()
            .atom(crate::substruct::AtomPattern::element("c", "C"))
            .atom(crate::substruct::AtomPattern::element("o", "O"))
            .bond("c", "o", None);
        assert!(r.find_first(&pattern).is_some());
        assert_eq!(r.find_all(&pattern).len(), 1);
    }

    // ---- Graph surgery ----

    #[test]
    fn severing_a_chain_bond_splits_the_molecule() {
        let mut r = parse("CCO").unwrap();
        let kind = r.sever_bond(AtomId(1), AtomId(2)).unwrap();
        assert_eq!(kind, BondKind::Unspecified);
        assert_eq!(r.molecules().len(), 2);
        assert_eq!(r.molecule_of(AtomId(0)), Some(0));
        assert_eq!(r.molecule_of(AtomId(2)), Some(1));
        assert_eq!(r.atom_count(), 3);
    }

    #[test]
    fn severing_a_ring_edge_keeps_one_molecule_but_drops_the_ring() {
        let mut r = parse("C1CCCCC1").unwrap();
        assert_eq!(r.rings().count(), 1);
        let kind = r.sever_bond(AtomId(0), AtomId(1));
        assert!(kind.is_some());
        assert_eq!(r.molecules().len(), 1);
        assert_eq!(r.rings().count(), 0);
        assert_eq!(r.atom_count(), 6);
    }

    #[test]
    fn severing_across_molecules_is_a_no_op() {
        let mut r = parse("CC.O").unwrap();
        assert_eq!(r.sever_bond(AtomId(0), AtomId(2)), None);
        assert_eq!(r.molecules().len(), 2);
    }

    #[test]
    fn split_piece_stays_in_its_reaction_zone() {
        let mut r = parse("CCO>C>C").unwrap();
        assert_eq!(r.reaction_marks(), &[1, 2]);
        r.sever_bond(AtomId(1), AtomId(2)).unwrap();
        assert_eq!(r.molecules().len(), 4);
        assert_eq!(r.reaction_marks(), &[2, 3]);
        let lens: Vec<usize> = r.zones().iter().map(|z| z.len()).collect();
        assert_eq!(lens, vec![2, 1, 1]);
    }

    #[test]
    fn removal_then_insertion_restores_zone_shape() {
        let mut r = parse("CC.O>C").unwrap();
        assert_eq!(r.reaction_marks(), &[2]);
        let o = r.remove_molecule(1).unwrap();
        assert_eq!(r.reaction_marks(), &[1]);
        r.insert_molecule(1, o);
        assert_eq!(r.reaction_marks(), &[2]);
        let lens: Vec<usize> = r.zones().iter().map(|z| z.len()).collect();
        assert_eq!(lens, vec![2, 1]);
    }

    #[test]
    fn removing_a_zone_sole_member_leaves_the_zone_empty() {
        let mut r = parse("CC>O>C").unwrap();
        r.remove_molecule(1).unwrap();
        assert_eq!(r.reaction_marks(), &[1, 1]);
        let lens: Vec<usize> = r.zones().iter().map(|z| z.len()).collect();
        assert_eq!(lens, vec![1, 0, 1]);
    }

    #[test]
    fn inserted_molecule_bumps_the_id_counter() {
        let mut r = parse("C.O").unwrap();
        let tail = r.remove_molecule(1).unwrap();
        r.insert_molecule(1, tail);
        let added = r.add_implicit_hydrogens();
        assert!(!added.is_empty());
        let mut ids: Vec<AtomId> = r.atoms().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), r.atom_count());
    }

    #[test]
    fn geometry_attaches_through_molecule_mut() {
        let mut r = parse("CC").unwrap();
        r.molecule_mut(0)
            .unwrap()
            .set_geometry(MoleculeGeometry::new());
        assert!(r.molecule(0).unwrap().geometry().is_some());
    }
}
