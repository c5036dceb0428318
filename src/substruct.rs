//! Substructure matching: declarative atom/bond patterns bound against the
//! molecular graph by backtracking, plus a cyclic variant that walks every
//! resolved ring of the pattern's size.

use std::collections::{BTreeMap, BTreeSet};

use crate::atom::{AtomGroup, AtomId};
use crate::bond::BondKind;
use crate::graph;
use crate::molecule::Molecule;

/// One atom slot. Unset fields match any atom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomPattern {
    pub label: String,
    pub element: Option<String>,
    pub aromatic: Option<bool>,
    pub charge: Option<i32>,
}

impl AtomPattern {
    /// A slot matching any atom.
    pub fn any(label: impl Into<String>) -> Self {
        AtomPattern {
            label: label.into(),
            ..AtomPattern::default()
        }
    }

    /// A slot constrained to one element symbol.
    pub fn element(label: impl Into<String>, symbol: impl Into<String>) -> Self {
        AtomPattern {
            label: label.into(),
            element: Some(symbol.into()),
            ..AtomPattern::default()
        }
    }

    pub fn aromatic(mut self, flag: bool) -> Self {
        self.aromatic = Some(flag);
        self
    }

    pub fn charged(mut self, charge: i32) -> Self {
        self.charge = Some(charge);
        self
    }
}

/// A required bond between two labeled slots. `kind` of `None` accepts any
/// bond; a set kind compares by order class, so an unspecified chain bond
/// satisfies a `Single` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondPattern {
    pub from: String,
    pub to: String,
    pub kind: Option<BondKind>,
}

/// A query graph. Only declared bonds constrain adjacency; two slots with
/// no bond between them may bind bonded or unbonded atoms alike.
///
/// Patterns that reuse a label or whose bonds name an unknown label never
/// match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    pub atoms: Vec<AtomPattern>,
    pub bonds: Vec<BondPattern>,
}

impl Pattern {
    pub fn new() -> Self {
        Pattern::default()
    }

    pub fn atom(mut self, atom: AtomPattern) -> Self {
        self.atoms.push(atom);
        self
    }

    pub fn bond(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        kind: Option<BondKind>,
    ) -> Self {
        self.bonds.push(BondPattern {
            from: from.into(),
            to: to.into(),
            kind,
        });
        self
    }
}

/// One successful binding of pattern labels to atom identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub bindings: BTreeMap<String, AtomId>,
}

impl Match {
    pub fn get(&self, label: &str) -> Option<AtomId> {
        self.bindings.get(label).copied()
    }
}

fn atom_matches(pattern: &AtomPattern, atom: &AtomGroup) -> bool {
    if pattern
        .element
        .as_deref()
        .is_some_and(|symbol| symbol != atom.core_symbol())
    {
        return false;
    }
    if pattern.aromatic.is_some_and(|want| want != atom.aromatic) {
        return false;
    }
    if pattern.charge.is_some_and(|want| want != atom.charge) {
        return false;
    }
    true
}

fn kind_accepts(want: Option<BondKind>, found: BondKind) -> bool {
    want.is_none_or(|w| w.order_class() == found.order_class())
}

/// First binding of `pattern` anywhere in `molecules`, if any.
pub fn find_first(molecules: &[Molecule], pattern: &Pattern) -> Option<Match> {
    let mut matcher = Matcher::new(molecules, pattern)?;
    let mut results = Vec::new();
    matcher.recurse(0, &mut results, true);
    results.into_iter().next()
}

/// Every distinct binding of `pattern` across `molecules`. Label
/// orientations count separately: a two-slot chain pattern binds each
/// matching bond twice.
pub fn find_all(molecules: &[Molecule], pattern: &Pattern) -> Vec<Match> {
    let mut results = Vec::new();
    if let Some(mut matcher) = Matcher::new(molecules, pattern) {
        matcher.recurse(0, &mut results, false);
    }
    results
}

/// Binds the pattern cyclically against every resolved ring with the same
/// member count, trying all rotations in both directions. Declared bonds
/// still apply on top of the ring adjacency.
pub fn match_rings(molecules: &[Molecule], pattern: &Pattern) -> Vec<Match> {
    let n = pattern.atoms.len();
    let mut out: Vec<Match> = Vec::new();
    if n == 0 {
        return out;
    }
    let Some(index_of) = label_indices(pattern) else {
        return out;
    };
    for mol in molecules {
        for ring in mol.rings() {
            if ring.members.len() != n {
                continue;
            }
            for offset in 0..n {
                for reverse in [false, true] {
                    let Some(found) =
                        ring_assignment(mol, pattern, &index_of, &ring.members, offset, reverse)
                    else {
                        continue;
                    };
                    // Mirror assignments coincide on small rings.
                    if !out.iter().any(|m| m.bindings == found.bindings) {
                        out.push(found);
                    }
                }
            }
        }
    }
    out
}

fn label_indices(pattern: &Pattern) -> Option<BTreeMap<&str, usize>> {
    let mut index_of = BTreeMap::new();
    for (i, atom) in pattern.atoms.iter().enumerate() {
        if index_of.insert(atom.label.as_str(), i).is_some() {
            return None;
        }
    }
    for bond in &pattern.bonds {
        if bond.from == bond.to
            || !index_of.contains_key(bond.from.as_str())
            || !index_of.contains_key(bond.to.as_str())
        {
            return None;
        }
    }
    Some(index_of)
}

fn ring_assignment(
    mol: &Molecule,
    pattern: &Pattern,
    index_of: &BTreeMap<&str, usize>,
    members: &[AtomId],
    offset: usize,
    reverse: bool,
) -> Option<Match> {
    let n = members.len();
    let mut assigned = vec![members[0]; n];
    let mut bindings = BTreeMap::new();
    for (i, slot) in pattern.atoms.iter().enumerate() {
        let idx = if reverse {
            (offset + n - i) % n
        } else {
            (offset + i) % n
        };
        let id = members[idx];
        let atom = mol.atom(id)?;
        if !atom_matches(slot, atom) {
            return None;
        }
        assigned[i] = id;
        bindings.insert(slot.label.clone(), id);
    }
    for bond in &pattern.bonds {
        let a = assigned[*index_of.get(bond.from.as_str())?];
        let b = assigned[*index_of.get(bond.to.as_str())?];
        if !mol_bonded(mol, a, b, bond.kind) {
            return None;
        }
    }
    Some(Match { bindings })
}

fn mol_bonded(mol: &Molecule, a: AtomId, b: AtomId, want: Option<BondKind>) -> bool {
    graph::bonds_between(mol, a, b)
        .iter()
        .any(|r| r.get(mol).is_some_and(|bond| kind_accepts(want, bond.kind)))
}

struct Matcher<'a> {
    molecules: &'a [Molecule],
    pattern: &'a Pattern,
    /// Merged adjacency over every molecule; identities are globally unique
    /// so one map serves the whole result.
    adjacency: BTreeMap<AtomId, Vec<(BondKind, AtomId)>>,
    candidates: Vec<AtomId>,
    order: Vec<usize>,
    /// Per slot: the other slot and the required kind, both directions.
    constraints: Vec<Vec<(usize, Option<BondKind>)>>,
    assignment: Vec<Option<AtomId>>,
    used: BTreeSet<AtomId>,
}

impl<'a> Matcher<'a> {
    /// `None` when the pattern's labels are unusable (duplicates, bonds to
    /// unknown or self labels); such patterns match nothing.
    fn new(molecules: &'a [Molecule], pattern: &'a Pattern) -> Option<Self> {
        let index_of = label_indices(pattern)?;
        let mut constraints = vec![Vec::new(); pattern.atoms.len()];
        for bond in &pattern.bonds {
            let f = *index_of.get(bond.from.as_str())?;
            let t = *index_of.get(bond.to.as_str())?;
            constraints[f].push((t, bond.kind));
            constraints[t].push((f, bond.kind));
        }

        let mut adjacency = BTreeMap::new();
        let mut candidates = Vec::new();
        for mol in molecules {
            for (id, edges) in graph::adjacency(mol) {
                candidates.push(id);
                adjacency.insert(
                    id,
                    edges.into_iter().map(|(_, kind, to)| (kind, to)).collect(),
                );
            }
        }
        candidates.sort_unstable();

        // Most-constrained slots first prunes the search earliest.
        let mut order: Vec<usize> = (0..pattern.atoms.len()).collect();
        order.sort_by(|&a, &b| constraints[b].len().cmp(&constraints[a].len()));

        Some(Matcher {
            molecules,
            pattern,
            adjacency,
            candidates,
            order,
            constraints,
            assignment: vec![None; pattern.atoms.len()],
            used: BTreeSet::new(),
        })
    }

    fn atom(&self, id: AtomId) -> Option<&AtomGroup> {
        self.molecules.iter().find_map(|mol| mol.atom(id))
    }

    fn recurse(&mut self, depth: usize, results: &mut Vec<Match>, first_only: bool) {
        if depth == self.order.len() {
            let bindings = self
                .pattern
                .atoms
                .iter()
                .enumerate()
                .filter_map(|(i, atom)| {
                    self.assignment[i].map(|id| (atom.label.clone(), id))
                })
                .collect();
            results.push(Match { bindings });
            return;
        }

        if first_only && !results.is_empty() {
            return;
        }

        let slot = self.order[depth];

        for i in 0..self.candidates.len() {
            let candidate = self.candidates[i];
            if self.used.contains(&candidate) {
                continue;
            }
            if !self.is_feasible(slot, candidate) {
                continue;
            }

            self.assignment[slot] = Some(candidate);
            self.used.insert(candidate);

            self.recurse(depth + 1, results, first_only);

            self.assignment[slot] = None;
            self.used.remove(&candidate);

            if first_only && !results.is_empty() {
                return;
            }
        }
    }

    fn is_feasible(&self, slot: usize, candidate: AtomId) -> bool {
        let Some(atom) = self.atom(candidate) else {
            return false;
        };
        if !atom_matches(&self.pattern.atoms[slot], atom) {
            return false;
        }

        for &(other, want) in &self.constraints[slot] {
            if let Some(mapped) = self.assignment[other] {
                let satisfied = self.adjacency.get(&candidate).is_some_and(|edges| {
                    edges
                        .iter()
                        .any(|&(kind, to)| to == mapped && kind_accepts(want, kind))
                });
                if !satisfied {
                    return false;
                }
            }
        }

        true
    }
}
