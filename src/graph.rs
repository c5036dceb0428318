//! Graph algorithms over the identity-indexed molecule storage.
//!
//! Bonds are stored on one endpoint only, so everything here goes through
//! [`touching_bonds`] / [`adjacency`] to see the undirected graph.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::atom::{AtomGroup, AtomId};
use crate::bond::{Bond, BondKind};
use crate::element::organic_valences;
use crate::molecule::Molecule;

/// Location of a stored bond record: the atom whose list holds it, and the
/// index within that list. Stable across kind changes, invalidated by
/// severing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondRef {
    pub owner: AtomId,
    pub index: usize,
}

impl BondRef {
    /// The two endpoints of the referenced bond, owner first.
    pub fn endpoints(&self, mol: &Molecule) -> Option<(AtomId, AtomId)> {
        let bond = self.get(mol)?;
        Some((self.owner, bond.to))
    }

    pub fn get(&self, mol: &Molecule) -> Option<Bond> {
        mol.atom(self.owner)?.bonds.get(self.index).copied()
    }

    /// Given one endpoint, returns the other.
    pub fn other(&self, mol: &Molecule, side: AtomId) -> Option<AtomId> {
        let (a, b) = self.endpoints(mol)?;
        if side == a {
            Some(b)
        } else if side == b {
            Some(a)
        } else {
            None
        }
    }
}

/// All bonds touching `id`: records stored on the atom itself plus records
/// on other atoms that point at it. Returns the record location, its kind,
/// and the far endpoint.
pub fn touching_bonds(
    mol: &Molecule,
    id: AtomId,
) -> Vec<(BondRef, BondKind, AtomId)> {
    let mut out = Vec::new();
    for atom in mol.atoms() {
        for (index, bond) in atom.bonds.iter().enumerate() {
            let r = BondRef {
                owner: atom.id,
                index,
            };
            if atom.id == id {
                out.push((r, bond.kind, bond.to));
            } else if bond.to == id {
                out.push((r, bond.kind, atom.id));
            }
        }
    }
    out
}

/// Undirected adjacency for the whole molecule in one pass. Each bond
/// record appears in both endpoints' lists.
pub fn adjacency(
    mol: &Molecule,
) -> BTreeMap<AtomId, Vec<(BondRef, BondKind, AtomId)>> {
    let mut adj: BTreeMap<AtomId, Vec<(BondRef, BondKind, AtomId)>> =
        mol.ids().map(|id| (id, Vec::new())).collect();
    for atom in mol.atoms() {
        for (index, bond) in atom.bonds.iter().enumerate() {
            let r = BondRef {
                owner: atom.id,
                index,
            };
            if let Some(list) = adj.get_mut(&atom.id) {
                list.push((r, bond.kind, bond.to));
            }
            if let Some(list) = adj.get_mut(&bond.to) {
                list.push((r, bond.kind, atom.id));
            }
        }
    }
    adj
}

/// Every stored record between `a` and `b`, in either direction. Parallel
/// bonds yield multiple entries.
pub fn bonds_between(mol: &Molecule, a: AtomId, b: AtomId) -> Vec<BondRef> {
    let mut out = Vec::new();
    for (r, _, other) in touching_bonds(mol, a) {
        if other == b {
            out.push(r);
        }
    }
    out
}

/// Rewrites the kind of every bond between `a` and `b`. Returns how many
/// records changed.
pub fn coerce_bonds(
    mol: &mut Molecule,
    a: AtomId,
    b: AtomId,
    kind: BondKind,
) -> usize {
    let refs = bonds_between(mol, a, b);
    let mut changed = 0;
    for r in &refs {
        if let Some(atom) = mol.atom_mut(r.owner) {
            if let Some(bond) = atom.bonds.get_mut(r.index) {
                bond.kind = kind;
                changed += 1;
            }
        }
    }
    changed
}

/// Removes the first stored record between `a` and `b`, searching both
/// directions. Returns its kind, or `None` if the atoms were not bonded.
pub fn sever_bond(mol: &mut Molecule, a: AtomId, b: AtomId) -> Option<BondKind> {
    let r = bonds_between(mol, a, b).into_iter().next()?;
    let atom = mol.atom_mut(r.owner)?;
    if r.index < atom.bonds.len() {
        Some(atom.bonds.remove(r.index).kind)
    } else {
        None
    }
}

/// Bond-count weight of an atom: the sum of touching bond weights plus one
/// per hydrogen folded into the group itself.
pub fn bond_weight(mol: &Molecule, id: AtomId) -> f64 {
    let bonds: f64 = touching_bonds(mol, id)
        .iter()
        .map(|(_, kind, _)| kind.weight())
        .sum();
    let group_h = mol
        .atom(id)
        .map(|a| a.hydrogens_in_group() as f64)
        .unwrap_or(0.0);
    bonds + group_h
}

/// One failed bond-count check, reported as data so the caller chooses
/// whether it is fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct ValenceViolation {
    pub atom: AtomId,
    pub element: &'static str,
    pub offset: usize,
    pub found: f64,
    pub allowed: &'static [u8],
}

/// First bond-count violation in the molecule, if any. Charged, radical,
/// and non-organic-subset atoms are exempt.
pub fn check_valences(mol: &Molecule) -> Option<ValenceViolation> {
    for atom in mol.atoms() {
        if atom.charge != 0 || atom.radical {
            continue;
        }
        let Some(allowed) = organic_valences(atom.core_symbol()) else {
            continue;
        };
        let found = bond_weight(mol, atom.id);
        let ok = allowed.iter().any(|&v| (found - v as f64).abs() < 1e-9);
        if !ok {
            return Some(ValenceViolation {
                atom: atom.id,
                element: atom.core_symbol(),
                offset: atom.offset,
                found,
                allowed,
            });
        }
    }
    None
}

/// Synthesizes implicit hydrogens: each neutral, non-radical organic-subset
/// atom is topped up to the smallest allowed valence not below its current
/// weight. New atoms are flagged implicit and singly bonded from the parent.
/// Returns the ids of the added hydrogens.
pub fn add_implicit_hydrogens(
    mol: &mut Molecule,
    next_id: &mut usize,
) -> Vec<AtomId> {
    let ids: Vec<AtomId> = mol.ids().collect();
    let mut added = Vec::new();
    for id in ids {
        let Some(atom) = mol.atom(id) else { continue };
        if atom.charge != 0 || atom.radical {
            continue;
        }
        let Some(allowed) = organic_valences(atom.core_symbol()) else {
            continue;
        };
        let (offset, depth) = (atom.offset, atom.depth);
        let weight = bond_weight(mol, id);
        let Some(&target) = allowed.iter().find(|&&v| v as f64 >= weight)
        else {
            continue;
        };
        let count = (target as f64 - weight).floor() as u32;
        for _ in 0..count {
            let hid = AtomId(*next_id);
            *next_id += 1;
            let mut h = AtomGroup::new(hid, "H", offset, 0, depth);
            h.implicit = true;
            mol.insert(h);
            if let Some(parent) = mol.atom_mut(id) {
                parent.bonds.push(Bond::new(BondKind::Single, hid));
            }
            added.push(hid);
        }
    }
    if !added.is_empty() {
        debug!(count = added.len(), "implicit hydrogens added");
    }
    added
}

/// Atom ids reachable from `start` over touching bonds, `start` included.
pub fn reachable_from(mol: &Molecule, start: AtomId) -> BTreeSet<AtomId> {
    let adj = adjacency(mol);
    let mut seen = BTreeSet::new();
    if !mol.contains(start) {
        return seen;
    }
    let mut stack = vec![start];
    seen.insert(start);
    while let Some(node) = stack.pop() {
        if let Some(edges) = adj.get(&node) {
            for (_, _, other) in edges {
                if seen.insert(*other) {
                    stack.push(*other);
                }
            }
        }
    }
    seen
}

/// Evicts every atom not reachable from `start` and returns the discarded
/// set as its own molecule. Rings whose members were evicted move with
/// them. Used after severing a bond to split a molecule in two.
pub fn prune_unreachable(mol: &mut Molecule, start: AtomId) -> Molecule {
    let keep = reachable_from(mol, start);
    let evicted_ids: Vec<AtomId> =
        mol.ids().filter(|id| !keep.contains(id)).collect();
    let mut evicted = Molecule::new();
    for id in evicted_ids {
        if let Some(atom) = mol.remove(id) {
            evicted.insert(atom);
        }
    }
    for ring in mol.extract_rings_if(|r| {
        r.members.first().is_some_and(|m| evicted.contains(*m))
    }) {
        evicted.push_ring(ring);
    }
    evicted
}

/// Connected components as sorted id lists, ordered by smallest member.
pub fn components(mol: &Molecule) -> Vec<Vec<AtomId>> {
    let mut remaining: BTreeSet<AtomId> = mol.ids().collect();
    let mut out = Vec::new();
    while let Some(&seed) = remaining.iter().next() {
        let comp = reachable_from(mol, seed);
        for id in &comp {
            remaining.remove(id);
        }
        out.push(comp.into_iter().collect());
    }
    out
}

/// Ceiling for simple-path enumeration. Worst case is exponential in the
/// ring system size, so both knobs are hard limits, not hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLimits {
    /// Maximum number of stored paths before giving up.
    pub max_paths: usize,
    /// Maximum path length in atoms.
    pub max_depth: usize,
}

impl Default for PathLimits {
    fn default() -> Self {
        PathLimits {
            max_paths: 4096,
            max_depth: 256,
        }
    }
}

/// Enumeration aborted because a [`PathLimits`] ceiling was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("simple-path enumeration hit its ceiling ({paths} paths, depth {depth})")]
pub struct PathCeiling {
    pub paths: usize,
    pub depth: usize,
}

/// Enumerates every simple path from `start` to `end`.
///
/// Iterative DFS with an explicit stack and a per-node cursor over its
/// unexplored edges, so shared atoms are revisited correctly along
/// different branches and recursion depth is never an issue. When
/// `allowed` is given, intermediate atoms must be members; the endpoints
/// are always admitted.
///
/// Paths are returned as bond-record choices rather than atom ids, so a
/// caller can replay the exact edge taken even between atoms joined by
/// parallel bonds (see [`path_atoms`]).
pub fn simple_paths(
    mol: &Molecule,
    start: AtomId,
    end: AtomId,
    allowed: Option<&BTreeSet<AtomId>>,
    limits: PathLimits,
) -> Result<Vec<Vec<BondRef>>, PathCeiling> {
    if !mol.contains(start) || !mol.contains(end) {
        return Ok(Vec::new());
    }
    if start == end {
        return Ok(vec![Vec::new()]);
    }
    let adj = adjacency(mol);
    let mut paths: Vec<Vec<BondRef>> = Vec::new();
    let mut stack: Vec<(AtomId, usize)> = vec![(start, 0)];
    let mut trail: Vec<BondRef> = Vec::new();
    let mut visited: BTreeSet<AtomId> = BTreeSet::new();
    visited.insert(start);

    while let Some((node, cursor)) = stack.last_mut() {
        let node = *node;
        let next = adj.get(&node).and_then(|edges| edges.get(*cursor));
        match next {
            Some(&(bond, _, other)) => {
                *cursor += 1;
                if other == end {
                    let mut path = trail.clone();
                    path.push(bond);
                    paths.push(path);
                    if paths.len() > limits.max_paths {
                        warn!(
                            max_paths = limits.max_paths,
                            "path ceiling hit"
                        );
                        return Err(PathCeiling {
                            paths: paths.len(),
                            depth: stack.len(),
                        });
                    }
                } else if !visited.contains(&other)
                    && allowed.is_none_or(|set| set.contains(&other))
                {
                    if stack.len() >= limits.max_depth {
                        warn!(
                            max_depth = limits.max_depth,
                            "path depth ceiling hit"
                        );
                        return Err(PathCeiling {
                            paths: paths.len(),
                            depth: stack.len(),
                        });
                    }
                    visited.insert(other);
                    trail.push(bond);
                    stack.push((other, 0));
                }
            }
            None => {
                stack.pop();
                if node != start {
                    visited.remove(&node);
                    trail.pop();
                }
            }
        }
    }
    Ok(paths)
}

/// Replays an edge path from `start` into the atom sequence it visits,
/// `start` included.
pub fn path_atoms(
    mol: &Molecule,
    start: AtomId,
    path: &[BondRef],
) -> Vec<AtomId> {
    let mut atoms = vec![start];
    let mut here = start;
    for bond in path {
        match bond.other(mol, here) {
            Some(next) => {
                atoms.push(next);
                here = next;
            }
            None => break,
        }
    }
    atoms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomGroup;

    fn build(
        atoms: &[(usize, &'static str)],
        bonds: &[(usize, usize, BondKind)],
    ) -> Molecule {
        let mut mol = Molecule::new();
        for &(id, sym) in atoms {
            mol.insert(AtomGroup::new(AtomId(id), sym, id, 1, 0));
        }
        for &(a, b, kind) in bonds {
            if let Some(atom) = mol.atom_mut(AtomId(a)) {
                atom.bonds.push(Bond::new(kind, AtomId(b)));
            }
        }
        mol
    }

    #[test]
    fn touching_sees_both_directions() {
        let mol = build(
            &[(0, "C"), (1, "C"), (2, "O")],
            &[(0, 1, BondKind::Single), (1, 2, BondKind::Single)],
        );
        // Bond 1-2 is stored on atom 1 but must be visible from atom 2.
        let touching = touching_bonds(&mol, AtomId(2));
        assert_eq!(touching.len(), 1);
        assert_eq!(touching[0].2, AtomId(1));
        assert_eq!(touching_bonds(&mol, AtomId(1)).len(), 2);
    }

    #[test]
    fn weight_counts_group_hydrogens() {
        let mut mol = build(
            &[(0, "C"), (1, "C")],
            &[(0, 1, BondKind::Double)],
        );
        if let Some(a) = mol.atom_mut(AtomId(0)) {
            a.add_element("H", 2);
        }
        assert_eq!(bond_weight(&mol, AtomId(0)), 4.0);
        assert_eq!(bond_weight(&mol, AtomId(1)), 2.0);
    }

    #[test]
    fn valence_check_reports_first_violation() {
        let mol = build(
            &[(0, "C"), (1, "C")],
            &[
                (0, 1, BondKind::Triple),
                (0, 1, BondKind::Double),
            ],
        );
        let v = check_valences(&mol).unwrap();
        assert_eq!(v.atom, AtomId(0));
        assert_eq!(v.element, "C");
        assert_eq!(v.found, 5.0);
        assert_eq!(v.allowed, &[4]);
    }

    #[test]
    fn valence_check_skips_charged_and_exotic() {
        let mut mol = build(&[(0, "N"), (1, "Fe")], &[]);
        if let Some(a) = mol.atom_mut(AtomId(0)) {
            a.charge = 1;
        }
        // N+ with zero bonds would fail, but charge exempts it; Fe has no
        // valence table at all.
        assert!(check_valences(&mol).is_none());
    }

    #[test]
    fn implicit_hydrogens_top_up() {
        let mut mol = build(
            &[(0, "C"), (1, "O")],
            &[(0, 1, BondKind::Single)],
        );
        let mut next = 2;
        let added = add_implicit_hydrogens(&mut mol, &mut next);
        assert_eq!(added.len(), 4); // CH3 + OH
        assert_eq!(next, 6);
        assert_eq!(bond_weight(&mol, AtomId(0)), 4.0);
        assert_eq!(bond_weight(&mol, AtomId(1)), 2.0);
        assert!(mol.atom(added[0]).unwrap().implicit);
        assert!(check_valences(&mol).is_none());
    }

    #[test]
    fn aromatic_weight_floors_remainder() {
        // Aromatic carbon with two ring bonds: weight 3.0, topped to 4.
        let mut mol = build(
            &[(0, "C"), (1, "C"), (2, "C")],
            &[
                (0, 1, BondKind::Aromatic),
                (0, 2, BondKind::Aromatic),
            ],
        );
        let mut next = 3;
        let added = add_implicit_hydrogens(&mut mol, &mut next);
        // Atom 0 gets exactly one hydrogen (4 - 3.0).
        assert!(mol.atom(AtomId(0)).unwrap().bonds.iter().any(|b| {
            added.contains(&b.to)
        }));
        assert_eq!(
            mol.atom(AtomId(0))
                .unwrap()
                .bonds
                .iter()
                .filter(|b| added.contains(&b.to))
                .count(),
            1
        );
    }

    #[test]
    fn sever_and_prune_splits() {
        let mut mol = build(
            &[(0, "C"), (1, "C"), (2, "O"), (3, "N")],
            &[
                (0, 1, BondKind::Single),
                (1, 2, BondKind::Single),
                (2, 3, BondKind::Single),
            ],
        );
        assert_eq!(sever_bond(&mut mol, AtomId(2), AtomId(1)), Some(BondKind::Single));
        let evicted = prune_unreachable(&mut mol, AtomId(0));
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(evicted.atom_count(), 2);
        assert!(evicted.contains(AtomId(2)));
        assert!(evicted.contains(AtomId(3)));
    }

    #[test]
    fn sever_missing_bond_is_none() {
        let mut mol = build(&[(0, "C"), (1, "C")], &[]);
        assert_eq!(sever_bond(&mut mol, AtomId(0), AtomId(1)), None);
    }

    #[test]
    fn components_split() {
        let mol = build(
            &[(0, "C"), (1, "C"), (5, "O")],
            &[(0, 1, BondKind::Single)],
        );
        let comps = components(&mol);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0], vec![AtomId(0), AtomId(1)]);
        assert_eq!(comps[1], vec![AtomId(5)]);
    }

    #[test]
    fn simple_paths_on_triangle() {
        let mol = build(
            &[(0, "C"), (1, "C"), (2, "C")],
            &[
                (0, 1, BondKind::Single),
                (1, 2, BondKind::Single),
                (0, 2, BondKind::Single),
            ],
        );
        let paths = simple_paths(
            &mol,
            AtomId(0),
            AtomId(2),
            None,
            PathLimits::default(),
        )
        .unwrap();
        assert_eq!(paths.len(), 2);
        let mut lens: Vec<usize> = paths
            .iter()
            .map(|p| path_atoms(&mol, AtomId(0), p).len())
            .collect();
        lens.sort_unstable();
        assert_eq!(lens, vec![2, 3]);
    }

    #[test]
    fn simple_paths_tell_parallel_bonds_apart() {
        let mol = build(
            &[(0, "C"), (1, "C")],
            &[
                (0, 1, BondKind::Single),
                (0, 1, BondKind::Single),
            ],
        );
        let paths = simple_paths(
            &mol,
            AtomId(0),
            AtomId(1),
            None,
            PathLimits::default(),
        )
        .unwrap();
        // Two distinct edge choices between the same endpoints.
        assert_eq!(paths.len(), 2);
        assert_ne!(paths[0], paths[1]);
    }

    #[test]
    fn allowed_set_restricts_intermediates() {
        let mol = build(
            &[(0, "C"), (1, "C"), (2, "C"), (3, "C")],
            &[
                (0, 1, BondKind::Single),
                (1, 3, BondKind::Single),
                (0, 2, BondKind::Single),
                (2, 3, BondKind::Single),
            ],
        );
        let allowed: BTreeSet<AtomId> =
            [AtomId(0), AtomId(1), AtomId(3)].into_iter().collect();
        let paths = simple_paths(
            &mol,
            AtomId(0),
            AtomId(3),
            Some(&allowed),
            PathLimits::default(),
        )
        .unwrap();
        // Only the route through atom 1; atom 2 is off-limits.
        assert_eq!(paths.len(), 1);
        assert_eq!(
            path_atoms(&mol, AtomId(0), &paths[0]),
            vec![AtomId(0), AtomId(1), AtomId(3)]
        );
    }

    #[test]
    fn path_ceiling_reports() {
        let mol = build(
            &[(0, "C"), (1, "C"), (2, "C")],
            &[
                (0, 1, BondKind::Single),
                (1, 2, BondKind::Single),
                (0, 2, BondKind::Single),
            ],
        );
        let limits = PathLimits {
            max_paths: 1,
            max_depth: 256,
        };
        let err =
            simple_paths(&mol, AtomId(0), AtomId(2), None, limits).unwrap_err();
        assert!(err.paths > 1);
    }

    #[test]
    fn coerce_rewrites_all_records() {
        let mut mol = build(
            &[(0, "C"), (1, "C")],
            &[
                (0, 1, BondKind::Unspecified),
                (1, 0, BondKind::Unspecified),
            ],
        );
        assert_eq!(coerce_bonds(&mut mol, AtomId(0), AtomId(1), BondKind::Aromatic), 2);
        for r in bonds_between(&mol, AtomId(0), AtomId(1)) {
            assert_eq!(r.get(&mol).unwrap().kind, BondKind::Aromatic);
        }
    }
}
