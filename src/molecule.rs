use std::collections::BTreeMap;

use crate::atom::{AtomGroup, AtomId};
use crate::geom::MoleculeGeometry;
use crate::ring::Ring;

/// A collection of atom groups keyed by identity, plus the rings fully
/// contained in it.
///
/// Atoms are owned by exactly one molecule at a time but keep their global
/// ids, so they can be evicted and re-homed (molecule splitting) without
/// rewriting any bond. Iteration order is id order, which makes every
/// derived artifact deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    atoms: BTreeMap<AtomId, AtomGroup>,
    rings: Vec<Ring>,
    geometry: Option<MoleculeGeometry>,
}

impl Molecule {
    pub fn new() -> Self {
        Molecule::default()
    }

    /// Inserts an atom under its own id. Replaces any previous atom with
    /// the same id.
    pub fn insert(&mut self, atom: AtomGroup) {
        self.atoms.insert(atom.id, atom);
    }

    pub fn remove(&mut self, id: AtomId) -> Option<AtomGroup> {
        self.atoms.remove(&id)
    }

    pub fn atom(&self, id: AtomId) -> Option<&AtomGroup> {
        self.atoms.get(&id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut AtomGroup> {
        self.atoms.get_mut(&id)
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.atoms.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.atoms.keys().copied()
    }

    pub fn atoms(&self) -> impl Iterator<Item = &AtomGroup> {
        self.atoms.values()
    }

    pub fn atoms_mut(&mut self) -> impl Iterator<Item = &mut AtomGroup> {
        self.atoms.values_mut()
    }

    /// Lowest atom id, used as the default traversal root.
    pub fn first_id(&self) -> Option<AtomId> {
        self.atoms.keys().next().copied()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of stored bond records.
    pub fn bond_count(&self) -> usize {
        self.atoms.values().map(|a| a.bonds.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Sum of formal charges over all atoms.
    pub fn net_charge(&self) -> i32 {
        self.atoms.values().map(|a| a.charge).sum()
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn rings_mut(&mut self) -> &mut [Ring] {
        &mut self.rings
    }

    pub fn push_ring(&mut self, ring: Ring) {
        self.rings.push(ring);
    }

    /// Removes and returns the rings whose members all satisfy `pred`.
    pub fn extract_rings_if(
        &mut self,
        mut pred: impl FnMut(&Ring) -> bool,
    ) -> Vec<Ring> {
        let mut moved = Vec::new();
        let mut kept = Vec::new();
        for ring in self.rings.drain(..) {
            if pred(&ring) {
                moved.push(ring);
            } else {
                kept.push(ring);
            }
        }
        self.rings = kept;
        moved
    }

    pub fn geometry(&self) -> Option<&MoleculeGeometry> {
        self.geometry.as_ref()
    }

    /// Attaches a layout record produced by an external collaborator.
    pub fn set_geometry(&mut self, geometry: MoleculeGeometry) {
        self.geometry = Some(geometry);
    }

    pub fn clear_geometry(&mut self) {
        self.geometry = None;
    }
}
