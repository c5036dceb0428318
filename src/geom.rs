//! Geometry records filled in by an external 2D layout collaborator.
//!
//! Parsing never reads these; a molecule just carries the record so a
//! renderer can find it. Everything derives serde so the record can cross a
//! process boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::atom::AtomId;
use crate::ring::RingId;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Width and height without a position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Placement of one atom: where its glyph sits and the box it was measured
/// to occupy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AtomPlacement {
    pub position: Point,
    pub bounds: BoundingBox,
}

/// Layout result for one molecule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MoleculeGeometry {
    pub atoms: BTreeMap<AtomId, AtomPlacement>,
    pub rings: BTreeMap<RingId, BoundingBox>,
    pub size: Extent,
}

impl MoleculeGeometry {
    pub fn new() -> Self {
        MoleculeGeometry::default()
    }

    /// Recomputes `size` as the union of all atom bounds. Collaborators
    /// that measure per atom can call this instead of tracking the total.
    pub fn recompute_size(&mut self) {
        let mut right: f64 = 0.0;
        let mut bottom: f64 = 0.0;
        for placement in self.atoms.values() {
            right = right.max(placement.bounds.right());
            bottom = bottom.max(placement.bounds.bottom());
        }
        self.size = Extent {
            width: right,
            height: bottom,
        };
    }
}
