use crate::atom::AtomId;

/// Bond type as written in the notation. `Unspecified` is what two adjacent
/// atoms get when no symbol sits between them; it counts as a single bond
/// everywhere except that ring resolution may coerce it to `Aromatic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondKind {
    #[default]
    Unspecified,
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondKind {
    /// Weight used for bond counting and valence checks.
    pub fn weight(self) -> f64 {
        match self {
            BondKind::Unspecified | BondKind::Single => 1.0,
            BondKind::Double => 2.0,
            BondKind::Triple => 3.0,
            BondKind::Aromatic => 1.5,
        }
    }

    /// Integer order class, folding `Unspecified` into `Single`. Used when
    /// comparing graphs structurally.
    pub fn order_class(self) -> u8 {
        match self {
            BondKind::Unspecified | BondKind::Single => 1,
            BondKind::Aromatic => 2,
            BondKind::Double => 3,
            BondKind::Triple => 4,
        }
    }
}

/// A bond record, stored on exactly one endpoint. The other endpoint is the
/// atom whose bond list contains the record; lookups must always consider
/// both directions (see `graph::touching_bonds`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub kind: BondKind,
    pub to: AtomId,
}

impl Bond {
    pub fn new(kind: BondKind, to: AtomId) -> Self {
        Bond { kind, to }
    }
}
