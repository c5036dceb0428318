use serde::{Deserialize, Serialize};

/// Feature toggles for parsing and serialization.
///
/// Options are plain values: clone one, flip what you need, and pass it to
/// `parse_with` without touching any stored configuration. A disabled
/// feature's introducing character is simply not recognized, so hitting one
/// surfaces as an unexpected-character syntax error.
///
/// The structural toggles default to on; the transformative and strict ones
/// (`cumulative_charges`, `multiple_reactions`, `show_implicit_mass`,
/// `implicit_hydrogens`, `check_bond_counts`) default to off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Allow `.` separators between disconnected structures.
    pub disconnected_structures: bool,
    /// Allow `>` reaction separators (exactly one reactant>reagent>product
    /// triple unless `multiple_reactions` is also set).
    pub reactions: bool,
    /// Allow chained reactions (more than two arrows, still paired).
    pub multiple_reactions: bool,
    /// Allow the `:` aromatic bond symbol.
    pub aromatic_bonds: bool,
    /// Allow `{...}` charge clauses after atoms.
    pub charge_clauses: bool,
    /// Let repeated charge clauses on one atom accumulate instead of erroring.
    pub cumulative_charges: bool,
    /// Allow `[...]` bracket atoms.
    pub bracket_atoms: bool,
    /// Allow `(...)` branches.
    pub branches: bool,
    /// Allow ring-closure digits.
    pub rings: bool,
    /// Allow the bracket radical marker.
    pub radicals: bool,
    /// When serializing, print the nominal mass on bracket atoms that have
    /// no explicit isotope.
    pub show_implicit_mass: bool,
    /// Synthesize implicit hydrogens after validation.
    pub implicit_hydrogens: bool,
    /// Check bond counts after validation and fail the parse on the first
    /// violation.
    pub check_bond_counts: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            disconnected_structures: true,
            reactions: true,
            multiple_reactions: false,
            aromatic_bonds: true,
            charge_clauses: true,
            cumulative_charges: false,
            bracket_atoms: true,
            branches: true,
            rings: true,
            radicals: true,
            show_implicit_mass: false,
            implicit_hydrogens: false,
            check_bond_counts: false,
        }
    }
}

impl ParseOptions {
    /// Defaults plus implicit hydrogens and bond-count checking, the usual
    /// strict mode.
    pub fn strict() -> Self {
        ParseOptions {
            implicit_hydrogens: true,
            check_bond_counts: true,
            ..ParseOptions::default()
        }
    }

    /// Structure-only parsing: no separators, reactions, charges, or rings.
    /// Handy for validating plain chains.
    pub fn bare_chains() -> Self {
        ParseOptions {
            disconnected_structures: false,
            reactions: false,
            multiple_reactions: false,
            aromatic_bonds: false,
            charge_clauses: false,
            cumulative_charges: false,
            bracket_atoms: true,
            branches: true,
            rings: false,
            radicals: false,
            show_implicit_mass: false,
            implicit_hydrogens: false,
            check_bond_counts: false,
        }
    }
}
