use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bond::Bond;

/// Identity of an atom group, unique across a whole parse result.
///
/// Ids are assigned in creation order and never reused. Bonds and rings refer
/// to atoms only through this id, never through references, so atoms can be
/// pruned from one molecule and moved into another without invalidating
/// anything that points at them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AtomId(pub usize);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One parsed atom node.
///
/// `AtomGroup` stores what the notation said about the atom plus the bonds
/// recorded on it. The element list normally holds a single entry; a bracket
/// atom with an explicit hydrogen count carries a second `("H", n)` entry,
/// and display-side collapsing (condensed formulas) can fold further leaf
/// substituents in. The first entry is always the group's core element.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomGroup {
    /// Identity, unique across the parse result.
    pub id: AtomId,
    /// Element symbol to count. First entry is the core element.
    pub elements: Vec<(&'static str, u32)>,
    /// Formal charge in elementary charge units.
    pub charge: i32,
    /// Unpaired-electron marker from a bracket radical dot.
    pub radical: bool,
    /// Isotopic mass number override, `None` for natural abundance.
    pub mass: Option<u32>,
    /// Whether the atom was written in lowercase aromatic shorthand.
    pub aromatic: bool,
    /// Branch nesting depth at the point of creation (0 = main chain).
    pub depth: u32,
    /// Ring-closure digits attached to this atom, in order of appearance.
    pub ring_digits: Vec<u16>,
    /// Bonds stored on this atom. Bonds are stored on one endpoint only;
    /// use `graph::touching_bonds` for the undirected view.
    pub bonds: Vec<Bond>,
    /// Byte offset of the atom's source text in the original input.
    pub offset: usize,
    /// Byte length of the atom's source text.
    pub len: usize,
    /// True for hydrogens synthesized by implicit-hydrogen addition.
    pub implicit: bool,
}

impl AtomGroup {
    pub fn new(
        id: AtomId,
        symbol: &'static str,
        offset: usize,
        len: usize,
        depth: u32,
    ) -> Self {
        AtomGroup {
            id,
            elements: vec![(symbol, 1)],
            charge: 0,
            radical: false,
            mass: None,
            aromatic: false,
            depth,
            ring_digits: Vec::new(),
            bonds: Vec::new(),
            offset,
            len,
            implicit: false,
        }
    }

    /// The group's core element symbol (first entry).
    pub fn core_symbol(&self) -> &'static str {
        self.elements[0].0
    }

    /// Adds `count` atoms of `symbol` to the group, merging with an existing
    /// entry for the same symbol.
    pub fn add_element(&mut self, symbol: &'static str, count: u32) {
        if count == 0 {
            return;
        }
        for (sym, n) in &mut self.elements {
            if *sym == symbol {
                *n += count;
                return;
            }
        }
        self.elements.push((symbol, count));
    }

    /// Hydrogens carried inside the group beyond its core element. These
    /// count toward the atom's bond weight.
    pub fn hydrogens_in_group(&self) -> u32 {
        let mut h: u32 = self
            .elements
            .iter()
            .filter(|(sym, _)| *sym == "H")
            .map(|(_, n)| *n)
            .sum();
        if self.core_symbol() == "H" {
            h = h.saturating_sub(1);
        }
        h
    }

    /// Total number of atoms the group stands for.
    pub fn atom_count(&self) -> u32 {
        self.elements.iter().map(|(_, n)| *n).sum()
    }

    /// The group rendered as a formula unit: symbols with counts, count 1
    /// omitted (`"C"`, `"NH4"`, `"CH3"`).
    pub fn display_unit(&self) -> String {
        let mut out = String::new();
        for (sym, n) in &self.elements {
            out.push_str(sym);
            if *n > 1 {
                out.push_str(&n.to_string());
            }
        }
        out
    }

    /// The atom's source text within `input`.
    pub fn source_text<'a>(&self, input: &'a str) -> &'a str {
        input
            .get(self.offset..self.offset + self.len)
            .unwrap_or_default()
    }
}
