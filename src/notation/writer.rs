//! Serialization back to notation text. Each molecule component is walked
//! twice: a first iterative depth-first pass classifies every bond as a
//! tree edge or a ring closure, then a second recursive pass emits atom
//! tokens, closure digits, and parenthesized branches in the same order.
//!
//! Closure digits carry no bond symbol; a closure's aromaticity survives a
//! round trip through the lowercase shorthand or the `:` symbols on the
//! ring's chain bonds, and plain closures re-enter as single bonds.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use thiserror::Error;

use crate::atom::{AtomGroup, AtomId};
use crate::bond::BondKind;
use crate::element::{nominal_mass, AROMATIC_BARE};
use crate::graph;
use crate::molecule::Molecule;
use crate::options::ParseOptions;

/// The digit forms spell at most ninety-nine concurrently open closures
/// (`1`-`9` and `%10`-`%99`); a graph that keeps more open at once during
/// the walk has no rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("more than 99 ring closures open at once")]
pub struct RingDigitsExhausted;

/// Renders molecules into reaction zones: molecules within a zone joined
/// by `.`, zones joined by `>` at each recorded boundary.
pub(crate) fn write_molecules(
    molecules: &[Molecule],
    marks: &[usize],
    options: &ParseOptions,
    include_implicit: bool,
) -> Result<String, RingDigitsExhausted> {
    let mut bounds = Vec::with_capacity(marks.len() + 2);
    bounds.push(0);
    bounds.extend_from_slice(marks);
    bounds.push(molecules.len());

    let mut zones = Vec::with_capacity(bounds.len() - 1);
    for w in bounds.windows(2) {
        let mut parts = Vec::new();
        for m in &molecules[w[0]..w[1]] {
            let rendered = write_molecule(m, options, include_implicit)?;
            if !rendered.is_empty() {
                parts.push(rendered);
            }
        }
        zones.push(parts.join("."));
    }
    Ok(zones.join(">"))
}

/// One molecule; disconnected components are joined by `.`.
pub(crate) fn write_molecule(
    mol: &Molecule,
    options: &ParseOptions,
    include_implicit: bool,
) -> Result<String, RingDigitsExhausted> {
    let mut parts = Vec::new();
    for component in graph::components(mol) {
        let root = component
            .iter()
            .copied()
            .filter(|id| {
                include_implicit
                    || mol.atom(*id).is_none_or(|a| !a.implicit)
            })
            .min();
        let Some(root) = root else { continue };
        let mut emitter = Emitter::new(mol, options, include_implicit);
        emitter.classify(root);
        emitter.write_node(root, None)?;
        parts.push(emitter.out);
    }
    Ok(parts.join("."))
}

/// A bond reclassified as a ring closure: it joins `close_at` back to the
/// earlier-visited `open_at`.
struct Closure {
    open_at: AtomId,
    close_at: AtomId,
}

struct Emitter<'a> {
    mol: &'a Molecule,
    options: &'a ParseOptions,
    include_implicit: bool,
    /// Tree children per atom, in adjacency order.
    children: BTreeMap<AtomId, Vec<(BondKind, AtomId)>>,
    closures: Vec<Closure>,
    /// Closure indices opening at an atom.
    opens: BTreeMap<AtomId, Vec<usize>>,
    /// Closure indices closing at an atom.
    closes: BTreeMap<AtomId, Vec<usize>>,
    /// Digit held by each closure while its ring is open in the output.
    digit_of: Vec<Option<u16>>,
    free: BTreeSet<u16>,
    out: String,
}

impl<'a> Emitter<'a> {
    fn new(
        mol: &'a Molecule,
        options: &'a ParseOptions,
        include_implicit: bool,
    ) -> Self {
        Emitter {
            mol,
            options,
            include_implicit,
            children: BTreeMap::new(),
            closures: Vec::new(),
            opens: BTreeMap::new(),
            closes: BTreeMap::new(),
            digit_of: Vec::new(),
            free: (1..=99).collect(),
            out: String::new(),
        }
    }

    /// Depth-first classification. Every bond record is consumed exactly
    /// once; an edge to an already-visited atom becomes a ring closure
    /// opened at that earlier atom. Stack discipline guarantees the later
    /// endpoint of a closure sees it first.
    fn classify(&mut self, root: AtomId) {
        let adj = graph::adjacency(self.mol);
        let mut visited = BTreeSet::new();
        let mut used: BTreeSet<(AtomId, usize)> = BTreeSet::new();
        let mut stack: Vec<(AtomId, usize)> = vec![(root, 0)];
        visited.insert(root);

        while let Some(&mut (atom, ref mut cursor)) = stack.last_mut() {
            let Some(edges) = adj.get(&atom) else {
                stack.pop();
                continue;
            };
            let Some(&(bref, kind, other)) = edges.get(*cursor) else {
                stack.pop();
                continue;
            };
            *cursor += 1;
            if !used.insert((bref.owner, bref.index)) {
                continue;
            }
            if visited.insert(other) {
                self.children
                    .entry(atom)
                    .or_default()
                    .push((kind, other));
                stack.push((other, 0));
            } else {
                let idx = self.closures.len();
                self.closures.push(Closure { open_at: other, close_at: atom });
                self.opens.entry(other).or_default().push(idx);
                self.closes.entry(atom).or_default().push(idx);
                self.digit_of.push(None);
            }
        }
    }

    /// Emits one atom: bond symbol for the incoming tree edge, the atom
    /// token, closing digits (freeing them), opening digits, then children
    /// with all but the last parenthesized.
    fn write_node(
        &mut self,
        atom: AtomId,
        incoming: Option<(BondKind, AtomId)>,
    ) -> Result<(), RingDigitsExhausted> {
        let Some(group) = self.mol.atom(atom) else { return Ok(()) };
        if let Some((kind, parent)) = incoming {
            // Synthesized hydrogens print without their bond symbol.
            if !group.implicit {
                self.bond_token(kind, parent, group.aromatic);
            }
        }
        self.atom_token(group);

        for idx in self.closes.get(&atom).cloned().unwrap_or_default() {
            if let Some(digit) = self.digit_of[idx].take() {
                push_digit(&mut self.out, digit);
                self.free.insert(digit);
            }
        }
        for idx in self.opens.get(&atom).cloned().unwrap_or_default() {
            let digit = self.allocate_digit()?;
            self.digit_of[idx] = Some(digit);
            push_digit(&mut self.out, digit);
        }

        let kids: Vec<(BondKind, AtomId)> = self
            .children
            .get(&atom)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, c)| {
                self.include_implicit
                    || self.mol.atom(*c).is_none_or(|a| !a.implicit)
            })
            .collect();
        for (i, (kind, child)) in kids.iter().enumerate() {
            if i + 1 < kids.len() {
                self.out.push('(');
                self.write_node(*child, Some((*kind, atom)))?;
                self.out.push(')');
            } else {
                self.write_node(*child, Some((*kind, atom)))?;
            }
        }
        Ok(())
    }

    /// The explicit single symbol is kept so that an unspecified bond and
    /// a written `-` stay distinct across a round trip.
    fn bond_token(&mut self, kind: BondKind, from: AtomId, to_lower: bool) {
        let symbol = match kind {
            BondKind::Unspecified => None,
            BondKind::Single => Some('-'),
            BondKind::Double => Some('='),
            BondKind::Triple => Some('#'),
            BondKind::Aromatic => {
                // Between two lowercase atoms the aromatic bond is implied.
                let from_lower =
                    self.mol.atom(from).is_some_and(|a| a.aromatic);
                (!(from_lower && to_lower)).then_some(':')
            }
        };
        if let Some(c) = symbol {
            self.out.push(c);
        }
    }

    fn atom_token(&mut self, group: &AtomGroup) {
        if let Some(bare) = self.bare_form(group) {
            self.out.push_str(&bare);
            if group.charge != 0 {
                push_charge_clause(&mut self.out, group.charge);
            }
        } else {
            self.bracket_token(group);
        }
    }

    /// The bare spelling for an atom that needs no bracket, or `None`.
    /// A charged atom stays bare only when charge clauses are available
    /// to carry the charge.
    fn bare_form(&self, group: &AtomGroup) -> Option<String> {
        if group.mass.is_some()
            || group.radical
            || group.implicit
            || group.hydrogens_in_group() > 0
        {
            return None;
        }
        if group.charge != 0 && !self.options.charge_clauses {
            return None;
        }
        let symbol = group.core_symbol();
        if group.aromatic {
            let lower = symbol.to_ascii_lowercase();
            return AROMATIC_BARE.contains(&lower.as_str()).then_some(lower);
        }
        crate::element::is_organic_subset(symbol)
            .then(|| symbol.to_string())
    }

    fn bracket_token(&mut self, group: &AtomGroup) {
        self.out.push('[');
        if let Some(mass) = group.mass {
            write!(self.out, "{mass}").unwrap();
        } else if self.options.show_implicit_mass {
            if let Some(mass) = nominal_mass(group.core_symbol()) {
                write!(self.out, "{mass}").unwrap();
            }
        }
        if group.aromatic {
            self.out.push_str(&group.core_symbol().to_ascii_lowercase());
        } else {
            self.out.push_str(group.core_symbol());
        }
        match group.hydrogens_in_group() {
            0 => {}
            1 => self.out.push('H'),
            n => write!(self.out, "H{n}").unwrap(),
        }
        match group.charge {
            0 => {}
            1 => self.out.push('+'),
            -1 => self.out.push('-'),
            n if n > 1 => write!(self.out, "+{n}").unwrap(),
            n => write!(self.out, "-{}", -n).unwrap(),
        }
        if group.radical {
            self.out.push('.');
        }
        self.out.push(']');
    }

    fn allocate_digit(&mut self) -> Result<u16, RingDigitsExhausted> {
        self.free.pop_first().ok_or(RingDigitsExhausted)
    }
}

fn push_digit(out: &mut String, digit: u16) {
    if digit < 10 {
        write!(out, "{digit}").unwrap();
    } else {
        write!(out, "%{digit:02}").unwrap();
    }
}

fn push_charge_clause(out: &mut String, charge: i32) {
    match charge {
        1 => out.push_str("{+}"),
        -1 => out.push_str("{-}"),
        n if n > 1 => write!(out, "{{+{n}}}").unwrap(),
        n => write!(out, "{{-{}}}", -n).unwrap(),
    }
}
