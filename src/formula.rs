//! Formula assembly and relative mass.
//!
//! [`hill_counts`] tallies atoms in Hill order, [`render`] turns a tally
//! into a plain or HTML formula string, [`condensed`] produces the
//! structure-preserving condensed form, and [`relative_mass`] sums
//! standard atomic weights with isotope overrides honored.
//!
//! Counting works over any atom iterator so the same tally serves a single
//! molecule or a whole parse result. Bracket groups either count as one
//! unit ([`FormulaMode::Groups`]) or fall apart into their elements
//! ([`FormulaMode::Decomposed`]).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::atom::{AtomGroup, AtomId};
use crate::bond::BondKind;
use crate::element::atomic_weight;
use crate::graph::{self, BondRef};
use crate::molecule::Molecule;

/// How bracket groups contribute to a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaMode {
    /// Each atom group counts as one unit (`CH3` stays `CH3`).
    Groups,
    /// Groups decompose into their constituent elements.
    Decomposed,
}

/// One tallied unit in Hill order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaUnit {
    pub unit: String,
    /// Owning charge when tallying charge-aware, otherwise zero.
    pub charge: i32,
    pub count: u32,
}

fn element_class(symbol: &str) -> u8 {
    match symbol {
        "C" => 0,
        "H" => 1,
        _ => 2,
    }
}

/// Tallies atoms in Hill order: carbon units first, then hydrogen units,
/// then the rest alphabetically, with same-unit entries ordered by charge.
pub(crate) fn hill_counts<'a>(
    atoms: impl Iterator<Item = &'a AtomGroup>,
    mode: FormulaMode,
    with_charge: bool,
) -> Vec<FormulaUnit> {
    let mut tally: BTreeMap<(u8, String, i32), u32> = BTreeMap::new();
    for atom in atoms {
        let charge = if with_charge { atom.charge } else { 0 };
        match mode {
            FormulaMode::Groups => {
                let key = (
                    element_class(atom.core_symbol()),
                    atom.display_unit(),
                    charge,
                );
                *tally.entry(key).or_insert(0) += 1;
            }
            FormulaMode::Decomposed => {
                for (symbol, count) in &atom.elements {
                    let key =
                        (element_class(symbol), symbol.to_string(), charge);
                    *tally.entry(key).or_insert(0) += count;
                }
            }
        }
    }
    tally
        .into_iter()
        .map(|((_, unit, charge), count)| FormulaUnit { unit, charge, count })
        .collect()
}

/// Whether a unit needs parentheses before a multiplier: more than one
/// element symbol, or an embedded count of its own.
fn is_compound_unit(unit: &str) -> bool {
    unit.chars().filter(|c| c.is_ascii_uppercase()).count() > 1
        || unit.chars().any(|c| c.is_ascii_digit())
}

/// Renders a tally into a formula string, optionally wrapping counts in
/// HTML `<sub>` markup.
pub(crate) fn render(units: &[FormulaUnit], html: bool) -> String {
    let mut out = String::new();
    for u in units {
        if u.count > 1 && is_compound_unit(&u.unit) {
            write!(out, "({})", u.unit).unwrap();
        } else {
            out.push_str(&u.unit);
        }
        if u.count > 1 {
            if html {
                write!(out, "<sub>{}</sub>", u.count).unwrap();
            } else {
                write!(out, "{}", u.count).unwrap();
            }
        }
    }
    out
}

type Adjacency = BTreeMap<AtomId, Vec<(BondRef, BondKind, AtomId)>>;

/// One rendered step along a condensed chain.
#[derive(Debug, Clone)]
enum Token {
    Unit(String),
    Branch(String),
}

/// Condensed formula of one molecule: a depth-first walk that folds every
/// leaf substituent into its parent's unit, parenthesizes side chains, and
/// optionally collapses runs of equal units (`CH3(CH2)2CH3`).
pub(crate) fn condensed(mol: &Molecule, collapse_runs: bool) -> String {
    let Some(root) = mol.first_id() else {
        return String::new();
    };
    let adj = graph::adjacency(mol);
    let mut visited = BTreeSet::new();
    visited.insert(root);
    let tokens = chain_tokens(mol, &adj, root, &mut visited, collapse_runs);
    join_tokens(&tokens, collapse_runs)
}

fn neighbors(adj: &Adjacency, atom: AtomId) -> Vec<AtomId> {
    adj.get(&atom)
        .map(|edges| edges.iter().map(|(_, _, to)| *to).collect())
        .unwrap_or_default()
}

/// True when every edge of `candidate` leads back to `from`.
fn is_leaf(adj: &Adjacency, candidate: AtomId, from: AtomId) -> bool {
    adj.get(&candidate)
        .map(|edges| edges.iter().all(|(_, _, to)| *to == from))
        .unwrap_or(true)
}

fn chain_tokens(
    mol: &Molecule,
    adj: &Adjacency,
    start: AtomId,
    visited: &mut BTreeSet<AtomId>,
    collapse_runs: bool,
) -> Vec<Token> {
    let mut out = Vec::new();
    let Some(atom) = mol.atom(start) else {
        return out;
    };

    let mut scratch = atom.clone();
    let mut continuations = Vec::new();
    for n in neighbors(adj, start) {
        if visited.contains(&n) {
            continue;
        }
        if is_leaf(adj, n, start) {
            visited.insert(n);
            if let Some(leaf) = mol.atom(n) {
                for &(symbol, count) in &leaf.elements {
                    scratch.add_element(symbol, count);
                }
            }
        } else {
            continuations.push(n);
        }
    }
    out.push(Token::Unit(scratch.display_unit()));

    let mut subs: Vec<Vec<Token>> = Vec::new();
    for c in continuations {
        // A ring edge may have been consumed from the other side already.
        if visited.contains(&c) {
            continue;
        }
        visited.insert(c);
        subs.push(chain_tokens(mol, adj, c, visited, collapse_runs));
    }
    if let Some((last, rest)) = subs.split_last() {
        for sub in rest {
            out.push(Token::Branch(join_tokens(sub, collapse_runs)));
        }
        out.extend_from_slice(last);
    }
    out
}

fn join_tokens(tokens: &[Token], collapse_runs: bool) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Branch(text) => {
                write!(out, "({text})").unwrap();
                i += 1;
            }
            Token::Unit(unit) => {
                let mut run = 1;
                if collapse_runs {
                    while matches!(
                        tokens.get(i + run),
                        Some(Token::Unit(next)) if next == unit
                    ) {
                        run += 1;
                    }
                }
                if run > 1 {
                    if is_compound_unit(unit) {
                        write!(out, "({unit}){run}").unwrap();
                    } else {
                        write!(out, "{unit}{run}").unwrap();
                    }
                } else {
                    out.push_str(unit);
                }
                i += run;
            }
        }
    }
    out
}

/// Sum of standard atomic weights over the atoms. An isotope override
/// replaces the average weight of the core atom only; group hydrogens and
/// extra element entries weigh in at their averages.
pub(crate) fn relative_mass<'a>(
    atoms: impl Iterator<Item = &'a AtomGroup>,
) -> f64 {
    let mut total = 0.0;
    for atom in atoms {
        for (i, (symbol, count)) in atom.elements.iter().enumerate() {
            let weight = atomic_weight(symbol).unwrap_or(0.0);
            if i == 0 {
                total += atom.mass.map(f64::from).unwrap_or(weight);
                total += f64::from(count - 1) * weight;
            } else {
                total += f64::from(*count) * weight;
            }
        }
    }
    total
}
