//! Recursive-descent parser. One [`Parser`] instance consumes a whole input
//! string: the descent builds molecules and feeds the ring registry, then
//! [`Parser::run`] finishes with the validation pass (arrow parity, ring
//! placement and resolution, optional hydrogen synthesis and bond-count
//! checks) before handing everything to a [`ParseResult`].

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::atom::{AtomGroup, AtomId};
use crate::bond::{Bond, BondKind};
use crate::graph;
use crate::molecule::Molecule;
use crate::notation::error::{ErrorKind, ParseError};
use crate::notation::lexer;
use crate::options::ParseOptions;
use crate::result::ParseResult;
use crate::ring::{self, RingRegistry};

/// Branch nesting cap; the descent recurses once per `(`.
const BRANCH_DEPTH_LIMIT: u32 = 128;

/// Chain state local to one descent invocation (the top level or one
/// branch body).
struct Frame {
    /// Most recently completed atom of this chain. Ring digits and charge
    /// clauses attach here.
    prev: Option<AtomId>,
    /// Bond symbol waiting for its right-hand atom, with its offset.
    pending: Option<(BondKind, usize)>,
    /// Atom owning the enclosing branch; the first atom of the fragment
    /// bonds to it.
    parent: Option<AtomId>,
}

pub(crate) struct Parser<'a> {
    input: &'a str,
    options: &'a ParseOptions,
    /// Finished molecules in source order.
    molecules: Vec<Molecule>,
    /// Molecule currently receiving atoms, created on the first one.
    current: Option<Molecule>,
    registry: RingRegistry,
    /// For each `>` seen, how many molecules were finished before it.
    marks: Vec<usize>,
    /// Byte offsets of the arrows, for the parity diagnostic.
    arrow_offsets: Vec<usize>,
    /// Atoms already carrying a charge, from a bracket or a clause.
    charged: BTreeSet<AtomId>,
    /// Set right after `.` or `>`; an explicit bond in this state
    /// contradicts the separator.
    suppress: bool,
    /// Offset of a `.` still waiting for an atom on its right.
    dangling_dot: Option<usize>,
    next_id: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, options: &'a ParseOptions) -> Self {
        Parser {
            input,
            options,
            molecules: Vec::new(),
            current: None,
            registry: RingRegistry::new(),
            marks: Vec::new(),
            arrow_offsets: Vec::new(),
            charged: BTreeSet::new(),
            suppress: false,
            dangling_dot: None,
            next_id: 0,
        }
    }

    /// Parses the whole input and runs the post-descent validation pass.
    pub fn run(mut self) -> Result<ParseResult, ParseError> {
        let body = self.input.trim();
        let start = self.input.len() - self.input.trim_start().len();
        self.fragment(start, start + body.len(), None, 0, None)?;
        if let Some(at) = self.dangling_dot {
            return Err(ParseError::new(ErrorKind::DanglingSeparator, at, 1));
        }
        self.finalize_current();

        if self.molecules.is_empty() {
            return Err(ParseError::new(
                ErrorKind::EmptyInput,
                0,
                self.input.len().max(1),
            ));
        }
        if self.marks.len() % 2 != 0 {
            let offset = self.arrow_offsets.last().copied().unwrap_or(0);
            return Err(ParseError::new(
                ErrorKind::UnbalancedArrows(self.marks.len()),
                offset,
                1,
            ));
        }

        let owner = self.owner_map();
        for ring in self.registry.rings() {
            let home = owner.get(&ring.start).copied();
            let mut ids = vec![ring.start];
            ids.extend(ring.end);
            ids.extend(ring.members.iter().copied());
            if ids.iter().any(|id| owner.get(id).copied() != home) {
                return Err(ParseError::new(
                    ErrorKind::RingAcrossMolecules(ring.digit),
                    ring.offset,
                    1,
                ));
            }
        }
        if let Some(open) = self.registry.first_unclosed() {
            return Err(ParseError::new(
                ErrorKind::UnclosedRing(open.digit),
                open.offset,
                1,
            ));
        }

        let mut rings = std::mem::take(&mut self.registry).into_rings();
        for ring in &rings {
            let (Some(&mi), Some(end)) = (owner.get(&ring.start), ring.end)
            else {
                continue;
            };
            let kind = if ring.aromatic == Some(true) {
                BondKind::Aromatic
            } else {
                BondKind::Single
            };
            if let Some(start) = self.molecules[mi].atom_mut(ring.start) {
                start.bonds.push(Bond::new(kind, end));
            }
        }
        for ring in &mut rings {
            let Some(&mi) = owner.get(&ring.start) else { continue };
            ring::resolve(&mut self.molecules[mi], ring).map_err(|e| {
                e.context(format!(
                    "while resolving ring digit {}",
                    ring.digit
                ))
            })?;
        }

        let in_ring: BTreeSet<AtomId> = rings
            .iter()
            .flat_map(|r| r.members.iter().copied())
            .collect();
        for mol in &self.molecules {
            for atom in mol.atoms() {
                if atom.aromatic && !in_ring.contains(&atom.id) {
                    return Err(ParseError::new(
                        ErrorKind::AromaticAtomOutsideRing,
                        atom.offset,
                        atom.len.max(1),
                    ));
                }
            }
        }
        for ring in rings {
            if let Some(&mi) = owner.get(&ring.start) {
                self.molecules[mi].push_ring(ring);
            }
        }

        if self.options.implicit_hydrogens {
            for mol in &mut self.molecules {
                graph::add_implicit_hydrogens(mol, &mut self.next_id);
            }
        }
        if self.options.check_bond_counts {
            for mol in &self.molecules {
                if let Some(v) = graph::check_valences(mol) {
                    let len =
                        mol.atom(v.atom).map(|a| a.len.max(1)).unwrap_or(1);
                    return Err(ParseError::new(
                        ErrorKind::ValenceExceeded {
                            element: v.element.to_string(),
                            found: v.found,
                            allowed: v.allowed.to_vec(),
                        },
                        v.offset,
                        len,
                    ));
                }
            }
        }

        debug!(
            molecules = self.molecules.len(),
            atoms = self.next_id,
            marks = self.marks.len(),
            "parse complete"
        );
        Ok(ParseResult::from_parts(
            self.input.to_string(),
            self.options.clone(),
            self.molecules,
            self.marks,
            self.next_id,
        ))
    }

    /// One fragment of input: the top level, or the body of one branch.
    /// `seed` is a bond symbol inherited from just before the opening
    /// paren; it bonds the branch's first atom to `parent`.
    fn fragment(
        &mut self,
        start: usize,
        end: usize,
        parent: Option<AtomId>,
        depth: u32,
        seed: Option<(BondKind, usize)>,
    ) -> Result<(), ParseError> {
        let mut frame = Frame { prev: None, pending: seed, parent };
        let mut at = start;
        while at < end {
            let b = self.input.as_bytes()[at];
            match b {
                b'.' if depth == 0 && self.options.disconnected_structures => {
                    self.separator(&mut frame, at)?;
                    at += 1;
                }
                b'>' if depth == 0 && self.options.reactions => {
                    self.arrow(&mut frame, at)?;
                    at += 1;
                }
                b'-' | b'=' | b'#' | b':' => {
                    self.bond_symbol(&mut frame, b, at)?;
                    at += 1;
                }
                b'{' if self.options.charge_clauses => {
                    at = self.charge_clause(&mut frame, at)?;
                }
                b'[' if self.options.bracket_atoms => {
                    at = self.bracket(&mut frame, at, depth)?;
                }
                b'(' if self.options.branches => {
                    at = self.branch(&mut frame, at, depth)?;
                }
                b'0'..=b'9' | b'%' if self.options.rings => {
                    at = self.ring_digit(&mut frame, at)?;
                }
                _ => {
                    at = self.bare_atom(&mut frame, at, depth)?;
                }
            }
        }
        if let Some((_, offset)) = frame.pending {
            return Err(ParseError::new(ErrorKind::TrailingBond, offset, 1));
        }
        Ok(())
    }

    /// `.`: finish the current molecule and start a fresh one. The
    /// separator needs a molecule on both sides; only arrows may border
    /// an empty zone.
    fn separator(
        &mut self,
        frame: &mut Frame,
        at: usize,
    ) -> Result<(), ParseError> {
        if let Some((_, offset)) = frame.pending {
            return Err(ParseError::new(ErrorKind::TrailingBond, offset, 1));
        }
        if self.current.is_none() {
            return Err(ParseError::new(ErrorKind::DanglingSeparator, at, 1));
        }
        self.finalize_current();
        self.suppress = true;
        self.dangling_dot = Some(at);
        frame.prev = None;
        Ok(())
    }

    /// `>`: like `.`, and additionally record the reaction boundary.
    fn arrow(&mut self, frame: &mut Frame, at: usize) -> Result<(), ParseError> {
        if let Some((_, offset)) = frame.pending {
            return Err(ParseError::new(ErrorKind::TrailingBond, offset, 1));
        }
        if let Some(dot) = self.dangling_dot {
            return Err(ParseError::new(ErrorKind::DanglingSeparator, dot, 1));
        }
        if !self.options.multiple_reactions && self.arrow_offsets.len() >= 2 {
            return Err(ParseError::new(ErrorKind::MultipleReactions, at, 1));
        }
        self.finalize_current();
        self.marks.push(self.molecules.len());
        self.arrow_offsets.push(at);
        self.suppress = true;
        frame.prev = None;
        Ok(())
    }

    fn bond_symbol(
        &mut self,
        frame: &mut Frame,
        byte: u8,
        at: usize,
    ) -> Result<(), ParseError> {
        let Some(kind) = lexer::bond_symbol(byte) else {
            return Err(ParseError::new(
                ErrorKind::UnexpectedChar(byte as char),
                at,
                1,
            ));
        };
        if kind == BondKind::Aromatic && !self.options.aromatic_bonds {
            return Err(ParseError::new(ErrorKind::UnexpectedChar(':'), at, 1));
        }
        if self.suppress {
            return Err(ParseError::new(ErrorKind::BondAfterSeparator, at, 1));
        }
        if frame.pending.is_some() {
            return Err(ParseError::new(ErrorKind::RepeatedBond, at, 1));
        }
        if frame.prev.is_none() && frame.parent.is_none() {
            return Err(ParseError::new(ErrorKind::DanglingBond, at, 1));
        }
        if kind == BondKind::Aromatic {
            if !self.registry.has_open() {
                return Err(ParseError::new(
                    ErrorKind::AromaticBondOutsideRing,
                    at,
                    1,
                ));
            }
            self.registry.mark_open_aromatic();
        }
        frame.pending = Some((kind, at));
        Ok(())
    }

    /// `{...}`: a charge clause for the chain's last atom.
    fn charge_clause(
        &mut self,
        frame: &mut Frame,
        at: usize,
    ) -> Result<usize, ParseError> {
        let (body_start, body_end) =
            lexer::delimited_span(self.input, at, b'{', b'}')?;
        let span = body_end + 1 - at;
        let Some(target) = frame.prev else {
            return Err(ParseError::new(ErrorKind::ChargeBeforeAtom, at, span));
        };
        let value = lexer::charge_clause(
            &self.input[body_start..body_end],
            body_start,
        )?;
        if let Some(atom) =
            self.current.as_mut().and_then(|m| m.atom_mut(target))
        {
            if atom.radical {
                return Err(ParseError::new(
                    ErrorKind::ChargeOnRadical,
                    at,
                    span,
                ));
            }
            if self.charged.contains(&target)
                && !self.options.cumulative_charges
            {
                return Err(ParseError::new(
                    ErrorKind::RepeatedCharge,
                    at,
                    span,
                ));
            }
            atom.charge += value;
        }
        self.charged.insert(target);
        Ok(body_end + 1)
    }

    /// `[...]`: a bracket atom.
    fn bracket(
        &mut self,
        frame: &mut Frame,
        at: usize,
        depth: u32,
    ) -> Result<usize, ParseError> {
        let (body_start, body_end) =
            lexer::delimited_span(self.input, at, b'[', b']')?;
        let scanned = lexer::bracket_atom(
            &self.input[body_start..body_end],
            body_start,
            self.options.radicals,
        )?;
        let id = self.allocate_id();
        let mut atom =
            AtomGroup::new(id, scanned.symbol, at, body_end + 1 - at, depth);
        atom.mass = scanned.mass;
        atom.aromatic = scanned.aromatic;
        atom.charge = scanned.charge;
        atom.radical = scanned.radical;
        atom.add_element("H", scanned.hydrogens);
        if scanned.charge != 0 {
            self.charged.insert(id);
        }
        self.complete(frame, atom);
        Ok(body_end + 1)
    }

    /// `(...)`: recurse over the branch body. A pending bond carries in and
    /// applies to the branch's first atom.
    fn branch(
        &mut self,
        frame: &mut Frame,
        at: usize,
        depth: u32,
    ) -> Result<usize, ParseError> {
        if depth + 1 > BRANCH_DEPTH_LIMIT {
            return Err(ParseError::new(
                ErrorKind::BranchTooDeep(BRANCH_DEPTH_LIMIT),
                at,
                1,
            ));
        }
        let (body_start, body_end) =
            lexer::delimited_span(self.input, at, b'(', b')')?;
        let parent = frame.prev.or(frame.parent);
        let seed = frame.pending.take();
        self.fragment(body_start, body_end, parent, depth + 1, seed)
            .map_err(|e| {
                e.context(format!("in branch opened at offset {at}"))
            })?;
        Ok(body_end + 1)
    }

    /// A ring-closure digit for the chain's last atom.
    fn ring_digit(
        &mut self,
        frame: &mut Frame,
        at: usize,
    ) -> Result<usize, ParseError> {
        let Some((value, len)) = lexer::ring_digit(self.input, at)? else {
            return Err(ParseError::new(ErrorKind::MalformedRingDigit, at, 1));
        };
        let Some(target) = frame.prev else {
            return Err(ParseError::new(ErrorKind::DigitBeforeAtom, at, len));
        };
        self.registry.attach(value, target, at, len)?;
        if let Some(atom) =
            self.current.as_mut().and_then(|m| m.atom_mut(target))
        {
            atom.ring_digits.push(value);
        }
        Ok(at + len)
    }

    /// Fallback: a bare atom, or the unexpected-character error that also
    /// covers every disabled feature's introducing character.
    fn bare_atom(
        &mut self,
        frame: &mut Frame,
        at: usize,
        depth: u32,
    ) -> Result<usize, ParseError> {
        let Some((symbol, aromatic, len)) = lexer::bare_atom(self.input, at)
        else {
            let c = self
                .input
                .get(at..)
                .and_then(|rest| rest.chars().next())
                .unwrap_or('?');
            return Err(ParseError::new(
                ErrorKind::UnexpectedChar(c),
                at,
                c.len_utf8(),
            ));
        };
        let id = self.allocate_id();
        let mut atom = AtomGroup::new(id, symbol, at, len, depth);
        atom.aromatic = aromatic;
        self.complete(frame, atom);
        Ok(at + len)
    }

    /// Commits a freshly built atom: links it into the chain, appends it to
    /// every open ring, and makes it the frame's new tail.
    fn complete(&mut self, frame: &mut Frame, atom: AtomGroup) {
        let id = atom.id;
        let pending = frame.pending.take();
        if self.suppress {
            // The separator already cut the chain; the atom starts a new
            // molecule and no bond is drawn.
            self.suppress = false;
        } else if let Some(link) = frame.prev.or(frame.parent) {
            let kind =
                pending.map(|(k, _)| k).unwrap_or(BondKind::Unspecified);
            if let Some(prior) =
                self.current.as_mut().and_then(|m| m.atom_mut(link))
            {
                prior.bonds.push(Bond::new(kind, id));
            }
        }
        trace!(atom = %id, symbol = atom.core_symbol(), "atom completed");
        self.current.get_or_insert_with(Molecule::new).insert(atom);
        self.registry.append_open(id);
        self.dangling_dot = None;
        frame.prev = Some(id);
    }

    fn finalize_current(&mut self) {
        if let Some(mol) = self.current.take() {
            self.molecules.push(mol);
        }
    }

    fn allocate_id(&mut self) -> AtomId {
        let id = AtomId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Atom id to index of the molecule owning it.
    fn owner_map(&self) -> BTreeMap<AtomId, usize> {
        let mut owner = BTreeMap::new();
        for (i, mol) in self.molecules.iter().enumerate() {
            for id in mol.ids() {
                owner.insert(id, i);
            }
        }
        owner
    }
}
