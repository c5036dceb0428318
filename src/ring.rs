use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::atom::AtomId;
use crate::bond::BondKind;
use crate::graph::{self, PathLimits};
use crate::molecule::Molecule;
use crate::notation::error::{ErrorKind, ParseError};

/// Identity of a ring, assigned in closure-digit creation order, unique
/// across the whole parse result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RingId(pub usize);

/// One ring-closure pair.
///
/// While its digit is open the member list is provisional: every atom
/// completed anywhere in the input gets appended, which over-includes branch
/// atoms and detour atoms in fused systems. [`resolve`] replaces the list
/// with the actual cycle arc afterwards. The aromatic flag is three-state:
/// `None` until resolution, then the settled answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub id: RingId,
    /// The closure digit as written (`%` form included).
    pub digit: u16,
    /// Atom the digit first appeared on.
    pub start: AtomId,
    /// Atom the digit closed on; `None` while open.
    pub end: Option<AtomId>,
    /// `None` = not yet resolved.
    pub aromatic: Option<bool>,
    /// Provisional during parse, the resolved cycle arc afterwards. The
    /// first member is always `start`.
    pub members: Vec<AtomId>,
    /// Byte offset of the opening digit, for diagnostics.
    pub offset: usize,
}

impl Ring {
    pub fn is_closed(&self) -> bool {
        self.end.is_some()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.members.contains(&id)
    }
}

/// Open-digit table used while parsing. Digits key open rings; a closed
/// digit can be reused to open a fresh ring.
#[derive(Debug, Default)]
pub(crate) struct RingRegistry {
    rings: Vec<Ring>,
    open: BTreeMap<u16, usize>,
}

impl RingRegistry {
    pub fn new() -> Self {
        RingRegistry::default()
    }

    /// Handles one digit attachment: opens a ring keyed by `atom`, or closes
    /// the matching open ring with `atom` as its end. Closing on the opening
    /// atom itself is the duplicate-digit error.
    pub fn attach(
        &mut self,
        digit: u16,
        atom: AtomId,
        offset: usize,
        len: usize,
    ) -> Result<(), ParseError> {
        if let Some(&idx) = self.open.get(&digit) {
            if self.rings[idx].start == atom {
                return Err(ParseError::new(
                    ErrorKind::DuplicateRingDigit(digit),
                    offset,
                    len,
                ));
            }
            self.rings[idx].end = Some(atom);
            self.open.remove(&digit);
            trace!(digit, atom = %atom, "ring closed");
        } else {
            let id = RingId(self.rings.len());
            self.rings.push(Ring {
                id,
                digit,
                start: atom,
                end: None,
                aromatic: None,
                members: vec![atom],
                offset,
            });
            self.open.insert(digit, self.rings.len() - 1);
            trace!(digit, atom = %atom, "ring opened");
        }
        Ok(())
    }

    /// Appends a freshly completed atom to every open ring's provisional
    /// member list.
    pub fn append_open(&mut self, atom: AtomId) {
        for &idx in self.open.values() {
            self.rings[idx].members.push(atom);
        }
    }

    pub fn has_open(&self) -> bool {
        !self.open.is_empty()
    }

    /// Every ring seen so far, open or closed, in digit-pair order.
    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Marks every open ring aromatic (explicit aromatic bond symbol seen).
    pub fn mark_open_aromatic(&mut self) {
        for &idx in self.open.values() {
            self.rings[idx].aromatic = Some(true);
        }
    }

    /// Earliest-opened ring still missing its partner digit.
    pub fn first_unclosed(&self) -> Option<&Ring> {
        self.open.values().map(|&i| &self.rings[i]).min_by_key(|r| r.id)
    }

    pub fn into_rings(self) -> Vec<Ring> {
        self.rings
    }
}

/// Consecutive member pairs plus the closing wrap-around pair.
fn member_pairs(members: &[AtomId]) -> Vec<(AtomId, AtomId)> {
    let mut pairs = Vec::new();
    if members.len() < 2 {
        return pairs;
    }
    for w in members.windows(2) {
        pairs.push((w[0], w[1]));
    }
    pairs.push((members[members.len() - 1], members[0]));
    pairs
}

/// Resolves a closed ring in place: replaces the provisional member list
/// with the longest simple path from start to end through the candidates,
/// then settles the aromatic flag.
///
/// Lowercase-uniform rings become aromatic and have every member-to-member
/// bond (wrap-around included) coerced to aromatic type. Rings marked
/// aromatic by an explicit bond symbol must already be aromatic-bonded all
/// the way around. Mixed lowercase/plain membership is an error.
pub(crate) fn resolve(
    mol: &mut Molecule,
    ring: &mut Ring,
) -> Result<(), ParseError> {
    let Some(end) = ring.end else { return Ok(()) };
    let mut allowed: BTreeSet<AtomId> = ring.members.iter().copied().collect();
    allowed.insert(ring.start);
    allowed.insert(end);

    let paths = graph::simple_paths(
        mol,
        ring.start,
        end,
        Some(&allowed),
        PathLimits::default(),
    )
    .map_err(|_| {
        ParseError::new(ErrorKind::RingTooComplex(ring.digit), ring.offset, 1)
    })?;
    let Some(path) = paths.into_iter().max_by_key(|p| p.len()) else {
        return Err(ParseError::new(
            ErrorKind::RingTooComplex(ring.digit),
            ring.offset,
            1,
        ));
    };
    ring.members = graph::path_atoms(mol, ring.start, &path);
    trace!(digit = ring.digit, size = ring.members.len(), "ring resolved");

    let flags: Vec<bool> = ring
        .members
        .iter()
        .map(|id| mol.atom(*id).map(|a| a.aromatic).unwrap_or(false))
        .collect();
    let lower = flags.iter().filter(|f| **f).count();
    if lower != 0 && lower != flags.len() {
        let i = flags.iter().position(|f| *f != flags[0]).unwrap_or(0);
        let (off, len) = mol
            .atom(ring.members[i])
            .map(|a| (a.offset, a.len.max(1)))
            .unwrap_or((ring.offset, 1));
        return Err(ParseError::new(
            ErrorKind::MixedRingCase(ring.digit),
            off,
            len,
        ));
    }

    let pairs = member_pairs(&ring.members);
    if !flags.is_empty() && lower == flags.len() {
        ring.aromatic = Some(true);
        for (a, b) in pairs {
            graph::coerce_bonds(mol, a, b, BondKind::Aromatic);
        }
    } else if ring.aromatic == Some(true) {
        for (a, b) in &pairs {
            let refs = graph::bonds_between(mol, *a, *b);
            let all_aromatic = !refs.is_empty()
                && refs.iter().all(|r| {
                    r.get(mol)
                        .map(|bond| bond.kind == BondKind::Aromatic)
                        .unwrap_or(false)
                });
            if !all_aromatic {
                let (off, len) = mol
                    .atom(*b)
                    .map(|x| (x.offset, x.len.max(1)))
                    .unwrap_or((ring.offset, 1));
                return Err(ParseError::new(
                    ErrorKind::PlainBondInAromaticRing(ring.digit),
                    off,
                    len,
                ));
            }
        }
    } else {
        ring.aromatic = Some(false);
    }
    Ok(())
}
