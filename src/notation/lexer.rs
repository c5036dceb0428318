//! Leaf recognizers for the individual notation forms. Each consumes one
//! construct from a byte position and reports errors with offsets local to
//! the text it was handed; the parser shifts them to input coordinates.

use crate::bond::BondKind;
use crate::element::{
    aromatic_element, leading_symbol, AROMATIC_BARE, AROMATIC_BRACKET,
};
use crate::notation::error::{ErrorKind, ParseError};

/// A fully scanned bracket atom body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BracketAtom {
    pub mass: Option<u32>,
    pub symbol: &'static str,
    pub aromatic: bool,
    pub hydrogens: u32,
    pub charge: i32,
    pub radical: bool,
}

/// Bond symbol classification.
pub(crate) fn bond_symbol(b: u8) -> Option<BondKind> {
    match b {
        b'-' => Some(BondKind::Single),
        b'=' => Some(BondKind::Double),
        b'#' => Some(BondKind::Triple),
        b':' => Some(BondKind::Aromatic),
        _ => None,
    }
}

/// Finds the span inside a delimiter pair opened at `open_at`, tracking
/// nesting depth. Returns the inner byte range (delimiters excluded).
pub(crate) fn delimited_span(
    text: &str,
    open_at: usize,
    open: u8,
    close: u8,
) -> Result<(usize, usize), ParseError> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open_at;
    while i < bytes.len() {
        if bytes[i] == open {
            depth += 1;
        } else if bytes[i] == close {
            depth -= 1;
            if depth == 0 {
                return Ok((open_at + 1, i));
            }
        }
        i += 1;
    }
    Err(ParseError::new(
        ErrorKind::UnclosedDelimiter(open as char),
        open_at,
        1,
    ))
}

/// One ring-closure digit at `at`: a bare decimal digit, or `%` followed by
/// exactly two digits. Returns the digit value and consumed length, or
/// `None` if the position holds neither form.
pub(crate) fn ring_digit(
    text: &str,
    at: usize,
) -> Result<Option<(u16, usize)>, ParseError> {
    let bytes = text.as_bytes();
    match bytes.get(at) {
        Some(b) if b.is_ascii_digit() => Ok(Some(((b - b'0') as u16, 1))),
        Some(b'%') => {
            let d1 = bytes.get(at + 1).filter(|b| b.is_ascii_digit());
            let d2 = bytes.get(at + 2).filter(|b| b.is_ascii_digit());
            match (d1, d2) {
                (Some(a), Some(b)) => {
                    let digit = (a - b'0') as u16 * 10 + (b - b'0') as u16;
                    Ok(Some((digit, 3)))
                }
                _ => Err(ParseError::new(
                    ErrorKind::MalformedRingDigit,
                    at,
                    1,
                )),
            }
        }
        _ => Ok(None),
    }
}

/// A bare atom at `at`: two-letter organic-subset symbol, one-letter
/// organic-subset symbol, or lowercase aromatic whitelist entry, longest
/// match first. Returns (canonical symbol, aromatic flag, consumed length).
pub(crate) fn bare_atom(
    text: &str,
    at: usize,
) -> Option<(&'static str, bool, usize)> {
    let rest = &text[at..];
    if rest.len() >= 2 && rest.is_char_boundary(2) {
        if let Some(sym) = leading_symbol(&rest[..2]) {
            if sym.len() == 2 && crate::element::is_organic_subset(sym) {
                return Some((sym, false, 2));
            }
        }
    }
    if rest.is_empty() || !rest.is_char_boundary(1) {
        return None;
    }
    let first = &rest[..1];
    if let Some(sym) = leading_symbol(first) {
        if crate::element::is_organic_subset(sym) {
            return Some((sym, false, 1));
        }
    }
    if AROMATIC_BARE.contains(&first) {
        if let Some(sym) = aromatic_element(first) {
            return Some((sym, true, 1));
        }
    }
    None
}

/// Parses a bracket body (text between `[` and `]`). `base` is the body's
/// byte offset in the original input; errors come back in input
/// coordinates. `allow_radical` gates the trailing `.` marker.
pub(crate) fn bracket_atom(
    body: &str,
    base: usize,
    allow_radical: bool,
) -> Result<BracketAtom, ParseError> {
    let bytes = body.as_bytes();
    let mut i = 0usize;

    let iso_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mass = if i > iso_start {
        let parsed = body[iso_start..i]
            .parse::<u32>()
            .map_err(|_| {
                ParseError::new(
                    ErrorKind::InvalidIsotope,
                    base + iso_start,
                    i - iso_start,
                )
            })?;
        Some(parsed)
    } else {
        None
    };

    let (symbol, aromatic, sym_len) = match element_in_bracket(&body[i..]) {
        Some(found) => found,
        None => {
            if i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                let run: String = body[i..]
                    .chars()
                    .take_while(|c| c.is_ascii_alphabetic())
                    .collect();
                let run_len = run.len();
                return Err(ParseError::new(
                    ErrorKind::UnknownElement(run),
                    base + i,
                    run_len,
                ));
            }
            return Err(ParseError::new(
                ErrorKind::EmptyBracket,
                base + i,
                1,
            ));
        }
    };
    i += sym_len;

    let mut hydrogens = 0u32;
    if bytes.get(i) == Some(&b'H') {
        i += 1;
        let h_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        hydrogens = if i > h_start {
            body[h_start..i].parse::<u32>().map_err(|_| {
                ParseError::new(
                    ErrorKind::MalformedCharge,
                    base + h_start,
                    i - h_start,
                )
            })?
        } else {
            1
        };
    }

    let mut charge = 0i32;
    if let Some(&sign) = bytes.get(i).filter(|b| **b == b'+' || **b == b'-') {
        let unit: i32 = if sign == b'+' { 1 } else { -1 };
        i += 1;
        let digit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i > digit_start {
            let magnitude =
                body[digit_start..i].parse::<i32>().map_err(|_| {
                    ParseError::new(
                        ErrorKind::MalformedCharge,
                        base + digit_start,
                        i - digit_start,
                    )
                })?;
            charge = unit * magnitude;
        } else {
            charge = unit;
            while bytes.get(i) == Some(&sign) {
                charge += unit;
                i += 1;
            }
        }
    }

    let mut radical = false;
    if allow_radical && bytes.get(i) == Some(&b'.') {
        radical = true;
        i += 1;
    }

    if let Some(c) = body[i..].chars().next() {
        return Err(ParseError::new(
            ErrorKind::UnexpectedChar(c),
            base + i,
            c.len_utf8(),
        ));
    }
    Ok(BracketAtom {
        mass,
        symbol,
        aromatic,
        hydrogens,
        charge,
        radical,
    })
}

/// Element at the start of a bracket body: aromatic shorthand (two-letter
/// first) or a full-table symbol.
fn element_in_bracket(rest: &str) -> Option<(&'static str, bool, usize)> {
    if rest.len() >= 2 && rest.is_char_boundary(2) {
        let two = &rest[..2];
        if AROMATIC_BRACKET.contains(&two) {
            if let Some(sym) = aromatic_element(two) {
                return Some((sym, true, 2));
            }
        }
    }
    if !rest.is_empty() && rest.is_char_boundary(1) {
        let one = &rest[..1];
        if AROMATIC_BRACKET.contains(&one) {
            if let Some(sym) = aromatic_element(one) {
                return Some((sym, true, 1));
            }
        }
    }
    let sym = leading_symbol(rest)?;
    Some((sym, false, sym.len()))
}

/// Parses a charge clause body (text between `{` and `}`): a sign with
/// optional magnitude, or a magnitude followed by a sign.
pub(crate) fn charge_clause(
    body: &str,
    base: usize,
) -> Result<i32, ParseError> {
    let err = || {
        ParseError::new(ErrorKind::MalformedCharge, base, body.len().max(1))
    };
    if !body.is_ascii() {
        return Err(err());
    }
    let bytes = body.as_bytes();
    match bytes.first() {
        Some(&sign @ (b'+' | b'-')) => {
            let unit: i32 = if sign == b'+' { 1 } else { -1 };
            let rest = &body[1..];
            if rest.is_empty() {
                Ok(unit)
            } else if rest.bytes().all(|b| b.is_ascii_digit()) {
                let magnitude = rest.parse::<i32>().map_err(|_| err())?;
                Ok(unit * magnitude)
            } else {
                Err(err())
            }
        }
        Some(b) if b.is_ascii_digit() => {
            let sign_at = body.len() - 1;
            let digits = &body[..sign_at];
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            let magnitude = digits.parse::<i32>().map_err(|_| err())?;
            match bytes[sign_at] {
                b'+' => Ok(magnitude),
                b'-' => Ok(-magnitude),
                _ => Err(err()),
            }
        }
        _ => Err(err()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Bond symbols ----

    #[test]
    fn bond_symbols() {
        assert_eq!(bond_symbol(b'-'), Some(BondKind::Single));
        assert_eq!(bond_symbol(b'='), Some(BondKind::Double));
        assert_eq!(bond_symbol(b'#'), Some(BondKind::Triple));
        assert_eq!(bond_symbol(b':'), Some(BondKind::Aromatic));
        assert_eq!(bond_symbol(b'C'), None);
    }

    // ---- Delimited spans ----

    #[test]
    fn span_simple() {
        assert_eq!(delimited_span("C(CC)O", 1, b'(', b')').unwrap(), (2, 4));
    }

    #[test]
    fn span_nested() {
        assert_eq!(
            delimited_span("C(C(N)C)O", 1, b'(', b')').unwrap(),
            (2, 7)
        );
    }

    #[test]
    fn span_unclosed() {
        let err = delimited_span("C(CC", 1, b'(', b')').unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnclosedDelimiter('('));
        assert_eq!(err.span(), (1, 1));
    }

    // ---- Ring digits ----

    #[test]
    fn single_digit() {
        assert_eq!(ring_digit("C1CC1", 1).unwrap(), Some((1, 1)));
        assert_eq!(ring_digit("C1CC1", 0).unwrap(), None);
    }

    #[test]
    fn percent_digit() {
        assert_eq!(ring_digit("C%12CC%12", 1).unwrap(), Some((12, 3)));
    }

    #[test]
    fn percent_needs_two_digits() {
        let err = ring_digit("C%1C", 1).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedRingDigit);
    }

    // ---- Bare atoms ----

    #[test]
    fn bare_two_letter_wins() {
        assert_eq!(bare_atom("ClC", 0), Some(("Cl", false, 2)));
        assert_eq!(bare_atom("Br", 0), Some(("Br", false, 2)));
    }

    #[test]
    fn bare_single_letters() {
        assert_eq!(bare_atom("CN", 0), Some(("C", false, 1)));
        assert_eq!(bare_atom("CN", 1), Some(("N", false, 1)));
        assert_eq!(bare_atom("I", 0), Some(("I", false, 1)));
    }

    #[test]
    fn bare_aromatic_shorthand() {
        assert_eq!(bare_atom("c1", 0), Some(("C", true, 1)));
        assert_eq!(bare_atom("n", 0), Some(("N", true, 1)));
    }

    #[test]
    fn bare_rejects_others() {
        assert_eq!(bare_atom("Fe", 0), None); // not organic subset
        assert_eq!(bare_atom("x", 0), None);
        assert_eq!(bare_atom("H", 0), None);
    }

    // ---- Bracket atoms ----

    fn bracket(body: &str) -> BracketAtom {
        bracket_atom(body, 0, true).unwrap()
    }

    #[test]
    fn bracket_plain() {
        let a = bracket("Fe");
        assert_eq!(a.symbol, "Fe");
        assert!(!a.aromatic);
        assert_eq!(a.hydrogens, 0);
        assert_eq!(a.charge, 0);
    }

    #[test]
    fn bracket_full_form() {
        let a = bracket("13CH3+");
        assert_eq!(a.mass, Some(13));
        assert_eq!(a.symbol, "C");
        assert_eq!(a.hydrogens, 3);
        assert_eq!(a.charge, 1);
        assert!(!a.radical);
    }

    #[test]
    fn bracket_charges() {
        assert_eq!(bracket("O-").charge, -1);
        assert_eq!(bracket("O--").charge, -2);
        assert_eq!(bracket("Fe+3").charge, 3);
        assert_eq!(bracket("N+").charge, 1);
    }

    #[test]
    fn bracket_hydrogen_default_count() {
        assert_eq!(bracket("NH").hydrogens, 1);
        assert_eq!(bracket("NH4+").hydrogens, 4);
    }

    #[test]
    fn bracket_radical() {
        let a = bracket("CH3.");
        assert!(a.radical);
        assert_eq!(a.hydrogens, 3);
    }

    #[test]
    fn bracket_radical_disabled_is_junk() {
        let err = bracket_atom("CH3.", 0, false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedChar('.'));
    }

    #[test]
    fn bracket_aromatic_shorthands() {
        let a = bracket("nH");
        assert_eq!(a.symbol, "N");
        assert!(a.aromatic);
        assert_eq!(a.hydrogens, 1);
        let se = bracket("se");
        assert_eq!(se.symbol, "Se");
        assert!(se.aromatic);
    }

    #[test]
    fn bracket_lone_hydrogen() {
        let a = bracket("H");
        assert_eq!(a.symbol, "H");
        assert_eq!(a.hydrogens, 0);
        let d = bracket("2H");
        assert_eq!(d.mass, Some(2));
    }

    #[test]
    fn bracket_empty_or_elementless() {
        assert_eq!(
            bracket_atom("", 0, true).unwrap_err().kind(),
            &ErrorKind::EmptyBracket
        );
        assert_eq!(
            bracket_atom("12", 0, true).unwrap_err().kind(),
            &ErrorKind::EmptyBracket
        );
        assert_eq!(
            bracket_atom("+", 0, true).unwrap_err().kind(),
            &ErrorKind::EmptyBracket
        );
    }

    #[test]
    fn bracket_unknown_element() {
        let err = bracket_atom("Xx", 0, true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownElement("Xx".into()));
    }

    #[test]
    fn bracket_trailing_junk() {
        let err = bracket_atom("C?", 5, true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedChar('?'));
        assert_eq!(err.span(), (6, 1));
    }

    #[test]
    fn bracket_prefers_long_symbol() {
        assert_eq!(bracket("Hg").symbol, "Hg");
        assert_eq!(bracket("Sn").symbol, "Sn");
    }

    #[test]
    fn bracket_multibyte_is_an_error() {
        let err = bracket_atom("xé", 0, true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownElement("x".into()));
        let err = bracket_atom("Né", 0, true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedChar('é'));
    }

    // ---- Charge clauses ----

    #[test]
    fn clause_signs() {
        assert_eq!(charge_clause("+", 0).unwrap(), 1);
        assert_eq!(charge_clause("-", 0).unwrap(), -1);
    }

    #[test]
    fn clause_magnitudes() {
        assert_eq!(charge_clause("+2", 0).unwrap(), 2);
        assert_eq!(charge_clause("2-", 0).unwrap(), -2);
        assert_eq!(charge_clause("3+", 0).unwrap(), 3);
    }

    #[test]
    fn clause_rejects_garbage() {
        for body in ["", "x", "+-", "2", "++", "1 +", "é", "1é", "+é"] {
            let err = charge_clause(body, 3).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::MalformedCharge, "{body:?}");
        }
    }
}
