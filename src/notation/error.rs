use std::fmt;

use thiserror::Error;

/// Broad error classification. Tests and callers that do not care about the
/// precise kind can match on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Bond,
    Ring,
    Valence,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Bond => "bond",
            ErrorCategory::Ring => "ring",
            ErrorCategory::Valence => "valence",
        };
        f.write_str(s)
    }
}

/// Specific failure, with whatever detail the site had on hand.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// Input was empty or all whitespace.
    #[error("empty input")]
    EmptyInput,
    /// A byte no recognizer claimed. Also produced when a disabled feature's
    /// introducing character shows up.
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    /// Bracket body text that matches no element or shorthand.
    #[error("unknown element '{0}'")]
    UnknownElement(String),
    /// Input ended while a bracket, brace, or parenthesis was open.
    #[error("unclosed '{0}'")]
    UnclosedDelimiter(char),
    /// `[]` or a bracket with modifiers but no element.
    #[error("bracket atom has no element")]
    EmptyBracket,
    /// Isotope prefix that does not fit an integer mass.
    #[error("isotope number out of range")]
    InvalidIsotope,
    /// `%` not followed by exactly two digits.
    #[error("'%' must be followed by two digits")]
    MalformedRingDigit,
    /// Charge clause content that is not a sign with optional magnitude.
    #[error("malformed charge clause")]
    MalformedCharge,
    /// Second charge applied to an atom without cumulative-charge mode.
    #[error("charge already set on this atom")]
    RepeatedCharge,
    /// Charge clause aimed at an atom carrying a radical marker.
    #[error("charge conflicts with radical marker")]
    ChargeOnRadical,
    /// A ring digit opened and closed on the same atom (`C11`).
    #[error("ring digit '{0}' opened and closed on one atom")]
    DuplicateRingDigit(u16),
    /// Ring digit before any atom exists.
    #[error("ring digit with no preceding atom")]
    DigitBeforeAtom,
    /// Charge clause before any atom exists.
    #[error("charge clause with no preceding atom")]
    ChargeBeforeAtom,
    /// Branch nesting past the recursion guard.
    #[error("branches nested deeper than {0}")]
    BranchTooDeep(u32),
    /// Reaction arrows must come in pairs.
    #[error("reaction arrows must come in pairs (found {0})")]
    UnbalancedArrows(usize),
    /// A third arrow without multiple-reaction mode.
    #[error("more than one reaction in input")]
    MultipleReactions,
    /// `.` with no molecule on one side of it.
    #[error("'.' separator with nothing on one side")]
    DanglingSeparator,
    /// Explicit bond symbol directly after a `.` or `>` separator.
    #[error("bond symbol follows a separator")]
    BondAfterSeparator,
    /// Bond symbol with no atom before it to bond from.
    #[error("bond symbol with nothing before it")]
    DanglingBond,
    /// Two bond symbols with no atom between them.
    #[error("two bond symbols in a row")]
    RepeatedBond,
    /// Fragment ended while a bond symbol was still pending.
    #[error("bond symbol at end of fragment")]
    TrailingBond,
    /// `:` while no ring is open.
    #[error("aromatic bond outside an open ring")]
    AromaticBondOutsideRing,
    /// A digit was opened but its partner never appeared.
    #[error("ring digit '{0}' never closed")]
    UnclosedRing(u16),
    /// Ring members ended up in different molecules.
    #[error("ring digit '{0}' crosses a molecule boundary")]
    RingAcrossMolecules(u16),
    /// Some members lowercase-aromatic, some not.
    #[error("ring digit '{0}' mixes aromatic and plain atoms")]
    MixedRingCase(u16),
    /// Ring marked aromatic but a member bond is not aromatic-typed.
    #[error("non-aromatic bond inside aromatic ring '{0}'")]
    PlainBondInAromaticRing(u16),
    /// Lowercase shorthand atom that no resolved ring contains.
    #[error("aromatic atom outside any ring")]
    AromaticAtomOutsideRing,
    /// Path enumeration hit its ceiling while resolving members.
    #[error("ring digit '{0}' is too entangled to resolve")]
    RingTooComplex(u16),
    /// Bond-count check failed (only raised when the option is on).
    #[error("{element} has bond count {found}, allowed {allowed:?}")]
    ValenceExceeded {
        element: String,
        found: f64,
        allowed: Vec<u8>,
    },
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        use ErrorKind::*;
        match self {
            EmptyInput | UnexpectedChar(_) | UnknownElement(_)
            | UnclosedDelimiter(_) | EmptyBracket | InvalidIsotope
            | MalformedRingDigit | MalformedCharge | RepeatedCharge
            | ChargeOnRadical | DuplicateRingDigit(_) | DigitBeforeAtom
            | ChargeBeforeAtom | BranchTooDeep(_) | UnbalancedArrows(_)
            | MultipleReactions | DanglingSeparator => ErrorCategory::Syntax,
            BondAfterSeparator | DanglingBond | RepeatedBond
            | TrailingBond | AromaticBondOutsideRing => ErrorCategory::Bond,
            UnclosedRing(_) | RingAcrossMolecules(_) | MixedRingCase(_)
            | PlainBondInAromaticRing(_) | AromaticAtomOutsideRing
            | RingTooComplex(_) => ErrorCategory::Ring,
            ValenceExceeded { .. } => ErrorCategory::Valence,
        }
    }
}

/// A parse failure: an immutable kind plus source span, and a context trail
/// that grows as the error bubbles out of nested fragments. The outermost
/// boundary attaches the original input so `Display` can underline the
/// offending span.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    kind: ErrorKind,
    offset: usize,
    len: usize,
    context: Vec<String>,
    input: Option<String>,
}

impl ParseError {
    pub fn new(kind: ErrorKind, offset: usize, len: usize) -> Self {
        ParseError {
            kind,
            offset,
            len,
            context: Vec::new(),
            input: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Byte offset and length of the offending span.
    pub fn span(&self) -> (usize, usize) {
        (self.offset, self.len)
    }

    /// Appends a context frame. Innermost frames come first in the trail.
    pub fn context(mut self, frame: impl Into<String>) -> Self {
        self.context.push(frame.into());
        self
    }

    /// Attaches the original input for underlined rendering. Called once at
    /// the outermost parse boundary.
    pub fn with_input(mut self, input: &str) -> Self {
        self.input = Some(input.to_string());
        self
    }

    pub fn context_frames(&self) -> &[String] {
        &self.context
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} error: {}", self.category(), self.kind)?;
        if let Some(input) = &self.input {
            let width = self.len.max(1);
            write!(
                f,
                "\n  {}\n  {}{}",
                input,
                " ".repeat(self.offset.min(input.len())),
                "^".repeat(width)
            )?;
        }
        for frame in &self.context {
            write!(f, "\n  note: {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(ErrorKind::EmptyInput.category(), ErrorCategory::Syntax);
        assert_eq!(ErrorKind::DanglingBond.category(), ErrorCategory::Bond);
        assert_eq!(ErrorKind::UnclosedRing(1).category(), ErrorCategory::Ring);
        assert_eq!(
            ErrorKind::ValenceExceeded {
                element: "C".into(),
                found: 5.0,
                allowed: vec![4],
            }
            .category(),
            ErrorCategory::Valence
        );
    }

    #[test]
    fn display_without_input() {
        let e = ParseError::new(ErrorKind::UnexpectedChar('?'), 3, 1);
        assert_eq!(e.to_string(), "syntax error: unexpected character '?'");
    }

    #[test]
    fn display_underlines_span() {
        let e = ParseError::new(ErrorKind::UnexpectedChar('?'), 2, 1)
            .with_input("CC?C");
        let text = e.to_string();
        assert!(text.contains("CC?C"));
        assert!(text.ends_with("  ^"));
    }

    #[test]
    fn context_trail_innermost_first() {
        let e = ParseError::new(ErrorKind::EmptyBracket, 4, 2)
            .context("in bracket atom at column 4")
            .context("in branch opened at column 2");
        let frames = e.context_frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].starts_with("in bracket"));
        let text = e.to_string();
        assert!(text.contains("note: in bracket atom at column 4"));
    }

    #[test]
    fn error_source_is_kind() {
        use std::error::Error;
        let e = ParseError::new(ErrorKind::EmptyInput, 0, 0);
        assert!(e.source().is_some());
    }
}
