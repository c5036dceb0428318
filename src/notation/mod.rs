//! The notation front end: recognizers, the recursive parser, and the
//! writer that turns a parse result back into text.

pub mod error;
mod lexer;
mod parser;
pub(crate) mod writer;

pub use error::{ErrorCategory, ErrorKind, ParseError};
pub use writer::RingDigitsExhausted;

use crate::options::ParseOptions;
use crate::result::ParseResult;

/// Parses `input` with the default options.
pub fn parse(input: &str) -> Result<ParseResult, ParseError> {
    parse_with(input, &ParseOptions::default())
}

/// Parses `input` under `options`. Options are only read; callers keep a
/// stored configuration and pass tweaked copies per call.
///
/// Every error comes back with the original input attached, so its
/// `Display` form underlines the offending span.
pub fn parse_with(
    input: &str,
    options: &ParseOptions,
) -> Result<ParseResult, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::new(
            ErrorKind::EmptyInput,
            0,
            input.len().max(1),
        )
        .with_input(input));
    }
    parser::Parser::new(input, options)
        .run()
        .map_err(|e| e.with_input(input))
}
