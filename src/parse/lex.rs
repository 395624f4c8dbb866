//! Tokenizing Tho assembly.
//!
//! This module holds the tokens that characterize Tho assembly ([`Token`]).
//! This module is used by the parser to facilitate the conversion of
//! assembly source code into statements.
//!
//! Tho assembly has very few kinds of tokens:
//! mnemonics, numeric literals, and `//` comments.
//! Whitespace (including line breaks) only separates tokens.

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

use crate::ast::Opcode;

/// A unit of information in Tho source code.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+", error = LexErr)]
pub enum Token {
    // Note, these regexes span over tokens that are technically invalid
    // (e.g., 12ab matches for decimal even though it shouldn't).
    // This is intended.
    // These regexes collect what would be considered one discernable unit
    // and validates it using the validator function.

    /// A numeric literal (e.g., `b1010`, `0xA`, `10`, `-3`).
    ///
    /// Literals too large for an `i64` saturate.
    /// Whether a literal fits its operand slot is checked by the assembler.
    #[regex(r"b[0-9]\w*", lex_bin, priority = 5)]
    #[regex(r"0[xX]\w*", lex_hex, priority = 5)]
    #[regex(r"-?[0-9]\w*", lex_dec, priority = 4)]
    Literal(i64),

    /// An instruction mnemonic (e.g. `LDA`, `sto`, `Jnz`).
    ///
    /// This token type is case-insensitive.
    /// Any other word that isn't a literal is lexed here and rejected.
    #[regex(r"[^\s/]+", lex_mnemonic)]
    Mnemonic(Opcode),

    /// A comment, which starts with `//` and spans the remaining part of the line.
    #[regex(r"//[^\n]*")]
    Comment,
}

/// Any errors raised in attempting to tokenize an input stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Binary literal (starting with b) has digits other than 0 and 1
    InvalidBinary,
    /// Hex literal (starting with 0x) has invalid hex digits
    InvalidHex,
    /// Hex literal (starting with 0x) doesn't have digits after it
    InvalidHexEmpty,
    /// Numeric literal could not be parsed as a decimal literal because it has invalid digits (i.e., not 0-9)
    InvalidNumeric,
    /// A word that is neither a literal nor a known mnemonic
    #[default]
    UnrecognizedKeyword,
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::InvalidBinary       => f.write_str("invalid binary literal"),
            LexErr::InvalidHex          => f.write_str("invalid hex literal"),
            LexErr::InvalidHexEmpty     => f.write_str("invalid hex literal"),
            LexErr::InvalidNumeric      => f.write_str("invalid decimal literal"),
            LexErr::UnrecognizedKeyword => f.write_str("unrecognized keyword"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::InvalidBinary       => Some("a binary literal starts with 'b' and consists of 0 and 1".into()),
            LexErr::InvalidHex          => Some("a hex literal starts with '0x' and consists of 0-9, A-F".into()),
            LexErr::InvalidHexEmpty     => Some("there should be hex digits (0-9, A-F) here".into()),
            LexErr::InvalidNumeric      => Some("a decimal literal only consists of digits 0-9".into()),
            LexErr::UnrecognizedKeyword => Some("expected an instruction (e.g. LDA, STO, HLT) or a number".into()),
        }
    }
}

/// Helper that converts the result of integer parsing into a saturated literal or a LexErr.
///
/// Overflowing literals saturate so the assembler can report them as out of range.
fn saturate_int(
    result: Result<i64, std::num::ParseIntError>,
    invalid_digits_err: LexErr,
    empty_err: LexErr,
) -> Result<i64, LexErr> {
    match result {
        Ok(n) => Ok(n),
        Err(e) => match e.kind() {
            IntErrorKind::Empty        => Err(empty_err),
            IntErrorKind::InvalidDigit => Err(invalid_digits_err),
            IntErrorKind::PosOverflow  => Ok(i64::MAX),
            IntErrorKind::NegOverflow  => Ok(i64::MIN),
            _ => Err(invalid_digits_err),
        }
    }
}
fn lex_bin(lx: &Lexer<'_, Token>) -> Result<i64, LexErr> {
    let Some(bin) = lx.slice().strip_prefix('b') else {
        unreachable!("Lexer slice should have contained a b");
    };

    saturate_int(i64::from_str_radix(bin, 2), LexErr::InvalidBinary, LexErr::InvalidBinary)
}
fn lex_hex(lx: &Lexer<'_, Token>) -> Result<i64, LexErr> {
    let Some(hex) = lx.slice().strip_prefix("0x").or_else(|| lx.slice().strip_prefix("0X")) else {
        unreachable!("Lexer slice should have contained 0x or 0X");
    };

    saturate_int(i64::from_str_radix(hex, 16), LexErr::InvalidHex, LexErr::InvalidHexEmpty)
}
fn lex_dec(lx: &Lexer<'_, Token>) -> Result<i64, LexErr> {
    saturate_int(lx.slice().parse::<i64>(), LexErr::InvalidNumeric, LexErr::InvalidNumeric)
}
fn lex_mnemonic(lx: &Lexer<'_, Token>) -> Result<Opcode, LexErr> {
    lx.slice().parse::<Opcode>()
        .map_err(|()| LexErr::UnrecognizedKeyword)
}
