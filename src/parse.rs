//! Parsing Tho assembly source into statements.
//!
//! Tho's grammar is flat: a program is a sequence of mnemonics,
//! each followed by zero or more literals. Line breaks carry no meaning,
//! so a literal always belongs to the closest mnemonic before it.
//!
//! The main entry points are [`parse_ast`] (which parses a whole source at once)
//! and [`StmtParser`] (which yields each statement once the next mnemonic is seen).

pub mod lex;

use std::borrow::Cow;

use logos::{Logos, SpannedIter};

use crate::ast::asm::{Operand, Stmt};
use crate::err::ErrSpan;
use lex::{LexErr, Token};

/// Kinds of errors that can occur while parsing.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrKind {
    /// A token could not be lexed.
    Lex(LexErr),
    /// A literal appeared before any mnemonic.
    OrphanParameter,
}

/// Error from parsing Tho source.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseErr {
    /// The value with the error.
    pub kind: ParseErrKind,
    /// The span in the source associated with this error.
    pub span: ErrSpan,
}
impl ParseErr {
    /// Creates a new [`ParseErr`] with a given error kind and span.
    pub fn new<E: Into<ErrSpan>>(kind: ParseErrKind, span: E) -> Self {
        ParseErr { kind, span: span.into() }
    }
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ParseErrKind::Lex(e) => e.fmt(f),
            ParseErrKind::OrphanParameter => f.write_str("parameter without instruction"),
        }
    }
}
impl std::error::Error for ParseErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrKind::Lex(e) => Some(e),
            ParseErrKind::OrphanParameter => None,
        }
    }
}
impl crate::err::Error for ParseErr {
    fn span(&self) -> Option<ErrSpan> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<Cow<str>> {
        match &self.kind {
            ParseErrKind::Lex(e) => crate::err::Error::help(e),
            ParseErrKind::OrphanParameter => Some("a number must follow an instruction (e.g. LDA 0)".into()),
        }
    }
}

/// Parses Tho source into a list of statements.
///
/// This does not check operand counts or ranges. That is done by the assembler.
///
/// # Example
/// ```
/// use tho::parse::parse_ast;
/// use tho::ast::Opcode;
///
/// let stmts = parse_ast("STO 0\n 5 // split across lines\nOUT").unwrap();
/// assert_eq!(stmts.len(), 2);
/// assert_eq!(stmts[0].opcode, Opcode::STO);
/// assert_eq!(stmts[0].operands.len(), 2);
/// assert_eq!(stmts[1].opcode, Opcode::OUT);
/// ```
pub fn parse_ast(src: &str) -> Result<Vec<Stmt>, ParseErr> {
    StmtParser::new(src).collect()
}

/// An iterator over the statements of some source.
///
/// A statement is yielded once it is closed,
/// which happens when the next mnemonic is read or the source ends.
/// Errors are yielded as soon as the offending token is read.
/// Any statement still open at that point is dropped.
pub struct StmtParser<'s> {
    tokens: SpannedIter<'s, Token>,
    open: Option<Stmt>,
}
impl<'s> StmtParser<'s> {
    /// Creates a new parser over the given source.
    pub fn new(src: &'s str) -> Self {
        StmtParser { tokens: Token::lexer(src).spanned(), open: None }
    }
}
impl Iterator for StmtParser<'_> {
    type Item = Result<Stmt, ParseErr>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((m_token, span)) = self.tokens.next() {
            let token = match m_token {
                Ok(token) => token,
                Err(e) => {
                    self.open.take();
                    return Some(Err(ParseErr::new(ParseErrKind::Lex(e), span)));
                }
            };

            match token {
                Token::Mnemonic(opcode) => {
                    if let Some(closed) = self.open.replace(Stmt::new(opcode, span)) {
                        return Some(Ok(closed));
                    }
                },
                Token::Literal(value) => match &mut self.open {
                    Some(stmt) => stmt.operands.push(Operand { value, span }),
                    None => return Some(Err(ParseErr::new(ParseErrKind::OrphanParameter, span))),
                },
                Token::Comment => {},
            }
        }

        self.open.take().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::asm::{Operand, Stmt};
    use crate::ast::Opcode;
    use crate::err::ErrSpan;

    use super::lex::LexErr;
    use super::{parse_ast, ParseErr, ParseErrKind, StmtParser};

    fn op(value: i64, span: std::ops::Range<usize>) -> Operand {
        Operand { value, span }
    }

    #[test]
    fn test_simple() {
        let stmts = parse_ast("STO 0 5\nLDA 0\nOUT\nHLT").unwrap();
        assert_eq!(stmts, [
            Stmt { opcode: Opcode::STO, operands: vec![op(0, 4..5), op(5, 6..7)], span: 0..3 },
            Stmt { opcode: Opcode::LDA, operands: vec![op(0, 12..13)], span: 8..11 },
            Stmt::new(Opcode::OUT, 14..17),
            Stmt::new(Opcode::HLT, 18..21),
        ]);
    }

    #[test]
    fn test_operands_cross_lines() {
        let split = parse_ast("STO 0\n5\n").unwrap();
        let joined = parse_ast("STO 0 5").unwrap();
        assert_eq!(split.len(), 1);
        assert_eq!(
            split[0].operands.iter().map(|o| o.value).collect::<Vec<_>>(),
            joined[0].operands.iter().map(|o| o.value).collect::<Vec<_>>(),
        );
    }

    #[test]
    fn test_empty_and_comments() {
        assert_eq!(parse_ast(""), Ok(vec![]));
        assert_eq!(parse_ast("   \n\n  "), Ok(vec![]));
        assert_eq!(parse_ast("// nothing here\n// or here"), Ok(vec![]));

        let stmts = parse_ast("// header\nLDA 1 // load\n// trailer").unwrap();
        assert_eq!(stmts, [Stmt { opcode: Opcode::LDA, operands: vec![op(1, 14..15)], span: 10..13 }]);
    }

    #[test]
    fn test_no_operand_validation() {
        // arity and range are left to the assembler
        let stmts = parse_ast("HLT 1 2 3 99 -4").unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].operands.len(), 5);
    }

    #[test]
    fn test_orphan_parameter() {
        assert_eq!(
            parse_ast("  5 LDA 0"),
            Err(ParseErr::new(ParseErrKind::OrphanParameter, 2..3))
        );
    }

    #[test]
    fn test_lex_error() {
        let err = parse_ast("LDA 0\nFOO 1").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::Lex(LexErr::UnrecognizedKeyword));
        assert_eq!(err.span, ErrSpan::from(6..9));
    }

    #[test]
    fn test_stream_order() {
        // Statements come out before a later error is reached.
        let mut parser = StmtParser::new("LDA 99 STO 1 2 ???");
        assert_eq!(parser.next().map(|r| r.map(|s| s.opcode)), Some(Ok(Opcode::LDA)));

        // the lex error discards the open STO
        let err = parser.next().unwrap().unwrap_err();
        assert_eq!(err.kind, ParseErrKind::Lex(LexErr::UnrecognizedKeyword));
        assert_eq!(parser.next(), None);
    }
}
