//! Error interface for this crate.
//!
//! This module re-exports every error type in the crate,
//! and defines [`Error`], the interface they all share.
//! Errors that point into source code can be rendered against that source with [`Report`].

use std::borrow::Cow;
use std::ops::Range;

use crate::asm::SourceInfo;

pub use crate::parse::lex::LexErr;
pub use crate::parse::{ParseErr, ParseErrKind};
pub use crate::asm::{AsmErr, AsmErrKind};
pub use crate::sim::SimErr;

/// Unified error interface for all errors in this crate.
///
/// Note that the [`Display`] implementation is used for a brief message,
/// where as [`Error::help`] is used for any clarifying messages.
///
/// [`Display`]: std::fmt::Display
pub trait Error: std::error::Error {
    /// The range where this error occurs in source.
    ///
    /// If this is not known, this can be set to `None`.
    fn span(&self) -> Option<ErrSpan> {
        None
    }

    /// A clarifying message to help aid someone in how to fix the message.
    ///
    /// If there is none to add, this can be set to `None`.
    fn help(&self) -> Option<Cow<str>>;
}

/// The location in source where an error occurred.
///
/// A span may be empty (e.g. `5..5`),
/// in which case it points to the position between two characters.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ErrSpan(Range<usize>);
impl ErrSpan {
    /// The character index where this span begins.
    pub fn start(&self) -> usize {
        self.0.start
    }

    /// The character index where this span ends.
    pub fn end(&self) -> usize {
        self.0.end
    }

    /// The range of this span.
    pub fn range(&self) -> Range<usize> {
        self.0.clone()
    }
}
impl From<Range<usize>> for ErrSpan {
    fn from(value: Range<usize>) -> Self {
        ErrSpan(value)
    }
}
impl From<ErrSpan> for Range<usize> {
    fn from(value: ErrSpan) -> Self {
        value.0
    }
}

/// Any error produced by parsing and assembling source together
/// (see [`crate::asm::assemble_src`]).
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ThoErr {
    /// The source could not be parsed.
    Parse(ParseErr),
    /// A statement could not be assembled.
    Asm(AsmErr),
}
impl std::fmt::Display for ThoErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThoErr::Parse(e) => e.fmt(f),
            ThoErr::Asm(e) => e.fmt(f),
        }
    }
}
impl std::error::Error for ThoErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ThoErr::Parse(e) => Some(e),
            ThoErr::Asm(e) => Some(e),
        }
    }
}
impl Error for ThoErr {
    fn span(&self) -> Option<ErrSpan> {
        match self {
            ThoErr::Parse(e) => e.span(),
            ThoErr::Asm(e) => e.span(),
        }
    }

    fn help(&self) -> Option<Cow<str>> {
        match self {
            ThoErr::Parse(e) => e.help(),
            ThoErr::Asm(e) => e.help(),
        }
    }
}
impl From<ParseErr> for ThoErr {
    fn from(value: ParseErr) -> Self {
        ThoErr::Parse(value)
    }
}
impl From<AsmErr> for ThoErr {
    fn from(value: AsmErr) -> Self {
        ThoErr::Asm(value)
    }
}

/// A diagnostic rendering of an error against the source it came from.
///
/// For errors with a span, this prints the code on the offending line,
/// a caret under the offending position, and the message
/// with a 1-based line number and a 0-based column within the printed code.
///
/// Line numbers count from 1, as editors do. The first Tho assembler counted
/// lines from 0, so its messages name the line before the one reported here.
///
/// # Example
/// ```
/// use tho::asm::{assemble_src, SourceInfo};
/// use tho::err::Report;
///
/// let src = "STO 0 5\n  LDA 16 // oops";
/// let err = assemble_src(src).unwrap_err();
/// let report = Report::new(&err, &SourceInfo::new(src)).to_string();
///
/// assert_eq!(report, [
///     "LDA 16",
///     "    ^",
///     "Error: parameter out of range (line 2, cursor 4)",
///     "help: parameters must be between 0 and 15 (0x0-0xF, b0-b1111)",
/// ].join("\n"));
/// ```
pub struct Report<'a, E: ?Sized> {
    err: &'a E,
    src: &'a SourceInfo,
}
impl<'a, E: Error + ?Sized> Report<'a, E> {
    /// Creates a report for the given error and source.
    pub fn new(err: &'a E, src: &'a SourceInfo) -> Self {
        Report { err, src }
    }
}
impl<E: Error + ?Sized> std::fmt::Display for Report<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.err.span() {
            Some(span) => {
                let (lno, _) = self.src.get_pos_pair(span.start());
                let code = self.src.code_span(lno).unwrap_or(0..0);
                let text = &self.src.source()[code.clone()];
                let col = span.start().saturating_sub(code.start).min(text.len());

                writeln!(f, "{text}")?;
                writeln!(f, "{:col$}^", "")?;
                write!(f, "Error: {} (line {}, cursor {col})", self.err, lno + 1)?;
            },
            None => write!(f, "Error: {}", self.err)?,
        }

        if let Some(help) = self.err.help() {
            write!(f, "\nhelp: {help}")?;
        }
        Ok(())
    }
}
