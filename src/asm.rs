//! Assembling Tho statements into object files.
//!
//! This module is used to convert source statements (`Vec<`[`Stmt`]`>`) into object files
//! that can be executed by the simulator.
//!
//! The assembler module notably consists of:
//! - [`assemble`], [`assemble_debug`], and [`assemble_src`]: The main functions which assemble statements into an object file.
//! - [`assemble_stmt`]: validates a single statement against the instruction table
//! - [`DebugSymbols`]: a struct mapping instructions back to their source lines
//! - [`ObjectFile`]: a struct holding the object file, which can be loaded into the simulator and executed
//!
//! Assembly is a single streaming pass. Each statement is checked
//! (operand count, then operand range) and packed into a word before the next one is looked at,
//! so the first error in source order is the one reported.
//!
//! [`Stmt`]: crate::ast::asm::Stmt

pub mod encoding;

use std::ops::Range;

use tracing::debug;

use crate::ast::asm::Stmt;
use crate::ast::sim::SimInstr;
use crate::ast::{Nibble, Opcode};
use crate::err::{ErrSpan, ThoErr};
use crate::parse::StmtParser;

/// Assembles a list of statements into an object file.
///
/// This function assembles the statements *without* including debug symbols
/// in the object file.
/// See [`DebugSymbols`] for more details about debug symbols.
///
/// # Example
/// ```
/// use tho::parse::parse_ast;
/// use tho::asm::assemble;
///
/// let src = "STO 0 5\nLDA 0\nOUT\nHLT";
/// let ast = parse_ast(src).unwrap();
///
/// let obj_file = assemble(ast);
/// assert!(obj_file.is_ok());
///
/// // Debug symbols don't exist in object file:
/// let obj_file = obj_file.unwrap();
/// assert_eq!(obj_file.words(), [0x3050, 0x1000, 0xB000, 0xC000]);
/// assert!(obj_file.debug_symbols().is_none());
/// ```
pub fn assemble(ast: Vec<Stmt>) -> Result<ObjectFile, AsmErr> {
    assemble_iter(ast.into_iter().map(Ok::<_, AsmErr>), None)
}
/// Assembles a list of statements into an object file.
///
/// This function assembles the statements *and* includes debug symbols
/// in the object file.
/// See [`DebugSymbols`] for more details about debug symbols.
///
/// # Example
/// ```
/// use tho::parse::parse_ast;
/// use tho::asm::assemble_debug;
///
/// let src = "STO 0 5\nLDA 0\nOUT\nHLT";
/// let ast = parse_ast(src).unwrap();
///
/// let obj_file = assemble_debug(ast, src);
/// assert!(obj_file.is_ok());
///
/// // Debug symbols do exist in object file:
/// let obj_file = obj_file.unwrap();
/// assert!(obj_file.debug_symbols().is_some());
/// assert_eq!(obj_file.rev_lookup_line(3), Some(3));
/// ```
pub fn assemble_debug(ast: Vec<Stmt>, src: &str) -> Result<ObjectFile, AsmErr> {
    assemble_iter(ast.into_iter().map(Ok::<_, AsmErr>), Some(src))
}
/// Parses and assembles source code into an object file (with debug symbols).
///
/// Parsing and assembling are interleaved,
/// so if one statement is invalid and a later token cannot be lexed,
/// the invalid statement is the one reported.
///
/// # Example
/// ```
/// use tho::asm::assemble_src;
///
/// let obj_file = assemble_src("STO 0\n5 // split\nHLT").unwrap();
/// assert_eq!(obj_file.words(), [0x3050, 0xC000]);
///
/// assert!(assemble_src("LDA 16").is_err());
/// ```
pub fn assemble_src(src: &str) -> Result<ObjectFile, ThoErr> {
    assemble_iter(StmtParser::new(src), Some(src))
}

fn assemble_iter<P, E>(
    stmts: impl IntoIterator<Item = Result<Stmt, P>>,
    src: Option<&str>,
) -> Result<ObjectFile, E>
    where E: From<P> + From<AsmErr>
{
    let src_info = src.map(SourceInfo::new);
    let mut words = vec![];
    let mut lines = vec![];

    for m_stmt in stmts {
        let stmt = m_stmt?;
        let instr = assemble_stmt(&stmt)?;
        let word = instr.encode();
        debug!(index = words.len(), word = %format_args!("{word:04X}"), %instr, "assembled instruction");

        if let Some(info) = &src_info {
            lines.push(info.get_line(stmt.span.start));
        }
        words.push(word);
    }

    let debug_symbols = src_info.map(|src_info| DebugSymbols { lines, src_info });
    Ok(ObjectFile { words, debug_symbols })
}

/// Validates a statement against the instruction table and converts it into an instruction.
///
/// The operand count is checked first, then each operand is checked against its slot's validator.
///
/// # Example
/// ```
/// use tho::asm::{assemble_stmt, AsmErrKind};
/// use tho::ast::Opcode;
/// use tho::parse::parse_ast;
///
/// let stmts = parse_ast("STO 0 5 STO 0 STO 0 16").unwrap();
/// assert_eq!(assemble_stmt(&stmts[0]).map(|i| i.encode()), Ok(0x3050));
/// assert_eq!(
///     assemble_stmt(&stmts[1]).unwrap_err().kind,
///     AsmErrKind::TooFewParameters { opcode: Opcode::STO, required: 2, found: 1 }
/// );
/// assert_eq!(assemble_stmt(&stmts[2]).unwrap_err().kind, AsmErrKind::OutOfRange(16));
/// ```
pub fn assemble_stmt(stmt: &Stmt) -> Result<SimInstr, AsmErr> {
    let spec = stmt.opcode.spec();
    let required = spec.arity();
    let found = stmt.operands.len();
    let last = stmt.last_span();

    if found < required {
        // point just past the last token, where the missing parameter would go
        let kind = AsmErrKind::TooFewParameters { opcode: stmt.opcode, required, found };
        return Err(AsmErr::new(kind, last.end..last.end));
    }
    if found > required {
        let kind = AsmErrKind::TooManyParameters { opcode: stmt.opcode, required, found };
        return Err(AsmErr::new(kind, last));
    }

    let mut slots = [Nibble::MIN; 3];
    for ((slot, operand), validator) in slots.iter_mut().zip(&stmt.operands).zip(spec.validators()) {
        *slot = Some(operand.value)
            .filter(|&v| validator(v))
            .and_then(Nibble::new)
            .ok_or_else(|| AsmErr::new(AsmErrKind::OutOfRange(operand.value), operand.span.clone()))?;
    }

    Ok(SimInstr::from_parts(stmt.opcode, slots))
}

/// Kinds of errors that can occur from assembling given assembly code.
///
/// See [`AsmErr`] for this error type with span information included.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsmErrKind {
    /// An instruction has fewer parameters than it takes.
    TooFewParameters {
        /// The instruction.
        opcode: Opcode,
        /// How many parameters it takes.
        required: usize,
        /// How many parameters were given.
        found: usize,
    },
    /// An instruction has more parameters than it takes.
    TooManyParameters {
        /// The instruction.
        opcode: Opcode,
        /// How many parameters it takes.
        required: usize,
        /// How many parameters were given.
        found: usize,
    },
    /// A parameter is not valid for its slot.
    OutOfRange(i64),
}
impl std::fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewParameters { opcode, required, found } => {
                write!(f, "not enough parameters for {opcode} (expected {required}, found {found})")
            },
            Self::TooManyParameters { opcode, required, found } => {
                write!(f, "too many parameters for {opcode} (expected {required}, found {found})")
            },
            Self::OutOfRange(_) => f.write_str("parameter out of range"),
        }
    }
}

/// Error from assembling given assembly code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The value with a span.
    pub kind: AsmErrKind,
    /// The span in the source associated with this value.
    pub span: ErrSpan
}
impl AsmErr {
    /// Creates a new [`AsmErr`].
    pub fn new<E: Into<ErrSpan>>(kind: AsmErrKind, span: E) -> Self {
        AsmErr { kind, span: span.into() }
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for AsmErr {}
impl crate::err::Error for AsmErr {
    fn span(&self) -> Option<crate::err::ErrSpan> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match &self.kind {
            AsmErrKind::TooFewParameters { opcode, .. } | AsmErrKind::TooManyParameters { opcode, .. } => {
                let usage = opcode.spec().operands.iter()
                    .map(|kind| match kind {
                        crate::ast::OperandKind::Addr   => " <addr>",
                        crate::ast::OperandKind::Imm    => " <value>",
                        crate::ast::OperandKind::Target => " <instr>",
                    })
                    .collect::<String>();
                Some(format!("usage: {opcode}{usage}").into())
            },
            AsmErrKind::OutOfRange(_) => Some("parameters must be between 0 and 15 (0x0-0xF, b0-b1111)".into()),
        }
    }
}

/// Struct holding the source string and contains helpers
/// to index lines and to query position information from a source string.
#[derive(PartialEq, Eq, Clone)]
pub struct SourceInfo {
    /// The source code.
    src: String,
    /// The index of each new line in source code (plus the end of the source).
    nl_indices: Vec<usize>
}
impl std::fmt::Debug for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceInfo")
            .field("nl_indices", &self.nl_indices)
            .finish_non_exhaustive()
    }
}
impl SourceInfo {
    /// Computes the source info from a given string.
    pub fn new(src: &str) -> Self {
        Self::from_string(src.to_string())
    }
    fn from_string(src: String) -> Self {
        let nl_indices: Vec<_> = src
            .match_indices('\n')
            .map(|(i, _)| i)
            .chain([src.len()])
            .collect();

        Self { src, nl_indices }
    }

    /// Returns the entire source.
    pub fn source(&self) -> &str {
        &self.src
    }

    /// Counts the number of lines in the source string.
    pub fn count_lines(&self) -> usize {
        self.nl_indices.len()
    }

    /// Gets the character range for the provided line, excluding the newline character.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    fn raw_line_span(&self, line: usize) -> Option<Range<usize>> {
        let end = *self.nl_indices.get(line)?;
        let start = match line {
            0 => 0,
            _ => self.nl_indices[line - 1] + 1
        };

        Some(start..end)
    }

    /// Gets the character range for the provided line, excluding any whitespace.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    pub fn line_span(&self, line: usize) -> Option<Range<usize>> {
        let raw = self.raw_line_span(line)?;
        Some(trim_span(&self.src, raw))
    }

    /// Gets the character range for the code on the provided line,
    /// excluding any comment and any surrounding whitespace.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    pub fn code_span(&self, line: usize) -> Option<Range<usize>> {
        let Range { start, end } = self.raw_line_span(line)?;
        let end = match self.src[start..end].find("//") {
            Some(i) => start + i,
            None => end,
        };

        Some(trim_span(&self.src, start..end))
    }

    /// Reads a line from source.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    pub fn read_line(&self, line: usize) -> Option<&str> {
        self.line_span(line).map(|r| &self.src[r])
    }

    /// Gets the line number of the current position.
    pub fn get_line(&self, index: usize) -> usize {
        self.nl_indices.partition_point(|&nl| nl < index)
            .min(self.nl_indices.len().saturating_sub(1))
    }

    /// Calculates the line and character number for a given character index.
    ///
    /// If the index exceeds the length of the string,
    /// the line number is given as the last line and the character number
    /// is given as the number of characters after the start of the line.
    pub fn get_pos_pair(&self, index: usize) -> (usize, usize) {
        let lno = self.get_line(index);
        let lstart = self.raw_line_span(lno).map_or(0, |r| r.start);

        (lno, index.saturating_sub(lstart))
    }
}
impl From<&'_ str> for SourceInfo {
    fn from(value: &'_ str) -> Self {
        Self::new(value)
    }
}
impl From<String> for SourceInfo {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

fn trim_span(src: &str, Range { mut start, mut end }: Range<usize>) -> Range<usize> {
    let line = &src[start..end];
    let end_trimmed = line.trim_end();
    end -= line.len() - end_trimmed.len();

    let line = end_trimmed;
    start += line.len() - line.trim_start().len();

    start..end
}

/// Debug symbols: for each assembled instruction, the source line its mnemonic is on.
///
/// This is only present in object files assembled with source
/// (through [`assemble_debug`] or [`assemble_src`]).
/// Lines are 0-indexed.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct DebugSymbols {
    lines: Vec<usize>,
    src_info: SourceInfo,
}
impl DebugSymbols {
    /// Gets the index of the first instruction whose mnemonic is on the given line.
    pub fn lookup_line(&self, line: usize) -> Option<usize> {
        self.lines.iter().position(|&l| l == line)
    }

    /// Gets the source line of the instruction at the given index.
    pub fn rev_lookup_line(&self, index: usize) -> Option<usize> {
        self.lines.get(index).copied()
    }

    /// Gets the source info this object file was assembled from.
    pub fn source_info(&self) -> &SourceInfo {
        &self.src_info
    }

    /// Gets the source span of the code on the line of the instruction at the given index.
    pub fn line_span(&self, index: usize) -> Option<Range<usize>> {
        self.src_info.code_span(self.rev_lookup_line(index)?)
    }
}

/// An object file.
///
/// This is the final product after assembly source code is fully assembled:
/// an ordered list of 16-bit instruction words.
/// Instruction `i` in the program is word `i` (a jump target is an index into this list).
/// This can be loaded in the simulator to run the assembled code.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ObjectFile {
    words: Vec<u16>,
    debug_symbols: Option<DebugSymbols>,
}
impl ObjectFile {
    /// Creates an empty object file.
    pub fn empty() -> Self {
        ObjectFile { words: vec![], debug_symbols: None }
    }

    /// Creates an object file (without debug symbols) from raw instruction words.
    pub fn from_words(words: Vec<u16>) -> Self {
        ObjectFile { words, debug_symbols: None }
    }

    /// The instruction words of this object file.
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// The number of instructions in this object file.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether this object file holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Decodes each word of the object file.
    ///
    /// Words with an unknown opcode produce `Err` with that opcode.
    pub fn instr_iter(&self) -> impl Iterator<Item = (usize, Result<SimInstr, u8>)> + '_ {
        self.words.iter()
            .map(|&w| SimInstr::decode(w))
            .enumerate()
    }

    /// Gets the debug symbols (if they exist).
    pub fn debug_symbols(&self) -> Option<&DebugSymbols> {
        self.debug_symbols.as_ref()
    }

    /// Gets the source info (if debug symbols exist).
    pub fn source_info(&self) -> Option<&SourceInfo> {
        self.debug_symbols().map(DebugSymbols::source_info)
    }

    /// Gets the index of the first instruction on the given source line (if debug symbols exist).
    pub fn lookup_line(&self, line: usize) -> Option<usize> {
        self.debug_symbols()?.lookup_line(line)
    }

    /// Gets the source line of the instruction at the given index (if debug symbols exist).
    pub fn rev_lookup_line(&self, index: usize) -> Option<usize> {
        self.debug_symbols()?.rev_lookup_line(index)
    }
}
