//! This module holds the assembly source statement produced by the parser.
//!
//! A [`Stmt`] is an opcode with the literals that followed it in source.
//! Its operands are not checked yet: they may be too many, too few, or out of range.
//! The assembler validates them against the instruction table
//! (see [`crate::asm::assemble`]).

use std::ops::Range;

use super::Opcode;

/// A literal operand, along with where it appeared in source.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Operand {
    /// The literal's value, as written. This may not fit in 4 bits.
    pub value: i64,
    /// The span of the literal in source.
    pub span: Range<usize>,
}

/// An instruction as written in source.
///
/// Operands belong to the most recent mnemonic, no matter what line they are on:
/// ```text
/// STO 0
///     5
/// ```
/// is the same statement as `STO 0 5`.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Stmt {
    /// The opcode named by the mnemonic.
    pub opcode: Opcode,
    /// The literals following the mnemonic, in order.
    pub operands: Vec<Operand>,
    /// The span of the mnemonic in source.
    pub span: Range<usize>,
}
impl Stmt {
    /// Creates a statement with no operands.
    pub fn new(opcode: Opcode, span: Range<usize>) -> Self {
        Stmt { opcode, operands: vec![], span }
    }

    /// The span of the last token in this statement
    /// (the last operand, or the mnemonic if there are none).
    pub fn last_span(&self) -> Range<usize> {
        match self.operands.last() {
            Some(operand) => operand.span.clone(),
            None => self.span.clone(),
        }
    }
}
impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.opcode)?;
        for operand in &self.operands {
            write!(f, " {}", operand.value)?;
        }
        Ok(())
    }
}
