//! Components relating to the abstract syntax trees (ASTs)
//! used in representing Tho instructions.
//!
//! These components together are used to construct...
//! - [`asm::Stmt`] (a data structure holding an assembly source code instruction),
//! - and [`sim::SimInstr`] (a data structure holding a bytecode instruction).
//!
//! This module also holds the instruction table ([`INSTR_TABLE`]),
//! which is the single source of truth for every mnemonic's opcode and operand list.

pub mod asm;
pub mod sim;

use std::fmt::Write as _;

/// A 4-bit value. Must be between 0 and 15.
///
/// Every data path in the Tho CPU is one nibble wide:
/// the accumulator, every memory cell, and every instruction operand.
///
/// ## Examples
///
/// ```text
/// STO 0 5
///     ~ ~
/// LDA 0
///     ~
/// JIZ 4
///     ~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Default)]
pub struct Nibble(u8);

impl Nibble {
    /// The smallest nibble.
    pub const MIN: Nibble = Nibble(0);
    /// The largest nibble.
    pub const MAX: Nibble = Nibble(0xF);

    /// Creates a new nibble, returning `None` if the value does not fit in 4 bits.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tho::ast::Nibble;
    /// #
    /// assert!(Nibble::new(0).is_some());
    /// assert!(Nibble::new(15).is_some());
    /// assert!(Nibble::new(16).is_none());
    /// assert!(Nibble::new(-1).is_none());
    /// ```
    pub fn new(value: i64) -> Option<Self> {
        match fits_nibble(value) {
            true  => Some(Nibble(value as u8)),
            false => None,
        }
    }

    /// Creates a new nibble by keeping the lowest 4 bits of the integer
    /// and discarding the rest.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tho::ast::Nibble;
    /// #
    /// assert_eq!(Nibble::new_trunc(0x0F).get(), 15);
    /// assert_eq!(Nibble::new_trunc(0x10).get(), 0);
    /// assert_eq!(Nibble::new_trunc(0xFE).get(), 14);
    /// ```
    pub const fn new_trunc(value: u8) -> Self {
        Nibble(value & 0xF)
    }

    /// Gets the value of this nibble. This is always between 0 and 15.
    pub const fn get(self) -> u8 {
        self.0
    }
}
impl std::fmt::Display for Nibble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
impl std::fmt::Binary for Nibble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char('b')?;
        write!(f, "{:04b}", self.0)
    }
}
impl std::fmt::LowerHex for Nibble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("0x")?;
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}
impl std::fmt::UpperHex for Nibble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("0x")?;
        std::fmt::UpperHex::fmt(&self.0, f)
    }
}
impl From<Nibble> for u8 {
    fn from(value: Nibble) -> Self {
        value.0
    }
}
impl From<Nibble> for u16 {
    fn from(value: Nibble) -> Self {
        u16::from(value.0)
    }
}
impl From<Nibble> for usize {
    // Used for indexing memory in [`crate::sim::MachineState`].
    fn from(value: Nibble) -> Self {
        usize::from(value.0)
    }
}

/// Checks whether a literal value is a valid 4-bit operand (`0..=15`).
pub fn fits_nibble(value: i64) -> bool {
    (0..16).contains(&value)
}

/// A function deciding whether a literal is acceptable for an operand slot.
pub type Validator = fn(i64) -> bool;

/// What an operand slot of an instruction refers to.
///
/// All operand kinds currently share the same 4-bit range check,
/// but they are displayed differently in traces (addresses are shown in hex).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum OperandKind {
    /// A memory address (`0x0` to `0xF`).
    Addr,
    /// An immediate value written into memory.
    Imm,
    /// An instruction index to jump to.
    Target,
}
impl OperandKind {
    /// The validator for literals placed in this slot.
    pub fn validator(self) -> Validator {
        match self {
            OperandKind::Addr   => fits_nibble,
            OperandKind::Imm    => fits_nibble,
            OperandKind::Target => fits_nibble,
        }
    }
}

/// A row of the instruction table.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct InstrSpec {
    /// The instruction's mnemonic, in its canonical uppercase form.
    pub mnemonic: &'static str,
    /// The opcode assembled into the top nibble of the instruction word.
    pub opcode: Opcode,
    /// The operand slots, in order.
    pub operands: &'static [OperandKind],
}
impl InstrSpec {
    /// Looks up a mnemonic in the instruction table. This is case-insensitive.
    ///
    /// ```
    /// # use tho::ast::{InstrSpec, Opcode};
    /// #
    /// assert_eq!(InstrSpec::lookup("sto").map(|s| s.opcode), Some(Opcode::STO));
    /// assert_eq!(InstrSpec::lookup("Jnz").map(|s| s.arity()), Some(1));
    /// assert_eq!(InstrSpec::lookup("SET"), None);
    /// ```
    pub fn lookup(mnemonic: &str) -> Option<&'static InstrSpec> {
        mnemonic.parse::<Opcode>().ok().map(Opcode::spec)
    }

    /// The number of operands this instruction takes.
    pub fn arity(&self) -> usize {
        self.operands.len()
    }

    /// The validators for each operand slot, in order.
    pub fn validators(&self) -> impl Iterator<Item = Validator> + '_ {
        self.operands.iter().map(|kind| kind.validator())
    }
}

macro_rules! instr_table {
    ($($(#[$attr:meta])* $instr:ident = $value:literal [$($operand:ident),*]),+ $(,)?) => {
        /// The opcode of a Tho instruction.
        ///
        /// The discriminant of each variant is the value
        /// stored in the top 4 bits of an instruction word.
        #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Opcode {
            $($(#[$attr])* $instr = $value),+
        }

        /// The instruction table.
        ///
        /// Each row lists a mnemonic, its opcode, and its operand slots.
        /// The table is ordered by opcode, so `INSTR_TABLE[op as usize].opcode == op`.
        pub static INSTR_TABLE: &[InstrSpec] = &[
            $(
                InstrSpec {
                    mnemonic: stringify!($instr),
                    opcode: Opcode::$instr,
                    operands: &[$(OperandKind::$operand),*],
                }
            ),+
        ];

        impl TryFrom<u8> for Opcode {
            /// The offending value, if it does not name an opcode.
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Opcode::$instr),)+
                    v => Err(v),
                }
            }
        }

        impl std::str::FromStr for Opcode {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match &*s.to_uppercase() {
                    $(stringify!($instr) => Ok(Opcode::$instr),)+
                    _ => Err(()),
                }
            }
        }

        impl std::fmt::Display for Opcode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Opcode::$instr => f.pad(stringify!($instr))),+
                }
            }
        }
    }
}

instr_table! {
    /// No operation.
    NOP = 0 [],
    /// Load `mem[a]` into the accumulator.
    LDA = 1 [Addr],
    /// Store the accumulator into `mem[a]`.
    STA = 2 [Addr],
    /// Store the immediate `v` into `mem[a]`.
    STO = 3 [Addr, Imm],
    /// Add `mem[a]` to the accumulator.
    ADD = 4 [Addr],
    /// Subtract `mem[a]` from the accumulator.
    SUB = 5 [Addr],
    /// Jump to instruction `t`.
    JMP = 6 [Target],
    /// Jump to instruction `t` if the carry flag is set.
    JIC = 7 [Target],
    /// Jump to instruction `t` if the carry flag is clear.
    JNC = 8 [Target],
    /// Jump to instruction `t` if the zero flag is set.
    JIZ = 9 [Target],
    /// Jump to instruction `t` if the zero flag is clear.
    JNZ = 10 [Target],
    /// Emit the accumulator to the output device.
    OUT = 11 [],
    /// Stop execution.
    HLT = 12 [],
}

impl Opcode {
    /// The instruction table row for this opcode.
    pub fn spec(self) -> &'static InstrSpec {
        &INSTR_TABLE[usize::from(self as u8)]
    }

    /// The number of operands this opcode takes.
    pub fn arity(self) -> usize {
        self.spec().arity()
    }

    /// Whether executing this opcode recomputes the zero and carry flags.
    pub fn sets_flags(self) -> bool {
        matches!(self, Opcode::LDA | Opcode::ADD | Opcode::SUB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order() {
        assert_eq!(INSTR_TABLE.len(), 13);
        for (i, spec) in INSTR_TABLE.iter().enumerate() {
            assert_eq!(usize::from(spec.opcode as u8), i, "{} is out of order", spec.mnemonic);
            assert_eq!(spec.mnemonic, spec.opcode.to_string());
        }
    }

    #[test]
    fn test_arity() {
        let expected = [
            ("NOP", 0), ("LDA", 1), ("STA", 1), ("STO", 2),
            ("ADD", 1), ("SUB", 1), ("JMP", 1), ("JIC", 1),
            ("JNC", 1), ("JIZ", 1), ("JNZ", 1), ("OUT", 0),
            ("HLT", 0),
        ];

        for (mnemonic, arity) in expected {
            let spec = InstrSpec::lookup(mnemonic).unwrap();
            assert_eq!(spec.arity(), arity, "arity of {mnemonic}");
            assert_eq!(spec.validators().count(), arity);
        }
    }

    #[test]
    fn test_lookup_case_insensitive() {
        for spelling in ["lda", "LDA", "Lda", "lDa"] {
            assert_eq!(InstrSpec::lookup(spelling).map(|s| s.opcode), Some(Opcode::LDA));
        }
        assert_eq!(InstrSpec::lookup("SET"), None);
        assert_eq!(InstrSpec::lookup("LDA5"), None);
        assert_eq!(InstrSpec::lookup(""), None);
    }

    #[test]
    fn test_opcode_from_u8() {
        for v in 0..=12 {
            let op = Opcode::try_from(v).unwrap();
            assert_eq!(op as u8, v);
        }
        for v in 13..=15 {
            assert_eq!(Opcode::try_from(v), Err(v));
        }
    }

    #[test]
    fn test_sets_flags() {
        let flagged: Vec<_> = INSTR_TABLE.iter()
            .map(|spec| spec.opcode)
            .filter(|op| op.sets_flags())
            .collect();

        assert_eq!(flagged, [Opcode::LDA, Opcode::ADD, Opcode::SUB]);
    }

    #[test]
    fn test_validators() {
        for spec in INSTR_TABLE {
            for validator in spec.validators() {
                assert!(validator(0));
                assert!(validator(15));
                assert!(!validator(16));
                assert!(!validator(-1));
                assert!(!validator(i64::MAX));
                assert!(!validator(i64::MIN));
            }
        }
    }

    #[test]
    fn test_nibble_fmt() {
        let n = Nibble::new(10).unwrap();
        assert_eq!(n.to_string(), "10");
        assert_eq!(format!("{n:b}"), "b1010");
        assert_eq!(format!("{n:x}"), "0xa");
        assert_eq!(format!("{n:X}"), "0xA");
    }
}
