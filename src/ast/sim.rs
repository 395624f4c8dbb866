//! This module is used for holding simulation instructions ([`SimInstr`]),
//! which are instructions that directly map to bytecode.
//!
//! An instruction word is 16 bits wide and is made of four nibbles:
//! ```text
//! 0011 0000 0101 0000
//! ~~~~ ~~~~ ~~~~ ~~~~
//!  op   a    b    c
//! ```
//! Operands fill slots `a`, `b`, `c` in order. Unused slots are zero.

use super::{Nibble, Opcode};

/// A decoded instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimInstr {
    #[allow(missing_docs)]
    NOP,
    #[allow(missing_docs)]
    LDA(Nibble),
    #[allow(missing_docs)]
    STA(Nibble),
    #[allow(missing_docs)]
    STO(Nibble, Nibble),
    #[allow(missing_docs)]
    ADD(Nibble),
    #[allow(missing_docs)]
    SUB(Nibble),
    #[allow(missing_docs)]
    JMP(Nibble),
    #[allow(missing_docs)]
    JIC(Nibble),
    #[allow(missing_docs)]
    JNC(Nibble),
    #[allow(missing_docs)]
    JIZ(Nibble),
    #[allow(missing_docs)]
    JNZ(Nibble),
    #[allow(missing_docs)]
    OUT,
    #[allow(missing_docs)]
    HLT,
}

/// Splits an instruction word into its opcode nibble and its three operand slots.
///
/// ```
/// # use tho::ast::sim::split_word;
/// #
/// let (op, [a, b, c]) = split_word(0x3050);
/// assert_eq!(op, 3);
/// assert_eq!([a.get(), b.get(), c.get()], [0, 5, 0]);
/// ```
pub fn split_word(word: u16) -> (u8, [Nibble; 3]) {
    let nib = |shift: u16| Nibble::new_trunc((word >> shift) as u8);
    ((word >> 12) as u8, [nib(8), nib(4), nib(0)])
}

impl SimInstr {
    /// Builds an instruction from an opcode and its operand slots.
    ///
    /// Slots beyond the opcode's arity are ignored.
    pub fn from_parts(opcode: Opcode, [a, b, _]: [Nibble; 3]) -> Self {
        match opcode {
            Opcode::NOP => SimInstr::NOP,
            Opcode::LDA => SimInstr::LDA(a),
            Opcode::STA => SimInstr::STA(a),
            Opcode::STO => SimInstr::STO(a, b),
            Opcode::ADD => SimInstr::ADD(a),
            Opcode::SUB => SimInstr::SUB(a),
            Opcode::JMP => SimInstr::JMP(a),
            Opcode::JIC => SimInstr::JIC(a),
            Opcode::JNC => SimInstr::JNC(a),
            Opcode::JIZ => SimInstr::JIZ(a),
            Opcode::JNZ => SimInstr::JNZ(a),
            Opcode::OUT => SimInstr::OUT,
            Opcode::HLT => SimInstr::HLT,
        }
    }

    /// Gets the opcode for the given instruction.
    pub fn opcode(&self) -> Opcode {
        match self {
            SimInstr::NOP       => Opcode::NOP,
            SimInstr::LDA(_)    => Opcode::LDA,
            SimInstr::STA(_)    => Opcode::STA,
            SimInstr::STO(_, _) => Opcode::STO,
            SimInstr::ADD(_)    => Opcode::ADD,
            SimInstr::SUB(_)    => Opcode::SUB,
            SimInstr::JMP(_)    => Opcode::JMP,
            SimInstr::JIC(_)    => Opcode::JIC,
            SimInstr::JNC(_)    => Opcode::JNC,
            SimInstr::JIZ(_)    => Opcode::JIZ,
            SimInstr::JNZ(_)    => Opcode::JNZ,
            SimInstr::OUT       => Opcode::OUT,
            SimInstr::HLT       => Opcode::HLT,
        }
    }

    /// The operand slots of this instruction (unused slots are zero).
    pub fn operands(&self) -> [Nibble; 3] {
        let z = Nibble::MIN;
        match *self {
            SimInstr::NOP | SimInstr::OUT | SimInstr::HLT => [z, z, z],
            SimInstr::STO(a, b) => [a, b, z],
            | SimInstr::LDA(a)
            | SimInstr::STA(a)
            | SimInstr::ADD(a)
            | SimInstr::SUB(a)
            | SimInstr::JMP(a)
            | SimInstr::JIC(a)
            | SimInstr::JNC(a)
            | SimInstr::JIZ(a)
            | SimInstr::JNZ(a) => [a, z, z],
        }
    }

    /// Encodes this instruction as a 16-bit word.
    ///
    /// ```
    /// # use tho::ast::{Nibble, sim::SimInstr};
    /// #
    /// let five = Nibble::new(5).unwrap();
    /// assert_eq!(SimInstr::STO(Nibble::MIN, five).encode(), 0x3050);
    /// assert_eq!(SimInstr::HLT.encode(), 0xC000);
    /// ```
    pub fn encode(&self) -> u16 {
        let [a, b, c] = self.operands().map(u16::from);
        (u16::from(self.opcode() as u8) << 12) | (a << 8) | (b << 4) | c
    }

    /// Converts a 16-bit word into an instruction.
    ///
    /// Slots not used by the opcode are ignored.
    /// If the top nibble does not name an opcode, that nibble is returned as the error.
    pub fn decode(word: u16) -> Result<Self, u8> {
        let (op, slots) = split_word(word);
        let opcode = Opcode::try_from(op)?;
        Ok(SimInstr::from_parts(opcode, slots))
    }
}

impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.opcode())?;
        let [a, b, _] = self.operands();
        match self.opcode().arity() {
            0 => Ok(()),
            1 => write!(f, " {a}"),
            _ => write!(f, " {a} {b}"),
        }
    }
}
