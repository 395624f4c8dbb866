//! Utilities to debug simulation.
//!
//! The key type here is [`Breakpoint`], which can be appended to the [`Simulator`]'s
//! breakpoint field to cause the simulator to break.
use std::fmt::Write;

use crate::ast::Nibble;

use super::Simulator;

/// Common breakpoints.
#[derive(PartialEq, Eq, Hash)]
pub enum Breakpoint {
    /// Break when the PC is equal to the given value.
    PC(usize),

    /// Break when the accumulator is set to a given value.
    Acc(Comparator),

    /// Break when the provided memory cell holds a given value.
    Mem {
        /// Address to check.
        addr: Nibble,
        /// Predicate to break against.
        value: Comparator
    },
}

impl Breakpoint where Breakpoint: Send + Sync { /* assert Breakpoint is send/sync */ }

impl Breakpoint {
    /// Checks if a break should occur.
    pub fn check(&self, sim: &Simulator) -> bool {
        let state = sim.state();
        match self {
            Breakpoint::PC(expected) => expected == &state.pc,
            Breakpoint::Acc(cmp) => cmp.check(state.acc),
            Breakpoint::Mem { addr, value: cmp } => cmp.check(state.mem[usize::from(*addr)]),
        }
    }

    fn fmt_bp(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::PC(expected) => write!(f, "PC == {expected}"),
            Self::Acc(value) => {
                f.write_str("A ")?;
                value.fmt_cmp(f)
            },
            Self::Mem { addr, value } => {
                write!(f, "mem[{addr:X}] ")?;
                value.fmt_cmp(f)
            },
        }
    }
}
impl std::fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Breakpoint(")?;
        self.fmt_bp(f)?;
        f.write_char(')')
    }
}

/// Predicate checking whether the current value is equal to the value.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Comparator {
    /// Never breaks.
    Never,
    /// Break if the desired value is less than the provided value.
    Lt(u8),
    /// Break if the desired value is equal to the provided value.
    Eq(u8),
    /// Break if the desired value is less than or equal to the provided value.
    Le(u8),
    /// Break if the desired value is greater than the provided value.
    Gt(u8),
    /// Break if the desired value is not equal to the provided value.
    Ne(u8),
    /// Break if the desired value is greater than or equal to the provided value.
    Ge(u8),
    /// Always breaks.
    Always
}
impl Comparator {
    /// Checks if the operand passes the comparator.
    pub fn check(&self, operand: Nibble) -> bool {
        let operand = operand.get();
        match *self {
            Comparator::Never  => false,
            Comparator::Lt(r)  => operand < r,
            Comparator::Eq(r)  => operand == r,
            Comparator::Le(r)  => operand <= r,
            Comparator::Gt(r)  => operand > r,
            Comparator::Ne(r)  => operand != r,
            Comparator::Ge(r)  => operand >= r,
            Comparator::Always => true,
        }
    }

    fn fmt_cmp(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::Never  => f.write_str("never"),
            Comparator::Lt(r)  => write!(f, "< {r}"),
            Comparator::Eq(r)  => write!(f, "== {r}"),
            Comparator::Le(r)  => write!(f, "<= {r}"),
            Comparator::Gt(r)  => write!(f, "> {r}"),
            Comparator::Ne(r)  => write!(f, "!= {r}"),
            Comparator::Ge(r)  => write!(f, ">= {r}"),
            Comparator::Always => f.write_str("always"),
        }
    }
}
