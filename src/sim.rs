//! Simulating and execution for Tho programs.
//!
//! This module is focused on executing fully assembled code (i.e., [`ObjectFile`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates assembled code.
//! - [`MachineState`]: The accumulator, memory, program counter, and flags.
//! - [`output`]: The module handling where `OUT` values go.
//! - [`debug`]: The module handling types of breakpoints for the simulator.
//! - [`observer`]: The module tracking which state each instruction touches.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Simulator and load an object file to it:
//!
//! ```
//! use tho::asm::assemble_src;
//! use tho::sim::{PauseCondition, Simulator};
//!
//! let obj_file = assemble_src("STO 1 3\nSTO 2 4\nLDA 1\nADD 2\nOUT\nHLT").unwrap();
//!
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_obj_file(&obj_file);
//! assert_eq!(simulator.run(), Ok(PauseCondition::Halt));
//! assert_eq!(simulator.state().acc.get(), 7);
//! ```
//!
//! ## Flags
//!
//! Here, we define `simulator` to have the default flags.
//! We could also configure the simulator by editing the flags. For example,
//! if we wish to reproduce the legacy carry behavior, we can edit the flags like so:
//!
//! ```
//! # use tho::sim::{Arithmetic, Simulator, SimFlags};
//! let mut simulator = Simulator::new(SimFlags { arithmetic: Arithmetic::ForcedCarry, ..Default::default() });
//! ```
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::run`] (which runs until halting or the end of the program),
//! there are also:
//! - [`Simulator::step`]: manual step-by-step simulation, returning a [`Snapshot`] per instruction
//! - [`Simulator::snapshots`]: an iterator over the snapshots of a whole run
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! ```
//! use tho::asm::assemble_src;
//! use tho::sim::{Simulator, Step};
//!
//! let obj_file = assemble_src("STO 0 5 LDA 0 OUT HLT").unwrap();
//!
//! let mut sim = Simulator::default();
//! sim.load_obj_file(&obj_file);
//!
//! // Running step by step:
//! let Ok(Step::Executed(snap)) = sim.step() else { panic!() };
//! assert_eq!(snap.state.mem[0].get(), 5);
//! let Ok(Step::Executed(snap)) = sim.step() else { panic!() };
//! assert_eq!(snap.state.acc.get(), 5);
//! let Ok(Step::Executed(snap)) = sim.step() else { panic!() };
//! assert_eq!(snap.output.map(|n| n.get()), Some(5));
//!
//! // HLT produces no snapshot:
//! assert_eq!(sim.step(), Ok(Step::Halted));
//! assert_eq!(sim.step(), Ok(Step::Halted));
//! ```
//!
//! ## Debugging with breakpoints
//!
//! Breakpoints are accessible through the `breakpoints` field on [`Simulator`].
//!
//! To add a `breakpoint`, simply insert a [`Breakpoint`] and
//! it will break if its condition is met during all execution functions (except [`Simulator::step`]).
//!
//! ```
//! use tho::asm::assemble_src;
//! use tho::sim::{PauseCondition, Simulator};
//! use tho::sim::debug::Breakpoint;
//!
//! let obj_file = assemble_src("NOP NOP NOP NOP HLT").unwrap();
//!
//! let mut sim = Simulator::default();
//! sim.load_obj_file(&obj_file);
//! sim.breakpoints.insert(Breakpoint::PC(2));
//!
//! assert_eq!(sim.run(), Ok(PauseCondition::Breakpoint));
//! assert_eq!(sim.pc(), 2);
//! ```
//!
//! [`Breakpoint`]: self::debug::Breakpoint
pub mod debug;
pub mod observer;
pub mod output;

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::asm::encoding::{BinaryFormat, ObjFileFormat};
use crate::asm::ObjectFile;
use crate::ast::sim::SimInstr;
use crate::ast::{Nibble, Opcode};
use debug::Breakpoint;
use observer::{AccessSet, ChangeObserver, Location};
use output::{EmptyOutput, OutputDevice};

/// Errors that can occur during simulation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SimErr {
    /// Word was fetched, but its opcode does not name an instruction.
    IllegalOpcode {
        /// The opcode nibble of the word.
        opcode: u8,
        /// The index of the word in the program.
        pc: usize,
    },
    /// The output device did not accept a value from `OUT`.
    OutputRejected {
        /// The value that was not accepted.
        value: u8,
        /// The index of the `OUT` instruction.
        pc: usize,
    },
    /// A program byte stream did not divide into 2-byte words.
    TruncatedWord {
        /// The length of the byte stream.
        len: usize,
    },
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::IllegalOpcode { opcode, pc } => write!(f, "illegal opcode {opcode} at instruction {pc}"),
            SimErr::OutputRejected { value, pc } => write!(f, "output device rejected {value} at instruction {pc}"),
            SimErr::TruncatedWord { len } => write!(f, "program of {len} bytes ends in a partial instruction"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            SimErr::IllegalOpcode { .. } => Some("valid opcodes are 0 (NOP) through 12 (HLT)".into()),
            SimErr::OutputRejected { .. } => Some("the output channel is full or its receiver has been dropped".into()),
            SimErr::TruncatedWord { .. } => Some("each instruction is 2 bytes, so a program must have an even length".into()),
        }
    }
}

/// Anything that can cause a step to abruptly fail to finish.
enum StepBreak {
    /// A HLT was executed.
    Halt,
    /// The PC is past the last instruction.
    EndOfProgram,
    /// A simulation error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        Self::Err(value)
    }
}

/// The outcome of one [`Simulator::step`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Step {
    /// An instruction was executed.
    Executed(Snapshot),
    /// The program has halted. Nothing was executed.
    Halted,
    /// The PC is past the last instruction. Nothing was executed.
    EndOfProgram,
}

/// Reason for why execution paused if it wasn't due to an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PauseCondition {
    /// Program reached a halt.
    Halt,
    /// Program ran past its last instruction.
    EndOfProgram,
    /// Program hit a breakpoint.
    Breakpoint,
    /// Program hit a tripwire condition.
    Tripwire,
}

/// How the carry flag is computed when flags are recomputed.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum Arithmetic {
    /// Carry is the unsigned overflow of a 4-bit add,
    /// the borrow of a 4-bit subtract, and cleared by a load.
    #[default]
    Nibble,
    /// Carry is set by every LDA, ADD, and SUB.
    ///
    /// This matches the behavior of the first Tho simulator.
    ForcedCarry,
}
impl Arithmetic {
    fn carry(self, overflowed: bool) -> bool {
        match self {
            Arithmetic::Nibble => overflowed,
            Arithmetic::ForcedCarry => true,
        }
    }
}

/// Configuration flags for [`Simulator`].
///
/// These can be modified after the `Simulator` is created with [`Simulator::new`]
/// and their effects should still apply.
///
/// Read the field descriptions for more details.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct SimFlags {
    /// The carry flag rule.
    ///
    /// By default, this flag is [`Arithmetic::Nibble`].
    pub arithmetic: Arithmetic,

    /// The most instructions [`Simulator::run`] and [`Simulator::snapshots`] execute before pausing.
    ///
    /// By default, this flag is `None` (no limit).
    pub max_steps: Option<u64>,
}

/// The registers and memory of the Tho CPU.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct MachineState {
    /// The accumulator.
    pub acc: Nibble,
    /// The 16 memory cells.
    pub mem: [Nibble; 16],
    /// The index of the next instruction to execute.
    pub pc: usize,
    /// The zero flag. Set by LDA, ADD, and SUB if the accumulator is zero.
    pub zero: bool,
    /// The carry flag. Set by LDA, ADD, and SUB (see [`Arithmetic`]).
    pub carry: bool,
}
impl MachineState {
    /// The power-on state: everything zero, zero flag set, carry flag clear.
    pub fn new() -> Self {
        MachineState {
            acc: Nibble::MIN,
            mem: [Nibble::MIN; 16],
            pc: 0,
            zero: true,
            carry: false,
        }
    }
}
impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

/// A record of one executed instruction.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Snapshot {
    /// The index the instruction was fetched from.
    pub pc: usize,
    /// The raw instruction word.
    pub word: u16,
    /// The decoded instruction.
    pub instr: SimInstr,
    /// The machine state after the instruction executed.
    pub state: MachineState,
    /// The value emitted, if the instruction was `OUT`.
    pub output: Option<Nibble>,
    /// Every location the instruction accessed, in location order.
    pub accesses: Vec<(Location, AccessSet)>,
}
impl Snapshot {
    /// Gets the access set for the given location.
    pub fn accesses_at(&self, loc: Location) -> AccessSet {
        self.accesses.iter()
            .find(|(l, _)| *l == loc)
            .map_or_else(AccessSet::default, |&(_, set)| set)
    }
}

/// Executes assembled code.
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The machine's registers and memory.
    state: MachineState,

    /// Whether a HLT has been executed.
    halted: bool,

    /// The number of instructions successfully run since this `Simulator` was last reset.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Tracks changes in simulator state during the current instruction.
    pub observer: ChangeObserver,

    // ------------------ CONFIG/DEBUG STATE ------------------
    // Calling [`Simulator::reset`] does not reset these values.

    /// The loaded program.
    program: Vec<u16>,

    /// Configuration settings for the simulator.
    ///
    /// These are preserved between resets.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,

    /// Breakpoints for the simulator.
    pub breakpoints: HashSet<Breakpoint>,

    /// Where values from `OUT` are sent.
    output: Box<dyn OutputDevice>,
}
impl Simulator where Simulator: Send + Sync {}

impl Simulator {
    /// Creates a new simulator with the provided flags, without a loaded program.
    pub fn new(flags: SimFlags) -> Self {
        Self {
            state: MachineState::new(),
            halted: false,
            instructions_run: 0,
            observer: Default::default(),

            program: vec![],
            flags,
            breakpoints: Default::default(),
            output: Box::new(EmptyOutput),
        }
    }

    /// Resets the simulator.
    ///
    /// This resets the machine state back to before any execution calls,
    /// while preserving configuration and debug state.
    ///
    /// Note that this function preserves:
    /// - the loaded program
    /// - Flags
    /// - Breakpoints
    /// - the output device (however, note that it does not clear the output device, which must be manually reset)
    pub fn reset(&mut self) {
        self.state = MachineState::new();
        self.halted = false;
        self.instructions_run = 0;
        self.observer.clear();
    }

    /// Loads an object file into this simulator and resets the machine state.
    pub fn load_obj_file(&mut self, obj: &ObjectFile) {
        self.program = obj.words().to_vec();
        self.reset();
        debug!(len = self.program.len(), "loaded program");
    }

    /// Loads a program from its binary form (2-byte big-endian words)
    /// and resets the machine state.
    ///
    /// This fails if the byte stream has an odd length.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), SimErr> {
        let obj = BinaryFormat::deserialize(bytes)
            .ok_or(SimErr::TruncatedWord { len: bytes.len() })?;

        self.load_obj_file(&obj);
        Ok(())
    }

    /// The loaded program.
    pub fn program(&self) -> &[u16] {
        &self.program
    }

    /// Gets the current machine state.
    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Gets a mutable reference to the current machine state.
    pub fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    /// The index of the next instruction to execute.
    pub fn pc(&self) -> usize {
        self.state.pc
    }

    /// Indicates whether a HLT has been executed since the last reset.
    pub fn hit_halt(&self) -> bool {
        self.halted
    }

    /// Sets the device which receives the values emitted by `OUT`.
    pub fn set_output(&mut self, device: impl OutputDevice) {
        self.output = Box::new(device);
    }

    fn read_acc(&mut self) -> Nibble {
        self.observer.update_accesses(Location::Acc, AccessSet::READ);
        self.state.acc
    }
    fn write_acc(&mut self, value: Nibble) {
        self.observer.record_write(Location::Acc, self.state.acc, value);
        self.state.acc = value;
    }
    fn read_mem(&mut self, addr: Nibble) -> Nibble {
        self.observer.update_accesses(Location::Mem(addr.get()), AccessSet::READ);
        self.state.mem[usize::from(addr)]
    }
    fn write_mem(&mut self, addr: Nibble, value: Nibble) {
        let cell = &mut self.state.mem[usize::from(addr)];
        self.observer.record_write(Location::Mem(addr.get()), *cell, value);
        *cell = value;
    }
    fn read_zero(&mut self) -> bool {
        self.observer.update_accesses(Location::Zero, AccessSet::READ);
        self.state.zero
    }
    fn read_carry(&mut self) -> bool {
        self.observer.update_accesses(Location::Carry, AccessSet::READ);
        self.state.carry
    }
    /// Recomputes the flags after an LDA, ADD, or SUB.
    fn set_flags(&mut self, op: Opcode, result: Nibble, overflowed: bool) {
        debug_assert!(op.sets_flags(), "{op} does not recompute flags");
        let zero = result == Nibble::MIN;
        let carry = self.flags.arithmetic.carry(overflowed);
        trace!(zero, carry, "recomputed flags");

        self.observer.record_write(Location::Zero, self.state.zero, zero);
        self.observer.record_write(Location::Carry, self.state.carry, carry);
        self.state.zero = zero;
        self.state.carry = carry;
    }
    fn emit(&mut self, value: Nibble) -> Result<(), SimErr> {
        self.observer.update_accesses(Location::Output, AccessSet::WRITTEN);
        match self.output.send_output(value.get()) {
            true => Ok(()),
            false => {
                let pc = self.state.pc;
                warn!(value = value.get(), pc, "output device rejected value");
                Err(SimErr::OutputRejected { value: value.get(), pc })
            }
        }
    }

    /// Execute the program while the tripwire condition holds.
    ///
    /// This blocks until the program halts, runs off its end, hits a breakpoint,
    /// or the tripwire condition returns false.
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> Result<PauseCondition, SimErr> {
        // event loop
        // run until:
        // 1. the program halts or ends
        // 2. the tripwire condition returns false
        // 3. any of the breakpoints are hit
        loop {
            // Tripwire turned off:
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            // Run a step:
            match self.step_instr() {
                Ok(_) => {},
                Err(StepBreak::Halt) => break Ok(PauseCondition::Halt),
                Err(StepBreak::EndOfProgram) => break Ok(PauseCondition::EndOfProgram),
                Err(StepBreak::Err(e)) => break Err(e),
            }

            // After executing, check that any breakpoints were hit.
            if self.breakpoints.iter().any(|bp| bp.check(self)) {
                break Ok(PauseCondition::Breakpoint);
            }
        }
    }

    /// Execute the program.
    ///
    /// This blocks until the program ends (or [`SimFlags::max_steps`] instructions have run).
    /// If you would like to limit the maximum number of steps to execute, consider [`Simulator::run_with_limit`].
    pub fn run(&mut self) -> Result<PauseCondition, SimErr> {
        match self.flags.max_steps {
            Some(limit) => self.run_with_limit(limit),
            None => self.run_while(|_| true),
        }
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until the program ends or until the number of steps to execute has been hit.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<PauseCondition, SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Simulate one step, executing one instruction.
    ///
    /// Once the program halts or ends, every later call returns the same outcome.
    /// If a fault occurs, the machine state is left as it was before the faulting instruction.
    pub fn step(&mut self) -> Result<Step, SimErr> {
        match self.step_instr() {
            Ok(snap) => Ok(Step::Executed(snap)),
            Err(StepBreak::Halt) => Ok(Step::Halted),
            Err(StepBreak::EndOfProgram) => Ok(Step::EndOfProgram),
            Err(StepBreak::Err(e)) => Err(e),
        }
    }

    /// Creates an iterator over the snapshots of each instruction executed from here on.
    ///
    /// The iterator ends when the program halts or ends,
    /// after yielding a fault, or after [`SimFlags::max_steps`] instructions.
    pub fn snapshots(&mut self) -> Snapshots<'_> {
        let start = self.instructions_run;
        Snapshots { sim: self, start, done: false }
    }

    fn step_instr(&mut self) -> Result<Snapshot, StepBreak> {
        if self.halted {
            return Err(StepBreak::Halt);
        }

        let pc = self.state.pc;
        let Some(&word) = self.program.get(pc) else {
            return Err(StepBreak::EndOfProgram);
        };
        let instr = SimInstr::decode(word).map_err(|opcode| {
            warn!(opcode, pc, "illegal opcode");
            SimErr::IllegalOpcode { opcode, pc }
        })?;

        self.observer.clear();
        let mut next_pc = pc + 1;
        let mut output = None;

        match instr {
            SimInstr::NOP => {},
            SimInstr::LDA(addr) => {
                let value = self.read_mem(addr);
                self.write_acc(value);
                self.set_flags(Opcode::LDA, value, false);
            },
            SimInstr::STA(addr) => {
                let value = self.read_acc();
                self.write_mem(addr, value);
            },
            SimInstr::STO(addr, value) => self.write_mem(addr, value),
            SimInstr::ADD(addr) => {
                let a = self.read_acc();
                let m = self.read_mem(addr);
                let sum = a.get() + m.get();

                let result = Nibble::new_trunc(sum);
                self.write_acc(result);
                self.set_flags(Opcode::ADD, result, sum > 0xF);
            },
            SimInstr::SUB(addr) => {
                let a = self.read_acc();
                let m = self.read_mem(addr);
                let (diff, borrow) = a.get().overflowing_sub(m.get());

                let result = Nibble::new_trunc(diff);
                self.write_acc(result);
                self.set_flags(Opcode::SUB, result, borrow);
            },
            SimInstr::JMP(t) => next_pc = usize::from(t),
            SimInstr::JIC(t) => if self.read_carry() { next_pc = usize::from(t) },
            SimInstr::JNC(t) => if !self.read_carry() { next_pc = usize::from(t) },
            SimInstr::JIZ(t) => if self.read_zero() { next_pc = usize::from(t) },
            SimInstr::JNZ(t) => if !self.read_zero() { next_pc = usize::from(t) },
            SimInstr::OUT => {
                let value = self.read_acc();
                self.emit(value)?;
                output = Some(value);
            },
            SimInstr::HLT => {
                debug!(pc, "halted");
                self.halted = true;
                return Err(StepBreak::Halt);
            },
        }

        if next_pc != pc + 1 {
            self.observer.record_write(Location::PC, pc + 1, next_pc);
        }
        self.state.pc = next_pc;
        self.instructions_run += 1;
        debug!(pc, %instr, acc = self.state.acc.get(), "executed instruction");

        Ok(Snapshot {
            pc,
            word,
            instr,
            state: self.state,
            output,
            accesses: self.observer.take_accesses().collect(),
        })
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}
impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("state", &self.state)
            .field("halted", &self.halted)
            .field("instructions_run", &self.instructions_run)
            .field("program", &self.program)
            .field("flags", &self.flags)
            .field("breakpoints", &self.breakpoints)
            .finish_non_exhaustive()
    }
}

/// An iterator over the snapshots of a run (see [`Simulator::snapshots`]).
pub struct Snapshots<'a> {
    sim: &'a mut Simulator,
    start: u64,
    done: bool,
}
impl Iterator for Snapshots<'_> {
    type Item = Result<Snapshot, SimErr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(limit) = self.sim.flags.max_steps {
            if self.sim.instructions_run.wrapping_sub(self.start) >= limit {
                self.done = true;
                return None;
            }
        }

        match self.sim.step_instr() {
            Ok(snap) => Some(Ok(snap)),
            Err(StepBreak::Halt | StepBreak::EndOfProgram) => {
                self.done = true;
                None
            },
            Err(StepBreak::Err(e)) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::assemble_src;
    use crate::asm::encoding::{BinaryFormat, ObjFileFormat};
    use crate::asm::ObjectFile;
    use crate::ast::Nibble;

    use super::debug::{Breakpoint, Comparator};
    use super::observer::{AccessSet, Location};
    use super::output::{BufferedOutput, ChannelOutput};
    use super::*;

    fn load(src: &str) -> Simulator {
        let obj = assemble_src(src).unwrap();
        let mut sim = Simulator::default();
        sim.load_obj_file(&obj);
        sim
    }
    fn outputs(sim: &mut Simulator) -> Vec<u8> {
        sim.snapshots()
            .map(|r| r.unwrap())
            .filter_map(|s| s.output.map(u8::from))
            .collect()
    }
    fn nib(n: u8) -> Nibble {
        Nibble::new_trunc(n)
    }

    #[test]
    fn test_initial_state() {
        let sim = Simulator::default();
        let state = sim.state();
        assert_eq!(state.acc.get(), 0);
        assert!(state.mem.iter().all(|n| n.get() == 0));
        assert_eq!(state.pc, 0);
        assert!(state.zero);
        assert!(!state.carry);
    }

    #[test]
    fn test_scenario_store_load_output() {
        let mut sim = load("STO 0 5\nLDA 0\nOUT\nHLT");
        assert_eq!(outputs(&mut sim), [5]);
        assert!(sim.hit_halt());
    }

    #[test]
    fn test_scenario_add() {
        let mut sim = load("STO 1 3\nSTO 2 4\nLDA 1\nADD 2\nOUT\nHLT");
        assert_eq!(outputs(&mut sim), [7]);
        assert_eq!(sim.state().acc.get(), 7);
    }

    #[test]
    fn test_multiply_loop() {
        // 3 * 4 by repeated addition
        let mut sim = load("
            STO 0 3 STO 1 4 STO 2 1 STO 3 0
            LDA 3 ADD 0 STA 3
            LDA 1 SUB 2 STA 1
            JNZ 4
            LDA 3 OUT HLT
        ");
        assert_eq!(outputs(&mut sim), [12]);
    }

    #[test]
    fn test_illegal_opcode() {
        for op in [0xD, 0xE, 0xF] {
            let words = vec![0x0000, 0x3050, u16::from(op) << 12, 0xC000];
            let mut sim = Simulator::default();
            sim.load_obj_file(&ObjectFile::from_words(words));

            assert!(matches!(sim.step(), Ok(Step::Executed(_))));
            assert!(matches!(sim.step(), Ok(Step::Executed(_))));
            assert_eq!(sim.step(), Err(SimErr::IllegalOpcode { opcode: op, pc: 2 }));

            // state is left as of the last good instruction
            assert_eq!(sim.pc(), 2);
            assert_eq!(sim.state().mem[0].get(), 5);
            assert_eq!(sim.instructions_run, 2);
        }
    }

    #[test]
    fn test_halt_emits_no_snapshot() {
        let mut sim = load("NOP HLT NOP");
        let snaps: Vec<_> = sim.snapshots().collect();
        assert_eq!(snaps.len(), 1);
        assert_eq!(sim.step(), Ok(Step::Halted));
        assert_eq!(sim.pc(), 1);
        assert_eq!(sim.instructions_run, 1);
    }

    #[test]
    fn test_end_of_program() {
        let mut sim = load("STO 0 1 LDA 0");
        assert_eq!(sim.run(), Ok(PauseCondition::EndOfProgram));
        assert_eq!(sim.pc(), 2);
        assert_eq!(sim.step(), Ok(Step::EndOfProgram));
        assert!(!sim.hit_halt());

        let mut sim = Simulator::default();
        assert_eq!(sim.run(), Ok(PauseCondition::EndOfProgram));

        // a jump past the end ends the program without a fault
        let mut sim = load("JMP 15 HLT");
        assert_eq!(sim.run(), Ok(PauseCondition::EndOfProgram));
        assert_eq!(sim.pc(), 15);
    }

    #[test]
    fn test_flag_discipline() {
        // zero flag starts true; STO/STA/OUT/NOP/jumps don't touch it
        let mut sim = load("STO 0 5 STA 1 OUT NOP JMP 5 NOP");
        for _ in 0..5 {
            let Ok(Step::Executed(snap)) = sim.step() else { panic!("expected snapshot") };
            assert!(snap.state.zero);
            assert!(!snap.state.carry);
            assert!(!snap.accesses_at(Location::Zero).written());
            assert!(!snap.accesses_at(Location::Carry).written());
        }

        // LDA of a non-zero cell clears zero
        let mut sim = load("STO 0 5 LDA 0 LDA 1");
        sim.step().unwrap();
        let Ok(Step::Executed(snap)) = sim.step() else { panic!() };
        assert!(!snap.state.zero);
        assert!(snap.accesses_at(Location::Zero).modified());
        let Ok(Step::Executed(snap)) = sim.step() else { panic!() };
        assert!(snap.state.zero);
    }

    #[test]
    fn test_flags_kept_after_carry() {
        // 9 + 9 sets carry and clears zero, then nothing else may touch them
        let mut sim = load("
            STO 0 9 LDA 0 ADD 0
            STA 1 STO 2 4 OUT NOP JMP 9
            NOP
            JIC 11
            NOP
            JIZ 13
            HLT
        ");
        let snaps: Vec<_> = sim.snapshots().map(Result::unwrap).collect();
        assert!(sim.hit_halt());

        let (setup, rest) = snaps.split_at(3);
        assert!(setup[2].state.carry);
        assert!(!setup[2].state.zero);
        assert_eq!(setup[2].state.acc.get(), 2);

        let ran: Vec<_> = rest.iter().map(|s| s.instr.opcode()).collect();
        assert_eq!(ran, [Opcode::STA, Opcode::STO, Opcode::OUT, Opcode::NOP, Opcode::JMP, Opcode::JIC, Opcode::JIZ]);
        for snap in rest {
            assert!(snap.state.carry, "{} changed carry", snap.instr);
            assert!(!snap.state.zero, "{} changed zero", snap.instr);
        }
    }

    #[test]
    fn test_only_flag_opcodes_write_flags() {
        let mut sim = load("STO 0 9 STO 1 0 LDA 0 ADD 0 SUB 1 STA 2 OUT JNZ 9 NOP JIC 11 NOP NOP HLT");
        for snap in sim.snapshots().map(Result::unwrap) {
            let op = snap.instr.opcode();
            assert_eq!(snap.accesses_at(Location::Zero).written(), op.sets_flags(), "{op}");
            assert_eq!(snap.accesses_at(Location::Carry).written(), op.sets_flags(), "{op}");
        }
        assert!(sim.hit_halt());
    }

    #[test]
    fn test_add_carry() {
        // 9 + 9 = 18 -> 2 with carry
        let mut sim = load("STO 0 9 LDA 0 ADD 0 HLT");
        sim.run().unwrap();
        assert_eq!(sim.state().acc.get(), 2);
        assert!(sim.state().carry);
        assert!(!sim.state().zero);

        // 8 + 8 = 16 -> 0 with carry and zero
        let mut sim = load("STO 0 8 LDA 0 ADD 0 HLT");
        sim.run().unwrap();
        assert_eq!(sim.state().acc.get(), 0);
        assert!(sim.state().carry);
        assert!(sim.state().zero);

        // no overflow
        let mut sim = load("STO 0 7 LDA 0 ADD 0 HLT");
        sim.run().unwrap();
        assert_eq!(sim.state().acc.get(), 14);
        assert!(!sim.state().carry);
    }

    #[test]
    fn test_sub_borrow() {
        // 3 - 5 = -2 -> 14 with borrow
        let mut sim = load("STO 0 3 STO 1 5 LDA 0 SUB 1 HLT");
        sim.run().unwrap();
        assert_eq!(sim.state().acc.get(), 14);
        assert!(sim.state().carry);

        // 5 - 5 = 0
        let mut sim = load("STO 0 5 LDA 0 SUB 0 HLT");
        sim.run().unwrap();
        assert_eq!(sim.state().acc.get(), 0);
        assert!(sim.state().zero);
        assert!(!sim.state().carry);
    }

    #[test]
    fn test_forced_carry() {
        let mut sim = load("STO 0 1 LDA 0 HLT");
        sim.flags.arithmetic = Arithmetic::ForcedCarry;
        sim.run().unwrap();
        assert!(sim.state().carry);

        // carry loop: JIC always taken after LDA
        let mut sim = load("LDA 0 JIC 3 OUT HLT");
        sim.flags.arithmetic = Arithmetic::ForcedCarry;
        assert_eq!(outputs(&mut sim), Vec::<u8>::new());

        let mut sim = load("LDA 0 JIC 3 OUT HLT");
        assert_eq!(outputs(&mut sim), [0]);
    }

    #[test]
    fn test_jumps() {
        // (program, taken?)
        let cases = [
            ("JMP 2 OUT HLT", true),
            ("LDA 0 JIZ 3 OUT HLT", true),   // A = 0
            ("LDA 0 JNZ 3 OUT HLT", false),
            ("STO 0 1 LDA 0 JNZ 4 OUT HLT", true),
            ("STO 0 1 LDA 0 JIZ 4 OUT HLT", false),
            ("LDA 0 JNC 3 OUT HLT", true),   // carry cleared
            ("LDA 0 JIC 3 OUT HLT", false),
            ("STO 0 9 LDA 0 ADD 0 JIC 5 OUT HLT", true),
            ("STO 0 9 LDA 0 ADD 0 JNC 5 OUT HLT", false),
        ];

        for (src, taken) in cases {
            let mut sim = load(src);
            let out = outputs(&mut sim);
            assert_eq!(out.is_empty(), taken, "{src}");
            assert!(sim.hit_halt(), "{src}");
        }
    }

    #[test]
    fn test_jump_accesses() {
        let mut sim = load("LDA 0 JIZ 3 NOP HLT");
        sim.step().unwrap();
        let Ok(Step::Executed(snap)) = sim.step() else { panic!() };
        assert!(snap.accesses_at(Location::Zero).read());
        assert_eq!(snap.accesses_at(Location::PC), AccessSet::WRITTEN | AccessSet::MODIFIED);
        assert_eq!(snap.state.pc, 3);

        // not taken: pc isn't recorded
        let mut sim = load("LDA 0 JNZ 3 NOP HLT");
        sim.step().unwrap();
        let Ok(Step::Executed(snap)) = sim.step() else { panic!() };
        assert!(!snap.accesses_at(Location::PC).accessed());
        assert_eq!(snap.state.pc, 2);
    }

    #[test]
    fn test_snapshot_contents() {
        let mut sim = load("STO 0xA 3 LDA 0xA OUT");
        let snaps: Vec<_> = sim.snapshots().map(Result::unwrap).collect();
        assert_eq!(snaps.len(), 3);

        assert_eq!(snaps[0].pc, 0);
        assert_eq!(snaps[0].word, 0x3A30);
        assert_eq!(snaps[0].instr, SimInstr::STO(nib(0xA), nib(3)));
        assert_eq!(snaps[0].accesses, [(Location::Mem(0xA), AccessSet::WRITTEN | AccessSet::MODIFIED)]);

        assert!(snaps[1].accesses_at(Location::Mem(0xA)).read());
        assert!(snaps[1].accesses_at(Location::Acc).modified());
        assert_eq!(snaps[1].state.acc.get(), 3);

        assert_eq!(snaps[2].output, Some(nib(3)));
        assert!(snaps[2].accesses_at(Location::Output).written());
        assert_eq!(snaps[2].state.pc, 3);
    }

    #[test]
    fn test_run_with_limit() {
        let mut sim = load("JMP 0");
        assert_eq!(sim.run_with_limit(100), Ok(PauseCondition::Tripwire));
        assert_eq!(sim.instructions_run, 100);

        sim.flags.max_steps = Some(10);
        assert_eq!(sim.run(), Ok(PauseCondition::Tripwire));
        assert_eq!(sim.instructions_run, 110);
        assert_eq!(sim.snapshots().count(), 10);
    }

    #[test]
    fn test_breakpoints() {
        let mut sim = load("STO 0 1 STO 1 2 LDA 0 ADD 1 ADD 1 HLT");
        sim.breakpoints.insert(Breakpoint::Acc(Comparator::Ge(3)));
        assert_eq!(sim.run(), Ok(PauseCondition::Breakpoint));
        assert_eq!(sim.pc(), 4);

        sim.breakpoints.clear();
        sim.breakpoints.insert(Breakpoint::Mem { addr: nib(1), value: Comparator::Eq(2) });
        sim.reset();
        assert_eq!(sim.run(), Ok(PauseCondition::Breakpoint));
        assert_eq!(sim.pc(), 2);
    }

    #[test]
    fn test_reset_keeps_program() {
        let mut sim = load("STO 0 5 LDA 0 OUT HLT");
        assert_eq!(outputs(&mut sim), [5]);
        sim.reset();
        assert_eq!(sim.state(), &MachineState::new());
        assert_eq!(outputs(&mut sim), [5]);
    }

    #[test]
    fn test_load_bytes() {
        let obj = assemble_src("STO 0 5 LDA 0 OUT HLT").unwrap();
        let bytes = BinaryFormat::serialize(&obj);
        assert_eq!(bytes, [0x30, 0x50, 0x10, 0x00, 0xB0, 0x00, 0xC0, 0x00]);

        let mut sim = Simulator::default();
        sim.load_bytes(&bytes).unwrap();
        assert_eq!(sim.program(), obj.words());
        assert_eq!(outputs(&mut sim), [5]);

        assert_eq!(sim.load_bytes(&bytes[..7]), Err(SimErr::TruncatedWord { len: 7 }));
    }

    #[test]
    fn test_output_devices() {
        let src = "STO 0 2 STO 1 3 LDA 0 OUT ADD 1 OUT HLT";

        let mut sim = load(src);
        let buffer = BufferedOutput::default();
        sim.set_output(buffer.clone());
        sim.run().unwrap();
        assert_eq!(&*buffer.get_buffer().read().unwrap(), &[2, 5]);

        let mut sim = load(src);
        let (device, rx) = ChannelOutput::unbounded();
        sim.set_output(device);
        sim.run().unwrap();
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), [2, 5]);

        // a full channel faults at the second OUT
        let mut sim = load(src);
        let (device, rx) = ChannelOutput::bounded(1);
        sim.set_output(device);
        assert_eq!(sim.run(), Err(SimErr::OutputRejected { value: 5, pc: 5 }));
        assert_eq!(sim.pc(), 5);
        assert_eq!(sim.instructions_run, 5);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), [2]);

        // nobody is listening
        let mut sim = load(src);
        let (device, rx) = ChannelOutput::unbounded();
        drop(rx);
        sim.set_output(device);
        assert_eq!(sim.run(), Err(SimErr::OutputRejected { value: 2, pc: 3 }));
    }

    #[test]
    fn test_buffered_output_with_reader() {
        let mut sim = load("STO 0 5 LDA 0 OUT HLT");
        let buffer = BufferedOutput::default();
        sim.set_output(buffer.clone());

        // A reader holding the buffer while the program runs on another thread
        // delays the write rather than dropping it.
        let guard = buffer.get_buffer().read().unwrap();
        let handle = std::thread::spawn(move || sim.run());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(guard.is_empty());
        drop(guard);

        assert_eq!(handle.join().unwrap(), Ok(PauseCondition::Halt));
        assert_eq!(&*buffer.get_buffer().read().unwrap(), &[5]);
    }

    #[test]
    fn test_state_mut() {
        let mut sim = load("OUT HLT");
        sim.state_mut().acc = nib(9);
        assert_eq!(outputs(&mut sim), [9]);
    }
}
