// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The machine façade: binds the CPU core, memory, loaders and disassembler,
//! and owns the execute loop.
//!
//! Exceptions travel two channels, matching the two callers. The
//! single-stepping [Machine::execute_instruction] hands every trap back as a
//! value. The batch [Machine::execute] propagates memory faults as a fatal
//! [Error] (configurable) and forwards everything else to the host's
//! [TrapHandler]; the core itself never vectors through memory.

use crate::cpu::{Cpu, CpuState};
use crate::disassembler::{Disassembler, Line};
use crate::exception::{Trap, Vector};
use crate::instruction::Instruction;
use crate::memory::{Bus, Debugger, Memory, WordReader, DEFAULT_MEMORY_SIZE};
use crate::srecord::{self, LoadError, SrecordInfo};

use std::fmt::Write as _;
use std::path::Path;
use std::rc::Rc;

use thiserror::Error as ThisError;

/// Fatal, host-facing failures. Architectural traps are not errors; they are
/// [Trap] values, except when the run policy promotes a memory fault.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("fatal trap: {0}")]
    FatalTrap(Trap),

    #[error("load outside the memory map at {addr:#X}")]
    LoadOutOfRange { addr: u32 },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An implementation bug, as opposed to anything the program did.
    #[error("emulator bug: {0}")]
    Internal(String),
}

/// Why a batch run returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A STOP instruction was executed; clear [Cpu::stopped] to resume.
    Stopped,
    /// An RTS popped past the outermost call frame (see
    /// [MachineConfig::end_on_final_rts]).
    FinalReturn,
    /// The attached debugger asked for cancellation between instructions.
    Cancelled,
    /// A trap was raised and no handler consumed it.
    UnhandledTrap(Trap),
}

/// Host hook for dispatching traps raised during a batch run.
pub trait TrapHandler {
    /// Handles one trap. The CPU and memory are the machine's own, so the
    /// handler can emulate the trap's effect (a TRAP #n system call, say)
    /// before execution continues. Return false to stop the run loop.
    fn dispatch(&mut self, cpu: &mut Cpu, memory: &mut Memory, trap: &Trap) -> bool;
}

/// Construction-time knobs.
#[derive(Clone, Debug)]
pub struct MachineConfig {
    /// Size of the flat RAM image.
    pub memory_size: usize,
    /// End a batch run when the call depth goes negative, i.e. the outermost
    /// subroutine returned. This is how a host embeds an M68K routine as a
    /// plain function call.
    pub end_on_final_rts: bool,
    /// Treat bus/address errors as fatal in batch runs. Single stepping
    /// always reports them as trap values.
    pub fatal_memory_faults: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            end_on_final_rts: false,
            fatal_memory_faults: true,
        }
    }
}

/// A complete M68K machine: CPU core, memory and disassembler.
pub struct Machine {
    pub cpu: Cpu,
    pub memory: Memory,
    pub disassembler: Disassembler,
    config: MachineConfig,
    trap_handler: Option<Box<dyn TrapHandler>>,
}

impl Machine {
    /// A machine with the default 16 MiB flat image.
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self {
            cpu: Cpu::new(),
            memory: Memory::new(config.memory_size),
            disassembler: Disassembler::new(),
            config,
            trap_handler: None,
        }
    }

    /// A machine over a host-supplied bus (memory-mapped I/O etc.).
    pub fn with_bus(bus: Box<dyn Bus>) -> Self {
        Self {
            cpu: Cpu::new(),
            memory: Memory::with_bus(bus),
            disassembler: Disassembler::new(),
            config: MachineConfig::default(),
            trap_handler: None,
        }
    }

    pub fn set_trap_handler(&mut self, handler: Box<dyn TrapHandler>) {
        self.trap_handler = Some(handler);
    }

    pub fn clear_trap_handler(&mut self) {
        self.trap_handler = None;
    }

    pub fn attach_debugger(&mut self, observer: Rc<dyn Debugger>) {
        self.memory.attach_debugger(observer);
    }

    pub fn detach_debugger(&mut self) {
        self.memory.detach_debugger();
    }

    /// Copies a program image into memory and points the PC at it.
    pub fn load_executable(&mut self, bytes: &[u8], at: u32, clear: bool) -> Result<(), Error> {
        self.load_data(bytes, at, clear)?;
        self.cpu.regs.pc = at;
        Ok(())
    }

    /// Copies bytes into memory without touching the CPU.
    pub fn load_data(&mut self, bytes: &[u8], at: u32, clear: bool) -> Result<(), Error> {
        log::debug!(target: "loader", "loading {} bytes at {at:#X}", bytes.len());
        self.memory
            .load(bytes, at, clear)
            .map_err(|addr| Error::LoadOutOfRange { addr })
    }

    /// Loads an S-record file. A termination record's start address is
    /// applied to the PC.
    pub fn load_srecord<P: AsRef<Path>>(&mut self, path: P) -> Result<SrecordInfo, Error> {
        let text = std::fs::read_to_string(path)?;
        let info = srecord::load_str(&text, &mut self.memory)?;
        if let Some(start) = info.start_address {
            self.cpu.regs.pc = start;
        }
        Ok(info)
    }

    pub fn cpu_state(&self) -> CpuState {
        self.cpu.state()
    }

    /// Applies the provided fields of `state`, leaving the rest alone.
    pub fn apply_cpu_state(&mut self, state: &CpuState) {
        self.cpu.apply_state(state);
    }

    /// Multi-line textual snapshot of the register file.
    pub fn dump(&self) -> String {
        let regs = &self.cpu.regs;
        let mut out = String::new();
        for bank in 0..2 {
            for reg in 0..4 {
                let index = bank * 4 + reg;
                write!(out, "D{index}={:08X} ", regs.d[index]).unwrap();
            }
            out.pop();
            out.push('\n');
        }
        for bank in 0..2 {
            for reg in 0..4 {
                let index = (bank * 4 + reg) as u8;
                write!(out, "A{index}={:08X} ", regs.a(index)).unwrap();
            }
            out.pop();
            out.push('\n');
        }
        writeln!(out, "PC={:08X} USP={:08X} SSP={:08X}", regs.pc, regs.usp, regs.ssp).unwrap();
        writeln!(out, "SR={:04X} ({})", u16::from(regs.sr), regs.sr).unwrap();
        out
    }

    /// Executes one instruction. Returns the trap it raised, if any; the
    /// host decides what to do with it.
    ///
    /// On an architectural fault (memory fault, illegal instruction,
    /// privilege violation, zero divide, CHK) the PC is left on the faulting
    /// instruction. The deliberate traps (TRAP #n, TRAPV) and the trace trap
    /// leave it on the next instruction, so execution can resume after
    /// dispatch.
    pub fn execute_instruction(&mut self) -> Option<Trap> {
        if self.cpu.stopped {
            return None;
        }

        let start_pc = self.cpu.regs.pc;
        let mut reader = WordReader::new(&mut self.memory, start_pc);
        let inst = match Instruction::decode(&mut reader) {
            Ok(inst) => inst,
            // The PC was never advanced; the fault names the fetch address.
            Err(vector) => return Some(Trap::new(vector, start_pc, None)),
        };
        let next_pc = reader.addr;

        self.cpu.regs.pc = next_pc;
        self.cpu.current_opcode = inst.opcode;
        let trace = self.cpu.regs.sr.t;

        match self.cpu.execute(&mut self.memory, &inst) {
            Ok(()) => {
                if trace && !inst.mnemonic.is_privileged() {
                    Some(Trap::new(Vector::Trace as u8, start_pc, Some(inst)))
                } else {
                    None
                }
            },
            Err(vector) => {
                if !deliberate(vector) {
                    self.cpu.regs.pc = start_pc;
                }
                log::debug!(target: "exec", "trap {vector} at {start_pc:#X}");
                Some(Trap::new(vector, start_pc, Some(inst)))
            },
        }
    }

    /// Runs instructions until the machine stops, the program returns past
    /// its outermost frame, the debugger cancels, or a trap ends the run.
    /// Memory faults are fatal (per [MachineConfig::fatal_memory_faults]);
    /// other traps go to the [TrapHandler], and an unhandled one returns.
    pub fn execute(&mut self) -> Result<StopReason, Error> {
        loop {
            if self.cpu.stopped {
                return Ok(StopReason::Stopped);
            }
            if let Some(observer) = self.memory.observer() {
                if observer.cancelling() {
                    return Ok(StopReason::Cancelled);
                }
            }

            if let Some(trap) = self.execute_instruction() {
                if self.config.fatal_memory_faults && trap.is_memory_fault() {
                    return Err(Error::FatalTrap(trap));
                }
                match self.trap_handler.as_mut() {
                    Some(handler) => {
                        if !handler.dispatch(&mut self.cpu, &mut self.memory, &trap) {
                            return Ok(StopReason::UnhandledTrap(trap));
                        }
                    },
                    None => return Ok(StopReason::UnhandledTrap(trap)),
                }
            }

            if self.config.end_on_final_rts && self.cpu.call_depth() < 0 {
                return Ok(StopReason::FinalReturn);
            }
        }
    }

    /// Disassembles `length` bytes starting at `start`, leaving execution
    /// state untouched.
    pub fn disassemble(&mut self, start: u32, length: u32) -> Vec<Line> {
        let observer = self.memory.observer().cloned();
        if let Some(observer) = &observer {
            observer.set_disassembling(true);
        }
        let lines = self.disassembler.scan(&mut self.memory, start, length, observer.as_ref());
        if let Some(observer) = &observer {
            observer.set_disassembling(false);
        }
        lines
    }

    /// Power-on reset of the CPU; memory contents are preserved.
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    // Stack helpers, working on the active stack pointer.

    pub fn push_word(&mut self, value: u16) -> Result<(), Error> {
        self.cpu.push_word(&mut self.memory, value).map_err(|v| self.stack_fault(v))
    }

    pub fn push_long(&mut self, value: u32) -> Result<(), Error> {
        self.cpu.push_long(&mut self.memory, value).map_err(|v| self.stack_fault(v))
    }

    pub fn pop_word(&mut self) -> Result<u16, Error> {
        self.cpu.pop_word(&mut self.memory).map_err(|v| self.stack_fault(v))
    }

    pub fn pop_long(&mut self) -> Result<u32, Error> {
        self.cpu.pop_long(&mut self.memory).map_err(|v| self.stack_fault(v))
    }

    fn stack_fault(&self, vector: u8) -> Error {
        Error::FatalTrap(Trap::new(vector, self.cpu.regs.pc, None))
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

/// TRAP #n and TRAPV are taken on purpose; their return address is the next
/// instruction. Every other vector reports the faulting instruction itself.
fn deliberate(vector: u8) -> bool {
    vector == Vector::TrapvInstruction as u8
        || (Vector::TrapInstruction as u8..Vector::TrapInstruction as u8 + 16).contains(&vector)
}
