// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A Motorola 68000 interpreter and disassembler over a pluggable memory bus.
//!
//! The crate emulates the MC68000 user and supervisor instruction set
//! against a flat, big-endian memory image and exposes the full
//! architectural state to the host. It is built from three coupled pieces:
//! the decoder (opcode word to [instruction::Instruction] record), the
//! execution engine (per-opcode semantics, condition codes, trap raising)
//! and a disassembler consuming the same decoded records.
//!
//! The usual entry point is [Machine], which owns the CPU core and its
//! memory:
//!
//! ```
//! use emu68k::{Machine, MachineConfig};
//!
//! let mut machine = Machine::with_config(MachineConfig {
//!     memory_size: 0x10000,
//!     ..MachineConfig::default()
//! });
//!
//! // MOVEQ #42,D0 followed by STOP #$2700.
//! machine.load_executable(&[0x70, 0x2A, 0x4E, 0x72, 0x27, 0x00], 0x1000, false).unwrap();
//! machine.execute().unwrap();
//! assert_eq!(machine.cpu.regs.d[0], 42);
//! ```
//!
//! Architectural exceptions never vector through emulated memory: they are
//! returned to the host as [Trap] values (single stepping) or dispatched to
//! a [TrapHandler] (batch runs), so the host supplies the operating
//! environment the program runs under. Hosts with memory-mapped hardware
//! implement [Bus] and hand it to [Machine::with_bus]; the [Debugger] hook
//! observes memory traffic without perturbing it.
//!
//! Logging goes through the `log` facade, with targets `decode`, `exec`,
//! `loader` and `disasm`; install whatever sink and level the host wants.

pub mod addressing;
pub mod cpu;
pub mod decoder;
pub mod disassembler;
pub mod exception;
mod executor;
pub mod instruction;
pub mod machine;
pub mod memory;
pub mod srecord;
pub mod status_register;
pub mod utils;

pub use cpu::{Cpu, CpuState, Registers};
pub use decoder::Mnemonic;
pub use exception::{Trap, Vector};
pub use instruction::{Instruction, Size};
pub use machine::{Error, Machine, MachineConfig, StopReason, TrapHandler};
pub use memory::{Bus, Debugger, Memory, Ram};
pub use srecord::{LoadError, SrecordInfo};
pub use status_register::StatusRegister;
