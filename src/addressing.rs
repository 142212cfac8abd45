// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Addressing modes and effective-address resolution.

use crate::cpu::Cpu;
use crate::instruction::Size;
use crate::memory::{Bus, WordReader};
use crate::utils::{bit, bits};

/// The twelve addressing modes of the MC68000.
///
/// The variants carry everything decoded from the extension words, so a mode
/// value is self-contained: resolving it only needs the register file. The
/// PC-relative variants remember the address their extension word was fetched
/// from, which is the base the displacement applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressingMode {
    /// `Dn`
    DataDirect(u8),
    /// `An`
    AddressDirect(u8),
    /// `(An)`
    AddressIndirect(u8),
    /// `(An)+`
    PostIncrement(u8),
    /// `-(An)`
    PreDecrement(u8),
    /// `(d16,An)`
    AddressDisplacement(u8, i16),
    /// `(d8,An,Xn.size)`
    AddressIndexed(u8, IndexExtension),
    /// `(xxx).W`
    AbsoluteShort(u16),
    /// `(xxx).L`
    AbsoluteLong(u32),
    /// `(d16,PC)`; the first field is the extension word's own address.
    PcDisplacement(u32, i16),
    /// `(d8,PC,Xn.size)`; the first field is the extension word's own address.
    PcIndexed(u32, IndexExtension),
    /// `#imm`
    Immediate(u32),
}

impl AddressingMode {
    /// Decodes a mode/register field pair, consuming the extension words the
    /// mode requires. `size` matters only for immediates (one word for byte
    /// and word operands, two for long).
    pub(crate) fn decode<B: Bus + ?Sized>(
        mode: u16,
        reg: u8,
        size: Option<Size>,
        r: &mut WordReader<'_, B>,
    ) -> Result<Self, u8> {
        Ok(match mode {
            0 => Self::DataDirect(reg),
            1 => Self::AddressDirect(reg),
            2 => Self::AddressIndirect(reg),
            3 => Self::PostIncrement(reg),
            4 => Self::PreDecrement(reg),
            5 => Self::AddressDisplacement(reg, r.next_word()? as i16),
            6 => Self::AddressIndexed(reg, IndexExtension(r.next_word()?)),
            _ => match reg {
                0 => Self::AbsoluteShort(r.next_word()?),
                1 => Self::AbsoluteLong(r.next_long()?),
                2 => {
                    let base = r.addr;
                    Self::PcDisplacement(base, r.next_word()? as i16)
                },
                3 => {
                    let base = r.addr;
                    Self::PcIndexed(base, IndexExtension(r.next_word()?))
                },
                _ => {
                    if size == Some(Size::Long) {
                        Self::Immediate(r.next_long()?)
                    } else {
                        Self::Immediate(r.next_word()? as u32)
                    }
                },
            },
        })
    }

    /// The register number carried by register-based modes.
    pub const fn register(self) -> Option<u8> {
        match self {
            Self::DataDirect(reg)
            | Self::AddressDirect(reg)
            | Self::AddressIndirect(reg)
            | Self::PostIncrement(reg)
            | Self::PreDecrement(reg)
            | Self::AddressDisplacement(reg, _)
            | Self::AddressIndexed(reg, _) => Some(reg),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn is_data_direct(self) -> bool {
        matches!(self, Self::DataDirect(_))
    }

    #[inline(always)]
    pub const fn is_address_direct(self) -> bool {
        matches!(self, Self::AddressDirect(_))
    }

    #[inline(always)]
    pub const fn is_register_direct(self) -> bool {
        matches!(self, Self::DataDirect(_) | Self::AddressDirect(_))
    }

    #[inline(always)]
    pub const fn is_post_increment(self) -> bool {
        matches!(self, Self::PostIncrement(_))
    }

    #[inline(always)]
    pub const fn is_pre_decrement(self) -> bool {
        matches!(self, Self::PreDecrement(_))
    }

    #[inline(always)]
    pub const fn is_immediate(self) -> bool {
        matches!(self, Self::Immediate(_))
    }
}

/// The brief extension word of the indexed modes: index register number and
/// kind, index size and an 8-bit displacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexExtension(pub u16);

impl IndexExtension {
    /// True when the index register is an address register.
    pub const fn is_address_reg(self) -> bool {
        bit(self.0, 15)
    }

    pub const fn reg(self) -> u8 {
        bits(self.0, 12, 14) as u8
    }

    /// True when the whole index register is used, false for its low word.
    pub const fn is_long(self) -> bool {
        bit(self.0, 11)
    }

    pub const fn displacement(self) -> i8 {
        self.0 as i8
    }
}

impl std::fmt::Display for IndexExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}.{}",
            if self.is_address_reg() { 'A' } else { 'D' },
            self.reg(),
            if self.is_long() { 'L' } else { 'W' },
        )
    }
}

/// An addressing mode on its way to being used as an operand location.
///
/// The computed address is cached so that read-modify-write handlers resolve
/// once and reuse the location, making pre/post adjustment side effects
/// observable exactly once per instruction.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EffectiveAddress {
    pub mode: AddressingMode,
    pub address: Option<u32>,
    pub size: Option<Size>,
}

impl EffectiveAddress {
    pub fn new(mode: AddressingMode, size: Option<Size>) -> Self {
        Self { mode, address: None, size }
    }
}

impl Cpu {
    /// Computes (or returns the cached) memory address of `ea`, applying
    /// post-increment/pre-decrement side effects on first resolution.
    ///
    /// Register-direct and immediate modes have no address; reaching here
    /// with one is a decoder/executor pairing bug.
    pub(crate) fn effective_address(&mut self, ea: &mut EffectiveAddress) -> u32 {
        if ea.address.is_none() {
            ea.address = Some(match ea.mode {
                AddressingMode::AddressIndirect(reg) => self.regs.a(reg),
                AddressingMode::PostIncrement(reg) => {
                    self.post_increment(reg, ea.size.expect("sized access through (An)+"))
                },
                AddressingMode::PreDecrement(reg) => {
                    self.pre_decrement(reg, ea.size.expect("sized access through -(An)"))
                },
                AddressingMode::AddressDisplacement(reg, disp) => {
                    self.regs.a(reg).wrapping_add(disp as u32)
                },
                AddressingMode::AddressIndexed(reg, index) => self
                    .regs
                    .a(reg)
                    .wrapping_add(index.displacement() as u32)
                    .wrapping_add(self.index_value(index)),
                AddressingMode::AbsoluteShort(addr) => addr as i16 as u32,
                AddressingMode::AbsoluteLong(addr) => addr,
                AddressingMode::PcDisplacement(base, disp) => base.wrapping_add(disp as u32),
                AddressingMode::PcIndexed(base, index) => base
                    .wrapping_add(index.displacement() as u32)
                    .wrapping_add(self.index_value(index)),
                AddressingMode::DataDirect(_)
                | AddressingMode::AddressDirect(_)
                | AddressingMode::Immediate(_) => {
                    unreachable!("effective address of a non-memory operand")
                },
            });
        }

        ea.address.unwrap()
    }

    /// Value of the index register named by a brief extension word, word
    /// indexes sign-extended.
    fn index_value(&self, index: IndexExtension) -> u32 {
        let raw = if index.is_address_reg() {
            self.regs.a(index.reg())
        } else {
            self.regs.d[index.reg() as usize]
        };
        if index.is_long() {
            raw
        } else {
            raw as i16 as u32
        }
    }

    /// `(An)+`: returns An, then bumps it by the operand size (byte counts as
    /// a word on the stack pointer).
    pub(crate) fn post_increment(&mut self, reg: u8, size: Size) -> u32 {
        let areg = self.regs.a_mut(reg);
        let addr = *areg;
        *areg = areg.wrapping_add(size.stride(reg));
        addr
    }

    /// `-(An)`: bumps An down by the operand size, then returns it.
    pub(crate) fn pre_decrement(&mut self, reg: u8, size: Size) -> u32 {
        let areg = self.regs.a_mut(reg);
        *areg = areg.wrapping_sub(size.stride(reg));
        *areg
    }
}
