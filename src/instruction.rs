// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instruction records: operation sizes, operand shapes and decoding.
//!
//! Decoding never raises traps on its own: a fault while fetching extension
//! words propagates as a bus/address-error vector, and unassigned bit
//! patterns come out of the family lookup as `Illegal`/`LineA`/`LineF` for
//! the executor to turn into the corresponding exception.

use crate::addressing::AddressingMode;
use crate::decoder::{self, Mnemonic};
use crate::disassembler::{self, PlainFormatter};
use crate::memory::{Bus, WordReader};
use crate::utils::{bit, bits};

/// Size of an operation, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Size {
    Byte = 1,
    Word = 2,
    Long = 4,
}

impl Size {
    /// How far `(An)+` / `-(An)` move the register: the operand size, except
    /// that the stack pointer always stays word-aligned.
    #[inline(always)]
    pub fn stride(self, reg: u8) -> u32 {
        if self == Self::Byte && reg == 7 {
            2
        } else {
            self as u32
        }
    }

    /// Decodes the common two-bit size field (0/1/2).
    #[inline(always)]
    pub fn from_bits(field: u16) -> Option<Self> {
        match field {
            0 => Some(Self::Byte),
            1 => Some(Self::Word),
            2 => Some(Self::Long),
            _ => None,
        }
    }

    /// Decodes the single-bit word/long field of MOVEM and EXT.
    #[inline(always)]
    pub fn from_word_long_bit(field: u16) -> Self {
        if field == 0 {
            Self::Word
        } else {
            Self::Long
        }
    }

    /// Decodes the MOVE/MOVEA size field (1 = byte, 3 = word, 2 = long).
    #[inline(always)]
    pub fn from_move_bits(field: u16) -> Option<Self> {
        match field {
            1 => Some(Self::Byte),
            3 => Some(Self::Word),
            2 => Some(Self::Long),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn is_byte(self) -> bool {
        self == Self::Byte
    }

    #[inline(always)]
    pub fn is_word(self) -> bool {
        self == Self::Word
    }

    #[inline(always)]
    pub fn is_long(self) -> bool {
        self == Self::Long
    }
}

impl std::fmt::Display for Size {
    /// The assembler suffix letter.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Size::Byte => write!(f, "B"),
            Size::Word => write!(f, "W"),
            Size::Long => write!(f, "L"),
        }
    }
}

/// Direction or variant selector packed into several opcode families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// MOVEM/MOVEP: registers to memory.
    ToMemory,
    /// MOVEM/MOVEP: memory to registers.
    ToRegister,
    /// ADD/AND/OR/SUB: the effective address is the destination.
    DestEa,
    /// ADD/AND/OR/SUB: the data register is the destination.
    DestReg,
    /// Shifts and rotations.
    Left,
    /// Shifts and rotations.
    Right,
    /// MOVE USP.
    RegToUsp,
    /// MOVE USP.
    UspToReg,
    /// ABCD/ADDX/SBCD/SUBX on data registers.
    RegToReg,
    /// ABCD/ADDX/SBCD/SUBX through predecremented memory.
    MemToMem,
    /// EXG Dx,Dy.
    SwapData,
    /// EXG Ax,Ay.
    SwapAddress,
    /// EXG Dx,Ay.
    SwapDataAddress,
}

/// Operands of an instruction, one variant per operand shape.
///
/// The decoder guarantees that each [Mnemonic] is always paired with the same
/// shape, which is what makes the panicking accessors below safe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operands {
    /// ILLEGAL, NOP, RESET, RTE, RTR, RTS, TRAPV, line A/F patterns.
    None,
    /// ANDI/EORI/ORI to CCR/SR, STOP.
    Word(u16),
    /// ADDI, ANDI, CMPI, EORI, ORI, SUBI.
    SizeEaImm(Size, AddressingMode, u32),
    /// BCHG, BCLR, BSET, BTST: bit number (static) or register (dynamic).
    BitEa(AddressingMode, u8),
    /// JMP, JSR, MOVE from SR, MOVE to CCR/SR, NBCD, PEA, TAS.
    Ea(AddressingMode),
    /// CLR, NEG, NEGX, NOT, TST.
    SizeEa(Size, AddressingMode),
    /// CHK, DIVS, DIVU, LEA, MULS, MULU.
    RegEa(u8, AddressingMode),
    /// MOVEP.
    Movep { dreg: u8, dir: Direction, size: Size, areg: u8, disp: i16 },
    /// MOVEA.
    SizeRegEa(Size, u8, AddressingMode),
    /// MOVE: size, destination, source.
    Move(Size, AddressingMode, AddressingMode),
    /// EXG.
    ExgPair(u8, Direction, u8),
    /// EXT: opmode and register.
    ExtReg(u8, u8),
    /// TRAP #n.
    TrapVector(u8),
    /// LINK.
    RegDisp(u8, i16),
    /// SWAP, UNLK.
    Reg(u8),
    /// MOVE USP.
    UspReg(Direction, u8),
    /// MOVEM: direction, size, addressing mode, register mask.
    Movem(Direction, Size, AddressingMode, u16),
    /// ADDQ, SUBQ: quick data (0 encodes 8), size, addressing mode.
    QuickSizeEa(u8, Size, AddressingMode),
    /// Scc.
    CondEa(u8, AddressingMode),
    /// DBcc.
    CondRegDisp(u8, u8, i16),
    /// BRA, BSR.
    Disp(i16),
    /// Bcc.
    CondDisp(u8, i16),
    /// MOVEQ.
    MoveQuick(u8, i8),
    /// ADD, AND, CMP, EOR, OR, SUB.
    RegDirSizeEa(u8, Direction, Size, AddressingMode),
    /// ADDA, CMPA, SUBA.
    RegSizeEa(u8, Size, AddressingMode),
    /// ABCD, ADDX, SBCD, SUBX.
    RegSizeModeReg(u8, Size, Direction, u8),
    /// CMPM.
    RegSizeReg(u8, Size, u8),
    /// Memory shift/rotate (word-sized, by one).
    ShiftMem(Direction, AddressingMode),
    /// Register shift/rotate: count field, direction, size, count-in-register
    /// flag, destination register.
    ShiftReg(u8, Direction, Size, bool, u8),
}

/// The effective-address field in the low six bits of the opcode.
fn ea_field<B: Bus + ?Sized>(
    opcode: u16,
    size: Option<Size>,
    r: &mut WordReader<'_, B>,
) -> Result<AddressingMode, u8> {
    AddressingMode::decode(bits(opcode, 3, 5), bits(opcode, 0, 2) as u8, size, r)
}

/// A byte-embedded branch displacement, widened from the extension word when
/// the embedded byte is zero.
fn branch_displacement<B: Bus + ?Sized>(opcode: u16, r: &mut WordReader<'_, B>) -> Result<i16, u8> {
    let embedded = opcode as i8;
    if embedded == 0 {
        Ok(r.next_word()? as i16)
    } else {
        Ok(embedded as i16)
    }
}

impl Operands {
    /// Fetches the operands (and their extension words) for an instruction of
    /// the given family.
    pub(crate) fn decode<B: Bus + ?Sized>(
        mnemonic: Mnemonic,
        opcode: u16,
        r: &mut WordReader<'_, B>,
    ) -> Result<Self, u8> {
        use Mnemonic::*;

        Ok(match mnemonic {
            Unknown | Illegal | LineA | LineF | Nop | Reset | Rte | Rtr | Rts | Trapv => Self::None,

            AndiToCcr | AndiToSr | EoriToCcr | EoriToSr | OriToCcr | OriToSr | Stop => {
                Self::Word(r.next_word()?)
            },

            Addi | Andi | Cmpi | Eori | Ori | Subi => {
                let size = Size::from_bits(bits(opcode, 6, 7)).ok_or_else(decoder::bad_encoding)?;
                let imm = if size.is_long() {
                    r.next_long()?
                } else {
                    r.next_word()? as u32
                };
                Self::SizeEaImm(size, ea_field(opcode, Some(size), r)?, imm)
            },

            Bchg | Bclr | Bset | Btst => {
                let count = if bit(opcode, 8) {
                    bits(opcode, 9, 11) as u8 // dynamic: bit number lives in Dn
                } else {
                    r.next_word()? as u8
                };
                let size = if bits(opcode, 3, 5) == 0 { Size::Long } else { Size::Byte };
                Self::BitEa(ea_field(opcode, Some(size), r)?, count)
            },

            Jmp | Jsr => Self::Ea(ea_field(opcode, None, r)?),
            MoveFromSr | MoveToCcr | MoveToSr => Self::Ea(ea_field(opcode, Some(Size::Word), r)?),
            Nbcd | Tas => Self::Ea(ea_field(opcode, Some(Size::Byte), r)?),
            Pea => Self::Ea(ea_field(opcode, Some(Size::Long), r)?),

            Clr | Neg | Negx | Not | Tst => {
                let size = Size::from_bits(bits(opcode, 6, 7)).ok_or_else(decoder::bad_encoding)?;
                Self::SizeEa(size, ea_field(opcode, Some(size), r)?)
            },

            Chk | Divs | Divu | Muls | Mulu => {
                let reg = bits(opcode, 9, 11) as u8;
                Self::RegEa(reg, ea_field(opcode, Some(Size::Word), r)?)
            },
            Lea => {
                let reg = bits(opcode, 9, 11) as u8;
                Self::RegEa(reg, ea_field(opcode, Some(Size::Long), r)?)
            },

            Movep => Self::Movep {
                dreg: bits(opcode, 9, 11) as u8,
                dir: if bit(opcode, 7) { Direction::ToMemory } else { Direction::ToRegister },
                size: Size::from_word_long_bit(bits(opcode, 6, 6)),
                areg: bits(opcode, 0, 2) as u8,
                disp: r.next_word()? as i16,
            },

            Movea => {
                let size = Size::from_move_bits(bits(opcode, 12, 13)).ok_or_else(decoder::bad_encoding)?;
                let areg = bits(opcode, 9, 11) as u8;
                Self::SizeRegEa(size, areg, ea_field(opcode, Some(size), r)?)
            },

            Move => {
                let size = Size::from_move_bits(bits(opcode, 12, 13)).ok_or_else(decoder::bad_encoding)?;
                // Source extension words come first in the instruction stream.
                let src = ea_field(opcode, Some(size), r)?;
                // The destination field is stored transposed: mode in bits
                // 6-8, register in bits 9-11.
                let dst = AddressingMode::decode(bits(opcode, 6, 8), bits(opcode, 9, 11) as u8, Some(size), r)?;
                Self::Move(size, dst, src)
            },

            Exg => {
                let mode = match bits(opcode, 3, 7) {
                    0b01000 => Direction::SwapData,
                    0b01001 => Direction::SwapAddress,
                    _ => Direction::SwapDataAddress,
                };
                Self::ExgPair(bits(opcode, 9, 11) as u8, mode, bits(opcode, 0, 2) as u8)
            },

            Ext => Self::ExtReg(bits(opcode, 6, 8) as u8, bits(opcode, 0, 2) as u8),

            Trap => Self::TrapVector(bits(opcode, 0, 3) as u8),

            Link => Self::RegDisp(bits(opcode, 0, 2) as u8, r.next_word()? as i16),

            Swap | Unlk => Self::Reg(bits(opcode, 0, 2) as u8),

            MoveUsp => {
                let dir = if bit(opcode, 3) { Direction::UspToReg } else { Direction::RegToUsp };
                Self::UspReg(dir, bits(opcode, 0, 2) as u8)
            },

            Movem => {
                let mask = r.next_word()?;
                let dir = if bit(opcode, 10) { Direction::ToRegister } else { Direction::ToMemory };
                let size = Size::from_word_long_bit(bits(opcode, 6, 6));
                Self::Movem(dir, size, ea_field(opcode, Some(size), r)?, mask)
            },

            Addq | Subq => {
                let size = Size::from_bits(bits(opcode, 6, 7)).ok_or_else(decoder::bad_encoding)?;
                Self::QuickSizeEa(bits(opcode, 9, 11) as u8, size, ea_field(opcode, Some(size), r)?)
            },

            Scc => Self::CondEa(bits(opcode, 8, 11) as u8, ea_field(opcode, Some(Size::Byte), r)?),

            Dbcc => {
                let disp = r.next_word()? as i16;
                Self::CondRegDisp(bits(opcode, 8, 11) as u8, bits(opcode, 0, 2) as u8, disp)
            },

            Bra | Bsr => Self::Disp(branch_displacement(opcode, r)?),

            Bcc => {
                let disp = branch_displacement(opcode, r)?;
                Self::CondDisp(bits(opcode, 8, 11) as u8, disp)
            },

            Moveq => Self::MoveQuick(bits(opcode, 9, 11) as u8, opcode as i8),

            Add | And | Cmp | Eor | Or | Sub => {
                let reg = bits(opcode, 9, 11) as u8;
                // CMP and EOR have a fixed destination and ignore this flag.
                let dir = if bit(opcode, 8) { Direction::DestEa } else { Direction::DestReg };
                let size = Size::from_bits(bits(opcode, 6, 7)).ok_or_else(decoder::bad_encoding)?;
                Self::RegDirSizeEa(reg, dir, size, ea_field(opcode, Some(size), r)?)
            },

            Adda | Cmpa | Suba => {
                let reg = bits(opcode, 9, 11) as u8;
                let size = Size::from_word_long_bit(bits(opcode, 8, 8));
                Self::RegSizeEa(reg, size, ea_field(opcode, Some(size), r)?)
            },

            Abcd | Addx | Sbcd | Subx => {
                let size = Size::from_bits(bits(opcode, 6, 7)).ok_or_else(decoder::bad_encoding)?;
                let mode = if bit(opcode, 3) { Direction::MemToMem } else { Direction::RegToReg };
                Self::RegSizeModeReg(bits(opcode, 9, 11) as u8, size, mode, bits(opcode, 0, 2) as u8)
            },

            Cmpm => {
                let size = Size::from_bits(bits(opcode, 6, 7)).ok_or_else(decoder::bad_encoding)?;
                Self::RegSizeReg(bits(opcode, 9, 11) as u8, size, bits(opcode, 0, 2) as u8)
            },

            AsMem | LsMem | RoMem | RoxMem => {
                let dir = if bit(opcode, 8) { Direction::Left } else { Direction::Right };
                Self::ShiftMem(dir, ea_field(opcode, Some(Size::Word), r)?)
            },

            AsReg | LsReg | RoReg | RoxReg => {
                let count = bits(opcode, 9, 11) as u8;
                let dir = if bit(opcode, 8) { Direction::Left } else { Direction::Right };
                let size = Size::from_bits(bits(opcode, 6, 7)).ok_or_else(decoder::bad_encoding)?;
                Self::ShiftReg(count, dir, size, bit(opcode, 5), bits(opcode, 0, 2) as u8)
            },
        })
    }

    // The extractors below panic on a shape mismatch, which the decoder makes
    // unreachable: a mnemonic always decodes to the same variant.

    pub fn word(self) -> u16 {
        match self {
            Self::Word(imm) => imm,
            _ => panic!("expected immediate word operand"),
        }
    }

    pub fn size_ea_imm(self) -> (Size, AddressingMode, u32) {
        match self {
            Self::SizeEaImm(size, am, imm) => (size, am, imm),
            _ => panic!("expected size/ea/immediate operands"),
        }
    }

    pub fn bit_ea(self) -> (AddressingMode, u8) {
        match self {
            Self::BitEa(am, count) => (am, count),
            _ => panic!("expected ea/bit-number operands"),
        }
    }

    pub fn ea(self) -> AddressingMode {
        match self {
            Self::Ea(am) => am,
            _ => panic!("expected a single ea operand"),
        }
    }

    pub fn size_ea(self) -> (Size, AddressingMode) {
        match self {
            Self::SizeEa(size, am) => (size, am),
            _ => panic!("expected size/ea operands"),
        }
    }

    pub fn reg_ea(self) -> (u8, AddressingMode) {
        match self {
            Self::RegEa(reg, am) => (reg, am),
            _ => panic!("expected register/ea operands"),
        }
    }

    pub fn movep(self) -> (u8, Direction, Size, u8, i16) {
        match self {
            Self::Movep { dreg, dir, size, areg, disp } => (dreg, dir, size, areg, disp),
            _ => panic!("expected MOVEP operands"),
        }
    }

    pub fn size_reg_ea(self) -> (Size, u8, AddressingMode) {
        match self {
            Self::SizeRegEa(size, reg, am) => (size, reg, am),
            _ => panic!("expected size/register/ea operands"),
        }
    }

    pub fn move_operands(self) -> (Size, AddressingMode, AddressingMode) {
        match self {
            Self::Move(size, dst, src) => (size, dst, src),
            _ => panic!("expected MOVE operands"),
        }
    }

    pub fn exg_pair(self) -> (u8, Direction, u8) {
        match self {
            Self::ExgPair(rx, mode, ry) => (rx, mode, ry),
            _ => panic!("expected EXG operands"),
        }
    }

    pub fn ext_reg(self) -> (u8, u8) {
        match self {
            Self::ExtReg(opmode, reg) => (opmode, reg),
            _ => panic!("expected EXT operands"),
        }
    }

    pub fn trap_vector(self) -> u8 {
        match self {
            Self::TrapVector(vector) => vector,
            _ => panic!("expected TRAP operand"),
        }
    }

    pub fn reg_disp(self) -> (u8, i16) {
        match self {
            Self::RegDisp(reg, disp) => (reg, disp),
            _ => panic!("expected register/displacement operands"),
        }
    }

    pub fn reg(self) -> u8 {
        match self {
            Self::Reg(reg) => reg,
            _ => panic!("expected a register operand"),
        }
    }

    pub fn usp_reg(self) -> (Direction, u8) {
        match self {
            Self::UspReg(dir, reg) => (dir, reg),
            _ => panic!("expected MOVE USP operands"),
        }
    }

    pub fn movem(self) -> (Direction, Size, AddressingMode, u16) {
        match self {
            Self::Movem(dir, size, am, mask) => (dir, size, am, mask),
            _ => panic!("expected MOVEM operands"),
        }
    }

    pub fn quick_size_ea(self) -> (u8, Size, AddressingMode) {
        match self {
            Self::QuickSizeEa(data, size, am) => (data, size, am),
            _ => panic!("expected quick/size/ea operands"),
        }
    }

    pub fn cond_ea(self) -> (u8, AddressingMode) {
        match self {
            Self::CondEa(cc, am) => (cc, am),
            _ => panic!("expected condition/ea operands"),
        }
    }

    pub fn cond_reg_disp(self) -> (u8, u8, i16) {
        match self {
            Self::CondRegDisp(cc, reg, disp) => (cc, reg, disp),
            _ => panic!("expected DBcc operands"),
        }
    }

    pub fn disp(self) -> i16 {
        match self {
            Self::Disp(disp) => disp,
            _ => panic!("expected a displacement operand"),
        }
    }

    pub fn cond_disp(self) -> (u8, i16) {
        match self {
            Self::CondDisp(cc, disp) => (cc, disp),
            _ => panic!("expected condition/displacement operands"),
        }
    }

    pub fn move_quick(self) -> (u8, i8) {
        match self {
            Self::MoveQuick(reg, data) => (reg, data),
            _ => panic!("expected MOVEQ operands"),
        }
    }

    pub fn reg_dir_size_ea(self) -> (u8, Direction, Size, AddressingMode) {
        match self {
            Self::RegDirSizeEa(reg, dir, size, am) => (reg, dir, size, am),
            _ => panic!("expected register/direction/size/ea operands"),
        }
    }

    pub fn reg_size_ea(self) -> (u8, Size, AddressingMode) {
        match self {
            Self::RegSizeEa(reg, size, am) => (reg, size, am),
            _ => panic!("expected register/size/ea operands"),
        }
    }

    pub fn reg_size_mode_reg(self) -> (u8, Size, Direction, u8) {
        match self {
            Self::RegSizeModeReg(rx, size, mode, ry) => (rx, size, mode, ry),
            _ => panic!("expected register/size/mode/register operands"),
        }
    }

    pub fn reg_size_reg(self) -> (u8, Size, u8) {
        match self {
            Self::RegSizeReg(rx, size, ry) => (rx, size, ry),
            _ => panic!("expected CMPM operands"),
        }
    }

    pub fn shift_mem(self) -> (Direction, AddressingMode) {
        match self {
            Self::ShiftMem(dir, am) => (dir, am),
            _ => panic!("expected memory shift operands"),
        }
    }

    pub fn shift_reg(self) -> (u8, Direction, Size, bool, u8) {
        match self {
            Self::ShiftReg(count, dir, size, from_reg, reg) => (count, dir, size, from_reg, reg),
            _ => panic!("expected register shift operands"),
        }
    }
}

/// One decoded instruction: the opcode word, the address it was fetched from,
/// its handler identifier and its operands. Transient: produced by one fetch,
/// consumed by one execute or disassemble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u16,
    pub pc: u32,
    pub mnemonic: Mnemonic,
    pub operands: Operands,
}

impl Instruction {
    /// Decodes the instruction under the reader's cursor, leaving the cursor
    /// on the first byte past the extension words.
    pub fn decode<B: Bus + ?Sized>(r: &mut WordReader<'_, B>) -> Result<Self, u8> {
        let pc = r.addr;
        let opcode = r.next_word()?;
        let mnemonic = decoder::mnemonic(opcode);
        let operands = Operands::decode(mnemonic, opcode, r)?;
        log::trace!(target: "decode", "{pc:#X}: {opcode:04X} -> {mnemonic:?}");

        Ok(Self { opcode, pc, mnemonic, operands })
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", disassembler::render(self, &PlainFormatter))
    }
}
