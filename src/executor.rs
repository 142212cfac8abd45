// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-opcode semantics: operand access, result computation, flag updates
//! and trap raising.
//!
//! A handler either completes, leaving the register file and memory in the
//! architectural post-state, or returns the exception vector it raised. On a
//! raised vector no destination write has happened, which is what lets the
//! machine report the faulting instruction with its operands intact.

use crate::addressing::{AddressingMode, EffectiveAddress};
use crate::cpu::Cpu;
use crate::decoder::Mnemonic;
use crate::exception::{Vector, BUS_ERROR};
use crate::instruction::{Direction, Instruction, Size};
use crate::memory::Bus;
use crate::status_register::{CCR_MASK, SR_SYSTEM_MASK};
use crate::utils::{bit, Arith, Integer, IsEven};

/// Either the instruction completed, or it raised the contained vector.
pub(crate) type Exec = Result<(), u8>;

impl Cpu {
    pub(crate) fn execute<B: Bus + ?Sized>(&mut self, bus: &mut B, inst: &Instruction) -> Exec {
        use Mnemonic::*;

        let ops = inst.operands;
        // Branch displacements apply to the address just past the opcode word.
        let branch_base = inst.pc.wrapping_add(2);

        match inst.mnemonic {
            Unknown | Illegal => Err(Vector::IllegalInstruction as u8),
            LineA => Err(Vector::LineAEmulator as u8),
            LineF => Err(Vector::LineFEmulator as u8),

            Abcd => {
                let (dst, _, mode, src) = ops.reg_size_mode_reg();
                self.abcd(bus, dst, mode, src)
            },
            Add => {
                let (reg, dir, size, am) = ops.reg_dir_size_ea();
                self.add(bus, reg, dir, size, am)
            },
            Adda => {
                let (reg, size, am) = ops.reg_size_ea();
                self.adda(bus, reg, size, am)
            },
            Addi => {
                let (size, am, imm) = ops.size_ea_imm();
                self.addi(bus, size, am, imm)
            },
            Addq => {
                let (data, size, am) = ops.quick_size_ea();
                self.addq(bus, data, size, am)
            },
            Addx => {
                let (dst, size, mode, src) = ops.reg_size_mode_reg();
                self.addx(bus, dst, size, mode, src)
            },
            And => {
                let (reg, dir, size, am) = ops.reg_dir_size_ea();
                self.and(bus, reg, dir, size, am)
            },
            Andi => {
                let (size, am, imm) = ops.size_ea_imm();
                self.andi(bus, size, am, imm)
            },
            AndiToCcr => self.andi_to_ccr(ops.word()),
            AndiToSr => self.andi_to_sr(ops.word()),
            AsMem => {
                let (dir, am) = ops.shift_mem();
                self.as_mem(bus, dir, am)
            },
            AsReg => {
                let (count, dir, size, from_reg, reg) = ops.shift_reg();
                self.as_reg(count, dir, size, from_reg, reg)
            },
            Bcc => {
                let (cc, disp) = ops.cond_disp();
                self.bcc(branch_base, cc, disp)
            },
            Bchg => {
                let (am, count) = ops.bit_ea();
                self.bchg(bus, am, count)
            },
            Bclr => {
                let (am, count) = ops.bit_ea();
                self.bclr(bus, am, count)
            },
            Bra => self.bra(branch_base, ops.disp()),
            Bset => {
                let (am, count) = ops.bit_ea();
                self.bset(bus, am, count)
            },
            Bsr => self.bsr(bus, branch_base, ops.disp()),
            Btst => {
                let (am, count) = ops.bit_ea();
                self.btst(bus, am, count)
            },
            Chk => {
                let (reg, am) = ops.reg_ea();
                self.chk(bus, reg, am)
            },
            Clr => {
                let (size, am) = ops.size_ea();
                self.clr(bus, size, am)
            },
            Cmp => {
                let (reg, _, size, am) = ops.reg_dir_size_ea();
                self.cmp(bus, reg, size, am)
            },
            Cmpa => {
                let (reg, size, am) = ops.reg_size_ea();
                self.cmpa(bus, reg, size, am)
            },
            Cmpi => {
                let (size, am, imm) = ops.size_ea_imm();
                self.cmpi(bus, size, am, imm)
            },
            Cmpm => {
                let (dst, size, src) = ops.reg_size_reg();
                self.cmpm(bus, dst, size, src)
            },
            Dbcc => {
                let (cc, reg, disp) = ops.cond_reg_disp();
                self.dbcc(branch_base, cc, reg, disp)
            },
            Divs => {
                let (reg, am) = ops.reg_ea();
                self.divs(bus, reg, am)
            },
            Divu => {
                let (reg, am) = ops.reg_ea();
                self.divu(bus, reg, am)
            },
            Eor => {
                let (reg, _, size, am) = ops.reg_dir_size_ea();
                self.eor(bus, reg, size, am)
            },
            Eori => {
                let (size, am, imm) = ops.size_ea_imm();
                self.eori(bus, size, am, imm)
            },
            EoriToCcr => self.eori_to_ccr(ops.word()),
            EoriToSr => self.eori_to_sr(ops.word()),
            Exg => {
                let (rx, mode, ry) = ops.exg_pair();
                self.exg(rx, mode, ry)
            },
            Ext => {
                let (opmode, reg) = ops.ext_reg();
                self.ext(opmode, reg)
            },
            Jmp => self.jmp(ops.ea()),
            Jsr => self.jsr(bus, ops.ea()),
            Lea => {
                let (reg, am) = ops.reg_ea();
                self.lea(reg, am)
            },
            Link => {
                let (reg, disp) = ops.reg_disp();
                self.link(bus, reg, disp)
            },
            LsMem => {
                let (dir, am) = ops.shift_mem();
                self.ls_mem(bus, dir, am)
            },
            LsReg => {
                let (count, dir, size, from_reg, reg) = ops.shift_reg();
                self.ls_reg(count, dir, size, from_reg, reg)
            },
            Move => {
                let (size, dst, src) = ops.move_operands();
                self.move_data(bus, size, dst, src)
            },
            Movea => {
                let (size, reg, am) = ops.size_reg_ea();
                self.movea(bus, size, reg, am)
            },
            MoveFromSr => self.move_from_sr(bus, ops.ea()),
            MoveToCcr => self.move_to_ccr(bus, ops.ea()),
            MoveToSr => self.move_to_sr(bus, ops.ea()),
            MoveUsp => {
                let (dir, reg) = ops.usp_reg();
                self.move_usp(dir, reg)
            },
            Movem => {
                let (dir, size, am, mask) = ops.movem();
                self.movem(bus, dir, size, am, mask)
            },
            Movep => {
                let (dreg, dir, size, areg, disp) = ops.movep();
                self.movep(bus, dreg, dir, size, areg, disp)
            },
            Moveq => {
                let (reg, data) = ops.move_quick();
                self.moveq(reg, data)
            },
            Muls => {
                let (reg, am) = ops.reg_ea();
                self.muls(bus, reg, am)
            },
            Mulu => {
                let (reg, am) = ops.reg_ea();
                self.mulu(bus, reg, am)
            },
            Nbcd => self.nbcd(bus, ops.ea()),
            Neg => {
                let (size, am) = ops.size_ea();
                self.neg(bus, size, am)
            },
            Negx => {
                let (size, am) = ops.size_ea();
                self.negx(bus, size, am)
            },
            Nop => Ok(()),
            Not => {
                let (size, am) = ops.size_ea();
                self.not(bus, size, am)
            },
            Or => {
                let (reg, dir, size, am) = ops.reg_dir_size_ea();
                self.or(bus, reg, dir, size, am)
            },
            Ori => {
                let (size, am, imm) = ops.size_ea_imm();
                self.ori(bus, size, am, imm)
            },
            OriToCcr => self.ori_to_ccr(ops.word()),
            OriToSr => self.ori_to_sr(ops.word()),
            Pea => self.pea(bus, ops.ea()),
            Reset => self.reset_peripherals(bus),
            RoMem => {
                let (dir, am) = ops.shift_mem();
                self.ro_mem(bus, dir, am)
            },
            RoReg => {
                let (count, dir, size, from_reg, reg) = ops.shift_reg();
                self.ro_reg(count, dir, size, from_reg, reg)
            },
            RoxMem => {
                let (dir, am) = ops.shift_mem();
                self.rox_mem(bus, dir, am)
            },
            RoxReg => {
                let (count, dir, size, from_reg, reg) = ops.shift_reg();
                self.rox_reg(count, dir, size, from_reg, reg)
            },
            Rte => self.rte(bus),
            Rtr => self.rtr(bus),
            Rts => self.rts(bus),
            Sbcd => {
                let (dst, _, mode, src) = ops.reg_size_mode_reg();
                self.sbcd(bus, dst, mode, src)
            },
            Scc => {
                let (cc, am) = ops.cond_ea();
                self.scc(bus, cc, am)
            },
            Stop => self.stop(ops.word()),
            Sub => {
                let (reg, dir, size, am) = ops.reg_dir_size_ea();
                self.sub(bus, reg, dir, size, am)
            },
            Suba => {
                let (reg, size, am) = ops.reg_size_ea();
                self.suba(bus, reg, size, am)
            },
            Subi => {
                let (size, am, imm) = ops.size_ea_imm();
                self.subi(bus, size, am, imm)
            },
            Subq => {
                let (data, size, am) = ops.quick_size_ea();
                self.subq(bus, data, size, am)
            },
            Subx => {
                let (dst, size, mode, src) = ops.reg_size_mode_reg();
                self.subx(bus, dst, size, mode, src)
            },
            Swap => self.swap(ops.reg()),
            Tas => self.tas(bus, ops.ea()),
            Trap => Err(Vector::trap(ops.trap_vector())),
            Trapv => self.trapv(),
            Tst => {
                let (size, am) = ops.size_ea();
                self.tst(bus, size, am)
            },
            Unlk => self.unlk(bus, ops.reg()),
        }
    }

    fn check_supervisor(&self) -> Result<(), u8> {
        if self.regs.sr.s {
            Ok(())
        } else {
            Err(Vector::PrivilegeViolation as u8)
        }
    }

    // ----- operand access through an effective address -----

    fn read_ea_byte<B: Bus + ?Sized>(&mut self, bus: &mut B, ea: &mut EffectiveAddress) -> Result<u8, u8> {
        match ea.mode {
            AddressingMode::DataDirect(reg) => Ok(self.regs.d[reg as usize] as u8),
            AddressingMode::Immediate(imm) => Ok(imm as u8),
            _ => {
                let addr = self.effective_address(ea);
                bus.load_byte(addr).ok_or(BUS_ERROR)
            },
        }
    }

    fn read_ea_word<B: Bus + ?Sized>(&mut self, bus: &mut B, ea: &mut EffectiveAddress) -> Result<u16, u8> {
        match ea.mode {
            AddressingMode::DataDirect(reg) => Ok(self.regs.d[reg as usize] as u16),
            AddressingMode::AddressDirect(reg) => Ok(self.regs.a(reg) as u16),
            AddressingMode::Immediate(imm) => Ok(imm as u16),
            _ => {
                let addr = self.effective_address(ea).even()?;
                bus.load_word(addr).ok_or(BUS_ERROR)
            },
        }
    }

    fn read_ea_long<B: Bus + ?Sized>(&mut self, bus: &mut B, ea: &mut EffectiveAddress) -> Result<u32, u8> {
        match ea.mode {
            AddressingMode::DataDirect(reg) => Ok(self.regs.d[reg as usize]),
            AddressingMode::AddressDirect(reg) => Ok(self.regs.a(reg)),
            AddressingMode::Immediate(imm) => Ok(imm),
            _ => {
                let addr = self.effective_address(ea).even()?;
                bus.load_long(addr).ok_or(BUS_ERROR)
            },
        }
    }

    fn write_ea_byte<B: Bus + ?Sized>(&mut self, bus: &mut B, ea: &mut EffectiveAddress, value: u8) -> Exec {
        match ea.mode {
            AddressingMode::DataDirect(reg) => {
                self.regs.write_d_byte(reg, value);
                Ok(())
            },
            _ => {
                let addr = self.effective_address(ea);
                bus.store_byte(addr, value).ok_or(BUS_ERROR)
            },
        }
    }

    fn write_ea_word<B: Bus + ?Sized>(&mut self, bus: &mut B, ea: &mut EffectiveAddress, value: u16) -> Exec {
        match ea.mode {
            AddressingMode::DataDirect(reg) => {
                self.regs.write_d_word(reg, value);
                Ok(())
            },
            AddressingMode::AddressDirect(reg) => {
                *self.regs.a_mut(reg) = value as i16 as u32;
                Ok(())
            },
            _ => {
                let addr = self.effective_address(ea).even()?;
                bus.store_word(addr, value).ok_or(BUS_ERROR)
            },
        }
    }

    fn write_ea_long<B: Bus + ?Sized>(&mut self, bus: &mut B, ea: &mut EffectiveAddress, value: u32) -> Exec {
        match ea.mode {
            AddressingMode::DataDirect(reg) => {
                self.regs.d[reg as usize] = value;
                Ok(())
            },
            AddressingMode::AddressDirect(reg) => {
                *self.regs.a_mut(reg) = value;
                Ok(())
            },
            _ => {
                let addr = self.effective_address(ea).even()?;
                bus.store_long(addr, value).ok_or(BUS_ERROR)
            },
        }
    }

    // ----- stack access -----

    pub(crate) fn push_word<B: Bus + ?Sized>(&mut self, bus: &mut B, value: u16) -> Exec {
        let addr = self.pre_decrement(7, Size::Word);
        bus.store_word(addr.even()?, value).ok_or(BUS_ERROR)
    }

    pub(crate) fn push_long<B: Bus + ?Sized>(&mut self, bus: &mut B, value: u32) -> Exec {
        let addr = self.pre_decrement(7, Size::Long);
        bus.store_long(addr.even()?, value).ok_or(BUS_ERROR)
    }

    pub(crate) fn pop_word<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<u16, u8> {
        let addr = self.post_increment(7, Size::Word);
        bus.load_word(addr.even()?).ok_or(BUS_ERROR)
    }

    pub(crate) fn pop_long<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<u32, u8> {
        let addr = self.post_increment(7, Size::Long);
        bus.load_long(addr.even()?).ok_or(BUS_ERROR)
    }

    // ----- shared flag computations -----

    /// Addition with the full flag rule: X=C, N/V from the signed view. With
    /// `extend` the X flag is carried in and Z is only ever cleared.
    fn alu_add<U, S>(&mut self, dst: U, src: U, extend: bool) -> U
    where
        U: Arith<S>,
        S: Integer,
    {
        let carry_in = extend && self.regs.sr.x;
        let (signed, overflow) = dst.add_signed(src, carry_in);
        let (result, carry) = dst.add_unsigned(src, carry_in);

        self.regs.sr.x = carry;
        self.regs.sr.n = signed < S::ZERO;
        if extend {
            if signed != S::ZERO {
                self.regs.sr.z = false;
            }
        } else {
            self.regs.sr.z = signed == S::ZERO;
        }
        self.regs.sr.v = overflow;
        self.regs.sr.c = carry;

        result
    }

    /// `dst - src` with the subtraction flag rule. CMP runs with `update_x`
    /// off; NEGX/SUBX run with `extend` on (borrow-in and sticky Z).
    fn alu_sub<U, S>(&mut self, dst: U, src: U, extend: bool, update_x: bool) -> U
    where
        U: Arith<S>,
        S: Integer,
    {
        let borrow_in = extend && self.regs.sr.x;
        let (signed, overflow) = dst.sub_signed(src, borrow_in);
        let (result, borrow) = dst.sub_unsigned(src, borrow_in);

        if update_x {
            self.regs.sr.x = borrow;
        }
        self.regs.sr.n = signed < S::ZERO;
        if extend {
            if signed != S::ZERO {
                self.regs.sr.z = false;
            }
        } else {
            self.regs.sr.z = signed == S::ZERO;
        }
        self.regs.sr.v = overflow;
        self.regs.sr.c = borrow;

        result
    }

    /// Flag rule shared by the logical operations and the plain moves.
    fn logic_flags<U: Integer>(&mut self, result: U) {
        self.regs.sr.n = result & U::SIGN_BIT != U::ZERO;
        self.regs.sr.z = result == U::ZERO;
        self.regs.sr.v = false;
        self.regs.sr.c = false;
    }

    // ----- handlers -----

    fn abcd<B: Bus + ?Sized>(&mut self, bus: &mut B, dst_reg: u8, mode: Direction, src_reg: u8) -> Exec {
        let (src, dst) = if mode == Direction::MemToMem {
            let src_addr = self.pre_decrement(src_reg, Size::Byte);
            let dst_addr = self.pre_decrement(dst_reg, Size::Byte);
            (
                bus.load_byte(src_addr).ok_or(BUS_ERROR)? as u16,
                bus.load_byte(dst_addr).ok_or(BUS_ERROR)? as u16,
            )
        } else {
            (
                self.regs.d[src_reg as usize] as u8 as u16,
                self.regs.d[dst_reg as usize] as u8 as u16,
            )
        };

        let src = src + self.regs.sr.x as u16;
        let binary = src + dst;

        let mut result = (src & 0x0F) + (dst & 0x0F);
        if result >= 0x0A {
            result += 0x06;
        }
        result += (src & 0xF0) + (dst & 0xF0);
        if result >= 0xA0 {
            result += 0x60;
        }

        self.regs.sr.n = result & 0x80 != 0;
        if result as u8 != 0 {
            self.regs.sr.z = false;
        }
        self.regs.sr.v = src > 0x79u16.wrapping_sub(dst) && binary < 0x80;
        self.regs.sr.c = result >= 0x100;
        self.regs.sr.x = self.regs.sr.c;

        if mode == Direction::MemToMem {
            bus.store_byte(self.regs.a(dst_reg), result as u8).ok_or(BUS_ERROR)?;
        } else {
            self.regs.write_d_byte(dst_reg, result as u8);
        }
        Ok(())
    }

    fn add<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, dir: Direction, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let (src, dst) = if dir == Direction::DestEa {
                    (self.regs.d[reg as usize] as u8, self.read_ea_byte(bus, &mut ea)?)
                } else {
                    (self.read_ea_byte(bus, &mut ea)?, self.regs.d[reg as usize] as u8)
                };
                let result = self.alu_add::<u8, i8>(dst, src, false);
                if dir == Direction::DestEa {
                    self.write_ea_byte(bus, &mut ea, result)
                } else {
                    self.regs.write_d_byte(reg, result);
                    Ok(())
                }
            },
            Size::Word => {
                let (src, dst) = if dir == Direction::DestEa {
                    (self.regs.d[reg as usize] as u16, self.read_ea_word(bus, &mut ea)?)
                } else {
                    (self.read_ea_word(bus, &mut ea)?, self.regs.d[reg as usize] as u16)
                };
                let result = self.alu_add::<u16, i16>(dst, src, false);
                if dir == Direction::DestEa {
                    self.write_ea_word(bus, &mut ea, result)
                } else {
                    self.regs.write_d_word(reg, result);
                    Ok(())
                }
            },
            Size::Long => {
                let (src, dst) = if dir == Direction::DestEa {
                    (self.regs.d[reg as usize], self.read_ea_long(bus, &mut ea)?)
                } else {
                    (self.read_ea_long(bus, &mut ea)?, self.regs.d[reg as usize])
                };
                let result = self.alu_add::<u32, i32>(dst, src, false);
                if dir == Direction::DestEa {
                    self.write_ea_long(bus, &mut ea, result)
                } else {
                    self.regs.d[reg as usize] = result;
                    Ok(())
                }
            },
        }
    }

    fn adda<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        let src = if size.is_word() {
            self.read_ea_word(bus, &mut ea)? as i16 as u32
        } else {
            self.read_ea_long(bus, &mut ea)?
        };

        let a = self.regs.a_mut(reg);
        *a = a.wrapping_add(src);
        Ok(())
    }

    fn addi<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode, imm: u32) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let data = self.read_ea_byte(bus, &mut ea)?;
                let result = self.alu_add::<u8, i8>(data, imm as u8, false);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let data = self.read_ea_word(bus, &mut ea)?;
                let result = self.alu_add::<u16, i16>(data, imm as u16, false);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let data = self.read_ea_long(bus, &mut ea)?;
                let result = self.alu_add::<u32, i32>(data, imm, false);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn addq<B: Bus + ?Sized>(&mut self, bus: &mut B, data: u8, size: Size, am: AddressingMode) -> Exec {
        let imm = if data == 0 { 8 } else { data };

        // A whole address register is the destination, and no flags change.
        if let AddressingMode::AddressDirect(reg) = am {
            let a = self.regs.a_mut(reg);
            *a = a.wrapping_add(imm as u32);
            return Ok(());
        }

        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let dst = self.read_ea_byte(bus, &mut ea)?;
                let result = self.alu_add::<u8, i8>(dst, imm, false);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let dst = self.read_ea_word(bus, &mut ea)?;
                let result = self.alu_add::<u16, i16>(dst, imm as u16, false);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let dst = self.read_ea_long(bus, &mut ea)?;
                let result = self.alu_add::<u32, i32>(dst, imm as u32, false);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn addx<B: Bus + ?Sized>(&mut self, bus: &mut B, dst_reg: u8, size: Size, mode: Direction, src_reg: u8) -> Exec {
        match size {
            Size::Byte => {
                let (src, dst) = if mode == Direction::MemToMem {
                    let src_addr = self.pre_decrement(src_reg, size);
                    let dst_addr = self.pre_decrement(dst_reg, size);
                    (
                        bus.load_byte(src_addr).ok_or(BUS_ERROR)?,
                        bus.load_byte(dst_addr).ok_or(BUS_ERROR)?,
                    )
                } else {
                    (self.regs.d[src_reg as usize] as u8, self.regs.d[dst_reg as usize] as u8)
                };
                let result = self.alu_add::<u8, i8>(dst, src, true);
                if mode == Direction::MemToMem {
                    bus.store_byte(self.regs.a(dst_reg), result).ok_or(BUS_ERROR)
                } else {
                    self.regs.write_d_byte(dst_reg, result);
                    Ok(())
                }
            },
            Size::Word => {
                let (src, dst) = if mode == Direction::MemToMem {
                    let src_addr = self.pre_decrement(src_reg, size);
                    let dst_addr = self.pre_decrement(dst_reg, size);
                    (
                        bus.load_word(src_addr.even()?).ok_or(BUS_ERROR)?,
                        bus.load_word(dst_addr.even()?).ok_or(BUS_ERROR)?,
                    )
                } else {
                    (self.regs.d[src_reg as usize] as u16, self.regs.d[dst_reg as usize] as u16)
                };
                let result = self.alu_add::<u16, i16>(dst, src, true);
                if mode == Direction::MemToMem {
                    bus.store_word(self.regs.a(dst_reg), result).ok_or(BUS_ERROR)
                } else {
                    self.regs.write_d_word(dst_reg, result);
                    Ok(())
                }
            },
            Size::Long => {
                let (src, dst) = if mode == Direction::MemToMem {
                    let src_addr = self.pre_decrement(src_reg, size);
                    let dst_addr = self.pre_decrement(dst_reg, size);
                    (
                        bus.load_long(src_addr.even()?).ok_or(BUS_ERROR)?,
                        bus.load_long(dst_addr.even()?).ok_or(BUS_ERROR)?,
                    )
                } else {
                    (self.regs.d[src_reg as usize], self.regs.d[dst_reg as usize])
                };
                let result = self.alu_add::<u32, i32>(dst, src, true);
                if mode == Direction::MemToMem {
                    bus.store_long(self.regs.a(dst_reg), result).ok_or(BUS_ERROR)
                } else {
                    self.regs.d[dst_reg as usize] = result;
                    Ok(())
                }
            },
        }
    }

    fn and<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, dir: Direction, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let src = self.regs.d[reg as usize] as u8;
                let dst = self.read_ea_byte(bus, &mut ea)?;
                let result = dst & src;
                self.logic_flags(result);
                if dir == Direction::DestEa {
                    self.write_ea_byte(bus, &mut ea, result)
                } else {
                    self.regs.write_d_byte(reg, result);
                    Ok(())
                }
            },
            Size::Word => {
                let src = self.regs.d[reg as usize] as u16;
                let dst = self.read_ea_word(bus, &mut ea)?;
                let result = dst & src;
                self.logic_flags(result);
                if dir == Direction::DestEa {
                    self.write_ea_word(bus, &mut ea, result)
                } else {
                    self.regs.write_d_word(reg, result);
                    Ok(())
                }
            },
            Size::Long => {
                let src = self.regs.d[reg as usize];
                let dst = self.read_ea_long(bus, &mut ea)?;
                let result = dst & src;
                self.logic_flags(result);
                if dir == Direction::DestEa {
                    self.write_ea_long(bus, &mut ea, result)
                } else {
                    self.regs.d[reg as usize] = result;
                    Ok(())
                }
            },
        }
    }

    fn andi<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode, imm: u32) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let result = self.read_ea_byte(bus, &mut ea)? & imm as u8;
                self.logic_flags(result);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let result = self.read_ea_word(bus, &mut ea)? & imm as u16;
                self.logic_flags(result);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let result = self.read_ea_long(bus, &mut ea)? & imm;
                self.logic_flags(result);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn andi_to_ccr(&mut self, imm: u16) -> Exec {
        self.regs.sr &= SR_SYSTEM_MASK | imm;
        Ok(())
    }

    fn andi_to_sr(&mut self, imm: u16) -> Exec {
        self.check_supervisor()?;
        self.regs.sr &= imm;
        Ok(())
    }

    fn as_mem<B: Bus + ?Sized>(&mut self, bus: &mut B, dir: Direction, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let mut data = self.read_ea_word(bus, &mut ea)?;
        let sign = data & 0x8000;

        if dir == Direction::Left {
            data <<= 1;
            self.regs.sr.x = sign != 0;
            self.regs.sr.v = sign != data & 0x8000;
            self.regs.sr.c = sign != 0;
        } else {
            let low = data & 1;
            data = data >> 1 | sign;
            self.regs.sr.x = low != 0;
            self.regs.sr.v = false;
            self.regs.sr.c = low != 0;
        }

        self.regs.sr.n = data & 0x8000 != 0;
        self.regs.sr.z = data == 0;
        self.write_ea_word(bus, &mut ea, data)
    }

    fn as_reg(&mut self, count: u8, dir: Direction, size: Size, from_reg: bool, reg: u8) -> Exec {
        self.regs.sr.v = false;
        self.regs.sr.c = false;

        let shift = self.shift_count(count, from_reg);
        let (mut data, mask) = self.shift_value(size, reg);

        if dir == Direction::Left {
            for _ in 0..shift {
                let sign = data & mask;
                data <<= 1;
                self.regs.sr.x = sign != 0;
                self.regs.sr.c = sign != 0;
                if sign != data & mask {
                    self.regs.sr.v = true;
                }
            }
        } else {
            let sign = data & mask;
            for _ in 0..shift {
                let low = data & 1;
                data = data >> 1 | sign;
                self.regs.sr.x = low != 0;
                self.regs.sr.c = low != 0;
            }
        }

        self.commit_shift(size, reg, data, mask);
        Ok(())
    }

    fn bcc(&mut self, base: u32, cc: u8, disp: i16) -> Exec {
        if self.regs.sr.test(cc) {
            self.regs.pc = base.wrapping_add(disp as u32);
        }
        Ok(())
    }

    fn bchg<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode, mut count: u8) -> Exec {
        if bit(self.current_opcode, 8) {
            count = self.regs.d[count as usize] as u8;
        }

        if let AddressingMode::DataDirect(reg) = am {
            let mask = 1u32 << (count % 32);
            let reg = reg as usize;
            self.regs.sr.z = self.regs.d[reg] & mask == 0;
            self.regs.d[reg] ^= mask;
        } else {
            let mut ea = EffectiveAddress::new(am, Some(Size::Byte));
            let mask = 1u8 << (count % 8);
            let data = self.read_ea_byte(bus, &mut ea)?;
            self.regs.sr.z = data & mask == 0;
            self.write_ea_byte(bus, &mut ea, data ^ mask)?;
        }
        Ok(())
    }

    fn bclr<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode, mut count: u8) -> Exec {
        if bit(self.current_opcode, 8) {
            count = self.regs.d[count as usize] as u8;
        }

        if let AddressingMode::DataDirect(reg) = am {
            let mask = 1u32 << (count % 32);
            let reg = reg as usize;
            self.regs.sr.z = self.regs.d[reg] & mask == 0;
            self.regs.d[reg] &= !mask;
        } else {
            let mut ea = EffectiveAddress::new(am, Some(Size::Byte));
            let mask = 1u8 << (count % 8);
            let data = self.read_ea_byte(bus, &mut ea)?;
            self.regs.sr.z = data & mask == 0;
            self.write_ea_byte(bus, &mut ea, data & !mask)?;
        }
        Ok(())
    }

    fn bra(&mut self, base: u32, disp: i16) -> Exec {
        self.regs.pc = base.wrapping_add(disp as u32);
        Ok(())
    }

    fn bset<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode, mut count: u8) -> Exec {
        if bit(self.current_opcode, 8) {
            count = self.regs.d[count as usize] as u8;
        }

        if let AddressingMode::DataDirect(reg) = am {
            let mask = 1u32 << (count % 32);
            let reg = reg as usize;
            self.regs.sr.z = self.regs.d[reg] & mask == 0;
            self.regs.d[reg] |= mask;
        } else {
            let mut ea = EffectiveAddress::new(am, Some(Size::Byte));
            let mask = 1u8 << (count % 8);
            let data = self.read_ea_byte(bus, &mut ea)?;
            self.regs.sr.z = data & mask == 0;
            self.write_ea_byte(bus, &mut ea, data | mask)?;
        }
        Ok(())
    }

    fn bsr<B: Bus + ?Sized>(&mut self, bus: &mut B, base: u32, disp: i16) -> Exec {
        self.push_long(bus, self.regs.pc)?;
        self.regs.pc = base.wrapping_add(disp as u32);
        self.call_depth += 1;
        Ok(())
    }

    fn btst<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode, mut count: u8) -> Exec {
        if bit(self.current_opcode, 8) {
            count = self.regs.d[count as usize] as u8;
        }

        if let AddressingMode::DataDirect(reg) = am {
            self.regs.sr.z = self.regs.d[reg as usize] & 1 << (count % 32) == 0;
        } else {
            let mut ea = EffectiveAddress::new(am, Some(Size::Byte));
            let data = self.read_ea_byte(bus, &mut ea)?;
            self.regs.sr.z = data & 1 << (count % 8) == 0;
        }
        Ok(())
    }

    fn chk<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let bound = self.read_ea_word(bus, &mut ea)? as i16;
        let value = self.regs.d[reg as usize] as i16;

        if value < 0 {
            self.regs.sr.n = true;
            Err(Vector::ChkInstruction as u8)
        } else if value > bound {
            self.regs.sr.n = false;
            Err(Vector::ChkInstruction as u8)
        } else {
            Ok(())
        }
    }

    fn clr<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => self.write_ea_byte(bus, &mut ea, 0)?,
            Size::Word => self.write_ea_word(bus, &mut ea, 0)?,
            Size::Long => self.write_ea_long(bus, &mut ea, 0)?,
        }

        self.regs.sr.n = false;
        self.regs.sr.z = true;
        self.regs.sr.v = false;
        self.regs.sr.c = false;
        Ok(())
    }

    fn cmp<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let src = self.read_ea_byte(bus, &mut ea)?;
                self.alu_sub::<u8, i8>(self.regs.d[reg as usize] as u8, src, false, false);
            },
            Size::Word => {
                let src = self.read_ea_word(bus, &mut ea)?;
                self.alu_sub::<u16, i16>(self.regs.d[reg as usize] as u16, src, false, false);
            },
            Size::Long => {
                let src = self.read_ea_long(bus, &mut ea)?;
                self.alu_sub::<u32, i32>(self.regs.d[reg as usize], src, false, false);
            },
        }
        Ok(())
    }

    fn cmpa<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        let src = if size.is_word() {
            self.read_ea_word(bus, &mut ea)? as i16 as u32
        } else {
            self.read_ea_long(bus, &mut ea)?
        };

        self.alu_sub::<u32, i32>(self.regs.a(reg), src, false, false);
        Ok(())
    }

    fn cmpi<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode, imm: u32) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let data = self.read_ea_byte(bus, &mut ea)?;
                self.alu_sub::<u8, i8>(data, imm as u8, false, false);
            },
            Size::Word => {
                let data = self.read_ea_word(bus, &mut ea)?;
                self.alu_sub::<u16, i16>(data, imm as u16, false, false);
            },
            Size::Long => {
                let data = self.read_ea_long(bus, &mut ea)?;
                self.alu_sub::<u32, i32>(data, imm, false, false);
            },
        }
        Ok(())
    }

    fn cmpm<B: Bus + ?Sized>(&mut self, bus: &mut B, dst_reg: u8, size: Size, src_reg: u8) -> Exec {
        let src_addr = self.post_increment(src_reg, size);
        let dst_addr = self.post_increment(dst_reg, size);

        match size {
            Size::Byte => {
                let src = bus.load_byte(src_addr).ok_or(BUS_ERROR)?;
                let dst = bus.load_byte(dst_addr).ok_or(BUS_ERROR)?;
                self.alu_sub::<u8, i8>(dst, src, false, false);
            },
            Size::Word => {
                let src = bus.load_word(src_addr.even()?).ok_or(BUS_ERROR)?;
                let dst = bus.load_word(dst_addr.even()?).ok_or(BUS_ERROR)?;
                self.alu_sub::<u16, i16>(dst, src, false, false);
            },
            Size::Long => {
                let src = bus.load_long(src_addr.even()?).ok_or(BUS_ERROR)?;
                let dst = bus.load_long(dst_addr.even()?).ok_or(BUS_ERROR)?;
                self.alu_sub::<u32, i32>(dst, src, false, false);
            },
        }
        Ok(())
    }

    fn dbcc(&mut self, base: u32, cc: u8, reg: u8, disp: i16) -> Exec {
        if !self.regs.sr.test(cc) {
            let counter = (self.regs.d[reg as usize] as i16).wrapping_sub(1);
            self.regs.write_d_word(reg, counter as u16);
            if counter != -1 {
                self.regs.pc = base.wrapping_add(disp as u32);
            }
        }
        Ok(())
    }

    fn divs<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let src = self.read_ea_word(bus, &mut ea)? as i16 as i32;
        let dst = self.regs.d[reg as usize] as i32;

        if src == 0 {
            return Err(Vector::ZeroDivide as u8);
        }

        let quotient = dst.wrapping_div(src);
        let remainder = dst.wrapping_rem(src);

        // Overflow leaves the destination and the N/Z flags untouched.
        if quotient < i16::MIN as i32 || quotient > i16::MAX as i32 {
            self.regs.sr.v = true;
            self.regs.sr.c = false;
        } else {
            self.regs.d[reg as usize] = (remainder as u16 as u32) << 16 | quotient as u16 as u32;
            self.regs.sr.n = quotient < 0;
            self.regs.sr.z = quotient == 0;
            self.regs.sr.v = false;
            self.regs.sr.c = false;
        }
        Ok(())
    }

    fn divu<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let src = self.read_ea_word(bus, &mut ea)? as u32;
        let dst = self.regs.d[reg as usize];

        if src == 0 {
            return Err(Vector::ZeroDivide as u8);
        }

        let quotient = dst / src;
        let remainder = dst % src;

        if quotient > u16::MAX as u32 {
            self.regs.sr.v = true;
            self.regs.sr.c = false;
        } else {
            self.regs.d[reg as usize] = (remainder as u16 as u32) << 16 | quotient;
            self.regs.sr.n = quotient & 0x8000 != 0;
            self.regs.sr.z = quotient == 0;
            self.regs.sr.v = false;
            self.regs.sr.c = false;
        }
        Ok(())
    }

    fn eor<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let result = self.read_ea_byte(bus, &mut ea)? ^ self.regs.d[reg as usize] as u8;
                self.logic_flags(result);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let result = self.read_ea_word(bus, &mut ea)? ^ self.regs.d[reg as usize] as u16;
                self.logic_flags(result);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let result = self.read_ea_long(bus, &mut ea)? ^ self.regs.d[reg as usize];
                self.logic_flags(result);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn eori<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode, imm: u32) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let result = self.read_ea_byte(bus, &mut ea)? ^ imm as u8;
                self.logic_flags(result);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let result = self.read_ea_word(bus, &mut ea)? ^ imm as u16;
                self.logic_flags(result);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let result = self.read_ea_long(bus, &mut ea)? ^ imm;
                self.logic_flags(result);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn eori_to_ccr(&mut self, imm: u16) -> Exec {
        self.regs.sr ^= imm & CCR_MASK;
        Ok(())
    }

    fn eori_to_sr(&mut self, imm: u16) -> Exec {
        self.check_supervisor()?;
        self.regs.sr ^= imm;
        Ok(())
    }

    fn exg(&mut self, rx: u8, mode: Direction, ry: u8) -> Exec {
        match mode {
            Direction::SwapData => self.regs.d.swap(rx as usize, ry as usize),
            Direction::SwapAddress => {
                let y = self.regs.a(ry);
                *self.regs.a_mut(ry) = self.regs.a(rx);
                *self.regs.a_mut(rx) = y;
            },
            _ => {
                let y = self.regs.a(ry);
                *self.regs.a_mut(ry) = self.regs.d[rx as usize];
                self.regs.d[rx as usize] = y;
            },
        }
        Ok(())
    }

    fn ext(&mut self, opmode: u8, reg: u8) -> Exec {
        if opmode == 0b010 {
            let word = self.regs.d[reg as usize] as i8 as i16 as u16;
            self.regs.write_d_word(reg, word);
            self.logic_flags(word);
        } else {
            let long = self.regs.d[reg as usize] as i16 as i32 as u32;
            self.regs.d[reg as usize] = long;
            self.logic_flags(long);
        }
        Ok(())
    }

    fn jmp(&mut self, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, None);
        self.regs.pc = self.effective_address(&mut ea);
        Ok(())
    }

    fn jsr<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, None);
        let target = self.effective_address(&mut ea);
        self.push_long(bus, self.regs.pc)?;
        self.regs.pc = target;
        self.call_depth += 1;
        Ok(())
    }

    fn lea(&mut self, reg: u8, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, None);
        *self.regs.a_mut(reg) = self.effective_address(&mut ea);
        Ok(())
    }

    fn link<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, disp: i16) -> Exec {
        self.push_long(bus, self.regs.a(reg))?;
        *self.regs.a_mut(reg) = self.regs.sp();
        let sp = self.regs.sp_mut();
        *sp = sp.wrapping_add(disp as u32);
        Ok(())
    }

    fn ls_mem<B: Bus + ?Sized>(&mut self, bus: &mut B, dir: Direction, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let mut data = self.read_ea_word(bus, &mut ea)?;

        if dir == Direction::Left {
            let sign = data & 0x8000;
            data <<= 1;
            self.regs.sr.x = sign != 0;
            self.regs.sr.c = sign != 0;
        } else {
            let low = data & 1;
            data >>= 1;
            self.regs.sr.x = low != 0;
            self.regs.sr.c = low != 0;
        }

        self.regs.sr.n = data & 0x8000 != 0;
        self.regs.sr.z = data == 0;
        self.regs.sr.v = false;
        self.write_ea_word(bus, &mut ea, data)
    }

    fn ls_reg(&mut self, count: u8, dir: Direction, size: Size, from_reg: bool, reg: u8) -> Exec {
        self.regs.sr.v = false;
        self.regs.sr.c = false;

        let shift = self.shift_count(count, from_reg);
        let (mut data, mask) = self.shift_value(size, reg);

        if dir == Direction::Left {
            for _ in 0..shift {
                let sign = data & mask;
                data <<= 1;
                self.regs.sr.x = sign != 0;
                self.regs.sr.c = sign != 0;
            }
        } else {
            for _ in 0..shift {
                let low = data & 1;
                data >>= 1;
                self.regs.sr.x = low != 0;
                self.regs.sr.c = low != 0;
            }
        }

        self.commit_shift(size, reg, data, mask);
        Ok(())
    }

    fn move_data<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, dst: AddressingMode, src: AddressingMode) -> Exec {
        let mut src = EffectiveAddress::new(src, Some(size));
        let mut dst = EffectiveAddress::new(dst, Some(size));

        match size {
            Size::Byte => {
                let data = self.read_ea_byte(bus, &mut src)?;
                self.logic_flags(data);
                self.write_ea_byte(bus, &mut dst, data)
            },
            Size::Word => {
                let data = self.read_ea_word(bus, &mut src)?;
                self.logic_flags(data);
                self.write_ea_word(bus, &mut dst, data)
            },
            Size::Long => {
                let data = self.read_ea_long(bus, &mut src)?;
                self.logic_flags(data);
                self.write_ea_long(bus, &mut dst, data)
            },
        }
    }

    fn movea<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, reg: u8, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        *self.regs.a_mut(reg) = if size.is_word() {
            self.read_ea_word(bus, &mut ea)? as i16 as u32
        } else {
            self.read_ea_long(bus, &mut ea)?
        };
        Ok(())
    }

    fn move_from_sr<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        self.write_ea_word(bus, &mut ea, self.regs.sr.into())
    }

    fn move_to_ccr<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let value = self.read_ea_word(bus, &mut ea)?;
        self.regs.sr.set_ccr(value);
        Ok(())
    }

    fn move_to_sr<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode) -> Exec {
        self.check_supervisor()?;
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let value = self.read_ea_word(bus, &mut ea)?;
        self.regs.sr = value.into();
        Ok(())
    }

    fn move_usp(&mut self, dir: Direction, reg: u8) -> Exec {
        self.check_supervisor()?;
        if dir == Direction::UspToReg {
            *self.regs.a_mut(reg) = self.regs.usp;
        } else {
            self.regs.usp = self.regs.a(reg);
        }
        Ok(())
    }

    fn movem<B: Bus + ?Sized>(&mut self, bus: &mut B, dir: Direction, size: Size, am: AddressingMode, mut mask: u16) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));
        let step = size as u32;
        let ea_reg = am.register().unwrap_or(u8::MAX);

        if am.is_pre_decrement() {
            // Registers to memory with the mask reversed: bit 0 names A7.
            let mut addr = self.regs.a(ea_reg);

            for reg in (0..8u8).rev() {
                if mask & 1 != 0 {
                    addr = addr.wrapping_sub(step);
                    if size.is_word() {
                        bus.store_word(addr.even()?, self.regs.a(reg) as u16).ok_or(BUS_ERROR)?;
                    } else {
                        bus.store_long(addr.even()?, self.regs.a(reg)).ok_or(BUS_ERROR)?;
                    }
                }
                mask >>= 1;
            }
            for reg in (0..8).rev() {
                if mask & 1 != 0 {
                    addr = addr.wrapping_sub(step);
                    if size.is_word() {
                        bus.store_word(addr.even()?, self.regs.d[reg] as u16).ok_or(BUS_ERROR)?;
                    } else {
                        bus.store_long(addr.even()?, self.regs.d[reg]).ok_or(BUS_ERROR)?;
                    }
                }
                mask >>= 1;
            }

            *self.regs.a_mut(ea_reg) = addr;
            return Ok(());
        }

        // Post-increment applies its side effect over the whole transfer, so
        // resolve it by hand instead of through the one-step helper.
        let mut addr = if am.is_post_increment() {
            self.regs.a(ea_reg)
        } else {
            self.effective_address(&mut ea)
        };

        for reg in 0..8 {
            if mask & 1 != 0 {
                if dir == Direction::ToRegister {
                    self.regs.d[reg] = if size.is_word() {
                        bus.load_word(addr.even()?).ok_or(BUS_ERROR)? as i16 as u32
                    } else {
                        bus.load_long(addr.even()?).ok_or(BUS_ERROR)?
                    };
                } else if size.is_word() {
                    bus.store_word(addr.even()?, self.regs.d[reg] as u16).ok_or(BUS_ERROR)?;
                } else {
                    bus.store_long(addr.even()?, self.regs.d[reg]).ok_or(BUS_ERROR)?;
                }
                addr = addr.wrapping_add(step);
            }
            mask >>= 1;
        }
        for reg in 0..8u8 {
            if mask & 1 != 0 {
                if dir == Direction::ToRegister {
                    *self.regs.a_mut(reg) = if size.is_word() {
                        bus.load_word(addr.even()?).ok_or(BUS_ERROR)? as i16 as u32
                    } else {
                        bus.load_long(addr.even()?).ok_or(BUS_ERROR)?
                    };
                } else if size.is_word() {
                    bus.store_word(addr.even()?, self.regs.a(reg) as u16).ok_or(BUS_ERROR)?;
                } else {
                    bus.store_long(addr.even()?, self.regs.a(reg)).ok_or(BUS_ERROR)?;
                }
                addr = addr.wrapping_add(step);
            }
            mask >>= 1;
        }

        if am.is_post_increment() {
            *self.regs.a_mut(ea_reg) = addr;
        }
        Ok(())
    }

    fn movep<B: Bus + ?Sized>(&mut self, bus: &mut B, dreg: u8, dir: Direction, size: Size, areg: u8, disp: i16) -> Exec {
        let mut shift: i32 = if size.is_word() { 8 } else { 24 };
        let mut addr = self.regs.a(areg).wrapping_add(disp as u32);

        if dir == Direction::ToMemory {
            while shift >= 0 {
                let byte = (self.regs.d[dreg as usize] >> shift) as u8;
                bus.store_byte(addr, byte).ok_or(BUS_ERROR)?;
                shift -= 8;
                addr = addr.wrapping_add(2);
            }
        } else {
            if size.is_word() {
                self.regs.d[dreg as usize] &= 0xFFFF_0000;
            } else {
                self.regs.d[dreg as usize] = 0;
            }
            while shift >= 0 {
                let byte = bus.load_byte(addr).ok_or(BUS_ERROR)? as u32;
                self.regs.d[dreg as usize] |= byte << shift;
                shift -= 8;
                addr = addr.wrapping_add(2);
            }
        }
        Ok(())
    }

    fn moveq(&mut self, reg: u8, data: i8) -> Exec {
        self.regs.d[reg as usize] = data as u32;
        self.logic_flags(data as u32);
        Ok(())
    }

    fn muls<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let src = self.read_ea_word(bus, &mut ea)? as i16 as i32;
        let dst = self.regs.d[reg as usize] as i16 as i32;

        let result = src.wrapping_mul(dst) as u32;
        self.regs.d[reg as usize] = result;
        self.logic_flags(result);
        Ok(())
    }

    fn mulu<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let src = self.read_ea_word(bus, &mut ea)? as u32;
        let dst = self.regs.d[reg as usize] as u16 as u32;

        let result = src.wrapping_mul(dst);
        self.regs.d[reg as usize] = result;
        self.logic_flags(result);
        Ok(())
    }

    fn nbcd<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Byte));
        let data = self.read_ea_byte(bus, &mut ea)?;

        let mut result = 0u8.wrapping_sub(data).wrapping_sub(self.regs.sr.x as u8);
        if result != 0 {
            result = result.wrapping_sub(0x60);
        }
        if result & 0x0F != 0 {
            result = result.wrapping_sub(0x06);
        }

        self.regs.sr.n = result & 0x80 != 0;
        if result != 0 {
            self.regs.sr.z = false;
        }
        self.regs.sr.v = result != 0 && result & 0x80 == 0 && data <= 0x80;
        self.regs.sr.c = result != 0;
        self.regs.sr.x = self.regs.sr.c;

        self.write_ea_byte(bus, &mut ea, result)
    }

    fn neg<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let data = self.read_ea_byte(bus, &mut ea)?;
                let result = self.alu_sub::<u8, i8>(0, data, false, true);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let data = self.read_ea_word(bus, &mut ea)?;
                let result = self.alu_sub::<u16, i16>(0, data, false, true);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let data = self.read_ea_long(bus, &mut ea)?;
                let result = self.alu_sub::<u32, i32>(0, data, false, true);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn negx<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let data = self.read_ea_byte(bus, &mut ea)?;
                let result = self.alu_sub::<u8, i8>(0, data, true, true);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let data = self.read_ea_word(bus, &mut ea)?;
                let result = self.alu_sub::<u16, i16>(0, data, true, true);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let data = self.read_ea_long(bus, &mut ea)?;
                let result = self.alu_sub::<u32, i32>(0, data, true, true);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn not<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let result = !self.read_ea_byte(bus, &mut ea)?;
                self.logic_flags(result);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let result = !self.read_ea_word(bus, &mut ea)?;
                self.logic_flags(result);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let result = !self.read_ea_long(bus, &mut ea)?;
                self.logic_flags(result);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn or<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, dir: Direction, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let result = self.read_ea_byte(bus, &mut ea)? | self.regs.d[reg as usize] as u8;
                self.logic_flags(result);
                if dir == Direction::DestEa {
                    self.write_ea_byte(bus, &mut ea, result)
                } else {
                    self.regs.write_d_byte(reg, result);
                    Ok(())
                }
            },
            Size::Word => {
                let result = self.read_ea_word(bus, &mut ea)? | self.regs.d[reg as usize] as u16;
                self.logic_flags(result);
                if dir == Direction::DestEa {
                    self.write_ea_word(bus, &mut ea, result)
                } else {
                    self.regs.write_d_word(reg, result);
                    Ok(())
                }
            },
            Size::Long => {
                let result = self.read_ea_long(bus, &mut ea)? | self.regs.d[reg as usize];
                self.logic_flags(result);
                if dir == Direction::DestEa {
                    self.write_ea_long(bus, &mut ea, result)
                } else {
                    self.regs.d[reg as usize] = result;
                    Ok(())
                }
            },
        }
    }

    fn ori<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode, imm: u32) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let result = self.read_ea_byte(bus, &mut ea)? | imm as u8;
                self.logic_flags(result);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let result = self.read_ea_word(bus, &mut ea)? | imm as u16;
                self.logic_flags(result);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let result = self.read_ea_long(bus, &mut ea)? | imm;
                self.logic_flags(result);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn ori_to_ccr(&mut self, imm: u16) -> Exec {
        self.regs.sr |= imm & CCR_MASK;
        Ok(())
    }

    fn ori_to_sr(&mut self, imm: u16) -> Exec {
        self.check_supervisor()?;
        self.regs.sr |= imm;
        Ok(())
    }

    fn pea<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, None);
        let addr = self.effective_address(&mut ea);
        self.push_long(bus, addr)
    }

    fn reset_peripherals<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Exec {
        self.check_supervisor()?;
        bus.reset_line();
        Ok(())
    }

    fn ro_mem<B: Bus + ?Sized>(&mut self, bus: &mut B, dir: Direction, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let mut data = self.read_ea_word(bus, &mut ea)?;

        if dir == Direction::Left {
            data = data.rotate_left(1);
            self.regs.sr.c = data & 1 != 0;
        } else {
            self.regs.sr.c = data & 1 != 0;
            data = data.rotate_right(1);
        }

        self.regs.sr.n = data & 0x8000 != 0;
        self.regs.sr.z = data == 0;
        self.regs.sr.v = false;
        self.write_ea_word(bus, &mut ea, data)
    }

    fn ro_reg(&mut self, count: u8, dir: Direction, size: Size, from_reg: bool, reg: u8) -> Exec {
        self.regs.sr.v = false;
        self.regs.sr.c = false;

        let shift = self.shift_count(count, from_reg);
        let (mut data, mask) = self.shift_value(size, reg);

        if dir == Direction::Left {
            for _ in 0..shift {
                let sign = data & mask;
                data <<= 1;
                if sign != 0 {
                    data |= 1;
                }
                self.regs.sr.c = sign != 0;
            }
        } else {
            for _ in 0..shift {
                let low = data & 1;
                data >>= 1;
                if low != 0 {
                    data |= mask;
                }
                self.regs.sr.c = low != 0;
            }
        }

        self.commit_shift(size, reg, data, mask);
        Ok(())
    }

    fn rox_mem<B: Bus + ?Sized>(&mut self, bus: &mut B, dir: Direction, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Word));
        let mut data = self.read_ea_word(bus, &mut ea)?;

        if dir == Direction::Left {
            let sign = data & 0x8000;
            data = data << 1 | self.regs.sr.x as u16;
            self.regs.sr.x = sign != 0;
            self.regs.sr.c = sign != 0;
        } else {
            let low = data & 1;
            data >>= 1;
            if self.regs.sr.x {
                data |= 0x8000;
            }
            self.regs.sr.x = low != 0;
            self.regs.sr.c = low != 0;
        }

        self.regs.sr.n = data & 0x8000 != 0;
        self.regs.sr.z = data == 0;
        self.regs.sr.v = false;
        self.write_ea_word(bus, &mut ea, data)
    }

    fn rox_reg(&mut self, count: u8, dir: Direction, size: Size, from_reg: bool, reg: u8) -> Exec {
        self.regs.sr.v = false;
        // A rotate-through-X by zero still loads C from X.
        self.regs.sr.c = self.regs.sr.x;

        let shift = self.shift_count(count, from_reg);
        let (mut data, mask) = self.shift_value(size, reg);

        if dir == Direction::Left {
            for _ in 0..shift {
                let sign = data & mask;
                data = data << 1 | self.regs.sr.x as u32;
                self.regs.sr.x = sign != 0;
                self.regs.sr.c = sign != 0;
            }
        } else {
            for _ in 0..shift {
                let low = data & 1;
                data >>= 1;
                if self.regs.sr.x {
                    data |= mask;
                }
                self.regs.sr.x = low != 0;
                self.regs.sr.c = low != 0;
            }
        }

        self.commit_shift(size, reg, data, mask);
        Ok(())
    }

    fn rte<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Exec {
        self.check_supervisor()?;
        let sr = self.pop_word(bus)?;
        self.regs.pc = self.pop_long(bus)?;
        self.regs.sr = sr.into();
        Ok(())
    }

    fn rtr<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Exec {
        let ccr = self.pop_word(bus)?;
        self.regs.sr.set_ccr(ccr);
        self.regs.pc = self.pop_long(bus)?;
        Ok(())
    }

    fn rts<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Exec {
        self.regs.pc = self.pop_long(bus)?;
        self.call_depth -= 1;
        Ok(())
    }

    fn sbcd<B: Bus + ?Sized>(&mut self, bus: &mut B, dst_reg: u8, mode: Direction, src_reg: u8) -> Exec {
        let (src, dst) = if mode == Direction::MemToMem {
            let src_addr = self.pre_decrement(src_reg, Size::Byte);
            let dst_addr = self.pre_decrement(dst_reg, Size::Byte);
            (
                bus.load_byte(src_addr).ok_or(BUS_ERROR)?,
                bus.load_byte(dst_addr).ok_or(BUS_ERROR)?,
            )
        } else {
            (self.regs.d[src_reg as usize] as u8, self.regs.d[dst_reg as usize] as u8)
        };

        let src = src.wrapping_add(self.regs.sr.x as u8);
        let binary = (dst as u16).wrapping_sub(src as u16);

        let mut result = (dst & 0x0F).wrapping_sub(src & 0x0F);
        if result >= 0x0A {
            result = result.wrapping_sub(0x06);
        }
        result = result.wrapping_add((dst & 0xF0).wrapping_sub(src & 0xF0));
        if result >= 0xA0 || binary > 0x99 {
            result = result.wrapping_sub(0x60);
        }

        self.regs.sr.n = result & 0x80 != 0;
        if result != 0 {
            self.regs.sr.z = false;
        }
        self.regs.sr.v = result < 0x80 && binary > 0x99;
        self.regs.sr.c = src > dst;
        self.regs.sr.x = self.regs.sr.c;

        if mode == Direction::MemToMem {
            bus.store_byte(self.regs.a(dst_reg), result).ok_or(BUS_ERROR)?;
        } else {
            self.regs.write_d_byte(dst_reg, result);
        }
        Ok(())
    }

    fn scc<B: Bus + ?Sized>(&mut self, bus: &mut B, cc: u8, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Byte));
        let value = if self.regs.sr.test(cc) { 0xFF } else { 0x00 };
        self.write_ea_byte(bus, &mut ea, value)
    }

    fn stop(&mut self, imm: u16) -> Exec {
        self.check_supervisor()?;
        self.regs.sr = imm.into();
        self.stopped = true;
        Ok(())
    }

    fn sub<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, dir: Direction, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let (src, dst) = if dir == Direction::DestEa {
                    (self.regs.d[reg as usize] as u8, self.read_ea_byte(bus, &mut ea)?)
                } else {
                    (self.read_ea_byte(bus, &mut ea)?, self.regs.d[reg as usize] as u8)
                };
                let result = self.alu_sub::<u8, i8>(dst, src, false, true);
                if dir == Direction::DestEa {
                    self.write_ea_byte(bus, &mut ea, result)
                } else {
                    self.regs.write_d_byte(reg, result);
                    Ok(())
                }
            },
            Size::Word => {
                let (src, dst) = if dir == Direction::DestEa {
                    (self.regs.d[reg as usize] as u16, self.read_ea_word(bus, &mut ea)?)
                } else {
                    (self.read_ea_word(bus, &mut ea)?, self.regs.d[reg as usize] as u16)
                };
                let result = self.alu_sub::<u16, i16>(dst, src, false, true);
                if dir == Direction::DestEa {
                    self.write_ea_word(bus, &mut ea, result)
                } else {
                    self.regs.write_d_word(reg, result);
                    Ok(())
                }
            },
            Size::Long => {
                let (src, dst) = if dir == Direction::DestEa {
                    (self.regs.d[reg as usize], self.read_ea_long(bus, &mut ea)?)
                } else {
                    (self.read_ea_long(bus, &mut ea)?, self.regs.d[reg as usize])
                };
                let result = self.alu_sub::<u32, i32>(dst, src, false, true);
                if dir == Direction::DestEa {
                    self.write_ea_long(bus, &mut ea, result)
                } else {
                    self.regs.d[reg as usize] = result;
                    Ok(())
                }
            },
        }
    }

    fn suba<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        let src = if size.is_word() {
            self.read_ea_word(bus, &mut ea)? as i16 as u32
        } else {
            self.read_ea_long(bus, &mut ea)?
        };

        let a = self.regs.a_mut(reg);
        *a = a.wrapping_sub(src);
        Ok(())
    }

    fn subi<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode, imm: u32) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let data = self.read_ea_byte(bus, &mut ea)?;
                let result = self.alu_sub::<u8, i8>(data, imm as u8, false, true);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let data = self.read_ea_word(bus, &mut ea)?;
                let result = self.alu_sub::<u16, i16>(data, imm as u16, false, true);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let data = self.read_ea_long(bus, &mut ea)?;
                let result = self.alu_sub::<u32, i32>(data, imm, false, true);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn subq<B: Bus + ?Sized>(&mut self, bus: &mut B, data: u8, size: Size, am: AddressingMode) -> Exec {
        let imm = if data == 0 { 8 } else { data };

        if let AddressingMode::AddressDirect(reg) = am {
            let a = self.regs.a_mut(reg);
            *a = a.wrapping_sub(imm as u32);
            return Ok(());
        }

        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let dst = self.read_ea_byte(bus, &mut ea)?;
                let result = self.alu_sub::<u8, i8>(dst, imm, false, true);
                self.write_ea_byte(bus, &mut ea, result)
            },
            Size::Word => {
                let dst = self.read_ea_word(bus, &mut ea)?;
                let result = self.alu_sub::<u16, i16>(dst, imm as u16, false, true);
                self.write_ea_word(bus, &mut ea, result)
            },
            Size::Long => {
                let dst = self.read_ea_long(bus, &mut ea)?;
                let result = self.alu_sub::<u32, i32>(dst, imm as u32, false, true);
                self.write_ea_long(bus, &mut ea, result)
            },
        }
    }

    fn subx<B: Bus + ?Sized>(&mut self, bus: &mut B, dst_reg: u8, size: Size, mode: Direction, src_reg: u8) -> Exec {
        match size {
            Size::Byte => {
                let (src, dst) = if mode == Direction::MemToMem {
                    let src_addr = self.pre_decrement(src_reg, size);
                    let dst_addr = self.pre_decrement(dst_reg, size);
                    (
                        bus.load_byte(src_addr).ok_or(BUS_ERROR)?,
                        bus.load_byte(dst_addr).ok_or(BUS_ERROR)?,
                    )
                } else {
                    (self.regs.d[src_reg as usize] as u8, self.regs.d[dst_reg as usize] as u8)
                };
                let result = self.alu_sub::<u8, i8>(dst, src, true, true);
                if mode == Direction::MemToMem {
                    bus.store_byte(self.regs.a(dst_reg), result).ok_or(BUS_ERROR)
                } else {
                    self.regs.write_d_byte(dst_reg, result);
                    Ok(())
                }
            },
            Size::Word => {
                let (src, dst) = if mode == Direction::MemToMem {
                    let src_addr = self.pre_decrement(src_reg, size);
                    let dst_addr = self.pre_decrement(dst_reg, size);
                    (
                        bus.load_word(src_addr.even()?).ok_or(BUS_ERROR)?,
                        bus.load_word(dst_addr.even()?).ok_or(BUS_ERROR)?,
                    )
                } else {
                    (self.regs.d[src_reg as usize] as u16, self.regs.d[dst_reg as usize] as u16)
                };
                let result = self.alu_sub::<u16, i16>(dst, src, true, true);
                if mode == Direction::MemToMem {
                    bus.store_word(self.regs.a(dst_reg), result).ok_or(BUS_ERROR)
                } else {
                    self.regs.write_d_word(dst_reg, result);
                    Ok(())
                }
            },
            Size::Long => {
                let (src, dst) = if mode == Direction::MemToMem {
                    let src_addr = self.pre_decrement(src_reg, size);
                    let dst_addr = self.pre_decrement(dst_reg, size);
                    (
                        bus.load_long(src_addr.even()?).ok_or(BUS_ERROR)?,
                        bus.load_long(dst_addr.even()?).ok_or(BUS_ERROR)?,
                    )
                } else {
                    (self.regs.d[src_reg as usize], self.regs.d[dst_reg as usize])
                };
                let result = self.alu_sub::<u32, i32>(dst, src, true, true);
                if mode == Direction::MemToMem {
                    bus.store_long(self.regs.a(dst_reg), result).ok_or(BUS_ERROR)
                } else {
                    self.regs.d[dst_reg as usize] = result;
                    Ok(())
                }
            },
        }
    }

    fn swap(&mut self, reg: u8) -> Exec {
        let result = self.regs.d[reg as usize].rotate_left(16);
        self.regs.d[reg as usize] = result;
        self.logic_flags(result);
        Ok(())
    }

    fn tas<B: Bus + ?Sized>(&mut self, bus: &mut B, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(Size::Byte));
        let data = self.read_ea_byte(bus, &mut ea)?;
        self.logic_flags(data);
        self.write_ea_byte(bus, &mut ea, data | 0x80)
    }

    fn trapv(&self) -> Exec {
        if self.regs.sr.v {
            Err(Vector::TrapvInstruction as u8)
        } else {
            Ok(())
        }
    }

    fn tst<B: Bus + ?Sized>(&mut self, bus: &mut B, size: Size, am: AddressingMode) -> Exec {
        let mut ea = EffectiveAddress::new(am, Some(size));

        match size {
            Size::Byte => {
                let data = self.read_ea_byte(bus, &mut ea)?;
                self.logic_flags(data);
            },
            Size::Word => {
                let data = self.read_ea_word(bus, &mut ea)?;
                self.logic_flags(data);
            },
            Size::Long => {
                let data = self.read_ea_long(bus, &mut ea)?;
                self.logic_flags(data);
            },
        }
        Ok(())
    }

    fn unlk<B: Bus + ?Sized>(&mut self, bus: &mut B, reg: u8) -> Exec {
        *self.regs.sp_mut() = self.regs.a(reg);
        *self.regs.a_mut(reg) = self.pop_long(bus)?;
        Ok(())
    }

    // ----- shift helpers -----

    /// Immediate counts encode 8 as 0; register counts are taken modulo 64.
    fn shift_count(&self, count: u8, from_reg: bool) -> u8 {
        if from_reg {
            (self.regs.d[count as usize] % 64) as u8
        } else if count == 0 {
            8
        } else {
            count
        }
    }

    /// The operand widened to u32 plus its sign-bit mask.
    fn shift_value(&self, size: Size, reg: u8) -> (u32, u32) {
        let d = self.regs.d[reg as usize];
        match size {
            Size::Byte => (d & 0xFF, 0x80),
            Size::Word => (d & 0xFFFF, 0x8000),
            Size::Long => (d, 0x8000_0000),
        }
    }

    /// Writes a shift result back at the operand width and derives N and Z
    /// from the in-range bits (left shifts may carry garbage above them).
    fn commit_shift(&mut self, size: Size, reg: u8, data: u32, mask: u32) {
        self.regs.sr.n = data & mask != 0;
        match size {
            Size::Byte => {
                self.regs.write_d_byte(reg, data as u8);
                self.regs.sr.z = data & 0xFF == 0;
            },
            Size::Word => {
                self.regs.write_d_word(reg, data as u16);
                self.regs.sr.z = data & 0xFFFF == 0;
            },
            Size::Long => {
                self.regs.d[reg as usize] = data;
                self.regs.sr.z = data == 0;
            },
        }
    }
}
