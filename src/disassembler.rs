// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disassembly: instruction rendering, non-executable sections and the
//! alternating instruction/directive scan.
//!
//! Output follows VASM conventions: the mnemonic starts at column 0, the
//! operand field at the 8-column tab stop (spaces only), sizes as `.B/.W/.L`
//! suffixes, small and negative displacements in decimal and everything else
//! in hex. Absolute addresses and code targets go through a
//! [DisasmFormatter], so a host can substitute symbol names.

use crate::addressing::AddressingMode;
use crate::decoder::Mnemonic;
use crate::instruction::{Direction, Instruction};
use crate::memory::{Bus, Debugger, WordReader};
use crate::status_register::condition_name;
use crate::utils::bit;

use std::rc::Rc;

/// Maps addresses in operands to display text. The default renders plain hex
/// literals; hosts override to map addresses to symbols.
pub trait DisasmFormatter {
    /// An absolute address operand.
    fn absolute(&self, addr: u32) -> String {
        format!("${addr:X}")
    }

    /// A code target: branch destinations and PC-relative operands.
    fn code_label(&self, addr: u32) -> String {
        format!("${addr:X}")
    }
}

/// The built-in formatter: plain hex everywhere.
pub struct PlainFormatter;

impl DisasmFormatter for PlainFormatter {}

/// Puts the operand field at the tab stop.
fn with_operands(mnemonic: &str, operands: &str) -> String {
    if operands.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{mnemonic:<8}{operands}")
    }
}

/// Small and negative displacements read better in decimal.
fn disp_str(value: i32) -> String {
    if value < 10 {
        format!("{value}")
    } else {
        format!("${value:X}")
    }
}

fn imm_str(value: u32) -> String {
    if value < 10 {
        format!("#{value}")
    } else {
        format!("#${value:X}")
    }
}

/// Renders one addressing mode as an operand.
fn ea_str(am: AddressingMode, f: &dyn DisasmFormatter) -> String {
    match am {
        AddressingMode::DataDirect(reg) => format!("D{reg}"),
        AddressingMode::AddressDirect(reg) => format!("A{reg}"),
        AddressingMode::AddressIndirect(reg) => format!("(A{reg})"),
        AddressingMode::PostIncrement(reg) => format!("(A{reg})+"),
        AddressingMode::PreDecrement(reg) => format!("-(A{reg})"),
        AddressingMode::AddressDisplacement(reg, disp) => {
            format!("{}(A{reg})", disp_str(disp as i32))
        },
        AddressingMode::AddressIndexed(reg, index) => {
            format!("{}(A{reg},{index})", disp_str(index.displacement() as i32))
        },
        AddressingMode::AbsoluteShort(addr) => {
            format!("({}).W", f.absolute(addr as i16 as u32))
        },
        AddressingMode::AbsoluteLong(addr) => format!("({}).L", f.absolute(addr)),
        AddressingMode::PcDisplacement(base, disp) => {
            format!("{}(PC)", f.code_label(base.wrapping_add(disp as u32)))
        },
        AddressingMode::PcIndexed(base, index) => {
            let target = base.wrapping_add(index.displacement() as u32);
            format!("{}(PC,{index})", f.code_label(target))
        },
        AddressingMode::Immediate(imm) => imm_str(imm),
    }
}

/// Renders a MOVEM register mask as range lists, `D0-D2/D5/A1-A7` style.
/// In the predecrement encoding the mask is bit-reversed (A7 first).
fn register_list(mask: u16, reversed: bool) -> String {
    let mask = if reversed { mask.reverse_bits() } else { mask };
    let mut parts: Vec<String> = Vec::new();

    for (bank, base) in [("D", 0u16), ("A", 8)] {
        let mut reg = 0u16;
        while reg < 8 {
            if mask & 1 << (base + reg) != 0 {
                let first = reg;
                while reg + 1 < 8 && mask & 1 << (base + reg + 1) != 0 {
                    reg += 1;
                }
                if first == reg {
                    parts.push(format!("{bank}{first}"));
                } else {
                    parts.push(format!("{bank}{first}-{bank}{reg}"));
                }
            }
            reg += 1;
        }
    }

    parts.join("/")
}

/// Renders a decoded instruction as assembler text.
pub fn render(inst: &Instruction, f: &dyn DisasmFormatter) -> String {
    use Mnemonic::*;

    let ops = inst.operands;
    // Byte-embedded branch displacements assemble as short branches.
    let branch_suffix = if inst.opcode as u8 == 0 { ".W" } else { ".S" };
    let branch_target = |disp: i16| f.code_label(inst.pc.wrapping_add(2).wrapping_add(disp as u32));

    match inst.mnemonic {
        Unknown | LineA | LineF => with_operands("DC.W", &format!("${:04X}", inst.opcode)),
        Illegal => "ILLEGAL".into(),
        Nop => "NOP".into(),
        Reset => "RESET".into(),
        Rte => "RTE".into(),
        Rtr => "RTR".into(),
        Rts => "RTS".into(),
        Trapv => "TRAPV".into(),

        Abcd | Sbcd => {
            let (dst, _, mode, src) = ops.reg_size_mode_reg();
            let name = if inst.mnemonic == Abcd { "ABCD" } else { "SBCD" };
            if mode == Direction::MemToMem {
                with_operands(name, &format!("-(A{src}),-(A{dst})"))
            } else {
                with_operands(name, &format!("D{src},D{dst}"))
            }
        },

        Add | And | Or | Sub => {
            let (reg, dir, size, am) = ops.reg_dir_size_ea();
            let name = match inst.mnemonic {
                Add => "ADD",
                And => "AND",
                Or => "OR",
                _ => "SUB",
            };
            if dir == Direction::DestEa {
                with_operands(&format!("{name}.{size}"), &format!("D{reg},{}", ea_str(am, f)))
            } else {
                with_operands(&format!("{name}.{size}"), &format!("{},D{reg}", ea_str(am, f)))
            }
        },

        Adda | Cmpa | Suba => {
            let (reg, size, am) = ops.reg_size_ea();
            let name = match inst.mnemonic {
                Adda => "ADDA",
                Cmpa => "CMPA",
                _ => "SUBA",
            };
            with_operands(&format!("{name}.{size}"), &format!("{},A{reg}", ea_str(am, f)))
        },

        Addi | Andi | Cmpi | Eori | Ori | Subi => {
            let (size, am, imm) = ops.size_ea_imm();
            let name = match inst.mnemonic {
                Addi => "ADDI",
                Andi => "ANDI",
                Cmpi => "CMPI",
                Eori => "EORI",
                Ori => "ORI",
                _ => "SUBI",
            };
            with_operands(&format!("{name}.{size}"), &format!("{},{}", imm_str(imm), ea_str(am, f)))
        },

        Addq | Subq => {
            let (data, size, am) = ops.quick_size_ea();
            let data = if data == 0 { 8 } else { data };
            let name = if inst.mnemonic == Addq { "ADDQ" } else { "SUBQ" };
            with_operands(&format!("{name}.{size}"), &format!("#{data},{}", ea_str(am, f)))
        },

        Addx | Subx => {
            let (dst, size, mode, src) = ops.reg_size_mode_reg();
            let name = if inst.mnemonic == Addx { "ADDX" } else { "SUBX" };
            if mode == Direction::MemToMem {
                with_operands(&format!("{name}.{size}"), &format!("-(A{src}),-(A{dst})"))
            } else {
                with_operands(&format!("{name}.{size}"), &format!("D{src},D{dst}"))
            }
        },

        AndiToCcr => with_operands("ANDI", &format!("{},CCR", imm_str(ops.word() as u32))),
        AndiToSr => with_operands("ANDI", &format!("{},SR", imm_str(ops.word() as u32))),
        EoriToCcr => with_operands("EORI", &format!("{},CCR", imm_str(ops.word() as u32))),
        EoriToSr => with_operands("EORI", &format!("{},SR", imm_str(ops.word() as u32))),
        OriToCcr => with_operands("ORI", &format!("{},CCR", imm_str(ops.word() as u32))),
        OriToSr => with_operands("ORI", &format!("{},SR", imm_str(ops.word() as u32))),

        AsMem | LsMem | RoMem | RoxMem => {
            let (dir, am) = ops.shift_mem();
            let name = match inst.mnemonic {
                AsMem => "AS",
                LsMem => "LS",
                RoMem => "RO",
                _ => "ROX",
            };
            let dir = if dir == Direction::Left { "L" } else { "R" };
            with_operands(&format!("{name}{dir}"), &ea_str(am, f))
        },

        AsReg | LsReg | RoReg | RoxReg => {
            let (count, dir, size, from_reg, reg) = ops.shift_reg();
            let name = match inst.mnemonic {
                AsReg => "AS",
                LsReg => "LS",
                RoReg => "RO",
                _ => "ROX",
            };
            let dir = if dir == Direction::Left { "L" } else { "R" };
            if from_reg {
                with_operands(&format!("{name}{dir}.{size}"), &format!("D{count},D{reg}"))
            } else {
                let count = if count == 0 { 8 } else { count };
                with_operands(&format!("{name}{dir}.{size}"), &format!("#{count},D{reg}"))
            }
        },

        Bra | Bsr => {
            let name = if inst.mnemonic == Bra { "BRA" } else { "BSR" };
            with_operands(&format!("{name}{branch_suffix}"), &branch_target(ops.disp()))
        },

        Bcc => {
            let (cc, disp) = ops.cond_disp();
            with_operands(&format!("B{}{branch_suffix}", condition_name(cc)), &branch_target(disp))
        },

        Bchg | Bclr | Bset | Btst => {
            let (am, count) = ops.bit_ea();
            let name = match inst.mnemonic {
                Bchg => "BCHG",
                Bclr => "BCLR",
                Bset => "BSET",
                _ => "BTST",
            };
            if bit(inst.opcode, 8) {
                with_operands(name, &format!("D{count},{}", ea_str(am, f)))
            } else {
                with_operands(name, &format!("#{count},{}", ea_str(am, f)))
            }
        },

        Chk => {
            let (reg, am) = ops.reg_ea();
            with_operands("CHK.W", &format!("{},D{reg}", ea_str(am, f)))
        },

        Clr | Neg | Negx | Not | Tst => {
            let (size, am) = ops.size_ea();
            let name = match inst.mnemonic {
                Clr => "CLR",
                Neg => "NEG",
                Negx => "NEGX",
                Not => "NOT",
                _ => "TST",
            };
            with_operands(&format!("{name}.{size}"), &ea_str(am, f))
        },

        Cmp => {
            let (reg, _, size, am) = ops.reg_dir_size_ea();
            with_operands(&format!("CMP.{size}"), &format!("{},D{reg}", ea_str(am, f)))
        },

        Cmpm => {
            let (dst, size, src) = ops.reg_size_reg();
            with_operands(&format!("CMPM.{size}"), &format!("(A{src})+,(A{dst})+"))
        },

        Dbcc => {
            let (cc, reg, disp) = ops.cond_reg_disp();
            with_operands(
                &format!("DB{}", condition_name(cc)),
                &format!("D{reg},{}", branch_target(disp)),
            )
        },

        Divs => {
            let (reg, am) = ops.reg_ea();
            with_operands("DIVS.W", &format!("{},D{reg}", ea_str(am, f)))
        },
        Divu => {
            let (reg, am) = ops.reg_ea();
            with_operands("DIVU.W", &format!("{},D{reg}", ea_str(am, f)))
        },
        Muls => {
            let (reg, am) = ops.reg_ea();
            with_operands("MULS.W", &format!("{},D{reg}", ea_str(am, f)))
        },
        Mulu => {
            let (reg, am) = ops.reg_ea();
            with_operands("MULU.W", &format!("{},D{reg}", ea_str(am, f)))
        },

        Eor => {
            let (reg, _, size, am) = ops.reg_dir_size_ea();
            with_operands(&format!("EOR.{size}"), &format!("D{reg},{}", ea_str(am, f)))
        },

        Exg => {
            let (rx, mode, ry) = ops.exg_pair();
            let operands = match mode {
                Direction::SwapData => format!("D{rx},D{ry}"),
                Direction::SwapAddress => format!("A{rx},A{ry}"),
                _ => format!("D{rx},A{ry}"),
            };
            with_operands("EXG", &operands)
        },

        Ext => {
            let (opmode, reg) = ops.ext_reg();
            let size = if opmode == 0b010 { "W" } else { "L" };
            with_operands(&format!("EXT.{size}"), &format!("D{reg}"))
        },

        Jmp => with_operands("JMP", &ea_str(ops.ea(), f)),
        Jsr => with_operands("JSR", &ea_str(ops.ea(), f)),
        Pea => with_operands("PEA", &ea_str(ops.ea(), f)),
        Nbcd => with_operands("NBCD", &ea_str(ops.ea(), f)),
        Tas => with_operands("TAS", &ea_str(ops.ea(), f)),

        Lea => {
            let (reg, am) = ops.reg_ea();
            with_operands("LEA", &format!("{},A{reg}", ea_str(am, f)))
        },

        Link => {
            let (reg, disp) = ops.reg_disp();
            with_operands("LINK", &format!("A{reg},#{disp}"))
        },

        Move => {
            let (size, dst, src) = ops.move_operands();
            with_operands(&format!("MOVE.{size}"), &format!("{},{}", ea_str(src, f), ea_str(dst, f)))
        },

        Movea => {
            let (size, reg, am) = ops.size_reg_ea();
            with_operands(&format!("MOVEA.{size}"), &format!("{},A{reg}", ea_str(am, f)))
        },

        MoveFromSr => with_operands("MOVE", &format!("SR,{}", ea_str(ops.ea(), f))),
        MoveToCcr => with_operands("MOVE", &format!("{},CCR", ea_str(ops.ea(), f))),
        MoveToSr => with_operands("MOVE", &format!("{},SR", ea_str(ops.ea(), f))),

        MoveUsp => {
            let (dir, reg) = ops.usp_reg();
            if dir == Direction::UspToReg {
                with_operands("MOVE", &format!("USP,A{reg}"))
            } else {
                with_operands("MOVE", &format!("A{reg},USP"))
            }
        },

        Movem => {
            let (dir, size, am, mask) = ops.movem();
            let list = register_list(mask, am.is_pre_decrement());
            if dir == Direction::ToRegister {
                with_operands(&format!("MOVEM.{size}"), &format!("{},{list}", ea_str(am, f)))
            } else {
                with_operands(&format!("MOVEM.{size}"), &format!("{list},{}", ea_str(am, f)))
            }
        },

        Movep => {
            let (dreg, dir, size, areg, disp) = ops.movep();
            let mem = format!("{}(A{areg})", disp_str(disp as i32));
            if dir == Direction::ToMemory {
                with_operands(&format!("MOVEP.{size}"), &format!("D{dreg},{mem}"))
            } else {
                with_operands(&format!("MOVEP.{size}"), &format!("{mem},D{dreg}"))
            }
        },

        Moveq => {
            let (reg, data) = ops.move_quick();
            with_operands("MOVEQ", &format!("#{data},D{reg}"))
        },

        Scc => {
            let (cc, am) = ops.cond_ea();
            with_operands(&format!("S{}", condition_name(cc)), &ea_str(am, f))
        },

        Stop => with_operands("STOP", &format!("#${:X}", ops.word())),

        Swap => with_operands("SWAP", &format!("D{}", ops.reg())),
        Unlk => with_operands("UNLK", &format!("A{}", ops.reg())),

        Trap => with_operands("TRAP", &format!("#{}", ops.trap_vector())),
    }
}

/// Element size hint of a non-executable section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    /// Words on even addresses, bytes otherwise.
    Auto,
    Byte,
    Word,
    Long,
}

impl SectionKind {
    fn element_size(self, addr: u32) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Long => 4,
            Self::Auto => {
                if addr & 1 == 0 {
                    2
                } else {
                    1
                }
            },
        }
    }

    fn directive(element: u32) -> &'static str {
        match element {
            1 => "DC.B",
            2 => "DC.W",
            _ => "DC.L",
        }
    }
}

/// A half-open byte range `[start, end)` the scanner renders as data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Section {
    pub start: u32,
    pub end: u32,
    pub kind: SectionKind,
}

impl Section {
    pub fn new(start: u32, end: u32, kind: SectionKind) -> Self {
        Self { start, end, kind }
    }
}

/// The set of non-executable sections, kept sorted and pairwise disjoint.
///
/// An added range displaces whatever it overlaps; adjacent ranges of the same
/// kind merge. Removal handles the four overlap shapes (containment, split,
/// truncate low, truncate high) by carving.
#[derive(Clone, Debug, Default)]
pub struct SectionSet {
    sections: Vec<Section>,
}

impl SectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, section: Section) {
        if section.start >= section.end {
            return;
        }
        self.remove_range(section.start, section.end);
        self.sections.push(section);
        self.normalize();
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Removes `[start, end)` from every section, splitting or truncating as
    /// needed.
    pub fn remove_range(&mut self, start: u32, end: u32) {
        let mut kept = Vec::with_capacity(self.sections.len() + 1);
        for s in self.sections.drain(..) {
            if s.end <= start || s.start >= end {
                kept.push(s);
                continue;
            }
            if s.start < start {
                kept.push(Section::new(s.start, start, s.kind));
            }
            if s.end > end {
                kept.push(Section::new(end, s.end, s.kind));
            }
        }
        self.sections = kept;
        self.normalize();
    }

    pub fn find(&self, addr: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.start <= addr && addr < s.end)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    fn normalize(&mut self) {
        self.sections.sort_by_key(|s| s.start);
        let mut merged: Vec<Section> = Vec::with_capacity(self.sections.len());
        for s in self.sections.drain(..) {
            if let Some(last) = merged.last_mut() {
                if last.kind == s.kind && last.end >= s.start {
                    last.end = last.end.max(s.end);
                    continue;
                }
            }
            merged.push(s);
        }
        self.sections = merged;
    }
}

/// One line of a disassembly listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub address: u32,
    /// Number of bytes the line covers.
    pub length: u32,
    pub text: String,
}

/// A disassembler: the section set plus the formatter the rendering uses.
///
/// It runs over the machine's memory through its own cursor, so the CPU's
/// execution state is never touched.
pub struct Disassembler {
    pub sections: SectionSet,
    formatter: Box<dyn DisasmFormatter>,
}

impl Disassembler {
    pub fn new() -> Self {
        Self::with_formatter(Box::new(PlainFormatter))
    }

    pub fn with_formatter(formatter: Box<dyn DisasmFormatter>) -> Self {
        Self { sections: SectionSet::new(), formatter }
    }

    pub fn set_formatter(&mut self, formatter: Box<dyn DisasmFormatter>) {
        self.formatter = formatter;
    }

    /// Produces `length` bytes worth of listing starting at `start`,
    /// alternating between data directives inside non-executable sections
    /// and decoded instructions outside them. The observer, when present, is
    /// polled between records for cancellation and UI events.
    pub fn scan<B: Bus + ?Sized>(
        &self,
        bus: &mut B,
        start: u32,
        length: u32,
        observer: Option<&Rc<dyn Debugger>>,
    ) -> Vec<Line> {
        let limit = start as u64 + length as u64;
        let mut lines = Vec::new();
        let mut addr = start;

        while (addr as u64) < limit {
            if let Some(observer) = observer {
                if observer.cancelling() {
                    log::debug!(target: "disasm", "scan cancelled at {addr:#X}");
                    break;
                }
                observer.do_events();
            }

            let line = if let Some(section) = self.sections.find(addr) {
                self.data_line(bus, addr, section, limit)
            } else {
                let mut reader = WordReader::unaligned(bus, addr);
                match Instruction::decode(&mut reader) {
                    Ok(inst) => Line {
                        address: addr,
                        length: reader.addr.wrapping_sub(addr),
                        text: render(&inst, self.formatter.as_ref()),
                    },
                    // Unreadable memory ends the listing.
                    Err(_) => break,
                }
            };

            addr = addr.wrapping_add(line.length);
            lines.push(line);
        }

        lines
    }

    /// One `DC.B/DC.W/DC.L` directive of at most 4 bytes, bounded by the
    /// section end and the requested scan length, with the raw bytes echoed
    /// as a printable-ASCII comment.
    fn data_line<B: Bus + ?Sized>(&self, bus: &mut B, addr: u32, section: &Section, limit: u64) -> Line {
        let mut element = section.kind.element_size(addr);
        let available = (section.end as u64).min(limit).saturating_sub(addr as u64) as u32;
        if available < element {
            element = 1;
        }
        let count = (available.min(4) / element).max(1);

        let mut bytes = Vec::with_capacity((count * element) as usize);
        for i in 0..count * element {
            bytes.push(bus.load_byte(addr.wrapping_add(i)).unwrap_or(0));
        }

        let items: Vec<String> = bytes
            .chunks(element as usize)
            .map(|chunk| {
                let value = chunk.iter().fold(0u32, |acc, b| acc << 8 | *b as u32);
                match element {
                    1 => format!("${value:02X}"),
                    2 => format!("${value:04X}"),
                    _ => format!("${value:08X}"),
                }
            })
            .collect();

        let ascii: String = bytes
            .iter()
            .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '.' })
            .collect();

        let text = format!("{:<8}{:<24}; {}", SectionKind::directive(element), items.join(","), ascii);

        Line { address: addr, length: bytes.len() as u32, text }
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new()
    }
}
