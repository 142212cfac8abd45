// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listing output: instruction rendering, non-executable sections and the
//! debugger hooks around a scan.

use emu68k::disassembler::{DisasmFormatter, Section, SectionKind};
use emu68k::{Debugger, Machine, MachineConfig};

use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::rc::Rc;

fn machine_with(program: &[u8]) -> Machine {
    let mut machine = Machine::with_config(MachineConfig {
        memory_size: 0x1_0000,
        ..MachineConfig::default()
    });
    machine.load_executable(program, 0x1000, false).unwrap();
    machine
}

fn texts(machine: &mut Machine, start: u32, length: u32) -> Vec<String> {
    machine
        .disassemble(start, length)
        .into_iter()
        .map(|line| line.text)
        .collect()
}

#[test]
fn renders_common_instructions() {
    let mut m = machine_with(&[
        0x70, 0x01, // MOVEQ #1,D0
        0x32, 0x18, // MOVE.W (A0)+,D1
        0x06, 0x00, 0x00, 0xFF, // ADDI.B #$FF,D0
        0x4E, 0x75, // RTS
        0x61, 0x00, 0x00, 0x04, // BSR.W $1010
        0x67, 0xFE, // BEQ.S $100E
        0x4E, 0x71, // NOP
    ]);

    assert_eq!(
        texts(&mut m, 0x1000, 18),
        vec![
            "MOVEQ   #1,D0",
            "MOVE.W  (A0)+,D1",
            "ADDI.B  #$FF,D0",
            "RTS",
            "BSR.W   $1010",
            "BEQ.S   $100E",
            "NOP",
        ]
    );
}

#[test]
fn renders_every_addressing_mode() {
    let mut m = machine_with(&[
        0x30, 0x00, // MOVE.W D0,D0
        0x30, 0x08, // MOVE.W A0,D0
        0x30, 0x10, // MOVE.W (A0),D0
        0x30, 0x18, // MOVE.W (A0)+,D0
        0x30, 0x20, // MOVE.W -(A0),D0
        0x30, 0x28, 0xFF, 0xFC, // MOVE.W -4(A0),D0
        0x30, 0x30, 0x10, 0x7F, // MOVE.W $7F(A0,D1.W),D0
        0x30, 0x38, 0x20, 0x00, // MOVE.W ($2000).W,D0
        0x30, 0x39, 0x00, 0x00, 0x20, 0x00, // MOVE.W ($2000).L,D0
        0x30, 0x3A, 0x00, 0x10, // MOVE.W $12(PC),D0
        0x30, 0x3B, 0x28, 0x10, // MOVE.W $14(PC,D2.L),D0
        0x30, 0x3C, 0x00, 0x2A, // MOVE.W #42,D0
    ]);

    assert_eq!(
        texts(&mut m, 0x1000, 40),
        vec![
            "MOVE.W  D0,D0",
            "MOVE.W  A0,D0",
            "MOVE.W  (A0),D0",
            "MOVE.W  (A0)+,D0",
            "MOVE.W  -(A0),D0",
            "MOVE.W  -4(A0),D0",
            "MOVE.W  $7F(A0,D1.W),D0",
            "MOVE.W  ($2000).W,D0",
            "MOVE.W  ($2000).L,D0",
            "MOVE.W  $102E(PC),D0",
            "MOVE.W  $1032(PC,D2.L),D0",
            "MOVE.W  #$2A,D0",
        ]
    );
}

#[test]
fn renders_register_lists_and_system_operands() {
    let mut m = machine_with(&[
        0x48, 0xE7, 0xE0, 0x80, // MOVEM.L D0-D2/A0,-(A7)
        0x4C, 0xDF, 0x01, 0x07, // MOVEM.L (A7)+,D0-D2/A0
        0x46, 0xFC, 0x27, 0x00, // MOVE #$2700,SR
        0x40, 0xC0, // MOVE SR,D0
        0x4E, 0x60, // MOVE A0,USP
        0x4E, 0x72, 0x27, 0x00, // STOP #$2700
        0x4E, 0x45, // TRAP #5
        0x51, 0xC8, 0xFF, 0xFE, // DBF D0,$1016
        0xE5, 0x41, // ASL.W #2,D1
        0xE0, 0x39, // ROR.B D0,D1
    ]);

    assert_eq!(
        texts(&mut m, 0x1000, 30),
        vec![
            "MOVEM.L D0-D2/A0,-(A7)",
            "MOVEM.L (A7)+,D0-D2/A0",
            "MOVE    #$2700,SR",
            "MOVE    SR,D0",
            "MOVE    A0,USP",
            "STOP    #$2700",
            "TRAP    #5",
            "DBF     D0,$1016",
            "ASL.W   #2,D1",
            "ROR.B   D0,D1",
        ]
    );
}

#[test]
fn unknown_words_render_as_data() {
    let mut m = machine_with(&[0xA1, 0x23, 0xF8, 0x42, 0x4A, 0xFC]);
    assert_eq!(
        texts(&mut m, 0x1000, 6),
        vec!["DC.W    $A123", "DC.W    $F842", "ILLEGAL"]
    );
}

#[test]
fn sections_alternate_with_code() {
    let mut m = machine_with(&[0x70, 0x01, 0x4E, 0x75]);
    m.load_data(b"Hi!\0", 0x1004, false).unwrap();
    m.load_data(&[0x4E, 0x71], 0x1008, false).unwrap();
    m.disassembler.sections.add(Section::new(0x1004, 0x1008, SectionKind::Byte));

    let lines = m.disassemble(0x1000, 10);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0].text, "MOVEQ   #1,D0");
    assert_eq!(lines[1].text, "RTS");
    assert_eq!(lines[2].address, 0x1004);
    assert_eq!(lines[2].length, 4);
    assert_eq!(lines[2].text, "DC.B    $48,$69,$21,$00         ; Hi!.");
    assert_eq!(lines[3].text, "NOP");
}

#[test]
fn directives_split_on_section_and_scan_bounds() {
    let mut m = machine_with(&[]);
    m.load_data(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99], 0x1000, false).unwrap();
    m.disassembler.sections.add(Section::new(0x1000, 0x1009, SectionKind::Long));

    let lines = m.disassemble(0x1000, 9);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].text, "DC.L    $11223344               ; .\"3D");
    assert_eq!(lines[1].length, 4);
    // The one-byte tail falls back to a byte directive.
    assert_eq!(lines[2].length, 1);
    assert_eq!(lines[2].text, "DC.B    $99                     ; .");
}

#[test]
fn auto_sections_pick_words_on_even_addresses() {
    let mut m = machine_with(&[]);
    m.load_data(&[0xAA, 0xBB, 0xCC, 0xDD], 0x1000, false).unwrap();
    m.disassembler.sections.add(Section::new(0x1000, 0x1004, SectionKind::Auto));

    let lines = m.disassemble(0x1000, 4);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].text.starts_with("DC.W    $AABB,$CCDD"));
}

struct SymbolFormatter;

impl DisasmFormatter for SymbolFormatter {
    fn code_label(&self, addr: u32) -> String {
        format!("lbl_{addr:04X}")
    }
}

#[test]
fn formatter_substitutes_labels() {
    let mut m = machine_with(&[0x60, 0x06, 0x30, 0x3A, 0x00, 0x0A]);
    m.disassembler.set_formatter(Box::new(SymbolFormatter));

    assert_eq!(
        texts(&mut m, 0x1000, 6),
        vec!["BRA.S   lbl_1008", "MOVE.W  lbl_100E(PC),D0"]
    );
}

#[derive(Default)]
struct CountingDebugger {
    scans: Cell<u32>,
    records: Cell<u32>,
    cancel_after: Cell<Option<u32>>,
}

impl Debugger for CountingDebugger {
    fn set_disassembling(&self, on: bool) {
        if on {
            self.scans.set(self.scans.get() + 1);
        }
    }

    fn do_events(&self) {
        self.records.set(self.records.get() + 1);
    }

    fn cancelling(&self) -> bool {
        match self.cancel_after.get() {
            Some(limit) => self.records.get() >= limit,
            None => false,
        }
    }
}

#[test]
fn debugger_sees_scan_brackets_and_can_cancel() {
    let mut m = machine_with(&[0x4E, 0x71, 0x4E, 0x71, 0x4E, 0x71, 0x4E, 0x71]);
    let debugger = Rc::new(CountingDebugger::default());
    m.attach_debugger(debugger.clone());

    let lines = m.disassemble(0x1000, 8);
    assert_eq!(lines.len(), 4);
    assert_eq!(debugger.scans.get(), 1);

    debugger.records.set(0);
    debugger.cancel_after.set(Some(2));
    let lines = m.disassemble(0x1000, 8);
    assert_eq!(lines.len(), 2);
}

#[test]
fn disassembly_does_not_perturb_execution_state() {
    let mut m = machine_with(&[0x70, 0x01, 0x4E, 0x75]);
    let before = m.dump();
    let _ = m.disassemble(0x1000, 4);
    assert_eq!(m.dump(), before);
}
