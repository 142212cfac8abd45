// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instruction semantics: register/memory effects, condition codes and
//! trap behavior, checked against the MC68000 programmer's model.

use emu68k::cpu::CpuState;
use emu68k::machine::Error;
use emu68k::{Machine, MachineConfig, StopReason, Vector};

use pretty_assertions::assert_eq;

fn machine() -> Machine {
    let mut machine = Machine::with_config(MachineConfig {
        memory_size: 0x1_0000,
        ..MachineConfig::default()
    });
    machine.cpu.regs.ssp = 0x8000;
    machine
}

/// (X, N, Z, V, C)
fn flags(machine: &Machine) -> (bool, bool, bool, bool, bool) {
    let sr = machine.cpu.regs.sr;
    (sr.x, sr.n, sr.z, sr.v, sr.c)
}

#[test]
fn moveq_loads_and_sets_nzvc() {
    let mut m = machine();
    m.load_executable(&[0x70, 0x01], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0xDEAD_BEEF;
    m.cpu.regs.sr.x = true;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0x0000_0001);
    assert_eq!(m.cpu.regs.pc, 0x1002);
    // X is untouched by MOVEQ.
    assert_eq!(flags(&m), (true, false, false, false, false));
}

#[test]
fn addi_byte_wraps_and_carries() {
    let mut m = machine();
    // ADDI.B #$FF,D0
    m.load_executable(&[0x06, 0x00, 0x00, 0xFF], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0xAAAA_AA01;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0xAAAA_AA00);
    assert_eq!(m.cpu.regs.pc, 0x1004);
    assert_eq!(flags(&m), (true, false, true, false, true));
}

#[test]
fn divu_by_zero_traps_without_side_effects() {
    let mut m = machine();
    // DIVU #0,D0
    m.load_executable(&[0x80, 0xFC, 0x00, 0x00], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x1234_5678;

    let trap = m.execute_instruction().expect("zero divide must trap");
    assert_eq!(trap.vector, Vector::ZeroDivide as u8);
    assert_eq!(trap.pc, 0x1000);
    assert_eq!(m.cpu.regs.pc, 0x1000);
    assert_eq!(m.cpu.regs.d[0], 0x1234_5678);
}

#[test]
fn divu_overflow_leaves_destination() {
    let mut m = machine();
    // DIVU #1,D0 with a quotient that cannot fit 16 bits.
    m.load_executable(&[0x80, 0xFC, 0x00, 0x01], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x0002_0000;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0x0002_0000);
    assert!(m.cpu.regs.sr.v);
    assert!(!m.cpu.regs.sr.c);
}

#[test]
fn divs_quotient_and_remainder() {
    let mut m = machine();
    // DIVS #-7,D0 with D0 = 100: quotient -14, remainder 2.
    m.load_executable(&[0x81, 0xFC, 0xFF, 0xF9], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 100;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0x0002_FFF2);
    assert!(m.cpu.regs.sr.n);
    assert!(!m.cpu.regs.sr.z);
}

#[test]
fn move_word_postincrement() {
    let mut m = machine();
    // MOVE.W (A0)+,D1
    m.load_executable(&[0x32, 0x18], 0x1000, false).unwrap();
    m.load_data(&[0xAB, 0xCD], 0x2000, false).unwrap();
    *m.cpu.regs.a_mut(0) = 0x2000;
    m.cpu.regs.d[1] = 0x1111_0000;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[1], 0x1111_ABCD);
    assert_eq!(m.cpu.regs.a(0), 0x2002);
    assert!(m.cpu.regs.sr.n);
    assert!(!m.cpu.regs.sr.z);
}

#[test]
fn bsr_and_rts_balance_the_call_depth() {
    let mut m = machine();
    // BSR.W +$0E lands on the RTS at 0x1010.
    m.load_executable(&[0x61, 0x00, 0x00, 0x0E], 0x1000, false).unwrap();
    m.load_data(&[0x4E, 0x75], 0x1010, false).unwrap();

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.pc, 0x1010);
    assert_eq!(m.cpu.regs.a(7), 0x7FFC);
    assert_eq!(m.memory.read_long(0x7FFC).unwrap(), 0x1004);
    assert_eq!(m.cpu.call_depth(), 1);

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.pc, 0x1004);
    assert_eq!(m.cpu.regs.a(7), 0x8000);
    assert_eq!(m.cpu.call_depth(), 0);
}

#[test]
fn execute_returns_when_the_outermost_frame_pops() {
    let mut m = Machine::with_config(MachineConfig {
        memory_size: 0x1_0000,
        end_on_final_rts: true,
        ..MachineConfig::default()
    });
    m.cpu.regs.ssp = 0x8000;
    m.push_long(0x2000).unwrap();
    m.load_executable(&[0x4E, 0x75], 0x1000, false).unwrap();

    assert_eq!(m.execute().unwrap(), StopReason::FinalReturn);
    assert_eq!(m.cpu.regs.pc, 0x2000);
    assert_eq!(m.cpu.call_depth(), -1);
}

#[test]
fn stop_halts_the_run_loop() {
    let mut m = machine();
    // MOVEQ #42,D0 then STOP #$2700.
    m.load_executable(&[0x70, 0x2A, 0x4E, 0x72, 0x27, 0x00], 0x1000, false).unwrap();

    assert_eq!(m.execute().unwrap(), StopReason::Stopped);
    assert_eq!(m.cpu.regs.d[0], 42);
    assert!(m.cpu.stopped);

    // Still halted until the host resumes it.
    assert_eq!(m.execute_instruction(), None);
    m.cpu.stopped = false;
}

#[test]
fn trap_instruction_reports_vector_32_plus_n() {
    let mut m = machine();
    // TRAP #5
    m.load_executable(&[0x4E, 0x45], 0x1000, false).unwrap();

    let trap = m.execute_instruction().expect("TRAP must trap");
    assert_eq!(trap.vector, Vector::trap(5));
    assert_eq!(trap.trap_number(), Some(5));
    // Deliberate traps resume after the instruction.
    assert_eq!(m.cpu.regs.pc, 0x1002);
}

#[test]
fn trapv_only_traps_on_overflow() {
    let mut m = machine();
    m.load_executable(&[0x4E, 0x76, 0x4E, 0x76], 0x1000, false).unwrap();

    assert_eq!(m.execute_instruction(), None);

    m.cpu.regs.sr.v = true;
    let trap = m.execute_instruction().expect("TRAPV with V set must trap");
    assert_eq!(trap.vector, Vector::TrapvInstruction as u8);
    assert_eq!(m.cpu.regs.pc, 0x1004);
}

#[test]
fn chk_traps_out_of_bounds() {
    let mut m = machine();
    // CHK #100,D0 twice.
    m.load_executable(&[0x41, 0xBC, 0x00, 0x64, 0x41, 0xBC, 0x00, 0x64], 0x1000, false).unwrap();

    m.cpu.regs.d[0] = 50;
    assert_eq!(m.execute_instruction(), None);

    m.cpu.regs.d[0] = 0xFFFF_FFFF;
    let trap = m.execute_instruction().expect("CHK below zero must trap");
    assert_eq!(trap.vector, Vector::ChkInstruction as u8);
    assert!(m.cpu.regs.sr.n);
    assert_eq!(m.cpu.regs.pc, 0x1004);
}

#[test]
fn privileged_instruction_in_user_mode() {
    let mut m = machine();
    // MOVE #$2700,SR
    m.load_executable(&[0x46, 0xFC, 0x27, 0x00], 0x1000, false).unwrap();
    m.cpu.regs.sr.s = false;

    let trap = m.execute_instruction().expect("privilege violation");
    assert_eq!(trap.vector, Vector::PrivilegeViolation as u8);
    assert_eq!(m.cpu.regs.pc, 0x1000);
    assert!(!m.cpu.regs.sr.s);
}

#[test]
fn supervisor_bit_swaps_the_active_stack() {
    let mut m = machine();
    m.cpu.regs.usp = 0x4000;
    // MOVE #$0000,SR drops to user mode; A7 then means USP.
    m.load_executable(&[0x46, 0xFC, 0x00, 0x00], 0x1000, false).unwrap();

    assert_eq!(m.execute_instruction(), None);
    assert!(!m.cpu.regs.sr.s);
    assert_eq!(m.cpu.regs.a(7), 0x4000);
    assert_eq!(m.cpu.regs.ssp, 0x8000);
}

#[test]
fn trace_raises_after_each_instruction() {
    let mut m = machine();
    m.load_executable(&[0x4E, 0x71], 0x1000, false).unwrap();
    m.apply_cpu_state(&CpuState { sr: Some(0xA700), ..CpuState::default() });

    let trap = m.execute_instruction().expect("trace trap");
    assert_eq!(trap.vector, Vector::Trace as u8);
    // The traced instruction has completed.
    assert_eq!(m.cpu.regs.pc, 0x1002);
}

#[test]
fn odd_word_write_faults_before_any_mutation() {
    let mut m = machine();
    // MOVE.W D0,(A0) with A0 odd.
    m.load_executable(&[0x30, 0x80], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0xBEEF;
    *m.cpu.regs.a_mut(0) = 0x2001;

    let trap = m.execute_instruction().expect("address error");
    assert_eq!(trap.vector, Vector::AddressError as u8);
    assert_eq!(m.cpu.regs.pc, 0x1000);
    assert_eq!(m.memory.read_long(0x2000).unwrap(), 0);
}

#[test]
fn out_of_map_access_is_a_bus_error_and_fatal_in_batch_runs() {
    let mut m = machine();
    // MOVE.W (A0),D0 with A0 beyond the 64 KiB image.
    m.load_executable(&[0x30, 0x10], 0x1000, false).unwrap();
    *m.cpu.regs.a_mut(0) = 0x0002_0000;

    match m.execute() {
        Err(Error::FatalTrap(trap)) => assert_eq!(trap.vector, Vector::BusError as u8),
        other => panic!("expected a fatal bus error, got {other:?}"),
    }
}

#[test]
fn add_long_signed_overflow() {
    let mut m = machine();
    // ADD.L #1,D0 via ADDI.
    m.load_executable(&[0x06, 0x80, 0x00, 0x00, 0x00, 0x01], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x7FFF_FFFF;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0x8000_0000);
    assert_eq!(flags(&m), (false, true, false, true, false));
}

#[test]
fn cmp_leaves_x_alone() {
    let mut m = machine();
    // CMP.B #1,D0 via CMPI with D0 = 0.
    m.load_executable(&[0x0C, 0x00, 0x00, 0x01], 0x1000, false).unwrap();
    m.cpu.regs.sr.x = true;

    assert_eq!(m.execute_instruction(), None);
    // Borrow sets C but X stays.
    assert_eq!(flags(&m), (true, true, false, false, true));
    assert_eq!(m.cpu.regs.d[0], 0);
}

#[test]
fn cmpa_sign_extends_word_sources() {
    let mut m = machine();
    // CMPA.W #$FFFF,A0 with A0 = $FFFFFFFF: equal.
    m.load_executable(&[0xB0, 0xFC, 0xFF, 0xFF], 0x1000, false).unwrap();
    *m.cpu.regs.a_mut(0) = 0xFFFF_FFFF;

    assert_eq!(m.execute_instruction(), None);
    assert!(m.cpu.regs.sr.z);
}

#[test]
fn adda_does_not_touch_flags() {
    let mut m = machine();
    // ADDA.W #$8000,A0 sign-extends the source.
    m.load_executable(&[0xD0, 0xFC, 0x80, 0x00], 0x1000, false).unwrap();
    *m.cpu.regs.a_mut(0) = 0x0001_0000;
    m.cpu.regs.sr.set_ccr(0x1F);

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.a(0), 0x0000_8000);
    assert_eq!(flags(&m), (true, true, true, true, true));
}

#[test]
fn addq_to_address_register_is_whole_and_flagless() {
    let mut m = machine();
    // ADDQ.W #1,A0
    m.load_executable(&[0x52, 0x48], 0x1000, false).unwrap();
    *m.cpu.regs.a_mut(0) = 0x0000_FFFF;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.a(0), 0x0001_0000);
    assert_eq!(flags(&m), (false, false, false, false, false));
}

#[test]
fn subq_sets_zero_on_count_down() {
    let mut m = machine();
    // SUBQ.L #8,D3 (quick data 0 encodes 8).
    m.load_executable(&[0x51, 0x83], 0x1000, false).unwrap();
    m.cpu.regs.d[3] = 8;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[3], 0);
    assert!(m.cpu.regs.sr.z);
    assert!(!m.cpu.regs.sr.c);
}

#[test]
fn dbf_counts_words_down_to_minus_one() {
    let mut m = machine();
    // Loop: DBF D0,-2 (branches back onto itself until D0.W wraps).
    m.load_executable(&[0x51, 0xC8, 0xFF, 0xFE], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x0001_0002;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.pc, 0x1000);
    assert_eq!(m.cpu.regs.d[0], 0x0001_0001);

    m.cpu.regs.d[0] = 0x0001_0000;
    assert_eq!(m.execute_instruction(), None);
    // Counter expired: fall through, upper word preserved.
    assert_eq!(m.cpu.regs.pc, 0x1004);
    assert_eq!(m.cpu.regs.d[0], 0x0001_FFFF);
}

#[test]
fn bcc_takes_byte_and_word_displacements() {
    let mut m = machine();
    // BNE.S +8 (byte displacement in the opcode).
    m.load_executable(&[0x66, 0x08], 0x1000, false).unwrap();
    m.cpu.regs.sr.z = false;
    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.pc, 0x100A);

    // BEQ.W not taken falls through past the extension word.
    m.load_executable(&[0x67, 0x00, 0x00, 0x20], 0x1000, false).unwrap();
    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.pc, 0x1004);
}

#[test]
fn link_and_unlk_maintain_the_frame() {
    let mut m = machine();
    // LINK A6,#-4
    m.load_executable(&[0x4E, 0x56, 0xFF, 0xFC], 0x1000, false).unwrap();

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.a(6), 0x7FFC);
    assert_eq!(m.cpu.regs.a(7), 0x7FF8);
    assert_eq!(m.memory.read_long(0x7FFC).unwrap(), 0);

    m.load_executable(&[0x4E, 0x5E], 0x1100, false).unwrap();
    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.a(7), 0x8000);
    assert_eq!(m.cpu.regs.a(6), 0);
}

#[test]
fn movem_predecrement_and_postincrement_round_trip() {
    let mut m = machine();
    // MOVEM.L D0-D2/A0,-(A7) then MOVEM.L (A7)+,D0-D2/A0.
    m.load_executable(&[0x48, 0xE7, 0xE0, 0x80, 0x4C, 0xDF, 0x01, 0x07], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x11111111;
    m.cpu.regs.d[1] = 0x22222222;
    m.cpu.regs.d[2] = 0x33333333;
    *m.cpu.regs.a_mut(0) = 0x44444444;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.a(7), 0x8000 - 16);
    assert_eq!(m.memory.read_long(0x7FF0).unwrap(), 0x11111111);
    assert_eq!(m.memory.read_long(0x7FFC).unwrap(), 0x44444444);

    m.cpu.regs.d[0] = 0;
    m.cpu.regs.d[1] = 0;
    m.cpu.regs.d[2] = 0;
    *m.cpu.regs.a_mut(0) = 0;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.a(7), 0x8000);
    assert_eq!(m.cpu.regs.d[0], 0x11111111);
    assert_eq!(m.cpu.regs.d[1], 0x22222222);
    assert_eq!(m.cpu.regs.d[2], 0x33333333);
    assert_eq!(m.cpu.regs.a(0), 0x44444444);
}

#[test]
fn movem_word_loads_sign_extend() {
    let mut m = machine();
    // MOVEM.W (A0),D0/A1
    m.load_executable(&[0x4C, 0x90, 0x02, 0x01], 0x1000, false).unwrap();
    m.load_data(&[0x80, 0x00, 0xFF, 0xFE], 0x2000, false).unwrap();
    *m.cpu.regs.a_mut(0) = 0x2000;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0xFFFF_8000);
    assert_eq!(m.cpu.regs.a(1), 0xFFFF_FFFE);
}

#[test]
fn abcd_adds_packed_decimal_with_extend() {
    let mut m = machine();
    // ABCD D1,D0 twice: 15 + 27 = 42, then 99 + 01 + X.
    m.load_executable(&[0xC1, 0x01, 0xC1, 0x01], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x15;
    m.cpu.regs.d[1] = 0x27;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0] & 0xFF, 0x42);
    assert!(!m.cpu.regs.sr.c);

    m.cpu.regs.d[0] = 0x99;
    m.cpu.regs.d[1] = 0x01;
    m.cpu.regs.sr.x = false;
    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0] & 0xFF, 0x00);
    assert!(m.cpu.regs.sr.c);
    assert!(m.cpu.regs.sr.x);
}

#[test]
fn sbcd_subtracts_packed_decimal() {
    let mut m = machine();
    // SBCD D1,D0: 42 - 15 = 27.
    m.load_executable(&[0x81, 0x01], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x42;
    m.cpu.regs.d[1] = 0x15;
    m.cpu.regs.sr.z = true;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0] & 0xFF, 0x27);
    assert!(!m.cpu.regs.sr.c);
    // A nonzero result clears the sticky Z.
    assert!(!m.cpu.regs.sr.z);
}

#[test]
fn nbcd_is_hundreds_complement() {
    let mut m = machine();
    // NBCD D0: 0 - 1 = 99 with borrow.
    m.load_executable(&[0x48, 0x00], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x01;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0] & 0xFF, 0x99);
    assert!(m.cpu.regs.sr.c);
    assert!(m.cpu.regs.sr.x);
}

#[test]
fn asl_sets_v_when_the_sign_ever_changes() {
    let mut m = machine();
    // ASL.B #2,D0: 0x40 shifts into then out of the sign bit.
    m.load_executable(&[0xE5, 0x00], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x40;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0] & 0xFF, 0x00);
    assert!(m.cpu.regs.sr.v);
    assert!(m.cpu.regs.sr.z);
    assert!(m.cpu.regs.sr.c);
    assert!(m.cpu.regs.sr.x);
}

#[test]
fn asr_keeps_the_sign() {
    let mut m = machine();
    // ASR.W #4,D0 on a negative value.
    m.load_executable(&[0xE8, 0x40], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x8000;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0] & 0xFFFF, 0xF800);
    assert!(m.cpu.regs.sr.n);
    assert!(!m.cpu.regs.sr.c);
}

#[test]
fn shift_count_comes_from_register_modulo_64() {
    let mut m = machine();
    // LSL.L D1,D0 with D1 = 65: one effective shift.
    m.load_executable(&[0xE3, 0xA8], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 1;
    m.cpu.regs.d[1] = 65;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 2);

    // A count of zero clears C and leaves the value.
    m.load_executable(&[0xE3, 0xA8], 0x1000, false).unwrap();
    m.cpu.regs.d[1] = 0;
    m.cpu.regs.sr.c = true;
    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 2);
    assert!(!m.cpu.regs.sr.c);
}

#[test]
fn roxl_by_zero_copies_x_into_c() {
    let mut m = machine();
    // ROXL.W D1,D0 with D1 = 0.
    m.load_executable(&[0xE3, 0x70], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x1234;
    m.cpu.regs.d[1] = 0;
    m.cpu.regs.sr.x = true;
    m.cpu.regs.sr.c = false;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0x1234);
    assert!(m.cpu.regs.sr.c);
    assert!(m.cpu.regs.sr.x);
}

#[test]
fn rol_rotates_through_the_width() {
    let mut m = machine();
    // ROL.B #1,D0 wraps the sign bit into bit 0.
    m.load_executable(&[0xE3, 0x18], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x81;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0] & 0xFF, 0x03);
    assert!(m.cpu.regs.sr.c);
}

#[test]
fn ext_word_and_long() {
    let mut m = machine();
    // EXT.W D0 then EXT.L D0, starting from byte 0x80.
    m.load_executable(&[0x48, 0x80, 0x48, 0xC0], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x1234_0080;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0x1234_FF80);
    assert!(m.cpu.regs.sr.n);

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0xFFFF_FF80);
    assert!(m.cpu.regs.sr.n);
}

#[test]
fn swap_exchanges_register_halves() {
    let mut m = machine();
    m.load_executable(&[0x48, 0x40], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x1234_8765;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0x8765_1234);
    assert!(m.cpu.regs.sr.n);
}

#[test]
fn tas_reads_tests_and_sets_bit_7() {
    let mut m = machine();
    // TAS (A0)
    m.load_executable(&[0x4A, 0xD0], 0x1000, false).unwrap();
    *m.cpu.regs.a_mut(0) = 0x2000;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.memory.read_byte(0x2000).unwrap(), 0x80);
    assert!(m.cpu.regs.sr.z);
    assert!(!m.cpu.regs.sr.n);
}

#[test]
fn scc_writes_all_ones_or_zero() {
    let mut m = machine();
    // SEQ D0 / SNE D1
    m.load_executable(&[0x57, 0xC0, 0x56, 0xC1], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0xAAAA_AAAA;
    m.cpu.regs.d[1] = 0xAAAA_AAAA;
    m.cpu.regs.sr.z = true;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0xAAAA_AAFF);
    assert_eq!(m.cpu.regs.d[1], 0xAAAA_AA00);
}

#[test]
fn exg_swaps_data_and_address_registers() {
    let mut m = machine();
    // EXG D0,A0
    m.load_executable(&[0xC1, 0x88], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x1111_1111;
    *m.cpu.regs.a_mut(0) = 0x2222_2222;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[0], 0x2222_2222);
    assert_eq!(m.cpu.regs.a(0), 0x1111_1111);
}

#[test]
fn movep_scatters_and_gathers_alternate_bytes() {
    let mut m = machine();
    // MOVEP.L D0,0(A0), then MOVEP.L 0(A0),D1.
    m.load_executable(&[0x01, 0xC8, 0x00, 0x00, 0x03, 0x48, 0x00, 0x00], 0x1000, false).unwrap();
    m.cpu.regs.d[0] = 0x1234_5678;
    *m.cpu.regs.a_mut(0) = 0x2000;

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.memory.read_byte(0x2000).unwrap(), 0x12);
    assert_eq!(m.memory.read_byte(0x2002).unwrap(), 0x34);
    assert_eq!(m.memory.read_byte(0x2004).unwrap(), 0x56);
    assert_eq!(m.memory.read_byte(0x2006).unwrap(), 0x78);
    assert_eq!(m.memory.read_byte(0x2001).unwrap(), 0x00);

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.d[1], 0x1234_5678);
}

#[test]
fn move_to_ccr_and_rtr() {
    let mut m = machine();
    // MOVE #$1F,CCR
    m.load_executable(&[0x44, 0xFC, 0x00, 0x1F], 0x1000, false).unwrap();
    assert_eq!(m.execute_instruction(), None);
    assert_eq!(flags(&m), (true, true, true, true, true));
    assert!(m.cpu.regs.sr.s);

    // RTR: pop CCR then PC.
    m.push_long(0x3000).unwrap();
    m.push_word(0x0000).unwrap();
    m.load_executable(&[0x4E, 0x77], 0x1100, false).unwrap();
    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.pc, 0x3000);
    assert_eq!(flags(&m), (false, false, false, false, false));
    assert!(m.cpu.regs.sr.s);
}

#[test]
fn rte_restores_the_pushed_status() {
    let mut m = machine();
    m.push_long(0x4000).unwrap();
    m.push_word(0x0000).unwrap(); // SR with S clear
    m.load_executable(&[0x4E, 0x73], 0x1000, false).unwrap();

    assert_eq!(m.execute_instruction(), None);
    assert_eq!(m.cpu.regs.pc, 0x4000);
    assert!(!m.cpu.regs.sr.s);
}

#[test]
fn illegal_and_line_emulator_opcodes() {
    let mut m = machine();
    m.load_executable(&[0x4A, 0xFC], 0x1000, false).unwrap();
    let trap = m.execute_instruction().unwrap();
    assert_eq!(trap.vector, Vector::IllegalInstruction as u8);
    assert_eq!(m.cpu.regs.pc, 0x1000);

    m.load_executable(&[0xA0, 0x00], 0x1000, false).unwrap();
    assert_eq!(m.execute_instruction().unwrap().vector, Vector::LineAEmulator as u8);

    m.load_executable(&[0xF0, 0x00], 0x1000, false).unwrap();
    assert_eq!(m.execute_instruction().unwrap().vector, Vector::LineFEmulator as u8);
}

#[test]
fn reset_is_idempotent() {
    let mut m = machine();
    m.cpu.regs.d[5] = 0x42;
    m.cpu.regs.pc = 0x1234;
    m.reset();
    let first = m.dump();
    m.reset();
    assert_eq!(m.dump(), first);
    assert!(m.cpu.regs.sr.s);
    assert_eq!(m.cpu.regs.sr.interrupt_mask, 7);
}

#[test]
fn cpu_state_patch_applies_only_given_fields() {
    let mut m = machine();
    m.cpu.regs.d[0] = 7;
    m.apply_cpu_state(&CpuState {
        d: [None, Some(9), None, None, None, None, None, None],
        pc: Some(0x2000),
        ..CpuState::default()
    });
    assert_eq!(m.cpu.regs.d[0], 7);
    assert_eq!(m.cpu.regs.d[1], 9);
    assert_eq!(m.cpu.regs.pc, 0x2000);

    let state = m.cpu_state();
    assert_eq!(state.d[1], Some(9));
    assert_eq!(state.pc, Some(0x2000));
    assert_eq!(state.sr, Some(0x2700));
}
