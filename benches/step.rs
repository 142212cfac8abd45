// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use emu68k::{Machine, MachineConfig};

/// A counting loop: ADDQ.L #1,D0 / BRA.S back, forever.
fn counting_machine() -> Machine {
    let mut machine = Machine::with_config(MachineConfig {
        memory_size: 0x10000,
        ..MachineConfig::default()
    });
    machine
        .load_executable(&[0x52, 0x80, 0x60, 0xFC], 0x1000, false)
        .unwrap();
    machine
}

fn bench_step(c: &mut Criterion) {
    let mut machine = counting_machine();
    c.bench_function("execute_instruction", |b| {
        b.iter(|| black_box(machine.execute_instruction()))
    });
}

fn bench_disassemble(c: &mut Criterion) {
    let mut machine = counting_machine();
    c.bench_function("disassemble", |b| {
        b.iter(|| black_box(machine.disassemble(0x1000, 4)))
    });
}

criterion_group!(benches, bench_step, bench_disassemble);
criterion_main!(benches);
