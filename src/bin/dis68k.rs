// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line disassembler: loads an S-record or raw binary image and
//! prints a listing.
//!
//! Usage: `dis68k <file> [origin] [length]`, addresses in hex. Raw binaries
//! land at `origin` (default 0); S-record files carry their own addresses.

use emu68k::{Machine, MachineConfig};

use std::process::ExitCode;

fn parse_hex(arg: &str) -> Result<u32, String> {
    u32::from_str_radix(arg.trim_start_matches("0x").trim_start_matches('$'), 16)
        .map_err(|e| format!("bad hex value {arg:?}: {e}"))
}

fn run() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: dis68k <file> [origin] [length]")?;
    let origin = args.next().map(|a| parse_hex(&a)).transpose()?.unwrap_or(0);
    let mut length = args.next().map(|a| parse_hex(&a)).transpose()?;

    let mut machine = Machine::with_config(MachineConfig {
        memory_size: 16 * 1024 * 1024,
        ..MachineConfig::default()
    });

    let text = std::fs::read(&path).map_err(|e| format!("cannot read {path}: {e}"))?;
    let start = if text.first() == Some(&b'S') {
        let info = machine
            .load_srecord(&path)
            .map_err(|e| format!("cannot load {path}: {e}"))?;
        length = length.or(Some(info.bytes_loaded as u32));
        info.start_address.unwrap_or(origin)
    } else {
        machine
            .load_executable(&text, origin, false)
            .map_err(|e| format!("cannot load {path}: {e}"))?;
        length = length.or(Some(text.len() as u32));
        origin
    };

    for line in machine.disassemble(start, length.unwrap_or(0)) {
        println!("{:06X}  {}", line.address, line.text);
    }
    Ok(())
}

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
        .expect("logger init");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("dis68k: {message}");
            ExitCode::FAILURE
        },
    }
}
