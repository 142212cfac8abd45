// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Motorola S-record loading.
//!
//! Accepted records: S0 (header, ignored), S1/S2/S3 (data with 2/3/4-byte
//! addresses), S5 (count, ignored) and S7/S8/S9 (termination carrying the
//! start address). The checksum byte is the one's complement of the sum of
//! the count, address and data bytes.
//!
//! Data bytes landing outside the memory map are skipped rather than failing
//! the load, so images referencing unpopulated addresses still come in; each
//! skipped write is surfaced through the logger.

use crate::memory::Memory;

use thiserror::Error;

/// Why an S-record load failed. Display gives the human-readable message the
/// host is expected to show.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("line {line}: not an S-record")]
    NotAnSrecord { line: usize },

    #[error("line {line}: unsupported record type S{kind}")]
    UnsupportedRecord { line: usize, kind: char },

    #[error("line {line}: invalid hex digits")]
    InvalidHex {
        line: usize,
        #[source]
        source: hex::FromHexError,
    },

    #[error("line {line}: record truncated")]
    Truncated { line: usize },

    #[error("line {line}: checksum mismatch (expected {expected:#04X}, found {found:#04X})")]
    Checksum { line: usize, expected: u8, found: u8 },
}

/// Summary of a successful load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SrecordInfo {
    /// Data bytes written into memory.
    pub bytes_loaded: usize,
    /// Data bytes whose address was outside the memory map.
    pub bytes_skipped: usize,
    /// Start address from the termination record, when one was present.
    pub start_address: Option<u32>,
}

enum Record {
    Ignored,
    Data { address: u32, data: Vec<u8> },
    Termination { address: u32 },
}

/// Parses and verifies one line. Returns `None` for blank lines.
fn parse_line(line: &str, line_no: usize) -> Result<Option<Record>, LoadError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut chars = line.chars();
    if chars.next() != Some('S') {
        return Err(LoadError::NotAnSrecord { line: line_no });
    }
    let kind = chars.next().ok_or(LoadError::Truncated { line: line_no })?;

    let bytes = hex::decode(chars.as_str())
        .map_err(|source| LoadError::InvalidHex { line: line_no, source })?;

    // Count byte, at least an address, and the checksum.
    if bytes.len() < 3 || bytes[0] as usize != bytes.len() - 1 {
        return Err(LoadError::Truncated { line: line_no });
    }

    let sum: u8 = bytes[..bytes.len() - 1]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    let expected = !sum;
    let found = bytes[bytes.len() - 1];
    if expected != found {
        return Err(LoadError::Checksum { line: line_no, expected, found });
    }

    let address_len = match kind {
        '0' | '1' | '9' => 2,
        '2' | '8' => 3,
        '3' | '7' => 4,
        '5' | '6' => return Ok(Some(Record::Ignored)),
        _ => return Err(LoadError::UnsupportedRecord { line: line_no, kind }),
    };

    let payload = &bytes[1..bytes.len() - 1];
    if payload.len() < address_len {
        return Err(LoadError::Truncated { line: line_no });
    }

    let address = payload[..address_len].iter().fold(0u32, |acc, b| acc << 8 | *b as u32);

    Ok(Some(match kind {
        '0' => Record::Ignored,
        '1' | '2' | '3' => Record::Data { address, data: payload[address_len..].to_vec() },
        _ => Record::Termination { address },
    }))
}

/// Loads S-record text into memory. On a malformed line nothing further is
/// written and the error is returned; lines before it stay loaded.
pub fn load_str(text: &str, memory: &mut Memory) -> Result<SrecordInfo, LoadError> {
    let mut info = SrecordInfo::default();

    for (index, line) in text.lines().enumerate() {
        match parse_line(line, index + 1)? {
            None | Some(Record::Ignored) => {},
            Some(Record::Data { address, data }) => {
                for (offset, byte) in data.iter().enumerate() {
                    let addr = address.wrapping_add(offset as u32);
                    if memory.write_byte(addr, *byte).is_ok() {
                        info.bytes_loaded += 1;
                    } else {
                        // Out-of-map bytes are tolerated but not silent.
                        log::warn!(
                            target: "loader",
                            "line {}: byte for {addr:#X} is outside the memory map, skipped",
                            index + 1,
                        );
                        info.bytes_skipped += 1;
                    }
                }
            },
            Some(Record::Termination { address }) => {
                info.start_address = Some(address);
            },
        }
    }

    log::debug!(
        target: "loader",
        "S-record load: {} bytes written, {} skipped, start {:X?}",
        info.bytes_loaded,
        info.bytes_skipped,
        info.start_address,
    );

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn s1_line_loads_bytes() {
        let mut memory = Memory::new(0x100);
        // S1, count 7, address 0x0000, data 70 01 4E 75.
        let info = load_str("S107000070014E75C4\n", &mut memory).unwrap();
        assert_eq!(info.bytes_loaded, 4);
        assert_eq!(memory.read_word(0).unwrap(), 0x7001);
        assert_eq!(memory.read_word(2).unwrap(), 0x4E75);
        assert_eq!(info.start_address, None);
    }

    #[test]
    fn tampered_checksum_is_fatal_and_writes_nothing() {
        let mut memory = Memory::new(0x100);
        let err = load_str("S107000070014E75C5\n", &mut memory).unwrap_err();
        assert!(matches!(err, LoadError::Checksum { line: 1, .. }));
        assert_eq!(memory.read_long(0).unwrap(), 0);
    }

    #[test]
    fn termination_record_carries_start_address() {
        let mut memory = Memory::new(0x10000);
        let text = "S00600004844521B\nS10700807001 4E75".replace(' ', "");
        // Compute: count 07, addr 0080, data 70 01 4E 75 -> sum 0x07+0x80+0x70+0x01+0x4E+0x75.
        let sum: u8 = [0x07u8, 0x00, 0x80, 0x70, 0x01, 0x4E, 0x75]
            .iter()
            .fold(0u8, |a, b| a.wrapping_add(*b));
        let text = format!("{text}{:02X}\nS9030080{:02X}\n", !sum, {
            let s: u8 = [0x03u8, 0x00, 0x80].iter().fold(0u8, |a, b| a.wrapping_add(*b));
            !s
        });
        let info = load_str(&text, &mut memory).unwrap();
        assert_eq!(info.bytes_loaded, 4);
        assert_eq!(info.start_address, Some(0x80));
        assert_eq!(memory.read_word(0x80).unwrap(), 0x7001);
    }

    #[test]
    fn out_of_map_bytes_are_skipped_not_fatal() {
        let mut memory = Memory::new(4);
        // Data at 0x0002 of length 4 runs off the 4-byte image.
        let sum: u8 = [0x07u8, 0x00, 0x02, 0xAA, 0xBB, 0xCC, 0xDD]
            .iter()
            .fold(0u8, |a, b| a.wrapping_add(*b));
        let text = format!("S1070002AABBCCDD{:02X}\n", !sum);
        let info = load_str(&text, &mut memory).unwrap();
        assert_eq!(info.bytes_loaded, 2);
        assert_eq!(info.bytes_skipped, 2);
        assert_eq!(memory.read_word(2).unwrap(), 0xAABB);
    }

    #[test]
    fn garbage_is_rejected() {
        let mut memory = Memory::new(16);
        assert!(matches!(
            load_str("hello\n", &mut memory),
            Err(LoadError::NotAnSrecord { line: 1 })
        ));
        assert!(matches!(
            load_str("S1XYZ\n", &mut memory),
            Err(LoadError::InvalidHex { line: 1, .. })
        ));
        assert!(matches!(
            load_str("S4030000FC\n", &mut memory),
            Err(LoadError::UnsupportedRecord { line: 1, kind: '4' })
        ));
    }
}
