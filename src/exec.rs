// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The EYN executable container: a fixed 32-byte header
//! followed by code and initialised data.  Before anything is
//! copied into a process region the code bytes pass a static
//! screen that refuses the privileged and port-I/O opcodes, and
//! software interrupts other than `int 0x80`.
//!
//! The screen does not decode instructions; it matches bytes.
//! A harmless `F4` inside an immediate will be refused too.
//! That trade is deliberate: the container has no section
//! metadata that could say what is code.

use crate::println;
use crate::result::{Error, Result};
use bitflags::bitflags;

/// Container magic, "EYN\0".
pub const MAGIC: [u8; 4] = *b"EYN\0";

/// Current container version.
pub const VERSION: u8 = 1;

/// Size of the on-disk header.
pub const HEADER_SIZE: usize = 32;

bitflags! {
    /// Header feature flags.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ExeFlags: u8 {
        /// Uses dynamic linking.
        const DYNAMIC = 0x01;
        /// Contains relocations.
        const RELOC = 0x02;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExeHeader {
    pub version: u8,
    pub flags: ExeFlags,
    pub entry_point: u32,
    pub code_size: u32,
    pub data_size: u32,
    pub bss_size: u32,
    pub dyn_table_off: u32,
    pub dyn_table_size: u32,
}

fn rd32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

impl ExeHeader {
    pub fn new(entry_point: u32, code_size: u32, data_size: u32) -> ExeHeader {
        ExeHeader {
            version: VERSION,
            flags: ExeFlags::empty(),
            entry_point,
            code_size,
            data_size,
            bss_size: 0,
            dyn_table_off: 0,
            dyn_table_size: 0,
        }
    }

    pub fn decode(buf: &[u8]) -> Result<ExeHeader> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::ExeTruncated);
        }
        if buf[..4] != MAGIC {
            return Err(Error::ExeBadMagic);
        }
        if buf[4] != VERSION {
            return Err(Error::ExeBadVersion);
        }
        Ok(ExeHeader {
            version: buf[4],
            flags: ExeFlags::from_bits_truncate(buf[5]),
            entry_point: rd32(buf, 8),
            code_size: rd32(buf, 12),
            data_size: rd32(buf, 16),
            bss_size: rd32(buf, 20),
            dyn_table_off: rd32(buf, 24),
            dyn_table_size: rd32(buf, 28),
        })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(&MAGIC);
        buf[4] = self.version;
        buf[5] = self.flags.bits();
        buf[8..12].copy_from_slice(&self.entry_point.to_le_bytes());
        buf[12..16].copy_from_slice(&self.code_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.data_size.to_le_bytes());
        buf[20..24].copy_from_slice(&self.bss_size.to_le_bytes());
        buf[24..28].copy_from_slice(&self.dyn_table_off.to_le_bytes());
        buf[28..32].copy_from_slice(&self.dyn_table_size.to_le_bytes());
        buf
    }
}

/// A parsed executable, borrowing the file bytes.
pub struct Image<'a> {
    pub header: ExeHeader,
    pub code: &'a [u8],
    pub data: &'a [u8],
}

impl<'a> Image<'a> {
    /// Parses and validates the container layout: header, then
    /// `code_size` code bytes, then `data_size` data bytes.
    pub fn parse(bytes: &'a [u8]) -> Result<Image<'a>> {
        let header = ExeHeader::decode(bytes)?;
        let code_size = header.code_size as usize;
        let data_size = header.data_size as usize;
        let rest = bytes.len() - HEADER_SIZE;
        if code_size > rest {
            return Err(Error::ExeTruncated);
        }
        if data_size > rest - code_size {
            return Err(Error::ExeTruncated);
        }
        let code = &bytes[HEADER_SIZE..HEADER_SIZE + code_size];
        let data =
            &bytes[HEADER_SIZE + code_size..HEADER_SIZE + code_size + data_size];
        Ok(Image { header, code, data })
    }
}

/// Opcodes refused outright: hlt, cli, sti, and the port I/O
/// family.
const BLOCKED: [u8; 11] = [
    0xf4, // hlt
    0xfa, // cli
    0xfb, // sti
    0xe4, 0xe5, 0xec, 0xed, // in
    0xe6, 0xe7, 0xee, 0xef, // out
];

/// The dangerous-opcode screen.  `CD` (int) is allowed only when
/// its immediate is 0x80.
pub fn screen(code: &[u8]) -> Result<()> {
    let mut i = 0;
    while i < code.len() {
        let op = code[i];
        if op == 0xcd {
            if i + 1 < code.len() && code[i + 1] == 0x80 {
                i += 2;
                continue;
            }
            println!("run: blocking software interrupt at offset {i}");
            return Err(Error::ExeBlockedOp);
        }
        if BLOCKED.contains(&op) {
            println!("run: dangerous opcode {op:#04x} at offset {i}");
            return Err(Error::ExeBlockedOp);
        }
        i += 1;
    }
    Ok(())
}
