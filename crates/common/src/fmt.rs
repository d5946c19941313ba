// bdbg - Binary Image Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Byte and address formatting helpers shared by the CLI and tests.

use eyre::{bail, Result};
use std::fmt::Write;

/// Number of bytes rendered per hexdump line.
pub const HEXDUMP_WIDTH: usize = 16;

/// Render `data` as a classic hexdump: offset column, hex bytes, ASCII gutter.
///
/// `base` is added to the rendered offsets so a dump of a sub-range shows
/// absolute addresses.
pub fn hexdump(data: &[u8], base: u64) -> String {
    let mut out = String::new();

    for (i, chunk) in data.chunks(HEXDUMP_WIDTH).enumerate() {
        let addr = base + (i * HEXDUMP_WIDTH) as u64;
        let _ = write!(out, "{addr:08x}  ");

        for j in 0..HEXDUMP_WIDTH {
            match chunk.get(j) {
                Some(b) => {
                    let _ = write!(out, "{b:02x} ");
                }
                None => out.push_str("   "),
            }
            if j == HEXDUMP_WIDTH / 2 - 1 {
                out.push(' ');
            }
        }

        out.push(' ');
        for b in chunk {
            out.push(if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' });
        }
        out.push('\n');
    }

    out
}

/// Parse an address argument, accepting both decimal and `0x`-prefixed hex.
pub fn parse_addr(s: &str) -> Result<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u64::from_str_radix(hex, 16)?)
    } else if s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty() {
        Ok(s.parse::<u64>()?)
    } else {
        bail!("invalid address: {s}")
    }
}
