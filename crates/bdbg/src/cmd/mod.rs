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

//! Command implementations for the bdbg CLI

pub mod find;
pub mod hexdump;
pub mod patch;

pub use find::find_pattern;
pub use hexdump::hexdump_range;
pub use patch::patch_bytes;

use eyre::Result;

/// clap value parser for address/offset arguments.
pub fn addr_arg(s: &str) -> Result<u64, String> {
    bdbg_common::parse_addr(s).map_err(|e| e.to_string())
}

/// Decode a pattern argument: hex bytes when `hex` is set, literal text
/// otherwise.
pub fn decode_pattern(pattern: &str, hex: bool) -> Result<Vec<u8>> {
    if hex {
        let cleaned = pattern.trim().trim_start_matches("0x").replace(' ', "");
        Ok(hex::decode(cleaned)?)
    } else {
        Ok(pattern.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pattern_literal() {
        assert_eq!(decode_pattern("abc", false).unwrap(), b"abc");
    }

    #[test]
    fn test_decode_pattern_hex() {
        assert_eq!(decode_pattern("deadbeef", true).unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode_pattern("0x90 c3", true).unwrap(), vec![0x90, 0xc3]);
        assert!(decode_pattern("xyz", true).is_err());
    }
}
