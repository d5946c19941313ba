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

//! Find command - search a file for a byte pattern

use std::path::Path;

use eyre::Result;

use bdbg_memory::FileImage;

/// Offset of the first occurrence of `needle` in `path` at or after
/// `start`, without reading the whole file into memory for large files.
pub fn find_pattern(path: &Path, needle: &[u8], start: u64) -> Result<Option<u64>> {
    match FileImage::open(path)? {
        FileImage::Buffer(buf) => {
            let from = start as usize;
            if from >= buf.len() {
                return Ok(None);
            }
            // An empty needle matches right at the start, as in the paged arm.
            if needle.is_empty() {
                return Ok(Some(from as u64));
            }
            Ok(buf[from..]
                .windows(needle.len())
                .position(|w| w == needle)
                .map(|p| (from + p) as u64))
        }
        FileImage::Paged(mut space) => Ok(space.find(needle, start as i64)),
    }
}
