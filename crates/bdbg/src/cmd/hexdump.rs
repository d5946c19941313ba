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

//! Hexdump command - render a byte range of a file

use std::path::Path;

use eyre::Result;

use bdbg_common::hexdump;
use bdbg_memory::FileImage;

/// Render `length` bytes of `path` starting at `start` as a hexdump.
/// Reads past the end are truncated rather than erroring.
pub fn hexdump_range(path: &Path, start: u64, length: u64) -> Result<String> {
    let bytes = match FileImage::open(path)? {
        FileImage::Buffer(buf) => {
            let from = (start as usize).min(buf.len());
            let to = from.saturating_add(length as usize).min(buf.len());
            buf[from..to].to_vec()
        }
        FileImage::Paged(mut space) => match space.read(start as i64, length) {
            Some(slice) => slice.into_bytes(),
            None => Vec::new(),
        },
    };
    tracing::debug!(path = %path.display(), start, got = bytes.len(), "hexdump range");
    Ok(hexdump(&bytes, start))
}
