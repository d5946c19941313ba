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

//! Patch command - overwrite bytes of a file in place

use std::path::Path;

use eyre::Result;
use tracing::info;

use bdbg_memory::FileImage;

/// Overwrite `data.len()` bytes of `path` at `offset`. The file length
/// never changes; a patch reaching past the end is rejected.
pub fn patch_bytes(path: &Path, offset: u64, data: &[u8]) -> Result<()> {
    let mut space = FileImage::open_rw(path)?;
    space.write(offset as i64, data)?;
    info!(path = %path.display(), offset, len = data.len(), "patched");
    Ok(())
}
