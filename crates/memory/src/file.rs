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

//! On-demand reading of files.
//!
//! [`FileImage::open`] hands back a plain buffer for small read-only files
//! (no point paging 4 KiB) and a [`PagedSpace`] over a duplicated handle
//! otherwise. Every access seeks to an absolute offset first, so handle
//! duplicates sharing a kernel cursor cannot corrupt each other under the
//! single-threaded contract.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::Result;
use tracing::debug;

use crate::{PageSource, PagedSpace, SpaceResult};

/// Files at most this long are returned as a concrete buffer by
/// [`FileImage::open`].
pub const SMALL_FILE_LIMIT: u64 = 4096;

/// A [`PageSource`] over a seekable file.
#[derive(Debug)]
pub struct FileSource {
    file: File,
}

impl FileSource {
    /// Take ownership of an open file handle.
    pub fn new(file: File) -> Self {
        Self { file }
    }

    /// Build a paged space over a section of the file. When `length` is
    /// `None` it is discovered by seeking to the end.
    pub fn into_space(mut self, addr_start: u64, length: Option<u64>) -> Result<PagedSpace> {
        let length = match length {
            Some(len) => len,
            None => self.file.seek(SeekFrom::End(0))?.saturating_sub(addr_start),
        };
        Ok(PagedSpace::new(Box::new(self), addr_start, length))
    }
}

impl PageSource for FileSource {
    fn fetch_page(&mut self, addr: u64, len: usize) -> Option<Vec<u8>> {
        self.file.seek(SeekFrom::Start(addr)).ok()?;
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(_) => return None,
            }
        }
        buf.truncate(filled);
        Some(buf)
    }

    fn rewrite_at(&mut self, addr: u64, data: &[u8]) -> SpaceResult<()> {
        self.file.seek(SeekFrom::Start(addr))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn duplicate(&self) -> std::io::Result<Box<dyn PageSource>> {
        Ok(Box::new(Self { file: self.file.try_clone()? }))
    }

    fn fetch_range(&mut self, addr: u64, len: u64) -> Option<Vec<u8>> {
        // Bulk path for materialize: one positioned read, no cache churn.
        self.file.seek(SeekFrom::Start(addr)).ok()?;
        let mut buf = Vec::with_capacity(len as usize);
        (&self.file).take(len).read_to_end(&mut buf).ok()?;
        Some(buf)
    }
}

/// The result of opening a file for inspection.
#[derive(Debug)]
pub enum FileImage {
    /// Small read-only file, loaded eagerly; the paging machinery is
    /// bypassed entirely.
    Buffer(Vec<u8>),
    /// A lazy paged view over the file.
    Paged(PagedSpace),
}

impl FileImage {
    /// Open `path` read-only. Files of at most [`SMALL_FILE_LIMIT`] bytes
    /// come back as [`FileImage::Buffer`]; larger ones as a frozen paged
    /// space.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let size = file.seek(SeekFrom::End(0))?;

        if size <= SMALL_FILE_LIMIT {
            debug!(path = %path.display(), size, "loading small file eagerly");
            let mut buf = Vec::with_capacity(size as usize);
            file.seek(SeekFrom::Start(0))?;
            file.read_to_end(&mut buf)?;
            return Ok(Self::Buffer(buf));
        }

        debug!(path = %path.display(), size, "opening paged read-only view");
        let mut space = FileSource::new(file).into_space(0, Some(size))?;
        space.freeze();
        Ok(Self::Paged(space))
    }

    /// Open `path` for reading and writing as a paged space, regardless of
    /// size.
    pub fn open_rw(path: impl AsRef<Path>) -> Result<PagedSpace> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!(path = %path.display(), "opening paged read-write view");
        FileSource::new(file).into_space(0, None)
    }

    /// Total length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Self::Buffer(b) => b.len() as u64,
            Self::Paged(s) => s.len(),
        }
    }

    /// True iff the file is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
