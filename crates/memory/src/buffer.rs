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

//! In-memory backing store.
//!
//! Backs a [`PagedSpace`] with a plain byte vector. Duplicates share the
//! underlying buffer, so every sub-view observes writes made through any
//! other view - the same aliasing a live address space exhibits. Handy as
//! a scratch space and as the natural test double for backends.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{PageSource, PagedSpace, SpaceResult};

/// A [`PageSource`] over a shared in-memory byte buffer.
#[derive(Debug, Clone)]
pub struct BufSource {
    data: Rc<RefCell<Vec<u8>>>,
}

impl BufSource {
    /// Wrap `data` as a backing store.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: Rc::new(RefCell::new(data)) }
    }

    /// A paged space covering the whole buffer, starting at address 0.
    pub fn into_space(self) -> PagedSpace {
        let length = self.data.borrow().len() as u64;
        PagedSpace::new(Box::new(self), 0, length)
    }

    /// A copy of the current buffer contents.
    pub fn contents(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }
}

impl PageSource for BufSource {
    fn fetch_page(&mut self, addr: u64, len: usize) -> Option<Vec<u8>> {
        let data = self.data.borrow();
        let start = (addr as usize).min(data.len());
        let end = (addr as usize).saturating_add(len).min(data.len());
        Some(data[start..end].to_vec())
    }

    fn rewrite_at(&mut self, addr: u64, bytes: &[u8]) -> SpaceResult<()> {
        let mut data = self.data.borrow_mut();
        let addr = addr as usize;
        // The space layer has already bounds-checked against its length;
        // clamp against the buffer so a short backing cannot panic.
        let end = (addr + bytes.len()).min(data.len());
        if addr < end {
            data[addr..end].copy_from_slice(&bytes[..end - addr]);
        }
        Ok(())
    }

    fn duplicate(&self) -> std::io::Result<Box<dyn PageSource>> {
        Ok(Box::new(self.clone()))
    }

    fn fetch_range(&mut self, addr: u64, len: u64) -> Option<Vec<u8>> {
        self.fetch_page(addr, len as usize)
    }
}

/// A paged space over a fresh in-memory buffer; shorthand for
/// `BufSource::new(data).into_space()`.
pub fn space_from_bytes(data: Vec<u8>) -> PagedSpace {
    BufSource::new(data).into_space()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_over_buffer() {
        let mut space = space_from_bytes(b"hello world".to_vec());
        assert_eq!(space.len(), 11);
        assert_eq!(space.read(0, 5).unwrap().into_bytes(), b"hello");
    }

    #[test]
    fn test_views_share_the_buffer() {
        let source = BufSource::new(vec![0u8; 8192]);
        let mut space = source.clone().into_space();
        let mut view = space.subview(4096, 4096).unwrap();

        space.write(5000, b"ping").unwrap();
        assert_eq!(view.read(904, 4).unwrap().into_bytes(), b"ping");
        assert_eq!(&source.contents()[5000..5004], b"ping");
    }

    #[test]
    fn test_write_through_view_invalidates_only_that_view() {
        let source = BufSource::new(vec![0u8; 8192]);
        let mut a = source.clone().into_space();
        let mut b = source.into_space();

        // b's cache predates the write through a; an explicit invalidate
        // is the caller's responsibility for sibling views.
        assert_eq!(b.read(0, 4).unwrap().into_bytes(), vec![0; 4]);
        a.write(0, b"mark").unwrap();
        b.invalidate();
        assert_eq!(b.read(0, 4).unwrap().into_bytes(), b"mark");
    }
}
