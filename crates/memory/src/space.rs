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

//! The paged address space.
//!
//! [`PagedSpace`] presents a fixed-length byte range whose content is
//! fetched on demand through a [`PageSource`]. Small reads are served from
//! a bounded most-recently-used page cache; reads larger than one page
//! come back as an independent sub-view over the same backing store, so
//! huge ranges stay lazy. The length of a space never changes after
//! construction - writes may only overwrite content in place.

use std::fmt;
use std::ops::{Bound, RangeBounds};

use tracing::{trace, warn};

use crate::{SpaceError, SpaceResult};

/// Default page size of a space, in bytes. Must be a power of two.
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Default number of pages kept in the read cache.
pub const DEFAULT_CACHE_PAGES: usize = 4;

/// Backing-store contract for a [`PagedSpace`].
///
/// Implementations fetch page-aligned chunks and overwrite raw content at
/// absolute addresses. They are injected at construction; the space itself
/// never knows whether it is looking at a file, a live process, or a plain
/// buffer.
pub trait PageSource {
    /// Fetch up to `len` bytes starting at the page-aligned address `addr`.
    ///
    /// Returning `None` (or fewer than `len` bytes) marks the tail of the
    /// page as unreadable; the space serves it as zeroes, never as an
    /// error.
    fn fetch_page(&mut self, addr: u64, len: usize) -> Option<Vec<u8>>;

    /// Overwrite content at the absolute address `addr`.
    fn rewrite_at(&mut self, addr: u64, data: &[u8]) -> SpaceResult<()>;

    /// Produce an independent handle over the same backing store, used by
    /// sub-views. Independent means the new handle never invalidates or
    /// repositions the original.
    fn duplicate(&self) -> std::io::Result<Box<dyn PageSource>>;

    /// Optional bulk fast path for [`PagedSpace::materialize`]. Sources
    /// that can read an arbitrary range in one operation (e.g. files)
    /// override this; the default falls back to the page-by-page loop.
    fn fetch_range(&mut self, addr: u64, len: u64) -> Option<Vec<u8>> {
        let _ = (addr, len);
        None
    }
}

/// The result of a [`PagedSpace::read`].
///
/// Requests of at most one page come back as concrete bytes; anything
/// larger becomes a new lazy view so that a multi-gigabyte read never
/// copies eagerly.
#[derive(Debug)]
pub enum Slice {
    /// A small read, served through the page cache.
    Bytes(Vec<u8>),
    /// A large read: an independent window over the same backing store.
    View(PagedSpace),
}

impl Slice {
    /// Length of the slice in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Self::Bytes(b) => b.len() as u64,
            Self::View(v) => v.len(),
        }
    }

    /// True iff the slice holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concretize the slice, materializing a view if necessary.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(b) => b,
            Self::View(mut v) => v.materialize(),
        }
    }
}

/// A lazily-materialized, page-cached view over an addressable byte range.
pub struct PagedSpace {
    /// Absolute address of our first byte inside the backing store.
    addr_start: u64,
    /// Total length, fixed for the lifetime of the space.
    length: u64,
    /// Cache granularity; always a power of two.
    page_size: u64,
    /// `(page_address, page_bytes)` pairs, most recently used first.
    /// Cached pages are always exactly `page_size` bytes, zero-padded.
    cache: Vec<(u64, Vec<u8>)>,
    /// Maximum number of cached pages.
    cache_cap: usize,
    /// Read-only marker; writes fail with [`SpaceError::Frozen`].
    frozen: bool,
    source: Box<dyn PageSource>,
}

impl fmt::Debug for PagedSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedSpace")
            .field("addr_start", &self.addr_start)
            .field("length", &self.length)
            .field("page_size", &self.page_size)
            .field("cached_pages", &self.cache.len())
            .field("frozen", &self.frozen)
            .finish()
    }
}

impl PagedSpace {
    /// Create a space of `length` bytes starting at absolute address
    /// `addr_start` in `source`, with the default page size and cache
    /// capacity.
    pub fn new(source: Box<dyn PageSource>, addr_start: u64, length: u64) -> Self {
        Self {
            addr_start,
            length,
            page_size: DEFAULT_PAGE_SIZE,
            cache: Vec::new(),
            cache_cap: DEFAULT_CACHE_PAGES,
            frozen: false,
            source,
        }
    }

    /// Override the page size. Panics unless `page_size` is a power of two.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        assert!(page_size.is_power_of_two(), "page size must be a power of two");
        self.page_size = page_size;
        self.cache.clear();
        self
    }

    /// Override the page-cache capacity. Panics if `pages` is zero.
    pub fn with_cache_capacity(mut self, pages: usize) -> Self {
        assert!(pages > 0, "page cache needs at least one entry");
        self.cache_cap = pages;
        while self.cache.len() > pages {
            self.cache.pop();
        }
        self
    }

    /// Total length of the space in bytes.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// True iff the space has zero length. Never touches the backing store.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Absolute address of the first byte inside the backing store.
    pub fn addr_start(&self) -> u64 {
        self.addr_start
    }

    /// Cache granularity in bytes.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Mark the space read-only; subsequent writes fail with
    /// [`SpaceError::Frozen`].
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// True iff the space is read-only.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Drop every cached page.
    ///
    /// Call after anything that may have mutated the backing store behind
    /// our back (e.g. the debugged target ran); a later read must never
    /// observe a page cached before that point.
    pub fn invalidate(&mut self) {
        trace!(pages = self.cache.len(), "invalidating page cache");
        self.cache.clear();
    }

    /// Resolve a possibly-negative offset against the end of the space.
    /// Returns `None` when the resolved offset is before the start.
    fn resolve(&self, offset: i64) -> Option<u64> {
        let resolved = if offset < 0 { offset + self.length as i64 } else { offset };
        u64::try_from(resolved).ok()
    }

    /// Read `len` bytes at `offset` (negative counts from the end).
    ///
    /// Returns `None` when the offset lies past the end of the space. A
    /// length overrunning the end is silently truncated; a zero-length
    /// request within bounds yields an empty slice. Requests larger than
    /// one page come back as an independent [`Slice::View`].
    pub fn read(&mut self, offset: i64, len: u64) -> Option<Slice> {
        let from = self.resolve(offset)?;
        if from > self.length {
            return None;
        }
        let len = len.min(self.length - from);
        if len == 0 {
            return Some(Slice::Bytes(Vec::new()));
        }
        self.read_range(from, len)
    }

    /// Read the single byte at `offset` (negative counts from the end).
    /// Returns `None` at or past the end of the space.
    pub fn read_byte(&mut self, offset: i64) -> Option<u8> {
        let from = self.resolve(offset)?;
        if from >= self.length {
            return None;
        }
        let addr = self.addr_start + from;
        let base = self.cache_page(addr);
        let page = &self.cache[0].1;
        Some(page[(addr - base) as usize])
    }

    /// Read a range with the same negative-index convention as [`read`].
    /// Inclusive ends (`a..=b`) cover one byte more than exclusive ends.
    ///
    /// [`read`]: Self::read
    pub fn read_span(&mut self, range: impl RangeBounds<i64>) -> Option<Slice> {
        let (from, len) = self.resolve_span(&range)?;
        self.read(from, len)
    }

    /// Overwrite `data.len()` bytes at `offset` (negative counts from the
    /// end). The write may not extend past the end of the space, and the
    /// space must not be frozen. Success conservatively invalidates the
    /// whole page cache before delegating to the backing store.
    pub fn write(&mut self, offset: i64, data: &[u8]) -> SpaceResult<()> {
        if self.frozen {
            return Err(SpaceError::Frozen);
        }
        let from = self
            .resolve(offset)
            .ok_or(SpaceError::OutOfRange { offset, length: self.length })?;
        if from > self.length {
            return Err(SpaceError::OutOfRange { offset, length: self.length });
        }
        if from + data.len() as u64 > self.length {
            return Err(SpaceError::ImmutableLength {
                offset: from,
                got: data.len(),
                length: self.length,
            });
        }
        self.invalidate();
        self.source.rewrite_at(self.addr_start + from, data)
    }

    /// Overwrite a range; the range must resolve to exactly `data.len()`
    /// bytes or the write is rejected with
    /// [`SpaceError::ImmutableLength`].
    pub fn write_span(&mut self, range: impl RangeBounds<i64>, data: &[u8]) -> SpaceResult<()> {
        let (from, len) = self
            .resolve_span(&range)
            .ok_or(SpaceError::OutOfRange { offset: 0, length: self.length })?;
        if len != data.len() as u64 {
            let resolved = self.resolve(from).unwrap_or_default();
            return Err(SpaceError::ImmutableLength {
                offset: resolved,
                got: data.len(),
                length: self.length,
            });
        }
        self.write(from, data)
    }

    /// The complete content of the space as one concrete buffer.
    ///
    /// An expensive escape hatch for operations the incremental interface
    /// cannot serve; built page by page unless the backing store has a
    /// bulk fast path.
    pub fn materialize(&mut self) -> Vec<u8> {
        if let Some(mut all) = self.source.fetch_range(self.addr_start, self.length) {
            all.resize(self.length as usize, 0);
            return all;
        }

        let mut out = Vec::with_capacity(self.length as usize);
        let mut addr = 0u64;
        while addr < self.length {
            let chunk = self.page_size.min(self.length - addr);
            match self.read_range(addr, chunk) {
                Some(slice) => out.extend_from_slice(&slice.into_bytes()),
                None => out.extend(std::iter::repeat(0).take(chunk as usize)),
            }
            addr += chunk;
        }
        out
    }

    /// Find the first occurrence of `needle` at or after `start_offset`
    /// (negative counts from the end); the returned offset is absolute
    /// within the space.
    ///
    /// Tries a small 64-byte window, then a full page, before falling back
    /// to a page-sized streaming scan, so locating a nearby marker never
    /// drags the whole space in.
    pub fn find(&mut self, needle: &[u8], start_offset: i64) -> Option<u64> {
        let base = self.resolve(start_offset)?;
        if base >= self.length {
            return None;
        }
        if needle.is_empty() {
            return Some(base);
        }
        if needle.len() as u64 > self.page_size {
            // Degenerate: the pattern cannot fit in any window.
            let all = self.materialize();
            return find_sub(&all[base as usize..], needle).map(|pos| base + pos as u64);
        }

        for window in [64u64, self.page_size] {
            let hay = self.read(base as i64, window)?.into_bytes();
            if let Some(pos) = find_sub(&hay, needle) {
                return Some(base + pos as u64);
            }
        }

        // Stream the rest one page-sized chunk at a time, overlapping by
        // needle.len()-1 so a match straddling a chunk edge is not missed.
        let overlap = needle.len() as u64 - 1;
        let step = self.page_size - overlap;
        let mut at = base + step;
        while at < self.length {
            let hay = self.read(at as i64, self.page_size)?.into_bytes();
            if let Some(pos) = find_sub(&hay, needle) {
                return Some(at + pos as u64);
            }
            at += step;
        }
        None
    }

    /// An independent lazy window over `[offset, offset+len)` of this
    /// space, clamped to the end. The window owns its own backing handle
    /// and page cache.
    pub fn subview(&self, offset: i64, len: u64) -> SpaceResult<Self> {
        let from = self
            .resolve(offset)
            .filter(|from| *from <= self.length)
            .ok_or(SpaceError::OutOfRange { offset, length: self.length })?;
        let len = len.min(self.length - from);
        let source = self.source.duplicate()?;
        let mut view = Self::new(source, self.addr_start + from, len)
            .with_page_size(self.page_size)
            .with_cache_capacity(self.cache_cap);
        view.frozen = self.frozen;
        Ok(view)
    }

    /// Serve `[from, from+len)` (space-relative, already validated).
    fn read_range(&mut self, from: u64, len: u64) -> Option<Slice> {
        let addr = self.addr_start + from;

        if len > self.page_size {
            // Big request: hand out a lazy window instead of copying.
            match self.subview(from as i64, len) {
                Ok(view) => return Some(Slice::View(view)),
                Err(err) => {
                    warn!(%err, "failed to duplicate backing store for sub-view");
                    return None;
                }
            }
        }

        let base = self.cache_page(addr);
        let off = (addr - base) as usize;
        let take = (len as usize).min(self.page_size as usize - off);
        let mut out = self.cache[0].1[off..off + take].to_vec();

        if (len as usize) > take {
            // The request crosses into the next page.
            let next = addr + len;
            let base = self.cache_page(next);
            out.extend_from_slice(&self.cache[0].1[..(next - base) as usize]);
        }

        Some(Slice::Bytes(out))
    }

    /// Look `addr` up in the page cache, fetching and inserting the page
    /// on a miss (evicting the least recently used entry when full).
    /// Afterwards the page is the cache's first entry; returns its
    /// page-aligned address.
    fn cache_page(&mut self, addr: u64) -> u64 {
        let base = addr & !(self.page_size - 1);

        if let Some(pos) = self.cache.iter().position(|(cached, _)| *cached == base) {
            if pos != 0 {
                let entry = self.cache.remove(pos);
                self.cache.insert(0, entry);
            }
            return base;
        }

        if self.cache.len() >= self.cache_cap {
            let (evicted, _) = self.cache.pop().expect("cache capacity is nonzero");
            trace!(page = format_args!("{evicted:#x}"), "evicting least recently used page");
        }

        // An unreadable or short page is padded with zeroes, never an error.
        let mut page = self.source.fetch_page(base, self.page_size as usize).unwrap_or_default();
        page.resize(self.page_size as usize, 0);
        trace!(page = format_args!("{base:#x}"), "fetched page");
        self.cache.insert(0, (base, page));
        base
    }

    /// Turn a range argument into `(start, len)`, resolving negative
    /// endpoints against the end of the space.
    fn resolve_span(&self, range: &impl RangeBounds<i64>) -> Option<(i64, u64)> {
        let start = match range.start_bound() {
            Bound::Included(&b) => b,
            Bound::Excluded(&b) => b + 1,
            Bound::Unbounded => 0,
        };
        let from = self.resolve(start)?;

        let len = match range.end_bound() {
            Bound::Unbounded => self.length.saturating_sub(from),
            Bound::Included(&e) => {
                let end = self.resolve(e)?;
                (end + 1).saturating_sub(from)
            }
            Bound::Excluded(&e) => {
                let end = self.resolve(e)?;
                end.saturating_sub(from)
            }
        };
        Some((start, len))
    }
}

/// First position of `needle` in `hay`, if any.
fn find_sub(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::rc::Rc;

    /// Backing store over a shared buffer that counts page fetches and can
    /// refuse to serve selected pages.
    struct CountingSource {
        data: Rc<RefCell<Vec<u8>>>,
        fetches: Rc<Cell<usize>>,
        bad_pages: Rc<HashSet<u64>>,
    }

    impl CountingSource {
        fn new(data: Vec<u8>) -> (Self, Rc<Cell<usize>>) {
            let fetches = Rc::new(Cell::new(0));
            let source = Self {
                data: Rc::new(RefCell::new(data)),
                fetches: Rc::clone(&fetches),
                bad_pages: Rc::new(HashSet::new()),
            };
            (source, fetches)
        }

        fn with_bad_pages(mut self, pages: impl IntoIterator<Item = u64>) -> Self {
            self.bad_pages = Rc::new(pages.into_iter().collect());
            self
        }
    }

    impl PageSource for CountingSource {
        fn fetch_page(&mut self, addr: u64, len: usize) -> Option<Vec<u8>> {
            self.fetches.set(self.fetches.get() + 1);
            if self.bad_pages.contains(&addr) {
                return None;
            }
            let data = self.data.borrow();
            let start = (addr as usize).min(data.len());
            let end = (addr as usize + len).min(data.len());
            Some(data[start..end].to_vec())
        }

        fn rewrite_at(&mut self, addr: u64, bytes: &[u8]) -> SpaceResult<()> {
            let mut data = self.data.borrow_mut();
            let addr = addr as usize;
            data[addr..addr + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }

        fn duplicate(&self) -> std::io::Result<Box<dyn PageSource>> {
            Ok(Box::new(Self {
                data: Rc::clone(&self.data),
                fetches: Rc::clone(&self.fetches),
                bad_pages: Rc::clone(&self.bad_pages),
            }))
        }
    }

    fn space_over(data: Vec<u8>) -> (PagedSpace, Rc<Cell<usize>>) {
        let len = data.len() as u64;
        let (source, fetches) = CountingSource::new(data);
        (PagedSpace::new(Box::new(source), 0, len), fetches)
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_read_within_bounds() {
        let (mut space, _) = space_over(b"hello world".to_vec());
        let got = space.read(6, 5).unwrap().into_bytes();
        assert_eq!(got, b"world");
    }

    #[test]
    fn test_read_truncates_at_end() {
        let (mut space, _) = space_over(b"hello".to_vec());
        let got = space.read(3, 100).unwrap().into_bytes();
        assert_eq!(got, b"lo");
    }

    #[test]
    fn test_read_past_end_is_absent() {
        let (mut space, _) = space_over(b"hello".to_vec());
        assert!(space.read(6, 1).is_none());
        assert!(space.read_byte(5).is_none());
        assert!(space.read_byte(6).is_none());
    }

    #[test]
    fn test_zero_length_read_at_end_is_empty() {
        let (mut space, _) = space_over(b"hello".to_vec());
        let got = space.read(5, 0).unwrap();
        assert!(got.is_empty());
        // A positive length exactly at the end truncates to empty too.
        let got = space.read(5, 10).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn test_zero_length_read_within_bounds_is_empty() {
        let (mut space, _) = space_over(b"hello".to_vec());
        assert!(space.read(2, 0).unwrap().is_empty());
    }

    #[test]
    fn test_negative_offsets_resolve_from_end() {
        let (mut space, _) = space_over(b"hello world".to_vec());
        assert_eq!(space.read(-5, 5).unwrap().into_bytes(), b"world");
        assert_eq!(space.read_byte(-1), Some(b'd'));
        assert_eq!(space.read_byte(-11), Some(b'h'));
        // Past the start: absent.
        assert!(space.read(-12, 1).is_none());
        assert!(space.read_byte(-12).is_none());
    }

    #[test]
    fn test_range_reads() {
        let (mut space, _) = space_over(b"hello world".to_vec());
        assert_eq!(space.read_span(0..5).unwrap().into_bytes(), b"hello");
        assert_eq!(space.read_span(0..=4).unwrap().into_bytes(), b"hello");
        assert_eq!(space.read_span(6..).unwrap().into_bytes(), b"world");
        assert_eq!(space.read_span(..).unwrap().into_bytes(), b"hello world");
        // Negative endpoints.
        assert_eq!(space.read_span(0..-6).unwrap().into_bytes(), b"hello");
        assert_eq!(space.read_span(-5..=-1).unwrap().into_bytes(), b"world");
        // Inverted range degenerates to empty, not an error.
        assert!(space.read_span(5..2).unwrap().is_empty());
    }

    #[test]
    fn test_read_crossing_page_boundary() {
        let data = patterned(256);
        let len = data.len() as u64;
        let (source, fetches) = CountingSource::new(data.clone());
        let mut space =
            PagedSpace::new(Box::new(source), 0, len).with_page_size(64).with_cache_capacity(4);

        let got = space.read(60, 8).unwrap().into_bytes();
        assert_eq!(got, &data[60..68]);
        assert_eq!(fetches.get(), 2);
    }

    #[test]
    fn test_cache_hit_does_not_refetch() {
        let (mut space, fetches) = space_over(patterned(8192));
        space.read(0, 16).unwrap();
        space.read(16, 16).unwrap();
        space.read(100, 16).unwrap();
        assert_eq!(fetches.get(), 1);
    }

    #[test]
    fn test_cache_eviction_is_least_recently_used() {
        let data = patterned(1024);
        let len = data.len() as u64;
        let (source, fetches) = CountingSource::new(data);
        let mut space =
            PagedSpace::new(Box::new(source), 0, len).with_page_size(64).with_cache_capacity(2);

        space.read(0, 1).unwrap(); // page 0
        space.read(64, 1).unwrap(); // page 1
        space.read(0, 1).unwrap(); // promotes page 0
        space.read(128, 1).unwrap(); // evicts page 1 (least recently used)
        assert_eq!(fetches.get(), 3);

        space.read(0, 1).unwrap(); // still cached
        assert_eq!(fetches.get(), 3);
        space.read(64, 1).unwrap(); // was evicted, refetches
        assert_eq!(fetches.get(), 4);
    }

    #[test]
    fn test_cache_never_exceeds_capacity() {
        let data = patterned(4096);
        let len = data.len() as u64;
        let (source, _) = CountingSource::new(data);
        let mut space =
            PagedSpace::new(Box::new(source), 0, len).with_page_size(64).with_cache_capacity(3);

        for page in 0..10i64 {
            space.read(page * 64, 1).unwrap();
            assert!(space.cache.len() <= 3);
        }
    }

    #[test]
    fn test_unreadable_page_reads_as_zeroes() {
        let data = patterned(256);
        let len = data.len() as u64;
        let (source, _) = CountingSource::new(data.clone());
        let source = source.with_bad_pages([64]);
        let mut space =
            PagedSpace::new(Box::new(source), 0, len).with_page_size(64).with_cache_capacity(4);

        assert_eq!(space.read(64, 64).unwrap().into_bytes(), vec![0u8; 64]);
        // Neighboring pages are unaffected.
        assert_eq!(space.read(0, 64).unwrap().into_bytes(), &data[..64]);
        assert_eq!(space.read(128, 4).unwrap().into_bytes(), &data[128..132]);
    }

    #[test]
    fn test_short_fetch_is_zero_padded() {
        // Space length extends past the backing data; the tail reads as zeroes.
        let data = b"abc".to_vec();
        let (source, _) = CountingSource::new(data);
        let mut space = PagedSpace::new(Box::new(source), 0, 8);
        assert_eq!(space.read(0, 8).unwrap().into_bytes(), b"abc\0\0\0\0\0");
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (mut space, _) = space_over(patterned(100));
        space.read(0, 32).unwrap();
        space.write(10, b"XYZW").unwrap();
        assert_eq!(space.read(10, 4).unwrap().into_bytes(), b"XYZW");
        // Unrelated offsets are untouched.
        assert_eq!(space.read(14, 1).unwrap().into_bytes(), vec![14 % 251]);
    }

    #[test]
    fn test_write_into_length_20_space() {
        let mut original = patterned(20);
        let (mut space, _) = space_over(original.clone());
        space.write(10, b"\xde\xad\xbe\xef").unwrap();
        original[10..14].copy_from_slice(b"\xde\xad\xbe\xef");
        assert_eq!(space.read(0, 20).unwrap().into_bytes(), original);
    }

    #[test]
    fn test_write_invalidates_cache() {
        let (mut space, fetches) = space_over(patterned(100));
        space.read(0, 10).unwrap();
        assert_eq!(fetches.get(), 1);
        space.write(0, b"!").unwrap();
        assert_eq!(space.read(0, 1).unwrap().into_bytes(), b"!");
        assert_eq!(fetches.get(), 2);
    }

    #[test]
    fn test_write_negative_offset() {
        let (mut space, _) = space_over(patterned(20));
        space.write(-4, b"TAIL").unwrap();
        assert_eq!(space.read(16, 4).unwrap().into_bytes(), b"TAIL");
    }

    #[test]
    fn test_write_past_end_is_immutable_length() {
        let (mut space, _) = space_over(patterned(20));
        let err = space.write(18, b"abc").unwrap_err();
        assert!(matches!(err, SpaceError::ImmutableLength { offset: 18, got: 3, length: 20 }));
    }

    #[test]
    fn test_write_span_length_mismatch() {
        let (mut space, _) = space_over(patterned(20));
        let err = space.write_span(0..4, b"toolong").unwrap_err();
        assert!(matches!(err, SpaceError::ImmutableLength { .. }));
        // Exact fit is fine.
        space.write_span(0..4, b"okay").unwrap();
        assert_eq!(space.read(0, 4).unwrap().into_bytes(), b"okay");
    }

    #[test]
    fn test_write_out_of_range() {
        let (mut space, _) = space_over(patterned(20));
        let err = space.write(21, b"x").unwrap_err();
        assert!(matches!(err, SpaceError::OutOfRange { .. }));
        let err = space.write(-21, b"x").unwrap_err();
        assert!(matches!(err, SpaceError::OutOfRange { .. }));
    }

    #[test]
    fn test_frozen_space_rejects_writes() {
        let (mut space, _) = space_over(patterned(20));
        space.freeze();
        let err = space.write(0, b"x").unwrap_err();
        assert!(matches!(err, SpaceError::Frozen));
        // Reads still work.
        assert_eq!(space.read(0, 1).unwrap().into_bytes(), vec![0]);
    }

    #[test]
    fn test_big_read_returns_lazy_view() {
        let data = patterned(64 * 1024);
        let (mut space, fetches) = space_over(data.clone());
        let slice = space.read(100, 10000).unwrap();
        let Slice::View(mut view) = slice else { panic!("expected a view for a big read") };
        // Creating the view fetched nothing.
        assert_eq!(fetches.get(), 0);
        assert_eq!(view.len(), 10000);
        assert_eq!(view.addr_start(), 100);
        // The view reads the right window, independently of the parent.
        assert_eq!(view.read(0, 4).unwrap().into_bytes(), &data[100..104]);
        assert_eq!(view.read(-4, 4).unwrap().into_bytes(), &data[10096..10100]);
    }

    #[test]
    fn test_small_read_is_concrete() {
        let (mut space, _) = space_over(patterned(8192));
        assert!(matches!(space.read(0, 4096).unwrap(), Slice::Bytes(_)));
        assert!(matches!(space.read(0, 4097).unwrap(), Slice::View(_)));
    }

    #[test]
    fn test_materialize_matches_contents() {
        let data = patterned(10000);
        let (mut space, _) = space_over(data.clone());
        assert_eq!(space.materialize(), data);
    }

    #[test]
    fn test_is_empty_does_not_fetch() {
        let (space, fetches) = space_over(Vec::new());
        assert!(space.is_empty());
        let (space, fetches2) = space_over(patterned(100));
        assert!(!space.is_empty());
        assert_eq!(fetches.get(), 0);
        assert_eq!(fetches2.get(), 0);
    }

    #[test]
    fn test_find_in_first_window() {
        let mut data = vec![0u8; 300];
        data[10] = 0xcc;
        let (mut space, _) = space_over(data);
        assert_eq!(space.find(&[0xcc], 0), Some(10));
    }

    #[test]
    fn test_find_past_small_window() {
        let mut data = vec![0u8; 5000];
        data[200] = 0xcc;
        let (mut space, fetches) = space_over(data);
        assert_eq!(space.find(&[0xcc], 0), Some(200));
        assert!(fetches.get() <= 2);
    }

    #[test]
    fn test_find_marker_past_first_page() {
        // Length 10000, page size 4096, marker at absolute offset 5000:
        // found after at most two page fetches, no full materialization.
        let mut data = vec![0u8; 10000];
        data[5000] = 0xcc;
        let len = data.len() as u64;
        let (source, fetches) = CountingSource::new(data);
        let mut space = PagedSpace::new(Box::new(source), 0, len);

        assert_eq!(space.find(&[0xcc], 0), Some(5000));
        assert!(fetches.get() <= 2, "fetched {} pages", fetches.get());
    }

    #[test]
    fn test_find_respects_start_offset() {
        let mut data = vec![0u8; 200];
        data[10] = 0xcc;
        data[150] = 0xcc;
        let (mut space, _) = space_over(data);
        assert_eq!(space.find(&[0xcc], 11), Some(150));
        assert_eq!(space.find(&[0xcc], 151), None);
    }

    #[test]
    fn test_find_multibyte_pattern() {
        let mut data = vec![0u8; 9000];
        data[8000..8004].copy_from_slice(b"MAGI");
        let (mut space, _) = space_over(data);
        assert_eq!(space.find(b"MAGI", 0), Some(8000));
        assert_eq!(space.find(b"MAGX", 0), None);
    }

    #[test]
    fn test_find_negative_start() {
        let mut data = vec![0u8; 100];
        data[95] = 0x42;
        let (mut space, _) = space_over(data);
        assert_eq!(space.find(&[0x42], -10), Some(95));
        assert_eq!(space.find(&[0x42], -200), None);
    }

    #[test]
    fn test_subview_clamps_to_end() {
        let (space, _) = space_over(patterned(100));
        let view = space.subview(40, 1000).unwrap();
        assert_eq!(view.len(), 60);
        assert_eq!(view.addr_start(), 40);
        assert!(space.subview(101, 1).is_err());
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let (mut space, fetches) = space_over(patterned(100));
        space.read(0, 8).unwrap();
        space.read(0, 8).unwrap();
        assert_eq!(fetches.get(), 1);
        space.invalidate();
        space.read(0, 8).unwrap();
        assert_eq!(fetches.get(), 2);
    }
}
