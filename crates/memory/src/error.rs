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

//! Errors reported by paged-space operations.
//!
//! Only structural contract violations are hard errors. A page the backing
//! store cannot read is *not* an error: it is served as a zero-filled page
//! so higher layers keep working over partially-mapped memory.

use thiserror::Error;

/// Errors raised by [`PagedSpace`](crate::PagedSpace) reads and writes.
#[derive(Debug, Error)]
pub enum SpaceError {
    /// A write would grow or shrink the space. The length of a space is
    /// fixed at construction; only content within it may change.
    #[error("write of {got} bytes at offset {offset:#x} would change the length of a {length:#x}-byte space")]
    ImmutableLength {
        /// Resolved start offset of the rejected write.
        offset: u64,
        /// Number of bytes the caller tried to write.
        got: usize,
        /// Immutable total length of the space.
        length: u64,
    },

    /// A write was attempted on a space marked read-only.
    #[error("cannot write through a frozen space")]
    Frozen,

    /// An offset or range argument resolved outside of `[0, length)`.
    #[error("offset {offset} is outside of a {length:#x}-byte space")]
    OutOfRange {
        /// The offending offset, after negative-index resolution.
        offset: i64,
        /// Total length of the space.
        length: u64,
    },

    /// An I/O failure from the backing store while overwriting content.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias for space operations.
pub type SpaceResult<T> = Result<T, SpaceError>;
