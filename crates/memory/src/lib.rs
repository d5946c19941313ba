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

//! bdbg Memory - paged views over large address ranges
//!
//! A [`PagedSpace`] behaves like a contiguous, fixed-length byte buffer
//! while its real data is fetched on demand, one page at a time, through a
//! [`PageSource`] backing store. Reads go through a small LRU page cache;
//! writes invalidate it and fall through to the backing store. Concrete
//! backings are provided for seekable files ([`FileSource`]) and in-memory
//! buffers ([`BufSource`]).

/// In-memory buffer backing
pub mod buffer;
/// Error taxonomy for space operations
pub mod error;
/// File-backed spaces
pub mod file;
/// The paged space core and its backing-store contract
pub mod space;

pub use buffer::*;
pub use error::*;
pub use file::*;
pub use space::*;
