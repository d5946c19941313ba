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

//! bdbg Common - Shared functionality for bdbg components
//!
//! This crate provides utilities shared by the bdbg binary and the
//! memory/engine crates: logging setup and a few formatting helpers.

/// Byte and address formatting helpers (hexdump, address parsing)
pub mod fmt;
/// Logging setup utilities for consistent logging across bdbg components
pub mod logging;

pub use fmt::*;
pub use logging::*;
