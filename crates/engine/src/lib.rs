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

//! bdbg Engine - the generic debugger control core.
//!
//! Builds breakpoint management, stepping, symbol/module resolution and
//! expression evaluation on top of [`bdbg_memory`]'s paged address
//! spaces. Everything OS- or architecture-specific (trap installation,
//! register access, instruction decoding, binary-format parsing, process
//! enumeration) is consumed through the trait contracts in [`backend`]
//! and [`process`] and injected at construction.

pub mod backend;
pub use backend::*;

pub mod breakpoint;
pub use breakpoint::*;

pub mod debugger;
pub use debugger::*;

pub mod eval;
pub use eval::*;

pub mod process;
pub use process::*;

pub mod symbols;
pub use symbols::*;
