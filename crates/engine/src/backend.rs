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

//! Contracts between the generic debugger core and its platform layer.

use auto_impl::auto_impl;
use eyre::Result;

use bdbg_memory::PagedSpace;

/// Low-level control of a debuggee, implemented per OS/architecture.
///
/// The [`Debugger`](crate::Debugger) drives the target exclusively through
/// this trait; it never issues a ptrace call, decodes a trap opcode or
/// names a concrete register itself.
#[auto_impl(&mut, Box)]
pub trait ExecutionBackend {
    /// Let the target run freely until the next debug event.
    fn resume(&mut self) -> Result<()>;

    /// Execute exactly one instruction.
    fn single_step(&mut self) -> Result<()>;

    /// Non-blocking poll: has the target stopped since the last run?
    fn poll_stopped(&mut self) -> Result<bool>;

    /// Block until the target stops.
    fn wait_stopped(&mut self) -> Result<()>;

    /// Arm a code breakpoint at `addr` (e.g. patch in a trap opcode).
    fn install_trap(&mut self, addr: u64) -> Result<()>;

    /// Disarm the code breakpoint at `addr`, restoring the original bytes.
    fn remove_trap(&mut self, addr: u64) -> Result<()>;

    /// Current value of the named register.
    fn read_register(&mut self, name: &str) -> Result<u64>;

    /// Name of the program counter register.
    fn pc_register(&self) -> &str;

    /// All register names this target exposes.
    fn register_names(&self) -> Vec<String>;

    /// Width of a target pointer in bits (32 or 64 in practice).
    fn address_bits(&self) -> u32;
}

/// What the stepping logic needs to know about one decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionInfo {
    /// Encoded length in bytes.
    pub length: u64,
    /// True for call-like instructions that push a return address; these
    /// are stepped over with a one-shot breakpoint at the successor rather
    /// than a hardware single-step.
    pub saves_return: bool,
}

/// Decodes instructions out of target memory.
#[auto_impl(&mut, Box)]
pub trait InstructionDecoder {
    /// Decode the instruction at `addr`.
    fn decode_at(&mut self, memory: &mut PagedSpace, addr: u64) -> Result<InstructionInfo>;
}

/// A symbol extracted from a loaded binary image, relative to the image
/// base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSymbol {
    /// Symbol name.
    pub name: String,
    /// Offset from the image base.
    pub offset: u64,
    /// Extent in bytes; `addr..addr+extent` resolves to `name+off`. An
    /// extent of 0 or 1 marks a point symbol.
    pub extent: u64,
}

/// Everything the symbol layer keeps from parsing one image.
#[derive(Debug, Clone, Default)]
pub struct LoadedImage {
    /// Module name embedded in the image, if any.
    pub name: Option<String>,
    /// Mapped size of the image in bytes.
    pub size: u64,
    /// Exported and debug symbols.
    pub symbols: Vec<ImageSymbol>,
}

/// A binary-format parser (ELF, PE, Mach-O, ...).
#[auto_impl(&, Box)]
pub trait ImageLoader {
    /// Signature bytes identifying this format at the start of an image.
    fn magic(&self) -> &[u8];

    /// Parse the image mapped at the base of `view`.
    fn load(&self, view: &mut PagedSpace) -> Result<LoadedImage>;
}
