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

//! The debugger run-state machine.
//!
//! [`Debugger`] ties together a paged view of the target's address space,
//! a breakpoint table, the symbol index and an [`ExecutionBackend`]. The
//! invariant it maintains across every run transition: while the target is
//! stopped, the breakpoint at the program counter is disarmed so the
//! original instruction is readable and steppable; it is re-armed by the
//! pre-run sweep on the next transition to running.

use std::collections::{BTreeMap, HashMap};

use eyre::Result;
use tracing::{debug, trace, warn};

use bdbg_memory::PagedSpace;

use crate::{
    address_mask, Breakpoint, BreakpointState, ExecutionBackend, Expr, ImageLoader,
    InstructionDecoder, SymbolIndex,
};

/// Address span handed to an image loader, measured from the image base.
const MAX_IMAGE_SPAN: u64 = 0x1000_0000;

/// Range claimed by the stub module registered when parsing an image
/// fails.
const STUB_MODULE_SIZE: u64 = 0x1000;

/// Whether the target is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// The target is stopped under debugger control.
    Stopped,
    /// The target is (believed to be) running.
    Running,
}

/// A debugging session over one target.
pub struct Debugger<B, D> {
    memory: PagedSpace,
    backend: B,
    decoder: D,
    breakpoints: BTreeMap<u64, Breakpoint>,
    symbols: SymbolIndex,
    loaders: Vec<Box<dyn ImageLoader>>,
    state: RunState,
}

impl<B: ExecutionBackend, D: InstructionDecoder> Debugger<B, D> {
    /// Build a session over an attached, stopped target.
    pub fn new(memory: PagedSpace, backend: B, decoder: D) -> Self {
        Self {
            memory,
            backend,
            decoder,
            breakpoints: BTreeMap::new(),
            symbols: SymbolIndex::new(),
            loaders: Vec::new(),
            state: RunState::Stopped,
        }
    }

    /// Register a binary-format loader for [`Debugger::load_symbols`].
    pub fn register_loader(&mut self, loader: Box<dyn ImageLoader>) {
        self.loaders.push(loader);
    }

    /// The target's address space.
    pub fn memory(&mut self) -> &mut PagedSpace {
        &mut self.memory
    }

    /// The execution backend.
    pub fn backend(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Current run state as last observed.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The breakpoint table, keyed by address.
    pub fn breakpoints(&self) -> &BTreeMap<u64, Breakpoint> {
        &self.breakpoints
    }

    /// The symbol database.
    pub fn symbols(&self) -> &SymbolIndex {
        &self.symbols
    }

    /// Mutable access to the symbol database.
    pub fn symbols_mut(&mut self) -> &mut SymbolIndex {
        &mut self.symbols
    }

    /// Current program counter.
    pub fn pc(&mut self) -> Result<u64> {
        let reg = self.backend.pc_register().to_owned();
        self.backend.read_register(&reg)
    }

    /// Register a code breakpoint at `addr`.
    ///
    /// Registering on an existing breakpoint merges instead of stacking:
    /// the breakpoint survives as permanent unless every registration was
    /// oneshot.
    pub fn bpx(&mut self, addr: u64, oneshot: bool) -> Result<()> {
        if let Some(bp) = self.breakpoints.get_mut(&addr) {
            trace!(addr = format_args!("{addr:#x}"), "merging duplicate breakpoint");
            bp.merge_registration(oneshot);
            return Ok(());
        }
        debug!(addr = format_args!("{addr:#x}"), oneshot, "installing breakpoint");
        self.backend.install_trap(addr)?;
        self.breakpoints.insert(addr, Breakpoint::code(oneshot));
        Ok(())
    }

    /// Remove the breakpoint at `addr`, disarming it first if needed.
    pub fn clear_breakpoint(&mut self, addr: u64) -> Result<()> {
        if let Some(bp) = self.breakpoints.remove(&addr) {
            if bp.state == BreakpointState::Active {
                self.backend.remove_trap(addr)?;
            }
        }
        Ok(())
    }

    /// Pre-run sweep: drop stale cached memory, re-arm every disarmed
    /// breakpoint except the one at `exclude`, and flip to running.
    fn check_pre_run(&mut self, exclude: Option<u64>) -> Result<()> {
        self.memory.invalidate();
        let to_arm: Vec<u64> = self
            .breakpoints
            .iter()
            .filter(|(&a, bp)| Some(a) != exclude && bp.state == BreakpointState::Inactive)
            .map(|(&a, _)| a)
            .collect();
        for addr in to_arm {
            self.backend.install_trap(addr)?;
            if let Some(bp) = self.breakpoints.get_mut(&addr) {
                bp.state = BreakpointState::Active;
            }
        }
        self.state = RunState::Running;
        Ok(())
    }

    /// Post-stop sweep: disarm the breakpoint at the new program counter
    /// so the trapped instruction is readable, and retire it if oneshot.
    fn check_post_run(&mut self) -> Result<()> {
        let addr = self.pc()?;
        if let Some(bp) = self.breakpoints.get_mut(&addr) {
            if bp.state == BreakpointState::Active {
                self.backend.remove_trap(addr)?;
                bp.state = BreakpointState::Inactive;
            }
            if bp.oneshot {
                trace!(addr = format_args!("{addr:#x}"), "retiring oneshot breakpoint");
                self.breakpoints.remove(&addr);
            }
        }
        Ok(())
    }

    /// Resume free execution.
    ///
    /// If a breakpoint sits at the current program counter, the trapped
    /// instruction is stepped over first (blocking until that step
    /// lands), the breakpoint is re-armed, and only then does the target
    /// run freely.
    pub fn continue_execution(&mut self) -> Result<()> {
        let addr = self.pc()?;
        self.check_pre_run(Some(addr))?;
        if self.breakpoints.contains_key(&addr) {
            debug!(addr = format_args!("{addr:#x}"), "stepping over breakpoint before resume");
            self.step_over()?;
            self.wait_target()?;
            self.check_pre_run(None)?;
        }
        self.backend.resume()
    }

    /// Execute one instruction.
    pub fn single_step(&mut self) -> Result<()> {
        let addr = self.pc()?;
        self.check_pre_run(Some(addr))?;
        self.backend.single_step()
    }

    /// Step one instruction, not descending into calls.
    ///
    /// Call-like instructions get a oneshot breakpoint at their successor
    /// and a free run; everything else is a plain single step.
    pub fn step_over(&mut self) -> Result<()> {
        let addr = self.pc()?;
        self.check_pre_run(Some(addr))?;
        let insn = self.decoder.decode_at(&mut self.memory, addr)?;
        if insn.saves_return {
            self.bpx(addr.wrapping_add(insn.length), true)?;
            self.backend.resume()
        } else {
            self.backend.single_step()
        }
    }

    /// Non-blocking check for a debug event. Returns true and runs the
    /// post-stop sweep if the target has stopped.
    pub fn check_target(&mut self) -> Result<bool> {
        if !self.backend.poll_stopped()? {
            return Ok(false);
        }
        self.state = RunState::Stopped;
        self.check_post_run()?;
        Ok(true)
    }

    /// Block until the target stops, then run the post-stop sweep.
    pub fn wait_target(&mut self) -> Result<()> {
        self.backend.wait_stopped()?;
        self.state = RunState::Stopped;
        self.check_post_run()
    }

    /// Evaluate `expr` against the current register file and target
    /// memory. Unresolvable parts stay symbolic in the returned tree.
    pub fn resolve_expr(&mut self, expr: &Expr) -> Result<Expr> {
        let mut bindings = HashMap::new();
        for reg in self.backend.register_names() {
            let value = self.backend.read_register(&reg)?;
            bindings.insert(reg, value);
        }
        let mask = address_mask(self.backend.address_bits());
        Ok(expr.bind(&bindings).reduce(&mut self.memory, mask))
    }

    /// [`Debugger::resolve_expr`] narrowed to a constant, or `None` if
    /// anything stayed symbolic.
    pub fn resolve_to_int(&mut self, expr: &Expr) -> Result<Option<u64>> {
        Ok(self.resolve_expr(expr)?.as_int())
    }

    /// Human-readable name for `addr`, e.g. `libc!malloc+2a`.
    pub fn describe_address(&self, addr: u64) -> String {
        self.symbols.describe(addr)
    }

    /// Try to parse a binary image mapped at `addr` and merge its modules
    /// and symbols into the index. Returns true iff an image was parsed.
    ///
    /// `name` overrides the dedup key and fallback module name; by default
    /// the base address is used. A recognized magic whose parse then fails
    /// registers a small stub module so the address range still resolves.
    pub fn load_symbols(&mut self, addr: u64, name: Option<&str>) -> Result<bool> {
        let Ok(offset) = i64::try_from(addr) else { return Ok(false) };
        let Some(loader) = self.match_loader(offset) else { return Ok(false) };

        let default_name = match name {
            Some(n) => n.to_owned(),
            None => format!("{addr:08x}"),
        };
        if self.symbols.is_processed(&default_name) {
            return Ok(false);
        }
        self.symbols.mark_processed(&default_name);

        let span = MAX_IMAGE_SPAN.min(self.memory.len().saturating_sub(addr));
        let mut view = self.memory.subview(offset, span)?;
        let image = match self.loaders[loader].load(&mut view) {
            Ok(image) => image,
            Err(err) => {
                warn!(addr = format_args!("{addr:#x}"), %err, "image parse failed, registering stub");
                self.symbols.register_module(default_name, addr, addr + STUB_MODULE_SIZE);
                return Ok(false);
            }
        };

        let module = image.name.unwrap_or_else(|| default_name.clone());
        if module != default_name && !self.symbols.mark_processed(&module) {
            return Ok(false);
        }
        debug!(
            %module,
            addr = format_args!("{addr:#x}"),
            size = image.size,
            symbols = image.symbols.len(),
            "image loaded"
        );
        self.symbols.register_module(module, addr, addr + image.size);
        for sym in image.symbols {
            self.symbols.register_symbol(addr + sym.offset, sym.name, sym.extent);
        }
        Ok(true)
    }

    /// First loader whose magic matches the bytes at `offset`.
    fn match_loader(&mut self, offset: i64) -> Option<usize> {
        for (i, loader) in self.loaders.iter().enumerate() {
            let magic = loader.magic();
            if magic.is_empty() {
                continue;
            }
            if let Some(peek) = self.memory.read(offset, magic.len() as u64) {
                if peek.into_bytes() == magic {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Probe every page-aligned address up to `addr_limit` for a loadable
    /// image. Returns how many images were found.
    pub fn scan_images(&mut self, addr_limit: u64) -> Result<usize> {
        let page = self.memory.page_size();
        let mut found = 0;
        let mut addr = 0u64;
        while addr <= addr_limit {
            if self.load_symbols(addr, None)? {
                found += 1;
            }
            addr = match addr.checked_add(page) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(found)
    }
}
