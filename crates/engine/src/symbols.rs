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

//! Address-to-name resolution: module map, exact and ranged symbols.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Placeholder module name for addresses outside every known module.
pub const UNKNOWN_MODULE: &str = "???";

/// One loaded module's address range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Module name, as embedded in the image or synthesized from the base
    /// address.
    pub name: String,
    /// Base address (inclusive).
    pub start: u64,
    /// End address (exclusive).
    pub end: u64,
}

impl ModuleEntry {
    /// True iff `addr` falls inside the module.
    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }
}

/// The symbol database built up by image loading.
///
/// Exact symbols map one address to a name; ranged symbols additionally
/// carry an extent so interior addresses resolve to `name+off`. The
/// processed-name set makes image loading idempotent within a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolIndex {
    modules: HashMap<String, ModuleEntry>,
    symbols: BTreeMap<u64, String>,
    symbol_lengths: BTreeMap<u64, u64>,
    processed: HashSet<String>,
}

impl SymbolIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a module covering `start..end`. A later registration under
    /// the same name replaces the range.
    pub fn register_module(&mut self, name: impl Into<String>, start: u64, end: u64) {
        let name = name.into();
        trace!(%name, start = format_args!("{start:#x}"), end = format_args!("{end:#x}"), "module");
        self.modules.insert(name.clone(), ModuleEntry { name, start, end });
    }

    /// Record a symbol at absolute address `addr`. An `extent` above 1
    /// makes it ranged; otherwise any stale extent from a previous
    /// registration at this address is dropped.
    pub fn register_symbol(&mut self, addr: u64, name: impl Into<String>, extent: u64) {
        self.symbols.insert(addr, name.into());
        if extent > 1 {
            self.symbol_lengths.insert(addr, extent);
        } else {
            self.symbol_lengths.remove(&addr);
        }
    }

    /// The module containing `addr`, if any.
    pub fn find_module(&self, addr: u64) -> Option<&ModuleEntry> {
        self.modules.values().find(|m| m.contains(addr))
    }

    /// The exact symbol at `addr`, if any.
    pub fn symbol_at(&self, addr: u64) -> Option<&str> {
        self.symbols.get(&addr).map(String::as_str)
    }

    /// Human-readable name for `addr`.
    ///
    /// In order of preference: `mod!sym` for an exact hit, `mod!sym+off`
    /// (hex offset) when a ranged symbol covers `addr`, and `mod!0xaddr`
    /// otherwise. The module part is `???` outside every known module.
    pub fn describe(&self, addr: u64) -> String {
        let module = self.find_module(addr).map_or(UNKNOWN_MODULE, |m| m.name.as_str());
        if let Some(name) = self.symbols.get(&addr) {
            return format!("{module}!{name}");
        }
        // Ranged symbols may nest; take the nearest base that encloses addr.
        for (&base, &len) in self.symbol_lengths.range(..addr).rev() {
            if addr < base + len {
                if let Some(name) = self.symbols.get(&base) {
                    return format!("{module}!{name}+{:x}", addr - base);
                }
            }
        }
        format!("{module}!{addr:#x}")
    }

    /// Mark `name` as processed; returns false if it already was.
    pub fn mark_processed(&mut self, name: &str) -> bool {
        self.processed.insert(name.to_owned())
    }

    /// Has an image under `name` already been processed this session?
    pub fn is_processed(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    /// All known modules, in no particular order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.modules.values()
    }

    /// All exact symbols, ordered by address.
    pub fn symbols(&self) -> impl Iterator<Item = (u64, &str)> {
        self.symbols.iter().map(|(&a, n)| (a, n.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SymbolIndex {
        let mut idx = SymbolIndex::new();
        idx.register_module("libfoo", 0x1000, 0x3000);
        idx.register_symbol(0x1100, "init", 1);
        idx.register_symbol(0x1200, "table", 0x40);
        idx
    }

    #[test]
    fn test_exact_symbol() {
        assert_eq!(sample().describe(0x1100), "libfoo!init");
    }

    #[test]
    fn test_ranged_symbol_offset_is_bare_hex() {
        let idx = sample();
        assert_eq!(idx.describe(0x1210), "libfoo!table+10");
        assert_eq!(idx.describe(0x123f), "libfoo!table+3f");
    }

    #[test]
    fn test_past_ranged_symbol_falls_back_to_address() {
        assert_eq!(sample().describe(0x1240), "libfoo!0x1240");
    }

    #[test]
    fn test_outside_all_modules() {
        assert_eq!(sample().describe(0x9000), "???!0x9000");
    }

    #[test]
    fn test_module_end_is_exclusive() {
        let idx = sample();
        assert_eq!(idx.find_module(0x2fff).map(|m| m.name.as_str()), Some("libfoo"));
        assert!(idx.find_module(0x3000).is_none());
    }

    #[test]
    fn test_nested_ranged_symbols() {
        let mut idx = SymbolIndex::new();
        idx.register_module("libfoo", 0x1000, 0x2000);
        idx.register_symbol(0x1000, "outer", 0x200);
        idx.register_symbol(0x1100, "inner", 0x10);

        // Inside the inner extent, the nearest base wins.
        assert_eq!(idx.describe(0x1108), "libfoo!inner+8");
        // Past the inner extent but still inside the outer one.
        assert_eq!(idx.describe(0x1150), "libfoo!outer+150");
        assert_eq!(idx.describe(0x1200), "libfoo!0x1200");
    }

    #[test]
    fn test_reregistration_drops_stale_extent() {
        let mut idx = sample();
        // 0x1200 was ranged; re-register as a point symbol.
        idx.register_symbol(0x1200, "table", 1);
        assert_eq!(idx.describe(0x1210), "libfoo!0x1210");
    }

    #[test]
    fn test_processed_set_is_per_name() {
        let mut idx = SymbolIndex::new();
        assert!(idx.mark_processed("libfoo"));
        assert!(!idx.mark_processed("libfoo"));
        assert!(idx.is_processed("libfoo"));
        assert!(!idx.is_processed("libbar"));
    }
}
