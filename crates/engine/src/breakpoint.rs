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

//! Breakpoint bookkeeping shared by the run-state machine.

use serde::{Deserialize, Serialize};

/// Whether the breakpoint is currently armed in the target.
///
/// The breakpoint at the program counter is disarmed while the target is
/// stopped on it, so the original instruction can be read and stepped;
/// the pre-run sweep re-arms it on the next transition to running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointState {
    /// Trap bytes are installed in the target.
    Active,
    /// Tracked but not installed.
    Inactive,
}

/// What kind of event the breakpoint traps on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointKind {
    /// Software code breakpoint.
    Code,
}

/// One breakpoint, keyed by address in the debugger's table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Removed automatically the first time the target stops on it.
    pub oneshot: bool,
    /// Armed or not.
    pub state: BreakpointState,
    /// Trap kind.
    pub kind: BreakpointKind,
    /// Free-form annotation (set by frontends, ignored by the core).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,
}

impl Breakpoint {
    /// A freshly armed code breakpoint.
    pub fn code(oneshot: bool) -> Self {
        Self { oneshot, state: BreakpointState::Active, kind: BreakpointKind::Code, info: None }
    }

    /// Fold a duplicate registration into this breakpoint. A breakpoint
    /// stays permanent unless every registration asked for oneshot.
    pub fn merge_registration(&mut self, oneshot: bool) {
        self.oneshot &= oneshot;
    }
}
