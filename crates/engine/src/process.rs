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

//! Process enumeration and attach-target selection.

use std::fmt;
use std::path::PathBuf;

use auto_impl::auto_impl;
use eyre::Result;
use serde::{Deserialize, Serialize};

/// One running process as seen by a [`ProcessLister`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Process id.
    pub pid: u32,
    /// Paths of the modules mapped into the process, main image first.
    pub module_paths: Vec<PathBuf>,
}

impl ProcessInfo {
    /// File name of the main image, if known.
    pub fn image_name(&self) -> Option<&str> {
        self.module_paths.first().and_then(|p| p.file_name()).and_then(|n| n.to_str())
    }
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pid, self.image_name().unwrap_or("<unknown>"))
    }
}

/// Platform hook that enumerates running processes.
#[auto_impl(&, Box)]
pub trait ProcessLister {
    /// Snapshot of the currently running processes.
    fn list_processes(&self) -> Result<Vec<ProcessInfo>>;
}

/// Pick an attach target from a user-supplied selector.
///
/// A selector matching a substring of any module path wins first; failing
/// that, a selector parsing as a decimal pid matches by id. This keeps
/// `"1234"` usable as a name for an unfortunately named binary while still
/// accepting raw pids.
pub fn find_process(lister: &dyn ProcessLister, selector: &str) -> Result<Option<ProcessInfo>> {
    let processes = lister.list_processes()?;
    if let Some(p) = processes
        .iter()
        .find(|p| p.module_paths.iter().any(|m| m.to_string_lossy().contains(selector)))
    {
        return Ok(Some(p.clone()));
    }
    if let Ok(pid) = selector.parse::<u32>() {
        return Ok(processes.into_iter().find(|p| p.pid == pid));
    }
    Ok(None)
}
