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

//! Logging configuration for bdbg components
//!
//! Provides centralized logging setup with:
//! - Console output with structured formatting
//! - Environment variable support (RUST_LOG)
//! - Default INFO level

use eyre::Result;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initialize console logging for a bdbg component.
///
/// Respects `RUST_LOG` when set and falls back to INFO otherwise.
///
/// # Arguments
/// * `component_name` - Name of the component (e.g., "bdbg")
pub fn init_logging(component_name: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("Failed to create environment filter");

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::debug!(component = component_name, "Logging initialized");

    Ok(())
}

/// Initialize simple logging (console only, compact formatting)
///
/// This is useful for tests or simple utilities that don't need the full
/// logging setup.
///
/// # Arguments
/// * `level` - The default log level to use
pub fn init_simple_logging(level: Level) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .expect("Failed to create environment filter");

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize simple logging: {}", e))?;

    Ok(())
}

// Global test logging initialization - ensures logging is only set up once across all tests
static TEST_LOGGING_INIT: Once = Once::new();

/// Safe logging initialization for tests - can be called multiple times without crashing
///
/// Uses `std::sync::Once` so initialization happens only once per test
/// process; later calls are no-ops. Defaults to INFO but respects
/// `RUST_LOG` when set.
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        let default_level = default_level.unwrap_or(Level::INFO);
        // Ignore any errors - if initialization fails, that's usually because
        // a subscriber is already set up, which is fine for tests
        let _ = init_simple_logging(default_level);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info, warn};

    #[test]
    fn test_logging_functions_work() {
        ensure_test_logging(None);

        // Test that we can log without errors
        info!("Test info message");
        warn!("Test warning message");
        debug!("Test debug message");
        error!("Test error message");
    }

    #[test]
    fn test_repeated_initialization_is_safe() {
        ensure_test_logging(None);
        ensure_test_logging(Some(Level::DEBUG));

        info!("Logging still works after repeated initialization");
    }
}
