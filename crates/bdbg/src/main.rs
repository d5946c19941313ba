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

//! bdbg - Binary Image Debugger
//!
//! Command-line frontend over lazily paged file views.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;

mod cmd;
use cmd::addr_arg;

/// Command-line interface for bdbg
#[derive(Debug, Parser)]
#[command(name = "bdbg")]
#[command(about = "Binary Image Debugger - inspect, search and patch binary images")]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hex-dump a range of a file
    Hexdump {
        /// File to dump
        file: PathBuf,

        /// Start offset (decimal or 0x hex)
        #[arg(long, default_value = "0", value_parser = addr_arg)]
        start: u64,

        /// Number of bytes to dump
        #[arg(long, default_value = "256", value_parser = addr_arg)]
        length: u64,
    },
    /// Search a file for a byte pattern
    Find {
        /// File to search
        file: PathBuf,

        /// Pattern: literal text, or hex bytes with --hex
        pattern: String,

        /// Interpret the pattern as hex bytes (e.g. "deadbeef")
        #[arg(long)]
        hex: bool,

        /// Offset to start searching from
        #[arg(long, default_value = "0", value_parser = addr_arg)]
        start: u64,
    },
    /// Overwrite bytes in a file, in place
    Patch {
        /// File to patch
        file: PathBuf,

        /// Offset to patch at (decimal or 0x hex)
        #[arg(value_parser = addr_arg)]
        offset: u64,

        /// Replacement bytes as hex (e.g. "90c3")
        bytes: String,
    },
}

fn main() -> Result<()> {
    bdbg_common::init_logging("bdbg")?;
    let cli = Cli::parse();

    match &cli.command {
        Commands::Hexdump { file, start, length } => {
            let dump = cmd::hexdump_range(file, *start, *length)?;
            print!("{dump}");
        }
        Commands::Find { file, pattern, hex, start } => {
            let needle = cmd::decode_pattern(pattern, *hex)?;
            match cmd::find_pattern(file, &needle, *start)? {
                Some(addr) => println!("{addr:#x}"),
                None => {
                    println!("not found");
                    std::process::exit(1);
                }
            }
        }
        Commands::Patch { file, offset, bytes } => {
            let data = cmd::decode_pattern(bytes, true)?;
            cmd::patch_bytes(file, *offset, &data)?;
            println!("patched {} bytes at {offset:#x}", data.len());
        }
    }

    Ok(())
}
