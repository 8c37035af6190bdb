//! # Buckaroo CLI
//!
//! This is the binary entry point for the `buckaroo` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Initializing logging from `--log-level` and `RUST_LOG`.
//! - Running the selected command and turning failures into a non-zero exit.
//!
//! The install engine itself lives in the `buckaroo` library crate; the
//! binary is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
