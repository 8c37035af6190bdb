//! # CLI Command Implementations
//!
//! Each subcommand lives in its own file with:
//! - an `Args` struct derived with `clap`;
//! - an `execute` function that calls into the `buckaroo` library.

pub mod install;
