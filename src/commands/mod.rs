//! # CLI Command Implementations
//!
//! Each subcommand of `heat-merge` lives in its own module with:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command, calling into the `heat_merge` library for the actual work.

pub mod completions;
pub mod merge;
