//! Command-line interface
//!
//! Argument parsing for the `minichain` binary.

pub mod commands;

pub use commands::{Command, Opt};
