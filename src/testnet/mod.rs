//! Throw-away ledgers and wallets for tests
//!
//! Everything here runs at a low fixed difficulty inside temporary
//! directories.

pub mod test_utils;

pub use test_utils::*;
