//! Configuration management
//!
//! Typed node settings resolved from defaults, an optional `minichain.toml`
//! and environment variables, in that order.

pub mod settings;

pub use settings::{Config, GLOBAL_CONFIG};
