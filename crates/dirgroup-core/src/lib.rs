//! Dirgroup Core Library
//!
//! Error type, configuration and the value types shared by the directory
//! group resolver: distinguished names, search filters, dynamic member
//! search expressions and principals.

pub mod config;
pub mod error;
pub mod types;

pub use config::DirgroupConfig;
pub use error::{Error, Result};

/// Dirgroup version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default nested-group recursion ceiling
pub const DEFAULT_MAX_DEPTH: usize = 5;
