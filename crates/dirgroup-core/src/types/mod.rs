//! Core types for Dirgroup

mod dn;
mod entry;
pub mod filter;
mod principal;
mod search_url;

pub use dn::*;
pub use entry::*;
pub use filter::{FilterOp, FilterValue};
pub use principal::*;
pub use search_url::*;
