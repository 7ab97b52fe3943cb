//! Command and query resolution.
//!
//! This module provides:
//! - Intent classification for shorthand commands, id lookups and free text
//! - Filter extraction from free text (resource, type/status hint, terms)

pub mod classifier;
pub mod filter;
pub mod types;

pub use classifier::*;
pub use filter::*;
pub use types::*;
