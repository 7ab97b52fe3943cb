//! Date phrase resolution.

mod resolver;
mod types;

pub use resolver::{resolve, DateResolver, MAX_YEAR, MIN_YEAR};
pub use types::{DateMatch, DateRange, Precision};
