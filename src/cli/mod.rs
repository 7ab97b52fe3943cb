//! CLI front end: an interactive loop and one-shot resolution.

mod commands;
mod output;

pub use commands::*;
