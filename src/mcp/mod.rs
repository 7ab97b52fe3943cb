//! MCP server exposing the command resolver.

mod server;
mod tools;
mod transport;

pub use server::*;
pub use tools::*;
pub use transport::*;
