//! Rendering of backend payloads for the terminal and MCP clients.

mod formatter;

pub use formatter::{Payload, RenderedOutput, ResponseFormatter};
