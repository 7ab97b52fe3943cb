//! devops-resolver: command resolution and temporal filtering for Azure DevOps.
//!
//! Raw operator input (shorthand commands or Spanish/English free text) is
//! classified into an intent, date phrases become `[start, end)` ranges,
//! keywords become a structured filter, a backend is called, and the result
//! is rendered for a terminal.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod query;
pub mod render;
pub mod temporal;

pub use backend::{create_backend, AzureDevOpsBackend, DevOpsBackend, MemoryBackend};
pub use config::Config;
pub use engine::{CommandEngine, Session, Stage};
pub use error::{AssistError, BackendError, ConfigError, ResolveError, Result};
pub use mcp::{run_server, DevOpsServer};
pub use query::{FilterBuilder, FilterSpec, Intent, IntentClassifier};
pub use render::{Payload, RenderedOutput, ResponseFormatter};
pub use temporal::{DateRange, DateResolver, Precision};
