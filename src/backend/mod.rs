//! Backends the engine dispatches resolved commands to.
//!
//! - [`AzureDevOpsBackend`]: the Azure DevOps REST API, authenticated with a
//!   personal access token.
//! - [`MemoryBackend`]: an in-process store with the same response shapes,
//!   used offline and in tests.

mod azure;
mod memory;
pub mod model;
mod traits;
pub mod wiql;

pub use azure::AzureDevOpsBackend;
pub use memory::MemoryBackend;
pub use model::NewPullRequest;
pub use traits::{BackendResult, DevOpsBackend};

use std::sync::Arc;

use crate::config::{BackendConfig, BackendKind};
use crate::error::Result;

/// Create a backend from configuration.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn DevOpsBackend>> {
    match config.kind {
        BackendKind::Azure => {
            let backend = AzureDevOpsBackend::from_config(config)?;
            Ok(Arc::new(backend))
        }
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::seeded())),
    }
}
