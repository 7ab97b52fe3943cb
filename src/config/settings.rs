//! Configuration settings for the resolver, its backends and the MCP server.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub server: ServerConfig,
    pub render: RenderConfig,
    pub query: QueryConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit path, the default locations, or defaults.
    ///
    /// Environment overrides (`AZDO_ORG`, `AZDO_PROJECT`, `AZDO_PAT`) are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::info!("Loading config from: {}", path.display());
            return Ok(Self::from_file(path)?.with_env_overrides());
        }

        let config_paths = [
            PathBuf::from("devops-resolver.toml"),
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .map(|p| p.join("devops-resolver/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                tracing::info!("Loading config from: {}", path.display());
                return Ok(Self::from_file(path)?.with_env_overrides());
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default().with_env_overrides())
    }

    /// Apply the environment variables the Azure DevOps tooling conventionally uses.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(org) = std::env::var("AZDO_ORG") {
            if !org.is_empty() {
                self.backend.organization = org;
            }
        }
        if let Ok(project) = std::env::var("AZDO_PROJECT") {
            if !project.is_empty() {
                self.backend.project = project;
            }
        }
        if self.backend.pat.is_none() {
            self.backend.pat = std::env::var("AZDO_PAT").ok().filter(|p| !p.is_empty());
        }
        self
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.render.indent_width == 0 {
            return Err(ConfigError::Invalid("render.indent_width must be > 0".to_string()).into());
        }
        if self.render.wrap_width < 20 {
            return Err(
                ConfigError::Invalid("render.wrap_width must be at least 20".to_string()).into(),
            );
        }
        if self.backend.batch_size == 0 {
            return Err(ConfigError::Invalid("backend.batch_size must be > 0".to_string()).into());
        }
        Ok(())
    }
}

/// Which backend collaborator to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Azure DevOps REST API
    #[default]
    Azure,
    /// In-process sample data
    Memory,
}

/// Backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Organization URL, e.g. `https://dev.azure.com/contoso`
    pub organization: String,
    /// Default project
    pub project: String,
    /// Personal access token (loaded from `AZDO_PAT` if not set)
    pub pat: Option<String>,
    pub api_version: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum ids per work item details request
    pub batch_size: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Azure,
            organization: String::new(),
            project: String::new(),
            pat: None,
            api_version: "7.0".to_string(),
            timeout_secs: 30,
            batch_size: 200,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Transport type: "stdio" or "http"
    pub transport: TransportType,
    /// HTTP port (only used when transport is "http")
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportType::Stdio,
            http_port: 8080,
        }
    }
}

/// Transport type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Stdio,
    Http,
}

/// Output rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Spaces per nesting level
    pub indent_width: usize,
    /// Column at which plain text is wrapped
    pub wrap_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent_width: 2,
            wrap_width: 100,
        }
    }
}

/// What to do with a free-text query whose date phrase is malformed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidDatePolicy {
    /// Report the error and skip the backend call
    #[default]
    Reject,
    /// Drop the temporal filter and run the query anyway
    Ignore,
}

/// Query resolution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub invalid_date: InvalidDatePolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.transport, TransportType::Stdio);
        assert_eq!(config.backend.kind, BackendKind::Azure);
        assert_eq!(config.backend.api_version, "7.0");
        assert_eq!(config.query.invalid_date, InvalidDatePolicy::Reject);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [backend]
            kind = "memory"
            organization = "https://dev.azure.com/contoso"
            project = "Fabrikam"

            [server]
            transport = "http"
            http_port = 9090

            [render]
            wrap_width = 72

            [query]
            invalid_date = "ignore"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.backend.project, "Fabrikam");
        assert_eq!(config.server.transport, TransportType::Http);
        assert_eq!(config.server.http_port, 9090);
        assert_eq!(config.render.wrap_width, 72);
        assert_eq!(config.render.indent_width, 2);
        assert_eq!(config.query.invalid_date, InvalidDatePolicy::Ignore);
    }

    #[test]
    fn test_validate_zero_indent() {
        let toml = r#"
            [render]
            indent_width = 0
        "#;

        let result = Config::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_narrow_wrap() {
        let toml = r#"
            [render]
            wrap_width = 10
        "#;

        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backend]\nproject = \"Demo\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.backend.project, "Demo");
    }
}
