//! Configuration loading from files.

use std::io::Write;

use tempfile::NamedTempFile;

use devops_resolver::config::{BackendKind, Config, InvalidDatePolicy, TransportType};

#[test]
fn test_load_explicit_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[backend]
kind = "memory"
project = "Fabrikam"

[server]
transport = "http"
http_port = 9090

[render]
indent_width = 4

[query]
invalid_date = "ignore"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.backend.kind, BackendKind::Memory);
    assert_eq!(config.backend.project, "Fabrikam");
    assert_eq!(config.backend.api_version, "7.0");
    assert_eq!(config.server.transport, TransportType::Http);
    assert_eq!(config.server.http_port, 9090);
    assert_eq!(config.render.indent_width, 4);
    assert_eq!(config.render.wrap_width, 100);
    assert_eq!(config.query.invalid_date, InvalidDatePolicy::Ignore);
}

#[test]
fn test_invalid_render_settings_are_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[render]\nwrap_width = 5").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::from_file(dir.path().join("absent.toml")).is_err());
}
