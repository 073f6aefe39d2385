//! Integration tests for configuration validation

#![allow(clippy::expect_used)]

use packet_dispatch::config::{NetworkConfig, MAX_READ_BUF_LEN};
use packet_dispatch::error::DispatchError;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = NetworkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_max_connections() {
    let mut config = NetworkConfig::default();
    config.server.max_connections = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max connections must be greater than 0")));
}

#[test]
fn test_tiny_read_timeout() {
    let mut config = NetworkConfig::default();
    config.server.read_timeout_ms = 2;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Read timeout too short")));
}

#[test]
fn test_short_shutdown_timeout() {
    let mut config = NetworkConfig::default();
    config.server.shutdown_timeout_ms = 500;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Shutdown timeout too short")));
}

#[test]
fn test_read_len_smaller_than_header() {
    let mut config = NetworkConfig::default();
    config.router.max_read_len = 4;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max read length too small")));
}

#[test]
fn test_empty_app_name() {
    let mut config = NetworkConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_validate_strict_collects_all_errors() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.address = String::new();
        c.router.max_read_len = 0;
    });

    match config.validate_strict() {
        Err(DispatchError::ConfigError(msg)) => {
            assert!(msg.contains("Server address cannot be empty"));
            assert!(msg.contains("Max read length too small"));
        }
        other => panic!("Expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_from_toml_partial() {
    let config = NetworkConfig::from_toml(
        r#"
        [server]
        address = "0.0.0.0:7100"
        max_connections = 16
        read_timeout_ms = 1500
        shutdown_timeout_ms = 5000

        [logging]
        app_name = "edge"
        log_level = "debug"
        json_format = true
        "#,
    )
    .expect("valid TOML");

    assert_eq!(config.server.address, "0.0.0.0:7100");
    assert_eq!(config.server.read_timeout(), Some(Duration::from_millis(1500)));
    assert_eq!(config.router.max_read_len, MAX_READ_BUF_LEN);
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);
}

#[test]
fn test_from_toml_rejects_bad_level() {
    let result = NetworkConfig::from_toml(
        r#"
        [logging]
        app_name = "x"
        log_level = "loud"
        json_format = false
        "#,
    );
    assert!(matches!(result, Err(DispatchError::ConfigError(_))));
}

#[test]
fn test_serialized_config_roundtrips() {
    let text = NetworkConfig::default().to_toml().expect("serialize");
    let parsed = NetworkConfig::from_toml(&text).expect("example config parses");
    assert_eq!(parsed.server.address, NetworkConfig::default().server.address);
    assert_eq!(parsed.router.max_read_len, MAX_READ_BUF_LEN);
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!(
        "packet-dispatch-config-{}.toml",
        std::process::id()
    ));
    let config = NetworkConfig::default_with_overrides(|c| c.router.max_read_len = 4096);
    config.save_to_file(&path).expect("save");

    let loaded = NetworkConfig::from_file(&path).expect("load");
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded.router.max_read_len, 4096);
}

#[test]
fn test_missing_file() {
    let result = NetworkConfig::from_file("/nonexistent/packet-dispatch.toml");
    assert!(matches!(result, Err(DispatchError::ConfigError(_))));
}

#[test]
fn test_from_env_overrides_defaults() {
    std::env::set_var("PACKET_DISPATCH_MAX_CONNECTIONS", "77");
    std::env::set_var("PACKET_DISPATCH_LOG_LEVEL", "warn");

    let result = NetworkConfig::from_env();

    std::env::remove_var("PACKET_DISPATCH_MAX_CONNECTIONS");
    std::env::remove_var("PACKET_DISPATCH_LOG_LEVEL");

    let config = result.expect("valid overrides");
    assert_eq!(config.server.max_connections, 77);
    assert_eq!(config.logging.log_level, Level::WARN);
    assert_eq!(config.router.max_read_len, MAX_READ_BUF_LEN);
}
