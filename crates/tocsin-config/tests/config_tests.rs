// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Tocsin configuration system.

use tocsin_config::diagnostic::ConfigError;
use tocsin_config::model::TocsinConfig;
use tocsin_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_tocsin_config() {
    let toml = r#"
[storage]
database_path = "/tmp/incidents.db"
wal_mode = false
busy_timeout_ms = 250
query_timeout_ms = 750

[evaluator]
max_window = 64
evaluation_timeout_ms = 2000

[log]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.storage.database_path, "/tmp/incidents.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.busy_timeout_ms, 250);
    assert_eq!(config.storage.query_timeout().as_millis(), 750);
    assert_eq!(config.evaluator.max_window, 64);
    assert_eq!(config.evaluator.evaluation_timeout().as_secs(), 2);
    assert_eq!(config.log.level, "debug");
}

/// Missing sections fall back to compiled defaults.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML is valid");
    let defaults = TocsinConfig::default();
    assert_eq!(config.storage.database_path, defaults.storage.database_path);
    assert!(config.storage.wal_mode);
    assert_eq!(config.storage.query_timeout_ms, 5_000);
    assert_eq!(config.evaluator.max_window, 1_000);
    assert_eq!(config.log.level, "info");
}

/// Unknown keys are rejected with a suggestion and the list of valid keys.
#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[storage]
query_timout_ms = 10
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "query_timout_ms"
                && suggestion.as_deref() == Some("query_timeout_ms")
                && valid_keys.contains("database_path")
        })
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

/// Unknown top-level sections are rejected too.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[transport]
port = 8080
"#;
    assert!(load_config_from_str(toml).is_err());
}

/// A string where a number is expected produces an InvalidType diagnostic.
#[test]
fn invalid_type_is_reported() {
    let toml = r#"
[evaluator]
max_window = "lots"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("max_window"))),
        "got: {errors:?}"
    );
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_errors_surface_through_loader() {
    let toml = r#"
[evaluator]
max_window = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("max_window = 0 is invalid");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("max_window"))));
}

/// ConfigError renders through miette without panicking.
#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::Validation {
        message: "storage.database_path must not be empty".into(),
    };
    let mut out = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut out, &error)
        .expect("render should succeed");
    assert!(out.contains("database_path"));
}

/// The defaults written out as TOML load back unchanged.
#[test]
fn default_config_serializes_to_loadable_toml() {
    let mut config = TocsinConfig::default();
    config.storage.database_path = "/var/lib/tocsin/tocsin.db".into();
    config.evaluator.max_window = 250;

    let written = toml::to_string(&config).expect("config should serialize");
    assert!(written.contains("[evaluator]"));

    let loaded = load_and_validate_str(&written).expect("written config should load");
    assert_eq!(loaded.storage.database_path, "/var/lib/tocsin/tocsin.db");
    assert_eq!(loaded.evaluator.max_window, 250);
    assert_eq!(loaded.log.level, "info");
}
