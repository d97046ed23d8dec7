// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tocsin.toml` > `~/.config/tocsin/tocsin.toml` > `/etc/tocsin/tocsin.toml`
//! with environment variable overrides via `TOCSIN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::TocsinConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tocsin/tocsin.toml` (system-wide)
/// 3. `~/.config/tocsin/tocsin.toml` (user XDG config)
/// 4. `./tocsin.toml` (local directory)
/// 5. `TOCSIN_*` environment variables
pub fn load_config() -> Result<TocsinConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TocsinConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TocsinConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TocsinConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TocsinConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TocsinConfig::default()))
        .merge(Toml::file("/etc/tocsin/tocsin.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tocsin/tocsin.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("tocsin.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section-to-dot mapping.
///
/// `Env::split("_")` would turn `TOCSIN_STORAGE_DATABASE_PATH` into
/// `storage.database.path`; only the first underscore after the section name
/// is a separator.
/// Keys reach the map still uppercase, so they are lowered first.
fn env_provider() -> Env {
    Env::prefixed("TOCSIN_").map(|key| {
        let mapped = key
            .as_str()
            .to_ascii_lowercase()
            .replacen("storage_", "storage.", 1)
            .replacen("evaluator_", "evaluator.", 1)
            .replacen("log_", "log.", 1);
        mapped.into()
    })
}
