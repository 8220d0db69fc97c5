// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based layered loading.
//!
//! Merge order, later wins: compiled defaults, `/etc/palaver/palaver.toml`,
//! `~/.config/palaver/palaver.toml`, `./palaver.toml`, `PALAVER_*` env vars.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PalaverConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/palaver/palaver.toml";
pub(crate) const LOCAL_CONFIG: &str = "palaver.toml";

/// Sections whose keys may be overridden from the environment.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "storage",
    "whatsapp",
    "pipeline",
    "knowledge",
    "gateway",
];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("palaver").join(LOCAL_CONFIG))
}

/// Loads configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<PalaverConfig, figment::Error> {
    build_figment().extract()
}

/// Loads from an inline TOML string over defaults, ignoring files and env.
pub fn load_config_from_str(toml_content: &str) -> Result<PalaverConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PalaverConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads an explicit file with env overrides, skipping the hierarchy.
pub fn load_config_from_path(path: &Path) -> Result<PalaverConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PalaverConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PalaverConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// `PALAVER_WHATSAPP_AUTH_DIR` maps to `whatsapp.auth_dir`.
///
/// Only the section prefix is split off, so underscores inside key names
/// survive.
fn env_provider() -> Env {
    Env::prefixed("PALAVER_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
