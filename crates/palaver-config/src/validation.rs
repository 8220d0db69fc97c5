// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks run after deserialization.
//!
//! All problems are collected; validation never stops at the first one.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{PalaverConfig, ProviderKind};

/// Validates a deserialized configuration.
pub fn validate_config(config: &PalaverConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".into());
    }

    if !has_scheme(&config.whatsapp.bridge_url, &["ws://", "wss://"]) {
        fail(format!(
            "whatsapp.bridge_url `{}` must start with ws:// or wss://",
            config.whatsapp.bridge_url
        ));
    }
    if !has_scheme(&config.whatsapp.bridge_http_url, &["http://", "https://"]) {
        fail(format!(
            "whatsapp.bridge_http_url `{}` must start with http:// or https://",
            config.whatsapp.bridge_http_url
        ));
    }
    if config.whatsapp.auth_dir.trim().is_empty() {
        fail("whatsapp.auth_dir must not be empty".into());
    }

    if config.pipeline.history_limit == 0 {
        fail("pipeline.history_limit must be at least 1".into());
    }
    if config.pipeline.default_daily_message_limit < 0 {
        fail(format!(
            "pipeline.default_daily_message_limit must be non-negative, got {}",
            config.pipeline.default_daily_message_limit
        ));
    }
    if config.pipeline.fallback_reply.trim().is_empty() {
        fail("pipeline.fallback_reply must not be empty".into());
    }
    if config.pipeline.quota_reply.trim().is_empty() {
        fail("pipeline.quota_reply must not be empty".into());
    }

    if config.knowledge.chunk_size < 50 {
        fail(format!(
            "knowledge.chunk_size must be at least 50, got {}",
            config.knowledge.chunk_size
        ));
    }
    if !(0.0..=1.0).contains(&config.knowledge.min_score) {
        fail(format!(
            "knowledge.min_score must be between 0.0 and 1.0, got {}",
            config.knowledge.min_score
        ));
    }

    let mut seen = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        if provider.name.trim().is_empty() {
            fail(format!("providers[{i}].name must not be empty"));
        } else if !seen.insert(provider.name.as_str()) {
            fail(format!(
                "duplicate provider name `{}` in [[providers]]",
                provider.name
            ));
        }
        if provider.model.trim().is_empty() {
            fail(format!("providers[{i}].model must not be empty"));
        }
        if provider.max_tokens == 0 {
            fail(format!("providers[{i}].max_tokens must be at least 1"));
        }
        if provider.kind == ProviderKind::Anthropic && provider.transcription_model.is_some() {
            fail(format!(
                "providers[{i}].transcription_model is only supported for kind = \"openai\""
            ));
        }
    }

    if config.gateway.enabled && config.gateway.host.parse::<std::net::IpAddr>().is_err() {
        fail(format!(
            "gateway.host `{}` is not a valid IP address",
            config.gateway.host
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes.iter().any(|s| url.starts_with(s))
}
