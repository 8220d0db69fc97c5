// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading.

use palaver_config::diagnostic::ConfigError;
use palaver_config::model::{PalaverConfig, ProviderKind};
use palaver_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "palaver-test"
log_level = "debug"

[storage]
database_path = "/tmp/palaver.db"
wal_mode = false

[whatsapp]
bridge_url = "wss://bridge.internal"
bridge_http_url = "https://bridge.internal"
auth_dir = "/var/lib/palaver/auth"
restore_delay_secs = 0

[pipeline]
history_limit = 6
knowledge_top_k = 3
default_daily_message_limit = 20
fallback_reply = "oops"
quota_reply = "limit"

[knowledge]
enabled = false
chunk_size = 400
min_score = 0.2

[[providers]]
name = "openai"
kind = "openai"
api_key = "sk-1"
model = "gpt-4o-mini"
transcription_model = "whisper-1"
priority = 10

[[providers]]
name = "claude"
kind = "anthropic"
api_key = "sk-ant"
model = "claude-3-5-haiku-latest"
max_tokens = 2048
active = false

[gateway]
enabled = true
host = "0.0.0.0"
port = 8080
bearer_token = "secret"
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.service.name, "palaver-test");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/palaver.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.whatsapp.bridge_url, "wss://bridge.internal");
    assert_eq!(config.whatsapp.restore_delay_secs, 0);
    assert_eq!(config.pipeline.history_limit, 6);
    assert_eq!(config.pipeline.default_daily_message_limit, 20);
    assert!(!config.knowledge.enabled);
    assert_eq!(config.providers.len(), 2);
    assert_eq!(config.providers[0].kind, ProviderKind::Openai);
    assert_eq!(config.providers[0].max_tokens, 1024);
    assert!(config.providers[0].active);
    assert_eq!(config.providers[1].kind, ProviderKind::Anthropic);
    assert!(!config.providers[1].active);
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.gateway.bearer_token.as_deref(), Some("secret"));
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.service.name, "palaver");
    assert_eq!(config.pipeline.history_limit, 10);
    assert_eq!(config.pipeline.knowledge_top_k, 5);
    assert!(config.providers.is_empty());
    assert!(config.storage.database_path.ends_with("palaver.db"));
    assert!(config.storage.wal_mode);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[pipeline]
histroy_limit = 4
"#;
    let errors = load_and_validate_str(toml).expect_err("typo must be rejected");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion, .. }
                if key == "histroy_limit" && suggestion.as_deref() == Some("history_limit")
        )
    });
    assert!(found, "expected suggestion, got: {errors:?}");
}

#[test]
fn unknown_provider_kind_is_rejected() {
    let toml = r#"
[[providers]]
name = "x"
kind = "cohere"
model = "m"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn provider_without_model_reports_missing_key() {
    let toml = r#"
[[providers]]
name = "x"
kind = "openai"
"#;
    let errors = load_and_validate_str(toml).expect_err("model is required");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingKey { key } if key.ends_with("model"))),
        "got: {errors:?}"
    );
}

#[test]
fn dotted_override_reaches_nested_key() {
    use figment::{Figment, providers::Serialized};

    let config: PalaverConfig = Figment::new()
        .merge(Serialized::defaults(PalaverConfig::default()))
        .merge(("whatsapp.auth_dir", "/srv/auth"))
        .extract()
        .expect("override should merge");
    assert_eq!(config.whatsapp.auth_dir, "/srv/auth");
}

#[test]
#[serial_test::serial]
fn explicit_path_with_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("palaver.toml");
    std::fs::write(&path, "[gateway]\nport = 9000\n").unwrap();

    // SAFETY: serialized test, no other thread reads the environment.
    unsafe { std::env::set_var("PALAVER_PIPELINE_HISTORY_LIMIT", "4") };
    let result = load_and_validate_path(&path);
    unsafe { std::env::remove_var("PALAVER_PIPELINE_HISTORY_LIMIT") };

    let config = result.expect("valid config");
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.pipeline.history_limit, 4);
}

#[test]
fn validation_errors_surface_through_loader() {
    let toml = r#"
[knowledge]
chunk_size = 10
"#;
    let errors = load_and_validate_str(toml).expect_err("chunk_size too small");
    assert!(matches!(&errors[0], ConfigError::Validation { message } if message.contains("chunk_size")));
}
