//! Configuration loading tests
//!
//! - Missing config file falls back to compiled defaults
//! - Partial TOML files only override the keys they name
//! - Config path priority: CLI > ENV > platform file
//! - Scalar environment overrides
//!
//! Tests that touch process environment variables are marked #[serial].

use ava_common::config::{resolve_config_path, AppConfig, CONFIG_ENV_VAR, DEFAULT_STOP_WORDS};
use ava_common::MergePolicy;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

fn clear_env() {
    for key in [CONFIG_ENV_VAR, "AVA_PORT", "AVA_DATABASE_PATH", "AVA_SINGLE_TENANT_MODE"] {
        env::remove_var(key);
    }
}

#[test]
fn test_defaults() {
    let config = AppConfig::default();

    assert_eq!(config.breaker.failure_threshold, 3);
    assert_eq!(config.breaker.recovery_timeout_secs, 30);
    assert_eq!(config.breaker.success_threshold, 2);
    assert_eq!(config.retention.transcript_hours, 24);
    assert_eq!(config.retention.prune_after_days, None);
    assert_eq!(config.analytics.sigma_multiplier, 2.0);
    assert_eq!(config.analytics.long_call_floor_secs, 900.0);
    assert_eq!(config.analytics.critical_multiplier, 1.5);
    assert_eq!(config.analytics.negative_sentiment_threshold, 0.2);
    assert_eq!(config.analytics.default_satisfaction, 0.95);
    assert_eq!(config.analytics.stop_words.len(), DEFAULT_STOP_WORDS.len());
    assert!(!config.reconciler.single_tenant_mode);
    assert_eq!(config.reconciler.merge_policy, MergePolicy::LastWriteWins);
    assert_eq!(config.provider.vapi_base_url, "https://api.vapi.ai");
    assert!(config.webhooks.vapi_secret.is_none());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = AppConfig::from_toml_str(
        r#"
        [server]
        port = 9000

        [reconciler]
        single_tenant_mode = true
        merge_policy = "prefer_non_null"

        [retention]
        prune_after_days = 90
        "#,
    )
    .unwrap();

    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert!(config.reconciler.single_tenant_mode);
    assert_eq!(config.reconciler.merge_policy, MergePolicy::PreferNonNull);
    assert_eq!(config.retention.prune_after_days, Some(90));
    assert_eq!(config.retention.transcript_hours, 24);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = AppConfig::from_toml_str("[server]\nport = \"not a number\"").unwrap_err();
    assert!(matches!(err, ava_common::Error::Config(_)), "got {err:?}");
}

#[test]
fn test_load_without_file_uses_defaults() {
    let config = AppConfig::load(None).unwrap();
    assert_eq!(config.server.port, AppConfig::default().server.port);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[analytics]\nstop_words = [\"foo\"]").unwrap();

    let config = AppConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.analytics.stop_words, vec!["foo".to_string()]);
}

#[test]
fn test_load_missing_explicit_file_is_error() {
    let result = AppConfig::load(Some(Path::new("/nonexistent/ava/config.toml")));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cli_path_wins_over_env() {
    clear_env();
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")), CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(PathBuf::from("/from/env.toml")));

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    env::set_var("AVA_PORT", "6123");
    env::set_var("AVA_DATABASE_PATH", "/tmp/ava-env.db");
    env::set_var("AVA_SINGLE_TENANT_MODE", "true");

    let mut config = AppConfig::default();
    config.apply_env_overrides().unwrap();

    assert_eq!(config.server.port, 6123);
    assert_eq!(config.database.path, PathBuf::from("/tmp/ava-env.db"));
    assert!(config.reconciler.single_tenant_mode);

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_override_is_error() {
    clear_env();
    env::set_var("AVA_PORT", "seventy");

    let mut config = AppConfig::default();
    assert!(config.apply_env_overrides().is_err());

    clear_env();
}
