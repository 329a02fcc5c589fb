//! Configuration loading and config file resolution
//!
//! Config file resolution follows the usual priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`AVA_CONFIG`)
//! 3. Platform config file (`~/.config/ava/config.toml`, then `/etc/ava/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is not an error: the service starts with defaults
//! and logs a warning.

use crate::meta::MergePolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "AVA_CONFIG";

/// Stop words excluded from topic mining (English and French)
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "you", "est", "que", "pour", "avec", "from", "your", "nous", "this", "that",
    "have", "call", "bonjour", "hello", "merci", "please", "avez", "dans", "will", "just",
    "been", "could", "would",
];

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub breaker: BreakerConfig,
    pub retention: RetentionConfig,
    pub analytics: AnalyticsConfig,
    pub reconciler: ReconcilerConfig,
    pub notifications: NotificationConfig,
    pub webhooks: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5740,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("ava.db"),
        }
    }
}

/// Upstream voice provider (Vapi) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub vapi_base_url: String,
    pub timeout_secs: u64,
    /// Number of calls requested per sync
    pub sync_limit: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            vapi_base_url: "https://api.vapi.ai".to_string(),
            timeout_secs: 10,
            sync_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout_secs: 30,
            success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Transcripts are scrubbed this many hours after the call started
    pub transcript_hours: i64,
    /// Background sweep period; 0 disables the sweeper
    pub sweep_interval_secs: u64,
    /// Records older than this are deleted by the sweeper; unset disables pruning
    pub prune_after_days: Option<i64>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            transcript_hours: 24,
            sweep_interval_secs: 3600,
            prune_after_days: None,
        }
    }
}

impl RetentionConfig {
    pub fn transcript_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.transcript_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub sigma_multiplier: f64,
    pub long_call_floor_secs: f64,
    pub critical_multiplier: f64,
    pub negative_sentiment_threshold: f64,
    pub default_satisfaction: f64,
    pub stop_words: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            sigma_multiplier: 2.0,
            long_call_floor_secs: 900.0,
            critical_multiplier: 1.5,
            negative_sentiment_threshold: 0.2,
            default_satisfaction: 0.95,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Attribute otherwise unresolvable events to the first user.
    /// Only safe for single-tenant deployments.
    pub single_tenant_mode: bool,
    pub merge_policy: MergePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Without a key, summaries are logged instead of sent
    pub resend_api_key: Option<String>,
    pub from_address: String,
    pub api_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            from_address: "AVA <notifications@ava.local>".to_string(),
            api_url: "https://api.resend.com/emails".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// HMAC-SHA256 secret for `x-vapi-signature`; unset disables verification
    pub vapi_secret: Option<String>,
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from `path`, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            warn!("No config file found, using compiled defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve the config file, load it, and apply environment overrides
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_arg, CONFIG_ENV_VAR);
        let mut config = Self::load(path.as_deref())?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `AVA_PORT`, `AVA_DATABASE_PATH` and `AVA_SINGLE_TENANT_MODE`
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("AVA_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("AVA_PORT is not a valid port: {port}")))?;
        }

        if let Ok(path) = std::env::var("AVA_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Ok(flag) = std::env::var("AVA_SINGLE_TENANT_MODE") {
            self.reconciler.single_tenant_mode = parse_bool_flag(&flag).ok_or_else(|| {
                Error::Config(format!("AVA_SINGLE_TENANT_MODE is not a boolean: {flag}"))
            })?;
        }

        Ok(())
    }
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Resolve the config file path: CLI, then env var, then platform config file.
///
/// Returns `None` when nothing exists, meaning compiled defaults apply.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file
    platform_config_file()
}

fn platform_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ava").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/ava/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("ava"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/ava"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("ava"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/ava"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("ava"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\ava"))
    } else {
        PathBuf::from("./ava_data")
    }
}
