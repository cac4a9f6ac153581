use std::time::Duration;

use anyhow::{Context, Result};
use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{ActionPlan, ActionType, MAX_TIMING_DAYS};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8004";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;
const DEFAULT_DEBOUNCE_MS: u64 = 150;
const MIN_DEBOUNCE_MS: u64 = 100;
const MAX_DEBOUNCE_MS: u64 = 250;
const DEFAULT_REGRET_TOP_N: u32 = 20;
const DEFAULT_TRIGGER_BATCH_LIMIT: usize = 5;
const DEFAULT_IMPORTANCE_TOP_K: usize = 5;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
const MIN_PROBE_INTERVAL_SECS: u64 = 5;

/// Client configuration file (TOML). Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ClientConfig {
    /// Backend base URL used until settings override it
    #[serde(default)]
    pub api_base: Option<String>,
    /// Per-request timeout for backend calls (seconds)
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Quiet window before a slider burst is evaluated (100-250 ms)
    #[serde(default)]
    pub debounce_ms: Option<u64>,
    /// Rows requested from the batch regret endpoint
    #[serde(default)]
    pub regret_top_n: Option<u32>,
    /// Maximum ids sent by one action trigger
    #[serde(default)]
    pub trigger_batch_limit: Option<usize>,
    /// Prefix of the feature importance list kept for display
    #[serde(default)]
    pub importance_top_k: Option<usize>,
    #[serde(default)]
    pub probe_timeout_secs: Option<u64>,
    /// Enables periodic backend probing when set (minimum 5 seconds)
    #[serde(default)]
    pub probe_interval_secs: Option<u64>,
    /// JSON file backing persisted settings
    #[serde(default)]
    pub settings_path: Option<String>,
    #[serde(default)]
    pub default_action: Option<ActionType>,
    #[serde(default)]
    pub default_timing_days: Option<u32>,
}

static CONFIG_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema = schemars::schema_for!(ClientConfig);
    let schema_value = serde_json::to_value(&schema).expect("schema value");
    validator_for(&schema_value).expect("valid schema")
});

/// Returns the JSON schema describing the configuration file.
///
/// # Panics
///
/// Panics if schema generation fails; this indicates a programming error.
pub fn config_schema_json() -> serde_json::Value {
    let schema = schemars::schema_for!(ClientConfig);
    serde_json::to_value(&schema).expect("schema json")
}

pub fn write_schema_file(path: &str) -> std::io::Result<()> {
    let schema_json = config_schema_json();
    std::fs::write(path, serde_json::to_string_pretty(&schema_json)?)
}

pub fn load_config(path: &str) -> Result<ClientConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading config from {path}"))?;
    parse_config(&content).with_context(|| format!("parsing config {path}"))
}

pub fn parse_config(content: &str) -> Result<ClientConfig> {
    let raw: toml::Value = toml::from_str(content)?;
    let json_value = serde_json::to_value(&raw)?;
    let validation_errors: Vec<_> = CONFIG_SCHEMA
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(anyhow::anyhow!(validation_errors.join(", ")));
    }
    let cfg: ClientConfig = toml::from_str(content)?;
    Ok(cfg)
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl ClientConfig {
    /// Layer `CCC_*` environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(base) = env_string("CCC_API_BASE") {
            self.api_base = Some(base);
        }
        if let Some(secs) = env_u64("CCC_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = Some(secs);
        }
        if let Some(ms) = env_u64("CCC_DEBOUNCE_MS") {
            self.debounce_ms = Some(ms);
        }
        if let Some(path) = env_string("CCC_SETTINGS_PATH") {
            self.settings_path = Some(path);
        }
        self
    }

    pub fn api_base(&self) -> String {
        self.api_base
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(
            self.http_timeout_secs
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)
                .max(1),
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
                .max(1),
        )
    }

    pub fn debounce(&self) -> Duration {
        let ms = self
            .debounce_ms
            .unwrap_or(DEFAULT_DEBOUNCE_MS)
            .clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS);
        Duration::from_millis(ms)
    }

    pub fn regret_top_n(&self) -> u32 {
        self.regret_top_n.unwrap_or(DEFAULT_REGRET_TOP_N).max(1)
    }

    pub fn trigger_batch_limit(&self) -> usize {
        self.trigger_batch_limit
            .unwrap_or(DEFAULT_TRIGGER_BATCH_LIMIT)
            .max(1)
    }

    pub fn importance_top_k(&self) -> usize {
        self.importance_top_k.unwrap_or(DEFAULT_IMPORTANCE_TOP_K)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(
            self.probe_timeout_secs
                .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS)
                .max(1),
        )
    }

    pub fn probe_interval(&self) -> Option<Duration> {
        self.probe_interval_secs
            .map(|s| Duration::from_secs(s.max(MIN_PROBE_INTERVAL_SECS)))
    }

    pub fn initial_plan(&self) -> ActionPlan {
        let fallback = ActionPlan::default();
        ActionPlan {
            action_type: self.default_action.unwrap_or(fallback.action_type),
            timing_days: self
                .default_timing_days
                .unwrap_or(fallback.timing_days)
                .min(MAX_TIMING_DAYS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn defaults_apply_when_file_is_empty() {
        let cfg = parse_config("").expect("empty config");
        assert_eq!(cfg.api_base(), DEFAULT_API_BASE);
        assert_eq!(cfg.debounce(), Duration::from_millis(150));
        assert_eq!(cfg.regret_top_n(), 20);
        assert_eq!(cfg.trigger_batch_limit(), 5);
        assert_eq!(cfg.probe_timeout(), Duration::from_secs(5));
        assert!(cfg.probe_interval().is_none());
    }

    #[test]
    fn debounce_is_clamped_into_window() {
        let cfg = parse_config("debounce_ms = 5").unwrap();
        assert_eq!(cfg.debounce(), Duration::from_millis(100));
        let cfg = parse_config("debounce_ms = 900").unwrap();
        assert_eq!(cfg.debounce(), Duration::from_millis(250));
    }

    #[test]
    fn schema_rejects_wrong_types() {
        let err = parse_config("regret_top_n = \"many\"").unwrap_err();
        assert!(err.to_string().contains("many"), "{err}");
    }

    #[test]
    fn load_reads_file_and_plan() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_base = \"http://example.test/\"\ndefault_action = \"priority_support\"\ndefault_timing_days = 90"
        )
        .unwrap();
        let cfg = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.api_base(), "http://example.test");
        let plan = cfg.initial_plan();
        assert_eq!(plan.action_type, ActionType::PrioritySupport);
        assert_eq!(plan.timing_days, MAX_TIMING_DAYS);
    }

    #[test]
    #[serial]
    fn env_overrides_win() {
        std::env::set_var("CCC_API_BASE", "http://env.test");
        std::env::set_var("CCC_DEBOUNCE_MS", "200");
        let cfg = ClientConfig::default().with_env_overrides();
        std::env::remove_var("CCC_API_BASE");
        std::env::remove_var("CCC_DEBOUNCE_MS");
        assert_eq!(cfg.api_base(), "http://env.test");
        assert_eq!(cfg.debounce(), Duration::from_millis(200));
    }
}
