//! Config - figment による設定の読み込み
//!
//! defaults → TOML ファイル → `COURIER_` 環境変数（`__` でセクション区切り）の順に上書きします。
//! 例: `COURIER_TELEGRAM__BOT_TOKEN` → `telegram.bot_token`

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::MetricsSchedule;
use crate::queue::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "courier.toml";
pub const ENV_PREFIX: &str = "COURIER_";

/// Upper bound for every interval and delay setting (one year).
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config load failed: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub workers: WorkersConfig,
    pub retry: RetryConfig,
    pub metrics: MetricsConfig,
    pub telegram: TelegramConfig,
    pub openai: OpenAiConfig,
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub count: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { count: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2_000,
            multiplier: 2.0,
            max_delay_ms: 600_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    /// How often the schedule table is scanned for due polls.
    pub sweep_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            initial_delay_secs: 3600,
            sweep_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_base_url: Option<String>,
    /// Whole-request timeout for Bot API calls.
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub text_model: Option<String>,
    pub default_prompt: Option<String>,
    /// Whole-request timeout, image download included.
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            text_model: None,
            default_prompt: None,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub root_dir: PathBuf,
    pub public_base_url: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./assets"),
            public_base_url: "http://localhost:8080/assets".to_string(),
        }
    }
}

impl CourierConfig {
    /// Load from `path` (or `courier.toml` when absent) plus env overrides.
    /// A missing file is not an error; defaults and env still apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Toml::file(file))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Toml::string(toml)),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.count == 0 {
            return Err(ConfigError::Invalid {
                key: "workers.count",
                message: "must be at least 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "retry.max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err(ConfigError::Invalid {
                key: "retry.multiplier",
                message: format!("{} is not >= 1.0", self.retry.multiplier),
            });
        }
        check_range("metrics.interval_secs", self.metrics.interval_secs, 1)?;
        check_range("metrics.initial_delay_secs", self.metrics.initial_delay_secs, 0)?;
        check_range("metrics.sweep_interval_secs", self.metrics.sweep_interval_secs, 0)?;
        check_range(
            "telegram.request_timeout_secs",
            self.telegram.request_timeout_secs,
            1,
        )?;
        check_range("openai.request_timeout_secs", self.openai.request_timeout_secs, 1)?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            multiplier: self.retry.multiplier,
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn metrics_schedule(&self) -> MetricsSchedule {
        MetricsSchedule {
            interval_secs: self.metrics.interval_secs,
            initial_delay_secs: self.metrics.initial_delay_secs,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.metrics.sweep_interval_secs.max(1))
    }

    pub fn telegram_timeout(&self) -> Duration {
        Duration::from_secs(self.telegram.request_timeout_secs)
    }

    pub fn openai_timeout(&self) -> Duration {
        Duration::from_secs(self.openai.request_timeout_secs)
    }

    pub fn telegram_token(&self) -> Result<&str, ConfigError> {
        non_empty(self.telegram.bot_token.as_deref()).ok_or(ConfigError::Missing("telegram.bot_token"))
    }

    pub fn openai_key(&self) -> Result<&str, ConfigError> {
        non_empty(self.openai.api_key.as_deref()).ok_or(ConfigError::Missing("openai.api_key"))
    }
}

fn check_range(key: &'static str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value < min || value > MAX_INTERVAL_SECS {
        return Err(ConfigError::Invalid {
            key,
            message: format!("{value} is outside {min}..={MAX_INTERVAL_SECS}"),
        });
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = CourierConfig::from_toml_str("").unwrap();
        assert_eq!(config.metrics_schedule(), MetricsSchedule::default());
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.telegram_timeout(), Duration::from_secs(30));
        assert_eq!(config.openai_timeout(), Duration::from_secs(120));
        assert!(matches!(
            config.telegram_token(),
            Err(ConfigError::Missing("telegram.bot_token"))
        ));
    }

    #[test]
    fn toml_overrides_sections() {
        let config = CourierConfig::from_toml_str(
            r#"
[workers]
count = 2

[retry]
max_attempts = 3
base_delay_ms = 500

[telegram]
bot_token = "123:abc"

[openai]
api_key = "sk-test"
text_model = "gpt-4o-mini"

[assets]
root_dir = "/var/courier/assets"
public_base_url = "https://cdn.example.com"
"#,
        )
        .unwrap();

        assert_eq!(config.workers.count, 2);
        assert_eq!(config.retry_policy().base_delay, Duration::from_millis(500));
        assert_eq!(config.retry.multiplier, 2.0);
        assert_eq!(config.telegram_token().unwrap(), "123:abc");
        assert_eq!(config.openai_key().unwrap(), "sk-test");
        assert_eq!(config.openai.text_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.assets.root_dir, PathBuf::from("/var/courier/assets"));
    }

    #[rstest]
    #[case("[workers]\ncount = 0", "workers.count")]
    #[case("[retry]\nmax_attempts = 0", "retry.max_attempts")]
    #[case("[retry]\nmultiplier = 0.5", "retry.multiplier")]
    #[case("[metrics]\ninterval_secs = 0", "metrics.interval_secs")]
    #[case("[metrics]\ninterval_secs = 31536001", "metrics.interval_secs")]
    #[case("[metrics]\ninitial_delay_secs = 9223372036854775807", "metrics.initial_delay_secs")]
    #[case("[telegram]\nrequest_timeout_secs = 0", "telegram.request_timeout_secs")]
    #[case("[openai]\nrequest_timeout_secs = 0", "openai.request_timeout_secs")]
    fn rejects_invalid_values(#[case] toml: &str, #[case] expected_key: &str) {
        match CourierConfig::from_toml_str(toml) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected invalid {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let config = CourierConfig::from_toml_str("[telegram]\nbot_token = \"  \"").unwrap();
        assert!(config.telegram_token().is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        std::fs::write(&path, "[metrics]\nsweep_interval_secs = 5\n").unwrap();

        let config = CourierConfig::load(Some(&path)).unwrap();
        assert_eq!(config.sweep_interval(), Duration::from_secs(5));
    }
}
