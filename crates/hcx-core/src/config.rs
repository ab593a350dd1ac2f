use crate::retry::{ExponentialDelay, FixedDelay, NoRetry, PolicyError, Strategy};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Which retry strategy to build from `[retry]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    None,
    Fixed,
    #[default]
    Exponential,
}

/// Retry parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// "none", "fixed" or "exponential".
    pub strategy: StrategyKind,
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Fixed delay, or exponential base delay, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound of the random jitter added to each delay, in milliseconds.
    pub max_jitter_ms: u64,
    /// Ceiling on cumulative backoff (exponential only), in milliseconds.
    pub max_total_delay_ms: u64,
    /// Wait used for a 429 without a usable Retry-After header, in seconds.
    pub default_retry_after_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Exponential,
            max_attempts: 3,
            base_delay_ms: 500,
            max_jitter_ms: 100,
            max_total_delay_ms: 3000,
            default_retry_after_secs: 1,
        }
    }
}

impl RetryConfig {
    /// Build the configured strategy. Fails if `max_attempts` is zero.
    pub fn build(&self) -> Result<Strategy, PolicyError> {
        let jitter = Duration::from_millis(self.max_jitter_ms);
        let retry_after = Duration::from_secs(self.default_retry_after_secs);
        let strategy = match self.strategy {
            StrategyKind::None => Strategy::None(NoRetry),
            StrategyKind::Fixed => Strategy::Fixed(
                FixedDelay::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))?
                    .with_max_jitter(jitter)
                    .with_default_retry_after(retry_after),
            ),
            StrategyKind::Exponential => Strategy::Exponential(
                ExponentialDelay::new(
                    self.max_attempts,
                    Duration::from_millis(self.base_delay_ms),
                    Duration::from_millis(self.max_total_delay_ms),
                )?
                .with_max_jitter(jitter)
                .with_default_retry_after(retry_after),
            ),
        };
        Ok(strategy)
    }
}

/// Global configuration loaded from `~/.config/hcx/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HcxConfig {
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Connect timeout per attempt, in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout per attempt, in seconds.
    pub timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for HcxConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("hcx/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout_secs: 30,
            timeout_secs: 3600,
            retry: None,
        }
    }
}

impl HcxConfig {
    /// The `[retry]` section, or defaults when absent.
    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hcx")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HcxConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HcxConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HcxConfig = toml::from_str(&data)?;
    Ok(cfg)
}
