//! TOML configuration.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration. CLI flags are applied on top by the binary.

use crate::decision::DecisionConfig;
use crate::domain::DEFAULT_INITIAL_CAPITAL;
use crate::report::AlertThresholds;
use crate::scheduler::ScheduleConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSettings {
    pub path: PathBuf,
    pub initial_capital: f64,
}

impl Default for PortfolioSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("outputs/paper_portfolio.json"),
            initial_capital: DEFAULT_INITIAL_CAPITAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub interval_hours: f64,
    pub history_path: PathBuf,
    pub retention_days: i64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_hours: 4.0,
            history_path: PathBuf::from("logs/cycle_history.jsonl"),
            retention_days: 30,
        }
    }
}

/// Longest accepted scheduler interval (one year).
pub const MAX_INTERVAL_HOURS: f64 = 24.0 * 366.0;
/// Longest accepted cycle-history retention (ten years).
pub const MAX_RETENTION_DAYS: i64 = 3_650;
/// Most quote retries per request window.
pub const MAX_QUOTE_RETRIES: u32 = 10;

impl ScheduleSettings {
    /// Check an interval in hours, from the file or a command-line override.
    pub fn check_interval_hours(hours: f64) -> Result<f64, ConfigError> {
        if hours.is_finite() && hours > 0.0 && hours <= MAX_INTERVAL_HOURS {
            Ok(hours)
        } else {
            Err(ConfigError::Invalid(format!(
                "schedule.interval_hours must be in (0, {MAX_INTERVAL_HOURS}], got {hours}"
            )))
        }
    }

    pub fn to_schedule(&self, max_cycles: Option<usize>) -> Result<ScheduleConfig, ConfigError> {
        let hours = Self::check_interval_hours(self.interval_hours)?;
        let interval = Duration::try_from_secs_f64(hours * 3600.0)
            .map_err(|e| ConfigError::Invalid(format!("schedule.interval_hours: {e}")))?;
        Ok(ScheduleConfig {
            interval,
            max_cycles,
            ..ScheduleConfig::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSettings {
    pub path: PathBuf,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("outputs/predictions.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub cooldown_secs: u64,
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            cooldown_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub dir: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("reports"),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    pub portfolio: PortfolioSettings,
    pub trading: DecisionConfig,
    pub schedule: ScheduleSettings,
    pub predictions: PredictionSettings,
    pub quotes: QuoteSettings,
    pub reports: ReportSettings,
    pub alerts: AlertThresholds,
}

impl TraderConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            log::debug!("loading config from {}", path.display());
            Self::from_file(path)
        } else {
            log::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let capital = self.portfolio.initial_capital;
        if !capital.is_finite() || capital <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "portfolio.initial_capital must be positive, got {capital}"
            )));
        }
        self.trading.validate().map_err(ConfigError::Invalid)?;
        ScheduleSettings::check_interval_hours(self.schedule.interval_hours)?;
        let retention = self.schedule.retention_days;
        if !(1..=MAX_RETENTION_DAYS).contains(&retention) {
            return Err(ConfigError::Invalid(format!(
                "schedule.retention_days must be in 1..={MAX_RETENTION_DAYS}, got {retention}"
            )));
        }
        if self.quotes.timeout_secs == 0 {
            return Err(ConfigError::Invalid("quotes.timeout_secs must be > 0".into()));
        }
        if self.quotes.max_retries > MAX_QUOTE_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "quotes.max_retries must be at most {MAX_QUOTE_RETRIES}, got {}",
                self.quotes.max_retries
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = TraderConfig::from_toml("").unwrap();
        assert_eq!(cfg, TraderConfig::default());
        assert_eq!(cfg.portfolio.initial_capital, 10_000.0);
        assert_eq!(cfg.trading.min_confidence, 0.6);
        assert_eq!(cfg.schedule.interval_hours, 4.0);
        assert_eq!(cfg.alerts.max_portfolio_loss, 0.10);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = TraderConfig::from_toml(
            r#"
            [portfolio]
            initial_capital = 2500.0

            [trading]
            min_confidence = 0.75
            "#,
        )
        .unwrap();
        assert_eq!(cfg.portfolio.initial_capital, 2_500.0);
        assert_eq!(cfg.portfolio.path, PathBuf::from("outputs/paper_portfolio.json"));
        assert_eq!(cfg.trading.min_confidence, 0.75);
        assert_eq!(cfg.trading.max_position_size, 0.2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            TraderConfig::from_toml("[portfolio]\ninitial_capital = -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TraderConfig::from_toml("[trading]\nmax_position_size = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TraderConfig::from_toml("[schedule]\ninterval_hours = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TraderConfig::from_toml("portfolio = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for toml in [
            "[schedule]\ninterval_hours = 1e300",
            "[schedule]\ninterval_hours = 10000.0",
            "[schedule]\nretention_days = 9223372036854775807",
            "[quotes]\nmax_retries = 33",
        ] {
            assert!(
                matches!(TraderConfig::from_toml(toml), Err(ConfigError::Invalid(_))),
                "accepted: {toml}"
            );
        }
        assert!(ScheduleSettings::check_interval_hours(f64::NAN).is_err());
        assert_eq!(ScheduleSettings::check_interval_hours(24.0).unwrap(), 24.0);
    }

    #[test]
    fn to_schedule_rejects_unchecked_interval() {
        let s = ScheduleSettings {
            interval_hours: 1e300,
            ..ScheduleSettings::default()
        };
        assert!(matches!(s.to_schedule(None), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = TraderConfig::default();
        let text = cfg.to_toml().unwrap();
        assert_eq!(TraderConfig::from_toml(&text).unwrap(), cfg);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TraderConfig::load_or_default(&dir.path().join("none.toml")).unwrap();
        assert_eq!(cfg, TraderConfig::default());
    }

    #[test]
    fn schedule_interval_conversion() {
        let s = ScheduleSettings {
            interval_hours: 0.5,
            ..ScheduleSettings::default()
        };
        let cfg = s.to_schedule(Some(2)).unwrap();
        assert_eq!(cfg.interval, Duration::from_secs(1800));
        assert_eq!(cfg.max_cycles, Some(2));
    }
}
