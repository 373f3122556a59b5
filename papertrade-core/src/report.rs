//! Daily reports, performance metrics, and threshold alerts.
//!
//! One `daily_report_<YYYY-MM-DD>.json` per day in the reports directory;
//! writing the same day twice replaces the earlier snapshot. Metrics are
//! computed over the day-to-day changes in reported portfolio value.

use crate::engine::Valuation;
use crate::domain::Portfolio;
use crate::store::write_atomic;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub generated_at: NaiveDateTime,
    pub portfolio_value: f64,
    pub cash: f64,
    pub positions: usize,
    pub total_trades: usize,
    pub daily_trades: usize,
    #[serde(default)]
    pub total_return_pct: f64,
}

impl DailyReport {
    pub fn build(portfolio: &Portfolio, valuation: &Valuation, now: NaiveDateTime) -> Self {
        let date = now.date();
        Self {
            date,
            generated_at: now,
            portfolio_value: valuation.total_value,
            cash: portfolio.cash,
            positions: portfolio.positions.len(),
            total_trades: portfolio.trade_history.len(),
            daily_trades: portfolio.trades_on(date).count(),
            total_return_pct: valuation.total_return_pct(portfolio.initial_capital),
        }
    }

    pub fn file_name(date: NaiveDate) -> String {
        format!("daily_report_{}.json", date.format("%Y-%m-%d"))
    }
}

/// Directory of daily report files.
#[derive(Debug, Clone)]
pub struct ReportArchive {
    dir: PathBuf,
}

impl ReportArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, report: &DailyReport) -> Result<PathBuf, ReportError> {
        let path = self.dir.join(DailyReport::file_name(report.date));
        let json = serde_json::to_vec_pretty(report)?;
        write_atomic(&path, &json).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        log::info!("daily report saved: {}", path.display());
        Ok(path)
    }

    /// Every readable report, oldest first. Unreadable files are skipped.
    pub fn load_all(&self) -> Result<Vec<DailyReport>, ReportError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ReportError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut reports = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ReportError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            let is_report = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("daily_report_") && n.ends_with(".json"));
            if !is_report {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| {
                    serde_json::from_str::<DailyReport>(&text).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(report) => reports.push(report),
                Err(e) => log::warn!("skipping unreadable report {}: {e}", path.display()),
            }
        }
        reports.sort_by_key(|r| r.date);
        Ok(reports)
    }

    /// Reports dated within the last `days` days up to and including `today`.
    pub fn load_recent(&self, days: i64, today: NaiveDate) -> Result<Vec<DailyReport>, ReportError> {
        let cutoff = chrono::Duration::try_days(days)
            .and_then(|span| today.checked_sub_signed(span))
            .unwrap_or(NaiveDate::MIN);
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.date >= cutoff && r.date <= today)
            .collect())
    }
}

/// Summary statistics over a series of daily reports.
///
/// Returns are fractions (0.05 = 5 %). Volatility is the population standard
/// deviation of day-to-day returns; Sharpe assumes a zero risk-free rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub avg_daily_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    pub days_tracked: usize,
    pub initial_value: f64,
    pub current_value: f64,
}

impl PerformanceMetrics {
    /// `None` when fewer than two reports are available.
    pub fn from_reports(reports: &[DailyReport]) -> Option<Self> {
        if reports.len() < 2 {
            return None;
        }
        let mut sorted: Vec<&DailyReport> = reports.iter().collect();
        sorted.sort_by_key(|r| r.date);

        let initial_value = sorted[0].portfolio_value;
        let current_value = sorted[sorted.len() - 1].portfolio_value;
        let total_return = if initial_value > 0.0 {
            (current_value - initial_value) / initial_value
        } else {
            0.0
        };

        let returns: Vec<f64> = sorted
            .windows(2)
            .filter(|w| w[0].portfolio_value > 0.0)
            .map(|w| (w[1].portfolio_value - w[0].portfolio_value) / w[0].portfolio_value)
            .collect();

        let (avg_daily_return, volatility, sharpe_ratio, win_rate) = if returns.is_empty() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let n = returns.len() as f64;
            let mean = returns.iter().sum::<f64>() / n;
            let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
            let vol = var.sqrt();
            let sharpe = if vol > 0.0 { mean / vol } else { 0.0 };
            let wins = returns.iter().filter(|r| **r > 0.0).count() as f64;
            (mean, vol, sharpe, wins / n)
        };

        Some(Self {
            total_return,
            avg_daily_return,
            volatility,
            sharpe_ratio,
            win_rate,
            days_tracked: returns.len(),
            initial_value,
            current_value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Cycle loss (fraction of value before the cycle) that raises an alert.
    pub alert_on_loss: f64,
    pub alert_on_gain: f64,
    /// Drawdown from initial capital that raises an alert.
    pub max_portfolio_loss: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            alert_on_loss: 0.05,
            alert_on_gain: 0.05,
            max_portfolio_loss: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    CycleLoss { change: f64 },
    CycleGain { change: f64 },
    Drawdown { total_return: f64 },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::CycleLoss { change } => {
                write!(f, "portfolio fell {:.2}% this cycle", change.abs() * 100.0)
            }
            Alert::CycleGain { change } => {
                write!(f, "portfolio rose {:.2}% this cycle", change * 100.0)
            }
            Alert::Drawdown { total_return } => write!(
                f,
                "portfolio down {:.2}% from initial capital",
                total_return.abs() * 100.0
            ),
        }
    }
}

/// Alerts raised by a move from `value_before` to `value_after`.
pub fn evaluate_alerts(
    thresholds: &AlertThresholds,
    initial_capital: f64,
    value_before: f64,
    value_after: f64,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if value_before > 0.0 {
        let change = (value_after - value_before) / value_before;
        if change <= -thresholds.alert_on_loss {
            alerts.push(Alert::CycleLoss { change });
        } else if change >= thresholds.alert_on_gain {
            alerts.push(Alert::CycleGain { change });
        }
    }
    if initial_capital > 0.0 {
        let total_return = (value_after - initial_capital) / initial_capital;
        if total_return < -thresholds.max_portfolio_loss {
            alerts.push(Alert::Drawdown { total_return });
        }
    }
    for alert in &alerts {
        log::warn!("ALERT: {alert}");
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(day: u32, value: f64) -> DailyReport {
        let date = NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
        DailyReport {
            date,
            generated_at: date.and_hms_opt(18, 0, 0).unwrap(),
            portfolio_value: value,
            cash: value,
            positions: 0,
            total_trades: 0,
            daily_trades: 0,
            total_return_pct: 0.0,
        }
    }

    #[test]
    fn metrics_need_two_reports() {
        assert!(PerformanceMetrics::from_reports(&[]).is_none());
        assert!(PerformanceMetrics::from_reports(&[report(1, 100.0)]).is_none());
    }

    #[test]
    fn metrics_over_series() {
        let reports = vec![report(3, 121.0), report(1, 100.0), report(2, 110.0)];
        let m = PerformanceMetrics::from_reports(&reports).unwrap();
        assert!((m.total_return - 0.21).abs() < 1e-12);
        assert_eq!(m.days_tracked, 2);
        assert!((m.avg_daily_return - 0.10).abs() < 1e-12);
        assert!(m.volatility < 1e-12);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.win_rate, 1.0);
        assert_eq!(m.initial_value, 100.0);
        assert_eq!(m.current_value, 121.0);
    }

    #[test]
    fn mixed_returns_win_rate() {
        let reports = vec![report(1, 100.0), report(2, 90.0), report(3, 99.0)];
        let m = PerformanceMetrics::from_reports(&reports).unwrap();
        assert_eq!(m.win_rate, 0.5);
        assert!(m.volatility > 0.0);
    }

    #[test]
    fn alerts_fire_on_thresholds() {
        let t = AlertThresholds::default();
        assert!(evaluate_alerts(&t, 10_000.0, 10_000.0, 10_100.0).is_empty());

        let alerts = evaluate_alerts(&t, 10_000.0, 10_000.0, 9_400.0);
        assert!(matches!(alerts[0], Alert::CycleLoss { .. }));
        assert_eq!(alerts.len(), 1);

        let alerts = evaluate_alerts(&t, 10_000.0, 10_000.0, 10_600.0);
        assert!(matches!(alerts[0], Alert::CycleGain { .. }));

        let alerts = evaluate_alerts(&t, 10_000.0, 8_900.0, 8_850.0);
        assert_eq!(alerts, vec![Alert::Drawdown { total_return: -0.115 }]);
    }

    #[test]
    fn archive_round_trip_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ReportArchive::new(dir.path().join("reports"));
        assert!(archive.load_all().unwrap().is_empty());

        archive.save(&report(2, 105.0)).unwrap();
        archive.save(&report(1, 100.0)).unwrap();
        fs::write(archive.dir().join("daily_report_2024-07-09.json"), "{oops").unwrap();
        fs::write(archive.dir().join("notes.txt"), "ignore me").unwrap();

        let all = archive.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].date, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());

        let today = NaiveDate::from_ymd_opt(2024, 7, 8).unwrap();
        let recent = archive.load_recent(6, today).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].portfolio_value, 105.0);
        assert_eq!(archive.load_recent(i64::MAX, today).unwrap().len(), 2);
    }

    #[test]
    fn file_name_format() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(DailyReport::file_name(d), "daily_report_2024-01-05.json");
    }
}
