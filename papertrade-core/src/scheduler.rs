//! Polling scheduler and the cycle history log.
//!
//! `run_schedule` runs a cycle, records it, sleeps `interval` in short
//! slices, and repeats until `max_cycles` is reached or the cancel flag is
//! set. A failing cycle is logged and recorded; the loop keeps going.
//!
//! Cycle history is JSONL: one `CycleRecord` per line, append-only, with
//! malformed lines skipped on read. `prune` drops records older than the
//! retention window.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::store::write_atomic;

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub interval: Duration,
    /// Stop after this many cycles. `None` runs until cancelled.
    pub max_cycles: Option<usize>,
    /// Sleep slice between cancel-flag checks.
    pub poll: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(4 * 60 * 60),
            max_cycles: None,
            poll: Duration::from_secs(1),
        }
    }
}

/// What a successful cycle reports back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleOutcome {
    pub trades_executed: usize,
    pub portfolio_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: usize,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub success: bool,
    #[serde(default)]
    pub trades_executed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// JSONL cycle log.
#[derive(Debug, Clone)]
pub struct CycleHistory {
    path: PathBuf,
    retention: chrono::Duration,
}

impl CycleHistory {
    pub fn new(path: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            path: path.into(),
            retention: chrono::Duration::try_days(retention_days.max(0))
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &CycleRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }

    pub fn read_all(&self) -> io::Result<Vec<CycleRecord>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CycleRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => log::debug!("skipping malformed cycle record: {e}"),
            }
        }
        Ok(records)
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> io::Result<Vec<CycleRecord>> {
        let mut all = self.read_all()?;
        let start = all.len().saturating_sub(n);
        Ok(all.split_off(start))
    }

    /// Rewrite the log without records older than the retention window.
    /// Returns how many were dropped.
    pub fn prune(&self, now: NaiveDateTime) -> io::Result<usize> {
        let records = self.read_all()?;
        let cutoff = now
            .checked_sub_signed(self.retention)
            .unwrap_or(NaiveDateTime::MIN);
        let total = records.len();
        let kept: Vec<_> = records
            .into_iter()
            .filter(|r| r.finished_at >= cutoff)
            .collect();
        let dropped = total - kept.len();
        if dropped == 0 {
            return Ok(0);
        }

        let mut out = String::new();
        for record in &kept {
            let json = serde_json::to_string(record)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            out.push_str(&json);
            out.push('\n');
        }
        write_atomic(&self.path, out.as_bytes())?;
        log::info!("pruned {dropped} cycle records older than {cutoff}");
        Ok(dropped)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleSummary {
    pub cycles_run: usize,
    pub cycles_failed: usize,
    pub total_trades: usize,
    pub cancelled: bool,
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|c| c.load(Ordering::Relaxed))
}

/// Sleep for `total`, waking every `poll` to check the cancel flag.
/// Returns `true` if cancelled.
fn interruptible_sleep(total: Duration, poll: Duration, cancel: Option<&AtomicBool>) -> bool {
    let deadline = Instant::now() + total;
    let slice = poll.max(Duration::from_millis(1));
    loop {
        if is_cancelled(cancel) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(slice.min(deadline - now));
    }
}

/// Run `cycle` repeatedly on a fixed interval.
///
/// `cycle` receives the 1-based cycle number. Errors are strings so callers
/// can fold any error type in; they are logged and recorded, never fatal.
pub fn run_schedule<F>(
    config: &ScheduleConfig,
    history: Option<&CycleHistory>,
    cancel: Option<&AtomicBool>,
    mut cycle: F,
) -> ScheduleSummary
where
    F: FnMut(usize) -> Result<CycleOutcome, String>,
{
    let mut summary = ScheduleSummary::default();
    log::info!(
        "scheduler started: every {:?}{}",
        config.interval,
        config
            .max_cycles
            .map(|n| format!(", {n} cycles"))
            .unwrap_or_default()
    );

    loop {
        if is_cancelled(cancel) {
            summary.cancelled = true;
            break;
        }

        let number = summary.cycles_run + 1;
        log::info!("=== cycle {number} ===");
        let started_at = Local::now().naive_local();
        let result = cycle(number);
        let finished_at = Local::now().naive_local();
        summary.cycles_run = number;

        let record = match result {
            Ok(outcome) => {
                summary.total_trades += outcome.trades_executed;
                log::info!(
                    "cycle {number} completed: {} trades, portfolio ${:.2}",
                    outcome.trades_executed,
                    outcome.portfolio_value
                );
                CycleRecord {
                    cycle: number,
                    started_at,
                    finished_at,
                    success: true,
                    trades_executed: outcome.trades_executed,
                    portfolio_value: Some(outcome.portfolio_value),
                    error: None,
                }
            }
            Err(e) => {
                summary.cycles_failed += 1;
                log::error!("cycle {number} failed: {e}");
                CycleRecord {
                    cycle: number,
                    started_at,
                    finished_at,
                    success: false,
                    trades_executed: 0,
                    portfolio_value: None,
                    error: Some(e),
                }
            }
        };

        if let Some(history) = history {
            if let Err(e) = history.append(&record) {
                log::warn!("failed to append cycle history: {e}");
            }
            if let Err(e) = history.prune(finished_at) {
                log::warn!("failed to prune cycle history: {e}");
            }
        }

        if config.max_cycles.is_some_and(|max| number >= max) {
            break;
        }

        let next = Local::now().naive_local()
            + chrono::Duration::from_std(config.interval).unwrap_or(chrono::Duration::zero());
        log::info!("next cycle at {}", next.format("%Y-%m-%d %H:%M:%S"));
        if interruptible_sleep(config.interval, config.poll, cancel) {
            summary.cancelled = true;
            break;
        }
    }

    log::info!(
        "scheduler stopped after {} cycles ({} failed, {} trades)",
        summary.cycles_run,
        summary.cycles_failed,
        summary.total_trades
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, day)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn record(cycle: usize, day: u32) -> CycleRecord {
        CycleRecord {
            cycle,
            started_at: at(day),
            finished_at: at(day),
            success: true,
            trades_executed: 1,
            portfolio_value: Some(10_000.0),
            error: None,
        }
    }

    fn fast(max: usize) -> ScheduleConfig {
        ScheduleConfig {
            interval: Duration::from_millis(1),
            max_cycles: Some(max),
            poll: Duration::from_millis(1),
        }
    }

    #[test]
    fn history_append_and_read_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        let history = CycleHistory::new(dir.path().join("logs").join("cycles.jsonl"), 30);
        history.append(&record(1, 1)).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(history.path()).unwrap();
            writeln!(f, "not json").unwrap();
            writeln!(f).unwrap();
        }
        history.append(&record(2, 2)).unwrap();

        let all = history.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].cycle, 2);
        assert_eq!(history.recent(1).unwrap()[0].cycle, 2);
    }

    #[test]
    fn prune_drops_old_records() {
        let dir = tempfile::tempdir().unwrap();
        let history = CycleHistory::new(dir.path().join("cycles.jsonl"), 5);
        for (i, day) in [1, 2, 10, 20].into_iter().enumerate() {
            history.append(&record(i + 1, day)).unwrap();
        }
        let dropped = history.prune(at(12)).unwrap();
        assert_eq!(dropped, 2);
        let cycles: Vec<_> = history.read_all().unwrap().iter().map(|r| r.cycle).collect();
        assert_eq!(cycles, vec![3, 4]);
        assert_eq!(history.prune(at(12)).unwrap(), 0);
    }

    #[test]
    fn huge_retention_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let history = CycleHistory::new(dir.path().join("cycles.jsonl"), i64::MAX);
        history.append(&record(1, 1)).unwrap();
        assert_eq!(history.prune(at(30)).unwrap(), 0);
        assert_eq!(history.read_all().unwrap().len(), 1);
    }

    #[test]
    fn honours_max_cycles_and_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        let history = CycleHistory::new(dir.path().join("cycles.jsonl"), 30);
        let summary = run_schedule(&fast(3), Some(&history), None, |n| {
            if n == 2 {
                Err("prediction file missing".into())
            } else {
                Ok(CycleOutcome {
                    trades_executed: 2,
                    portfolio_value: 10_000.0,
                })
            }
        });

        assert_eq!(summary.cycles_run, 3);
        assert_eq!(summary.cycles_failed, 1);
        assert_eq!(summary.total_trades, 4);
        assert!(!summary.cancelled);

        let records = history.read_all().unwrap();
        assert_eq!(records.len(), 3);
        assert!(!records[1].success);
        assert_eq!(records[1].error.as_deref(), Some("prediction file missing"));
    }

    #[test]
    fn cancel_flag_stops_the_loop() {
        let cancel = AtomicBool::new(false);
        let config = ScheduleConfig {
            interval: Duration::from_secs(3600),
            max_cycles: None,
            poll: Duration::from_millis(1),
        };
        let summary = run_schedule(&config, None, Some(&cancel), |_| {
            cancel.store(true, Ordering::Relaxed);
            Ok(CycleOutcome {
                trades_executed: 0,
                portfolio_value: 1.0,
            })
        });
        assert_eq!(summary.cycles_run, 1);
        assert!(summary.cancelled);
    }

    #[test]
    fn cancel_from_another_thread_interrupts_the_sleep() {
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let history = CycleHistory::new(dir.path().join("cycles.jsonl"), 30);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let config = ScheduleConfig {
            interval: Duration::from_secs(3600),
            max_cycles: None,
            poll: Duration::from_millis(5),
        };

        let started = Instant::now();
        let summary = run_schedule(&config, Some(&history), Some(&*cancel), |_| {
            let flag = Arc::clone(&flag);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                flag.store(true, Ordering::SeqCst);
            });
            Ok(CycleOutcome {
                trades_executed: 1,
                portfolio_value: 10_000.0,
            })
        });

        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(summary.cycles_run, 1);
        assert!(summary.cancelled);
        assert_eq!(history.read_all().unwrap().len(), 1);
    }

    #[test]
    fn pre_cancelled_runs_nothing() {
        let cancel = AtomicBool::new(true);
        let summary = run_schedule(&fast(5), None, Some(&cancel), |_| {
            panic!("cycle should not run")
        });
        assert_eq!(summary.cycles_run, 0);
        assert!(summary.cancelled);
    }
}
