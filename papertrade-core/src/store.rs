//! Portfolio persistence: whole-state JSON with atomic replace.
//!
//! - Saves write `<file>.tmp` then rename over `<file>`
//! - A missing file loads as a fresh portfolio
//! - An unparseable file is moved aside to `<file>.corrupt-<timestamp>` and a
//!   fresh portfolio is returned
//! - `transact` runs load → mutate → save under an exclusive `<file>.lock`

use crate::domain::Portfolio;
use chrono::Local;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize portfolio: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("portfolio is locked by another process ({})", .path.display())]
    Locked { path: PathBuf },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How a portfolio came to be in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Parsed from an existing file.
    Existing,
    /// No file on disk; initialized with the configured capital.
    Fresh,
    /// The file was unreadable and was moved to the given path.
    Recovered(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub portfolio: Portfolio,
    pub origin: LoadOrigin,
}

/// Append `suffix` to the full file name (`a/b.json` → `a/b.json.lock`).
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `bytes` to `path` via a temp file and rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = with_suffix(path, ".tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[derive(Debug, Clone)]
pub struct PortfolioStore {
    path: PathBuf,
    lock_retries: u32,
    lock_retry_delay: Duration,
    stale_lock_after: Duration,
}

impl PortfolioStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_retries: 50,
            lock_retry_delay: Duration::from_millis(100),
            stale_lock_after: Duration::from_secs(60),
        }
    }

    /// Override lock contention behaviour.
    pub fn with_lock_policy(mut self, retries: u32, retry_delay: Duration, stale_after: Duration) -> Self {
        self.lock_retries = retries;
        self.lock_retry_delay = retry_delay;
        self.stale_lock_after = stale_after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        with_suffix(&self.path, ".lock")
    }

    pub fn load(&self, initial_capital: f64) -> Result<LoadOutcome, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    "no portfolio at {}, starting fresh with ${initial_capital:.2}",
                    self.path.display()
                );
                return Ok(LoadOutcome {
                    portfolio: Portfolio::new(initial_capital, Local::now().naive_local()),
                    origin: LoadOrigin::Fresh,
                });
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        match serde_json::from_str::<Portfolio>(&text) {
            Ok(portfolio) => Ok(LoadOutcome {
                portfolio,
                origin: LoadOrigin::Existing,
            }),
            Err(parse_err) => {
                let quarantined = self.quarantine()?;
                log::warn!(
                    "portfolio file {} is unreadable ({parse_err}); moved to {} and starting fresh",
                    self.path.display(),
                    quarantined.display()
                );
                Ok(LoadOutcome {
                    portfolio: Portfolio::new(initial_capital, Local::now().naive_local()),
                    origin: LoadOrigin::Recovered(quarantined),
                })
            }
        }
    }

    fn quarantine(&self) -> Result<PathBuf, StoreError> {
        let stamp = Local::now().format("%Y%m%dT%H%M%S");
        let mut target = with_suffix(&self.path, &format!(".corrupt-{stamp}"));
        let mut n = 1;
        while target.exists() {
            target = with_suffix(&self.path, &format!(".corrupt-{stamp}-{n}"));
            n += 1;
        }
        fs::rename(&self.path, &target).map_err(|e| StoreError::io(&self.path, e))?;
        Ok(target)
    }

    /// Stamp `last_updated` and write the whole state atomically.
    pub fn save(&self, portfolio: &mut Portfolio) -> Result<(), StoreError> {
        portfolio.last_updated = Some(Local::now().naive_local());
        let json = serde_json::to_vec_pretty(portfolio)?;
        write_atomic(&self.path, &json).map_err(|e| StoreError::io(&self.path, e))?;
        log::debug!("saved portfolio to {}", self.path.display());
        Ok(())
    }

    /// Acquire the exclusive lock file, breaking it if it is stale.
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let mut retries = 0;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    // Holder pid is informational only.
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(StoreLock { path: lock_path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if self.is_stale(&lock_path) {
                        self.break_stale_lock(&lock_path)?;
                        continue;
                    }
                    if retries >= self.lock_retries {
                        return Err(StoreError::Locked { path: lock_path });
                    }
                    retries += 1;
                    std::thread::sleep(self.lock_retry_delay);
                }
                Err(e) => return Err(StoreError::io(&lock_path, e)),
            }
        }
    }

    /// Move the lock aside, then decide on the moved file. A lock replaced by
    /// another process between the staleness check and the rename is still
    /// fresh after the move and gets linked back.
    fn break_stale_lock(&self, lock_path: &Path) -> Result<(), StoreError> {
        let aside = with_suffix(lock_path, &format!(".stale-{}", std::process::id()));
        match fs::rename(lock_path, &aside) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(lock_path, e)),
        }

        if self.is_stale(&aside) {
            log::warn!("breaking stale portfolio lock {}", lock_path.display());
        } else if let Err(e) = fs::hard_link(&aside, lock_path) {
            log::warn!(
                "could not restore live portfolio lock {}: {e}",
                lock_path.display()
            );
        }
        match fs::remove_file(&aside) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&aside, e)),
        }
    }

    fn is_stale(&self, lock_path: &Path) -> bool {
        fs::metadata(lock_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= self.stale_lock_after)
    }

    /// Run one locked load → mutate → save transaction.
    ///
    /// The closure sees the latest on-disk state. If it fails, nothing is
    /// written and its error is returned.
    pub fn transact<T, E, F>(&self, initial_capital: f64, f: F) -> Result<(Portfolio, T), E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut Portfolio) -> Result<T, E>,
    {
        let _lock = self.lock()?;
        let mut portfolio = self.load(initial_capital)?.portfolio;
        let value = f(&mut portfolio)?;
        self.save(&mut portfolio)?;
        Ok((portfolio, value))
    }

    /// Replace the file with a fresh portfolio.
    pub fn reset(&self, initial_capital: f64) -> Result<Portfolio, StoreError> {
        let _lock = self.lock()?;
        let mut portfolio = Portfolio::new(initial_capital, Local::now().naive_local());
        self.save(&mut portfolio)?;
        log::info!(
            "portfolio {} reset to ${initial_capital:.2}",
            self.path.display()
        );
        Ok(portfolio)
    }
}

/// Held lock file; removed on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::debug!("failed to remove lock {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_appends_to_full_name() {
        let p = with_suffix(Path::new("out/paper_portfolio.json"), ".lock");
        assert_eq!(p, PathBuf::from("out/paper_portfolio.json.lock"));
    }

    #[test]
    fn atomic_write_creates_parent_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!with_suffix(&path, ".tmp").exists());
    }

    #[test]
    fn breaking_a_lock_keeps_one_that_turned_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = PortfolioStore::new(dir.path().join("p.json"));
        let lock_path = store.lock_path();
        fs::write(&lock_path, "4242\n").unwrap();

        // Default policy: a just-written lock is not stale.
        store.break_stale_lock(&lock_path).unwrap();
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), "4242\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn breaking_a_stale_lock_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = PortfolioStore::new(dir.path().join("p.json")).with_lock_policy(
            0,
            Duration::from_millis(1),
            Duration::ZERO,
        );
        let lock_path = store.lock_path();
        fs::write(&lock_path, "4242\n").unwrap();

        store.break_stale_lock(&lock_path).unwrap();
        assert!(!lock_path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        // Already gone is fine.
        store.break_stale_lock(&lock_path).unwrap();
    }

    #[test]
    fn lock_guard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PortfolioStore::new(dir.path().join("p.json"));
        {
            let lock = store.lock().unwrap();
            assert!(lock.path().exists());
        }
        assert!(!store.lock_path().exists());
    }
}
