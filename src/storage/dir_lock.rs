//! Exclusive lock on a ledger data directory
//!
//! Row locks, the journal sequence and the balance table all live in memory,
//! so only one `Storage` may have a data directory open at a time. The lock
//! is an OS advisory lock on `data/ledger.lock`, held until the `Storage` is
//! dropped. The OS releases it if the process dies.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{LedgerError, LedgerResult};

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Held for as long as the directory is open
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Take the lock, waiting at most `timeout` for another holder to let go
    ///
    /// Contention past the deadline is a retryable `Conflict`.
    pub fn acquire(path: impl Into<PathBuf>, timeout: Duration) -> LedgerResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                LedgerError::Persistence(format!(
                    "Failed to open lock file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if is_contended(&e) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::debug!(lock = %path.display(), "timed out waiting for data directory");
                        return Err(LedgerError::Conflict(format!(
                            "Timed out after {}ms waiting for ledger at {}; another process has it open",
                            timeout.as_millis(),
                            path.display()
                        )));
                    }
                    thread::sleep(RETRY_INTERVAL.min(deadline - now));
                }
                Err(e) => {
                    return Err(LedgerError::Persistence(format!(
                        "Failed to lock {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        tracing::debug!(lock = %path.display(), "data directory locked");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release data directory lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn lock_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("ledger.lock")
    }

    #[test]
    fn test_second_holder_times_out_with_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let _first = DirectoryLock::acquire(lock_path(&temp_dir), Duration::from_millis(10)).unwrap();

        let err = DirectoryLock::acquire(lock_path(&temp_dir), Duration::from_millis(50)).unwrap_err();

        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_lock_is_free_after_drop() {
        let temp_dir = TempDir::new().unwrap();
        let first = DirectoryLock::acquire(lock_path(&temp_dir), Duration::from_millis(10)).unwrap();
        assert!(first.path().exists());
        drop(first);

        DirectoryLock::acquire(lock_path(&temp_dir), Duration::from_millis(10)).unwrap();
    }

    #[test]
    fn test_waiter_gets_lock_once_released() {
        let temp_dir = TempDir::new().unwrap();
        let path = Arc::new(lock_path(&temp_dir));
        let first = DirectoryLock::acquire(path.as_path(), Duration::from_millis(10)).unwrap();

        let waiter = {
            let path = Arc::clone(&path);
            thread::spawn(move || DirectoryLock::acquire(path.as_path(), Duration::from_secs(5)).is_ok())
        };

        thread::sleep(Duration::from_millis(30));
        drop(first);

        assert!(waiter.join().unwrap());
    }
}
