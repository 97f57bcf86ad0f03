//! Sweep Lock
//!
//! Two sweeps over the same roots would both see the same files as
//! unconverted and encode them twice. With exclusive mode on, a sweep takes
//! a non-blocking advisory lock (fs2) keyed by the root directory set and
//! gives up immediately if another sweep holds it.

use crate::error::SweepError;
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Factory for per-root-set lock files
#[derive(Debug, Clone)]
pub struct SweepLock {
    lock_dir: PathBuf,
}

/// Held lock; released when dropped
#[derive(Debug)]
pub struct SweepLockGuard {
    file: File,
    path: PathBuf,
}

impl SweepLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SweepLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), "[SweepLock] Failed to release: {}", e);
        }
    }
}

impl SweepLock {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
        }
    }

    /// Default lock directory (the system temp dir)
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("avif-sweep")
    }

    /// Lock file path for a root set; order-sensitive like the roots themselves
    pub fn lock_path(&self, roots: &[PathBuf]) -> PathBuf {
        let mut hasher = Sha256::new();
        for root in roots {
            hasher.update(root.to_string_lossy().as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        self.lock_dir
            .join(format!("sweep-{}.lock", hex::encode(&digest[..8])))
    }

    /// Take the lock without blocking
    pub fn try_acquire(&self, roots: &[PathBuf]) -> Result<SweepLockGuard, SweepError> {
        let path = self.lock_path(roots);
        let lock_err = |e| SweepError::Lock {
            path: path.clone(),
            source: e,
        };

        fs::create_dir_all(&self.lock_dir).map_err(lock_err)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_err)?;

        if let Err(e) = file.try_lock_exclusive() {
            let contended = e.kind() == std::io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error();
            return Err(if contended {
                SweepError::AlreadyRunning { lock: path }
            } else {
                lock_err(e)
            });
        }

        tracing::debug!(path = %path.display(), "[SweepLock] Acquired");
        Ok(SweepLockGuard { file, path })
    }
}
