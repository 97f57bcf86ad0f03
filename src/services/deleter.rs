//! Deletion of converted output files

use crate::converter::FileDeleter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// How outputs are removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Unlink the file
    #[default]
    Remove,
    /// Move the file to the OS trash so it can be restored
    Trash,
}

/// Deletes outputs from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDeleter {
    mode: DeleteMode,
}

impl FsDeleter {
    pub fn new(mode: DeleteMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DeleteMode {
        self.mode
    }
}

impl FileDeleter for FsDeleter {
    /// Every path is attempted even after a failure. A file that is already
    /// gone counts as deleted.
    fn delete(&self, paths: &[PathBuf]) -> bool {
        let mut failures = 0usize;

        for path in paths {
            let result = match self.mode {
                DeleteMode::Remove => match fs::remove_file(path) {
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    other => other.map_err(|e| e.to_string()),
                },
                DeleteMode::Trash if !path.exists() => Ok(()),
                DeleteMode::Trash => trash::delete(path).map_err(|e| e.to_string()),
            };

            if let Err(e) = result {
                tracing::warn!(path = %path.display(), "[Deleter] Failed to delete: {}", e);
                failures += 1;
            }
        }

        tracing::info!(
            attempted = paths.len(),
            failed = failures,
            mode = ?self.mode,
            "[Deleter] Deleted converted outputs"
        );

        failures == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_remove_deletes_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("a.avif");
        File::create(&present).unwrap();
        let missing = dir.path().join("b.avif");

        let ok = FsDeleter::new(DeleteMode::Remove).delete(&[present.clone(), missing]);

        assert!(ok);
        assert!(!present.exists());
    }

    #[test]
    fn test_remove_reports_failure_and_continues() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be removed with remove_file
        let blocker = dir.path().join("dir.avif");
        fs::create_dir(&blocker).unwrap();
        let after = dir.path().join("c.avif");
        File::create(&after).unwrap();

        let ok = FsDeleter::new(DeleteMode::Remove).delete(&[blocker.clone(), after.clone()]);

        assert!(!ok);
        assert!(blocker.exists());
        assert!(!after.exists());
    }

    #[test]
    fn test_default_mode_is_remove() {
        assert_eq!(FsDeleter::default().mode(), DeleteMode::Remove);
    }
}
