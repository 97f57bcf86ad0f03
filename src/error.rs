//! Error types
//!
//! Sweep results are status values (`SweepOutcome`), not errors. The types here
//! cover what sits outside that taxonomy: bad settings, a single failed
//! conversion, and pipeline preconditions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors from a converter collaborator
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("local AVIF encoder is not compiled in")]
    Unsupported,

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors that stop the sweep pipeline before a status can be produced
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("local conversion engine is not available in this build")]
    LocalEngineUnavailable,

    #[error("cloud engine selected but no cloud converter is configured")]
    CloudEngineUnavailable,

    #[error("another sweep holds the lock {}", lock.display())]
    AlreadyRunning { lock: PathBuf },

    #[error("failed to take sweep lock {}: {source}", path.display())]
    Lock { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
