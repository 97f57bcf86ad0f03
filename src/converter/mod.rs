//! Conversion collaborators
//!
//! The sweep never encodes anything itself. It hands files to a
//! `LocalConverter` one at a time, or hands a whole batch of public URLs to a
//! `CloudConverter` in a single call.

pub mod cloud;
pub mod local;

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use cloud::HttpCloudConverter;
pub use local::ImageAvifConverter;

/// Valid encoder quality range
pub const QUALITY_RANGE: std::ops::RangeInclusive<u8> = 0..=100;

/// Valid encoder speed range (0 = slowest/best, 10 = fastest)
pub const SPEED_RANGE: std::ops::RangeInclusive<u8> = 0..=10;

/// Which conversion engine a sweep dispatches to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    #[default]
    Local,
    Cloud,
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Engine::Local),
            "cloud" => Ok(Engine::Cloud),
            other => Err(format!("unknown engine '{}', expected 'local' or 'cloud'", other)),
        }
    }
}

/// Encodes a single file in-process
pub trait LocalConverter {
    /// Whether the encoder can run in this environment
    fn is_available(&self) -> bool {
        true
    }

    /// Encode `source` to `destination`
    fn convert(
        &self,
        source: &Path,
        destination: &Path,
        quality: u8,
        speed: u8,
    ) -> Result<(), ConvertError>;
}

/// One file of a cloud batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudJob {
    /// Publicly reachable URL of the source image
    pub url: String,
    /// Local path of the source image
    pub source: PathBuf,
    /// Where the converted file is written
    pub destination: PathBuf,
}

/// Outcome of a cloud batch submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteResult {
    Ok,
    EngineFailure,
    QuotaExceeded,
}

/// Submits a batch of images to a remote conversion service
pub trait CloudConverter {
    fn convert_batch(&self, jobs: &[CloudJob]) -> RemoteResult;
}

/// Maps a local path to a URL the remote service can fetch
pub trait PathToUrlResolver {
    /// `None` when the path cannot be served publicly
    fn resolve(&self, path: &Path) -> Option<String>;
}

/// Best-effort request for an unbounded execution budget
pub trait EnvironmentGuard {
    /// Returns false when the environment forbids extending the time limit
    fn extend_time_limit(&self) -> bool;
}

/// Deletes converted output files
pub trait FileDeleter {
    /// Attempt every path; returns false if any deletion failed
    fn delete(&self, paths: &[PathBuf]) -> bool;
}
