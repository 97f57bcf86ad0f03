//! Incremental AVIF conversion for theme image directories.
//!
//! A sweep scans the active theme (child first, then parent) for images that
//! have no `.avif` sibling yet and converts them in bounded batches, either
//! in-process or through a remote conversion service. Callers drive repeated
//! sweeps until the outcome is no longer keep-alive.

pub mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod logging;
pub mod scanner;
pub mod services;
pub mod sweep;
pub mod theme;

pub use config::Settings;
pub use converter::{Engine, RemoteResult};
pub use error::{ConfigError, ConvertError, SweepError};
pub use scanner::{ConversionFilter, FileCounts, Scanner};
pub use sweep::{SweepController, SweepOutcome, Sweeper};
pub use theme::{ThemeDirs, ThemeReport};
