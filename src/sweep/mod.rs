//! Sweep Controller
//!
//! One sweep is one bounded pass of conversion work. It scans for unconverted
//! images, converts at most one batch, and reports whether the caller should
//! come back for more. Nothing is remembered between sweeps: the next call
//! rescans from scratch and naturally skips whatever was converted before.
//!
//! ```text
//! Idle -> Scanning -> GuardCheck (local only) -> Converting(batch) -> Done | Continue
//! ```
//!
//! Without exclusive mode, two overlapping sweeps over the same roots can both
//! pick up the same unconverted files and convert them twice. Turn on
//! `sweep.exclusive` when sweeps may be triggered concurrently.

pub mod lock;

use crate::converter::{
    CloudConverter, CloudJob, Engine, EnvironmentGuard, FileDeleter, LocalConverter,
    PathToUrlResolver, RemoteResult,
};
use crate::error::SweepError;
use crate::scanner::{ConversionFilter, OutputNaming, Scanner};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use lock::{SweepLock, SweepLockGuard};

/// Files converted per local sweep before yielding
pub const DEFAULT_PER_CALL_LIMIT: usize = 5;

/// Files submitted per cloud sweep
pub const DEFAULT_BATCH_CAP: usize = 20;

/// Result of one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    /// Nothing to convert
    NoOp,
    /// Every pending file was handled in this call
    AllConverted,
    /// Batch limit reached; call again to continue
    PartialBatchDone,
    /// The execution time limit could not be extended; nothing was converted
    GuardFailed,
    /// The converter failed
    EngineFailure,
    /// The remote service refused the batch for quota reasons
    QuotaExceeded,
}

impl SweepOutcome {
    /// Whether the caller should re-invoke the sweep
    pub fn should_continue(&self) -> bool {
        matches!(self, SweepOutcome::PartialBatchDone)
    }

    /// Response value understood by the dashboard front end
    pub fn wire_value(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            SweepOutcome::NoOp => Value::Null,
            SweepOutcome::AllConverted => Value::Bool(true),
            SweepOutcome::GuardFailed => Value::Bool(false),
            SweepOutcome::PartialBatchDone => Value::from("keep-alive"),
            SweepOutcome::EngineFailure => Value::from("ccfail"),
            SweepOutcome::QuotaExceeded => Value::from("ccover"),
        }
    }
}

impl From<RemoteResult> for SweepOutcome {
    fn from(result: RemoteResult) -> Self {
        match result {
            RemoteResult::Ok => SweepOutcome::AllConverted,
            RemoteResult::EngineFailure => SweepOutcome::EngineFailure,
            RemoteResult::QuotaExceeded => SweepOutcome::QuotaExceeded,
        }
    }
}

/// Batch limits and output naming for a single pass
#[derive(Debug, Clone)]
pub struct SweepController {
    naming: OutputNaming,
    per_call_limit: usize,
    batch_cap: usize,
}

impl Default for SweepController {
    fn default() -> Self {
        Self {
            naming: OutputNaming::default(),
            per_call_limit: DEFAULT_PER_CALL_LIMIT,
            batch_cap: DEFAULT_BATCH_CAP,
        }
    }
}

impl SweepController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Files converted per local call (minimum 1)
    pub fn with_per_call_limit(mut self, limit: usize) -> Self {
        self.per_call_limit = limit.max(1);
        self
    }

    /// Files submitted per cloud call (minimum 1)
    pub fn with_batch_cap(mut self, cap: usize) -> Self {
        self.batch_cap = cap.max(1);
        self
    }

    pub fn per_call_limit(&self) -> usize {
        self.per_call_limit
    }

    pub fn batch_cap(&self) -> usize {
        self.batch_cap
    }

    /// Convert pending files one by one, stopping after `per_call_limit`.
    ///
    /// The caller has already checked that the local encoder is available and
    /// that the execution time limit was extended. A conversion error ends the
    /// call with `EngineFailure`; files converted before it stay converted.
    pub fn run_local_sweep(
        &self,
        files: &[PathBuf],
        converter: &dyn LocalConverter,
        quality: u8,
        speed: u8,
    ) -> SweepOutcome {
        if files.is_empty() {
            return SweepOutcome::NoOp;
        }

        let mut converted = 0usize;
        for source in files {
            let Some(destination) = self.naming.output_for(source) else {
                tracing::warn!(path = %source.display(), "[Sweep] Cannot derive output path, skipping");
                continue;
            };

            if let Err(e) = converter.convert(source, &destination, quality, speed) {
                tracing::error!(
                    path = %source.display(),
                    converted,
                    "[Sweep] Local conversion failed: {}",
                    e
                );
                return SweepOutcome::EngineFailure;
            }

            converted += 1;
            if converted == self.per_call_limit {
                tracing::info!(converted, "[Sweep] Batch limit reached, yielding");
                return SweepOutcome::PartialBatchDone;
            }
        }

        tracing::info!(converted, "[Sweep] Local sweep complete");
        SweepOutcome::AllConverted
    }

    /// Submit up to `batch_cap` files to the remote converter in one call
    pub fn run_cloud_sweep(
        &self,
        files: &[PathBuf],
        resolver: &dyn PathToUrlResolver,
        converter: &dyn CloudConverter,
    ) -> SweepOutcome {
        if files.is_empty() {
            return SweepOutcome::NoOp;
        }

        let truncated = files.len() > self.batch_cap;
        let batch = &files[..files.len().min(self.batch_cap)];

        let jobs: Vec<CloudJob> = batch
            .iter()
            .filter_map(|source| {
                let url = resolver.resolve(source);
                let destination = self.naming.output_for(source);
                match (url, destination) {
                    (Some(url), Some(destination)) => Some(CloudJob {
                        url,
                        source: source.clone(),
                        destination,
                    }),
                    _ => {
                        tracing::warn!(
                            path = %source.display(),
                            "[Sweep] File has no public URL, skipping"
                        );
                        None
                    }
                }
            })
            .collect();

        if jobs.is_empty() {
            tracing::error!(
                files = batch.len(),
                "[Sweep] No file in the batch could be resolved to a URL"
            );
            return SweepOutcome::EngineFailure;
        }

        let outcome = SweepOutcome::from(converter.convert_batch(&jobs));
        tracing::info!(
            submitted = jobs.len(),
            remaining = files.len() - batch.len(),
            outcome = ?outcome,
            "[Sweep] Cloud batch finished"
        );

        match outcome {
            SweepOutcome::AllConverted if truncated => SweepOutcome::PartialBatchDone,
            other => other,
        }
    }

    /// Delete the output of every listed (already converted) source file.
    ///
    /// Returns false for an empty list, true once every deletion was attempted.
    /// Individual failures are logged by the deleter and do not change the result.
    pub fn delete_converted(&self, files: &[PathBuf], deleter: &dyn FileDeleter) -> bool {
        if files.is_empty() {
            return false;
        }

        let outputs: Vec<PathBuf> = files
            .iter()
            .filter_map(|source| self.naming.output_for(source))
            .collect();

        if !deleter.delete(&outputs) {
            tracing::warn!(
                files = outputs.len(),
                "[Sweep] Some converted outputs could not be deleted"
            );
        }
        true
    }
}

/// Result of driving sweeps until they stop asking to continue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettledRun {
    pub outcome: SweepOutcome,
    pub rounds: usize,
}

/// Full pipeline: roots, scanner, engine dispatch and collaborators
pub struct Sweeper {
    roots: Vec<PathBuf>,
    scanner: Scanner,
    controller: SweepController,
    engine: Engine,
    quality: u8,
    speed: u8,
    local: Box<dyn LocalConverter>,
    cloud: Option<Box<dyn CloudConverter>>,
    resolver: Option<Box<dyn PathToUrlResolver>>,
    guard: Box<dyn EnvironmentGuard>,
    deleter: Box<dyn FileDeleter>,
    lock: Option<SweepLock>,
}

impl Sweeper {
    /// Sweeper over `roots` with default collaborators: the `image` AVIF
    /// encoder, an unrestricted guard and plain file removal
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            scanner: Scanner::default(),
            controller: SweepController::default(),
            engine: Engine::Local,
            quality: 80,
            speed: 6,
            local: Box::new(crate::converter::ImageAvifConverter::new()),
            cloud: None,
            resolver: None,
            guard: Box::new(crate::services::TimeBudgetGuard::default()),
            deleter: Box::new(crate::services::FsDeleter::default()),
            lock: None,
        }
    }

    /// Scanner and controller must agree on naming; the scanner's naming wins
    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.controller = self.controller.with_naming(scanner.naming().clone());
        self.scanner = scanner;
        self
    }

    pub fn with_controller(mut self, controller: SweepController) -> Self {
        self.controller = controller.with_naming(self.scanner.naming().clone());
        self
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_encoding(mut self, quality: u8, speed: u8) -> Self {
        self.quality = quality;
        self.speed = speed;
        self
    }

    pub fn with_local_converter(mut self, converter: impl LocalConverter + 'static) -> Self {
        self.local = Box::new(converter);
        self
    }

    pub fn with_cloud(
        mut self,
        resolver: impl PathToUrlResolver + 'static,
        converter: impl CloudConverter + 'static,
    ) -> Self {
        self.resolver = Some(Box::new(resolver));
        self.cloud = Some(Box::new(converter));
        self
    }

    pub fn with_guard(mut self, guard: impl EnvironmentGuard + 'static) -> Self {
        self.guard = Box::new(guard);
        self
    }

    pub fn with_deleter(mut self, deleter: impl FileDeleter + 'static) -> Self {
        self.deleter = Box::new(deleter);
        self
    }

    /// Serialize full sweeps over this root set through an advisory lock
    pub fn with_lock(mut self, lock: SweepLock) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Images under the roots selected by `filter`
    pub fn find(&self, filter: ConversionFilter) -> Vec<PathBuf> {
        self.scanner.find(&self.roots, filter)
    }

    /// One sweep: scan, check preconditions, convert one batch
    pub fn sweep(&self) -> Result<SweepOutcome, SweepError> {
        let _lock = self.take_lock()?;

        let pending = self.find(ConversionFilter::Unconverted);
        tracing::info!(
            engine = ?self.engine,
            pending = pending.len(),
            "[Sweep] Starting sweep"
        );

        if pending.is_empty() {
            return Ok(SweepOutcome::NoOp);
        }

        match self.engine {
            Engine::Local => {
                if !self.local.is_available() {
                    return Err(SweepError::LocalEngineUnavailable);
                }
                if !self.guard.extend_time_limit() {
                    return Ok(SweepOutcome::GuardFailed);
                }
                Ok(self.controller.run_local_sweep(
                    &pending,
                    self.local.as_ref(),
                    self.quality,
                    self.speed,
                ))
            }
            Engine::Cloud => {
                let (Some(resolver), Some(cloud)) = (&self.resolver, &self.cloud) else {
                    return Err(SweepError::CloudEngineUnavailable);
                };
                Ok(self
                    .controller
                    .run_cloud_sweep(&pending, resolver.as_ref(), cloud.as_ref()))
            }
        }
    }

    /// Keep sweeping while the outcome is `PartialBatchDone`, at most `max_rounds` times
    pub fn run_until_settled(&self, max_rounds: usize) -> Result<SettledRun, SweepError> {
        let mut rounds = 0usize;
        loop {
            let outcome = self.sweep()?;
            rounds += 1;

            if !outcome.should_continue() || rounds >= max_rounds.max(1) {
                tracing::info!(rounds, outcome = ?outcome, "[Sweep] Settled");
                return Ok(SettledRun { outcome, rounds });
            }
            tracing::debug!(rounds, "[Sweep] Keep-alive, sweeping again");
        }
    }

    /// Delete the outputs of every converted image under the roots
    pub fn delete_all(&self) -> Result<bool, SweepError> {
        let _lock = self.take_lock()?;
        let converted = self.find(ConversionFilter::Converted);
        Ok(self
            .controller
            .delete_converted(&converted, self.deleter.as_ref()))
    }

    fn take_lock(&self) -> Result<Option<SweepLockGuard>, SweepError> {
        self.lock
            .as_ref()
            .map(|lock| lock.try_acquire(&self.roots))
            .transpose()
    }
}
