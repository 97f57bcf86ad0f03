//! Execution budget guards
//!
//! Local sweeps are CPU heavy. Hosts that cap request execution time and do
//! not let us lift the cap would kill a sweep halfway through, so the pipeline
//! asks a guard first and refuses to start when the answer is no.

use crate::converter::EnvironmentGuard;

/// Guard driven by the `execution.allow_time_extension` setting
#[derive(Debug, Clone, Copy)]
pub struct TimeBudgetGuard {
    extension_allowed: bool,
}

impl TimeBudgetGuard {
    pub fn new(extension_allowed: bool) -> Self {
        Self { extension_allowed }
    }

    /// An environment that always grants the extension
    pub fn unrestricted() -> Self {
        Self::new(true)
    }

    /// An environment with a fixed, non-negotiable time limit
    pub fn restricted() -> Self {
        Self::new(false)
    }
}

impl Default for TimeBudgetGuard {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl EnvironmentGuard for TimeBudgetGuard {
    fn extend_time_limit(&self) -> bool {
        if !self.extension_allowed {
            tracing::warn!("[Guard] Execution time limit cannot be extended; refusing local sweep");
        }
        self.extension_allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_reports_setting() {
        assert!(TimeBudgetGuard::unrestricted().extend_time_limit());
        assert!(!TimeBudgetGuard::restricted().extend_time_limit());
        assert!(TimeBudgetGuard::default().extend_time_limit());
    }
}
