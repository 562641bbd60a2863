//! Harness configuration and validation.
//!
//! A configuration is immutable once built. Invalid combinations are
//! rejected at construction, never silently corrected; the one documented
//! exception is the `workers <= runs` clamp.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Where batched attempts of a registered task execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExecMode {
    /// A pool of OS threads in the current process (default).
    #[default]
    Threads,
    /// Isolated worker processes, paying serialization for memory isolation.
    Processes,
}

/// Errors rejected when building a [`HarnessConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `runs` or `workers` was zero.
    #[error("runs and workers must be at least 1")]
    ZeroRunsOrWorkers,

    /// `enforce_timeout` was requested without a timeout budget.
    #[error("enforce_timeout requires a timeout")]
    EnforceWithoutTimeout,

    /// Cancellation across process boundaries is not attempted, so an
    /// enforced timeout cannot be combined with process execution.
    #[error("enforce_timeout is not supported with process execution")]
    EnforceWithProcesses,
}

/// Immutable harness configuration.
///
/// Built through [`HarnessConfig::builder`]; after construction
/// `workers <= runs` always holds.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    runs: usize,
    workers: usize,
    mode: ExecMode,
    timeout: Option<Duration>,
    enforce_timeout: bool,
    detailed: bool,
}

impl HarnessConfig {
    /// Start building a configuration.
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::default()
    }

    /// Number of attempts per batch.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Number of concurrent execution units (already clamped to `runs`).
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Where batched attempts of registered tasks execute.
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Per-attempt timeout budget, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether overrunning attempts are cancelled instead of flagged.
    pub fn enforce_timeout(&self) -> bool {
        self.enforce_timeout
    }

    /// Report verbosity; never changes harness behavior.
    pub fn detailed(&self) -> bool {
        self.detailed
    }

    /// Single run, single worker: no pooling at all.
    pub(crate) fn is_fast_path(&self) -> bool {
        self.runs == 1 && self.workers == 1
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            runs: 1,
            workers: 1,
            mode: ExecMode::Threads,
            timeout: None,
            enforce_timeout: false,
            detailed: false,
        }
    }
}

/// Builder for [`HarnessConfig`].
#[derive(Debug, Clone, Default)]
pub struct HarnessConfigBuilder {
    runs: Option<usize>,
    workers: Option<usize>,
    mode: ExecMode,
    timeout: Option<Duration>,
    enforce_timeout: bool,
    detailed: bool,
}

impl HarnessConfigBuilder {
    /// Number of attempts per batch (minimum 1, default 1).
    pub fn runs(mut self, runs: usize) -> Self {
        self.runs = Some(runs);
        self
    }

    /// Number of concurrent execution units (minimum 1, default 1).
    ///
    /// Clamped to `runs` at build time.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Execution mode for registered tasks (default [`ExecMode::Threads`]).
    pub fn mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    /// Per-attempt timeout budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cancel the wait on attempts that overrun the budget instead of
    /// letting them finish with a flag. Requires [`Self::timeout`] and is
    /// incompatible with [`ExecMode::Processes`].
    pub fn enforce_timeout(mut self, enforce: bool) -> Self {
        self.enforce_timeout = enforce;
        self
    }

    /// Select the detailed report rendering.
    pub fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<HarnessConfig, ConfigError> {
        let runs = self.runs.unwrap_or(1);
        let workers = self.workers.unwrap_or(1);

        if runs < 1 || workers < 1 {
            return Err(ConfigError::ZeroRunsOrWorkers);
        }
        if self.enforce_timeout {
            if self.timeout.is_none() {
                return Err(ConfigError::EnforceWithoutTimeout);
            }
            if self.mode == ExecMode::Processes {
                return Err(ConfigError::EnforceWithProcesses);
            }
        }

        Ok(HarnessConfig {
            runs,
            // More workers than runs would idle; clamp.
            workers: workers.min(runs),
            mode: self.mode,
            timeout: self.timeout,
            enforce_timeout: self.enforce_timeout,
            detailed: self.detailed,
        })
    }
}
