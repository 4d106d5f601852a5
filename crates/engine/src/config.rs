//! Retry configuration
//!
//! Three layers:
//! - [`RetryDefaults`]: process-wide defaults, installable once at startup and
//!   loadable from a `txretry.toml`
//! - [`RetryOptions`]: per-call overrides
//! - [`RetryConfig`]: the immutable configuration one invocation runs with,
//!   produced by resolving options against defaults

use crate::backoff::{DEFAULT_WAIT_SCHEDULE_MS, MAX_WAIT};
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use txretry_concurrency::CancellationToken;
use txretry_core::{Error, ErrorKind, Result, RetryableKinds};

/// Config file name conventionally placed next to the application's data.
pub const CONFIG_FILE_NAME: &str = "txretry.toml";

/// Default retry budget
pub const DEFAULT_MAX_RETRIES: usize = 3;

static INSTALLED_DEFAULTS: OnceCell<RetryDefaults> = OnceCell::new();
static BUILTIN_DEFAULTS: Lazy<RetryDefaults> = Lazy::new(RetryDefaults::default);

// ============================================================================
// Process-wide defaults
// ============================================================================

/// Process-wide retry defaults loaded from `txretry.toml`.
///
/// # Example
///
/// ```toml
/// max_retries = 3
/// fuzz = true
/// wait_schedule_ms = [0, 1000, 2000, 4000, 8000, 16000]
/// retry_on = ["deadlock_detected"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryDefaults {
    /// Retries allowed after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Randomize backoff waits.
    #[serde(default = "default_fuzz")]
    pub fuzz: bool,
    /// Base wait before each retry, in milliseconds.
    #[serde(default = "default_wait_schedule_ms")]
    pub wait_schedule_ms: Vec<u64>,
    /// Error kinds retried by every call, on top of the isolation conflict.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retry_on: Vec<ErrorKind>,
}

fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

fn default_fuzz() -> bool {
    true
}

fn default_wait_schedule_ms() -> Vec<u64> {
    DEFAULT_WAIT_SCHEDULE_MS.to_vec()
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            fuzz: default_fuzz(),
            wait_schedule_ms: default_wait_schedule_ms(),
            retry_on: Vec::new(),
        }
    }
}

impl RetryDefaults {
    /// Check that the schedule is non-decreasing and within the wait cap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first offending entry.
    pub fn validate(&self) -> Result<()> {
        let cap_ms = MAX_WAIT.as_millis() as u64;
        for (i, ms) in self.wait_schedule_ms.iter().enumerate() {
            if *ms > cap_ms {
                return Err(Error::invalid_config(format!(
                    "wait_schedule_ms[{}] = {} exceeds the {} ms cap",
                    i, ms, cap_ms
                )));
            }
        }
        if let Some(i) = self
            .wait_schedule_ms
            .windows(2)
            .position(|pair| pair[1] < pair[0])
        {
            return Err(Error::invalid_config(format!(
                "wait_schedule_ms must be non-decreasing (entry {} < entry {})",
                i + 1,
                i
            )));
        }
        Ok(())
    }

    /// Wait schedule as durations
    pub fn wait_schedule(&self) -> Vec<Duration> {
        self.wait_schedule_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# txretry configuration
#
# Retries allowed after the first attempt (default: 3)
max_retries = 3

# Randomize each backoff wait by +/- max(25%, 1s) (default: true)
fuzz = true

# Base wait before retry 1, 2, 3, ... in milliseconds.
# Retries past the end of this list wait 32 seconds.
wait_schedule_ms = [0, 1000, 2000, 4000, 8000, 16000]

# Driver-specific error kinds retried in addition to isolation conflicts.
# retry_on = ["deadlock_detected", "lock_timeout"]
"#
    }

    /// Parse and validate defaults from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let defaults: RetryDefaults = toml::from_str(content)?;
        defaults.validate()?;
        Ok(defaults)
    }

    /// Read and parse defaults from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| Error::io(path, e))?;
        }
        Ok(())
    }

    /// Serialize these defaults to TOML and write them to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigParse(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| Error::io(path, e))
    }
}

/// Install process-wide defaults.
///
/// Meant to be called once at startup, before any retry-managed call.
///
/// # Errors
///
/// Fails with [`Error::DefaultsAlreadyInstalled`] on a second call, or with
/// [`Error::InvalidConfig`] if `defaults` does not validate.
pub fn install_defaults(defaults: RetryDefaults) -> Result<()> {
    defaults.validate()?;
    INSTALLED_DEFAULTS
        .set(defaults)
        .map_err(|_| Error::DefaultsAlreadyInstalled)
}

/// Installed defaults, or the built-in ones if none were installed.
pub fn global_defaults() -> &'static RetryDefaults {
    INSTALLED_DEFAULTS.get().unwrap_or(&*BUILTIN_DEFAULTS)
}

// ============================================================================
// Per-call options
// ============================================================================

/// Per-call overrides of the process-wide defaults
///
/// # Example
/// ```ignore
/// let options = RetryOptions::new()
///     .retry_on("lock_timeout")
///     .max_retries(5);
/// coordinator.run(&conn, &options, || conn.execute(...))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryOptions {
    /// Extra retryable kinds for this call
    pub retry_on: Vec<ErrorKind>,
    /// Retry budget; `None` uses the default
    pub max_retries: Option<usize>,
    /// Fuzz waits; `None` uses the default
    pub fuzz: Option<bool>,
    /// Token that aborts backoff pauses
    pub cancel: Option<CancellationToken>,
}

impl RetryOptions {
    /// Options that use every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Also retry errors of `kind`
    pub fn retry_on(mut self, kind: impl Into<ErrorKind>) -> Self {
        self.retry_on.push(kind.into());
        self
    }

    /// Override the retry budget
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Override fuzzing
    pub fn fuzz(mut self, fuzz: bool) -> Self {
        self.fuzz = Some(fuzz);
        self
    }

    /// Abort pauses when `token` is cancelled
    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolve against `defaults` into the configuration for one call
    pub fn resolve(&self, defaults: &RetryDefaults) -> RetryConfig {
        let mut retryable_kinds: RetryableKinds = defaults.retry_on.iter().cloned().collect();
        retryable_kinds.extend(self.retry_on.iter().cloned());

        RetryConfig {
            retryable_kinds,
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            fuzz_enabled: self.fuzz.unwrap_or(defaults.fuzz),
            wait_schedule: defaults.wait_schedule(),
            max_wait: MAX_WAIT,
            cancel: self.cancel.clone(),
        }
    }
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// Configuration for one retry-managed invocation
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new()
///     .with_max_retries(5)
///     .retry_on("deadlock_detected");
/// coordinator.run_with_config(&conn, &config, || { ... })?;
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Kinds retried in addition to the isolation conflict
    pub retryable_kinds: RetryableKinds,
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: usize,
    /// Randomize waits within the fuzz window
    pub fuzz_enabled: bool,
    /// Base wait before retry 1, 2, 3, ...
    pub wait_schedule: Vec<Duration>,
    /// Wait used past the end of `wait_schedule`
    pub max_wait: Duration,
    /// Token that aborts backoff pauses
    pub cancel: Option<CancellationToken>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryOptions::new().resolve(&BUILTIN_DEFAULTS)
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with built-in default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Enable or disable fuzzing
    pub fn with_fuzz(mut self, fuzz_enabled: bool) -> Self {
        self.fuzz_enabled = fuzz_enabled;
        self
    }

    /// Replace the wait schedule
    pub fn with_wait_schedule(mut self, wait_schedule: Vec<Duration>) -> Self {
        self.wait_schedule = wait_schedule;
        self
    }

    /// Set the wait used past the end of the schedule
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Also retry errors of `kind`
    pub fn retry_on(mut self, kind: impl Into<ErrorKind>) -> Self {
        self.retryable_kinds.insert(kind);
        self
    }

    /// Abort pauses when `token` is cancelled
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether the cancellation token (if any) has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}
