//! Backoff policy between retry attempts
//!
//! Waits follow a fixed escalating schedule (0, 1, 2, 4, 8, 16 seconds by
//! default) and are capped at 32 seconds past the end of the schedule. With
//! fuzzing enabled each wait is shifted by a uniform offset within
//! `±max(base * 0.25, 1s)` so that concurrent contexts do not retry in lockstep.

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Wait used for attempts past the end of the schedule
pub const MAX_WAIT: Duration = Duration::from_secs(32);

/// Default schedule, in milliseconds
pub const DEFAULT_WAIT_SCHEDULE_MS: [u64; 6] = [0, 1_000, 2_000, 4_000, 8_000, 16_000];

/// Smallest fuzz window, in seconds
const MIN_FUZZ_SECS: f64 = 1.0;

/// Fraction of the base wait used as fuzz window
const FUZZ_RATIO: f64 = 0.25;

/// Source of uniform samples in `[0, 1)`
///
/// Injected into the coordinator so tests can pin fuzz behavior.
pub trait FuzzSource: Send + Sync {
    /// Next sample in `[0, 1)`
    fn sample(&self) -> f64;
}

/// Thread-local `rand` generator
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngFuzz;

impl FuzzSource for ThreadRngFuzz {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Backoff schedule for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    schedule: Vec<Duration>,
    max_wait: Duration,
    fuzz: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            max_wait: MAX_WAIT,
            fuzz: true,
        }
    }
}

impl BackoffPolicy {
    /// Policy with an explicit schedule
    pub fn new(schedule: Vec<Duration>, fuzz: bool) -> Self {
        Self {
            schedule,
            max_wait: MAX_WAIT,
            fuzz,
        }
    }

    /// Policy described by a resolved [`RetryConfig`]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            schedule: config.wait_schedule.clone(),
            max_wait: config.max_wait,
            fuzz: config.fuzz_enabled,
        }
    }

    /// Set the wait used past the end of the schedule
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Whether waits are randomized
    pub fn is_fuzzed(&self) -> bool {
        self.fuzz
    }

    /// Unfuzzed wait before the given 1-based attempt
    ///
    /// Attempt 0 is treated as attempt 1.
    pub fn base_wait(&self, attempt: usize) -> Duration {
        let index = attempt.max(1) - 1;
        self.schedule.get(index).copied().unwrap_or(self.max_wait)
    }

    /// Half-width of the fuzz window around `base`
    pub fn fuzz_factor(base: Duration) -> Duration {
        Duration::from_secs_f64((base.as_secs_f64() * FUZZ_RATIO).max(MIN_FUZZ_SECS))
    }

    /// Wait before the given 1-based attempt
    ///
    /// A fuzzed result below zero becomes [`Duration::ZERO`], meaning no pause.
    pub fn compute_wait(&self, attempt: usize, fuzz: &dyn FuzzSource) -> Duration {
        let base = self.base_wait(attempt);
        if !self.fuzz {
            return base;
        }

        let mut sample = fuzz.sample();
        if !sample.is_finite() {
            sample = 0.5;
        }
        let sample = sample.clamp(0.0, 1.0);

        let factor = Self::fuzz_factor(base).as_secs_f64();
        let secs = base.as_secs_f64() + sample * (factor * 2.0) - factor;
        if secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(secs).unwrap_or(self.max_wait)
        }
    }
}

/// Wait before `attempt` under `config`
pub fn compute_wait(attempt: usize, config: &RetryConfig, fuzz: &dyn FuzzSource) -> Duration {
    BackoffPolicy::from_config(config).compute_wait(attempt, fuzz)
}

/// The default schedule as durations
pub fn default_schedule() -> Vec<Duration> {
    DEFAULT_WAIT_SCHEDULE_MS
        .iter()
        .map(|ms| Duration::from_millis(*ms))
        .collect()
}
