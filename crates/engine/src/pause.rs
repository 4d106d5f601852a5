//! Blocking pause between attempts

use std::time::Duration;
use txretry_concurrency::{CancellationToken, Cancelled};

/// Blocks the calling thread between attempts
///
/// Injected into the coordinator so tests can record waits instead of
/// sleeping.
pub trait Pause: Send + Sync {
    /// Wait for `duration`, returning early with `Err(Cancelled)` if `cancel`
    /// fires first
    fn pause(&self, duration: Duration, cancel: Option<&CancellationToken>)
        -> Result<(), Cancelled>;
}

/// Sleeps the current OS thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(
        &self,
        duration: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), Cancelled> {
        match cancel {
            Some(token) => token.sleep(duration),
            None => {
                std::thread::sleep(duration);
                Ok(())
            }
        }
    }
}

/// Suspends the current tokio task, returning early if `cancel` fires
pub async fn pause_task(
    duration: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<(), Cancelled> {
    match cancel {
        Some(token) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = token.cancelled() => Err(Cancelled),
            }
        }
        None => {
            tokio::time::sleep(duration).await;
            Ok(())
        }
    }
}
