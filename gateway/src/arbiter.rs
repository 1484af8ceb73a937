use crate::run_cache::RunCache;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ArbiterError {
    #[error("target permit not acquired within {0:?}")]
    Timeout(Duration),
    #[error("cancelled while waiting for the target permit")]
    Cancelled,
}

/// Admits one resolution at a time for a target.
///
/// The target's [`RunCache`] lives behind the permit, so only the current
/// holder can read or populate it. Waiters are queued fairly and suspend
/// until the permit is released, the deadline passes or they are cancelled.
#[derive(Debug, Default)]
pub struct TargetArbiter {
    cache: Mutex<RunCache>,
}

impl TargetArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<TargetPermit<'_>, ArbiterError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ArbiterError::Cancelled),
            guard = tokio::time::timeout(timeout, self.cache.lock()) => guard
                .map(|guard| TargetPermit { guard })
                .map_err(|_| ArbiterError::Timeout(timeout)),
        }
    }

    /// Takes the permit only if it is free right now.
    pub fn try_acquire(&self) -> Option<TargetPermit<'_>> {
        self.cache
            .try_lock()
            .ok()
            .map(|guard| TargetPermit { guard })
    }
}

/// Exclusive access to a target. Released when dropped.
#[derive(Debug)]
pub struct TargetPermit<'a> {
    guard: MutexGuard<'a, RunCache>,
}

impl Deref for TargetPermit<'_> {
    type Target = RunCache;

    fn deref(&self) -> &RunCache {
        &self.guard
    }
}

impl DerefMut for TargetPermit<'_> {
    fn deref_mut(&mut self) -> &mut RunCache {
        &mut self.guard
    }
}
