//! Spin-wait lock around local-cache read-modify-write sequences.
//!
//! A boolean flag is claimed with compare-and-swap; contenders sleep for a
//! short poll interval and retry. It only serializes writers inside one
//! process and says nothing about other devices or the remote store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Default interval between acquisition attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct CacheLock {
    busy: AtomicBool,
    poll: Duration,
}

/// Held while the cache is being rewritten. Releases the flag on drop, so
/// an early return or `?` cannot leave the cache locked.
#[derive(Debug)]
pub struct CacheGuard<'a> {
    lock: &'a CacheLock,
}

impl CacheLock {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(poll: Duration) -> Self {
        Self {
            busy: AtomicBool::new(false),
            poll,
        }
    }

    /// Wait until the flag is free, then take it.
    pub async fn acquire(&self) -> CacheGuard<'_> {
        loop {
            if let Some(guard) = self.try_acquire() {
                return guard;
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    pub fn try_acquire(&self) -> Option<CacheGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| CacheGuard { lock: self })
    }

    pub fn is_locked(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }
}

impl Default for CacheLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CacheGuard<'_> {
    fn drop(&mut self) {
        self.lock.busy.store(false, Ordering::Release);
    }
}
