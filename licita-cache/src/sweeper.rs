//! Periodic removal of expired entries.

use crate::error::{CacheError, CacheResult};
use crate::store::TaggedCache;
use licita_log::{debug, info};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Handle to a running sweep task. The task stops when the handle is
/// dropped or when every clone of the cache has been dropped.
#[derive(Debug)]
pub struct Sweeper {
    handle: JoinHandle<()>,
    interval: Duration,
}

impl Sweeper {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop sweeping.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<V: Send + 'static> TaggedCache<V> {
    /// Spawn a task that calls [`cleanup`](Self::cleanup) every
    /// `interval`, starting one interval from now.
    ///
    /// Fails if `interval` is zero or too large to schedule. Must be called
    /// from within a Tokio runtime.
    pub fn spawn_sweeper(&self, interval: Duration) -> CacheResult<Sweeper> {
        if interval.is_zero() {
            return Err(CacheError::Config(
                "sweep interval must be non-zero".to_string(),
            ));
        }
        let first = Instant::now().checked_add(interval).ok_or_else(|| {
            CacheError::Config(format!("sweep interval {:?} is out of range", interval))
        })?;
        let weak = self.downgrade();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else {
                    debug!("Cache dropped, stopping sweeper");
                    break;
                };

                let removed = inner.lock().purge_expired(Instant::now());
                if removed > 0 {
                    info!("Cache cleanup: removed {} expired entries", removed);
                }
            }
        });

        Ok(Sweeper { handle, interval })
    }

    /// Spawn a sweeper using the configured interval.
    pub fn spawn_default_sweeper(&self) -> CacheResult<Sweeper> {
        self.spawn_sweeper(self.config().sweep_interval)
    }
}
