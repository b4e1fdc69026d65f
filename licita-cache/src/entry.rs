//! A single cached value.

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// Value stored under one key, with its absolute expiry and tag set.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
    pub tags: HashSet<String>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, expires_at: Instant, tags: HashSet<String>) -> Self {
        Self {
            value,
            expires_at,
            tags,
        }
    }

    /// Expired strictly after `expires_at`; an entry is still readable at
    /// the exact instant it expires.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    /// Time left before expiry, `None` once expired.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        if self.is_expired_at(now) {
            None
        } else {
            Some(self.expires_at - now)
        }
    }
}
