//! Short-lived cached values.

use std::time::{Duration, Instant};

/// A value that carries its own expiry instant.
#[derive(Debug, Clone)]
pub struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    /// Wrap a value that stays fresh for `ttl`.
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Whether the value has expired at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Whether the value has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Get the value if it is still fresh.
    pub fn get(&self) -> Option<&T> {
        if self.is_expired() {
            None
        } else {
            Some(&self.value)
        }
    }

    /// Consume the wrapper, ignoring expiry.
    pub fn into_inner(self) -> T {
        self.value
    }
}
