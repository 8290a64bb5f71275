use std::time::Duration;
use tokio::time::Instant;

/// A stored value with the instant it was stored and how long it stays live.
///
/// Expiry is evaluated lazily on access; nothing sweeps entries in the background.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub value: V,
  pub stored_at: Instant,
  pub ttl: Duration,
}

impl<V> CacheEntry<V> {
  pub fn new(value: V, ttl: Duration) -> Self {
    Self {
      value,
      stored_at: Instant::now(),
      ttl,
    }
  }

  /// An entry is expired once `now` is strictly past `stored_at + ttl`.
  /// A TTL too large to represent as an instant never expires.
  pub fn is_expired(&self, now: Instant) -> bool {
    match self.stored_at.checked_add(self.ttl) {
      Some(expires_at) => now > expires_at,
      None => false,
    }
  }
}
