//! Core types describing where a cached value came from.

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from data this caller fetched itself.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Create a new cache result from a fetch started by another caller.
  pub fn joined(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Joined,
    }
  }

  /// Create a new cache result from a live cache entry.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }

  /// Map the data while keeping the source.
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// This caller ran the loader
  Network,
  /// Another caller's in-flight load was reused
  Joined,
  /// Live entry, no load needed
  Cache,
}
