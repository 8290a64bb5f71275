//! Error types for metadata discovery.

use thiserror::Error;

/// Failure to obtain metadata from the remote service.
///
/// A state that is merely not allowed is *not* an error; see
/// [`ValidationResult`](crate::devops::ValidationResult).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
  /// The requested work item type or work item does not exist remotely.
  #[error("{what} not found")]
  NotFound { what: String },

  /// Transport failure, auth failure, rate limiting or any other non-success response.
  #[error("Azure DevOps request failed: {message}")]
  Remote { message: String },

  /// The service answered, but the payload was unusable.
  #[error("Invalid {what} payload: {reason}")]
  InvalidPayload { what: String, reason: String },

  #[error("Cached value under {key} has an unexpected shape")]
  CacheMismatch { key: String },
}

impl MetadataError {
  pub fn not_found(what: impl Into<String>) -> Self {
    Self::NotFound { what: what.into() }
  }

  pub fn remote(message: impl Into<String>) -> Self {
    Self::Remote {
      message: message.into(),
    }
  }

  pub fn invalid_payload(what: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidPayload {
      what: what.into(),
      reason: reason.into(),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }

  /// Whether this is an infrastructure failure ("service unavailable") rather
  /// than an unknown type or item.
  pub fn is_remote(&self) -> bool {
    !self.is_not_found()
  }
}

pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
