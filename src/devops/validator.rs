//! Local state checks performed before any remote state change.
//!
//! The service only exposes a flat list of legal states per type (or item), so
//! this is a membership check: the item's current state plays no part.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::metadata::MetadataService;
use super::types::StateSet;
use crate::error::MetadataResult;

/// What a state was checked against. Both render as the type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
  Type(String),
  Item { id: u64, type_name: String },
}

impl Subject {
  pub fn type_name(&self) -> &str {
    match self {
      Self::Type(name) | Self::Item { type_name: name, .. } => name.as_str(),
    }
  }
}

impl fmt::Display for Subject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.type_name())
  }
}

/// A target state that is not in the legal set, with the alternatives.
///
/// The rendered message is relied on by callers; keep its wording stable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid state '{target}' for {subject}. Available states: {available}")]
pub struct StateRejection {
  pub target: String,
  pub subject: Subject,
  pub available: Arc<StateSet>,
}

/// Outcome of a state check. A rejection is a user input problem, not an error;
/// metadata failures surface separately as `Err(MetadataError)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
  Accepted,
  Rejected(StateRejection),
}

impl ValidationResult {
  pub fn is_ok(&self) -> bool {
    matches!(self, Self::Accepted)
  }

  pub fn message(&self) -> Option<String> {
    self.rejection().map(ToString::to_string)
  }

  pub fn rejection(&self) -> Option<&StateRejection> {
    match self {
      Self::Accepted => None,
      Self::Rejected(rejection) => Some(rejection),
    }
  }

  pub fn into_result(self) -> Result<(), StateRejection> {
    match self {
      Self::Accepted => Ok(()),
      Self::Rejected(rejection) => Err(rejection),
    }
  }
}

/// Checks proposed states against the cached legal-state lists.
#[derive(Clone)]
pub struct StateValidator {
  metadata: MetadataService,
}

impl StateValidator {
  pub fn new(metadata: MetadataService) -> Self {
    Self { metadata }
  }

  /// Is `target_state` a legal state name for `type_name`?
  pub async fn validate_for_type(
    &self,
    type_name: &str,
    target_state: &str,
  ) -> MetadataResult<ValidationResult> {
    let available = self.metadata.get_available_states(type_name).await?;
    Ok(check(Subject::Type(type_name.to_string()), target_state, available))
  }

  /// Same check against one item's legal states rather than its type's.
  pub async fn validate_for_item(
    &self,
    item_id: u64,
    target_state: &str,
  ) -> MetadataResult<ValidationResult> {
    let item = self.metadata.get_available_states_for_item(item_id).await?;
    let subject = Subject::Item {
      id: item_id,
      type_name: item.type_name.clone(),
    };
    Ok(check(subject, target_state, Arc::new(item.states.clone())))
  }
}

fn check(subject: Subject, target_state: &str, available: Arc<StateSet>) -> ValidationResult {
  if available.contains(target_state) {
    return ValidationResult::Accepted;
  }

  info!(?subject, state = target_state, "rejected state change");
  ValidationResult::Rejected(StateRejection {
    target: target_state.to_string(),
    subject,
    available,
  })
}
