use serde::Serialize;
use std::fmt;

use crate::error::{MetadataError, MetadataResult};

/// Name of a lifecycle state, e.g. "Active". Compared case-sensitively.
pub type StateName = String;

/// Legal state names for a type or item, in the order the service reported them.
/// Duplicates are dropped on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StateSet(Vec<StateName>);

impl StateSet {
  pub fn new<I, S>(states: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<StateName>,
  {
    let mut out: Vec<StateName> = Vec::new();
    for state in states {
      let state = state.into();
      if !out.contains(&state) {
        out.push(state);
      }
    }
    Self(out)
  }

  /// Exact, case-sensitive membership.
  pub fn contains(&self, state: &str) -> bool {
    self.0.iter().any(|s| s == state)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Reject an empty set: every work item type has at least one state, so an
  /// empty answer means the service returned something unusable.
  pub fn require_non_empty(self, subject: &str) -> MetadataResult<Self> {
    if self.is_empty() {
      return Err(MetadataError::invalid_payload(
        "states",
        format!("no states returned for {}", subject),
      ));
    }
    Ok(self)
  }
}

impl fmt::Display for StateSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.join(", "))
  }
}

impl<S: Into<StateName>> FromIterator<S> for StateSet {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self::new(iter)
  }
}

/// A field as exposed to metadata-discovery callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
  /// e.g. "System.Title"
  pub reference_name: String,
  pub display_name: String,
  /// "string", "integer", "dateTime", ... Not reported by type definitions.
  pub value_type: Option<String>,
  pub is_required: bool,
  pub allowed_values: Option<Vec<String>>,
}

/// Field set and legal states of one work item type.
///
/// Shared read-only once fetched; a refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSchema {
  pub type_name: String,
  pub description: Option<String>,
  pub fields: Vec<FieldDescriptor>,
  pub states: StateSet,
}

impl TypeSchema {
  pub fn new(
    type_name: impl Into<String>,
    description: Option<String>,
    fields: Vec<FieldDescriptor>,
    states: StateSet,
  ) -> MetadataResult<Self> {
    let type_name = type_name.into();
    let states = states.require_non_empty(&type_name)?;
    Ok(Self {
      type_name,
      description,
      fields,
      states,
    })
  }

  pub fn field(&self, reference_name: &str) -> Option<&FieldDescriptor> {
    self
      .fields
      .iter()
      .find(|f| f.reference_name == reference_name)
  }

  pub fn required_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
    self.fields.iter().filter(|f| f.is_required)
  }
}

/// Legal states of one work item, with the type they were read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStates {
  pub item_id: u64,
  pub type_name: String,
  pub states: StateSet,
}

impl ItemStates {
  pub fn new(item_id: u64, type_name: impl Into<String>, states: StateSet) -> MetadataResult<Self> {
    let states = states.require_non_empty(&format!("work item {}", item_id))?;
    Ok(Self {
      item_id,
      type_name: type_name.into(),
      states,
    })
  }
}
