//! Serde-deserializable types matching Azure DevOps API responses.
//!
//! These are separate from domain types so payloads are checked once at the
//! boundary. Anything missing a required sub-field becomes
//! [`MetadataError::InvalidPayload`] instead of leaking inward half-populated.

use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;

use super::types::{FieldDescriptor, StateSet, TypeSchema};
use crate::error::{MetadataError, MetadataResult};

/// Decode a JSON body into an API type, labelling failures with `what`.
pub fn decode<T: DeserializeOwned>(what: &str, body: serde_json::Value) -> MetadataResult<T> {
  serde_json::from_value(body).map_err(|e| MetadataError::invalid_payload(what, e.to_string()))
}

// ============================================================================
// Common envelopes
// ============================================================================

/// Collection responses: `{ "count": n, "value": [...] }`
#[derive(Debug, Deserialize)]
pub struct ApiList<T> {
  #[serde(default = "Vec::new")]
  pub value: Vec<T>,
}

// ============================================================================
// Work item types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiState {
  pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTypeField {
  pub reference_name: Option<String>,
  pub name: Option<String>,
  #[serde(default)]
  pub always_required: bool,
  // Picklist values can be strings or numbers
  pub allowed_values: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiWorkItemType {
  pub name: Option<String>,
  pub description: Option<String>,
  #[serde(default)]
  pub fields: Vec<ApiTypeField>,
  #[serde(default)]
  pub states: Vec<ApiState>,
}

// ============================================================================
// Organization field catalog
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiField {
  pub reference_name: Option<String>,
  pub name: Option<String>,
  #[serde(rename = "type")]
  pub value_type: Option<String>,
}

// ============================================================================
// Work items
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiWorkItem {
  pub id: u64,
  #[serde(default)]
  pub fields: HashMap<String, serde_json::Value>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl ApiWorkItemType {
  pub fn into_name(self) -> MetadataResult<String> {
    self
      .name
      .ok_or_else(|| MetadataError::invalid_payload("work item types", "type without a name"))
  }

  pub fn into_schema(self) -> MetadataResult<TypeSchema> {
    let type_name = self
      .name
      .ok_or_else(|| MetadataError::invalid_payload("type schema", "missing name"))?;

    let fields = self
      .fields
      .into_iter()
      .map(ApiTypeField::into_descriptor)
      .collect::<MetadataResult<Vec<_>>>()?;

    let states = states_from(self.states, &type_name)?;

    TypeSchema::new(type_name, self.description, fields, states)
  }
}

impl ApiTypeField {
  fn into_descriptor(self) -> MetadataResult<FieldDescriptor> {
    let (reference_name, display_name) =
      required_names("type schema", self.reference_name, self.name)?;
    Ok(FieldDescriptor {
      reference_name,
      display_name,
      value_type: None,
      is_required: self.always_required,
      allowed_values: self
        .allowed_values
        .filter(|values| !values.is_empty())
        .map(|values| values.iter().map(allowed_value_text).collect()),
    })
  }
}

impl ApiField {
  pub fn into_descriptor(self) -> MetadataResult<FieldDescriptor> {
    let (reference_name, display_name) =
      required_names("fields", self.reference_name, self.name)?;
    Ok(FieldDescriptor {
      reference_name,
      display_name,
      value_type: self.value_type,
      is_required: false,
      allowed_values: None,
    })
  }
}

impl ApiWorkItem {
  /// The item's type, from `System.WorkItemType`.
  pub fn work_item_type(&self) -> MetadataResult<String> {
    self
      .fields
      .get("System.WorkItemType")
      .and_then(|v| v.as_str())
      .map(String::from)
      .ok_or_else(|| {
        MetadataError::invalid_payload(
          "work item",
          format!("work item {} has no System.WorkItemType", self.id),
        )
      })
  }
}

/// Convert state entries to a non-empty [`StateSet`].
pub fn states_from(states: Vec<ApiState>, subject: &str) -> MetadataResult<StateSet> {
  let names = states
    .into_iter()
    .map(|s| {
      s.name
        .ok_or_else(|| MetadataError::invalid_payload("states", "state without a name"))
    })
    .collect::<MetadataResult<Vec<_>>>()?;

  StateSet::new(names).require_non_empty(subject)
}

// ============================================================================
// Helpers
// ============================================================================

fn required_names(
  what: &str,
  reference_name: Option<String>,
  name: Option<String>,
) -> MetadataResult<(String, String)> {
  match (reference_name, name) {
    (Some(reference_name), Some(name)) => Ok((reference_name, name)),
    (Some(reference_name), None) => Err(MetadataError::invalid_payload(
      what,
      format!("field {} has no name", reference_name),
    )),
    (None, _) => Err(MetadataError::invalid_payload(
      what,
      "field without a referenceName",
    )),
  }
}

fn allowed_value_text(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
