//! Cache keys and cached value shapes for work item metadata.

use std::fmt;
use std::sync::Arc;

use super::types::{FieldDescriptor, ItemStates, StateSet, TypeSchema};

// ============================================================================
// Query key types
// ============================================================================

/// Composite cache key: operation kind plus type name or item id.
///
/// Type names compare exactly; "Bug" and "bug" are different keys, matching
/// the service's own case-sensitive type names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataKey {
  Types,
  Fields,
  Schema(String),
  States(String),
  /// Kept apart from `States`: an item's legal states can differ from its type's.
  ItemStates(u64),
}

impl MetadataKey {
  /// The type name this key is about, if any.
  pub fn type_name(&self) -> Option<&str> {
    match self {
      Self::Schema(name) | Self::States(name) => Some(name.as_str()),
      _ => None,
    }
  }
}

impl fmt::Display for MetadataKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Types => f.write_str("types"),
      Self::Fields => f.write_str("fields"),
      Self::Schema(name) => write!(f, "schema:{}", name),
      Self::States(name) => write!(f, "states:{}", name),
      Self::ItemStates(id) => write!(f, "item-states:{}", id),
    }
  }
}

/// A [`MetadataKey`] qualified by the organization and project it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedKey {
  pub scope: Arc<str>,
  pub key: MetadataKey,
}

impl ScopedKey {
  pub fn new(scope: &Arc<str>, key: MetadataKey) -> Self {
    Self {
      scope: Arc::clone(scope),
      key,
    }
  }
}

impl fmt::Display for ScopedKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}|{}", self.scope, self.key)
  }
}

// ============================================================================
// Cached values
// ============================================================================

/// Everything the metadata cache can hold. Values are shared behind `Arc` so
/// concurrent readers never copy them.
#[derive(Debug, Clone)]
pub enum MetadataValue {
  Types(Arc<Vec<String>>),
  Fields(Arc<Vec<FieldDescriptor>>),
  Schema(Arc<TypeSchema>),
  States(Arc<StateSet>),
  ItemStates(Arc<ItemStates>),
}

/// Values that can be stored in and read back from [`MetadataValue`].
pub trait Cacheable: Sized {
  fn into_value(self: Arc<Self>) -> MetadataValue;

  fn from_value(value: MetadataValue) -> Option<Arc<Self>>;
}

impl Cacheable for Vec<String> {
  fn into_value(self: Arc<Self>) -> MetadataValue {
    MetadataValue::Types(self)
  }

  fn from_value(value: MetadataValue) -> Option<Arc<Self>> {
    match value {
      MetadataValue::Types(types) => Some(types),
      _ => None,
    }
  }
}

impl Cacheable for Vec<FieldDescriptor> {
  fn into_value(self: Arc<Self>) -> MetadataValue {
    MetadataValue::Fields(self)
  }

  fn from_value(value: MetadataValue) -> Option<Arc<Self>> {
    match value {
      MetadataValue::Fields(fields) => Some(fields),
      _ => None,
    }
  }
}

impl Cacheable for TypeSchema {
  fn into_value(self: Arc<Self>) -> MetadataValue {
    MetadataValue::Schema(self)
  }

  fn from_value(value: MetadataValue) -> Option<Arc<Self>> {
    match value {
      MetadataValue::Schema(schema) => Some(schema),
      _ => None,
    }
  }
}

impl Cacheable for StateSet {
  fn into_value(self: Arc<Self>) -> MetadataValue {
    MetadataValue::States(self)
  }

  fn from_value(value: MetadataValue) -> Option<Arc<Self>> {
    match value {
      MetadataValue::States(states) => Some(states),
      _ => None,
    }
  }
}

impl Cacheable for ItemStates {
  fn into_value(self: Arc<Self>) -> MetadataValue {
    MetadataValue::ItemStates(self)
  }

  fn from_value(value: MetadataValue) -> Option<Arc<Self>> {
    match value {
      MetadataValue::ItemStates(item) => Some(item),
      _ => None,
    }
  }
}
