use async_trait::async_trait;

use super::types::{FieldDescriptor, ItemStates, StateSet, TypeSchema};
use crate::error::MetadataResult;

/// Remote metadata operations the service caches.
///
/// Implementations talk to the network and are assumed slow, rate-limited and
/// fallible. They do not retry; a failed call is reported as-is.
#[async_trait]
pub trait MetadataSource: Send + Sync {
  /// Identifies the organization and project this source reads from. Cache
  /// entries are keyed by it, so sources for different projects can share a cache.
  fn scope(&self) -> String;

  /// Work item type names, in server order.
  async fn fetch_work_item_types(&self) -> MetadataResult<Vec<String>>;

  async fn fetch_work_item_fields(&self) -> MetadataResult<Vec<FieldDescriptor>>;

  async fn fetch_type_schema(&self, type_name: &str) -> MetadataResult<TypeSchema>;

  /// Legal states for a type. Sources without a dedicated endpoint get them from
  /// the full schema.
  async fn fetch_available_states(&self, type_name: &str) -> MetadataResult<StateSet> {
    Ok(self.fetch_type_schema(type_name).await?.states)
  }

  /// Legal states for one work item, which may differ from its type's list,
  /// along with the item's type.
  async fn fetch_available_states_for_item(&self, item_id: u64) -> MetadataResult<ItemStates>;
}
