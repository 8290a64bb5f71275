//! Cache-aside access to work item metadata.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::cache::{Cacheable, MetadataKey, MetadataValue, ScopedKey};
use super::source::MetadataSource;
use super::types::{FieldDescriptor, ItemStates, StateSet, TypeSchema};
use crate::cache::TtlCache;
use crate::error::{MetadataError, MetadataResult};

/// The shared metadata cache. Construct one per process and hand clones of it
/// to every [`MetadataService`] that should see the same entries. Keys carry the
/// source's scope, so services for different projects never read each other's
/// entries.
pub type MetadataCache = TtlCache<ScopedKey, MetadataValue, MetadataError>;

/// How long metadata stays cached unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Answers metadata questions from the cache, falling back to the remote source.
///
/// Every operation is read-only with respect to the remote system. Failures are
/// returned unchanged and never cached.
#[derive(Clone)]
pub struct MetadataService {
  source: Arc<dyn MetadataSource>,
  scope: Arc<str>,
  cache: MetadataCache,
  ttl: Duration,
}

impl MetadataService {
  pub fn new(source: Arc<dyn MetadataSource>, cache: MetadataCache) -> Self {
    let scope = Arc::from(source.scope());
    Self {
      source,
      scope,
      cache,
      ttl: DEFAULT_TTL,
    }
  }

  /// Set how long fetched metadata stays cached.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn cache(&self) -> &MetadataCache {
    &self.cache
  }

  /// Cache key for `key` in this service's organization and project.
  pub fn key(&self, key: MetadataKey) -> ScopedKey {
    ScopedKey::new(&self.scope, key)
  }

  /// Work item type names in the project, in server order.
  pub async fn get_work_item_types(&self) -> MetadataResult<Arc<Vec<String>>> {
    self
      .load(MetadataKey::Types, |source| async move {
        source.fetch_work_item_types().await
      })
      .await
  }

  /// The organization's field catalog.
  pub async fn get_fields(&self) -> MetadataResult<Arc<Vec<FieldDescriptor>>> {
    self
      .load(MetadataKey::Fields, |source| async move {
        source.fetch_work_item_fields().await
      })
      .await
  }

  /// Fields and states of one type. Unknown types fail with `NotFound`.
  pub async fn get_type_schema(&self, type_name: &str) -> MetadataResult<Arc<TypeSchema>> {
    let name = type_name.to_string();
    self
      .load(MetadataKey::Schema(name.clone()), |source| async move {
        let schema = source.fetch_type_schema(&name).await?;
        if schema.states.is_empty() {
          return Err(MetadataError::invalid_payload(
            "type schema",
            format!("no states returned for {}", name),
          ));
        }
        Ok(schema)
      })
      .await
  }

  /// Legal state names for a type.
  pub async fn get_available_states(&self, type_name: &str) -> MetadataResult<Arc<StateSet>> {
    let name = type_name.to_string();
    self
      .load(MetadataKey::States(name.clone()), |source| async move {
        source
          .fetch_available_states(&name)
          .await?
          .require_non_empty(&name)
      })
      .await
  }

  /// Legal state names for one work item, with the item's type. Cached
  /// separately from the type's list.
  pub async fn get_available_states_for_item(&self, item_id: u64) -> MetadataResult<Arc<ItemStates>> {
    self
      .load(MetadataKey::ItemStates(item_id), move |source| async move {
        let item = source.fetch_available_states_for_item(item_id).await?;
        ItemStates::new(item.item_id, item.type_name, item.states)
      })
      .await
  }

  /// Drop the cached schema and states of one type.
  pub fn invalidate_type(&self, type_name: &str) {
    self.cache.invalidate_where(|scoped| {
      scoped.scope == self.scope && scoped.key.type_name() == Some(type_name)
    });
  }

  /// Drop the cached states of one work item.
  pub fn invalidate_item(&self, item_id: u64) {
    self.cache.invalidate(&self.key(MetadataKey::ItemStates(item_id)));
  }

  /// Drop every entry of this service's project.
  pub fn clear(&self) {
    self.cache.invalidate_where(|scoped| scoped.scope == self.scope);
  }

  async fn load<T, F, Fut>(&self, key: MetadataKey, fetch: F) -> MetadataResult<Arc<T>>
  where
    T: Cacheable + Send + Sync + 'static,
    F: FnOnce(Arc<dyn MetadataSource>) -> Fut + Send + 'static,
    Fut: Future<Output = MetadataResult<T>> + Send + 'static,
  {
    let key = self.key(key);
    let source = Arc::clone(&self.source);
    let result = self
      .cache
      .get_or_load(key.clone(), self.ttl, move || async move {
        let value = fetch(source).await?;
        Ok(Arc::new(value).into_value())
      })
      .await?;

    debug!(%key, source = ?result.source, "metadata resolved");

    T::from_value(result.data).ok_or_else(|| MetadataError::CacheMismatch {
      key: key.to_string(),
    })
  }
}
