//! In-memory `MetadataSource` for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::source::MetadataSource;
use super::types::{FieldDescriptor, ItemStates, StateSet, TypeSchema};
use crate::error::{MetadataError, MetadataResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
  Types,
  Fields,
  Schema,
  States,
  ItemStates,
}

pub struct FakeSource {
  scope: String,
  types: Vec<String>,
  type_states: HashMap<String, StateSet>,
  item_states: HashMap<u64, (String, StateSet)>,
  fields: Vec<FieldDescriptor>,
  delay: Duration,
  failure: Mutex<Option<MetadataError>>,
  calls: Mutex<HashMap<Op, u32>>,
  total: AtomicU32,
}

impl FakeSource {
  /// An Agile-like project: Bug, User Story and Task, plus item 42 (a Bug whose
  /// workflow currently allows fewer states than the type).
  pub fn agile() -> Self {
    Self::empty()
      .with_type("Bug", &["New", "Active", "Resolved", "Closed", "Removed"])
      .with_type("User Story", &["New", "Active", "Resolved", "Closed"])
      .with_type("Task", &["New", "Active", "Closed", "Removed"])
      .with_item(42, "Bug", &["Active", "Resolved"])
  }

  pub fn empty() -> Self {
    Self {
      scope: "contoso/Agile".to_string(),
      types: Vec::new(),
      type_states: HashMap::new(),
      item_states: HashMap::new(),
      fields: vec![FieldDescriptor {
        reference_name: "System.Title".to_string(),
        display_name: "Title".to_string(),
        value_type: Some("string".to_string()),
        is_required: true,
        allowed_values: None,
      }],
      delay: Duration::ZERO,
      failure: Mutex::new(None),
      calls: Mutex::new(HashMap::new()),
      total: AtomicU32::new(0),
    }
  }

  pub fn with_type(mut self, name: &str, states: &[&str]) -> Self {
    self.types.push(name.to_string());
    self
      .type_states
      .insert(name.to_string(), StateSet::new(states.iter().copied()));
    self
  }

  pub fn with_item(mut self, id: u64, type_name: &str, states: &[&str]) -> Self {
    self.item_states.insert(
      id,
      (type_name.to_string(), StateSet::new(states.iter().copied())),
    );
    self
  }

  pub fn with_scope(mut self, scope: &str) -> Self {
    self.scope = scope.to_string();
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Make every following call fail with `error` (or succeed again with `None`).
  pub fn set_failure(&self, error: Option<MetadataError>) {
    *self.failure.lock().unwrap() = error;
  }

  pub fn calls(&self, op: Op) -> u32 {
    self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
  }

  pub fn total_calls(&self) -> u32 {
    self.total.load(Ordering::SeqCst)
  }

  async fn enter(&self, op: Op) -> MetadataResult<()> {
    *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
    self.total.fetch_add(1, Ordering::SeqCst);

    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }

    let failure = self.failure.lock().unwrap().clone();
    match failure {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  fn states_of(&self, type_name: &str) -> MetadataResult<StateSet> {
    self
      .type_states
      .get(type_name)
      .cloned()
      .ok_or_else(|| MetadataError::not_found(format!("work item type '{}'", type_name)))
  }
}

#[async_trait]
impl MetadataSource for FakeSource {
  fn scope(&self) -> String {
    self.scope.clone()
  }

  async fn fetch_work_item_types(&self) -> MetadataResult<Vec<String>> {
    self.enter(Op::Types).await?;
    Ok(self.types.clone())
  }

  async fn fetch_work_item_fields(&self) -> MetadataResult<Vec<FieldDescriptor>> {
    self.enter(Op::Fields).await?;
    Ok(self.fields.clone())
  }

  async fn fetch_type_schema(&self, type_name: &str) -> MetadataResult<TypeSchema> {
    self.enter(Op::Schema).await?;
    Ok(TypeSchema {
      type_name: type_name.to_string(),
      description: None,
      fields: self.fields.clone(),
      states: self.states_of(type_name)?,
    })
  }

  async fn fetch_available_states(&self, type_name: &str) -> MetadataResult<StateSet> {
    self.enter(Op::States).await?;
    self.states_of(type_name)
  }

  async fn fetch_available_states_for_item(&self, item_id: u64) -> MetadataResult<ItemStates> {
    self.enter(Op::ItemStates).await?;
    let (type_name, states) = self
      .item_states
      .get(&item_id)
      .cloned()
      .ok_or_else(|| MetadataError::not_found(format!("work item {}", item_id)))?;

    // Unchecked so empty answers reach the service as-is
    Ok(ItemStates {
      item_id,
      type_name,
      states,
    })
  }
}
