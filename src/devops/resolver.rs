//! Maps generic work item categories onto whatever types the project's process
//! template actually defines.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::metadata::MetadataService;
use crate::error::MetadataError;

/// A kind of work item, independent of process template naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
  BacklogItem,
  Bug,
  Task,
  Feature,
  Epic,
  TestCase,
}

impl TypeCategory {
  /// Concrete type names for this category, most preferred first.
  pub fn candidates(self) -> &'static [&'static str] {
    match self {
      Self::BacklogItem => &["Product Backlog Item", "User Story", "Issue", "Requirement"],
      Self::Bug => &["Bug", "Defect"],
      Self::Task => &["Task"],
      Self::Feature => &["Feature"],
      Self::Epic => &["Epic"],
      Self::TestCase => &["Test Case"],
    }
  }
}

impl fmt::Display for TypeCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::BacklogItem => "backlog_item",
      Self::Bug => "bug",
      Self::Task => "task",
      Self::Feature => "feature",
      Self::Epic => "epic",
      Self::TestCase => "test_case",
    })
  }
}

impl FromStr for TypeCategory {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().replace('-', "_").as_str() {
      "backlog_item" | "pbi" | "story" => Ok(Self::BacklogItem),
      "bug" => Ok(Self::Bug),
      "task" => Ok(Self::Task),
      "feature" => Ok(Self::Feature),
      "epic" => Ok(Self::Epic),
      "test_case" => Ok(Self::TestCase),
      other => Err(format!("Unknown work item category: {}", other)),
    }
  }
}

/// Process template inferred from the available types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessTemplate {
  Scrum,
  Agile,
  Basic,
  #[serde(rename = "CMMI")]
  Cmmi,
  Custom,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTemplateInfo {
  pub template: ProcessTemplate,
  pub backlog_item_type: Option<String>,
  pub available_types: Vec<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
  #[error(transparent)]
  Metadata(#[from] MetadataError),

  #[error(
    "Cannot find suitable work item type for category '{category}'. Available types in this project: {}",
    .available.join(", ")
  )]
  NoMatchingType {
    category: TypeCategory,
    available: Vec<String>,
  },
}

/// Resolves categories against the project's (cached) work item type list.
#[derive(Clone)]
pub struct TypeResolver {
  metadata: MetadataService,
}

impl TypeResolver {
  pub fn new(metadata: MetadataService) -> Self {
    Self { metadata }
  }

  /// Pick the concrete type for `category`. An available `prefer` wins.
  pub async fn resolve(
    &self,
    category: TypeCategory,
    prefer: Option<&str>,
  ) -> Result<String, ResolveError> {
    let available = self.metadata.get_work_item_types().await?;
    let is_available = |name: &str| available.iter().any(|t| t == name);

    if let Some(prefer) = prefer.filter(|p| is_available(*p)) {
      return Ok(prefer.to_string());
    }

    category
      .candidates()
      .iter()
      .find(|candidate| is_available(**candidate))
      .map(|candidate| candidate.to_string())
      .ok_or_else(|| {
        let mut available = available.to_vec();
        available.sort();
        ResolveError::NoMatchingType {
          category,
          available,
        }
      })
  }

  pub async fn process_template(&self) -> Result<ProcessTemplateInfo, MetadataError> {
    let available = self.metadata.get_work_item_types().await?;

    let backlog_item_type = TypeCategory::BacklogItem
      .candidates()
      .iter()
      .find(|candidate| available.iter().any(|t| t == *candidate))
      .map(|candidate| candidate.to_string());

    let template = match backlog_item_type.as_deref() {
      Some("Product Backlog Item") => ProcessTemplate::Scrum,
      Some("User Story") => ProcessTemplate::Agile,
      Some("Issue") => ProcessTemplate::Basic,
      Some("Requirement") => ProcessTemplate::Cmmi,
      _ => ProcessTemplate::Custom,
    };

    let mut available_types = available.to_vec();
    available_types.sort();

    Ok(ProcessTemplateInfo {
      template,
      backlog_item_type,
      available_types,
    })
  }
}
