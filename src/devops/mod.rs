//! Azure DevOps work item metadata: discovery, caching and state validation.

pub mod api_types;
pub mod cache;
pub mod client;
pub mod metadata;
pub mod resolver;
pub mod source;
pub mod types;
pub mod validator;

#[cfg(test)]
pub(crate) mod fake;

pub use client::AzureDevOpsClient;
pub use metadata::{MetadataCache, MetadataService, DEFAULT_TTL};
pub use resolver::{ProcessTemplate, ProcessTemplateInfo, ResolveError, TypeCategory, TypeResolver};
pub use source::MetadataSource;
pub use types::{FieldDescriptor, ItemStates, StateName, StateSet, TypeSchema};
pub use validator::{StateRejection, StateValidator, Subject, ValidationResult};
