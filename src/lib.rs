//! Work item metadata for Azure DevOps: a TTL cache with single-flight loading in
//! front of the metadata endpoints, and a validator that rejects illegal state
//! names before any remote state change is attempted.

pub mod cache;
pub mod config;
pub mod devops;
pub mod error;

pub use error::{MetadataError, MetadataResult};
