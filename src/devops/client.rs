use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::{
  decode, states_from, ApiField, ApiList, ApiState, ApiWorkItem, ApiWorkItemType,
};
use super::source::MetadataSource;
use super::types::{FieldDescriptor, ItemStates, StateSet, TypeSchema};
use crate::config::{Config, DevOpsConfig};
use crate::error::{MetadataError, MetadataResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether an endpoint lives under the project or the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
  Organization,
  Project,
}

/// Azure DevOps REST client for the metadata endpoints.
#[derive(Clone)]
pub struct AzureDevOpsClient {
  http: reqwest::Client,
  /// Organization root, e.g. https://dev.azure.com/contoso/
  base: Url,
  project: String,
  api_version: String,
  token: String,
}

impl AzureDevOpsClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_pat()?;
    Self::with_token(&config.devops, token)
  }

  pub fn with_token(devops: &DevOpsConfig, token: String) -> Result<Self> {
    let base = Url::parse(&devops.organization_url())
      .map_err(|e| eyre!("Invalid Azure DevOps URL {}: {}", devops.organization_url(), e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Invalid Azure DevOps URL {}", base));
    }

    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .gzip(true)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      project: devops.project.clone(),
      api_version: devops.api_version.clone(),
      token,
    })
  }

  /// Build an `_apis` URL. Segments are percent-encoded, so type names with
  /// spaces ("User Story") are safe to pass as-is.
  fn endpoint(
    &self,
    scope: Scope,
    segments: &[&str],
    query: &[(&str, &str)],
  ) -> MetadataResult<Url> {
    let mut url = self.base.clone();
    {
      let mut path = url
        .path_segments_mut()
        .map_err(|_| MetadataError::remote(format!("{} cannot be a base URL", self.base)))?;
      path.pop_if_empty();
      if scope == Scope::Project {
        path.push(&self.project);
      }
      path.push("_apis");
      path.extend(segments);
    }

    url
      .query_pairs_mut()
      .extend_pairs(query)
      .append_pair("api-version", &self.api_version);

    Ok(url)
  }

  async fn get_json(&self, what: &str, url: Url) -> MetadataResult<serde_json::Value> {
    debug!(%url, "GET {}", what);

    let response = self
      .http
      .get(url)
      .basic_auth("", Some(&self.token))
      .header(ACCEPT, "application/json")
      .send()
      .await
      .map_err(|e| MetadataError::remote(format!("Failed to fetch {}: {}", what, e)))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      return Err(MetadataError::not_found(what));
    }
    if !status.is_success() {
      let detail = response.text().await.unwrap_or_default();
      return Err(MetadataError::remote(format!(
        "Fetching {} returned {}: {}",
        what, status, detail
      )));
    }

    response
      .json()
      .await
      .map_err(|e| MetadataError::invalid_payload(what, e.to_string()))
  }
}

#[async_trait]
impl MetadataSource for AzureDevOpsClient {
  fn scope(&self) -> String {
    format!("{}{}", self.base, self.project)
  }

  async fn fetch_work_item_types(&self) -> MetadataResult<Vec<String>> {
    let url = self.endpoint(Scope::Project, &["wit", "workitemtypes"], &[])?;
    let list: ApiList<ApiWorkItemType> = decode(
      "work item types",
      self.get_json("work item types", url).await?,
    )?;

    list
      .value
      .into_iter()
      .map(ApiWorkItemType::into_name)
      .collect()
  }

  async fn fetch_work_item_fields(&self) -> MetadataResult<Vec<FieldDescriptor>> {
    let url = self.endpoint(Scope::Organization, &["wit", "fields"], &[])?;
    let list: ApiList<ApiField> = decode("fields", self.get_json("fields", url).await?)?;

    list
      .value
      .into_iter()
      .map(ApiField::into_descriptor)
      .collect()
  }

  async fn fetch_type_schema(&self, type_name: &str) -> MetadataResult<TypeSchema> {
    let what = format!("work item type '{}'", type_name);
    let url = self.endpoint(Scope::Project, &["wit", "workitemtypes", type_name], &[])?;
    let definition: ApiWorkItemType = decode(&what, self.get_json(&what, url).await?)?;

    definition.into_schema()
  }

  async fn fetch_available_states(&self, type_name: &str) -> MetadataResult<StateSet> {
    let what = format!("work item type '{}'", type_name);
    let url = self.endpoint(
      Scope::Project,
      &["wit", "workitemtypes", type_name, "states"],
      &[],
    )?;
    let list: ApiList<ApiState> = decode(&what, self.get_json(&what, url).await?)?;

    states_from(list.value, type_name)
  }

  async fn fetch_available_states_for_item(&self, item_id: u64) -> MetadataResult<ItemStates> {
    let what = format!("work item {}", item_id);
    let id = item_id.to_string();
    let url = self.endpoint(
      Scope::Organization,
      &["wit", "workitems", id.as_str()],
      &[("fields", "System.WorkItemType")],
    )?;
    let item: ApiWorkItem = decode(&what, self.get_json(&what, url).await?)?;

    // Goes straight to the remote, never through a cached type-level entry
    let type_name = item.work_item_type()?;
    let states = self.fetch_available_states(&type_name).await?;
    ItemStates::new(item_id, type_name, states)
  }
}
