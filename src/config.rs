use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub devops: DevOpsConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevOpsConfig {
  /// Server root; override for Azure DevOps Server installations
  #[serde(default = "default_server_url")]
  pub server_url: String,
  pub organization: String,
  pub project: String,
  #[serde(default = "default_api_version")]
  pub api_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds before cached metadata is refetched
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: default_ttl_secs(),
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }
}

fn default_server_url() -> String {
  "https://dev.azure.com".to_string()
}

fn default_api_version() -> String {
  "7.1".to_string()
}

fn default_ttl_secs() -> u64 {
  3600
}

impl DevOpsConfig {
  /// e.g. https://dev.azure.com/contoso/
  pub fn organization_url(&self) -> String {
    format!(
      "{}/{}/",
      self.server_url.trim_end_matches('/'),
      self.organization
    )
  }
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./azdo-meta.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/azdo-meta/config.yaml
  /// 4. AZDO_ORGANIZATION / AZDO_PROJECT / AZDO_API_VERSION environment variables
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::from_env()?,
    };
    config.validate()?;

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("azdo-meta.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("azdo-meta").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let required = |key: &str| {
      lookup(key).ok_or_else(|| {
        eyre!(
          "No configuration file found and {} is not set.\n\
           Create ~/.config/azdo-meta/config.yaml or set AZDO_ORGANIZATION and AZDO_PROJECT.",
          key
        )
      })
    };

    Ok(Self {
      devops: DevOpsConfig {
        server_url: lookup("AZDO_SERVER_URL").unwrap_or_else(default_server_url),
        organization: required("AZDO_ORGANIZATION")?,
        project: required("AZDO_PROJECT")?,
        api_version: lookup("AZDO_API_VERSION").unwrap_or_else(default_api_version),
      },
      cache: CacheConfig::default(),
    })
  }

  /// Report the first missing required setting.
  pub fn validate(&self) -> Result<()> {
    if self.devops.organization.trim().is_empty() {
      return Err(eyre!("devops.organization is not set"));
    }
    if self.devops.project.trim().is_empty() {
      return Err(eyre!("devops.project is not set"));
    }
    Ok(())
  }

  /// Get the personal access token from the environment.
  ///
  /// Checks AZDO_PAT.
  pub fn get_pat() -> Result<String> {
    std::env::var("AZDO_PAT")
      .map_err(|_| eyre!("Azure DevOps token not found. Set the AZDO_PAT environment variable."))
  }
}
