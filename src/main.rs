use azdo_meta::config::{CacheConfig, Config, DevOpsConfig};
use azdo_meta::devops::{
  AzureDevOpsClient, MetadataCache, MetadataService, StateValidator, TypeCategory, TypeResolver,
  ValidationResult,
};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "azdo-meta")]
#[command(about = "Inspect and validate Azure DevOps work item metadata")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/azdo-meta/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Azure DevOps project to use
  #[arg(short, long)]
  project: Option<String>,

  /// Seconds to keep fetched metadata cached
  #[arg(long)]
  ttl: Option<u64>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List work item type names
  Types,
  /// List the organization's fields
  Fields,
  /// Show fields and states of a work item type
  Schema { type_name: String },
  /// List legal states of a work item type
  States { type_name: String },
  /// List legal states of one work item
  ItemStates { id: u64 },
  /// Check a state name against a work item type
  Validate { type_name: String, state: String },
  /// Check a state name against one work item
  ValidateItem { id: u64, state: String },
  /// Map a category (bug, task, backlog-item, ...) to a type in this project
  Resolve {
    category: TypeCategory,
    /// Type name to use when the project has it
    #[arg(long)]
    prefer: Option<String>,
  },
  /// Detect the project's process template
  Template,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  // Logs go to stderr so stdout stays machine readable
  let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with(tracing_subscriber::fmt::layer().with_writer(writer))
    .init();

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Apply command line overrides
  let config = Config {
    devops: DevOpsConfig {
      project: args.project.unwrap_or(config.devops.project),
      ..config.devops
    },
    cache: CacheConfig {
      ttl_secs: args.ttl.unwrap_or(config.cache.ttl_secs),
    },
  };
  config.validate()?;

  let client = AzureDevOpsClient::new(&config)?;
  let metadata =
    MetadataService::new(Arc::new(client), MetadataCache::new()).with_ttl(config.cache.ttl());

  run(args.command, metadata).await
}

async fn run(command: Command, metadata: MetadataService) -> Result<ExitCode> {
  match command {
    Command::Types => print_json(&*metadata.get_work_item_types().await?)?,
    Command::Fields => print_json(&*metadata.get_fields().await?)?,
    Command::Schema { type_name } => print_json(&*metadata.get_type_schema(&type_name).await?)?,
    Command::States { type_name } => {
      print_json(&*metadata.get_available_states(&type_name).await?)?
    }
    Command::ItemStates { id } => {
      print_json(&*metadata.get_available_states_for_item(id).await?)?
    }
    Command::Validate { type_name, state } => {
      let result = StateValidator::new(metadata)
        .validate_for_type(&type_name, &state)
        .await?;
      return report(&state, result);
    }
    Command::ValidateItem { id, state } => {
      let result = StateValidator::new(metadata)
        .validate_for_item(id, &state)
        .await?;
      return report(&state, result);
    }
    Command::Resolve { category, prefer } => {
      let type_name = TypeResolver::new(metadata)
        .resolve(category, prefer.as_deref())
        .await?;
      print_json(&json!({ "category": category.to_string(), "type": type_name }))?
    }
    Command::Template => print_json(&TypeResolver::new(metadata).process_template().await?)?,
  }

  Ok(ExitCode::SUCCESS)
}

fn report(state: &str, result: ValidationResult) -> Result<ExitCode> {
  match result.into_result() {
    Ok(()) => {
      print_json(&json!({ "state": state, "valid": true }))?;
      Ok(ExitCode::SUCCESS)
    }
    Err(rejection) => {
      eprintln!("{}", rejection);
      Ok(ExitCode::FAILURE)
    }
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  let rendered =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to render output: {}", e))?;
  println!("{}", rendered);
  Ok(())
}
