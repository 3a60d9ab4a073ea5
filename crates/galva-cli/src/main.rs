//! `galva` operator binary.
//!
//! Reads `galva.toml` (or the path given with `--config`), opens the SQLite
//! store and runs one engine command, printing the result as JSON.
//!
//! ```text
//! galva create spec.json --overrides overrides.json
//! galva catalog add 2.40 6.00 1008
//! galva recipe 6f1c0b1e-...
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use galva_core::{
  EngineConfig, RawSpec, RelationshipIntegrityManager, product::RawMaterialVariant,
  recipe::RecipeOverride,
};
use galva_store_sqlite::SqliteStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Galvanized-wire product configuration engine")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "galva.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Compute codes, raw materials and recipes without persisting anything.
  Derive {
    spec:      PathBuf,
    #[arg(long)]
    overrides: Option<PathBuf>,
  },
  /// Derive and persist a new product graph.
  Create {
    spec:      PathBuf,
    #[arg(long)]
    overrides: Option<PathBuf>,
  },
  /// Recompute an existing product from a new spec, keeping its codes.
  Update {
    id:        Uuid,
    spec:      PathBuf,
    #[arg(long)]
    overrides: Option<PathBuf>,
  },
  /// Delete a product with its intermediate, relations and recipes.
  Delete { id: Uuid },
  /// Print a stored product graph.
  Show { id: Uuid },
  /// List finished products.
  List,
  /// Raw-material catalog maintenance.
  Catalog {
    #[command(subcommand)]
    command: CatalogCommand,
  },
  /// Print a product's recipes as ERP import rows.
  Recipe { id: Uuid },
}

#[derive(Subcommand)]
enum CatalogCommand {
  /// Add a raw-material variant; its code is derived from the fields.
  Add {
    /// Drawn diameter in mm.
    diameter:       Decimal,
    /// Wire-rod diameter class in mm.
    filament_class: Decimal,
    /// Steel quality grade.
    quality:        u16,
  },
  /// List every catalog variant.
  List,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CliConfig {
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
  #[serde(default)]
  engine:     EngineConfig,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/galva/galva.db") }

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("GALVA")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let cli_cfg: CliConfig = settings
    .try_deserialize()
    .context("failed to deserialise CliConfig")?;

  let store_path = expand_tilde(&cli_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let manager = RelationshipIntegrityManager::new(Arc::new(store), cli_cfg.engine);

  match cli.command {
    Command::Derive { spec, overrides } => {
      let derivation = manager
        .derive(&read_spec(&spec)?, &read_overrides(overrides.as_deref())?)
        .await?;
      print_json(&derivation)
    }
    Command::Create { spec, overrides } => {
      let graph = manager
        .create(&read_spec(&spec)?, &read_overrides(overrides.as_deref())?)
        .await?;
      print_json(&graph)
    }
    Command::Update { id, spec, overrides } => {
      let graph = manager
        .update(id, &read_spec(&spec)?, &read_overrides(overrides.as_deref())?)
        .await?;
      print_json(&graph)
    }
    Command::Delete { id } => print_json(&manager.delete(id).await?),
    Command::Show { id } => print_json(&manager.show(id).await?),
    Command::List => print_json(&manager.list().await?),
    Command::Catalog { command: CatalogCommand::Add { diameter, filament_class, quality } } => {
      let variant = RawMaterialVariant::checked_catalog(diameter, filament_class, quality)?;
      print_json(&manager.add_raw_material(variant).await?)
    }
    Command::Catalog { command: CatalogCommand::List } => print_json(&manager.raw_materials().await?),
    Command::Recipe { id } => print_json(&manager.recipe_records(id).await?),
  }
}

fn read_spec(path: &Path) -> anyhow::Result<RawSpec> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read spec {path:?}"))?;
  serde_json::from_str(&text).with_context(|| format!("{path:?} is not a JSON object"))
}

fn read_overrides(path: Option<&Path>) -> anyhow::Result<Vec<RecipeOverride>> {
  let Some(path) = path else {
    return Ok(Vec::new());
  };
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read overrides {path:?}"))?;
  serde_json::from_str(&text).with_context(|| format!("failed to parse overrides {path:?}"))
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn catalog_add_parses_decimals() {
    let cli = Cli::parse_from(["galva", "catalog", "add", "2.40", "6.00", "1008"]);
    match cli.command {
      Command::Catalog { command: CatalogCommand::Add { diameter, filament_class, quality } } => {
        let v = RawMaterialVariant::checked_catalog(diameter, filament_class, quality).unwrap();
        assert_eq!(v.code, "YM.ST.0240.0600.1008");
      }
      _ => panic!("expected catalog add"),
    }
  }

  #[test]
  fn catalog_add_rejects_huge_diameter() {
    let cli = Cli::parse_from(["galva", "catalog", "add", "79228162514264337593543950335", "6.00", "1008"]);
    let Command::Catalog { command: CatalogCommand::Add { diameter, filament_class, quality } } =
      cli.command
    else {
      panic!("expected catalog add");
    };
    assert!(RawMaterialVariant::checked_catalog(diameter, filament_class, quality).is_err());
  }

  #[test]
  fn config_defaults_without_file() {
    let cfg: CliConfig = config::Config::builder()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.store_path, default_store_path());
    assert_eq!(cfg.engine, EngineConfig::default());
  }

  #[test]
  fn expand_tilde_leaves_relative_paths() {
    assert_eq!(expand_tilde(Path::new("data/galva.db")), PathBuf::from("data/galva.db"));
  }
}
