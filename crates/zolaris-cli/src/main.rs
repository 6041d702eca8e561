//! `zolaris`: operator CLI for the Zolaris entity hierarchy.
//!
//! Reads `zolaris.toml` (or the path given with `--config`), opens the SQLite
//! store, runs one subcommand and prints its result as JSON.
//!
//! ```
//! zolaris category add --name Members --type user
//! zolaris entity root --category <ID> --name "Acme HQ" --owner u1
//! zolaris entity list <ENTITY_ID> --level -1 --type device-group
//! zolaris device add --id aa:bb:cc:00:00:01 --name Boiler --user u1
//! ```

mod commands;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use commands::{Command, Engine};
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use zolaris_store_sqlite::SqliteStore;

#[derive(Parser, Debug)]
#[command(name = "zolaris", version, about = "Zolaris entity hierarchy")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "zolaris.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

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
  let settings = Settings::load(&cli.config)?;

  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;
  tracing::debug!(path = ?settings.store_path, "opened store");

  let shared = Arc::new(store.clone());
  let engine = Engine::new(Arc::clone(&shared), Arc::clone(&shared), shared);

  let output = commands::run(cli.command, &engine, &store).await?;
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}
