use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Runtime configuration, read from the TOML file named by `--config` and
/// overridden by `ZOLARIS_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite database file. `:memory:` opens a throwaway database.
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/zolaris/zolaris.db") }

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ZOLARIS"))
      .build()
      .context("failed to read config file")?;

    let mut settings: Settings = raw
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }
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
