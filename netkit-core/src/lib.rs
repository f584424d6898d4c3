pub mod config;
pub mod logging;
pub mod paths;
pub mod runtime;
pub mod types;

use std::path::{Path, PathBuf};

/// Resolves the config path (explicit `--config` wins) and loads it without ever writing.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<(PathBuf, config::Config)> {
  let path = match explicit {
    Some(p) => p.to_path_buf(),
    None => paths::config_path(&paths::base_dir()?),
  };
  let cfg = config::load_or_default_readonly(&path)?;
  Ok((path, cfg))
}
