use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "NETKIT_HOME";

pub fn base_dir() -> anyhow::Result<PathBuf> {
  let home = std::env::var(HOME_ENV).unwrap_or_else(|_| "/etc/netkit".into());
  if home.trim().is_empty() {
    return Err(anyhow::anyhow!("{HOME_ENV} is set but empty"));
  }
  Ok(PathBuf::from(home))
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn log_file_name(tool: &str) -> String {
  format!("{tool}.log")
}
