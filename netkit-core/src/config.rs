use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::Channel;

/// Highest channel number allowed anywhere in the 2.4 GHz band.
pub const MAX_SUPPORTED_CHANNEL: Channel = 14;

/// Upper bound on a single scan's deadline.
pub const MAX_SCAN_TIMEOUT_SECONDS: u64 = 3600;

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub logging: LoggingConfig,
  pub channel: ChannelConfig,
  pub flush: FlushConfig,
  /// Why parts of the file were replaced by defaults. Logged once a subscriber exists.
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_log_retention_days")]
  pub retention_days: u64,

  #[serde(default)]
  pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_log_retention_days(),
      dir: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
  #[serde(default = "default_sample_count")]
  pub sample_count: u32,

  #[serde(default = "default_delay_seconds")]
  pub delay_seconds: u64,

  #[serde(default)]
  pub forbidden: Vec<Channel>,

  #[serde(default = "default_highest_channel")]
  pub highest_channel: Channel,

  #[serde(default = "default_scan_program")]
  pub scan_program: String,

  #[serde(default = "default_scan_timeout_seconds")]
  pub scan_timeout_seconds: u64,
}

impl Default for ChannelConfig {
  fn default() -> Self {
    Self {
      sample_count: default_sample_count(),
      delay_seconds: default_delay_seconds(),
      forbidden: Vec::new(),
      highest_channel: default_highest_channel(),
      scan_program: default_scan_program(),
      scan_timeout_seconds: default_scan_timeout_seconds(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlushConfig {
  #[serde(default = "default_database")]
  pub database: PathBuf,

  #[serde(default = "default_flush_retention_days")]
  pub retention_days: u64,
}

impl Default for FlushConfig {
  fn default() -> Self {
    Self {
      database: default_database(),
      retention_days: default_flush_retention_days(),
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_log_retention_days() -> u64 {
  14
}

fn default_sample_count() -> u32 {
  4
}

fn default_delay_seconds() -> u64 {
  2
}

fn default_highest_channel() -> Channel {
  11
}

fn default_scan_program() -> String {
  "iw".to_string()
}

fn default_scan_timeout_seconds() -> u64 {
  30
}

fn default_database() -> PathBuf {
  PathBuf::from("/etc/pihole/pihole-FTL.db")
}

fn default_flush_retention_days() -> u64 {
  7
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub logging: Option<LoggingConfig>,

  #[serde(default)]
  pub channel: Option<ChannelConfig>,

  #[serde(default)]
  pub flush: Option<FlushConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(l) = self.logging {
      cfg.logging = l;
    }
    if let Some(c) = self.channel {
      cfg.channel = c;
    }
    if let Some(f) = self.flush {
      cfg.flush = f;
    }

    if let Some(reason) = validate_channel_config(&cfg.channel) {
      cfg.channel = ChannelConfig::default();
      cfg
        .warnings
        .push(format!("[channel] invalid ({reason}); using defaults"));
    }
    if let Some(reason) = validate_flush_config(&cfg.flush) {
      cfg.flush = FlushConfig::default();
      cfg
        .warnings
        .push(format!("[flush] invalid ({reason}); using defaults"));
    }

    cfg
  }
}

/// Loads `path` without writing anything back. A missing file yields defaults; an
/// unparseable file or invalid section yields defaults plus an entry in `warnings`.
pub fn load_or_default_readonly(path: &Path) -> anyhow::Result<Config> {
  if !path.exists() {
    return Ok(Config::default());
  }

  let raw = fs::read_to_string(path)
    .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
  Ok(parse_or_default(path, &raw))
}

fn parse_or_default(path: &Path, raw: &str) -> Config {
  match toml::from_str::<ConfigFile>(raw) {
    Ok(file) => file.normalize(),
    Err(e) => Config {
      warnings: vec![format!(
        "invalid config at {}; using defaults: {e}",
        path.display()
      )],
      ..Config::default()
    },
  }
}

pub fn validate_channel_config(cfg: &ChannelConfig) -> Option<String> {
  if cfg.sample_count == 0 {
    return Some("sample_count must be > 0".to_string());
  }
  if cfg.highest_channel == 0 || cfg.highest_channel > MAX_SUPPORTED_CHANNEL {
    return Some(format!(
      "highest_channel must be within 1..={MAX_SUPPORTED_CHANNEL}"
    ));
  }
  if cfg.scan_timeout_seconds == 0 || cfg.scan_timeout_seconds > MAX_SCAN_TIMEOUT_SECONDS {
    return Some(format!(
      "scan_timeout_seconds must be within 1..={MAX_SCAN_TIMEOUT_SECONDS}"
    ));
  }
  if cfg.scan_program.trim().is_empty() {
    return Some("scan_program must not be empty".to_string());
  }
  if let Some(c) = cfg
    .forbidden
    .iter()
    .find(|c| **c == 0 || **c > cfg.highest_channel)
  {
    return Some(format!(
      "forbidden channel {c} is outside 1..={}",
      cfg.highest_channel
    ));
  }

  None
}

pub fn validate_flush_config(cfg: &FlushConfig) -> Option<String> {
  if cfg.retention_days == 0 {
    return Some("retention_days must be > 0".to_string());
  }
  if cfg.database.as_os_str().is_empty() {
    return Some("database must not be empty".to_string());
  }

  None
}
