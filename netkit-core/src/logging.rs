use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;
use crate::paths;
use crate::types::SECONDS_PER_DAY;

/// Installs the global subscriber for `tool`. Stdout is left alone; it carries tool output.
///
/// The returned guard flushes the file writer when dropped, so callers hold it until exit.
pub fn init(tool: &str, cfg: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
  match cfg.dir.as_deref() {
    Some(dir) => init_file_and_stderr(tool, dir, &cfg.level, cfg.retention_days).map(Some),
    None => init_stderr_only(&cfg.level).map(|()| None),
  }
}

/// Emits config problems collected before the subscriber existed.
pub fn report_config_warnings(warnings: &[String]) {
  for w in warnings {
    tracing::warn!(reason = %w, "config problem");
  }
}

pub fn init_stderr_only(level: &str) -> anyhow::Result<()> {
  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(std::io::stderr)
    .with_target(false);

  tracing_subscriber::registry()
    .with(env_filter(level))
    .with(stderr_layer)
    .try_init()
    .map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))
}

pub fn init_file_and_stderr(
  tool: &str,
  log_dir: &Path,
  level: &str,
  retention_days: u64,
) -> anyhow::Result<WorkerGuard> {
  fs::create_dir_all(log_dir)?;
  cleanup_old_logs(tool, log_dir, retention_days)?;

  let file_appender = tracing_appender::rolling::daily(log_dir, paths::log_file_name(tool));
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  let file_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(file_writer)
    .with_target(true);

  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(std::io::stderr)
    .with_target(false);

  tracing_subscriber::registry()
    .with(env_filter(level))
    .with(file_layer)
    .with(stderr_layer)
    .try_init()
    .map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))?;
  Ok(guard)
}

fn env_filter(level: &str) -> tracing_subscriber::EnvFilter {
  tracing_subscriber::EnvFilter::try_new(level)
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn cleanup_old_logs(tool: &str, log_dir: &Path, retention_days: u64) -> anyhow::Result<()> {
  if retention_days == 0 {
    return Ok(());
  }

  let cutoff = SystemTime::now()
    .checked_sub(Duration::from_secs(retention_days.saturating_mul(SECONDS_PER_DAY)))
    .unwrap_or(SystemTime::UNIX_EPOCH);

  let entries = match fs::read_dir(log_dir) {
    Ok(e) => e,
    Err(_) => return Ok(()),
  };

  for entry in entries.flatten() {
    let path: PathBuf = entry.path();
    if !is_tool_log_file(tool, &path) {
      continue;
    }

    let modified = match entry.metadata().and_then(|m| m.modified()) {
      Ok(t) => t,
      Err(_) => continue,
    };

    if modified < cutoff {
      let _ = fs::remove_file(&path);
    }
  }

  Ok(())
}

fn is_tool_log_file(tool: &str, path: &Path) -> bool {
  let name = match path.file_name().and_then(|n| n.to_str()) {
    Some(n) => n,
    None => return false,
  };

  let base = paths::log_file_name(tool);
  name == base || name.starts_with(&format!("{base}."))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_own_rolled_files_are_candidates() {
    assert!(is_tool_log_file("ftl-flush", Path::new("/var/log/ftl-flush.log")));
    assert!(is_tool_log_file(
      "ftl-flush",
      Path::new("/var/log/ftl-flush.log.2026-10-01")
    ));
    assert!(!is_tool_log_file(
      "ftl-flush",
      Path::new("/var/log/channel-selector.log")
    ));
    assert!(!is_tool_log_file("ftl-flush", Path::new("/var/log/ftl-flush.logx")));
  }

  #[test]
  fn dropping_guard_flushes_last_event_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let guard = init_file_and_stderr("flush-check", dir.path(), "info", 0).unwrap();

    tracing::info!("final verdict line");
    drop(guard);

    let written: String = fs::read_dir(dir.path())
      .unwrap()
      .flatten()
      .filter(|e| is_tool_log_file("flush-check", &e.path()))
      .map(|e| fs::read_to_string(e.path()).unwrap())
      .collect();
    assert!(written.contains("final verdict line"));
  }

  #[test]
  fn zero_retention_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("channel-selector.log");
    fs::write(&file, "x").unwrap();

    cleanup_old_logs("channel-selector", dir.path(), 0).unwrap();
    assert!(file.exists());
  }

  #[test]
  fn fresh_logs_survive_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("channel-selector.log.2026-10-18");
    fs::write(&file, "x").unwrap();

    cleanup_old_logs("channel-selector", dir.path(), 14).unwrap();
    assert!(file.exists());
  }
}
