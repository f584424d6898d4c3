//! Deletes aged rows from the FTL query-log database.
//!
//! The `queries` table stores a unix-seconds `timestamp` per row. Anything strictly older
//! than the cutoff is removed in a single statement.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use netkit_core::config::{validate_flush_config, FlushConfig};
use netkit_core::types::{unix_secs, SECONDS_PER_DAY};
use rusqlite::{params, Connection, OpenFlags};

pub const TOOL_NAME: &str = "ftl-flush";

pub const USAGE: &str = "\
usage: ftl-flush [options]

Deletes query-log rows older than the retention window.

options:
  --db PATH        database file (default /etc/pihole/pihole-FTL.db)
  --days N         keep this many days of queries (default 7)
  --config PATH    config file (default $NETKIT_HOME/config.toml)
  --dry-run        count expired rows without deleting them
  --help           show this message
  --version        print version";

/// Unix seconds `retention_days` before `now`.
pub fn cutoff_timestamp(now: SystemTime, retention_days: u64) -> i64 {
  let window = Duration::from_secs(retention_days.saturating_mul(SECONDS_PER_DAY));
  let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);
  unix_secs(cutoff)
}

/// Deletes every query with `timestamp < cutoff`; returns the number of rows removed.
pub fn flush_queries(conn: &mut Connection, cutoff: i64) -> anyhow::Result<usize> {
  let tx = conn.transaction().context("begin flush transaction")?;
  let deleted = tx
    .execute("DELETE FROM queries WHERE timestamp < ?1", params![cutoff])
    .context("delete expired queries")?;
  tx.commit().context("commit flush")?;
  Ok(deleted)
}

/// Number of queries `flush_queries` would delete for the same cutoff.
pub fn count_expired(conn: &Connection, cutoff: i64) -> anyhow::Result<usize> {
  let n: i64 = conn
    .query_row(
      "SELECT COUNT(*) FROM queries WHERE timestamp < ?1",
      params![cutoff],
      |row| row.get(0),
    )
    .context("count expired queries")?;
  Ok(usize::try_from(n).unwrap_or(0))
}

/// Opens an existing database; never creates one.
pub fn open_database(path: &Path, read_only: bool) -> anyhow::Result<Connection> {
  if !path.exists() {
    return Err(anyhow::anyhow!("database not found: {}", path.display()));
  }
  let flags = if read_only {
    OpenFlags::SQLITE_OPEN_READ_ONLY
  } else {
    OpenFlags::SQLITE_OPEN_READ_WRITE
  };
  Connection::open_with_flags(path, flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)
    .with_context(|| format!("open database {}", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
  Deleted { rows: usize, cutoff: i64 },
  WouldDelete { rows: usize, cutoff: i64 },
}

impl std::fmt::Display for FlushOutcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Deleted { rows, cutoff } => write!(f, "deleted={rows} cutoff={cutoff}"),
      Self::WouldDelete { rows, cutoff } => write!(f, "would_delete={rows} cutoff={cutoff}"),
    }
  }
}

/// Flushes the configured database, or only counts when dry-run is active.
pub fn run(cfg: &FlushConfig, now: SystemTime) -> anyhow::Result<FlushOutcome> {
  let cutoff = cutoff_timestamp(now, cfg.retention_days);
  let dry_run = netkit_core::runtime::is_dry_run();
  let mut conn = open_database(&cfg.database, dry_run)?;

  if dry_run {
    let rows = count_expired(&conn, cutoff)?;
    tracing::warn!(
      rows,
      cutoff,
      db = %cfg.database.display(),
      "DRY-RUN: would delete expired queries"
    );
    return Ok(FlushOutcome::WouldDelete { rows, cutoff });
  }

  let rows = flush_queries(&mut conn, cutoff)?;
  tracing::info!(
    rows,
    cutoff,
    retention_days = cfg.retention_days,
    db = %cfg.database.display(),
    "expired queries deleted"
  );
  Ok(FlushOutcome::Deleted { rows, cutoff })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
  pub config: Option<PathBuf>,
  pub database: Option<PathBuf>,
  pub days: Option<u64>,
  pub dry_run: bool,
  pub help: bool,
  pub version: bool,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
  let mut out = CliArgs::default();
  let mut i = 0;
  while i < args.len() {
    let arg = args[i].as_str();
    match arg {
      "--help" | "-h" => out.help = true,
      "--version" => out.version = true,
      "--dry-run" => out.dry_run = true,
      "--config" | "--db" | "--days" => {
        let v = args
          .get(i + 1)
          .ok_or_else(|| anyhow::anyhow!("`{arg}` expects a value"))?;
        match arg {
          "--config" => out.config = Some(PathBuf::from(v)),
          "--db" => out.database = Some(PathBuf::from(v)),
          _ => {
            out.days = Some(
              v.parse()
                .with_context(|| format!("`--days` expects a number, got `{v}`"))?,
            )
          }
        }
        i += 2;
        continue;
      }
      _ => return Err(anyhow::anyhow!("unexpected argument `{arg}`")),
    }
    i += 1;
  }
  Ok(out)
}

pub fn effective_flush_config(base: &FlushConfig, cli: &CliArgs) -> anyhow::Result<FlushConfig> {
  let mut cfg = base.clone();
  if let Some(db) = &cli.database {
    cfg.database = db.clone();
  }
  if let Some(days) = cli.days {
    cfg.retention_days = days;
  }
  if let Some(reason) = validate_flush_config(&cfg) {
    return Err(anyhow::anyhow!("invalid flush settings: {reason}"));
  }
  Ok(cfg)
}
