mod provider;
mod select;
mod usage;

pub use provider::{IwScanner, ScanProvider};
pub use select::{
  majority, pick_best, select_channel, ForbiddenSet, SelectionPlan, Verdict, NO_ELIGIBLE_CHANNEL,
};
pub use usage::{capture_usage, ChannelUsage};

use anyhow::Context;
use netkit_core::config::{validate_channel_config, ChannelConfig};
use std::path::PathBuf;
use std::time::Duration;

pub const TOOL_NAME: &str = "channel-selector";

pub const USAGE: &str = "\
usage: channel-selector <interface> [options]

Scans <interface> several times and prints the least used 2.4 GHz channel.

options:
  --samples N      number of scans to take (default 4)
  --delay SECS     pause between scans (default 2)
  --forbid LIST    comma separated channels never to pick, e.g. 1,6
  --timeout SECS   deadline for a single scan (default 30)
  --config PATH    config file (default $NETKIT_HOME/config.toml)
  --help           show this message
  --version        print version";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
  pub interface: Option<String>,
  pub config: Option<PathBuf>,
  pub samples: Option<u32>,
  pub delay_seconds: Option<u64>,
  pub forbid: Option<String>,
  pub timeout_seconds: Option<u64>,
  pub help: bool,
  pub version: bool,
}

/// Parses everything after the program name. The first non-flag argument is the interface.
pub fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
  let mut out = CliArgs::default();
  let mut i = 0;
  while i < args.len() {
    let arg = args[i].as_str();
    match arg {
      "--help" | "-h" => out.help = true,
      "--version" => out.version = true,
      "--config" | "--samples" | "--delay" | "--forbid" | "--timeout" => {
        let v = args
          .get(i + 1)
          .ok_or_else(|| anyhow::anyhow!("`{arg}` expects a value"))?;
        match arg {
          "--config" => out.config = Some(PathBuf::from(v)),
          "--samples" => out.samples = Some(parse_number(arg, v)?),
          "--delay" => out.delay_seconds = Some(parse_number(arg, v)?),
          "--timeout" => out.timeout_seconds = Some(parse_number(arg, v)?),
          _ => out.forbid = Some(v.clone()),
        }
        i += 2;
        continue;
      }
      _ if arg.starts_with("--") => return Err(anyhow::anyhow!("unknown option `{arg}`")),
      _ => {
        if out.interface.is_none() {
          out.interface = Some(arg.to_string());
        } else {
          return Err(anyhow::anyhow!("unexpected argument `{arg}`"));
        }
      }
    }
    i += 1;
  }
  Ok(out)
}

fn parse_number<T: std::str::FromStr>(flag: &str, raw: &str) -> anyhow::Result<T>
where
  T::Err: std::error::Error + Send + Sync + 'static,
{
  raw
    .parse::<T>()
    .with_context(|| format!("`{flag}` expects a number, got `{raw}`"))
}

/// Layers command line overrides on top of the `[channel]` config section.
pub fn effective_channel_config(
  base: &ChannelConfig,
  cli: &CliArgs,
) -> anyhow::Result<ChannelConfig> {
  let mut cfg = base.clone();
  if let Some(n) = cli.samples {
    cfg.sample_count = n;
  }
  if let Some(d) = cli.delay_seconds {
    cfg.delay_seconds = d;
  }
  if let Some(t) = cli.timeout_seconds {
    cfg.scan_timeout_seconds = t;
  }
  if let Some(list) = cli.forbid.as_deref() {
    cfg.forbidden = ForbiddenSet::parse_list(list)?.iter().collect();
  }

  if let Some(reason) = validate_channel_config(&cfg) {
    return Err(anyhow::anyhow!("invalid channel settings: {reason}"));
  }
  Ok(cfg)
}

impl SelectionPlan {
  pub fn from_config(cfg: &ChannelConfig) -> Self {
    Self {
      sample_count: cfg.sample_count,
      delay: Duration::from_secs(cfg.delay_seconds),
      forbidden: cfg.forbidden.iter().copied().collect(),
      highest_channel: cfg.highest_channel,
    }
  }
}

/// Runs a full selection against the real scan tool, sleeping between samples.
pub fn run(interface: &str, cfg: &ChannelConfig) -> anyhow::Result<Verdict> {
  let plan = SelectionPlan::from_config(cfg);
  let mut scanner = IwScanner::new(
    cfg.scan_program.clone(),
    Duration::from_secs(cfg.scan_timeout_seconds),
  );

  tracing::info!(
    interface,
    samples = plan.sample_count,
    delay_secs = cfg.delay_seconds,
    forbidden = %plan.forbidden,
    "channel selection started"
  );

  let verdict = select_channel(&mut scanner, interface, &plan, std::thread::sleep)?;

  tracing::info!(
    interface,
    channel = verdict.channel_or_sentinel(),
    samples = ?verdict.samples,
    "channel selection finished"
  );
  Ok(verdict)
}
