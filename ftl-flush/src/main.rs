use anyhow::Context;
use ftl_flush::{effective_flush_config, parse_args, TOOL_NAME, USAGE};
use std::time::SystemTime;

fn main() -> anyhow::Result<()> {
  let args: Vec<String> = std::env::args().skip(1).collect();
  let cli = parse_args(&args)?;

  if cli.version {
    println!("{}", env!("CARGO_PKG_VERSION"));
    return Ok(());
  }
  if cli.help {
    println!("{USAGE}");
    return Ok(());
  }

  netkit_core::runtime::set_dry_run(cli.dry_run);

  let (config_path, cfg) = netkit_core::load_config(cli.config.as_deref())?;
  let _log_guard = netkit_core::logging::init(TOOL_NAME, &cfg.logging)?;
  netkit_core::logging::report_config_warnings(&cfg.warnings);
  let flush_cfg = effective_flush_config(&cfg.flush, &cli)?;

  let run_id = netkit_core::types::new_run_id();
  let span = tracing::info_span!("run", %run_id, config = %config_path.display());
  let _enter = span.enter();

  let outcome = ftl_flush::run(&flush_cfg, SystemTime::now())
    .with_context(|| format!("flush {}", flush_cfg.database.display()))?;
  println!("{outcome}");
  Ok(())
}
