use channel_selector::{effective_channel_config, parse_args, TOOL_NAME, USAGE};

const EXIT_USAGE: i32 = 1;
const EXIT_NO_ELIGIBLE_CHANNEL: i32 = 2;

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

  let Some(interface) = cli.interface.as_deref() else {
    println!("You must specify a network interface as first argument\n\n{USAGE}");
    std::process::exit(EXIT_USAGE);
  };

  let (config_path, cfg) = netkit_core::load_config(cli.config.as_deref())?;
  let log_guard = netkit_core::logging::init(TOOL_NAME, &cfg.logging)?;
  netkit_core::logging::report_config_warnings(&cfg.warnings);
  let channel_cfg = effective_channel_config(&cfg.channel, &cli)?;

  let run_id = netkit_core::types::new_run_id();
  let span = tracing::info_span!("run", %run_id, config = %config_path.display());
  let _enter = span.enter();

  let verdict = channel_selector::run(interface, &channel_cfg)?;

  match verdict.channel {
    Some(channel) => {
      println!("{channel}");
      Ok(())
    }
    None => {
      tracing::warn!(interface, "every channel is forbidden; nothing to select");
      eprintln!("no eligible channel: every supported channel is forbidden");
      // `exit` skips destructors; flush the file log first.
      drop(log_guard);
      std::process::exit(EXIT_NO_ELIGIBLE_CHANNEL);
    }
  }
}
