use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Source of raw scan reports for an interface.
pub trait ScanProvider {
  fn scan(&mut self, interface: &str) -> anyhow::Result<String>;
}

/// Runs `<program> dev <interface> scan` and returns its stdout.
///
/// `iw dev <iface> scan` needs `CAP_NET_ADMIN`, so in practice this runs as root.
#[derive(Debug, Clone)]
pub struct IwScanner {
  program: String,
  timeout: Duration,
}

impl IwScanner {
  pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
    Self {
      program: program.into(),
      timeout,
    }
  }

  fn args(interface: &str) -> [&str; 3] {
    ["dev", interface, "scan"]
  }
}

impl ScanProvider for IwScanner {
  fn scan(&mut self, interface: &str) -> anyhow::Result<String> {
    let args = Self::args(interface);
    let cmdline = format!("{} {}", self.program, args.join(" "));

    let mut child = Command::new(&self.program)
      .args(args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .with_context(|| format!("failed to run `{cmdline}`"))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_with_deadline(&mut child, self.timeout)
      .with_context(|| format!("`{cmdline}` did not finish"))?;

    let stdout = join_drain(stdout);
    let stderr = join_drain(stderr);

    if !status.success() {
      return Err(anyhow::anyhow!(
        "`{cmdline}` exited with {status}: {}",
        stderr.trim()
      ));
    }

    tracing::debug!(interface, bytes = stdout.len(), "scan report captured");
    Ok(stdout)
  }
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> anyhow::Result<ExitStatus> {
  let Some(deadline) = Instant::now().checked_add(timeout) else {
    let _ = child.kill();
    let _ = child.wait();
    return Err(anyhow::anyhow!(
      "timeout of {}s is too large",
      timeout.as_secs()
    ));
  };
  loop {
    if let Some(status) = child.try_wait()? {
      return Ok(status);
    }
    if Instant::now() >= deadline {
      let _ = child.kill();
      let _ = child.wait();
      return Err(anyhow::anyhow!("timed out after {}s", timeout.as_secs_f64()));
    }
    thread::sleep(POLL_INTERVAL);
  }
}

// Pipes are read on their own threads so a chatty child can't block on a full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<String>> {
  pipe.map(|mut p| {
    thread::spawn(move || {
      let mut buf = Vec::new();
      let _ = p.read_to_end(&mut buf);
      String::from_utf8_lossy(&buf).into_owned()
    })
  })
}

fn join_drain(handle: Option<thread::JoinHandle<String>>) -> String {
  handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
