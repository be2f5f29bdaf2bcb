use anyhow::{anyhow, Result};
use std::process::Command;
use tracing::debug;

pub fn command_exists(cmd: &str) -> bool {
  which::which(cmd).is_ok()
}

pub fn process_running(name: &str) -> bool {
  if !command_exists("pgrep") {
    return false;
  }
  Command::new("pgrep")
    .args(["-x", name])
    .output()
    .map(|output| output.status.success())
    .unwrap_or(false)
}

/// Runs a command from an argument vector, capturing output. Child commands
/// are never routed through a shell.
pub fn run_argv(cmd: &str, args: &[&str]) -> Result<()> {
  debug!("running {cmd} {}", args.join(" "));
  let output = Command::new(cmd).args(args).output()?;
  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    return Err(anyhow!("{cmd} exited with {}: {}", output.status, stderr.trim()));
  }
  Ok(())
}

/// Runs a whitespace-separated command line as an argument vector. Used for
/// the reload-command registry where commands are declared as single strings.
pub fn run_command_line(line: &str) -> Result<()> {
  let mut parts = line.split_whitespace();
  let cmd = parts.next().ok_or_else(|| anyhow!("empty command"))?;
  let args: Vec<&str> = parts.collect();
  run_argv(cmd, &args)
}
