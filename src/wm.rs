use tracing::{debug, info, warn};

use crate::proc;

fn reload_hyprland() -> bool {
  if !proc::process_running("Hyprland") {
    return false;
  }
  if !proc::command_exists("hyprctl") {
    warn!("hyprctl not found");
    return false;
  }
  match proc::run_argv("hyprctl", &["reload"]) {
    Ok(()) => {
      info!("Hyprland reloaded");
      true
    }
    Err(err) => {
      warn!("failed to reload Hyprland: {err}");
      false
    }
  }
}

fn reload_bspwm() -> bool {
  if !proc::process_running("bspwm") {
    return false;
  }
  match proc::run_argv("bspc", &["wm", "-r"]) {
    Ok(()) => {
      info!("bspwm reloaded");
      true
    }
    Err(err) => {
      warn!("failed to reload bspwm: {err}");
      false
    }
  }
}

/// Detects and reloads the running window manager so freshly applied
/// configs take effect without a re-login.
pub fn reload_current_wm() -> bool {
  if proc::process_running("Hyprland") {
    reload_hyprland()
  } else if proc::process_running("bspwm") {
    reload_bspwm()
  } else {
    debug!("no reloadable window manager detected");
    false
  }
}
