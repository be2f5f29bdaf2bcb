use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::patch;
use crate::proc;
use crate::theme::Theme;

/// Reload command for one application, executed only when its declared
/// prerequisites hold.
pub struct ReloadCommand {
  pub command: &'static str,
  pub check_command_exists: Option<&'static str>,
  pub check_process: Option<&'static str>,
}

pub fn reload_command_for(app: &str) -> Option<&'static ReloadCommand> {
  RELOAD_COMMANDS
    .iter()
    .find(|(name, _)| *name == app)
    .map(|(_, command)| command)
}

static RELOAD_COMMANDS: &[(&str, ReloadCommand)] = &[
  (
    "hypr",
    ReloadCommand {
      command: "hyprctl reload",
      check_command_exists: Some("hyprctl"),
      check_process: None,
    },
  ),
  (
    "waybar",
    ReloadCommand {
      command: "killall -SIGUSR2 waybar",
      check_command_exists: None,
      check_process: Some("waybar"),
    },
  ),
  (
    "kitty",
    ReloadCommand {
      command: "killall -SIGUSR1 kitty",
      check_command_exists: None,
      check_process: Some("kitty"),
    },
  ),
  (
    "cava",
    ReloadCommand {
      command: "killall -USR1 cava",
      check_command_exists: None,
      check_process: Some("cava"),
    },
  ),
  (
    "dunst",
    ReloadCommand {
      command: "killall -HUP dunst",
      check_command_exists: None,
      check_process: Some("dunst"),
    },
  ),
  (
    "tmux",
    ReloadCommand {
      command: "tmux source ~/.config/tmux/tmux.conf",
      check_command_exists: None,
      check_process: Some("tmux"),
    },
  ),
];

pub fn run_reload_command(app: &str) {
  let Some(reload) = reload_command_for(app) else {
    return;
  };
  if let Some(cmd) = reload.check_command_exists {
    if !proc::command_exists(cmd) {
      debug!("command {cmd} not found, skipping reload for {app}");
      return;
    }
  }
  if let Some(process) = reload.check_process {
    if !proc::process_running(process) {
      debug!("process {process} not running, skipping reload for {app}");
      return;
    }
  }
  info!("reloading {app}: {}", reload.command);
  if let Err(err) = proc::run_command_line(reload.command) {
    warn!("failed to reload {app}: {err}");
  }
}

#[derive(Default)]
struct PatchSet {
  pre: Option<String>,
  post: Option<String>,
  merge: Option<serde_json::Value>,
}

/// Overlays a theme's `configs/` tree onto the XDG config root: plain files
/// are smart-copied, `.prepaw`/`.postpaw`/`.jsonpaw` files are collected
/// into per-target patch sets and applied after the traversal.
pub struct MergeCopy<'a> {
  theme: &'a Theme,
  config: &'a Config,
  config_home: &'a Path,
}

impl<'a> MergeCopy<'a> {
  pub fn new(theme: &'a Theme, config: &'a Config, config_home: &'a Path) -> Self {
    MergeCopy {
      theme,
      config,
      config_home,
    }
  }

  /// Applies every application subtree. A failure in one application is
  /// logged and does not stop the others; the matching reload command runs
  /// after each successful application.
  pub fn apply_all(&self) -> Result<()> {
    let configs_dir = self.theme.configs_dir();
    if !configs_dir.is_dir() {
      return Ok(());
    }

    for entry in fs::read_dir(&configs_dir)? {
      let entry = entry?;
      let src = entry.path();
      if !src.is_dir() {
        continue;
      }
      let Some(app_name) = src.file_name().and_then(|n| n.to_str()).map(String::from) else {
        continue;
      };
      let dst = self.config_home.join(&app_name);

      info!(
        "applying theme configs for {app_name}: {} -> {}",
        src.display(),
        dst.display()
      );
      if let Err(err) = self.apply_app(&src, &dst) {
        warn!("theme application error for {app_name}: {err:#}");
        continue;
      }
      run_reload_command(&app_name);
    }
    Ok(())
  }

  fn apply_app(&self, src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;

    let mut patches: BTreeMap<PathBuf, PatchSet> = BTreeMap::new();
    self.merge_tree(src, dst, &mut patches)?;

    for (target, set) in patches {
      if !target.is_file() {
        info!("no base file for patch, skipping {}", target.display());
        continue;
      }
      if let Some(overlay) = &set.merge {
        patch::merge_json_file(&target, overlay)?;
      }
      if set.pre.is_some() || set.post.is_some() {
        info!("patching {}", target.display());
        patch::apply_to_file(
          &self.theme.name,
          &target,
          self.config,
          set.pre.as_deref(),
          set.post.as_deref(),
        )?;
      }
    }
    Ok(())
  }

  fn merge_tree(
    &self,
    src: &Path,
    dst: &Path,
    patches: &mut BTreeMap<PathBuf, PatchSet>,
  ) -> Result<()> {
    for entry in fs::read_dir(src)? {
      let entry = entry?;
      let item = entry.path();
      let dest_path = dst.join(entry.file_name());

      if item.is_dir() {
        fs::create_dir_all(&dest_path)?;
        self.merge_tree(&item, &dest_path, patches)?;
        continue;
      }

      match item.extension().and_then(|ext| ext.to_str()) {
        Some("prepaw") => {
          let content = fs::read_to_string(&item)?;
          patches
            .entry(dest_path.with_extension(""))
            .or_default()
            .pre = Some(content);
        }
        Some("postpaw") => {
          let content = fs::read_to_string(&item)?;
          patches
            .entry(dest_path.with_extension(""))
            .or_default()
            .post = Some(content);
        }
        Some("jsonpaw") => {
          let content = fs::read_to_string(&item)?;
          let overlay: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON overlay {}", item.display()))?;
          if !overlay.is_object() {
            warn!("JSON overlay {} is not an object, skipping", item.display());
            continue;
          }
          patches
            .entry(dest_path.with_extension(""))
            .or_default()
            .merge = Some(overlay);
        }
        _ => self.smart_copy(&item, &dest_path)?,
      }
    }
    Ok(())
  }

  fn smart_copy(&self, src: &Path, dst: &Path) -> Result<()> {
    if !dst.exists() || files_differ(src, dst)? {
      fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} -> {}", src.display(), dst.display()))?;
      debug!("copied {}", dst.display());
    }
    Ok(())
  }
}

fn files_differ(a: &Path, b: &Path) -> Result<bool> {
  let meta_a = fs::metadata(a)?;
  let meta_b = fs::metadata(b)?;
  if meta_a.len() != meta_b.len() {
    return Ok(true);
  }
  match (meta_a.modified(), meta_b.modified()) {
    (Ok(mtime_a), Ok(mtime_b)) if mtime_a != mtime_b => return Ok(true),
    _ => {}
  }
  Ok(fs::read(a)? != fs::read(b)?)
}
