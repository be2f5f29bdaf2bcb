use anyhow::{anyhow, Result};
use std::fs;
use tracing::{info, warn};

use crate::appliers::{self, create_symlink_dir};
use crate::config::Config;
use crate::installer::Installer;
use crate::paths::{Paths, SessionType};
use crate::state::{ApplyOutcome, StateEngine};
use crate::theme::Theme;
use crate::wm;

/// End-to-end flows: wires the installer, the state engine, the merge-copy
/// engine and the system appliers together.
pub struct Manager<'a> {
  paths: &'a Paths,
  pub installer: Installer<'a>,
  pub state: StateEngine<'a>,
  session: SessionType,
}

impl<'a> Manager<'a> {
  pub fn new(paths: &'a Paths, config: &'a Config) -> Result<Self> {
    Ok(Manager {
      installer: Installer::new(paths)?,
      state: StateEngine::new(paths, config)?,
      session: SessionType::detect(),
      paths,
    })
  }

  /// Applies a theme: state-engine branch switch and overlay, then the
  /// GTK/icon/cursor appliers and wallpapers, a final commit for their side
  /// effects, and a window-manager reload.
  pub fn apply_theme(&mut self, name: &str) -> Result<()> {
    let theme = Theme::locate(self.paths, name)?;
    let new_version = self
      .installer
      .manifest
      .get(name)
      .map(|record| record.version.clone())
      .unwrap_or_else(|| "unknown".to_string());

    if self.state.apply_theme(&theme, &new_version)? == ApplyOutcome::UpToDate {
      return Ok(());
    }

    self.apply_system_themes(&theme);
    self.state.commit_system_changes(&theme.name)?;
    wm::reload_current_wm();
    Ok(())
  }

  fn apply_system_themes(&self, theme: &Theme) {
    for applier in [
      appliers::gtk_applier(self.paths),
      appliers::icon_applier(self.paths),
      appliers::cursor_applier(self.paths),
    ] {
      if let Err(err) = applier.apply(theme, self.paths, self.session) {
        warn!("system applier failed for {}: {err:#}", theme.name);
      }
    }

    if theme.wallpapers_folder.is_dir() {
      if let Err(err) = create_symlink_dir(&theme.wallpapers_folder, &self.paths.wallpapers_symlink)
      {
        warn!("failed to link wallpapers: {err:#}");
      }
    }
  }

  /// Returns to the base configuration on `main`.
  pub fn restore_original(&self) -> Result<()> {
    self.state.restore_original()
  }

  /// Discards user edits to the theme's own files.
  pub fn reset_theme(&self, name: &str) -> Result<()> {
    let theme = Theme::locate(self.paths, name)?;
    self.state.reset_to_clean(&theme)
  }

  /// Uninstalls a theme: refuses while its branch is checked out, then
  /// removes files, manifest entry, branch and applier symlinks.
  pub fn uninstall_theme(&mut self, name: &str) -> Result<()> {
    if self.state.current_theme().as_deref() == Some(name) {
      return Err(anyhow!(
        "theme {name} is currently active; run restore before uninstalling"
      ));
    }

    self.installer.uninstall_theme(name)?;
    self.state.delete_theme_branch(name)?;

    for applier in [
      appliers::gtk_applier(self.paths),
      appliers::icon_applier(self.paths),
      appliers::cursor_applier(self.paths),
    ] {
      applier.cleanup(name, self.paths);
    }
    if fs::symlink_metadata(&self.paths.wallpapers_symlink).is_ok() {
      let _ = fs::remove_file(&self.paths.wallpapers_symlink);
    }

    info!("theme {name} uninstalled");
    Ok(())
  }

  pub fn print_status(&self) {
    match self.state.current_theme() {
      Some(current) => {
        println!("Current theme: {current}");
        let files = self.state.uncommitted_files();
        if files.is_empty() {
          println!("No uncommitted changes");
        } else {
          println!("You have {} uncommitted changes", files.len());
          println!("Modified files:");
          for file in files.iter().take(5) {
            println!("  - {file}");
          }
          if files.len() > 5 {
            println!("  ... and {} more", files.len() - 5);
          }
        }
      }
      None => println!("No theme is currently active (base state)"),
    }
  }

  pub fn print_history(&self, theme_name: Option<&str>, limit: usize) -> Result<()> {
    let Some(name) = theme_name
      .map(str::to_string)
      .or_else(|| self.state.current_theme())
    else {
      println!("No theme specified and no current theme active");
      return Ok(());
    };

    println!("History for theme: {name}");
    let commits = self.state.history(&name, limit)?;
    if commits.is_empty() {
      println!("No commits found for this theme");
      return Ok(());
    }
    for line in commits {
      let marker = if line.contains("[USER]") { "user" } else { "apply" };
      println!("[{marker}] {line}");
    }
    Ok(())
  }

  pub fn print_user_changes(&self, theme_name: Option<&str>) -> Result<()> {
    let Some(name) = theme_name
      .map(str::to_string)
      .or_else(|| self.state.current_theme())
    else {
      println!("No theme specified and no current theme active");
      return Ok(());
    };

    if self.state.current_theme().as_deref() != Some(name.as_str()) {
      self.state.switch_to_branch(&name)?;
    }

    let files = self.state.uncommitted_files();
    println!("User changes for theme: {name}");
    if files.is_empty() {
      println!("No uncommitted changes found");
    } else {
      println!("Found {} modified files:", files.len());
      for file in &files {
        println!("  {file}");
      }
      println!("These changes will be saved automatically when you switch themes");
    }
    Ok(())
  }

  pub fn restore_commit(&mut self, commit: &str, theme_name: Option<&str>) -> Result<()> {
    let Some(name) = theme_name
      .map(str::to_string)
      .or_else(|| self.state.current_theme())
    else {
      println!("No theme specified and no current theme active");
      return Ok(());
    };
    self.state.restore_user_commit(&name, commit)?;
    println!("Successfully restored commit {commit} for theme {name}");
    Ok(())
  }
}
