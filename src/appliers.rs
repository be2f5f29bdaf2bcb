use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::paths::{Paths, SessionType};
use crate::proc;
use crate::theme::Theme;

/// Replaces whatever sits at `link` with a symlink to `target`.
pub fn create_symlink_dir(target: &Path, link: &Path) -> Result<()> {
  if let Ok(metadata) = fs::symlink_metadata(link) {
    if metadata.is_dir() && !metadata.file_type().is_symlink() {
      fs::remove_dir_all(link)?;
    } else {
      fs::remove_file(link)?;
    }
  }
  if let Some(parent) = link.parent() {
    fs::create_dir_all(parent)?;
  }
  #[cfg(unix)]
  std::os::unix::fs::symlink(target, link)
    .with_context(|| format!("failed to link {} -> {}", link.display(), target.display()))?;
  Ok(())
}

fn remove_link(path: &Path) {
  if let Ok(metadata) = fs::symlink_metadata(path) {
    debug!("removing {}", path.display());
    let result = if metadata.is_dir() && !metadata.file_type().is_symlink() {
      fs::remove_dir_all(path)
    } else {
      fs::remove_file(path)
    };
    if let Err(err) = result {
      warn!("failed to remove {}: {err}", path.display());
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplierKind {
  Gtk,
  Icon,
  Cursor,
}

/// One system applier: GTK themes, icon themes and cursor themes share the
/// same symlink + config-file + live-session mechanics, parameterized by the
/// keys below plus a couple of kind-specific hooks.
pub struct SystemApplier {
  kind: ApplierKind,
  config_key: &'static str,
  gsettings_key: &'static str,
  xsettings_key: &'static str,
  symlink_dir: PathBuf,
  qt_configs: Vec<PathBuf>,
}

pub fn gtk_applier(paths: &Paths) -> SystemApplier {
  SystemApplier {
    kind: ApplierKind::Gtk,
    config_key: "gtk-theme-name",
    gsettings_key: "gtk-theme",
    xsettings_key: "Net/ThemeName",
    symlink_dir: paths.gtk_symlink_dir.clone(),
    qt_configs: Vec::new(),
  }
}

pub fn icon_applier(paths: &Paths) -> SystemApplier {
  SystemApplier {
    kind: ApplierKind::Icon,
    config_key: "gtk-icon-theme-name",
    gsettings_key: "icon-theme",
    xsettings_key: "Net/IconThemeName",
    symlink_dir: paths.icon_symlink_dir.clone(),
    qt_configs: vec![
      paths.config_home.join("qt5ct/qt5ct.conf"),
      paths.config_home.join("qt6ct/qt6ct.conf"),
    ],
  }
}

pub fn cursor_applier(paths: &Paths) -> SystemApplier {
  SystemApplier {
    kind: ApplierKind::Cursor,
    config_key: "gtk-cursor-theme-name",
    gsettings_key: "cursor-theme",
    xsettings_key: "Gtk/CursorThemeName",
    symlink_dir: paths.icon_symlink_dir.clone(),
    qt_configs: Vec::new(),
  }
}

impl SystemApplier {
  fn theme_folder(&self, theme: &Theme) -> PathBuf {
    match self.kind {
      ApplierKind::Gtk => theme.gtk_folder.clone(),
      ApplierKind::Icon => theme.icons_folder.clone(),
      ApplierKind::Cursor => theme.cursors_folder(),
    }
  }

  pub fn apply(&self, theme: &Theme, paths: &Paths, session: SessionType) -> Result<()> {
    self.cleanup(&theme.name, paths);

    let folder = self.theme_folder(theme);
    if !folder.exists() {
      debug!("theme has no {:?} assets at {}", self.kind, folder.display());
      return Ok(());
    }

    let link_name = format!("pawlette-{}", theme.name);
    let link = self.symlink_dir.join(&link_name);
    let target = folder.canonicalize().unwrap_or(folder.clone());
    create_symlink_dir(&target, &link)?;

    match self.kind {
      ApplierKind::Gtk => self.link_gtk4_styles(&folder, paths),
      ApplierKind::Cursor => self.setup_cursor_extras(theme, &link_name, paths),
      ApplierKind::Icon => {}
    }

    self.apply_theme_configs(&link_name, paths, session);
    Ok(())
  }

  /// Removes the applier's symlinks for a theme. Best-effort: failures are
  /// logged, never fatal.
  pub fn cleanup(&self, theme_name: &str, paths: &Paths) {
    remove_link(&self.symlink_dir.join(format!("pawlette-{theme_name}")));

    match self.kind {
      ApplierKind::Gtk => {
        let gtk4_dir = paths.config_home.join("gtk-4.0");
        for item in ["gtk.css", "gtk-dark.css", "assets"] {
          remove_link(&gtk4_dir.join(item));
        }
      }
      ApplierKind::Cursor => {
        remove_link(&paths.data_home.join(format!("icons/pawlette-{theme_name}")));
      }
      ApplierKind::Icon => {}
    }
  }

  fn apply_theme_configs(&self, theme_name: &str, paths: &Paths, session: SessionType) {
    for config in [&paths.gtk2_cfg, &paths.gtk3_cfg, &paths.gtk4_cfg] {
      if let Err(err) = update_gtk_config(config, self.config_key, theme_name) {
        warn!("failed to update {}: {err}", config.display());
      }
    }

    for config in &self.qt_configs {
      if let Err(err) = update_qt_config(config, theme_name) {
        warn!("failed to update {}: {err}", config.display());
      }
    }

    match session {
      SessionType::Wayland => self.apply_wayland(theme_name),
      SessionType::X11 => self.apply_x11(theme_name, paths),
      SessionType::Unknown => {}
    }
  }

  fn apply_wayland(&self, theme_name: &str) {
    if !proc::command_exists("gsettings") {
      warn!("gsettings not found");
      return;
    }
    if let Err(err) = proc::run_argv(
      "gsettings",
      &["set", "org.gnome.desktop.interface", self.gsettings_key, theme_name],
    ) {
      warn!("gsettings failed: {err}");
    }
  }

  fn apply_x11(&self, theme_name: &str, paths: &Paths) {
    if !proc::command_exists("xsettingsd") {
      warn!("xsettingsd not found");
      return;
    }
    let config = &paths.xsettingsd_config;
    if !config.is_file() {
      warn!("xsettingsd config not found: {}", config.display());
      return;
    }
    let line = format!("{} \"{theme_name}\"", self.xsettings_key);
    if let Err(err) = replace_or_append_line(config, &format!("{} ", self.xsettings_key), &line) {
      warn!("failed to update {}: {err}", config.display());
      return;
    }
    if let Err(err) = proc::run_argv("killall", &["-HUP", "xsettingsd"]) {
      warn!("failed to reload xsettingsd: {err}");
    }
  }

  /// GTK4 reads `~/.config/gtk-4.0` directly, so the theme's css and assets
  /// are mirrored there as individual symlinks.
  fn link_gtk4_styles(&self, theme_folder: &Path, paths: &Paths) {
    let gtk4_src = theme_folder.join("gtk-4.0");
    if !gtk4_src.is_dir() {
      return;
    }
    let gtk4_dst = paths.config_home.join("gtk-4.0");
    if let Err(err) = fs::create_dir_all(&gtk4_dst) {
      warn!("failed to create {}: {err}", gtk4_dst.display());
      return;
    }

    for css in ["gtk.css", "gtk-dark.css"] {
      let source = gtk4_src.join(css);
      if source.is_file() {
        if let Err(err) = create_symlink_dir(&source, &gtk4_dst.join(css)) {
          warn!("{err:#}");
        }
      }
    }
    let assets = gtk4_src.join("assets");
    if assets.is_dir() {
      if let Err(err) = create_symlink_dir(&assets, &gtk4_dst.join("assets")) {
        warn!("{err:#}");
      }
    }
  }

  fn setup_cursor_extras(&self, theme: &Theme, link_name: &str, paths: &Paths) {
    // Default cursor inheritance for toolkits that only read
    // ~/.icons/default.
    let default_dir = paths.icon_symlink_dir.join("default");
    if let Err(err) = fs::create_dir_all(&default_dir) {
      warn!("failed to create {}: {err}", default_dir.display());
    } else {
      let index = format!("[Icon Theme]\nName=Default\nInherits={link_name}\n");
      if let Err(err) = fs::write(default_dir.join("index.theme"), index) {
        warn!("failed to write index.theme: {err}");
      }
    }

    // Some X11 window managers only search the XDG data icon path.
    let cursors_src = theme.cursors_folder();
    let data_link = paths
      .data_home
      .join(format!("icons/{link_name}/cursors"));
    if let Err(err) = create_symlink_dir(&cursors_src, &data_link) {
      warn!("{err:#}");
    }

    let xresources = paths.home.join(".Xresources");
    if let Err(err) = replace_or_append_line(
      &xresources,
      "Xcursor.theme:",
      &format!("Xcursor.theme: {link_name}"),
    ) {
      warn!("failed to update {}: {err}", xresources.display());
    } else if proc::command_exists("xrdb") {
      if let Err(err) = proc::run_argv("xrdb", &["-merge", &xresources.to_string_lossy()]) {
        warn!("xrdb -merge failed: {err}");
      }
    }
  }
}

/// Replaces the `key=value` line in a GTK config, appending when absent.
/// Idempotent: an already-correct file is left untouched.
fn update_gtk_config(config: &Path, key: &str, value: &str) -> Result<()> {
  let Some(parent) = config.parent() else {
    return Ok(());
  };
  if !parent.exists() {
    debug!("config directory does not exist: {}", parent.display());
    return Ok(());
  }

  let content = if config.is_file() {
    fs::read_to_string(config)?
  } else {
    String::new()
  };

  let entry = format!("{key}={value}");
  if content.lines().any(|line| line.trim() == entry) {
    return Ok(());
  }

  let pattern = Regex::new(&format!("(?m)^{}=.*$", regex::escape(key)))?;
  let updated = if pattern.is_match(&content) {
    pattern.replace(&content, entry.as_str()).into_owned()
  } else {
    let mut updated = content;
    if !updated.is_empty() && !updated.ends_with('\n') {
      updated.push('\n');
    }
    updated.push_str(&entry);
    updated.push('\n');
    updated
  };
  fs::write(config, updated)?;
  Ok(())
}

/// Qt `*ct.conf` files keep the icon theme under an `[Appearance]` section;
/// the section is created when missing.
fn update_qt_config(config: &Path, value: &str) -> Result<()> {
  if !config.is_file() {
    debug!("qt config does not exist: {}", config.display());
    return Ok(());
  }

  let content = fs::read_to_string(config)?;
  let entry = format!("icon_theme={value}");
  if content.lines().any(|line| line.trim() == entry) {
    return Ok(());
  }

  let updated = if content.contains("[Appearance]") {
    let pattern = Regex::new(r"(?m)^icon_theme=.*$")?;
    if pattern.is_match(&content) {
      pattern.replace(&content, entry.as_str()).into_owned()
    } else {
      content.replacen("[Appearance]", &format!("[Appearance]\n{entry}"), 1)
    }
  } else {
    format!("{content}\n[Appearance]\n{entry}\n")
  };
  fs::write(config, updated)?;
  Ok(())
}

/// Replaces the first line starting with `prefix`, appending when no line
/// matches. Creates the file when absent.
fn replace_or_append_line(path: &Path, prefix: &str, line: &str) -> Result<()> {
  let content = if path.is_file() {
    fs::read_to_string(path)?
  } else {
    String::new()
  };

  if content.lines().any(|existing| existing.trim() == line) {
    return Ok(());
  }

  let mut replaced = false;
  let mut lines: Vec<String> = Vec::new();
  for existing in content.lines() {
    if !replaced && existing.trim_start().starts_with(prefix) {
      lines.push(line.to_string());
      replaced = true;
    } else {
      lines.push(existing.to_string());
    }
  }
  if !replaced {
    lines.push(line.to_string());
  }

  fs::write(path, lines.join("\n") + "\n")?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gtk_config_replace_or_append() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("settings.ini");
    fs::write(&config, "[Settings]\ngtk-theme-name=old\ngtk-font-name=Sans 10\n").unwrap();

    update_gtk_config(&config, "gtk-theme-name", "pawlette-nord").unwrap();
    let content = fs::read_to_string(&config).unwrap();
    assert!(content.contains("gtk-theme-name=pawlette-nord"));
    assert!(!content.contains("gtk-theme-name=old"));
    assert!(content.contains("gtk-font-name=Sans 10"));

    // Second run is a no-op.
    update_gtk_config(&config, "gtk-theme-name", "pawlette-nord").unwrap();
    assert_eq!(fs::read_to_string(&config).unwrap(), content);
  }

  #[test]
  fn gtk_config_appends_when_key_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("gtkrc");
    fs::write(&config, "gtk-font-name=Sans 10\n").unwrap();
    update_gtk_config(&config, "gtk-theme-name", "pawlette-nord").unwrap();
    let content = fs::read_to_string(&config).unwrap();
    assert!(content.ends_with("gtk-theme-name=pawlette-nord\n"));
  }

  #[test]
  fn qt_config_gains_appearance_section() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("qt5ct.conf");
    fs::write(&config, "[Fonts]\nfixed=Mono\n").unwrap();
    update_qt_config(&config, "pawlette-nord").unwrap();
    let content = fs::read_to_string(&config).unwrap();
    assert!(content.contains("[Appearance]\nicon_theme=pawlette-nord"));
  }

  #[test]
  fn qt_config_replaces_existing_key() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("qt6ct.conf");
    fs::write(&config, "[Appearance]\nicon_theme=old\nstyle=Fusion\n").unwrap();
    update_qt_config(&config, "pawlette-nord").unwrap();
    let content = fs::read_to_string(&config).unwrap();
    assert!(content.contains("icon_theme=pawlette-nord"));
    assert!(!content.contains("icon_theme=old"));
  }

  #[test]
  fn xresources_line_replacement() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".Xresources");
    fs::write(&path, "Xcursor.theme: old\nXcursor.size: 24\n").unwrap();
    replace_or_append_line(&path, "Xcursor.theme:", "Xcursor.theme: pawlette-nord").unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("Xcursor.theme: pawlette-nord"));
    assert!(content.contains("Xcursor.size: 24"));
    assert!(!content.contains("Xcursor.theme: old"));
  }
}
