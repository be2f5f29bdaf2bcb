use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::errors::PawletteError;
use crate::manifest::Manifest;
use crate::paths::Paths;

/// An installed theme and its on-disk layout. Every asset subtree is
/// self-contained under `path`.
#[derive(Debug, Clone)]
pub struct Theme {
  pub name: String,
  pub path: PathBuf,
  pub gtk_folder: PathBuf,
  pub icons_folder: PathBuf,
  pub wallpapers_folder: PathBuf,
  pub logo: PathBuf,
}

impl Theme {
  pub fn new(name: &str, path: PathBuf, paths: &Paths) -> Self {
    let logo = path.join("logo.png");
    Theme {
      name: name.to_string(),
      gtk_folder: path.join("gtk-theme"),
      icons_folder: path.join("icons"),
      wallpapers_folder: path.join("wallpapers"),
      logo: if logo.is_file() {
        logo
      } else {
        paths.default_theme_logo.clone()
      },
      path,
    }
  }

  pub fn configs_dir(&self) -> PathBuf {
    self.path.join("configs")
  }

  pub fn cursors_folder(&self) -> PathBuf {
    self.icons_folder.join("cursors")
  }

  /// Looks the theme up in the system folder first, then the user folder.
  pub fn locate(paths: &Paths, name: &str) -> Result<Theme> {
    for root in [&paths.sys_themes_dir, &paths.themes_dir] {
      let candidate = root.join(name);
      if candidate.is_dir() {
        return Ok(Theme::new(name, candidate, paths));
      }
    }
    Err(PawletteError::ThemeNotFound(name.to_string()).into())
  }
}

/// All themes found in the system and user folders. On a name collision the
/// system folder wins.
pub fn all_themes(paths: &Paths) -> Vec<Theme> {
  let mut themes: BTreeMap<String, Theme> = BTreeMap::new();

  for root in [&paths.themes_dir, &paths.sys_themes_dir] {
    let Ok(entries) = fs::read_dir(root) else {
      continue;
    };
    for entry in entries.flatten() {
      let path = entry.path();
      if !path.is_dir() {
        continue;
      }
      if let Some(name) = path.file_name().and_then(|n| n.to_str()).map(|n| n.to_string()) {
        themes.insert(name.clone(), Theme::new(&name, path, paths));
      }
    }
  }

  themes.into_values().collect()
}

/// JSON map for `get-themes-info`: per theme its asset paths plus the
/// manifest's provenance and version when the theme is installed.
pub fn themes_info_json(paths: &Paths, manifest: &Manifest) -> Result<String> {
  let mut info = serde_json::Map::new();
  for theme in all_themes(paths) {
    let record = manifest.get(&theme.name);
    info.insert(
      theme.name.clone(),
      json!({
        "path": theme.path,
        "logo": theme.logo,
        "wallpapers": theme.wallpapers_folder,
        "gtk-folder": theme.gtk_folder,
        "source": record.and_then(|r| r.source).map(|s| s.label()),
        "version": record.map(|r| r.version.clone()),
      }),
    );
  }
  Ok(serde_json::to_string(&serde_json::Value::Object(info))?)
}
