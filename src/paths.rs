use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "pawlette";

/// Canonical application locations, resolved once at startup from the XDG
/// environment and treated as immutable afterwards.
#[derive(Debug, Clone)]
pub struct Paths {
  pub home: PathBuf,
  pub config_home: PathBuf,
  pub data_home: PathBuf,
  pub state_home: PathBuf,
  pub cache_home: PathBuf,

  pub app_config_dir: PathBuf,
  pub app_data_dir: PathBuf,
  pub app_state_dir: PathBuf,
  pub app_cache_dir: PathBuf,

  pub config_file: PathBuf,
  pub manifest_file: PathBuf,
  pub state_repo: PathBuf,
  pub themes_dir: PathBuf,
  pub sys_themes_dir: PathBuf,
  pub default_theme_logo: PathBuf,
  pub wallpapers_symlink: PathBuf,

  pub gtk_symlink_dir: PathBuf,
  pub icon_symlink_dir: PathBuf,
  pub xsettingsd_config: PathBuf,
  pub gtk2_cfg: PathBuf,
  pub gtk3_cfg: PathBuf,
  pub gtk4_cfg: PathBuf,
}

impl Paths {
  pub fn from_env() -> Result<Self> {
    let home = match env::var("HOME") {
      Ok(val) if !val.is_empty() => PathBuf::from(val),
      _ => dirs::home_dir().ok_or_else(|| anyhow!("HOME is not set"))?,
    };

    let config_home = xdg_dir("XDG_CONFIG_HOME", &home, ".config");
    let data_home = xdg_dir("XDG_DATA_HOME", &home, ".local/share");
    let state_home = xdg_dir("XDG_STATE_HOME", &home, ".local/state");
    let cache_home = xdg_dir("XDG_CACHE_HOME", &home, ".cache");

    let app_config_dir = config_home.join(APP_NAME);
    let app_data_dir = data_home.join(APP_NAME);
    let app_state_dir = state_home.join(APP_NAME);
    let app_cache_dir = cache_home.join(APP_NAME);

    Ok(Paths {
      config_file: app_config_dir.join(format!("{APP_NAME}.json")),
      manifest_file: app_state_dir.join("installed_themes.json"),
      state_repo: app_state_dir.join("config_state.git"),
      themes_dir: app_data_dir.join("themes"),
      sys_themes_dir: PathBuf::from(format!("/usr/share/{APP_NAME}")),
      default_theme_logo: app_data_dir.join("default-theme-logo.png"),
      wallpapers_symlink: app_data_dir.join("theme_wallpapers"),
      gtk_symlink_dir: home.join(".themes"),
      icon_symlink_dir: home.join(".icons"),
      xsettingsd_config: config_home.join("xsettingsd/xsettingsd.conf"),
      gtk2_cfg: config_home.join("gtk-2.0/gtkrc"),
      gtk3_cfg: config_home.join("gtk-3.0/settings.ini"),
      gtk4_cfg: config_home.join("gtk-4.0/settings.ini"),
      home,
      config_home,
      data_home,
      state_home,
      cache_home,
      app_config_dir,
      app_data_dir,
      app_state_dir,
      app_cache_dir,
    })
  }

  pub fn version_file(&self, theme_name: &str) -> PathBuf {
    self.app_state_dir.join(format!("{theme_name}.version"))
  }
}

fn xdg_dir(var: &str, home: &Path, fallback: &str) -> PathBuf {
  match env::var(var) {
    Ok(val) if !val.is_empty() => PathBuf::from(val),
    _ => home.join(fallback),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
  X11,
  Wayland,
  Unknown,
}

impl SessionType {
  pub fn detect() -> Self {
    match env::var("XDG_SESSION_TYPE")
      .unwrap_or_default()
      .to_lowercase()
      .as_str()
    {
      "x11" => SessionType::X11,
      "wayland" => SessionType::Wayland,
      _ => SessionType::Unknown,
    }
  }
}
