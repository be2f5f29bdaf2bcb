use anyhow::Result;
use std::fs;
use tracing::warn;

pub mod appliers;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod errors;
pub mod installer;
pub mod logging;
pub mod manager;
pub mod manifest;
pub mod merge_copy;
pub mod patch;
pub mod paths;
pub mod proc;
pub mod progress;
pub mod state;
pub mod theme;
pub mod wm;

use cli::Command;
use config::Config;
use manager::Manager;
use paths::Paths;

pub fn run(cli: cli::Cli, paths: &Paths, config: &Config) -> Result<()> {
  for dir in [
    &paths.app_config_dir,
    &paths.app_data_dir,
    &paths.app_cache_dir,
    &paths.themes_dir,
  ] {
    fs::create_dir_all(dir)?;
  }

  match cli.command {
    Command::GenerateConfig => {
      config::generate_default_config(paths)?;
    }
    Command::GetThemes => {
      for theme in theme::all_themes(paths) {
        println!("{}", theme.name);
      }
    }
    Command::GetAvailableThemes => {
      println!("{}", serde_json::to_string(&catalog::available_themes_map())?);
    }
    Command::GetThemesInfo => {
      let manifest = manifest::Manifest::load(&paths.manifest_file)?;
      println!("{}", theme::themes_info_json(paths, &manifest)?);
    }
    Command::InstallTheme(args) => {
      let mut installer = installer::Installer::new(paths)?;
      installer.install_from(&args.identifier)?;
    }
    Command::UpdateTheme(args) => {
      let mut installer = installer::Installer::new(paths)?;
      installer.update_theme(&args.theme)?;
    }
    Command::UpdateAllThemes => {
      let mut installer = installer::Installer::new(paths)?;
      installer.update_all_themes()?;
    }
    Command::SetTheme(args) => {
      let mut manager = Manager::new(paths, config)?;
      manager.apply_theme(&args.theme)?;
    }
    Command::Restore => {
      let manager = Manager::new(paths, config)?;
      manager.restore_original()?;
    }
    Command::ResetTheme(args) => {
      let manager = Manager::new(paths, config)?;
      manager.reset_theme(&args.theme)?;
      println!("Theme '{}' has been reset to clean state", args.theme);
    }
    Command::CurrentTheme => {
      let manager = Manager::new(paths, config)?;
      match manager.state.current_theme() {
        Some(current) => println!("Current theme: {current}"),
        None => println!("No theme is currently active (base state)"),
      }
    }
    Command::Status => {
      let manager = Manager::new(paths, config)?;
      manager.print_status();
    }
    Command::History(args) => {
      let manager = Manager::new(paths, config)?;
      manager.print_history(args.theme.as_deref(), args.limit)?;
    }
    Command::UserChanges(args) => {
      let manager = Manager::new(paths, config)?;
      manager.print_user_changes(args.theme.as_deref())?;
    }
    Command::RestoreCommit(args) => {
      let mut manager = Manager::new(paths, config)?;
      manager.restore_commit(&args.commit, args.theme.as_deref())?;
    }
    Command::UninstallTheme(args) => {
      let mut manager = Manager::new(paths, config)?;
      manager.uninstall_theme(&args.theme)?;
    }
    Command::Unknown(args) => {
      let name = args.first().map(String::as_str).unwrap_or("");
      warn!("command \"{name}\" not found");
      eprintln!("pawlette: unknown command \"{name}\"");
    }
  }

  Ok(())
}
