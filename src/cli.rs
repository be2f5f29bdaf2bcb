use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pawlette", version, about = "Git-backed theme manager for Linux desktops")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Generate the default configuration file
  GenerateConfig,
  /// List all installed themes
  GetThemes,
  /// Print a JSON map of remotely available themes and their download URLs
  GetAvailableThemes,
  /// Print a JSON map of installed themes and their parameters
  GetThemesInfo,
  /// Install a theme by catalog name, direct URL or local archive path
  InstallTheme(InstallArgs),
  /// Update an installed theme to the latest catalog version
  UpdateTheme(ThemeArgs),
  /// Update all installed themes
  UpdateAllThemes,
  /// Apply the specified theme
  #[command(alias = "apply")]
  SetTheme(ThemeArgs),
  /// Restore the original look (base state)
  Restore,
  /// Reset a theme's files to their clean state, dropping user edits
  ResetTheme(ThemeArgs),
  /// Show the currently active theme
  CurrentTheme,
  /// Show the state repository status
  Status,
  /// Show commit history for the current or specified theme
  History(HistoryArgs),
  /// Show uncommitted user changes
  UserChanges(OptionalThemeArgs),
  /// Restore user changes from a specific commit
  RestoreCommit(RestoreCommitArgs),
  /// Uninstall a theme
  UninstallTheme(ThemeArgs),
  #[command(external_subcommand)]
  Unknown(Vec<String>),
}

#[derive(Parser, Debug)]
pub struct InstallArgs {
  /// Theme name from the catalog, a direct URL, or a local .tar.gz path
  pub identifier: String,
}

#[derive(Parser, Debug)]
pub struct ThemeArgs {
  pub theme: String,
}

#[derive(Parser, Debug)]
pub struct OptionalThemeArgs {
  pub theme: Option<String>,
}

#[derive(Parser, Debug)]
pub struct HistoryArgs {
  pub theme: Option<String>,
  #[arg(long, default_value_t = 10)]
  pub limit: usize,
}

#[derive(Parser, Debug)]
pub struct RestoreCommitArgs {
  pub commit: String,
  pub theme: Option<String>,
}
