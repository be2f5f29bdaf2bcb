use std::path::PathBuf;
use thiserror::Error;

/// Domain errors that callers branch on. Everything else travels through
/// `anyhow` with context strings.
#[derive(Debug, Error)]
pub enum PawletteError {
  #[error("theme not found: {0}")]
  ThemeNotFound(String),

  #[error("invalid theme archive: {0}")]
  ArchiveInvalid(String),

  #[error("network request failed: {0}")]
  NetworkFailure(String),

  #[error("git {command} failed: {stderr}")]
  VcsFailure { command: String, stderr: String },

  #[error("permission denied: {0}")]
  PermissionDenied(PathBuf),
}
