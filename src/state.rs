use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::errors::PawletteError;
use crate::merge_copy::{self, MergeCopy};
use crate::patch;
use crate::paths::Paths;
use crate::theme::Theme;

/// Volatile files that must never enter theme history: caches, logs,
/// lockfiles, browser/electron scratch data and system artifacts.
/// Materialized into the repository's local exclude file on every start and
/// mirrored by the in-process matcher below.
pub const IGNORED_PATTERNS: &[&str] = &[
  // cache directories
  "**/Cache/",
  "**/cache/",
  "**/Caches/",
  "**/caches/",
  "**/GPUCache/",
  "**/ShaderCache/",
  "**/DawnCache/",
  "**/DawnWebGPUCache/",
  "**/DawnGraphiteCache/",
  "**/CachedData/",
  "**/CachedExtensions/",
  "**/CachedImages/",
  "**/CachedResources/",
  "**/CachedProfilesData/",
  "**/GrShaderCache/",
  // log directories
  "**/logs/",
  "**/log/",
  "**/Logs/",
  "**/Log/",
  "**/logging/",
  "**/Logging/",
  // temporary data
  "**/tmp/",
  "**/temp/",
  "**/temporary/",
  "**/Tmp/",
  "**/Temp/",
  "**/Temporary/",
  // browser / electron storage
  "**/Local Storage/",
  "**/Session Storage/",
  "**/IndexedDB/",
  "**/databases/",
  "**/File System/",
  "**/Service Worker/",
  "**/blob_storage/",
  "**/WebStorage/",
  "**/Application Cache/",
  "**/Media Cache/",
  "**/Platform Notifications/",
  "**/shared_proto_db/",
  "**/optimization_guide_hint_cache_store/",
  "**/optimization_guide_prediction_model_downloads/",
  // application state
  "**/globalStorage/",
  "**/workspaceStorage/",
  "**/sessionStorage/",
  "**/localStorage/",
  "**/sessionData/",
  "**/userData/",
  // log files
  "*.log",
  "*.log.*",
  "*.logs",
  "*.out",
  "*.err",
  // databases
  "*.db",
  "*.db-*",
  "*.sqlite",
  "*.sqlite3",
  "*.sqlite-*",
  "*.leveldb",
  // temp files
  "*.tmp",
  "*.temp",
  "*.bak",
  "*.backup",
  "*.old",
  "*.orig",
  "*.swp",
  "*.swo",
  "*.~*",
  "*.save",
  "*.autosave",
  "*~",
  // locks and pids
  "*.lock",
  "*.pid",
  "*.lck",
  "*.lockfile",
  // cookies and sessions
  "*Cookies*",
  "*cookies*",
  "*cookie*",
  "*Cookie*",
  "*Session*",
  "*session*",
  "*History*",
  "*history*",
  "*TransportSecurity*",
  "*QuotaManager*",
  "*Favicons*",
  "*Thumbnails*",
  "*thumbnails*",
  "*Trash*",
  "*trash*",
  // system files
  ".DS_Store",
  ".DS_Store?",
  "._*",
  ".Spotlight-V100",
  ".Trashes",
  "ehthumbs.db",
  "Thumbs.db",
  // recently-used lists
  "*recently-used*",
  "*Recently-used*",
  "*.recently-used*",
  "*.Recently-used*",
];

const USER_COMMIT_PREFIX: &str = "[USER] Save user customizations";
const APPLY_COMMIT_PREFIX: &str = "Apply theme:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
  Applied,
  UpToDate,
}

/// Orchestrates the bare repository whose work-tree is the XDG config root.
/// One branch per theme; user edits are auto-committed before any switch.
pub struct StateEngine<'a> {
  paths: &'a Paths,
  config: &'a Config,
  repo: PathBuf,
}

impl<'a> StateEngine<'a> {
  pub fn new(paths: &'a Paths, config: &'a Config) -> Result<Self> {
    let engine = StateEngine {
      repo: paths.state_repo.clone(),
      paths,
      config,
    };
    engine.init_repo()?;
    Ok(engine)
  }

  fn init_repo(&self) -> Result<()> {
    fs::create_dir_all(&self.paths.app_state_dir)?;

    if !self.repo.join("HEAD").exists() {
      debug!("initializing state repository at {}", self.repo.display());
      fs::create_dir_all(&self.repo)?;
      self.git(&["init", "--bare"])?;
      self.git(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
      self.git(&["config", "core.bare", "false"])?;
      self.git(&["config", "core.worktree", &self.paths.config_home.to_string_lossy()])?;
      self.git(&["config", "user.name", "Pawlette"])?;
      self.git(&["config", "user.email", "pawlette@example.com"])?;
      self.git(&["commit", "--allow-empty", "-m", "Initial commit"])?;
    }

    // Rewritten every start so pattern updates propagate to existing repos.
    let exclude = self.repo.join("info/exclude");
    fs::create_dir_all(exclude.parent().unwrap_or(&self.repo))?;
    fs::write(&exclude, IGNORED_PATTERNS.join("\n") + "\n")?;
    Ok(())
  }

  fn git(&self, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
      .arg("-C")
      .arg(&self.repo)
      .args(args)
      .output()
      .context("failed to spawn git")?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      error!("git {} failed: {stderr}", args.join(" "));
      return Err(
        PawletteError::VcsFailure {
          command: args.join(" "),
          stderr,
        }
        .into(),
      );
    }
    Ok(())
  }

  fn git_output(&self, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
      .arg("-C")
      .arg(&self.repo)
      .args(args)
      .output()
      .context("failed to spawn git")?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      return Err(
        PawletteError::VcsFailure {
          command: args.join(" "),
          stderr,
        }
        .into(),
      );
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
  }

  fn git_check(&self, args: &[&str]) -> bool {
    Command::new("git")
      .arg("-C")
      .arg(&self.repo)
      .args(args)
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .status()
      .map(|status| status.success())
      .unwrap_or(false)
  }

  /// Pathspec-taking commands run from the work-tree root so relative
  /// pathspecs resolve against it rather than the bare repo directory.
  fn git_in_worktree(&self, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
      .arg("--git-dir")
      .arg(&self.repo)
      .args(args)
      .current_dir(&self.paths.config_home)
      .output()
      .context("failed to spawn git")?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      error!("git {} failed: {stderr}", args.join(" "));
      return Err(
        PawletteError::VcsFailure {
          command: args.join(" "),
          stderr,
        }
        .into(),
      );
    }
    Ok(())
  }

  pub fn branch_exists(&self, name: &str) -> bool {
    self.git_check(&["show-ref", "--verify", "--quiet", &format!("refs/heads/{name}")])
  }

  pub fn current_branch(&self) -> Result<String> {
    Ok(self.git_output(&["branch", "--show-current"])?.trim().to_string())
  }

  /// The active theme, `None` while on `main`.
  pub fn current_theme(&self) -> Option<String> {
    match self.current_branch() {
      Ok(branch) if branch != "main" && !branch.is_empty() => Some(branch),
      _ => None,
    }
  }

  pub fn has_uncommitted_changes(&self) -> bool {
    self
      .git_output(&["status", "--porcelain"])
      .map(|out| !out.trim().is_empty())
      .unwrap_or(false)
  }

  /// Paths (relative to the config root) with uncommitted changes.
  pub fn uncommitted_files(&self) -> Vec<String> {
    let Ok(output) = self.git_output(&["status", "--porcelain"]) else {
      return Vec::new();
    };
    output
      .lines()
      .filter(|line| line.len() > 3)
      .map(|line| line[3..].trim().to_string())
      .collect()
  }

  /// Stages and commits any pending work-tree edits under a `[USER]`
  /// subject so they survive the next branch switch.
  pub fn commit_user_changes(&self) -> Result<()> {
    if !self.has_uncommitted_changes() {
      return Ok(());
    }
    debug!("found uncommitted changes, committing them");
    self.git(&["add", "-A"])?;
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    self.git(&["commit", "-m", &format!("{USER_COMMIT_PREFIX} - {timestamp}")])?;
    Ok(())
  }

  fn checkout(&self, branch: &str) -> Result<()> {
    if let Err(err) = self.git(&["checkout", branch]) {
      // Untracked regenerated files can collide with tracked ones on the
      // target branch; tracked edits were already committed, so forcing is
      // safe.
      warn!("soft checkout of {branch} failed ({err}), retrying with force");
      self.git(&["checkout", "-f", branch])?;
    }
    Ok(())
  }

  /// Commits pending user edits, then switches to (or creates from `main`)
  /// the theme branch.
  pub fn switch_to_branch(&self, name: &str) -> Result<()> {
    self.commit_user_changes()?;
    if self.branch_exists(name) {
      debug!("switching to existing branch {name}");
      self.checkout(name)?;
    } else {
      debug!("creating branch {name} from main");
      if let Err(err) = self.git(&["checkout", "-b", name, "main"]) {
        warn!("soft branch creation failed ({err}), retrying with force");
        self.git(&["checkout", "-f", "-b", name, "main"])?;
      }
    }
    Ok(())
  }

  fn saved_version(&self, name: &str) -> String {
    fs::read_to_string(self.paths.version_file(name))
      .map(|content| content.trim().to_string())
      .unwrap_or_else(|_| "unknown".to_string())
  }

  fn save_version(&self, name: &str, version: &str) -> Result<()> {
    let file = self.paths.version_file(name);
    fs::create_dir_all(file.parent().unwrap_or(&self.paths.app_state_dir))?;
    fs::write(&file, version)?;
    debug!("saved theme version {name} = {version}");
    Ok(())
  }

  fn has_apply_commit(&self, name: &str) -> bool {
    let Ok(output) = self.git_output(&["log", "--format=%s", name]) else {
      return false;
    };
    output
      .lines()
      .any(|subject| subject.starts_with(&format!("{APPLY_COMMIT_PREFIX} {name}")))
  }

  /// Applies a theme end to end: branch switch with user-edit capture,
  /// version-upgrade backup, stale-marker cleanup, merge-copy overlay and
  /// the apply commit. Returns `UpToDate` when nothing had to change.
  pub fn apply_theme(&self, theme: &Theme, new_version: &str) -> Result<ApplyOutcome> {
    info!("applying theme {}", theme.name);
    self.switch_to_branch(&theme.name)?;

    let current_version = self.saved_version(&theme.name);
    let already_applied = self.has_apply_commit(&theme.name);

    if current_version == new_version && already_applied {
      info!("theme {} v{new_version} already applied, just switched branch", theme.name);
      self.run_reload_commands(theme);
      return Ok(ApplyOutcome::UpToDate);
    }

    if already_applied && current_version != new_version {
      self.create_backup_branch(&theme.name, &current_version)?;
    }

    info!("theme version {current_version} -> {new_version}, copying files");

    let targets = self.theme_target_files(theme);
    for target in &targets {
      if let Err(err) = patch::clean_stale_markers(target, self.config) {
        warn!("failed to clean markers from {}: {err}", target.display());
      }
    }

    MergeCopy::new(theme, self.config, &self.paths.config_home).apply_all()?;

    self.save_version(&theme.name, new_version)?;
    self.git(&["add", "-A"])?;
    self.git(&["commit", "--allow-empty", "-m", &format!("{APPLY_COMMIT_PREFIX} {} v{new_version}", theme.name)])?;

    let leftover = self.uncommitted_files();
    if !leftover.is_empty() {
      warn!("files still uncommitted after theme apply: {leftover:?}");
    }

    info!("theme {} applied successfully", theme.name);
    Ok(ApplyOutcome::Applied)
  }

  /// Preserves the outgoing version's history by renaming the branch, then
  /// recreates the theme branch fresh from `main`.
  fn create_backup_branch(&self, name: &str, old_version: &str) -> Result<()> {
    let timestamp = Local::now().format("%Y%m%d%H%M%S");
    let backup = format!("{name}-v{old_version}-backup-{timestamp}");
    info!("version upgrade detected, backing up {name} as {backup}");
    self.git(&["branch", "-m", name, &backup])?;
    if let Err(err) = self.git(&["checkout", "-b", name, "main"]) {
      warn!("soft branch recreation failed ({err}), retrying with force");
      self.git(&["checkout", "-f", "-b", name, "main"])?;
    }
    self.prune_backups(name);
    Ok(())
  }

  /// Keep-last-N policy over a theme's backup branches.
  fn prune_backups(&self, name: &str) {
    let Ok(output) = self.git_output(&["for-each-ref", "--format=%(refname:short)", "refs/heads/"])
    else {
      return;
    };
    let mut backups: Vec<&str> = output
      .lines()
      .filter(|branch| branch.starts_with(&format!("{name}-v")) && branch.contains("-backup-"))
      .collect();
    backups.sort();

    let max = self.config.max_backups as usize;
    if backups.len() <= max {
      return;
    }
    for stale in &backups[..backups.len() - max] {
      info!("pruning old backup branch {stale}");
      if let Err(err) = self.git(&["branch", "-D", stale]) {
        warn!("failed to prune {stale}: {err}");
      }
    }
  }

  /// Commits side effects the system appliers left in the work-tree.
  pub fn commit_system_changes(&self, name: &str) -> Result<()> {
    if !self.has_uncommitted_changes() {
      return Ok(());
    }
    self.git(&["add", "-A"])?;
    self.git(&["commit", "-m", &format!("Apply system themes for: {name}")])?;
    Ok(())
  }

  fn run_reload_commands(&self, theme: &Theme) {
    let configs_dir = theme.configs_dir();
    let Ok(entries) = fs::read_dir(&configs_dir) else {
      return;
    };
    for entry in entries.flatten() {
      if !entry.path().is_dir() {
        continue;
      }
      if let Some(app) = entry.file_name().to_str() {
        merge_copy::run_reload_command(app);
      }
    }
  }

  /// Target files this theme touches in the work-tree, existing ones only,
  /// filtered through the ignore set. Patch sources map to their stripped
  /// target names.
  pub fn theme_target_files(&self, theme: &Theme) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let configs_dir = theme.configs_dir();
    let Ok(apps) = fs::read_dir(&configs_dir) else {
      return files;
    };

    for app in apps.flatten() {
      let app_dir = app.path();
      if !app_dir.is_dir() {
        continue;
      }
      for entry in walkdir::WalkDir::new(&app_dir).into_iter().flatten() {
        if !entry.file_type().is_file() {
          continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&app_dir) else {
          continue;
        };
        let mut target = self.paths.config_home.join(app.file_name()).join(relative);
        if matches!(
          target.extension().and_then(|ext| ext.to_str()),
          Some("prepaw" | "postpaw" | "jsonpaw")
        ) {
          target = target.with_extension("");
        }

        let Ok(rel_to_root) = target.strip_prefix(&self.paths.config_home) else {
          continue;
        };
        if target.is_file() && !is_ignored(rel_to_root) {
          files.push(target);
        }
      }
    }
    files.sort();
    files.dedup();
    files
  }

  /// Returns to the base state on `main`, keeping user edits committed on
  /// the theme branch they belong to.
  pub fn restore_original(&self) -> Result<()> {
    info!("restoring original state");
    self.commit_user_changes()?;
    self.checkout("main")?;
    Ok(())
  }

  /// Restores the theme's own files to branch HEAD, discarding user edits
  /// to them. Files outside the theme's footprint are untouched.
  pub fn reset_to_clean(&self, theme: &Theme) -> Result<()> {
    info!("resetting {} to clean state", theme.name);
    // Switching would capture the very edits being discarded, so only
    // switch when another branch is checked out.
    if self.current_branch()? != theme.name {
      self.switch_to_branch(&theme.name)?;
    }

    for target in self.theme_target_files(theme) {
      let Ok(relative) = target.strip_prefix(&self.paths.config_home) else {
        continue;
      };
      let rel = relative.to_string_lossy();
      if self
        .git_in_worktree(&["restore", "--worktree", "--staged", "--source=HEAD", "--", &rel])
        .is_err()
      {
        if let Err(err) = self.git_in_worktree(&["checkout", "--", &rel]) {
          warn!("failed to restore {rel}: {err}");
        }
      }
    }
    Ok(())
  }

  /// Deletes a theme branch. Refuses while the branch is checked out.
  pub fn delete_theme_branch(&self, name: &str) -> Result<()> {
    if self.current_branch()? == name {
      return Err(anyhow!(
        "cannot delete branch {name} while it is checked out; run restore first"
      ));
    }
    if self.branch_exists(name) {
      self.git(&["branch", "-D", name])?;
    }
    Ok(())
  }

  /// Commit subjects for a theme branch, newest first.
  pub fn history(&self, name: &str, limit: usize) -> Result<Vec<String>> {
    let output = self.git_output(&[
      "log",
      "--oneline",
      &format!("--max-count={limit}"),
      name,
    ])?;
    Ok(output.lines().map(str::to_string).collect())
  }

  /// Re-applies a previously captured user commit onto the theme branch.
  pub fn restore_user_commit(&self, name: &str, commit: &str) -> Result<()> {
    self.switch_to_branch(name)?;
    self.git(&["cherry-pick", commit])?;
    info!("restored user changes from commit {commit}");
    Ok(())
  }

  /// Drops index entries that match the ignore set without touching the
  /// files on disk. Entries can predate pattern additions.
  pub fn cleanup_ignored_files(&self) -> Result<()> {
    let tracked = self.git_output(&["ls-files", "-z"])?;
    if tracked.is_empty() {
      return Ok(());
    }

    let mut child = Command::new("git")
      .arg("--git-dir")
      .arg(&self.repo)
      .args(["check-ignore", "--stdin", "-z", "--exclude-standard"])
      .current_dir(&self.paths.config_home)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::null())
      .spawn()
      .context("failed to spawn git check-ignore")?;
    child
      .stdin
      .take()
      .ok_or_else(|| anyhow!("no stdin for check-ignore"))?
      .write_all(tracked.as_bytes())?;
    let output = child.wait_with_output()?;

    let ignored: Vec<String> = String::from_utf8_lossy(&output.stdout)
      .split('\0')
      .filter(|path| !path.is_empty())
      .map(str::to_string)
      .collect();
    if ignored.is_empty() {
      return Ok(());
    }

    info!("untracking {} ignored files", ignored.len());
    for chunk in ignored.chunks(200) {
      let mut child = Command::new("git")
        .arg("--git-dir")
        .arg(&self.repo)
        .args([
          "rm",
          "--cached",
          "--ignore-unmatch",
          "--pathspec-from-file=-",
          "--pathspec-file-nul",
        ])
        .current_dir(&self.paths.config_home)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn git rm")?;
      child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("no stdin for git rm"))?
        .write_all(chunk.join("\0").as_bytes())?;
      let output = child.wait_with_output()?;
      if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!("git rm --cached failed: {stderr}");
        return Err(PawletteError::VcsFailure {
          command: "rm --cached".to_string(),
          stderr,
        }
        .into());
      }
    }

    self.git(&["commit", "-m", "chore: stop tracking ignored files"])?;
    Ok(())
  }
}

/// Gitignore-style match of one relative file path against the ignore set.
pub fn is_ignored(relative: &Path) -> bool {
  IGNORED_PATTERNS
    .iter()
    .any(|pattern| matches_pattern(relative, pattern))
}

/// Replicates the gitignore semantics the exclude file gets for free:
/// a trailing-slash pattern matches a directory component anywhere in the
/// path (and thereby every suffix below it); a slash-free pattern matches
/// any single component.
fn matches_pattern(path: &Path, pattern: &str) -> bool {
  let components: Vec<&str> = path
    .iter()
    .filter_map(|component| component.to_str())
    .collect();
  if components.is_empty() {
    return false;
  }

  if let Some(dir_pattern) = pattern.strip_suffix('/') {
    let core = dir_pattern.strip_prefix("**/").unwrap_or(dir_pattern);
    // Directory patterns apply to ancestors of the file, not the file
    // itself.
    return components[..components.len() - 1]
      .iter()
      .any(|component| glob_match(component, core));
  }

  components.iter().any(|component| glob_match(component, pattern))
}

fn glob_match(text: &str, pattern: &str) -> bool {
  fn inner(text: &[u8], pattern: &[u8]) -> bool {
    match pattern.first() {
      None => text.is_empty(),
      Some(b'*') => {
        inner(text, &pattern[1..]) || (!text.is_empty() && inner(&text[1..], pattern))
      }
      Some(b'?') => !text.is_empty() && inner(&text[1..], &pattern[1..]),
      Some(&ch) => text.first() == Some(&ch) && inner(&text[1..], &pattern[1..]),
    }
  }
  inner(text.as_bytes(), pattern.as_bytes())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn directory_patterns_match_component_anywhere() {
    assert!(is_ignored(Path::new("Code/Cache/index")));
    assert!(is_ignored(Path::new("deep/nested/GPUCache/data_0")));
    assert!(is_ignored(Path::new("app/logs/today.txt")));
    // The component must be a directory, not the file itself.
    assert!(!is_ignored(Path::new("app/Cache")));
  }

  #[test]
  fn extension_patterns_match_basenames() {
    assert!(is_ignored(Path::new("kitty/kitty.log")));
    assert!(is_ignored(Path::new("a/b/c/errors.log.1")));
    assert!(is_ignored(Path::new("app/data.sqlite3")));
    assert!(is_ignored(Path::new("vim/.swap.swp")));
    assert!(!is_ignored(Path::new("kitty/kitty.conf")));
  }

  #[test]
  fn substring_patterns_match_any_component() {
    assert!(is_ignored(Path::new("chromium/Default/Cookies")));
    assert!(is_ignored(Path::new("firefox/SessionStore.bak")));
    assert!(is_ignored(Path::new("gtk-3.0/bookmarks.recently-used.xbel")));
    assert!(!is_ignored(Path::new("hypr/hyprland.conf")));
  }

  #[test]
  fn glob_star_and_question() {
    assert!(glob_match("anything.log", "*.log"));
    assert!(glob_match("x", "?"));
    assert!(!glob_match("xy", "?"));
    assert!(glob_match("abc", "a*c"));
    assert!(!glob_match("abd", "a*c"));
    assert!(glob_match("", "*"));
  }
}
