use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use regex::Regex;
use std::cmp::Ordering;
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::catalog;
use crate::errors::PawletteError;
use crate::manifest::{InstalledTheme, Manifest, ThemeSource};
use crate::paths::Paths;
use crate::progress;

/// Downloads, extracts and registers theme archives, and keeps the
/// installed-themes manifest in sync.
pub struct Installer<'a> {
  paths: &'a Paths,
  pub manifest: Manifest,
}

impl<'a> Installer<'a> {
  pub fn new(paths: &'a Paths) -> Result<Self> {
    Ok(Installer {
      paths,
      manifest: Manifest::load(&paths.manifest_file)?,
    })
  }

  /// Installs from a remote catalog name, a direct URL, or a local archive
  /// path. Community themes prompt for confirmation before anything is
  /// downloaded.
  pub fn install_from(&mut self, identifier: &str) -> Result<()> {
    if identifier.starts_with("http://") || identifier.starts_with("https://") {
      let (name, version) = name_and_version_from_url(identifier)?;
      return self.install_archive_url(&name, &version, identifier, Some(ThemeSource::Local));
    }

    let local_path = Path::new(identifier);
    if local_path.is_file() {
      return self.install_local_archive(local_path);
    }

    let themes = catalog::fetch_remote_themes();
    if themes.is_empty() {
      return Err(PawletteError::NetworkFailure("failed to fetch themes list".to_string()).into());
    }
    let remote = themes
      .get(identifier)
      .ok_or_else(|| PawletteError::ThemeNotFound(identifier.to_string()))?;

    if remote.source == ThemeSource::Community && !community_warning(&remote.name, &remote.url, "installation") {
      println!("Installation cancelled.");
      return Ok(());
    }

    let version = version_from_url(&remote.url);
    self.install_archive_url(&remote.name, &version, &remote.url, Some(remote.source))
  }

  fn install_local_archive(&mut self, archive: &Path) -> Result<()> {
    let filename = archive
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| PawletteError::ArchiveInvalid(archive.display().to_string()))?;
    let (name, version) = parse_archive_filename(filename)
      .ok_or_else(|| PawletteError::ArchiveInvalid(format!("unrecognized archive name {filename}")))?;

    println!("Installing theme '{name}' from {}...", archive.display());
    let target_dir = self.paths.themes_dir.join(&name);
    extract_archive(archive, &target_dir)?;
    sanitize_permissions(&target_dir)?;

    self.record_install(&name, &version, &archive.display().to_string(), Some(ThemeSource::Local))?;
    println!("\nTheme '{name}' (v{version}) successfully installed to {}", target_dir.display());
    Ok(())
  }

  fn install_archive_url(
    &mut self,
    name: &str,
    version: &str,
    url: &str,
    source: Option<ThemeSource>,
  ) -> Result<()> {
    println!("Installing theme '{name}' from {url}...");

    let archive = download_to_temp(url, name)?;
    let target_dir = self.paths.themes_dir.join(name);
    extract_archive(archive.path(), &target_dir)?;
    sanitize_permissions(&target_dir)?;

    self.record_install(name, version, url, source)?;
    println!("\nTheme '{name}' (v{version}) successfully installed to {}", target_dir.display());
    Ok(())
  }

  fn record_install(
    &mut self,
    name: &str,
    version: &str,
    source_url: &str,
    source: Option<ThemeSource>,
  ) -> Result<()> {
    self.manifest.put(
      name,
      InstalledTheme {
        version: version.to_string(),
        source_url: source_url.to_string(),
        installed_path: self.paths.themes_dir.join(name),
        source,
      },
    );
    self.manifest.save()
  }

  /// Updates one installed theme when the catalog carries a newer version.
  pub fn update_theme(&mut self, name: &str) -> Result<()> {
    let Some(installed) = self.manifest.get(name).cloned() else {
      println!("Theme '{name}' is not installed.");
      return Ok(());
    };

    let themes = catalog::fetch_remote_themes();
    let Some(remote) = themes.get(name) else {
      println!("Theme '{name}' not found in available themes.");
      return Ok(());
    };

    let new_version = version_from_url(&remote.url);
    if compare_versions(&new_version, &installed.version) != Ordering::Greater {
      println!("Theme '{name}' is already up to date (v{}).", installed.version);
      return Ok(());
    }

    if remote.source == ThemeSource::Community && !community_warning(name, &remote.url, "update") {
      println!("Update cancelled.");
      return Ok(());
    }

    println!("Updating theme '{name}' from v{} to v{new_version}...", installed.version);
    self.install_archive_url(name, &new_version, &remote.url, Some(remote.source))
  }

  /// Updates every outdated installed theme after a single aggregated
  /// confirmation, with a dedicated banner when community themes are in the
  /// set.
  pub fn update_all_themes(&mut self) -> Result<()> {
    if self.manifest.is_empty() {
      println!("No themes installed to update.");
      return Ok(());
    }

    println!("Checking for theme updates...");
    let themes = catalog::fetch_remote_themes();
    if themes.is_empty() {
      println!("Failed to fetch themes list.");
      return Ok(());
    }

    let mut outdated: Vec<(String, catalog::RemoteTheme, String, String)> = Vec::new();
    let mut community: Vec<String> = Vec::new();
    for (name, installed) in self.manifest.iter() {
      let Some(remote) = themes.get(name) else {
        continue;
      };
      let new_version = version_from_url(&remote.url);
      if compare_versions(&new_version, &installed.version) != Ordering::Greater {
        continue;
      }
      if remote.source == ThemeSource::Community {
        community.push(name.clone());
      }
      outdated.push((name.clone(), remote.clone(), installed.version.clone(), new_version));
    }

    if outdated.is_empty() {
      println!("All themes are already up to date.");
      return Ok(());
    }

    if !community.is_empty() {
      community.sort();
      let mut lines = vec!["The update includes community themes:".to_string(), String::new()];
      lines.extend(community.iter().map(|name| format!("  - {name}")));
      lines.extend([
        String::new(),
        "These themes are not reviewed by Pawlette maintainers.".to_string(),
        "Please check their source repositories before updating.".to_string(),
        "Update at your own risk.".to_string(),
      ]);
      progress::print_warning_box("⚠️  COMMUNITY THEMES", &lines);
    }

    println!("The following themes will be updated:\n");
    for (name, remote, current, new) in &outdated {
      let (icon, label) = match remote.source {
        ThemeSource::Community => ("🌍", "community"),
        _ => ("📦", "official"),
      };
      println!("  {icon} [{label}] {name}: v{current} -> v{new}");
    }
    println!();

    if !progress::confirm("Do you want to proceed with updating these themes? [y/N]: ") {
      println!("Update cancelled.");
      return Ok(());
    }

    for (name, remote, current, new) in outdated {
      println!("Updating theme '{name}' from v{current} to v{new}...");
      self.install_archive_url(&name, &new, &remote.url, Some(remote.source))?;
    }
    Ok(())
  }

  /// Removes the theme directory, its manifest entry and its version side
  /// channel. Already-absent pieces are skipped, so repeating is harmless.
  pub fn uninstall_theme(&mut self, name: &str) -> Result<()> {
    let theme_dir = self.paths.themes_dir.join(name);
    if theme_dir.is_dir() {
      fs::remove_dir_all(&theme_dir)
        .with_context(|| format!("failed to remove {}", theme_dir.display()))?;
      info!("removed theme directory {}", theme_dir.display());
    }

    if self.manifest.remove(name).is_some() {
      self.manifest.save()?;
    }

    let version_file = self.paths.version_file(name);
    if version_file.is_file() {
      let _ = fs::remove_file(&version_file);
    }
    Ok(())
  }
}

fn community_warning(theme_name: &str, url: &str, action: &str) -> bool {
  let lines = vec![
    format!("Theme: {theme_name}"),
    format!("Source: {url}"),
    String::new(),
    "This theme is not reviewed by Pawlette maintainers.".to_string(),
    "Please check the source repository before proceeding.".to_string(),
    "Use at your own risk.".to_string(),
  ];
  progress::print_warning_box("⚠️  COMMUNITY THEME", &lines);
  progress::confirm(&format!("Continue {action}? [y/N]: "))
}

/// Parses `<name>-v<A.B.C>.tar.gz` and then `<name>-<A.B.C>.tar.gz`.
pub fn parse_archive_filename(filename: &str) -> Option<(String, String)> {
  let with_v = Regex::new(r"^(.+)-v(\d+(?:\.\d+)*)\.tar\.gz$").ok()?;
  if let Some(caps) = with_v.captures(filename) {
    return Some((caps[1].to_string(), caps[2].to_string()));
  }
  let without_v = Regex::new(r"^(.+)-(\d+(?:\.\d+)*)\.tar\.gz$").ok()?;
  if let Some(caps) = without_v.captures(filename) {
    return Some((caps[1].to_string(), caps[2].to_string()));
  }
  None
}

/// Version component of an archive URL's filename, defaulting to `1.0` when
/// nothing version-shaped is present.
pub fn version_from_url(url: &str) -> String {
  let filename = url.rsplit('/').next().unwrap_or(url);
  if let Some((_, version)) = parse_archive_filename(filename) {
    return version;
  }
  let bare = Regex::new(r"v?(\d+(?:\.\d+)*)\.tar\.gz$").expect("version regex");
  if let Some(caps) = bare.captures(filename) {
    return caps[1].to_string();
  }
  "1.0".to_string()
}

/// Name and version for a direct archive URL. The filename patterns are
/// tried first; GitHub `/archive/` URLs fall back to the repository path
/// segment for the name.
pub fn name_and_version_from_url(url: &str) -> Result<(String, String)> {
  let filename = url.rsplit('/').next().unwrap_or(url);
  if let Some(parsed) = parse_archive_filename(filename) {
    return Ok(parsed);
  }

  if url.contains("github.com") && url.contains("/archive/") {
    let after_host = url.split("github.com/").nth(1).unwrap_or("");
    let mut segments = after_host.split('/');
    let _owner = segments.next();
    if let Some(repo) = segments.next().filter(|repo| !repo.is_empty()) {
      return Ok((repo.to_string(), version_from_url(url)));
    }
  }

  Err(
    PawletteError::ArchiveInvalid(format!("cannot determine theme name from URL {url}")).into(),
  )
}

/// Segment-wise numeric version comparison (`1.10.0` > `1.9.9`); missing
/// segments compare as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
  let parse = |version: &str| -> Vec<u64> {
    version
      .trim_start_matches('v')
      .split('.')
      .map(|segment| segment.parse::<u64>().unwrap_or(0))
      .collect()
  };
  let (a, b) = (parse(a), parse(b));
  let len = a.len().max(b.len());
  for i in 0..len {
    let (x, y) = (a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0));
    match x.cmp(&y) {
      Ordering::Equal => continue,
      other => return other,
    }
  }
  Ordering::Equal
}

fn download_to_temp(url: &str, name: &str) -> Result<tempfile::NamedTempFile> {
  let total = ureq::head(url)
    .call()
    .ok()
    .and_then(|response| response.header("content-length").map(str::to_string))
    .and_then(|len| len.parse::<u64>().ok())
    .unwrap_or(0);

  let response = ureq::get(url)
    .call()
    .map_err(|err| PawletteError::NetworkFailure(format!("GET {url}: {err}")))?;

  let mut tmp = tempfile::Builder::new()
    .prefix("pawlette-")
    .suffix(".tar.gz")
    .tempfile()?;

  // Readable past the current umask so later copy and git operations
  // never trip over the download.
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))?;
  }

  let bar = progress::download_bar(total, name);
  let mut reader = response.into_reader();
  let mut buffer = [0u8; 8192];
  loop {
    let read = reader.read(&mut buffer)?;
    if read == 0 {
      break;
    }
    tmp.write_all(&buffer[..read])?;
    bar.inc(read as u64);
  }
  bar.finish_and_clear();
  tmp.flush()?;
  Ok(tmp)
}

/// Extracts a gzip tar into `target_dir`: the longest common path prefix is
/// stripped when every member shares it, members that would escape the
/// target abort the install before any existing files are touched, and the
/// previous theme directory is replaced wholesale.
pub fn extract_archive(archive: &Path, target_dir: &Path) -> Result<()> {
  let entries = list_entries(archive)?;
  if entries.is_empty() {
    return Err(PawletteError::ArchiveInvalid(format!("{} is empty", archive.display())).into());
  }

  let prefix = common_prefix(&entries);
  let mut destinations = 0u64;
  for entry in &entries {
    let Some(stripped) = strip_prefix(entry, &prefix) else {
      continue;
    };
    if !is_safe_relative(&stripped) {
      return Err(
        PawletteError::ArchiveInvalid(format!(
          "member {} escapes the theme directory",
          entry.display()
        ))
        .into(),
      );
    }
    destinations += 1;
  }

  if target_dir.exists() {
    info!("removing old theme directory {}", target_dir.display());
    fs::remove_dir_all(target_dir)
      .with_context(|| format!("failed to remove {}", target_dir.display()))?;
  }
  fs::create_dir_all(target_dir)?;
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(target_dir, fs::Permissions::from_mode(0o755))?;
  }

  println!("Extracting into {}...", target_dir.display());
  let bar = progress::extract_bar(destinations);
  let file = fs::File::open(archive)
    .with_context(|| format!("failed to open {}", archive.display()))?;
  let mut tar = tar::Archive::new(GzDecoder::new(file));
  for entry in tar.entries().map_err(archive_invalid(archive))? {
    let mut entry = entry.map_err(archive_invalid(archive))?;
    let path = entry.path().map_err(archive_invalid(archive))?.into_owned();
    let Some(stripped) = strip_prefix(&path, &prefix) else {
      continue;
    };
    entry
      .unpack(target_dir.join(&stripped))
      .with_context(|| format!("failed to extract {}", stripped.display()))?;
    bar.inc(1);
  }
  bar.finish_and_clear();
  debug!("extracted {destinations} entries into {}", target_dir.display());
  Ok(())
}

fn archive_invalid(archive: &Path) -> impl Fn(std::io::Error) -> anyhow::Error + '_ {
  move |err| PawletteError::ArchiveInvalid(format!("{}: {err}", archive.display())).into()
}

fn list_entries(archive: &Path) -> Result<Vec<PathBuf>> {
  let file = fs::File::open(archive)
    .with_context(|| format!("failed to open {}", archive.display()))?;
  let mut tar = tar::Archive::new(GzDecoder::new(file));
  let mut paths = Vec::new();
  for entry in tar.entries().map_err(archive_invalid(archive))? {
    let entry = entry.map_err(archive_invalid(archive))?;
    paths.push(entry.path().map_err(archive_invalid(archive))?.into_owned());
  }
  Ok(paths)
}

/// Longest common path prefix across all members, component-wise.
fn common_prefix(paths: &[PathBuf]) -> PathBuf {
  let Some(first) = paths.first() else {
    return PathBuf::new();
  };
  let mut prefix: Vec<Component<'_>> = first.components().collect();
  for path in &paths[1..] {
    let components: Vec<Component<'_>> = path.components().collect();
    let shared = prefix
      .iter()
      .zip(components.iter())
      .take_while(|(a, b)| a == b)
      .count();
    prefix.truncate(shared);
    if prefix.is_empty() {
      break;
    }
  }
  prefix.iter().collect()
}

fn strip_prefix(path: &Path, prefix: &Path) -> Option<PathBuf> {
  let stripped = if prefix.as_os_str().is_empty() {
    path.to_path_buf()
  } else {
    path.strip_prefix(prefix).ok()?.to_path_buf()
  };
  if stripped.as_os_str().is_empty() {
    None
  } else {
    Some(stripped)
  }
}

fn is_safe_relative(path: &Path) -> bool {
  !path.components().any(|component| {
    matches!(component, Component::ParentDir | Component::RootDir | Component::Prefix(_))
  })
}

/// Normalizes permissions after extraction so hostile archives cannot leave
/// unreadable files that block later copy or git operations: directories
/// 0755, regular files 0644 (0755 when any execute bit was set), symlinks
/// untouched.
pub fn sanitize_permissions(dir: &Path) -> Result<()> {
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    for entry in walkdir::WalkDir::new(dir) {
      let entry = entry?;
      if entry.path_is_symlink() {
        continue;
      }
      let metadata = entry.metadata()?;
      let mode = metadata.permissions().mode();
      let wanted = if metadata.is_dir() {
        0o755
      } else if mode & 0o111 != 0 {
        0o755
      } else {
        0o644
      };
      if mode & 0o7777 != wanted {
        fs::set_permissions(entry.path(), fs::Permissions::from_mode(wanted))
          .map_err(|_| PawletteError::PermissionDenied(entry.path().to_path_buf()))?;
      }
    }
  }
  Ok(())
}
