#![allow(dead_code)]

use assert_cmd::Command;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnv {
  pub temp: TempDir,
  pub home: PathBuf,
  pub bin: PathBuf,
}

pub fn setup_env() -> TestEnv {
  let temp = TempDir::new().expect("temp dir");
  let home = temp.path().join("home");
  fs::create_dir_all(home.join(".config")).expect("config dir");
  let bin = temp.path().join("bin");
  fs::create_dir_all(&bin).expect("bin dir");
  // Safety guards: never signal real processes or touch the live session.
  write_script(&bin.join("pgrep"), "#!/usr/bin/env bash\n\nexit 1\n");
  write_stub_ok(&bin.join("hyprctl"));
  write_stub_ok(&bin.join("killall"));
  write_stub_ok(&bin.join("gsettings"));
  write_stub_ok(&bin.join("xrdb"));
  TestEnv { temp, home, bin }
}

pub fn cmd_with_env(env: &TestEnv) -> Command {
  let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pawlette"));
  cmd.env("HOME", &env.home);
  cmd.env("XDG_CONFIG_HOME", env.home.join(".config"));
  cmd.env("XDG_DATA_HOME", env.home.join(".local/share"));
  cmd.env("XDG_STATE_HOME", env.home.join(".local/state"));
  cmd.env("XDG_CACHE_HOME", env.home.join(".cache"));
  cmd.env_remove("XDG_SESSION_TYPE");
  cmd.env("GIT_CONFIG_NOSYSTEM", "1");
  cmd.env("PATH", format!("{}:/usr/bin:/bin", env.bin.display()));
  cmd
}

pub fn config_home(env: &TestEnv) -> PathBuf {
  env.home.join(".config")
}

pub fn themes_dir(env: &TestEnv) -> PathBuf {
  env.home.join(".local/share/pawlette/themes")
}

pub fn state_dir(env: &TestEnv) -> PathBuf {
  env.home.join(".local/state/pawlette")
}

pub fn manifest_file(env: &TestEnv) -> PathBuf {
  state_dir(env).join("installed_themes.json")
}

pub fn write_script(path: &Path, content: &str) {
  fs::write(path, content).expect("write script");
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
  }
}

pub fn write_stub_ok(path: &Path) {
  write_script(path, "#!/usr/bin/env bash\n\nexit 0\n");
}

/// Builds a gzip tar archive with a single `<root>/` top-level directory,
/// the layout theme release archives use.
pub fn make_archive(dest: &Path, root: &str, files: &[(&str, &str)]) {
  make_archive_with_modes(
    dest,
    root,
    &files.iter().map(|(path, content)| (*path, *content, 0o644)).collect::<Vec<_>>(),
  );
}

pub fn make_archive_with_modes(dest: &Path, root: &str, files: &[(&str, &str, u32)]) {
  let file = fs::File::create(dest).expect("create archive");
  let encoder = GzEncoder::new(file, Compression::default());
  let mut builder = tar::Builder::new(encoder);

  let mut dir_header = tar::Header::new_gnu();
  dir_header.set_path(format!("{root}/")).expect("root path");
  dir_header.set_entry_type(tar::EntryType::Directory);
  dir_header.set_mode(0o755);
  dir_header.set_size(0);
  dir_header.set_cksum();
  builder.append(&dir_header, std::io::empty()).expect("append root");

  for (path, content, mode) in files {
    let mut header = tar::Header::new_gnu();
    let full = format!("{root}/{path}");
    // set_path refuses `..` components, which the traversal tests need to
    // smuggle in; write the name bytes directly for those.
    if header.set_path(&full).is_err() {
      header.as_mut_bytes()[..full.len()].copy_from_slice(full.as_bytes());
    }
    header.set_mode(*mode);
    header.set_size(content.len() as u64);
    header.set_cksum();
    builder.append(&header, content.as_bytes()).expect("append entry");
  }

  builder.into_inner().expect("finish tar").finish().expect("finish gzip");
}

/// Installs a theme from a locally built archive and returns its directory.
pub fn install_local_theme(env: &TestEnv, name: &str, version: &str, files: &[(&str, &str)]) -> PathBuf {
  let archive = env.temp.path().join(format!("{name}-v{version}.tar.gz"));
  make_archive(&archive, &format!("{name}-v{version}"), files);

  let mut cmd = cmd_with_env(env);
  cmd.args(["install-theme", archive.to_string_lossy().as_ref()]);
  cmd.assert().success();

  themes_dir(env).join(name)
}

/// Runs git against the state repository, panicking on failure.
pub fn state_git(env: &TestEnv, args: &[&str]) -> String {
  let repo = state_dir(env).join("config_state.git");
  let output = std::process::Command::new("git")
    .arg("-C")
    .arg(&repo)
    .args(args)
    .env("GIT_CONFIG_NOSYSTEM", "1")
    .env("HOME", &env.home)
    .output()
    .expect("run git");
  assert!(
    output.status.success(),
    "git {args:?} failed: {}",
    String::from_utf8_lossy(&output.stderr)
  );
  String::from_utf8_lossy(&output.stdout).to_string()
}
