mod support;

use support::*;
use std::fs;

fn install_two_themes(env: &TestEnv) {
  install_local_theme(
    env,
    "alpha",
    "1.7.4",
    &[("configs/kitty/kitty.conf", "# alpha colors\ninclude theme.conf")],
  );
  install_local_theme(
    env,
    "bravo",
    "2.0.0",
    &[("configs/kitty/kitty.conf", "# bravo colors\ninclude theme.conf")],
  );
}

#[test]
fn first_apply_creates_branch_and_files() {
  let env = setup_env();
  install_local_theme(
    &env,
    "pawlette-catppuccin-mocha-theme",
    "1.7.4",
    &[("configs/kitty/kitty.conf", "include theme.conf")],
  );

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "pawlette-catppuccin-mocha-theme"]);
  cmd.assert().success();

  assert!(config_home(&env).join("kitty/kitty.conf").is_file());

  let subjects = state_git(
    &env,
    &["log", "--format=%s", "pawlette-catppuccin-mocha-theme"],
  );
  assert!(subjects
    .lines()
    .any(|subject| subject.starts_with("Apply theme: pawlette-catppuccin-mocha-theme")));
}

#[test]
fn apply_twice_leaves_files_identical() {
  let env = setup_env();
  install_two_themes(&env);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();
  let first = fs::read_to_string(config_home(&env).join("kitty/kitty.conf")).unwrap();

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();
  let second = fs::read_to_string(config_home(&env).join("kitty/kitty.conf")).unwrap();
  assert_eq!(first, second);
}

#[test]
fn user_edits_are_committed_and_restored() {
  let env = setup_env();
  install_two_themes(&env);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  let config = config_home(&env).join("kitty/kitty.conf");
  fs::write(&config, "# User modified").unwrap();

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "bravo"]);
  cmd.assert().success();

  // The edit was captured on alpha's branch before the switch.
  let subjects = state_git(&env, &["log", "--format=%s", "alpha"]);
  assert!(subjects
    .lines()
    .next()
    .unwrap()
    .starts_with("[USER] Save user customizations"));
  // And bravo's content is live now.
  assert!(fs::read_to_string(&config).unwrap().contains("bravo"));

  // Round trip: switching back to alpha restores the user's edit.
  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();
  assert_eq!(fs::read_to_string(&config).unwrap(), "# User modified");
}

#[test]
fn version_upgrade_creates_backup_branch() {
  let env = setup_env();
  install_local_theme(&env, "alpha", "1.7.4", &[("configs/kitty/kitty.conf", "a")]);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  // Pretend the branch was built from an older release.
  fs::write(state_dir(&env).join("alpha.version"), "1.0.0").unwrap();

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  let branches = state_git(&env, &["for-each-ref", "--format=%(refname:short)", "refs/heads/"]);
  let backups: Vec<&str> = branches
    .lines()
    .filter(|branch| branch.starts_with("alpha-v1.0.0-backup-"))
    .collect();
  assert_eq!(backups.len(), 1);
  // The theme branch itself was rebuilt and re-applied.
  assert_eq!(fs::read_to_string(state_dir(&env).join("alpha.version")).unwrap(), "1.7.4");
}

#[test]
fn uninstall_refuses_active_theme() {
  let env = setup_env();
  install_two_themes(&env);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  let mut cmd = cmd_with_env(&env);
  cmd.args(["uninstall-theme", "alpha"]);
  cmd
    .assert()
    .failure()
    .stderr(predicates::str::contains("currently active"));
  assert!(themes_dir(&env).join("alpha").is_dir());

  let mut cmd = cmd_with_env(&env);
  cmd.arg("restore");
  cmd.assert().success();

  let mut cmd = cmd_with_env(&env);
  cmd.args(["uninstall-theme", "alpha"]);
  cmd.assert().success();

  let branches = state_git(&env, &["for-each-ref", "--format=%(refname:short)", "refs/heads/"]);
  assert!(!branches.lines().any(|branch| branch == "alpha"));
  assert!(!themes_dir(&env).join("alpha").exists());
}

#[test]
fn restore_returns_to_main() {
  let env = setup_env();
  install_two_themes(&env);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  let mut cmd = cmd_with_env(&env);
  cmd.arg("restore");
  cmd.assert().success();

  let branch = state_git(&env, &["branch", "--show-current"]);
  assert_eq!(branch.trim(), "main");

  let mut cmd = cmd_with_env(&env);
  cmd.arg("current-theme");
  cmd
    .assert()
    .success()
    .stdout(predicates::str::contains("No theme is currently active"));
}

#[test]
fn ignored_files_never_enter_commits() {
  let env = setup_env();
  install_local_theme(&env, "alpha", "1.7.4", &[("configs/kitty/kitty.conf", "a")]);

  let cache_file = config_home(&env).join("Code/Cache/junk.bin");
  fs::create_dir_all(cache_file.parent().unwrap()).unwrap();
  fs::write(&cache_file, "volatile").unwrap();
  let log_file = config_home(&env).join("kitty/session.log");
  fs::create_dir_all(log_file.parent().unwrap()).unwrap();
  fs::write(&log_file, "log").unwrap();

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  let tracked = state_git(&env, &["ls-files"]);
  assert!(!tracked.contains("Code/Cache/junk.bin"));
  assert!(!tracked.contains("kitty/session.log"));
  assert!(tracked.contains("kitty/kitty.conf"));
}

#[test]
fn reset_theme_restores_theme_files_only() {
  let env = setup_env();
  install_local_theme(&env, "alpha", "1.7.4", &[("configs/kitty/kitty.conf", "# alpha\n")]);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  let theme_file = config_home(&env).join("kitty/kitty.conf");
  let unrelated = config_home(&env).join("other/notes.txt");
  fs::create_dir_all(unrelated.parent().unwrap()).unwrap();
  fs::write(&theme_file, "# broken by user\n").unwrap();
  fs::write(&unrelated, "keep me\n").unwrap();

  let mut cmd = cmd_with_env(&env);
  cmd.args(["reset-theme", "alpha"]);
  cmd.assert().success();

  assert_eq!(fs::read_to_string(&theme_file).unwrap(), "# alpha\n");
  assert_eq!(fs::read_to_string(&unrelated).unwrap(), "keep me\n");
}

#[test]
fn history_lists_apply_and_user_commits() {
  let env = setup_env();
  install_two_themes(&env);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  fs::write(config_home(&env).join("kitty/kitty.conf"), "# edited").unwrap();
  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "bravo"]);
  cmd.assert().success();

  let mut cmd = cmd_with_env(&env);
  cmd.args(["history", "alpha"]);
  cmd
    .assert()
    .success()
    .stdout(predicates::str::contains("Apply theme: alpha"))
    .stdout(predicates::str::contains("[USER]"));
}

#[test]
fn restore_commit_cherry_picks_user_changes_onto_another_theme() {
  let env = setup_env();
  install_local_theme(&env, "alpha", "1.0.0", &[("configs/kitty/kitty.conf", "# shared base\n")]);
  install_local_theme(&env, "bravo", "1.0.0", &[("configs/kitty/kitty.conf", "# shared base\n")]);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  let config = config_home(&env).join("kitty/kitty.conf");
  fs::write(&config, "# shared base\n# user tweak\n").unwrap();

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "bravo"]);
  cmd.assert().success();

  // The tweak landed as the newest commit on alpha.
  let user_commit = state_git(&env, &["log", "--format=%H", "-1", "alpha"]);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["restore-commit", user_commit.trim(), "bravo"]);
  cmd.assert().success();

  assert!(fs::read_to_string(&config).unwrap().contains("# user tweak"));
}

#[test]
fn set_theme_fails_for_missing_theme() {
  let env = setup_env();
  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "does-not-exist"]);
  cmd
    .assert()
    .failure()
    .stderr(predicates::str::contains("theme not found"));
}
