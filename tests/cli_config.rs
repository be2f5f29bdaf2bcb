mod support;

use support::*;
use std::fs;

#[test]
fn generate_config_writes_defaults() {
  let env = setup_env();
  let mut cmd = cmd_with_env(&env);
  cmd.arg("generate-config");
  cmd.assert().success();

  let config_file = env.home.join(".config/pawlette/pawlette.json");
  let config: serde_json::Value =
    serde_json::from_str(&fs::read_to_string(&config_file).unwrap()).unwrap();
  assert_eq!(config["max_backups"], 5);
  assert_eq!(config["comment_styles"][".json"], "//");
  assert_eq!(config["logging"]["enable_console"], false);
}

#[test]
fn get_themes_lists_installed_theme_names() {
  let env = setup_env();
  install_local_theme(&env, "alpha", "1.0.0", &[("configs/kitty/kitty.conf", "a")]);
  install_local_theme(&env, "bravo", "1.0.0", &[("configs/kitty/kitty.conf", "b")]);

  let mut cmd = cmd_with_env(&env);
  cmd.arg("get-themes");
  cmd
    .assert()
    .success()
    .stdout(predicates::str::contains("alpha"))
    .stdout(predicates::str::contains("bravo"));
}

#[test]
fn get_themes_info_reports_paths_and_provenance() {
  let env = setup_env();
  install_local_theme(&env, "alpha", "1.2.3", &[("configs/kitty/kitty.conf", "a")]);

  let mut cmd = cmd_with_env(&env);
  cmd.arg("get-themes-info");
  let output = cmd.assert().success().get_output().stdout.clone();
  let info: serde_json::Value = serde_json::from_slice(&output).unwrap();

  let alpha = &info["alpha"];
  assert!(alpha["path"].as_str().unwrap().ends_with("themes/alpha"));
  assert!(alpha["gtk-folder"].as_str().unwrap().ends_with("gtk-theme"));
  assert_eq!(alpha["source"], "local");
  assert_eq!(alpha["version"], "1.2.3");
}

#[test]
fn status_reports_base_state_when_no_theme_applied() {
  let env = setup_env();
  let mut cmd = cmd_with_env(&env);
  cmd.arg("status");
  cmd
    .assert()
    .success()
    .stdout(predicates::str::contains("No theme is currently active"));
}

#[test]
fn status_reports_current_theme_and_changes() {
  let env = setup_env();
  install_local_theme(&env, "alpha", "1.0.0", &[("configs/kitty/kitty.conf", "a")]);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  fs::write(config_home(&env).join("kitty/kitty.conf"), "edited").unwrap();

  let mut cmd = cmd_with_env(&env);
  cmd.arg("status");
  cmd
    .assert()
    .success()
    .stdout(predicates::str::contains("Current theme: alpha"))
    .stdout(predicates::str::contains("uncommitted changes"))
    .stdout(predicates::str::contains("kitty/kitty.conf"));
}

#[test]
fn user_changes_lists_modified_files() {
  let env = setup_env();
  install_local_theme(&env, "alpha", "1.0.0", &[("configs/kitty/kitty.conf", "a")]);

  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();

  fs::write(config_home(&env).join("kitty/kitty.conf"), "edited").unwrap();

  let mut cmd = cmd_with_env(&env);
  cmd.arg("user-changes");
  cmd
    .assert()
    .success()
    .stdout(predicates::str::contains("kitty/kitty.conf"));
}

#[test]
fn unknown_command_warns_but_exits_zero() {
  let env = setup_env();
  let mut cmd = cmd_with_env(&env);
  cmd.arg("frobnicate");
  cmd
    .assert()
    .success()
    .stderr(predicates::str::contains("unknown command"));
}

#[test]
fn invalid_config_file_falls_back_to_defaults() {
  let env = setup_env();
  let config_file = env.home.join(".config/pawlette/pawlette.json");
  fs::create_dir_all(config_file.parent().unwrap()).unwrap();
  fs::write(&config_file, "{broken").unwrap();

  install_local_theme(&env, "alpha", "1.0.0", &[("configs/kitty/kitty.conf", "a")]);
  let mut cmd = cmd_with_env(&env);
  cmd.args(["set-theme", "alpha"]);
  cmd.assert().success();
}
