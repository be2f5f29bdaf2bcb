use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::Config;

/// Comment token for a target file, chosen by extension. Unknown extensions
/// fall back to `#`.
pub fn comment_style<'a>(config: &'a Config, path: &Path) -> &'a str {
  let ext = path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| format!(".{}", ext.to_lowercase()))
    .unwrap_or_default();
  config.comment_style(&ext)
}

/// Regex matching PAW-THEME marker regions for the given theme pattern.
///
/// Each region kind is spelled as its own alternation branch so a PRE-START
/// can only ever be closed by a PRE-END (and POST by POST); the kinds cannot
/// cross-match. `theme` of `None` matches regions of any theme name, which
/// is what stale-marker cleanup wants.
fn region_regex(comment: &str, theme: Option<&str>) -> Result<Regex> {
  let c = regex::escape(comment);
  let t = match theme {
    Some(theme) => regex::escape(theme),
    None => String::from(".*?"),
  };
  let kind = |k: &str| {
    format!(
      "^[ \\t]*{c}[ \\t]+PAW-THEME-{k}-START:[ \\t]*{t}[ \\t]*$\
       .*?\
       ^[ \\t]*{c}[ \\t]+PAW-THEME-{k}-END:[ \\t]*{t}[ \\t]*$\\n?"
    )
  };
  let pattern = format!("(?ms)(?:{}|{})", kind("PRE"), kind("POST"));
  Regex::new(&pattern).context("failed to build marker regex")
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
  let parent = path.parent().unwrap_or(Path::new("."));
  let mut tmp = tempfile::NamedTempFile::new_in(parent)
    .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
  tmp.write_all(content.as_bytes())?;
  tmp
    .persist(path)
    .with_context(|| format!("failed to replace {}", path.display()))?;
  Ok(())
}

fn block(comment: &str, kind: &str, theme: &str, payload: &str) -> String {
  let payload = payload.trim_end_matches('\n');
  format!(
    "{comment} PAW-THEME-{kind}-START: {theme}\n{payload}\n{comment} PAW-THEME-{kind}-END: {theme}\n"
  )
}

/// Applies a pre/post marker pair for one theme to a target file.
///
/// Any existing regions of the same theme are stripped first, so re-applying
/// the same patch is idempotent: the file ends up with at most one PRE and
/// one POST block per theme.
pub fn apply_to_file(
  theme_name: &str,
  target: &Path,
  config: &Config,
  pre: Option<&str>,
  post: Option<&str>,
) -> Result<()> {
  let comment = comment_style(config, target);
  let original = if target.is_file() {
    fs::read_to_string(target).with_context(|| format!("failed to read {}", target.display()))?
  } else {
    String::new()
  };

  let cleaned = region_regex(comment, Some(theme_name))?.replace_all(&original, "");

  let mut content = String::new();
  if let Some(pre) = pre {
    content.push_str(&block(comment, "PRE", theme_name, pre));
    content.push('\n');
  }
  content.push_str(cleaned.trim());
  content.push('\n');
  if let Some(post) = post {
    content.push('\n');
    content.push_str(&block(comment, "POST", theme_name, post));
  }

  write_atomic(target, content.trim_start())?;
  debug!("patched {}", target.display());
  Ok(())
}

/// Strips PAW-THEME regions of any theme from a file, then collapses the
/// blank-line runs left behind so files do not accrete whitespace across
/// repeated applications.
pub fn clean_stale_markers(target: &Path, config: &Config) -> Result<()> {
  if !target.is_file() {
    return Ok(());
  }
  let comment = comment_style(config, target);
  let original =
    fs::read_to_string(target).with_context(|| format!("failed to read {}", target.display()))?;

  let stripped = region_regex(comment, None)?.replace_all(&original, "");

  let mut lines: Vec<&str> = Vec::new();
  let mut prev_empty = false;
  for line in stripped.lines() {
    let is_empty = line.trim().is_empty();
    if !(is_empty && prev_empty) {
      lines.push(line);
    }
    prev_empty = is_empty;
  }
  while lines.first().is_some_and(|line| line.trim().is_empty()) {
    lines.remove(0);
  }
  while lines.last().is_some_and(|line| line.trim().is_empty()) {
    lines.pop();
  }

  let mut content = lines.join("\n");
  if !content.is_empty() {
    content.push('\n');
  }

  if content != original {
    write_atomic(target, &content)?;
    debug!("cleaned stale markers from {}", target.display());
  }
  Ok(())
}

fn deep_merge(target: &mut serde_json::Value, overlay: &serde_json::Value) {
  match (target, overlay) {
    (serde_json::Value::Object(target_map), serde_json::Value::Object(overlay_map)) => {
      for (key, value) in overlay_map {
        match target_map.get_mut(key) {
          Some(existing) if existing.is_object() && value.is_object() => {
            deep_merge(existing, value);
          }
          _ => {
            target_map.insert(key.clone(), value.clone());
          }
        }
      }
    }
    (target, overlay) => *target = overlay.clone(),
  }
}

/// Deep-merges a JSON overlay into a JSON target file. Non-object targets
/// are skipped with a warning rather than clobbered.
pub fn merge_json_file(target: &Path, overlay: &serde_json::Value) -> Result<()> {
  let original =
    fs::read_to_string(target).with_context(|| format!("failed to read {}", target.display()))?;
  let mut value: serde_json::Value = match serde_json::from_str(&original) {
    Ok(value) => value,
    Err(err) => {
      warn!("skipping JSON merge, {} is not valid JSON: {err}", target.display());
      return Ok(());
    }
  };
  if !value.is_object() {
    warn!("skipping JSON merge, {} is not a JSON object", target.display());
    return Ok(());
  }

  deep_merge(&mut value, overlay);
  let mut content = serde_json::to_string_pretty(&value)?;
  content.push('\n');
  write_atomic(target, &content)?;
  debug!("merged JSON overlay into {}", target.display());
  Ok(())
}
