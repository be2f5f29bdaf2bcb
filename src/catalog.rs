use std::collections::BTreeMap;
use tracing::error;

use crate::manifest::ThemeSource;

pub const OFFICIAL_THEMES_LIST_URL: &str =
  "https://raw.githubusercontent.com/meowrch/pawlette-themes/main/themes.list";
pub const COMMUNITY_THEMES_LIST_URL: &str =
  "https://raw.githubusercontent.com/meowrch/pawlette-community-themes/main/themes.list";

#[derive(Debug, Clone)]
pub struct RemoteTheme {
  pub name: String,
  pub url: String,
  pub source: ThemeSource,
}

/// GitHub `blob` links point at an HTML page; rewrite to the raw download.
pub fn convert_github_url(url: &str) -> String {
  if url.contains("github.com") && url.contains("/blob/") {
    url.replace("/blob/", "/raw/")
  } else {
    url.to_string()
  }
}

/// Parses a catalog: `# comment` and blank lines are skipped, content lines
/// are whitespace-separated `NAME URL [IGNORED]`.
pub fn parse_catalog(text: &str, source: ThemeSource) -> BTreeMap<String, RemoteTheme> {
  let mut themes = BTreeMap::new();
  for line in text.lines() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    let mut parts = line.split_whitespace();
    let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
      continue;
    };
    themes.insert(
      name.to_string(),
      RemoteTheme {
        name: name.to_string(),
        url: convert_github_url(url),
        source,
      },
    );
  }
  themes
}

fn load_catalog(url: &str, source: ThemeSource) -> BTreeMap<String, RemoteTheme> {
  let response = match ureq::get(url).call() {
    Ok(response) => response,
    Err(err) => {
      error!("error fetching {} themes list from {url}: {err}", source.label());
      return BTreeMap::new();
    }
  };
  let text = match response.into_string() {
    Ok(text) => text,
    Err(err) => {
      error!("error reading {} themes list from {url}: {err}", source.label());
      return BTreeMap::new();
    }
  };
  parse_catalog(&text, source)
}

/// Fetches both catalogs and merges them. Official entries win name
/// collisions; a failing source yields empty without aborting the other.
pub fn fetch_remote_themes() -> BTreeMap<String, RemoteTheme> {
  let mut themes: BTreeMap<String, RemoteTheme> = BTreeMap::new();

  for (url, source) in [
    (OFFICIAL_THEMES_LIST_URL, ThemeSource::Official),
    (COMMUNITY_THEMES_LIST_URL, ThemeSource::Community),
  ] {
    for (name, remote) in load_catalog(url, source) {
      if !themes.contains_key(&name) || remote.source == ThemeSource::Official {
        themes.insert(name, remote);
      }
    }
  }

  themes
}

/// The `get-available-themes` view: name -> download URL.
pub fn available_themes_map() -> BTreeMap<String, String> {
  fetch_remote_themes()
    .into_iter()
    .map(|(name, remote)| (name, remote.url))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_names_and_urls_skipping_comments() {
    let text = "# themes\n\nnord https://example.com/nord-v1.0.0.tar.gz\n\
                gruvbox https://example.com/gruvbox-v2.1.0.tar.gz extra-field\n";
    let themes = parse_catalog(text, ThemeSource::Official);
    assert_eq!(themes.len(), 2);
    assert_eq!(themes["nord"].url, "https://example.com/nord-v1.0.0.tar.gz");
    assert_eq!(themes["gruvbox"].url, "https://example.com/gruvbox-v2.1.0.tar.gz");
  }

  #[test]
  fn rewrites_blob_urls_to_raw() {
    let text = "nord https://github.com/meowrch/themes/blob/main/nord-v1.0.0.tar.gz\n";
    let themes = parse_catalog(text, ThemeSource::Community);
    assert_eq!(
      themes["nord"].url,
      "https://github.com/meowrch/themes/raw/main/nord-v1.0.0.tar.gz"
    );
  }

  #[test]
  fn single_field_lines_are_ignored() {
    let themes = parse_catalog("just-a-name\n", ThemeSource::Official);
    assert!(themes.is_empty());
  }
}
