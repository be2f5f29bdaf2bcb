use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Provenance of an installed theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeSource {
  Official,
  Community,
  Local,
}

impl ThemeSource {
  pub fn label(self) -> &'static str {
    match self {
      ThemeSource::Official => "official",
      ThemeSource::Community => "community",
      ThemeSource::Local => "local",
    }
  }
}

/// One record of the installed-themes manifest. An unrecognized `source`
/// value loads as `None` instead of failing the whole manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledTheme {
  pub version: String,
  pub source_url: String,
  pub installed_path: PathBuf,
  #[serde(default, deserialize_with = "lenient_source")]
  pub source: Option<ThemeSource>,
}

fn lenient_source<'de, D>(deserializer: D) -> Result<Option<ThemeSource>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw: Option<String> = Option::deserialize(deserializer)?;
  Ok(match raw.as_deref() {
    Some("official") => Some(ThemeSource::Official),
    Some("community") => Some(ThemeSource::Community),
    Some("local") => Some(ThemeSource::Local),
    _ => None,
  })
}

/// The persistent name -> record mapping stored in `installed_themes.json`.
#[derive(Debug, Default)]
pub struct Manifest {
  path: PathBuf,
  themes: BTreeMap<String, InstalledTheme>,
}

impl Manifest {
  pub fn load(path: &Path) -> Result<Self> {
    let themes = if path.is_file() {
      let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?
    } else {
      BTreeMap::new()
    };
    Ok(Manifest {
      path: path.to_path_buf(),
      themes,
    })
  }

  pub fn save(&self) -> Result<()> {
    let parent = self.path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let content = serde_json::to_string_pretty(&self.themes)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp
      .persist(&self.path)
      .with_context(|| format!("failed to replace {}", self.path.display()))?;
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&InstalledTheme> {
    self.themes.get(name)
  }

  pub fn put(&mut self, name: &str, record: InstalledTheme) {
    self.themes.insert(name.to_string(), record);
  }

  pub fn remove(&mut self, name: &str) -> Option<InstalledTheme> {
    self.themes.remove(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &InstalledTheme)> {
    self.themes.iter()
  }

  pub fn names(&self) -> Vec<String> {
    self.themes.keys().cloned().collect()
  }

  pub fn is_empty(&self) -> bool {
    self.themes.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn absent_manifest_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = Manifest::load(&dir.path().join("installed_themes.json")).unwrap();
    assert!(manifest.is_empty());
  }

  #[test]
  fn roundtrip_preserves_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("installed_themes.json");
    let mut manifest = Manifest::load(&path).unwrap();
    manifest.put(
      "nord",
      InstalledTheme {
        version: "1.2.0".to_string(),
        source_url: "https://example.com/nord-v1.2.0.tar.gz".to_string(),
        installed_path: dir.path().join("themes/nord"),
        source: Some(ThemeSource::Official),
      },
    );
    manifest.save().unwrap();

    let reloaded = Manifest::load(&path).unwrap();
    let record = reloaded.get("nord").unwrap();
    assert_eq!(record.version, "1.2.0");
    assert_eq!(record.source, Some(ThemeSource::Official));
  }

  #[test]
  fn unknown_source_degrades_to_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("installed_themes.json");
    fs::write(
      &path,
      r#"{"odd": {"version": "1.0", "source_url": "u", "installed_path": "/tmp/odd", "source": "mystery"}}"#,
    )
    .unwrap();
    let manifest = Manifest::load(&path).unwrap();
    assert_eq!(manifest.get("odd").unwrap().source, None);
  }
}
