use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const PREFERENCES_PATH: &str = "config/preferences.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Keys with a built-in default. Other keys may be stored but have none.
pub fn default_value(key: &str) -> Option<Value> {
    match key {
        "theme" => serde_json::to_value(Theme::default()).ok(),
        "apiKeys" => Some(Value::Object(Map::new())),
        _ => None,
    }
}

/// Key-value preferences persisted as one JSON object.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl PreferenceStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match Self::read(&path) {
            Ok(values) => values,
            Err(err) => {
                warn!(target: "preferences", "{err:?}; starting from defaults");
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    fn read(path: &Path) -> Result<BTreeMap<String, Value>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("Failed to parse preferences {}", path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored value, or the key's default when nothing is stored.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned().or_else(|| default_value(key))
    }

    pub fn theme(&self) -> Theme {
        self.get("theme").and_then(|value| serde_json::from_value(value).ok()).unwrap_or_default()
    }

    pub fn api_key(&self, service: &str) -> Option<String> {
        self.get("apiKeys")?.get(service)?.as_str().map(str::to_string)
    }

    /// Stores `value` and writes the file. Values for keys with a default must
    /// keep the default's JSON shape.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if let Some(default) = default_value(key) {
            if !same_shape(&default, &value) {
                bail!("Preference '{key}' expects a value shaped like {default}");
            }
        }
        if key == "theme" {
            serde_json::from_value::<Theme>(value.clone())
                .with_context(|| format!("Invalid theme {value}; use \"dark\" or \"light\""))?;
        }
        self.values.insert(key.to_string(), value);
        self.save()
    }

    /// Drops the stored value so the default applies again.
    pub fn reset(&mut self, key: &str) -> Result<bool> {
        let removed = self.values.remove(key).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn reset_all(&mut self) -> Result<()> {
        self.values.clear();
        self.save()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create preferences dir {}", parent.display()))?;
            }
        }
        let data = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, format!("{data}\n"))
            .with_context(|| format!("Failed to write preferences {}", self.path.display()))
    }
}

fn same_shape(expected: &Value, actual: &Value) -> bool {
    matches!(
        (expected, actual),
        (Value::String(_), Value::String(_))
            | (Value::Object(_), Value::Object(_))
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::Array(_), Value::Array(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_until_set_and_after_reset() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        let mut prefs = PreferenceStore::open(&path);
        assert_eq!(prefs.theme(), Theme::Dark);
        assert_eq!(prefs.get("apiKeys"), Some(json!({})));

        prefs.set("theme", json!("light")).expect("set theme");
        prefs.set("apiKeys", json!({ "replicate": "r8_token" })).expect("set keys");
        let reopened = PreferenceStore::open(&path);
        assert_eq!(reopened.theme(), Theme::Light);
        assert_eq!(reopened.api_key("replicate").as_deref(), Some("r8_token"));

        prefs.reset("theme").expect("reset");
        assert_eq!(prefs.theme(), Theme::Dark);
        prefs.reset_all().expect("reset all");
        assert_eq!(prefs.keys().count(), 0);
        assert_eq!(PreferenceStore::open(&path).api_key("replicate"), None);
    }

    #[test]
    fn rejects_values_with_the_wrong_shape() {
        let dir = tempdir().expect("tempdir");
        let mut prefs = PreferenceStore::open(dir.path().join("prefs.json"));
        assert!(prefs.set("apiKeys", json!("oops")).is_err());
        assert!(prefs.set("theme", json!("sepia")).is_err());
        prefs.set("lastExportDir", json!("/tmp/out")).expect("free-form key");
        assert_eq!(prefs.get("lastExportDir"), Some(json!("/tmp/out")));
    }
}
