use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Admin-editable key/value settings, persisted as one JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Settings {
    pub fn defaults_map() -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(
            "ticket_poster_path".to_string(),
            Value::String("assets/ticket_poster.png".to_string()),
        );
        values
    }

    /// Load settings, seeding the file with defaults when it does not exist.
    /// A file that cannot be parsed yields the defaults without touching disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let settings = Self { path, values: Self::defaults_map() };
            settings.save()?;
            return Ok(settings);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let values = match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => map,
            _ => Self::defaults_map(),
        };
        Ok(Self { path, values })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Overwrite each submitted key; keys not submitted are kept.
    pub fn merge<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in entries {
            self.values.insert(k.into(), v.into());
        }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("writing settings file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_seeds_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("settings.json");
        let settings = Settings::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(
            settings.get("ticket_poster_path"),
            Some(&Value::String("assets/ticket_poster.png".to_string()))
        );
    }

    #[test]
    fn merge_then_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::load(&path).unwrap();
        settings.merge([("event_name", "Snow Liwa")]);
        settings.save().unwrap();

        let reloaded = Settings::load(&path).unwrap();
        assert_eq!(reloaded.get("event_name"), Some(&Value::String("Snow Liwa".to_string())));
        assert!(reloaded.get("ticket_poster_path").is_some());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.values(), &Settings::defaults_map());
    }
}
