//! Launcher settings.
//!
//! Stored in `<dataDir>/settings.json` as a flat JSON object.
//! The file is shared with other tools, so unknown keys are
//! left alone and written back untouched.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{err, IntoIoError, IntoJsonError, JsonFileError, LoaderType};

/// Opaque key-value persistence.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn flush(&self) -> Result<(), JsonFileError>;
}

/// A [`SettingsStore`] backed by a JSON file.
///
/// Reads happen once at [`JsonSettingsStore::open`];
/// writes stay in memory until [`SettingsStore::flush`].
pub struct JsonSettingsStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonSettingsStore {
    pub const FILE_NAME: &'static str = "settings.json";

    /// Opens `<launcher_dir>/settings.json`.
    ///
    /// A missing file is an empty store. A corrupt one
    /// is reported and also treated as empty
    /// (it gets overwritten on the next flush).
    pub fn open(launcher_dir: &Path) -> Result<Self, JsonFileError> {
        let path = launcher_dir.join(Self::FILE_NAME);
        let values = if path.is_file() {
            let text = std::fs::read_to_string(&path).path(&path)?;
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    err!("{} is not a JSON object, using defaults", Self::FILE_NAME);
                    Map::new()
                }
                Err(error) => {
                    err!("Couldn't parse {}, using defaults: {error}", Self::FILE_NAME);
                    Map::new()
                }
            }
        } else {
            Map::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_owned(), value);
        }
    }

    fn flush(&self) -> Result<(), JsonFileError> {
        let text = {
            let values = self.values.lock().map(|n| n.clone()).unwrap_or_default();
            serde_json::to_string_pretty(&Value::Object(values)).json_to()?
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).path(parent)?;
        }
        let temp = crate::file_utils::temp_sibling(&self.path);
        std::fs::write(&temp, text).path(&temp)?;
        std::fs::rename(&temp, &self.path).path(&self.path)?;
        Ok(())
    }
}

/// Which `java` to launch the game with.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JavaMode {
    /// The runtime matching the version's `javaVersion`,
    /// if one is installed under `<dataDir>/runtime`.
    #[default]
    Recommended,
    /// Whatever `java` is on `PATH`.
    Current,
    /// [`LauncherSettings::java_path`].
    Custom,
}

/// Bundled JVM tuning presets.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JvmPreset {
    #[default]
    Auto,
    G1gc,
    None,
}

impl JvmPreset {
    #[must_use]
    pub fn uses_g1gc(self) -> bool {
        matches!(self, JvmPreset::Auto | JvmPreset::G1gc)
    }
}

/// Typed view over the settings file.
///
/// Field names are the on-disk keys. Building one from a
/// store follows a single merge rule: **a stored value
/// replaces the default only if it has the same JSON type**
/// (and, for enums, a known value). Anything else falls back to
/// the default, so a hand-edited file can't break launching.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LauncherSettings {
    /// Memory for the game, in **gigabytes**.
    pub memory: u32,
    pub close_on_launch: bool,
    /// Extra JVM arguments, shell-quoted.
    pub jre_args: String,
    /// Extra game arguments, shell-quoted.
    pub mc_args: String,
    /// Wrapper command template; `%command%` is
    /// replaced with the quoted game command.
    pub wrapper_cmd: String,
    pub java_mode: JavaMode,
    pub java_path: String,
    pub jre_optimized_profile: JvmPreset,
    /// Use the Windows certificate store for Java's SSL.
    pub update_legacy_ssl: bool,

    pub last_username: String,
    pub last_version: String,
    pub last_loader: LoaderType,
    pub show_snapshots: bool,

    pub ely_access_token: String,
    pub ely_username: String,
    pub ely_uuid: String,
    pub ely_logged_in: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            memory: crate::DEFAULT_MEMORY_GB,
            close_on_launch: false,
            jre_args: String::new(),
            mc_args: String::new(),
            wrapper_cmd: String::new(),
            java_mode: JavaMode::Recommended,
            java_path: String::new(),
            jre_optimized_profile: JvmPreset::Auto,
            update_legacy_ssl: false,
            last_username: String::new(),
            last_version: String::new(),
            last_loader: LoaderType::Vanilla,
            show_snapshots: false,
            ely_access_token: String::new(),
            ely_username: String::new(),
            ely_uuid: String::new(),
            ely_logged_in: false,
        }
    }
}

impl LauncherSettings {
    /// Reads every known key from `store`, merging with defaults.
    #[must_use]
    pub fn from_store(store: &dyn SettingsStore) -> Self {
        let defaults = Self::default();
        let Ok(Value::Object(mut merged)) = serde_json::to_value(&defaults) else {
            return defaults;
        };

        let keys: Vec<String> = merged.keys().cloned().collect();
        for key in keys {
            let Some(stored) = store.get(&key) else {
                continue;
            };
            let Some(default) = merged.get(&key) else {
                continue;
            };
            if !same_json_type(default, &stored) {
                err!("settings: ignoring {key:?}, expected a value like {default}");
                continue;
            }
            let previous = merged.insert(key.clone(), stored);
            // Enum fields: the type matches (a string) but the value may be unknown.
            if serde_json::from_value::<Self>(Value::Object(merged.clone())).is_err() {
                err!("settings: ignoring unsupported value for {key:?}");
                if let Some(previous) = previous {
                    merged.insert(key, previous);
                }
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
    }

    /// Writes every field into `store` (without flushing).
    pub fn write_to(&self, store: &dyn SettingsStore) {
        if let Ok(Value::Object(map)) = serde_json::to_value(self) {
            for (k, v) in map {
                store.set(&k, v);
            }
        }
    }

    #[must_use]
    pub fn memory_mb(&self) -> i64 {
        i64::from(self.memory) * 1024
    }
}

fn same_json_type(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            // u32 fields shouldn't silently accept 2.5 or -1
            a.is_u64() == b.is_u64()
        }
        _ => std::mem::discriminant(a) == std::mem::discriminant(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(contents: &str) -> (tempfile::TempDir, JsonSettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(JsonSettingsStore::FILE_NAME), contents).unwrap();
        let store = JsonSettingsStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_keys_take_defaults() {
        let (_dir, store) = store_with(r#"{ "memory": 8, "jre_args": "-Dfoo=bar" }"#);
        let settings = LauncherSettings::from_store(&store);
        assert_eq!(settings.memory, 8);
        assert_eq!(settings.jre_args, "-Dfoo=bar");
        assert_eq!(settings.java_mode, JavaMode::Recommended);
        assert_eq!(settings.jre_optimized_profile, JvmPreset::Auto);
        assert!(!settings.ely_logged_in);
    }

    #[test]
    fn wrongly_typed_values_fall_back() {
        let (_dir, store) = store_with(
            r#"{ "memory": "lots", "close_on_launch": 1, "java_mode": "weird", "update_legacy_ssl": true }"#,
        );
        let settings = LauncherSettings::from_store(&store);
        assert_eq!(settings.memory, 4);
        assert!(!settings.close_on_launch);
        assert_eq!(settings.java_mode, JavaMode::Recommended);
        assert!(settings.update_legacy_ssl);
    }

    #[test]
    fn unknown_keys_survive_a_flush() {
        let (dir, store) = store_with(r#"{ "language": "ru", "favorites": ["1.20.1"] }"#);
        let mut settings = LauncherSettings::from_store(&store);
        settings.last_username = "Steve".to_owned();
        settings.write_to(&store);
        store.flush().unwrap();

        let text = std::fs::read_to_string(dir.path().join(JsonSettingsStore::FILE_NAME)).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["language"], json!("ru"));
        assert_eq!(value["favorites"], json!(["1.20.1"]));
        assert_eq!(value["last_username"], json!("Steve"));
    }

    #[test]
    fn corrupt_file_is_an_empty_store() {
        let (_dir, store) = store_with("{ not json");
        assert_eq!(LauncherSettings::from_store(&store), LauncherSettings::default());
    }

    #[test]
    fn memory_is_stored_in_gigabytes() {
        let settings = LauncherSettings {
            memory: 6,
            ..Default::default()
        };
        assert_eq!(settings.memory_mb(), 6144);
    }
}
