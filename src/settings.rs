use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::capture::Region;

pub const MIN_CAPTURE_INTERVAL_MS: u64 = 50;
const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub capture_region: Option<Region>,
    /// Milliseconds between captures.
    pub capture_interval: u64,
    pub ocr_whitelist: String,
    pub overlay1_enabled: bool,
    pub overlay2_enabled: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            capture_region: None,
            capture_interval: DEFAULT_CAPTURE_INTERVAL_MS,
            ocr_whitelist: "0123456789".into(),
            overlay1_enabled: true,
            overlay2_enabled: false,
        }
    }
}

impl UserSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval.max(MIN_CAPTURE_INTERVAL_MS))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings file {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self) -> UserSettings {
        self.read().clone()
    }

    pub fn region(&self) -> Option<Region> {
        self.read().capture_region
    }

    pub fn interval(&self) -> Duration {
        self.read().interval()
    }

    pub fn update(&self, settings: UserSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        assert_eq!(store.get(), UserSettings::default());
        assert_eq!(store.region(), None);
        assert_eq!(store.interval(), Duration::from_millis(500));
    }

    #[test]
    fn interval_is_clamped_to_minimum() {
        let settings = UserSettings {
            capture_interval: 5,
            ..UserSettings::default()
        };

        assert_eq!(settings.interval(), Duration::from_millis(MIN_CAPTURE_INTERVAL_MS));
    }

    #[test]
    fn updates_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        store
            .update(UserSettings {
                capture_region: Some(Region::new(10, 20, 120, 40)),
                capture_interval: 250,
                ..store.get()
            })
            .unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.region(), Some(Region::new(10, 20, 120, 40)));
        assert_eq!(reopened.interval(), Duration::from_millis(250));
    }

    #[test]
    fn partial_and_corrupt_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("partial.json");
        fs::write(&partial, r#"{"captureInterval": 1000}"#).unwrap();
        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{not json").unwrap();

        let store = SettingsStore::new(partial).unwrap();
        assert_eq!(store.interval(), Duration::from_millis(1000));
        assert_eq!(store.get().ocr_whitelist, "0123456789");

        assert_eq!(SettingsStore::new(corrupt).unwrap().get(), UserSettings::default());
    }
}
