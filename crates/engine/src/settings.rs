use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::atomic_io::write_text_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub play_music: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self { play_music: true }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Settings bound to the file they persist to.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    settings: ClientSettings,
}

impl SettingsStore {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let settings = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(source) if source.kind() == io::ErrorKind::NotFound => ClientSettings::default(),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            settings,
        })
    }

    /// Like [`SettingsStore::load`] but a broken file degrades to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|error| {
            warn!(error = %error, "settings_load_failed_using_defaults");
            Self {
                path: path.to_path_buf(),
                settings: ClientSettings::default(),
            }
        })
    }

    pub fn settings(&self) -> ClientSettings {
        self.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn update(
        &mut self,
        change: impl FnOnce(&mut ClientSettings),
    ) -> Result<ClientSettings, SettingsError> {
        let mut next = self.settings;
        change(&mut next);
        if next == self.settings {
            return Ok(next);
        }

        let text = serde_json::to_string_pretty(&next).map_err(SettingsError::Encode)?;
        write_text_atomic(&self.path, &text).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.settings = next;
        info!(play_music = next.play_music, "settings_saved");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::load(&dir.path().join("settings.json")).expect("load");
        assert_eq!(store.settings(), ClientSettings::default());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache").join("settings.json");
        let mut store = SettingsStore::load(&path).expect("load");

        let saved = store
            .update(|settings| settings.play_music = false)
            .expect("save");
        assert!(!saved.play_music);

        let reloaded = SettingsStore::load(&path).expect("reload");
        assert!(!reloaded.settings().play_music);
    }

    #[test]
    fn unchanged_update_does_not_touch_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let mut store = SettingsStore::load(&path).expect("load");

        store.update(|_| {}).expect("noop");
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_a_parse_error_and_degrades_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").expect("write");

        assert!(matches!(
            SettingsStore::load(&path),
            Err(SettingsError::Parse { .. })
        ));
        assert_eq!(
            SettingsStore::load_or_default(&path).settings(),
            ClientSettings::default()
        );
    }
}
