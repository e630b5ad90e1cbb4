//! Profile Store - binding profiles as JSON files
//!
//! Each profile lives in `bindings-<name>.json` inside the store directory,
//! where `<name>` is the trimmed, lower-cased profile name. Writes go to a
//! `.tmp` sibling first and are renamed over the target, so a crash mid-write
//! leaves the previous version intact.

use super::document::ProfileDocument;
use super::PersistenceError;
use crate::binding::{normalize_profile_name, BindingProfile};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const PROFILE_FILE_PREFIX: &str = "bindings-";
pub const PROFILE_FILE_EXTENSION: &str = "json";

/// Storage key for `name`, validated for use as a file name.
fn storage_key(name: &str) -> Result<String, PersistenceError> {
    let key = normalize_profile_name(name);
    if key.is_empty() {
        return Err(PersistenceError::EmptyName);
    }
    if key.contains(['/', '\\']) || key == "." || key == ".." {
        return Err(PersistenceError::InvalidName(name.to_string()));
    }
    Ok(key)
}

/// File name a profile called `name` is stored under.
pub fn profile_file_name(name: &str) -> Result<String, PersistenceError> {
    let key = storage_key(name)?;
    Ok(format!(
        "{}{}.{}",
        PROFILE_FILE_PREFIX, key, PROFILE_FILE_EXTENSION
    ))
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, PersistenceError> {
        Ok(self.dir.join(profile_file_name(name)?))
    }

    /// Serializes `profile` and atomically replaces its file.
    pub async fn save(&self, profile: &BindingProfile) -> Result<PathBuf, PersistenceError> {
        let path = match self.path_for(&profile.name) {
            Ok(path) => path,
            Err(e) => {
                error!("Refusing to save profile '{}': {}", profile.name, e);
                return Err(e);
            }
        };

        let result = self.write_document(profile, &path).await;
        match &result {
            Ok(()) => info!(
                "Profile '{}' saved with {} bindings to {}",
                profile.name,
                profile.bindings.len(),
                path.display()
            ),
            Err(e) => error!("Failed to save profile '{}': {}", profile.name, e),
        }
        result.map(|_| path)
    }

    async fn write_document(
        &self,
        profile: &BindingProfile,
        path: &Path,
    ) -> Result<(), PersistenceError> {
        if !tokio::fs::try_exists(&self.dir)
            .await
            .map_err(|e| PersistenceError::io(&self.dir, e))?
        {
            debug!("Creating profile directory {}", self.dir.display());
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| PersistenceError::io(&self.dir, e))?;
        }

        let content = serde_json::to_vec_pretty(&ProfileDocument::from(profile)).map_err(
            |source| PersistenceError::Serialize {
                name: profile.name.clone(),
                source,
            },
        )?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| PersistenceError::io(&temp_path, e))?;

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                warn!(
                    "Failed to remove temp file {}: {}",
                    temp_path.display(),
                    cleanup
                );
            }
            return Err(PersistenceError::io(path, e));
        }

        Ok(())
    }

    /// Reads the profile stored under `name`.
    pub async fn load(&self, name: &str) -> Result<BindingProfile, PersistenceError> {
        let result = self.read_document(name).await;
        match &result {
            Ok(profile) => info!(
                "Profile '{}' loaded with {} bindings",
                profile.name,
                profile.bindings.len()
            ),
            Err(e) => error!("Failed to load profile '{}': {}", name, e),
        }
        result
    }

    async fn read_document(&self, name: &str) -> Result<BindingProfile, PersistenceError> {
        let path = self.path_for(name)?;

        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| PersistenceError::io(&path, e))?
        {
            return Err(PersistenceError::NotFound(normalize_profile_name(name)));
        }

        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| PersistenceError::io(&path, e))?;

        let document: ProfileDocument =
            serde_json::from_slice(&content).map_err(|source| PersistenceError::Deserialize {
                path: path.clone(),
                source,
            })?;

        document
            .into_profile()
            .ok_or(PersistenceError::Unusable(path))
    }

    pub async fn exists(&self, name: &str) -> bool {
        let Ok(path) = self.path_for(name) else {
            return false;
        };
        tokio::fs::try_exists(&path).await.unwrap_or(false)
    }

    /// Storage keys of every profile in the directory, sorted.
    pub async fn list(&self) -> Result<Vec<String>, PersistenceError> {
        if !tokio::fs::try_exists(&self.dir)
            .await
            .map_err(|e| PersistenceError::io(&self.dir, e))?
        {
            debug!("Profile directory does not exist, no profiles available");
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| PersistenceError::io(&self.dir, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PersistenceError::io(&self.dir, e))?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let key = file_name
                .strip_prefix(PROFILE_FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(PROFILE_FILE_EXTENSION))
                .and_then(|rest| rest.strip_suffix('.'));
            if let Some(key) = key.filter(|key| !key.is_empty()) {
                names.push(key.to_string());
            }
        }

        names.sort();
        debug!("Found {} profiles in {}", names.len(), self.dir.display());
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CommandId;
    use crate::input::{DeviceId, GamepadButtons, MouseButtons, SwitchPosition, Trigger};
    use tempfile::TempDir;

    fn sample_profile() -> BindingProfile {
        let mut profile = BindingProfile::new("Hornet PvP");
        profile.version = "2.3".to_string();
        profile.assign(CommandId(1), Trigger::Keyboard(65));
        profile.assign(CommandId(201), Trigger::Keyboard(16));
        profile.assign(CommandId(2), Trigger::MouseButton(MouseButtons::BUTTON4));
        profile.assign(
            CommandId(3),
            Trigger::ControllerButton {
                device_id: DeviceId::new("0300c0ff-2"),
                button_index: 11,
            },
        );
        profile.assign(
            CommandId(4),
            Trigger::ControllerSwitch {
                device_id: DeviceId::new("0300c0ff-2"),
                switch_index: 0,
                position: SwitchPosition::DownLeft,
            },
        );
        profile.assign(CommandId(104), Trigger::GamepadButton(GamepadButtons::RIGHT_SHOULDER));
        profile
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());
        let profile = sample_profile();

        let path = store.save(&profile).await.unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("bindings-hornet pvp.json")
        );

        let loaded = store.load(&profile.name).await.unwrap();
        assert_eq!(loaded, profile);
        assert_eq!(loaded.name, "Hornet PvP");
        assert_eq!(loaded.version, "2.3");
    }

    #[tokio::test]
    async fn names_are_normalized_for_lookup() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());
        store.save(&BindingProfile::new("Default")).await.unwrap();

        assert!(store.exists("  DEFAULT ").await);
        assert!(store.load("default").await.is_ok());
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());

        let err = store.save(&BindingProfile::new("   ")).await.unwrap_err();
        assert!(matches!(err, PersistenceError::EmptyName));
        let err = store.load("").await.unwrap_err();
        assert!(matches!(err, PersistenceError::EmptyName));
        assert!(matches!(
            store.load("../escape").await.unwrap_err(),
            PersistenceError::InvalidName(_)
        ));
    }

    #[tokio::test]
    async fn missing_and_malformed_files_fail() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());

        assert!(matches!(
            store.load("ghost").await.unwrap_err(),
            PersistenceError::NotFound(_)
        ));

        std::fs::write(dir.path().join("bindings-broken.json"), b"{ not json").unwrap();
        assert!(matches!(
            store.load("broken").await.unwrap_err(),
            PersistenceError::Deserialize { .. }
        ));

        std::fs::write(
            dir.path().join("bindings-nameless.json"),
            br#"{"profileName": "", "bindings": {}}"#,
        )
        .unwrap();
        assert!(matches!(
            store.load("nameless").await.unwrap_err(),
            PersistenceError::Unusable(_)
        ));
    }

    #[tokio::test]
    async fn save_creates_directory_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("profiles");
        let store = ProfileStore::new(&nested);

        store.save(&sample_profile()).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(&nested)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files, vec!["bindings-hornet pvp.json".to_string()]);
    }

    #[tokio::test]
    async fn list_returns_sorted_storage_keys() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());
        assert!(store.list().await.unwrap().is_empty());

        store.save(&BindingProfile::new("Zulu")).await.unwrap();
        store.save(&BindingProfile::new("alpha")).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["alpha", "zulu"]);
    }

    #[tokio::test]
    async fn list_on_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path().join("absent"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.exists("anything").await);
    }
}
