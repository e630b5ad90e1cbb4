//! # Persistence Module
//!
//! Stores binding profiles on disk, one JSON document per profile, addressed
//! by the normalized profile name. Profiles round-trip exactly: name, version
//! and every trigger encoding survive a save/load cycle.
//!
//! ## Error Handling Strategy
//! Every store operation returns a [`PersistenceError`] instead of panicking
//! and logs the failure where it happens. A failed load never yields a
//! partial profile; a failed save never leaves a half-written file behind.

pub mod document;
pub mod profile_store;

pub use document::{BindingEntry, ProfileDocument};
pub use profile_store::{profile_file_name, ProfileStore, PROFILE_FILE_EXTENSION, PROFILE_FILE_PREFIX};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Profile name is empty")]
    EmptyName,

    /// Names become file names, so separators are rejected
    #[error("Invalid profile name: {0}")]
    InvalidName(String),

    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Profile already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize profile {name}: {source}")]
    Serialize {
        name: String,
        source: serde_json::Error,
    },

    #[error("Failed to parse profile file {path}: {source}")]
    Deserialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The file parsed but does not describe a usable profile
    #[error("Profile file {0} holds no usable profile")]
    Unusable(PathBuf),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }
}
