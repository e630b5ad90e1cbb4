use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const APP_DIR: &str = "bindkit";
const PROFILE_DIR: &str = "profiles";

/// Runtime settings, read from a TOML file. Every field has a default.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Poll loop tick length
    pub poll_interval_ms: u64,
    /// How often a capture session looks at the trigger set
    pub capture_poll_interval_ms: u64,
    pub capture_timeout_ms: u64,
    pub profile_dir: PathBuf,
    /// Profile loaded on startup
    pub default_profile: String,
    /// Buffer size of the notification channels
    pub notification_capacity: usize,
    /// Window for loop throughput logging; 0 disables it
    pub stats_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 20,
            capture_poll_interval_ms: 10,
            capture_timeout_ms: 3000,
            profile_dir: default_profile_dir(),
            default_profile: "default".to_string(),
            notification_capacity: 64,
            stats_interval_secs: 10,
        }
    }
}

impl Settings {
    /// Reads settings from `path`. A missing file gives the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Settings file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read settings file {}: {}", path.display(), e))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse settings file {}: {}", path.display(), e))?;

        info!("Settings loaded from {}", path.display());
        debug!("{:?}", settings);
        Ok(settings.sanitized())
    }

    /// Clamps values that would stall the loop or the channels.
    fn sanitized(mut self) -> Self {
        if self.poll_interval_ms == 0 {
            warn!("poll_interval_ms of 0 is not allowed, using 1");
            self.poll_interval_ms = 1;
        }
        if self.capture_poll_interval_ms == 0 {
            warn!("capture_poll_interval_ms of 0 is not allowed, using 1");
            self.capture_poll_interval_ms = 1;
        }
        if self.notification_capacity == 0 {
            warn!("notification_capacity of 0 is not allowed, using 1");
            self.notification_capacity = 1;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn capture_poll_interval(&self) -> Duration {
        Duration::from_millis(self.capture_poll_interval_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

/// `<config dir>/bindkit/profiles`, falling back to the working directory.
pub fn default_profile_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| {
        warn!("Could not determine config directory, using current directory");
        PathBuf::from(".")
    });
    path.push(APP_DIR);
    path.push(PROFILE_DIR);
    path
}

/// Default location of the settings file.
pub fn default_settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push("settings.toml");
    path
}
