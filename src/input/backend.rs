//! Device backend contract
//!
//! The platform input layer hands out *readings*: immutable snapshots of a
//! device's state, each one an owned handle. Dropping a [`ReadingHandle`]
//! releases it back to the backend, so every code path that lets a handle
//! go out of scope releases it exactly once.

use super::trigger::{DeviceId, GamepadButtons, MouseButtons, SwitchPosition};
use std::fmt;

/// Where a reading comes from: the shared keyboard/mouse/gamepad class, or
/// one specific controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReadingSource {
    Shared,
    Controller(DeviceId),
}

impl fmt::Display for ReadingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingSource::Shared => f.write_str("keyboard/mouse/gamepad"),
            ReadingSource::Controller(id) => write!(f, "controller {}", id),
        }
    }
}

/// One hardware snapshot.
///
/// Accessors a source doesn't provide default to "nothing pressed"; the
/// shared class reports keys, mouse and gamepad flags, a controller reports
/// buttons and switches.
pub trait Reading: Send {
    /// Backend timestamp. Two readings with the same timestamp for the same
    /// source are the same snapshot.
    fn timestamp(&self) -> u64;

    /// Virtual key codes currently held down
    fn pressed_keys(&self) -> Vec<u8> {
        Vec::new()
    }

    fn mouse_buttons(&self) -> MouseButtons {
        MouseButtons::default()
    }

    /// Pressed state per controller button index
    fn controller_buttons(&self) -> Vec<bool> {
        Vec::new()
    }

    /// Position per controller switch index
    fn controller_switches(&self) -> Vec<SwitchPosition> {
        Vec::new()
    }

    fn gamepad_buttons(&self) -> GamepadButtons {
        GamepadButtons::default()
    }
}

/// Owned reading. Released on drop.
pub type ReadingHandle = Box<dyn Reading>;

/// Errors raised by an input backend
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// A single device or class could not be read this tick
    #[error("Failed to read {device}: {reason}")]
    ReadFailed { device: String, reason: String },

    /// The held reading fell out of the backend's history
    #[error("Reading for {0} is no longer available")]
    ReadingExpired(String),

    #[error("Failed to enumerate controllers: {0}")]
    EnumerationFailed(String),

    /// The whole input subsystem is gone; polling cannot continue
    #[error("Input backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend panicked during a poll
    #[error("Input backend panicked: {0}")]
    BackendPanicked(String),
}

impl DeviceError {
    pub fn read_failed(source: &ReadingSource, reason: impl Into<String>) -> Self {
        DeviceError::ReadFailed {
            device: source.to_string(),
            reason: reason.into(),
        }
    }

    /// Fatal errors end the poll loop; everything else only costs one
    /// source's contribution for one tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeviceError::BackendUnavailable(_) | DeviceError::BackendPanicked(_)
        )
    }
}

/// Platform input layer consumed by the poll loop.
///
/// Implementations are driven from the poll loop only and must never block
/// for longer than a read.
pub trait InputBackend: Send {
    fn name(&self) -> &str;

    /// Controllers currently attached. Called once per tick.
    fn enumerate_controllers(&mut self) -> Result<Vec<DeviceId>, DeviceError>;

    /// Latest snapshot for `source`, or `None` if the source has none.
    fn current_reading(
        &mut self,
        source: &ReadingSource,
    ) -> Result<Option<ReadingHandle>, DeviceError>;

    /// The snapshot strictly after `after`, or `None` if nothing newer exists.
    fn next_reading(
        &mut self,
        after: &dyn Reading,
        source: &ReadingSource,
    ) -> Result<Option<ReadingHandle>, DeviceError>;
}
