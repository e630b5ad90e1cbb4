//! Error definitions for binding operations

use super::types::CommandId;
use crate::input::DeviceError;
use crate::persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindingError {
    /// The operation needs a loaded profile
    #[error("No binding profile loaded")]
    NoProfileLoaded,

    /// Ids past the modifier alias range address no slot
    #[error("Command {0} is out of range")]
    InvalidCommand(CommandId),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// No input arrived within the capture window
    #[error("Capture for command {command} timed out after {timeout_ms}ms")]
    CaptureTimeout { command: CommandId, timeout_ms: u64 },

    #[error("Capture for command {0} was cancelled")]
    CaptureCancelled(CommandId),

    /// Only one capture may run at a time
    #[error("Another capture is already in progress")]
    CaptureInProgress,

    #[error("Poll loop is already running")]
    AlreadyRunning,

    #[error("Poll loop stopped on device error: {0}")]
    LoopFatal(#[from] DeviceError),

    #[error("Poll loop task failed: {0}")]
    LoopTask(String),
}

impl BindingError {
    /// Whether the error came from the capture window ending without input.
    pub fn is_capture_abort(&self) -> bool {
        matches!(
            self,
            BindingError::CaptureTimeout { .. } | BindingError::CaptureCancelled(_)
        )
    }
}
