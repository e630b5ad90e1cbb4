//! Input subsystem for physical device polling
//!
//! Implements the per-tick collection pipeline:
//!
//! 1. [`backend`] - Platform contract: readings, sources, device errors
//! 2. [`cursor`] - Per-source cursors that drain buffered readings
//! 3. [`aggregator`] - Unions every source into one trigger set per tick
//!
//! # Architecture
//!
//! ```text
//! InputBackend ──► ReadingCursor (shared + per controller) ──► TriggerSet
//!  (gilrs/scripted)     (drain since last poll)                (this tick)
//! ```

pub mod aggregator;
pub mod backend;
pub mod cursor;
pub mod gilrs_backend;
pub mod scripted;
pub mod trigger;

pub use aggregator::InputAggregator;
pub use backend::{DeviceError, InputBackend, Reading, ReadingHandle, ReadingSource};
pub use cursor::{CursorTable, ReadingCursor};
pub use gilrs_backend::GilrsBackend;
pub use scripted::{ScriptedBackend, ScriptedFrame, ScriptedInput};
pub use trigger::{
    DeviceId, GamepadButtons, MouseButtons, SwitchPosition, Trigger, TriggerKind, TriggerSet,
};
