//! Input binding manager
//!
//! Binds physical inputs (keyboard keys, mouse buttons, controller buttons
//! and switches, gamepad buttons) to logical commands, polls the devices at
//! a fixed rate and reports commands becoming active or inactive.

pub mod binding;
pub mod config;
pub mod input;
pub mod manager;
pub mod persistence;

pub use binding::{
    BindingError, BindingProfile, BindingTransition, BindingsChanged, CommandId, GameBinding,
};
pub use config::Settings;
pub use input::{DeviceId, InputBackend, Trigger, TriggerSet};
pub use manager::BindingManager;
pub use persistence::{PersistenceError, ProfileStore};
