//! Binding model and evaluation
//!
//! - [`types`] - Command ids, bindings, profiles
//! - [`evaluator`] - Whether a binding is pressed in a trigger set
//! - [`differ`] - Activation/deactivation edges between ticks

pub mod differ;
pub mod error;
pub mod evaluator;
pub mod types;

pub use differ::{diff_sets, BindingDiffer, BindingTransition, BindingsChanged};
pub use error::BindingError;
pub use evaluator::{active_commands, is_active};
pub use types::{
    normalize_profile_name, BindingProfile, BindingSlot, CommandId, GameBinding,
    DEFAULT_PROFILE_VERSION, MAX_COMMAND_ID, MODIFIER_OFFSET, MODIFIER_THRESHOLD,
};
