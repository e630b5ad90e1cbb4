//! Orchestration of polling, evaluation and capture
//!
//! - [`poll_loop`] - Typestate poll loop running in its own task
//! - [`capture`] - Capture guard and trigger wait
//! - [`binding_manager`] - Public operations tying it together
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────── BindingManager (foreground) ────────────┐
//!            │ set/clear/load ──► ProfileStore ──► RwLock<Profile> │
//!            │ capture ◄── watch<TriggerSet>                       │
//!            └─────────────────────────────────────────────────────┘
//!                         ▲                       │
//!                         │                       ▼
//! PollLoop task: InputAggregator ──► Evaluator/Differ ──► broadcast<BindingsChanged>
//! ```

pub mod binding_manager;
pub mod capture;
pub mod poll_loop;
pub mod state;

pub use binding_manager::BindingManager;
pub use capture::{CaptureEnd, CaptureGuard};
pub use poll_loop::{LoopStats, PollLoop};
pub use state::{ProfileState, SharedState};
