//! State shared between the poll loop and foreground callers

use crate::binding::{BindingDiffer, BindingProfile, BindingsChanged};
use crate::input::TriggerSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, watch, RwLock};
use tracing::debug;

/// Current profile and the differ tracking its active set.
///
/// Kept under one lock so a tick never evaluates a profile the differ has
/// not been reset for.
#[derive(Debug, Default)]
pub struct ProfileState {
    pub profile: Option<BindingProfile>,
    pub differ: BindingDiffer,
}

impl ProfileState {
    /// Installs a new profile and forgets the previous active set.
    pub fn replace(&mut self, profile: BindingProfile) {
        self.profile = Some(profile);
        self.differ.reset();
    }

    /// Installs an edited copy of the current profile. Active flags carry
    /// over per command, matching the differ, until the next tick
    /// re-evaluates them.
    pub fn apply_edit(&mut self, mut edited: BindingProfile) {
        if let Some(live) = &self.profile {
            for (command, binding) in edited.bindings.iter_mut() {
                binding.is_active = live
                    .bindings
                    .get(command)
                    .is_some_and(|live| live.is_active);
            }
        }
        self.profile = Some(edited);
    }

    /// Clears every active flag and the differ's memory.
    pub fn deactivate_all(&mut self) {
        if let Some(profile) = &mut self.profile {
            for binding in profile.bindings.values_mut() {
                binding.is_active = false;
            }
        }
        self.differ.reset();
    }
}

pub struct SharedState {
    pub profile: RwLock<ProfileState>,
    /// Set while a capture session owns the input
    pub capturing: AtomicBool,
    /// Cleared by the loop task when it exits, for whatever reason
    pub running: AtomicBool,
    pub triggers: watch::Sender<TriggerSet>,
    pub bindings_tx: broadcast::Sender<BindingsChanged>,
    pub profile_tx: broadcast::Sender<BindingProfile>,
}

impl SharedState {
    pub fn new(capacity: usize) -> Self {
        let (triggers, _) = watch::channel(TriggerSet::new());
        let (bindings_tx, _) = broadcast::channel(capacity);
        let (profile_tx, _) = broadcast::channel(capacity);
        Self {
            profile: RwLock::new(ProfileState::default()),
            capturing: AtomicBool::new(false),
            running: AtomicBool::new(false),
            triggers,
            bindings_tx,
            profile_tx,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn publish_bindings(&self, changed: BindingsChanged) {
        let count = changed.transitions.len();
        if self.bindings_tx.send(changed).is_err() {
            debug!("No subscribers for {} binding transitions, dropped", count);
        }
    }

    pub fn publish_profile(&self, profile: BindingProfile) {
        let name = profile.name.clone();
        if self.profile_tx.send(profile).is_err() {
            debug!("No subscribers for profile change to '{}'", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CommandId;
    use crate::input::Trigger;

    #[test]
    fn apply_edit_keeps_flags_per_command() {
        let mut live = BindingProfile::new("p");
        live.assign(CommandId(1), Trigger::Keyboard(1));
        live.assign(CommandId(2), Trigger::Keyboard(2));
        for binding in live.bindings.values_mut() {
            binding.is_active = true;
        }

        let mut state = ProfileState::default();
        state.replace(live.clone());

        let mut edited = live;
        edited.assign(CommandId(2), Trigger::Keyboard(9));
        edited.assign(CommandId(3), Trigger::Keyboard(3));
        state.apply_edit(edited);

        let profile = state.profile.as_ref().unwrap();
        assert!(profile.bindings[&CommandId(1)].is_active);
        assert!(profile.bindings[&CommandId(2)].is_active);
        assert!(!profile.bindings[&CommandId(3)].is_active);
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let shared = SharedState::new(4);
        shared.publish_bindings(BindingsChanged::new(Vec::new()));
        shared.publish_profile(BindingProfile::new("p"));

        let mut rx = shared.profile_tx.subscribe();
        shared.publish_profile(BindingProfile::new("q"));
        assert_eq!(rx.try_recv().unwrap().name, "q");
    }
}
