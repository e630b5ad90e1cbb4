//! Edge detection between consecutive ticks
//!
//! The differ remembers which bindings were active last tick. Comparing that
//! against this tick's active set yields the transitions a subscriber sees.
//! Active sets are keyed by command alone: a command that stays active while
//! its triggers are edited produces no transition.

use super::evaluator::is_active;
use super::types::{BindingProfile, CommandId, GameBinding};
use crate::input::TriggerSet;
use chrono::{DateTime, Local};
use std::collections::{BTreeMap, BTreeSet};

/// One binding changing its active state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTransition {
    pub binding: GameBinding,
    pub active: bool,
}

/// Batch of transitions produced by a single tick.
#[derive(Debug, Clone)]
pub struct BindingsChanged {
    pub timestamp: DateTime<Local>,
    pub transitions: Vec<BindingTransition>,
}

impl BindingsChanged {
    pub fn new(transitions: Vec<BindingTransition>) -> Self {
        Self {
            timestamp: Local::now(),
            transitions,
        }
    }

    pub fn activated(&self) -> impl Iterator<Item = &GameBinding> {
        self.transitions
            .iter()
            .filter(|t| t.active)
            .map(|t| &t.binding)
    }

    pub fn deactivated(&self) -> impl Iterator<Item = &GameBinding> {
        self.transitions
            .iter()
            .filter(|t| !t.active)
            .map(|t| &t.binding)
    }
}

/// Set difference of two active sets by command: `(added, removed)`.
pub fn diff_sets(
    previous: &BTreeSet<CommandId>,
    current: &BTreeSet<CommandId>,
) -> (Vec<CommandId>, Vec<CommandId>) {
    let added = current.difference(previous).copied().collect();
    let removed = previous.difference(current).copied().collect();
    (added, removed)
}

#[derive(Debug, Default)]
pub struct BindingDiffer {
    /// Bindings active last tick, as they were when last seen active
    previous: BTreeMap<CommandId, GameBinding>,
}

impl BindingDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates `profile` against `triggers`, updates every binding's
    /// `is_active` and returns the transitions since the previous call.
    ///
    /// Removals come first, then activations, each in command order.
    pub fn diff(
        &mut self,
        profile: &mut BindingProfile,
        triggers: &TriggerSet,
    ) -> Vec<BindingTransition> {
        let mut current = BTreeMap::new();
        for binding in profile.bindings.values_mut() {
            binding.is_active = is_active(binding, triggers);
            if binding.is_active {
                current.insert(binding.command, binding.clone());
            }
        }

        let (added, removed) = diff_sets(
            &self.previous.keys().copied().collect(),
            &current.keys().copied().collect(),
        );

        let mut transitions = Vec::with_capacity(added.len() + removed.len());
        for command in removed {
            // Prefer the binding as it stands now; a cleared one is only
            // known from last tick
            let mut binding = match profile.bindings.get(&command) {
                Some(binding) => binding.clone(),
                None => match self.previous.get(&command) {
                    Some(binding) => binding.clone(),
                    None => continue,
                },
            };
            binding.is_active = false;
            transitions.push(BindingTransition {
                binding,
                active: false,
            });
        }
        for command in added {
            if let Some(binding) = current.get(&command) {
                transitions.push(BindingTransition {
                    binding: binding.clone(),
                    active: true,
                });
            }
        }

        self.previous = current;
        transitions
    }

    /// Forgets the previous active set, e.g. after a profile switch.
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    pub fn previous_len(&self) -> usize {
        self.previous.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Trigger;

    fn binding(id: u16, key: u8) -> GameBinding {
        GameBinding::new(CommandId(id)).with_primary(Trigger::Keyboard(key))
    }

    fn set_of(ids: &[u16]) -> BTreeSet<CommandId> {
        ids.iter().copied().map(CommandId).collect()
    }

    fn keys(keys: &[u8]) -> TriggerSet {
        keys.iter().copied().map(Trigger::Keyboard).collect()
    }

    #[test]
    fn diff_sets_reports_added() {
        let (added, removed) = diff_sets(&set_of(&[1]), &set_of(&[1, 2]));
        assert_eq!(added, vec![CommandId(2)]);
        assert!(removed.is_empty());
    }

    #[test]
    fn diff_sets_reports_removed() {
        let (added, removed) = diff_sets(&set_of(&[1, 2]), &set_of(&[]));
        assert!(added.is_empty());
        assert_eq!(removed, vec![CommandId(1), CommandId(2)]);
    }

    #[test]
    fn differ_emits_edges_only() {
        let mut profile = BindingProfile::new("p");
        profile.assign(CommandId(1), Trigger::Keyboard(65));
        let mut differ = BindingDiffer::new();

        let transitions = differ.diff(&mut profile, &keys(&[65]));
        assert_eq!(transitions.len(), 1);
        assert!(transitions[0].active);
        assert!(profile.bindings[&CommandId(1)].is_active);

        // Held: no new edge
        assert!(differ.diff(&mut profile, &keys(&[65])).is_empty());

        let transitions = differ.diff(&mut profile, &keys(&[]));
        assert_eq!(transitions.len(), 1);
        assert!(!transitions[0].active);
        assert!(!transitions[0].binding.is_active);
        assert!(!profile.bindings[&CommandId(1)].is_active);
    }

    #[test]
    fn removals_precede_activations() {
        let mut profile = BindingProfile::new("p");
        profile.assign(CommandId(1), Trigger::Keyboard(1));
        profile.assign(CommandId(2), Trigger::Keyboard(2));
        let mut differ = BindingDiffer::new();
        differ.diff(&mut profile, &keys(&[2]));

        let transitions = differ.diff(&mut profile, &keys(&[1]));
        let order: Vec<_> = transitions
            .iter()
            .map(|t| (t.binding.command.value(), t.active))
            .collect();
        assert_eq!(order, vec![(2, false), (1, true)]);
    }

    #[test]
    fn rebinding_while_held_is_not_an_edge() {
        let mut profile = BindingProfile::new("p");
        profile.assign(CommandId(1), Trigger::Keyboard(1));
        let mut differ = BindingDiffer::new();
        assert_eq!(differ.diff(&mut profile, &keys(&[1, 2])).len(), 1);

        profile.assign(CommandId(1), Trigger::Keyboard(2));
        assert!(differ.diff(&mut profile, &keys(&[1, 2])).is_empty());
        assert!(profile.bindings[&CommandId(1)].is_active);

        // Releasing the new trigger reports the binding as it is now
        let transitions = differ.diff(&mut profile, &keys(&[1]));
        assert_eq!(transitions.len(), 1);
        assert!(!transitions[0].active);
        assert_eq!(transitions[0].binding.primary, Some(Trigger::Keyboard(2)));
    }

    #[test]
    fn rebinding_to_unheld_trigger_releases() {
        let mut profile = BindingProfile::new("p");
        profile.assign(CommandId(1), Trigger::Keyboard(1));
        let mut differ = BindingDiffer::new();
        differ.diff(&mut profile, &keys(&[1]));

        profile.assign(CommandId(1), Trigger::Keyboard(9));
        let transitions = differ.diff(&mut profile, &keys(&[1]));
        assert_eq!(transitions.len(), 1);
        assert!(!transitions[0].active);
        assert_eq!(transitions[0].binding.primary, Some(Trigger::Keyboard(9)));
    }

    #[test]
    fn clearing_held_binding_releases_last_known_binding() {
        let mut profile = BindingProfile::new("p");
        profile.assign(CommandId(3), Trigger::Keyboard(3));
        let mut differ = BindingDiffer::new();
        differ.diff(&mut profile, &keys(&[3]));

        profile.clear(CommandId(3));
        let transitions = differ.diff(&mut profile, &keys(&[3]));
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].binding.primary, Some(Trigger::Keyboard(3)));
        assert!(!transitions[0].binding.is_active);
    }

    #[test]
    fn reset_replays_held_bindings() {
        let mut profile = BindingProfile::new("p");
        profile.assign(CommandId(7), Trigger::Keyboard(7));
        let mut differ = BindingDiffer::new();
        differ.diff(&mut profile, &keys(&[7]));
        assert_eq!(differ.previous_len(), 1);

        differ.reset();
        assert_eq!(differ.previous_len(), 0);
        let transitions = differ.diff(&mut profile, &keys(&[7]));
        assert_eq!(transitions.len(), 1);
        assert!(transitions[0].active);
    }

    #[test]
    fn changed_batch_splits_by_direction() {
        let batch = BindingsChanged::new(vec![
            BindingTransition {
                binding: binding(1, 1),
                active: false,
            },
            BindingTransition {
                binding: binding(2, 2),
                active: true,
            },
        ]);
        assert_eq!(batch.activated().count(), 1);
        assert_eq!(batch.deactivated().next().map(|b| b.command), Some(CommandId(1)));
    }
}
