//! Binding evaluation
//!
//! Pure functions of a binding and one tick's trigger set.

use super::types::{BindingProfile, CommandId};
use super::GameBinding;
use crate::input::TriggerSet;
use std::collections::BTreeSet;

/// Whether every trigger configured on `binding` is present in `triggers`.
///
/// Unbound commands are never active. With a modifier both triggers must be
/// in the same tick's set.
pub fn is_active(binding: &GameBinding, triggers: &TriggerSet) -> bool {
    let Some(primary) = &binding.primary else {
        return false;
    };

    let pressed = triggers.contains(primary);

    match &binding.modifier {
        None => pressed,
        Some(modifier) => pressed && triggers.contains(modifier),
    }
}

/// Commands of `profile` whose bindings are active for `triggers`.
pub fn active_commands(profile: &BindingProfile, triggers: &TriggerSet) -> BTreeSet<CommandId> {
    profile
        .bindings
        .values()
        // Only configured bindings take part
        .filter(|binding| binding.primary.is_some())
        .filter(|binding| is_active(binding, triggers))
        .map(|binding| binding.command)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MouseButtons, Trigger};

    fn set(triggers: &[Trigger]) -> TriggerSet {
        triggers.iter().cloned().collect()
    }

    #[test]
    fn unbound_is_never_active() {
        let binding = GameBinding::new(CommandId(1)).with_modifier(Trigger::Keyboard(1));
        assert!(!is_active(&binding, &set(&[Trigger::Keyboard(1)])));
    }

    #[test]
    fn primary_only_needs_primary() {
        let binding = GameBinding::new(CommandId(1)).with_primary(Trigger::Keyboard(65));
        assert!(is_active(&binding, &set(&[Trigger::Keyboard(65)])));
        assert!(is_active(
            &binding,
            &set(&[Trigger::Keyboard(65), Trigger::Keyboard(66)])
        ));
        assert!(!is_active(&binding, &set(&[Trigger::Keyboard(66)])));
    }

    #[test]
    fn modifier_requires_both() {
        let binding = GameBinding::new(CommandId(1))
            .with_primary(Trigger::Keyboard(65))
            .with_modifier(Trigger::Keyboard(66));

        assert!(is_active(
            &binding,
            &set(&[Trigger::Keyboard(65), Trigger::Keyboard(66)])
        ));
        assert!(!is_active(&binding, &set(&[Trigger::Keyboard(65)])));
        assert!(!is_active(&binding, &set(&[Trigger::Keyboard(66)])));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let binding = GameBinding::new(CommandId(3))
            .with_primary(Trigger::MouseButton(MouseButtons::MIDDLE));
        let triggers = set(&[Trigger::MouseButton(MouseButtons::MIDDLE)]);
        let first = is_active(&binding, &triggers);
        for _ in 0..10 {
            assert_eq!(is_active(&binding, &triggers), first);
        }
    }

    #[test]
    fn active_commands_skips_unconfigured() {
        let mut profile = BindingProfile::new("p");
        profile.assign(CommandId(1), Trigger::Keyboard(1));
        profile.assign(CommandId(202), Trigger::Keyboard(1));
        profile.assign(CommandId(3), Trigger::Keyboard(3));

        let active = active_commands(&profile, &set(&[Trigger::Keyboard(1)]));
        assert_eq!(active.into_iter().collect::<Vec<_>>(), vec![CommandId(1)]);
    }
}
