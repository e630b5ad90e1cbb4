//! Command ids, bindings and profiles

use crate::input::Trigger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Distance between a command and its modifier alias
pub const MODIFIER_OFFSET: u16 = 100;

/// Ids at or above this address the modifier slot of `id - MODIFIER_OFFSET`
pub const MODIFIER_THRESHOLD: u16 = 200;

/// Highest usable id; `299` addresses the modifier slot of `199`
pub const MAX_COMMAND_ID: u16 = MODIFIER_THRESHOLD + MODIFIER_OFFSET - 1;

pub const DEFAULT_PROFILE_VERSION: &str = "1.0";

/// Logical command slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub u16);

/// Which trigger of a binding an id addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSlot {
    Primary,
    Modifier,
}

impl CommandId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub const fn is_modifier_alias(self) -> bool {
        self.0 >= MODIFIER_THRESHOLD
    }

    /// Ids above [`MAX_COMMAND_ID`] would resolve to another alias.
    pub const fn is_valid(self) -> bool {
        self.0 <= MAX_COMMAND_ID
    }

    /// Resolves an id to the command that owns it and the slot it addresses.
    ///
    /// `205` resolves to the modifier slot of `105`, `5` to the primary slot
    /// of `5`. `None` for ids above [`MAX_COMMAND_ID`].
    pub const fn slot(self) -> Option<(CommandId, BindingSlot)> {
        if !self.is_valid() {
            None
        } else if self.is_modifier_alias() {
            Some((CommandId(self.0 - MODIFIER_OFFSET), BindingSlot::Modifier))
        } else {
            Some((self, BindingSlot::Primary))
        }
    }

    /// The alias id addressing this command's modifier slot. Only commands
    /// in `100..200` have one.
    pub const fn modifier(self) -> Option<CommandId> {
        if self.0 >= MODIFIER_THRESHOLD - MODIFIER_OFFSET && self.0 < MODIFIER_THRESHOLD {
            Some(CommandId(self.0 + MODIFIER_OFFSET))
        } else {
            None
        }
    }
}

impl From<u16> for CommandId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A command and the triggers bound to it.
///
/// `is_active` is recomputed every tick and never persisted; it takes no
/// part in equality.
#[derive(Debug, Clone, Eq)]
pub struct GameBinding {
    pub command: CommandId,
    pub primary: Option<Trigger>,
    pub modifier: Option<Trigger>,
    pub is_active: bool,
}

impl GameBinding {
    pub fn new(command: CommandId) -> Self {
        Self {
            command,
            primary: None,
            modifier: None,
            is_active: false,
        }
    }

    pub fn with_primary(mut self, trigger: Trigger) -> Self {
        self.primary = Some(trigger);
        self
    }

    pub fn with_modifier(mut self, trigger: Trigger) -> Self {
        self.modifier = Some(trigger);
        self
    }

    pub fn slot_mut(&mut self, slot: BindingSlot) -> &mut Option<Trigger> {
        match slot {
            BindingSlot::Primary => &mut self.primary,
            BindingSlot::Modifier => &mut self.modifier,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.modifier.is_none()
    }
}

impl PartialEq for GameBinding {
    fn eq(&self, other: &Self) -> bool {
        self.command == other.command
            && self.primary == other.primary
            && self.modifier == other.modifier
    }
}

/// Named set of bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingProfile {
    pub name: String,
    pub version: String,
    pub bindings: BTreeMap<CommandId, GameBinding>,
}

/// Storage key form of a profile name: trimmed and lower-cased.
pub fn normalize_profile_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl BindingProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: DEFAULT_PROFILE_VERSION.to_string(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn normalized_name(&self) -> String {
        normalize_profile_name(&self.name)
    }

    /// Binding owning `id`; modifier aliases resolve to their base command.
    pub fn binding(&self, id: CommandId) -> Option<&GameBinding> {
        let (command, _) = id.slot()?;
        self.bindings.get(&command)
    }

    /// Writes `trigger` into the slot `id` addresses, creating the binding
    /// if needed. Returns the previous trigger in that slot. Out-of-range
    /// ids are ignored.
    pub fn assign(&mut self, id: CommandId, trigger: Trigger) -> Option<Trigger> {
        let (command, slot) = id.slot()?;
        self.bindings
            .entry(command)
            .or_insert_with(|| GameBinding::new(command))
            .slot_mut(slot)
            .replace(trigger)
    }

    /// Clears what `id` addresses.
    ///
    /// A command id removes its whole binding entry. A modifier alias only
    /// empties the modifier slot of its base command, and drops the entry if
    /// nothing is left. Returns whether anything changed.
    pub fn clear(&mut self, id: CommandId) -> bool {
        match id.slot() {
            None => false,
            Some((command, BindingSlot::Primary)) => self.bindings.remove(&command).is_some(),
            Some((command, BindingSlot::Modifier)) => {
                let Some(binding) = self.bindings.get_mut(&command) else {
                    return false;
                };
                let cleared = binding.modifier.take().is_some();
                if binding.is_empty() {
                    self.bindings.remove(&command);
                }
                cleared
            }
        }
    }

    pub fn active_bindings(&self) -> impl Iterator<Item = &GameBinding> {
        self.bindings.values().filter(|binding| binding.is_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{DeviceId, GamepadButtons};

    #[test]
    fn modifier_alias_resolves_to_base_command() {
        assert_eq!(
            CommandId(205).slot(),
            Some((CommandId(105), BindingSlot::Modifier))
        );
        assert_eq!(CommandId(5).slot(), Some((CommandId(5), BindingSlot::Primary)));
        assert_eq!(
            CommandId(199).slot(),
            Some((CommandId(199), BindingSlot::Primary))
        );
        assert_eq!(
            CommandId(299).slot(),
            Some((CommandId(199), BindingSlot::Modifier))
        );
        assert_eq!(CommandId(105).modifier(), Some(CommandId(205)));
        assert_eq!(CommandId(5).modifier(), None);
        assert_eq!(CommandId(205).modifier(), None);
    }

    #[test]
    fn assign_writes_modifier_alias_into_base_binding() {
        let mut profile = BindingProfile::new("Pilot");
        profile.assign(CommandId(205), Trigger::Keyboard(17));

        assert!(!profile.bindings.contains_key(&CommandId(205)));
        let binding = profile.bindings.get(&CommandId(105)).unwrap();
        assert_eq!(binding.modifier, Some(Trigger::Keyboard(17)));
        assert_eq!(binding.primary, None);
    }

    #[test]
    fn ids_past_the_alias_range_are_ignored() {
        assert!(!CommandId(300).is_valid());
        assert_eq!(CommandId(300).slot(), None);

        let mut profile = BindingProfile::new("Pilot");
        assert_eq!(profile.assign(CommandId(300), Trigger::Keyboard(1)), None);
        assert!(profile.bindings.is_empty());
        assert!(profile.binding(CommandId(300)).is_none());
        assert!(!profile.clear(CommandId(300)));
    }

    #[test]
    fn assign_primary_replaces_previous() {
        let mut profile = BindingProfile::new("Pilot");
        assert_eq!(profile.assign(CommandId(5), Trigger::Keyboard(1)), None);
        assert_eq!(
            profile.assign(CommandId(5), Trigger::GamepadButton(GamepadButtons::B)),
            Some(Trigger::Keyboard(1))
        );
    }

    #[test]
    fn clear_modifier_keeps_primary() {
        let mut profile = BindingProfile::new("Pilot");
        profile.assign(CommandId(105), Trigger::Keyboard(1));
        profile.assign(CommandId(205), Trigger::Keyboard(2));

        assert!(profile.clear(CommandId(205)));
        let binding = profile.binding(CommandId(105)).unwrap();
        assert_eq!(binding.primary, Some(Trigger::Keyboard(1)));
        assert_eq!(binding.modifier, None);

        assert!(profile.clear(CommandId(105)));
        assert!(profile.bindings.is_empty());
        assert!(!profile.clear(CommandId(105)));
    }

    #[test]
    fn equality_ignores_active_flag() {
        let trigger = Trigger::ControllerButton {
            device_id: DeviceId::new("stick"),
            button_index: 0,
        };
        let a = GameBinding::new(CommandId(1)).with_primary(trigger.clone());
        let mut b = GameBinding::new(CommandId(1)).with_primary(trigger);
        b.is_active = true;
        assert_eq!(a, b);
    }

    #[test]
    fn profile_names_normalize() {
        assert_eq!(normalize_profile_name("  Hornet PvP "), "hornet pvp");
        assert_eq!(BindingProfile::new("DEFAULT").normalized_name(), "default");
    }
}
