//! Physical input identities
//!
//! A [`Trigger`] names exactly one physical input source. Keyboard, mouse and
//! gamepad triggers carry no device identity, so a binding keeps working when
//! an identical peripheral is swapped in. Controller triggers are scoped to a
//! [`DeviceId`]: button 3 on one stick never aliases button 3 on another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier of one physical controller as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Position of a hat switch. `Center` means released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwitchPosition {
    #[default]
    Center,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl SwitchPosition {
    pub fn is_center(self) -> bool {
        self == SwitchPosition::Center
    }

    /// Resolves a D-pad style cross into a switch position.
    pub fn from_directions(up: bool, down: bool, left: bool, right: bool) -> Self {
        // Opposing directions cancel out
        let vertical = match (up, down) {
            (true, false) => 1,
            (false, true) => -1,
            _ => 0,
        };
        let horizontal = match (left, right) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        };

        match (vertical, horizontal) {
            (1, 0) => SwitchPosition::Up,
            (1, 1) => SwitchPosition::UpRight,
            (0, 1) => SwitchPosition::Right,
            (-1, 1) => SwitchPosition::DownRight,
            (-1, 0) => SwitchPosition::Down,
            (-1, -1) => SwitchPosition::DownLeft,
            (0, -1) => SwitchPosition::Left,
            (1, -1) => SwitchPosition::UpLeft,
            _ => SwitchPosition::Center,
        }
    }
}

macro_rules! button_flags {
    ($(#[$meta:meta])* $name:ident { $($flag:ident = $value:expr => $label:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            $(pub const $flag: $name = $name($value);)+

            const KNOWN: &'static [($name, &'static str)] = &[$(($name::$flag, $label)),+];

            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub const fn contains(self, other: $name) -> bool {
                other.0 != 0 && self.0 & other.0 == other.0
            }

            /// Splits a bitmask into its known single-bit flags, lowest bit first.
            pub fn flags(self) -> impl Iterator<Item = $name> {
                Self::KNOWN
                    .iter()
                    .map(|(flag, _)| *flag)
                    .filter(move |flag| self.contains(*flag))
            }

            pub fn name(self) -> Option<&'static str> {
                Self::KNOWN
                    .iter()
                    .find(|(flag, _)| *flag == self)
                    .map(|(_, label)| *label)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(label) => f.write_str(label),
                    None => write!(f, "{:#x}", self.0),
                }
            }
        }
    };
}

button_flags!(
    /// Mouse button bitmask. A trigger always holds a single flag.
    MouseButtons {
        LEFT = 0x0001 => "Left",
        RIGHT = 0x0002 => "Right",
        MIDDLE = 0x0004 => "Middle",
        BUTTON4 = 0x0008 => "Button4",
        BUTTON5 = 0x0010 => "Button5",
    }
);

button_flags!(
    /// Standard gamepad button bitmask. A trigger always holds a single flag.
    GamepadButtons {
        MENU = 0x0001 => "Menu",
        VIEW = 0x0002 => "View",
        A = 0x0004 => "A",
        B = 0x0008 => "B",
        X = 0x0010 => "X",
        Y = 0x0020 => "Y",
        DPAD_UP = 0x0040 => "DPadUp",
        DPAD_DOWN = 0x0080 => "DPadDown",
        DPAD_LEFT = 0x0100 => "DPadLeft",
        DPAD_RIGHT = 0x0200 => "DPadRight",
        LEFT_SHOULDER = 0x0400 => "LeftShoulder",
        RIGHT_SHOULDER = 0x0800 => "RightShoulder",
        LEFT_THUMBSTICK = 0x1000 => "LeftThumbstick",
        RIGHT_THUMBSTICK = 0x2000 => "RightThumbstick",
    }
);

/// Kind tag of a trigger with its numeric wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TriggerKind {
    Keyboard = 10,
    MouseButton = 20,
    ControllerButton = 30,
    ControllerSwitch = 40,
    GamepadButton = 50,
}

impl TriggerKind {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            10 => Some(TriggerKind::Keyboard),
            20 => Some(TriggerKind::MouseButton),
            30 => Some(TriggerKind::ControllerButton),
            40 => Some(TriggerKind::ControllerSwitch),
            50 => Some(TriggerKind::GamepadButton),
            _ => None,
        }
    }
}

/// One identifiable physical input.
///
/// Equality and hashing are derived from the variant and its payload, which
/// gives the identity rules directly: only controller variants carry a
/// device id. The derived ordering (variant order first) is the fixed
/// evaluation order keyboard, mouse, controller, gamepad.
///
/// Serialized adjacently tagged:
///
/// ```json
/// {"kind": "keyboard", "payload": 65}
/// {"kind": "controllerButton", "payload": {"deviceId": "stick-1", "buttonIndex": 3}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum Trigger {
    /// Virtual key code
    Keyboard(u8),
    MouseButton(MouseButtons),
    #[serde(rename_all = "camelCase")]
    ControllerButton { device_id: DeviceId, button_index: u8 },
    #[serde(rename_all = "camelCase")]
    ControllerSwitch {
        device_id: DeviceId,
        switch_index: u8,
        position: SwitchPosition,
    },
    GamepadButton(GamepadButtons),
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Keyboard(_) => TriggerKind::Keyboard,
            Trigger::MouseButton(_) => TriggerKind::MouseButton,
            Trigger::ControllerButton { .. } => TriggerKind::ControllerButton,
            Trigger::ControllerSwitch { .. } => TriggerKind::ControllerSwitch,
            Trigger::GamepadButton(_) => TriggerKind::GamepadButton,
        }
    }

    /// The controller this trigger is scoped to, if any.
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Trigger::ControllerButton { device_id, .. }
            | Trigger::ControllerSwitch { device_id, .. } => Some(device_id),
            _ => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Keyboard(key) => write!(f, "Key {}", key),
            Trigger::MouseButton(button) => write!(f, "Mouse {}", button),
            Trigger::ControllerButton { button_index, .. } => write!(f, "Button {}", button_index),
            Trigger::ControllerSwitch {
                switch_index,
                position,
                ..
            } => write!(f, "Switch {} {:?}", switch_index, position),
            Trigger::GamepadButton(button) => write!(f, "Gamepad {}", button),
        }
    }
}

/// Triggers observed during one poll tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSet {
    triggers: BTreeSet<Trigger>,
}

impl TriggerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, trigger: Trigger) -> bool {
        self.triggers.insert(trigger)
    }

    pub fn contains(&self, trigger: &Trigger) -> bool {
        self.triggers.contains(trigger)
    }

    pub fn clear(&mut self) {
        self.triggers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// First trigger in evaluation order, used to break capture ties.
    pub fn first(&self) -> Option<&Trigger> {
        self.triggers.iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }
}

impl Extend<Trigger> for TriggerSet {
    fn extend<I: IntoIterator<Item = Trigger>>(&mut self, iter: I) {
        self.triggers.extend(iter);
    }
}

impl FromIterator<Trigger> for TriggerSet {
    fn from_iter<I: IntoIterator<Item = Trigger>>(iter: I) -> Self {
        Self {
            triggers: iter.into_iter().collect(),
        }
    }
}
