//! gilrs input backend
//!
//! gilrs is event based, so this backend turns its event stream into
//! readings: every button or connection event snapshots the affected pad
//! and the shared gamepad class into a short per-source history. The poll
//! loop then walks that history through its cursors like any other backend.
//!
//! Each connected pad is a controller (button indices follow [`BUTTON_ORDER`],
//! the D-pad is switch 0) and also feeds standard gamepad flags into the
//! shared class. gilrs has no keyboard or mouse support, so those stay empty.

use super::backend::{DeviceError, InputBackend, Reading, ReadingHandle, ReadingSource};
use super::trigger::{DeviceId, GamepadButtons, SwitchPosition};
use gilrs::{Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, error, info, warn};

/// Readings kept per source before the oldest are evicted
const HISTORY_LIMIT: usize = 64;

/// Controller button index order
pub const BUTTON_ORDER: [Button; 15] = [
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::C,
    Button::Z,
    Button::LeftTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
];

const GAMEPAD_FLAGS: [(Button, GamepadButtons); 14] = [
    (Button::Start, GamepadButtons::MENU),
    (Button::Select, GamepadButtons::VIEW),
    (Button::South, GamepadButtons::A),
    (Button::East, GamepadButtons::B),
    (Button::West, GamepadButtons::X),
    (Button::North, GamepadButtons::Y),
    (Button::DPadUp, GamepadButtons::DPAD_UP),
    (Button::DPadDown, GamepadButtons::DPAD_DOWN),
    (Button::DPadLeft, GamepadButtons::DPAD_LEFT),
    (Button::DPadRight, GamepadButtons::DPAD_RIGHT),
    (Button::LeftTrigger, GamepadButtons::LEFT_SHOULDER),
    (Button::RightTrigger, GamepadButtons::RIGHT_SHOULDER),
    (Button::LeftThumb, GamepadButtons::LEFT_THUMBSTICK),
    (Button::RightThumb, GamepadButtons::RIGHT_THUMBSTICK),
];

#[derive(Debug, Clone, Default)]
struct PadSnapshot {
    timestamp: u64,
    buttons: Vec<bool>,
    switches: Vec<SwitchPosition>,
    gamepad: GamepadButtons,
}

impl Reading for PadSnapshot {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn controller_buttons(&self) -> Vec<bool> {
        self.buttons.clone()
    }

    fn controller_switches(&self) -> Vec<SwitchPosition> {
        self.switches.clone()
    }

    fn gamepad_buttons(&self) -> GamepadButtons {
        self.gamepad
    }
}

#[derive(Default)]
struct History {
    readings: VecDeque<PadSnapshot>,
    /// Newest timestamp that has been evicted
    evicted_through: u64,
}

impl History {
    fn push(&mut self, snapshot: PadSnapshot) {
        self.readings.push_back(snapshot);
        while self.readings.len() > HISTORY_LIMIT {
            if let Some(old) = self.readings.pop_front() {
                self.evicted_through = old.timestamp;
            }
        }
    }
}

/// Stable id for a pad: model uuid plus gilrs slot.
pub fn device_id_for(id: GamepadId, gamepad: &Gamepad<'_>) -> DeviceId {
    let uuid: String = gamepad.uuid().iter().map(|b| format!("{:02x}", b)).collect();
    DeviceId::new(format!("{}-{}", uuid, usize::from(id)))
}

pub struct GilrsBackend {
    gilrs: Gilrs,
    clock: u64,
    devices: HashMap<DeviceId, GamepadId>,
    history: HashMap<ReadingSource, History>,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, DeviceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::BackendUnavailable(e.to_string()));
            }
        };

        let mut backend = Self {
            gilrs,
            clock: 0,
            devices: HashMap::new(),
            history: HashMap::new(),
        };
        backend.refresh_devices();
        info!("Found {} gamepads", backend.devices.len());
        for (device_id, id) in &backend.devices {
            if let Some(gamepad) = backend.gilrs.connected_gamepad(*id) {
                info!("  ID: {}, Name: {}", device_id, gamepad.name());
            }
        }
        Ok(backend)
    }

    fn refresh_devices(&mut self) {
        self.devices = self
            .gilrs
            .gamepads()
            .map(|(id, gamepad)| (device_id_for(id, &gamepad), id))
            .collect();
        let devices = &self.devices;
        self.history.retain(|source, _| match source {
            ReadingSource::Shared => true,
            ReadingSource::Controller(device_id) => devices.contains_key(device_id),
        });
    }

    fn next_timestamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn snapshot_pad(&self, id: GamepadId, timestamp: u64) -> Option<PadSnapshot> {
        let gamepad = self.gilrs.connected_gamepad(id)?;
        Some(PadSnapshot {
            timestamp,
            buttons: BUTTON_ORDER.iter().map(|b| gamepad.is_pressed(*b)).collect(),
            switches: vec![SwitchPosition::from_directions(
                gamepad.is_pressed(Button::DPadUp),
                gamepad.is_pressed(Button::DPadDown),
                gamepad.is_pressed(Button::DPadLeft),
                gamepad.is_pressed(Button::DPadRight),
            )],
            gamepad: GamepadButtons::default(),
        })
    }

    fn snapshot_shared(&self, timestamp: u64) -> PadSnapshot {
        let mut flags = GamepadButtons::default();
        for (_, gamepad) in self.gilrs.gamepads() {
            for (button, flag) in GAMEPAD_FLAGS {
                if gamepad.is_pressed(button) {
                    flags |= flag;
                }
            }
        }
        PadSnapshot {
            timestamp,
            gamepad: flags,
            ..PadSnapshot::default()
        }
    }

    fn record(&mut self, id: GamepadId) {
        let timestamp = self.next_timestamp();
        let target = self
            .devices
            .iter()
            .find(|(_, gid)| **gid == id)
            .map(|(device_id, gid)| (device_id.clone(), *gid));

        if let Some((device_id, gid)) = target {
            if let Some(snapshot) = self.snapshot_pad(gid, timestamp) {
                self.history
                    .entry(ReadingSource::Controller(device_id))
                    .or_default()
                    .push(snapshot);
            }
        }

        let shared = self.snapshot_shared(timestamp);
        self.history
            .entry(ReadingSource::Shared)
            .or_default()
            .push(shared);
    }

    /// Consumes pending gilrs events, turning state changes into readings.
    fn pump(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::ButtonPressed(..) | EventType::ButtonReleased(..) => {
                    self.record(id);
                }
                EventType::Connected => {
                    info!("Controller connected event detected");
                    self.refresh_devices();
                    self.record(id);
                }
                EventType::Disconnected => {
                    warn!("Controller disconnected event detected");
                    self.refresh_devices();
                    let timestamp = self.next_timestamp();
                    let shared = self.snapshot_shared(timestamp);
                    self.history
                        .entry(ReadingSource::Shared)
                        .or_default()
                        .push(shared);
                }
                _ => {}
            }
        }
    }

    fn to_handle(snapshot: &PadSnapshot) -> ReadingHandle {
        Box::new(snapshot.clone())
    }
}

impl InputBackend for GilrsBackend {
    fn name(&self) -> &str {
        "gilrs"
    }

    fn enumerate_controllers(&mut self) -> Result<Vec<DeviceId>, DeviceError> {
        self.pump();
        Ok(self.devices.keys().cloned().collect())
    }

    fn current_reading(
        &mut self,
        source: &ReadingSource,
    ) -> Result<Option<ReadingHandle>, DeviceError> {
        self.pump();

        if let Some(latest) = self
            .history
            .get(source)
            .and_then(|history| history.readings.back())
        {
            return Ok(Some(Self::to_handle(latest)));
        }

        // No events yet: take a fresh snapshot so held state is seen
        let timestamp = self.next_timestamp();
        let snapshot = match source {
            ReadingSource::Shared => Some(self.snapshot_shared(timestamp)),
            ReadingSource::Controller(device_id) => match self.devices.get(device_id) {
                Some(id) => self.snapshot_pad(*id, timestamp),
                None => {
                    debug!("No gamepad behind {}", device_id);
                    None
                }
            },
        };

        Ok(snapshot.map(|snapshot| {
            let handle = Self::to_handle(&snapshot);
            self.history.entry(source.clone()).or_default().push(snapshot);
            handle
        }))
    }

    fn next_reading(
        &mut self,
        after: &dyn Reading,
        source: &ReadingSource,
    ) -> Result<Option<ReadingHandle>, DeviceError> {
        self.pump();

        let Some(history) = self.history.get(source) else {
            return Ok(None);
        };
        let after = after.timestamp();
        if after < history.evicted_through {
            return Err(DeviceError::ReadingExpired(source.to_string()));
        }

        Ok(history
            .readings
            .iter()
            .find(|snapshot| snapshot.timestamp > after)
            .map(Self::to_handle))
    }
}
