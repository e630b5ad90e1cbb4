//! Reading cursors
//!
//! A cursor remembers the last reading it consumed for one source so the
//! next poll only fetches what arrived since. Cursors live in a
//! [`CursorTable`]: one slot for the shared class plus one per controller.
//! All handle release goes through the table, which is why a handle can
//! neither leak nor be released twice.

use super::backend::{DeviceError, InputBackend, Reading, ReadingHandle, ReadingSource};
use super::trigger::{DeviceId, Trigger, TriggerSet};
use std::collections::HashMap;
use tracing::{debug, info};

pub struct ReadingCursor {
    source: ReadingSource,
    held: Option<ReadingHandle>,
}

impl ReadingCursor {
    pub fn new(source: ReadingSource) -> Self {
        Self { source, held: None }
    }

    pub fn source(&self) -> &ReadingSource {
        &self.source
    }

    pub fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    pub fn held_timestamp(&self) -> Option<u64> {
        self.held.as_ref().map(|reading| reading.timestamp())
    }

    /// Drains every reading that arrived since the held one into `triggers`.
    ///
    /// With nothing held the current snapshot is fetched; otherwise readings
    /// strictly after the held one are walked until the backend runs dry.
    /// Each step merges the reading, then replaces (and so releases) the
    /// previously held handle. A press and release that both happened
    /// between two polls still shows up in this tick's set.
    ///
    /// When no newer reading exists the held snapshot is still the device's
    /// state and is merged again without touching the cursor.
    ///
    /// `triggers` is only extended once the whole drain succeeded; a source
    /// that fails mid-drain contributes nothing this tick.
    ///
    /// Returns how many new readings were consumed.
    pub fn take_next(
        &mut self,
        backend: &mut dyn InputBackend,
        triggers: &mut TriggerSet,
    ) -> Result<usize, DeviceError> {
        let mut next = match self.fetch_after_held(backend) {
            Ok(reading) => reading,
            Err(DeviceError::ReadingExpired(device)) => {
                debug!("Held reading for {} expired, restarting from current", device);
                self.release();
                backend.current_reading(&self.source)?
            }
            Err(e) => return Err(e),
        };

        let mut gathered = TriggerSet::new();
        let mut consumed = 0;
        while let Some(reading) = next.take() {
            if self.held_timestamp() == Some(reading.timestamp()) {
                // Same snapshot as before, nothing new since last poll
                break;
            }

            merge_reading(reading.as_ref(), &self.source, &mut gathered);
            self.held = Some(reading);
            consumed += 1;

            next = self.fetch_after_held(backend)?;
        }

        if consumed == 0 {
            if let Some(held) = self.held.as_deref() {
                merge_reading(held, &self.source, &mut gathered);
            }
        }

        triggers.extend(gathered.iter().cloned());
        Ok(consumed)
    }

    fn fetch_after_held(
        &self,
        backend: &mut dyn InputBackend,
    ) -> Result<Option<ReadingHandle>, DeviceError> {
        match self.held.as_deref() {
            None => backend.current_reading(&self.source),
            Some(held) => backend.next_reading(held, &self.source),
        }
    }

    /// Drops the held handle. Returns whether there was one.
    pub fn release(&mut self) -> bool {
        self.held.take().is_some()
    }
}

/// Translates a reading's pressed state into triggers for `source`.
pub fn merge_reading(reading: &dyn Reading, source: &ReadingSource, triggers: &mut TriggerSet) {
    match source {
        ReadingSource::Shared => {
            triggers.extend(reading.pressed_keys().into_iter().map(Trigger::Keyboard));
            triggers.extend(reading.mouse_buttons().flags().map(Trigger::MouseButton));
            triggers.extend(reading.gamepad_buttons().flags().map(Trigger::GamepadButton));
        }
        ReadingSource::Controller(device_id) => {
            for (index, pressed) in reading.controller_buttons().into_iter().enumerate() {
                let Ok(button_index) = u8::try_from(index) else {
                    break;
                };
                if pressed {
                    triggers.insert(Trigger::ControllerButton {
                        device_id: device_id.clone(),
                        button_index,
                    });
                }
            }

            for (index, position) in reading.controller_switches().into_iter().enumerate() {
                let Ok(switch_index) = u8::try_from(index) else {
                    break;
                };
                if !position.is_center() {
                    triggers.insert(Trigger::ControllerSwitch {
                        device_id: device_id.clone(),
                        switch_index,
                        position,
                    });
                }
            }
        }
    }
}

/// Every cursor the poll loop owns.
pub struct CursorTable {
    shared: ReadingCursor,
    controllers: HashMap<DeviceId, ReadingCursor>,
}

impl Default for CursorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorTable {
    pub fn new() -> Self {
        Self {
            shared: ReadingCursor::new(ReadingSource::Shared),
            controllers: HashMap::new(),
        }
    }

    pub fn shared_mut(&mut self) -> &mut ReadingCursor {
        &mut self.shared
    }

    /// Cursor for `device_id`, created on first sighting.
    pub fn controller_mut(&mut self, device_id: &DeviceId) -> &mut ReadingCursor {
        self.controllers
            .entry(device_id.clone())
            .or_insert_with(|| {
                info!("New controller detected: {}", device_id);
                ReadingCursor::new(ReadingSource::Controller(device_id.clone()))
            })
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn contains_controller(&self, device_id: &DeviceId) -> bool {
        self.controllers.contains_key(device_id)
    }

    /// Removes cursors for controllers absent from `present`, releasing
    /// whatever they held. Returns how many cursors were removed.
    pub fn prune(&mut self, present: &[DeviceId]) -> usize {
        let before = self.controllers.len();
        self.controllers.retain(|device_id, cursor| {
            let keep = present.contains(device_id);
            if !keep {
                let released = cursor.release();
                info!(
                    "Controller {} disconnected, cursor removed (released handle: {})",
                    device_id, released
                );
            }
            keep
        });
        before - self.controllers.len()
    }

    /// Number of handles currently held across all cursors.
    pub fn held_count(&self) -> usize {
        usize::from(self.shared.is_holding())
            + self
                .controllers
                .values()
                .filter(|cursor| cursor.is_holding())
                .count()
    }

    /// Releases every held handle, visiting empty cursors too. Returns the
    /// number of handles released.
    pub fn release_all(&mut self) -> usize {
        let mut released = usize::from(self.shared.release());
        for (device_id, cursor) in self.controllers.iter_mut() {
            if cursor.release() {
                released += 1;
            } else {
                debug!("Cursor for {} held no reading", device_id);
            }
        }
        debug!("Released {} reading handles", released);
        released
    }
}
