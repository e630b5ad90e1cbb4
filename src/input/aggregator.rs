//! Input Aggregator - one trigger set per poll tick
//!
//! Owns the backend and every reading cursor. Each [`InputAggregator::poll`]
//! clears the set, drains the shared keyboard/mouse/gamepad class, then
//! re-enumerates controllers and drains each of them. Read errors cost the
//! failing source its contribution for the tick and nothing more.
//!
//! ```text
//! Backend ──► Shared cursor ─────────┐
//!        └──► Controller cursors ────┴──► TriggerSet (this tick only)
//! ```

use super::backend::{DeviceError, InputBackend};
use super::cursor::CursorTable;
use super::trigger::TriggerSet;
use tracing::{debug, error, warn};

pub struct InputAggregator {
    backend: Box<dyn InputBackend>,
    cursors: CursorTable,
    triggers: TriggerSet,
}

impl InputAggregator {
    pub fn new(backend: Box<dyn InputBackend>) -> Self {
        debug!("Creating input aggregator for backend: {}", backend.name());
        Self {
            backend,
            cursors: CursorTable::new(),
            triggers: TriggerSet::new(),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Runs one aggregation pass and returns this tick's triggers.
    ///
    /// Only a fatal backend error is returned; every other failure is logged
    /// and the tick goes on without that source.
    pub fn poll(&mut self) -> Result<&TriggerSet, DeviceError> {
        self.triggers.clear();

        match self
            .cursors
            .shared_mut()
            .take_next(self.backend.as_mut(), &mut self.triggers)
        {
            Ok(consumed) if consumed > 1 => {
                debug!("Drained {} buffered keyboard/mouse/gamepad readings", consumed)
            }
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!("Skipping keyboard/mouse/gamepad this tick: {}", e),
        }

        let devices = match self.backend.enumerate_controllers() {
            Ok(devices) => devices,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                // Keep existing cursors; an enumeration hiccup is not a disconnect
                warn!("Skipping controllers this tick: {}", e);
                return Ok(&self.triggers);
            }
        };

        for device_id in &devices {
            let cursor = self.cursors.controller_mut(device_id);
            match cursor.take_next(self.backend.as_mut(), &mut self.triggers) {
                Ok(consumed) if consumed > 1 => {
                    debug!("Drained {} buffered readings from {}", consumed, device_id)
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => error!("Failed to read controller {}: {}", device_id, e),
            }
        }

        self.cursors.prune(&devices);

        Ok(&self.triggers)
    }

    pub fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }

    pub fn held_handles(&self) -> usize {
        self.cursors.held_count()
    }

    pub fn controller_count(&self) -> usize {
        self.cursors.controller_count()
    }

    /// Releases every reading handle held by any cursor.
    pub fn release_all(&mut self) -> usize {
        self.cursors.release_all()
    }
}

impl Drop for InputAggregator {
    fn drop(&mut self) {
        let released = self.cursors.release_all();
        if released > 0 {
            debug!("Aggregator dropped, released {} reading handles", released);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::backend::ReadingSource;
    use crate::input::scripted::{ScriptedBackend, ScriptedFrame, ScriptedInput};
    use crate::input::trigger::{DeviceId, GamepadButtons, SwitchPosition, Trigger};

    fn aggregator(input: &ScriptedInput) -> InputAggregator {
        InputAggregator::new(Box::new(ScriptedBackend::new(input.clone())))
    }

    #[test]
    fn unions_shared_class_and_controllers() {
        let input = ScriptedInput::new();
        let stick = DeviceId::new("stick");
        input.connect(stick.clone());
        input.push_shared(ScriptedFrame::new().key(65).gamepad(GamepadButtons::A));
        input.push_controller(
            &stick,
            ScriptedFrame::new()
                .button(2)
                .switch(0, SwitchPosition::Left),
        );

        let mut aggregator = aggregator(&input);
        let triggers = aggregator.poll().unwrap();

        assert_eq!(triggers.len(), 4);
        assert!(triggers.contains(&Trigger::Keyboard(65)));
        assert!(triggers.contains(&Trigger::GamepadButton(GamepadButtons::A)));
        assert!(triggers.contains(&Trigger::ControllerButton {
            device_id: stick.clone(),
            button_index: 2,
        }));
        assert!(triggers.contains(&Trigger::ControllerSwitch {
            device_id: stick,
            switch_index: 0,
            position: SwitchPosition::Left,
        }));
    }

    #[test]
    fn failing_source_does_not_abort_tick() {
        let input = ScriptedInput::new();
        let stick = DeviceId::new("stick");
        input.connect(stick.clone());
        input.push_shared(ScriptedFrame::new().key(13));
        input.push_controller(&stick, ScriptedFrame::new().button(0));
        input.fail(ReadingSource::Shared);

        let mut aggregator = aggregator(&input);
        let triggers = aggregator.poll().unwrap();

        assert!(!triggers.contains(&Trigger::Keyboard(13)));
        assert!(triggers.contains(&Trigger::ControllerButton {
            device_id: stick,
            button_index: 0,
        }));
    }

    #[test]
    fn unavailable_backend_is_fatal() {
        let input = ScriptedInput::new();
        input.set_unavailable(true);
        let mut aggregator = aggregator(&input);
        assert!(aggregator.poll().unwrap_err().is_fatal());
    }

    #[test]
    fn set_only_holds_current_tick() {
        let input = ScriptedInput::new();
        input.push_shared(ScriptedFrame::new().key(1));
        let mut aggregator = aggregator(&input);
        assert!(aggregator.poll().unwrap().contains(&Trigger::Keyboard(1)));

        input.push_shared(ScriptedFrame::new().key(2));
        let triggers = aggregator.poll().unwrap();
        assert!(triggers.contains(&Trigger::Keyboard(2)));
        assert!(!triggers.contains(&Trigger::Keyboard(1)));
    }

    #[test]
    fn hot_plug_creates_and_prunes_cursors() {
        let input = ScriptedInput::new();
        let pad = DeviceId::new("pad");
        let mut aggregator = aggregator(&input);

        aggregator.poll().unwrap();
        assert_eq!(aggregator.controller_count(), 0);

        input.connect(pad.clone());
        input.push_controller(&pad, ScriptedFrame::new().button(4));
        aggregator.poll().unwrap();
        assert_eq!(aggregator.controller_count(), 1);
        assert_eq!(input.outstanding(), 1);

        input.disconnect(&pad);
        aggregator.poll().unwrap();
        assert_eq!(aggregator.controller_count(), 0);
        assert_eq!(input.outstanding(), 0);
    }

    #[test]
    fn drop_releases_everything() {
        let input = ScriptedInput::new();
        input.push_shared(ScriptedFrame::new().key(1));
        let mut aggregator = aggregator(&input);
        aggregator.poll().unwrap();
        assert_eq!(aggregator.held_handles(), 1);

        drop(aggregator);
        assert_eq!(input.acquired(), input.released());
    }
}
