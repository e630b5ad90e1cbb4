//! In-memory input backend
//!
//! Readings are pushed through a cloneable [`ScriptedInput`] and handed out
//! by [`ScriptedBackend`] in order. Every handle it creates is counted, and
//! every drop is counted as a release, so leaks and double releases show up
//! as `acquired != released`.

use super::backend::{DeviceError, InputBackend, Reading, ReadingHandle, ReadingSource};
use super::trigger::{DeviceId, GamepadButtons, MouseButtons, SwitchPosition};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Device state carried by one scripted reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedFrame {
    keys: Vec<u8>,
    mouse: MouseButtons,
    gamepad: GamepadButtons,
    buttons: Vec<bool>,
    switches: Vec<SwitchPosition>,
}

impl ScriptedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, virtual_key: u8) -> Self {
        self.keys.push(virtual_key);
        self
    }

    pub fn mouse(mut self, button: MouseButtons) -> Self {
        self.mouse |= button;
        self
    }

    pub fn gamepad(mut self, button: GamepadButtons) -> Self {
        self.gamepad |= button;
        self
    }

    pub fn button(mut self, index: u8) -> Self {
        let index = usize::from(index);
        if self.buttons.len() <= index {
            self.buttons.resize(index + 1, false);
        }
        self.buttons[index] = true;
        self
    }

    pub fn switch(mut self, index: u8, position: SwitchPosition) -> Self {
        let index = usize::from(index);
        if self.switches.len() <= index {
            self.switches.resize(index + 1, SwitchPosition::Center);
        }
        self.switches[index] = position;
        self
    }
}

#[derive(Debug, Default)]
struct HandleCounters {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

struct ScriptedReading {
    timestamp: u64,
    frame: Arc<ScriptedFrame>,
    counters: Arc<HandleCounters>,
}

impl Reading for ScriptedReading {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn pressed_keys(&self) -> Vec<u8> {
        self.frame.keys.clone()
    }

    fn mouse_buttons(&self) -> MouseButtons {
        self.frame.mouse
    }

    fn controller_buttons(&self) -> Vec<bool> {
        self.frame.buttons.clone()
    }

    fn controller_switches(&self) -> Vec<SwitchPosition> {
        self.frame.switches.clone()
    }

    fn gamepad_buttons(&self) -> GamepadButtons {
        self.frame.gamepad
    }
}

impl Drop for ScriptedReading {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ScriptState {
    clock: u64,
    history: HashMap<ReadingSource, Vec<(u64, Arc<ScriptedFrame>)>>,
    controllers: Vec<DeviceId>,
    failing: HashSet<ReadingSource>,
    unavailable: bool,
}

/// Producer side of the scripted backend. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedInput {
    state: Arc<Mutex<ScriptState>>,
    counters: Arc<HandleCounters>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, source: ReadingSource, frame: ScriptedFrame) -> u64 {
        let mut state = self.state();
        state.clock += 1;
        let timestamp = state.clock;
        state
            .history
            .entry(source)
            .or_default()
            .push((timestamp, Arc::new(frame)));
        timestamp
    }

    /// Queues a keyboard/mouse/gamepad reading. Returns its timestamp.
    pub fn push_shared(&self, frame: ScriptedFrame) -> u64 {
        self.push(ReadingSource::Shared, frame)
    }

    /// Queues a reading for one controller. Returns its timestamp.
    pub fn push_controller(&self, device_id: &DeviceId, frame: ScriptedFrame) -> u64 {
        self.push(ReadingSource::Controller(device_id.clone()), frame)
    }

    pub fn connect(&self, device_id: DeviceId) {
        let mut state = self.state();
        if !state.controllers.contains(&device_id) {
            state.controllers.push(device_id);
        }
    }

    /// Detaches a controller and forgets its history.
    pub fn disconnect(&self, device_id: &DeviceId) {
        let mut state = self.state();
        state.controllers.retain(|id| id != device_id);
        state
            .history
            .remove(&ReadingSource::Controller(device_id.clone()));
    }

    /// Makes every read of `source` fail until [`ScriptedInput::heal`].
    pub fn fail(&self, source: ReadingSource) {
        self.state().failing.insert(source);
    }

    pub fn heal(&self, source: &ReadingSource) {
        self.state().failing.remove(source);
    }

    /// Simulates losing the whole input subsystem.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    pub fn acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Handles acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }
}

/// Consumer side, handed to the poll loop.
pub struct ScriptedBackend {
    input: ScriptedInput,
}

impl ScriptedBackend {
    pub fn new(input: ScriptedInput) -> Self {
        Self { input }
    }

    fn check(&self, state: &ScriptState, source: &ReadingSource) -> Result<(), DeviceError> {
        if state.unavailable {
            return Err(DeviceError::BackendUnavailable(
                "scripted backend shut down".to_string(),
            ));
        }
        if state.failing.contains(source) {
            return Err(DeviceError::read_failed(source, "scripted failure"));
        }
        Ok(())
    }

    fn handle(&self, timestamp: u64, frame: &Arc<ScriptedFrame>) -> ReadingHandle {
        self.input.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedReading {
            timestamp,
            frame: Arc::clone(frame),
            counters: Arc::clone(&self.input.counters),
        })
    }
}

impl InputBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn enumerate_controllers(&mut self) -> Result<Vec<DeviceId>, DeviceError> {
        let state = self.input.state();
        if state.unavailable {
            return Err(DeviceError::BackendUnavailable(
                "scripted backend shut down".to_string(),
            ));
        }
        Ok(state.controllers.clone())
    }

    fn current_reading(
        &mut self,
        source: &ReadingSource,
    ) -> Result<Option<ReadingHandle>, DeviceError> {
        let state = self.input.state();
        self.check(&state, source)?;
        Ok(state
            .history
            .get(source)
            .and_then(|frames| frames.last())
            .map(|(timestamp, frame)| self.handle(*timestamp, frame)))
    }

    fn next_reading(
        &mut self,
        after: &dyn Reading,
        source: &ReadingSource,
    ) -> Result<Option<ReadingHandle>, DeviceError> {
        let state = self.input.state();
        self.check(&state, source)?;
        let after = after.timestamp();
        Ok(state
            .history
            .get(source)
            .and_then(|frames| frames.iter().find(|(timestamp, _)| *timestamp > after))
            .map(|(timestamp, frame)| self.handle(*timestamp, frame)))
    }
}
