//! Poll loop with statum state machine
//!
//! Owns the [`InputAggregator`] for as long as it runs. Every tick is one
//! synchronous poll → evaluate → diff → notify pass; ticks never overlap.
//!
//! # State Machine
//!
//! ```text
//! Idle ──► Polling ──► Draining ──► Stopped
//!             │    (cancel or        │
//!             │     fatal error)     ▼
//!             └────────────── into_aggregator() (restartable)
//! ```

use super::state::SharedState;
use crate::binding::BindingsChanged;
use crate::config::Settings;
use crate::input::{DeviceError, InputAggregator, TriggerSet};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[state]
#[derive(Debug, Clone)]
pub enum LoopState {
    Idle,     // Aggregator attached, not ticking
    Polling,  // Ticking on the interval timer
    Draining, // Loop exited, handles still held
    Stopped,  // Every handle released
}

/// Throughput counters for one logging window.
#[derive(Debug, Clone)]
pub struct LoopStats {
    pub ticks: u64,
    pub transitions: u64,
    pub suppressed: u64,
    pub window_start: DateTime<Local>,
}

impl Default for LoopStats {
    fn default() -> Self {
        Self {
            ticks: 0,
            transitions: 0,
            suppressed: 0,
            window_start: Local::now(),
        }
    }
}

impl LoopStats {
    fn record(&mut self, transitions: usize, suppressed: bool) {
        self.ticks += 1;
        self.transitions += transitions as u64;
        if suppressed {
            self.suppressed += transitions as u64;
        }
    }

    /// Logs and resets the counters once `window` has elapsed.
    fn maybe_log(&mut self, window: chrono::Duration) {
        let now = Local::now();
        let elapsed = now - self.window_start;
        if elapsed <= window {
            return;
        }

        let seconds = elapsed.num_milliseconds() as f64 / 1000.0;
        info!(
            "Poll loop stats: {} ticks, {} transitions ({} suppressed) in last {:.1} seconds (avg {:.2} ticks/sec)",
            self.ticks,
            self.transitions,
            self.suppressed,
            seconds,
            self.ticks as f64 / seconds
        );
        *self = Self {
            window_start: now,
            ..Self::default()
        };
    }
}

#[machine]
pub struct PollLoop<S: LoopState> {
    aggregator: InputAggregator,
    shared: Arc<SharedState>,
    interval: Duration,
    stats_window: Option<chrono::Duration>,
    stats: LoopStats,
}

impl<S: LoopState> PollLoop<S> {
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn backend_name(&self) -> &str {
        self.aggregator.backend_name()
    }
}

impl PollLoop<Idle> {
    pub fn create(
        aggregator: InputAggregator,
        shared: Arc<SharedState>,
        settings: &Settings,
    ) -> Self {
        debug!(
            "Creating poll loop on {} with {}ms interval",
            aggregator.backend_name(),
            settings.poll_interval_ms
        );

        let stats_window = settings
            .stats_interval()
            .and_then(|window| chrono::Duration::from_std(window).ok());

        Self::new(
            aggregator,
            shared,
            settings.poll_interval(),
            stats_window,
            LoopStats::default(),
        )
    }

    pub fn start(self) -> PollLoop<Polling> {
        info!("Starting poll loop on backend: {}", self.backend_name());
        self.shared.set_running(true);
        self.transition()
    }
}

impl PollLoop<Polling> {
    /// Runs one tick. Returns how many transitions it produced.
    ///
    /// Only a fatal backend error escapes; it ends the loop.
    pub async fn tick(&mut self) -> Result<usize, DeviceError> {
        // Sampled first: the tick whose input ends a capture stays suppressed
        let capturing = self.shared.is_capturing();
        let triggers = self.poll_guarded()?;
        self.shared.triggers.send_replace(triggers.clone());

        let transitions = {
            let mut state = self.shared.profile.write().await;
            let state = &mut *state;
            match state.profile.as_mut() {
                Some(profile) => state.differ.diff(profile, &triggers),
                None => Vec::new(),
            }
        };

        let count = transitions.len();
        // The diff above runs regardless, only delivery is suppressed
        let suppressed = count > 0 && capturing;
        if suppressed {
            debug!("Capture in progress, suppressing {} transitions", count);
        } else if count > 0 {
            self.shared.publish_bindings(BindingsChanged::new(transitions));
        }

        self.stats.record(count, suppressed);
        if let Some(window) = self.stats_window {
            self.stats.maybe_log(window);
        }

        Ok(count)
    }

    /// Polls the aggregator, turning a backend panic into a fatal error so
    /// the loop still drains and hands its aggregator back.
    fn poll_guarded(&mut self) -> Result<TriggerSet, DeviceError> {
        let aggregator = &mut self.aggregator;
        match panic::catch_unwind(AssertUnwindSafe(|| aggregator.poll().cloned())) {
            Ok(polled) => polled,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Input backend panicked during poll: {}", message);
                Err(DeviceError::BackendPanicked(message))
            }
        }
    }

    /// Ticks on the interval timer until `shutdown` fires or a tick fails.
    pub async fn run_until_cancelled(
        mut self,
        shutdown: CancellationToken,
    ) -> (PollLoop<Draining>, Result<(), DeviceError>) {
        info!("Poll loop running every {:?}", self.interval);

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received for poll loop");
                    break Ok(());
                }

                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Poll loop terminated by device error: {}", e);
                        break Err(e);
                    }
                }
            }
        };

        debug!("Transitioning poll loop to Draining state");
        (self.transition(), outcome)
    }
}

impl PollLoop<Draining> {
    /// Releases every held reading handle and stops publishing.
    pub async fn drain(mut self) -> PollLoop<Stopped> {
        let released = self.aggregator.release_all();
        info!("Poll loop drained, released {} reading handles", released);

        self.shared.triggers.send_replace(Default::default());
        self.shared.profile.write().await.deactivate_all();
        self.shared.set_running(false);
        self.transition()
    }
}

impl PollLoop<Stopped> {
    /// Hands the aggregator back so the loop can be started again.
    pub fn into_aggregator(self) -> InputAggregator {
        debug!("Poll loop stopped after {} ticks in current window", self.stats.ticks);
        self.aggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingProfile, CommandId};
    use crate::input::{ScriptedBackend, ScriptedFrame, ScriptedInput, Trigger};
    use std::sync::atomic::Ordering;

    fn polling(input: &ScriptedInput) -> (PollLoop<Polling>, Arc<SharedState>) {
        let shared = Arc::new(SharedState::new(16));
        let aggregator = InputAggregator::new(Box::new(ScriptedBackend::new(input.clone())));
        let settings = Settings {
            poll_interval_ms: 1,
            ..Settings::default()
        };
        let idle = PollLoop::create(aggregator, Arc::clone(&shared), &settings);
        (idle.start(), shared)
    }

    async fn install(shared: &SharedState, profile: BindingProfile) {
        shared.profile.write().await.replace(profile);
    }

    #[tokio::test]
    async fn tick_publishes_triggers_and_transitions() {
        let input = ScriptedInput::new();
        let (mut polling, shared) = polling(&input);
        let mut profile = BindingProfile::new("p");
        profile.assign(CommandId(1), Trigger::Keyboard(65));
        install(&shared, profile).await;

        let mut changes = shared.bindings_tx.subscribe();
        let triggers = shared.triggers.subscribe();

        input.push_shared(ScriptedFrame::new().key(65));
        assert_eq!(polling.tick().await.unwrap(), 1);
        assert!(triggers.borrow().contains(&Trigger::Keyboard(65)));

        let batch = changes.try_recv().unwrap();
        assert_eq!(batch.transitions.len(), 1);
        assert!(batch.transitions[0].active);

        // Still held: no edge
        assert_eq!(polling.tick().await.unwrap(), 0);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn capture_suppresses_delivery_but_not_tracking() {
        let input = ScriptedInput::new();
        let (mut polling, shared) = polling(&input);
        let mut profile = BindingProfile::new("p");
        profile.assign(CommandId(1), Trigger::Keyboard(65));
        install(&shared, profile).await;
        let mut changes = shared.bindings_tx.subscribe();

        shared.capturing.store(true, Ordering::SeqCst);
        input.push_shared(ScriptedFrame::new().key(65));
        assert_eq!(polling.tick().await.unwrap(), 1);
        assert!(changes.try_recv().is_err());
        assert_eq!(polling.stats().suppressed, 1);

        // Emission resumes without replaying the suppressed activation
        shared.capturing.store(false, Ordering::SeqCst);
        assert_eq!(polling.tick().await.unwrap(), 0);
        input.push_shared(ScriptedFrame::new());
        assert_eq!(polling.tick().await.unwrap(), 1);
        let batch = changes.try_recv().unwrap();
        assert!(!batch.transitions[0].active);
    }

    #[tokio::test]
    async fn tick_without_profile_only_publishes_triggers() {
        let input = ScriptedInput::new();
        let (mut polling, shared) = polling(&input);
        input.push_shared(ScriptedFrame::new().key(1));
        assert_eq!(polling.tick().await.unwrap(), 0);
        assert!(!shared.triggers.borrow().is_empty());
    }

    #[tokio::test]
    async fn cancelled_loop_drains_every_handle() {
        let input = ScriptedInput::new();
        input.push_shared(ScriptedFrame::new().key(1));
        let (polling, shared) = polling(&input);
        assert!(shared.is_running());

        let token = CancellationToken::new();
        let task = tokio::spawn(polling.run_until_cancelled(token.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let (draining, outcome) = task.await.unwrap();
        assert!(outcome.is_ok());
        let stopped = draining.drain().await;
        assert!(!shared.is_running());
        assert!(shared.triggers.borrow().is_empty());
        assert_eq!(input.outstanding(), 0);
        drop(stopped.into_aggregator());
        assert_eq!(input.acquired(), input.released());
    }

    #[tokio::test]
    async fn fatal_error_ends_loop() {
        let input = ScriptedInput::new();
        let (polling, _shared) = polling(&input);
        input.set_unavailable(true);

        let (draining, outcome) = polling
            .run_until_cancelled(CancellationToken::new())
            .await;
        assert!(outcome.unwrap_err().is_fatal());
        draining.drain().await;
    }

    #[test]
    fn stats_reset_after_window() {
        let mut stats = LoopStats::default();
        stats.record(2, false);
        stats.record(1, true);
        assert_eq!((stats.ticks, stats.transitions, stats.suppressed), (2, 3, 1));

        stats.window_start = Local::now() - chrono::Duration::seconds(5);
        stats.maybe_log(chrono::Duration::seconds(1));
        assert_eq!(stats.ticks, 0);
    }
}
