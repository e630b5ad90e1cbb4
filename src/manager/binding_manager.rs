//! Binding manager - public face of the crate
//!
//! Foreground calls (bind, clear, load, capture) run on the caller's task.
//! Hardware polling and diffing run only inside the spawned poll loop. The
//! two sides meet in [`SharedState`]: the profile behind a `RwLock`, the
//! current trigger set in a `watch` channel, and transitions on `broadcast`.
//!
//! Profile edits are copy-on-write: the current profile is cloned, edited,
//! saved, and only installed once the save succeeded. A failed save leaves
//! the live profile exactly as it was.

use super::capture::{wait_for_trigger, CaptureEnd, CaptureGuard};
use super::poll_loop::PollLoop;
use super::state::SharedState;
use crate::binding::{BindingError, BindingProfile, BindingsChanged, CommandId, GameBinding};
use crate::config::Settings;
use crate::input::{InputAggregator, InputBackend, Trigger, TriggerSet};
use crate::persistence::{PersistenceError, ProfileStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

enum Runner {
    Idle(InputAggregator),
    Running {
        shutdown: CancellationToken,
        task: JoinHandle<InputAggregator>,
    },
    /// The loop task panicked and took the aggregator with it
    Lost,
}

pub struct BindingManager {
    settings: Settings,
    store: ProfileStore,
    shared: Arc<SharedState>,
    runner: Mutex<Runner>,
    /// Serializes profile edits and switches
    mutation: Mutex<()>,
}

impl BindingManager {
    pub fn new(settings: Settings, backend: Box<dyn InputBackend>) -> Self {
        info!(
            "Creating binding manager on backend {} with profiles in {}",
            backend.name(),
            settings.profile_dir.display()
        );
        let store = ProfileStore::new(settings.profile_dir.clone());
        let shared = Arc::new(SharedState::new(settings.notification_capacity));
        Self {
            store,
            shared,
            runner: Mutex::new(Runner::Idle(InputAggregator::new(backend))),
            mutation: Mutex::new(()),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.is_capturing()
    }

    /// Starts the poll loop. Needs a loaded profile.
    pub async fn start(&self) -> Result<(), BindingError> {
        if self.shared.profile.read().await.profile.is_none() {
            warn!("Cannot start poll loop: no profile loaded");
            return Err(BindingError::NoProfileLoaded);
        }

        let mut runner = self.runner.lock().await;
        let aggregator = match std::mem::replace(&mut *runner, Runner::Lost) {
            Runner::Idle(aggregator) => aggregator,
            Runner::Running { shutdown, task }
                if self.shared.is_running() && !task.is_finished() =>
            {
                *runner = Runner::Running { shutdown, task };
                return Err(BindingError::AlreadyRunning);
            }
            Runner::Running { task, .. } => {
                // Ended on its own after a fatal error
                match task.await {
                    Ok(aggregator) => aggregator,
                    Err(e) => {
                        error!("Poll loop task failed: {}", e);
                        self.shared.set_running(false);
                        return Err(BindingError::LoopTask(e.to_string()));
                    }
                }
            }
            Runner::Lost => {
                return Err(BindingError::LoopTask(
                    "input aggregator lost with a failed loop task".to_string(),
                ))
            }
        };

        let polling = PollLoop::create(aggregator, Arc::clone(&self.shared), &self.settings).start();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            let (draining, outcome) = polling.run_until_cancelled(token).await;
            if let Err(e) = outcome {
                error!("Poll loop stopped, restart required: {}", e);
            }
            draining.drain().await.into_aggregator()
        });

        *runner = Runner::Running { shutdown, task };
        info!("Binding manager running");
        Ok(())
    }

    /// Stops the poll loop and releases every reading handle.
    pub async fn stop(&self) -> Result<(), BindingError> {
        let mut runner = self.runner.lock().await;
        match std::mem::replace(&mut *runner, Runner::Lost) {
            Runner::Running { shutdown, task } => {
                shutdown.cancel();
                match task.await {
                    Ok(aggregator) => {
                        debug!(
                            "Poll loop joined, {} handles still held",
                            aggregator.held_handles()
                        );
                        *runner = Runner::Idle(aggregator);
                    }
                    Err(e) => {
                        error!("Poll loop task failed: {}", e);
                        self.shared.set_running(false);
                        return Err(BindingError::LoopTask(e.to_string()));
                    }
                }
            }
            Runner::Idle(mut aggregator) => {
                // Nothing running; releasing is still a full pass
                let released = aggregator.release_all();
                debug!("Stop while idle released {} handles", released);
                *runner = Runner::Idle(aggregator);
            }
            Runner::Lost => {
                warn!("Stop requested but the poll loop was lost");
                return Err(BindingError::LoopTask(
                    "input aggregator lost with a failed loop task".to_string(),
                ));
            }
        }
        info!("Binding manager stopped");
        Ok(())
    }

    /// Binds `trigger` to the slot `id` addresses (ids ≥ 200 target the
    /// modifier of `id - 100`) and persists the profile.
    pub async fn set_binding(&self, id: CommandId, trigger: Trigger) -> Result<(), BindingError> {
        debug!("Binding {} to command {}", trigger, id);
        ensure_valid(id)?;
        self.edit_profile(|profile| {
            profile.assign(id, trigger);
            true
        })
        .await
        .map(|_| ())
    }

    /// Removes what `id` addresses. `Ok(false)` if there was nothing to remove.
    pub async fn clear_binding(&self, id: CommandId) -> Result<bool, BindingError> {
        debug!("Clearing command {}", id);
        ensure_valid(id)?;
        self.edit_profile(|profile| profile.clear(id)).await
    }

    /// Clone → edit → save → install. `edit` returns whether it changed
    /// anything; unchanged profiles are neither saved nor announced.
    async fn edit_profile<F>(&self, edit: F) -> Result<bool, BindingError>
    where
        F: FnOnce(&mut BindingProfile) -> bool,
    {
        let _serial = self.mutation.lock().await;

        let mut draft = self
            .shared
            .profile
            .read()
            .await
            .profile
            .clone()
            .ok_or(BindingError::NoProfileLoaded)?;

        if !edit(&mut draft) {
            return Ok(false);
        }

        self.store.save(&draft).await?;

        self.shared.profile.write().await.apply_edit(draft.clone());
        self.shared.publish_profile(draft);
        Ok(true)
    }

    /// Loads `name` from the store and makes it current.
    pub async fn load_profile(&self, name: &str) -> Result<(), BindingError> {
        let _serial = self.mutation.lock().await;
        let profile = self.store.load(name).await?;
        self.install(profile).await;
        Ok(())
    }

    /// Persists a new empty profile and makes it current.
    pub async fn create_profile(&self, name: &str) -> Result<(), BindingError> {
        let _serial = self.mutation.lock().await;
        if self.store.exists(name).await {
            warn!("Profile '{}' already exists", name);
            return Err(PersistenceError::AlreadyExists(name.trim().to_string()).into());
        }
        let profile = BindingProfile::new(name.trim());
        self.store.save(&profile).await?;
        self.install(profile).await;
        Ok(())
    }

    async fn install(&self, profile: BindingProfile) {
        info!(
            "Switching to profile '{}' ({} bindings)",
            profile.name,
            profile.bindings.len()
        );
        self.shared.profile.write().await.replace(profile.clone());
        self.shared.publish_profile(profile);
    }

    /// Binding owning `id`; modifier aliases resolve to their base command.
    pub async fn get_binding(&self, id: CommandId) -> Option<GameBinding> {
        self.shared
            .profile
            .read()
            .await
            .profile
            .as_ref()
            .and_then(|profile| profile.binding(id))
            .cloned()
    }

    pub async fn current_profile(&self) -> Option<BindingProfile> {
        self.shared.profile.read().await.profile.clone()
    }

    pub async fn active_bindings(&self) -> Vec<GameBinding> {
        self.shared
            .profile
            .read()
            .await
            .profile
            .as_ref()
            .map(|profile| profile.active_bindings().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn list_profiles(&self) -> Result<Vec<String>, BindingError> {
        Ok(self.store.list().await?)
    }

    /// Waits up to `timeout` for the next trigger and binds it to `id`.
    pub async fn capture_binding(
        &self,
        id: CommandId,
        timeout: Duration,
    ) -> Result<Trigger, BindingError> {
        self.capture_binding_with_cancel(id, timeout, CancellationToken::new())
            .await
    }

    /// [`BindingManager::capture_binding`] that also ends when `cancel` fires.
    ///
    /// Transitions are not broadcast while the capture runs. Nothing is
    /// written unless a trigger arrived and the profile saved.
    pub async fn capture_binding_with_cancel(
        &self,
        id: CommandId,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Trigger, BindingError> {
        ensure_valid(id)?;
        if self.shared.profile.read().await.profile.is_none() {
            warn!("Cannot capture for {}: no profile loaded", id);
            return Err(BindingError::NoProfileLoaded);
        }

        let _guard = CaptureGuard::acquire(&self.shared.capturing, id)
            .ok_or(BindingError::CaptureInProgress)?;

        if !self.is_running() {
            warn!("Capturing for {} while the poll loop is stopped", id);
        }

        let mut triggers = self.shared.triggers.subscribe();
        let trigger = match wait_for_trigger(
            &mut triggers,
            self.settings.capture_poll_interval(),
            timeout,
            &cancel,
        )
        .await
        {
            Ok(trigger) => trigger,
            Err(CaptureEnd::TimedOut) => {
                info!("Capture for {} timed out after {:?}", id, timeout);
                return Err(BindingError::CaptureTimeout {
                    command: id,
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            Err(CaptureEnd::Cancelled) => {
                info!("Capture for {} cancelled", id);
                return Err(BindingError::CaptureCancelled(id));
            }
        };

        info!("Captured {} for command {}", trigger, id);
        self.set_binding(id, trigger.clone()).await?;
        Ok(trigger)
    }

    pub fn subscribe_bindings(&self) -> broadcast::Receiver<BindingsChanged> {
        self.shared.bindings_tx.subscribe()
    }

    pub fn subscribe_profile(&self) -> broadcast::Receiver<BindingProfile> {
        self.shared.profile_tx.subscribe()
    }

    /// Trigger set of the most recent tick.
    pub fn watch_triggers(&self) -> watch::Receiver<TriggerSet> {
        self.shared.triggers.subscribe()
    }
}

fn ensure_valid(id: CommandId) -> Result<(), BindingError> {
    if id.is_valid() {
        Ok(())
    } else {
        warn!("Rejecting out-of-range command {}", id);
        Err(BindingError::InvalidCommand(id))
    }
}

impl Drop for BindingManager {
    fn drop(&mut self) {
        if let Runner::Running { shutdown, .. } = self.runner.get_mut() {
            debug!("Binding manager dropped, cancelling poll loop");
            shutdown.cancel();
        }
    }
}
