//! Capture session: wait for the next trigger to bind
//!
//! While a [`CaptureGuard`] lives the poll loop keeps diffing but stops
//! broadcasting transitions. The guard resets the flag when dropped, so
//! every exit (success, timeout, cancellation, error, dropped future)
//! restores normal notifications.

use crate::binding::CommandId;
use crate::input::{Trigger, TriggerSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct CaptureGuard<'a> {
    flag: &'a AtomicBool,
    command: CommandId,
}

impl<'a> CaptureGuard<'a> {
    /// Raises `flag`. `None` if another capture already holds it.
    pub fn acquire(flag: &'a AtomicBool, command: CommandId) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        info!("Capture started for command {}", command);
        Some(Self { flag, command })
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        debug!(
            "Capture for command {} ended, notifications resumed",
            self.command
        );
    }
}

/// Why a capture ended without a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEnd {
    TimedOut,
    Cancelled,
}

/// Samples the published trigger set every `poll_interval` until it holds a
/// trigger, `timeout` elapses or `cancel` fires.
///
/// Several simultaneous triggers resolve to the first in trigger order:
/// keyboard, mouse, controller, gamepad.
pub async fn wait_for_trigger(
    triggers: &mut watch::Receiver<TriggerSet>,
    poll_interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Trigger, CaptureEnd> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        let first = triggers.borrow_and_update().first().cloned();
        if let Some(trigger) = first {
            return Ok(trigger);
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(CaptureEnd::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(CaptureEnd::TimedOut),
            _ = ticker.tick() => {}
        }
    }
}
