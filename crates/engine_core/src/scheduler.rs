//! Scheduler state machine and per-tick reporting.
//!
//! The scheduler is `Stopped` until `start()` moves it to `Running`. A stop
//! request, from the host through a [`StopHandle`] or from system code
//! through its context, is only observed between ticks, so an in-flight tick
//! always completes. A request made while stopped stays pending and ends the
//! next run after its first tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use engine_component::Entity;
use serde::Serialize;
use tracing::warn;

use crate::error::EngineError;

/// Lifecycle state of the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Cloneable handle that asks a running loop to stop at the next boundary.
///
/// The handle is `Send + Sync`, so a host can stop an engine running on
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request a stop at the next tick boundary.
    pub fn stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if a stop has been requested and not yet observed.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn clear(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

/// A system update that returned an error or panicked, or a system
/// initialiser that panicked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemFailure {
    /// The failing system; it is disabled from the next tick on.
    pub system: String,
    pub tick_id: u64,
    /// The entity being updated when the failure happened, or `None` when
    /// the system's initialiser failed.
    pub entity: Option<Entity>,
    pub message: String,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub tick_id: u64,
    /// Update invocations per system, in execution order.
    pub invocations: Vec<(String, usize)>,
    pub failures: Vec<SystemFailure>,
    /// Structural commands applied at the closing boundary.
    pub applied: usize,
}

impl TickReport {
    #[must_use]
    pub fn new(tick_id: u64) -> Self {
        Self {
            tick_id,
            ..Self::default()
        }
    }

    /// Invocations of `system` during this tick (0 if it did not run).
    #[must_use]
    pub fn invocations_of(&self, system: &str) -> usize {
        self.invocations
            .iter()
            .find(|(name, _)| name == system)
            .map_or(0, |(_, count)| *count)
    }

    /// Total update invocations across all systems.
    #[must_use]
    pub fn total_invocations(&self) -> usize {
        self.invocations.iter().map(|(_, count)| count).sum()
    }
}

/// Tick counter and loop state.
#[derive(Debug)]
pub struct Scheduler {
    state: SchedulerState,
    tick_id: u64,
    stop: StopHandle,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Stopped,
            tick_id: 0,
            stop: StopHandle::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    /// The last tick that started (0 before the first tick).
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Advance the tick counter and return the new tick id.
    pub fn advance(&mut self) -> u64 {
        self.tick_id += 1;
        self.tick_id
    }

    /// A handle sharing this scheduler's stop flag.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Enter `Running`. A stop requested beforehand stays pending and is
    /// observed at the first boundary.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] if the loop is running.
    pub fn begin(&mut self) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning);
        }
        self.state = SchedulerState::Running;
        Ok(())
    }

    /// Request a stop at the next boundary of the current or next run.
    pub fn request_stop(&mut self) {
        self.stop.stop();
    }

    /// Called at a tick boundary: returns `true` if the loop should go on,
    /// moving to `Stopped` if a stop was requested.
    pub fn keep_running(&mut self) -> bool {
        if self.stop.clear() {
            self.state = SchedulerState::Stopped;
        }
        self.is_running()
    }

    /// Leave `Running` unconditionally.
    pub fn halt(&mut self) {
        self.stop.clear();
        self.state = SchedulerState::Stopped;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep out the remainder of a tick's time budget, warning when the tick
/// overran it.
pub(crate) fn pace(tick_id: u64, started: Instant, budget: Option<Duration>) {
    let Some(budget) = budget else {
        return;
    };
    let elapsed = started.elapsed();
    if elapsed < budget {
        std::thread::sleep(budget - elapsed);
    } else {
        warn_over_budget(tick_id, elapsed, budget);
    }
}

pub(crate) fn warn_over_budget(tick_id: u64, elapsed: Duration, budget: Duration) {
    warn!(
        tick_id,
        elapsed_ms = elapsed.as_millis() as u64,
        budget_ms = budget.as_millis() as u64,
        "tick exceeded time budget"
    );
}
