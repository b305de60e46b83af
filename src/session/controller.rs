//! SessionController: the public control surface
//!
//! Owns the shared session record and the slot describing the current worker.
//! Both live under the same mutex, so the "already running" check and the
//! publication of a new worker happen in one critical section.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::worker::{self, CancelSignal, ReadingSampler, WorkerPlan};
use super::{
    MachineSelection, ResetAck, Result, SessionConfig, SessionError, SessionSnapshot,
    SessionState, StartOutcome, StopAck,
};
use crate::feedback;
use crate::machine::{self, MachineKind, MachineProfile};

/// Machine used by the one-shot demo reading.
pub const DEMO_MACHINE: MachineKind = MachineKind::Treadmill;

/// The worker currently (or most recently) bound to the session.
pub(crate) struct WorkerSlot {
    session_id: Uuid,
    cancel: watch::Sender<bool>,
    /// Flipped to `true` by the worker's exit critical section.
    finished: watch::Receiver<bool>,
    handle: JoinHandle<()>,
    running: bool,
}

/// Everything guarded by the session lock.
pub(crate) struct Inner {
    pub(crate) state: SessionState,
    worker: Option<WorkerSlot>,
}

impl Inner {
    /// A worker that died without reaching its exit section is not running.
    fn worker_running(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(false, |slot| slot.running && !slot.handle.is_finished())
    }

    /// Called by a worker on exit. A stale worker never clears a newer slot.
    pub(crate) fn finish_worker(&mut self, session_id: Uuid) {
        if let Some(slot) = self.worker.as_mut() {
            if slot.session_id == session_id {
                slot.running = false;
            }
        }
    }
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    pub(crate) updates: broadcast::Sender<SessionSnapshot>,
}

impl Shared {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| SessionError::LockPoisoned)
    }
}

/// Cheap to clone; every clone drives the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
    config: Arc<SessionConfig>,
    demo_sampler: Arc<Mutex<ReadingSampler>>,
}

impl SessionController {
    pub fn new(mut config: SessionConfig) -> Self {
        if config.tick_interval.is_zero() {
            warn!("Zero tick interval requested, using 1s");
            config.tick_interval = Duration::from_secs(1);
        }
        let (updates, _) = broadcast::channel(config.update_capacity.max(1));
        let demo_sampler = ReadingSampler::new(config.seed);

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SessionState::default(),
                    worker: None,
                }),
                updates,
            }),
            config: Arc::new(config),
            demo_sampler: Arc::new(Mutex::new(demo_sampler)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The full machine catalog.
    pub fn machines(&self) -> Vec<(MachineKind, MachineProfile)> {
        machine::profiles()
            .map(|(kind, profile)| (kind, *profile))
            .collect()
    }

    /// Select a machine and zero the session counters.
    ///
    /// Does not touch a running worker.
    pub fn set_machine(&self, kind: &str) -> Result<MachineSelection> {
        let (kind, _) = machine::lookup(kind).map_err(|e| {
            warn!("Rejected machine selection: {}", e);
            e
        })?;

        let mut inner = self.shared.lock()?;
        let state = &mut inner.state;
        state.clear_counters();
        state.active = false;
        state.machine = Some(kind);
        state.session_id = None;
        info!("Selected machine {}", kind);

        Ok(MachineSelection::Ok { machine: kind })
    }

    /// Start a streaming session and return without waiting for it.
    ///
    /// Fails with [`SessionError::NoRuntime`] outside a Tokio runtime, leaving
    /// the record untouched.
    pub fn start(&self, kind: &str, duration_secs: Option<u64>) -> Result<StartOutcome> {
        let (kind, _) = machine::lookup(kind).map_err(|e| {
            warn!("Rejected session start: {}", e);
            e
        })?;
        let duration_secs = duration_secs.unwrap_or(self.config.default_duration_secs);
        let runtime = Handle::try_current().map_err(|e| {
            warn!("Rejected session start on {}: {}", kind, e);
            SessionError::NoRuntime
        })?;

        let mut inner = self.shared.lock()?;
        if inner.worker_running() {
            info!("Start of {} ignored: a session is already running", kind);
            return Ok(StartOutcome::AlreadyRunning);
        }

        let session_id = Uuid::new_v4();
        let state = &mut inner.state;
        state.clear_counters();
        state.machine = Some(kind);
        state.session_id = Some(session_id);
        state.started_at = Some(Utc::now());
        state.active = true;

        let (cancel_tx, cancel) = CancelSignal::channel();
        let (finished_tx, finished) = watch::channel(false);
        let plan = WorkerPlan {
            session_id,
            machine: kind,
            duration_secs,
            tick_interval: self.config.tick_interval,
            body_mass_kg: self.config.body_mass_kg,
            seed: self.config.seed,
            finished: finished_tx,
        };
        let handle = runtime.spawn(worker::run(Arc::clone(&self.shared), plan, cancel));

        inner.worker = Some(WorkerSlot {
            session_id,
            cancel: cancel_tx,
            finished,
            handle,
            running: true,
        });
        info!(
            "Started session {} on {} for {}s",
            session_id, kind, duration_secs
        );

        Ok(StartOutcome::Started {
            machine: kind,
            duration_secs,
            session_id,
        })
    }

    /// Ask the current worker to stop at its next tick. Always acknowledges.
    pub fn stop(&self) -> StopAck {
        match self.shared.lock() {
            Ok(inner) => {
                if let Some(slot) = inner.worker.as_ref().filter(|slot| slot.running) {
                    info!("Stopping session {}", slot.session_id);
                    let _ = slot.cancel.send(true);
                }
            }
            Err(e) => warn!("Stop could not reach the worker: {}", e),
        }
        StopAck::Stopping
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        Ok(self.shared.lock()?.state.snapshot())
    }

    /// Take one treadmill reading synchronously, without a worker.
    ///
    /// Writes the readings and their feedback into the session record and
    /// returns the resulting snapshot.
    pub fn demo(&self) -> Result<SessionSnapshot> {
        let readings = {
            let mut sampler = self
                .demo_sampler
                .lock()
                .map_err(|_| SessionError::LockPoisoned)?;
            sampler.demo(DEMO_MACHINE)
        };

        let mut inner = self.shared.lock()?;
        let state = &mut inner.state;
        state.heart_rate = readings.heart_rate;
        state.speed = readings.speed;
        state.reps = readings.reps.apply(state.reps);
        state.apply_feedback(feedback::evaluate(state.heart_rate, state.speed, state.reps));

        Ok(state.snapshot())
    }

    /// Force the record back to idle. A live worker is not cancelled and keeps
    /// publishing readings until it ends on its own.
    pub fn reset(&self) -> Result<ResetAck> {
        let mut inner = self.shared.lock()?;
        if inner.worker_running() {
            warn!("Reset while a session is running; the worker is not cancelled");
        }
        inner.state = SessionState::default();
        info!("Session state reset");

        Ok(ResetAck::Reset {
            snapshot: inner.state.snapshot(),
        })
    }

    /// Whether a worker task is still live.
    ///
    /// A poisoned lock reports `false` and logs a warning.
    pub fn is_running(&self) -> bool {
        match self.shared.lock() {
            Ok(inner) => inner.worker_running(),
            Err(e) => {
                warn!("Cannot tell whether a session is running: {}", e);
                false
            }
        }
    }

    /// Per-tick snapshots from the running worker.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Wait for the current worker, if any, to exit.
    ///
    /// Any number of callers may wait on the same worker.
    pub async fn wait(&self) {
        let finished = match self.shared.lock() {
            Ok(inner) => inner.worker.as_ref().map(|slot| slot.finished.clone()),
            Err(e) => {
                warn!("Cannot wait for the session worker: {}", e);
                None
            }
        };
        if let Some(mut finished) = finished {
            // A dropped sender means the worker is gone without reaching its exit.
            if finished.wait_for(|done| *done).await.is_err() {
                warn!("Session worker ended without recording its exit");
            }
        }
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
