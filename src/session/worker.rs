//! Streaming worker
//!
//! One worker task runs per session. Each tick it samples readings from the
//! machine profile, then applies the whole tick to the shared record in one
//! critical section. It exits when the requested duration is covered or its
//! cancel signal is raised, checked only at the top of an iteration.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use super::controller::Shared;
use crate::calories::per_tick_calories;
use crate::feedback;
use crate::machine::{MachineKind, MachineProfile};

const CYCLIC_REP_STEP: std::ops::RangeInclusive<u32> = 1..=4;
const FREE_REP_RANGE: std::ops::RangeInclusive<u32> = 0..=30;
const DEMO_REP_RANGE: std::ops::RangeInclusive<u32> = 0..=20;

/// Raw readings for one tick, before reps are folded into the session total.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Readings {
    pub heart_rate: u32,
    pub speed: f64,
    pub reps: RepReading,
}

/// How a tick's rep reading combines with the previous rep count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepReading {
    /// Added to the running count (cyclic machines).
    Step(u32),
    /// Replaces the count (everything else).
    Fresh(u32),
}

impl RepReading {
    pub fn apply(self, previous: u32) -> u32 {
        match self {
            RepReading::Step(step) => previous.saturating_add(step),
            RepReading::Fresh(reps) => reps,
        }
    }
}

/// Uniform sampler over a machine profile's ranges.
pub struct ReadingSampler {
    rng: StdRng,
}

impl ReadingSampler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn heart_rate(&mut self, profile: &MachineProfile) -> u32 {
        self.rng
            .gen_range(profile.heart_rate_min..=profile.heart_rate_max)
    }

    /// Uniform speed, rounded to one decimal.
    pub fn speed(&mut self, profile: &MachineProfile) -> f64 {
        if profile.speed_min >= profile.speed_max {
            return profile.speed_min;
        }
        let raw = self.rng.gen_range(profile.speed_min..=profile.speed_max);
        (raw * 10.0).round() / 10.0
    }

    pub fn reps(&mut self, kind: MachineKind) -> RepReading {
        if kind.is_cyclic() {
            RepReading::Step(self.rng.gen_range(CYCLIC_REP_STEP))
        } else {
            RepReading::Fresh(self.rng.gen_range(FREE_REP_RANGE))
        }
    }

    pub fn sample(&mut self, kind: MachineKind) -> Readings {
        let profile = kind.profile();
        Readings {
            heart_rate: self.heart_rate(profile),
            speed: self.speed(profile),
            reps: self.reps(kind),
        }
    }

    /// Single reading for the non-streaming demo. Reps are never cumulative.
    pub fn demo(&mut self, kind: MachineKind) -> Readings {
        let profile = kind.profile();
        Readings {
            heart_rate: self.heart_rate(profile),
            speed: self.speed(profile),
            reps: RepReading::Fresh(self.rng.gen_range(DEMO_REP_RANGE)),
        }
    }
}

/// One-shot cancellation flag bound to a single worker.
///
/// A dropped sender counts as cancelled so an orphaned worker cannot spin.
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the flag is raised or the sender is gone.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Everything a worker needs for one session.
pub(crate) struct WorkerPlan {
    pub session_id: Uuid,
    pub machine: MachineKind,
    pub duration_secs: u64,
    pub tick_interval: Duration,
    pub body_mass_kg: f64,
    pub seed: Option<u64>,
    /// Raised once the exit has been recorded in the session record.
    pub finished: watch::Sender<bool>,
}

/// Whole seconds covered by `ticks` ticks of `tick_interval`, saturating.
pub(crate) fn covered_seconds(tick_interval: Duration, ticks: u64) -> u64 {
    let nanos = tick_interval.as_nanos().saturating_mul(u128::from(ticks));
    u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX)
}

pub(crate) async fn run(shared: Arc<Shared>, plan: WorkerPlan, mut cancel: CancelSignal) {
    let profile = plan.machine.profile();
    let tick_secs = plan.tick_interval.as_secs_f64();
    let tick_calories = per_tick_calories(profile.metabolic_factor, plan.body_mass_kg) * tick_secs;
    let mut sampler = ReadingSampler::new(plan.seed);

    let mut ticker = interval(plan.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut ticks: u64 = 0;
    let reason = loop {
        if covered_seconds(plan.tick_interval, ticks) >= plan.duration_secs {
            break "duration elapsed";
        }
        if cancel.is_cancelled() {
            break "cancelled";
        }

        let readings = sampler.sample(plan.machine);
        ticks = ticks.saturating_add(1);
        let elapsed_seconds = covered_seconds(plan.tick_interval, ticks);

        let snapshot = {
            let mut guard = match shared.lock() {
                Ok(guard) => guard,
                Err(e) => {
                    warn!("Session {} worker exiting: {}", plan.session_id, e);
                    return;
                }
            };
            let state = &mut guard.state;
            state.reps = readings.reps.apply(state.reps);
            state.heart_rate = readings.heart_rate;
            state.speed = readings.speed;
            state.elapsed_seconds = elapsed_seconds;
            state.apply_feedback(feedback::evaluate(state.heart_rate, state.speed, state.reps));
            state.total_calories += tick_calories;
            state.snapshot()
        };

        debug!(
            "Session {} tick {}: hr={} speed={:.1} reps={} fatigue={:.2}",
            plan.session_id,
            ticks,
            snapshot.heart_rate,
            snapshot.speed,
            snapshot.reps,
            snapshot.fatigue
        );
        // No subscribers is fine.
        let _ = shared.updates.send(snapshot);

        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => {}
        }
    };

    match shared.lock() {
        Ok(mut guard) => {
            guard.state.active = false;
            guard.finish_worker(plan.session_id);
            let _ = plan.finished.send(true);
            info!(
                "Session {} on {} ended ({}) after {} ticks",
                plan.session_id, plan.machine, reason, ticks
            );
        }
        Err(e) => warn!("Session {} could not record its exit: {}", plan.session_id, e),
    }
}
