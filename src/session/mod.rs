//! Streaming session engine
//!
//! A single [`SessionState`] record is shared between the
//! [`SessionController`] (control surface and pollers) and at most one
//! streaming worker task. Every read and write of the record goes through
//! one mutex; the worker applies each tick inside a single critical section.

pub mod controller;
pub mod worker;

pub use controller::SessionController;
pub use worker::{CancelSignal, ReadingSampler, Readings, RepReading};

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::calories::DEFAULT_BODY_MASS_KG;
use crate::feedback::{Feedback, IDLE_FEEDBACK};
use crate::machine::MachineKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown machine kind: {0}")]
    UnknownMachineKind(String),

    #[error("Session state lock poisoned")]
    LockPoisoned,

    #[error("No Tokio runtime available to run the session worker")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Configuration for the streaming engine.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Wall-clock length of one tick.
    pub tick_interval: Duration,
    /// Duration used when `start` is called without one.
    pub default_duration_secs: u64,
    /// Body mass assumed by the calorie formula.
    pub body_mass_kg: f64,
    /// Seed for reproducible readings; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Capacity of the per-tick update channel.
    pub update_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            default_duration_secs: 60,
            body_mass_kg: DEFAULT_BODY_MASS_KG,
            seed: None,
            update_capacity: 64,
        }
    }
}

impl SessionConfig {
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_default_duration(mut self, secs: u64) -> Self {
        self.default_duration_secs = secs;
        self
    }

    pub fn with_body_mass(mut self, kg: f64) -> Self {
        self.body_mass_kg = kg;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// The live session record.
///
/// `active` implies `machine` and `started_at` are set.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub machine: Option<MachineKind>,
    pub session_id: Option<Uuid>,
    pub heart_rate: u32,
    pub speed: f64,
    pub reps: u32,
    pub fatigue: f64,
    pub feedback: String,
    pub total_calories: f64,
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            machine: None,
            session_id: None,
            heart_rate: 0,
            speed: 0.0,
            reps: 0,
            fatigue: 0.0,
            feedback: IDLE_FEEDBACK.to_string(),
            total_calories: 0.0,
            active: false,
            started_at: None,
            elapsed_seconds: 0,
        }
    }
}

impl SessionState {
    /// Zero the per-session counters.
    pub(crate) fn clear_counters(&mut self) {
        self.total_calories = 0.0;
        self.reps = 0;
        self.elapsed_seconds = 0;
    }

    pub(crate) fn apply_feedback(&mut self, feedback: Feedback) {
        self.fatigue = feedback.fatigue;
        self.feedback = feedback.text;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            machine: self.machine,
            session_id: self.session_id,
            heart_rate: self.heart_rate,
            speed: self.speed,
            reps: self.reps,
            fatigue: self.fatigue,
            feedback: self.feedback.clone(),
            total_calories: self.total_calories,
            active: self.active,
            started_at: self.started_at,
            elapsed_seconds: self.elapsed_seconds,
        }
    }
}

/// A consistent copy of the session record handed to pollers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub machine: Option<MachineKind>,
    pub session_id: Option<Uuid>,
    pub heart_rate: u32,
    pub speed: f64,
    pub reps: u32,
    pub fatigue: f64,
    pub feedback: String,
    pub total_calories: f64,
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
}

/// Outcome of `start`. Contention is reported, not raised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    Started {
        machine: MachineKind,
        duration_secs: u64,
        session_id: Uuid,
    },
    AlreadyRunning,
}

/// Acknowledgement returned by `stop`, whether or not a worker was live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StopAck {
    Stopping,
}

/// Result of `set_machine`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MachineSelection {
    Ok { machine: MachineKind },
}

/// Result of `reset`, carrying the idle snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResetAck {
    Reset { snapshot: SessionSnapshot },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        let state = SessionState::default();
        assert_eq!(state.machine, None);
        assert!(!state.active);
        assert_eq!(state.feedback, "Idle");
        assert_eq!(state.total_calories, 0.0);
        assert_eq!(state.elapsed_seconds, 0);
    }

    #[test]
    fn test_status_tags() {
        let stop = serde_json::to_value(StopAck::Stopping).unwrap();
        assert_eq!(stop, serde_json::json!({ "status": "stopping" }));

        let busy = serde_json::to_value(StartOutcome::AlreadyRunning).unwrap();
        assert_eq!(busy, serde_json::json!({ "status": "already_running" }));

        let id = Uuid::new_v4();
        let started = serde_json::to_value(StartOutcome::Started {
            machine: MachineKind::Rowing,
            duration_secs: 30,
            session_id: id,
        })
        .unwrap();
        assert_eq!(started["status"], "started");
        assert_eq!(started["machine"], "rowing");
        assert_eq!(started["duration_secs"], 30);

        let selected = serde_json::to_value(MachineSelection::Ok {
            machine: MachineKind::Cycling,
        })
        .unwrap();
        assert_eq!(
            selected,
            serde_json::json!({ "status": "ok", "machine": "cycling" })
        );
    }

    #[test]
    fn test_config_builders() {
        let config = SessionConfig::default()
            .with_tick_interval(Duration::from_millis(250))
            .with_default_duration(5)
            .with_body_mass(80.0)
            .with_seed(7);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.default_duration_secs, 5);
        assert_eq!(config.body_mass_kg, 80.0);
        assert_eq!(config.seed, Some(7));
    }
}
