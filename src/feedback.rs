//! Coaching feedback and fatigue scoring for a single set of readings.

use serde::Serialize;

/// Joins the individual notes into the feedback line.
pub const SEPARATOR: &str = " | ";

/// Feedback text reported before any reading has been taken.
pub const IDLE_FEEDBACK: &str = "Idle";

// Normalization points for the fatigue blend.
const FATIGUE_HR_REFERENCE: f64 = 180.0;
const FATIGUE_SPEED_REFERENCE: f64 = 12.0;
const FATIGUE_HR_WEIGHT: f64 = 0.6;
const FATIGUE_SPEED_WEIGHT: f64 = 0.4;

/// Result of evaluating one set of readings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Feedback {
    /// Normalized fatigue in `[0, 1]`, two decimal places.
    pub fatigue: f64,
    /// Notes joined with [`SEPARATOR`].
    pub text: String,
    /// Heart-rate note first, then speed, then reps.
    pub notes: Vec<&'static str>,
}

/// Score readings and build the coaching line.
pub fn evaluate(heart_rate: u32, speed: f64, reps: u32) -> Feedback {
    let mut notes = Vec::with_capacity(3);

    notes.push(heart_rate_note(heart_rate));
    if let Some(note) = speed_note(speed) {
        notes.push(note);
    }
    if let Some(note) = rep_note(reps) {
        notes.push(note);
    }

    Feedback {
        fatigue: fatigue_score(heart_rate, speed),
        text: notes.join(SEPARATOR),
        notes,
    }
}

/// `min(1, hr/180 * 0.6 + speed/12 * 0.4)`, rounded to two decimals.
pub fn fatigue_score(heart_rate: u32, speed: f64) -> f64 {
    let blend = (heart_rate as f64 / FATIGUE_HR_REFERENCE) * FATIGUE_HR_WEIGHT
        + (speed / FATIGUE_SPEED_REFERENCE) * FATIGUE_SPEED_WEIGHT;
    let clamped = blend.clamp(0.0, 1.0);
    (clamped * 100.0).round() / 100.0
}

fn heart_rate_note(heart_rate: u32) -> &'static str {
    if heart_rate > 180 {
        "Danger: HR very high!"
    } else if heart_rate > 160 {
        "High HR, slow down."
    } else if heart_rate > 120 {
        "Good workout zone."
    } else {
        "Light or warm-up."
    }
}

fn speed_note(speed: f64) -> Option<&'static str> {
    if speed <= 0.0 {
        return None;
    }
    Some(if speed > 12.0 {
        "Very fast speed."
    } else if speed > 8.0 {
        "Good pace."
    } else {
        "Moderate pace."
    })
}

fn rep_note(reps: u32) -> Option<&'static str> {
    match reps {
        0 => None,
        1..=10 => Some("Warm-up reps."),
        11..=20 => Some("Good reps."),
        _ => Some("High reps, fatigue likely."),
    }
}
