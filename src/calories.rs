//! Calorie accounting.
//!
//! Calories per minute follow the standard MET estimate
//! `met * 3.5 * body_mass_kg / 200`; one tick covers one second.

/// Body mass assumed when none is configured.
pub const DEFAULT_BODY_MASS_KG: f64 = 70.0;

pub const TICKS_PER_MINUTE: f64 = 60.0;

const OXYGEN_ML_PER_KG_MIN: f64 = 3.5;
const KCAL_DIVISOR: f64 = 200.0;

pub fn calories_per_minute(metabolic_factor: f64, body_mass_kg: f64) -> f64 {
    metabolic_factor * OXYGEN_ML_PER_KG_MIN * body_mass_kg / KCAL_DIVISOR
}

/// Calories added to the session total by one tick.
pub fn per_tick_calories(metabolic_factor: f64, body_mass_kg: f64) -> f64 {
    calories_per_minute(metabolic_factor, body_mass_kg) / TICKS_PER_MINUTE
}
