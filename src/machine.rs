//! Machine catalog
//!
//! Static parameter ranges for every supported machine kind. Profiles are
//! `const` data, so the registry is shared across threads without locking.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::session::SessionError;

/// The kinds of exercise machine the simulator can stream from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineKind {
    Treadmill,
    Cycling,
    Rowing,
    Elliptical,
    FreeWeights,
}

impl MachineKind {
    /// Every kind in the catalog, in display order.
    pub const ALL: [MachineKind; 5] = [
        MachineKind::Treadmill,
        MachineKind::Cycling,
        MachineKind::Rowing,
        MachineKind::Elliptical,
        MachineKind::FreeWeights,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MachineKind::Treadmill => "treadmill",
            MachineKind::Cycling => "cycling",
            MachineKind::Rowing => "rowing",
            MachineKind::Elliptical => "elliptical",
            MachineKind::FreeWeights => "free-weights",
        }
    }

    /// Cyclic machines accumulate reps across ticks; the others report a
    /// fresh rep count every tick.
    pub fn is_cyclic(&self) -> bool {
        matches!(self, MachineKind::Treadmill | MachineKind::Rowing)
    }

    pub fn profile(&self) -> &'static MachineProfile {
        match self {
            MachineKind::Treadmill => &TREADMILL,
            MachineKind::Cycling => &CYCLING,
            MachineKind::Rowing => &ROWING,
            MachineKind::Elliptical => &ELLIPTICAL,
            MachineKind::FreeWeights => &FREE_WEIGHTS,
        }
    }
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "treadmill" => Ok(MachineKind::Treadmill),
            "cycling" => Ok(MachineKind::Cycling),
            "rowing" => Ok(MachineKind::Rowing),
            "elliptical" => Ok(MachineKind::Elliptical),
            "free-weights" | "free_weights" | "dumbbells" => Ok(MachineKind::FreeWeights),
            _ => Err(SessionError::UnknownMachineKind(s.to_string())),
        }
    }
}

/// Parameter ranges used to sample readings for one machine kind.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineProfile {
    pub heart_rate_min: u32,
    pub heart_rate_max: u32,
    pub speed_min: f64,
    pub speed_max: f64,
    /// MET-style intensity constant fed into the calorie formula.
    pub metabolic_factor: f64,
}

const TREADMILL: MachineProfile = MachineProfile {
    heart_rate_min: 110,
    heart_rate_max: 165,
    speed_min: 4.0,
    speed_max: 12.0,
    metabolic_factor: 7.0,
};

const CYCLING: MachineProfile = MachineProfile {
    heart_rate_min: 100,
    heart_rate_max: 155,
    speed_min: 20.0,
    speed_max: 80.0,
    metabolic_factor: 6.0,
};

const ROWING: MachineProfile = MachineProfile {
    heart_rate_min: 110,
    heart_rate_max: 170,
    speed_min: 20.0,
    speed_max: 40.0,
    metabolic_factor: 8.0,
};

const ELLIPTICAL: MachineProfile = MachineProfile {
    heart_rate_min: 95,
    heart_rate_max: 150,
    speed_min: 3.0,
    speed_max: 10.0,
    metabolic_factor: 5.5,
};

const FREE_WEIGHTS: MachineProfile = MachineProfile {
    heart_rate_min: 80,
    heart_rate_max: 140,
    speed_min: 0.0,
    speed_max: 0.0,
    metabolic_factor: 4.5,
};

/// Look up a profile by machine kind name.
pub fn lookup(name: &str) -> Result<(MachineKind, &'static MachineProfile), SessionError> {
    let kind: MachineKind = name.parse()?;
    Ok((kind, kind.profile()))
}

/// Iterate the whole catalog.
pub fn profiles() -> impl Iterator<Item = (MachineKind, &'static MachineProfile)> {
    MachineKind::ALL.into_iter().map(|kind| (kind, kind.profile()))
}
