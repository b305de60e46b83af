// GymPulse - streaming session engine for a simulated connected exercise machine

pub mod calories;
pub mod feedback;
pub mod machine;
pub mod session;

pub use feedback::{evaluate, Feedback};
pub use machine::{MachineKind, MachineProfile};
pub use session::{
    MachineSelection, ResetAck, SessionConfig, SessionController, SessionError, SessionSnapshot,
    StartOutcome, StopAck,
};
