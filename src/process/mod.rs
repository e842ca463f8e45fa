//! Simulated multi-step procedures (visa application, bookings).
//!
//! A `ProcessSimulator` drives one `Procedure` through
//! `idle -> processing -> done` and commits the procedure's result through
//! the `JourneyStore`. Procedures that re-arm return to `idle` afterwards.

pub mod booking;
pub mod simulator;
pub mod visa;

pub use booking::{BookingProcedure, BookingRequest};
pub use simulator::{ProcessSimulator, Procedure, ProgressReporter};
pub use visa::VisaProcedure;

use serde::Serialize;

/// Lifecycle phase of a simulated procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessPhase {
    #[default]
    Idle,
    Processing,
    Done,
}

impl std::fmt::Display for ProcessPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Observable status: phase plus progress percent (0..=100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProcessStatus {
    pub phase: ProcessPhase,
    pub progress: u8,
}

/// Lifecycle notifications, broadcast to any listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    Started,
    Progress(u8),
    /// The result was accepted by the store.
    Committed,
    Done,
    /// Back to idle after a re-arming run.
    Rearmed,
}
