//! User-facing session: sign-in lifecycle, journey operations, routing.

pub mod journey;
pub mod router;

pub use journey::{JourneySession, SessionDeps};
pub use router::{Router, View};
