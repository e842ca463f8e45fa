//! Journey state: the per-user relocation checklist.
//!
//! `JourneyState` is the canonical record mirrored to the remote document.
//! `JourneyStore` is its only writer; `gate::accessible` decides which
//! milestones are reachable.

pub mod catalog;
pub mod gate;
pub mod model;
pub mod store;

pub use gate::{Access, accessible};
pub use model::{
    BookingKind, JourneyPatch, JourneyState, Milestone, Milestones, OptionId, ProfileUpdate,
    UserProfile,
};
pub use store::{JourneyStore, JourneyUpdate, Outbox};
