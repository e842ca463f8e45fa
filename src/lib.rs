//! HoliGo: working-holiday journey core.
//!
//! Tracks a user's relocation checklist (profile, visa, flight, house, job),
//! mirrors it to a per-user remote document and simulates the visa and
//! booking procedures.

pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod identity;
pub mod journey;
pub mod llm;
pub mod process;
pub mod session;
pub mod sync;
