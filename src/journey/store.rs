//! JourneyStore: the single writer for canonical journey state.
//!
//! Every mutation (user edits, simulator commits, remote snapshots) goes
//! through this type. Local updates are applied synchronously and then queued
//! on the session's push outbox in the same critical section, so pushes leave
//! in exactly the order the updates were applied.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::error::JourneyError;

use super::gate::{Access, accessible};
use super::model::{
    BookingKind, JourneyPatch, JourneyState, Milestone, OptionId, ProfileUpdate,
};

/// Queue of whole-document pushes towards the remote store.
pub type Outbox = mpsc::UnboundedSender<JourneyState>;

/// A typed local update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JourneyUpdate {
    /// Top-level wholesale replacement of every key present in the patch.
    Save(JourneyPatch),
    /// Flip one milestone, keeping its siblings.
    SetMilestone(Milestone, bool),
    /// Edit one profile field, keeping its siblings.
    Profile(ProfileUpdate),
    /// Store a generated summary and complete the profile milestone.
    CompleteProfile { bio: String },
    /// Record a chosen flight/house and complete its milestone.
    Book { kind: BookingKind, id: OptionId },
    /// Accept a job offer.
    Hire(OptionId),
    /// Withdraw from the accepted offer.
    ClearHire,
}

impl JourneyUpdate {
    fn label(&self) -> &'static str {
        match self {
            Self::Save(_) => "save",
            Self::SetMilestone(..) => "set_milestone",
            Self::Profile(_) => "profile",
            Self::CompleteProfile { .. } => "complete_profile",
            Self::Book { .. } => "book",
            Self::Hire(_) => "hire",
            Self::ClearHire => "clear_hire",
        }
    }

    fn apply_to(self, state: &mut JourneyState) {
        match self {
            Self::Save(patch) => patch.apply_to(state),
            Self::SetMilestone(milestone, done) => state.completed.set(milestone, done),
            Self::Profile(update) => update.apply_to(&mut state.user_profile),
            Self::CompleteProfile { bio } => {
                state.user_profile.ai_bio = bio;
                state.completed.profile = true;
            }
            Self::Book { kind, id } => {
                state.set_selected_option(kind, Some(id));
                state.completed.set(kind.milestone(), true);
            }
            Self::Hire(id) => {
                state.hired_job_id = Some(id);
                state.completed.job = true;
            }
            Self::ClearHire => {
                state.completed.job = false;
                state.hired_job_id = None;
            }
        }
    }
}

/// Canonical in-memory journey state.
pub struct JourneyStore {
    state: watch::Sender<JourneyState>,
    outbox: Mutex<Option<Outbox>>,
}

impl JourneyStore {
    pub fn new() -> Arc<Self> {
        let (state, _rx) = watch::channel(JourneyState::default());
        Arc::new(Self {
            state,
            outbox: Mutex::new(None),
        })
    }

    /// Watch the canonical state; receivers see every committed change.
    pub fn subscribe(&self) -> watch::Receiver<JourneyState> {
        self.state.subscribe()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> JourneyState {
        self.state.borrow().clone()
    }

    /// Gate over the current completion map.
    pub fn accessible(&self) -> Access {
        accessible(&self.state.borrow().completed)
    }

    /// Route future pushes to `outbox`. Called when a sync session starts.
    pub fn attach_outbox(&self, outbox: Outbox) {
        *self.lock_outbox() = Some(outbox);
    }

    /// Stop pushing. Returns whether an outbox was attached.
    pub fn detach_outbox(&self) -> bool {
        self.lock_outbox().take().is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.lock_outbox().is_some()
    }

    /// Merge a top-level partial update and push the result.
    pub fn save(&self, patch: JourneyPatch) -> Result<JourneyState, JourneyError> {
        self.apply(JourneyUpdate::Save(patch))
    }

    pub fn set_milestone(
        &self,
        milestone: Milestone,
        done: bool,
    ) -> Result<JourneyState, JourneyError> {
        self.apply(JourneyUpdate::SetMilestone(milestone, done))
    }

    pub fn update_profile(&self, update: ProfileUpdate) -> Result<JourneyState, JourneyError> {
        self.apply(JourneyUpdate::Profile(update))
    }

    /// Apply a local update, then queue the merged state for pushing.
    ///
    /// Rejected updates leave the state untouched and push nothing. Every
    /// accepted update is pushed, even when it changes nothing.
    pub fn apply(&self, update: JourneyUpdate) -> Result<JourneyState, JourneyError> {
        let outbox = self.lock_outbox().clone().ok_or(JourneyError::NotSignedIn)?;
        let label = update.label();
        let completes_profile = matches!(update, JourneyUpdate::CompleteProfile { .. });

        let mut result = Err(JourneyError::NotSignedIn);
        self.state.send_if_modified(|state| {
            let mut next = state.clone();
            update.apply_to(&mut next);

            if !completes_profile && !state.completed.profile && next.completed.profile {
                result = Err(JourneyError::InvariantViolated(
                    "profile milestone is only completed by a generated summary".to_string(),
                ));
                return false;
            }
            // Only violations this update introduces are rejected; ones
            // inherited from a remote snapshot must not block unrelated edits.
            let inherited = state.invariant_violations();
            let introduced: Vec<String> = next
                .invariant_violations()
                .into_iter()
                .filter(|v| !inherited.contains(v))
                .collect();
            if !introduced.is_empty() {
                result = Err(JourneyError::InvariantViolated(introduced.join("; ")));
                return false;
            }
            if !inherited.is_empty() {
                debug!(update = label, violations = ?inherited, "Applying over inherited invariant violations");
            }

            if outbox.send(next.clone()).is_err() {
                warn!(update = label, "Push queue closed; remote copy will lag");
            }
            let changed = *state != next;
            *state = next.clone();
            result = Ok(next);
            changed
        });

        match &result {
            Ok(_) => debug!(update = label, "Journey state updated"),
            Err(e) => warn!(update = label, error = %e, "Journey update rejected"),
        }
        result
    }

    /// Overwrite the whole state from a remote snapshot. Never pushes.
    ///
    /// Remote wins even when the snapshot breaks an invariant; the
    /// violation is logged and later updates may carry it forward.
    pub fn reconcile(&self, snapshot: JourneyState) {
        let violations = snapshot.invariant_violations();
        if !violations.is_empty() {
            warn!(violations = ?violations, "Remote snapshot breaks journey invariants");
        }
        let changed = self.state.send_if_modified(|state| {
            if *state == snapshot {
                return false;
            }
            *state = snapshot;
            true
        });
        debug!(changed, "Reconciled journey state from snapshot");
    }

    /// Replace the state with a session-start reset and queue it for
    /// pushing in the same critical section as `apply`, so an edit made
    /// concurrently is pushed either wholly before or wholly after it.
    pub fn reset_session(&self, reset: JourneyState) -> Result<JourneyState, JourneyError> {
        let outbox = self.lock_outbox().clone().ok_or(JourneyError::NotSignedIn)?;
        let changed = self.state.send_if_modified(|state| {
            if outbox.send(reset.clone()).is_err() {
                warn!("Push queue closed; reset not pushed");
            }
            let changed = *state != reset;
            *state = reset.clone();
            changed
        });
        debug!(changed, "Journey state reset for new session");
        Ok(reset)
    }

    /// Drop back to the empty default (end of session).
    pub fn clear(&self) {
        self.reconcile(JourneyState::default());
    }

    fn lock_outbox(&self) -> MutexGuard<'_, Option<Outbox>> {
        self.outbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
