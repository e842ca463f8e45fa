//! JourneySession: the operations a front-end calls.
//!
//! Wires identity, remote sync, the journey store, both simulators and the
//! content generators. Every state change still goes through
//! `JourneyStore`; this type only validates input and picks the update.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::content::{Candidate, ListingGenerator, SummaryGenerator};
use crate::error::{Error, JourneyError};
use crate::identity::{IdentityProvider, UserId};
use crate::journey::catalog;
use crate::journey::{
    Access, BookingKind, JourneyPatch, JourneyState, JourneyStore, JourneyUpdate, Milestone,
    OptionId, ProfileUpdate,
};
use crate::llm::LlmProvider;
use crate::process::{
    BookingProcedure, BookingRequest, ProcessEvent, ProcessSimulator, ProcessStatus,
    VisaProcedure,
};
use crate::sync::{DocumentStore, RemoteSync};

use super::router::{Router, View};

/// Collaborators injected into a session.
pub struct SessionDeps {
    pub identity: Arc<dyn IdentityProvider>,
    pub remote: Arc<dyn DocumentStore>,
    /// `None` disables summaries and discovery.
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub app_id: String,
    pub simulation: SimulationConfig,
}

pub struct JourneySession {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<JourneyStore>,
    router: Arc<Router>,
    sync: RemoteSync,
    visa: ProcessSimulator<VisaProcedure>,
    booking: ProcessSimulator<BookingProcedure>,
    summary: Option<SummaryGenerator>,
    listings: Option<ListingGenerator>,
    flights: RwLock<Vec<Candidate>>,
    houses: RwLock<Vec<Candidate>>,
    summary_loading: watch::Sender<bool>,
    discovery_loading: watch::Sender<bool>,
}

impl JourneySession {
    /// Build a session. Must be called inside a tokio runtime.
    pub fn new(deps: SessionDeps) -> Arc<Self> {
        let store = JourneyStore::new();
        let router = Arc::new(Router::new());
        let sync = RemoteSync::new(
            deps.remote,
            Arc::clone(&store),
            Arc::clone(&router),
            deps.app_id,
        );
        let visa = ProcessSimulator::new(VisaProcedure::new(&deps.simulation), Arc::clone(&store));
        let booking =
            ProcessSimulator::new(BookingProcedure::new(&deps.simulation), Arc::clone(&store));

        spawn_rearm_router(booking.subscribe_events(), Arc::clone(&router));

        Arc::new(Self {
            identity: deps.identity,
            store,
            router,
            sync,
            visa,
            booking,
            summary: deps.llm.clone().map(SummaryGenerator::new),
            listings: deps.llm.map(ListingGenerator::new),
            flights: RwLock::new(Vec::new()),
            houses: RwLock::new(Vec::new()),
            summary_loading: watch::channel(false).0,
            discovery_loading: watch::channel(false).0,
        })
    }

    // ── Sign-in lifecycle ──────────────────────────────────────────

    /// Sign in and start syncing. Failures are logged and leave the user on
    /// the login view.
    pub async fn sign_in(&self) -> Result<UserId, Error> {
        let user = match self.identity.sign_in().await {
            Ok(user) => user,
            Err(e) => {
                warn!(provider = self.identity.name(), error = %e, "Sign-in failed");
                self.router.go(View::Login);
                return Err(e.into());
            }
        };

        if let Err(e) = self.sync.subscribe(user.clone()).await {
            warn!(user_id = %user, error = %e, "Could not start remote sync");
            self.identity.sign_out().await;
            self.router.go(View::Login);
            return Err(e.into());
        }
        Ok(user)
    }

    /// End the session: cancel running processes, stop syncing, forget
    /// local state, back to login.
    pub async fn sign_out(&self) {
        self.visa.abort_for_teardown().await;
        self.booking.abort_for_teardown().await;
        self.sync.unsubscribe().await;
        self.identity.sign_out().await;
        self.store.clear();
        self.flights.write().await.clear();
        self.houses.write().await.clear();
        self.router.go(View::Login);
    }

    // ── Trip selection ─────────────────────────────────────────────

    /// Pick a destination. The region resets to the country's first one.
    pub fn select_country(&self, country_id: &str) -> Result<JourneyState, JourneyError> {
        let country = catalog::country(country_id).ok_or_else(|| JourneyError::Unknown {
            kind: "country",
            id: country_id.to_string(),
        })?;
        self.store.save(
            JourneyPatch::new()
                .with_country(Some(country.id.to_string()))
                .with_region(country.default_region()),
        )
    }

    pub fn select_region(&self, region: &str) -> Result<JourneyState, JourneyError> {
        let country = self.selected_country()?;
        if !country.has_region(region) {
            return Err(JourneyError::Unknown {
                kind: "region",
                id: region.to_string(),
            });
        }
        self.store.save(JourneyPatch::new().with_region(region))
    }

    /// Set the departure date (`YYYY-MM-DD`).
    pub fn set_departure_date(&self, date: &str) -> Result<JourneyState, JourneyError> {
        let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|e| JourneyError::InvalidInput(format!("departure date '{date}': {e}")))?;
        self.store.save(
            JourneyPatch::new().with_departure_date(parsed.format("%Y-%m-%d").to_string()),
        )
    }

    /// Leave trip selection for the hub. Needs a country and a date.
    pub fn confirm_trip(&self) -> Result<(), JourneyError> {
        if !self.store.snapshot().trip_confirmed() {
            return Err(JourneyError::InvalidInput(
                "choose a country and a departure date first".to_string(),
            ));
        }
        self.router.go(View::Dashboard);
        Ok(())
    }

    // ── Profile ────────────────────────────────────────────────────

    pub fn toggle_skill(&self, skill_id: &str) -> Result<JourneyState, JourneyError> {
        let category = catalog::job_category(skill_id).ok_or_else(|| JourneyError::Unknown {
            kind: "skill",
            id: skill_id.to_string(),
        })?;
        self.store
            .update_profile(ProfileUpdate::ToggleSkill(category.id.to_string()))
    }

    /// Toggle a local certificate. Only the selected country's requirements
    /// are offered.
    pub fn toggle_certificate(&self, certificate: &str) -> Result<JourneyState, JourneyError> {
        let country = self.selected_country()?;
        let Some(cert) = country
            .requirements
            .iter()
            .find(|r| r.eq_ignore_ascii_case(certificate.trim()))
        else {
            return Err(JourneyError::Unknown {
                kind: "certificate",
                id: certificate.to_string(),
            });
        };
        self.store
            .update_profile(ProfileUpdate::ToggleCertificate(cert.to_string()))
    }

    pub fn set_career_details(&self, text: &str) -> Result<JourneyState, JourneyError> {
        self.store
            .update_profile(ProfileUpdate::CareerDetails(text.to_string()))
    }

    /// Generate the profile summary and complete the profile milestone.
    ///
    /// Returns `Ok(false)` when generation failed; state is then unchanged.
    pub async fn generate_summary(&self) -> Result<bool, JourneyError> {
        self.ensure_signed_in()?;
        let generator = self.summary.as_ref().ok_or_else(|| {
            JourneyError::InvalidInput("content generation is not configured".to_string())
        })?;
        let state = self.store.snapshot();
        if !state.user_profile.ready_for_summary() {
            return Err(JourneyError::InvalidInput(
                "add at least one skill and your career details first".to_string(),
            ));
        }
        let country = state
            .selected_country_id
            .as_deref()
            .and_then(catalog::country)
            .map(|c| c.name)
            .unwrap_or_default();

        self.summary_loading.send_replace(true);
        let result = generator
            .generate(country, &state.selected_region, &state.user_profile)
            .await;
        self.summary_loading.send_replace(false);

        match result {
            Ok(bio) => {
                self.store.apply(JourneyUpdate::CompleteProfile { bio })?;
                info!("Profile summary stored");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Profile summary generation failed");
                Ok(false)
            }
        }
    }

    // ── Discovery & bookings ───────────────────────────────────────

    /// Fetch fresh flight/house candidates for the selected destination.
    pub async fn discover(&self, kind: BookingKind) -> Result<Vec<Candidate>, JourneyError> {
        let generator = self.listings.as_ref().ok_or_else(|| {
            JourneyError::InvalidInput("content generation is not configured".to_string())
        })?;
        let state = self.store.snapshot();
        let country = state
            .selected_country_id
            .as_deref()
            .and_then(catalog::country)
            .map(|c| c.name)
            .unwrap_or_default();

        self.discovery_loading.send_replace(true);
        let found = generator
            .discover(kind, country, &state.selected_region)
            .await;
        *self.candidate_slot(kind).write().await = found.clone();
        self.discovery_loading.send_replace(false);
        Ok(found)
    }

    pub async fn candidates(&self, kind: BookingKind) -> Vec<Candidate> {
        self.candidate_slot(kind).read().await.clone()
    }

    /// Start the visa simulation. `Ok(false)` when one is already running
    /// or finished.
    pub fn apply_visa(&self) -> Result<bool, JourneyError> {
        self.ensure_signed_in()?;
        Ok(self.visa.start(()))
    }

    /// Book one of the discovered candidates. `Ok(false)` while another
    /// booking is in flight.
    pub async fn book(&self, kind: BookingKind, id: OptionId) -> Result<bool, JourneyError> {
        self.ensure_signed_in()?;
        let known = self
            .candidate_slot(kind)
            .read()
            .await
            .iter()
            .any(|c| c.id == id);
        if !known {
            return Err(JourneyError::Unknown {
                kind: kind.collection_key(),
                id: id.to_string(),
            });
        }
        Ok(self.booking.start(BookingRequest { kind, id }))
    }

    // ── Jobs ───────────────────────────────────────────────────────

    /// Accept a job offer. Locked until the profile is complete.
    pub fn accept_offer(&self, job_id: i64) -> Result<JourneyState, JourneyError> {
        if !self.store.accessible().get(Milestone::Job) {
            return Err(JourneyError::Locked(Milestone::Job));
        }
        let offer = catalog::job_offer(job_id).ok_or_else(|| JourneyError::Unknown {
            kind: "job offer",
            id: job_id.to_string(),
        })?;
        info!(company = offer.company, role = offer.role, "Accepting job offer");
        self.store.apply(JourneyUpdate::Hire(OptionId::Number(offer.id)))
    }

    /// Close the hire confirmation: withdraw the hire and return to the hub.
    pub fn dismiss_success(&self) -> Result<JourneyState, JourneyError> {
        let state = self.store.apply(JourneyUpdate::ClearHire)?;
        self.router.go(View::Dashboard);
        Ok(state)
    }

    // ── Navigation & reads ─────────────────────────────────────────

    /// Switch view, honouring the milestone gate.
    pub fn navigate(&self, view: View) -> Result<(), JourneyError> {
        if let Some(milestone) = view.milestone() {
            if !self.store.accessible().get(milestone) {
                debug!(%view, "Navigation refused; milestone locked");
                return Err(JourneyError::Locked(milestone));
            }
        }
        self.router.go(view);
        Ok(())
    }

    pub fn view(&self) -> View {
        self.router.current()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn state(&self) -> JourneyState {
        self.store.snapshot()
    }

    pub fn watch_state(&self) -> watch::Receiver<JourneyState> {
        self.store.subscribe()
    }

    pub fn accessible(&self) -> Access {
        self.store.accessible()
    }

    pub fn visa_status(&self) -> ProcessStatus {
        self.visa.status()
    }

    pub fn booking_status(&self) -> ProcessStatus {
        self.booking.status()
    }

    pub fn visa_events(&self) -> broadcast::Receiver<ProcessEvent> {
        self.visa.subscribe_events()
    }

    pub fn booking_events(&self) -> broadcast::Receiver<ProcessEvent> {
        self.booking.subscribe_events()
    }

    pub fn is_summary_loading(&self) -> bool {
        *self.summary_loading.borrow()
    }

    pub fn is_discovery_loading(&self) -> bool {
        *self.discovery_loading.borrow()
    }

    /// True until the first remote snapshot of this session arrives.
    pub fn is_sync_loading(&self) -> bool {
        self.sync.is_loading()
    }

    pub fn first_snapshot_seen(&self) -> bool {
        self.sync.first_snapshot_seen()
    }

    pub async fn user(&self) -> Option<UserId> {
        self.sync.user().await
    }

    fn selected_country(&self) -> Result<&'static catalog::Country, JourneyError> {
        let state = self.store.snapshot();
        let id = state
            .selected_country_id
            .as_deref()
            .ok_or_else(|| JourneyError::InvalidInput("select a country first".to_string()))?;
        catalog::country(id).ok_or_else(|| JourneyError::Unknown {
            kind: "country",
            id: id.to_string(),
        })
    }

    fn ensure_signed_in(&self) -> Result<(), JourneyError> {
        if self.store.is_attached() {
            Ok(())
        } else {
            Err(JourneyError::NotSignedIn)
        }
    }

    fn candidate_slot(&self, kind: BookingKind) -> &RwLock<Vec<Candidate>> {
        match kind {
            BookingKind::Flight => &self.flights,
            BookingKind::House => &self.houses,
        }
    }
}

/// Return to the hub whenever a booking re-arms, unless signed out.
fn spawn_rearm_router(
    mut events: broadcast::Receiver<ProcessEvent>,
    router: Arc<Router>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ProcessEvent::Rearmed) => {
                    if router.current() != View::Login {
                        router.go(View::Dashboard);
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Booking event listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::identity::AnonymousIdentity;
    use crate::llm::{CompletionRequest, CompletionResponse};
    use crate::sync::MemoryDocumentStore;

    struct FixedLlm(&'static str);

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
            })
        }
    }

    fn session(llm: Option<Arc<dyn LlmProvider>>) -> Arc<JourneySession> {
        JourneySession::new(SessionDeps {
            identity: Arc::new(AnonymousIdentity::with_device_id("device-1")),
            remote: Arc::new(MemoryDocumentStore::new()),
            llm,
            app_id: "test-app".to_string(),
            simulation: SimulationConfig::default(),
        })
    }

    async fn signed_in(llm: Option<Arc<dyn LlmProvider>>) -> Arc<JourneySession> {
        let s = session(llm);
        s.sign_in().await.unwrap();
        while !s.first_snapshot_seen() {
            tokio::task::yield_now().await;
        }
        s
    }

    #[tokio::test]
    async fn operations_require_a_session() {
        let s = session(None);
        assert_eq!(s.select_country("au").unwrap_err(), JourneyError::NotSignedIn);
        assert_eq!(s.apply_visa().unwrap_err(), JourneyError::NotSignedIn);
        assert_eq!(s.view(), View::Login);
    }

    #[tokio::test]
    async fn trip_selection_flow() {
        let s = signed_in(None).await;
        assert_eq!(s.view(), View::Country);

        let state = s.select_country("ca").unwrap();
        assert_eq!(state.selected_region, "Toronto");
        assert!(matches!(
            s.select_region("Sydney"),
            Err(JourneyError::Unknown { kind: "region", .. })
        ));
        s.select_region("Vancouver").unwrap();
        assert!(s.confirm_trip().is_err());

        assert!(matches!(
            s.set_departure_date("next week"),
            Err(JourneyError::InvalidInput(_))
        ));
        s.set_departure_date("2026-09-01").unwrap();
        s.confirm_trip().unwrap();
        assert_eq!(s.view(), View::Dashboard);
        assert!(matches!(
            s.select_country("fr"),
            Err(JourneyError::Unknown { kind: "country", .. })
        ));
    }

    #[tokio::test]
    async fn certificates_follow_selected_country() {
        let s = signed_in(None).await;
        assert!(matches!(
            s.toggle_certificate("RSA"),
            Err(JourneyError::InvalidInput(_))
        ));
        s.select_country("de").unwrap();
        assert!(s.toggle_certificate("RSA").is_err());
        let state = s.toggle_certificate("anmeldung").unwrap();
        assert_eq!(state.user_profile.certificates, vec!["Anmeldung".to_string()]);
        let state = s.toggle_certificate("Anmeldung").unwrap();
        assert!(state.user_profile.certificates.is_empty());
    }

    #[tokio::test]
    async fn jobs_stay_locked_until_summary() {
        let s = signed_in(Some(Arc::new(FixedLlm("Hard-working barista.")))).await;
        assert_eq!(s.navigate(View::Jobs).unwrap_err(), JourneyError::Locked(Milestone::Job));
        assert_eq!(s.accept_offer(1).unwrap_err(), JourneyError::Locked(Milestone::Job));

        // Not enough profile data yet
        assert!(matches!(s.generate_summary().await, Err(JourneyError::InvalidInput(_))));

        s.select_country("au").unwrap();
        s.toggle_skill("barista").unwrap();
        s.set_career_details("3 years espresso bar").unwrap();
        assert!(s.generate_summary().await.unwrap());
        assert!(!s.is_summary_loading());

        let state = s.state();
        assert!(state.completed.profile);
        assert_eq!(state.user_profile.ai_bio, "Hard-working barista.");

        s.navigate(View::Jobs).unwrap();
        let state = s.accept_offer(2).unwrap();
        assert_eq!(state.hired_job_id, Some(OptionId::Number(2)));
        assert!(state.completed.job);
        assert!(matches!(s.accept_offer(9), Err(JourneyError::Unknown { .. })));

        let state = s.dismiss_success().unwrap();
        assert!(!state.completed.job);
        assert!(state.hired_job_id.is_none());
        assert_eq!(s.view(), View::Dashboard);
    }

    #[tokio::test]
    async fn booking_needs_a_discovered_candidate() {
        let s = signed_in(Some(Arc::new(FixedLlm(r#"{"flights": [{"id": 5, "airline": "Jeju Air"}]}"#)))).await;
        assert!(s.book(BookingKind::Flight, OptionId::Number(5)).await.is_err());

        let found = s.discover(BookingKind::Flight).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(!s.is_discovery_loading());
        assert!(s.book(BookingKind::Flight, OptionId::Number(5)).await.unwrap());
        assert!(!s.book(BookingKind::Flight, OptionId::Number(5)).await.unwrap());
        assert!(s.candidates(BookingKind::House).await.is_empty());
    }

    #[tokio::test]
    async fn sign_out_clears_local_state() {
        let s = signed_in(None).await;
        s.select_country("au").unwrap();
        s.sign_out().await;
        assert_eq!(s.state(), JourneyState::default());
        assert_eq!(s.view(), View::Login);
        assert!(s.user().await.is_none());
    }
}
