//! RemoteSync: keeps the local journey in step with the user's remote
//! document for the length of one sign-in session.
//!
//! Two tasks run per session:
//! - the listener applies snapshots through `JourneyStore::reconcile`;
//! - the pusher drains the store's outbox and upserts each state in order.
//!
//! Later snapshots overwrite local state even when a local write has not
//! been acknowledged yet. A stale snapshot can therefore revert an
//! optimistic update; that race is accepted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::identity::UserId;
use crate::journey::{JourneyState, JourneyStore};
use crate::session::{Router, View};

use super::document::{DocumentPath, DocumentStore, Snapshot, SnapshotStream};

/// Handles of the running session.
struct SyncSession {
    user_id: UserId,
    listener: JoinHandle<()>,
    pusher: JoinHandle<()>,
}

pub struct RemoteSync {
    remote: Arc<dyn DocumentStore>,
    store: Arc<JourneyStore>,
    router: Arc<Router>,
    app_id: String,
    first_snapshot_seen: Arc<AtomicBool>,
    loading: Arc<watch::Sender<bool>>,
    session: Mutex<Option<SyncSession>>,
}

impl RemoteSync {
    pub fn new(
        remote: Arc<dyn DocumentStore>,
        store: Arc<JourneyStore>,
        router: Arc<Router>,
        app_id: impl Into<String>,
    ) -> Self {
        let (loading, _rx) = watch::channel(false);
        Self {
            remote,
            store,
            router,
            app_id: app_id.into(),
            first_snapshot_seen: Arc::new(AtomicBool::new(false)),
            loading: Arc::new(loading),
            session: Mutex::new(None),
        }
    }

    /// Start syncing `user_id`'s document. Replaces any running session.
    ///
    /// The session lock is held throughout, so concurrent calls run one
    /// after the other and only the last session stays alive.
    pub async fn subscribe(&self, user_id: UserId) -> Result<(), StoreError> {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            self.stop(previous).await;
        }

        let path = DocumentPath::for_user(&self.app_id, &user_id);
        self.first_snapshot_seen.store(false, Ordering::SeqCst);
        self.loading.send_replace(true);

        let stream = match self.remote.subscribe(&path).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(path = %path, error = %e, "Remote subscription failed");
                self.loading.send_replace(false);
                return Err(e);
            }
        };

        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let pusher = tokio::spawn(push_loop(
            Arc::clone(&self.remote),
            path.clone(),
            push_rx,
        ));
        // Attached before the listener starts so the session reset can push
        self.store.attach_outbox(push_tx);

        let handler = SnapshotHandler {
            store: Arc::clone(&self.store),
            router: Arc::clone(&self.router),
            first_snapshot_seen: Arc::clone(&self.first_snapshot_seen),
            loading: Arc::clone(&self.loading),
        };
        let listener = tokio::spawn(listen_loop(handler, stream, path.clone()));

        info!(
            user_id = %user_id,
            path = %path,
            backend = self.remote.name(),
            "Remote sync started"
        );

        *session = Some(SyncSession {
            user_id,
            listener,
            pusher,
        });
        Ok(())
    }

    /// Tear the session down. Pushes already queued are still delivered.
    pub async fn unsubscribe(&self) {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            self.stop(previous).await;
        }
    }

    async fn stop(&self, session: SyncSession) {
        session.listener.abort();
        // Wait for the listener to unwind so no snapshot lands after this
        let _ = session.listener.await;
        self.store.detach_outbox();
        self.first_snapshot_seen.store(false, Ordering::SeqCst);
        self.loading.send_replace(false);
        info!(user_id = %session.user_id, "Remote sync stopped");

        // The pusher ends on its own once every outbox sender is gone.
        drop(session.pusher);
    }

    /// Signed-in user being synced, if any.
    pub async fn user(&self) -> Option<UserId> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.user_id.clone())
    }

    pub fn first_snapshot_seen(&self) -> bool {
        self.first_snapshot_seen.load(Ordering::SeqCst)
    }

    /// True from subscribe until the first snapshot (or sync error).
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }
}

/// Everything the listener task needs to apply snapshots.
struct SnapshotHandler {
    store: Arc<JourneyStore>,
    router: Arc<Router>,
    first_snapshot_seen: Arc<AtomicBool>,
    loading: Arc<watch::Sender<bool>>,
}

impl SnapshotHandler {
    fn handle(&self, item: Result<Snapshot, StoreError>) {
        match item {
            Ok(snapshot) => self.apply(snapshot),
            Err(e) => warn!(error = %e, "Remote sync error; keeping last known state"),
        }
        self.loading.send_replace(false);
    }

    fn apply(&self, snapshot: Snapshot) {
        if self.first_snapshot_seen.load(Ordering::SeqCst) {
            // Remote wins from here on. A vanished document is ignored.
            match snapshot {
                Some(doc) => self.store.reconcile(doc),
                None => debug!("Remote document missing; keeping local state"),
            }
            return;
        }

        match snapshot {
            Some(doc) => {
                let reset = doc.reset_progress();
                let has_trip = reset.selected_country_id.is_some();
                if let Err(e) = self.store.reset_session(reset) {
                    warn!(error = %e, "Session reset could not be written");
                }
                info!("Existing journey found; progress reset for this session");
                if has_trip {
                    self.router.go(View::Dashboard);
                }
            }
            None => {
                info!("No journey document yet; starting trip selection");
                self.router.go(View::Country);
            }
        }
        self.first_snapshot_seen.store(true, Ordering::SeqCst);
    }
}

async fn listen_loop(handler: SnapshotHandler, mut stream: SnapshotStream, path: DocumentPath) {
    while let Some(item) = stream.next().await {
        handler.handle(item);
    }
    debug!(path = %path, "Remote snapshot stream ended");
}

async fn push_loop(
    remote: Arc<dyn DocumentStore>,
    path: DocumentPath,
    mut rx: mpsc::UnboundedReceiver<JourneyState>,
) {
    while let Some(state) = rx.recv().await {
        match remote.upsert(&path, &state).await {
            Ok(()) => debug!(path = %path, "Journey pushed"),
            Err(e) => warn!(path = %path, error = %e, "Journey push failed; local state kept"),
        }
    }
    debug!(path = %path, "Push queue drained");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::journey::{JourneyPatch, Milestone, Milestones, OptionId, UserProfile};
    use crate::sync::MemoryDocumentStore;

    const APP: &str = "test-app";

    struct Harness {
        remote: Arc<MemoryDocumentStore>,
        store: Arc<JourneyStore>,
        router: Arc<Router>,
        sync: RemoteSync,
    }

    fn harness() -> Harness {
        let remote = Arc::new(MemoryDocumentStore::new());
        let store = JourneyStore::new();
        let router = Arc::new(Router::new());
        let sync = RemoteSync::new(
            Arc::clone(&remote) as Arc<dyn DocumentStore>,
            Arc::clone(&store),
            Arc::clone(&router),
            APP,
        );
        Harness {
            remote,
            store,
            router,
            sync,
        }
    }

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn alice_path() -> DocumentPath {
        DocumentPath::for_user(APP, &alice())
    }

    fn progressed_doc() -> JourneyState {
        JourneyState {
            selected_country_id: Some("au".into()),
            selected_region: "Sydney".into(),
            departure_date: "2026-03-01".into(),
            completed: Milestones {
                profile: true,
                visa: true,
                flight: true,
                house: false,
                job: true,
            },
            user_profile: UserProfile {
                skills: vec!["barista".into()],
                career_details: "Two years behind the bar".into(),
                certificates: vec!["RSA".into()],
                ai_bio: "Seasoned barista.".into(),
            },
            hired_job_id: Some(OptionId::Number(7)),
            selected_flight_id: Some(OptionId::Number(2)),
            selected_house_id: None,
        }
    }

    async fn wait_for<F>(mut condition: F)
    where
        F: FnMut() -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn first_snapshot_resets_progress_and_pushes_it_back() {
        let h = harness();
        h.remote
            .put_raw(&alice_path(), serde_json::to_value(progressed_doc()).unwrap());

        h.sync.subscribe(alice()).await.unwrap();
        wait_for(|| h.sync.first_snapshot_seen()).await;
        wait_for(|| h.remote.write_count() == 1).await;

        let local = h.store.snapshot();
        let original = progressed_doc();
        assert_eq!(local.completed, Milestones::default());
        assert!(local.hired_job_id.is_none());
        assert!(local.selected_flight_id.is_none());
        assert!(local.selected_house_id.is_none());
        assert_eq!(local.selected_country_id, original.selected_country_id);
        assert_eq!(local.selected_region, original.selected_region);
        assert_eq!(local.departure_date, original.departure_date);
        assert_eq!(local.user_profile, original.user_profile);

        let pushed = h.remote.get(&alice_path()).await.unwrap().unwrap();
        assert_eq!(pushed, local);
        assert_eq!(h.router.current(), View::Dashboard);
        assert!(!h.sync.is_loading());
    }

    #[tokio::test]
    async fn missing_document_routes_to_selection_without_writing() {
        let h = harness();
        h.sync.subscribe(alice()).await.unwrap();
        wait_for(|| h.sync.first_snapshot_seen()).await;

        assert_eq!(h.store.snapshot(), JourneyState::default());
        assert_eq!(h.router.current(), View::Country);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.remote.write_count(), 0);

        // First explicit save creates the document
        h.store
            .save(JourneyPatch::new().with_country(Some("ca".into())).with_region("Toronto"))
            .unwrap();
        wait_for(|| h.remote.write_count() == 1).await;
        let created = h.remote.get(&alice_path()).await.unwrap().unwrap();
        assert_eq!(created.selected_region, "Toronto");
    }

    #[tokio::test]
    async fn later_snapshots_overwrite_local_state() {
        let h = harness();
        h.sync.subscribe(alice()).await.unwrap();
        wait_for(|| h.sync.first_snapshot_seen()).await;

        // Another device completes the visa; no reset this time
        let mut remote_doc = progressed_doc();
        remote_doc.completed = Milestones::default().with(Milestone::Visa, true);
        remote_doc.hired_job_id = None;
        remote_doc.selected_flight_id = None;
        h.remote
            .put_raw(&alice_path(), serde_json::to_value(&remote_doc).unwrap());

        wait_for(|| h.store.snapshot() == remote_doc).await;
        assert_eq!(h.remote.write_count(), 0);
    }

    #[tokio::test]
    async fn stale_snapshot_reverts_optimistic_update() {
        let h = harness();
        h.sync.subscribe(alice()).await.unwrap();
        wait_for(|| h.sync.first_snapshot_seen()).await;

        h.remote.set_fail_writes(true);
        h.store.set_milestone(Milestone::Visa, true).unwrap();
        assert!(h.store.snapshot().completed.visa);

        // Push failed; the next snapshot carries the old remote value
        h.remote.put_raw(
            &alice_path(),
            serde_json::to_value(JourneyState::default()).unwrap(),
        );
        wait_for(|| !h.store.snapshot().completed.visa).await;
    }

    #[tokio::test]
    async fn push_failure_keeps_local_state() {
        let h = harness();
        h.sync.subscribe(alice()).await.unwrap();
        wait_for(|| h.sync.first_snapshot_seen()).await;

        h.remote.set_fail_writes(true);
        h.store.save(JourneyPatch::new().with_region("Perth")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.store.snapshot().selected_region, "Perth");
        assert!(h.remote.raw(&alice_path()).is_none());

        // Recovery is implicit on the next successful push
        h.remote.set_fail_writes(false);
        h.store.save(JourneyPatch::new().with_departure_date("2026-04-04")).unwrap();
        wait_for(|| h.remote.write_count() == 1).await;
        let remote = h.remote.get(&alice_path()).await.unwrap().unwrap();
        assert_eq!(remote.selected_region, "Perth");
    }

    #[tokio::test]
    async fn malformed_snapshot_is_logged_and_ignored() {
        let h = harness();
        h.sync.subscribe(alice()).await.unwrap();
        wait_for(|| h.sync.first_snapshot_seen()).await;
        h.store.save(JourneyPatch::new().with_region("Munich")).unwrap();
        wait_for(|| h.remote.write_count() == 1).await;

        h.remote
            .put_raw(&alice_path(), serde_json::json!({"completed": "broken"}));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.store.snapshot().selected_region, "Munich");
    }

    #[tokio::test]
    async fn reset_happens_once_per_session() {
        let h = harness();
        h.remote
            .put_raw(&alice_path(), serde_json::to_value(progressed_doc()).unwrap());
        h.sync.subscribe(alice()).await.unwrap();
        wait_for(|| h.remote.write_count() == 1).await;

        // Progress made in this session survives later snapshots
        h.store.set_milestone(Milestone::Visa, true).unwrap();
        wait_for(|| h.remote.write_count() == 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.store.snapshot().completed.visa);
        assert!(h.sync.first_snapshot_seen());

        // A new session resets again
        h.sync.unsubscribe().await;
        assert!(!h.sync.first_snapshot_seen());
        assert!(!h.store.is_attached());
        h.sync.subscribe(alice()).await.unwrap();
        wait_for(|| h.remote.write_count() == 3).await;
        wait_for(|| !h.store.snapshot().completed.visa).await;
        assert!(!h.remote.get(&alice_path()).await.unwrap().unwrap().completed.visa);
    }

    #[tokio::test]
    async fn concurrent_subscribes_leave_one_live_session() {
        let h = harness();
        let bob = UserId::new("bob");
        let bob_path = DocumentPath::for_user(APP, &bob);

        let (first, second) = tokio::join!(h.sync.subscribe(alice()), h.sync.subscribe(bob.clone()));
        first.unwrap();
        second.unwrap();
        wait_for(|| h.sync.first_snapshot_seen()).await;

        let winner = h.sync.user().await.unwrap();
        let loser_path = if winner == bob { alice_path() } else { bob_path };

        // The replaced session's listener must not reconcile anything
        h.remote
            .put_raw(&loser_path, serde_json::to_value(progressed_doc()).unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.store.snapshot(), JourneyState::default());
        assert_eq!(h.remote.write_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_stops_reconciling() {
        let h = harness();
        h.sync.subscribe(alice()).await.unwrap();
        wait_for(|| h.sync.first_snapshot_seen()).await;
        assert_eq!(h.sync.user().await, Some(alice()));

        h.sync.unsubscribe().await;
        assert!(h.sync.user().await.is_none());

        h.remote.put_raw(
            &alice_path(),
            serde_json::to_value(progressed_doc()).unwrap(),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.store.snapshot(), JourneyState::default());
    }
}
