//! Generic simulator: guard, progress, commit, optional re-arm.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::journey::{JourneyStore, JourneyUpdate};

use super::{ProcessEvent, ProcessPhase, ProcessStatus};

/// One simulated procedure. `run` waits out the procedure's timings and
/// returns the update to commit.
#[async_trait]
pub trait Procedure: Send + Sync + 'static {
    type Input: Send + Sync + 'static;

    fn name(&self) -> &'static str;

    async fn run(&self, input: &Self::Input, progress: &ProgressReporter) -> JourneyUpdate;

    /// Delay after `done` before returning to `idle`; `None` stays done.
    fn rearm_after(&self) -> Option<Duration> {
        None
    }
}

/// Progress sink handed to a running procedure.
#[derive(Clone)]
pub struct ProgressReporter {
    status: Arc<watch::Sender<ProcessStatus>>,
    events: broadcast::Sender<ProcessEvent>,
}

impl ProgressReporter {
    /// Raise progress to `percent` (capped at 100). Lower values are ignored.
    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let raised = self.status.send_if_modified(|s| {
            if percent > s.progress {
                s.progress = percent;
                true
            } else {
                false
            }
        });
        if raised {
            let _ = self.events.send(ProcessEvent::Progress(percent));
        }
    }
}

pub struct ProcessSimulator<P: Procedure> {
    procedure: Arc<P>,
    store: Arc<JourneyStore>,
    status: Arc<watch::Sender<ProcessStatus>>,
    events: broadcast::Sender<ProcessEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: Procedure> ProcessSimulator<P> {
    pub fn new(procedure: P, store: Arc<JourneyStore>) -> Self {
        let (status, _rx) = watch::channel(ProcessStatus::default());
        let (events, _) = broadcast::channel(64);
        Self {
            procedure: Arc::new(procedure),
            store,
            status: Arc::new(status),
            events,
            task: Mutex::new(None),
        }
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> ProcessStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ProcessStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ProcessEvent> {
        self.events.subscribe()
    }

    /// Start a run. Returns `false` (and changes nothing) unless idle.
    pub fn start(&self, input: P::Input) -> bool {
        let claimed = self.status.send_if_modified(|s| {
            if s.phase != ProcessPhase::Idle {
                return false;
            }
            *s = ProcessStatus {
                phase: ProcessPhase::Processing,
                progress: 0,
            };
            true
        });
        let name = self.procedure.name();
        if !claimed {
            debug!(process = name, phase = %self.status().phase, "Start ignored; not idle");
            return false;
        }

        info!(process = name, "Process started");
        let _ = self.events.send(ProcessEvent::Started);

        let procedure = Arc::clone(&self.procedure);
        let store = Arc::clone(&self.store);
        let status = Arc::clone(&self.status);
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            let reporter = ProgressReporter {
                status: Arc::clone(&status),
                events: events.clone(),
            };
            let update = procedure.run(&input, &reporter).await;

            match store.apply(update) {
                Ok(_) => {
                    let _ = events.send(ProcessEvent::Committed);
                }
                Err(e) => warn!(process = name, error = %e, "Process result not committed"),
            }
            status.send_modify(|s| s.phase = ProcessPhase::Done);
            let _ = events.send(ProcessEvent::Done);
            info!(process = name, "Process done");

            if let Some(delay) = procedure.rearm_after() {
                tokio::time::sleep(delay).await;
                status.send_replace(ProcessStatus::default());
                let _ = events.send(ProcessEvent::Rearmed);
                debug!(process = name, "Process re-armed");
            }
        });
        *self.lock_task() = Some(handle);
        true
    }

    /// Stop any in-flight run and return to `idle`. Waits for the task to
    /// unwind so nothing it does lands after this returns.
    pub async fn abort_for_teardown(&self) {
        let handle = self.lock_task().take();
        if let Some(handle) = handle {
            handle.abort();
            match handle.await {
                Err(e) if e.is_cancelled() => {
                    info!(process = self.procedure.name(), "In-flight process cancelled")
                }
                Err(e) => warn!(process = self.procedure.name(), error = %e, "Process task failed"),
                Ok(()) => {}
            }
        }
        self.status.send_replace(ProcessStatus::default());
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::journey::Milestone;

    struct Quick;

    #[async_trait]
    impl Procedure for Quick {
        type Input = u8;

        fn name(&self) -> &'static str {
            "quick"
        }

        async fn run(&self, input: &u8, progress: &ProgressReporter) -> JourneyUpdate {
            progress.report(*input);
            progress.report(input / 2);
            tokio::time::sleep(Duration::from_millis(10)).await;
            JourneyUpdate::SetMilestone(Milestone::Flight, true)
        }
    }

    fn attached_store() -> (Arc<JourneyStore>, mpsc::UnboundedReceiver<crate::journey::JourneyState>) {
        let store = JourneyStore::new();
        let (tx, rx) = mpsc::unbounded_channel();
        store.attach_outbox(tx);
        (store, rx)
    }

    async fn wait_done(events: &mut broadcast::Receiver<ProcessEvent>) -> Vec<ProcessEvent> {
        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.unwrap();
            seen.push(event);
            if event == ProcessEvent::Done {
                return seen;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_ignored_while_processing() {
        let (store, _rx) = attached_store();
        let sim = ProcessSimulator::new(Quick, store.clone());
        let mut events = sim.subscribe_events();

        assert!(sim.start(40));
        assert!(!sim.start(90));
        assert_eq!(sim.status().phase, ProcessPhase::Processing);

        let seen = wait_done(&mut events).await;
        assert_eq!(
            seen,
            vec![
                ProcessEvent::Started,
                ProcessEvent::Progress(40),
                ProcessEvent::Committed,
                ProcessEvent::Done
            ]
        );
        assert_eq!(sim.status(), ProcessStatus { phase: ProcessPhase::Done, progress: 40 });
        assert!(store.snapshot().completed.flight);

        // Done without re-arm stays done
        assert!(!sim.start(10));
        sim.abort_for_teardown().await;
        assert_eq!(sim.status(), ProcessStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_commit_still_finishes() {
        // No outbox: the store refuses updates
        let store = JourneyStore::new();
        let sim = ProcessSimulator::new(Quick, store.clone());
        let mut events = sim.subscribe_events();

        sim.start(100);
        let seen = wait_done(&mut events).await;
        assert!(!seen.contains(&ProcessEvent::Committed));
        assert_eq!(sim.status().phase, ProcessPhase::Done);
        assert!(!store.snapshot().completed.flight);
    }

    struct Slow;

    #[async_trait]
    impl Procedure for Slow {
        type Input = ();

        fn name(&self) -> &'static str {
            "slow"
        }

        async fn run(&self, _input: &(), progress: &ProgressReporter) -> JourneyUpdate {
            progress.report(20);
            tokio::time::sleep(Duration::from_secs(5)).await;
            JourneyUpdate::SetMilestone(Milestone::Visa, true)
        }

        fn rearm_after(&self) -> Option<Duration> {
            Some(Duration::from_secs(1))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_running_process_before_commit() {
        let (store, mut rx) = attached_store();
        let sim = ProcessSimulator::new(Slow, store.clone());
        let mut events = sim.subscribe_events();

        assert!(sim.start(()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sim.status(), ProcessStatus { phase: ProcessPhase::Processing, progress: 20 });

        sim.abort_for_teardown().await;
        assert_eq!(sim.status(), ProcessStatus::default());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!store.snapshot().completed.visa);
        assert!(rx.try_recv().is_err());
        assert_eq!(sim.status(), ProcessStatus::default());

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen, vec![ProcessEvent::Started, ProcessEvent::Progress(20)]);

        // A fresh run is accepted after teardown
        assert!(sim.start(()));
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_rearm() {
        let (store, _rx) = attached_store();
        let sim = ProcessSimulator::new(Slow, store.clone());
        let mut events = sim.subscribe_events();

        sim.start(());
        wait_done(&mut events).await;
        assert!(store.snapshot().completed.visa);

        sim.abort_for_teardown().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert_eq!(sim.status(), ProcessStatus::default());
    }

    #[tokio::test]
    async fn teardown_without_a_run_is_a_no_op() {
        let (store, _rx) = attached_store();
        let sim = ProcessSimulator::new(Quick, store);
        sim.abort_for_teardown().await;
        assert_eq!(sim.status(), ProcessStatus::default());
    }
}
