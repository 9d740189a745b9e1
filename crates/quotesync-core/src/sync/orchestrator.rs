//! Sync orchestrator
//!
//! Drives the sync cycle: fetch remote quotes, reconcile them into the
//! repository, then push the local list back. A cycle runs once at startup
//! and then on a fixed interval, or on demand through [`SyncHandle`].
//!
//! Only one cycle (or eager push) runs at a time. A second request while one
//! is in flight is skipped without touching the network or the repository.
//!
//! Interactive conflict resolution runs on the blocking pool with the
//! repository unlocked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::gateway::{FetchOutcome, PushOutcome, RemoteGateway};
use super::reconciler::{ConflictPolicy, MergeReport, Reconciler};
use crate::error::TransportError;
use crate::models::Quote;
use crate::repository::QuoteRepository;

/// Repository shared between the orchestrator and the user-facing side
pub type SharedRepository = Arc<Mutex<QuoteRepository>>;

/// Orchestrator status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
}

/// Events emitted by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Status changed
    StatusChanged(SyncStatus),
    /// Remote quotes changed the local list; views should refresh
    QuotesUpdated(MergeReport),
    /// Local list was pushed
    Pushed,
    /// Push failed (logged, not fatal)
    PushFailed(String),
    /// Fetch failed (logged, not fatal)
    FetchFailed(String),
    /// A request was dropped because another one was running
    Skipped,
}

/// Result of a single sync cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was in flight; nothing was done
    Skipped,
    Completed {
        report: MergeReport,
        /// Whether the remote could be read
        fetched: bool,
        /// Whether the local list reached the remote
        pushed: bool,
    },
}

/// Commands sent to the sync task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    /// Run a full cycle now
    SyncNow,
    /// Stop the sync task
    Shutdown,
}

/// Coordinates gateway, reconciler and repository
pub struct SyncOrchestrator {
    repo: SharedRepository,
    gateway: Arc<dyn RemoteGateway>,
    reconciler: Reconciler,
    request_timeout: Duration,
    busy: AtomicBool,
    status_tx: watch::Sender<SyncStatus>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SyncEvent>>,
}

/// Clears the busy flag and reports `Idle` when dropped
struct BusyGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
}

impl<'a> BusyGuard<'a> {
    fn acquire(orchestrator: &'a SyncOrchestrator) -> Option<Self> {
        orchestrator
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        orchestrator.set_status(SyncStatus::Syncing);
        Some(Self { orchestrator })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.busy.store(false, Ordering::Release);
        self.orchestrator.set_status(SyncStatus::Idle);
    }
}

impl SyncOrchestrator {
    pub fn new(
        repo: SharedRepository,
        gateway: Arc<dyn RemoteGateway>,
        reconciler: Reconciler,
        request_timeout: Duration,
    ) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            repo,
            gateway,
            reconciler,
            request_timeout,
            busy: AtomicBool::new(false),
            status_tx,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (only the first call returns it)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.event_rx.take()
    }

    pub fn status(&self) -> SyncStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    pub fn repository(&self) -> &SharedRepository {
        &self.repo
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run one fetch, reconcile, push cycle
    ///
    /// The push happens whether or not the merge changed anything, so local
    /// additions since the last push still reach the remote.
    pub async fn run_sync_cycle(&self) -> CycleOutcome {
        let Some(_guard) = BusyGuard::acquire(self) else {
            debug!("Sync cycle skipped, another one is in flight");
            self.emit(SyncEvent::Skipped);
            return CycleOutcome::Skipped;
        };

        let outcome = match timeout(self.request_timeout, self.gateway.fetch_remote()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let reason = self.timeout_error().to_string();
                warn!("Fetch timed out: {}", reason);
                FetchOutcome::Unavailable(reason)
            }
        };

        let fetched = outcome.is_available();
        if let FetchOutcome::Unavailable(reason) = &outcome {
            // Cause already logged at warn
            debug!("Continuing without remote quotes: {}", reason);
            self.emit(SyncEvent::FetchFailed(reason.clone()));
        }
        let remote = outcome.into_quotes();

        let report = self.reconcile(&remote).await;
        if report.changed() {
            self.emit(SyncEvent::QuotesUpdated(report));
        }

        let pushed = self.push_snapshot().await;

        info!(
            "Sync cycle done: fetched={} remote={} added={} conflicts={} pushed={}",
            fetched,
            remote.len(),
            report.added,
            report.conflicts(),
            pushed
        );

        CycleOutcome::Completed {
            report,
            fetched,
            pushed,
        }
    }

    /// Push the local list right away, without fetching
    ///
    /// Returns `None` when a cycle was already running; that cycle's own
    /// push carries the current list.
    pub async fn push_now(&self) -> Option<bool> {
        let Some(_guard) = BusyGuard::acquire(self) else {
            debug!("Eager push skipped, a cycle is in flight");
            self.emit(SyncEvent::Skipped);
            return None;
        };

        Some(self.push_snapshot().await)
    }

    /// Spawn the periodic sync task
    ///
    /// The first cycle runs immediately, later ones every `interval`. Ticks
    /// missed while a cycle was running are skipped rather than queued.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> SyncHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        let task = tokio::spawn(sync_task_loop(self, interval, command_rx));
        SyncHandle { command_tx, task }
    }

    async fn reconcile(&self, remote: &[Quote]) -> MergeReport {
        let ConflictPolicy::Interactive(resolver) = self.reconciler.policy() else {
            let mut repo = self.repo.lock().await;
            return self.reconciler.merge(&mut repo, remote);
        };

        let conflicts = {
            let repo = self.repo.lock().await;
            self.reconciler.conflicts(&repo, remote)
        };

        let answers = if conflicts.is_empty() {
            HashMap::new()
        } else {
            let resolver = resolver.clone();
            let asked = tokio::task::spawn_blocking(move || {
                conflicts
                    .into_iter()
                    .map(|conflict| {
                        let take_remote = resolver.take_remote(&conflict);
                        (conflict, take_remote)
                    })
                    .collect::<HashMap<_, _>>()
            });
            match asked.await {
                Ok(answers) => answers,
                Err(e) => {
                    warn!("Conflict resolver failed, keeping local categories: {}", e);
                    HashMap::new()
                }
            }
        };

        let mut repo = self.repo.lock().await;
        self.reconciler.merge_resolved(&mut repo, remote, &answers)
    }

    async fn push_snapshot(&self) -> bool {
        // Lock only long enough to copy; never across the request
        let snapshot = self.repo.lock().await.list().to_vec();

        let outcome = match timeout(self.request_timeout, self.gateway.push_local(&snapshot)).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                let reason = self.timeout_error().to_string();
                warn!("Push timed out: {}", reason);
                PushOutcome::Failed(reason)
            }
        };

        match outcome {
            PushOutcome::Pushed => {
                debug!("Pushed {} quotes", snapshot.len());
                self.emit(SyncEvent::Pushed);
                true
            }
            PushOutcome::Failed(reason) => {
                debug!("Push not delivered: {}", reason);
                self.emit(SyncEvent::PushFailed(reason));
                false
            }
        }
    }

    fn timeout_error(&self) -> TransportError {
        TransportError::Timeout {
            secs: self.request_timeout.as_secs(),
        }
    }

    fn set_status(&self, status: SyncStatus) {
        self.status_tx.send_replace(status);
        self.emit(SyncEvent::StatusChanged(status));
    }

    fn emit(&self, event: SyncEvent) {
        // Nobody listening is fine
        let _ = self.event_tx.send(event);
    }
}

/// Handle to control the periodic sync task
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Request a full cycle
    pub async fn sync_now(&self) {
        let _ = self.command_tx.send(SyncCommand::SyncNow).await;
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(SyncCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!("Sync task ended abnormally: {}", e);
        }
    }
}

async fn sync_task_loop(
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
    mut command_rx: mpsc::Receiver<SyncCommand>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            // First tick completes immediately
            _ = ticker.tick() => {
                orchestrator.run_sync_cycle().await;
            }
            cmd = command_rx.recv() => {
                match cmd {
                    Some(SyncCommand::SyncNow) => {
                        orchestrator.run_sync_cycle().await;
                    }
                    Some(SyncCommand::Shutdown) | None => break,
                }
            }
        }
    }

    debug!("Sync task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::tests::quote;
    use crate::sync::reconciler::Conflict;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockGateway {
        remote: Vec<Quote>,
        fail_fetch: bool,
        fail_push: bool,
        hang_fetch: bool,
        gate: Option<Arc<Notify>>,
        fetch_calls: AtomicUsize,
        pushes: std::sync::Mutex<Vec<Vec<Quote>>>,
    }

    impl MockGateway {
        fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        fn pushes(&self) -> Vec<Vec<Quote>> {
            self.pushes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteGateway for MockGateway {
        async fn fetch_remote(&self) -> FetchOutcome {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.hang_fetch {
                std::future::pending::<()>().await;
            }
            if self.fail_fetch {
                FetchOutcome::Unavailable("connection refused".to_string())
            } else {
                FetchOutcome::Fetched(self.remote.clone())
            }
        }

        async fn push_local(&self, quotes: &[Quote]) -> PushOutcome {
            self.pushes.lock().unwrap().push(quotes.to_vec());
            if self.fail_push {
                PushOutcome::Failed("HTTP 500".to_string())
            } else {
                PushOutcome::Pushed
            }
        }
    }

    fn orchestrator(
        gateway: Arc<MockGateway>,
        local: Vec<Quote>,
        request_timeout: Duration,
    ) -> SyncOrchestrator {
        orchestrator_with(gateway, local, Reconciler::server_wins(), request_timeout)
    }

    fn orchestrator_with(
        gateway: Arc<MockGateway>,
        local: Vec<Quote>,
        reconciler: Reconciler,
        request_timeout: Duration,
    ) -> SyncOrchestrator {
        let repo = QuoteRepository::with_quotes(Arc::new(MemoryStore::new()), local);
        SyncOrchestrator::new(
            Arc::new(Mutex::new(repo)),
            gateway,
            reconciler,
            request_timeout,
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_cycle_merges_and_pushes() {
        let gateway = Arc::new(MockGateway {
            remote: vec![quote("A", "Y"), quote("B", "Z")],
            ..Default::default()
        });
        let mut orch = orchestrator(gateway.clone(), vec![quote("A", "X")], Duration::from_secs(5));
        let mut events = orch.take_events().unwrap();

        let outcome = orch.run_sync_cycle().await;

        let CycleOutcome::Completed {
            report,
            fetched,
            pushed,
        } = outcome
        else {
            panic!("expected a completed cycle");
        };
        assert!(fetched && pushed);
        assert_eq!(report.added, 1);
        assert_eq!(report.conflicts_taken_remote, 1);

        let expected = vec![quote("A", "Y"), quote("B", "Z")];
        assert_eq!(orch.repository().lock().await.list(), expected.as_slice());
        assert_eq!(gateway.pushes(), vec![expected]);

        assert_eq!(
            drain(&mut events),
            vec![
                SyncEvent::StatusChanged(SyncStatus::Syncing),
                SyncEvent::QuotesUpdated(report),
                SyncEvent::Pushed,
                SyncEvent::StatusChanged(SyncStatus::Idle),
            ]
        );
    }

    #[tokio::test]
    async fn test_unchanged_cycle_still_pushes() {
        let gateway = Arc::new(MockGateway {
            remote: vec![quote("A", "X")],
            ..Default::default()
        });
        let mut orch = orchestrator(
            gateway.clone(),
            vec![quote("A", "X"), quote("local", "L")],
            Duration::from_secs(5),
        );
        let mut events = orch.take_events().unwrap();

        orch.run_sync_cycle().await;

        assert_eq!(gateway.pushes().len(), 1);
        assert_eq!(gateway.pushes()[0].len(), 2);
        assert!(!drain(&mut events)
            .iter()
            .any(|e| matches!(e, SyncEvent::QuotesUpdated(_))));
    }

    #[tokio::test]
    async fn test_fetch_failure_still_pushes_and_returns_idle() {
        let gateway = Arc::new(MockGateway {
            fail_fetch: true,
            ..Default::default()
        });
        let mut orch = orchestrator(gateway.clone(), vec![quote("A", "X")], Duration::from_secs(5));
        let mut events = orch.take_events().unwrap();

        let outcome = orch.run_sync_cycle().await;

        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                report: MergeReport::default(),
                fetched: false,
                pushed: true,
            }
        );
        assert_eq!(orch.repository().lock().await.list(), &[quote("A", "X")]);
        assert_eq!(gateway.pushes(), vec![vec![quote("A", "X")]]);
        assert_eq!(orch.status(), SyncStatus::Idle);
        assert!(!orch.is_busy());
        assert!(drain(&mut events).contains(&SyncEvent::FetchFailed(
            "connection refused".to_string()
        )));
    }

    #[tokio::test]
    async fn test_push_failure_is_not_fatal() {
        let gateway = Arc::new(MockGateway {
            fail_push: true,
            ..Default::default()
        });
        let orch = orchestrator(gateway.clone(), vec![quote("A", "X")], Duration::from_secs(5));

        let outcome = orch.run_sync_cycle().await;

        assert!(matches!(
            outcome,
            CycleOutcome::Completed { pushed: false, .. }
        ));
        assert_eq!(orch.status(), SyncStatus::Idle);

        // Next cycle runs normally
        orch.run_sync_cycle().await;
        assert_eq!(gateway.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_reentrant_cycle_is_skipped() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(MockGateway {
            remote: vec![quote("B", "Z")],
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let orch = Arc::new(orchestrator(
            gateway.clone(),
            vec![quote("A", "X")],
            Duration::from_secs(5),
        ));

        let first = tokio::spawn({
            let orch = orch.clone();
            async move { orch.run_sync_cycle().await }
        });
        while gateway.fetch_calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(orch.status(), SyncStatus::Syncing);

        let second = orch.run_sync_cycle().await;
        assert_eq!(second, CycleOutcome::Skipped);
        assert_eq!(orch.push_now().await, None);
        assert_eq!(gateway.fetch_calls(), 1);
        assert!(gateway.pushes().is_empty());
        assert_eq!(orch.repository().lock().await.len(), 1);

        gate.notify_one();
        let first = first.await.unwrap();
        assert!(matches!(first, CycleOutcome::Completed { .. }));
        assert_eq!(gateway.pushes().len(), 1);
        assert_eq!(orch.repository().lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_clears_busy_flag() {
        let gateway = Arc::new(MockGateway {
            hang_fetch: true,
            ..Default::default()
        });
        let orch = orchestrator(gateway.clone(), vec![quote("A", "X")], Duration::from_millis(50));

        let outcome = orch.run_sync_cycle().await;

        assert!(matches!(
            outcome,
            CycleOutcome::Completed { fetched: false, pushed: true, .. }
        ));
        assert!(!orch.is_busy());
        assert_eq!(orch.status(), SyncStatus::Idle);

        orch.run_sync_cycle().await;
        assert_eq!(gateway.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_cycle_clears_busy_flag() {
        let gateway = Arc::new(MockGateway {
            hang_fetch: true,
            ..Default::default()
        });
        let orch = orchestrator(gateway, vec![], Duration::from_secs(60));

        let cancelled = timeout(Duration::from_millis(20), orch.run_sync_cycle()).await;
        assert!(cancelled.is_err());
        assert!(!orch.is_busy());
        assert_eq!(orch.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_push_now_pushes_without_fetching() {
        let gateway = Arc::new(MockGateway::default());
        let orch = orchestrator(gateway.clone(), vec![quote("A", "X")], Duration::from_secs(5));

        assert_eq!(orch.push_now().await, Some(true));
        assert_eq!(gateway.fetch_calls(), 0);
        assert_eq!(gateway.pushes(), vec![vec![quote("A", "X")]]);
    }

    #[tokio::test]
    async fn test_interactive_cycle_applies_answers() {
        let gateway = Arc::new(MockGateway {
            remote: vec![quote("A", "Y"), quote("B", "Y"), quote("C", "Z")],
            ..Default::default()
        });
        let resolver = |c: &Conflict| c.text == "A";
        let orch = orchestrator_with(
            gateway.clone(),
            vec![quote("A", "X"), quote("B", "X")],
            Reconciler::new(ConflictPolicy::Interactive(Arc::new(resolver))),
            Duration::from_secs(5),
        );

        let outcome = orch.run_sync_cycle().await;

        let CycleOutcome::Completed { report, .. } = outcome else {
            panic!("expected a completed cycle");
        };
        assert_eq!(report.added, 1);
        assert_eq!(report.conflicts_taken_remote, 1);
        assert_eq!(report.conflicts_kept_local, 1);
        let expected = vec![quote("A", "Y"), quote("B", "X"), quote("C", "Z")];
        assert_eq!(orch.repository().lock().await.list(), expected.as_slice());
        assert_eq!(gateway.pushes(), vec![expected]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_slow_resolver_does_not_stall_runtime() {
        let gateway = Arc::new(MockGateway {
            remote: vec![quote("A", "Y")],
            ..Default::default()
        });
        let asked = Arc::new(AtomicBool::new(false));
        let flag = asked.clone();
        let resolver = move |_: &Conflict| {
            flag.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1500));
            true
        };
        let orch = Arc::new(orchestrator_with(
            gateway.clone(),
            vec![quote("A", "X")],
            Reconciler::new(ConflictPolicy::Interactive(Arc::new(resolver))),
            Duration::from_secs(5),
        ));

        let cycle = tokio::spawn({
            let orch = orch.clone();
            async move { orch.run_sync_cycle().await }
        });
        timeout(Duration::from_secs(5), async {
            while !asked.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // Timers still fire and the repository stays usable while the
        // resolver blocks
        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(started.elapsed() < Duration::from_millis(1000));
        let len = timeout(Duration::from_millis(500), async {
            orch.repository().lock().await.len()
        })
        .await
        .unwrap();
        assert_eq!(len, 1);

        let outcome = cycle.await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Completed { .. }));
        assert_eq!(orch.repository().lock().await.list(), &[quote("A", "Y")]);
    }

    #[tokio::test]
    async fn test_spawned_task_runs_immediately_and_on_command() {
        let gateway = Arc::new(MockGateway::default());
        let orch = Arc::new(orchestrator(
            gateway.clone(),
            vec![quote("A", "X")],
            Duration::from_secs(5),
        ));
        let status = orch.subscribe_status();

        let handle = orch.clone().spawn(Duration::from_secs(3600));

        timeout(Duration::from_secs(5), async {
            while gateway.pushes().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(gateway.fetch_calls(), 1);

        handle.sync_now().await;
        timeout(Duration::from_secs(5), async {
            while gateway.fetch_calls() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        handle.shutdown().await;
        assert_eq!(*status.borrow(), SyncStatus::Idle);
        assert!(!orch.is_busy());
    }
}
