//! Debounced index rebuild scheduling.
//!
//! # Architecture
//!
//! 1. Mutation events arrive through [`RebuildCoordinator::notify_mutation`],
//!    directly or from an attached [`EventBus`]
//! 2. Only local archive events for this repository pass the filter
//! 3. The first accepted event for an idle base path records its deadline and
//!    queues a [`RebuildRequest`]; later events for that path are coalesced
//!    until the rebuild starts
//! 4. One worker task per repository waits for each deadline in turn and runs
//!    the rebuild inside a store transaction
//!
//! The index the coordinator writes is itself a mutation, but it classifies
//! as an index document and never re-enters the debounce.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rrepo_core::error::{RepoError, Result};
use rrepo_core::path::{base_path, classify, normalize};
use rrepo_core::types::{AssetKind, MutationEvent};
use rrepo_index::{IndexDocument, PackageIndexBuilder};
use rrepo_storage::{EventBus, Store};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

/// Rebuild lifecycle of one base path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildState {
    Idle,
    Debouncing,
    Rebuilding,
}

/// What happened to a notified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Started a new debounce window
    Scheduled,
    /// Folded into a window that is already open
    Coalesced,
    /// Filtered out, or the coordinator is shut down
    Rejected,
}

/// A queued rebuild of one base path.
#[derive(Debug, Clone)]
pub struct RebuildRequest {
    pub repository_id: String,
    pub base_path: String,
    pub enqueued_at: DateTime<Utc>,
    due: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildStatus {
    Completed { packages: usize },
    Failed { reason: String },
}

/// Result of one rebuild, broadcast to outcome subscribers.
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub repository_id: String,
    pub base_path: String,
    pub status: RebuildStatus,
    pub finished_at: DateTime<Utc>,
}

impl RebuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RebuildStatus::Completed { .. })
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub events_coalesced: u64,
    pub rebuilds_scheduled: u64,
    pub rebuilds_completed: u64,
    pub rebuilds_failed: u64,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    coalesced: AtomicU64,
    scheduled: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            events_accepted: self.accepted.load(Ordering::Relaxed),
            events_rejected: self.rejected.load(Ordering::Relaxed),
            events_coalesced: self.coalesced.load(Ordering::Relaxed),
            rebuilds_scheduled: self.scheduled.load(Ordering::Relaxed),
            rebuilds_completed: self.completed.load(Ordering::Relaxed),
            rebuilds_failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    repository_id: String,
    store: Arc<dyn Store>,
    debounce: Duration,
    /// Base paths in `Debouncing`, with their deadline
    pending: DashMap<String, Instant>,
    /// Base path the worker is rebuilding right now
    rebuilding: Mutex<Option<String>>,
    requests: RwLock<Option<mpsc::UnboundedSender<RebuildRequest>>>,
    outcomes: broadcast::Sender<RebuildOutcome>,
    counters: Counters,
}

impl Inner {
    /// Base path of an event that should trigger a rebuild, or why not.
    fn admit(&self, event: &MutationEvent) -> std::result::Result<String, &'static str> {
        if !event.is_local_origin {
            return Err("relayed from another node");
        }
        if event.repository_id != self.repository_id {
            return Err("belongs to another repository");
        }
        match classify(&event.path) {
            Ok(AssetKind::Archive) => Ok(base_path(normalize(&event.path)).to_string()),
            Ok(_) => Err("not an archive"),
            Err(_) => Err("unclassifiable path"),
        }
    }

    fn notify_mutation(&self, event: &MutationEvent) -> Admission {
        let base = match self.admit(event) {
            Ok(base) => base,
            Err(reason) => {
                Counters::bump(&self.counters.rejected);
                debug!(
                    "Ignoring {:?} of {} in {}: {}",
                    event.change_type, event.path, event.repository_id, reason
                );
                return Admission::Rejected;
            }
        };
        Counters::bump(&self.counters.accepted);

        let admission = self.schedule(base).unwrap_or(Admission::Rejected);
        if admission == Admission::Coalesced {
            trace!("Coalesced {} into pending rebuild", event.path);
        }
        admission
    }

    /// Open a debounce window for `base`, or fold into the open one.
    ///
    /// Returns `None` once the worker is stopped.
    fn schedule(&self, base: String) -> Option<Admission> {
        let due = match self.pending.entry(base.clone()) {
            Entry::Occupied(_) => {
                Counters::bump(&self.counters.coalesced);
                return Some(Admission::Coalesced);
            }
            Entry::Vacant(slot) => {
                let due = Instant::now() + self.debounce;
                slot.insert(due);
                due
            }
        };

        let request = RebuildRequest {
            repository_id: self.repository_id.clone(),
            base_path: base.clone(),
            enqueued_at: Utc::now(),
            due,
        };

        let sent = self
            .requests
            .read()
            .as_ref()
            .is_some_and(|tx| tx.send(request).is_ok());

        if !sent {
            self.pending.remove(&base);
            warn!(
                "Rebuild coordinator for {} is stopped, dropping rebuild of {}",
                self.repository_id, base
            );
            return None;
        }

        Counters::bump(&self.counters.scheduled);
        debug!(
            "Scheduled rebuild of {} in {} after {:?}",
            base, self.repository_id, self.debounce
        );
        Some(Admission::Scheduled)
    }

    /// Schedule every directory that holds archives.
    async fn resync(&self) -> Result<usize> {
        let tx = self.store.begin().await?;
        let bases = tx.archive_base_paths().await?;
        drop(tx);

        let mut scheduled = 0;
        for base in bases {
            if self.schedule(base) == Some(Admission::Scheduled) {
                scheduled += 1;
            }
        }
        Ok(scheduled)
    }

    fn state_of(&self, base: &str) -> RebuildState {
        let base = normalize(base).trim_end_matches('/');
        if self.pending.contains_key(base) {
            RebuildState::Debouncing
        } else if self.rebuilding.lock().as_deref() == Some(base) {
            RebuildState::Rebuilding
        } else {
            RebuildState::Idle
        }
    }

    async fn process(&self, request: RebuildRequest) {
        // Events from here on open a fresh window
        self.pending.remove(&request.base_path);
        *self.rebuilding.lock() = Some(request.base_path.clone());

        let started = Instant::now();
        let result = rebuild_index(self.store.as_ref(), &request.base_path).await;
        *self.rebuilding.lock() = None;

        let status = match result {
            Ok(doc) => {
                Counters::bump(&self.counters.completed);
                info!(
                    "Rebuilt index for {} in {}: {} packages in {:?}",
                    request.base_path,
                    self.repository_id,
                    doc.len(),
                    started.elapsed()
                );
                RebuildStatus::Completed { packages: doc.len() }
            }
            Err(e) => {
                Counters::bump(&self.counters.failed);
                error!(
                    "Failed to rebuild index for {} in {}: {}",
                    request.base_path, self.repository_id, e
                );
                RebuildStatus::Failed { reason: e.to_string() }
            }
        };

        let _ = self.outcomes.send(RebuildOutcome {
            repository_id: request.repository_id,
            base_path: request.base_path,
            status,
            finished_at: Utc::now(),
        });
    }
}

/// Schedules and runs `PACKAGES` rebuilds for one repository.
pub struct RebuildCoordinator {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl RebuildCoordinator {
    /// Create a coordinator and spawn its worker task.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(repository_id: impl Into<String>, store: Arc<dyn Store>, debounce: Duration) -> Self {
        let repository_id = repository_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let (outcomes, _) = broadcast::channel(256);

        let inner = Arc::new(Inner {
            repository_id,
            store,
            debounce,
            pending: DashMap::new(),
            rebuilding: Mutex::new(None),
            requests: RwLock::new(Some(tx)),
            outcomes,
            counters: Counters::default(),
        });

        let worker = tokio::spawn(Self::rebuild_worker(Arc::clone(&inner), rx));
        info!(
            "Rebuild coordinator started for {} with {}ms debounce",
            inner.repository_id,
            debounce.as_millis()
        );

        Self {
            inner,
            worker: Mutex::new(Some(worker)),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn repository_id(&self) -> &str {
        &self.inner.repository_id
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Feed one mutation event through the acceptance filter and debounce.
    ///
    /// Never blocks; safe to call from any number of tasks.
    pub fn notify_mutation(&self, event: &MutationEvent) -> Admission {
        self.inner.notify_mutation(event)
    }

    pub fn state_of(&self, base_path: &str) -> RebuildState {
        self.inner.state_of(base_path)
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.inner.counters.snapshot()
    }

    /// Schedule a rebuild of every directory currently holding archives.
    ///
    /// Used to recover after events were lost. Directories already in a
    /// debounce window are coalesced. Returns the number newly scheduled.
    pub async fn resync(&self) -> Result<usize> {
        self.inner.resync().await
    }

    /// Receive an outcome for every rebuild finished from now on
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<RebuildOutcome> {
        self.inner.outcomes.subscribe()
    }

    /// Forward every event published on `bus` into [`notify_mutation`](Self::notify_mutation).
    pub fn attach(&self, bus: &EventBus) {
        let mut rx = bus.subscribe();
        let inner = Arc::clone(&self.inner);

        let listener = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        inner.notify_mutation(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            "Rebuild coordinator for {} lagged by {} events, rescheduling all directories",
                            inner.repository_id, n
                        );
                        match inner.resync().await {
                            Ok(scheduled) => debug!(
                                "Resync of {} scheduled {} rebuilds",
                                inner.repository_id, scheduled
                            ),
                            Err(e) => error!("Resync of {} failed: {}", inner.repository_id, e),
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed for {}", inner.repository_id);
                        break;
                    }
                }
            }
        });

        self.listeners.lock().push(listener);
    }

    /// Detach from event buses and stop the worker once queued rebuilds finish.
    pub async fn shutdown(&self) {
        for listener in self.listeners.lock().drain(..) {
            listener.abort();
        }
        self.inner.requests.write().take();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Rebuild worker for {} ended abnormally: {}", self.inner.repository_id, e);
            }
        }
        info!("Rebuild coordinator stopped for {}", self.inner.repository_id);
    }

    async fn rebuild_worker(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<RebuildRequest>) {
        // The debounce is constant, so arrival order is deadline order
        let mut queue: VecDeque<RebuildRequest> = VecDeque::new();
        let mut open = true;

        loop {
            if !open && queue.is_empty() {
                break;
            }

            let next_due = queue.front().map(|request| request.due);

            tokio::select! {
                received = rx.recv(), if open => match received {
                    Some(request) => queue.push_back(request),
                    None => open = false,
                },

                _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                    if let Some(request) = queue.pop_front() {
                        inner.process(request).await;
                    }
                }
            }
        }

        debug!("Rebuild worker for {} drained", inner.repository_id);
    }
}

impl Drop for RebuildCoordinator {
    fn drop(&mut self) {
        for listener in self.listeners.get_mut().drain(..) {
            listener.abort();
        }
        if let Some(worker) = self.worker.get_mut().take() {
            worker.abort();
        }
    }
}

/// Rebuild `{base_path}/PACKAGES.gz` from the archives currently stored.
///
/// Runs inside one store transaction; on any failure the transaction is
/// dropped uncommitted and the previous index stays in place.
///
/// # Errors
///
/// Returns `RebuildFailed` wrapping the underlying store or codec error.
pub async fn rebuild_index(store: &dyn Store, base_path: &str) -> Result<IndexDocument> {
    let base = normalize(base_path).trim_end_matches('/');

    let attempt = async {
        let mut tx = store.begin().await?;
        let archives = tx.enumerate_archives(base).await?;
        let doc = PackageIndexBuilder::build(base, &archives)?;
        tx.write_index_document(&doc.base_path, doc.serialized_bytes.clone())
            .await?;
        tx.commit().await?;
        Ok::<_, RepoError>(doc)
    };

    attempt
        .await
        .map_err(|e| RepoError::rebuild_failed(base, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rrepo_core::types::ChangeType;
    use rrepo_storage::MemoryStore;

    fn coordinator(debounce_ms: u64) -> RebuildCoordinator {
        RebuildCoordinator::spawn(
            "r-hosted",
            Arc::new(MemoryStore::new("r-hosted")),
            Duration::from_millis(debounce_ms),
        )
    }

    fn event(path: &str) -> MutationEvent {
        MutationEvent::local("r-hosted", path, ChangeType::Created)
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_rejects_non_archives_and_foreign_events() {
        let coordinator = coordinator(1000);

        assert_eq!(coordinator.notify_mutation(&event("src/contrib/PACKAGES.gz")), Admission::Rejected);
        assert_eq!(coordinator.notify_mutation(&event("src/contrib/meta.rds")), Admission::Rejected);
        assert_eq!(coordinator.notify_mutation(&event("nonsense")), Admission::Rejected);
        assert_eq!(
            coordinator.notify_mutation(&MutationEvent::remote("r-hosted", "src/contrib/a_1.0.tar.gz", ChangeType::Created)),
            Admission::Rejected
        );
        assert_eq!(
            coordinator.notify_mutation(&MutationEvent::local("other", "src/contrib/a_1.0.tar.gz", ChangeType::Created)),
            Admission::Rejected
        );

        assert_eq!(coordinator.state_of("src/contrib"), RebuildState::Idle);
        assert_eq!(coordinator.stats().events_rejected, 5);
        assert_eq!(coordinator.stats().rebuilds_scheduled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_event_coalesces() {
        let coordinator = coordinator(1000);

        assert_eq!(coordinator.notify_mutation(&event("src/contrib/a_1.0.tar.gz")), Admission::Scheduled);
        assert_eq!(coordinator.notify_mutation(&event("/src/contrib/b_1.0.tar.gz")), Admission::Coalesced);
        assert_eq!(coordinator.state_of("src/contrib/"), RebuildState::Debouncing);

        let stats = coordinator.stats();
        assert_eq!(stats.events_accepted, 2);
        assert_eq!(stats.events_coalesced, 1);
        assert_eq!(stats.rebuilds_scheduled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_to_idle_after_rebuild() {
        let coordinator = coordinator(1000);
        let mut outcomes = coordinator.subscribe_outcomes();

        coordinator.notify_mutation(&event("src/contrib/a_1.0.tar.gz"));
        let outcome = outcomes.recv().await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.base_path, "src/contrib");
        assert_eq!(coordinator.state_of("src/contrib"), RebuildState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_finishes_queued_rebuilds() {
        let coordinator = coordinator(5000);
        coordinator.notify_mutation(&event("src/contrib/a_1.0.tar.gz"));

        coordinator.shutdown().await;

        assert_eq!(coordinator.stats().rebuilds_completed, 1);
        assert_eq!(coordinator.notify_mutation(&event("src/contrib/b_1.0.tar.gz")), Admission::Rejected);
        assert_eq!(coordinator.state_of("src/contrib"), RebuildState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_notifications_schedule_once() {
        const CALLERS: u64 = 32;

        let coordinator = Arc::new(coordinator(500));
        let mut outcomes = coordinator.subscribe_outcomes();
        let barrier = Arc::new(tokio::sync::Barrier::new(CALLERS as usize));

        let handles: Vec<_> = (0..CALLERS)
            .map(|i| {
                let coordinator = Arc::clone(&coordinator);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    coordinator.notify_mutation(&event(&format!("src/contrib/p{}_1.0.tar.gz", i)))
                })
            })
            .collect();

        let mut admissions = Vec::new();
        for handle in handles {
            admissions.push(handle.await.unwrap());
        }

        let scheduled = admissions.iter().filter(|a| **a == Admission::Scheduled).count();
        assert_eq!(scheduled, 1);

        assert!(outcomes.recv().await.unwrap().is_success());
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = coordinator.stats();
        assert_eq!(stats.events_accepted, CALLERS);
        assert_eq!(stats.events_coalesced, CALLERS - 1);
        assert_eq!(stats.rebuilds_scheduled, 1);
        assert_eq!(stats.rebuilds_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_schedules_every_archive_directory() {
        let store = Arc::new(MemoryStore::new("r-hosted"));
        for path in ["src/contrib/a_1.0.tar.gz", "bin/macosx/contrib/4.3/a_1.0.tgz"] {
            let descriptor = rrepo_core::types::ArchiveDescriptor::archive(path, "a", "1.0", Default::default());
            store.put_archive(descriptor, Vec::new(), None).await.unwrap();
        }

        let coordinator = RebuildCoordinator::spawn("r-hosted", store.clone(), Duration::from_millis(1000));
        let mut outcomes = coordinator.subscribe_outcomes();

        assert_eq!(coordinator.notify_mutation(&event("src/contrib/a_1.0.tar.gz")), Admission::Scheduled);
        assert_eq!(coordinator.resync().await.unwrap(), 1);
        assert_eq!(coordinator.state_of("bin/macosx/contrib/4.3"), RebuildState::Debouncing);

        let mut rebuilt = vec![
            outcomes.recv().await.unwrap().base_path,
            outcomes.recv().await.unwrap().base_path,
        ];
        rebuilt.sort();
        assert_eq!(rebuilt, vec!["bin/macosx/contrib/4.3", "src/contrib"]);
        assert!(store.get_asset("bin/macosx/contrib/4.3/PACKAGES.gz").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rebuild_index_writes_document() {
        let store = MemoryStore::new("r-hosted");
        let doc = rebuild_index(&store, "/src/contrib/").await.unwrap();

        assert!(doc.is_empty());
        let stored = store.get_asset("src/contrib/PACKAGES.gz").await.unwrap().unwrap();
        assert_eq!(stored.bytes, doc.serialized_bytes);
    }
}
