//! Run queue and worker
//!
//! Push events are recorded in the [`RunRegistry`] and handed to the
//! [`RunWorker`] through a [`RunQueue`]. The worker executes up to
//! `max_parallel_runs` runs at a time, each in its own task.

use async_trait::async_trait;
use chrono::Utc;
use slipway_core::domain::{DeploymentOutcome, PipelineRun, RepositoryRef, RunStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Executes a pipeline run
///
/// Implemented by [`crate::Pipeline`]; tests substitute their own.
#[async_trait]
pub trait RunExecutor: Send + Sync {
    async fn execute(&self, repo: &RepositoryRef) -> Result<DeploymentOutcome, String>;
}

/// Finished runs kept by [`RunRegistry::new`]
pub const DEFAULT_RETAINED_RUNS: usize = 100;

/// In-memory record of the runs since startup
///
/// Queued and running runs are always kept. Once more than `max_retained`
/// runs are recorded, the oldest finished runs are dropped.
#[derive(Debug, Clone)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<Uuid, PipelineRun>>>,
    max_retained: usize,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_RUNS)
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(max_retained: usize) -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            max_retained: max_retained.max(1),
        }
    }

    /// Records a new queued run, evicting the oldest finished runs past the limit
    pub async fn enqueue(&self, repo: RepositoryRef) -> PipelineRun {
        let run = PipelineRun::queued(repo);
        let mut runs = self.runs.write().await;
        runs.insert(run.id, run.clone());
        Self::evict(&mut runs, self.max_retained);
        run
    }

    fn evict(runs: &mut HashMap<Uuid, PipelineRun>, max_retained: usize) {
        let excess = runs.len().saturating_sub(max_retained);
        if excess == 0 {
            return;
        }

        let mut finished: Vec<_> = runs
            .values()
            .filter(|run| run.status.is_terminal())
            .map(|run| (run.requested_at, run.id))
            .collect();
        finished.sort();

        for (_, id) in finished.into_iter().take(excess) {
            runs.remove(&id);
            debug!("Evicted run {} from the registry", id);
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<PipelineRun> {
        self.runs.read().await.get(&id).cloned()
    }

    /// All runs, most recently requested first
    pub async fn list(&self) -> Vec<PipelineRun> {
        let mut runs: Vec<PipelineRun> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        runs
    }

    pub async fn mark_running(&self, id: Uuid) {
        self.update(id, |run| {
            run.status = RunStatus::Running;
            run.started_at = Some(Utc::now());
        })
        .await;
    }

    pub async fn mark_succeeded(&self, id: Uuid, outcome: DeploymentOutcome) {
        self.update(id, |run| {
            run.status = RunStatus::Succeeded;
            run.completed_at = Some(Utc::now());
            run.outcome = Some(outcome);
        })
        .await;
    }

    pub async fn mark_failed(&self, id: Uuid, error: String) {
        self.update(id, |run| {
            run.status = RunStatus::Failed;
            run.completed_at = Some(Utc::now());
            run.error = Some(error);
        })
        .await;
    }

    async fn update(&self, id: Uuid, apply: impl FnOnce(&mut PipelineRun)) {
        match self.runs.write().await.get_mut(&id) {
            Some(run) => apply(run),
            None => warn!("Run {} is not registered", id),
        }
    }
}

/// A run handed to the worker
#[derive(Debug, Clone)]
pub struct QueuedRun {
    pub id: Uuid,
    pub repository: RepositoryRef,
}

/// Submits runs to the worker
#[derive(Debug, Clone)]
pub struct RunQueue {
    registry: RunRegistry,
    sender: mpsc::UnboundedSender<QueuedRun>,
}

impl RunQueue {
    /// Creates the queue and the receiving end for [`RunWorker`]
    pub fn new(registry: RunRegistry) -> (Self, mpsc::UnboundedReceiver<QueuedRun>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { registry, sender }, receiver)
    }

    /// Registers a run for a push event and queues it for execution
    pub async fn submit(&self, repo: RepositoryRef) -> PipelineRun {
        let run = self.registry.enqueue(repo).await;
        info!("Queued run {} for {}", run.id, run.repository);

        let queued = QueuedRun {
            id: run.id,
            repository: run.repository.clone(),
        };
        if self.sender.send(queued).is_err() {
            error!("Run worker has stopped, run {} will not execute", run.id);
            self.registry
                .mark_failed(run.id, "run worker is not running".to_string())
                .await;
            return self.registry.get(run.id).await.unwrap_or(run);
        }

        run
    }
}

/// Executes queued runs with bounded parallelism
pub struct RunWorker {
    registry: RunRegistry,
    executor: Arc<dyn RunExecutor>,
    semaphore: Arc<Semaphore>,
}

impl RunWorker {
    pub fn new(
        registry: RunRegistry,
        executor: Arc<dyn RunExecutor>,
        max_parallel_runs: usize,
    ) -> Self {
        Self {
            registry,
            executor,
            semaphore: Arc::new(Semaphore::new(max_parallel_runs.max(1))),
        }
    }

    /// Consumes the queue until every sender is dropped
    ///
    /// Waits for the runs still executing before returning.
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<QueuedRun>) {
        info!(
            "Starting run worker (max parallel runs: {})",
            self.semaphore.available_permits()
        );

        let mut handles = Vec::new();

        while let Some(queued) = receiver.recv().await {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let registry = self.registry.clone();
            let executor = Arc::clone(&self.executor);

            handles.retain(|handle: &tokio::task::JoinHandle<()>| !handle.is_finished());
            handles.push(tokio::spawn(async move {
                Self::execute_run(registry, executor, queued).await;
                drop(permit);
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Run task panicked: {}", e);
            }
        }

        info!("Run worker stopped");
    }

    async fn execute_run(registry: RunRegistry, executor: Arc<dyn RunExecutor>, queued: QueuedRun) {
        info!("Starting run {} for {}", queued.id, queued.repository);
        registry.mark_running(queued.id).await;

        match executor.execute(&queued.repository).await {
            Ok(outcome) => {
                info!(
                    "Run {} succeeded: {} {}",
                    queued.id, outcome.action, outcome.application
                );
                registry.mark_succeeded(queued.id, outcome).await;
            }
            Err(e) => {
                error!("Run {} failed: {}", queued.id, e);
                registry.mark_failed(queued.id, e).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::domain::DeployAction;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Succeeds for `main`, fails for every other branch
    #[derive(Default)]
    struct FakeExecutor {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RunExecutor for FakeExecutor {
        async fn execute(&self, repo: &RepositoryRef) -> Result<DeploymentOutcome, String> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if repo.branch != "main" {
                return Err(format!("build failed for {}", repo.branch));
            }
            Ok(DeploymentOutcome {
                model: "repo-main-00000000".to_string(),
                application: "svc".to_string(),
                image: "localhost:32000/app:1.0".to_string(),
                action: DeployAction::Deployed,
            })
        }
    }

    fn repo(branch: &str) -> RepositoryRef {
        RepositoryRef::new("https://example.com/org/repo.git", branch)
    }

    async fn wait_for_terminal(registry: &RunRegistry, id: Uuid) -> PipelineRun {
        for _ in 0..200 {
            if let Some(run) = registry.get(id).await {
                if run.status.is_terminal() {
                    return run;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {id} did not finish");
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let registry = RunRegistry::new();
        let run = registry.enqueue(repo("main")).await;
        assert_eq!(run.status, RunStatus::Queued);

        registry.mark_running(run.id).await;
        let running = registry.get(run.id).await.unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert!(running.started_at.is_some());

        registry.mark_failed(run.id, "boom".to_string()).await;
        let failed = registry.get(run.id).await.unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.completed_at.is_some());

        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let registry = RunRegistry::new();
        let first = registry.enqueue(repo("main")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = registry.enqueue(repo("dev")).await;

        let ids: Vec<Uuid> = registry.list().await.iter().map(|run| run.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_worker_records_outcomes() {
        let registry = RunRegistry::new();
        let (queue, receiver) = RunQueue::new(registry.clone());
        let worker = RunWorker::new(registry.clone(), Arc::new(FakeExecutor::default()), 2);
        let worker_handle = tokio::spawn(worker.run(receiver));

        let ok = queue.submit(repo("main")).await;
        let bad = queue.submit(repo("dev")).await;
        assert_eq!(ok.status, RunStatus::Queued);

        let ok = wait_for_terminal(&registry, ok.id).await;
        assert_eq!(ok.status, RunStatus::Succeeded);
        assert_eq!(ok.outcome.unwrap().application, "svc");

        let bad = wait_for_terminal(&registry, bad.id).await;
        assert_eq!(bad.status, RunStatus::Failed);
        assert_eq!(bad.error.as_deref(), Some("build failed for dev"));

        drop(queue);
        worker_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_bounds_parallelism() {
        let registry = RunRegistry::new();
        let (queue, receiver) = RunQueue::new(registry.clone());
        let executor = Arc::new(FakeExecutor::default());
        let worker = RunWorker::new(registry.clone(), executor.clone(), 2);
        let worker_handle = tokio::spawn(worker.run(receiver));

        let mut ids = Vec::new();
        for _ in 0..6 {
            ids.push(queue.submit(repo("main")).await.id);
        }
        drop(queue);
        worker_handle.await.unwrap();

        for id in ids {
            assert_eq!(registry.get(id).await.unwrap().status, RunStatus::Succeeded);
        }
        assert!(executor.peak.load(Ordering::SeqCst) <= 2);
        assert!(executor.peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_submit_without_worker_fails_run() {
        let registry = RunRegistry::new();
        let (queue, receiver) = RunQueue::new(registry.clone());
        drop(receiver);

        let run = queue.submit(repo("main")).await;
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("run worker is not running"));
    }

    #[tokio::test]
    async fn test_registry_evicts_oldest_finished_runs() {
        let registry = RunRegistry::with_retention(2);

        let first = registry.enqueue(repo("a")).await;
        registry.mark_failed(first.id, "x".repeat(4096)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = registry.enqueue(repo("b")).await;
        registry.mark_failed(second.id, "boom".to_string()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let third = registry.enqueue(repo("c")).await;

        assert!(registry.get(first.id).await.is_none());
        assert!(registry.get(second.id).await.is_some());
        assert!(registry.get(third.id).await.is_some());
        assert_eq!(registry.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_registry_keeps_active_runs_past_limit() {
        let registry = RunRegistry::with_retention(1);

        let queued = registry.enqueue(repo("a")).await;
        let running = registry.enqueue(repo("b")).await;
        registry.mark_running(running.id).await;
        let newest = registry.enqueue(repo("c")).await;

        for id in [queued.id, running.id, newest.id] {
            assert!(registry.get(id).await.is_some());
        }

        let outcome = DeploymentOutcome {
            model: "repo-b-00000000".to_string(),
            application: "svc".to_string(),
            image: "localhost:32000/app:1.0".to_string(),
            action: DeployAction::Refreshed,
        };
        registry.mark_succeeded(running.id, outcome).await;
        registry.enqueue(repo("d")).await;
        assert!(registry.get(running.id).await.is_none());
        assert!(registry.get(queued.id).await.is_some());
    }
}
