use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::cache::Cache;
use crate::queue::job::{Job, JobResult, JobStatus};

/// The slow external computation a worker delegates to.
///
/// Implementations must fold every failure into the returned [`JobResult`]
/// (`status = Error`, cause in `error`) and never leave a result as
/// `Running`. The pool additionally catches panics, but a well-behaved
/// processor returns a terminal result for every input.
#[async_trait::async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: Job) -> JobResult;
}

/// What happens to a job-status entry when its terminal result is read.
///
/// The original behavior is `DeleteOnRead`: the first poller to observe a
/// terminal status consumes the entry, and later polls for the same id report
/// not-found. That loses visibility for a retried poll after a dropped
/// response, so `KeepOnRead` is offered for callers that prefer to retain
/// entries for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    #[default]
    DeleteOnRead,
    KeepOnRead,
}

/// Bounded worker pool with job staging and result collection.
///
/// Construction starts everything: `workers` executor tasks pulling from a
/// jobs channel of capacity `size`, an intake forwarder implementing the
/// two-stage submission handoff, and a collector writing finished results
/// into the status store. There is no separate start call.
pub struct JobQueue {
    intake_tx: mpsc::Sender<Job>,
    results: Arc<Cache<JobResult>>,
    shutdown: CancellationToken,
    retention: RetentionPolicy,
}

impl JobQueue {
    pub fn new(size: usize, workers: usize, processor: Arc<dyn JobProcessor>) -> Self {
        Self::with_retention(size, workers, processor, RetentionPolicy::default())
    }

    pub fn with_retention(
        size: usize,
        workers: usize,
        processor: Arc<dyn JobProcessor>,
        retention: RetentionPolicy,
    ) -> Self {
        let size = size.max(1);
        let workers = workers.max(1);
        let shutdown = CancellationToken::new();
        let results = Arc::new(Cache::new());

        let (intake_tx, intake_rx) = mpsc::channel::<Job>(1);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(size);
        let (results_tx, results_rx) = mpsc::channel::<JobResult>(workers);

        tokio::spawn(forward_jobs(intake_rx, jobs_tx, shutdown.clone()));
        tokio::spawn(collect_results(results_rx, results.clone(), shutdown.clone()));

        tracing::debug!(size, workers, "starting queue workers");
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        for worker_id in 0..workers {
            tokio::spawn(run_worker(
                worker_id,
                processor.clone(),
                jobs_rx.clone(),
                results_tx.clone(),
            ));
        }

        Self {
            intake_tx,
            results,
            shutdown,
            retention,
        }
    }

    /// Submit a payload as a new job and return its id.
    ///
    /// Blocks only until the intake forwarder accepts the job, not until
    /// buffer space exists: the first submission after the staging buffer
    /// fills still returns quickly, the one after that waits for a worker to
    /// drain. Never fails and never drops a job; under shutdown the job is
    /// discarded but an id is still returned.
    pub async fn create(&self, payload: Vec<u8>) -> String {
        let job = Job::new(payload);
        let id = job.id.clone();

        // Record the running placeholder before handoff so no poller can see
        // a terminal status without Running having been visible first.
        self.results.put(&id, JobResult::running(job.clone())).await;

        tokio::select! {
            sent = self.intake_tx.send(job) => {
                if sent.is_err() {
                    tracing::info!(job_id = %id, "queue stopped, discarding job");
                    self.results.delete(&id).await;
                } else {
                    tracing::debug!(job_id = %id, "job scheduled as running");
                }
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!(job_id = %id, "shutdown during submit, discarding job");
                self.results.delete(&id).await;
            }
        }

        id
    }

    /// Look up the current result snapshot for a job id.
    ///
    /// Under [`RetentionPolicy::DeleteOnRead`] a terminal result is consumed
    /// by this call: the entry is removed and a second lookup for the same id
    /// returns `None`. Running results are returned without side effects.
    pub async fn result(&self, id: &str) -> Option<JobResult> {
        let result = self.results.get(id).await?;
        if result.status.is_terminal() && self.retention == RetentionPolicy::DeleteOnRead {
            tracing::debug!(job_id = %id, status = %result.status, "consuming terminal result");
            self.results.delete(id).await;
        }
        Some(result)
    }

    /// Request shutdown of all background tasks. Idempotent.
    ///
    /// Cancellation is broadcast through a shared token, so the forwarder,
    /// the collector and (transitively, once the jobs channel closes) every
    /// worker observe it — not just whichever task wins a receive race.
    pub fn stop(&self) {
        tracing::info!("stopping job queue");
        self.shutdown.cancel();
    }
}

/// Intake forwarder: the single pending slot between submission and the
/// bounded staging buffer.
///
/// Capacity in the jobs channel is reserved before the next job is accepted,
/// so at most one accepted job is ever waiting for a buffer slot. Dropping
/// `jobs_tx` on exit closes the jobs channel, which lets workers drain the
/// remaining buffered jobs and then terminate.
async fn forward_jobs(
    mut intake_rx: mpsc::Receiver<Job>,
    jobs_tx: mpsc::Sender<Job>,
    shutdown: CancellationToken,
) {
    loop {
        let permit = tokio::select! {
            permit = jobs_tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown.cancelled() => break,
        };

        tokio::select! {
            maybe_job = intake_rx.recv() => match maybe_job {
                Some(job) => permit.send(job),
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }
    tracing::debug!("intake forwarder exiting");
}

/// Executor loop: pull one job at a time, run the processor, emit the result.
///
/// A panicking processor is converted into a terminal error result rather
/// than killing the task; a dead worker would silently shrink the pool.
async fn run_worker(
    worker_id: usize,
    processor: Arc<dyn JobProcessor>,
    jobs_rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    results_tx: mpsc::Sender<JobResult>,
) {
    loop {
        let next = {
            let mut rx = jobs_rx.lock().await;
            rx.recv().await
        };
        let Some(job) = next else { break };

        tracing::debug!(worker_id, job_id = %job.id, "processing job");
        let result = match AssertUnwindSafe(processor.process(job.clone()))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(worker_id, job_id = %job.id, "processor panicked");
                JobResult::failed(job, "processor panicked")
            }
        };

        debug_assert!(result.status != JobStatus::Running);
        if results_tx.send(result).await.is_err() {
            // Collector is gone; we are shutting down.
            break;
        }
    }
    tracing::debug!(worker_id, "worker exiting");
}

/// Result collector: drains completed results into the status store,
/// overwriting the `Running` placeholder exactly once per job.
async fn collect_results(
    mut results_rx: mpsc::Receiver<JobResult>,
    results: Arc<Cache<JobResult>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            maybe_result = results_rx.recv() => match maybe_result {
                Some(result) => {
                    tracing::debug!(
                        job_id = %result.job.id,
                        status = %result.status,
                        "job completed"
                    );
                    results.put(result.job.id.clone(), result).await;
                }
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }
    tracing::debug!("result collector exiting");
}
