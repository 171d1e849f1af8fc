//! Integration tests for the job queue core: submission, polling, one-shot
//! result consumption, retention policy, and shutdown.


use std::sync::Arc;
use std::time::Duration;

use bar_service::queue::{JobQueue, JobStatus, RetentionPolicy};
use test_harness::{
    poll_until_terminal, EchoProcessor, FailProcessor, GatedProcessor, PanicProcessor,
};

const POLL_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_create_returns_distinct_ids_for_identical_payloads() {
    let queue = JobQueue::new(10, 2, Arc::new(EchoProcessor));

    let first = queue.create(b"{\"n\":1}".to_vec()).await;
    let second = queue.create(b"{\"n\":1}".to_vec()).await;

    assert!(!first.is_empty());
    assert!(!second.is_empty());
    assert_ne!(first, second, "identical payloads must not share a job id");
    queue.stop();
}

#[tokio::test]
async fn test_running_visible_before_terminal_status() {
    let processor = GatedProcessor::new();
    let gate = processor.gate.clone();
    let queue = JobQueue::new(10, 2, Arc::new(processor));

    let id = queue.create(b"abc".to_vec()).await;

    // The worker is blocked on the gate, so the snapshot must report Running.
    let snapshot = queue.result(&id).await.expect("running entry must exist");
    assert_eq!(snapshot.status, JobStatus::Running);

    // A running read must not consume the entry.
    let again = queue.result(&id).await.expect("still present");
    assert_eq!(again.status, JobStatus::Running);

    gate.add_permits(1);
    let result = poll_until_terminal(&queue, &id, POLL_TIMEOUT)
        .await
        .expect("job should finish");
    assert_eq!(result.status, JobStatus::Finished);
    assert_eq!(result.body, b"abc");
    queue.stop();
}

// The reference scenario: 2 workers, buffer size 1, echo processor.
#[tokio::test]
async fn test_echo_job_finished_then_consumed() {
    let queue = JobQueue::new(1, 2, Arc::new(EchoProcessor));

    let id = queue.create(b"abc".to_vec()).await;

    let result = poll_until_terminal(&queue, &id, POLL_TIMEOUT)
        .await
        .expect("job should finish");
    assert_eq!(result.status, JobStatus::Finished);
    assert_eq!(result.body, b"abc");
    assert!(result.error.is_none());

    // Terminal result was consumed by the read above.
    assert!(queue.result(&id).await.is_none());
    queue.stop();
}

#[tokio::test]
async fn test_failed_job_reports_error_then_consumed() {
    let queue = JobQueue::new(10, 2, Arc::new(FailProcessor::new("timeout")));

    let id = queue.create(b"bad".to_vec()).await;

    let result = poll_until_terminal(&queue, &id, POLL_TIMEOUT)
        .await
        .expect("job should fail terminally");
    assert_eq!(result.status, JobStatus::Error);
    let cause = result.error.expect("error cause must be set");
    assert!(cause.contains("timeout"), "unexpected cause: {cause}");

    // Errored jobs follow the same one-shot consumption rule as finished ones.
    assert!(queue.result(&id).await.is_none());
    queue.stop();
}

#[tokio::test]
async fn test_keep_on_read_retains_terminal_results() {
    let queue = JobQueue::with_retention(
        10,
        2,
        Arc::new(EchoProcessor),
        RetentionPolicy::KeepOnRead,
    );

    let id = queue.create(b"abc".to_vec()).await;

    let first = poll_until_terminal(&queue, &id, POLL_TIMEOUT)
        .await
        .expect("job should finish");
    assert_eq!(first.status, JobStatus::Finished);

    let second = queue.result(&id).await.expect("entry must be retained");
    assert_eq!(second.status, JobStatus::Finished);
    assert_eq!(second.body, b"abc");
    queue.stop();
}

#[tokio::test]
async fn test_processor_panic_becomes_error_result() {
    let queue = JobQueue::new(10, 1, Arc::new(PanicProcessor));

    let id = queue.create(b"boom".to_vec()).await;

    let result = poll_until_terminal(&queue, &id, POLL_TIMEOUT)
        .await
        .expect("panicked job should still produce a terminal result");
    assert_eq!(result.status, JobStatus::Error);
    assert!(result.error.expect("cause").contains("panicked"));

    // The single worker must have survived the panic and still process jobs.
    let next = queue.create(b"boom again".to_vec()).await;
    let result = poll_until_terminal(&queue, &next, POLL_TIMEOUT)
        .await
        .expect("worker should survive a processor panic");
    assert_eq!(result.status, JobStatus::Error);
    queue.stop();
}

#[tokio::test]
async fn test_concurrent_jobs_keep_independent_results() {
    let processor = GatedProcessor::new();
    let gate = processor.gate.clone();
    let started = processor.started.clone();
    let queue = JobQueue::new(10, 2, Arc::new(processor));

    let first = queue.create(b"first".to_vec()).await;
    let second = queue.create(b"second".to_vec()).await;

    // Both workers hold a job; completion order is unspecified, but each id
    // must map to its own payload's result.
    test_harness::assert_eventually(
        || async { started.load(std::sync::atomic::Ordering::SeqCst) == 2 },
        POLL_TIMEOUT,
        "both workers should pick up a job",
    )
    .await;
    gate.add_permits(2);

    let first_result = poll_until_terminal(&queue, &first, POLL_TIMEOUT)
        .await
        .expect("first job should finish");
    let second_result = poll_until_terminal(&queue, &second, POLL_TIMEOUT)
        .await
        .expect("second job should finish");
    assert_eq!(first_result.body, b"first");
    assert_eq!(second_result.body, b"second");
    queue.stop();
}

#[tokio::test]
async fn test_stop_is_idempotent_and_unblocks_submissions() {
    let processor = GatedProcessor::new();
    let queue = JobQueue::new(1, 1, Arc::new(processor));

    // Fill the pool: one held by the worker, one buffered, one at intake.
    for _ in 0..3 {
        let _ = tokio::time::timeout(Duration::from_secs(1), queue.create(b"x".to_vec())).await;
    }

    queue.stop();
    queue.stop();

    // With shutdown broadcast, a submission must not hang even though the
    // buffer is full and no worker will ever drain it.
    let id = tokio::time::timeout(Duration::from_secs(1), queue.create(b"late".to_vec()))
        .await
        .expect("create must not block after stop");
    assert!(!id.is_empty());

    // The discarded job leaves no status entry behind.
    test_harness::assert_eventually(
        || async { queue.result(&id).await.is_none() },
        Duration::from_secs(1),
        "job submitted after stop should not be tracked",
    )
    .await;
}
