use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Finished,
    Error,
}

impl JobStatus {
    /// Any status other than `Running`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Finished => write!(f, "finished"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// A unit of submitted work. Immutable once created.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub payload: Vec<u8>,
}

/// Tie-breaker for jobs created with identical payloads inside the same
/// clock tick.
static JOB_SEQ: AtomicU64 = AtomicU64::new(0);

impl Job {
    /// Create a job with a fresh unique id.
    ///
    /// The id hashes the payload together with the creation timestamp and a
    /// process-wide sequence number, so byte-identical payloads submitted
    /// concurrently still receive distinct ids. Contrast with
    /// [`payload_hash`], which is stable across submissions.
    pub fn new(payload: Vec<u8>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&payload);
        hasher.update(
            Utc::now()
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        hasher.update(JOB_SEQ.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        Self {
            id: hex::encode(hasher.finalize()),
            payload,
        }
    }
}

/// Hash over raw payload bytes only (no timestamp). Identical payloads
/// submitted at different times share one hash, which is what makes the
/// payload-result cache deduplicate across time.
pub fn payload_hash(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// The outcome record for a job.
///
/// Created as `Running` when the job is accepted, overwritten exactly once by
/// the result collector when a worker finishes, never mutated after that.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job: Job,
    pub body: Vec<u8>,
    pub status: JobStatus,
    pub error: Option<String>,
}

impl JobResult {
    pub fn running(job: Job) -> Self {
        Self {
            job,
            body: Vec::new(),
            status: JobStatus::Running,
            error: None,
        }
    }

    pub fn finished(job: Job, body: Vec<u8>) -> Self {
        Self {
            job,
            body,
            status: JobStatus::Finished,
            error: None,
        }
    }

    pub fn failed(job: Job, error: impl Into<String>) -> Self {
        Self {
            job,
            body: Vec::new(),
            status: JobStatus::Error,
            error: Some(error.into()),
        }
    }
}
