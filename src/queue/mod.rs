//! Job dispatch engine: bounded worker pool, two-stage intake backpressure,
//! and the transient job-status store.

pub mod job;
pub mod pool;

pub use job::{payload_hash, Job, JobResult, JobStatus};
pub use pool::{JobProcessor, JobQueue, RetentionPolicy};
