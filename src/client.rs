use std::time::Duration;

use serde::Deserialize;

use crate::error::{BarError, Result};
use crate::queue::{Job, JobProcessor, JobResult};

/// HTTP timeout for a single foo-service call. The pool imposes no per-job
/// timeout of its own, so this is the only bound on how long a worker blocks.
const FOO_TIMEOUT: Duration = Duration::from_secs(5);

/// Shape of a job payload: `{"n": <int>}`.
#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub n: i64,
}

/// Response envelope of the foo-service:
/// `<fooServiceResponse><result><foo>…</foo></result></fooServiceResponse>`.
#[derive(Debug, Deserialize)]
struct FooServiceResponse {
    result: FooResult,
}

#[derive(Debug, Deserialize)]
struct FooResult {
    foo: String,
}

/// Client for the slow foo-service computation.
///
/// Implements [`JobProcessor`]: every failure path (bad payload, transport
/// error, error status, malformed XML) is folded into a terminal error
/// result, so nothing ever escapes the worker that runs it.
pub struct FooClient {
    http: reqwest::Client,
    base_url: String,
}

impl FooClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FOO_TIMEOUT)
            .build()
            .expect("failed to build http client");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, job: &Job) -> Result<Vec<u8>> {
        let request: JobRequest = serde_json::from_slice(&job.payload)?;

        let url = format!("{}/job/{}", self.base_url, request.n);
        tracing::debug!(job_id = %job.id, url = %url, "requesting foo-service");

        let response = self.http.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BarError::FooStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: FooServiceResponse = quick_xml::de::from_str(&body)?;
        Ok(parsed.result.foo.into_bytes())
    }
}

#[async_trait::async_trait]
impl JobProcessor for FooClient {
    async fn process(&self, job: Job) -> JobResult {
        match self.fetch(&job).await {
            Ok(body) => JobResult::finished(job, body),
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "foo-service call failed");
                JobResult::failed(job, e.to_string())
            }
        }
    }
}
