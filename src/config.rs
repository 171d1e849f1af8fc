use std::net::SocketAddr;

use crate::queue::RetentionPolicy;

/// Process configuration for the bar-service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP server listens on.
    pub listen_addr: SocketAddr,
    /// Base URL of the foo-service, e.g. "http://localhost:3001".
    pub foo_base_url: String,
    /// Number of concurrent workers.
    pub workers: usize,
    /// Capacity of the job staging buffer.
    pub queue_size: usize,
    /// What happens to a job-status entry on terminal read.
    pub retention: RetentionPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "127.0.0.1:3000"
                .parse()
                .expect("default listen address is valid"),
            foo_base_url: "http://localhost:3001".to_string(),
            workers: 100,
            queue_size: 1000,
            retention: RetentionPolicy::default(),
        }
    }
}
