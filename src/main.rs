use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bar_service::cache::Cache;
use bar_service::client::FooClient;
use bar_service::config::ServiceConfig;
use bar_service::queue::{JobQueue, RetentionPolicy};
use bar_service::server::{run_server, AppState};
use bar_service::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "bar-service")]
#[command(version)]
#[command(about = "Job dispatch service that proxies slow foo-service computations")]
struct Args {
    /// Address to listen on
    #[arg(short = 'b', long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Base URL of the foo-service
    #[arg(long, default_value = "http://localhost:3001")]
    foo_url: String,

    /// Number of concurrent workers
    #[arg(short = 'w', long, default_value = "100")]
    workers: usize,

    /// Capacity of the job staging buffer
    #[arg(short = 'j', long, default_value = "1000")]
    queue_size: usize,

    /// Keep terminal job results readable after the first poll instead of
    /// consuming them
    #[arg(long)]
    keep_results: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting bar-service");

    let config = ServiceConfig {
        listen_addr: args.bind,
        foo_base_url: args.foo_url,
        workers: args.workers,
        queue_size: args.queue_size,
        retention: if args.keep_results {
            RetentionPolicy::KeepOnRead
        } else {
            RetentionPolicy::DeleteOnRead
        },
    };

    let processor = Arc::new(FooClient::new(config.foo_base_url.clone()));
    let queue = Arc::new(JobQueue::with_retention(
        config.queue_size,
        config.workers,
        processor,
        config.retention,
    ));
    let state = AppState {
        queue: queue.clone(),
        payload_results: Arc::new(Cache::new()),
    };

    let shutdown = install_shutdown_handler();
    let served = run_server(config.listen_addr, state, shutdown).await;

    queue.stop();
    tracing::info!("exiting");
    served.map_err(Into::into)
}
