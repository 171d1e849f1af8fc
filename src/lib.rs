pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod queue;
pub mod server;
pub mod shutdown;
