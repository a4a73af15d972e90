//! Single-client TCP line-streaming server.
//!
//! This crate provides a small stimulus generator for stream-processing tests:
//! it binds a port, waits for exactly one consumer, and then pushes one line of
//! text per tick until stopped or until the consumer goes away.
//!
//! # WARNING: TEST-ONLY
//!
//! The server is NOT a general purpose TCP server:
//! - One client per run, no reconnects
//! - No backpressure or acknowledgements
//! - Plain newline-delimited text only
//!
//! # Example
//!
//! ```ignore
//! use linestream_server::{LineStreamingServer, ServerConfig};
//!
//! let server = LineStreamingServer::bind(ServerConfig::new(9999, 100), || "hello".to_string()).await?;
//! let handle = server.stop_handle();
//!
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.stop();
//! });
//!
//! let summary = server.run().await;
//! ```
//!
//! Then consume the stream with `nc localhost 9999`.

mod config;
mod error;
mod producer;
mod server;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use producer::LineProducer;
pub use server::{LineStreamingServer, RunSummary, ServerState, SessionOutcome, StopHandle};
