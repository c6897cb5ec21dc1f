//! Async client for router command gateways.
//!
//! The router is driven by plain CLI commands (`ip filter 10 pass * * tcp`,
//! `no ip filter 10`, `show config | grep ...`). This crate sends them through
//! an HTTP command gateway and classifies the textual responses:
//!
//! - [`GatewayClient`]: batched command execution with Basic auth
//! - [`CommandRunner`]: the seam the engine drives, implemented by the client
//! - [`TransportConfig`]: TLS and timeout settings shared by every client

pub mod client;
pub mod error;
pub mod runner;
pub mod transport;

pub use client::GatewayClient;
pub use error::Error;
pub use runner::{CommandRunner, output_indicates_error};
pub use transport::{TlsMode, TransportConfig};
