//! udp-perf - one-way delay, jitter and throughput over UDP
//!
//! A client sends a continuous stream of fixed-size datagrams, each stamped
//! with its send time and a sequence number. A server receives the stream,
//! derives one-way delay and smoothed jitter, counts size and ordering errors,
//! and reports aggregate throughput once a stop condition is met. A TCP
//! control connection carries the server's termination message back to the
//! client, independently of the lossy datagram path.
//!
//! # Features
//!
//! - Unshaped datagram stream at whatever rate the socket accepts
//! - Stop conditions on elapsed time, packet count or byte count
//! - Min/avg/max one-way delay and RFC 3550 style smoothed jitter
//! - Concise, verbose and JSON reports
//! - Asynchronous I/O using tokio

pub mod client;
pub mod config;
pub mod error;
pub mod measurements;
pub mod protocol;
pub mod report;
pub mod server;
pub mod udp_packet;

pub use client::Client;
pub use config::{Config, Mode};
pub use error::{Error, Result};
pub use measurements::{DelayStats, Observation, Session, StopConditions, StopReason};
pub use report::Report;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
