//! quicperf - single-stream QUIC throughput measurement
//!
//! This library measures the inbound throughput of one QUIC data stream:
//! a client connects to a bulk-sender server, counts the bytes arriving
//! on the stream, and prints one bandwidth report line per elapsed
//! second until the configured window is over.
//!
//! # Features
//!
//! - Per-second and cumulative bitrate reports with human-scaled units
//! - Measurement window starts at the first received byte
//! - Built-in traffic-source server for the other end of the pair
//! - Asynchronous I/O using tokio and quinn

pub mod client;
pub mod config;
pub mod error;
pub mod reporter;
pub mod server;
pub mod stream_ingest;
pub mod tls;
pub mod transport;

pub use client::{Client, QuinnTransport};
pub use config::{Config, Mode};
pub use error::{Error, Result};
pub use reporter::{format_bitrate, Phase, RateReporter};
pub use server::Server;
pub use stream_ingest::{StreamCallbacks, StreamIngest};
pub use transport::{
    CancelSession, EngineCtx, SessionControl, StreamHandle, StreamTransport, TickTimer,
    TimerFacility,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Single request byte the client writes to ask the server for traffic.
pub const START_REQUEST: u8 = 0x01;
