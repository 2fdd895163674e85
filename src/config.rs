use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Tool mode: measuring client or traffic-source server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Server mode - accepts connections and sends bulk data
    Server,
    /// Client mode - connects, receives data, and measures throughput
    Client,
}

/// Configuration for a quicperf run.
///
/// Use the builder-style methods to customize a client or server setup.
///
/// # Examples
///
/// ```
/// use quicperf::Config;
/// use std::time::Duration;
///
/// let client = Config::client("10.0.0.2".to_string(), 4433)
///     .with_duration(Duration::from_secs(30));
///
/// let server = Config::server(4433)
///     .with_chunk_size(128 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server mode or client mode
    pub mode: Mode,

    /// Port to connect to (client) or listen on (server)
    pub port: u16,

    /// Server address (for client mode)
    pub server_addr: Option<String>,

    /// Bind address (for server mode)
    pub bind_addr: Option<IpAddr>,

    /// Measurement window in whole seconds (client mode)
    pub duration: Duration,

    /// Size of the chunks the server writes onto the stream
    pub chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Client,
            port: 4433,
            server_addr: None,
            bind_addr: None,
            duration: Duration::from_secs(10),
            chunk_size: 256 * 1024, // 256 KB
        }
    }
}

impl Config {
    /// Creates a new server configuration listening on `port`.
    pub fn server(port: u16) -> Self {
        Self {
            mode: Mode::Server,
            port,
            ..Default::default()
        }
    }

    /// Creates a new client configuration targeting `server_addr:port`.
    pub fn client(server_addr: String, port: u16) -> Self {
        Self {
            mode: Mode::Client,
            server_addr: Some(server_addr),
            port,
            ..Default::default()
        }
    }

    /// Sets the measurement window. Sub-second precision is truncated;
    /// the reporter works in whole seconds.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the server's write chunk size in bytes (default: 256 KB).
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Binds the server to a specific local address.
    pub fn with_bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_defaults() {
        let config = Config::client("127.0.0.1".to_string(), 4433);
        assert_eq!(config.mode, Mode::Client);
        assert_eq!(config.duration, Duration::from_secs(10));
        assert_eq!(config.server_addr.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn builder_overrides() {
        let config = Config::server(5000)
            .with_chunk_size(1024)
            .with_bind_addr("127.0.0.1".parse().unwrap());
        assert_eq!(config.mode, Mode::Server);
        assert_eq!(config.chunk_size, 1024);
        assert!(config.bind_addr.is_some());
    }
}
