//! Measuring client: connects to a quicperf server, opens the single
//! data stream, and drives the ingest adapter from one event loop.
//!
//! The loop interleaves three sources on a single task: the repeating
//! report timer, inbound stream chunks, and the peer's STOP_SENDING
//! notification. Because the branches never run concurrently, the
//! reporter's state is mutated without any locking.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use log::{debug, info, trace};
use tokio::net::lookup_host;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::reporter::RateReporter;
use crate::stream_ingest::{StreamCallbacks, StreamIngest};
use crate::tls;
use crate::transport::{CancelSession, EngineCtx, StreamHandle, StreamTransport, TickTimer};
use crate::{Error, Result, START_REQUEST};

/// Upper bound on bytes taken from the stream per read. Only affects how
/// often the ingest callback fires, not what it counts.
const READ_CHUNK_BYTES: usize = 1024 * 1024;

/// TLS server name presented on connect; the verifier ignores it.
const SERVER_NAME: &str = "quicperf";

/// Receive-side acknowledgment against the quinn engine.
///
/// quinn credits the stream's flow-control window as chunks are consumed
/// by the read calls, so the primitive here only has to track what the
/// harness consumed.
#[derive(Debug, Default)]
pub struct QuinnTransport {
    acked_bytes: u64,
}

impl QuinnTransport {
    pub fn acked_bytes(&self) -> u64 {
        self.acked_bytes
    }
}

impl StreamTransport for QuinnTransport {
    fn ack_received(&mut self, stream: StreamHandle, len: usize) {
        self.acked_bytes += len as u64;
        trace!(
            "acknowledged {} bytes on stream {} ({} total)",
            len,
            stream,
            self.acked_bytes
        );
    }
}

/// Throughput-measuring QUIC client.
///
/// # Examples
///
/// ```no_run
/// use quicperf::{Client, Config};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::client("192.168.1.100".to_string(), 4433)
///     .with_duration(Duration::from_secs(10));
///
/// let client = Client::new(config)?;
/// client.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: Config,
    session: CancelSession,
}

impl Client {
    /// Creates a client from a configuration with a server address set.
    pub fn new(config: Config) -> Result<Self> {
        if config.server_addr.is_none() {
            return Err(Error::Config(
                "Server address is required for client mode".to_string(),
            ));
        }
        Ok(Self {
            config,
            session: CancelSession::new(),
        })
    }

    /// Token that observers can use to learn when the measurement window
    /// has elapsed (or to abort the run early).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.session.token()
    }

    /// Connects, requests traffic, and measures until the configured
    /// window elapses. Returns once the connection has been closed.
    pub async fn run(&self) -> Result<()> {
        let remote = self.resolve_server().await?;
        info!("connecting to quicperf server at {}", remote);

        let bind_ip: IpAddr = if remote.is_ipv4() {
            Ipv4Addr::UNSPECIFIED.into()
        } else {
            Ipv6Addr::UNSPECIFIED.into()
        };
        let mut endpoint = quinn::Endpoint::client(SocketAddr::new(bind_ip, 0))?;
        endpoint.set_default_client_config(tls::client_config()?);

        let connection = endpoint.connect(remote, SERVER_NAME)?.await?;
        info!("connected to {}", connection.remote_address());

        let (mut send, mut recv) = connection.open_bi().await?;
        send.write_all(&[START_REQUEST]).await?;

        let handle = StreamHandle(recv.id().index());
        let mut ingest = StreamIngest::new(RateReporter::new(self.config.duration.as_secs()));
        ingest.on_stream_open(handle)?;

        let mut transport = QuinnTransport::default();
        let tick_timer = TickTimer::new();
        let mut timer_handle = tick_timer.clone();
        let mut session = self.session.clone();
        let cancelled = self.session.token();

        // The read arm is disabled after FIN or reset; the timer keeps
        // ticking so the report cadence and termination are unaffected.
        let mut recv_open = true;
        let mut stop_pending = true;

        loop {
            tokio::select! {
                _ = tick_timer.tick() => {
                    ingest.reporter_mut().tick(&mut session);
                }
                chunk = recv.read_chunk(READ_CHUNK_BYTES, true), if recv_open => {
                    match chunk {
                        Ok(Some(chunk)) => {
                            let mut ctx = EngineCtx {
                                transport: &mut transport,
                                timer: &mut timer_handle,
                                session: &mut session,
                            };
                            ingest.on_receive(handle, chunk.offset, chunk.bytes.len(), &mut ctx);
                        }
                        Ok(None) => {
                            debug!("stream {} finished by peer", handle);
                            recv_open = false;
                        }
                        Err(quinn::ReadError::Reset(code)) => {
                            ingest.on_reset_stream(handle, code.into_inner());
                            recv_open = false;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                stopped = send.stopped(), if stop_pending => {
                    stop_pending = false;
                    match stopped {
                        Ok(Some(code)) => ingest.on_send_stop(handle, code.into_inner()),
                        Ok(None) => debug!("send side closed without STOP_SENDING"),
                        Err(e) => debug!("send side gone: {}", e),
                    }
                }
                _ = cancelled.cancelled() => break,
            }
        }

        info!(
            "measurement complete: {} bytes received",
            ingest.reporter().total_bytes()
        );
        connection.close(quinn::VarInt::from_u32(0), b"measurement complete");
        endpoint.wait_idle().await;
        Ok(())
    }

    async fn resolve_server(&self) -> Result<SocketAddr> {
        let host = self
            .config
            .server_addr
            .as_deref()
            .ok_or_else(|| Error::Config("Server address not set".to_string()))?;
        lookup_host((host, self.config.port))
            .await?
            .next()
            .ok_or_else(|| Error::Config(format!("Could not resolve {}", host)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_a_server_address() {
        let config = Config::default();
        assert!(Client::new(config).is_err());

        let config = Config::client("127.0.0.1".to_string(), 4433);
        assert!(Client::new(config).is_ok());
    }

    #[test]
    fn quinn_transport_tracks_acknowledged_bytes() {
        let mut transport = QuinnTransport::default();
        transport.ack_received(StreamHandle(0), 100);
        transport.ack_received(StreamHandle(0), 250);
        assert_eq!(transport.acked_bytes(), 350);
    }
}
