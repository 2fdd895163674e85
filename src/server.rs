//! Traffic-source server: accepts connections and floods each requested
//! stream with fixed-size chunks until the peer goes away.
//!
//! The server is the uninteresting half of the pair - it exists so the
//! measuring client has something to point at. It never reads more than
//! the one-byte start request and keeps no statistics of its own.

use std::net::{Ipv4Addr, SocketAddr};

use bytes::Bytes;
use log::{info, warn};
use quinn::{Connection, ConnectionError, SendStream, WriteError};

use crate::config::Config;
use crate::tls::{self, ServerIdentity};
use crate::{Result, START_REQUEST};

/// Bulk-sender QUIC server.
///
/// # Examples
///
/// ```no_run
/// use quicperf::{Config, Server};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Server::new(Config::server(4433));
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Binds the endpoint without serving yet. Useful when the caller
    /// needs the actual local address, e.g. after binding port 0.
    pub fn bind(&self) -> Result<BoundServer> {
        let identity = ServerIdentity::self_signed("quicperf")?;
        let server_config = tls::server_config(&identity)?;
        let bind_addr = SocketAddr::new(
            self.config.bind_addr.unwrap_or(Ipv4Addr::UNSPECIFIED.into()),
            self.config.port,
        );
        let endpoint = quinn::Endpoint::server(server_config, bind_addr)?;
        Ok(BoundServer {
            endpoint,
            chunk: Bytes::from(vec![0u8; self.config.chunk_size]),
        })
    }

    /// Binds and serves until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        self.bind()?.serve().await
    }
}

/// A server whose endpoint is already bound to a local address.
pub struct BoundServer {
    endpoint: quinn::Endpoint,
    chunk: Bytes,
}

impl BoundServer {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.endpoint.local_addr()?)
    }

    /// Accepts connections forever, one task per connection.
    pub async fn serve(self) -> Result<()> {
        info!("listening on {}", self.local_addr()?);

        while let Some(incoming) = self.endpoint.accept().await {
            let chunk = self.chunk.clone();
            tokio::spawn(async move {
                match incoming.await {
                    Ok(connection) => {
                        info!("connection from {}", connection.remote_address());
                        handle_connection(connection, chunk).await;
                    }
                    Err(e) => warn!("handshake failed: {}", e),
                }
            });
        }
        Ok(())
    }
}

/// Serves every stream the peer opens on one connection.
async fn handle_connection(connection: Connection, chunk: Bytes) {
    loop {
        let (send, mut recv) = match connection.accept_bi().await {
            Ok(stream) => stream,
            Err(ConnectionError::ApplicationClosed(_)) => {
                info!("client closed the connection");
                return;
            }
            Err(ConnectionError::TimedOut) => {
                info!("connection timed out");
                return;
            }
            Err(e) => {
                warn!("connection lost: {}", e);
                return;
            }
        };

        // The client announces itself with a single request byte before
        // any data flows back.
        let mut request = [0u8; 1];
        match recv.read_exact(&mut request).await {
            Ok(()) if request[0] == START_REQUEST => {
                tokio::spawn(blast(send, chunk.clone()));
            }
            Ok(()) => warn!("unexpected request byte {:#x}, ignoring stream", request[0]),
            Err(e) => warn!("failed to read start request: {}", e),
        }
    }
}

/// Writes `chunk` onto the stream until the peer stops accepting data.
async fn blast(mut send: SendStream, chunk: Bytes) {
    loop {
        if let Err(e) = send.write_chunk(chunk.clone()).await {
            match e {
                WriteError::ConnectionLost(ConnectionError::ApplicationClosed(_)) => {
                    info!("client finished, stopping sender")
                }
                WriteError::Stopped(code) => info!("stream stopped by peer: {}", code),
                other => warn!("send failed: {}", other),
            }
            return;
        }
    }
}
