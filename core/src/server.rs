//! Fan-out broadcast server.
//!
//! Clients connect over TCP and receive every formatted operation as one
//! newline-terminated message. They are not expected to send anything.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::error::{Result, WatchError};

/// Line sent to a client refused for lack of capacity.
pub const REFUSAL_MESSAGE: &[u8] = b"Cannot register your client, too much connections\n";

/// A registered connection.
struct Listener<C> {
    peer: String,
    conn: C,
}

/// Bounded registry of live connections.
pub struct BroadcastServer<C = TcpStream> {
    /// Connections in registration order.
    listeners: Mutex<Vec<Listener<C>>>,

    /// Maximum number of simultaneous connections.
    max_connections: usize,
}

impl<C> BroadcastServer<C>
where
    C: AsyncWrite + Unpin + Send,
{
    /// Create a new server with the given capacity.
    pub fn new(max_connections: usize) -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            max_connections,
        }
    }

    /// Create a server sized from the configuration.
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.server_max_connection)
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.listeners.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Register a connection, or refuse it when the server is full.
    ///
    /// A refused connection gets a single best-effort refusal line and is
    /// closed. Returns whether the connection was registered.
    pub async fn add_listener(&self, mut conn: C, peer: impl Into<String>) -> bool {
        let peer = peer.into();

        {
            let mut listeners = self.listeners.lock().await;
            if listeners.len() < self.max_connections {
                debug!("Registered client {peer}");
                listeners.push(Listener { peer, conn });
                return true;
            }
        }

        warn!("Drop client connection {peer}, too much connections");
        let _ = conn.write_all(REFUSAL_MESSAGE).await;
        let _ = conn.shutdown().await;
        false
    }

    /// Write `message` plus a newline to every connection, in registration order.
    ///
    /// A connection whose write fails is closed and removed; the remaining
    /// connections still receive the message. Returns the number of
    /// connections that received it.
    pub async fn send_message(&self, message: &[u8]) -> usize {
        let mut listeners = self.listeners.lock().await;
        let mut alive = Vec::with_capacity(listeners.len());

        for mut listener in listeners.drain(..) {
            match write_line(&mut listener.conn, message).await {
                Ok(()) => alive.push(listener),
                Err(e) => {
                    info!(
                        "Error writing to {}: {e}, removing connection from the stacks",
                        listener.peer
                    );
                    let _ = listener.conn.shutdown().await;
                }
            }
        }

        *listeners = alive;
        listeners.len()
    }
}

async fn write_line<C>(conn: &mut C, message: &[u8]) -> std::io::Result<()>
where
    C: AsyncWrite + Unpin,
{
    conn.write_all(message).await?;
    conn.write_all(b"\n").await?;
    conn.flush().await
}

impl BroadcastServer<TcpStream> {
    /// Accept connections forever, registering each one.
    ///
    /// Only returns on a transport-level accept failure.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (conn, peer) = listener.accept().await.map_err(WatchError::Accept)?;
            self.add_listener(conn, peer.to_string()).await;
        }
    }
}

/// Bind the listen address.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| WatchError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    info!("Listening on {addr}");
    Ok(listener)
}

/// Bind the configured address and run the accept loop.
///
/// Returns immediately when no address is configured.
pub async fn start_server(server: Arc<BroadcastServer>, config: &WatchConfig) -> Result<()> {
    let Some(addr) = config.server_addr() else {
        info!("Server disabled");
        return Ok(());
    };

    let listener = bind(addr).await?;
    server.serve(listener).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, DuplexStream, duplex};

    async fn read_line(reader: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn test_capacity_refuses_extra_client() {
        let server = BroadcastServer::new(2);
        let (a, a_peer) = duplex(256);
        let (b, b_peer) = duplex(256);
        let (c, mut c_peer) = duplex(256);

        assert!(server.add_listener(a, "a").await);
        assert!(server.add_listener(b, "b").await);
        assert!(!server.add_listener(c, "c").await);
        assert_eq!(server.len().await, 2);

        let mut refused = Vec::new();
        c_peer.read_to_end(&mut refused).await.unwrap();
        assert_eq!(refused, REFUSAL_MESSAGE);

        assert_eq!(server.send_message(b"hello").await, 2);
        let mut a_peer = BufReader::new(a_peer);
        let mut b_peer = BufReader::new(b_peer);
        assert_eq!(read_line(&mut a_peer).await, "hello\n");
        assert_eq!(read_line(&mut b_peer).await, "hello\n");
    }

    #[tokio::test]
    async fn test_failed_write_prunes_only_that_client() {
        let server = BroadcastServer::new(8);
        let (a, a_peer) = duplex(256);
        let (b, b_peer) = duplex(256);
        let (c, c_peer) = duplex(256);

        server.add_listener(a, "a").await;
        server.add_listener(b, "b").await;
        server.add_listener(c, "c").await;
        drop(b_peer);

        assert_eq!(server.send_message(b"one").await, 2);
        assert_eq!(server.len().await, 2);

        assert_eq!(server.send_message(b"two").await, 2);

        let mut a_peer = BufReader::new(a_peer);
        let mut c_peer = BufReader::new(c_peer);
        assert_eq!(read_line(&mut a_peer).await, "one\n");
        assert_eq!(read_line(&mut a_peer).await, "two\n");
        assert_eq!(read_line(&mut c_peer).await, "one\n");
        assert_eq!(read_line(&mut c_peer).await, "two\n");
    }

    #[tokio::test]
    async fn test_pruned_slot_is_reusable() {
        let server = BroadcastServer::new(1);
        let (a, a_peer) = duplex(64);
        server.add_listener(a, "a").await;
        drop(a_peer);

        assert_eq!(server.send_message(b"x").await, 0);
        assert!(server.is_empty().await);

        let (b, _b_peer) = duplex(64);
        assert!(server.add_listener(b, "b").await);
    }

    #[tokio::test]
    async fn test_start_server_disabled_without_address() {
        let server = Arc::new(BroadcastServer::new(1));
        let config = WatchConfig::new("/watch").with_command("true");

        start_server(server, &config).await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let err = bind("not-an-address").await.unwrap_err();
        assert!(matches!(err, WatchError::Bind { .. }));
    }
}
