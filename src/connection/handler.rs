//! Connection Handler Module
//!
//! This module handles individual client connections to DriftKV.
//! Each client gets its own handler task that runs in a loop,
//! decoding requests and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Decode one RESP frame   │ │ <── suspends until the frame is complete
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute command         │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Send reply              │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / protocol error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! A command that fails still gets an error reply and the loop continues.
//! A frame that cannot be decoded ends the connection.

use crate::commands::CommandHandler;
use crate::protocol::{DecodeError, RespDecoder, RespValue};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Read buffer capacity per connection
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// Decoder over the buffered read half
    decoder: RespDecoder<BufReader<OwnedReadHalf>>,

    /// Buffered write half
    writer: BufWriter<OwnedWriteHalf>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// The command handler (shared storage and config)
    command_handler: CommandHandler,

    /// Reused encode buffer
    reply: Vec<u8>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        let (read_half, write_half) = stream.into_split();
        Self {
            decoder: RespDecoder::new(BufReader::with_capacity(READ_BUFFER_SIZE, read_half)),
            writer: BufWriter::new(write_half),
            addr,
            command_handler,
            reply: Vec::with_capacity(256),
            stats,
        }
    }

    /// Runs the main connection loop.
    ///
    /// Returns `Ok(())` when the client hangs up between requests.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "Client disconnected"),
            Err(e) if e.is_connection_reset() => {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main decode-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let request = match self.decoder.decode().await {
                Ok(request) => request,
                Err(DecodeError::CleanDisconnect) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            trace!(client = %self.addr, "Decoded request");

            let reply = self.command_handler.execute(request);
            self.stats.command_processed();

            self.send_reply(&reply).await?;
        }
    }

    /// Writes and flushes a reply.
    ///
    /// Always flushes: buffered request bytes may be an incomplete frame.
    async fn send_reply(&mut self, reply: &RespValue) -> Result<(), ConnectionError> {
        self.reply.clear();
        reply.serialize_into(&mut self.reply);
        self.stats.bytes_written(self.reply.len());
        self.writer.write_all(&self.reply).await?;
        self.writer.flush().await?;

        trace!(
            client = %self.addr,
            bytes = self.reply.len(),
            "Sent reply"
        );
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error while writing a reply
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client sent a frame that could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] DecodeError),
}

impl ConnectionError {
    /// True when the peer reset the connection, whether while we were
    /// reading a request or writing a reply.
    pub fn is_connection_reset(&self) -> bool {
        let io_err = match self {
            ConnectionError::Io(e) | ConnectionError::Protocol(DecodeError::Io(e)) => e,
            ConnectionError::Protocol(_) => return false,
        };
        io_err.kind() == std::io::ErrorKind::ConnectionReset
    }
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion. Errors are already logged by the handler.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::storage::StorageEngine;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Duration};

    async fn create_test_server() -> (SocketAddr, Arc<StorageEngine>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(StorageEngine::new());
        let config = Arc::new(ServerConfig::new("/tmp/driftkv", "dump.rdb"));
        let stats = Arc::new(ConnectionStats::new());

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler =
                    CommandHandler::new(Arc::clone(&storage_clone), Arc::clone(&config));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, handler, stats));
            }
        });

        (addr, storage, stats)
    }

    /// Sends `request` and reads exactly `expected.len()` bytes back.
    async fn exchange(client: &mut TcpStream, request: &[u8], expected: &[u8]) {
        client.write_all(request).await.unwrap();

        let mut buf = vec![0u8; expected.len()];
        timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&buf),
            String::from_utf8_lossy(expected)
        );
    }

    /// Asserts the server closes the connection.
    async fn assert_closed(client: &mut TcpStream) {
        let mut buf = [0u8; 64];
        let n = timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("timed out waiting for close")
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        exchange(&mut client, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_echo() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        exchange(
            &mut client,
            b"*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n",
            b"$2\r\nhi\r\n",
        )
        .await;
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, storage, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        exchange(
            &mut client,
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n",
            b"+OK\r\n",
        )
        .await;
        exchange(&mut client, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$1\r\nv\r\n").await;
        exchange(
            &mut client,
            b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n",
            b"$-1\r\n",
        )
        .await;

        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_set_px_over_the_wire() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        exchange(
            &mut client,
            b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$2\r\n50\r\n",
            b"+OK\r\n",
        )
        .await;
        exchange(&mut client, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$1\r\nv\r\n").await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        exchange(&mut client, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$-1\r\n").await;
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        exchange(
            &mut client,
            b"*1\r\n$3\r\nFOO\r\n",
            b"-ERR unknown command: FOO\r\n",
        )
        .await;
        exchange(&mut client, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_malformed_request_keeps_connection() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        exchange(&mut client, b"*0\r\n", b"-ERR empty command\r\n").await;
        exchange(&mut client, b"+PING\r\n", b"-ERR invalid command format\r\n").await;
        exchange(&mut client, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_config_over_the_wire() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        exchange(
            &mut client,
            b"*3\r\n$6\r\nCONFIG\r\n$3\r\nGET\r\n$3\r\ndir\r\n",
            b"$12\r\n/tmp/driftkv\r\n",
        )
        .await;
        exchange(
            &mut client,
            b"*4\r\n$6\r\nCONFIG\r\n$3\r\nSET\r\n$10\r\ndbfilename\r\n$6\r\nx.rdb1\r\n",
            b"+OK\r\n",
        )
        .await;
        exchange(
            &mut client,
            b"*3\r\n$6\r\nCONFIG\r\n$3\r\nGET\r\n$10\r\ndbfilename\r\n",
            b"$6\r\nx.rdb1\r\n",
        )
        .await;
    }

    #[tokio::test]
    async fn test_pipelined_commands() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        exchange(
            &mut client,
            b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\n\
              *3\r\n$3\r\nSET\r\n$2\r\nk2\r\n$2\r\nv2\r\n\
              *2\r\n$3\r\nGET\r\n$2\r\nk1\r\n\
              *2\r\n$3\r\nGET\r\n$2\r\nk2\r\n",
            b"+OK\r\n+OK\r\n$2\r\nv1\r\n$2\r\nv2\r\n",
        )
        .await;
    }

    #[tokio::test]
    async fn test_request_split_across_writes() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*2\r\n$4\r\nEC").await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        exchange(&mut client, b"HO\r\n$2\r\nhi\r\n", b"$2\r\nhi\r\n").await;
    }

    #[tokio::test]
    async fn test_reply_not_held_behind_partial_frame() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        // A complete PING followed by only the header of the next request
        exchange(&mut client, b"*1\r\n$4\r\nPING\r\n*1\r\n", b"+PONG\r\n").await;
        exchange(&mut client, b"$4\r\nPING\r\n", b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_deep_nesting_closes_only_that_connection() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut request = b"*1\r\n".repeat(100_000);
        request.extend_from_slice(b":7\r\n");
        // The server may close before the whole request is written
        let _ = client.write_all(&request).await;
        assert_closed(&mut client).await;

        let mut other = TcpStream::connect(addr).await.unwrap();
        exchange(&mut other, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    }

    #[test]
    fn test_reset_detected_in_both_error_shapes() {
        use std::io::{Error, ErrorKind};

        let write_side = ConnectionError::Io(Error::from(ErrorKind::ConnectionReset));
        let read_side =
            ConnectionError::Protocol(DecodeError::Io(Error::from(ErrorKind::ConnectionReset)));
        assert!(write_side.is_connection_reset());
        assert!(read_side.is_connection_reset());

        let broken = ConnectionError::Io(Error::from(ErrorKind::BrokenPipe));
        assert!(!broken.is_connection_reset());
        assert!(!ConnectionError::Protocol(DecodeError::MalformedLine).is_connection_reset());
    }

    #[tokio::test]
    async fn test_protocol_error_closes_connection() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"@garbage\r\n").await.unwrap();
        assert_closed(&mut client).await;
    }

    #[tokio::test]
    async fn test_concurrent_clients() {
        let (addr, storage, _) = create_test_server().await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                tokio::spawn(async move {
                    let mut client = TcpStream::connect(addr).await.unwrap();
                    let key = format!("key{}", i);
                    let value = format!("value{}", i);
                    let set = format!(
                        "*3\r\n$3\r\nSET\r\n${}\r\n{}\r\n${}\r\n{}\r\n",
                        key.len(),
                        key,
                        value.len(),
                        value
                    );
                    exchange(&mut client, set.as_bytes(), b"+OK\r\n").await;

                    let get = format!("*2\r\n$3\r\nGET\r\n${}\r\n{}\r\n", key.len(), key);
                    let expected = format!("${}\r\n{}\r\n", value.len(), value);
                    exchange(&mut client, get.as_bytes(), expected.as_bytes()).await;
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(storage.len(), 8);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        exchange(&mut client, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 7);

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
