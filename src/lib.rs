//! # DriftKV - A Small Redis-Compatible Key-Value Server
//!
//! DriftKV speaks RESP2 over TCP and keeps its data in memory. It answers
//! `PING`, `ECHO`, `SET` (with optional `PX` expiry), `GET` and
//! `CONFIG GET` / `CONFIG SET`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              DriftKV                                │
//! │                                                                     │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐              │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │              │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │              │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘              │
//! │                            │                  │                     │
//! │                            ▼                  ▼                     │
//! │                     ┌─────────────┐    ┌──────────────┐ ┌─────────┐ │
//! │                     │    RESP     │    │StorageEngine │ │ Server  │ │
//! │                     │   Decoder   │    │ RwLock<Map>  │ │ Config  │ │
//! │                     └─────────────┘    └──────────────┘ └─────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use driftkv::{handle_connection, CommandHandler, ConnectionStats, ServerConfig, StorageEngine};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(StorageEngine::new());
//!     let config = Arc::new(ServerConfig::default());
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&storage), Arc::clone(&config));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP value type, encoder and streaming decoder
//! - [`storage`]: Thread-safe key-value store with lazy expiry
//! - [`config`]: Runtime parameters exposed through `CONFIG`
//! - [`commands`]: Command dispatch and execution
//! - [`connection`]: Per-client read/execute/reply loop
//!
//! ## Expiry
//!
//! Keys set with `PX` are only checked when read. An expired key stays in
//! memory until the next `GET` on it removes it.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::ServerConfig;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{DecodeError, RespDecoder, RespValue};
pub use storage::StorageEngine;

/// The default port DriftKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host DriftKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of DriftKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
