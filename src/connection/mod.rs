//! Connection Handler Module
//!
//! This module manages individual client connections to DriftKV.
//! Each client connection is handled by its own async task, so a slow or
//! idle client never holds up the others.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌──────────────┐   ┌─────────────┐    ┌─────────────┐      │
//! │  │ RespDecoder  │──>│ Execute cmd │───>│ Send reply  │      │
//! │  │ (read half)  │   └─────────────┘    │ (write half)│      │
//! │  └──────────────┘                      └─────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Streaming decode**: requests may arrive split across any number of reads
//! - **Pipelining**: several requests in one packet are answered in order
//! - **Statistics**: tracks connection and command counters
//!
//! ## Example
//!
//! ```ignore
//! use driftkv::connection::{handle_connection, ConnectionStats};
//! use driftkv::commands::CommandHandler;
//! use driftkv::config::ServerConfig;
//! use driftkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let config = Arc::new(ServerConfig::default());
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(storage, config);
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
