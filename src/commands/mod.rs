//! Command Handler Module
//!
//! This module implements the command processing layer for DriftKV.
//! It receives decoded RESP requests, executes them against the storage engine
//! and the server configuration, and returns the reply to encode.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Decoder   │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`, `ECHO`
//! - `SET` (with optional `PX`), `GET`
//! - `CONFIG GET`, `CONFIG SET`

pub mod error;
pub mod handler;

pub use error::{CommandError, CommandResult};
pub use handler::CommandHandler;
