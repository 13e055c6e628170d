//! Storage Engine Module
//!
//! This module provides the key-value store behind DriftKV: a thread-safe
//! map with optional per-key expiry, enforced lazily on read.
//!
//! ## Features
//!
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//! - **TTL Support**: Keys can carry a time-to-live set in milliseconds
//! - **Lazy Expiry**: Expired keys are removed when a read finds them
//!
//! ## Example
//!
//! ```
//! use driftkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set(Bytes::from("name"), Bytes::from("Ariz"));
//! assert_eq!(engine.get(&Bytes::from("name")), Some(Bytes::from("Ariz")));
//!
//! // SET session token123 PX 3600000
//! engine.set_px(Bytes::from("session"), Bytes::from("token123"), 3_600_000);
//! assert!(engine.get(&Bytes::from("session")).is_some());
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{Entry, StorageEngine, StorageStats};
