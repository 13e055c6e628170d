//! RESP Protocol Implementation
//!
//! This module implements the subset of the Redis Serialization Protocol (RESP2)
//! that DriftKV speaks.
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` enum and its wire encoding
//! - `decoder`: Reads one frame at a time from a buffered async stream
//!
//! ## Example
//!
//! ```ignore
//! use driftkv::protocol::{RespDecoder, RespValue};
//! use tokio::io::BufReader;
//!
//! // Decoding requests off a socket
//! let mut decoder = RespDecoder::new(BufReader::new(read_half));
//! let request = decoder.decode().await?;
//!
//! // Encoding replies
//! let bytes = RespValue::pong().serialize();
//! ```

pub mod decoder;
pub mod types;

// Re-export commonly used types for convenience
pub use decoder::{decode_message, DecodeError, DecodeResult, RespDecoder, MAX_NESTING_DEPTH};
pub use types::RespValue;
