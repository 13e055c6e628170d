//! Streaming RESP Decoder
//!
//! This module reads RESP frames straight off a buffered byte stream.
//! Each call to [`RespDecoder::decode`] consumes exactly one complete frame
//! and nothing after it, so pipelined requests stay in the reader's buffer
//! for the next call.
//!
//! ## How the Decoder Works
//!
//! ```text
//!   prefix byte ──> header line ──┬──> scalar value ──> done (or fold into parent)
//!                                 │
//!                                 └──> array of N ──> push onto the pending stack,
//!                                                     decode N elements
//! ```
//!
//! - Lines are read up to `\n` and must end in `\r\n`.
//! - Bulk payloads are read by length (`len` bytes plus the 2 terminator bytes),
//!   so they may contain any byte. The terminator bytes are consumed, not checked.
//! - Nested arrays are tracked with an explicit stack instead of async recursion.
//!   Depth is capped at [`MAX_NESTING_DEPTH`]: the decoded tree is still dropped,
//!   encoded and displayed recursively, so an unbounded depth would exhaust the
//!   task's stack.
//!
//! ## End of Stream
//!
//! Running out of input is reported differently depending on where it happens:
//!
//! | Where the stream ends          | Error                                |
//! |--------------------------------|--------------------------------------|
//! | before the first byte of frame | [`DecodeError::CleanDisconnect`]     |
//! | inside a header/simple line    | [`DecodeError::MalformedLine`]       |
//! | inside a bulk payload          | [`DecodeError::TruncatedInput`]      |
//! | before a nested element        | [`DecodeError::TruncatedInput`]      |

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Errors that can occur while decoding a frame.
///
/// Every variant except [`DecodeError::CleanDisconnect`] means the peer sent
/// something we cannot resynchronize from; the connection should be closed.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended cleanly between frames
    #[error("connection closed by peer")]
    CleanDisconnect,

    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownType(u8),

    /// A line was not terminated by CRLF (bare LF, end of stream, or too long)
    #[error("malformed line: expected CRLF terminator")]
    MalformedLine,

    /// Integer, length or count line is not a base-10 i64
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Simple string or error line is not valid UTF-8
    #[error("invalid UTF-8 in line")]
    InvalidUtf8,

    /// Bulk length or array count is negative but not -1
    #[error("invalid length: {0}")]
    InvalidLength(i64),

    /// The bulk string exceeds the maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The stream ended in the middle of a frame
    #[error("truncated input: stream ended mid-frame")]
    TruncatedInput,

    /// Arrays nested deeper than the allowed depth
    #[error("nesting too deep: more than {max} levels of arrays")]
    NestingTooDeep { max: usize },

    /// Transport failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// True when the peer simply hung up between requests.
    pub fn is_clean_disconnect(&self) -> bool {
        matches!(self, DecodeError::CleanDisconnect)
    }
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Maximum length of a single header or simple line, excluding CRLF (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Upper bound on up-front allocation driven by a client-supplied length
const PREALLOC_LIMIT: usize = 1024;

/// Maximum number of arrays that may be open at once within one frame
pub const MAX_NESTING_DEPTH: usize = 128;

/// What a prefix byte plus its header line turned out to be.
enum Header {
    Value(RespValue),
    Array(usize),
}

/// An array whose elements are still being decoded.
struct PendingArray {
    items: Vec<RespValue>,
    len: usize,
}

impl PendingArray {
    fn new(len: usize) -> Self {
        Self {
            items: Vec::with_capacity(len.min(PREALLOC_LIMIT)),
            len,
        }
    }

    fn is_complete(&self) -> bool {
        self.items.len() == self.len
    }
}

/// Decodes RESP frames from a buffered async reader.
///
/// # Example
///
/// ```
/// use driftkv::protocol::{RespDecoder, RespValue};
/// use bytes::Bytes;
///
/// # tokio_test::block_on(async {
/// let mut decoder = RespDecoder::new(&b"*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n"[..]);
/// let value = decoder.decode().await.unwrap();
/// assert_eq!(
///     value,
///     RespValue::array(vec![
///         RespValue::bulk_string(Bytes::from("ECHO")),
///         RespValue::bulk_string(Bytes::from("hi")),
///     ])
/// );
/// assert!(decoder.decode().await.unwrap_err().is_clean_disconnect());
/// # });
/// ```
#[derive(Debug)]
pub struct RespDecoder<R> {
    reader: R,
    /// Scratch buffer reused for every header line
    line: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> RespDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(64),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads exactly one frame from the stream.
    ///
    /// Suspends until the whole frame has arrived. Returns
    /// [`DecodeError::CleanDisconnect`] if the stream is already at EOF.
    pub async fn decode(&mut self) -> DecodeResult<RespValue> {
        let mut byte = match self.read_prefix().await? {
            Some(b) => b,
            None => return Err(DecodeError::CleanDisconnect),
        };
        let mut pending: Vec<PendingArray> = Vec::new();

        loop {
            let mut completed = match self.read_header(byte).await? {
                Header::Value(value) => Some(value),
                Header::Array(0) => Some(RespValue::Array(Vec::new())),
                Header::Array(len) => {
                    if pending.len() >= MAX_NESTING_DEPTH {
                        return Err(DecodeError::NestingTooDeep {
                            max: MAX_NESTING_DEPTH,
                        });
                    }
                    pending.push(PendingArray::new(len));
                    None
                }
            };

            // Fold finished values into their parents, closing arrays as they fill.
            while let Some(value) = completed.take() {
                let Some(parent) = pending.last_mut() else {
                    return Ok(value);
                };
                parent.items.push(value);
                if parent.is_complete() {
                    completed = pending.pop().map(|done| RespValue::Array(done.items));
                }
            }

            byte = self
                .read_prefix()
                .await?
                .ok_or(DecodeError::TruncatedInput)?;
        }
    }

    /// Reads the type prefix byte, or `None` at end of stream.
    async fn read_prefix(&mut self) -> DecodeResult<Option<u8>> {
        let buf = self.reader.fill_buf().await?;
        let byte = match buf.first() {
            Some(&b) => b,
            None => return Ok(None),
        };
        self.reader.consume(1);
        Ok(Some(byte))
    }

    async fn read_header(&mut self, byte: u8) -> DecodeResult<Header> {
        match byte {
            prefix::SIMPLE_STRING => {
                let text = self.read_text_line().await?;
                Ok(Header::Value(RespValue::SimpleString(text)))
            }
            prefix::ERROR => {
                let text = self.read_text_line().await?;
                Ok(Header::Value(RespValue::Error(text)))
            }
            prefix::INTEGER => {
                let n = self.read_integer_line().await?;
                Ok(Header::Value(RespValue::Integer(n)))
            }
            prefix::BULK_STRING => match self.read_integer_line().await? {
                -1 => Ok(Header::Value(RespValue::Null)),
                len if len < 0 => Err(DecodeError::InvalidLength(len)),
                len => {
                    let data = self.read_bulk(len as usize).await?;
                    Ok(Header::Value(RespValue::BulkString(data)))
                }
            },
            prefix::ARRAY => match self.read_integer_line().await? {
                -1 => Ok(Header::Value(RespValue::NullArray)),
                count if count < 0 => Err(DecodeError::InvalidLength(count)),
                count => Ok(Header::Array(count as usize)),
            },
            other => Err(DecodeError::UnknownType(other)),
        }
    }

    /// Reads one CRLF-terminated line and returns it without the terminator.
    async fn read_line(&mut self) -> DecodeResult<&[u8]> {
        self.line.clear();
        let limit = (MAX_LINE_LENGTH + CRLF.len()) as u64;
        (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.line)
            .await?;

        self.line
            .strip_suffix(CRLF)
            .ok_or(DecodeError::MalformedLine)
    }

    async fn read_text_line(&mut self) -> DecodeResult<String> {
        let line = self.read_line().await?;
        std::str::from_utf8(line)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    async fn read_integer_line(&mut self) -> DecodeResult<i64> {
        let line = self.read_line().await?;
        let text = std::str::from_utf8(line)
            .map_err(|_| DecodeError::InvalidInteger(String::from_utf8_lossy(line).into_owned()))?;
        text.parse()
            .map_err(|_| DecodeError::InvalidInteger(text.to_string()))
    }

    /// Reads a `len`-byte payload plus its two terminator bytes.
    async fn read_bulk(&mut self, len: usize) -> DecodeResult<Bytes> {
        if len > MAX_BULK_SIZE {
            return Err(DecodeError::MessageTooLarge {
                size: len,
                max: MAX_BULK_SIZE,
            });
        }

        let total = len + CRLF.len();
        // Grow with the data actually received rather than trusting the header.
        let mut data = Vec::with_capacity(total.min(PREALLOC_LIMIT));
        (&mut self.reader)
            .take(total as u64)
            .read_to_end(&mut data)
            .await?;

        if data.len() < total {
            return Err(DecodeError::TruncatedInput);
        }

        data.truncate(len);
        Ok(Bytes::from(data))
    }
}

/// Decodes a single frame from an in-memory buffer.
///
/// Convenience wrapper for tests and tools that already hold the bytes.
pub async fn decode_message(buf: &[u8]) -> DecodeResult<RespValue> {
    RespDecoder::new(buf).decode().await
}
