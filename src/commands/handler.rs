//! Command Handler Module
//!
//! This module implements the commands DriftKV understands.
//! It takes decoded RESP arrays and dispatches them to the matching handler.
//!
//! ## Supported Commands
//!
//! - `PING [message]` - Test connection
//! - `ECHO message` - Echo message
//! - `SET key value [PX milliseconds]` - Set a key, optionally with a TTL
//! - `GET key` - Get a key's value
//! - `CONFIG GET parameter` - Read `dir` or `dbfilename`
//! - `CONFIG SET parameter value` - Change `dir` or `dbfilename`
//!
//! Command names and CONFIG subcommands are matched case-sensitively.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  execute()  │───>│  dispatch() │───>│   cmd_*()   │     │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘     │
//! │         ▲                                     │             │
//! │         └──── CommandError -> error reply ────┤             │
//! │                                               ▼             │
//! │                             StorageEngine / ServerConfig    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::error::{CommandError, CommandResult};
use crate::config::ServerConfig;
use crate::protocol::RespValue;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Handles Redis commands by dispatching them to the appropriate handlers.
///
/// Cloning is cheap; every clone shares the same storage and configuration.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
    /// `dir` / `dbfilename` values for CONFIG
    config: Arc<ServerConfig>,
}

impl CommandHandler {
    pub fn new(storage: Arc<StorageEngine>, config: Arc<ServerConfig>) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    /// Executes a command and returns the response.
    ///
    /// Never fails: malformed or rejected requests produce an error reply and
    /// the connection stays usable.
    ///
    /// # Arguments
    ///
    /// * `command` - The decoded RESP value (should be an array of bulk strings)
    pub fn execute(&self, command: RespValue) -> RespValue {
        match self.try_execute(command) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(error = %e, "Command rejected");
                RespValue::error(e.to_string())
            }
        }
    }

    fn try_execute(&self, command: RespValue) -> CommandResult<RespValue> {
        let args = command.into_array().ok_or(CommandError::InvalidFormat)?;
        let (name, args) = args.split_first().ok_or(CommandError::EmptyCommand)?;
        let name = match name {
            RespValue::BulkString(name) => name,
            _ => return Err(CommandError::InvalidCommandName),
        };

        self.dispatch(name, args)
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, name: &[u8], args: &[RespValue]) -> CommandResult<RespValue> {
        match name {
            b"PING" => self.cmd_ping(args),
            b"ECHO" => self.cmd_echo(args),
            b"SET" => self.cmd_set(args),
            b"GET" => self.cmd_get(args),
            b"CONFIG" => self.cmd_config(args),
            _ => Err(CommandError::UnknownCommand(printable(name))),
        }
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// PING [message]
    fn cmd_ping(&self, args: &[RespValue]) -> CommandResult<RespValue> {
        match args {
            [] => Ok(RespValue::pong()),
            [message] => Ok(RespValue::bulk_string(bulk_arg(message, "message")?.clone())),
            _ => Err(CommandError::WrongArity("PING")),
        }
    }

    /// ECHO message
    ///
    /// A message that is not a bulk string counts as missing.
    fn cmd_echo(&self, args: &[RespValue]) -> CommandResult<RespValue> {
        match args {
            [RespValue::BulkString(message)] => Ok(RespValue::bulk_string(message.clone())),
            _ => Err(CommandError::WrongArity("ECHO")),
        }
    }

    // ========================================================================
    // String Commands
    // ========================================================================

    /// SET key value [PX milliseconds]
    fn cmd_set(&self, args: &[RespValue]) -> CommandResult<RespValue> {
        if args.len() < 2 {
            return Err(CommandError::WrongArity("SET"));
        }

        let key = bulk_arg(&args[0], "key")?.clone();
        let value = bulk_arg(&args[1], "value")?.clone();

        match &args[2..] {
            [] => {
                self.storage.set(key, value);
            }
            [option, ttl] => {
                if !matches!(option, RespValue::BulkString(o) if o.eq_ignore_ascii_case(b"PX")) {
                    return Err(CommandError::Syntax);
                }
                let ttl_ms = parse_ttl_millis(ttl)?;
                self.storage.set_px(key, value, ttl_ms);
            }
            _ => return Err(CommandError::Syntax),
        }

        Ok(RespValue::ok())
    }

    /// GET key
    fn cmd_get(&self, args: &[RespValue]) -> CommandResult<RespValue> {
        let [key] = args else {
            return Err(CommandError::WrongArity("GET"));
        };
        let key = bulk_arg(key, "key")?;

        Ok(match self.storage.get(key) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        })
    }

    // ========================================================================
    // CONFIG
    // ========================================================================

    /// CONFIG GET parameter | CONFIG SET parameter value
    fn cmd_config(&self, args: &[RespValue]) -> CommandResult<RespValue> {
        let Some((subcommand, rest)) = args.split_first() else {
            return Err(CommandError::WrongArity("CONFIG"));
        };

        match &bulk_arg(subcommand, "subcommand")?[..] {
            b"GET" => self.cmd_config_get(rest),
            b"SET" => self.cmd_config_set(rest),
            other => Err(CommandError::UnknownConfigSubcommand(printable(other))),
        }
    }

    fn cmd_config_get(&self, args: &[RespValue]) -> CommandResult<RespValue> {
        let [param] = args else {
            return Err(CommandError::WrongArity("CONFIG GET"));
        };
        let param = str_arg(param, "parameter")?;

        Ok(match self.config.get(param) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        })
    }

    fn cmd_config_set(&self, args: &[RespValue]) -> CommandResult<RespValue> {
        let [param, value] = args else {
            return Err(CommandError::WrongArity("CONFIG SET"));
        };
        let param = str_arg(param, "parameter")?;
        let value = str_arg(value, "value")?;

        if !self.config.set(param, value) {
            return Err(CommandError::UnknownConfigParam(printable(param.as_bytes())));
        }
        Ok(RespValue::ok())
    }
}

// ========================================================================
// Helper functions
// ========================================================================

/// Extracts the payload of a bulk string argument.
fn bulk_arg<'a>(value: &'a RespValue, what: &'static str) -> CommandResult<&'a Bytes> {
    value.as_bytes().ok_or(CommandError::InvalidArgument(what))
}

/// Extracts a UTF-8 bulk string argument.
fn str_arg<'a>(value: &'a RespValue, what: &'static str) -> CommandResult<&'a str> {
    std::str::from_utf8(bulk_arg(value, what)?).map_err(|_| CommandError::InvalidArgument(what))
}

/// Parses the `PX` argument: a non-negative base-10 integer.
fn parse_ttl_millis(value: &RespValue) -> CommandResult<i64> {
    let ms = value
        .as_bytes()
        .and_then(|b| std::str::from_utf8(b).ok())
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CommandError::Syntax)?;

    if ms < 0 {
        return Err(CommandError::Syntax);
    }
    Ok(ms)
}

/// Renders client-supplied bytes for an error line, which cannot carry CR or LF.
fn printable(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}
