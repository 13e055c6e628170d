//! Command-level errors.
//!
//! None of these close the connection: the handler turns each one into an
//! error reply whose text is the `Display` output below.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Request was not an array, or was a null array
    #[error("ERR invalid command format")]
    InvalidFormat,

    #[error("ERR empty command")]
    EmptyCommand,

    /// Command name was not a bulk string
    #[error("ERR invalid command name")]
    InvalidCommandName,

    #[error("ERR unknown command: {0}")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    /// An argument had the wrong RESP type or encoding
    #[error("ERR invalid {0}")]
    InvalidArgument(&'static str),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR unknown CONFIG subcommand: {0}")]
    UnknownConfigSubcommand(String),

    #[error("ERR unknown CONFIG parameter: {0}")]
    UnknownConfigParam(String),
}

pub type CommandResult<T> = Result<T, CommandError>;
