//! Protocol message types carried inside message frames.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::tree::DirectoryTree;

/// Schema version written as the first payload byte of every message frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server TCP port.
pub const DEFAULT_PORT: u16 = 65432;

/// A structured value carried by a message frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Message {
    /// A command token or a file name.
    Text(String),
    /// A directory listing, sent in reply to `LIST`.
    Tree(DirectoryTree),
    /// Outcome of a `GET` or `SET` request.
    Status(Status),
}

impl Message {
    /// Short variant name for logs and error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Tree(_) => "tree",
            Self::Status(_) => "status",
        }
    }
}

impl From<Command> for Message {
    fn from(cmd: Command) -> Self {
        Self::Text(cmd.token().to_owned())
    }
}

/// Commands a client may issue on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_enums)]
pub enum Command {
    /// Request the server's directory tree.
    List,
    /// Download one file.
    Get,
    /// Upload one file.
    Set,
}

impl Command {
    /// Wire token for this command.
    pub const fn token(self) -> &'static str {
        match self {
            Self::List => "LIST",
            Self::Get => "GET",
            Self::Set => "SET",
        }
    }

    /// Parses a wire token. Tokens are case-sensitive.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "LIST" => Some(Self::List),
            "GET" => Some(Self::Get),
            "SET" => Some(Self::Set),
            _ => None,
        }
    }

    /// Extracts a command from a received message, if it carries one.
    pub fn from_message(msg: &Message) -> Option<Self> {
        match msg {
            Message::Text(token) => Self::parse(token),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Result of a request that does not return data of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Status {
    /// The request succeeded.
    Ok,
    /// The request failed.
    Error(ErrorInfo),
}

impl Status {
    /// Shorthand for `Status::Error(ErrorInfo::new(code, message))`.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorInfo::new(code, message))
    }
}

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCode {
    /// The requested file does not exist or is not a regular file.
    NotFound,
    /// The upload target already exists.
    Exists,
    /// The file name is empty, too long, or escapes the served root.
    InvalidName,
    /// The request frames were not what the command expects.
    BadRequest,
    /// Any other server-side failure.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::Exists => "already exists",
            Self::InvalidName => "invalid name",
            Self::BadRequest => "bad request",
            Self::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// Failure details sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ErrorInfo {
    /// Failure category.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
}

impl ErrorInfo {
    /// Creates a new error payload.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::FileExists(_) => ErrorCode::Exists,
            Error::FileNotFound(_) => ErrorCode::NotFound,
            Error::InvalidName(_) | Error::NameTooLong { .. } => ErrorCode::InvalidName,
            Error::Decode(_) => ErrorCode::BadRequest,
            Error::Remote(info) => info.code,
            _ => ErrorCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tokens_roundtrip() {
        for cmd in [Command::List, Command::Get, Command::Set] {
            assert_eq!(Command::parse(cmd.token()), Some(cmd));
            assert_eq!(Command::from_message(&cmd.into()), Some(cmd));
        }
    }

    #[test]
    fn unknown_tokens_are_not_commands() {
        assert_eq!(Command::parse("list"), None);
        assert_eq!(Command::parse("DELETE"), None);
        assert_eq!(Command::from_message(&Message::Status(Status::Ok)), None);
    }

    #[test]
    fn error_info_maps_error_kinds() {
        let info = ErrorInfo::from(&Error::FileExists("a.txt".into()));
        assert_eq!(info.code, ErrorCode::Exists);
        let info = ErrorInfo::from(&Error::InvalidName("../x".into()));
        assert_eq!(info.code, ErrorCode::InvalidName);
        let info = ErrorInfo::from(&Error::Framing("x".into()));
        assert_eq!(info.code, ErrorCode::Internal);
    }
}
