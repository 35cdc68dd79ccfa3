use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::parser::Format;

/// Boxed cause passed through from a [`Transport`](super::Transport) unmodified.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the parse entry points.
///
/// Any error means "no usable model": decoders never hand back a partially
/// populated [`Feed`](super::Feed) alongside a failure.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The source descriptor was the empty string.
    #[error("Feed source is empty: expected a file path or http(s) URL")]
    EmptySource,
    /// Remote retrieval failed (network fault, bad URL or non-200 status).
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// A local file could not be opened.
    #[error("Failed to open feed file '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The stream could not be mapped onto the feed model.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors that can occur while fetching a remote feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Source looked like an http(s) URL but did not parse as one.
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// HTTP response with a status other than 200
    #[error("HTTP error: status {0}")]
    Status(u16),
    /// Transport-level failure (DNS, connection, TLS, timeout, ...)
    #[error("Request failed: {0}")]
    Transport(#[source] BoxError),
}

/// Location of a decode failure, as precise as the underlying decoder reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Byte offset into the markup stream.
    Byte(u64),
    /// 1-based line and column in the JSON stream.
    LineColumn { line: usize, column: usize },
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Byte(offset) => write!(f, "byte {}", offset),
            Position::LineColumn { line, column } => {
                write!(f, "line {}, column {}", line, column)
            }
        }
    }
}

/// The feed stream could not be mapped onto the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to decode {format} feed{}: {message}", at(.position))]
pub struct DecodeError {
    pub format: Format,
    pub position: Option<Position>,
    pub message: String,
}

impl DecodeError {
    pub(crate) fn new(
        format: Format,
        position: Option<Position>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            format,
            position,
            message: message.into(),
        }
    }
}

fn at(position: &Option<Position>) -> String {
    position.map(|p| format!(" at {}", p)).unwrap_or_default()
}
