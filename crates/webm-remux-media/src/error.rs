//! Error types for webm-remux-media.

use std::io;
use thiserror::Error;

/// Result type for webm-remux-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for webm-remux-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A transport primitive failed or returned a short result.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input does not have the expected container structure.
    #[error("Invalid container: {0}")]
    Format(String),

    /// A required element is absent from the input.
    #[error("Missing required element: {0}")]
    MissingElement(&'static str),

    /// The output builder rejected an operation.
    #[error("Mux error: {0}")]
    Mux(String),

    /// Buffer too small for operation.
    #[error("Buffer underflow: need {need} bytes, have {have}")]
    BufferUnderflow { need: usize, have: usize },
}

/// The three failure classes a remux can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Host transport failure.
    Io,
    /// Malformed or unsupported input.
    Format,
    /// Output builder rejection.
    Mux,
}

impl Error {
    /// Create an invalid container error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a mux error.
    pub fn mux(msg: impl Into<String>) -> Self {
        Self::Mux(msg.into())
    }

    /// Create the error for a host read that returned fewer bytes than asked.
    pub fn short_read(position: u64, wanted: usize, got: usize) -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("short read at {position}: wanted {wanted} bytes, got {got}"),
        ))
    }

    /// Create the error for a host write that accepted fewer bytes than given.
    pub fn short_write(wanted: usize, got: usize) -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short write: wanted {wanted} bytes, wrote {got}"),
        ))
    }

    /// Create the error for a negative offset or length handed to the transport.
    pub fn invalid_offset(what: &str, value: i64) -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("negative {what}: {value}"),
        ))
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::BufferUnderflow { .. } => ErrorKind::Io,
            Self::Format(_) | Self::MissingElement(_) => ErrorKind::Format,
            Self::Mux(_) => ErrorKind::Mux,
        }
    }
}

/// Map an operation result onto the numeric status contract: 0 on success,
/// 1 on any failure.
pub fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::format("bad header").kind(), ErrorKind::Format);
        assert_eq!(Error::MissingElement("Info").kind(), ErrorKind::Format);
        assert_eq!(Error::mux("track rejected").kind(), ErrorKind::Mux);
        assert_eq!(Error::short_read(0, 4, 2).kind(), ErrorKind::Io);
        assert_eq!(
            Error::BufferUnderflow { need: 8, have: 4 }.kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::MissingElement("Info");
        assert_eq!(err.to_string(), "Missing required element: Info");

        let err = Error::short_read(100, 16, 3);
        assert!(err.to_string().contains("wanted 16 bytes, got 3"));

        let err = Error::invalid_offset("position", -1);
        assert!(err.to_string().contains("negative position: -1"));
    }

    #[test]
    fn test_status_code() {
        let ok: Result<()> = Ok(());
        assert_eq!(status_code(&ok), 0);

        let err: Result<()> = Err(Error::format("x"));
        assert_eq!(status_code(&err), 1);
    }
}
