use std::fmt;

/// Every failure mode the protocol core can report.
///
/// Kept as a plain enum (no `thiserror`) so it stays usable from `no_std`
/// call sites; it still implements [`std::error::Error`] so it converts
/// into an [`eyre::Report`] for free at the CLI boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanError {
    /// Null/invalid argument: out-of-range node address, oversized payload,
    /// forbidden target (e.g. RPC broadcast).
    Argument(&'static str),
    /// Byte-stuffing encode/decode failure: output buffer too small, or a
    /// `0x00` marker / truncated stream found while unstuffing.
    Encoding(&'static str),
    /// The underlying frame transport failed to send or receive.
    Transport(String),
    /// A `receive` deadline elapsed with no matching frame observed.
    Timeout,
    /// A received frame had the wrong family tag, the wrong frame type for
    /// the current operation, insufficient DLC, or a CRC mismatch.
    Protocol(&'static str),
    /// An RPC NACK was received; the 8-bit error code is surfaced verbatim.
    Remote(u8),
}

impl fmt::Display for CanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanError::Argument(msg) => write!(f, "invalid argument: {msg}"),
            CanError::Encoding(msg) => write!(f, "encoding error: {msg}"),
            CanError::Transport(msg) => write!(f, "transport error: {msg}"),
            CanError::Timeout => write!(f, "timed out waiting for a frame"),
            CanError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            CanError::Remote(code) => write!(f, "remote NACK, error code {code:#04X}"),
        }
    }
}

impl std::error::Error for CanError {}

pub type CanResult<T> = Result<T, CanError>;
