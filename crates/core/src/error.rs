//! Error types for the SAT>IP server library.

use std::fmt;

/// Errors that can occur across the SAT>IP server stack.
///
/// Variants map to specific failure modes:
///
/// - **Protocol**: [`Parse`](Self::Parse) — malformed RTSP messages.
/// - **Transport**: [`Io`](Self::Io) — socket/network failures.
/// - **Tuner**: [`Device`](Self::Device), [`NoLock`](Self::NoLock) —
///   frontend/demux/DVR failures and tune timeouts.
/// - **Session**: [`SessionNotFound`](Self::SessionNotFound).
/// - **Server**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning).
#[derive(Debug, thiserror::Error)]
pub enum SatIpError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A tuner device operation failed after its retry budget was spent.
    #[error("device error during {operation}: {message}")]
    Device {
        operation: &'static str,
        message: String,
    },

    /// The frontend did not report a signal lock within the poll budget.
    #[error("frontend did not lock after {attempts} attempts")]
    NoLock { attempts: u32 },

    /// No client with the given session ID is attached to any stream.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// [`RtspServer::start`](crate::server::RtspServer::start) has not been
    /// called yet.
    #[error("server not started")]
    NotStarted,

    /// [`RtspServer::start`](crate::server::RtspServer::start) was called
    /// while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// Failed to parse an RTSP request message (RFC 2326 §6).
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeader => write!(f, "invalid header"),
        }
    }
}

/// Convenience alias for `Result<T, SatIpError>`.
pub type Result<T> = std::result::Result<T, SatIpError>;
