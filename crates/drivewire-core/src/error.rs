//! Error taxonomy with actionable suggestions.

use thiserror::Error;

/// Failures raised while decoding a response frame.
///
/// These carry no peer information; the session wraps them into a
/// [`DriverError`] tagged with the remote address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The peer closed the connection (a zero-length read).
    #[error("peer closed the connection")]
    Disconnected,
    /// The length prefix is not a decimal integer.
    #[error("invalid length prefix {0:?}")]
    InvalidLength(String),
    /// No `/` separator arrived within the maximum prefix size.
    #[error("missing '/' separator after {0} bytes")]
    MissingSeparator(usize),
    /// A request frame could not be split back into its arguments.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

/// Errors surfaced to scripts by sessions, the retry executor and the
/// command facades.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The connection to the driver is gone. The session is unusable.
    #[error("{peer} connection aborted: {reason}")]
    ConnectionAborted { peer: String, reason: String },

    /// A polling operation ran past its deadline with `raise_on_timeout`.
    #[error("`{operation}` timed out")]
    Timeout { operation: String },

    /// The response framing is out of sync with the peer.
    #[error("{peer} sent a malformed frame: {reason}")]
    MalformedFrame { peer: String, reason: String },

    /// The listening socket for incoming drivers could not be opened.
    #[error("cannot listen on {addr}: {reason}")]
    Listen { addr: String, reason: String },

    /// Rejected before any I/O happened.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A non-sentinel reply that does not match the command's result shape.
    #[error("unexpected response to `{command}`: {response:?}")]
    UnexpectedResponse { command: String, response: String },

    /// The external driver process could not be started.
    #[error("failed to launch '{program}': {reason}")]
    Launch { program: String, reason: String },

    /// Reading or writing a local file for a transfer failed.
    #[error("local file '{path}': {reason}")]
    LocalFile { path: String, reason: String },
}

impl DriverError {
    /// Wrap a frame decoding failure with the peer it came from.
    pub fn from_frame(err: FrameError, peer: impl Into<String>) -> Self {
        let peer = peer.into();
        match err {
            FrameError::Disconnected => Self::ConnectionAborted {
                peer,
                reason: "client disconnected".to_string(),
            },
            other => Self::MalformedFrame {
                peer,
                reason: other.to_string(),
            },
        }
    }

    pub fn connection_aborted(peer: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectionAborted {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unexpected_response(command: &str, response: &str) -> Self {
        Self::UnexpectedResponse {
            command: command.to_string(),
            response: response.to_string(),
        }
    }

    /// Validate a TCP port supplied as a wider integer.
    pub fn check_port(port: i64) -> Result<u16> {
        u16::try_from(port).map_err(|_| Self::invalid_argument("`port` must be in 0-65535"))
    }

    /// True when the session that produced this error must be discarded.
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(
            self,
            Self::ConnectionAborted { .. } | Self::MalformedFrame { .. }
        )
    }

    /// A hint describing what the caller can do about this error.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::ConnectionAborted { .. } => {
                "The driver went away. Restart it and accept a fresh session; sessions are never reused."
            }
            Self::Timeout { .. } => {
                "The condition was not met in time. Increase the wait timeout or check the target is on screen."
            }
            Self::MalformedFrame { .. } => {
                "The protocol is out of sync. Drop this session and reconnect the driver."
            }
            Self::Listen { .. } => {
                "Pick a free port or stop the process already listening on it."
            }
            Self::InvalidArgument(_) => "Check the argument values and try again.",
            Self::UnexpectedResponse { .. } => {
                "The driver replied in an unknown format. Make sure the driver version matches this client."
            }
            Self::Launch { .. } => {
                "Verify the driver executable exists in your PATH and can be run from this account."
            }
            Self::LocalFile { .. } => "Check the local path exists and is readable/writable.",
        }
    }
}

/// Result type alias using [`DriverError`].
pub type Result<T> = std::result::Result<T, DriverError>;
