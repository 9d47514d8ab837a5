//! Error kinds surfaced by the gateway core.
//!
//! Foreign errors (I/O, JSON decode) are converted into one of these variants
//! at the Subprocess Runner boundary; callers above that boundary never see
//! `serde_json::Error` or `std::io::Error` directly.

use thiserror::Error;

/// The event scope an error is reported under (see [`crate::events::Event::Error`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Global,
    Receive,
    Transmit,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("helper exited with status code {code}")]
    SubprocessExit { code: i32 },

    #[error("failed to parse helper output as JSON: {cause}")]
    SubprocessParse { cause: String },

    #[error("failed to receive message: {message}")]
    ReceiveError { message: String },

    #[error("failed to transmit message: {message}")]
    TransmitError { message: String },

    #[error("reassembly failed: {cause}")]
    ReassemblyError { cause: String },

    #[error("receive event fired with no handler registered")]
    HandlerMissing,

    #[error("unrecognized event name: {0}")]
    InvalidEvent(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl GatewayError {
    /// The scope this error should be reported under when delivered via the
    /// `error` event (spec §4.7, §7).
    pub fn scope(&self) -> ErrorScope {
        match self {
            GatewayError::ReceiveError { .. } => ErrorScope::Receive,
            GatewayError::TransmitError { .. } => ErrorScope::Transmit,
            _ => ErrorScope::Global,
        }
    }
}
