// src/error.rs
//! Unified error handling for the Trigno protocol client
//!
//! Every fallible operation in the crate returns [`TrignoResult`]. The variants
//! mirror the failure modes of the TCU protocol: connection setup, rejected
//! commands, stalled data sockets, and invalid channel selections. Lower level
//! errors (`std::io`, `config`, `csv`) convert through `#[from]` so `?` works
//! across layers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Trigno operations
pub type TrignoResult<T> = Result<T, TrignoError>;

/// Unified error type for the protocol client and its collaborators
#[derive(Debug, Error)]
pub enum TrignoError {
    /// Could not open the command or data socket, or the greeting never arrived
    #[error("connection to {addr} failed: {reason}")]
    ConnectionFailure { addr: String, reason: String },

    /// The TCU answered a command without `OK`
    #[error("command {command} rejected by server: {reply:?}")]
    CommandRejected { command: String, reply: String },

    /// The data socket stalled or closed before a full frame arrived
    #[error("device disconnected: received {received} of {expected} frame bytes")]
    DeviceDisconnected { received: usize, expected: usize },

    #[error("channel index {index} outside valid range 1..={max}")]
    InvalidChannelSelection { index: usize, max: usize },

    #[error("channel selection is empty")]
    EmptyChannelSelection,

    /// Decoder input does not match the requested frame geometry
    #[error("invalid frame: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    #[error("cannot {operation} while device is {state}")]
    InvalidState { operation: &'static str, state: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("configuration source error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("acquisition task failed: {0}")]
    Task(String),
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,      // Session continues normally
    Medium,   // Caller may retry the operation
    High,     // Session needs a reset before further reads
    Critical, // Session unusable, abort acquisition
}

impl TrignoError {
    /// Classify the error for the acquisition harness
    pub fn severity(&self) -> Severity {
        match self {
            TrignoError::CommandRejected { .. } => Severity::Low,
            TrignoError::InvalidChannelSelection { .. }
            | TrignoError::EmptyChannelSelection
            | TrignoError::InvalidState { .. } => Severity::Medium,
            TrignoError::DeviceDisconnected { .. } | TrignoError::InvalidFrame { .. } => {
                Severity::High
            }
            TrignoError::ConnectionFailure { .. }
            | TrignoError::Configuration(_)
            | TrignoError::Config(_)
            | TrignoError::Io(_)
            | TrignoError::Csv(_)
            | TrignoError::Task(_) => Severity::Critical,
        }
    }

    /// Fatal errors end the acquisition without a reset attempt
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Critical
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self, TrignoError::DeviceDisconnected { .. })
    }

    pub(crate) fn connection(addr: impl Into<String>, reason: impl ToString) -> Self {
        TrignoError::ConnectionFailure {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}
