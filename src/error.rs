//! Custom error types for swup.

use thiserror::Error;

/// Version string reported when no attempt produced a parseable version.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Terminal failure classes of an upgrade run.
///
/// Each variant maps to a distinct process exit code so calling automation
/// can branch on the failure class.
#[derive(Error, Debug)]
pub enum SwupError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to read password: {0}")]
    Prompt(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Firmware transfer failed: {0}")]
    Transfer(String),

    #[error("Configuration backup failed: {0}")]
    Backup(String),

    #[error(
        "Device did not report the target version after {attempts} attempts (last observed: {last_observed})"
    )]
    VerificationTimeout { attempts: u32, last_observed: String },
}

impl SwupError {
    /// Process exit code for this failure class.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Prompt(_) => 2,
            Self::Connection(_) => 10,
            Self::Transfer(_) => 11,
            Self::VerificationTimeout { .. } => 12,
            Self::Backup(_) => 13,
        }
    }

    /// Short reason code used in structured logs.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Prompt(_) => "ValidationError",
            Self::Connection(_) => "ConnectionError",
            Self::Transfer(_) => "TransferError",
            Self::VerificationTimeout { .. } => "VerificationTimeout",
            Self::Backup(_) => "BackupError",
        }
    }
}

/// Errors raised by a [`crate::transport::Transport`] implementation.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("cannot reach {address}: {details}")]
    Connect { address: String, details: String },

    #[error("authentication failed for {username}: {details}")]
    Auth { username: String, details: String },

    #[error("upload of {path} failed: {details}")]
    Transfer { path: String, details: String },

    #[error("command '{command}' failed: {details}")]
    Command { command: String, details: String },

    #[error("no open session")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, SwupError>;
