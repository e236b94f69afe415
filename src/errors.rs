//! Provenance Relay Error Hierarchy
//!
//! Defines the error types returned by the control plane and the lifecycle
//! API, plus the recoverable failures the relay counts and skips.

use std::io;
use std::path::PathBuf;

use config::ConfigError;

use crate::wire::ChannelKind;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an application handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of every application handler.
pub type HandlerResult = std::result::Result<(), HandlerError>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Kernel provenance subsystem is not loaded or not mounted
    #[error("Provenance subsystem is not present")]
    SubsystemAbsent,

    /// Privileged control operation attempted without privilege
    #[error("Permission denied: {operation}")]
    PermissionDenied { operation: &'static str },

    /// `register` called while relay loops are already running
    #[error("Provenance handlers are already registered")]
    AlreadyRegistered,

    /// Operation requires an active registration
    #[error("Provenance handlers are not registered")]
    NotRegistered,

    /// Mask carries bits outside the defined node or edge types
    #[error("Invalid filter mask {mask:#x}: allowed bits are {allowed:#x}")]
    InvalidFilterMask { mask: u32, allowed: u32 },

    /// Long record payload does not fit the 16-bit length field
    #[error("Payload of {len} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    /// Malformed record
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Record channel I/O failures
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Control endpoint I/O failures other than absence or permission
    #[error("Control endpoint {endpoint} failed: {source}")]
    Control {
        endpoint: &'static str,
        #[source]
        source: io::Error,
    },

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Reasons a raw buffer is rejected by [`crate::wire::decode`].
///
/// Always recoverable: the relay drops the record, counts it and continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Truncated buffer: need {needed} bytes, have {available}")]
    TruncatedBuffer { needed: usize, available: usize },

    #[error("Unknown record tag {tag} on the {channel} channel")]
    UnknownTag { tag: u16, channel: ChannelKind },

    #[error("Length mismatch for tag {tag}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        tag: u16,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported record version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("Invalid value {value} for field {field}")]
    InvalidField { field: &'static str, value: u64 },
}

impl DecodeError {
    /// Stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::TruncatedBuffer { .. } => "truncated_buffer",
            DecodeError::UnknownTag { .. } => "unknown_tag",
            DecodeError::LengthMismatch { .. } => "length_mismatch",
            DecodeError::UnsupportedVersion { .. } => "unsupported_version",
            DecodeError::InvalidField { .. } => "invalid_field",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Relay file could not be opened
    #[error("Failed to open record channel at {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Read failure on an open channel; fatal to that relay loop
    #[error("Failed to read record channel {channel}")]
    Read {
        channel: String,
        #[source]
        source: io::Error,
    },
}
