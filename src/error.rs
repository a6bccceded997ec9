//! Error types for kvlog
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::wal::DecodeError;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for kvlog operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transaction Log Errors
    // -------------------------------------------------------------------------
    #[error("transaction log parse error at line {line}: {source}")]
    Parse {
        line: u64,
        #[source]
        source: DecodeError,
    },

    #[error("transaction numbers out of sequence at line {line}: {found} follows {previous}")]
    OutOfOrder { line: u64, previous: u64, found: u64 },

    #[error("transaction log read failure: {0}")]
    ReadFailure(#[source] std::io::Error),

    #[error("transaction log write failed at sequence {sequence}: {source}")]
    WriteFailure {
        sequence: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("transaction sequence numbers exhausted after {last}")]
    SequenceExhausted { last: u64 },

    #[error("transaction logger has halted")]
    LoggerHalted,

    #[error("transaction logger is not running")]
    NotRunning,

    #[error("invalid logger state: {0}")]
    InvalidState(&'static str),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Key must not be empty")]
    EmptyKey,

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// True for the errors that abort replay at startup
    pub fn is_replay_error(&self) -> bool {
        matches!(
            self,
            KvError::Parse { .. } | KvError::OutOfOrder { .. } | KvError::ReadFailure(_)
        )
    }
}
