//! Error types for the gatelock crate.
//!
//! Uses thiserror for derive macros. These errors are the currency of the
//! storage and registry layers; the arbitration entry point itself never
//! surfaces them to the scheduler. Every arbitration outcome is either a
//! grant or a wait reason, and internal failures are logged and recovered
//! locally.

use thiserror::Error;

/// Main error type for gatelock operations.
#[derive(Error, Debug)]
pub enum ArbiterError {
    /// Persistent lock store read/write failure.
    #[error("lock storage failed: {0}")]
    Storage(String),

    /// A persisted lock record exists but could not be parsed.
    #[error("malformed lock record: {0}")]
    MalformedRecord(String),

    /// A project id that is not present in the registry snapshot.
    #[error("unknown project '{0}'")]
    UnknownProject(String),
}

/// Result type alias for gatelock operations.
pub type Result<T> = std::result::Result<T, ArbiterError>;
