//! Error types.

use thiserror::Error;

/// Error type for soundbank operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An argument was outside its valid domain (bad count, offset,
    /// length, unsupported sample format, unknown preset id).
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A handle did not resolve to a live soundfont.
    #[error("No soundfont with id {0}")]
    InvalidName(u32),

    /// The soundfont is in a state that forbids the requested
    /// transition (busy, mapped, already mapped, not mapped).
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// Allocation failure.
    #[error("Out of memory")]
    OutOfMemory,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
