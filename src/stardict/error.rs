//! Custom error types for the stardict-engine crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum DictError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The metadata file declares a version this crate does not understand.
    #[error("Unsupported StarDict version: {0:?}. Only 2.4.2 and 3.0.0 are supported.")]
    UnsupportedVersion(String),

    /// The file is structurally invalid or does not conform to the StarDict format.
    #[error("Invalid format: {0}")]
    Format(String),

    /// The content hash of a package could not be computed.
    #[error("Hash computation failed: {0}")]
    Hash(String),

    /// The settings file could not be parsed or written.
    #[error("Settings error: {0}")]
    Settings(String),

    /// The content blob handle has been released (dictionary closed or disabled).
    #[error("Dictionary content is closed")]
    Closed,

    /// A lock was poisoned, indicating a panic in another thread holding the lock.
    #[error("A lock was poisoned, indicating a panic in another thread holding the lock.")]
    LockPoisoned,
}

/// A convenience `Result` type alias using the crate's `DictError` type.
pub type Result<T> = std::result::Result<T, DictError>;
