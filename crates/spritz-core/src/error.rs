//! Error types for spritz-core operations.
//!
//! The envelope codec deliberately reports every failed integrity check
//! through the single `BadPasswordOrCorrupt` variant; callers cannot tell
//! which check tripped.

use thiserror::Error;

/// Result type alias for spritz-core operations.
pub type Result<T> = std::result::Result<T, SpritzError>;

/// Core error type for spritz-core operations.
#[derive(Debug, Error)]
pub enum SpritzError {
    /// Password check or header integrity check failed
    #[error("bad password or corrupted file")]
    BadPasswordOrCorrupt,

    /// The underlying source ended before a complete header could be read
    #[error("encrypted stream ended mid-header")]
    ShortRead,

    /// The system entropy source refused to produce random bytes
    #[error("entropy source failure: {0}")]
    Entropy(#[from] rand::Error),

    /// Keystream destination buffer is shorter than the source
    #[error("keystream destination too short: {dst} bytes for {src} bytes of input")]
    ShortDestination {
        /// Destination length in bytes
        dst: usize,
        /// Source length in bytes
        src: usize,
    },

    /// Stored filename does not fit the single header length byte
    #[error("filename too long for header: {0} bytes (max 255)")]
    FilenameTooLong(usize),

    /// I/O error from the underlying reader or writer
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
