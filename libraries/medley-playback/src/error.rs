//! Error types for the sequencing engine

use thiserror::Error;

/// Playback errors
///
/// Only configuration problems surface as errors. Contention between
/// competing fades or piece transitions is not an error: the losing
/// request's handle settles in a cancelled state instead.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// A piece was asked to play with no section sets configured
    #[error("piece has no sections to play")]
    EmptySections,

    /// The session was asked for a piece id it does not know
    #[error("unknown piece: {0}")]
    UnknownPiece(String),

    /// Invalid operation
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
