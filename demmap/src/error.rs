//! Error types for the demmap library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while indexing tiles or building height maps.
///
/// Most conditions of the tile engine are not errors at all: a coordinate
/// outside every tile, a missing tile file or an over-budget cache insert are
/// all normal outcomes. This type covers the cases a caller can act on.
#[derive(Error, Debug)]
pub enum DemError {
    /// IO error when reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An archive (`.zip` / `.gz`) could not be opened or decoded.
    #[error("Archive error in {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    /// The tile manifest could not be parsed or written.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// The requested frame has no pixels or a degenerate extent.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// A build was cancelled through its cancellation token.
    #[error("Height map build cancelled")]
    Cancelled,

    /// Invalid configuration (environment or builder).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The tile exists in the index but its bytes could not be read.
    #[error("Tile not available: {path}")]
    TileUnavailable { path: String },
}

/// Result type alias using [`DemError`].
pub type Result<T> = std::result::Result<T, DemError>;
