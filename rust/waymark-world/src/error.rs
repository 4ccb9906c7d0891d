//! Error types for world-state operations

use thiserror::Error;

/// Result type for world-state operations
pub type WorldResult<T> = Result<T, WorldError>;

/// Errors produced by geometry and transform primitives
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    /// Transform lookup between two frames failed
    #[error("transform from '{from}' to '{to}' unavailable")]
    TransformUnavailable { from: String, to: String },

    /// Operands have incompatible dimensionality
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Grid buffer length does not match the declared width and height
    #[error("grid shape mismatch: {width}x{height} grid needs {expected} cells, got {got}")]
    GridShape {
        width: usize,
        height: usize,
        expected: usize,
        got: usize,
    },

    /// Frame payload does not match the declared image dimensions
    #[error("frame payload mismatch: {width}x{height} BGR frame needs {expected} bytes, got {got}")]
    FramePayload {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
}
