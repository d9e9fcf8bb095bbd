//! Error types for label synthesis.

use thiserror::Error;

/// Error type for polyline parsing, lane selection and label encoding.
#[derive(Error, Debug)]
pub enum LabelError {
    /// A lane array does not have one entry per row sample.
    #[error("lane {lane} has {lane_len} points but there are {samples} row samples")]
    LaneLengthMismatch {
        /// Index of the offending lane within the record.
        lane: usize,
        /// Number of x coordinates in the lane.
        lane_len: usize,
        /// Number of row samples (`h_samples`).
        samples: usize,
    },

    /// No lane survived slope filtering, so the mask would be empty.
    #[error("no lane could be selected from {candidates} polylines (no negative or positive slope)")]
    EmptySelection {
        /// Number of polylines that were considered.
        candidates: usize,
    },

    /// An image and its mask do not share the same dimensions.
    #[error("dimension mismatch: image={image_width}x{image_height}, mask={mask_width}x{mask_height}")]
    DimensionMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    /// An encoder or rasterizer parameter is out of range.
    #[error("invalid label configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// A font could not be parsed for display overlays.
    #[error("failed to load font: {reason}")]
    FontLoadFailed { reason: String },
}

/// A specialized `Result` type for label synthesis.
pub type LabelResult<T> = Result<T, LabelError>;
