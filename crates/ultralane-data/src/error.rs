//! Error types for dataset generation and loading.

use std::path::PathBuf;

use thiserror::Error;
use ultralane_label::LabelError;

/// Error type for the dataset driver, manifests and manifest-backed datasets.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// The dataset root does not exist.
    #[error("Dataset directory not found: {path}")]
    DatasetDirectoryNotFound {
        /// The configured dataset root.
        path: PathBuf,
    },

    /// No `*.json` annotation file was found directly under the dataset root.
    #[error("No annotation files (*.json) found in: {path}")]
    NoAnnotationFiles {
        /// The directory that was searched.
        path: PathBuf,
    },

    /// Error when reading a directory fails.
    #[error("Failed to read directory: {path}")]
    DirectoryReadFailed {
        /// The directory path that failed to read.
        path: PathBuf,
        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },

    /// Error when reading a file fails.
    #[error("Failed to read file: {path}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error when writing an output file or directory fails.
    #[error("Failed to write: {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error when opening or decoding an image file fails.
    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        /// The image file path that failed to open.
        path: PathBuf,
        /// The underlying image processing error.
        #[source]
        source: image::ImageError,
    },

    /// Error when encoding an image file fails.
    #[error("Failed to save image: {path}")]
    ImageSaveFailed {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image referenced by an annotation does not exist.
    #[error("Image not found: {path}")]
    ImageNotFound { path: PathBuf },

    /// A source image does not have the configured shape.
    #[error("Image {path} is {width}x{height}, expected {expected_width}x{expected_height}")]
    UnexpectedImageSize {
        path: PathBuf,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// An annotation line is not a valid TuSimple record.
    #[error("Malformed annotation at {path}:{line}")]
    MalformedRecord {
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A manifest line does not have the expected fields.
    #[error("Malformed manifest line {line}: {reason}")]
    MalformedManifest { line: usize, reason: String },

    /// Configuration file could not be parsed or serialized.
    #[error("Invalid configuration file: {path}")]
    ConfigParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Label synthesis failed for a record.
    #[error(transparent)]
    Label(#[from] LabelError),
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
