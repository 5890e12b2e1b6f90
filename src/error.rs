//! Custom error types for manga-colorizer.

use std::path::PathBuf;
use thiserror::Error;

/// Broad classes of failure, used by callers to decide whether to fix input,
/// fix configuration, or skip the image and move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration. Fatal; never corrected automatically.
    Configuration,
    /// The API was called out of order or with mismatched input.
    Usage,
    /// The generator or denoiser failed.
    Collaborator,
    /// Reading or writing files failed.
    Io,
}

/// Main error type for the manga-colorizer library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Working size is not a multiple of the generator's alignment.
    #[error("size {size} is not a non-zero multiple of {alignment}")]
    UnalignedSize { size: usize, alignment: usize },

    /// Model file is missing.
    #[error("model file not found: {path}")]
    ModelNotFound { path: PathBuf },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// Denoising was requested but no denoiser was loaded.
    #[error("denoising requested but no denoiser model is loaded")]
    DenoiserUnavailable,

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// `update_hint` or `colorize` was called with no image set.
    #[error("no image loaded: call set_image first")]
    NoImageLoaded,

    /// Hint or mask does not match the working canvas.
    #[error("hint shape mismatch: expected {expected:?}, got {actual:?}")]
    HintShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Image has no pixels.
    #[error("empty image {height}x{width}")]
    EmptyImage { height: usize, width: usize },

    /// Image has a channel count that cannot be mapped to RGB.
    #[error("unsupported channel count {channels}, expected 1, 3 or 4")]
    UnsupportedChannels { channels: usize },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnalignedSize { .. }
            | Self::ModelNotFound { .. }
            | Self::ModelLoad { .. }
            | Self::DenoiserUnavailable
            | Self::InvalidParameter { .. } => ErrorKind::Configuration,
            Self::NoImageLoaded
            | Self::HintShapeMismatch { .. }
            | Self::EmptyImage { .. }
            | Self::UnsupportedChannels { .. } => ErrorKind::Usage,
            Self::Inference { .. } | Self::ShapeMismatch { .. } => ErrorKind::Collaborator,
            Self::ImageLoad { .. } | Self::ImageSave { .. } | Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for manga-colorizer operations.
pub type Result<T> = std::result::Result<T, Error>;
