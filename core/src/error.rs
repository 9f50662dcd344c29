//! Error types for the packing pipeline.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Result alias used throughout the crate.
pub type Result<T, E = PackError> = std::result::Result<T, E>;

/// Errors raised while scanning, assembling, packing or reading materials.
///
/// Build-time variants (`MissingRender`, `ShapeMismatch`, ...) are recovered
/// per material by the store builder. `InvalidFittingMethod` and `Config` are
/// configuration errors and abort immediately.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// Material directory does not exist
    #[error("material directory not found: {}", .0.display())]
    MaterialNotFound(PathBuf),

    /// Catalog entries violate uniqueness or channel-count rules
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Channel name not present in the catalog
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    /// A filename matched more than one catalog fragment, or a channel matched
    /// more than one file, under the `reject` match policy
    #[error("ambiguous channel match in {material}: {detail}")]
    AmbiguousChannel { material: String, detail: String },

    /// Required rendered channel image is absent
    #[error("rendered channel '{channel}' missing: {}", .path.display())]
    MissingRender { channel: String, path: PathBuf },

    /// Fitting method string is not recognized
    #[error("invalid fitting method '{0}' (expected RANDOM_CROP, CENTER_CROP, RANDOM_RESIZED_CROP or RESIZE)")]
    InvalidFittingMethod(String),

    /// Primary channel absent from a stored record
    #[error("channel '{channel}' not in record '{key}'")]
    MissingChannel { key: String, channel: String },

    /// Store directory or database file missing
    #[error("store not found: {}", .0.display())]
    StoreNotFound(PathBuf),

    /// Record key not present in the store
    #[error("record '{0}' not found in store")]
    UnknownRecord(String),

    /// Dataset index past the end
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Channel images of one material disagree on resolution
    #[error("channel '{channel}' is {found_w}x{found_h}, expected {expected_w}x{expected_h}")]
    ShapeMismatch {
        channel: String,
        expected_w: u32,
        expected_h: u32,
        found_w: u32,
        found_h: u32,
    },

    /// Material produced no channels at all
    #[error("material {0} has no usable channels")]
    EmptySample(String),

    /// Random crop target larger than the input
    #[error("crop {crop_h}x{crop_w} larger than input {input_h}x{input_w}")]
    CropTooLarge {
        crop_h: usize,
        crop_w: usize,
        input_h: usize,
        input_w: usize,
    },

    /// Stored record bytes failed to decode
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// Store metadata could not be serialized
    #[error("store metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Image decoding failed
    #[error("failed to load image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record store error
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl PackError {
    /// True for errors that indicate a configuration or programming mistake.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidFittingMethod(_) | Self::Config(_))
    }
}
