//! Error types for hazard data access.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error raised by a [`HazardStore`](crate::HazardStore) implementation.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when reading hazard curves and metadata.
#[derive(Debug, Error)]
pub enum HazardError {
    /// A cache key did not split into exactly three `:`-separated fields.
    #[error("Malformed hazard key '{key}': expected 'imt:location:selector'")]
    MalformedKey {
        /// The offending key.
        key: String,
    },

    /// Direct writes into the lazy cache are not allowed.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// The key is absent even after its group was fetched from the store.
    #[error("Key not found: {key}")]
    KeyNotFound {
        /// The requested key.
        key: String,
    },

    /// The store holds no metadata record for the hazard model.
    #[error("No metadata record for hazard model '{hazard_id}'")]
    MetadataNotFound {
        /// Hazard model identifier.
        hazard_id: String,
    },

    /// Another caller's in-flight fetch for the same group failed.
    #[error("Fetch for {location} ({kind}) failed: {reason}")]
    FetchFailed {
        /// Location code of the failed group.
        location: String,
        /// Selector kind of the failed group.
        kind: &'static str,
        /// Message of the underlying error.
        reason: String,
    },

    /// Location not known to the hazard model or the site table.
    #[error("Unknown location '{0}'")]
    UnknownLocation(String),

    /// Intensity measure not produced by the hazard model.
    #[error("Unknown intensity measure type '{0}'")]
    UnknownImt(String),

    /// Curve levels and values have different lengths.
    #[error("Curve has {levels} levels but {values} values")]
    CurveLength {
        /// Number of levels.
        levels: usize,
        /// Number of values.
        values: usize,
    },

    /// A serialized logic tree could not be parsed.
    #[error("Invalid logic tree: {0}")]
    LogicTree(String),

    /// The curve archive directory is missing or not configured.
    #[error("Archive directory unavailable: {}", .0.display())]
    ArchiveDir(PathBuf),

    /// I/O error reading or writing the archive.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error talking to the remote store.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote store answered with a non-success status.
    #[error("Hazard store returned HTTP {status} for {url}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Error raised by a store implementation, passed through unchanged.
    #[error(transparent)]
    Store(StoreError),
}

impl HazardError {
    /// Wrap an arbitrary store implementation error.
    pub fn store<E>(err: E) -> Self
    where
        E: Into<StoreError>,
    {
        HazardError::Store(err.into())
    }
}
