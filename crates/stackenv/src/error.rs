//! Error types for environment inspection.

use std::io;
use std::path::PathBuf;

/// Result type alias for environment operations.
pub type Result<T> = std::result::Result<T, EnvError>;

/// Errors raised while reading host markers.
///
/// Detection itself never fails; these only surface from the low-level
/// [`SystemProbe`](crate::SystemProbe) readers.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// A marker file could not be read.
    #[error("could not read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A marker file is missing from a fake system.
    #[error("no such file: {0}")]
    Missing(PathBuf),
}

impl EnvError {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
