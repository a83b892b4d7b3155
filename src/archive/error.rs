//! Error types for archive packaging.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while building or placing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// File system error (create, write, rename, copy).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The zip writer rejected an entry or failed to finalize.
    #[error("zip error: {source}")]
    Zip {
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },
}

impl ArchiveError {
    /// Creates an IO error.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a zip error.
    pub fn zip(source: zip::result::ZipError) -> Self {
        Self::Zip { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_display_contains_path() {
        let error = ArchiveError::io(
            "/library/Series/c1.cbz",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = error.to_string();
        assert!(msg.contains("/library/Series/c1.cbz"));
        assert!(msg.contains("denied"));
    }
}
