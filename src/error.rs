//! Typed failures for artifact persistence
//!
//! Every public store and walker operation reports failure through
//! [`ArtifactError`] rather than panicking, so the sync pipeline can log and
//! move on to the next artifact.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("{kind:?}: {source} ({})", path.display())]
    Io {
        path: PathBuf,
        kind: io::ErrorKind,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot decode '{input}': {reason}")]
    Decode { input: String, reason: String },

    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unknown file type '{0}'")]
    UnknownFileType(String),
}

impl ArtifactError {
    /// Wrap an I/O error together with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            kind: source.kind(),
            source,
        }
    }

    /// True when the error means the file or directory does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Io {
                kind: io::ErrorKind::NotFound,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_kind_and_message() {
        let err = ArtifactError::io(
            "deploy/bu1/script.json",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        assert!(err.is_not_found());

        let msg = err.to_string();
        assert!(msg.starts_with("NotFound: No such file or directory"));
        assert!(msg.contains("deploy/bu1/script.json"));
    }

    #[test]
    fn test_permission_error_is_not_not_found() {
        let err = ArtifactError::io(
            "x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_not_found());
    }
}
