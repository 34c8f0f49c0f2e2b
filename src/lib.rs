//! Metasync
//!
//! Local artifact persistence for a metadata sync CLI: OS-safe file naming,
//! pluggable formatting with graceful fallback, and depth-bounded directory
//! listing.

pub mod cli;
pub mod error;
pub mod format;
pub mod notifier;
pub mod storage;

// Re-exports for convenience
pub use error::{ArtifactError, Result};
pub use format::{FileType, Formatter, FormatterConfig};
pub use notifier::UpdateNotifier;
pub use storage::{
    ArtifactStore, CopyOutcome, CopyStatus, FileSystem, LocalFs, PathSegments, TextEncoding,
    list_directories, list_directories_blocking,
};
