//! Local artifact storage
//!
//! This module handles all file I/O for retrieved metadata:
//! - OS-safe encoding of directory and file names
//! - JSON and text artifact reads/writes (with optional formatting)
//! - Depth-bounded directory listing
//! - The filesystem capability the store writes through

mod artifact;
mod fs;
pub mod path_codec;
mod walker;

pub use artifact::{
    ArtifactStore, CONFIG_FILE_NAME, CopyOutcome, CopyStatus, TemplateMap, TextEncoding,
    apply_templates,
};
pub use fs::{FileSystem, LocalFs};
pub use path_codec::{
    PathSegments, decode_filename, encode_filename, encode_path, normalize_path, sanitize_dir,
};
pub use walker::{list_directories, list_directories_blocking};
