//! Depth-bounded directory enumeration
//!
//! Lists the leaf directories below a root, e.g. every business unit folder in
//! a retrieve directory, so callers can iterate over previously written
//! artifacts.
//!
//! Only true leaves are returned: a directory whose subdirectories are walked
//! is not part of the result itself. A directory is a leaf when it has no
//! subdirectories or when the remaining depth is zero.
//!
//! The blocking and the async entry point drive the same [`Walk`] state machine
//! and differ only in how a directory's children are read.

use crate::error::{ArtifactError, Result};
use std::io;
use std::path::{Path, PathBuf};

/// Pending work and collected leaves of one enumeration
#[derive(Debug)]
struct Walk {
    root: PathBuf,
    include_root: bool,
    pending: Vec<(PathBuf, usize)>,
    leaves: Vec<PathBuf>,
}

impl Walk {
    fn new(root: &Path, max_depth: usize, include_root: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            include_root,
            pending: vec![(root.to_path_buf(), max_depth)],
            leaves: Vec::new(),
        }
    }

    /// Next directory to visit together with its remaining depth
    fn next_dir(&mut self) -> Option<(PathBuf, usize)> {
        self.pending.pop()
    }

    /// Record the subdirectories found in `dir`.
    ///
    /// Children are queued so that they are visited in name order, depth
    /// first, which keeps the output identical between both drivers.
    fn visit(&mut self, dir: PathBuf, depth: usize, mut subdirs: Vec<PathBuf>) {
        if subdirs.is_empty() {
            let leaf = self.leaf_path(dir);
            self.leaves.push(leaf);
            return;
        }

        subdirs.sort();
        let next_depth = depth.saturating_sub(1);
        self.pending
            .extend(subdirs.into_iter().rev().map(|sub| (sub, next_depth)));
    }

    fn leaf_path(&self, dir: PathBuf) -> PathBuf {
        if self.include_root {
            return dir;
        }
        match dir.strip_prefix(&self.root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => dir,
        }
    }

    fn finish(self) -> Vec<PathBuf> {
        self.leaves
    }
}

fn log_failure(err: &ArtifactError, root: &Path) {
    log::error!("DirectoryWalker::list:: error | {}", err);
    log::debug!("enumeration of {} aborted: {:?}", root.display(), err);
}

/// List leaf directories below `root`, descending at most `max_depth` levels.
///
/// With `include_root` the leaves are returned as full paths. Without it they
/// are relative to `root`, and the root itself shows up as an empty path when
/// it is the only leaf.
///
/// # Errors
/// Any directory that cannot be read fails the whole call; the failure is
/// logged before it is returned. Use `unwrap_or_default()` to treat it as
/// "nothing found".
pub async fn list_directories(
    root: impl AsRef<Path>,
    max_depth: usize,
    include_root: bool,
) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if let Err(err) = check_root(root).await {
        log_failure(&err, root);
        return Err(err);
    }
    let mut walk = Walk::new(root, max_depth, include_root);

    while let Some((dir, depth)) = walk.next_dir() {
        let subdirs = if depth == 0 {
            Vec::new()
        } else {
            match read_subdirs(&dir).await {
                Ok(subdirs) => subdirs,
                Err(err) => {
                    log_failure(&err, root);
                    return Err(err);
                }
            }
        };
        walk.visit(dir, depth, subdirs);
    }

    Ok(walk.finish())
}

/// Blocking flavour of [`list_directories`] for contexts without a runtime
pub fn list_directories_blocking(
    root: impl AsRef<Path>,
    max_depth: usize,
    include_root: bool,
) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if let Err(err) = check_root_blocking(root) {
        log_failure(&err, root);
        return Err(err);
    }
    let mut walk = Walk::new(root, max_depth, include_root);

    while let Some((dir, depth)) = walk.next_dir() {
        let subdirs = if depth == 0 {
            Vec::new()
        } else {
            match read_subdirs_blocking(&dir) {
                Ok(subdirs) => subdirs,
                Err(err) => {
                    log_failure(&err, root);
                    return Err(err);
                }
            }
        };
        walk.visit(dir, depth, subdirs);
    }

    Ok(walk.finish())
}

fn not_a_directory(root: &Path) -> ArtifactError {
    ArtifactError::io(
        root,
        io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
    )
}

// The root is checked up front: with a depth of 0 it is never read otherwise
async fn check_root(root: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(root)
        .await
        .map_err(|e| ArtifactError::io(root, e))?;
    if metadata.is_dir() {
        Ok(())
    } else {
        Err(not_a_directory(root))
    }
}

fn check_root_blocking(root: &Path) -> Result<()> {
    let metadata = std::fs::metadata(root).map_err(|e| ArtifactError::io(root, e))?;
    if metadata.is_dir() {
        Ok(())
    } else {
        Err(not_a_directory(root))
    }
}

// `DirEntry::file_type` does not follow symlinks in either std or tokio, so
// linked directories are never descended into.
async fn read_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ArtifactError::io(dir, e))?;

    let mut subdirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ArtifactError::io(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ArtifactError::io(entry.path(), e))?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        }
    }
    Ok(subdirs)
}

fn read_subdirs_blocking(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ArtifactError::io(dir, e))? {
        let entry = entry.map_err(|e| ArtifactError::io(dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| ArtifactError::io(entry.path(), e))?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        }
    }
    Ok(subdirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree(root: &Path, dirs: &[&str]) {
        for dir in dirs {
            std::fs::create_dir_all(root.join(dir)).unwrap();
        }
    }

    #[test]
    fn test_walk_emits_only_leaves() {
        let mut walk = Walk::new(Path::new("/r"), 2, false);
        let (root, depth) = walk.next_dir().unwrap();
        walk.visit(
            root,
            depth,
            vec![PathBuf::from("/r/b"), PathBuf::from("/r/a")],
        );

        let (a, depth) = walk.next_dir().unwrap();
        assert_eq!(a, PathBuf::from("/r/a"));
        assert_eq!(depth, 1);
        walk.visit(a, depth, Vec::new());

        let (b, depth) = walk.next_dir().unwrap();
        walk.visit(b, depth, vec![PathBuf::from("/r/b/c")]);

        let (c, depth) = walk.next_dir().unwrap();
        assert_eq!(depth, 0);
        walk.visit(c, depth, Vec::new());

        assert!(walk.next_dir().is_none());
        assert_eq!(
            walk.finish(),
            vec![PathBuf::from("a"), PathBuf::from("b/c")]
        );
    }

    #[test]
    fn test_blocking_relative_leaves() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &["x/y", "a"]);
        std::fs::write(temp.path().join("file.json"), "{}").unwrap();

        let dirs = list_directories_blocking(temp.path(), 2, false).unwrap();
        assert_eq!(dirs, vec![PathBuf::from("a"), Path::new("x").join("y")]);
    }

    #[test]
    fn test_depth_limits_descent() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &["x/y/z", "a"]);

        let dirs = list_directories_blocking(temp.path(), 1, false).unwrap();
        assert_eq!(dirs, vec![PathBuf::from("a"), PathBuf::from("x")]);
    }

    #[test]
    fn test_depth_zero_returns_root() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &["x"]);

        let dirs = list_directories_blocking(temp.path(), 0, false).unwrap();
        assert_eq!(dirs, vec![PathBuf::new()]);

        let dirs = list_directories_blocking(temp.path(), 0, true).unwrap();
        assert_eq!(dirs, vec![temp.path().to_path_buf()]);
    }

    #[test]
    fn test_include_root_keeps_full_paths() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &["bu1", "bu2"]);

        let dirs = list_directories_blocking(temp.path(), 1, true).unwrap();
        assert_eq!(
            dirs,
            vec![temp.path().join("bu1"), temp.path().join("bu2")]
        );
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = list_directories_blocking(temp.path().join("nope"), 1, false).unwrap_err();
        assert!(err.is_not_found());

        for include_root in [false, true] {
            let err = list_directories_blocking(temp.path().join("nope"), 0, include_root)
                .unwrap_err();
            assert!(err.is_not_found());
        }

        let file = temp.path().join("file.json");
        std::fs::write(&file, "{}").unwrap();
        let err = list_directories_blocking(&file, 0, false).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Io {
                kind: std::io::ErrorKind::NotADirectory,
                ..
            }
        ));
        assert!(
            list_directories_blocking(temp.path().join("nope"), 1, false)
                .unwrap_or_default()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_async_matches_blocking() {
        let temp = TempDir::new().unwrap();
        tree(
            temp.path(),
            &["cred/bu1/script", "cred/bu1/asset", "cred/bu2", "other"],
        );

        for depth in 0..4 {
            for include_root in [false, true] {
                let blocking =
                    list_directories_blocking(temp.path(), depth, include_root).unwrap();
                let suspended = list_directories(temp.path(), depth, include_root)
                    .await
                    .unwrap();
                assert_eq!(blocking, suspended, "depth {depth}, root {include_root}");
            }
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_directories_are_not_descended() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &["real/inner"]);
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("link")).unwrap();

        let dirs = list_directories(temp.path(), 2, false).await.unwrap();
        assert_eq!(dirs, vec![Path::new("real").join("inner")]);
        assert_eq!(
            list_directories_blocking(temp.path(), 2, false).unwrap(),
            dirs
        );
    }
}
