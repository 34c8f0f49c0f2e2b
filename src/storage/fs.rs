//! Filesystem capability used by the artifact store
//!
//! The store never calls `tokio::fs` directly. It goes through [`FileSystem`] so
//! that alternative backends (or failure-injecting ones in tests) can be
//! plugged in without touching the persistence logic.

use std::future::Future;
use std::io;
use std::path::Path;

/// Async filesystem operations needed to persist artifacts
pub trait FileSystem: Send + Sync {
    /// Read a whole file into memory
    fn read_file(&self, path: &Path) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    /// Blocking flavour of [`FileSystem::read_file`], for callers without a
    /// runtime
    fn read_file_blocking(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or truncate a file and write `contents` to it
    fn write_file(
        &self,
        path: &Path,
        contents: &[u8],
    ) -> impl Future<Output = io::Result<()>> + Send;

    /// Create a directory and all of its missing ancestors
    fn ensure_dir(&self, path: &Path) -> impl Future<Output = io::Result<()>> + Send;

    /// Whether anything exists at `path`
    fn path_exists(&self, path: &Path) -> impl Future<Output = bool> + Send;

    /// Copy a file, returning the number of bytes copied
    fn copy_file(&self, from: &Path, to: &Path) -> impl Future<Output = io::Result<u64>> + Send;
}

/// The local disk, via `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    fn read_file_blocking(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn path_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        tokio::fs::copy(from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_fs_basic_operations() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFs;
        let dir = temp.path().join("a").join("b");

        fs.ensure_dir(&dir).await.unwrap();
        assert!(fs.path_exists(&dir).await);

        let file = dir.join("x.txt");
        assert!(!fs.path_exists(&file).await);
        fs.write_file(&file, b"hello").await.unwrap();
        assert_eq!(fs.read_file(&file).await.unwrap(), b"hello");
        assert_eq!(fs.read_file_blocking(&file).unwrap(), b"hello");

        let copy = dir.join("y.txt");
        assert_eq!(fs.copy_file(&file, &copy).await.unwrap(), 5);
        assert_eq!(fs.read_file(&copy).await.unwrap(), b"hello");
    }
}
