//! CLI helper functions

use crate::{
    format::{CONFIG_FILES, FileType, FormatterConfig, default_style_config},
    storage::{
        ArtifactStore, CopyOutcome, TextEncoding, list_directories, list_directories_blocking,
    },
};
use eyre::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Project directory from `METASYNC_PROJECT_DIR`, else the current directory
pub fn project_dir() -> Result<PathBuf> {
    match std::env::var("METASYNC_PROJECT_DIR") {
        Ok(dir) => Ok(PathBuf::from(dir)),
        Err(_) => std::env::current_dir().context("Failed to determine current directory"),
    }
}

/// Create the style configuration and the project config file.
///
/// An existing style configuration is left alone.
pub async fn init_project(project_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let project_dir = project_dir.as_ref();
    let store: ArtifactStore = ArtifactStore::default();
    let mut written = Vec::new();

    if let Some(existing) = CONFIG_FILES
        .iter()
        .map(|name| project_dir.join(name))
        .find(|path| path.exists())
    {
        log::info!("Keeping existing style configuration {}", existing.display());
    } else {
        let path = store
            .write_json(project_dir, ".prettierrc", &default_style_config())
            .await
            .context("Failed to write style configuration")?;
        written.push(path);
    }

    let mut properties = json!({
        "directories": {
            "retrieve": "retrieve/",
            "deploy": "deploy/",
        }
    });
    let path = store
        .save_config_file(project_dir, &mut properties)
        .await
        .context("Failed to write project configuration")?;
    written.push(path);

    Ok(written)
}

/// List leaf directories below `root`
pub async fn list_dirs(
    root: impl AsRef<Path>,
    depth: usize,
    include_root: bool,
    blocking: bool,
) -> Result<Vec<PathBuf>> {
    let dirs = if blocking {
        list_directories_blocking(root, depth, include_root)?
    } else {
        list_directories(root, depth, include_root).await?
    };
    Ok(dirs)
}

/// Re-format one artifact in place, returning where it was written
pub async fn format_artifact(
    project_dir: impl AsRef<Path>,
    dir: &str,
    name: &str,
    ext: &str,
) -> Result<PathBuf> {
    let file_type: FileType = ext.parse()?;
    let mut config = FormatterConfig::new(project_dir);
    if !config.init(file_type) {
        log::warn!("Formatting disabled for *.{}, file will be rewritten as is", ext);
    }

    let store: ArtifactStore = ArtifactStore::default();
    let content = store
        .read_text(dir, name, ext, TextEncoding::Utf8)
        .await
        .with_context(|| format!("Failed to read {}/{}.{}", dir, name, ext))?;

    store
        .write_pretty(&mut config, dir, name, ext, &content, None)
        .await
        .with_context(|| format!("Failed to write {}/{}.{}", dir, name, ext))
}

/// Copy one file, reporting the outcome instead of failing
pub async fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> CopyOutcome {
    let store: ArtifactStore = ArtifactStore::default();
    store.copy(from, to).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_project_keeps_existing_style() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".prettierrc.yml"), "tabWidth: 8\n").unwrap();

        let written = init_project(temp.path()).await.unwrap();
        assert_eq!(written, vec![temp.path().join(".metasyncrc.json")]);
        assert!(!temp.path().join(".prettierrc.json").exists());
    }
}
