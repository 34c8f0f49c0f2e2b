//! Artifact persistence
//!
//! [`ArtifactStore`] writes and reads JSON and text artifacts below a
//! directory tree. Directory parts and filenames are encoded with the path
//! codec first, so any metadata name can be persisted on any OS, and missing
//! directories are created on the way.
//!
//! Failures are logged and returned as [`ArtifactError`]; nothing here panics,
//! so a sync run can carry on with the next artifact.

use super::fs::{FileSystem, LocalFs};
use super::path_codec::{PathSegments, encode_filename, normalize_path, sanitize_dir};
use crate::error::{ArtifactError, Result};
use crate::format::{
    AmpBeautifier, Beautifier, BuiltinFormatter, CodeFormatter, FileType, Formatter,
    FormatterConfig,
};
use base64::Engine;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Project configuration file written by [`ArtifactStore::save_config_file`]
pub const CONFIG_FILE_NAME: &str = ".metasyncrc.json";

/// Template variables: every occurrence of a value is replaced by `{{{key}}}`
pub type TemplateMap = BTreeMap<String, String>;

/// How text content maps to bytes on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// Content is base64 text of binary data (e.g. images)
    Base64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Ok,
    Skipped,
    Failed,
}

/// Outcome of copying one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyOutcome {
    pub status: CopyStatus,
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl CopyOutcome {
    fn new(status: CopyStatus, file: &Path, status_message: Option<String>) -> Self {
        Self {
            status,
            file: file.to_path_buf(),
            status_message,
        }
    }
}

fn logged(op: &str, err: ArtifactError) -> ArtifactError {
    log::error!("ArtifactStore::{}:: error | {}", op, err);
    err
}

/// Replace template values in `content` by their `{{{key}}}` placeholders
pub fn apply_templates(content: &str, templates: &TemplateMap) -> String {
    templates
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .fold(content.to_string(), |acc, (key, value)| {
            acc.replace(value.as_str(), &["{{{", key, "}}}"].concat())
        })
}

/// Reads and writes artifacts through a [`FileSystem`], formatting with a
/// [`Formatter`] on request
pub struct ArtifactStore<F = LocalFs, G = BuiltinFormatter, A = AmpBeautifier> {
    fs: F,
    formatter: Formatter<G, A>,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(LocalFs, Formatter::default())
    }
}

impl<F: FileSystem, G: CodeFormatter, A: Beautifier> ArtifactStore<F, G, A> {
    pub fn new(fs: F, formatter: Formatter<G, A>) -> Self {
        Self { fs, formatter }
    }

    pub fn formatter(&self) -> &Formatter<G, A> {
        &self.formatter
    }

    /// Where `<dir>/<name>.<ext>` ends up after encoding
    pub fn artifact_path(dir: impl Into<PathSegments>, name: &str, ext: &str) -> PathBuf {
        sanitize_dir(dir).join(format!("{}.{}", encode_filename(name), ext))
    }

    async fn write_bytes(&self, op: &str, path: PathBuf, contents: &[u8]) -> Result<PathBuf> {
        if let Some(dir) = path.parent() {
            self.fs
                .ensure_dir(dir)
                .await
                .map_err(|e| logged(op, ArtifactError::io(dir, e)))?;
        }

        if self.fs.path_exists(&path).await {
            log::debug!("Overwriting: {}", path.display());
        }

        self.fs
            .write_file(&path, contents)
            .await
            .map_err(|e| logged(op, ArtifactError::io(&path, e)))?;
        Ok(path)
    }

    /// Write `content` as 4-space indented JSON to `<dir>/<name>.json`
    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        dir: impl Into<PathSegments>,
        name: &str,
        content: &T,
    ) -> Result<PathBuf> {
        let path = Self::artifact_path(dir, name, "json");

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        content.serialize(&mut serializer).map_err(|source| {
            logged(
                "write_json",
                ArtifactError::Json {
                    path: path.clone(),
                    source,
                },
            )
        })?;
        buffer.push(b'\n');

        self.write_bytes("write_json", path, &buffer).await
    }

    /// Write text unchanged to `<dir>/<name>.<ext>`
    pub async fn write_text(
        &self,
        dir: impl Into<PathSegments>,
        name: &str,
        ext: &str,
        content: &str,
    ) -> Result<PathBuf> {
        self.write_encoded(dir, name, ext, content, TextEncoding::Utf8)
            .await
    }

    /// Write text whose bytes are given in `encoding`
    pub async fn write_encoded(
        &self,
        dir: impl Into<PathSegments>,
        name: &str,
        ext: &str,
        content: &str,
        encoding: TextEncoding,
    ) -> Result<PathBuf> {
        let path = Self::artifact_path(dir, name, ext);
        match encoding {
            TextEncoding::Utf8 => self.write_bytes("write_text", path, content.as_bytes()).await,
            TextEncoding::Base64 => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(content.trim())
                    .map_err(|e| logged("write_text", e.into()))?;
                self.write_bytes("write_text", path, &bytes).await
            }
        }
    }

    /// Beautify `content`, persisting a `<name>.error.log` sidecar next to the
    /// artifact when the general formatter fails.
    ///
    /// Always returns content that can be written: the formatted text, or the
    /// original when formatting was skipped or failed.
    pub async fn format_content(
        &self,
        config: &mut FormatterConfig,
        dir: impl Into<PathSegments>,
        name: &str,
        file_type: FileType,
        content: &str,
    ) -> String {
        let formatted = self.formatter.format(config, file_type, content);

        if let Some(failure) = &formatted.failure {
            let dir = dir.into();
            log::debug!(
                "Potential code issue found in {}",
                Self::artifact_path(dir.clone(), name, file_type.extension()).display()
            );
            log::debug!("{}", failure.message);

            // The write error is already logged; the artifact itself must still be written
            let _ = self
                .write_text(dir, &format!("{}.error", name), "log", &failure.error_log())
                .await;
        }

        formatted.content
    }

    /// Format, apply template variables, then write `<dir>/<name>.<ext>`.
    ///
    /// `ext` must name a supported [`FileType`]; anything else is rejected
    /// before touching the filesystem.
    pub async fn write_pretty(
        &self,
        config: &mut FormatterConfig,
        dir: impl Into<PathSegments>,
        name: &str,
        ext: &str,
        content: &str,
        templates: Option<&TemplateMap>,
    ) -> Result<PathBuf> {
        let file_type: FileType = ext.parse().map_err(|e| logged("write_pretty", e))?;
        let dir = dir.into();

        let mut formatted = self
            .format_content(config, dir.clone(), name, file_type, content)
            .await;
        if let Some(templates) = templates {
            formatted = apply_templates(&formatted, templates);
        }

        self.write_text(dir, name, ext, &formatted).await
    }

    fn json_path(dir: impl Into<PathSegments>, name: &str, sanitize: bool) -> PathBuf {
        let (dir, name) = if sanitize {
            (sanitize_dir(dir), encode_filename(name))
        } else {
            (normalize_path(dir), name.to_string())
        };
        let stem = name.strip_suffix(".json").unwrap_or(&name);
        dir.join(format!("{}.json", stem))
    }

    /// Read and parse `<dir>/<name>.json`.
    ///
    /// `name` may carry the `.json` suffix or not. With `sanitize` off, `dir`
    /// is only normalized and `name` is used verbatim, for callers that
    /// already hold an on-disk path.
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        dir: impl Into<PathSegments>,
        name: &str,
        sanitize: bool,
    ) -> Result<T> {
        let path = Self::json_path(dir, name, sanitize);
        let bytes = self.fs.read_file(&path).await.map_err(|e| {
            log::debug!("{:?}", e);
            logged("read_json", ArtifactError::io(&path, e))
        })?;
        parse_json(&path, &bytes)
    }

    /// Blocking flavour of [`ArtifactStore::read_json`]
    pub fn read_json_blocking<T: DeserializeOwned>(
        &self,
        dir: impl Into<PathSegments>,
        name: &str,
        sanitize: bool,
    ) -> Result<T> {
        let path = Self::json_path(dir, name, sanitize);
        let bytes = self.fs.read_file_blocking(&path).map_err(|e| {
            log::debug!("{:?}", e);
            logged("read_json", ArtifactError::io(&path, e))
        })?;
        parse_json(&path, &bytes)
    }

    /// Read `<dir>/<name>.<ext>`; with [`TextEncoding::Base64`] the bytes are
    /// returned base64 encoded
    pub async fn read_text(
        &self,
        dir: impl Into<PathSegments>,
        name: &str,
        ext: &str,
        encoding: TextEncoding,
    ) -> Result<String> {
        let path = Self::artifact_path(dir, name, ext);
        let bytes = self
            .fs
            .read_file(&path)
            .await
            .map_err(|e| logged("read_text", ArtifactError::io(&path, e)))?;

        match encoding {
            TextEncoding::Utf8 => String::from_utf8(bytes).map_err(|e| {
                logged(
                    "read_text",
                    ArtifactError::Decode {
                        input: path.display().to_string(),
                        reason: e.to_string(),
                    },
                )
            }),
            TextEncoding::Base64 => Ok(base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }

    /// Copy one file, creating the destination directory if needed.
    ///
    /// A source that no longer exists is `skipped` rather than `failed`: files
    /// can legitimately disappear between listing and copying. Nothing is
    /// created for a skipped copy.
    pub async fn copy(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> CopyOutcome {
        let (from, to) = (from.as_ref(), to.as_ref());

        if !self.fs.path_exists(from).await {
            return Self::deleted(from);
        }

        if let Some(parent) = to.parent()
            && let Err(e) = self.fs.ensure_dir(parent).await
        {
            return CopyOutcome::new(CopyStatus::Failed, from, Some(e.to_string()));
        }

        let err = match self.fs.copy_file(from, to).await {
            Ok(_) => return CopyOutcome::new(CopyStatus::Ok, from, None),
            Err(e) => e,
        };

        // The source may still vanish between the check and the copy
        if err.kind() == std::io::ErrorKind::NotFound && !self.fs.path_exists(from).await {
            Self::deleted(from)
        } else {
            CopyOutcome::new(CopyStatus::Failed, from, Some(err.to_string()))
        }
    }

    fn deleted(from: &Path) -> CopyOutcome {
        log::debug!("Skipping {}: deleted from repository", from.display());
        CopyOutcome::new(
            CopyStatus::Skipped,
            from,
            Some("deleted from repository".to_string()),
        )
    }

    /// Copy several files one after another
    pub async fn copy_all<P, Q>(&self, pairs: impl IntoIterator<Item = (P, Q)>) -> Vec<CopyOutcome>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let mut outcomes = Vec::new();
        for (from, to) in pairs {
            outcomes.push(self.copy(from, to).await);
        }
        outcomes
    }

    /// Persist the project configuration, stamped with the running version
    pub async fn save_config_file(
        &self,
        dir: impl Into<PathSegments>,
        properties: &mut Value,
    ) -> Result<PathBuf> {
        if let Some(obj) = properties.as_object_mut() {
            obj.insert(
                "version".to_string(),
                Value::String(env!("CARGO_PKG_VERSION").to_string()),
            );
        }

        let stem = CONFIG_FILE_NAME.trim_end_matches(".json");
        let path = self.write_json(dir, stem, &*properties).await?;
        log::info!("✔️  {} saved successfully", CONFIG_FILE_NAME);
        Ok(path)
    }
}

fn parse_json<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| {
        logged(
            "read_json",
            ArtifactError::Json {
                path: path.to_path_buf(),
                source,
            },
        )
    })
}
