//! Style configuration for the general formatter
//!
//! The project carries a `.prettierrc`-style file at its root. It is resolved
//! lazily per file type because `overrides` can give, say, markdown files a
//! different indentation than scripts.

use super::FileType;
use eyre::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

/// Names probed in the project directory, first match wins
pub const CONFIG_FILES: &[&str] = &[
    ".prettierrc",
    ".prettierrc.json",
    ".prettierrc.json5",
    ".prettierrc.yaml",
    ".prettierrc.yml",
];

/// Line ending written by the formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndOfLine {
    #[default]
    Lf,
    Crlf,
    Cr,
    Auto,
}

impl EndOfLine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lf | Self::Auto => "\n",
            Self::Crlf => "\r\n",
            Self::Cr => "\r",
        }
    }
}

/// Options the general formatter honours; unknown keys are ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleOptions {
    pub tab_width: usize,
    pub use_tabs: bool,
    pub end_of_line: EndOfLine,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            tab_width: 2,
            use_tabs: false,
            end_of_line: EndOfLine::Lf,
        }
    }
}

impl StyleOptions {
    /// One level of indentation
    pub fn indent_unit(&self) -> String {
        if self.use_tabs {
            "\t".to_string()
        } else {
            " ".repeat(self.tab_width)
        }
    }
}

/// Content written by `metasync init`
pub fn default_style_config() -> Value {
    json!({
        "tabWidth": 4,
        "useTabs": false,
        "endOfLine": "lf",
        "overrides": [
            {
                "files": ["*.{yaml,yml,md}"],
                "options": { "tabWidth": 2 }
            }
        ]
    })
}

#[derive(Debug, Clone, PartialEq)]
enum ConfigState {
    Unresolved,
    Resolved {
        file_type: FileType,
        options: StyleOptions,
    },
    Failed {
        file_type: FileType,
    },
}

/// Caller-owned formatter configuration handle.
///
/// Starts unresolved, and is resolved (or marked as failed) for one file type
/// at a time. Asking for the same file type again reuses the outcome, so a
/// missing config file is reported once instead of on every artifact.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    project_dir: PathBuf,
    state: ConfigState,
}

impl FormatterConfig {
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
            state: ConfigState::Unresolved,
        }
    }

    /// Config rooted at the current working directory
    pub fn from_current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Ok(Self::new(cwd))
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Resolve the configuration for `file_type` before the first write.
    ///
    /// Returns whether usable options are now in place for that type.
    pub fn init(&mut self, file_type: FileType) -> bool {
        self.ensure(file_type).is_some()
    }

    /// Options for `file_type`, resolving first if the handle is unresolved or
    /// was resolved for another type
    pub fn ensure(&mut self, file_type: FileType) -> Option<&StyleOptions> {
        if self.needs_resolution(file_type) {
            self.resolve(file_type);
        }
        self.options()
    }

    /// Options of the last successful resolution
    pub fn options(&self) -> Option<&StyleOptions> {
        match &self.state {
            ConfigState::Resolved { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, ConfigState::Failed { .. })
    }

    fn needs_resolution(&self, file_type: FileType) -> bool {
        match &self.state {
            ConfigState::Unresolved => true,
            ConfigState::Resolved { file_type: ft, .. } | ConfigState::Failed { file_type: ft } => {
                *ft != file_type
            }
        }
    }

    fn resolve(&mut self, file_type: FileType) {
        self.state = match resolve_style(&self.project_dir, file_type) {
            Ok(Some(options)) => {
                log::debug!("Resolved style configuration for *.{}", file_type);
                ConfigState::Resolved { file_type, options }
            }
            Ok(None) => {
                log::error!(
                    "Cannot apply auto-formatting to your code: No .prettierrc found in your project directory. Please run 'metasync init' to create it"
                );
                ConfigState::Failed { file_type }
            }
            Err(e) => {
                log::error!("Cannot apply auto-formatting to your code: {:#}", e);
                ConfigState::Failed { file_type }
            }
        };
    }
}

/// Look up the project style configuration and compute the options that apply
/// to a file of `file_type`. `Ok(None)` means no configuration file exists.
pub fn resolve_style(project_dir: &Path, file_type: FileType) -> Result<Option<StyleOptions>> {
    let Some(path) = CONFIG_FILES
        .iter()
        .map(|name| project_dir.join(name))
        .find(|path| path.is_file())
    else {
        return Ok(None);
    };

    let raw = load_config_file(&path)?;
    let probe = format!("index.{}", file_type.extension());
    let options = options_for(&raw, &probe)
        .with_context(|| format!("Invalid style configuration: {}", path.display()))?;
    Ok(Some(options))
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read style configuration: {}", path.display()))?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML: {}", path.display())),
        Some(_) => json5::from_str(&content)
            .with_context(|| format!("Failed to parse JSON5: {}", path.display())),
        // A bare .prettierrc may hold either JSON or YAML
        None => json5::from_str::<Value>(&content)
            .or_else(|_| serde_yaml::from_str::<Value>(&content))
            .with_context(|| format!("Failed to parse {}", path.display())),
    }
}

/// Merge the base options with every override whose globs match `probe`
fn options_for(raw: &Value, probe: &str) -> Result<StyleOptions> {
    let Value::Object(base) = raw else {
        bail!("style configuration must be an object");
    };

    let mut merged: Map<String, Value> = base.clone();
    if let Some(Value::Array(overrides)) = merged.remove("overrides") {
        for entry in &overrides {
            let included = patterns(entry.get("files"))
                .iter()
                .any(|glob| glob_matches(glob, probe));
            let excluded = patterns(entry.get("excludeFiles"))
                .iter()
                .any(|glob| glob_matches(glob, probe));

            if included
                && !excluded
                && let Some(Value::Object(options)) = entry.get("options")
            {
                for (key, value) in options {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }

    serde_json::from_value(Value::Object(merged)).context("Unsupported style option value")
}

fn patterns(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

fn glob_matches(glob: &str, name: &str) -> bool {
    match Regex::new(&glob_to_regex(glob)) {
        Ok(re) => re.is_match(name),
        Err(e) => {
            log::debug!("Ignoring unusable override glob '{}': {}", glob, e);
            false
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    let mut in_group = false;

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}
