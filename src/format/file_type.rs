//! Supported file types and the parser each one is formatted with

use crate::error::ArtifactError;
use std::fmt;
use std::str::FromStr;

/// File types that can be beautified before they are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Amp,
    Html,
    Js,
    Ssjs,
    Ts,
    Json,
    Yaml,
    Css,
    Less,
    Scss,
    Markdown,
    Sql,
}

impl FileType {
    /// Canonical extension, used when probing style overrides
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Amp => "amp",
            Self::Html => "html",
            Self::Js => "js",
            Self::Ssjs => "ssjs",
            Self::Ts => "ts",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Css => "css",
            Self::Less => "less",
            Self::Scss => "scss",
            Self::Markdown => "md",
            Self::Sql => "sql",
        }
    }
}

impl FromStr for FileType {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "amp" => Ok(Self::Amp),
            "html" | "htm" => Ok(Self::Html),
            "js" => Ok(Self::Js),
            "ssjs" => Ok(Self::Ssjs),
            "ts" => Ok(Self::Ts),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "css" => Ok(Self::Css),
            "less" => Ok(Self::Less),
            "scss" | "sass" => Ok(Self::Scss),
            "md" => Ok(Self::Markdown),
            "sql" => Ok(Self::Sql),
            _ => Err(ArtifactError::UnknownFileType(s.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Grammar the general formatter applies to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parser {
    Html,
    Babel,
    BabelTs,
    Json,
    Yaml,
    Css,
    Less,
    Scss,
    Markdown,
    Sql,
}

impl Parser {
    /// Parser for a file type; `None` for AMPscript, which has its own
    /// beautifier
    pub fn for_file_type(file_type: FileType) -> Option<Self> {
        match file_type {
            FileType::Amp => None,
            FileType::Html => Some(Self::Html),
            FileType::Js | FileType::Ssjs => Some(Self::Babel),
            FileType::Ts => Some(Self::BabelTs),
            FileType::Json => Some(Self::Json),
            FileType::Yaml => Some(Self::Yaml),
            FileType::Css => Some(Self::Css),
            FileType::Less => Some(Self::Less),
            FileType::Scss => Some(Self::Scss),
            FileType::Markdown => Some(Self::Markdown),
            FileType::Sql => Some(Self::Sql),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Babel => "babel",
            Self::BabelTs => "babel-ts",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Css => "css",
            Self::Less => "less",
            Self::Scss => "scss",
            Self::Markdown => "markdown",
            Self::Sql => "sql",
        }
    }

    /// Plugins the parser needs on top of the core grammar
    pub fn plugins(&self) -> &'static [&'static str] {
        match self {
            Self::Sql => &["prettier-plugin-sql"],
            _ => &[],
        }
    }
}

impl fmt::Display for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
