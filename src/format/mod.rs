//! Content beautification before artifacts are written
//!
//! Two pluggable beautifiers are involved:
//! - a general [`CodeFormatter`] driven by the project's style configuration
//! - an AMPscript [`Beautifier`] for the templating dialect grammar parsers
//!   cannot read
//!
//! [`Formatter`] decides which one runs and degrades to the raw content when
//! formatting fails.

mod amp;
mod code;
mod config;
mod fallback;
mod file_type;

pub use amp::{AmpBeautifier, AmpOptions};
pub use code::BuiltinFormatter;
pub use config::{
    CONFIG_FILES, EndOfLine, FormatterConfig, StyleOptions, default_style_config, resolve_style,
};
pub use fallback::{FormatFailure, Formatted, Formatter, contains_ampscript, strip_ansi};
pub use file_type::{FileType, Parser};

use thiserror::Error;

/// A beautifier rejected its input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FormatError {
    message: String,
}

impl FormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error at a 1-based line/column, followed by a code frame of `source`
    pub fn at(source: &str, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            message: format!(
                "{}\n{}",
                message.into(),
                code::code_frame(source, line, column)
            ),
        }
    }
}

/// Grammar-aware formatter for markup, scripts, stylesheets and data files
pub trait CodeFormatter: Send + Sync {
    fn format(
        &self,
        content: &str,
        parser: Parser,
        options: &StyleOptions,
    ) -> Result<String, FormatError>;
}

/// Formatter for the AMPscript templating dialect
pub trait Beautifier: Send + Sync {
    fn beautify(&self, content: &str) -> Result<String, FormatError>;
}
