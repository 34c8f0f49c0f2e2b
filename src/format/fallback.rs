//! Formatter selection with graceful degradation
//!
//! Chooses between the general formatter and the AMPscript beautifier, and
//! never fails: a formatting error hands back the original content together
//! with a [`FormatFailure`] the caller can persist next to the artifact.

use super::{
    AmpBeautifier, Beautifier, BuiltinFormatter, CodeFormatter, FileType, FormatterConfig, Parser,
};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x1B\x{9B}][\[()#;?]*(?:[0-9]{1,4}(?:;[0-9]{0,4})*)?[0-9A-ORZcf-nqry=><]")
        .expect("ANSI escape pattern is valid")
});

/// Remove terminal color and cursor sequences
pub fn strip_ansi(input: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(input, "")
}

/// Whether generic content embeds AMPscript, which grammar parsers reject
pub fn contains_ampscript(content: &str) -> bool {
    content.contains("%%[") || content.contains("%%=")
}

/// Why the general formatter gave up on some content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatFailure {
    pub parser: Parser,
    pub message: String,
}

impl FormatFailure {
    /// Body of the `.error.log` sidecar
    pub fn error_log(&self) -> String {
        format!(
            "Error Log\nParser: {}\n{}",
            self.parser,
            strip_ansi(&self.message)
        )
    }
}

/// Result of a formatting attempt; `content` is always safe to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub content: String,
    pub failure: Option<FormatFailure>,
}

impl Formatted {
    fn clean(content: String) -> Self {
        Self {
            content,
            failure: None,
        }
    }
}

/// The two beautifiers plus the rules for picking one of them
#[derive(Debug, Clone)]
pub struct Formatter<G = BuiltinFormatter, A = AmpBeautifier> {
    general: G,
    amp: A,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(BuiltinFormatter, AmpBeautifier::default())
    }
}

impl<G: CodeFormatter, A: Beautifier> Formatter<G, A> {
    pub fn new(general: G, amp: A) -> Self {
        Self { general, amp }
    }

    pub fn general(&self) -> &G {
        &self.general
    }

    /// Beautify `content` of `file_type`.
    ///
    /// AMPscript files, and generic files that embed AMPscript, go to the
    /// AMPscript beautifier. Everything else goes to the general formatter,
    /// provided the style configuration resolves for `file_type`; without one
    /// the content is returned as is.
    pub fn format(
        &self,
        config: &mut FormatterConfig,
        file_type: FileType,
        content: &str,
    ) -> Formatted {
        let Some(parser) = Parser::for_file_type(file_type) else {
            return Formatted::clean(self.beautify_amp(content));
        };

        let Some(options) = config.ensure(file_type) else {
            return Formatted::clean(content.to_string());
        };

        if contains_ampscript(content) {
            return Formatted::clean(self.beautify_amp(content));
        }

        match self.general.format(content, parser, options) {
            Ok(formatted) => Formatted::clean(formatted),
            Err(e) => Formatted {
                content: content.to_string(),
                failure: Some(FormatFailure {
                    parser,
                    message: e.to_string(),
                }),
            },
        }
    }

    fn beautify_amp(&self, content: &str) -> String {
        match self.amp.beautify(content) {
            Ok(formatted) => formatted,
            Err(e) => {
                log::debug!("Formatter::beautify_amp:: error | {}", e);
                content.to_string()
            }
        }
    }
}
