//! AMPscript beautifier
//!
//! AMPscript lives inside markup as `%%[ ... ]%%` blocks and `%%= ... =%%`
//! inline expressions. Grammar-based formatters reject it, so it gets its own
//! beautifier: keywords are capitalized and `IF`/`FOR` bodies are indented.
//! Everything outside the delimiters is passed through untouched.

use super::{Beautifier, FormatError};
use regex::{Captures, Regex};
use std::sync::LazyLock;

const BLOCK_OPEN: &str = "%%[";
const BLOCK_CLOSE: &str = "]%%";
const INLINE_OPEN: &str = "%%=";
const INLINE_CLOSE: &str = "=%%";

static LOGICAL: LazyLock<Regex> =
    LazyLock::new(|| keyword_regex(&["and", "or", "not"]));
static CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "if", "elseif", "else", "endif", "then", "for", "to", "downto", "do", "next",
    ])
});
static SET: LazyLock<Regex> = LazyLock::new(|| keyword_regex(&["set"]));
static VAR: LazyLock<Regex> = LazyLock::new(|| keyword_regex(&["var"]));

// `@` is excluded before the keyword so variables like `@for` stay as they are
fn keyword_regex(words: &[&str]) -> Regex {
    Regex::new(&format!(r"(?i)(^|[^@\w])({})\b", words.join("|")))
        .expect("keyword pattern is valid")
}

/// Which keyword groups are upper-cased
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmpOptions {
    pub capitalize_and_or_not: bool,
    pub capitalize_if_for: bool,
    pub capitalize_set: bool,
    pub capitalize_var: bool,
}

impl Default for AmpOptions {
    fn default() -> Self {
        Self {
            capitalize_and_or_not: true,
            capitalize_if_for: true,
            capitalize_set: true,
            capitalize_var: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmpBeautifier {
    options: AmpOptions,
    indent: String,
}

impl Default for AmpBeautifier {
    fn default() -> Self {
        Self::new(AmpOptions::default(), 4)
    }
}

impl AmpBeautifier {
    pub fn new(options: AmpOptions, tab_size: usize) -> Self {
        Self {
            options,
            indent: " ".repeat(tab_size),
        }
    }

    fn capitalize(&self, code: &str) -> String {
        let upper = |caps: &Captures| format!("{}{}", &caps[1], caps[2].to_uppercase());
        let groups = [
            (self.options.capitalize_and_or_not, &*LOGICAL),
            (self.options.capitalize_if_for, &*CONTROL),
            (self.options.capitalize_set, &*SET),
            (self.options.capitalize_var, &*VAR),
        ];

        let mut out = code.to_string();
        for (enabled, re) in groups {
            if enabled {
                out = re.replace_all(&out, upper).into_owned();
            }
        }
        out
    }

    /// Capitalize keywords outside of string literals
    fn capitalize_line(&self, line: &str) -> String {
        split_strings(line)
            .into_iter()
            .map(|(is_code, segment)| {
                if is_code {
                    self.capitalize(segment)
                } else {
                    segment.to_string()
                }
            })
            .collect()
    }

    fn format_block(&self, body: &str, line_no: usize) -> Result<String, FormatError> {
        let mut lines: Vec<String> = Vec::new();
        let mut depth = 0usize;
        let mut blank = false;
        let mut in_comment = false;

        for (offset, raw) in body.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                blank = !lines.is_empty();
                continue;
            }
            if blank {
                lines.push(String::new());
                blank = false;
            }

            let segments = comment_segments(trimmed, &mut in_comment);
            let line: String = segments
                .iter()
                .map(|(is_code, text)| {
                    if *is_code {
                        self.capitalize_line(text)
                    } else {
                        text.to_string()
                    }
                })
                .collect();
            let code: String = segments
                .iter()
                .filter(|(is_code, _)| *is_code)
                .map(|(_, text)| *text)
                .collect::<Vec<_>>()
                .join(" ");
            let words = code_words(&code);
            let first = words.first().map(String::as_str).unwrap_or_default();
            let level = match first {
                "ENDIF" | "NEXT" | "ELSE" | "ELSEIF" => depth.saturating_sub(1),
                _ => depth,
            };

            let opens = words.iter().filter(|w| *w == "IF" || *w == "FOR").count();
            let closes = words.iter().filter(|w| *w == "ENDIF" || *w == "NEXT").count();
            depth = (depth + opens).checked_sub(closes).ok_or_else(|| {
                FormatError::new(format!(
                    "Unexpected {} without matching IF/FOR at line {}",
                    first,
                    line_no + offset
                ))
            })?;

            lines.push(format!(
                "{}{}",
                self.indent.repeat(level + 1),
                line
            ));
        }

        if depth != 0 {
            return Err(FormatError::new(format!(
                "AMPscript block starting at line {} has {} unclosed IF/FOR statement(s)",
                line_no, depth
            )));
        }

        if lines.is_empty() {
            return Ok(format!("{}{}", BLOCK_OPEN, BLOCK_CLOSE));
        }
        Ok(format!(
            "{}\n{}\n{}",
            BLOCK_OPEN,
            lines.join("\n"),
            BLOCK_CLOSE
        ))
    }
}

impl Beautifier for AmpBeautifier {
    fn beautify(&self, content: &str) -> Result<String, FormatError> {
        let mut out = String::with_capacity(content.len());
        let mut rest = content;
        let mut consumed = 0usize;

        loop {
            let block = rest.find(BLOCK_OPEN);
            let inline = rest.find(INLINE_OPEN);
            let (start, is_block) = match (block, inline) {
                (None, None) => {
                    out.push_str(rest);
                    break;
                }
                (Some(b), Some(i)) if i < b => (i, false),
                (Some(b), _) => (b, true),
                (None, Some(i)) => (i, false),
            };

            let line_no = line_of(content, consumed + start);
            out.push_str(&rest[..start]);

            let (close, open_len) = if is_block {
                (BLOCK_CLOSE, BLOCK_OPEN.len())
            } else {
                (INLINE_CLOSE, INLINE_OPEN.len())
            };
            let body_start = start + open_len;
            let end = rest[body_start..].find(close).ok_or_else(|| {
                FormatError::new(format!(
                    "Unterminated AMPscript {} opened at line {}",
                    if is_block { "block" } else { "expression" },
                    line_no
                ))
            })?;
            let body = &rest[body_start..body_start + end];

            if is_block {
                out.push_str(&self.format_block(body, line_no)?);
            } else {
                out.push_str(INLINE_OPEN);
                out.push_str(&self.capitalize_line(body.trim()));
                out.push_str(INLINE_CLOSE);
            }

            let next = body_start + end + close.len();
            consumed += next;
            rest = &rest[next..];
        }

        Ok(out)
    }
}

/// Split a line into `(is_code, text)` runs, `/* */` comments being non-code.
///
/// `in_comment` carries an unterminated comment over to the next line.
fn comment_segments<'a>(line: &'a str, in_comment: &mut bool) -> Vec<(bool, &'a str)> {
    let bytes = line.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        if *in_comment {
            match line[i..].find("*/") {
                Some(end) => {
                    let stop = i + end + 2;
                    segments.push((false, &line[start..stop]));
                    start = stop;
                    i = stop;
                    *in_comment = false;
                }
                None => i = bytes.len(),
            }
            continue;
        }

        match (quote, bytes[i]) {
            (Some(q), b) if b == q => quote = None,
            (None, b @ (b'"' | b'\'')) => quote = Some(b),
            (None, b'/') if bytes.get(i + 1) == Some(&b'*') => {
                if start < i {
                    segments.push((true, &line[start..i]));
                }
                start = i;
                *in_comment = true;
                i += 2;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    if start < line.len() {
        segments.push((!*in_comment, &line[start..]));
    }
    segments
}

/// Split a line into `(is_code, text)` runs, string literals being non-code
fn split_strings(line: &str) -> Vec<(bool, &str)> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;

    for (i, c) in line.char_indices() {
        match quote {
            None if c == '"' || c == '\'' => {
                if start < i {
                    segments.push((true, &line[start..i]));
                }
                start = i;
                quote = Some(c);
            }
            Some(q) if c == q => {
                segments.push((false, &line[start..=i]));
                start = i + c.len_utf8();
                quote = None;
            }
            _ => {}
        }
    }
    if start < line.len() {
        segments.push((quote.is_none(), &line[start..]));
    }
    segments
}

/// Upper-cased words of the code parts of a line; `@` counts as a word
/// character so variables are never mistaken for keywords
fn code_words(line: &str) -> Vec<String> {
    split_strings(line)
        .into_iter()
        .filter(|(is_code, _)| *is_code)
        .flat_map(|(_, code)| {
            code.split(|c: char| !(c.is_alphanumeric() || c == '@' || c == '_'))
                .filter(|w| !w.is_empty())
                .map(str::to_uppercase)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn line_of(content: &str, byte_offset: usize) -> usize {
    content[..byte_offset.min(content.len())].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_is_indented_and_capitalized() {
        let input = "<p>Hi</p>\n%%[ set @name = 'set and if'\nif @name == \"x\" and not empty(@name) then\nset @out = 1\nelse\nset @out = 2\nendif ]%%\n<p>%%= v( @out ) =%%</p>";
        let output = AmpBeautifier::default().beautify(input).unwrap();
        assert_eq!(
            output,
            "<p>Hi</p>\n%%[\n    SET @name = 'set and if'\n    IF @name == \"x\" AND NOT empty(@name) THEN\n        SET @out = 1\n    ELSE\n        SET @out = 2\n    ENDIF\n]%%\n<p>%%=v( @out )=%%</p>"
        );
    }

    #[test]
    fn test_variables_named_like_keywords_are_kept() {
        let output = AmpBeautifier::default()
            .beautify("%%[ var @for, @if set @for = 1 ]%%")
            .unwrap();
        assert_eq!(output, "%%[\n    VAR @for, @if SET @for = 1\n]%%");
    }

    #[test]
    fn test_nested_for_loop() {
        let input = "%%[\nfor @i = 1 to 3 do\nif @i == 2 then\nset @x = @i\nendif\nnext @i\n]%%";
        let output = AmpBeautifier::default().beautify(input).unwrap();
        assert_eq!(
            output,
            "%%[\n    FOR @i = 1 TO 3 DO\n        IF @i == 2 THEN\n            SET @x = @i\n        ENDIF\n    NEXT @i\n]%%"
        );
    }

    #[test]
    fn test_options_disable_groups() {
        let beautifier = AmpBeautifier::new(
            AmpOptions {
                capitalize_set: false,
                ..AmpOptions::default()
            },
            2,
        );
        let output = beautifier.beautify("%%[set @a = 1 and 2]%%").unwrap();
        assert_eq!(output, "%%[\n  set @a = 1 AND 2\n]%%");
    }

    #[test]
    fn test_unterminated_block_is_an_error() {
        let err = AmpBeautifier::default()
            .beautify("line\n%%[ set @a = 1")
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_unbalanced_if_is_an_error() {
        assert!(
            AmpBeautifier::default()
                .beautify("%%[ if @a then set @b = 1 ]%%")
                .is_err()
        );
        assert!(AmpBeautifier::default().beautify("%%[ endif ]%%").is_err());
    }

    #[test]
    fn test_plain_text_is_untouched() {
        let input = "<html><body>and if for</body></html>";
        assert_eq!(AmpBeautifier::default().beautify(input).unwrap(), input);
    }

    #[test]
    fn test_comments_are_kept_verbatim() {
        let input = "%%[\n/* loop for each row */\nset @a = 1 /* if not set */\n/* for\n   each if\n*/\nif @a then\nset @b = 2\nendif\n]%%";
        let output = AmpBeautifier::default().beautify(input).unwrap();
        assert_eq!(
            output,
            "%%[\n    /* loop for each row */\n    SET @a = 1 /* if not set */\n    /* for\n    each if\n    */\n    IF @a THEN\n        SET @b = 2\n    ENDIF\n]%%"
        );
    }

    #[test]
    fn test_comment_markers_in_strings_are_code() {
        let output = AmpBeautifier::default()
            .beautify("%%[ set @a = '/*' if @a then set @b = 1 endif ]%%")
            .unwrap();
        assert_eq!(output, "%%[\n    SET @a = '/*' IF @a THEN SET @b = 1 ENDIF\n]%%");
    }

    #[test]
    fn test_single_line_if_endif() {
        let output = AmpBeautifier::default()
            .beautify("%%[ if @a then set @b = 1 endif ]%%")
            .unwrap();
        assert_eq!(output, "%%[\n    IF @a THEN SET @b = 1 ENDIF\n]%%");
    }
}
