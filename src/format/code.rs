//! Built-in general-purpose formatter
//!
//! Data formats (JSON, YAML) are parsed and re-printed. Everything else gets
//! whitespace normalization, and brace-based languages are additionally checked
//! for balanced brackets so that broken code is reported instead of being
//! silently rewritten.

use super::{CodeFormatter, EndOfLine, FormatError, Parser, StyleOptions};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFormatter;

impl CodeFormatter for BuiltinFormatter {
    fn format(
        &self,
        content: &str,
        parser: Parser,
        options: &StyleOptions,
    ) -> Result<String, FormatError> {
        let formatted = match parser {
            Parser::Json => format_json(content, options)?,
            Parser::Yaml => format_yaml(content)?,
            Parser::Babel | Parser::BabelTs | Parser::Css | Parser::Less | Parser::Scss => {
                check_brackets(content, parser)?;
                normalize_text(content, options, true)
            }
            Parser::Html | Parser::Sql => normalize_text(content, options, true),
            // Trailing spaces are hard line breaks in markdown
            Parser::Markdown => normalize_text(content, options, false),
        };
        Ok(apply_line_endings(formatted, options.end_of_line))
    }
}

fn format_json(content: &str, options: &StyleOptions) -> Result<String, FormatError> {
    let value: Value = serde_json::from_str(content).map_err(|e| {
        FormatError::at(content, e.line(), e.column(), format!("SyntaxError: {}", e))
    })?;

    let indent = options.indent_unit();
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| FormatError::new(format!("Failed to print JSON: {}", e)))?;

    let mut out = String::from_utf8(buffer)
        .map_err(|e| FormatError::new(format!("Failed to print JSON: {}", e)))?;
    out.push('\n');
    Ok(out)
}

fn format_yaml(content: &str) -> Result<String, FormatError> {
    if content.trim().is_empty() {
        return Ok(String::new());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| match e.location() {
        Some(loc) => FormatError::at(
            content,
            loc.line(),
            loc.column(),
            format!("SyntaxError: {}", e),
        ),
        None => FormatError::new(format!("SyntaxError: {}", e)),
    })?;
    serde_yaml::to_string(&value).map_err(|e| FormatError::new(format!("Failed to print YAML: {}", e)))
}

/// Re-indent leading whitespace, drop trailing whitespace, collapse runs of
/// blank lines and end with exactly one newline
fn normalize_text(content: &str, options: &StyleOptions, trim_trailing: bool) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank = false;

    for line in content.lines() {
        if line.trim().is_empty() {
            blank = !lines.is_empty();
            continue;
        }
        if blank {
            lines.push(String::new());
            blank = false;
        }
        let line = if trim_trailing { line.trim_end() } else { line };
        lines.push(reindent(line, options));
    }

    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn reindent(line: &str, options: &StyleOptions) -> String {
    let tab_width = options.tab_width.max(1);
    let body = line.trim_start_matches([' ', '\t']);
    let width: usize = line[..line.len() - body.len()]
        .chars()
        .map(|c| if c == '\t' { tab_width } else { 1 })
        .sum();

    let unit = options.indent_unit();
    format!(
        "{}{}{}",
        unit.repeat(width / tab_width),
        " ".repeat(width % tab_width),
        body
    )
}

fn apply_line_endings(content: String, end_of_line: EndOfLine) -> String {
    match end_of_line {
        EndOfLine::Lf | EndOfLine::Auto => content,
        other => content.replace('\n', other.as_str()),
    }
}

/// Characters after which a `/` opens a regex literal instead of dividing
const REGEX_PRECEDERS: &str = "(,=:[!&|?{};+-*%<>~^";

/// Keywords after which a `/` opens a regex literal
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof", "yield", "await",
];

/// Bracket balance check that skips strings, comments and regex literals
fn check_brackets(content: &str, parser: Parser) -> Result<(), FormatError> {
    // Plain CSS has no line comments, and `//` shows up in unquoted urls
    let line_comments = parser != Parser::Css;
    let regex_literals = matches!(parser, Parser::Babel | Parser::BabelTs);
    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    let mut chars = content.chars().peekable();
    let (mut line, mut column) = (1usize, 0usize);

    // Whether a `/` here starts an operand; true at the start of input
    let mut expect_operand = true;
    // Last word token, only meaningful while it is the last significant token
    let mut word = String::new();
    let mut word_closed = false;

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
            column = 0;
            word_closed = true;
            continue;
        }
        column += 1;
        if c.is_whitespace() {
            word_closed = true;
            continue;
        }

        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                column += 1;
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        column = 0;
                    } else {
                        column += 1;
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                continue;
            }
            '/' if line_comments && chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        column = 0;
                        break;
                    }
                }
                word_closed = true;
                continue;
            }
            '/' if regex_literals
                && (expect_operand || REGEX_KEYWORDS.contains(&word.as_str())) =>
            {
                let (mut escaped, mut in_class) = (false, false);
                while let Some(&c) = chars.peek() {
                    // Regex literals cannot span lines
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                    column += 1;
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '[' {
                        in_class = true;
                    } else if c == ']' {
                        in_class = false;
                    } else if c == '/' && !in_class {
                        break;
                    }
                }
            }
            '"' | '\'' | '`' => {
                let quote = c;
                let mut escaped = false;
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        column = 0;
                    } else {
                        column += 1;
                    }
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == quote {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => stack.push((c, line, column)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _, _)) if open == expected => {}
                    _ => {
                        return Err(FormatError::at(
                            content,
                            line,
                            column,
                            format!("SyntaxError: Unexpected token '{}' ({}:{})", c, line, column),
                        ));
                    }
                }
            }
            _ => {}
        }

        if c.is_alphanumeric() || c == '_' || c == '$' {
            if word_closed {
                word.clear();
                word_closed = false;
            }
            word.push(c);
            expect_operand = false;
        } else {
            word.clear();
            word_closed = false;
            expect_operand = REGEX_PRECEDERS.contains(c);
        }
    }

    match stack.pop() {
        Some((open, line, column)) => Err(FormatError::at(
            content,
            line,
            column,
            format!("SyntaxError: Unclosed '{}' ({}:{})", open, line, column),
        )),
        None => Ok(()),
    }
}

/// Source excerpt around `line` with a caret under `column`, highlighted the
/// way terminal formatters print it
pub(crate) fn code_frame(content: &str, line: usize, column: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let first = line.saturating_sub(2).max(1);
    let last = (line + 1).min(lines.len());
    let width = last.to_string().len();

    let mut frame = Vec::new();
    for number in first..=last {
        let text = lines.get(number - 1).copied().unwrap_or_default();
        if number == line {
            frame.push(format!(
                "{} {:>width$} | {}",
                ">".red().bold(),
                number,
                text,
                width = width
            ));
            frame.push(format!(
                "  {:>width$} | {}{}",
                "",
                " ".repeat(column.saturating_sub(1)),
                "^".red().bold(),
                width = width
            ));
        } else {
            frame.push(format!("  {:>width$} | {}", number, text, width = width));
        }
    }
    frame.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(tab_width: usize, use_tabs: bool) -> StyleOptions {
        StyleOptions {
            tab_width,
            use_tabs,
            ..StyleOptions::default()
        }
    }

    #[test]
    fn test_json_is_reprinted_in_order() {
        let output = BuiltinFormatter
            .format(r#"{"b":1,"a":[1,2]}"#, Parser::Json, &options(4, false))
            .unwrap();
        assert_eq!(
            output,
            "{\n    \"b\": 1,\n    \"a\": [\n        1,\n        2\n    ]\n}\n"
        );
    }

    #[test]
    fn test_invalid_json_reports_location() {
        let err = BuiltinFormatter
            .format("{\n  \"a\": ,\n}", Parser::Json, &StyleOptions::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("SyntaxError:"));
        assert!(err.to_string().contains("2 | "));
    }

    #[test]
    fn test_yaml_is_reprinted() {
        let output = BuiltinFormatter
            .format("a:   1\nb:\n    - x\n", Parser::Yaml, &StyleOptions::default())
            .unwrap();
        assert_eq!(output, "a: 1\nb:\n- x\n");
    }

    #[test]
    fn test_text_normalization() {
        let input = "\n\nfunction f() {\n\treturn 1;   \n}\n\n\n\nf();";
        let output = BuiltinFormatter
            .format(input, Parser::Babel, &options(4, false))
            .unwrap();
        assert_eq!(output, "function f() {\n    return 1;\n}\n\nf();\n");
    }

    #[test]
    fn test_spaces_to_tabs() {
        let output = BuiltinFormatter
            .format("a {\n    color: red;\n}", Parser::Css, &options(4, true))
            .unwrap();
        assert_eq!(output, "a {\n\tcolor: red;\n}\n");
    }

    #[test]
    fn test_markdown_keeps_hard_breaks() {
        let output = BuiltinFormatter
            .format("line one  \nline two", Parser::Markdown, &StyleOptions::default())
            .unwrap();
        assert_eq!(output, "line one  \nline two\n");
    }

    #[test]
    fn test_crlf_line_endings() {
        let opts = StyleOptions {
            end_of_line: EndOfLine::Crlf,
            ..StyleOptions::default()
        };
        let output = BuiltinFormatter
            .format("<p>\n</p>", Parser::Html, &opts)
            .unwrap();
        assert_eq!(output, "<p>\r\n</p>\r\n");
    }

    #[test]
    fn test_unbalanced_brackets_fail() {
        let err = BuiltinFormatter
            .format("if (a) {\n  b();\n}}\n", Parser::Babel, &StyleOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("Unexpected token '}' (3:2)"));

        let err = BuiltinFormatter
            .format("a { color: red;", Parser::Css, &StyleOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("Unclosed '{' (1:3)"));
    }

    #[test]
    fn test_brackets_in_strings_and_comments_are_ignored() {
        let input = "const s = \"}\"; // )\n/* [ */ const t = `{`;\n";
        assert!(
            BuiltinFormatter
                .format(input, Parser::Babel, &StyleOptions::default())
                .is_ok()
        );
        let css = "a { background: url(http://x/y.png); }\n";
        assert!(
            BuiltinFormatter
                .format(css, Parser::Css, &StyleOptions::default())
                .is_ok()
        );
    }

    #[test]
    fn test_regex_literals_are_skipped() {
        let input = "var s = str.replace(/\\(/g, '');\nvar r = /[/(]/.test(s);\nfunction f() {\n    return /\\)/;\n}\nvar half = total / 2 / (n);\n";
        assert!(
            BuiltinFormatter
                .format(input, Parser::Babel, &StyleOptions::default())
                .is_ok()
        );

        // After an operand, `/` divides and brackets are still checked
        let err = BuiltinFormatter
            .format("var x = (a / b;", Parser::Babel, &StyleOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("Unclosed '(' (1:9)"));
    }

    #[test]
    fn test_code_frame_marks_line() {
        let frame = code_frame("one\ntwo\nthree\nfour", 3, 2);
        assert!(frame.contains("3 | three"));
        assert!(frame.contains("\x1b["));
        assert!(frame.contains("1 | one"));
        assert!(frame.contains("4 | four"));
    }
}
