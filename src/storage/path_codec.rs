//! OS-safe path and filename encoding
//!
//! Names of retrieved metadata can contain anything: slashes, colons, stars,
//! non-ASCII text. Before such a name becomes part of a path it is
//! percent-encoded with the `encodeURIComponent` character set, except for a
//! few characters that are legal everywhere and that templating relies on
//! (space, braces, brackets, `@`). The path flavour additionally keeps
//! separators so that directory structure survives.
//!
//! `*` is unreserved in percent-encoding but illegal in Windows filenames, so it
//! is swapped for the [`STAR_MARKER`] token.

use crate::error::{ArtifactError, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::path::{Component, MAIN_SEPARATOR_STR, Path, PathBuf};

/// Replacement for `*`, which Windows does not accept in filenames
pub const STAR_MARKER: &str = "_STAR_";

/// `encodeURIComponent` keeps `A-Z a-z 0-9 - _ . ! ~ * ' ( )` as they are
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const FILENAME: &AsciiSet = &URI_COMPONENT
    .remove(b' ')
    .remove(b'{')
    .remove(b'}')
    .remove(b'[')
    .remove(b']')
    .remove(b'@');

const PATH: &AsciiSet = &FILENAME.remove(b'/').remove(b'\\');

/// A directory given either as one path or as ordered parts to be joined.
///
/// Both forms are normalized by [`normalize_path`] and end up as the same path:
/// `["deploy", "bu1"]` and `"deploy/bu1"` are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegments {
    Joined(PathBuf),
    Parts(Vec<String>),
}

impl From<&str> for PathSegments {
    fn from(value: &str) -> Self {
        Self::Joined(PathBuf::from(value))
    }
}

impl From<String> for PathSegments {
    fn from(value: String) -> Self {
        Self::Joined(PathBuf::from(value))
    }
}

impl From<&Path> for PathSegments {
    fn from(value: &Path) -> Self {
        Self::Joined(value.to_path_buf())
    }
}

impl From<PathBuf> for PathSegments {
    fn from(value: PathBuf) -> Self {
        Self::Joined(value)
    }
}

impl From<&PathBuf> for PathSegments {
    fn from(value: &PathBuf) -> Self {
        Self::Joined(value.clone())
    }
}

impl From<Vec<String>> for PathSegments {
    fn from(value: Vec<String>) -> Self {
        Self::Parts(value)
    }
}

impl From<Vec<&str>> for PathSegments {
    fn from(value: Vec<&str>) -> Self {
        Self::Parts(value.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for PathSegments {
    fn from(value: &[&str]) -> Self {
        Self::Parts(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PathSegments {
    fn from(value: [&str; N]) -> Self {
        Self::Parts(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Missing parts become empty strings and keep their slot
impl From<Vec<Option<&str>>> for PathSegments {
    fn from(value: Vec<Option<&str>>) -> Self {
        Self::Parts(
            value
                .into_iter()
                .map(|part| part.unwrap_or_default().to_string())
                .collect(),
        )
    }
}

/// Encode a directory path, keeping `/` and `\` so nesting is preserved
pub fn encode_path(input: &str) -> String {
    utf8_percent_encode(input, PATH)
        .to_string()
        .replace('*', STAR_MARKER)
}

/// Encode a single filename; separators are escaped so a name can never
/// create subdirectories
pub fn encode_filename(input: &str) -> String {
    utf8_percent_encode(input, FILENAME)
        .to_string()
        .replace('*', STAR_MARKER)
}

/// Reverse [`encode_filename`]
pub fn decode_filename(input: &str) -> Result<String> {
    percent_decode_str(input)
        .decode_utf8()
        .map(|decoded| decoded.replace(STAR_MARKER, "*"))
        .map_err(|e| ArtifactError::Decode {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

/// Lexically normalize a path given as one string or as parts.
///
/// Parts are joined with the platform separator first, so both forms take the
/// same route. Empty and `.` components disappear, `..` pops a preceding normal
/// component, and an empty result becomes `.` so nothing is ever written to
/// the filesystem root by accident.
pub fn normalize_path(segments: impl Into<PathSegments>) -> PathBuf {
    let joined = match segments.into() {
        PathSegments::Joined(path) => path,
        PathSegments::Parts(parts) => PathBuf::from(parts.join(MAIN_SEPARATOR_STR)),
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Normalize a directory and encode every regular component of it.
///
/// Roots and drive prefixes pass through untouched (a `:` in `C:` would
/// otherwise be escaped).
pub fn sanitize_dir(segments: impl Into<PathSegments>) -> PathBuf {
    normalize_path(segments)
        .components()
        .fold(PathBuf::new(), |mut acc, component| {
            match component {
                Component::Normal(part) => acc.push(encode_path(&part.to_string_lossy())),
                other => acc.push(other.as_os_str()),
            }
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_roundtrip() {
        let names = [
            "plain",
            "with space",
            "a/b\\c",
            "star*name**",
            "{{{templated}}}",
            "[asset] @user",
            "ümlaut ✓ 日本",
            "100% sure?",
            "colon:pipe|quote\"lt<gt>",
            "",
        ];
        for name in names {
            let encoded = encode_filename(name);
            assert_eq!(decode_filename(&encoded).unwrap(), name, "encoded: {encoded}");
        }
    }

    #[test]
    fn test_filename_escapes_separators_and_star() {
        assert_eq!(encode_filename("a/b"), "a%2Fb");
        assert_eq!(encode_filename("a\\b"), "a%5Cb");
        assert_eq!(encode_filename("a*b"), "a_STAR_b");
        assert_eq!(encode_filename("c:d"), "c%3Ad");
        assert_eq!(encode_filename("ü"), "%C3%BC");
    }

    #[test]
    fn test_filename_keeps_templating_characters() {
        assert_eq!(
            encode_filename("{{{name}}} [block] @me x"),
            "{{{name}}} [block] @me x"
        );
        assert_eq!(encode_filename("it's (fine)!~"), "it's (fine)!~");
    }

    #[test]
    fn test_path_keeps_separators() {
        assert_eq!(encode_path("deploy/bu 1/{x}"), "deploy/bu 1/{x}");
        assert_eq!(encode_path("a\\b"), "a\\b");
        assert_eq!(encode_path("a*?"), "a_STAR_%3F");
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = decode_filename("%FF%FE").unwrap_err();
        assert!(matches!(err, ArtifactError::Decode { .. }));
    }

    #[test]
    fn test_parts_and_joined_converge() {
        let from_parts = normalize_path(["a", "b c", "{d}"]);
        let joined = ["a", "b c", "{d}"].join(MAIN_SEPARATOR_STR);
        assert_eq!(from_parts, normalize_path(joined.as_str()));
        assert_eq!(from_parts, Path::new("a").join("b c").join("{d}"));
    }

    #[test]
    fn test_missing_parts_are_empty() {
        let path = normalize_path(vec![Some("a"), None, Some(""), Some("b")]);
        assert_eq!(path, Path::new("a").join("b"));
    }

    #[test]
    fn test_empty_path_is_current_dir() {
        assert_eq!(normalize_path(""), PathBuf::from("."));
        assert_eq!(normalize_path(Vec::<String>::new()), PathBuf::from("."));
    }

    #[test]
    fn test_parent_components() {
        assert_eq!(normalize_path("a/b/../c"), Path::new("a").join("c"));
        assert_eq!(normalize_path("../a"), Path::new("..").join("a"));
        assert_eq!(normalize_path("/../a"), Path::new("/a"));
    }

    #[test]
    fn test_sanitize_dir_encodes_components() {
        let dir = sanitize_dir(["retrieve", "cred/bu", "name:*"]);
        assert_eq!(
            dir,
            Path::new("retrieve").join("cred").join("bu").join("name%3A_STAR_")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_sanitize_dir_keeps_root() {
        assert_eq!(sanitize_dir("/tmp/a b"), PathBuf::from("/tmp/a b"));
    }
}
