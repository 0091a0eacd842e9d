use std::path::{Component, Path};

/// Extension stripped from ids and implied again on lookup.
pub const CANONICAL_EXTENSION: &str = "mp4";

/// Characters allowed in an id path segment besides ASCII alphanumerics.
/// This is the RFC 3986 `pchar` set minus percent-encoding.
const SEGMENT_PUNCTUATION: &str = "-._~!$&'()*+,;=:@";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("relative path is empty")]
    Empty,
    #[error("path component {0:?} is not valid UTF-8")]
    NotUtf8(String),
    #[error("path component {0:?} is not safe in a URL path segment")]
    Unsafe(String),
    #[error("prefix {0:?} is not a valid id prefix")]
    BadPrefix(String),
}

/// True when `segment` can appear verbatim in a URL path segment.
pub fn is_url_safe(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || SEGMENT_PUNCTUATION.contains(c))
}

/// Prefixes are zero or more URL-safe segments joined by `/`, without a
/// leading or trailing slash. The empty prefix is allowed.
pub fn validate_prefix(prefix: &str) -> Result<(), IdError> {
    if prefix.is_empty() {
        return Ok(());
    }
    if prefix.split('/').all(is_url_safe) {
        Ok(())
    } else {
        Err(IdError::BadPrefix(prefix.to_string()))
    }
}

/// True when ids under `a` and ids under `b` could collide: either prefix
/// is empty, or one is a whole-segment prefix of the other.
pub fn prefixes_overlap(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() || a == b {
        return true;
    }
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.starts_with('/'))
    };
    nested(a, b) || nested(b, a)
}

/// Stable id for the file at `relative` under a root registered with `prefix`.
///
/// Components are joined with `/` regardless of platform and a trailing
/// `.mp4` is dropped (case-insensitively). Other extensions are kept so
/// `intro.mp4` and `intro.webm` never collide.
pub fn id_for(prefix: &str, relative: &Path) -> Result<String, IdError> {
    validate_prefix(prefix)?;
    let joined = join_segments(relative)?;
    let stem = strip_canonical_extension(&joined);
    if prefix.is_empty() {
        Ok(stem.to_string())
    } else {
        Ok(format!("{prefix}/{stem}"))
    }
}

/// The id a file had before its root was given a prefix.
pub fn legacy_id(relative: &Path) -> Result<String, IdError> {
    id_for("", relative)
}

/// Normalise an id taken from a request path: the canonical extension is
/// implied, so `clips/a.mp4` and `clips/a` name the same video.
pub fn normalize_id(raw: &str) -> &str {
    strip_canonical_extension(raw.trim_matches('/'))
}

fn join_segments(relative: &Path) -> Result<String, IdError> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(os) => {
                let segment = os
                    .to_str()
                    .ok_or_else(|| IdError::NotUtf8(os.to_string_lossy().into_owned()))?;
                if !is_url_safe(segment) {
                    return Err(IdError::Unsafe(segment.to_string()));
                }
                segments.push(segment);
            }
            other => {
                let shown = other.as_os_str().to_string_lossy().into_owned();
                return Err(IdError::Unsafe(shown));
            }
        }
    }
    if segments.is_empty() {
        return Err(IdError::Empty);
    }
    Ok(segments.join("/"))
}

fn strip_canonical_extension(s: &str) -> &str {
    let suffix_len = CANONICAL_EXTENSION.len() + 1;
    if s.len() > suffix_len && s.is_char_boundary(s.len() - suffix_len) {
        let (head, tail) = s.split_at(s.len() - suffix_len);
        if tail.starts_with('.')
            && tail[1..].eq_ignore_ascii_case(CANONICAL_EXTENSION)
            && !head.ends_with('/')
        {
            return head;
        }
    }
    s
}
