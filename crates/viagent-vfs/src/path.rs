use crate::{VfsError, VfsResult};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Reason a relative path was rejected by [`validate_path`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathViolation {
    /// The path is empty.
    #[error("path is empty")]
    Empty,
    /// The path is rooted (leading separator or drive prefix).
    #[error("absolute paths are not allowed")]
    Absolute,
    /// Two separators in a row or a trailing separator.
    #[error("path contains an empty segment")]
    EmptySegment,
    /// A `.` or `..` segment.
    #[error("path contains a relative segment '{0}'")]
    DotSegment(String),
    /// NUL or another control character.
    #[error("path contains control characters")]
    ControlCharacter,
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn has_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

fn is_absolute(path: &str) -> bool {
    path.starts_with(is_separator) || has_drive_prefix(path)
}

/// Validates a project-relative path before it reaches any filesystem call.
///
/// Fails closed: anything that is not a plain sequence of named segments is
/// rejected.
///
/// # Errors
///
/// Returns the first [`PathViolation`] found.
pub fn validate_path(path: &str) -> Result<(), PathViolation> {
    if path.is_empty() {
        return Err(PathViolation::Empty);
    }
    if path.chars().any(char::is_control) {
        return Err(PathViolation::ControlCharacter);
    }
    if is_absolute(path) {
        return Err(PathViolation::Absolute);
    }
    for segment in path.split(is_separator) {
        match segment {
            "" => return Err(PathViolation::EmptySegment),
            "." | ".." => return Err(PathViolation::DotSegment(segment.to_owned())),
            _ => {},
        }
    }
    Ok(())
}

/// Returns true if resolving `path` segment by segment would climb above the
/// root at any point, or if the path is absolute.
#[must_use]
pub fn is_traversal_attempt(path: &str) -> bool {
    if is_absolute(path) {
        return true;
    }
    let mut depth: usize = 0;
    for segment in path.split(is_separator) {
        match segment {
            "" | "." => {},
            ".." => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return true,
            },
            _ => depth = depth.saturating_add(1),
        }
    }
    false
}

/// Canonical `/`-separated form of a relative path.
///
/// Backslashes become `/`, duplicate separators collapse, `.` segments and
/// trailing separators are dropped. The root is the empty string.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.split(is_separator)
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a child name onto a relative parent, where `""` is the root.
#[must_use]
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}/{name}")
    }
}

/// Parent of a normalized relative path (`""` for top-level entries).
#[must_use]
pub fn parent_path(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// Last segment of a normalized relative path.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Lexically resolves a relative path against a secure base root.
/// Returns an error if the relative path attempts to traverse `..` above the base.
/// Does NOT touch the filesystem.
///
/// # Errors
///
/// Returns `VfsError::SandboxViolation` if the `request_path` attempts to traverse outside
/// the `base_root` using `..` or if it is an absolute path.
pub fn resolve_path(base_root: &Path, request_path: &str) -> VfsResult<PathBuf> {
    let req = Path::new(request_path);

    if req.is_absolute() || is_absolute(request_path) {
        return Err(VfsError::SandboxViolation(
            "Absolute paths are not allowed in the container".into(),
        ));
    }

    let mut resolved = base_root.to_path_buf();

    for component in req.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(VfsError::SandboxViolation(
                    "Prefix or root components are not allowed".into(),
                ));
            },
            Component::CurDir => {},
            Component::ParentDir => {
                if resolved == base_root {
                    return Err(VfsError::SandboxViolation(
                        "Attempted to traverse above container root".into(),
                    ));
                }
                resolved.pop();
            },
            Component::Normal(p) => {
                resolved.push(p);
            },
        }
    }

    Ok(resolved)
}
