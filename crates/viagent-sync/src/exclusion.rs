//! Exclusion patterns: defaults, matching, merging, validation.
//!
//! Patterns are glob-lite. A pattern without `*` names a path, a segment, or
//! (when it contains `/`) a directory prefix. A pattern with `*` is a glob in
//! which `*` stays within one segment and a `**` segment spans any depth; it
//! is tested against every segment and against the whole path. All matching
//! is case-insensitive.

use std::collections::HashSet;

use globset::{GlobBuilder, GlobMatcher};
use tracing::warn;
use viagent_vfs::normalize_path;

use crate::error::{SyncError, SyncOutcome};

/// Patterns excluded from every sync.
pub const DEFAULT_EXCLUSION_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    ".DS_Store",
    "Thumbs.db",
    "dist",
    "build",
    ".next",
    ".nuxt",
    ".cache",
    "coverage",
    ".turbo",
    ".vercel",
    "__pycache__",
    "*.log",
];

/// [`DEFAULT_EXCLUSION_PATTERNS`] plus editor swap files, IDE folders and
/// local env files.
pub const EXTENDED_DEFAULT_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    ".DS_Store",
    "Thumbs.db",
    "dist",
    "build",
    ".next",
    ".nuxt",
    ".cache",
    "coverage",
    ".turbo",
    ".vercel",
    "__pycache__",
    "*.log",
    "*.swp",
    "*.swo",
    "*~",
    ".env.local",
    ".env.*.local",
    ".idea",
    ".vscode",
];

/// Longest accepted pattern, in characters.
pub const MAX_PATTERN_LENGTH: usize = 256;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?'];

#[derive(Debug, Clone)]
enum CompiledPattern {
    /// Lowercased literal; `nested` when it contains `/`.
    Literal { text: String, nested: bool },
    Glob(GlobMatcher),
}

/// A pre-compiled, immutable set of exclusion patterns.
///
/// Built once per walk so later pattern changes never affect a walk in
/// progress.
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    compiled: Vec<CompiledPattern>,
}

impl ExclusionMatcher {
    /// Compile `patterns`. Blank patterns are ignored; globs that fail to
    /// compile are logged and skipped.
    #[must_use]
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let compiled = patterns
            .iter()
            .filter_map(|pattern| compile(pattern.as_ref()))
            .collect();
        Self { compiled }
    }

    /// True if no pattern is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Number of active patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Whether `path` (relative, `/`-separated) is excluded.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.compiled.is_empty() {
            return false;
        }
        let path = normalize_path(path).to_lowercase();
        if path.is_empty() {
            return false;
        }

        self.compiled.iter().any(|pattern| match pattern {
            CompiledPattern::Literal { text, nested } => {
                path == *text
                    || path.split('/').any(|segment| segment == text)
                    || (*nested
                        && path
                            .strip_prefix(text.as_str())
                            .is_some_and(|rest| rest.starts_with('/')))
            },
            CompiledPattern::Glob(matcher) => {
                matcher.is_match(&path) || path.split('/').any(|segment| matcher.is_match(segment))
            },
        })
    }
}

fn compile(pattern: &str) -> Option<CompiledPattern> {
    let normalized = normalize_path(pattern.trim()).to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if !normalized.contains('*') {
        return Some(CompiledPattern::Literal {
            nested: normalized.contains('/'),
            text: normalized,
        });
    }

    // Only `*` is special; everything else matches literally.
    let escaped = normalized
        .split('*')
        .map(globset::escape)
        .collect::<Vec<_>>()
        .join("*");

    match GlobBuilder::new(&escaped)
        .literal_separator(true)
        .case_insensitive(true)
        .build()
    {
        Ok(glob) => Some(CompiledPattern::Glob(glob.compile_matcher())),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Failed to compile exclusion pattern");
            None
        },
    }
}

/// Whether `path` matches any of `patterns`. An empty list excludes nothing.
///
/// Compiles the patterns on every call; use [`ExclusionMatcher`] when
/// testing many paths.
#[must_use]
pub fn is_path_excluded<S: AsRef<str>>(path: &str, patterns: &[S]) -> bool {
    ExclusionMatcher::new(patterns).is_excluded(path)
}

/// Defaults (or extended defaults) followed by the custom patterns not
/// already present. Entries are trimmed, blanks dropped, and duplicates
/// removed case-insensitively, keeping the first occurrence.
#[must_use]
pub fn merge_exclusion_patterns<S: AsRef<str>>(custom: &[S], include_extended: bool) -> Vec<String> {
    let base = if include_extended {
        EXTENDED_DEFAULT_PATTERNS
    } else {
        DEFAULT_EXCLUSION_PATTERNS
    };

    let mut seen = HashSet::new();
    base.iter()
        .copied()
        .chain(custom.iter().map(AsRef::as_ref))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(p.to_lowercase()))
        .map(str::to_owned)
        .collect()
}

/// Outcome of [`validate_exclusion_pattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternValidation {
    /// Whether the pattern is acceptable.
    pub is_valid: bool,
    /// Why it is not, when invalid.
    pub reason: Option<String>,
}

impl PatternValidation {
    fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Check a user-supplied pattern.
#[must_use]
pub fn validate_exclusion_pattern(pattern: &str) -> PatternValidation {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return PatternValidation::invalid("Pattern cannot be empty");
    }
    if trimmed.chars().count() > MAX_PATTERN_LENGTH {
        return PatternValidation::invalid(format!(
            "Pattern is too long (max {MAX_PATTERN_LENGTH} characters)"
        ));
    }
    if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return PatternValidation::invalid(format!("Pattern contains invalid character '{c}'"));
    }
    if trimmed.chars().any(char::is_control) {
        return PatternValidation::invalid("Pattern contains control characters");
    }
    PatternValidation::valid()
}

/// Validate every pattern, failing on the first invalid one.
///
/// # Errors
///
/// Returns [`SyncError::InvalidPattern`] naming the offending pattern.
pub fn validate_patterns<S: AsRef<str>>(patterns: &[S]) -> SyncOutcome<()> {
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let validation = validate_exclusion_pattern(pattern);
        if !validation.is_valid {
            return Err(SyncError::InvalidPattern {
                pattern: pattern.to_owned(),
                reason: validation.reason.unwrap_or_default(),
            });
        }
    }
    Ok(())
}

/// Split free-form input on commas and newlines, trimming and dropping
/// blank entries.
#[must_use]
pub fn parse_pattern_input(text: &str) -> Vec<String> {
    text.split([',', '\n'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

/// One pattern per line.
#[must_use]
pub fn format_patterns_for_display<S: AsRef<str>>(patterns: &[S]) -> String {
    patterns
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n")
}
