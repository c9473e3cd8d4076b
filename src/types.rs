/// Core domain types for doclinks: links, spans, and validation failures.
use std::fmt;
use std::path::PathBuf;

/// Why a single local link failed to resolve. `Display` is the
/// human-readable description printed after the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The target file exists but has no heading with this slug.
    AnchorNotFound {
        /// Anchor text exactly as written after `#`.
        anchor: String,
        /// Page part of the target after extension handling.
        page: String,
    },
    /// The page part contains a path separator but relative links are disabled.
    RelativePathDisallowed {
        /// Page part of the target after extension handling.
        page: String,
    },
    /// No regular file exists at the resolved location.
    TargetNotFound {
        /// Absolute path that was looked up.
        candidate: PathBuf,
        /// Page part of the target after extension handling.
        page: String,
    },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            Self::AnchorNotFound { anchor, page } => {
                write!(f, "anchor '#{anchor}' not found in target file '{page}'")
            },
            Self::RelativePathDisallowed { page } => {
                write!(f, "relative path '{page}' used without --relative-links")
            },
            Self::TargetNotFound { candidate, page } => write!(
                f,
                "target file '{page}' not found (looked for {})",
                candidate.display()
            ),
        };
    }
}

/// A link destination paired with where it was written.
/// Targets and positions travel together, so filtering can never split them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    /// Where the link node starts and ends in the source document.
    pub position: SourceSpan,
    /// Destination string as written in the markdown source.
    pub target: String,
}

/// One-based line/column range of a link in its document.
/// Columns count characters; the end column is one past the last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    /// Column one past the final character of the link.
    pub end_column: usize,
    /// Line holding the final character of the link.
    pub end_line: usize,
    /// Column of the first character of the link.
    pub start_column: usize,
    /// Line holding the first character of the link.
    pub start_line: usize,
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(
            f,
            "@{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        );
    }
}

/// A broken local link, ready for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// What went wrong.
    pub failure: Failure,
    /// Location of the link in the source document.
    pub position: SourceSpan,
    /// Markdown file containing the link.
    pub source: PathBuf,
    /// Raw link target.
    pub target: String,
}

/// Outcome of resolving one local link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The link does not resolve.
    Broken(Failure),
    /// The target file exists, and so does the anchor if one was given.
    Valid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_renders_like_sourcepos() {
        let span = SourceSpan {
            end_column: 29,
            end_line: 1,
            start_column: 1,
            start_line: 1,
        };
        assert_eq!(span.to_string(), "@1:1-1:29");
    }

    #[test]
    fn target_not_found_names_page_and_candidate() {
        let failure = Failure::TargetNotFound {
            candidate: PathBuf::from("/docs/missing.md"),
            page: "missing.md".to_string(),
        };
        let text = failure.to_string();
        assert!(text.contains("'missing.md'"), "got: {text}");
        assert!(text.contains("/docs/missing.md"), "got: {text}");
    }
}
