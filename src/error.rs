/// Crate-level fatal error types for doclinks.
use std::path::PathBuf;

/// Conditions that abort the whole run with exit status 2.
/// Broken links are never represented here; they are `Verdict::Broken` values.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `--base-path` does not name an existing directory.
    #[error("base path is not a directory: {}", path.display())]
    BasePathInvalid {
        /// Path given on the command line.
        path: PathBuf,
    },

    /// A tree-sitter grammar could not be loaded into the parser.
    #[error("markdown grammar unavailable: {reason}")]
    GrammarUnavailable {
        /// Description from tree-sitter.
        reason: String,
    },

    /// Underlying I/O error not tied to a specific input file.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// The syntax tree for a document does not line up with its source text.
    #[error("malformed document structure: {}: {reason}", file.display())]
    MalformedDocument {
        /// Document whose tree could not be read back.
        file: PathBuf,
        /// What was inconsistent.
        reason: String,
    },

    /// No files were given on the command line.
    #[error("no input files given")]
    NoInputFiles,

    /// Tree-sitter failed to parse a document.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// File that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// An input or target file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// The wrapped I/O error.
        source: std::io::Error,
    },

    /// TOML deserialization of `.doclinks.toml` failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// The filesystem watcher could not be set up.
    #[error("watch failed: {reason}")]
    WatchFailed {
        /// Description from the watcher backend.
        reason: String,
    },
}
