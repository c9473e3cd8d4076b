use std::io::{self, IsTerminal as _, Write};
use std::path::Path;

use crate::error::Error;
use crate::types::ValidationError;

/// Bold escape for markdown headings on a terminal.
const BOLD: &str = "\x1b[1m";
/// Reset escape.
const RESET: &str = "\x1b[0m";

/// How each broken link is written out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// One JSON object per line.
    Json,
    /// `{file}{position} ('{target}') {description}`.
    #[default]
    Text,
}

/// Shape of a broken link in `--format json` output.
#[derive(serde::Serialize)]
struct JsonDiagnostic<'a> {
    /// Human-readable failure description.
    description: String,
    /// Markdown file containing the link.
    file: String,
    /// `@line:col-line:col` span of the link.
    position: String,
    /// Raw link target.
    target: &'a str,
}

/// Collects broken links for one run: writes each as a line and remembers
/// whether any were seen. The flag is only ever set, never cleared.
pub struct Reporter<W> {
    /// Whether at least one broken link has been reported.
    error_found: bool,
    /// Output line format.
    format: Format,
    /// Destination for diagnostic lines.
    out: W,
}

impl<W: Write> Reporter<W> {
    /// Whether any broken link was reported during this run.
    pub const fn any_error_found(&self) -> bool {
        return self.error_found;
    }

    /// Reporter writing to `out` in the given format.
    pub const fn new(out: W, format: Format) -> Self {
        return Self {
            error_found: false,
            format,
            out,
        };
    }

    /// Write one broken link and mark the run as failed.
    ///
    /// # Errors
    ///
    /// Returns the writer's I/O error. The run is marked failed regardless.
    pub fn report(&mut self, error: &ValidationError) -> io::Result<()> {
        self.error_found = true;
        let mut line = match self.format {
            Format::Json => render_json(error)?,
            Format::Text => render_line(error),
        };
        // One write per line keeps lines whole on a shared stderr.
        line.push('\n');
        return self.out.write_all(line.as_bytes());
    }
}

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    let bold = io::stderr().is_terminal();
    for line in md.lines() {
        if bold && line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render a fatal error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// something to do about it, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::BasePathInvalid { path } => render_base_path_invalid(path),
        Error::GrammarUnavailable { reason } => render_grammar_unavailable(reason),
        Error::NoInputFiles => render_no_input_files(),
        Error::TomlDe(err) => render_invalid_config(err),
        _ => render_generic(e),
    };
}

/// One broken link as `{file}{position} ('{target}') {description}`.
pub fn render_line(error: &ValidationError) -> String {
    return format!(
        "{}{} ('{}') {}",
        error.source.display(),
        error.position,
        error.target,
        error.failure
    );
}

/// Markdown block for an unusable `--base-path`.
fn render_base_path_invalid(path: &Path) -> String {
    return format!("\
# Error: Invalid Base Path

`{}` is not an existing directory.

## Fix

Pass a directory to `--base-path`, or run inside a git repository.
", path.display());
}

/// Fallback markdown block for variants without specific guidance.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::MalformedDocument { file, reason } => format!("\
# Error: Malformed Document

`{}` could not be read back from its syntax tree: {reason}
", file.display()),

        Error::ParseFailed { file, reason } => format!("\
# Error: Parse Failed

Could not parse `{}`: {reason}
", file.display()),

        Error::Read { path, source } => format!("\
# Error: Cannot Read File

`{}`: {source}
", path.display()),

        Error::WatchFailed { reason } => format!("\
# Error: Watch Failed

{reason}
"),

        Error::Io(err) => format!("\
# Error: I/O

{err}
"),
        // Already handled in render_error, but need exhaustive match.
        _ => format!("\
# Error

{e}
"),
    };
}

/// Markdown block for a grammar that does not load.
fn render_grammar_unavailable(reason: &str) -> String {
    return format!("\
# Error: Markdown Grammar Unavailable

{reason}

## Fix

The bundled tree-sitter-md grammar does not match the tree-sitter runtime.
Rebuild doclinks with matching crate versions.
");
}

/// Markdown block for a malformed `.doclinks.toml`.
fn render_invalid_config(err: &toml::de::Error) -> String {
    return format!("\
# Error: Invalid `.doclinks.toml`

{err}

## Fix

Supported keys are `dropped_extension`, `relative_links`, `include` and `exclude`.
");
}

/// JSON object for one broken link.
///
/// # Errors
///
/// Returns an I/O error wrapping the serializer failure.
fn render_json(error: &ValidationError) -> io::Result<String> {
    let diagnostic = JsonDiagnostic {
        description: error.failure.to_string(),
        file: error.source.display().to_string(),
        position: error.position.to_string(),
        target: &error.target,
    };
    return serde_json::to_string(&diagnostic).map_err(io::Error::other);
}

/// Markdown block for a run with nothing to check.
fn render_no_input_files() -> String {
    return "\
# Error: No Input Files

Nothing to check.

## Fix

Pass one or more markdown files or directories:

    doclinks README.md docs/
"
    .to_string();
}
