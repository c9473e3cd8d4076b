//! The `check` run: every document through extract, classify, resolve, report.

use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;

use crate::classify;
use crate::config::RunConfiguration;
use crate::diagnostics::{Format, Reporter};
use crate::error;
use crate::grammar::{self, ParsedDocument};
use crate::resolver;
use crate::scanner;
use crate::types::{ValidationError, Verdict};

/// What one document contributed: its broken links, or a fatal error.
type DocumentResult = Result<Vec<ValidationError>, error::Error>;

/// Overall result of a run that did not hit a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one broken link was reported.
    Broken,
    /// Every local link resolved.
    Clean,
}

impl Outcome {
    /// Process exit status: 0 when clean, 1 when links are broken.
    pub fn exit_code(self) -> ExitCode {
        return match self {
            Self::Broken => ExitCode::from(1),
            Self::Clean => ExitCode::SUCCESS,
        };
    }
}

/// What to check and how to report it.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Files and directories named on the command line.
    pub files: Vec<PathBuf>,
    /// Diagnostic line format.
    pub format: Format,
    /// Number of documents checked at once.
    pub jobs: NonZeroUsize,
}

/// Check every input document and report broken links on stderr.
///
/// # Errors
///
/// Returns `Error::NoInputFiles` when nothing was named, and any fatal
/// error from reading, parsing, or resolving a document.
pub fn check(options: &CheckOptions, config: &RunConfiguration) -> Result<Outcome, error::Error> {
    if options.files.is_empty() {
        return Err(error::Error::NoInputFiles);
    }
    grammar::ensure_grammars()?;

    let files = scanner::collect_markdown_files(&options.files, config);
    tracing::debug!("checking {} documents", files.len());

    let mut reporter = Reporter::new(std::io::stderr(), options.format);
    check_files(&files, config, options.jobs, &mut reporter)?;

    if reporter.any_error_found() {
        return Ok(Outcome::Broken);
    }
    return Ok(Outcome::Clean);
}

/// Validate every local link in one document.
/// A document with no links at all is skipped without error.
///
/// # Errors
///
/// Returns fatal errors from reading or parsing the document or an anchor
/// target, and `Error::MalformedDocument` for unreadable link nodes.
pub fn check_document(path: &Path, config: &RunConfiguration) -> DocumentResult {
    let document = ParsedDocument::read(path)?;
    let links = scanner::extract_links(&document)?;
    if links.is_empty() {
        tracing::debug!("no links in {}", path.display());
        return Ok(Vec::new());
    }

    let mut broken = Vec::new();
    for link in classify::retain_local(links) {
        if let Verdict::Broken(failure) = resolver::resolve(&link, path, config)? {
            broken.push(ValidationError {
                failure,
                position: link.position,
                source: path.to_path_buf(),
                target: link.target,
            });
        }
    }
    tracing::debug!("{}: {} broken links", path.display(), broken.len());
    return Ok(broken);
}

/// Check documents one after another or across a worker pool.
///
/// # Errors
///
/// Returns the first fatal error, or an I/O error writing diagnostics.
pub fn check_files<W: Write>(
    files: &[PathBuf],
    config: &RunConfiguration,
    jobs: NonZeroUsize,
    reporter: &mut Reporter<W>,
) -> Result<(), error::Error> {
    let workers = jobs.get().min(files.len());
    if workers <= 1 {
        for file in files {
            for broken in check_document(file, config)? {
                reporter.report(&broken)?;
            }
        }
        return Ok(());
    }

    tracing::debug!("checking with {workers} workers");
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<&Path>();
    for file in files {
        // `job_rx` is alive until the scope below, so the queue cannot be disconnected.
        if job_tx.send(file.as_path()).is_err() {
            break;
        }
    }
    drop(job_tx);

    let (result_tx, result_rx) = crossbeam_channel::unbounded::<DocumentResult>();
    let abort = AtomicBool::new(false);

    return std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let abort = &abort;
            scope.spawn(move || {
                for file in job_rx.iter() {
                    if abort.load(Ordering::Relaxed) {
                        break;
                    }
                    if result_tx.send(check_document(file, config)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let collected = collect_results(&result_rx, reporter);
        if collected.is_err() {
            abort.store(true, Ordering::Relaxed);
        }
        return collected;
    });
}

/// Single writer for the worker pool: report each document's broken links
/// as a block, stop at the first fatal error.
///
/// # Errors
///
/// Returns the first fatal error received, or an I/O error writing diagnostics.
fn collect_results<W: Write>(results: &Receiver<DocumentResult>, reporter: &mut Reporter<W>) -> Result<(), error::Error> {
    for result in results.iter() {
        for broken in result? {
            reporter.report(&broken)?;
        }
    }
    return Ok(());
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::indexing_slicing, reason = "test code")]
mod tests {
    use super::*;
    use crate::types::Failure;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        return path;
    }

    fn config() -> RunConfiguration {
        return RunConfiguration::new(PathBuf::from("."), None, false);
    }

    #[test]
    fn broken_links_are_collected_in_document_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ok.md", "# Top\n");
        let page = write(
            dir.path(),
            "page.md",
            "[good](ok.md#top)\n[gone](gone.md)\n[web](https://domain.tld/x)\n[nested](a/b.md)\n",
        );

        let broken = check_document(&page, &config()).unwrap();
        let targets: Vec<&str> = broken.iter().map(|b| b.target.as_str()).collect();
        assert_eq!(targets, ["gone.md", "a/b.md"]);
        assert_eq!(broken[0].position.start_line, 2);
        assert!(matches!(broken[0].failure, Failure::TargetNotFound { .. }));
        assert!(matches!(broken[1].failure, Failure::RelativePathDisallowed { .. }));
    }

    #[test]
    fn documents_without_links_pass() {
        let dir = tempfile::tempdir().unwrap();
        let page = write(dir.path(), "plain.md", "# Nothing\n\nNo links here.\n");
        assert!(check_document(&page, &config()).unwrap().is_empty());
    }

    #[test]
    fn missing_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_document(&dir.path().join("absent.md"), &config());
        assert!(matches!(result, Err(error::Error::Read { .. })));
    }

    #[test]
    fn worker_pool_reports_every_document() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..6)
            .map(|i| write(dir.path(), &format!("doc{i}.md"), &format!("[x](missing{i}.md)\n")))
            .collect();

        let mut buffer = Vec::new();
        let mut reporter = Reporter::new(&mut buffer, Format::Text);
        let jobs = NonZeroUsize::new(3).unwrap();
        check_files(&files, &config(), jobs, &mut reporter).unwrap();
        assert!(reporter.any_error_found());

        let out = String::from_utf8(buffer).unwrap();
        assert_eq!(out.lines().count(), 6);
        for i in 0..6 {
            assert!(out.contains(&format!("('missing{i}.md')")), "missing line {i} in:\n{out}");
        }
    }

    #[test]
    fn worker_pool_stops_on_fatal_error() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "good.md", "no links\n");
        let files = vec![good.clone(), dir.path().join("absent.md"), good];

        let mut buffer = Vec::new();
        let mut reporter = Reporter::new(&mut buffer, Format::Text);
        let jobs = NonZeroUsize::new(2).unwrap();
        let result = check_files(&files, &config(), jobs, &mut reporter);
        assert!(matches!(result, Err(error::Error::Read { .. })));
    }

    #[test]
    fn no_inputs_is_fatal() {
        let options = CheckOptions {
            files: Vec::new(),
            format: Format::Text,
            jobs: NonZeroUsize::MIN,
        };
        assert!(matches!(check(&options, &config()), Err(error::Error::NoInputFiles)));
    }

    #[test]
    fn outcome_maps_to_exit_status() {
        assert_eq!(Outcome::Clean.exit_code(), ExitCode::SUCCESS);
        assert_eq!(Outcome::Broken.exit_code(), ExitCode::from(1));
    }
}
