//! File watcher: runs `check` on startup, then re-runs on changes under the base path.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};

use crate::commands::{self, CheckOptions};
use crate::config::RunConfiguration;
use crate::diagnostics;
use crate::error;

/// Debounce delay between filesystem events and re-check.
const DEBOUNCE_MS: u64 = 100;

/// Directories to watch and whether to watch them recursively.
/// The base path covers link targets anywhere in the repository; inputs
/// outside it are watched on their own.
fn collect_watch_dirs(inputs: &[PathBuf], base_path: &Path) -> BTreeMap<PathBuf, RecursiveMode> {
    let mut dirs = BTreeMap::new();
    dirs.insert(base_path.to_path_buf(), RecursiveMode::Recursive);

    for input in inputs {
        let absolute = std::fs::canonicalize(input).unwrap_or_else(|_err| return input.clone());
        if absolute.starts_with(base_path) {
            continue;
        }
        if absolute.is_dir() {
            dirs.insert(absolute, RecursiveMode::Recursive);
        } else if let Some(parent) = absolute.parent() {
            dirs.entry(parent.to_path_buf()).or_insert(RecursiveMode::NonRecursive);
        }
    }
    return dirs;
}

/// Create a filesystem watcher that sends events on the given channel.
/// Events that only touch `.git` internals are dropped.
///
/// # Errors
///
/// Returns `Error::WatchFailed` if the watcher cannot be created.
fn create_watcher(
    tx: crossbeam_channel::Sender<()>,
) -> Result<notify::RecommendedWatcher, error::Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_)
                    | notify::EventKind::Modify(_)
                    | notify::EventKind::Remove(_)
            )
            && event.paths.iter().any(|p| return !is_git_internal(p))
        {
            // The receiver is only dropped once the watch loop has ended.
            if tx.send(()).is_err() {
                tracing::debug!("watch loop stopped, change event dropped");
            }
        }
    })
    .map_err(|e| {
        return error::Error::WatchFailed {
            reason: format!("watcher setup failed: {e}"),
        };
    });
}

/// Whether a path lies inside a `.git` directory.
fn is_git_internal(path: &Path) -> bool {
    return path
        .components()
        .any(|c| return matches!(c, Component::Normal(name) if name == ".git"));
}

/// Entry point for watch mode.
///
/// Runs an initial check, then watches the base path and the inputs and
/// re-checks on changes. Returns the exit status of the last check.
///
/// # Errors
///
/// Returns `Error::WatchFailed` if the watcher cannot be set up.
pub fn run(options: &CheckOptions, config: &RunConfiguration) -> Result<ExitCode, error::Error> {
    eprintln!("watch: initial check");
    let mut last_code = run_check(options, config);

    let watch_dirs = collect_watch_dirs(&options.files, config.base_path());

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;

    for (dir, mode) in &watch_dirs {
        if !dir.exists() {
            continue;
        }
        if let Err(e) = watcher.watch(dir, *mode) {
            tracing::warn!("cannot watch {}: {e}", dir.display());
        }
    }

    let dir_count = watch_dirs.len();
    eprintln!("watch: monitoring {dir_count} directories, press Ctrl+C to stop");

    while rx.recv().is_ok() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while rx.recv_timeout(debounce).is_ok() {}
        eprintln!("watch: change detected, re-checking...");
        last_code = run_check(options, config);
    }

    return Ok(last_code);
}

/// Run check once and print any fatal error. Returns the exit code from check.
fn run_check(options: &CheckOptions, config: &RunConfiguration) -> ExitCode {
    return match commands::check(options, config) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(2)
        },
    };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;

    #[test]
    fn git_internals_are_ignored() {
        assert!(is_git_internal(Path::new("/repo/.git/index.lock")));
        assert!(!is_git_internal(Path::new("/repo/docs/.github.md")));
        assert!(!is_git_internal(Path::new("/repo/docs/guide.md")));
    }

    #[test]
    fn fatal_check_errors_exit_with_two() {
        let dir = tempfile::tempdir().unwrap();
        let options = CheckOptions {
            files: vec![dir.path().join("absent.md")],
            format: crate::diagnostics::Format::Text,
            jobs: std::num::NonZeroUsize::MIN,
        };
        let config = RunConfiguration::new(dir.path().to_path_buf(), None, false);
        assert_eq!(run_check(&options, &config), ExitCode::from(2));
    }

    #[test]
    fn clean_check_exits_with_zero() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("README.md");
        std::fs::write(&doc, "# Readme\n\n[top](#readme)\n").unwrap();
        let options = CheckOptions {
            files: vec![doc],
            format: crate::diagnostics::Format::Text,
            jobs: std::num::NonZeroUsize::MIN,
        };
        let config = RunConfiguration::new(dir.path().to_path_buf(), None, false);
        assert_eq!(run_check(&options, &config), ExitCode::SUCCESS);
    }

    #[test]
    fn inputs_under_base_path_share_its_watch() {
        let base = tempfile::tempdir().unwrap();
        let base_path = std::fs::canonicalize(base.path()).unwrap();
        let doc = base_path.join("README.md");
        std::fs::write(&doc, "").unwrap();

        let outside = tempfile::tempdir().unwrap();
        let outside_doc = std::fs::canonicalize(outside.path()).unwrap().join("notes.md");
        std::fs::write(&outside_doc, "").unwrap();

        let dirs = collect_watch_dirs(&[doc, outside_doc.clone()], &base_path);
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs.get(&base_path), Some(&RecursiveMode::Recursive));
        let parent = outside_doc.parent().unwrap().to_path_buf();
        assert_eq!(dirs.get(&parent), Some(&RecursiveMode::NonRecursive));
    }
}
