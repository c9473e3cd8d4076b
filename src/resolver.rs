use std::path::{Path, PathBuf};

use crate::anchors;
use crate::config::RunConfiguration;
use crate::error::Error;
use crate::types::{Failure, LinkRecord, Verdict};

/// Resolve one local link written in `source_file`.
///
/// The page part of the target is looked up relative to the source file's
/// canonical directory, after the dropped extension (if any) is appended.
/// Targets with a path separator are refused unless relative links are enabled.
/// A non-empty anchor must match a heading slug in the target file.
/// Broken links come back as `Verdict::Broken`, never as `Err`.
///
/// # Errors
///
/// Returns `Error::Read` if the source file cannot be canonicalized or the
/// anchor target cannot be read, and the parse errors of the anchor lookup.
pub fn resolve(link: &LinkRecord, source_file: &Path, config: &RunConfiguration) -> Result<Verdict, Error> {
    let (page, anchor) = split_target(&link.target, source_file, config.dropped_extension());
    let page = match config.dropped_extension() {
        Some(ext) => format!("{page}.{ext}"),
        None => page,
    };

    if !config.relative_links() && page.chars().any(std::path::is_separator) {
        return Ok(Verdict::Broken(Failure::RelativePathDisallowed { page }));
    }

    // Joined as a plain concatenation: a leading `/` stays under the source directory.
    let candidate = canonical_source_dir(source_file)?.join(page.trim_start_matches(std::path::is_separator));
    if !candidate.is_file() {
        return Ok(Verdict::Broken(Failure::TargetNotFound { candidate, page }));
    }

    let Some(anchor) = anchor.filter(|a| return !a.is_empty()) else {
        return Ok(Verdict::Valid);
    };
    if anchors::has_anchor(&candidate, anchor)? {
        return Ok(Verdict::Valid);
    }
    return Ok(Verdict::Broken(Failure::AnchorNotFound {
        anchor: anchor.to_string(),
        page,
    }));
}

/// Directory of the source file with symlinks resolved.
///
/// # Errors
///
/// Returns `Error::Read` if the source file cannot be canonicalized.
fn canonical_source_dir(source_file: &Path) -> Result<PathBuf, Error> {
    let canonical = std::fs::canonicalize(source_file).map_err(|source| {
        return Error::Read {
            path: source_file.to_path_buf(),
            source,
        };
    })?;
    return match canonical.parent() {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(canonical),
    };
}

/// Page part an anchor-only link refers to: the source document itself,
/// named so that appending the dropped extension gives its file name back.
fn own_page_name(source_file: &Path, dropped_extension: Option<&str>) -> String {
    let name = source_file
        .file_name()
        .map(|n| return n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(ext) = dropped_extension else {
        return name;
    };
    if let Some(stem) = name.strip_suffix(format!(".{ext}").as_str()) {
        return stem.to_string();
    }
    return name;
}

/// Split a raw target into its page part and optional anchor at the first `#`.
fn split_target<'t>(target: &'t str, source_file: &Path, dropped_extension: Option<&str>) -> (String, Option<&'t str>) {
    if let Some(anchor) = target.strip_prefix('#') {
        return (own_page_name(source_file, dropped_extension), Some(anchor));
    }
    return match target.split_once('#') {
        Some((page, anchor)) => (page.to_string(), Some(anchor)),
        None => (target.to_string(), None),
    };
}
