use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::Node;
use walkdir::WalkDir;

use crate::config::RunConfiguration;
use crate::error::Error;
use crate::grammar::ParsedDocument;
use crate::types::LinkRecord;

/// File extensions treated as markdown when walking a directory.
const MARKDOWN_EXTENSIONS: [&str; 2] = ["markdown", "md"];

/// One `[label]: destination "optional title"` line.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static DEFINITION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(
        r#"^ {0,3}\[([^\[\]]+)\]:[ \t]*(<[^<>\n]*>|[^\s<]\S*)(?:[ \t]+(?:"[^"]*"|'[^']*'|\([^()]*\)))?[ \t]*$"#,
    )
    .expect("valid definition pattern");
});

/// Reference definitions of one document.
#[derive(Debug, Default)]
struct ReferenceDefinitions {
    /// Destination per normalized label.
    destinations: HashMap<String, String>,
    /// Byte ranges of definition lines recovered from paragraph text.
    paragraph_lines: Vec<Range<usize>>,
}

impl ReferenceDefinitions {
    /// Whether a byte offset falls on a definition line recovered from a paragraph.
    fn covers(&self, byte: usize) -> bool {
        return self.paragraph_lines.iter().any(|line| return line.contains(&byte));
    }

    /// Destination for a normalized label.
    fn get(&self, label: &str) -> Option<&String> {
        return self.destinations.get(label);
    }

    /// Record a definition. The first definition of a label wins; empty labels define nothing.
    fn insert(&mut self, label: String, destination: String) {
        if label.is_empty() {
            return;
        }
        self.destinations.entry(label).or_insert(destination);
    }
}

/// Expand the command-line inputs into the list of documents to check.
/// Directories are walked recursively for markdown files, in name order,
/// with the config's include/exclude filters applied relative to the directory.
/// Anything else is kept as given and fails later if it cannot be read.
pub fn collect_markdown_files(inputs: &[PathBuf], config: &RunConfiguration) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            walk_markdown_directory(input, config, &mut files);
        } else {
            files.push(input.clone());
        }
    }
    return files;
}

/// Extract every link in document order, resolving reference-style links
/// through the document's own reference definitions.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if a link node's span or destination
/// cannot be read back from the source text.
pub fn extract_links(document: &ParsedDocument) -> Result<Vec<LinkRecord>, Error> {
    let mut definitions = ReferenceDefinitions::default();
    collect_reference_definitions(document, document.root(), &mut definitions)?;

    let mut links = Vec::new();
    for tree in document.inline_trees() {
        collect_links(document, tree.root_node(), &definitions, &mut links)?;
    }
    return Ok(links);
}

/// Recursively collect link nodes below `node`. Link nodes are not descended into.
/// Labels on recovered definition lines are not links.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` for unreadable link nodes.
fn collect_links(
    document: &ParsedDocument,
    node: Node<'_>,
    definitions: &ReferenceDefinitions,
    links: &mut Vec<LinkRecord>,
) -> Result<(), Error> {
    if is_link_node(node.kind()) {
        if definitions.covers(node.start_byte()) {
            return Ok(());
        }
        if let Some(target) = link_destination(document, node, definitions)? {
            let position = document
                .span(node)
                .ok_or_else(|| return malformed(document, node, "link span outside source text"))?;
            links.push(LinkRecord { position, target });
        }
        return Ok(());
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_links(document, child, definitions, links)?;
    }
    return Ok(());
}

/// Gather `[label]: destination` definitions from the block tree. First definition wins.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if a definition cannot be read back.
fn collect_reference_definitions(
    document: &ParsedDocument,
    node: Node<'_>,
    definitions: &mut ReferenceDefinitions,
) -> Result<(), Error> {
    if node.kind() == "link_reference_definition" {
        let Some(label) = child_of_kind(node, "link_label") else {
            return Ok(());
        };
        let label = normalize_label(node_text(document, label)?);
        let destination = match child_of_kind(node, "link_destination") {
            Some(dest) => clean_destination(node_text(document, dest)?),
            None => String::new(),
        };
        definitions.insert(label, destination);
        return Ok(());
    }
    if node.kind() == "paragraph" && !in_list_item(node) {
        return collect_paragraph_definitions(document, node, definitions);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_reference_definitions(document, child, definitions)?;
    }
    return Ok(());
}

/// Recover definitions that the block grammar left as paragraph text.
///
/// tree-sitter-md reads a leading `[x]`, `[X]` or `[ ]` as a task-list marker
/// even outside list items, so `[x]: page.md` parses as a paragraph.
/// Definition lines at the start of the paragraph are read with
/// `DEFINITION_LINE` until the first line that is not one.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if the paragraph cannot be read back.
fn collect_paragraph_definitions(
    document: &ParsedDocument,
    paragraph: Node<'_>,
    definitions: &mut ReferenceDefinitions,
) -> Result<(), Error> {
    let mut offset = paragraph.start_byte();
    for line in node_text(document, paragraph)?.split_inclusive('\n') {
        let Some(captures) = DEFINITION_LINE.captures(line.trim_end_matches(['\n', '\r'])) else {
            break;
        };
        let (Some(label), Some(destination)) = (captures.get(1), captures.get(2)) else {
            break;
        };
        let label = normalize_label(label.as_str());
        if label.is_empty() {
            break;
        }
        let end = offset.saturating_add(line.len());
        definitions.insert(label, clean_destination(destination.as_str()));
        definitions.paragraph_lines.push(offset..end);
        offset = end;
    }
    return Ok(());
}

/// First direct child of `node` with the given kind.
fn child_of_kind<'tree>(node: Node<'tree>, kind: &str) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    return node.children(&mut cursor).find(|child| return child.kind() == kind);
}

/// Strip optional `<...>` wrapping and backslash escapes from a link destination.
fn clean_destination(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('<')
        .and_then(|rest| return rest.strip_suffix('>'))
        .unwrap_or(trimmed);
    return unescape(inner);
}

/// Whether a block node sits inside a list item, where `[x]` is a task marker.
fn in_list_item(node: Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "list_item" {
            return true;
        }
        current = parent.parent();
    }
    return false;
}

/// Whether an inline node kind is a link.
fn is_link_node(kind: &str) -> bool {
    return matches!(
        kind,
        "collapsed_reference_link"
            | "email_autolink"
            | "full_reference_link"
            | "inline_link"
            | "shortcut_link"
            | "uri_autolink"
    );
}

/// The destination a link node points at, or `None` for a reference-style
/// link whose label has no definition (CommonMark renders that as text).
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if the node text cannot be read.
fn link_destination(
    document: &ParsedDocument,
    node: Node<'_>,
    definitions: &ReferenceDefinitions,
) -> Result<Option<String>, Error> {
    let label_node = match node.kind() {
        "inline_link" => {
            return match child_of_kind(node, "link_destination") {
                Some(dest) => Ok(Some(clean_destination(node_text(document, dest)?))),
                None => Ok(Some(String::new())),
            };
        },
        "uri_autolink" => {
            return Ok(Some(strip_angle_brackets(node_text(document, node)?).to_string()));
        },
        "email_autolink" => {
            let address = strip_angle_brackets(node_text(document, node)?);
            return Ok(Some(format!("mailto:{address}")));
        },
        "full_reference_link" => child_of_kind(node, "link_label"),
        _ => child_of_kind(node, "link_text"),
    };

    let Some(label_node) = label_node else {
        return Ok(None);
    };
    let label = normalize_label(node_text(document, label_node)?);
    return Ok(definitions.get(&label).cloned());
}

/// Build the fatal error for a node that does not line up with its source.
fn malformed(document: &ParsedDocument, node: Node<'_>, reason: &str) -> Error {
    return Error::MalformedDocument {
        file: document.path().to_path_buf(),
        reason: format!("{reason} ({} at byte {})", node.kind(), node.start_byte()),
    };
}

/// Whether a path has a markdown file extension.
fn has_markdown_extension(path: &Path) -> bool {
    return path
        .extension()
        .and_then(|ext| return ext.to_str())
        .is_some_and(|ext| return MARKDOWN_EXTENSIONS.contains(&ext));
}

/// Source text of a node, or a malformed-document error.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if the node's bytes are not in the source.
fn node_text<'doc>(document: &'doc ParsedDocument, node: Node<'_>) -> Result<&'doc str, Error> {
    return document
        .text(node)
        .ok_or_else(|| return malformed(document, node, "node text outside source"));
}

/// Normalize a reference label the way CommonMark matches them:
/// brackets removed, whitespace runs collapsed, case folded.
fn normalize_label(raw: &str) -> String {
    let inner = raw.trim();
    let inner = inner.strip_prefix('[').unwrap_or(inner);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    return inner.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
}

/// Remove the `<` `>` around an autolink.
fn strip_angle_brackets(raw: &str) -> &str {
    let inner = raw.trim();
    let inner = inner.strip_prefix('<').unwrap_or(inner);
    return inner.strip_suffix('>').unwrap_or(inner);
}

/// Drop the backslash in front of escaped ASCII punctuation.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek().is_some_and(char::is_ascii_punctuation) {
            continue;
        }
        out.push(c);
    }
    return out;
}

/// Walk one directory argument, appending markdown files that pass the filters.
/// Hidden directories such as `.git` are skipped.
fn walk_markdown_directory(dir: &Path, config: &RunConfiguration, files: &mut Vec<PathBuf>) {
    let walker = WalkDir::new(dir).sort_by_file_name().into_iter().filter_entry(|entry| {
        return entry.depth() == 0
            || !entry.file_type().is_dir()
            || !entry.file_name().to_string_lossy().starts_with('.');
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {}: {e}", dir.display());
                continue;
            },
        };
        if entry.file_type().is_dir() || !has_markdown_extension(entry.path()) {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        if !config.should_scan(&relative.to_string_lossy()) {
            tracing::debug!("excluded by config: {}", entry.path().display());
            continue;
        }
        files.push(entry.into_path());
    }
}
