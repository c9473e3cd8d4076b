//! Heading anchors: slug derivation and lookup in target documents.

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::Node;

use crate::error::Error;
use crate::grammar::ParsedDocument;

/// Inline node kinds that render to nothing in heading text.
const INVISIBLE_INLINE: [&str; 9] = [
    "block_continuation",
    "code_span_delimiter",
    "emphasis_delimiter",
    "entity_reference",
    "html_tag",
    "link_destination",
    "link_label",
    "link_title",
    "numeric_character_reference",
];

/// Whether the markdown file at `path` has a heading whose slug is exactly `anchor`.
/// The anchor is compared as written; slugs are already normalized.
///
/// # Errors
///
/// Returns `Error::Read` if the file cannot be read, or the parse errors
/// of [`ParsedDocument::parse`].
pub fn has_anchor(path: &Path, anchor: &str) -> Result<bool, Error> {
    let document = ParsedDocument::read(path)?;
    return Ok(heading_slugs(&document).iter().any(|slug| return slug == anchor));
}

/// Slugs of every heading in document order. Headings whose slug is empty
/// are skipped; repeated slugs get `-1`, `-2`, ... as GitHub renders them.
pub fn heading_slugs(document: &ParsedDocument) -> Vec<String> {
    let mut headings = Vec::new();
    collect_headings(document.root(), &mut headings);

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut slugs = Vec::with_capacity(headings.len());
    for heading in headings {
        let slug = slugify(&heading_text(document, heading));
        if slug.is_empty() {
            continue;
        }
        slugs.push(disambiguate(&mut seen, slug));
    }
    return slugs;
}

/// Convert rendered heading text to its anchor identifier.
/// Lowercase; keep alphanumerics, `-` and `_`; whitespace becomes `-`; drop the rest.
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            slug.push(c);
        } else if c.is_whitespace() {
            slug.push('-');
        }
    }
    return slug;
}

/// Collect ATX and setext heading nodes in document order.
fn collect_headings<'tree>(node: Node<'tree>, headings: &mut Vec<Node<'tree>>) {
    if matches!(node.kind(), "atx_heading" | "setext_heading") {
        headings.push(node);
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_headings(child, headings);
    }
}

/// Suffix a slug that was already seen with its occurrence count.
fn disambiguate(seen: &mut HashMap<String, usize>, slug: String) -> String {
    let count = seen.entry(slug.clone()).or_insert(0);
    let unique = if *count == 0 {
        slug
    } else {
        format!("{slug}-{count}")
    };
    *count = count.saturating_add(1);
    return unique;
}

/// First inline container below a heading (`heading_content` for ATX,
/// the underlined paragraph's inline for setext).
fn find_inline_container(node: Node<'_>) -> Option<Node<'_>> {
    if node.kind() == "inline" {
        return Some(node);
    }
    let mut cursor = node.walk();
    return node.children(&mut cursor).find_map(find_inline_container);
}

/// Plain text of a heading as a reader sees it: markup removed, link text kept.
fn heading_text(document: &ParsedDocument, heading: Node<'_>) -> String {
    let Some(container) = find_inline_container(heading) else {
        return String::new();
    };
    let mut text = String::new();
    match document.inline_for(container) {
        Some(tree) => render_children(
            document,
            tree.root_node(),
            (container.start_byte(), container.end_byte()),
            &mut text,
        ),
        None => push_source(document, container.start_byte(), container.end_byte(), &mut text),
    }
    // Closing sequence of `## Title ##`.
    return text.trim().trim_end_matches('#').to_string();
}

/// Append the source text between two byte offsets.
fn push_source(document: &ParsedDocument, start: usize, end: usize, out: &mut String) {
    if let Some(text) = document.source().get(start..end) {
        out.push_str(text);
    }
}

/// Render the text of `node` limited to `bounds`: literal text between named
/// children is copied, named children are rendered by kind.
fn render_children(document: &ParsedDocument, node: Node<'_>, bounds: (usize, usize), out: &mut String) {
    let (start, end) = bounds;
    let mut position = start;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.end_byte() <= start || child.start_byte() >= end {
            continue;
        }
        push_source(document, position, child.start_byte(), out);
        render_node(document, child, out);
        position = child.end_byte();
    }
    push_source(document, position, end, out);
}

/// Render one inline node into plain text.
fn render_node(document: &ParsedDocument, node: Node<'_>, out: &mut String) {
    let kind = node.kind();
    if INVISIBLE_INLINE.contains(&kind) {
        return;
    }
    match kind {
        "backslash_escape" => {
            push_source(document, node.start_byte().saturating_add(1), node.end_byte(), out);
        },
        "collapsed_reference_link" | "full_reference_link" | "image" | "inline_link"
        | "shortcut_link" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if matches!(child.kind(), "image_description" | "link_text") {
                    render_children(document, child, (child.start_byte(), child.end_byte()), out);
                }
            }
        },
        _ => render_children(document, node, (node.start_byte(), node.end_byte()), out),
    }
}
