/// Tree-sitter markdown grammars and the parsed-document view built on them.
use std::path::{Path, PathBuf};

use tree_sitter::{Language, Node, Parser, Point, Range, Tree};

use crate::error::Error;
use crate::types::SourceSpan;

/// Block node kinds whose text is parsed again with the inline grammar.
const INLINE_CONTAINERS: [&str; 2] = ["inline", "pipe_table_cell"];

/// An inline syntax tree and the block node it was parsed from.
struct InlineTree {
    /// `Node::id` of the block-level container in the block tree.
    container: usize,
    /// Inline tree whose positions are absolute in the document source.
    tree: Tree,
}

/// A markdown document parsed with both tree-sitter-md grammars.
///
/// The block tree gives headings, paragraphs and reference definitions;
/// each inline container gets its own inline tree holding links, emphasis
/// and code spans. Inline trees are kept in document order.
pub struct ParsedDocument {
    /// Block-level syntax tree.
    block: Tree,
    /// Inline trees in document order.
    inlines: Vec<InlineTree>,
    /// Path the document was read from, for diagnostics.
    path: PathBuf,
    /// Full document text.
    source: String,
}

impl ParsedDocument {
    /// Inline tree parsed from the given block-level container node.
    pub fn inline_for(&self, container: Node<'_>) -> Option<&Tree> {
        let id = container.id();
        return self
            .inlines
            .iter()
            .find(|inline| return inline.container == id)
            .map(|inline| return &inline.tree);
    }

    /// All inline trees, in document order.
    pub fn inline_trees(&self) -> impl Iterator<Item = &Tree> {
        return self.inlines.iter().map(|inline| return &inline.tree);
    }

    /// Parse markdown text that was read from `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::GrammarUnavailable` if a grammar cannot be loaded,
    /// or `Error::ParseFailed` if tree-sitter gives up on the text.
    pub fn parse(path: &Path, source: String) -> Result<Self, Error> {
        let mut block_parser = new_parser(&block_language())?;
        let block = block_parser.parse(&source, None).ok_or_else(|| {
            return Error::ParseFailed {
                file: path.to_path_buf(),
                reason: "block grammar returned no tree".to_string(),
            };
        })?;

        let mut containers = Vec::new();
        collect_inline_containers(block.root_node(), &mut containers);

        let mut inline_parser = new_parser(&inline_language())?;
        let mut inlines = Vec::with_capacity(containers.len());
        for container in containers {
            let ranges = content_ranges(container);
            if ranges.is_empty() {
                continue;
            }
            let tree = parse_inline_ranges(&mut inline_parser, path, &source, &ranges)?;
            inlines.push(InlineTree {
                container: container.id(),
                tree,
            });
        }

        return Ok(Self {
            block,
            inlines,
            path: path.to_path_buf(),
            source,
        });
    }

    /// Path the document was read from.
    pub fn path(&self) -> &Path {
        return &self.path;
    }

    /// Read and parse a markdown file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Read` if the file cannot be read as UTF-8 text,
    /// otherwise the errors of [`ParsedDocument::parse`].
    pub fn read(path: &Path) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path).map_err(|source| {
            return Error::Read {
                path: path.to_path_buf(),
                source,
            };
        })?;
        return Self::parse(path, source);
    }

    /// Root node of the block tree.
    pub fn root(&self) -> Node<'_> {
        return self.block.root_node();
    }

    /// Full document text.
    pub fn source(&self) -> &str {
        return &self.source;
    }

    /// One-based line/column span of a node, with character columns.
    /// `None` when the node's byte offsets do not fall on the source text.
    pub fn span(&self, node: Node<'_>) -> Option<SourceSpan> {
        let (start_line, start_column) = self.line_column(node.start_byte(), node.start_position())?;
        let (end_line, end_column) = self.line_column(node.end_byte(), node.end_position())?;
        return Some(SourceSpan {
            end_column,
            end_line,
            start_column,
            start_line,
        });
    }

    /// Source text covered by a node.
    pub fn text(&self, node: Node<'_>) -> Option<&str> {
        return self.source.get(node.start_byte()..node.end_byte());
    }

    /// Convert a tree-sitter byte position into a one-based line and character column.
    fn line_column(&self, byte: usize, point: Point) -> Option<(usize, usize)> {
        let line_start = byte.checked_sub(point.column)?;
        let chars_before = self.source.get(line_start..byte)?.chars().count();
        return Some((point.row.checked_add(1)?, chars_before.checked_add(1)?));
    }
}

/// The tree-sitter-md block grammar.
fn block_language() -> Language {
    return tree_sitter_md::LANGUAGE.into();
}

/// Walk the block tree in document order and collect every inline container.
fn collect_inline_containers<'tree>(node: Node<'tree>, containers: &mut Vec<Node<'tree>>) {
    if INLINE_CONTAINERS.contains(&node.kind()) {
        containers.push(node);
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_inline_containers(child, containers);
    }
}

/// Byte ranges of a container's own text, skipping block continuation markers
/// such as the `> ` prefix of quoted paragraph lines.
fn content_ranges(container: Node<'_>) -> Vec<Range> {
    let mut ranges = Vec::new();
    let mut start_byte = container.start_byte();
    let mut start_point = container.start_position();

    let mut cursor = container.walk();
    for child in container.children(&mut cursor) {
        if child.kind() != "block_continuation" {
            continue;
        }
        push_range(&mut ranges, (start_byte, start_point), (child.start_byte(), child.start_position()));
        start_byte = child.end_byte();
        start_point = child.end_position();
    }
    push_range(&mut ranges, (start_byte, start_point), (container.end_byte(), container.end_position()));

    return ranges;
}

/// Verify both markdown grammars load into a parser.
///
/// # Errors
///
/// Returns `Error::GrammarUnavailable` if either grammar is incompatible
/// with the linked tree-sitter runtime.
pub fn ensure_grammars() -> Result<(), Error> {
    new_parser(&block_language())?;
    new_parser(&inline_language())?;
    return Ok(());
}

/// The tree-sitter-md inline grammar.
fn inline_language() -> Language {
    return tree_sitter_md::INLINE_LANGUAGE.into();
}

/// Create a parser for one grammar.
///
/// # Errors
///
/// Returns `Error::GrammarUnavailable` if the grammar ABI does not match.
fn new_parser(language: &Language) -> Result<Parser, Error> {
    let mut parser = Parser::new();
    parser.set_language(language).map_err(|e| {
        return Error::GrammarUnavailable {
            reason: e.to_string(),
        };
    })?;
    return Ok(parser);
}

/// Parse the given ranges of `source` with the inline grammar.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if the block tree produced unusable
/// ranges, or `Error::ParseFailed` if the inline grammar returns no tree.
fn parse_inline_ranges(
    parser: &mut Parser,
    path: &Path,
    source: &str,
    ranges: &[Range],
) -> Result<Tree, Error> {
    parser.set_included_ranges(ranges).map_err(|e| {
        return Error::MalformedDocument {
            file: path.to_path_buf(),
            reason: format!("inline ranges out of order: {e:?}"),
        };
    })?;
    return parser.parse(source, None).ok_or_else(|| {
        return Error::ParseFailed {
            file: path.to_path_buf(),
            reason: "inline grammar returned no tree".to_string(),
        };
    });
}

/// Append a non-empty range.
fn push_range(ranges: &mut Vec<Range>, start: (usize, Point), end: (usize, Point)) {
    let ((start_byte, start_point), (end_byte, end_point)) = (start, end);
    if end_byte <= start_byte {
        return;
    }
    ranges.push(Range {
        end_byte,
        end_point,
        start_byte,
        start_point,
    });
}
