//! Block types for the structured note tree
//!
//! Every block carries a `block_type` tag on the wire and a payload whose
//! shape depends on the tag. The tree nests through heading blocks
//! (`HeadingBlock::children`) and through list items (`ListItem::children`,
//! which holds at most one nested list).

use serde::{Deserialize, Serialize};

/// A single block of structured note content
///
/// Closed sum type so every consumer pattern-matches exhaustively. The
/// serialized form is internally tagged: `{"block_type": "heading", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block_type", rename_all = "snake_case")]
pub enum Block {
    Heading(HeadingBlock),
    Paragraph(ParagraphBlock),
    List(ListBlock),
    Table(TableBlock),
    Image(ImageBlock),
    Code(CodeBlock),
    BlockQuote(BlockQuoteBlock),
    Math(MathBlock),
    EmptyLine(EmptyBlock),
}

impl Block {
    /// Get the string representation of this block's type
    pub fn type_name(&self) -> &'static str {
        match self {
            Block::Heading(_) => "heading",
            Block::Paragraph(_) => "paragraph",
            Block::List(_) => "list",
            Block::Table(_) => "table",
            Block::Image(_) => "image",
            Block::Code(_) => "code",
            Block::BlockQuote(_) => "block_quote",
            Block::Math(_) => "math",
            Block::EmptyLine(_) => "empty_line",
        }
    }

    /// Construct a paragraph block
    pub fn paragraph(content: impl Into<String>) -> Self {
        Block::Paragraph(ParagraphBlock {
            content: content.into(),
        })
    }

    /// Construct a heading block with no children yet
    pub fn heading(level: u8, content: impl Into<String>) -> Self {
        Block::Heading(HeadingBlock {
            heading_level: level,
            content: content.into(),
            children: Vec::new(),
        })
    }

    /// Construct an empty-line marker
    pub fn empty_line() -> Self {
        Block::EmptyLine(EmptyBlock::default())
    }

    /// Check if this block is a heading
    pub fn is_heading(&self) -> bool {
        matches!(self, Block::Heading(_))
    }

    /// Get the heading level if this is a heading block
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Block::Heading(h) => Some(h.heading_level),
            _ => None,
        }
    }
}

/// Heading block with nested scope
///
/// `children` holds every block that falls under this heading until the
/// next heading of equal or shallower level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingBlock {
    /// Heading level (1-6)
    pub heading_level: u8,

    /// Raw inline markdown of the heading text (no `#` prefix)
    pub content: String,

    /// Blocks belonging to this heading's scope
    #[serde(default)]
    pub children: Vec<Block>,
}

/// Paragraph block: a run of inline markdown with no embedded images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphBlock {
    pub content: String,
}

/// List block: a forest of top-level list items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListBlock {
    pub content: Vec<ListItem>,
}

/// Marker classification for a list item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Ordered,
    Unordered,
    Checkbox,
}

/// A single list item, optionally carrying one nested list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// Item text, including any continuation lines
    pub content: String,

    /// Ordered / unordered / checkbox
    pub list_type: ListKind,

    /// Literal marker token as it appeared in source (`-`, `3.`, `- [x]`)
    pub marker: String,

    /// Nested blocks; at most one, a nested `Block::List`
    #[serde(default)]
    pub children: Vec<Block>,
}

/// Table block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBlock {
    pub rows: Vec<Row>,
}

/// A table row; the first source row is the heading row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub is_heading: bool,

    /// Cell markdown, one entry per column
    pub values: Vec<String>,
}

/// Standalone image block
///
/// Images are never nested inside paragraph blocks; the structurer
/// fragments mixed paragraphs into separate paragraph and image blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub img_src: String,
    pub img_caption: String,
}

/// Fenced or indented code block
///
/// `content` is the literal body, byte-for-byte; inline link rewriting
/// never touches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub content: String,

    /// Fence info string, when one was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Block quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockQuoteBlock {
    pub content: String,
}

/// Display math block (`$$ ... $$`), body preserved literally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathBlock {
    pub content: String,
}

/// Marker for a truly empty source line
///
/// Preserves vertical whitespace so a rebuilt document is line-faithful
/// to the source. Whitespace-only lines become empty paragraphs instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyBlock {
    pub length: u32,
}

impl Default for EmptyBlock {
    fn default() -> Self {
        Self { length: 1 }
    }
}
