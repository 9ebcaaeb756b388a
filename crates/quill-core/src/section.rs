//! Section hierarchy, the alternate flat-content view of a note
//!
//! Earlier generations of the structurer emit sections instead of a block
//! tree: each heading opens a section whose body is kept as raw markdown.
//! Sections nest strictly by heading level; a section at level N only ever
//! contains children at level > N.

use serde::{Deserialize, Serialize};

/// A heading-scoped slice of a note with raw markdown content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Heading text; empty for the initial pseudo-section
    pub title: String,

    /// Raw markdown body between this heading and the next
    pub content: String,

    /// Heading level; 0 is the sentinel for content before the first heading
    pub heading_level: u8,

    /// Deeper sections nested under this one
    #[serde(default)]
    pub children: Vec<Section>,
}

impl Section {
    /// Create a section with no children
    pub fn new(title: impl Into<String>, content: impl Into<String>, heading_level: u8) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            heading_level,
            children: Vec::new(),
        }
    }

    /// Check if this section carries neither content nor children
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.children.is_empty()
    }
}
