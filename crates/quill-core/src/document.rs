//! Assembled document record handed to the sync transport

use crate::blocks::Block;
use serde::{Deserialize, Serialize};

/// Origin tag distinguishing which pipeline created a stored record
///
/// The merge resolver compares categories to tell a safe in-place update
/// (same origin) from a genuine naming conflict (different origin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCategory {
    pub category: String,
    pub sub_category: String,
    pub extension: String,
}

impl SourceCategory {
    /// The category this note-sync pipeline stamps on its documents
    pub fn notes() -> Self {
        Self {
            category: "notes".to_string(),
            sub_category: "obsidian".to_string(),
            extension: ".md".to_string(),
        }
    }

    /// Check whether another category describes the same origin pipeline
    pub fn same_origin(&self, other: &SourceCategory) -> bool {
        self.category == other.category && self.sub_category == other.sub_category
    }
}

impl Default for SourceCategory {
    fn default() -> Self {
        Self::notes()
    }
}

/// An outgoing link descriptor collected during link rewriting
///
/// `id` stays `None` until the remote resolver matches the slug against
/// stored documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingLink {
    pub slug: String,
    pub id: Option<String>,
}

impl OutgoingLink {
    /// Create an unresolved outgoing link
    pub fn unresolved(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            id: None,
        }
    }
}

/// File metadata supplied by the host vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteFileMetadata {
    /// File basename without extension
    pub title: String,

    /// Vault-relative path
    pub path: String,

    /// Creation time (epoch milliseconds)
    pub ctime: i64,

    /// Modification time (epoch milliseconds)
    pub mtime: i64,

    /// Parent folder path, when the file is not at the vault root
    pub parent_folder: Option<String>,
}

/// The assembled, serializable document record
///
/// This is the unit the sync transport sends to the remote merge
/// resolver. The slug is stable across re-syncs of the same logical note
/// so the resolver can recognize an update rather than a new note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub slug: String,

    /// The nested block tree
    pub content: Vec<Block>,

    pub description: String,

    /// H1 titles in emission order; the navigable heading index
    pub headings: Vec<String>,

    pub internal_links: Vec<OutgoingLink>,

    /// First embedded image of the note, promoted to a thumbnail
    pub banner_image: Option<String>,

    pub source_type: String,
    pub source_category: SourceCategory,

    #[serde(rename = "fileCtime")]
    pub file_ctime: i64,

    #[serde(rename = "fileMtime")]
    pub file_mtime: i64,

    #[serde(rename = "filePath")]
    pub file_path: String,

    /// Prior title, carried when the note was renamed since the last sync
    #[serde(rename = "tempTitle", default, skip_serializing_if = "Option::is_none")]
    pub temp_title: Option<String>,
}

impl Document {
    /// Serialize the block tree to the transport's string form
    pub fn content_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.content)
    }

    /// Check whether this document carries a rename
    pub fn is_renamed(&self) -> bool {
        self.temp_title
            .as_deref()
            .is_some_and(|prior| prior != self.title)
    }
}
