//! Remote store abstraction for the merge resolver
//!
//! Two logical collections back the resolver: a global note-content table
//! keyed by slug, and an ownership/access join table keyed by
//! `(note, user)` carrying a soft-delete flag. Implementations may sit on
//! any backend; the workspace ships an in-memory one for tests and as a
//! reference.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocks::Block;
use crate::document::{Document, OutgoingLink, SourceCategory};

/// Error type for store operations
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("note not found: {slug}")]
    NotFound { slug: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Create a generic backend error
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }
}

/// A note record as persisted remotely
///
/// Extends the document payload with ownership and lifecycle fields. Wire
/// names of the system fields keep their underscore prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNote {
    #[serde(rename = "_id")]
    pub id: String,

    pub title: String,
    pub slug: String,
    pub content: Vec<Block>,
    pub description: String,
    pub headings: Vec<String>,
    pub internal_links: Vec<OutgoingLink>,
    pub banner_image: Option<String>,
    pub source_type: String,
    pub source_category: SourceCategory,

    #[serde(rename = "_owner")]
    pub owner: String,

    #[serde(rename = "_created_by")]
    pub created_by: String,

    #[serde(rename = "_access_to")]
    pub access_to: Vec<String>,

    pub ctime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub published: bool,
}

impl StoredNote {
    /// Build a fresh record from an incoming document
    ///
    /// New records start unpublished with creation time now and access
    /// granted to the syncing user only.
    pub fn from_document(doc: &Document, id: impl Into<String>, owner: &str, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: doc.title.clone(),
            slug: doc.slug.clone(),
            content: doc.content.clone(),
            description: doc.description.clone(),
            headings: doc.headings.clone(),
            internal_links: doc.internal_links.clone(),
            banner_image: doc.banner_image.clone(),
            source_type: doc.source_type.clone(),
            source_category: doc.source_category.clone(),
            owner: owner.to_string(),
            created_by: user_id.to_string(),
            access_to: vec![user_id.to_string()],
            ctime: now,
            mtime: now,
            published: false,
        }
    }

    /// Overwrite the content-bearing fields from an incoming document
    ///
    /// Identity and lifecycle fields (`_id`, ownership, `ctime`,
    /// `published`) are preserved; `mtime` is bumped.
    pub fn apply_update(&mut self, doc: &Document) {
        self.title = doc.title.clone();
        self.slug = doc.slug.clone();
        self.content = doc.content.clone();
        self.description = doc.description.clone();
        self.headings = doc.headings.clone();
        self.internal_links = doc.internal_links.clone();
        self.banner_image = doc.banner_image.clone();
        self.source_type = doc.source_type.clone();
        self.source_category = doc.source_category.clone();
        self.mtime = Utc::now();
    }

    /// Check whether this record was created by the same origin pipeline
    pub fn same_origin(&self, category: &SourceCategory) -> bool {
        self.source_type == "text" && self.source_category.same_origin(category)
    }
}

/// Ownership/access record joining a stored note to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    #[serde(rename = "_saved_by")]
    pub saved_by: String,

    #[serde(rename = "_user")]
    pub user: String,

    #[serde(rename = "_source")]
    pub source: String,

    /// Soft-delete flag: false when the note was removed in the app but
    /// still exists locally
    pub in_local: bool,

    pub date_added: DateTime<Utc>,
}

impl OwnershipRecord {
    /// Create a fresh ownership record for a newly inserted note
    pub fn new(user_id: &str, owner: &str, source_id: &str) -> Self {
        Self {
            saved_by: user_id.to_string(),
            user: owner.to_string(),
            source: source_id.to_string(),
            in_local: true,
            date_added: Utc::now(),
        }
    }
}

/// Storage interface the merge resolver runs against
///
/// Implementations must be `Send + Sync`; the resolver may be shared
/// across tasks behind an `Arc`.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Find the note a given user created under a slug
    async fn find_by_slug(&self, created_by: &str, slug: &str) -> StoreResult<Option<StoredNote>>;

    /// Insert a new note record, returning its assigned id
    async fn insert(&self, note: StoredNote) -> StoreResult<String>;

    /// Replace an existing note record matched by slug
    async fn update(&self, note: StoredNote) -> StoreResult<()>;

    /// Resolve stored ids for a set of slugs
    ///
    /// Slugs with no stored note are absent from the returned map.
    async fn find_ids_by_slugs(&self, slugs: &[String]) -> StoreResult<HashMap<String, String>>;

    /// Insert an ownership record
    async fn insert_ownership(&self, record: OwnershipRecord) -> StoreResult<()>;

    /// Re-flag a note as present locally for a user (soft-tombstone restore)
    async fn restore_ownership(&self, source_id: &str, user_id: &str) -> StoreResult<()>;
}

/// Blanket implementation of SourceStore for Arc<T>
#[async_trait]
impl<T: SourceStore + ?Sized> SourceStore for std::sync::Arc<T> {
    async fn find_by_slug(&self, created_by: &str, slug: &str) -> StoreResult<Option<StoredNote>> {
        (**self).find_by_slug(created_by, slug).await
    }

    async fn insert(&self, note: StoredNote) -> StoreResult<String> {
        (**self).insert(note).await
    }

    async fn update(&self, note: StoredNote) -> StoreResult<()> {
        (**self).update(note).await
    }

    async fn find_ids_by_slugs(&self, slugs: &[String]) -> StoreResult<HashMap<String, String>> {
        (**self).find_ids_by_slugs(slugs).await
    }

    async fn insert_ownership(&self, record: OwnershipRecord) -> StoreResult<()> {
        (**self).insert_ownership(record).await
    }

    async fn restore_ownership(&self, source_id: &str, user_id: &str) -> StoreResult<()> {
        (**self).restore_ownership(source_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn sample_document() -> Document {
        Document {
            title: "Note".to_string(),
            slug: "u1-note".to_string(),
            content: vec![Block::heading(1, "Note")],
            description: "Obsidian vault".to_string(),
            headings: vec!["Note".to_string()],
            internal_links: vec![],
            banner_image: None,
            source_type: "text".to_string(),
            source_category: SourceCategory::notes(),
            file_ctime: 1000,
            file_mtime: 2000,
            file_path: "Note.md".to_string(),
            temp_title: None,
        }
    }

    #[test]
    fn test_stored_note_wire_names() {
        let note = StoredNote::from_document(&sample_document(), "id-1", "owner-1", "u1");
        let json = serde_json::to_value(&note).expect("serialize");

        assert_eq!(json["_id"], "id-1");
        assert_eq!(json["_owner"], "owner-1");
        assert_eq!(json["_created_by"], "u1");
        assert_eq!(json["_access_to"][0], "u1");
        assert_eq!(json["published"], false);
    }

    #[test]
    fn test_apply_update_preserves_identity() {
        let mut note = StoredNote::from_document(&sample_document(), "id-1", "owner-1", "u1");
        note.published = true;
        let original_ctime = note.ctime;

        let mut incoming = sample_document();
        incoming.title = "Renamed".to_string();
        note.apply_update(&incoming);

        assert_eq!(note.id, "id-1");
        assert_eq!(note.title, "Renamed");
        assert_eq!(note.ctime, original_ctime);
        assert!(note.published);
        assert!(note.mtime >= original_ctime);
    }

    #[test]
    fn test_same_origin_requires_text_source() {
        let mut note = StoredNote::from_document(&sample_document(), "id-1", "owner-1", "u1");
        assert!(note.same_origin(&SourceCategory::notes()));

        note.source_type = "pdf".to_string();
        assert!(!note.same_origin(&SourceCategory::notes()));
    }
}
