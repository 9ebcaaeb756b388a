//! Quill Core
//!
//! Shared data model and trait seams for the Quill note-structuring
//! pipeline. This crate provides:
//! - The serializable block tree and section hierarchy
//! - The assembled document record and outgoing-link descriptors
//! - Collaborator traits for the host vault and image upload
//! - Store traits and record types for the remote merge resolver
//! - The error taxonomy shared across the workspace

pub mod blocks;
pub mod document;
pub mod error;
pub mod section;
pub mod slug;
pub mod store;
pub mod vault;

// Re-export main types for convenience
pub use blocks::{
    Block, BlockQuoteBlock, CodeBlock, EmptyBlock, HeadingBlock, ImageBlock, ListBlock, ListItem,
    ListKind, MathBlock, ParagraphBlock, Row, TableBlock,
};
pub use document::{Document, NoteFileMetadata, OutgoingLink, SourceCategory};
pub use error::{QuillError, QuillResult};
pub use section::Section;
pub use store::{OwnershipRecord, SourceStore, StoreError, StoreResult, StoredNote};
pub use vault::{EmbeddedImageRef, FileStat, ImageUploader, SiblingEntry, SiblingListing, VaultReader};
