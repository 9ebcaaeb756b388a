//! Document assembly
//!
//! Pure combination step: rewritten content, structured blocks, link list,
//! banner, and file metadata fold into the final [`Document`] record. No
//! I/O happens here. Assembly refuses to run without a resolved owning
//! user; a document is never produced ownerless.

use quill_core::document::{Document, NoteFileMetadata, SourceCategory};
use quill_core::error::{QuillError, QuillResult};
use quill_core::slug;
use quill_parser::link_rewriter::RewriteOutcome;
use quill_parser::structurer::StructureOutcome;
use regex::Regex;
use std::sync::LazyLock;

/// Fallback banner: the first standard markdown image in the raw text
static MARKDOWN_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[(.*?)\]\((.*?)\)").expect("markdown image regex"));

const DESCRIPTION: &str = "Obsidian vault";

/// Credentials and identity of the syncing user
#[derive(Debug, Clone, Default)]
pub struct SyncIdentity {
    /// Owning-user identifier resolved from the remote account
    pub user_id: Option<String>,

    /// API token authorizing uploads and sync calls
    pub api_token: Option<String>,
}

impl SyncIdentity {
    pub fn new(user_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            api_token: Some(api_token.into()),
        }
    }

    /// Identity with no resolved user; every assembly fails
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Check that both user and token are present and non-empty
    pub fn is_valid(&self) -> bool {
        self.user_id.as_deref().is_some_and(|u| !u.is_empty())
            && self.api_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The owning user id, or an identity error when unresolved
    pub fn require_user(&self) -> QuillResult<&str> {
        self.user_id
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                QuillError::identity("user identification failed, verify your token")
            })
    }
}

/// Assemble the final document record for one note
///
/// `raw_content` is the note text before link rewriting; it feeds the
/// banner fallback only. `prior_title` carries the pre-rename title when
/// the host saw the file renamed since its last sync.
pub fn assemble_document(
    identity: &SyncIdentity,
    meta: &NoteFileMetadata,
    raw_content: &str,
    rewrite: &RewriteOutcome,
    structured: &StructureOutcome,
    prior_title: Option<String>,
) -> QuillResult<Document> {
    let user_id = identity.require_user()?;

    let banner_image = rewrite
        .banner_image_url
        .clone()
        .or_else(|| first_markdown_image(raw_content));

    Ok(Document {
        title: meta.title.clone(),
        slug: slug::from_ctime(user_id, meta.ctime),
        content: structured.blocks.clone(),
        description: DESCRIPTION.to_string(),
        headings: structured.h1_headings.clone(),
        internal_links: rewrite.internal_links.clone(),
        banner_image,
        source_type: "text".to_string(),
        source_category: SourceCategory::notes(),
        file_ctime: meta.ctime,
        file_mtime: meta.mtime,
        file_path: meta.path.clone(),
        temp_title: prior_title,
    })
}

fn first_markdown_image(content: &str) -> Option<String> {
    MARKDOWN_IMAGE_RE
        .captures(content)
        .and_then(|cap| cap.get(2))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::blocks::Block;
    use quill_core::document::OutgoingLink;

    fn meta() -> NoteFileMetadata {
        NoteFileMetadata {
            title: "Note".to_string(),
            path: "Note.md".to_string(),
            ctime: 1000,
            mtime: 2000,
            parent_folder: None,
        }
    }

    fn rewrite_outcome() -> RewriteOutcome {
        RewriteOutcome {
            content: "body".to_string(),
            internal_links: vec![OutgoingLink::unresolved("u1-7")],
            banner_image_url: None,
        }
    }

    fn structure_outcome() -> StructureOutcome {
        StructureOutcome {
            blocks: vec![Block::heading(1, "Note")],
            h1_headings: vec!["Note".to_string()],
        }
    }

    #[test]
    fn test_assembles_document_fields() {
        let identity = SyncIdentity::new("u1", "token");
        let doc = assemble_document(
            &identity,
            &meta(),
            "body",
            &rewrite_outcome(),
            &structure_outcome(),
            None,
        )
        .unwrap();

        assert_eq!(doc.slug, "u1-1000");
        assert_eq!(doc.title, "Note");
        assert_eq!(doc.description, "Obsidian vault");
        assert_eq!(doc.headings, vec!["Note"]);
        assert_eq!(doc.file_ctime, 1000);
        assert_eq!(doc.file_path, "Note.md");
        assert_eq!(doc.source_type, "text");
        assert!(doc.temp_title.is_none());
    }

    #[test]
    fn test_missing_user_rejects_assembly() {
        let result = assemble_document(
            &SyncIdentity::anonymous(),
            &meta(),
            "body",
            &rewrite_outcome(),
            &structure_outcome(),
            None,
        );

        assert!(matches!(result, Err(QuillError::Identity(_))));
    }

    #[test]
    fn test_banner_falls_back_to_first_markdown_image() {
        let identity = SyncIdentity::new("u1", "token");
        let raw = "text\n![alt](https://img.example/banner.png)\nmore";
        let doc = assemble_document(
            &identity,
            &meta(),
            raw,
            &rewrite_outcome(),
            &structure_outcome(),
            None,
        )
        .unwrap();

        assert_eq!(
            doc.banner_image.as_deref(),
            Some("https://img.example/banner.png")
        );
    }

    #[test]
    fn test_uploaded_banner_wins_over_fallback() {
        let identity = SyncIdentity::new("u1", "token");
        let mut rewrite = rewrite_outcome();
        rewrite.banner_image_url = Some("https://cdn.example.com/up.png".to_string());

        let doc = assemble_document(
            &identity,
            &meta(),
            "![alt](https://img.example/other.png)",
            &rewrite,
            &structure_outcome(),
            None,
        )
        .unwrap();

        assert_eq!(doc.banner_image.as_deref(), Some("https://cdn.example.com/up.png"));
    }

    #[test]
    fn test_identity_validity() {
        assert!(SyncIdentity::new("u1", "token").is_valid());
        assert!(!SyncIdentity::anonymous().is_valid());
        assert!(!SyncIdentity::new("u1", "").is_valid());
    }
}
