//! Note pipeline orchestration
//!
//! Drives whole files end to end: frontmatter gate → link rewrite →
//! structure → assemble → merge resolution. Collaborators are injected at
//! construction; the pipeline owns no I/O of its own.
//!
//! Only notes whose frontmatter carries `oe_sync: true` are synced. A
//! note that fails anywhere in the chain is reported and skipped; the
//! rest of the batch proceeds.

use std::sync::Arc;

use anyhow::Context;
use quill_core::document::Document;
use quill_core::error::QuillError;
use quill_core::store::SourceStore;
use quill_core::vault::{ImageUploader, VaultReader};
use quill_parser::link_rewriter::LinkRewriter;
use quill_parser::structurer::structure;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::assembler::{assemble_document, SyncIdentity};
use crate::resolver::{MergeResolver, SyncReport};

static FRONTMATTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---\r?\n?").expect("frontmatter regex"));

const SYNC_FLAG: &str = "oe_sync";

/// End-to-end note sync driver
pub struct NoteSyncPipeline {
    vault: Arc<dyn VaultReader>,
    uploader: Arc<dyn ImageUploader>,
    store: Arc<dyn SourceStore>,
    identity: SyncIdentity,
    /// Remote account object id stamped as `_owner` on stored records
    owner: String,
}

impl NoteSyncPipeline {
    pub fn new(
        vault: Arc<dyn VaultReader>,
        uploader: Arc<dyn ImageUploader>,
        store: Arc<dyn SourceStore>,
        identity: SyncIdentity,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            vault,
            uploader,
            store,
            identity,
            owner: owner.into(),
        }
    }

    /// Parse one note into its transportable document
    ///
    /// Returns `None` when the note is not marked for sync. `prior_title`
    /// carries the pre-rename title when the host saw the file renamed
    /// since its last sync.
    pub async fn process_note(
        &self,
        path: &str,
        prior_title: Option<String>,
    ) -> anyhow::Result<Option<Document>> {
        let user_id = self.identity.require_user()?.to_string();
        if !self.identity.is_valid() {
            return Err(QuillError::identity("no API token configured").into());
        }

        let raw = self
            .vault
            .read_file_text(path)
            .await
            .with_context(|| format!("reading {path}"))?;
        let (frontmatter, body) = split_frontmatter(&raw);

        if !marked_for_sync(frontmatter) {
            debug!(path, "note not marked for sync");
            return Ok(None);
        }

        let meta = self
            .vault
            .file_metadata(path)
            .await
            .with_context(|| format!("reading metadata of {path}"))?;

        let rewriter =
            LinkRewriter::new(self.vault.clone(), self.uploader.clone(), user_id.as_str());
        let rewrite = rewriter.rewrite(&meta, body).await?;
        let structured = structure(&rewrite.content);

        let doc = assemble_document(
            &self.identity,
            &meta,
            body,
            &rewrite,
            &structured,
            prior_title,
        )?;

        info!(path, slug = %doc.slug, links = doc.internal_links.len(), "note processed");
        Ok(Some(doc))
    }

    /// Process and sync a set of notes end to end
    pub async fn sync_paths(&self, paths: &[String], can_override: bool) -> anyhow::Result<SyncReport> {
        let user_id = self.identity.require_user()?.to_string();
        let resolver = MergeResolver::new(self.store.clone(), user_id, self.owner.clone());

        let mut documents = Vec::new();
        let mut failed: Vec<String> = Vec::new();

        for path in paths {
            match self.process_note(path, None).await {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {}
                Err(err) => {
                    warn!(path, error = %err, "note failed to process");
                    failed.push(note_title(path));
                }
            }
        }

        let mut report = resolver.sync_batch(documents, can_override).await;

        for title in failed {
            report.data.file_sync_time.insert(title.clone(), None);
            report.data.failed_files.push(title);
        }
        if !report.data.failed_files.is_empty() {
            report.success = false;
            report.message = "Sync failed.".to_string();
        }

        Ok(report)
    }
}

/// Split leading YAML frontmatter from the note body
fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    match FRONTMATTER_RE.captures(raw) {
        Some(cap) => {
            let body_start = cap.get(0).map_or(0, |m| m.end());
            (cap.get(1).map(|m| m.as_str()), &raw[body_start..])
        }
        None => (None, raw),
    }
}

/// Check the frontmatter's sync flag
fn marked_for_sync(frontmatter: Option<&str>) -> bool {
    let Some(frontmatter) = frontmatter else {
        return false;
    };

    serde_yaml::from_str::<serde_yaml::Value>(frontmatter)
        .ok()
        .and_then(|value| value.get(SYNC_FLAG).and_then(serde_yaml::Value::as_bool))
        .unwrap_or(false)
}

fn note_title(path: &str) -> String {
    path.rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".md")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySourceStore;
    use quill_core::blocks::Block;
    use quill_core::document::OutgoingLink;
    use quill_core::vault::mock::{MockFile, MockUploader, MockVault};

    fn pipeline(vault: MockVault, store: Arc<InMemorySourceStore>) -> NoteSyncPipeline {
        NoteSyncPipeline::new(
            Arc::new(vault),
            Arc::new(MockUploader::new()),
            store,
            SyncIdentity::new("u1", "token"),
            "owner-1",
        )
    }

    #[test]
    fn test_frontmatter_split_and_flag() {
        let raw = "---\noe_sync: true\ntags: [a]\n---\n# Body";
        let (frontmatter, body) = split_frontmatter(raw);

        assert!(marked_for_sync(frontmatter));
        assert_eq!(body, "# Body");

        assert!(!marked_for_sync(Some("oe_sync: false")));
        assert!(!marked_for_sync(Some("title: x")));
        assert!(!marked_for_sync(None));
    }

    #[tokio::test]
    async fn test_end_to_end_note_processing() {
        let vault = MockVault::new();
        vault.add_file(
            "Note.md",
            MockFile::note(
                "---\noe_sync: true\n---\n# Title\n\nSome text\n\n## Sub\nMore [[OtherNote]]",
                500,
            ),
        );
        vault.add_file("OtherNote.md", MockFile::note("other", 1000));
        let store = Arc::new(InMemorySourceStore::new());

        let doc = pipeline(vault, store)
            .process_note("Note.md", None)
            .await
            .unwrap()
            .expect("marked note produces a document");

        assert_eq!(doc.slug, "u1-500");
        assert_eq!(doc.headings, vec!["Title"]);
        assert_eq!(doc.internal_links, vec![OutgoingLink::unresolved("u1-1000")]);

        let Block::Heading(title) = &doc.content[0] else {
            panic!("expected H1 at the root");
        };
        assert_eq!(title.content, "Title");
        assert_eq!(title.children.len(), 4);
        assert_eq!(title.children[0], Block::empty_line());
        assert_eq!(title.children[1], Block::paragraph("Some text"));
        assert_eq!(title.children[2], Block::empty_line());

        let Block::Heading(sub) = &title.children[3] else {
            panic!("expected H2 under the title");
        };
        assert_eq!(sub.content, "Sub");
        assert_eq!(
            sub.children,
            vec![Block::paragraph("More [[u1-1000|OtherNote|0|obsidian]]")]
        );
    }

    #[tokio::test]
    async fn test_unmarked_note_skipped() {
        let vault = MockVault::new();
        vault.add_file("Note.md", MockFile::note("# Title", 500));
        let store = Arc::new(InMemorySourceStore::new());

        let doc = pipeline(vault, store)
            .process_note("Note.md", None)
            .await
            .unwrap();

        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_abort() {
        let vault = MockVault::new();
        vault.add_file("Note.md", MockFile::note("---\noe_sync: true\n---\nx", 500));
        let pipeline = NoteSyncPipeline::new(
            Arc::new(vault),
            Arc::new(MockUploader::new()),
            Arc::new(InMemorySourceStore::new()),
            SyncIdentity::anonymous(),
            "owner-1",
        );

        assert!(pipeline.process_note("Note.md", None).await.is_err());
    }

    #[tokio::test]
    async fn test_resync_is_recognized_as_update() {
        let vault = MockVault::new();
        vault.add_file(
            "My Note.md",
            MockFile::note("---\noe_sync: true\n---\n# My Note", 500),
        );
        let store = Arc::new(InMemorySourceStore::new());
        let pipeline = pipeline(vault, store.clone());
        let paths = vec!["My Note.md".to_string()];

        let first = pipeline.sync_paths(&paths, false).await.unwrap();
        assert!(first.success);
        assert_eq!(first.data.new_files, vec!["My Note"]);

        let second = pipeline.sync_paths(&paths, false).await.unwrap();
        assert_eq!(second.data.synced_files, vec!["My Note"]);
        assert!(second.data.new_files.is_empty());
        assert_eq!(store.note_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_note_does_not_sink_batch() {
        let vault = MockVault::new();
        vault.add_file(
            "Good.md",
            MockFile::note("---\noe_sync: true\n---\n# Good", 500),
        );
        let store = Arc::new(InMemorySourceStore::new());

        let report = pipeline(vault, store.clone())
            .sync_paths(&["Good.md".to_string(), "Missing.md".to_string()], false)
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.data.new_files, vec!["Good"]);
        assert_eq!(report.data.failed_files, vec!["Missing"]);
        assert_eq!(store.note_count(), 1);
    }
}
