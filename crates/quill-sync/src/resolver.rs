//! Remote merge resolution
//!
//! Reconciles incoming documents against the store by slug. The lookup
//! slug is derived from the owner and the normalized title (the prior
//! title when the note was renamed), so successive syncs of the same
//! logical note land on the same record.
//!
//! Conflicts are not failures: a slug collision with a record from a
//! different origin pipeline returns the incoming note as a replacement
//! candidate, and nothing is written until the caller confirms override.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use quill_core::document::{Document, OutgoingLink, SourceCategory};
use quill_core::error::QuillResult;
use quill_core::slug;
use quill_core::store::{OwnershipRecord, SourceStore, StoreError, StoredNote};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How one incoming note was reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Slug not in store; a record was inserted
    New,

    /// Same-origin record existed; content fields were overwritten
    Updated,

    /// A differently-sourced record holds this slug; nothing was written
    Conflict,

    /// The note carries a rename, which this generation does not handle
    RenameUnsupported,
}

/// The resolver's verdict for one note
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub outcome: MergeOutcome,

    /// On conflict, the incoming note awaiting explicit confirmation
    pub replacement: Option<Document>,
}

impl Resolution {
    fn of(outcome: MergeOutcome) -> Self {
        Self {
            outcome,
            replacement: None,
        }
    }
}

/// Per-batch accounting returned to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncData {
    /// Sync instant per title; `None` for notes that did not sync
    #[serde(rename = "fileSyncTime")]
    pub file_sync_time: HashMap<String, Option<DateTime<Utc>>>,

    #[serde(rename = "syncCount")]
    pub sync_count: u32,

    #[serde(rename = "syncedFiles")]
    pub synced_files: Vec<String>,

    #[serde(rename = "newFiles")]
    pub new_files: Vec<String>,

    /// Conflicting notes awaiting user confirmation
    #[serde(rename = "replacementNotes")]
    pub replacement_notes: Vec<Document>,

    #[serde(rename = "failedFiles")]
    pub failed_files: Vec<String>,
}

/// Batch result surfaced to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    pub data: SyncData,
}

/// Reconciles incoming notes against the remote store
pub struct MergeResolver {
    store: Arc<dyn SourceStore>,
    user_id: String,
    owner: String,
    category: SourceCategory,
}

impl MergeResolver {
    pub fn new(
        store: Arc<dyn SourceStore>,
        user_id: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            owner: owner.into(),
            category: SourceCategory::notes(),
        }
    }

    /// Reconcile one incoming note
    ///
    /// With `can_override` set, the note is a confirmed replacement: the
    /// record holding its slug is overwritten without conflict checks.
    pub async fn resolve(&self, mut doc: Document, can_override: bool) -> QuillResult<Resolution> {
        self.resolve_link_ids(&mut doc.internal_links).await?;

        if can_override {
            return self.overwrite(doc).await;
        }

        let lookup = self.lookup_slug(&doc);

        match self.store.find_by_slug(&self.user_id, &lookup).await? {
            Some(existing) => {
                doc.slug = lookup;

                if !existing.same_origin(&self.category) {
                    info!(slug = %doc.slug, "slug held by a differently-sourced record");
                    return Ok(Resolution {
                        outcome: MergeOutcome::Conflict,
                        replacement: Some(doc),
                    });
                }

                if doc.is_renamed() {
                    warn!(title = %doc.title, "rename detected, not supported yet");
                    return Ok(Resolution::of(MergeOutcome::RenameUnsupported));
                }

                doc.temp_title = None;
                let deleted_in_app = !existing.access_to.contains(&self.user_id);

                let mut updated = existing.clone();
                updated.apply_update(&doc);
                self.store.update(updated).await?;

                if deleted_in_app {
                    self.store
                        .restore_ownership(&existing.id, &self.user_id)
                        .await?;
                }

                debug!(slug = %doc.slug, "note updated in place");
                Ok(Resolution::of(MergeOutcome::Updated))
            }
            None => {
                doc.slug = lookup;
                doc.temp_title = None;

                let note = StoredNote::from_document(&doc, "", &self.owner, &self.user_id);
                let id = self.store.insert(note).await?;
                self.store
                    .insert_ownership(OwnershipRecord::new(&self.user_id, &self.owner, &id))
                    .await?;

                debug!(slug = %doc.slug, id = %id, "note inserted");
                Ok(Resolution::of(MergeOutcome::New))
            }
        }
    }

    /// Reconcile a whole batch, isolating failures per note
    pub async fn sync_batch(&self, notes: Vec<Document>, can_override: bool) -> SyncReport {
        let mut data = SyncData::default();

        for doc in notes {
            let title = doc.title.clone();

            match self.resolve(doc, can_override).await {
                Ok(resolution) => match resolution.outcome {
                    MergeOutcome::New => {
                        data.new_files.push(title.clone());
                        data.sync_count += 1;
                        data.file_sync_time.insert(title, Some(Utc::now()));
                    }
                    MergeOutcome::Updated => {
                        data.synced_files.push(title.clone());
                        data.sync_count += 1;
                        data.file_sync_time.insert(title, Some(Utc::now()));
                    }
                    MergeOutcome::Conflict => {
                        data.file_sync_time.insert(title, None);
                        if let Some(replacement) = resolution.replacement {
                            data.replacement_notes.push(replacement);
                        }
                    }
                    MergeOutcome::RenameUnsupported => {
                        data.file_sync_time.insert(title.clone(), None);
                        data.failed_files.push(title);
                    }
                },
                Err(err) => {
                    warn!(title = %title, error = %err, "note failed to sync");
                    data.file_sync_time.insert(title.clone(), None);
                    data.failed_files.push(title);
                }
            }
        }

        let success = data.failed_files.is_empty();
        SyncReport {
            success,
            message: if success {
                "Notes synced successfully.".to_string()
            } else {
                "Sync failed.".to_string()
            },
            data,
        }
    }

    /// Slug the store is queried under: owner + normalized title, using the
    /// prior title when the note carries a rename
    fn lookup_slug(&self, doc: &Document) -> String {
        let title = if doc.is_renamed() {
            doc.temp_title.as_deref().unwrap_or(&doc.title)
        } else {
            &doc.title
        };

        slug::from_title(&self.user_id, title)
    }

    /// Fill in stored ids for outgoing links whose targets already exist
    async fn resolve_link_ids(&self, links: &mut [OutgoingLink]) -> QuillResult<()> {
        if links.is_empty() {
            return Ok(());
        }

        let slugs: Vec<String> = links.iter().map(|link| link.slug.clone()).collect();
        let ids = self.store.find_ids_by_slugs(&slugs).await?;

        for link in links.iter_mut() {
            if let Some(id) = ids.get(&link.slug) {
                link.id = Some(id.clone());
            }
        }

        Ok(())
    }

    /// Confirmed-override path: overwrite the record holding the slug
    ///
    /// Replacement candidates carry the store's title-derived slug; a note
    /// re-processed from the vault carries its ctime slug instead, so the
    /// lookup falls back to the title derivation.
    async fn overwrite(&self, mut doc: Document) -> QuillResult<Resolution> {
        let mut existing = self.store.find_by_slug(&self.user_id, &doc.slug).await?;
        if existing.is_none() {
            existing = self
                .store
                .find_by_slug(&self.user_id, &self.lookup_slug(&doc))
                .await?;
        }
        let existing = existing.ok_or_else(|| StoreError::NotFound {
            slug: doc.slug.clone(),
        })?;

        doc.slug = existing.slug.clone();
        let mut updated = existing;
        updated.apply_update(&doc);
        self.store.update(updated).await?;

        info!(slug = %doc.slug, "confirmed overwrite applied");
        Ok(Resolution::of(MergeOutcome::Updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySourceStore;
    use quill_core::blocks::Block;

    fn document(title: &str, ctime: i64) -> Document {
        Document {
            title: title.to_string(),
            slug: slug::from_ctime("u1", ctime),
            content: vec![Block::heading(1, title)],
            description: "Obsidian vault".to_string(),
            headings: vec![title.to_string()],
            internal_links: vec![],
            banner_image: None,
            source_type: "text".to_string(),
            source_category: SourceCategory::notes(),
            file_ctime: ctime,
            file_mtime: ctime,
            file_path: format!("{title}.md"),
            temp_title: None,
        }
    }

    fn resolver(store: Arc<InMemorySourceStore>) -> MergeResolver {
        MergeResolver::new(store, "u1", "owner-1")
    }

    #[tokio::test]
    async fn test_new_note_inserted_with_ownership() {
        let store = Arc::new(InMemorySourceStore::new());
        let resolution = resolver(store.clone())
            .resolve(document("My Note", 1000), false)
            .await
            .unwrap();

        assert_eq!(resolution.outcome, MergeOutcome::New);
        assert_eq!(store.note_count(), 1);

        let stored = store.get("u1-my_note").expect("stored under title slug");
        assert_eq!(stored.created_by, "u1");
        assert!(!stored.published);
        assert_eq!(store.ownership_of(&stored.id).len(), 1);
    }

    #[tokio::test]
    async fn test_resync_same_note_is_update() {
        let store = Arc::new(InMemorySourceStore::new());
        let resolver = resolver(store.clone());

        resolver.resolve(document("My Note", 1000), false).await.unwrap();
        let first = store.get("u1-my_note").unwrap();

        let mut second = document("My Note", 1000);
        second.content = vec![Block::paragraph("changed")];
        let resolution = resolver.resolve(second, false).await.unwrap();

        assert_eq!(resolution.outcome, MergeOutcome::Updated);
        assert_eq!(store.note_count(), 1);

        let stored = store.get("u1-my_note").unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.content, vec![Block::paragraph("changed")]);
        assert_eq!(stored.ctime, first.ctime);
    }

    #[tokio::test]
    async fn test_conflict_leaves_store_untouched() {
        let store = Arc::new(InMemorySourceStore::new());
        let mut foreign =
            StoredNote::from_document(&document("My Note", 500), "id-foreign", "owner-1", "u1");
        foreign.slug = "u1-my_note".to_string();
        foreign.source_category = SourceCategory {
            category: "articles".to_string(),
            sub_category: "web".to_string(),
            extension: ".html".to_string(),
        };
        foreign.content = vec![Block::paragraph("original")];
        store.seed(foreign);

        let resolution = resolver(store.clone())
            .resolve(document("My Note", 1000), false)
            .await
            .unwrap();

        assert_eq!(resolution.outcome, MergeOutcome::Conflict);
        let replacement = resolution.replacement.expect("replacement candidate");
        assert_eq!(replacement.slug, "u1-my_note");

        let untouched = store.get("u1-my_note").unwrap();
        assert_eq!(untouched.content, vec![Block::paragraph("original")]);
    }

    #[tokio::test]
    async fn test_confirmed_override_overwrites_conflicting_record() {
        let store = Arc::new(InMemorySourceStore::new());
        let mut foreign =
            StoredNote::from_document(&document("My Note", 500), "id-foreign", "owner-1", "u1");
        foreign.slug = "u1-my_note".to_string();
        foreign.source_category = SourceCategory {
            category: "articles".to_string(),
            sub_category: "web".to_string(),
            extension: ".html".to_string(),
        };
        store.seed(foreign);

        let resolver = resolver(store.clone());
        let replacement = resolver
            .resolve(document("My Note", 1000), false)
            .await
            .unwrap()
            .replacement
            .unwrap();

        let resolution = resolver.resolve(replacement, true).await.unwrap();

        assert_eq!(resolution.outcome, MergeOutcome::Updated);
        let stored = store.get("u1-my_note").unwrap();
        assert_eq!(stored.id, "id-foreign");
        assert_eq!(stored.source_category, SourceCategory::notes());
    }

    #[tokio::test]
    async fn test_rename_is_unsupported() {
        let store = Arc::new(InMemorySourceStore::new());
        let resolver = resolver(store.clone());

        resolver.resolve(document("Old Name", 1000), false).await.unwrap();

        let mut renamed = document("New Name", 1000);
        renamed.temp_title = Some("Old Name".to_string());
        let resolution = resolver.resolve(renamed, false).await.unwrap();

        assert_eq!(resolution.outcome, MergeOutcome::RenameUnsupported);
        // The stored record keeps its old title
        assert_eq!(store.get("u1-old_name").unwrap().title, "Old Name");
    }

    #[tokio::test]
    async fn test_link_ids_resolved_against_store() {
        let store = Arc::new(InMemorySourceStore::new());
        let mut target = StoredNote::from_document(&document("Target", 7), "id-t", "owner-1", "u1");
        target.slug = "u1-7".to_string();
        store.seed(target);

        let mut doc = document("Linker", 1000);
        doc.internal_links = vec![
            OutgoingLink::unresolved("u1-7"),
            OutgoingLink::unresolved("u1-unknown"),
        ];

        resolver(store.clone()).resolve(doc, false).await.unwrap();

        let stored = store.get("u1-linker").unwrap();
        assert_eq!(stored.internal_links[0].id.as_deref(), Some("id-t"));
        assert!(stored.internal_links[1].id.is_none());
    }

    #[tokio::test]
    async fn test_update_restores_soft_tombstone() {
        let store = Arc::new(InMemorySourceStore::new());
        let resolver = resolver(store.clone());

        resolver.resolve(document("My Note", 1000), false).await.unwrap();
        let id = store.get("u1-my_note").unwrap().id;

        // The app removed the note from the user's access list
        let mut stored = store.get("u1-my_note").unwrap();
        stored.access_to.clear();
        store.seed(stored);
        store.mark_removed(&id, "u1");

        resolver.resolve(document("My Note", 1000), false).await.unwrap();

        assert!(store.ownership_of(&id)[0].in_local);
    }

    #[tokio::test]
    async fn test_sync_batch_report() {
        let store = Arc::new(InMemorySourceStore::new());
        let resolver = resolver(store.clone());

        resolver.resolve(document("Existing", 1), false).await.unwrap();

        let report = resolver
            .sync_batch(vec![document("Existing", 1), document("Fresh", 2)], false)
            .await;

        assert!(report.success);
        assert_eq!(report.message, "Notes synced successfully.");
        assert_eq!(report.data.sync_count, 2);
        assert_eq!(report.data.synced_files, vec!["Existing"]);
        assert_eq!(report.data.new_files, vec!["Fresh"]);
        assert!(report.data.replacement_notes.is_empty());
        assert!(report.data.file_sync_time["Existing"].is_some());
    }
}
