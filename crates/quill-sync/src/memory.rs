//! In-memory store backend
//!
//! Reference implementation of [`SourceStore`] used by tests and local
//! runs. Notes are keyed by slug, ownership records by `(source, user)`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use quill_core::store::{OwnershipRecord, SourceStore, StoreError, StoreResult, StoredNote};

/// Map-backed store assigning sequential ids
#[derive(Default)]
pub struct InMemorySourceStore {
    notes: Mutex<HashMap<String, StoredNote>>,
    ownership: Mutex<Vec<OwnershipRecord>>,
    next_id: AtomicU64,
}

impl InMemorySourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notes
    pub fn note_count(&self) -> usize {
        self.notes.lock().expect("store lock").len()
    }

    /// Fetch a stored note by slug, regardless of creator
    pub fn get(&self, slug: &str) -> Option<StoredNote> {
        self.notes.lock().expect("store lock").get(slug).cloned()
    }

    /// Seed a record directly, bypassing the resolver
    pub fn seed(&self, note: StoredNote) {
        self.notes
            .lock()
            .expect("store lock")
            .insert(note.slug.clone(), note);
    }

    /// Flag a note as removed in the app for a user (the in-app delete flow)
    pub fn mark_removed(&self, source_id: &str, user_id: &str) {
        let mut ownership = self.ownership.lock().expect("store lock");
        for record in ownership.iter_mut() {
            if record.source == source_id && record.saved_by == user_id {
                record.in_local = false;
            }
        }
    }

    /// Ownership records for a stored note
    pub fn ownership_of(&self, source_id: &str) -> Vec<OwnershipRecord> {
        self.ownership
            .lock()
            .expect("store lock")
            .iter()
            .filter(|record| record.source == source_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SourceStore for InMemorySourceStore {
    async fn find_by_slug(&self, created_by: &str, slug: &str) -> StoreResult<Option<StoredNote>> {
        Ok(self
            .notes
            .lock()
            .expect("store lock")
            .get(slug)
            .filter(|note| note.created_by == created_by && note.source_type == "text")
            .cloned())
    }

    async fn insert(&self, mut note: StoredNote) -> StoreResult<String> {
        if note.id.is_empty() {
            note.id = format!("src-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        }

        let id = note.id.clone();
        self.notes
            .lock()
            .expect("store lock")
            .insert(note.slug.clone(), note);

        Ok(id)
    }

    async fn update(&self, note: StoredNote) -> StoreResult<()> {
        let mut notes = self.notes.lock().expect("store lock");
        if !notes.contains_key(&note.slug) {
            return Err(StoreError::NotFound {
                slug: note.slug.clone(),
            });
        }

        notes.insert(note.slug.clone(), note);
        Ok(())
    }

    async fn find_ids_by_slugs(&self, slugs: &[String]) -> StoreResult<HashMap<String, String>> {
        let notes = self.notes.lock().expect("store lock");

        Ok(slugs
            .iter()
            .filter_map(|slug| notes.get(slug).map(|note| (slug.clone(), note.id.clone())))
            .collect())
    }

    async fn insert_ownership(&self, record: OwnershipRecord) -> StoreResult<()> {
        self.ownership.lock().expect("store lock").push(record);
        Ok(())
    }

    async fn restore_ownership(&self, source_id: &str, user_id: &str) -> StoreResult<()> {
        let mut ownership = self.ownership.lock().expect("store lock");
        for record in ownership.iter_mut() {
            if record.source == source_id && record.saved_by == user_id {
                record.in_local = true;
            }
        }

        Ok(())
    }
}
