//! Quill Sync
//!
//! The note-sync half of the pipeline: assembles parsed notes into
//! transportable documents, reconciles them against the remote store, and
//! drives whole files through rewrite → structure → assemble → merge.
//! This crate provides:
//! - The document assembler (identity gate, slug derivation, banner
//!   fallback)
//! - The remote merge resolver (new/update/conflict/rename state machine)
//! - An in-memory store backend for tests and local runs
//! - The note pipeline orchestrator (frontmatter gate, per-note isolation)

pub mod assembler;
pub mod memory;
pub mod pipeline;
pub mod resolver;

// Re-export main entry points for convenience
pub use assembler::{assemble_document, SyncIdentity};
pub use memory::InMemorySourceStore;
pub use pipeline::NoteSyncPipeline;
pub use resolver::{MergeOutcome, MergeResolver, Resolution, SyncData, SyncReport};
