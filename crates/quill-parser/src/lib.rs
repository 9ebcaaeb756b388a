//! Quill Markdown Parser
//!
//! Turns raw note text into the nested block tree defined in
//! `quill-core`, and rewrites cross-note and external references into the
//! normalized link format. This crate provides:
//! - The link rewriter (wikilinks, Wikipedia/YouTube links, image embeds)
//! - The markdown structurer (block tree with blank-line fidelity)
//! - The line-level list parser (indentation nesting, checkboxes)
//! - The section-oriented structurer generation

pub mod link_rewriter;
pub mod lists;
pub mod sections;
pub mod structurer;

// Re-export main entry points for convenience
pub use link_rewriter::{LinkRewriter, RewriteOutcome};
pub use lists::parse_list_block;
pub use sections::{structure_sections, SectionOutcome};
pub use structurer::{structure, StructureOutcome};
