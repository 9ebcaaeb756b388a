//! Slug derivation
//!
//! A slug is the stable merge key between successive syncs of the same
//! logical note. The client derives it from the owner id and the file's
//! creation time; the remote resolver derives its lookup slug from the
//! owner id and the normalized title. Both must be deterministic.

/// Derive a slug from the owner id and a file creation timestamp
pub fn from_ctime(owner_id: &str, ctime: i64) -> String {
    format!("{owner_id}-{ctime}")
}

/// Derive a slug from the owner id and a note title
///
/// Normalization: lowercase, whitespace runs collapsed to `_`.
pub fn from_title(owner_id: &str, title: &str) -> String {
    let normalized = title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    format!("{owner_id}-{normalized}")
}
