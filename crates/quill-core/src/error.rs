//! Error taxonomy for the note-structuring pipeline
//!
//! Distinguishes recoverable parse fallbacks from failures that abort the
//! current note (image upload, missing identity) and from store failures
//! surfaced by the merge resolver. Conflicts are not errors; they are a
//! first-class merge outcome.

use crate::store::StoreError;
use thiserror::Error;

/// Errors produced while rewriting, structuring, or assembling a note
#[derive(Error, Debug)]
pub enum QuillError {
    /// No resolved owning user; document assembly never proceeds without one
    #[error("user identification failed: {0}")]
    Identity(String),

    /// Image upload collaborator failure; aborts the current note
    #[error("image upload failed for {path}: {reason}")]
    ImageUpload { path: String, reason: String },

    /// Internal link target could not be resolved
    ///
    /// Callers emit the link with a synthesized id rather than dropping it,
    /// so this surfaces only when a caller opts into strict resolution.
    #[error("internal link target not found: {target}")]
    LinkResolution { target: String },

    /// Malformed block structure; recovered as a plain paragraph upstream
    #[error("unparseable block structure: {0}")]
    Parse(String),

    /// Remote store failure during merge resolution
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Host vault I/O failure
    #[error("vault I/O error: {0}")]
    Io(String),
}

/// Result type for pipeline operations
pub type QuillResult<T> = Result<T, QuillError>;

impl QuillError {
    /// Create an identity error
    pub fn identity<S: Into<String>>(msg: S) -> Self {
        Self::Identity(msg.into())
    }

    /// Create an image upload error
    pub fn image_upload<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::ImageUpload {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a vault I/O error
    pub fn io<S: Into<String>>(msg: S) -> Self {
        Self::Io(msg.into())
    }

    /// Check whether this error aborts processing of the current note
    ///
    /// Parse and link-resolution problems degrade gracefully; everything
    /// else discards the half-built document.
    pub fn aborts_note(&self) -> bool {
        !matches!(self, Self::Parse(_) | Self::LinkResolution { .. })
    }
}

impl From<std::io::Error> for QuillError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
