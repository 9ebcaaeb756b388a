//! Collaborator traits for the host vault and image upload
//!
//! The pipeline never reaches for a global editor context; everything it
//! needs from the host is expressed here and injected at construction.
//! The sync transport, debounce policy, and UI stay on the other side of
//! these seams.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::NoteFileMetadata;
use crate::error::QuillResult;

/// Timestamps and size of a vault file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Creation time (epoch milliseconds)
    pub ctime: i64,
    /// Modification time (epoch milliseconds)
    pub mtime: i64,
    pub size: u64,
}

/// A sibling file in the note's parent folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiblingEntry {
    pub stat: FileStat,
    /// Parent folder path (`/` for the vault root)
    pub path: String,
}

/// Map from file name to sibling details, as supplied by the host
pub type SiblingListing = HashMap<String, SiblingEntry>;

/// An embedded-image reference (`![[name]]`) found by the host editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedImageRef {
    /// The literal markdown of the embed as it appears in source
    pub original_markdown: String,
    /// The embed target (file name or vault-relative path)
    pub link_target: String,
    /// Display text, empty when none was given
    pub alt_text: String,
}

/// Read access to the host vault
#[async_trait]
pub trait VaultReader: Send + Sync {
    /// Raw text contents of a note
    async fn read_file_text(&self, path: &str) -> QuillResult<String>;

    /// Raw bytes of a file (used for image upload)
    async fn read_binary(&self, path: &str) -> QuillResult<Vec<u8>>;

    /// Metadata for a note file
    async fn file_metadata(&self, path: &str) -> QuillResult<NoteFileMetadata>;

    /// Listing of the files sharing a parent folder
    async fn sibling_listing(&self, parent_folder: &str) -> QuillResult<SiblingListing>;

    /// Embedded-image references the host editor found in a note
    async fn embedded_image_refs(&self, path: &str) -> QuillResult<Vec<EmbeddedImageRef>>;

    /// Vault-wide lookup of a file by name or path
    ///
    /// Fallback when a link target is not among the siblings. Returns
    /// `None` when no file matches.
    async fn find_file(&self, name: &str) -> Option<NoteFileMetadata>;
}

/// Image upload collaborator
///
/// Byte transport and encoding are the implementer's concern; the
/// pipeline only needs the resulting remote URL. Implementations must
/// fail fast when no valid credential is configured.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload image bytes, returning the remote URL
    async fn upload(&self, bytes: Vec<u8>, path: &str, mime_type: &str) -> QuillResult<String>;
}

/// Blanket implementation of VaultReader for Arc<T>
#[async_trait]
impl<T: VaultReader + ?Sized> VaultReader for std::sync::Arc<T> {
    async fn read_file_text(&self, path: &str) -> QuillResult<String> {
        (**self).read_file_text(path).await
    }

    async fn read_binary(&self, path: &str) -> QuillResult<Vec<u8>> {
        (**self).read_binary(path).await
    }

    async fn file_metadata(&self, path: &str) -> QuillResult<NoteFileMetadata> {
        (**self).file_metadata(path).await
    }

    async fn sibling_listing(&self, parent_folder: &str) -> QuillResult<SiblingListing> {
        (**self).sibling_listing(parent_folder).await
    }

    async fn embedded_image_refs(&self, path: &str) -> QuillResult<Vec<EmbeddedImageRef>> {
        (**self).embedded_image_refs(path).await
    }

    async fn find_file(&self, name: &str) -> Option<NoteFileMetadata> {
        (**self).find_file(name).await
    }
}

/// Blanket implementation of ImageUploader for Arc<T>
#[async_trait]
impl<T: ImageUploader + ?Sized> ImageUploader for std::sync::Arc<T> {
    async fn upload(&self, bytes: Vec<u8>, path: &str, mime_type: &str) -> QuillResult<String> {
        (**self).upload(bytes, path, mime_type).await
    }
}

#[cfg(feature = "test-utils")]
pub mod mock {
    //! In-memory vault and uploader doubles for tests

    use super::*;
    use crate::error::QuillError;
    use std::sync::Mutex;

    /// A file registered with the mock vault
    #[derive(Debug, Clone)]
    pub struct MockFile {
        pub text: String,
        pub bytes: Vec<u8>,
        pub ctime: i64,
        pub mtime: i64,
        pub parent_folder: Option<String>,
        pub embeds: Vec<EmbeddedImageRef>,
    }

    impl MockFile {
        /// Create a text note with the given creation time
        pub fn note(text: impl Into<String>, ctime: i64) -> Self {
            Self {
                text: text.into(),
                bytes: Vec::new(),
                ctime,
                mtime: ctime,
                parent_folder: None,
                embeds: Vec::new(),
            }
        }

        /// Create a binary file (image) with the given creation time
        pub fn binary(bytes: Vec<u8>, ctime: i64) -> Self {
            Self {
                text: String::new(),
                bytes,
                ctime,
                mtime: ctime,
                parent_folder: None,
                embeds: Vec::new(),
            }
        }
    }

    /// Mock vault backed by a path-keyed map
    #[derive(Default)]
    pub struct MockVault {
        files: Mutex<HashMap<String, MockFile>>,
    }

    impl MockVault {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a file under a vault-relative path
        pub fn add_file(&self, path: impl Into<String>, file: MockFile) {
            self.files.lock().unwrap().insert(path.into(), file);
        }

        fn metadata_for(path: &str, file: &MockFile) -> NoteFileMetadata {
            let basename = path
                .rsplit('/')
                .next()
                .unwrap_or(path)
                .trim_end_matches(".md")
                .to_string();
            NoteFileMetadata {
                title: basename,
                path: path.to_string(),
                ctime: file.ctime,
                mtime: file.mtime,
                parent_folder: file.parent_folder.clone(),
            }
        }
    }

    #[async_trait]
    impl VaultReader for MockVault {
        async fn read_file_text(&self, path: &str) -> QuillResult<String> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .map(|f| f.text.clone())
                .ok_or_else(|| QuillError::io(format!("no such file: {path}")))
        }

        async fn read_binary(&self, path: &str) -> QuillResult<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .map(|f| f.bytes.clone())
                .ok_or_else(|| QuillError::io(format!("no such file: {path}")))
        }

        async fn file_metadata(&self, path: &str) -> QuillResult<NoteFileMetadata> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .map(|f| Self::metadata_for(path, f))
                .ok_or_else(|| QuillError::io(format!("no such file: {path}")))
        }

        async fn sibling_listing(&self, parent_folder: &str) -> QuillResult<SiblingListing> {
            let files = self.files.lock().unwrap();
            let mut listing = SiblingListing::new();

            for (path, file) in files.iter() {
                let parent = file.parent_folder.as_deref().unwrap_or("/");
                if parent == parent_folder {
                    let name = path.rsplit('/').next().unwrap_or(path).to_string();
                    listing.insert(
                        name,
                        SiblingEntry {
                            stat: FileStat {
                                ctime: file.ctime,
                                mtime: file.mtime,
                                size: file.bytes.len() as u64,
                            },
                            path: parent.to_string(),
                        },
                    );
                }
            }

            Ok(listing)
        }

        async fn embedded_image_refs(&self, path: &str) -> QuillResult<Vec<EmbeddedImageRef>> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .get(path)
                .map(|f| f.embeds.clone())
                .unwrap_or_default())
        }

        async fn find_file(&self, name: &str) -> Option<NoteFileMetadata> {
            let files = self.files.lock().unwrap();
            files
                .iter()
                .find(|(path, _)| {
                    path.as_str() == name
                        || path.rsplit('/').next() == Some(name)
                        || path.ends_with(&format!("{name}.md"))
                })
                .map(|(path, file)| Self::metadata_for(path, file))
        }
    }

    /// Mock uploader returning deterministic remote URLs
    pub struct MockUploader {
        has_token: bool,
        pub uploads: Mutex<Vec<String>>,
    }

    impl MockUploader {
        /// Uploader with a valid credential
        pub fn new() -> Self {
            Self {
                has_token: true,
                uploads: Mutex::new(Vec::new()),
            }
        }

        /// Uploader with no credential; every upload fails fast
        pub fn without_token() -> Self {
            Self {
                has_token: false,
                uploads: Mutex::new(Vec::new()),
            }
        }
    }

    impl Default for MockUploader {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ImageUploader for MockUploader {
        async fn upload(&self, _bytes: Vec<u8>, path: &str, _mime_type: &str) -> QuillResult<String> {
            if !self.has_token {
                return Err(QuillError::image_upload(path, "API token is missing"));
            }

            self.uploads.lock().unwrap().push(path.to_string());
            Ok(format!("https://cdn.example.com/{}", path.replace(' ', "+")))
        }
    }
}
