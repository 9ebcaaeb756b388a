//! Link detection and rewriting
//!
//! First pass of the note pipeline: embedded images are uploaded and
//! replaced with standard markdown image syntax, then one combined scan
//! rewrites cross-note wikilinks and Wikipedia/YouTube references into the
//! normalized `[[title|alias|index|source]]` form while collecting the
//! ordered outgoing-link list.
//!
//! Substitution is a single left-to-right splice over the match spans, so
//! identical link text occurring twice is rewritten independently, each
//! occurrence with its own index.

use std::ops::Range;
use std::sync::Arc;

use quill_core::document::{NoteFileMetadata, OutgoingLink};
use quill_core::error::QuillResult;
use quill_core::slug;
use quill_core::vault::{ImageUploader, SiblingListing, VaultReader};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// One combined pattern, three link shapes: markdown-wrapped external URL,
/// wiki-style `[[target]]` / `[[target|alias]]`, bare external URL. The
/// bare arm ends on a word boundary so trailing punctuation stays outside
/// the match.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[([^\[\]]*?)\]\((https://(?:\w+\.wikipedia\.org/wiki/\S+|www\.youtube\.com/watch\?v=\S+))\)|\[\[(.*?)\]\]|\b(https://(?:\w+\.wikipedia\.org/wiki/\S+|www\.youtube\.com/watch\?v=\S+))\b",
    )
    .expect("link regex")
});

static YOUTUBE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v=([^&]+)").expect("youtube id regex"));

const IMAGE_EXTENSIONS: [&str; 7] = [".png", ".jpg", ".jpeg", ".gif", ".bmp", ".svg", ".webp"];

/// Result of rewriting a note's links
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutcome {
    /// Note text with every reference in normalized form
    pub content: String,

    /// Outgoing links in match order; index N describes the link carrying
    /// index N in the rewritten text
    pub internal_links: Vec<OutgoingLink>,

    /// Remote URL of the first embedded image, if any
    pub banner_image_url: Option<String>,
}

/// A link match waiting for async resolution
struct ScannedLink {
    span: Range<usize>,
    shape: LinkShape,
}

enum LinkShape {
    External {
        url: String,
        alias: String,
        source: &'static str,
    },
    Internal {
        target: String,
        alias: String,
    },
}

/// Rewrites note links against the vault, uploading embedded images
pub struct LinkRewriter {
    vault: Arc<dyn VaultReader>,
    uploader: Arc<dyn ImageUploader>,
    owner_id: String,
}

impl LinkRewriter {
    pub fn new(
        vault: Arc<dyn VaultReader>,
        uploader: Arc<dyn ImageUploader>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            vault,
            uploader,
            owner_id: owner_id.into(),
        }
    }

    /// Rewrite every reference in a note
    ///
    /// Embedded images go first so their replacement markdown is already in
    /// place when the link scan runs. Fails fast when an image upload is
    /// attempted without a valid credential.
    pub async fn rewrite(
        &self,
        note: &NoteFileMetadata,
        content: &str,
    ) -> QuillResult<RewriteOutcome> {
        let parent = note.parent_folder.as_deref().unwrap_or("/");
        let siblings = self.vault.sibling_listing(parent).await?;

        let (content, banner_image_url) = self.replace_embedded_images(note, content).await?;
        let (content, internal_links) = self.rewrite_references(&content, &siblings).await;

        Ok(RewriteOutcome {
            content,
            internal_links,
            banner_image_url,
        })
    }

    /// Upload embedded images and swap the embeds for markdown image syntax
    ///
    /// The first embedded image becomes the banner.
    async fn replace_embedded_images(
        &self,
        note: &NoteFileMetadata,
        content: &str,
    ) -> QuillResult<(String, Option<String>)> {
        let embeds = self.vault.embedded_image_refs(&note.path).await?;
        let mut content = content.to_string();
        let mut banner = None;

        for embed in embeds {
            let target = embed.link_target.to_lowercase();
            if !IMAGE_EXTENSIONS.iter().any(|ext| target.ends_with(ext)) {
                continue;
            }

            let path = self
                .vault
                .find_file(&embed.link_target)
                .await
                .map(|meta| meta.path)
                .unwrap_or_else(|| embed.link_target.clone());
            let bytes = self.vault.read_binary(&path).await?;
            let mime = mime_for(&embed.link_target);
            let remote_url = self.uploader.upload(bytes, &embed.link_target, &mime).await?;

            debug!(target = %embed.link_target, url = %remote_url, "uploaded embedded image");

            let replacement = format!("![{}]({})", embed.alt_text, remote_url);
            content = content.replacen(&embed.original_markdown, &replacement, 1);

            if banner.is_none() {
                banner = Some(remote_url);
            }
        }

        Ok((content, banner))
    }

    /// Scan and rewrite cross-note and external references
    async fn rewrite_references(
        &self,
        content: &str,
        siblings: &SiblingListing,
    ) -> (String, Vec<OutgoingLink>) {
        let masked = code_regions(content);
        let mut scanned = Vec::new();

        for captures in LINK_RE.captures_iter(content) {
            let whole = captures.get(0).map_or(0..0, |m| m.range());
            if masked
                .iter()
                .any(|region| region.contains(&whole.start))
            {
                continue;
            }

            let matched = &content[whole.clone()];
            let shape = if matched.contains("wikipedia.org") || matched.contains("youtube.com") {
                let url = captures
                    .get(2)
                    .or_else(|| captures.get(4))
                    .map_or("", |m| m.as_str())
                    .to_string();
                let alias = captures
                    .get(1)
                    .or_else(|| captures.get(3))
                    .map(|m| m.as_str().to_string())
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| url.clone());
                let source = if matched.contains("wikipedia.org") {
                    "wikipedia"
                } else {
                    "youtube"
                };
                LinkShape::External { url, alias, source }
            } else {
                let inner = captures.get(3).map_or("", |m| m.as_str());
                if is_rewritten(inner) {
                    continue;
                }
                let (target, alias) = match inner.split_once('|') {
                    Some((target, alias)) => (target.to_string(), alias.to_string()),
                    None => (inner.to_string(), inner.to_string()),
                };
                LinkShape::Internal { target, alias }
            };

            scanned.push(ScannedLink { span: whole, shape });
        }

        let mut links: Vec<OutgoingLink> = Vec::new();
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();

        for link in scanned {
            let (title, alias, source) = match link.shape {
                LinkShape::External { url, alias, source } => {
                    let title = match source {
                        "wikipedia" => wikipedia_title(&url),
                        _ => youtube_title(&url),
                    };
                    (title, alias, source)
                }
                LinkShape::Internal { target, alias } => {
                    let ctime = self.resolve_ctime(&target, siblings).await;
                    let object_id = slug::from_ctime(&self.owner_id, ctime);
                    (object_id, alias, "obsidian")
                }
            };

            let index = links.len();
            links.push(OutgoingLink::unresolved(title.as_str()));
            edits.push((
                link.span,
                format!("[[{title}|{alias}|{index}|{source}]]"),
            ));
        }

        (apply_edits(content, edits), links)
    }

    /// Creation time of a linked note, via the sibling listing or a
    /// vault-wide lookup
    ///
    /// An unresolvable target keeps its link with a zero timestamp; the
    /// note itself still syncs.
    async fn resolve_ctime(&self, target: &str, siblings: &SiblingListing) -> i64 {
        let file_name = format!("{target}.md");

        if let Some(entry) = siblings.get(&file_name) {
            return entry.stat.ctime;
        }
        if let Some(meta) = self.vault.find_file(target).await {
            return meta.ctime;
        }
        if let Some(meta) = self.vault.find_file(&file_name).await {
            return meta.ctime;
        }

        warn!(target, "link target not found in vault");
        0
    }
}

/// Check whether a wikilink body is already in normalized form
fn is_rewritten(inner: &str) -> bool {
    let parts: Vec<&str> = inner.split('|').collect();
    parts.len() == 4 && parts[2].parse::<usize>().is_ok()
}

fn mime_for(path: &str) -> String {
    let extension = path.rsplit('.').next().unwrap_or("png");
    format!("image/{extension}")
}

/// Wikipedia title is the last path segment
fn wikipedia_title(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// YouTube title is the `v=` query value, truncated at the next `&`
fn youtube_title(url: &str) -> String {
    YOUTUBE_ID_RE
        .captures(url)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Byte ranges covered by fenced code blocks or inline code spans
///
/// Matches starting inside these ranges are left untouched.
fn code_regions(content: &str) -> Vec<Range<usize>> {
    let mut regions = Vec::new();
    let mut fence_open: Option<(usize, &str)> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let fence = ["```", "~~~"].iter().find(|m| trimmed.starts_with(**m));

        match (fence, fence_open) {
            (Some(marker), None) => fence_open = Some((offset, marker)),
            (Some(marker), Some((start, open))) if *marker == open => {
                regions.push(start..offset + line.len());
                fence_open = None;
            }
            (_, Some(_)) => {}
            (None, None) => {
                // Inline code spans on this line
                let mut span_start: Option<usize> = None;
                for (pos, c) in line.char_indices() {
                    if c == '`' {
                        match span_start.take() {
                            Some(start) => regions.push(offset + start..offset + pos + 1),
                            None => span_start = Some(pos),
                        }
                    }
                }
            }
        }
        offset += line.len();
    }

    // Unclosed fence runs to end of input
    if let Some((start, _)) = fence_open {
        regions.push(start..content.len());
    }

    regions
}

/// Splice replacements into content in one forward pass
///
/// Edits must be non-overlapping and ordered by span start, which the
/// left-to-right scan guarantees.
fn apply_edits(content: &str, edits: Vec<(Range<usize>, String)>) -> String {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    for (span, replacement) in edits {
        out.push_str(&content[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&content[cursor..]);

    out
}
