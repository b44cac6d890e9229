//! File descriptor: identity and location of a single upload.

use serde::{Deserialize, Serialize};

/// Identity, storage key and public URL of one uploaded file.
///
/// Created by the caller with a base name (and optionally a tag), then filled
/// in by the upload pipeline. `path` is assigned before the adapter write and
/// `url` only after the write succeeded, so a descriptor with a URL always has
/// a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Client-supplied file name. Untrusted.
    pub base_name: String,
    /// Server-side storage key, empty until assigned by the pipeline.
    pub path: String,
    /// Public URL, set once the adapter write succeeded.
    pub url: Option<String>,
    /// Logical grouping supplied by the caller (e.g. "avatar", "watermark").
    pub tag: Option<String>,
    /// Adapter key that stored the file. Needed later for deletion.
    pub adapter: Option<String>,
    /// Display template key from the routing table.
    pub template: Option<String>,
    /// Final MIME type after processing.
    pub mime_type: Option<String>,
    /// Stored size in bytes.
    pub size: Option<u64>,
}

impl FileDescriptor {
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// A descriptor pointing at an already stored file, as rebuilt by a caller
    /// before deleting it.
    pub fn stored(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_deref() == Some(tag)
    }

    /// True once the pipeline completed: path assigned and URL generated.
    pub fn is_complete(&self) -> bool {
        !self.path.is_empty() && self.url.is_some()
    }
}
