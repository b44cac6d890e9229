//! Adapter abstraction trait
//!
//! Every storage backend an upload can be routed to implements [`UploadAdapter`].
//! Adapters are built per call from an [`UploadSettings`] snapshot, so they hold
//! no state that outlives the request besides their client handles.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use upload_core::{ContentReader, DeleteError, FileDescriptor, UploadError};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConfigError(msg) => UploadError::Configuration(msg),
            other => UploadError::StorageWriteFailed(other.to_string()),
        }
    }
}

/// What a backend reports back after a successful write.
///
/// `path` and `url` are set only when the backend chose them itself (remote
/// APIs that assign their own identifiers); otherwise the generated path is
/// kept and the URL comes from [`UploadAdapter::url_for`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteMetadata {
    pub path: Option<String>,
    pub url: Option<String>,
    pub size: Option<u64>,
}

impl WriteMetadata {
    pub fn with_size(size: u64) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }
}

/// Upload adapter trait
///
/// `file.path` is always set by the caller before `write`/`write_stream` is
/// invoked, using [`path_separator`](UploadAdapter::path_separator) between the
/// date directory and the file name.
#[async_trait]
pub trait UploadAdapter: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Separator between the date directory and the file name in generated paths.
    fn path_separator(&self) -> char {
        '/'
    }

    /// Whether `write_stream` avoids buffering the whole payload.
    fn supports_streams(&self) -> bool {
        false
    }

    /// Backends may refuse content they cannot host.
    fn accepts_mime(&self, _mime_type: &str) -> bool {
        true
    }

    /// Store `data` under `file.path`.
    async fn write(
        &self,
        file: &FileDescriptor,
        data: Vec<u8>,
        mime_type: &str,
    ) -> StorageResult<WriteMetadata>;

    /// Store the content of `reader` under `file.path`. The reader is consumed until EOF.
    ///
    /// The default buffers the reader and delegates to [`write`](UploadAdapter::write).
    async fn write_stream(
        &self,
        file: &FileDescriptor,
        mut reader: ContentReader,
        _content_length: Option<u64>,
        mime_type: &str,
    ) -> StorageResult<WriteMetadata> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        self.write(file, buffer, mime_type).await
    }

    /// Public URL for a stored file. Pure: no I/O.
    fn url_for(&self, file: &FileDescriptor) -> String;

    /// Remove a stored file. A missing file is reported as [`DeleteError::NotFound`].
    async fn delete(&self, file: &FileDescriptor) -> Result<(), DeleteError>;
}
