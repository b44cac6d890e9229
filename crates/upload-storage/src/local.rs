use crate::traits::{StorageError, StorageResult, UploadAdapter, WriteMetadata};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use upload_core::constants::DEFAULT_LOCAL_URL;
use upload_core::{ContentReader, DeleteError, FileDescriptor, UploadSettings};

/// Local filesystem adapter
#[derive(Clone)]
pub struct LocalAdapter {
    base_path: PathBuf,
    base_url: String,
}

impl LocalAdapter {
    /// Create a new LocalAdapter instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/srv/forum/public/assets/files")
    /// * `base_url` - Base URL for serving files (e.g., "https://cdn.example.com")
    ///
    /// Directories are created on first write, not here.
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        LocalAdapter {
            base_path: base_path.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &UploadSettings) -> StorageResult<Self> {
        let base_url = settings
            .cdn_url
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_URL.to_string());
        Ok(Self::new(settings.storage_root.clone(), base_url))
    }

    /// Convert a stored path to a filesystem path under the storage root.
    ///
    /// Only plain relative components are accepted, so no path can resolve
    /// outside `base_path`.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(storage_key);
        if storage_key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(format!(
                "'{}' is not a relative path inside the storage root",
                storage_key
            )));
        }

        Ok(self.base_path.join(relative))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn create_file(&self, path: &Path) -> StorageResult<fs::File> {
        self.ensure_parent_dir(path).await?;
        fs::File::create(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl UploadAdapter for LocalAdapter {
    fn name(&self) -> &'static str {
        "local"
    }

    fn path_separator(&self) -> char {
        MAIN_SEPARATOR
    }

    fn supports_streams(&self) -> bool {
        true
    }

    async fn write(
        &self,
        file: &FileDescriptor,
        data: Vec<u8>,
        _mime_type: &str,
    ) -> StorageResult<WriteMetadata> {
        let path = self.key_to_path(&file.path)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let mut handle = self.create_file(&path).await?;

        handle.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        handle.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %file.path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(WriteMetadata::with_size(size))
    }

    async fn write_stream(
        &self,
        file: &FileDescriptor,
        mut reader: ContentReader,
        _content_length: Option<u64>,
        _mime_type: &str,
    ) -> StorageResult<WriteMetadata> {
        let path = self.key_to_path(&file.path)?;
        let start = std::time::Instant::now();

        let mut handle = self.create_file(&path).await?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut handle)
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write stream to file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        handle.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %file.path,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream write successful"
        );

        Ok(WriteMetadata::with_size(bytes_copied))
    }

    fn url_for(&self, file: &FileDescriptor) -> String {
        format!(
            "{}/{}",
            self.base_url,
            file.path.replace(MAIN_SEPARATOR, "/")
        )
    }

    async fn delete(&self, file: &FileDescriptor) -> Result<(), DeleteError> {
        let path = self
            .key_to_path(&file.path)
            .map_err(|e| DeleteError::Forbidden(e.to_string()))?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DeleteError::NotFound(file.path.clone()));
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(DeleteError::Forbidden(format!(
                    "{}: {}",
                    path.display(),
                    e
                )));
            }
            Err(e) => {
                return Err(DeleteError::TransportFailure(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        tracing::info!(
            path = %path.display(),
            key = %file.path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }
}
