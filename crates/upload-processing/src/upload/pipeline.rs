//! Upload pipeline: validate → process → route → store.
//!
//! [`UploadPipeline::upload`] is the single entry point for storing a file.
//! Processor stages run first and may rewrite the content and MIME type; the
//! (possibly rewritten) MIME type then picks the adapter through the routing
//! table of the settings snapshot. The returned descriptor carries everything
//! a caller needs to serve and later delete the file.

use chrono::Utc;
use std::sync::Arc;

use upload_core::{
    DeleteError, FileDescriptor, UploadContent, UploadError, UploadSettings,
};
use upload_storage::{generate_path, AdapterFactory, AdapterRegistry, UploadAdapter};

use super::chain::ProcessorChain;
use super::traits::UploadProcessor;

/// Builder for [`UploadPipeline`].
#[derive(Debug, Default)]
pub struct UploadPipelineBuilder {
    adapters: AdapterRegistry,
    chain: ProcessorChain,
}

impl UploadPipelineBuilder {
    /// Empty builder: no adapters, no processors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in adapters and, with the `image` feature, the image processor.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut builder = Self {
            adapters: AdapterRegistry::with_defaults(),
            chain: ProcessorChain::new(),
        };

        #[cfg(feature = "image")]
        {
            builder = builder.register_processor(Arc::new(crate::ImageProcessor::new()));
        }

        builder
    }

    /// Register (or replace) the adapter factory used for `key` in routing rules.
    pub fn register_adapter<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: AdapterFactory + 'static,
    {
        self.adapters.register(key, factory);
        self
    }

    /// Append a processor stage. Stages run in registration order.
    pub fn register_processor(mut self, stage: Arc<dyn UploadProcessor>) -> Self {
        self.chain.push(stage);
        self
    }

    pub fn build(self) -> UploadPipeline {
        tracing::debug!(
            adapters = ?self.adapters.keys(),
            processors = ?self.chain.names(),
            "Upload pipeline built"
        );
        UploadPipeline {
            adapters: Arc::new(self.adapters),
            chain: Arc::new(self.chain),
        }
    }
}

/// Upload and delete entry points. Cheap to clone and share across requests.
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    adapters: Arc<AdapterRegistry>,
    chain: Arc<ProcessorChain>,
}

impl UploadPipeline {
    pub fn builder() -> UploadPipelineBuilder {
        UploadPipelineBuilder::new()
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn processors(&self) -> &ProcessorChain {
        &self.chain
    }

    /// Process, route and store one upload.
    ///
    /// On error nothing has been written and the descriptor must be discarded.
    #[tracing::instrument(skip_all, fields(base_name = %file.base_name))]
    pub async fn upload(
        &self,
        mut file: FileDescriptor,
        mut content: UploadContent,
        mime_type: &str,
        settings: &UploadSettings,
    ) -> Result<FileDescriptor, UploadError> {
        let start = std::time::Instant::now();

        let size = content.len().await.map_err(read_error)?;
        if size == 0 {
            return Err(UploadError::EmptyFile);
        }
        let max = settings.max_file_size_bytes();
        if size > max {
            return Err(UploadError::FileTooLarge { size, max });
        }

        let mut mime_type = normalize_mime(mime_type);
        tracing::debug!(
            mime_type = %mime_type,
            size_bytes = size,
            tag = ?file.tag,
            "File will be uploaded"
        );

        self.chain
            .run(&file, &mut content, &mut mime_type, settings)
            .await?;
        let mime_type = normalize_mime(&mime_type);

        let route = settings.routing.resolve(&mime_type)?;
        let adapter = self.adapters.create(&route.adapter, settings)?;
        if !adapter.accepts_mime(&mime_type) {
            tracing::debug!(
                adapter = %route.adapter,
                mime_type = %mime_type,
                "Adapter refuses mime type"
            );
            return Err(UploadError::NoAdapterForMime(mime_type));
        }

        file.path = generate_path(
            Utc::now(),
            &file.base_name,
            adapter.path_separator(),
            &mime_type,
            &settings.encode,
        );

        let stored_size = content.len().await.map_err(read_error)?;
        let metadata = write_content(adapter.as_ref(), &file, content, stored_size, &mime_type)
            .await
            .map_err(|e| {
                tracing::error!(
                    adapter = %route.adapter,
                    key = %file.path,
                    error = %e,
                    "Storage write failed"
                );
                UploadError::StorageWriteFailed(e.to_string())
            })?;

        if let Some(path) = metadata.path {
            file.path = path;
        }
        let url = metadata.url.unwrap_or_else(|| adapter.url_for(&file));

        file.url = Some(url);
        file.adapter = Some(route.adapter.clone());
        file.template = Some(route.template.clone());
        file.mime_type = Some(mime_type);
        file.size = Some(metadata.size.unwrap_or(stored_size));

        tracing::info!(
            adapter = %route.adapter,
            key = %file.path,
            size_bytes = file.size.unwrap_or_default(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File uploaded"
        );

        Ok(file)
    }

    /// Remove a stored file through the adapter that wrote it.
    ///
    /// A file that is already gone counts as deleted.
    #[tracing::instrument(skip_all, fields(key = %file.path, adapter = %adapter_key))]
    pub async fn delete(
        &self,
        file: &FileDescriptor,
        adapter_key: &str,
        settings: &UploadSettings,
    ) -> Result<(), DeleteError> {
        let adapter = self
            .adapters
            .create(adapter_key, settings)
            .map_err(|e| DeleteError::Configuration(e.to_string()))?;

        match adapter.delete(file).await {
            Ok(()) => Ok(()),
            Err(DeleteError::NotFound(_)) => {
                tracing::debug!("File already absent, treating delete as done");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "File delete failed");
                Err(e)
            }
        }
    }
}

async fn write_content(
    adapter: &dyn UploadAdapter,
    file: &FileDescriptor,
    content: UploadContent,
    size: u64,
    mime_type: &str,
) -> upload_storage::StorageResult<upload_storage::WriteMetadata> {
    if adapter.supports_streams() && content.is_file_backed() {
        let reader = content.reader().await?;
        // The temp file must outlive the streamed write.
        let result = adapter
            .write_stream(file, reader, Some(size), mime_type)
            .await;
        drop(content);
        result
    } else {
        let data = content.into_bytes().await?;
        adapter.write(file, data, mime_type).await
    }
}

fn normalize_mime(mime_type: &str) -> String {
    mime_type.trim().to_ascii_lowercase()
}

fn read_error(e: std::io::Error) -> UploadError {
    UploadError::ProcessingFailed(format!("Failed to read upload content: {}", e))
}
