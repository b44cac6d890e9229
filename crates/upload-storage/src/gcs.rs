use crate::object::{delete_error, put_stream, put_with_type};
use crate::traits::{StorageError, StorageResult, UploadAdapter, WriteMetadata};
use async_trait::async_trait;
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path;
use object_store::{ObjectStoreExt, Result as ObjectResult};
use serde_json::json;
use std::sync::Arc;
use upload_core::{ContentReader, DeleteError, FileDescriptor, GcsSettings, UploadSettings};

const GCS_PUBLIC_HOST: &str = "https://storage.googleapis.com";

/// Google Cloud Storage adapter, authenticated with a service account.
#[derive(Clone)]
pub struct GcsAdapter {
    store: GoogleCloudStorage,
    bucket: String,
    base_url: String,
}

impl GcsAdapter {
    pub fn from_settings(settings: &UploadSettings) -> StorageResult<Self> {
        let gcs = &settings.gcs;
        let bucket = gcs
            .bucket
            .clone()
            .ok_or_else(|| StorageError::ConfigError("gcsBucketName not configured".to_string()))?;

        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(bucket.clone())
            .with_service_account_key(service_account_key(gcs)?)
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(GcsAdapter {
            base_url: public_base_url(settings.cdn_url.as_deref(), gcs, &bucket),
            store,
            bucket,
        })
    }
}

/// Service account JSON assembled from the individual `gcs*` settings.
fn service_account_key(gcs: &GcsSettings) -> StorageResult<String> {
    let private_key = gcs
        .private_key
        .as_deref()
        .ok_or_else(|| StorageError::ConfigError("gcsPrivateKey not configured".to_string()))?
        // admin forms store the PEM with escaped newlines
        .replace("\\n", "\n");
    let client_email = gcs
        .client_email
        .as_deref()
        .ok_or_else(|| StorageError::ConfigError("gcsClientEmail not configured".to_string()))?;

    Ok(json!({
        "type": "service_account",
        "project_id": gcs.project_id,
        "private_key_id": gcs.private_key_id.as_deref().unwrap_or_default(),
        "private_key": private_key,
        "client_email": client_email,
        "client_id": gcs.client_id,
        "auth_uri": gcs.auth_uri,
        "token_uri": gcs.token_uri,
        "auth_provider_x509_cert_url": gcs.auth_provider_x509_cert_url,
        "client_x509_cert_url": gcs.client_x509_cert_url,
    })
    .to_string())
}

/// The upload prefix is independent of the bucket so a CDN can front it.
pub fn public_base_url(cdn_url: Option<&str>, gcs: &GcsSettings, bucket: &str) -> String {
    match gcs.upload_prefix.as_deref().or(cdn_url) {
        Some(prefix) => prefix.trim_end_matches('/').to_string(),
        None => format!("{}/{}", GCS_PUBLIC_HOST, bucket),
    }
}

#[async_trait]
impl UploadAdapter for GcsAdapter {
    fn name(&self) -> &'static str {
        "gcs"
    }

    fn supports_streams(&self) -> bool {
        true
    }

    async fn write(
        &self,
        file: &FileDescriptor,
        data: Vec<u8>,
        mime_type: &str,
    ) -> StorageResult<WriteMetadata> {
        let size = data.len() as u64;
        let location = Path::from(file.path.as_str());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = put_with_type(&self.store, &location, data, mime_type).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %file.path,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "GCS upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %file.path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "GCS upload successful"
        );

        Ok(WriteMetadata::with_size(size))
    }

    async fn write_stream(
        &self,
        file: &FileDescriptor,
        reader: ContentReader,
        _content_length: Option<u64>,
        mime_type: &str,
    ) -> StorageResult<WriteMetadata> {
        let start = std::time::Instant::now();
        let store: Arc<dyn object_store::ObjectStore> = Arc::new(self.store.clone());

        let size = put_stream(store, Path::from(file.path.as_str()), reader, mime_type)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %file.path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "GCS stream upload failed"
                );
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %file.path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "GCS stream upload successful"
        );

        Ok(WriteMetadata::with_size(size))
    }

    fn url_for(&self, file: &FileDescriptor) -> String {
        format!("{}/{}", self.base_url, file.path)
    }

    async fn delete(&self, file: &FileDescriptor) -> Result<(), DeleteError> {
        let location = Path::from(file.path.as_str());

        let result: ObjectResult<_> = self.store.delete(&location).await;
        result.map_err(|e| delete_error(&file.path, e))?;

        tracing::info!(bucket = %self.bucket, key = %file.path, "GCS delete successful");
        Ok(())
    }
}
