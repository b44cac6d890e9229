use crate::object::{delete_error, put_stream, put_with_type};
use crate::traits::{StorageError, StorageResult, UploadAdapter, WriteMetadata};
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{ClientOptions, ObjectStoreExt, Result as ObjectResult};
use std::sync::Arc;
use upload_core::{ContentReader, DeleteError, FileDescriptor, S3Settings, UploadSettings};

/// S3 adapter, also used for S3-compatible providers (MinIO, DigitalOcean Spaces, ...)
#[derive(Clone)]
pub struct S3Adapter {
    store: AmazonS3,
    bucket: String,
    base_url: String,
}

impl S3Adapter {
    /// Build the adapter from the `awsS3*` settings.
    ///
    /// Key, secret and bucket are required. With a custom endpoint, path-style
    /// addressing puts the bucket in the path (`{endpoint}/{bucket}/{key}`),
    /// otherwise the bucket becomes a subdomain of the endpoint host.
    pub fn from_settings(settings: &UploadSettings) -> StorageResult<Self> {
        let s3 = &settings.s3;
        let key = required(&s3.key, "awsS3Key")?;
        let secret = required(&s3.secret, "awsS3Secret")?;
        let bucket = required(&s3.bucket, "awsS3Bucket")?;

        let mut builder = AmazonS3Builder::new()
            .with_access_key_id(key)
            .with_secret_access_key(secret)
            .with_region(s3.region.clone())
            .with_bucket_name(bucket.clone())
            .with_virtual_hosted_style_request(!s3.use_path_style);

        if let Some(ref endpoint) = s3.endpoint {
            let allow_http = endpoint.starts_with("http://");
            let endpoint = if s3.use_path_style {
                endpoint.trim_end_matches('/').to_string()
            } else {
                virtual_hosted_endpoint(endpoint, &bucket)
            };
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        if let Some(ref acl) = s3.acl {
            let value = HeaderValue::from_str(acl).map_err(|e| {
                StorageError::ConfigError(format!("Invalid awsS3ACL '{}': {}", acl, e))
            })?;
            let mut headers = HeaderMap::new();
            headers.insert(HeaderName::from_static("x-amz-acl"), value);
            builder = builder.with_client_options(ClientOptions::new().with_default_headers(headers));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let base_url = public_base_url(settings.cdn_url.as_deref(), s3, &bucket);

        Ok(S3Adapter {
            store,
            bucket,
            base_url,
        })
    }
}

fn required(value: &Option<String>, key: &str) -> StorageResult<String> {
    value
        .clone()
        .ok_or_else(|| StorageError::ConfigError(format!("{} not configured", key)))
}

/// Insert the bucket as a subdomain of the endpoint host.
fn virtual_hosted_endpoint(endpoint: &str, bucket: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    match endpoint.split_once("://") {
        Some((scheme, host)) => format!("{}://{}.{}", scheme, bucket, host),
        None => format!("https://{}.{}", bucket, endpoint),
    }
}

/// Public URL prefix for objects in the bucket.
///
/// A configured CDN wins; otherwise the URL follows the addressing style the
/// adapter writes with.
pub fn public_base_url(cdn_url: Option<&str>, s3: &S3Settings, bucket: &str) -> String {
    if let Some(cdn) = cdn_url {
        return cdn.trim_end_matches('/').to_string();
    }

    match (&s3.endpoint, s3.use_path_style) {
        (Some(endpoint), true) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        (Some(endpoint), false) => virtual_hosted_endpoint(endpoint, bucket),
        (None, true) => format!("https://s3.{}.amazonaws.com/{}", s3.region, bucket),
        (None, false) => format!("https://{}.s3.{}.amazonaws.com", bucket, s3.region),
    }
}

#[async_trait]
impl UploadAdapter for S3Adapter {
    fn name(&self) -> &'static str {
        "aws-s3"
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
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %file.path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
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
        let location = Path::from(file.path.as_str());

        let size = put_stream(store, location, reader, mime_type)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %file.path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream upload failed"
                );
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %file.path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stream upload successful"
        );

        Ok(WriteMetadata::with_size(size))
    }

    fn url_for(&self, file: &FileDescriptor) -> String {
        format!("{}/{}", self.base_url, file.path)
    }

    async fn delete(&self, file: &FileDescriptor) -> Result<(), DeleteError> {
        let start = std::time::Instant::now();
        let location = Path::from(file.path.as_str());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %file.path,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            delete_error(&file.path, e)
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %file.path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }
}
