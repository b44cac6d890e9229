use crate::traits::{StorageError, StorageResult, UploadAdapter, WriteMetadata};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use serde_json::json;
use sha1::Sha1;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use upload_core::{ContentReader, DeleteError, FileDescriptor, UploadSettings};

type HmacSha1 = Hmac<Sha1>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Lifetime of an upload token, in seconds.
const TOKEN_TTL_SECS: i64 = 3600;
/// Qiniu's "no such file or directory" status.
const STATUS_NO_SUCH_ENTRY: u16 = 612;

/// Qiniu Kodo object storage.
#[derive(Clone)]
pub struct QiniuAdapter {
    client: Client,
    access_key: String,
    secret_key: String,
    bucket: String,
    base_url: String,
    upload_url: String,
    manage_url: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    key: String,
}

impl QiniuAdapter {
    pub fn from_settings(settings: &UploadSettings) -> StorageResult<Self> {
        let qiniu = &settings.qiniu;
        let required = |value: &Option<String>, key: &str| {
            value
                .clone()
                .ok_or_else(|| StorageError::ConfigError(format!("{} not configured", key)))
        };

        let base_url = qiniu
            .domain
            .clone()
            .or_else(|| settings.cdn_url.clone())
            .ok_or_else(|| StorageError::ConfigError("qiniuDomain not configured".to_string()))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(QiniuAdapter {
            client,
            access_key: required(&qiniu.key, "qiniuKey")?,
            secret_key: required(&qiniu.secret, "qiniuSecret")?,
            bucket: required(&qiniu.bucket, "qiniuBucket")?,
            base_url: with_scheme(base_url.trim_end_matches('/')),
            upload_url: qiniu.upload_url.trim_end_matches('/').to_string(),
            manage_url: qiniu.manage_url.trim_end_matches('/').to_string(),
        })
    }

    fn sign(&self, data: &[u8]) -> StorageResult<String> {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| StorageError::ConfigError(format!("Invalid qiniuSecret: {}", e)))?;
        mac.update(data);
        Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
    }

    /// Upload token scoped to a single key: `ak:sign(policy):policy`.
    pub fn upload_token(&self, key: &str, now: i64) -> StorageResult<String> {
        let policy = json!({
            "scope": format!("{}:{}", self.bucket, key),
            "deadline": now + TOKEN_TTL_SECS,
        });
        let encoded_policy = URL_SAFE.encode(policy.to_string());
        let signature = self.sign(encoded_policy.as_bytes())?;
        Ok(format!("{}:{}:{}", self.access_key, signature, encoded_policy))
    }

    /// `QBox` management credential for a request path without query string or body.
    fn management_token(&self, request_path: &str) -> StorageResult<String> {
        let signature = self.sign(format!("{}\n", request_path).as_bytes())?;
        Ok(format!("QBox {}:{}", self.access_key, signature))
    }

    async fn put(&self, file: &FileDescriptor, part: Part) -> StorageResult<WriteMetadata> {
        let start = std::time::Instant::now();
        let token = self.upload_token(&file.path, chrono::Utc::now().timestamp())?;

        let form = Form::new()
            .text("token", token)
            .text("key", file.path.clone())
            .part("file", part.file_name(file.base_name.clone()));

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Qiniu request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                status = %status,
                bucket = %self.bucket,
                key = %file.path,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Qiniu upload failed"
            );
            return Err(StorageError::UploadFailed(format!(
                "Qiniu upload failed with status {}: {}",
                status, error_text
            )));
        }

        let body: PutResponse = response
            .json()
            .await
            .map_err(|e| StorageError::BackendError(format!("Invalid Qiniu response: {}", e)))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %body.key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Qiniu upload successful"
        );

        Ok(WriteMetadata {
            path: Some(body.key),
            url: None,
            size: None,
        })
    }
}

fn with_scheme(domain: &str) -> String {
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    }
}

#[async_trait]
impl UploadAdapter for QiniuAdapter {
    fn name(&self) -> &'static str {
        "qiniu"
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
        let part = Part::bytes(data)
            .mime_str(mime_type)
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let mut meta = self.put(file, part).await?;
        meta.size = Some(size);
        Ok(meta)
    }

    async fn write_stream(
        &self,
        file: &FileDescriptor,
        reader: ContentReader,
        content_length: Option<u64>,
        mime_type: &str,
    ) -> StorageResult<WriteMetadata> {
        let body = Body::wrap_stream(ReaderStream::new(reader));
        let part = match content_length {
            Some(len) => Part::stream_with_length(body, len),
            None => Part::stream(body),
        };
        let part = part
            .mime_str(mime_type)
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let mut meta = self.put(file, part).await?;
        meta.size = content_length;
        Ok(meta)
    }

    fn url_for(&self, file: &FileDescriptor) -> String {
        format!("{}/{}", self.base_url, file.path)
    }

    async fn delete(&self, file: &FileDescriptor) -> Result<(), DeleteError> {
        let entry = URL_SAFE.encode(format!("{}:{}", self.bucket, file.path));
        let request_path = format!("/delete/{}", entry);
        let authorization = self
            .management_token(&request_path)
            .map_err(|e| DeleteError::Configuration(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}{}", self.manage_url, request_path))
            .header("Authorization", authorization)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|e| DeleteError::TransportFailure(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {
                tracing::info!(bucket = %self.bucket, key = %file.path, "Qiniu delete successful");
                Ok(())
            }
            STATUS_NO_SUCH_ENTRY => Err(DeleteError::NotFound(file.path.clone())),
            401 | 403 => Err(DeleteError::Forbidden(format!(
                "Qiniu refused to delete '{}' ({})",
                file.path, status
            ))),
            _ => {
                let error_text = response.text().await.unwrap_or_default();
                Err(DeleteError::TransportFailure(format!(
                    "Qiniu delete failed with status {}: {}",
                    status, error_text
                )))
            }
        }
    }
}
