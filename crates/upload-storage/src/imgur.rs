use crate::traits::{StorageError, StorageResult, UploadAdapter, WriteMetadata};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use upload_core::{ContentReader, DeleteError, FileDescriptor, UploadSettings};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Anonymous image hosting through the Imgur API.
///
/// Imgur assigns its own identifier and link, which replace the generated path
/// and URL. Anonymous uploads cannot be deleted without their delete hash.
#[derive(Clone)]
pub struct ImgurAdapter {
    client: Client,
    client_id: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct ImgurResponse {
    data: ImgurImage,
}

#[derive(Debug, Deserialize)]
struct ImgurImage {
    id: String,
    link: String,
    #[serde(default)]
    size: Option<u64>,
}

impl ImgurAdapter {
    pub fn from_settings(settings: &UploadSettings) -> StorageResult<Self> {
        let client_id = settings
            .imgur
            .client_id
            .clone()
            .ok_or_else(|| StorageError::ConfigError("imgurClientId not configured".to_string()))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ImgurAdapter {
            client,
            client_id,
            api_url: settings.imgur.api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_image(&self, file: &FileDescriptor, part: Part) -> StorageResult<WriteMetadata> {
        let start = std::time::Instant::now();
        let form = Form::new()
            .text("type", "file")
            .part("image", part.file_name(file.base_name.clone()));

        let response = self
            .client
            .post(format!("{}/image", self.api_url))
            .header("Authorization", format!("Client-ID {}", self.client_id))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Imgur request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                status = %status,
                base_name = %file.base_name,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Imgur upload failed"
            );
            return Err(StorageError::UploadFailed(format!(
                "Imgur upload failed with status {}: {}",
                status, error_text
            )));
        }

        let body: ImgurResponse = response
            .json()
            .await
            .map_err(|e| StorageError::BackendError(format!("Invalid Imgur response: {}", e)))?;

        tracing::info!(
            id = %body.data.id,
            link = %body.data.link,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Imgur upload successful"
        );

        Ok(WriteMetadata {
            path: Some(body.data.id),
            url: Some(body.data.link),
            size: body.data.size,
        })
    }
}

#[async_trait]
impl UploadAdapter for ImgurAdapter {
    fn name(&self) -> &'static str {
        "imgur"
    }

    fn supports_streams(&self) -> bool {
        true
    }

    fn accepts_mime(&self, mime_type: &str) -> bool {
        mime_type.starts_with("image/")
    }

    async fn write(
        &self,
        file: &FileDescriptor,
        data: Vec<u8>,
        mime_type: &str,
    ) -> StorageResult<WriteMetadata> {
        let part = Part::bytes(data)
            .mime_str(mime_type)
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        self.post_image(file, part).await
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
        self.post_image(file, part).await
    }

    fn url_for(&self, file: &FileDescriptor) -> String {
        file.url
            .clone()
            .unwrap_or_else(|| format!("https://i.imgur.com/{}", file.path))
    }

    async fn delete(&self, file: &FileDescriptor) -> Result<(), DeleteError> {
        Err(DeleteError::Forbidden(format!(
            "Imgur image '{}' was uploaded anonymously and cannot be deleted",
            file.path
        )))
    }
}

#[cfg(all(test, feature = "storage-imgur"))]
mod tests {
    use super::*;
    use mockito::Matcher;
    use upload_core::{MapSettings, StaticPaths};

    fn adapter(api_url: &str) -> ImgurAdapter {
        let store = MapSettings::new()
            .with("imgurClientId", "abc123")
            .with("imgurApiUrl", api_url);
        let settings =
            UploadSettings::load(&store, &StaticPaths::new("/tmp/files", "/tmp/assets")).unwrap();
        ImgurAdapter::from_settings(&settings).unwrap()
    }

    #[tokio::test]
    async fn test_write_uses_remote_identifier_and_link() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/image")
            .match_header("authorization", "Client-ID abc123")
            .match_header("content-type", Matcher::Regex("^multipart/form-data".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":{"id":"Xk3p9aZ","link":"https://i.imgur.com/Xk3p9aZ.png","size":68},"success":true,"status":200}"#,
            )
            .create_async()
            .await;

        let adapter = adapter(&server.url());
        let file = FileDescriptor::stored("2024-01-01/1704067200-5-cat.png");
        let meta = adapter
            .write(&file, vec![0u8; 68], "image/png")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(meta.path.as_deref(), Some("Xk3p9aZ"));
        assert_eq!(meta.url.as_deref(), Some("https://i.imgur.com/Xk3p9aZ.png"));
        assert_eq!(meta.size, Some(68));
    }

    #[tokio::test]
    async fn test_remote_error_is_upload_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/image")
            .with_status(429)
            .with_body(r#"{"data":{"error":"rate limited"},"success":false}"#)
            .create_async()
            .await;

        let adapter = adapter(&server.url());
        let result = adapter
            .write(&FileDescriptor::stored("a.png"), vec![1, 2, 3], "image/png")
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(msg)) if msg.contains("429")));
    }

    #[tokio::test]
    async fn test_delete_is_forbidden() {
        let adapter = adapter("http://127.0.0.1:1");
        let result = adapter.delete(&FileDescriptor::stored("Xk3p9aZ")).await;
        assert!(matches!(result, Err(DeleteError::Forbidden(_))));
    }

    #[test]
    fn test_only_images_are_accepted() {
        let adapter = adapter("http://127.0.0.1:1");
        assert!(adapter.accepts_mime("image/gif"));
        assert!(!adapter.accepts_mime("application/pdf"));
    }

    #[test]
    fn test_missing_client_id_is_config_error() {
        let settings =
            UploadSettings::load(&MapSettings::new(), &StaticPaths::new("/tmp", "/tmp")).unwrap();
        assert!(matches!(
            ImgurAdapter::from_settings(&settings),
            Err(StorageError::ConfigError(_))
        ));
    }
}
