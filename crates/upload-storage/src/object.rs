//! Helpers shared by the object_store backed adapters.

use bytes::Bytes;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, Error as ObjectStoreError, ObjectStore, PutOptions,
    PutPayload,
};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use upload_core::{ContentReader, DeleteError};

use crate::traits::{StorageError, StorageResult};

pub(crate) fn content_type_attributes(mime_type: &str) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        Attribute::ContentType,
        AttributeValue::from(mime_type.to_string()),
    );
    attributes
}

/// Single-request put carrying the content type.
pub(crate) async fn put_with_type(
    store: &dyn ObjectStore,
    location: &Path,
    data: Vec<u8>,
    mime_type: &str,
) -> object_store::Result<()> {
    let opts = PutOptions {
        attributes: content_type_attributes(mime_type),
        ..Default::default()
    };
    store
        .put_opts(location, PutPayload::from(Bytes::from(data)), opts)
        .await?;
    Ok(())
}

/// Copy `reader` into the store through a multipart-capable buffered writer.
/// Returns the number of bytes written.
pub(crate) async fn put_stream(
    store: Arc<dyn ObjectStore>,
    location: Path,
    mut reader: ContentReader,
    mime_type: &str,
) -> StorageResult<u64> {
    let mut writer =
        BufWriter::new(store, location).with_attributes(content_type_attributes(mime_type));

    let copied = match tokio::io::copy(&mut reader, &mut writer).await {
        Ok(n) => n,
        Err(e) => {
            if let Err(abort_err) = writer.abort().await {
                tracing::warn!(error = %abort_err, "Failed to abort multipart upload");
            }
            return Err(StorageError::UploadFailed(e.to_string()));
        }
    };

    writer
        .shutdown()
        .await
        .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

    Ok(copied)
}

pub(crate) fn delete_error(key: &str, err: ObjectStoreError) -> DeleteError {
    match err {
        ObjectStoreError::NotFound { .. } => DeleteError::NotFound(key.to_string()),
        ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
            DeleteError::Forbidden(err.to_string())
        }
        other => DeleteError::TransportFailure(other.to_string()),
    }
}
