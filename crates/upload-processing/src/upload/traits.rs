//! Traits for upload processing

use async_trait::async_trait;
use upload_core::{FileDescriptor, ProcessingError, UploadContent, UploadSettings};

/// A stage run on every upload before it is routed and stored.
///
/// Stages may rewrite the content in place and change the MIME type; the
/// following stages and the router see the updated values. A stage that does
/// not handle the MIME type returns `Ok(())` without touching anything.
#[async_trait]
pub trait UploadProcessor: Send + Sync {
    /// Name used in log fields and error messages.
    fn name(&self) -> &str;

    async fn process(
        &self,
        file: &FileDescriptor,
        content: &mut UploadContent,
        mime_type: &mut String,
        settings: &UploadSettings,
    ) -> Result<(), ProcessingError>;
}
