//! Ordered processor stages.

use std::fmt;
use std::sync::Arc;

use upload_core::{FileDescriptor, ProcessingError, UploadContent, UploadSettings};

use super::traits::UploadProcessor;

/// Runs registered stages in registration order, stopping at the first error.
#[derive(Clone, Default)]
pub struct ProcessorChain {
    stages: Vec<Arc<dyn UploadProcessor>>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: Arc<dyn UploadProcessor>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(
        &self,
        file: &FileDescriptor,
        content: &mut UploadContent,
        mime_type: &mut String,
        settings: &UploadSettings,
    ) -> Result<(), ProcessingError> {
        for stage in &self.stages {
            let start = std::time::Instant::now();

            if let Err(e) = stage.process(file, content, mime_type, settings).await {
                tracing::warn!(
                    stage = %stage.name(),
                    base_name = %file.base_name,
                    error = %e,
                    "Processor stage failed"
                );
                return Err(e);
            }

            tracing::debug!(
                stage = %stage.name(),
                mime_type = %mime_type,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Processor stage completed"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("stages", &self.names())
            .finish()
    }
}
