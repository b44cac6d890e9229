//! Upload pipeline: validate → process → route → store.

pub mod chain;
pub mod pipeline;
pub mod traits;

pub use chain::ProcessorChain;
pub use pipeline::{UploadPipeline, UploadPipelineBuilder};
pub use traits::UploadProcessor;
