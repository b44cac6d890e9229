//! Upload Processing Library
//!
//! The processing half of the upload subsystem: the [`UploadProcessor`] stage
//! trait and its ordered [`ProcessorChain`], the built-in [`ImageProcessor`]
//! (orientation, resize, watermark, re-encode) and the [`UploadPipeline`] that
//! ties processors, mime routing and storage adapters together.

#[cfg(feature = "image")]
pub mod image;
pub mod upload;

#[cfg(feature = "image")]
pub use self::image::ImageProcessor;
pub use upload::{ProcessorChain, UploadPipeline, UploadPipelineBuilder, UploadProcessor};
