//! Image processing module
//!
//! This module provides the built-in image stage of the upload pipeline:
//! - EXIF orientation normalisation (orientation)
//! - Bounding-box downscaling (resize)
//! - Anchored watermark compositing (watermark)
//! - Re-encoding to JPEG, PNG or WebP (encoder)
//! - The [`UploadProcessor`](crate::UploadProcessor) implementation tying them together (processor)

pub mod encoder;
pub mod orientation;
pub mod processor;
pub mod resize;
pub mod watermark;

pub use processor::ImageProcessor;

// Re-export commonly used types
pub use encoder::{ImageEncoder, OutputFormat};
pub use orientation::ImageOrientation;
pub use resize::ImageResize;
pub use watermark::Watermark;
