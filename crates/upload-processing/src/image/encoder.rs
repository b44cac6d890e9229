use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use upload_core::{EncodeFormat, ProcessingError};

/// Output format of the image stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Formats the image stage handles, by declared MIME type.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(OutputFormat::Jpeg),
            "image/png" => Some(OutputFormat::Png),
            "image/webp" => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }

    pub fn to_image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }
}

impl From<EncodeFormat> for OutputFormat {
    fn from(format: EncodeFormat) -> Self {
        match format {
            EncodeFormat::Jpg => OutputFormat::Jpeg,
            EncodeFormat::Webp => OutputFormat::WebP,
        }
    }
}

/// Encodes processed images
pub struct ImageEncoder;

impl ImageEncoder {
    /// Encode `img` as `format`. `quality` (0-100) is ignored for PNG.
    pub fn encode(
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, ProcessingError> {
        let quality = quality.min(100);
        match format {
            OutputFormat::Jpeg => Self::encode_jpeg(img, quality),
            OutputFormat::Png => Self::encode_png(img),
            OutputFormat::WebP => Self::encode_webp(img, quality),
        }
    }

    /// Encode to JPEG using mozjpeg
    ///
    /// mozjpeg reports libjpeg errors by unwinding, so the whole compression
    /// runs under `catch_unwind`.
    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let result = panic::catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
            let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            comp.set_size(width as usize, height as usize);
            comp.set_quality(quality as f32);
            comp.set_progressive_mode();
            comp.set_optimize_coding(true);

            let mut comp = comp.start_compress(Vec::new())?;
            comp.write_scanlines(&rgb_img)?;
            comp.finish()
        }));

        match result {
            Ok(Ok(jpeg_data)) => Ok(jpeg_data),
            Ok(Err(e)) => Err(ProcessingError::EncodingFailed(format!("JPEG: {}", e))),
            Err(_) => Err(ProcessingError::EncodingFailed(
                "JPEG: encoder aborted".to_string(),
            )),
        }
    }

    /// Encode to PNG
    fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ProcessingError> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| ProcessingError::EncodingFailed(format!("PNG: {}", e)))?;
        Ok(buffer)
    }

    /// Encode to WebP
    fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
        let (width, height) = img.dimensions();
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(quality as f32);

        if webp_data.is_empty() {
            return Err(ProcessingError::EncodingFailed(
                "WebP: encoder produced no data".to_string(),
            ));
        }
        Ok(webp_data.to_vec())
    }
}
