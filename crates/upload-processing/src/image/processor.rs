//! Built-in image stage: orientation, resize, watermark, re-encode.

use async_trait::async_trait;
use image::DynamicImage;
use upload_core::constants::{DEFAULT_ENCODE_QUALITY, WATERMARK_TAG};
use upload_core::{
    FileDescriptor, ProcessingError, UploadContent, UploadSettings, WatermarkAnchor,
};

use super::encoder::{ImageEncoder, OutputFormat};
use super::orientation::ImageOrientation;
use super::resize::ImageResize;
use super::watermark::Watermark;
use crate::upload::traits::UploadProcessor;

/// Everything the blocking transform needs, resolved from the settings snapshot.
#[derive(Debug, Clone)]
struct TransformPlan {
    resize_to: Option<u32>,
    watermark: Option<(Vec<u8>, WatermarkAnchor)>,
    output: OutputFormat,
    quality: u8,
}

/// Image upload processor.
///
/// Handles `image/jpeg`, `image/png` and `image/webp`; everything else, and
/// uploads tagged `watermark`, passes through untouched.
#[derive(Debug, Clone, Default)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    async fn load_watermark(
        settings: &UploadSettings,
    ) -> Result<Option<(Vec<u8>, WatermarkAnchor)>, ProcessingError> {
        if !settings.watermark.enabled {
            return Ok(None);
        }

        let Some(path) = settings.watermark.file.as_ref() else {
            tracing::debug!("Watermarking enabled but no watermark image configured");
            return Ok(None);
        };

        let data = tokio::fs::read(path).await.map_err(|e| {
            ProcessingError::Configuration(format!(
                "Watermark file {} cannot be read: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Some((data, settings.watermark.position)))
    }

    /// Decode, orient, resize, watermark and encode. CPU-bound.
    fn transform(data: &[u8], plan: &TransformPlan) -> Result<Vec<u8>, ProcessingError> {
        let img: DynamicImage = image::load_from_memory(data)
            .map_err(|e| ProcessingError::CorruptedImage(e.to_string()))?;

        let mut img = ImageOrientation::apply_exif_orientation(img, data);

        if let Some(max) = plan.resize_to {
            img = ImageResize::resize_to_fit(img, max);
        }

        if let Some((ref watermark, anchor)) = plan.watermark {
            img = Watermark::apply(img, watermark, anchor)?;
        }

        ImageEncoder::encode(&img, plan.output, plan.quality)
    }
}

#[async_trait]
impl UploadProcessor for ImageProcessor {
    fn name(&self) -> &str {
        "image"
    }

    async fn process(
        &self,
        file: &FileDescriptor,
        content: &mut UploadContent,
        mime_type: &mut String,
        settings: &UploadSettings,
    ) -> Result<(), ProcessingError> {
        let Some(source_format) = OutputFormat::from_mime(mime_type) else {
            return Ok(());
        };

        if file.has_tag(WATERMARK_TAG) {
            tracing::debug!(base_name = %file.base_name, "Skipping watermark upload");
            return Ok(());
        }

        let (output, quality) = if settings.encode.enabled {
            (OutputFormat::from(settings.encode.format), settings.encode.quality)
        } else {
            (source_format, DEFAULT_ENCODE_QUALITY)
        };

        let plan = TransformPlan {
            resize_to: settings.resize.enabled.then_some(settings.resize.max_width),
            watermark: Self::load_watermark(settings).await?,
            output,
            quality,
        };

        let data = content.read_all().await?;
        let original_size = data.len();
        let start = std::time::Instant::now();

        let encoded = tokio::task::spawn_blocking(move || Self::transform(&data, &plan))
            .await
            .map_err(|e| ProcessingError::Other {
                stage: self.name().to_string(),
                source: anyhow::Error::new(e),
            })??;

        let processed_size = encoded.len();
        content.replace(encoded).await?;
        *mime_type = output.to_mime_type().to_string();

        tracing::debug!(
            base_name = %file.base_name,
            original_size = original_size,
            processed_size = processed_size,
            output = ?output,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image processed"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use upload_core::{MapSettings, StaticPaths};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn settings(store: MapSettings, asset_dir: &std::path::Path) -> UploadSettings {
        UploadSettings::load(&store, &StaticPaths::new("/tmp/files", asset_dir)).unwrap()
    }

    #[tokio::test]
    async fn test_resizes_and_keeps_format() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(
            MapSettings::new()
                .with("mustResize", "1")
                .with("resizeMaxWidth", "100"),
            dir.path(),
        );
        let mut content = UploadContent::from_bytes(png(400, 200));
        let mut mime = "image/png".to_string();

        ImageProcessor::new()
            .process(&FileDescriptor::new("photo.PNG"), &mut content, &mut mime, &settings)
            .await
            .unwrap();

        let out = content.read_all().await.unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
        assert_eq!(image::load_from_memory(&out).unwrap().dimensions(), (100, 50));
        assert_eq!(mime, "image/png");
    }

    #[tokio::test]
    async fn test_reencode_rewrites_mime() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(
            MapSettings::new()
                .with("mustEncode", "1")
                .with("encodeImageType", "webp")
                .with("encodeQuality", "80"),
            dir.path(),
        );
        let mut content = UploadContent::from_bytes(png(40, 40));
        let mut mime = "image/png".to_string();

        ImageProcessor::new()
            .process(&FileDescriptor::new("a.png"), &mut content, &mut mime, &settings)
            .await
            .unwrap();

        let out = content.read_all().await.unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::WebP);
        assert_eq!(mime, "image/webp");
    }

    #[tokio::test]
    async fn test_corrupted_image() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(MapSettings::new(), dir.path());
        let mut content = UploadContent::from_bytes(b"\x89PNG\r\n\x1a\nbroken".to_vec());
        let mut mime = "image/png".to_string();

        let err = ImageProcessor::new()
            .process(&FileDescriptor::new("a.png"), &mut content, &mut mime, &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::CorruptedImage(_)));
    }

    #[tokio::test]
    async fn test_non_images_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(MapSettings::new().with("mustResize", "1"), dir.path());
        let mut content = UploadContent::from_bytes(b"%PDF-1.7".to_vec());
        let mut mime = "application/pdf".to_string();

        ImageProcessor::new()
            .process(&FileDescriptor::new("a.pdf"), &mut content, &mut mime, &settings)
            .await
            .unwrap();
        assert_eq!(content.read_all().await.unwrap(), b"%PDF-1.7");
        assert_eq!(mime, "application/pdf");
    }

    #[tokio::test]
    async fn test_watermark_tag_skips_processing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(MapSettings::new().with("mustResize", "1"), dir.path());
        let original = png(400, 200);
        let mut content = UploadContent::from_bytes(original.clone());
        let mut mime = "image/png".to_string();

        ImageProcessor::new()
            .process(
                &FileDescriptor::new("wm.png").with_tag("watermark"),
                &mut content,
                &mut mime,
                &settings,
            )
            .await
            .unwrap();
        assert_eq!(content.read_all().await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_missing_watermark_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(
            MapSettings::new()
                .with("addsWatermarks", "1")
                .with("watermark", "missing.png"),
            dir.path(),
        );
        let mut content = UploadContent::from_bytes(png(40, 40));
        let mut mime = "image/png".to_string();

        let err = ImageProcessor::new()
            .process(&FileDescriptor::new("a.png"), &mut content, &mut mime, &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_watermark_is_composited() {
        let dir = tempfile::tempdir().unwrap();
        let mark = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        mark.save(dir.path().join("watermark.png")).unwrap();

        let settings = settings(
            MapSettings::new()
                .with("addsWatermarks", "1")
                .with("watermark", "watermark.png")
                .with("watermarkPosition", "top-left"),
            dir.path(),
        );
        let mut content = UploadContent::from_bytes(png(40, 40));
        let mut mime = "image/png".to_string();

        ImageProcessor::new()
            .process(&FileDescriptor::new("a.png"), &mut content, &mut mime, &settings)
            .await
            .unwrap();

        let out = image::load_from_memory(&content.read_all().await.unwrap()).unwrap();
        assert_eq!(out.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(out.get_pixel(39, 39), Rgba([10, 200, 30, 255]));
    }
}
