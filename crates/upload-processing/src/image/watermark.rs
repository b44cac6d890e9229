use image::{imageops, DynamicImage, GenericImageView};
use upload_core::{ProcessingError, WatermarkAnchor};

pub struct Watermark;

impl Watermark {
    /// Top-left corner of a `wm_width`×`wm_height` watermark placed at `anchor`
    /// on an `img_width`×`img_height` image. Coordinates may be negative when
    /// the watermark is larger than the image; the overlay clips.
    pub fn position(
        anchor: WatermarkAnchor,
        img_width: u32,
        img_height: u32,
        wm_width: u32,
        wm_height: u32,
    ) -> (i64, i64) {
        let right = img_width as i64 - wm_width as i64;
        let bottom = img_height as i64 - wm_height as i64;
        let center_x = right / 2;
        let center_y = bottom / 2;

        match anchor {
            WatermarkAnchor::TopLeft => (0, 0),
            WatermarkAnchor::Top => (center_x, 0),
            WatermarkAnchor::TopRight => (right, 0),
            WatermarkAnchor::Left => (0, center_y),
            WatermarkAnchor::Center => (center_x, center_y),
            WatermarkAnchor::Right => (right, center_y),
            WatermarkAnchor::BottomLeft => (0, bottom),
            WatermarkAnchor::Bottom => (center_x, bottom),
            WatermarkAnchor::BottomRight => (right, bottom),
        }
    }

    /// Composite the watermark at its natural size.
    pub fn apply(
        img: DynamicImage,
        watermark_data: &[u8],
        anchor: WatermarkAnchor,
    ) -> Result<DynamicImage, ProcessingError> {
        let watermark_img = image::load_from_memory(watermark_data)
            .map_err(|e| {
                ProcessingError::Configuration(format!("Watermark image cannot be decoded: {}", e))
            })?
            .to_rgba8();

        let (img_width, img_height) = img.dimensions();
        let (wm_width, wm_height) = watermark_img.dimensions();
        let (x, y) = Self::position(anchor, img_width, img_height, wm_width, wm_height);

        tracing::debug!(
            anchor = %anchor,
            x = x,
            y = y,
            watermark_width = wm_width,
            watermark_height = wm_height,
            "Applying watermark"
        );

        let mut img_rgba = img.to_rgba8();
        imageops::overlay(&mut img_rgba, &watermark_img, x, y);

        Ok(DynamicImage::ImageRgba8(img_rgba))
    }
}
