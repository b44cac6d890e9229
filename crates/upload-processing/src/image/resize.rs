use image::{DynamicImage, GenericImageView};

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Dimensions that fit `orig_width`×`orig_height` inside a `max`×`max` box,
    /// preserving aspect ratio. Returns `None` when the image already fits;
    /// images are never upscaled.
    pub fn fit_within(orig_width: u32, orig_height: u32, max: u32) -> Option<(u32, u32)> {
        if max == 0 || (orig_width <= max && orig_height <= max) {
            return None;
        }

        let scale = (max as f64 / orig_width as f64).min(max as f64 / orig_height as f64);
        let width = ((orig_width as f64 * scale).round() as u32).clamp(1, max);
        let height = ((orig_height as f64 * scale).round() as u32).clamp(1, max);
        Some((width, height))
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> image::imageops::FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            image::imageops::FilterType::Triangle
        } else if max_ratio > 1.5 {
            image::imageops::FilterType::CatmullRom
        } else {
            image::imageops::FilterType::Lanczos3
        }
    }

    /// Downscale into the bounding box, or return the image unchanged.
    pub fn resize_to_fit(img: DynamicImage, max: u32) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        match Self::fit_within(orig_width, orig_height, max) {
            Some((width, height)) => {
                tracing::debug!(
                    from_width = orig_width,
                    from_height = orig_height,
                    to_width = width,
                    to_height = height,
                    "Resizing image"
                );
                let filter = Self::select_filter(orig_width, orig_height, width, height);
                img.resize_exact(width, height, filter)
            }
            None => img,
        }
    }
}
