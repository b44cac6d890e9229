//! Default values for settings that are absent from the store.

/// Quality used whenever an image is re-encoded without an explicit setting.
pub const DEFAULT_ENCODE_QUALITY: u8 = 90;

/// Upload size limit, in KiB.
pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 2048;

/// Bounding box edge for resized images, in pixels.
pub const DEFAULT_RESIZE_MAX_WIDTH: u32 = 100;

pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Template assigned to routing entries that only name an adapter.
pub const DEFAULT_TEMPLATE: &str = "file";

/// Tag carried by uploads of the watermark image itself.
pub const WATERMARK_TAG: &str = "watermark";

/// Extensions that receive the re-encode suffix when encoding is enabled.
pub const ENCODABLE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Public URL prefix of the local adapter when no CDN is configured.
pub const DEFAULT_LOCAL_URL: &str = "/assets/files";
