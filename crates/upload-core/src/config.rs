//! Configuration module
//!
//! Settings are read through a [`SettingsStore`] into an immutable
//! [`UploadSettings`] snapshot, once per request. Processors and adapters only
//! ever see the snapshot, never the store.

use std::collections::HashMap;
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_ENCODE_QUALITY, DEFAULT_MAX_FILE_SIZE_KB, DEFAULT_RESIZE_MAX_WIDTH, DEFAULT_S3_REGION,
};
use crate::error::ConfigError;
use crate::mime_router::MimeRoutingTable;

const DEFAULT_ADAPTER: &str = "local";
const IMGUR_API_URL: &str = "https://api.imgur.com/3";
const QINIU_UPLOAD_URL: &str = "https://upload.qiniup.com";
const QINIU_MANAGE_URL: &str = "https://rs.qiniuapi.com";

/// Read-only key/value access to persisted settings.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory settings, mostly for tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<String, String>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl SettingsStore for MapSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Settings read from the process environment (after loading `.env`).
///
/// `resizeMaxWidth` is looked up as `UPLOAD_RESIZE_MAX_WIDTH`.
#[derive(Debug, Clone)]
pub struct EnvSettings {
    prefix: String,
}

impl EnvSettings {
    pub fn new() -> Self {
        dotenvy::dotenv().ok();
        Self {
            prefix: "UPLOAD_".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        dotenvy::dotenv().ok();
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn env_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, screaming_snake(key))
    }
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        env::var(self.env_key(key)).ok()
    }
}

fn screaming_snake(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// Server-local directories the core needs.
pub trait PathProvider: Send + Sync {
    /// Root directory of the local adapter.
    fn storage_root(&self) -> PathBuf;

    /// Directory holding auxiliary assets such as the watermark image.
    fn asset_dir(&self) -> PathBuf;
}

#[derive(Debug, Clone)]
pub struct StaticPaths {
    pub storage_root: PathBuf,
    pub asset_dir: PathBuf,
}

impl StaticPaths {
    pub fn new(storage_root: impl Into<PathBuf>, asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            asset_dir: asset_dir.into(),
        }
    }
}

impl PathProvider for StaticPaths {
    fn storage_root(&self) -> PathBuf {
        self.storage_root.clone()
    }

    fn asset_dir(&self) -> PathBuf {
        self.asset_dir.clone()
    }
}

/// Target format when re-encoding is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Jpg,
    Webp,
}

impl EncodeFormat {
    pub fn extension(self) -> &'static str {
        match self {
            EncodeFormat::Jpg => "jpg",
            EncodeFormat::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            EncodeFormat::Jpg => "image/jpeg",
            EncodeFormat::Webp => "image/webp",
        }
    }
}

impl FromStr for EncodeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(EncodeFormat::Jpg),
            "webp" => Ok(EncodeFormat::Webp),
            other => Err(format!("unsupported encode type '{}'", other)),
        }
    }
}

/// Anchor at which the watermark is composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkAnchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    #[default]
    BottomRight,
}

impl FromStr for WatermarkAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top-left" => Ok(WatermarkAnchor::TopLeft),
            "top" => Ok(WatermarkAnchor::Top),
            "top-right" => Ok(WatermarkAnchor::TopRight),
            "left" => Ok(WatermarkAnchor::Left),
            "center" => Ok(WatermarkAnchor::Center),
            "right" => Ok(WatermarkAnchor::Right),
            "bottom-left" => Ok(WatermarkAnchor::BottomLeft),
            "bottom" => Ok(WatermarkAnchor::Bottom),
            "bottom-right" => Ok(WatermarkAnchor::BottomRight),
            other => Err(format!("unknown watermark position '{}'", other)),
        }
    }
}

impl Display for WatermarkAnchor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            WatermarkAnchor::TopLeft => "top-left",
            WatermarkAnchor::Top => "top",
            WatermarkAnchor::TopRight => "top-right",
            WatermarkAnchor::Left => "left",
            WatermarkAnchor::Center => "center",
            WatermarkAnchor::Right => "right",
            WatermarkAnchor::BottomLeft => "bottom-left",
            WatermarkAnchor::Bottom => "bottom",
            WatermarkAnchor::BottomRight => "bottom-right",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeSettings {
    pub enabled: bool,
    /// Edge of the square bounding box, in pixels.
    pub max_width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSettings {
    pub enabled: bool,
    /// Resolved location of the watermark image, if one is configured.
    pub file: Option<PathBuf>,
    pub position: WatermarkAnchor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub enabled: bool,
    pub format: EncodeFormat,
    pub quality: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub bucket: Option<String>,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, ...)
    pub endpoint: Option<String>,
    pub use_path_style: bool,
    pub acl: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsSettings {
    pub project_id: Option<String>,
    pub bucket: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: Option<String>,
    pub client_email: Option<String>,
    pub client_id: Option<String>,
    pub auth_uri: Option<String>,
    pub token_uri: Option<String>,
    pub auth_provider_x509_cert_url: Option<String>,
    pub client_x509_cert_url: Option<String>,
    /// Public URL prefix, independent of the bucket (CDN fronting).
    pub upload_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImgurSettings {
    pub client_id: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QiniuSettings {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub bucket: Option<String>,
    /// Public domain bound to the bucket.
    pub domain: Option<String>,
    pub upload_url: String,
    pub manage_url: String,
}

/// Immutable view of every setting one upload or delete call needs.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub routing: MimeRoutingTable,
    pub cdn_url: Option<String>,
    pub max_file_size_kb: u64,
    pub storage_root: PathBuf,
    pub resize: ResizeSettings,
    pub watermark: WatermarkSettings,
    pub encode: EncodeSettings,
    pub s3: S3Settings,
    pub gcs: GcsSettings,
    pub imgur: ImgurSettings,
    pub qiniu: QiniuSettings,
}

impl UploadSettings {
    pub fn load(store: &dyn SettingsStore, paths: &dyn PathProvider) -> Result<Self, ConfigError> {
        let reader = Reader { store };

        let routing = match reader.string("mimeTypes") {
            Some(raw) => MimeRoutingTable::from_json(&raw)?,
            None => MimeRoutingTable::default_for(DEFAULT_ADAPTER)?,
        };

        let quality: u8 = reader.parsed("encodeQuality", DEFAULT_ENCODE_QUALITY)?;
        if quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "encodeQuality".to_string(),
                reason: format!("{} is outside 0..=100", quality),
            });
        }

        let max_width: u32 = reader.parsed("resizeMaxWidth", DEFAULT_RESIZE_MAX_WIDTH)?;
        if max_width == 0 {
            return Err(ConfigError::InvalidValue {
                key: "resizeMaxWidth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let settings = UploadSettings {
            routing,
            cdn_url: reader.string("cdnUrl"),
            max_file_size_kb: reader.parsed("maxFileSize", DEFAULT_MAX_FILE_SIZE_KB)?,
            storage_root: paths.storage_root(),
            resize: ResizeSettings {
                enabled: reader.flag("mustResize")?,
                max_width,
            },
            watermark: WatermarkSettings {
                enabled: reader.flag("addsWatermarks")?,
                file: reader
                    .string("watermark")
                    .map(|name| paths.asset_dir().join(name)),
                position: reader.parsed("watermarkPosition", WatermarkAnchor::default())?,
            },
            encode: EncodeSettings {
                enabled: reader.flag("mustEncode")?,
                format: reader.parsed("encodeImageType", EncodeFormat::Jpg)?,
                quality,
            },
            s3: S3Settings {
                key: reader.string("awsS3Key"),
                secret: reader.string("awsS3Secret"),
                bucket: reader.string("awsS3Bucket"),
                region: reader
                    .string("awsS3Region")
                    .unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
                endpoint: reader.string("awsS3Endpoint"),
                use_path_style: reader.flag("awsS3UsePathStyleEndpoint")?,
                acl: reader.string("awsS3ACL"),
            },
            gcs: GcsSettings {
                project_id: reader.string("gcsProjectId"),
                bucket: reader.string("gcsBucketName"),
                private_key_id: reader.string("gcsPrivateKeyId"),
                private_key: reader.string("gcsPrivateKey"),
                client_email: reader.string("gcsClientEmail"),
                client_id: reader.string("gcsClientId"),
                auth_uri: reader.string("gcsAuthUri"),
                token_uri: reader.string("gcsTokenUri"),
                auth_provider_x509_cert_url: reader.string("gcsAuthProviderX509CertUrl"),
                client_x509_cert_url: reader.string("gcsClientX509CertUrl"),
                upload_prefix: reader.string("gcsUploadPrefix"),
            },
            imgur: ImgurSettings {
                client_id: reader.string("imgurClientId"),
                api_url: reader
                    .string("imgurApiUrl")
                    .unwrap_or_else(|| IMGUR_API_URL.to_string()),
            },
            qiniu: QiniuSettings {
                key: reader.string("qiniuKey"),
                secret: reader.string("qiniuSecret"),
                bucket: reader.string("qiniuBucket"),
                domain: reader.string("qiniuDomain"),
                upload_url: reader
                    .string("qiniuUploadUrl")
                    .unwrap_or_else(|| QINIU_UPLOAD_URL.to_string()),
                manage_url: reader
                    .string("qiniuManageUrl")
                    .unwrap_or_else(|| QINIU_MANAGE_URL.to_string()),
            },
        };

        tracing::debug!(
            routes = settings.routing.len(),
            resize = settings.resize.enabled,
            watermark = settings.watermark.enabled,
            encode = settings.encode.enabled,
            "Loaded upload settings"
        );

        Ok(settings)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_kb.saturating_mul(1024)
    }
}

struct Reader<'a> {
    store: &'a dyn SettingsStore,
}

impl Reader<'_> {
    /// Non-empty, trimmed value.
    fn string(&self, key: &str) -> Option<String> {
        self.store
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.string(key) {
            None => Ok(false),
            Some(v) => match v.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("'{}' is not a boolean", v),
                }),
            },
        }
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.string(key) {
            None => Ok(default),
            Some(v) => v.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
