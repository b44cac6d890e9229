//! Upload Core Library
//!
//! Shared types for the upload subsystem: the file descriptor, the content
//! handle, the configuration snapshot and its collaborators, mime routing and
//! the error taxonomy. Storage adapters and processors build on these.

pub mod config;
pub mod constants;
pub mod content;
pub mod error;
pub mod mime_router;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    EncodeFormat, EncodeSettings, EnvSettings, GcsSettings, ImgurSettings, MapSettings,
    PathProvider, QiniuSettings, ResizeSettings, S3Settings, SettingsStore, StaticPaths,
    UploadSettings, WatermarkAnchor, WatermarkSettings,
};
pub use content::{ContentReader, UploadContent};
pub use error::{
    ConfigError, DeleteError, ErrorKind, ErrorMetadata, LogLevel, ProcessingError, UploadError,
};
pub use mime_router::{MimeRoute, MimeRoutingTable};
pub use models::FileDescriptor;
pub use storage_types::StorageBackend;
