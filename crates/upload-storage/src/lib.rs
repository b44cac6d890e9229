//! Upload Storage Library
//!
//! Storage adapters for the upload subsystem: the [`UploadAdapter`] trait, the
//! built-in backends (local filesystem, S3, Google Cloud Storage, Imgur,
//! Qiniu) and the [`AdapterRegistry`] that builds them by key.
//!
//! # Path format
//!
//! Every backend stores files under paths produced by [`keys::generate_path`]:
//!
//! - `{YYYY-MM-DD}{sep}{unix_seconds}-{microseconds}-{base_name}`
//! - plus `.{jpg|webp}` when the stored image was re-encoded to that format
//!
//! `sep` is the adapter's [`UploadAdapter::path_separator`]. Remote APIs that
//! assign their own identifiers report them back through [`WriteMetadata`].

pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(any(feature = "storage-s3", feature = "storage-gcs"))]
mod object;
pub mod registry;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(feature = "storage-gcs")]
pub mod gcs;
#[cfg(feature = "storage-imgur")]
pub mod imgur;
#[cfg(feature = "storage-qiniu")]
pub mod qiniu;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-gcs")]
pub use gcs::GcsAdapter;
#[cfg(feature = "storage-imgur")]
pub use imgur::ImgurAdapter;
pub use keys::generate_path;
#[cfg(feature = "storage-local")]
pub use local::LocalAdapter;
#[cfg(feature = "storage-qiniu")]
pub use qiniu::QiniuAdapter;
pub use registry::{AdapterFactory, AdapterRegistry};
#[cfg(feature = "storage-s3")]
pub use s3::S3Adapter;
pub use traits::{StorageError, StorageResult, UploadAdapter, WriteMetadata};
pub use upload_core::StorageBackend;
