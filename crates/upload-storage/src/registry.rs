//! Adapter registry
//!
//! Maps adapter keys (as used in the mime routing table) to factories that
//! build an adapter from a settings snapshot. The built-in backends are
//! registered by [`AdapterRegistry::with_defaults`] according to the enabled
//! cargo features; integrators may add their own under any other key.

#[cfg(feature = "storage-gcs")]
use crate::GcsAdapter;
#[cfg(feature = "storage-imgur")]
use crate::ImgurAdapter;
#[cfg(feature = "storage-local")]
use crate::LocalAdapter;
#[cfg(feature = "storage-qiniu")]
use crate::QiniuAdapter;
#[cfg(feature = "storage-s3")]
use crate::S3Adapter;
use crate::{StorageError, StorageResult, UploadAdapter};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use upload_core::{StorageBackend, UploadSettings};

/// Builds an adapter for one call.
pub trait AdapterFactory: Send + Sync {
    fn create(&self, settings: &UploadSettings) -> StorageResult<Arc<dyn UploadAdapter>>;
}

impl<F> AdapterFactory for F
where
    F: Fn(&UploadSettings) -> StorageResult<Arc<dyn UploadAdapter>> + Send + Sync,
{
    fn create(&self, settings: &UploadSettings) -> StorageResult<Arc<dyn UploadAdapter>> {
        self(settings)
    }
}

#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: HashMap<String, Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend compiled into this build.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for backend in StorageBackend::ALL {
            if let Some(factory) = builtin_factory(backend) {
                registry.factories.insert(backend.key().to_string(), factory);
            }
        }
        registry
    }

    /// Register (or replace) the factory for `key`.
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: AdapterFactory + 'static,
    {
        let key = key.into();
        if self
            .factories
            .insert(key.clone(), Arc::new(factory))
            .is_some()
        {
            tracing::debug!(adapter = %key, "Replaced adapter factory");
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Build the adapter registered under `key`.
    pub fn create(
        &self,
        key: &str,
        settings: &UploadSettings,
    ) -> StorageResult<Arc<dyn UploadAdapter>> {
        let factory = self.factories.get(key).ok_or_else(|| {
            StorageError::ConfigError(format!("No adapter registered under '{}'", key))
        })?;
        factory.create(settings)
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.keys())
            .finish()
    }
}

fn builtin_factory(backend: StorageBackend) -> Option<Arc<dyn AdapterFactory>> {
    match backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => Some(shared(|s: &UploadSettings| {
            Ok(Arc::new(LocalAdapter::from_settings(s)?) as Arc<dyn UploadAdapter>)
        })),

        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => Some(shared(|s: &UploadSettings| {
            Ok(Arc::new(S3Adapter::from_settings(s)?) as Arc<dyn UploadAdapter>)
        })),

        #[cfg(feature = "storage-gcs")]
        StorageBackend::Gcs => Some(shared(|s: &UploadSettings| {
            Ok(Arc::new(GcsAdapter::from_settings(s)?) as Arc<dyn UploadAdapter>)
        })),

        #[cfg(feature = "storage-imgur")]
        StorageBackend::Imgur => Some(shared(|s: &UploadSettings| {
            Ok(Arc::new(ImgurAdapter::from_settings(s)?) as Arc<dyn UploadAdapter>)
        })),

        #[cfg(feature = "storage-qiniu")]
        StorageBackend::Qiniu => Some(shared(|s: &UploadSettings| {
            Ok(Arc::new(QiniuAdapter::from_settings(s)?) as Arc<dyn UploadAdapter>)
        })),

        #[allow(unreachable_patterns)]
        _ => {
            tracing::debug!(
                adapter = %backend,
                "Storage backend not available (feature not enabled)"
            );
            None
        }
    }
}

fn shared<F>(factory: F) -> Arc<dyn AdapterFactory>
where
    F: Fn(&UploadSettings) -> StorageResult<Arc<dyn UploadAdapter>> + Send + Sync + 'static,
{
    Arc::new(factory)
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use upload_core::{MapSettings, StaticPaths};

    fn settings() -> UploadSettings {
        UploadSettings::load(&MapSettings::new(), &StaticPaths::new("/tmp/files", "/tmp/assets"))
            .unwrap()
    }

    #[test]
    fn test_defaults_register_builtin_keys() {
        let registry = AdapterRegistry::with_defaults();
        assert!(registry.contains("local"));
        #[cfg(feature = "full")]
        assert_eq!(registry.keys(), vec!["aws-s3", "gcs", "imgur", "local", "qiniu"]);
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let registry = AdapterRegistry::with_defaults();
        assert!(matches!(
            registry.create("dropbox", &settings()),
            Err(StorageError::ConfigError(_))
        ));
    }

    #[test]
    fn test_custom_factory_replaces_builtin() {
        let mut registry = AdapterRegistry::with_defaults();
        registry.register(
            "local",
            |_: &UploadSettings| -> StorageResult<Arc<dyn UploadAdapter>> {
                Ok(Arc::new(LocalAdapter::new(
                    "/elsewhere",
                    "https://files.example.com",
                )))
            },
        );

        let adapter = registry.create("local", &settings()).unwrap();
        let file = upload_core::FileDescriptor::stored("a.txt");
        assert_eq!(adapter.url_for(&file), "https://files.example.com/a.txt");
    }
}
