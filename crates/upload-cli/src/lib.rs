//! Helpers shared by the `upload` binary.

use std::env;
use std::path::{Path, PathBuf};

use upload_core::StaticPaths;

/// Declared MIME type for a local file: the explicit value if given, else a
/// guess from the extension.
pub fn declared_mime(path: &Path, explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| mime_guess::from_path(path).first().map(|m| m.to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Base name stored on the descriptor: the final path component.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

/// Storage root and asset directory from `UPLOAD_STORAGE_ROOT` and
/// `UPLOAD_ASSET_DIR`, relative to the working directory by default.
pub fn paths_from_env() -> StaticPaths {
    let storage_root = env::var("UPLOAD_STORAGE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("public/assets/files"));
    let asset_dir = env::var("UPLOAD_ASSET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("storage"));
    StaticPaths::new(storage_root, asset_dir)
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_mime_prefers_explicit_value() {
        assert_eq!(
            declared_mime(Path::new("a.png"), Some("image/webp")),
            "image/webp"
        );
    }

    #[test]
    fn declared_mime_guesses_from_extension() {
        assert_eq!(declared_mime(Path::new("photo.PNG"), None), "image/png");
        assert_eq!(declared_mime(Path::new("a.pdf"), None), "application/pdf");
    }

    #[test]
    fn declared_mime_falls_back_to_octet_stream() {
        assert_eq!(
            declared_mime(Path::new("no_extension"), None),
            "application/octet-stream"
        );
    }

    #[test]
    fn base_name_is_last_component() {
        assert_eq!(base_name(Path::new("/tmp/uploads/photo.PNG")), "photo.PNG");
        assert_eq!(base_name(Path::new("/")), "file");
    }
}
