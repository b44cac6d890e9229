//! End-to-end uploads through the default pipeline and the local adapter.

#![cfg(feature = "image")]

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
use upload_core::{
    DeleteError, FileDescriptor, MapSettings, ProcessingError, StaticPaths, UploadContent,
    UploadError, UploadSettings,
};
use upload_processing::{UploadPipeline, UploadPipelineBuilder, UploadProcessor};

const IMAGES_LOCAL: &str =
    r#"{"^image\\/.*": {"adapter": "local", "template": "image-preview"}}"#;
const IMAGES_AND_CATCH_ALL: &str = r#"{
    "^image\\/.*": {"adapter": "local", "template": "image-preview"},
    ".*": {"adapter": "local", "template": "file"}
}"#;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

fn load(store: MapSettings, root: &Path) -> UploadSettings {
    UploadSettings::load(&store, &StaticPaths::new(root, root.join("assets"))).unwrap()
}

fn stored(root: &Path, file: &FileDescriptor) -> std::path::PathBuf {
    root.join(&file.path)
}

fn pipeline() -> UploadPipeline {
    UploadPipelineBuilder::with_defaults().build()
}

#[tokio::test]
async fn test_png_is_resized_and_stored_locally() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new()
            .with("mimeTypes", IMAGES_LOCAL)
            .with("mustResize", "1")
            .with("resizeMaxWidth", "100"),
        root.path(),
    );

    let file = pipeline()
        .upload(
            FileDescriptor::new("photo.PNG"),
            UploadContent::from_bytes(png(400, 200)),
            "image/png",
            &settings,
        )
        .await
        .unwrap();

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let (dir, name) = file
        .path
        .split_once(std::path::MAIN_SEPARATOR)
        .expect("dated directory");
    assert_eq!(dir, today);
    let mut parts = name.splitn(3, '-');
    assert!(parts.next().unwrap().parse::<i64>().is_ok());
    assert!(parts.next().unwrap().parse::<u32>().is_ok());
    assert_eq!(parts.next(), Some("photo.PNG"));

    assert_eq!(file.adapter.as_deref(), Some("local"));
    assert_eq!(file.template.as_deref(), Some("image-preview"));
    assert_eq!(
        file.url.as_deref(),
        Some(format!("/assets/files/{}/{}", dir, name).as_str())
    );

    let written = std::fs::read(stored(root.path(), &file)).unwrap();
    assert_eq!(written.len() as u64, file.size.unwrap());
    let img = image::load_from_memory(&written).unwrap();
    assert_eq!(img.dimensions(), (100, 50));
}

#[tokio::test]
async fn test_corrupted_png_is_rejected_without_write() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(MapSettings::new().with("mimeTypes", IMAGES_LOCAL), root.path());

    let err = pipeline()
        .upload(
            FileDescriptor::new("broken.png"),
            UploadContent::from_bytes(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRgarbage".to_vec()),
            "image/png",
            &settings,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::CorruptedImage(_)));
    let today = Utc::now().format("%Y-%m-%d").to_string();
    assert!(!root.path().join(today).exists());
}

#[tokio::test]
async fn test_pdf_needs_catch_all_route() {
    let root = tempfile::tempdir().unwrap();

    let without = load(MapSettings::new().with("mimeTypes", IMAGES_LOCAL), root.path());
    let err = pipeline()
        .upload(
            FileDescriptor::new("manual.pdf"),
            UploadContent::from_bytes(b"%PDF-1.7\n".to_vec()),
            "application/pdf",
            &without,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::NoAdapterForMime(_)));

    let with = load(
        MapSettings::new().with("mimeTypes", IMAGES_AND_CATCH_ALL),
        root.path(),
    );
    let file = pipeline()
        .upload(
            FileDescriptor::new("manual.pdf"),
            UploadContent::from_bytes(b"%PDF-1.7\n".to_vec()),
            "application/pdf",
            &with,
        )
        .await
        .unwrap();
    assert_eq!(file.template.as_deref(), Some("file"));
    assert_eq!(file.mime_type.as_deref(), Some("application/pdf"));
    assert_eq!(
        std::fs::read(stored(root.path(), &file)).unwrap(),
        b"%PDF-1.7\n"
    );
}

#[tokio::test]
async fn test_spooled_upload_is_streamed_to_disk() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new().with("mimeTypes", IMAGES_AND_CATCH_ALL),
        root.path(),
    );
    let payload = vec![7u8; 64 * 1024];
    let content = UploadContent::spool(Cursor::new(payload.clone()))
        .await
        .unwrap();

    let file = pipeline()
        .upload(
            FileDescriptor::new("blob.bin"),
            content,
            "application/octet-stream",
            &settings,
        )
        .await
        .unwrap();

    assert_eq!(file.size, Some(payload.len() as u64));
    assert_eq!(std::fs::read(stored(root.path(), &file)).unwrap(), payload);
}

#[tokio::test]
async fn test_reencode_changes_extension_and_mime() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new()
            .with("mimeTypes", IMAGES_LOCAL)
            .with("mustEncode", "1")
            .with("encodeImageType", "webp"),
        root.path(),
    );

    let file = pipeline()
        .upload(
            FileDescriptor::new("photo.png"),
            UploadContent::from_bytes(png(32, 32)),
            "image/png",
            &settings,
        )
        .await
        .unwrap();

    assert!(file.path.ends_with("-photo.png.webp"));
    assert_eq!(file.mime_type.as_deref(), Some("image/webp"));
    let written = std::fs::read(stored(root.path(), &file)).unwrap();
    assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::WebP);
}

#[tokio::test]
async fn test_reencode_to_jpeg() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new()
            .with("mimeTypes", IMAGES_LOCAL)
            .with("mustEncode", "1")
            .with("encodeImageType", "jpg")
            .with("encodeQuality", "70"),
        root.path(),
    );

    let file = pipeline()
        .upload(
            FileDescriptor::new("scan.webp"),
            UploadContent::from_bytes(png(16, 16)),
            "image/png",
            &settings,
        )
        .await
        .unwrap();

    assert!(file.path.ends_with("-scan.webp.jpg"));
    assert_eq!(file.mime_type.as_deref(), Some("image/jpeg"));
    let written = std::fs::read(stored(root.path(), &file)).unwrap();
    assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
}

#[tokio::test]
async fn test_paths_are_unique() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(MapSettings::new().with("mimeTypes", IMAGES_LOCAL), root.path());
    let pipeline = pipeline();

    let mut paths = std::collections::HashSet::new();
    for _ in 0..5 {
        let file = pipeline
            .upload(
                FileDescriptor::new("same.png"),
                UploadContent::from_bytes(png(4, 4)),
                "image/png",
                &settings,
            )
            .await
            .unwrap();
        assert!(paths.insert(file.path));
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn test_delete_twice_is_ok() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(MapSettings::new().with("mimeTypes", IMAGES_LOCAL), root.path());
    let pipeline = pipeline();

    let file = pipeline
        .upload(
            FileDescriptor::new("gone.png"),
            UploadContent::from_bytes(png(4, 4)),
            "image/png",
            &settings,
        )
        .await
        .unwrap();
    let on_disk = stored(root.path(), &file);
    assert!(on_disk.exists());

    pipeline.delete(&file, "local", &settings).await.unwrap();
    assert!(!on_disk.exists());
    pipeline.delete(&file, "local", &settings).await.unwrap();
}

#[tokio::test]
async fn test_delete_rejects_escaping_path() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(MapSettings::new(), root.path());

    let err = pipeline()
        .delete(&FileDescriptor::stored("../outside.txt"), "local", &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, DeleteError::Forbidden(_)));
}

#[tokio::test]
async fn test_watermark_upload_is_stored_untouched() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new()
            .with("mimeTypes", IMAGES_LOCAL)
            .with("mustResize", "1")
            .with("resizeMaxWidth", "10"),
        root.path(),
    );
    let original = png(50, 50);

    let file = pipeline()
        .upload(
            FileDescriptor::new("mark.png").with_tag("watermark"),
            UploadContent::from_bytes(original.clone()),
            "image/png",
            &settings,
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(stored(root.path(), &file)).unwrap(), original);
}

#[tokio::test]
async fn test_watermark_upload_keeps_its_extension_when_encoding() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new()
            .with("mimeTypes", IMAGES_LOCAL)
            .with("mustEncode", "1")
            .with("encodeImageType", "jpg"),
        root.path(),
    );

    let file = pipeline()
        .upload(
            FileDescriptor::new("mark.png").with_tag("watermark"),
            UploadContent::from_bytes(png(8, 8)),
            "image/png",
            &settings,
        )
        .await
        .unwrap();

    assert!(file.path.ends_with("-mark.png"), "{}", file.path);
    assert_eq!(file.mime_type.as_deref(), Some("image/png"));
    let written = std::fs::read(stored(root.path(), &file)).unwrap();
    assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Png);
}

#[tokio::test]
async fn test_missing_watermark_file_is_configuration_error() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new()
            .with("mimeTypes", IMAGES_LOCAL)
            .with("addsWatermarks", "1")
            .with("watermark", "absent.png"),
        root.path(),
    );

    let err = pipeline()
        .upload(
            FileDescriptor::new("photo.png"),
            UploadContent::from_bytes(png(20, 20)),
            "image/png",
            &settings,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Configuration(_)));
}

/// Appends its name to the content and records the MIME type it saw.
struct Stamp {
    name: &'static str,
    seen: Arc<Mutex<Vec<String>>>,
    next_mime: Option<&'static str>,
}

#[async_trait]
impl UploadProcessor for Stamp {
    fn name(&self) -> &str {
        self.name
    }

    async fn process(
        &self,
        _file: &FileDescriptor,
        content: &mut UploadContent,
        mime_type: &mut String,
        _settings: &UploadSettings,
    ) -> Result<(), ProcessingError> {
        self.seen.lock().unwrap().push(mime_type.clone());
        let mut data = content.read_all().await?;
        data.extend_from_slice(self.name.as_bytes());
        content.replace(data).await?;
        if let Some(next) = self.next_mime {
            *mime_type = next.to_string();
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_custom_processors_run_in_order_before_routing() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new().with(
            "mimeTypes",
            r#"{"^text\\/markdown": {"adapter": "local", "template": "markdown"}}"#,
        ),
        root.path(),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));

    let pipeline = UploadPipelineBuilder::with_defaults()
        .register_processor(Arc::new(Stamp {
            name: "first",
            seen: seen.clone(),
            next_mime: Some("text/markdown"),
        }))
        .register_processor(Arc::new(Stamp {
            name: "second",
            seen: seen.clone(),
            next_mime: None,
        }))
        .build();
    assert_eq!(pipeline.processors().names(), vec!["image", "first", "second"]);

    let file = pipeline
        .upload(
            FileDescriptor::new("readme.txt"),
            UploadContent::from_bytes(b"# ".to_vec()),
            "text/plain",
            &settings,
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["text/plain", "text/markdown"]);
    assert_eq!(file.template.as_deref(), Some("markdown"));
    assert_eq!(
        std::fs::read(stored(root.path(), &file)).unwrap(),
        b"# firstsecond"
    );
}

#[tokio::test]
async fn test_failing_processor_leaves_nothing_behind() {
    struct Veto;

    #[async_trait]
    impl UploadProcessor for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        async fn process(
            &self,
            _file: &FileDescriptor,
            _content: &mut UploadContent,
            _mime_type: &mut String,
            _settings: &UploadSettings,
        ) -> Result<(), ProcessingError> {
            Err(ProcessingError::Other {
                stage: "veto".to_string(),
                source: anyhow::anyhow!("content policy"),
            })
        }
    }

    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new().with("mimeTypes", IMAGES_AND_CATCH_ALL),
        root.path(),
    );
    let pipeline = UploadPipeline::builder()
        .register_processor(Arc::new(Veto))
        .build();

    let err = pipeline
        .upload(
            FileDescriptor::new("a.txt"),
            UploadContent::from_bytes(b"x".to_vec()),
            "text/plain",
            &settings,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ProcessingFailed(_)));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_file_size_limit() {
    let root = tempfile::tempdir().unwrap();
    let settings = load(
        MapSettings::new()
            .with("mimeTypes", IMAGES_AND_CATCH_ALL)
            .with("maxFileSize", "1"),
        root.path(),
    );

    let err = pipeline()
        .upload(
            FileDescriptor::new("big.bin"),
            UploadContent::from_bytes(vec![0u8; 2048]),
            "application/octet-stream",
            &settings,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::FileTooLarge { size: 2048, max: 1024 }));
}
