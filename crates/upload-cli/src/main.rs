//! `upload`: store or delete one file through the upload pipeline.
//!
//! Settings come from `UPLOAD_*` environment variables (a `.env` file is
//! read first); `UPLOAD_STORAGE_ROOT` and `UPLOAD_ASSET_DIR` set the local
//! directories.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use upload_cli::{base_name, declared_mime, init_tracing, paths_from_env};
use upload_core::{EnvSettings, ErrorMetadata, FileDescriptor, UploadContent, UploadSettings};
use upload_processing::UploadPipelineBuilder;

#[derive(Parser)]
#[command(name = "upload", about = "Forum upload pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process and store a local file
    Upload {
        /// Path to the file to upload
        file: std::path::PathBuf,
        /// Declared MIME type (guessed from the extension if omitted)
        #[arg(long)]
        mime: Option<String>,
        /// Tag attached to the descriptor, e.g. "avatar" or "watermark"
        #[arg(long)]
        tag: Option<String>,
    },
    /// Delete a stored file
    Delete {
        /// Adapter key that stored the file
        #[arg(long)]
        adapter: String,
        /// Storage path returned by the upload
        #[arg(long)]
        path: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = UploadSettings::load(&EnvSettings::new(), &paths_from_env())
        .context("Failed to load upload settings")?;
    let pipeline = UploadPipelineBuilder::with_defaults().build();

    match cli.command {
        Commands::Upload { file, mime, tag } => {
            let mime_type = declared_mime(&file, mime.as_deref());
            let handle = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let content = UploadContent::spool(handle)
                .await
                .context("Failed to spool upload")?;

            let mut descriptor = FileDescriptor::new(base_name(&file));
            descriptor.tag = tag;

            let stored = pipeline
                .upload(descriptor, content, &mime_type, &settings)
                .await
                .map_err(|e| {
                    tracing::error!(code = e.error_code(), error = %e, "Upload failed");
                    e
                })
                .with_context(|| format!("Upload of {} failed", file.display()))?;
            print_json(&stored)?;
        }
        Commands::Delete { adapter, path } => {
            let descriptor = FileDescriptor::stored(path);
            if let Err(e) = pipeline.delete(&descriptor, &adapter, &settings).await {
                tracing::error!(code = e.error_code(), error = %e, "Delete failed");
                return Err(e.into());
            }
            print_json(&serde_json::json!({ "deleted": descriptor.path, "adapter": adapter }))?;
        }
    }

    Ok(())
}
