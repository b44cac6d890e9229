//! Shared path generation for storage backends.
//!
//! Path format: `{YYYY-MM-DD}{sep}{unix_seconds}-{microseconds}-{base_name}`, with
//! the re-encode extension appended when the stored image was re-encoded.

use chrono::{DateTime, Utc};
use upload_core::constants::ENCODABLE_EXTENSIONS;
use upload_core::EncodeSettings;

const MAX_BASE_NAME: usize = 255;

/// Generate the storage path for an upload.
///
/// All backends must use this format; `separator` comes from the adapter.
/// `mime_type` is the type after processing: the target extension is only
/// appended when it matches the configured encode format.
pub fn generate_path(
    now: DateTime<Utc>,
    base_name: &str,
    separator: char,
    mime_type: &str,
    encode: &EncodeSettings,
) -> String {
    let name = sanitize_filename(base_name);
    let mut path = format!(
        "{}{}{}-{}-{}",
        now.format("%Y-%m-%d"),
        separator,
        now.timestamp(),
        now.timestamp_subsec_micros(),
        name
    );

    if encode.enabled && mime_type == encode.format.mime_type() && is_encodable(&name) {
        path.push('.');
        path.push_str(encode.format.extension());
    }

    path
}

/// Extension check against the re-encode whitelist, case-insensitive.
pub fn is_encodable(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ENCODABLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Keep only the final component of a client-supplied name and replace
/// anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let sanitized: String = base
        .chars()
        .take(MAX_BASE_NAME)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}
