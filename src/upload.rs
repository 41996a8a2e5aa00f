use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::Field;
use chrono::Utc;
use rand::Rng;

use crate::error::{AppError, AppResult};
use crate::files::{join_relative, FileStore};

pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;
pub const MAX_GENERATION_INPUT_BYTES: usize = 5 * 1024 * 1024;

/// An image part that passed the type and size gate but has not been
/// written to disk yet.
pub struct PendingImage {
    pub field_name: String,
    pub original_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A stored upload: the generated filename plus its store-relative path,
/// kept so error paths can remove it again.
pub struct StoredImage {
    pub filename: String,
    pub path: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Drain an image part from a multipart stream, rejecting disallowed MIME
/// types and oversized payloads before any controller logic runs.
pub async fn read_image_field(field: Field<'_>, size_limit: usize) -> AppResult<PendingImage> {
    let field_name = field.name().unwrap_or_default().to_string();
    let original_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();

    validate_image_type(&content_type)?;

    let bytes = field
        .bytes()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart data: {err}")))?
        .to_vec();

    validate_image_size(bytes.len(), size_limit)?;

    Ok(PendingImage {
        field_name,
        original_name,
        content_type,
        bytes,
    })
}

pub async fn store_image(
    files: &Arc<dyn FileStore>,
    dir: &str,
    image: PendingImage,
) -> AppResult<StoredImage> {
    let filename = generated_filename(&image.field_name, &image.original_name);
    let path = join_relative(dir, &filename);
    files.save(&path, &image.bytes).await?;
    Ok(StoredImage {
        filename,
        path,
        content_type: image.content_type,
        bytes: image.bytes,
    })
}

fn validate_image_type(content_type: &str) -> AppResult<()> {
    if ALLOWED_IMAGE_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(AppError::bad_request(
            "Only jpeg, png, or webp images are allowed",
        ))
    }
}

fn validate_image_size(len: usize, size_limit: usize) -> AppResult<()> {
    if len <= size_limit {
        Ok(())
    } else {
        Err(AppError::bad_request(format!(
            "File too large (max {}MB)",
            size_limit / 1024 / 1024
        )))
    }
}

/// Content type for a stored image filename, for inlining files that were
/// saved without their MIME type (print designs).
pub fn mime_from_extension(filename: &str) -> &'static str {
    match Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// Collision-resistant stored name: field, unix millis, random suffix, and
/// the original extension.
pub fn generated_filename(field_name: &str, original_name: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    format!("{field_name}-{millis}-{suffix}{extension}")
}
