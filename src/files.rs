//! Upload storage under the uploads root. Stored files are addressed by
//! browser-style URLs (`/uploads/...`) relative to that root's parent.

use anyhow::{anyhow, Context};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

pub const UPLOADS_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Certificate evidence: images or PDF.
    Document,
    /// Profile pictures: JPEG or PNG.
    ProfilePicture,
}

impl UploadKind {
    fn accepts(self, content_type: &str) -> bool {
        match self {
            UploadKind::Document => matches!(
                content_type,
                "image/jpeg" | "image/png" | "image/webp" | "application/pdf"
            ),
            UploadKind::ProfilePicture => {
                matches!(content_type, "image/jpeg" | "image/png" | "image/jpg")
            }
        }
    }

    pub fn rejection_message(self) -> &'static str {
        match self {
            UploadKind::Document => {
                "Invalid file type. Only JPEG, PNG, WebP and PDF files are allowed."
            }
            UploadKind::ProfilePicture => {
                "Unsupported file type. Please upload JPEG, JPG, or PNG only."
            }
        }
    }
}

pub fn content_type_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

#[derive(Debug)]
pub enum UploadRejection {
    Missing,
    TooLarge { limit: u64 },
    UnsupportedType(UploadKind),
}

impl UploadRejection {
    pub fn message(&self) -> String {
        match self {
            UploadRejection::Missing => "No file uploaded".to_string(),
            UploadRejection::TooLarge { limit } => {
                format!("File size exceeds {}MB limit", limit / (1024 * 1024))
            }
            UploadRejection::UnsupportedType(kind) => kind.rejection_message().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub url: String,
    pub filename: String,
    pub bytes: u64,
}

/// Checks an upload before anything is written. Returns the effective content type.
pub fn validate_upload(
    source: &Path,
    content_type: Option<&str>,
    kind: UploadKind,
    max_bytes: u64,
) -> Result<String, UploadRejection> {
    let meta = match std::fs::metadata(source) {
        Ok(m) if m.is_file() => m,
        _ => return Err(UploadRejection::Missing),
    };
    if meta.len() > max_bytes {
        return Err(UploadRejection::TooLarge { limit: max_bytes });
    }
    let ct = content_type
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .or_else(|| content_type_from_extension(source).map(str::to_string))
        .ok_or(UploadRejection::UnsupportedType(kind))?;
    if !kind.accepts(&ct) {
        return Err(UploadRejection::UnsupportedType(kind));
    }
    Ok(ct)
}

fn extension_for(kind: UploadKind, content_type: &str, source: &Path) -> String {
    match kind {
        // Profile pictures are named after the subtype (`image/png` -> `.png`).
        UploadKind::ProfilePicture => {
            let sub = content_type.split('/').nth(1).unwrap_or("jpg");
            format!(".{}", sub)
        }
        UploadKind::Document => source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default(),
    }
}

/// Copies `source` into the uploads root under a fresh uuid name.
pub fn store_upload(
    uploads_root: &Path,
    source: &Path,
    kind: UploadKind,
    content_type: &str,
) -> anyhow::Result<StoredUpload> {
    let (dir, url_dir) = match kind {
        UploadKind::Document => (uploads_root.to_path_buf(), UPLOADS_PREFIX.to_string()),
        UploadKind::ProfilePicture => (
            uploads_root.join("profiles"),
            format!("{}profiles/", UPLOADS_PREFIX),
        ),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;

    let filename = format!("{}{}", Uuid::new_v4(), extension_for(kind, content_type, source));
    let dst = dir.join(&filename);
    let bytes = std::fs::copy(source, &dst).with_context(|| {
        format!(
            "failed to copy upload from {} to {}",
            source.to_string_lossy(),
            dst.to_string_lossy()
        )
    })?;

    Ok(StoredUpload {
        url: format!("{}{}", url_dir, filename),
        filename,
        bytes,
    })
}

/// Maps `/uploads/...` to a path under `uploads_root`, refusing anything that
/// would escape it.
pub fn resolve_upload_url(uploads_root: &Path, url: &str) -> Option<PathBuf> {
    let rel = url.strip_prefix(UPLOADS_PREFIX)?;
    let rel = Path::new(rel);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(uploads_root.join(rel))
}

/// Deletes a stored upload. `Ok(false)` when the URL is not ours or the file is gone.
pub fn delete_upload(uploads_root: &Path, url: &str) -> anyhow::Result<bool> {
    let Some(path) = resolve_upload_url(uploads_root, url) else {
        return Ok(false);
    };
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "upload already gone");
        return Ok(false);
    }
    std::fs::remove_file(&path)
        .map_err(|e| anyhow!("failed to delete {}: {}", path.to_string_lossy(), e))?;
    tracing::info!(path = %path.display(), "upload deleted");
    Ok(true)
}

/// Old profile pictures are only removed when they are our own uploads and not
/// a shared placeholder.
pub fn is_replaceable_profile_picture(url: &str) -> bool {
    url.starts_with(UPLOADS_PREFIX) && !url.contains("placeholder")
}
