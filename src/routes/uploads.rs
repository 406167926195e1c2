/**
 * Upload Routes
 * Image uploads for categories and places, stored under MEDIA_ROOT and
 * served back from /media/
 */
use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::ApiError;
use crate::routes::Envelope;
use crate::slug::slugify;
use crate::validation::{FieldErrors, REQUIRED};
use crate::AppState;

const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
const INVALID_UPLOAD: &str = "Failed to upload image. Please review the input data.";

/// Public URL prefix of stored media.
pub const MEDIA_URL: &str = "/media/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Categories,
    Places,
}

impl UploadKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "categories" => Some(UploadKind::Categories),
            "places" => Some(UploadKind::Places),
            _ => None,
        }
    }

    fn directory(self) -> &'static str {
        match self {
            UploadKind::Categories => "categories",
            UploadKind::Places => "places",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            UploadKind::Categories => "category",
            UploadKind::Places => "place",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Relative to MEDIA_ROOT; this is what goes in an `image` field.
    pub path: String,
    pub url: String,
    pub size: usize,
    pub mime_type: String,
}

fn invalid(field: &str, message: &str) -> ApiError {
    ApiError::validation(INVALID_UPLOAD, FieldErrors::single(field, message))
}

fn validate_image_magic_bytes(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn get_extension_from_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// `<kind>/<prefix>_<slug(name)>_<YYYYmmddHHMMSS>`, without extension.
pub fn stored_stem(kind: UploadKind, name: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}_{}_{}",
        kind.directory(),
        kind.prefix(),
        slugify(name, kind.prefix()),
        now.format("%Y%m%d%H%M%S")
    )
}

/// Writes `bytes` to the first free `<stem>.<ext>`, `<stem>-2.<ext>`, ...
/// under `root` and returns the relative path used.
async fn save_unique(root: &FsPath, stem: &str, ext: &str, bytes: &[u8]) -> std::io::Result<String> {
    let mut attempt = 1u32;
    loop {
        let relative = if attempt == 1 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem}-{attempt}.{ext}")
        };
        let full = root.join(&relative);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
        {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                return Ok(relative);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// POST /api/admin/uploads/{kind}/ (multipart: `name`, `file`)
pub async fn upload_image(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let kind = UploadKind::parse(&kind)
        .ok_or_else(|| ApiError::NotFound(format!("Upload target \"{kind}\" not found.")))?;

    let mut name: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Multipart error: {}", e);
                return Err(invalid("file", "Invalid multipart data."));
            }
        };
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => {
                let text = field.text().await.map_err(|e| {
                    tracing::error!("Failed to read upload name: {}", e);
                    invalid("name", "Not a valid string.")
                })?;
                name = Some(text.trim().to_string()).filter(|n| !n.is_empty());
            }
            "file" => {
                let original = field.file_name().unwrap_or("unknown").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    tracing::error!("Failed to read upload bytes: {}", e);
                    invalid("file", "Failed to read file data.")
                })?;
                file = Some((original, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let mut errors = FieldErrors::new();
    if name.is_none() {
        errors.add("name", REQUIRED);
    }
    if file.is_none() {
        errors.add("file", "No file was submitted.");
    }
    let (Some(name), Some((original_name, bytes))) = (name, file) else {
        return Err(ApiError::validation(INVALID_UPLOAD, errors));
    };

    let original_ext = original_name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&original_ext.as_str()) {
        return Err(invalid(
            "file",
            "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.",
        ));
    }
    if bytes.is_empty() {
        return Err(invalid("file", "The submitted file is empty."));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(invalid("file", "File too large. Maximum size is 5MB."));
    }
    let mime_type = validate_image_magic_bytes(&bytes).ok_or_else(|| {
        invalid("file", "File content does not match an allowed image type.")
    })?;

    let stem = stored_stem(kind, &name, Utc::now());
    let ext = get_extension_from_mime(mime_type);
    let path = save_unique(&state.config.media_root, &stem, ext, &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to save upload {}: {}", stem, e)))?;

    tracing::info!("Image uploaded: {} ({} bytes)", path, bytes.len());

    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(
            "Image uploaded successfully.",
            UploadResponse {
                url: format!("{MEDIA_URL}{path}"),
                path,
                size: bytes.len(),
                mime_type: mime_type.to_string(),
            },
        )),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use chrono::TimeZone;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const BOUNDARY: &str = "X-PLACES-BOUNDARY";

    fn multipart_body(name: Option<&str>, file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(name) = name {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn upload(kind: &str, body: Vec<u8>, media_root: &FsPath) -> (StatusCode, Value) {
        let mut config = AppConfig::for_tests();
        config.media_root = media_root.to_path_buf();
        let state = AppState::new(Arc::new(MemoryStore::new()), config).unwrap();
        let app = Router::new()
            .route("/uploads/{kind}/", post(upload_image))
            .with_state(state);
        let req = Request::post(format!("/uploads/{kind}/"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn temp_media(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("places-media-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn test_validate_magic_bytes() {
        assert_eq!(validate_image_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(validate_image_magic_bytes(PNG), Some("image/png"));
        assert_eq!(validate_image_magic_bytes(b"GIF89a"), Some("image/gif"));
        assert_eq!(validate_image_magic_bytes(b"<svg></svg>"), None);
        assert_eq!(validate_image_magic_bytes(&[0xFF]), None);
    }

    #[test]
    fn test_stored_stem() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            stored_stem(UploadKind::Places, "Kigali Club", now),
            "places/place_kigali-club_20240309140507"
        );
        assert_eq!(
            stored_stem(UploadKind::Categories, "Food & Drinks", now),
            "categories/category_food-drinks_20240309140507"
        );
    }

    #[tokio::test]
    async fn test_save_unique_appends_suffix() {
        let root = temp_media("unique");
        let first = save_unique(&root, "places/place_x_1", "png", PNG).await.unwrap();
        let second = save_unique(&root, "places/place_x_1", "png", PNG).await.unwrap();
        assert_eq!(first, "places/place_x_1.png");
        assert_eq!(second, "places/place_x_1-2.png");
        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn test_upload_place_image() {
        let root = temp_media("upload");
        let body = multipart_body(Some("Kigali Club"), Some(("front.png", PNG)));
        let (status, json) = upload("places", body, &root).await;
        assert_eq!(status, StatusCode::CREATED);
        let path = json["data"]["path"].as_str().unwrap().to_string();
        assert!(path.starts_with("places/place_kigali-club_"));
        assert!(path.ends_with(".png"));
        assert_eq!(json["data"]["url"], format!("/media/{path}"));
        assert!(root.join(&path).exists());
        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images() {
        let root = temp_media("reject");
        let body = multipart_body(Some("Menu"), Some(("menu.png", b"plain text, not a png")));
        let (status, json) = upload("categories", body, &root).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["errors"]["file"][0],
            "File content does not match an allowed image type."
        );
    }

    #[tokio::test]
    async fn test_upload_requires_name_and_file() {
        let root = temp_media("missing");
        let (status, json) = upload("places", multipart_body(None, None), &root).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"]["name"][0], REQUIRED);
        assert!(json["errors"]["file"].is_array());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_not_found() {
        let root = temp_media("kind");
        let body = multipart_body(Some("x"), Some(("x.png", PNG)));
        let (status, _) = upload("users", body, &root).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
