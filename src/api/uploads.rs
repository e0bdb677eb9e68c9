//! Admin image uploads.
//!
//! Images are kept in memory until the request that carries them has been
//! validated, then written to the managed upload directory and referenced
//! by their public `/uploads/<name>` path.

use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api::dto::ProductPayload;
use crate::api::error::{ApiError, ValidJson};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const UPLOAD_ROUTE: &str = "/uploads";

#[derive(Clone, Debug)]
pub struct ImageStore { dir: PathBuf }

#[derive(Debug, Clone)]
pub struct ImageUpload { pub file_name: Option<String>, pub content_type: String, pub bytes: Bytes }

/// An upload with its final name chosen but nothing written yet.
#[derive(Debug)]
pub struct PreparedImage { pub url: String, path: PathBuf, bytes: Bytes }

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn prepare(&self, upload: ImageUpload) -> PreparedImage {
        let name = stored_name(upload.file_name.as_deref());
        PreparedImage { url: format!("{UPLOAD_ROUTE}/{name}"), path: self.dir.join(name), bytes: upload.bytes }
    }

    pub async fn save(&self, upload: ImageUpload) -> Result<String, ApiError> {
        let prepared = self.prepare(upload);
        prepared.write().await?;
        Ok(prepared.url)
    }
}

impl PreparedImage {
    pub async fn write(&self) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| ApiError::Internal(format!("create upload dir: {e}")))?;
        }
        tokio::fs::write(&self.path, &self.bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("write {}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), size = self.bytes.len(), "image stored");
        Ok(())
    }

    /// Best effort; used when the row referencing the image could not be written.
    pub async fn discard(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "failed to remove orphaned image");
        }
    }
}

/// `image-<millis>-<random><ext>`, keeping only a short alphanumeric extension.
fn stored_name(original: Option<&str>) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    let suffix = Uuid::new_v4().as_u128() % 1_000_000_000;
    format!("image-{}-{}{}", Utc::now().timestamp_millis(), suffix, ext)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError { ApiError::Validation(e.body_text()) }

async fn read_image(field: Field<'_>) -> Result<ImageUpload, ApiError> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !content_type.starts_with("image/") {
        return Err(ApiError::Validation("Only image files are allowed".into()));
    }
    let file_name = field.file_name().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::TooLarge("Image must be 5MB or smaller".into()));
    }
    Ok(ImageUpload { file_name, content_type, bytes })
}

/// Multipart body with a single `image` file field.
pub struct ImageForm(pub ImageUpload);

#[axum::async_trait]
impl<S: Send + Sync> FromRequest<S> for ImageForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state).await.map_err(|e| ApiError::Validation(e.body_text()))?;
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            if field.name() == Some("image") && field.file_name().is_some() {
                return Ok(Self(read_image(field).await?));
            }
        }
        Err(ApiError::Validation("No image file uploaded".into()))
    }
}

/// Product fields sent either as JSON or as a multipart form with an
/// optional `image` file.
pub struct ProductForm { pub payload: ProductPayload, pub image: Option<ImageUpload> }

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequest<S> for ProductForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let ValidJson(payload) = ValidJson::<ProductPayload>::from_request(req, state).await?;
            return Ok(Self { payload, image: None });
        }

        let mut multipart = Multipart::from_request(req, state).await.map_err(|e| ApiError::Validation(e.body_text()))?;
        let mut fields = HashMap::new();
        let mut image = None;
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" && field.file_name().is_some() {
                image = Some(read_image(field).await?);
            } else {
                fields.insert(name, field.text().await.map_err(multipart_error)?);
            }
        }
        let payload = ProductPayload::from_form(&fields)?;
        payload.validate()?;
        Ok(Self { payload, image })
    }
}
