//! Media service: image upload validation and gallery attachment.

use std::io::Cursor;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use traveltube_common::{
    AppError, AppResult, FieldErrors, IdGenerator, MediaKind, StorageBackend, StoredFile,
    generate_storage_key,
};
use traveltube_db::{
    entities::{image, post_image},
    repositories::{ImageRepository, PostRepository},
};

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// JPEG format
    Jpeg,
    /// PNG format
    Png,
    /// WebP format
    WebP,
}

impl ImageKind {
    /// Get MIME type for this format.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    /// Get file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

/// Rejected upload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidImageFormat {
    /// Bytes are not a recognizable image.
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    NotAnImage,
    /// A real image, but not one of JPEG, PNG or WEBP.
    #[error("Unsupported image format. Allowed formats: JPEG, PNG, WEBP.")]
    Unsupported,
}

/// Check that `data` holds a JPEG, PNG or WEBP image with a readable header.
pub fn validate_image_format(data: &[u8]) -> Result<ImageKind, InvalidImageFormat> {
    let reader = ::image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| InvalidImageFormat::NotAnImage)?;

    let kind = match reader.format() {
        Some(::image::ImageFormat::Jpeg) => ImageKind::Jpeg,
        Some(::image::ImageFormat::Png) => ImageKind::Png,
        Some(::image::ImageFormat::WebP) => ImageKind::WebP,
        Some(_) => return Err(InvalidImageFormat::Unsupported),
        None => return Err(InvalidImageFormat::NotAnImage),
    };

    // Header must decode, not just the magic bytes.
    reader
        .into_dimensions()
        .map_err(|_| InvalidImageFormat::NotAnImage)?;

    Ok(kind)
}

/// A file received from a form field.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied file name, used for logging only.
    pub file_name: Option<String>,
    /// Raw bytes.
    pub data: Vec<u8>,
}

impl UploadedImage {
    /// Wrap raw bytes.
    #[must_use]
    pub const fn new(file_name: Option<String>, data: Vec<u8>) -> Self {
        Self { file_name, data }
    }
}

/// An upload whose format has been checked.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    /// Detected format.
    pub kind: ImageKind,
    /// Raw bytes.
    pub data: Vec<u8>,
}

/// Validate an upload, recording a message against `field` on failure.
pub fn validate_upload(
    field: &str,
    upload: UploadedImage,
    errors: &mut FieldErrors,
) -> Option<ValidatedImage> {
    match validate_image_format(&upload.data) {
        Ok(kind) => Some(ValidatedImage {
            kind,
            data: upload.data,
        }),
        Err(e) => {
            tracing::debug!(field, file_name = ?upload.file_name, error = %e, "Rejected upload");
            errors.add(field, e.to_string());
            None
        }
    }
}

/// Write validated images to storage.
///
/// If any write fails, files already written are removed before the error
/// is returned.
pub async fn store_images(
    storage: &dyn StorageBackend,
    kind: MediaKind,
    images: &[ValidatedImage],
) -> AppResult<Vec<StoredFile>> {
    let mut stored = Vec::with_capacity(images.len());
    for image in images {
        let key = generate_storage_key(kind, image.kind.extension());
        match storage
            .upload(&key, &image.data, image.kind.mime_type())
            .await
        {
            Ok(file) => stored.push(file),
            Err(e) => {
                discard_files(storage, &stored).await;
                return Err(e);
            }
        }
    }
    Ok(stored)
}

/// Best-effort removal of stored files.
pub async fn discard_files(storage: &dyn StorageBackend, files: &[StoredFile]) {
    for file in files {
        if let Err(e) = storage.delete(&file.key).await {
            tracing::warn!(key = %file.key, error = %e, "Failed to remove orphaned media file");
        }
    }
}

/// Administrator gallery management.
#[derive(Clone)]
pub struct ImageService {
    image_repo: ImageRepository,
    post_repo: PostRepository,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
}

impl ImageService {
    /// Create a new image service.
    #[must_use]
    pub fn new(
        image_repo: ImageRepository,
        post_repo: PostRepository,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            image_repo,
            post_repo,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Attach a gallery image to an existing post.
    pub async fn attach_image(
        &self,
        post_id: &str,
        upload: UploadedImage,
    ) -> AppResult<image::Model> {
        let mut errors = FieldErrors::new();
        let validated = validate_upload("image", upload, &mut errors);
        let Some(validated) = validated else {
            return Err(AppError::Validation(errors));
        };

        let post = self.post_repo.get_by_id(post_id).await?;

        let stored =
            store_images(self.storage.as_ref(), MediaKind::GalleryImage, &[validated]).await?;

        let Some(file) = stored.first() else {
            return Err(AppError::Internal("No image stored".to_string()));
        };

        let image_id = self.id_gen.generate();
        let image = image::ActiveModel {
            id: Set(image_id.clone()),
            key: Set(file.key.clone()),
            content_type: Set(file.content_type.clone()),
            created_at: Set(Utc::now().into()),
        };
        let link = post_image::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post.id.clone()),
            image_id: Set(image_id),
        };

        match self.image_repo.attach(image, link).await {
            Ok(created) => {
                tracing::info!(post_id = %post.id, image_id = %created.id, "Attached image");
                Ok(created)
            }
            Err(e) => {
                discard_files(self.storage.as_ref(), &stored).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub fn png_bytes() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        ::image::RgbImage::new(2, 2)
            .write_to(&mut out, ::image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    pub fn jpeg_bytes() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        ::image::RgbImage::new(2, 2)
            .write_to(&mut out, ::image::ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }

    /// The 1x1 GIF used for rejected uploads.
    pub const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x21, 0xf9,
        0x04, 0x01, 0x0a, 0x00, 0x01, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
        0x00, 0x02, 0x02, 0x4c, 0x01, 0x00, 0x3b,
    ];

    #[test]
    fn test_accepts_png_and_jpeg() {
        assert_eq!(validate_image_format(&png_bytes()), Ok(ImageKind::Png));
        assert_eq!(validate_image_format(&jpeg_bytes()), Ok(ImageKind::Jpeg));
    }

    #[test]
    fn test_rejects_gif() {
        assert_eq!(
            validate_image_format(SMALL_GIF),
            Err(InvalidImageFormat::Unsupported)
        );
    }

    #[test]
    fn test_rejects_text() {
        assert_eq!(
            validate_image_format(b"definitely not an image"),
            Err(InvalidImageFormat::NotAnImage)
        );
    }

    #[test]
    fn test_rejects_truncated_png() {
        let png = png_bytes();
        assert_eq!(
            validate_image_format(&png[..10]),
            Err(InvalidImageFormat::NotAnImage)
        );
    }

    #[test]
    fn test_validate_upload_records_field_error() {
        let mut errors = FieldErrors::new();
        let result = validate_upload(
            "images",
            UploadedImage::new(Some("small.gif".to_string()), SMALL_GIF.to_vec()),
            &mut errors,
        );

        assert!(result.is_none());
        assert_eq!(errors.get("images").unwrap().len(), 1);
    }

    #[test]
    fn test_kind_metadata() {
        assert_eq!(ImageKind::WebP.mime_type(), "image/webp");
        assert_eq!(ImageKind::Jpeg.extension(), "jpg");
    }
}
