//! Multipart form parsing for post create/edit and image attachment.

use axum::extract::{Multipart, multipart::Field};
use traveltube_common::{AppError, AppResult};
use traveltube_core::UploadedImage;

/// Fields of the post create/edit form.
#[derive(Debug, Default)]
pub struct PostForm {
    /// `text` field.
    pub text: String,
    /// `group` field, the selected group ID.
    pub group: Option<String>,
    /// `image` file part.
    pub image: Option<UploadedImage>,
    /// Every `images` file part, in order.
    pub images: Vec<UploadedImage>,
}

/// Read a post form. Empty file inputs count as "no file".
pub async fn read_post_form(mut multipart: Multipart) -> AppResult<PostForm> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "text" => form.text = read_text(field).await?,
            "group" => {
                let group = read_text(field).await?;
                form.group = (!group.is_empty()).then_some(group);
            }
            "image" => form.image = read_file(field).await?,
            "images" => {
                if let Some(upload) = read_file(field).await? {
                    form.images.push(upload);
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// Read the single `image` field of an attachment form.
pub async fn read_image_field(mut multipart: Multipart) -> AppResult<UploadedImage> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("image")
            && let Some(upload) = read_file(field).await?
        {
            return Ok(upload);
        }
    }

    Err(AppError::field("image", "This field is required."))
}

async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

async fn read_file(field: Field<'_>) -> AppResult<Option<UploadedImage>> {
    let file_name = field
        .file_name()
        .filter(|n| !n.is_empty())
        .map(ToString::to_string);
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if data.is_empty() && file_name.is_none() {
        return Ok(None);
    }
    Ok(Some(UploadedImage::new(file_name, data.to_vec())))
}
