//! Administrator endpoints: groups, gallery images and the page cache.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{patch, post},
};
use traveltube_common::AppResult;
use traveltube_core::{CreateGroupInput, UpdateGroupInput};
use traveltube_db::entities::{group, image};

use crate::{
    endpoints::forms::read_image_field, extractors::AdminUser, middleware::AppState,
    response::ApiResponse,
};

/// Create a group.
async fn create_group(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(input): Json<CreateGroupInput>,
) -> AppResult<ApiResponse<group::Model>> {
    let group = state.group_service.create_group(input).await?;
    Ok(ApiResponse::ok(group))
}

/// Update a group's title or description.
async fn update_group(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<UpdateGroupInput>,
) -> AppResult<ApiResponse<group::Model>> {
    let group = state.group_service.update_group(&slug, input).await?;
    Ok(ApiResponse::ok(group))
}

/// Delete a group. Its posts stay.
async fn delete_group(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.group_service.delete_group(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attach a gallery image to a post.
async fn attach_image(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> AppResult<ApiResponse<image::Model>> {
    let upload = read_image_field(multipart).await?;
    let image = state.image_service.attach_image(&post_id, upload).await?;
    Ok(ApiResponse::ok(image))
}

/// Drop every cached page.
async fn clear_cache(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    if let Some(page_cache) = &state.page_cache {
        page_cache.cache.clear().await?;
        tracing::info!(user_id = %admin.id, "Cleared page cache");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups/", post(create_group))
        .route("/groups/{slug}/", patch(update_group).delete(delete_group))
        .route("/posts/{post_id}/images/", post(attach_image))
        .route("/cache/clear/", post(clear_cache))
}
