//! Feed, post and comment endpoints.

use axum::{
    Form, Router,
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use traveltube_common::{AppError, AppResult};
use traveltube_core::{
    AddCommentInput, CreatePostInput, EditOutcome, EditPostInput, FeedSource, Page, PostDetail,
    PostSummary,
};
use traveltube_db::entities::{group, post, user};

use crate::{
    endpoints::forms::read_post_form,
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, Found, post_path, profile_path},
};

/// `?page=` cursor. Kept as a string so bad values fall back to page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Raw 1-based page number.
    pub page: Option<String>,
}

/// A feed page.
#[derive(Serialize)]
pub struct FeedResponse {
    /// The requested page.
    pub page_obj: Page<PostSummary>,
}

/// Group feed.
#[derive(Serialize)]
pub struct GroupFeedResponse {
    /// The group being browsed.
    pub group: group::Model,
    /// The requested page of its posts.
    pub page_obj: Page<PostSummary>,
}

/// Author profile.
#[derive(Serialize)]
pub struct ProfileResponse {
    /// Profile owner.
    pub author: user::Model,
    /// The requested page of their posts.
    pub page_obj: Page<PostSummary>,
    /// Total posts by the author.
    pub posts_count: u64,
    /// Users following the author.
    pub followers_count: u64,
    /// Authors the author follows.
    pub following_count: u64,
    /// Whether the viewer follows this author.
    pub following: bool,
}

/// Context for the create/edit form.
#[derive(Serialize)]
pub struct PostFormResponse {
    /// Whether the form edits an existing post.
    pub is_edit: bool,
    /// Group choices.
    pub groups: Vec<group::Model>,
    /// Current values when editing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<post::Model>,
}

/// Comment form.
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    /// Comment body.
    #[serde(default)]
    pub text: String,
}

/// Global feed, newest first.
async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<FeedResponse>> {
    let page = state
        .feed_composer
        .compose_page(&FeedSource::All, query.page.as_deref())
        .await?;
    let page_obj = state.post_service.summarize(page).await?;
    Ok(ApiResponse::ok(FeedResponse { page_obj }))
}

/// Posts of one group.
async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<GroupFeedResponse>> {
    let group = state.group_service.get_by_slug(&slug).await?;
    let page = state
        .feed_composer
        .compose_page(&FeedSource::Group(group.id.clone()), query.page.as_deref())
        .await?;
    let page_obj = state.post_service.summarize(page).await?;
    Ok(ApiResponse::ok(GroupFeedResponse { group, page_obj }))
}

/// An author's posts with follow state and counters.
async fn profile(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<ProfileResponse>> {
    let author = state.user_service.get_by_username(&username).await?;
    let page = state
        .feed_composer
        .compose_page(&FeedSource::Author(author.id.clone()), query.page.as_deref())
        .await?;
    let posts_count = page.total_items;
    let page_obj = state.post_service.summarize(page).await?;

    let following = match &viewer {
        Some(viewer) => state.follow_graph.is_following(&viewer.id, &author.id).await?,
        None => false,
    };
    let followers_count = state.follow_graph.follower_count(&author.id).await?;
    let following_count = state.follow_graph.following_count(&author.id).await?;

    Ok(ApiResponse::ok(ProfileResponse {
        author,
        page_obj,
        posts_count,
        followers_count,
        following_count,
        following,
    }))
}

/// A single post with images and comments.
async fn post_detail(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostDetail>> {
    let detail = state.post_service.post_detail(&post_id).await?;
    Ok(ApiResponse::ok(detail))
}

/// Empty create form.
async fn create_form(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<PostFormResponse>> {
    let groups = state.group_service.list_groups().await?;
    Ok(ApiResponse::ok(PostFormResponse {
        is_edit: false,
        groups,
        post: None,
    }))
}

/// Create a post and go to the author's profile.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Found> {
    let form = read_post_form(multipart).await?;
    let input = CreatePostInput {
        text: form.text,
        group_id: form.group,
        image: form.image,
        images: form.images,
    };

    state.post_service.create_post(&user, input).await?;
    Ok(Found::to(profile_path(&user.username)))
}

/// Edit form prefilled with the post. Non-authors go to the detail view.
async fn edit_form(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let Some(post) = state.post_service.editable(&user, &post_id).await? else {
        return Ok(Found::to(post_path(&post_id)).into_response());
    };

    let groups = state.group_service.list_groups().await?;
    Ok(ApiResponse::ok(PostFormResponse {
        is_edit: true,
        groups,
        post: Some(post),
    })
    .into_response())
}

/// Apply an edit and go to the detail view.
async fn edit(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> AppResult<Found> {
    let form = read_post_form(multipart).await?;
    let input = EditPostInput {
        text: form.text,
        group_id: form.group,
        image: form.image,
    };

    match state.post_service.edit_post(&user, &post_id, input).await? {
        EditOutcome::NotAuthor => tracing::debug!(post_id = %post_id, "Edit by non-author ignored"),
        EditOutcome::Updated(_) => {}
    }
    Ok(Found::to(post_path(&post_id)))
}

/// Add a comment and go to the detail view. Blank comments are dropped.
async fn add_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Found> {
    let input = AddCommentInput { text: form.text };
    match state.comment_service.add_comment(&user, &post_id, input).await {
        Ok(_) => {}
        Err(AppError::Validation(fields)) => {
            tracing::debug!(post_id = %post_id, errors = %fields, "Dropped invalid comment");
        }
        Err(e) => return Err(e),
    }
    Ok(Found::to(post_path(&post_id)))
}

/// Delete a post and go to its author's profile.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Found> {
    let author = state.post_service.delete_post(&user, &post_id).await?;
    Ok(Found::to(profile_path(&author.username)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/create/", get(create_form).post(create))
        .route("/posts/{post_id}/", get(post_detail))
        .route("/posts/{post_id}/edit/", get(edit_form).post(edit))
        .route("/posts/{post_id}/comment/", post(add_comment))
        .route("/posts/{post_id}/delete/", post(delete))
}
