//! Following endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};
use traveltube_common::AppResult;
use traveltube_core::{FeedSource, FollowOutcome, UnfollowOutcome};

use crate::{
    endpoints::posts::{FeedResponse, PageQuery},
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Found, profile_path},
};

/// Posts by everyone the viewer follows.
async fn follow_index(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<FeedResponse>> {
    let page = state
        .feed_composer
        .compose_page(&FeedSource::Following(user.id.clone()), query.page.as_deref())
        .await?;
    let page_obj = state.post_service.summarize(page).await?;
    Ok(ApiResponse::ok(FeedResponse { page_obj }))
}

/// Follow an author.
async fn profile_follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Found> {
    let author = state.user_service.get_by_username(&username).await?;
    let outcome = state.follow_graph.follow(&user.id, &author.id).await?;
    if outcome != FollowOutcome::Followed {
        tracing::debug!(user_id = %user.id, author_id = %author.id, ?outcome, "Follow was a no-op");
    }
    Ok(Found::to(profile_path(&author.username)))
}

/// Unfollow an author.
async fn profile_unfollow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Found> {
    let author = state.user_service.get_by_username(&username).await?;
    let outcome = state.follow_graph.unfollow(&user.id, &author.id).await?;
    if outcome == UnfollowOutcome::NotFollowing {
        tracing::debug!(user_id = %user.id, author_id = %author.id, "Unfollow was a no-op");
    }
    Ok(Found::to(profile_path(&author.username)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(follow_index))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
}
