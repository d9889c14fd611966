//! API endpoints.

mod admin;
mod auth;
mod following;
mod forms;
mod posts;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(posts::router())
        .merge(following::router())
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
}
