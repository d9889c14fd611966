//! API response types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response.
    pub const fn ok(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// `302 Found` redirect.
#[derive(Debug, Clone)]
pub struct Found(pub String);

impl Found {
    /// Redirect to `location`.
    pub fn to(location: impl Into<String>) -> Self {
        Self(location.into())
    }
}

impl IntoResponse for Found {
    fn into_response(self) -> Response {
        match HeaderValue::try_from(self.0) {
            Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Redirect to the login page, returning to `uri` afterwards.
#[must_use]
pub fn login_redirect(uri: &Uri) -> Found {
    let next = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    Found::to(format!("/auth/login/?next={}", urlencoding::encode(&next)))
}

/// Profile path of a user.
#[must_use]
pub fn profile_path(username: &str) -> String {
    format!("/profile/{username}/")
}

/// Detail path of a post.
#[must_use]
pub fn post_path(post_id: &str) -> String {
    format!("/posts/{post_id}/")
}
