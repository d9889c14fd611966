//! Authentication endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::{Deserialize, Serialize};
use traveltube_common::AppResult;
use traveltube_core::CreateUserInput;
use traveltube_db::entities::user;

use crate::{
    extractors::AuthUser,
    middleware::{AppState, TOKEN_COOKIE},
    response::ApiResponse,
};

/// Signup request.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Where to go after logging in.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Session response.
#[derive(Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl SessionResponse {
    fn new(user: user::Model, next: Option<String>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            token: user.token.unwrap_or_default(),
            next,
        }
    }
}

/// Login page hint.
#[derive(Serialize)]
pub struct LoginHintResponse {
    pub login_url: &'static str,
    pub next: Option<String>,
}

fn token_cookie(token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Only same-site paths are honored as redirect targets.
///
/// Browsers read `//host` and `/\host` as protocol-relative URLs.
fn safe_next(next: Option<String>) -> Option<String> {
    next.filter(|n| {
        n.starts_with('/')
            && !matches!(n.as_bytes().get(1), Some(b'/' | b'\\'))
            && !n.chars().any(char::is_control)
    })
}

/// Create a new user account and log in.
async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> AppResult<(CookieJar, ApiResponse<SessionResponse>)> {
    let input = CreateUserInput {
        username: req.username,
        password: req.password,
    };

    let user = state.user_service.create(input).await?;
    let jar = match &user.token {
        Some(token) => jar.add(token_cookie(token.clone())),
        None => jar,
    };

    Ok((jar, ApiResponse::ok(SessionResponse::new(user, None))))
}

/// Describe how to log in, echoing the redirect target.
async fn login_hint(Query(query): Query<NextQuery>) -> ApiResponse<LoginHintResponse> {
    ApiResponse::ok(LoginHintResponse {
        login_url: "/auth/login/",
        next: safe_next(query.next),
    })
}

/// Log in with username and password.
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
    Json(req): Json<LoginRequest>,
) -> AppResult<(CookieJar, ApiResponse<SessionResponse>)> {
    let user = state
        .user_service
        .authenticate(&req.username, &req.password)
        .await?;
    tracing::debug!(user_id = %user.id, "User logged in");

    let jar = match &user.token {
        Some(token) => jar.add(token_cookie(token.clone())),
        None => jar,
    };
    Ok((
        jar,
        ApiResponse::ok(SessionResponse::new(user, safe_next(query.next))),
    ))
}

/// Log out by invalidating the current token.
async fn logout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, ApiResponse<bool>)> {
    state.user_service.regenerate_token(&user.id).await?;
    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/").build());
    Ok((jar, ApiResponse::ok(true)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup/", post(signup))
        .route("/login/", get(login_hint).post(login))
        .route("/logout/", post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/create/".into())), Some("/create/".into()));
        assert_eq!(safe_next(Some("//evil.example".into())), None);
        assert_eq!(safe_next(Some("https://evil.example".into())), None);
        assert_eq!(safe_next(Some("/\\evil.example".into())), None);
        assert_eq!(safe_next(Some("/\t/evil.example".into())), None);
        assert_eq!(
            safe_next(Some("/profile/leo/?page=2".into())),
            Some("/profile/leo/?page=2".into())
        );
        assert_eq!(safe_next(None), None);
    }
}
