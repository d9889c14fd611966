//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use traveltube_common::PageCache;
use traveltube_core::{
    CommentService, FeedComposer, FollowGraph, GroupService, ImageService, PostService,
    UserService,
};

/// Name of the cookie carrying the access token.
pub const TOKEN_COOKIE: &str = "token";

/// Largest response body the page cache will buffer.
const MAX_CACHED_BODY: usize = 2 * 1024 * 1024;

/// Whole-response cache for the global index.
#[derive(Clone)]
pub struct PageCacheState {
    pub cache: Arc<dyn PageCache>,
    pub ttl: Duration,
}

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub group_service: GroupService,
    pub image_service: ImageService,
    pub follow_graph: FollowGraph,
    pub feed_composer: FeedComposer,
    /// `None` when page caching is disabled.
    pub page_cache: Option<PageCacheState>,
}

/// Authentication middleware.
///
/// Resolves `Authorization: Bearer <token>` or the `token` cookie into a
/// `user::Model` request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(ToString::to_string);
    let token = bearer.or_else(|| jar.get(TOKEN_COOKIE).map(|c| c.value().to_string()));

    if let Some(token) = token
        && let Ok(user) = state.user_service.authenticate_by_token(&token).await
    {
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}

/// Serve the global index from the page cache, keyed by path and query.
///
/// Only successful responses are stored. Cache failures fall through to the
/// handler.
pub async fn page_cache_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(page_cache) = state.page_cache else {
        return next.run(req).await;
    };
    if req.method() != Method::GET || req.uri().path() != "/" {
        return next.run(req).await;
    }

    let key = req
        .uri()
        .path_and_query()
        .map_or_else(|| "/".to_string(), ToString::to_string);

    match page_cache.cache.get(&key).await {
        Ok(Some(page)) => {
            tracing::debug!(key = %key, "Page cache hit");
            return json_response(page.body);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(key = %key, error = %e, "Page cache read failed"),
    }

    let response = next.run(req).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer response for page cache");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Ok(body) = std::str::from_utf8(&bytes)
        && let Err(e) = page_cache.cache.set(&key, body, page_cache.ttl).await
    {
        tracing::warn!(key = %key, error = %e, "Page cache write failed");
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn json_response(body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
