//! HTTP layer for traveltube.
//!
//! - **Endpoints**: feeds, posts, comments, follows, identity and admin
//! - **Extractors**: authenticated, optional and administrator users
//! - **Middleware**: token authentication and the index page cache
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, PageCacheState};
