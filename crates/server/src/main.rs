//! Traveltube server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, middleware};
use fred::prelude::*;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use traveltube_api::{AppState, PageCacheState, router as api_router};
use traveltube_common::{
    AppError, Config, LocalStorage, MemoryPageCache, PageCache, RedisPageCache, StorageBackend,
    config::{CacheBackendKind, LogFormat},
};
use traveltube_core::{
    CommentService, FeedComposer, FollowGraph, GroupService, ImageService, PostService,
    UserService,
};
use traveltube_db::repositories::{
    CommentRepository, FollowRepository, GroupRepository, ImageRepository, PostRepository,
    UserRepository,
};

/// Largest accepted request body (multipart uploads included).
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "traveltube=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Build the page cache selected by configuration.
async fn init_page_cache(config: &Config) -> Result<Option<PageCacheState>, AppError> {
    if !config.cache.enabled {
        info!("Page cache disabled");
        return Ok(None);
    }

    let cache: Arc<dyn PageCache> = match config.cache.backend {
        CacheBackendKind::Memory => {
            info!(max_entries = config.cache.max_entries, "Using in-memory page cache");
            Arc::new(MemoryPageCache::with_max_entries(config.cache.max_entries))
        }
        CacheBackendKind::Redis => {
            let url = config.cache.redis_url.as_deref().ok_or_else(|| {
                AppError::Config("cache.redis_url is required for the redis backend".to_string())
            })?;

            info!("Connecting to Redis...");
            let fred_config = fred::types::config::Config::from_url(url)
                .map_err(|e| AppError::Config(format!("Invalid Redis URL: {e}")))?;
            let fred_client = fred::clients::Client::new(fred_config, None, None, None);
            fred_client.connect();
            fred_client
                .wait_for_connect()
                .await
                .map_err(|e| AppError::Cache(format!("Failed to connect to Redis: {e}")))?;
            info!("Connected to Redis page cache");

            Arc::new(RedisPageCache::new(
                Arc::new(fred_client),
                &config.cache.prefix,
            ))
        }
    };

    Ok(Some(PageCacheState {
        cache,
        ttl: Duration::from_secs(config.cache.index_ttl_secs),
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;
    init_tracing(config.logging.format);

    info!("Starting traveltube server...");

    // Connect to database
    let db = traveltube_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    traveltube_db::migrate(&db).await?;
    info!("Migrations completed");

    let page_cache = init_page_cache(&config).await?;

    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        config.media.root.clone(),
        config.media.base_url.clone(),
    ));

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let group_repo = GroupRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let follow_repo = FollowRepository::new(Arc::clone(&db));
    let image_repo = ImageRepository::new(Arc::clone(&db));

    // Initialize services
    let follow_graph = FollowGraph::new(follow_repo, user_repo.clone());
    let feed_composer = FeedComposer::new(
        post_repo.clone(),
        follow_graph.clone(),
        config.feed.page_size,
    );
    let post_service = PostService::new(
        post_repo.clone(),
        group_repo.clone(),
        user_repo.clone(),
        comment_repo.clone(),
        Arc::clone(&storage),
    );
    let comment_service = CommentService::new(comment_repo, post_repo.clone());
    let image_service = ImageService::new(image_repo, post_repo, storage);

    let state = AppState {
        user_service: UserService::new(user_repo),
        post_service,
        comment_service,
        group_service: GroupService::new(group_repo),
        image_service,
        follow_graph,
        feed_composer,
        page_cache,
    };

    // Build router
    let app = api_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            traveltube_api::middleware::page_cache_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            traveltube_api::middleware::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!(url = %config.server.url, "Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
