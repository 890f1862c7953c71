//! Review CMS - block-based article service, library for app logic and testing

pub mod blocks;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod render;
pub mod routes;
pub mod store;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::store::{ArticleStore, MemoryArticleStore, PgArticleStore};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn ArticleStore>, config: ServerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// State backed by an empty in-memory store.
    pub fn in_memory(config: ServerConfig) -> Self {
        Self::new(Arc::new(MemoryArticleStore::new()), config)
    }
}

/// CORS restricted to the configured origins. Unparseable origins are
/// skipped.
pub fn configure_cors(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config);

    Router::new()
        .route(
            "/api/articles",
            get(routes::articles::list_articles).post(routes::articles::create_article),
        )
        .route(
            "/api/articles/{slug}",
            get(routes::articles::get_article)
                .put(routes::articles::update_article)
                .delete(routes::articles::delete_article),
        )
        .route(
            "/api/articles/{slug}/flat",
            get(routes::articles::get_flat_article),
        )
        .route("/articles/{slug}", get(routes::pages::article_page))
        .route(
            "/api/upload",
            get(routes::upload::list_images).post(routes::upload::upload_image).layer(
                DefaultBodyLimit::max(routes::upload::MAX_UPLOAD_BODY),
            ),
        )
        .route(
            "/api/upload/{filename}",
            axum::routing::delete(routes::upload::delete_image),
        )
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Global body cap; must stay above `MAX_UPLOAD_BODY`
        .layer(RequestBodyLimitLayer::new(8 * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}

/// Pick the article store: PostgreSQL when `DATABASE_URL` is set and
/// reachable, otherwise the in-memory store.
async fn select_store() -> Arc<dyn ArticleStore> {
    if std::env::var("DATABASE_URL").is_err() {
        tracing::warn!("DATABASE_URL not set. Using in-memory article store.");
        return Arc::new(MemoryArticleStore::new());
    }

    match db::init_pool(None).await {
        Ok(pool) => match db::run_migrations(&pool).await {
            Ok(()) => Arc::new(PgArticleStore::new(pool)),
            Err(e) => {
                tracing::error!("Failed to run database migrations: {}. Using in-memory store.", e);
                Arc::new(MemoryArticleStore::new())
            }
        },
        Err(e) => {
            tracing::warn!(
                "Failed to initialize database pool: {}. Using in-memory store.",
                e
            );
            Arc::new(MemoryArticleStore::new())
        }
    }
}

/// Run the server (used by main).
pub async fn run() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // Dropping the guards stops the background log writers.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    let config = ServerConfig::from_env();
    let addr: SocketAddr = config
        .socket_addr()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let store = select_store().await;
    tracing::info!(backend = store.backend_name(), "article store ready");

    let app = create_app(AppState::new(store, config));

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
