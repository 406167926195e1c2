//! Places Backend - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod routes;
pub mod slug;
pub mod validation;

#[cfg(test)]
mod api_tests;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use config::{AppConfig, DEFAULT_JWT_SECRET};
use db::models::{Category, Place, PlaceImage, PlaceMenu, PlaceSocialMedia, Tag};
use db::{MemoryStore, PgStore, Store};
use routes::crud::{create, create_for_place, delete, list, list_for_place, retrieve, update};

/// Shared handler state. Cloned per request; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("places-backend/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            store,
            config: Arc::new(config),
            http,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local frontend dev servers.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Read-only endpoints, open to everyone.
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories/", get(list::<Category>))
        .route("/api/tags/", get(list::<Tag>))
        .route("/api/places/", get(routes::places::list_places))
        .route("/api/place/{id}/", get(routes::places::place_details))
        .route(
            "/api/rwanda-locations/",
            get(routes::locations::get_rwanda_locations),
        )
}

/// Management endpoints; every matched route requires a bearer token.
fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // categories
        .route("/api/admin/categories/", get(list::<Category>))
        .route("/api/admin/category/add/", post(create::<Category>))
        .route("/api/admin/category/{id}/", get(retrieve::<Category>))
        .route(
            "/api/admin/category/{id}/edit/",
            axum::routing::put(update::<Category>).patch(update::<Category>),
        )
        .route(
            "/api/admin/category/{id}/delete/",
            axum::routing::delete(delete::<Category>),
        )
        // tags
        .route("/api/admin/tags/", get(list::<Tag>))
        .route("/api/admin/tag/add/", post(create::<Tag>))
        .route("/api/admin/tag/{id}/", get(retrieve::<Tag>))
        .route(
            "/api/admin/tag/{id}/edit/",
            axum::routing::put(update::<Tag>).patch(update::<Tag>),
        )
        .route(
            "/api/admin/tag/{id}/delete/",
            axum::routing::delete(delete::<Tag>),
        )
        // places
        .route("/api/admin/places/", get(list::<Place>))
        .route("/api/admin/place/add/", post(create::<Place>))
        .route("/api/admin/place/{id}/", get(retrieve::<Place>))
        .route(
            "/api/admin/place/{id}/edit/",
            axum::routing::put(update::<Place>).patch(update::<Place>),
        )
        .route(
            "/api/admin/place/{id}/delete/",
            axum::routing::delete(delete::<Place>),
        )
        // place images
        .route(
            "/api/admin/place/{id}/images/",
            get(list_for_place::<PlaceImage>),
        )
        .route(
            "/api/admin/place/{id}/images/add/",
            post(create_for_place::<PlaceImage>),
        )
        .route("/api/admin/images/{id}/", get(retrieve::<PlaceImage>))
        .route(
            "/api/admin/images/{id}/edit/",
            axum::routing::put(update::<PlaceImage>).patch(update::<PlaceImage>),
        )
        .route(
            "/api/admin/images/{id}/delete/",
            axum::routing::delete(delete::<PlaceImage>),
        )
        // place social media
        .route(
            "/api/admin/places/{id}/social/",
            get(list_for_place::<PlaceSocialMedia>),
        )
        .route(
            "/api/admin/places/{id}/social/add/",
            post(create_for_place::<PlaceSocialMedia>),
        )
        .route("/api/admin/social/{id}/", get(retrieve::<PlaceSocialMedia>))
        .route(
            "/api/admin/social/{id}/edit/",
            axum::routing::put(update::<PlaceSocialMedia>).patch(update::<PlaceSocialMedia>),
        )
        .route(
            "/api/admin/social/{id}/delete/",
            axum::routing::delete(delete::<PlaceSocialMedia>),
        )
        // place menu
        .route(
            "/api/admin/place/{id}/menu/",
            get(list_for_place::<PlaceMenu>),
        )
        .route(
            "/api/admin/place/{id}/menu/add/",
            post(create_for_place::<PlaceMenu>),
        )
        .route("/api/admin/menu/{id}/", get(retrieve::<PlaceMenu>))
        .route(
            "/api/admin/menu/{id}/edit/",
            axum::routing::put(update::<PlaceMenu>).patch(update::<PlaceMenu>),
        )
        .route(
            "/api/admin/menu/{id}/delete/",
            axum::routing::delete(delete::<PlaceMenu>),
        )
        // media
        .route(
            "/api/admin/uploads/{kind}/",
            post(routes::uploads::upload_image),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    let max_body_bytes = state.config.max_body_bytes;
    let media = ServeDir::new(&state.config.media_root);

    Router::new()
        .merge(public_routes())
        .merge(admin_routes(&state))
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .nest_service("/media", media)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Uploads go up to 5 MB; the cap below covers them and everything else
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
}

/// Connects the configured store: PostgreSQL when `DATABASE_URL` is set,
/// otherwise the in-memory store.
async fn connect_store(config: &AppConfig) -> Result<Arc<dyn Store>, StartupError> {
    match &config.database {
        Some(db_config) => {
            let pool = db::init_pool(db_config).await?;
            db::run_migrations(&pool).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set. Running on the in-memory store; data is lost on restart."
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init(&logging::LogConfig::from_env());

    let config = AppConfig::from_env();

    // Refuse to start in production with the insecure default JWT secret.
    if config.is_production() && config.jwt_secret == DEFAULT_JWT_SECRET {
        return Err(StartupError::Config(
            "JWT_SECRET must be set to a secure, unique value in production. \
             Refusing to start with the default secret."
                .to_string(),
        ));
    }
    if config.locations.api_key.is_none() {
        tracing::warn!("LOCATIONS_API_KEY not set. Locations requests go out unauthenticated.");
    }

    tokio::fs::create_dir_all(&config.media_root).await?;

    let store = connect_store(&config).await?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| StartupError::Config(format!("invalid HOST/PORT configuration: {}", e)))?;

    let state = AppState::new(store, config)?;
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
