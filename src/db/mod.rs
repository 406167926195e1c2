pub mod memory;
pub mod models;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::validation::FieldErrors;
use models::{Category, Entity, ListFilter, Place, PlaceImage, PlaceMenu, PlaceSocialMedia, Tag};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("row not found")]
    NotFound,
    #[error("invalid data: {0}")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        DbError::Invalid(FieldErrors::single(field, message))
    }

    pub fn missing_pk(field: &str, id: i64) -> Self {
        Self::invalid(field, format!("Invalid pk \"{id}\" - object does not exist."))
    }

    pub fn duplicate<E: Entity>(field: &str) -> Self {
        Self::invalid(field, format!("{} with this {field} already exists.", E::NOUN))
    }
}

/// CRUD access to one entity. Handlers only ever talk to this interface.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// All matching rows, newest first.
    async fn list(&self, filter: ListFilter) -> Result<Vec<E>, DbError>;
    async fn get(&self, id: i64) -> Result<E, DbError>;
    async fn create(&self, input: E::New) -> Result<E, DbError>;
    async fn update(&self, id: i64, patch: E::Patch) -> Result<E, DbError>;
    async fn delete(&self, id: i64) -> Result<(), DbError>;
}

/// Every repository the API needs, behind one handle.
#[async_trait]
pub trait Store: Send + Sync {
    fn categories(&self) -> &dyn Repository<Category>;
    fn tags(&self) -> &dyn Repository<Tag>;
    fn places(&self) -> &dyn Repository<Place>;
    fn place_images(&self) -> &dyn Repository<PlaceImage>;
    fn social_media(&self) -> &dyn Repository<PlaceSocialMedia>;
    fn menu_items(&self) -> &dyn Repository<PlaceMenu>;

    /// Round-trip to the backing store; returns how long it took.
    async fn ping(&self) -> Result<Duration, DbError>;
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/places".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

pub async fn init_pool(config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Initializing database connection pool...");
    tracing::debug!(
        "Database URL: {}",
        config.url.replace(
            |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
            "*"
        )
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    Ok(pool)
}

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        slug VARCHAR(255) NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        image TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT categories_name_key UNIQUE (name),
        CONSTRAINT categories_slug_key UNIQUE (slug)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        slug VARCHAR(255) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT tags_name_key UNIQUE (name),
        CONSTRAINT tags_slug_key UNIQUE (slug)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS places (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        slug VARCHAR(255) NOT NULL,
        description TEXT,
        category_id BIGINT REFERENCES categories(id) ON DELETE SET NULL,
        province VARCHAR(255),
        district VARCHAR(255),
        sector VARCHAR(255),
        cell VARCHAR(255),
        village VARCHAR(255),
        address VARCHAR(255),
        latitude DOUBLE PRECISION CHECK (latitude BETWEEN -90 AND 90),
        longitude DOUBLE PRECISION CHECK (longitude BETWEEN -180 AND 180),
        views BIGINT NOT NULL DEFAULT 0 CHECK (views >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT places_slug_key UNIQUE (slug)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_places_category_id ON places(category_id)",
    r#"
    CREATE TABLE IF NOT EXISTS place_tags (
        place_id BIGINT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
        tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (place_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS place_images (
        id BIGSERIAL PRIMARY KEY,
        place_id BIGINT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
        image TEXT NOT NULL,
        caption VARCHAR(255),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_place_images_place_id ON place_images(place_id)",
    r#"
    CREATE TABLE IF NOT EXISTS place_social_media (
        id BIGSERIAL PRIMARY KEY,
        place_id BIGINT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
        phone_number VARCHAR(20),
        email VARCHAR(254),
        instagram VARCHAR(200),
        tiktok VARCHAR(200),
        twitter VARCHAR(200),
        website VARCHAR(200),
        facebook VARCHAR(200),
        whatsapp VARCHAR(200),
        CONSTRAINT place_social_media_place_id_key UNIQUE (place_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS place_menu (
        id BIGSERIAL PRIMARY KEY,
        place_id BIGINT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
        name VARCHAR(255) NOT NULL,
        description TEXT,
        price NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_place_menu_place_id ON place_menu(place_id)",
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    for &statement in MIGRATIONS {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database migrations completed successfully");

    Ok(())
}
