pub mod models;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;

use crate::store::postgres::text_table_names;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/review_cms".to_string()),
            max_connections: env_or("DB_POOL_MAX", 10),
            min_connections: env_or("DB_POOL_MIN", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", 300),
        }
    }
}

/// Connection URL with credentials masked, for logs.
pub fn redacted_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<Arc<PgPool>, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!("Initializing database connection pool...");
    tracing::debug!(url = %redacted_url(&config.url), "database url");

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

    Ok(Arc::new(pool))
}

/// Child tables keyed by `(article_id, block_id)`. Deleting a block row
/// cascades into all of them.
fn child_table_ddl(table: &str, columns: &str, key: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            article_id TEXT NOT NULL,
            block_id TEXT NOT NULL,
            {columns},
            PRIMARY KEY ({key}),
            FOREIGN KEY (article_id, block_id)
                REFERENCES blocks(article_id, id) ON DELETE CASCADE
        )
        "#
    )
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            author TEXT NOT NULL,
            publish_date TIMESTAMPTZ NOT NULL DEFAULT now(),
            image_url TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            CONSTRAINT articles_slug_key UNIQUE (slug)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at DESC)
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blocks (
            article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
            id TEXT NOT NULL,
            block_type TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            content TEXT,
            level INTEGER,
            image_url TEXT,
            alt_text TEXT,
            caption TEXT,
            citation TEXT,
            list_type TEXT,
            language TEXT,
            cta_text TEXT,
            cta_link TEXT,
            product_name TEXT,
            PRIMARY KEY (article_id, id),
            UNIQUE (article_id, sort_order)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(&child_table_ddl(
        "block_ratings",
        "ingredients DOUBLE PRECISION,
            value DOUBLE PRECISION,
            manufacturer DOUBLE PRECISION,
            safety DOUBLE PRECISION,
            effectiveness DOUBLE PRECISION",
        "article_id, block_id",
    ))
    .execute(pool)
    .await?;

    for table in text_table_names() {
        sqlx::query(&child_table_ddl(
            table,
            "text TEXT NOT NULL,
            sort_order INTEGER NOT NULL",
            "article_id, block_id, sort_order",
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(&child_table_ddl(
        "block_custom_fields",
        "name TEXT NOT NULL,
            value TEXT NOT NULL,
            sort_order INTEGER NOT NULL",
        "article_id, block_id, sort_order",
    ))
    .execute(pool)
    .await?;

    sqlx::query(&child_table_ddl(
        "block_ingredient_items",
        "number INTEGER,
            name TEXT NOT NULL,
            image_url TEXT,
            description TEXT,
            study_title TEXT,
            study_url TEXT,
            sort_order INTEGER NOT NULL",
        "article_id, block_id, sort_order",
    ))
    .execute(pool)
    .await?;

    sqlx::query(&child_table_ddl(
        "block_faqs",
        "question TEXT NOT NULL,
            answer TEXT NOT NULL,
            sort_order INTEGER NOT NULL",
        "article_id, block_id, sort_order",
    ))
    .execute(pool)
    .await?;

    sqlx::query(&child_table_ddl(
        "block_reviews",
        "name TEXT NOT NULL,
            location TEXT,
            rating DOUBLE PRECISION,
            text TEXT NOT NULL,
            sort_order INTEGER NOT NULL",
        "article_id, block_id, sort_order",
    ))
    .execute(pool)
    .await?;

    sqlx::query(&child_table_ddl(
        "block_pricing_tiers",
        "label TEXT NOT NULL,
            price TEXT NOT NULL,
            note TEXT,
            sort_order INTEGER NOT NULL",
        "article_id, block_id, sort_order",
    ))
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}
