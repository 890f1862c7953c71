//! Persistence boundary for articles and their block trees.
//!
//! Two backends: PostgreSQL through sqlx, and an in-memory store used when
//! no `DATABASE_URL` is configured (and by the route tests).

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;

use crate::db::models::{ArticleRow, ArticleTree, NewArticle};

pub use memory::MemoryArticleStore;
pub use postgres::PgArticleStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint (the article slug) was violated.
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One page of article rows plus the total count.
#[derive(Debug, Clone)]
pub struct ArticlePage {
    pub items: Vec<ArticleRow>,
    pub total: i64,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Articles newest first.
    async fn list_articles(&self, limit: i64, offset: i64) -> Result<ArticlePage, StoreError>;

    /// Insert the article and its whole block tree atomically.
    async fn create_article(&self, article: NewArticle) -> Result<ArticleTree, StoreError>;

    /// Replace the article found under `slug`: header fields are overwritten
    /// and every block and child row is deleted and recreated. `Ok(None)`
    /// when no article has that slug. `article.id` is ignored, the stored
    /// id is kept.
    async fn replace_article(
        &self,
        slug: &str,
        article: NewArticle,
    ) -> Result<Option<ArticleTree>, StoreError>;

    /// The article with all blocks sorted by order and every child
    /// collection sorted by its own order.
    async fn fetch_article(&self, slug: &str) -> Result<Option<ArticleTree>, StoreError>;

    /// `true` when an article was removed.
    async fn delete_article(&self, slug: &str) -> Result<bool, StoreError>;

    /// Round-trip latency to the backend.
    async fn ping(&self) -> Result<Duration, StoreError>;

    fn backend_name(&self) -> &'static str;
}

pub(crate) fn slug_conflict(slug: &str) -> StoreError {
    StoreError::Conflict(format!("Slug '{}' already exists", slug))
}
