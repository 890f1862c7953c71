//! In-memory article store.
//!
//! Used when the server runs without a database and by the route tests.
//! Writers take the lock for the whole replacement, so a write is either
//! fully visible or not at all.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{slug_conflict, ArticlePage, ArticleStore, StoreError};
use crate::db::models::{ArticleRow, ArticleTree, NewArticle};

#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    articles: RwLock<Vec<ArticleTree>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn list_articles(&self, limit: i64, offset: i64) -> Result<ArticlePage, StoreError> {
        let articles = self.articles.read().await;

        let mut rows: Vec<ArticleRow> = articles.iter().map(|a| a.article.clone()).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = rows.len() as i64;
        let items = rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok(ArticlePage { items, total })
    }

    async fn create_article(&self, article: NewArticle) -> Result<ArticleTree, StoreError> {
        let mut articles = self.articles.write().await;

        if articles.iter().any(|a| a.article.slug == article.slug) {
            return Err(slug_conflict(&article.slug));
        }

        let now = Utc::now();
        let mut tree = ArticleTree {
            article: ArticleRow {
                id: article.id,
                title: article.title,
                slug: article.slug,
                author: article.author,
                publish_date: article.publish_date,
                image_url: article.image_url,
                created_at: now,
                updated_at: now,
            },
            blocks: article.blocks,
        };
        tree.sort();

        articles.push(tree.clone());
        Ok(tree)
    }

    async fn replace_article(
        &self,
        slug: &str,
        article: NewArticle,
    ) -> Result<Option<ArticleTree>, StoreError> {
        let mut articles = self.articles.write().await;

        let Some(index) = articles.iter().position(|a| a.article.slug == slug) else {
            return Ok(None);
        };
        if articles
            .iter()
            .enumerate()
            .any(|(i, a)| i != index && a.article.slug == article.slug)
        {
            return Err(slug_conflict(&article.slug));
        }

        let existing = &articles[index].article;
        let mut tree = ArticleTree {
            article: ArticleRow {
                id: existing.id.clone(),
                title: article.title,
                slug: article.slug,
                author: article.author,
                publish_date: article.publish_date,
                image_url: article.image_url,
                created_at: existing.created_at,
                updated_at: Utc::now(),
            },
            blocks: article.blocks,
        };
        for block in &mut tree.blocks {
            block.row.article_id = tree.article.id.clone();
        }
        tree.sort();

        articles[index] = tree.clone();
        Ok(Some(tree))
    }

    async fn fetch_article(&self, slug: &str) -> Result<Option<ArticleTree>, StoreError> {
        let articles = self.articles.read().await;
        Ok(articles.iter().find(|a| a.article.slug == slug).cloned())
    }

    async fn delete_article(&self, slug: &str) -> Result<bool, StoreError> {
        let mut articles = self.articles.write().await;
        let before = articles.len();
        articles.retain(|a| a.article.slug != slug);
        Ok(articles.len() != before)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        drop(self.articles.read().await);
        Ok(start.elapsed())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::flatten::flatten_blocks;
    use crate::blocks::{Block, BlockKind};

    fn new_article(id: &str, slug: &str, blocks: &[Block]) -> NewArticle {
        NewArticle {
            id: id.to_string(),
            title: "Title".to_string(),
            slug: slug.to_string(),
            author: "Dana".to_string(),
            publish_date: Utc::now(),
            image_url: None,
            blocks: flatten_blocks(id, blocks),
        }
    }

    fn paragraphs(n: usize) -> Vec<Block> {
        (0..n)
            .map(|i| {
                Block::new(BlockKind::Paragraph {
                    content: format!("p{}", i),
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let store = MemoryArticleStore::new();
        store
            .create_article(new_article("a1", "first", &paragraphs(2)))
            .await
            .unwrap();

        let tree = store.fetch_article("first").await.unwrap().unwrap();
        assert_eq!(tree.article.id, "a1");
        assert_eq!(tree.blocks.len(), 2);
        assert!(store.fetch_article("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_a_conflict() {
        let store = MemoryArticleStore::new();
        store
            .create_article(new_article("a1", "same", &[]))
            .await
            .unwrap();
        let err = store
            .create_article(new_article("a2", "same", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_replace_swaps_the_whole_block_set() {
        let store = MemoryArticleStore::new();
        store
            .create_article(new_article("a1", "post", &paragraphs(3)))
            .await
            .unwrap();

        let replaced = store
            .replace_article("post", new_article("ignored", "post", &paragraphs(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced.article.id, "a1");
        assert_eq!(replaced.blocks.len(), 1);
        assert_eq!(replaced.blocks[0].row.article_id, "a1");

        let missing = store
            .replace_article("nope", new_article("x", "nope", &[]))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_replace_cannot_steal_another_slug() {
        let store = MemoryArticleStore::new();
        store.create_article(new_article("a1", "one", &[])).await.unwrap();
        store.create_article(new_article("a2", "two", &[])).await.unwrap();

        let err = store
            .replace_article("one", new_article("a1", "two", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let store = MemoryArticleStore::new();
        for (id, slug) in [("a1", "one"), ("a2", "two"), ("a3", "three")] {
            store.create_article(new_article(id, slug, &[])).await.unwrap();
        }

        let page = store.list_articles(2, 0).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);

        assert!(store.delete_article("two").await.unwrap());
        assert!(!store.delete_article("two").await.unwrap());
        assert_eq!(store.list_articles(10, 0).await.unwrap().total, 2);
    }
}
