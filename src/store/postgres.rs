//! PostgreSQL article store.
//!
//! Create and replace each run in one transaction: the article row, every
//! block row and every child row commit together or not at all. Replacing
//! deletes the old blocks (child rows go with them through
//! `ON DELETE CASCADE`) and inserts the new tree.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::{slug_conflict, ArticlePage, ArticleStore, StoreError};
use crate::db::models::{
    ArticleRow, ArticleTree, BlockChildren, BlockRow, BlockTree, CustomFieldRow, FaqRow,
    IngredientItemRow, NewArticle, PricingTierRow, RatingRow, ReviewRow, TextRow,
};

const ARTICLE_COLUMNS: &str =
    "id, title, slug, author, publish_date, image_url, created_at, updated_at";

const BLOCK_COLUMNS: &str = "id, article_id, block_type, sort_order, content, level, image_url, \
     alt_text, caption, citation, list_type, language, cta_text, cta_link, product_name";

/// Text child tables and the `BlockChildren` collection each one feeds.
#[derive(Debug, Clone, Copy)]
enum TextTable {
    Pros,
    Cons,
    Ingredients,
    Highlights,
    ListItems,
}

impl TextTable {
    const ALL: [TextTable; 5] = [
        TextTable::Pros,
        TextTable::Cons,
        TextTable::Ingredients,
        TextTable::Highlights,
        TextTable::ListItems,
    ];

    fn table(self) -> &'static str {
        match self {
            TextTable::Pros => "block_pros",
            TextTable::Cons => "block_cons",
            TextTable::Ingredients => "block_ingredients",
            TextTable::Highlights => "block_highlights",
            TextTable::ListItems => "block_list_items",
        }
    }

    fn rows(self, children: &BlockChildren) -> &[TextRow] {
        match self {
            TextTable::Pros => &children.pros,
            TextTable::Cons => &children.cons,
            TextTable::Ingredients => &children.ingredients,
            TextTable::Highlights => &children.highlights,
            TextTable::ListItems => &children.list_items,
        }
    }

    fn rows_mut(self, children: &mut BlockChildren) -> &mut Vec<TextRow> {
        match self {
            TextTable::Pros => &mut children.pros,
            TextTable::Cons => &mut children.cons,
            TextTable::Ingredients => &mut children.ingredients,
            TextTable::Highlights => &mut children.highlights,
            TextTable::ListItems => &mut children.list_items,
        }
    }
}

pub(crate) fn text_table_names() -> impl Iterator<Item = &'static str> {
    TextTable::ALL.into_iter().map(TextTable::table)
}

#[derive(Debug, Clone)]
pub struct PgArticleStore {
    pool: Arc<PgPool>,
}

impl PgArticleStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn map_write_error(err: sqlx::Error, slug: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() && db_err.constraint().map_or(true, |c| c.contains("slug")) {
            return slug_conflict(slug);
        }
    }
    StoreError::Database(err)
}

async fn insert_blocks(
    conn: &mut PgConnection,
    article_id: &str,
    blocks: &[BlockTree],
) -> Result<(), sqlx::Error> {
    for tree in blocks {
        let row = &tree.row;
        let block_id = row.id.as_str();

        sqlx::query(
            r#"
            INSERT INTO blocks (id, article_id, block_type, sort_order, content, level, image_url,
                                alt_text, caption, citation, list_type, language, cta_text,
                                cta_link, product_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(block_id)
        .bind(article_id)
        .bind(&row.block_type)
        .bind(row.sort_order)
        .bind(&row.content)
        .bind(row.level)
        .bind(&row.image_url)
        .bind(&row.alt_text)
        .bind(&row.caption)
        .bind(&row.citation)
        .bind(&row.list_type)
        .bind(&row.language)
        .bind(&row.cta_text)
        .bind(&row.cta_link)
        .bind(&row.product_name)
        .execute(&mut *conn)
        .await?;

        let children = &tree.children;

        if let Some(rating) = &children.rating {
            sqlx::query(
                r#"
                INSERT INTO block_ratings (article_id, block_id, ingredients, value, manufacturer,
                                           safety, effectiveness)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(article_id)
            .bind(block_id)
            .bind(rating.ingredients)
            .bind(rating.value)
            .bind(rating.manufacturer)
            .bind(rating.safety)
            .bind(rating.effectiveness)
            .execute(&mut *conn)
            .await?;
        }

        for table in TextTable::ALL {
            let sql = format!(
                "INSERT INTO {} (article_id, block_id, text, sort_order) VALUES ($1, $2, $3, $4)",
                table.table()
            );
            for entry in table.rows(children) {
                sqlx::query(&sql)
                    .bind(article_id)
                    .bind(block_id)
                    .bind(&entry.text)
                    .bind(entry.sort_order)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        for field in &children.custom_fields {
            sqlx::query(
                "INSERT INTO block_custom_fields (article_id, block_id, name, value, sort_order) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(article_id)
            .bind(block_id)
            .bind(&field.name)
            .bind(&field.value)
            .bind(field.sort_order)
            .execute(&mut *conn)
            .await?;
        }

        for item in &children.ingredient_items {
            sqlx::query(
                r#"
                INSERT INTO block_ingredient_items (article_id, block_id, number, name, image_url,
                                                    description, study_title, study_url, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(article_id)
            .bind(block_id)
            .bind(item.number)
            .bind(&item.name)
            .bind(&item.image_url)
            .bind(&item.description)
            .bind(&item.study_title)
            .bind(&item.study_url)
            .bind(item.sort_order)
            .execute(&mut *conn)
            .await?;
        }

        for faq in &children.faqs {
            sqlx::query(
                "INSERT INTO block_faqs (article_id, block_id, question, answer, sort_order) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(article_id)
            .bind(block_id)
            .bind(&faq.question)
            .bind(&faq.answer)
            .bind(faq.sort_order)
            .execute(&mut *conn)
            .await?;
        }

        for review in &children.reviews {
            sqlx::query(
                "INSERT INTO block_reviews (article_id, block_id, name, location, rating, text, sort_order) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(article_id)
            .bind(block_id)
            .bind(&review.name)
            .bind(&review.location)
            .bind(review.rating)
            .bind(&review.text)
            .bind(review.sort_order)
            .execute(&mut *conn)
            .await?;
        }

        for tier in &children.pricing_tiers {
            sqlx::query(
                "INSERT INTO block_pricing_tiers (article_id, block_id, label, price, note, sort_order) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(article_id)
            .bind(block_id)
            .bind(&tier.label)
            .bind(&tier.price)
            .bind(&tier.note)
            .bind(tier.sort_order)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

async fn load_children(
    conn: &mut PgConnection,
    article_id: &str,
) -> Result<HashMap<String, BlockChildren>, sqlx::Error> {
    let mut by_block: HashMap<String, BlockChildren> = HashMap::new();

    let ratings = sqlx::query_as::<_, RatingRow>(
        "SELECT block_id, ingredients, value, manufacturer, safety, effectiveness \
         FROM block_ratings WHERE article_id = $1",
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await?;
    for rating in ratings {
        let block_id = rating.block_id.clone();
        by_block.entry(block_id).or_default().rating = Some(rating);
    }

    for table in TextTable::ALL {
        let sql = format!(
            "SELECT block_id, text, sort_order FROM {} WHERE article_id = $1 \
             ORDER BY block_id, sort_order",
            table.table()
        );
        let rows = sqlx::query_as::<_, TextRow>(&sql)
            .bind(article_id)
            .fetch_all(&mut *conn)
            .await?;
        for row in rows {
            table
                .rows_mut(by_block.entry(row.block_id.clone()).or_default())
                .push(row);
        }
    }

    let fields = sqlx::query_as::<_, CustomFieldRow>(
        "SELECT block_id, name, value, sort_order FROM block_custom_fields \
         WHERE article_id = $1 ORDER BY block_id, sort_order",
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await?;
    for field in fields {
        by_block
            .entry(field.block_id.clone())
            .or_default()
            .custom_fields
            .push(field);
    }

    let items = sqlx::query_as::<_, IngredientItemRow>(
        "SELECT block_id, number, name, image_url, description, study_title, study_url, sort_order \
         FROM block_ingredient_items WHERE article_id = $1 ORDER BY block_id, sort_order",
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await?;
    for item in items {
        by_block
            .entry(item.block_id.clone())
            .or_default()
            .ingredient_items
            .push(item);
    }

    let faqs = sqlx::query_as::<_, FaqRow>(
        "SELECT block_id, question, answer, sort_order FROM block_faqs \
         WHERE article_id = $1 ORDER BY block_id, sort_order",
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await?;
    for faq in faqs {
        by_block.entry(faq.block_id.clone()).or_default().faqs.push(faq);
    }

    let reviews = sqlx::query_as::<_, ReviewRow>(
        "SELECT block_id, name, location, rating, text, sort_order FROM block_reviews \
         WHERE article_id = $1 ORDER BY block_id, sort_order",
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await?;
    for review in reviews {
        by_block
            .entry(review.block_id.clone())
            .or_default()
            .reviews
            .push(review);
    }

    let tiers = sqlx::query_as::<_, PricingTierRow>(
        "SELECT block_id, label, price, note, sort_order FROM block_pricing_tiers \
         WHERE article_id = $1 ORDER BY block_id, sort_order",
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await?;
    for tier in tiers {
        by_block
            .entry(tier.block_id.clone())
            .or_default()
            .pricing_tiers
            .push(tier);
    }

    Ok(by_block)
}

/// Readers see one committed version of the article: header, block rows
/// and child rows all come from the same snapshot.
const SNAPSHOT_READ: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

/// The article under `slug` with its block tree, read on `conn`. Run it
/// inside a transaction so every statement shares a snapshot.
async fn load_tree(
    conn: &mut PgConnection,
    slug: &str,
) -> Result<Option<ArticleTree>, sqlx::Error> {
    let sql = format!("SELECT {} FROM articles WHERE slug = $1", ARTICLE_COLUMNS);
    let Some(article) = sqlx::query_as::<_, ArticleRow>(&sql)
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let sql = format!(
        "SELECT {} FROM blocks WHERE article_id = $1 ORDER BY sort_order, id",
        BLOCK_COLUMNS
    );
    let rows = sqlx::query_as::<_, BlockRow>(&sql)
        .bind(&article.id)
        .fetch_all(&mut *conn)
        .await?;

    let mut children = load_children(conn, &article.id).await?;
    let blocks = rows
        .into_iter()
        .map(|row| BlockTree {
            children: children.remove(&row.id).unwrap_or_default(),
            row,
        })
        .collect();

    Ok(Some(ArticleTree { article, blocks }))
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn list_articles(&self, limit: i64, offset: i64) -> Result<ArticlePage, StoreError> {
        let sql = format!(
            "SELECT {} FROM articles ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            ARTICLE_COLUMNS
        );
        let items = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(ArticlePage {
            items,
            total: total.0,
        })
    }

    async fn create_article(&self, article: NewArticle) -> Result<ArticleTree, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO articles (id, title, slug, author, publish_date, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now(), now())
            "#,
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.slug)
        .bind(&article.author)
        .bind(article.publish_date)
        .bind(&article.image_url)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &article.slug))?;

        insert_blocks(&mut *tx, &article.id, &article.blocks).await?;
        let tree = load_tree(&mut *tx, &article.slug)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        tx.commit().await?;

        tracing::info!(
            article_id = %article.id,
            slug = %article.slug,
            blocks = article.blocks.len(),
            "article created"
        );

        Ok(tree)
    }

    async fn replace_article(
        &self,
        slug: &str,
        article: NewArticle,
    ) -> Result<Option<ArticleTree>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM articles WHERE slug = $1 FOR UPDATE")
                .bind(slug)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((article_id,)) = existing else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE articles
            SET title = $1, slug = $2, author = $3, publish_date = $4, image_url = $5, updated_at = now()
            WHERE id = $6
            "#,
        )
        .bind(&article.title)
        .bind(&article.slug)
        .bind(&article.author)
        .bind(article.publish_date)
        .bind(&article.image_url)
        .bind(&article_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &article.slug))?;

        let removed = sqlx::query("DELETE FROM blocks WHERE article_id = $1")
            .bind(&article_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        insert_blocks(&mut *tx, &article_id, &article.blocks).await?;
        let tree = load_tree(&mut *tx, &article.slug).await?;
        tx.commit().await?;

        tracing::info!(
            article_id = %article_id,
            slug = %article.slug,
            removed_blocks = removed,
            blocks = article.blocks.len(),
            "article block set replaced"
        );

        Ok(tree)
    }

    async fn fetch_article(&self, slug: &str) -> Result<Option<ArticleTree>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(SNAPSHOT_READ).execute(&mut *tx).await?;
        let tree = load_tree(&mut *tx, slug).await?;
        tx.commit().await?;
        Ok(tree)
    }

    async fn delete_article(&self, slug: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM articles WHERE slug = $1")
            .bind(slug)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await?;
        Ok(start.elapsed())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
