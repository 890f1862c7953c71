//! Database Models - structs representing database tables (used by sqlx/serde).
//!
//! `blocks` is a wide table: each block kind only fills the columns it
//! needs. Repeated data lives in child tables keyed by
//! `(article_id, block_id)` with its own `sort_order`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Article model
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRow {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub publish_date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Block model (one row per block, kind-specific columns nullable)
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct BlockRow {
    pub id: String,
    pub article_id: String,
    pub block_type: String,
    pub sort_order: i32,
    pub content: Option<String>,
    pub level: Option<i32>,
    pub image_url: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub citation: Option<String>,
    pub list_type: Option<String>,
    pub language: Option<String>,
    pub cta_text: Option<String>,
    pub cta_link: Option<String>,
    pub product_name: Option<String>,
}

/// Rating row, at most one per block
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct RatingRow {
    pub block_id: String,
    pub ingredients: Option<f64>,
    pub value: Option<f64>,
    pub manufacturer: Option<f64>,
    pub safety: Option<f64>,
    pub effectiveness: Option<f64>,
}

/// Short text entry: pros, cons, simple ingredients, highlights, list items
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TextRow {
    pub block_id: String,
    pub text: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CustomFieldRow {
    pub block_id: String,
    pub name: String,
    pub value: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct IngredientItemRow {
    pub block_id: String,
    pub number: Option<i32>,
    pub name: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub study_title: Option<String>,
    pub study_url: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FaqRow {
    pub block_id: String,
    pub question: String,
    pub answer: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReviewRow {
    pub block_id: String,
    pub name: String,
    pub location: Option<String>,
    pub rating: Option<f64>,
    pub text: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PricingTierRow {
    pub block_id: String,
    pub label: String,
    pub price: String,
    pub note: Option<String>,
    pub sort_order: i32,
}

/// Everything stored under one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockChildren {
    pub rating: Option<RatingRow>,
    pub pros: Vec<TextRow>,
    pub cons: Vec<TextRow>,
    pub ingredients: Vec<TextRow>,
    pub highlights: Vec<TextRow>,
    pub list_items: Vec<TextRow>,
    pub custom_fields: Vec<CustomFieldRow>,
    pub ingredient_items: Vec<IngredientItemRow>,
    pub faqs: Vec<FaqRow>,
    pub reviews: Vec<ReviewRow>,
    pub pricing_tiers: Vec<PricingTierRow>,
}

impl BlockChildren {
    /// Sort every collection by its persisted order. Stable, so rows that
    /// share an order keep their stored sequence.
    pub fn sort(&mut self) {
        self.pros.sort_by_key(|r| r.sort_order);
        self.cons.sort_by_key(|r| r.sort_order);
        self.ingredients.sort_by_key(|r| r.sort_order);
        self.highlights.sort_by_key(|r| r.sort_order);
        self.list_items.sort_by_key(|r| r.sort_order);
        self.custom_fields.sort_by_key(|r| r.sort_order);
        self.ingredient_items.sort_by_key(|r| r.sort_order);
        self.faqs.sort_by_key(|r| r.sort_order);
        self.reviews.sort_by_key(|r| r.sort_order);
        self.pricing_tiers.sort_by_key(|r| r.sort_order);
    }

    /// Total number of child rows, the rating included.
    pub fn row_count(&self) -> usize {
        usize::from(self.rating.is_some())
            + self.pros.len()
            + self.cons.len()
            + self.ingredients.len()
            + self.highlights.len()
            + self.list_items.len()
            + self.custom_fields.len()
            + self.ingredient_items.len()
            + self.faqs.len()
            + self.reviews.len()
            + self.pricing_tiers.len()
    }
}

/// A block row together with its child rows. This is both what the
/// flattener produces and what the store hands back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockTree {
    pub row: BlockRow,
    pub children: BlockChildren,
}

/// An article with its full block tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleTree {
    pub article: ArticleRow,
    pub blocks: Vec<BlockTree>,
}

impl ArticleTree {
    /// Sort blocks by `sort_order` and every child collection by its own.
    pub fn sort(&mut self) {
        self.blocks.sort_by_key(|b| b.row.sort_order);
        for block in &mut self.blocks {
            block.children.sort();
        }
    }
}

/// Article header fields plus the flattened block tree, ready to be written
/// in a single transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub publish_date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub blocks: Vec<BlockTree>,
}

/// Article list item (for list view)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub publish_date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ArticleRow> for ArticleSummary {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            author: row.author,
            publish_date: row.publish_date,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
