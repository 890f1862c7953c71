//! Flattened legacy article view.
//!
//! Older consumers expect top-level fields (`overview`, `pros`, `ratings`,
//! `faqs`, ...) instead of a block list. They are pulled out of the
//! structured blocks by block type and by custom-field naming convention.
//! Every lookup that finds nothing yields an empty value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reconstruct::{structured_article, ArticleResponse};
use super::{Block, BlockKind, CustomerReview, FaqEntry, IngredientItem, Ratings};
use crate::db::models::ArticleTree;

/// Highest `faq_question_<n>` suffix scanned per block.
pub const MAX_CONVENTION_FAQS: usize = 10;
/// Highest `review_name_<n>` suffix scanned per block.
pub const MAX_CONVENTION_REVIEWS: usize = 5;

const SECTION_FIELD: &str = "section";
const PRICING_PREFIX: &str = "pricing_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturerInfo {
    pub name: String,
    pub location: String,
    pub website: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatArticle {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub publish_date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub overview: String,
    pub description: String,
    pub how_to_take: String,
    pub safety: String,
    pub effectiveness: String,
    pub how_it_works: String,
    pub conclusion: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratings: Option<Ratings>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub brand_highlights: Vec<String>,
    pub key_ingredients: Vec<String>,
    pub pricing: BTreeMap<String, String>,
    pub manufacturer_info: ManufacturerInfo,
    pub ingredients: Vec<IngredientItem>,
    pub faqs: Vec<FaqEntry>,
    pub customer_reviews: Vec<CustomerReview>,
    pub structured_content: Vec<Block>,
}

/// Build the legacy view from a stored article.
pub fn legacy_article(tree: &ArticleTree) -> FlatArticle {
    flatten_response(structured_article(tree))
}

/// Build the legacy view from an already reconstructed article.
pub fn flatten_response(article: ArticleResponse) -> FlatArticle {
    let blocks = &article.blocks;

    let mut pros = Vec::new();
    let mut cons = Vec::new();
    let mut brand_highlights = Vec::new();
    let mut key_ingredients = Vec::new();
    let mut ingredients = Vec::new();
    let mut pricing = BTreeMap::new();

    for block in blocks {
        match &block.kind {
            BlockKind::ProsCons { pros: p, cons: c } => {
                pros.extend(p.iter().cloned());
                cons.extend(c.iter().cloned());
            }
            BlockKind::BrandHighlights { highlights } => {
                brand_highlights.extend(highlights.iter().cloned());
            }
            BlockKind::IngredientsSection {
                ingredients: simple,
                ingredients_list,
                ..
            } => {
                key_ingredients.extend(simple.iter().cloned());
                ingredients.extend(ingredients_list.iter().cloned());
            }
            BlockKind::Pricing { tiers } => {
                for tier in tiers {
                    pricing
                        .entry(tier.label.clone())
                        .or_insert_with(|| tier.price.clone());
                }
            }
            _ => {}
        }
    }

    for block in blocks {
        for field in &block.custom_fields {
            if let Some(key) = field.name.strip_prefix(PRICING_PREFIX) {
                if !key.is_empty() && !field.value.is_empty() {
                    pricing
                        .entry(key.to_string())
                        .or_insert_with(|| field.value.clone());
                }
            }
        }
    }

    FlatArticle {
        overview: section(blocks, "overview"),
        description: section(blocks, "description"),
        how_to_take: section(blocks, "howToTake"),
        safety: section(blocks, "safety"),
        effectiveness: section(blocks, "effectiveness"),
        how_it_works: section(blocks, "howItWorks"),
        conclusion: section(blocks, "conclusion"),
        ratings: first_ratings(blocks),
        pros,
        cons,
        brand_highlights,
        key_ingredients,
        pricing,
        manufacturer_info: manufacturer_info(blocks),
        ingredients,
        faqs: faqs(blocks),
        customer_reviews: customer_reviews(blocks),
        id: article.id,
        title: article.title,
        slug: article.slug,
        author: article.author,
        publish_date: article.publish_date,
        image_url: article.image_url,
        created_at: article.created_at,
        updated_at: article.updated_at,
        structured_content: article.blocks,
    }
}

/// Content of the first paragraph tagged `section = name`.
fn section(blocks: &[Block], name: &str) -> String {
    blocks
        .iter()
        .find_map(|block| match &block.kind {
            BlockKind::Paragraph { content } if block.custom_field(SECTION_FIELD) == Some(name) => {
                Some(content.clone())
            }
            _ => None,
        })
        .unwrap_or_default()
}

fn first_ratings(blocks: &[Block]) -> Option<Ratings> {
    blocks.iter().find_map(|block| match &block.kind {
        BlockKind::ProductRating {
            ratings: Some(ratings),
            ..
        } => Some(ratings.clone()),
        _ => None,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Explicit FAQ entries first, then `faq_question_<n>`/`faq_answer_<n>`
/// pairs. Only complete pairs are kept.
fn faqs(blocks: &[Block]) -> Vec<FaqEntry> {
    let mut out: Vec<FaqEntry> = blocks
        .iter()
        .filter_map(|block| match &block.kind {
            BlockKind::Faq { faqs } => Some(faqs.iter()),
            _ => None,
        })
        .flatten()
        .filter(|faq| !faq.question.trim().is_empty() && !faq.answer.trim().is_empty())
        .cloned()
        .collect();

    for block in blocks {
        for n in 1..=MAX_CONVENTION_FAQS {
            let question = non_empty(block.custom_field(&format!("faq_question_{}", n)));
            let answer = non_empty(block.custom_field(&format!("faq_answer_{}", n)));
            if let (Some(question), Some(answer)) = (question, answer) {
                out.push(FaqEntry {
                    question: question.to_string(),
                    answer: answer.to_string(),
                });
            }
        }
    }

    out
}

/// Explicit testimonials first, then `review_name_<n>`/`review_text_<n>`
/// records (location and rating optional).
fn customer_reviews(blocks: &[Block]) -> Vec<CustomerReview> {
    let mut out: Vec<CustomerReview> = blocks
        .iter()
        .filter_map(|block| match &block.kind {
            BlockKind::Testimonials { reviews } => Some(reviews.iter()),
            _ => None,
        })
        .flatten()
        .filter(|r| !r.name.trim().is_empty() && !r.text.trim().is_empty())
        .cloned()
        .collect();

    for block in blocks {
        for n in 1..=MAX_CONVENTION_REVIEWS {
            let name = non_empty(block.custom_field(&format!("review_name_{}", n)));
            let text = non_empty(block.custom_field(&format!("review_text_{}", n)));
            let (Some(name), Some(text)) = (name, text) else {
                continue;
            };
            out.push(CustomerReview {
                name: name.to_string(),
                location: non_empty(block.custom_field(&format!("review_location_{}", n)))
                    .map(str::to_string),
                rating: block
                    .custom_field(&format!("review_rating_{}", n))
                    .and_then(|r| r.trim().parse::<f64>().ok()),
                text: text.to_string(),
            });
        }
    }

    out
}

fn manufacturer_info(blocks: &[Block]) -> ManufacturerInfo {
    let lookup = |key: &str| -> String {
        let name = format!("manufacturer_{}", key);
        blocks
            .iter()
            .find_map(|block| non_empty(block.custom_field(&name)))
            .unwrap_or_default()
            .to_string()
    };

    ManufacturerInfo {
        name: lookup("name"),
        location: lookup("location"),
        website: lookup("website"),
        description: lookup("description"),
    }
}
