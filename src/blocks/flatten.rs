//! Block list -> relational write model.
//!
//! Pure apart from id generation: nothing here talks to storage and nothing
//! fails. Whatever the editor sent is shaped into rows as-is.

use uuid::Uuid;

use super::{Block, BlockKind, CustomField, CustomerReview, FaqEntry, IngredientItem, PricingTier, Ratings};
use crate::db::models::{
    BlockChildren, BlockRow, BlockTree, CustomFieldRow, FaqRow, IngredientItemRow,
    PricingTierRow, RatingRow, ReviewRow, TextRow,
};

/// Fresh block identifier.
pub fn new_block_id() -> String {
    Uuid::new_v4().to_string()
}

/// Flatten an ordered block list for `article_id`.
///
/// Block `i` without an explicit order gets order `i`; child rows are
/// numbered by their index inside their own collection.
pub fn flatten_blocks(article_id: &str, blocks: &[Block]) -> Vec<BlockTree> {
    blocks
        .iter()
        .enumerate()
        .map(|(index, block)| flatten_block(article_id, index, block))
        .collect()
}

fn flatten_block(article_id: &str, index: usize, block: &Block) -> BlockTree {
    let id = block.id.clone().unwrap_or_else(new_block_id);
    let sort_order = block.order.unwrap_or(index as i32);

    let mut row = BlockRow {
        id: id.clone(),
        article_id: article_id.to_string(),
        block_type: block.kind.type_name().to_string(),
        sort_order,
        ..Default::default()
    };
    let mut children = BlockChildren {
        custom_fields: custom_field_rows(&id, &block.custom_fields),
        ..Default::default()
    };

    match &block.kind {
        BlockKind::Paragraph { content } | BlockKind::Html { content } => {
            row.content = Some(content.clone());
        }
        BlockKind::Heading { content, level } => {
            row.content = Some(content.clone());
            row.level = Some(i32::from(*level));
        }
        BlockKind::Image {
            image_url,
            alt_text,
            caption,
        } => {
            row.image_url = Some(image_url.clone());
            row.alt_text = alt_text.clone();
            row.caption = caption.clone();
        }
        BlockKind::Quote { content, citation } => {
            row.content = Some(content.clone());
            row.citation = citation.clone();
        }
        BlockKind::List { list_type, items } => {
            row.list_type = Some(list_type.as_str().to_string());
            children.list_items = text_rows(&id, items);
        }
        BlockKind::Divider => {}
        BlockKind::Code { content, language } => {
            row.content = Some(content.clone());
            row.language = language.clone();
        }
        BlockKind::Cta { cta_text, cta_link } => {
            row.cta_text = Some(cta_text.clone());
            row.cta_link = Some(cta_link.clone());
        }
        BlockKind::ProductRating {
            product_name,
            ratings,
        } => {
            row.product_name = product_name.clone();
            children.rating = ratings.as_ref().map(|r| rating_row(&id, r));
        }
        BlockKind::ProsCons { pros, cons } => {
            children.pros = text_rows(&id, pros);
            children.cons = text_rows(&id, cons);
        }
        BlockKind::IngredientsSection {
            content,
            ingredients,
            ingredients_list,
        } => {
            row.content = content.clone();
            children.ingredients = text_rows(&id, ingredients);
            children.ingredient_items = ingredient_item_rows(&id, ingredients_list);
        }
        BlockKind::BrandHighlights { highlights } => {
            children.highlights = text_rows(&id, highlights);
        }
        BlockKind::Faq { faqs } => {
            children.faqs = faq_rows(&id, faqs);
        }
        BlockKind::Testimonials { reviews } => {
            children.reviews = review_rows(&id, reviews);
        }
        BlockKind::Pricing { tiers } => {
            children.pricing_tiers = pricing_tier_rows(&id, tiers);
        }
    }

    BlockTree { row, children }
}

fn text_rows(block_id: &str, entries: &[String]) -> Vec<TextRow> {
    entries
        .iter()
        .enumerate()
        .map(|(i, text)| TextRow {
            block_id: block_id.to_string(),
            text: text.clone(),
            sort_order: i as i32,
        })
        .collect()
}

fn custom_field_rows(block_id: &str, fields: &[CustomField]) -> Vec<CustomFieldRow> {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| CustomFieldRow {
            block_id: block_id.to_string(),
            name: field.name.clone(),
            value: field.value.clone(),
            sort_order: i as i32,
        })
        .collect()
}

fn rating_row(block_id: &str, ratings: &Ratings) -> RatingRow {
    RatingRow {
        block_id: block_id.to_string(),
        ingredients: ratings.ingredients,
        value: ratings.value,
        manufacturer: ratings.manufacturer,
        safety: ratings.safety,
        effectiveness: ratings.effectiveness,
    }
}

fn ingredient_item_rows(block_id: &str, items: &[IngredientItem]) -> Vec<IngredientItemRow> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| IngredientItemRow {
            block_id: block_id.to_string(),
            number: item.number,
            name: item.name.clone(),
            image_url: item.image_url.clone(),
            description: item.description.clone(),
            study_title: item.study_title.clone(),
            study_url: item.study_url.clone(),
            sort_order: i as i32,
        })
        .collect()
}

fn faq_rows(block_id: &str, faqs: &[FaqEntry]) -> Vec<FaqRow> {
    faqs.iter()
        .enumerate()
        .map(|(i, faq)| FaqRow {
            block_id: block_id.to_string(),
            question: faq.question.clone(),
            answer: faq.answer.clone(),
            sort_order: i as i32,
        })
        .collect()
}

fn review_rows(block_id: &str, reviews: &[CustomerReview]) -> Vec<ReviewRow> {
    reviews
        .iter()
        .enumerate()
        .map(|(i, review)| ReviewRow {
            block_id: block_id.to_string(),
            name: review.name.clone(),
            location: review.location.clone(),
            rating: review.rating,
            text: review.text.clone(),
            sort_order: i as i32,
        })
        .collect()
}

fn pricing_tier_rows(block_id: &str, tiers: &[PricingTier]) -> Vec<PricingTierRow> {
    tiers
        .iter()
        .enumerate()
        .map(|(i, tier)| PricingTierRow {
            block_id: block_id.to_string(),
            label: tier.label.clone(),
            price: tier.price.clone(),
            note: tier.note.clone(),
            sort_order: i as i32,
        })
        .collect()
}
