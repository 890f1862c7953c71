//! Relational read model -> structured article.
//!
//! Reconstruction never fails: missing columns degrade to empty values and
//! a row whose type tag is unknown is skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Block, BlockKind, CustomField, CustomerReview, FaqEntry, IngredientItem, ListType,
    PricingTier, Ratings,
};
use crate::db::models::{ArticleTree, BlockTree, RatingRow, TextRow};

const DEFAULT_HEADING_LEVEL: u8 = 2;

/// Structured article: header fields plus the typed, ordered block list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub publish_date: DateTime<Utc>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub blocks: Vec<Block>,
}

/// Build the structured article. Blocks come out sorted by their persisted
/// order regardless of the order the rows were handed in.
pub fn structured_article(tree: &ArticleTree) -> ArticleResponse {
    let article = &tree.article;
    ArticleResponse {
        id: article.id.clone(),
        title: article.title.clone(),
        slug: article.slug.clone(),
        author: article.author.clone(),
        publish_date: article.publish_date,
        image_url: article.image_url.clone(),
        created_at: article.created_at,
        updated_at: article.updated_at,
        blocks: reconstruct_blocks(&tree.blocks),
    }
}

/// Ordered, typed blocks from stored block trees.
pub fn reconstruct_blocks(trees: &[BlockTree]) -> Vec<Block> {
    let mut sorted: Vec<BlockTree> = trees.to_vec();
    sorted.sort_by_key(|t| t.row.sort_order);

    sorted
        .iter_mut()
        .filter_map(|tree| {
            tree.children.sort();
            reconstruct_block(tree)
        })
        .collect()
}

/// One block from its row and child rows; `None` for an unknown type tag.
pub fn reconstruct_block(tree: &BlockTree) -> Option<Block> {
    let row = &tree.row;
    let children = &tree.children;
    let content = || row.content.clone().unwrap_or_default();

    let kind = match row.block_type.as_str() {
        BlockKind::PARAGRAPH => BlockKind::Paragraph { content: content() },
        BlockKind::HEADING => BlockKind::Heading {
            content: content(),
            level: row
                .level
                .and_then(|l| u8::try_from(l).ok())
                .unwrap_or(DEFAULT_HEADING_LEVEL),
        },
        BlockKind::IMAGE => BlockKind::Image {
            image_url: row.image_url.clone().unwrap_or_default(),
            alt_text: row.alt_text.clone(),
            caption: row.caption.clone(),
        },
        BlockKind::QUOTE => BlockKind::Quote {
            content: content(),
            citation: row.citation.clone(),
        },
        BlockKind::LIST => BlockKind::List {
            list_type: ListType::from_stored(row.list_type.as_deref()),
            items: texts(&children.list_items),
        },
        BlockKind::DIVIDER => BlockKind::Divider,
        BlockKind::CODE => BlockKind::Code {
            content: content(),
            language: row.language.clone(),
        },
        BlockKind::HTML => BlockKind::Html { content: content() },
        BlockKind::CTA => BlockKind::Cta {
            cta_text: row.cta_text.clone().unwrap_or_default(),
            cta_link: row.cta_link.clone().unwrap_or_default(),
        },
        BlockKind::PRODUCT_RATING => BlockKind::ProductRating {
            product_name: row.product_name.clone(),
            ratings: children.rating.as_ref().map(ratings),
        },
        BlockKind::PROS_CONS => BlockKind::ProsCons {
            pros: texts(&children.pros),
            cons: texts(&children.cons),
        },
        BlockKind::INGREDIENTS_SECTION => BlockKind::IngredientsSection {
            content: row.content.clone(),
            ingredients: texts(&children.ingredients),
            ingredients_list: children
                .ingredient_items
                .iter()
                .map(|r| IngredientItem {
                    number: r.number,
                    name: r.name.clone(),
                    image_url: r.image_url.clone(),
                    description: r.description.clone(),
                    study_title: r.study_title.clone(),
                    study_url: r.study_url.clone(),
                })
                .collect(),
        },
        BlockKind::BRAND_HIGHLIGHTS => BlockKind::BrandHighlights {
            highlights: texts(&children.highlights),
        },
        BlockKind::FAQ => BlockKind::Faq {
            faqs: children
                .faqs
                .iter()
                .map(|r| FaqEntry {
                    question: r.question.clone(),
                    answer: r.answer.clone(),
                })
                .collect(),
        },
        BlockKind::TESTIMONIALS => BlockKind::Testimonials {
            reviews: children
                .reviews
                .iter()
                .map(|r| CustomerReview {
                    name: r.name.clone(),
                    location: r.location.clone(),
                    rating: r.rating,
                    text: r.text.clone(),
                })
                .collect(),
        },
        BlockKind::PRICING => BlockKind::Pricing {
            tiers: children
                .pricing_tiers
                .iter()
                .map(|r| PricingTier {
                    label: r.label.clone(),
                    price: r.price.clone(),
                    note: r.note.clone(),
                })
                .collect(),
        },
        other => {
            tracing::warn!(
                block_id = %row.id,
                block_type = %other,
                "skipping stored block with unknown type"
            );
            return None;
        }
    };

    Some(Block {
        id: Some(row.id.clone()),
        order: Some(row.sort_order),
        custom_fields: children
            .custom_fields
            .iter()
            .map(|f| CustomField {
                name: f.name.clone(),
                value: f.value.clone(),
            })
            .collect(),
        kind,
    })
}

fn texts(rows: &[TextRow]) -> Vec<String> {
    rows.iter().map(|r| r.text.clone()).collect()
}

fn ratings(row: &RatingRow) -> Ratings {
    Ratings {
        ingredients: row.ingredients,
        value: row.value,
        manufacturer: row.manufacturer,
        safety: row.safety,
        effectiveness: row.effectiveness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::flatten::flatten_blocks;
    use crate::db::models::{ArticleRow, BlockRow};

    fn article_tree(blocks: Vec<BlockTree>) -> ArticleTree {
        let now = Utc::now();
        ArticleTree {
            article: ArticleRow {
                id: "a1".to_string(),
                title: "Vital Prime Review".to_string(),
                slug: "vital-prime-review".to_string(),
                author: "Dana".to_string(),
                publish_date: now,
                image_url: None,
                created_at: now,
                updated_at: now,
            },
            blocks,
        }
    }

    fn sample_blocks() -> Vec<Block> {
        vec![
            Block::new(BlockKind::Heading {
                content: "Intro".to_string(),
                level: 1,
            }),
            Block::new(BlockKind::Paragraph {
                content: "Body text".to_string(),
            })
            .with_custom_field("section", "overview"),
            Block::new(BlockKind::Image {
                image_url: "/uploads/blog/x.png".to_string(),
                alt_text: Some("bottle".to_string()),
                caption: None,
            }),
            Block::new(BlockKind::Quote {
                content: "Works".to_string(),
                citation: Some("A reader".to_string()),
            }),
            Block::new(BlockKind::List {
                list_type: ListType::Ordered,
                items: vec!["one".to_string(), "two".to_string()],
            }),
            Block::new(BlockKind::Divider),
            Block::new(BlockKind::Code {
                content: "fn main() {}".to_string(),
                language: Some("rust".to_string()),
            }),
            Block::new(BlockKind::Html {
                content: "<b>bold</b>".to_string(),
            }),
            Block::new(BlockKind::Cta {
                cta_text: "Buy Now".to_string(),
                cta_link: "https://x".to_string(),
            }),
            Block::new(BlockKind::ProductRating {
                product_name: Some("Vital Prime".to_string()),
                ratings: Some(Ratings {
                    ingredients: Some(4.5),
                    value: Some(4.0),
                    manufacturer: Some(3.5),
                    safety: Some(5.0),
                    effectiveness: None,
                }),
            }),
            Block::new(BlockKind::ProsCons {
                pros: vec!["natural".to_string()],
                cons: vec!["pricey".to_string(), "online only".to_string()],
            }),
            Block::new(BlockKind::IngredientsSection {
                content: None,
                ingredients: vec!["Zinc".to_string()],
                ingredients_list: vec![IngredientItem {
                    number: Some(1),
                    name: "Zinc".to_string(),
                    image_url: Some("/uploads/blog/zinc.png".to_string()),
                    description: Some("Mineral".to_string()),
                    study_title: Some("Zinc study".to_string()),
                    study_url: None,
                }],
            }),
            Block::new(BlockKind::BrandHighlights {
                highlights: vec!["Made in USA".to_string()],
            }),
            Block::new(BlockKind::Faq {
                faqs: vec![FaqEntry {
                    question: "Is it safe?".to_string(),
                    answer: "Yes".to_string(),
                }],
            }),
            Block::new(BlockKind::Testimonials {
                reviews: vec![CustomerReview {
                    name: "Sam".to_string(),
                    location: Some("Ohio".to_string()),
                    rating: Some(5.0),
                    text: "Great".to_string(),
                }],
            }),
            Block::new(BlockKind::Pricing {
                tiers: vec![PricingTier {
                    label: "1 bottle".to_string(),
                    price: "$69".to_string(),
                    note: None,
                }],
            }),
        ]
    }

    /// Input blocks with the ids and orders the flattener would assign.
    fn with_assigned(blocks: &[Block], trees: &[BlockTree]) -> Vec<Block> {
        blocks
            .iter()
            .zip(trees)
            .map(|(b, t)| Block {
                id: Some(t.row.id.clone()),
                order: Some(t.row.sort_order),
                ..b.clone()
            })
            .collect()
    }

    #[test]
    fn test_round_trip_preserves_every_block_kind() {
        let blocks = sample_blocks();
        let trees = flatten_blocks("a1", &blocks);
        let rebuilt = reconstruct_blocks(&trees);

        assert_eq!(rebuilt, with_assigned(&blocks, &trees));
    }

    #[test]
    fn test_reverse_explicit_orders_come_back_ascending() {
        for n in 0..8 {
            let blocks: Vec<Block> = (0..n)
                .map(|i| {
                    Block::new(BlockKind::Paragraph {
                        content: format!("p{}", i),
                    })
                    .with_order((n - i) as i32)
                })
                .collect();
            let trees = flatten_blocks("a1", &blocks);
            let rebuilt = reconstruct_blocks(&trees);

            let orders: Vec<i32> = rebuilt.iter().filter_map(|b| b.order).collect();
            let mut expected = orders.clone();
            expected.sort();
            assert_eq!(orders, expected);
            assert_eq!(rebuilt.len(), n);
        }
    }

    #[test]
    fn test_absent_and_empty_pros_reconstruct_identically() {
        let absent: Block = serde_json::from_str(r#"{"type":"pros-cons","cons":["x"]}"#).unwrap();
        let empty: Block =
            serde_json::from_str(r#"{"type":"pros-cons","pros":[],"cons":["x"]}"#).unwrap();

        let a = reconstruct_blocks(&flatten_blocks("a1", &[absent]));
        let b = reconstruct_blocks(&flatten_blocks("a1", &[empty]));
        assert_eq!(a[0].kind, b[0].kind);

        let json = serde_json::to_value(&a[0]).unwrap();
        assert_eq!(json["pros"], serde_json::json!([]));
    }

    #[test]
    fn test_missing_rating_row_omits_ratings_field() {
        let block = Block::new(BlockKind::ProductRating {
            product_name: Some("X".to_string()),
            ratings: None,
        });
        let trees = flatten_blocks("a1", &[block]);
        assert!(trees[0].children.rating.is_none());

        let rebuilt = reconstruct_blocks(&trees);
        let json = serde_json::to_value(&rebuilt[0]).unwrap();
        assert!(json.get("ratings").is_none());
        assert_eq!(json["productName"], "X");
    }

    #[test]
    fn test_unknown_stored_type_is_skipped() {
        let mut trees = flatten_blocks(
            "a1",
            &[Block::new(BlockKind::Paragraph {
                content: "kept".to_string(),
            })],
        );
        trees.push(BlockTree {
            row: BlockRow {
                id: "legacy".to_string(),
                article_id: "a1".to_string(),
                block_type: "carousel".to_string(),
                sort_order: 1,
                ..Default::default()
            },
            children: Default::default(),
        });

        let rebuilt = reconstruct_blocks(&trees);
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].kind.type_name(), "paragraph");
    }

    #[test]
    fn test_shuffled_child_rows_come_back_in_order() {
        let block = Block::new(BlockKind::BrandHighlights {
            highlights: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        });
        let mut trees = flatten_blocks("a1", &[block]);
        trees[0].children.highlights.reverse();

        let rebuilt = reconstruct_blocks(&trees);
        assert_eq!(
            rebuilt[0].kind,
            BlockKind::BrandHighlights {
                highlights: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            }
        );
    }

    #[test]
    fn test_structured_article_carries_header_fields() {
        let trees = flatten_blocks("a1", &sample_blocks());
        let response = structured_article(&article_tree(trees));

        assert_eq!(response.slug, "vital-prime-review");
        assert_eq!(response.blocks.len(), sample_blocks().len());

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("publishDate").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["blocks"][0]["type"], "heading");
    }
}
