/**
 * Article Routes
 * CRUD API endpoints for articles and their block trees
 */
use std::collections::HashSet;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::blocks::flatten::flatten_blocks;
use crate::blocks::legacy::{legacy_article, FlatArticle};
use crate::blocks::reconstruct::{reconstruct_blocks, structured_article, ArticleResponse};
use crate::blocks::{Block, BlockKind, Ratings};
use crate::db::models::{ArticleSummary, ArticleTree, NewArticle};
use crate::error::{ApiError, SuccessResponse};
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/articles (list)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

const MAX_PAGE_SIZE: i64 = 100;

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

/// Response for GET /api/articles (list)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleListResponse {
    pub items: Vec<ArticleSummary>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Request body for POST /api/articles (create)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// Request body for PUT /api/articles/:slug (replace)
///
/// Omitted header fields keep their stored value. `blocks`, when present,
/// replaces the whole block set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    /// Absent keeps the stored image, `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
    pub blocks: Option<Vec<Block>>,
}

/// Marks a field that was present in the body, even when it was `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Validation
// ============================================================================

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex =
        Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern compiles");
}

fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// URL slug from a title: lowercase alphanumeric runs joined by hyphens.
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn check_slug(slug: &str) -> Result<(), ApiError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Slug must contain only lowercase letters, numbers, and hyphens".to_string(),
        ))
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ApiError::Validation(format!("{} is required", field))),
    }
}

fn check_score(score: Option<f64>, what: &str) -> Result<(), ApiError> {
    match score {
        Some(s) if !(0.0..=Ratings::MAX).contains(&s) => Err(ApiError::Validation(format!(
            "{} must be between 0 and {}",
            what,
            Ratings::MAX
        ))),
        _ => Ok(()),
    }
}

/// Range checks the type system cannot express, plus id/order uniqueness
/// inside one article.
pub fn validate_blocks(blocks: &[Block]) -> Result<(), ApiError> {
    let mut ids = HashSet::new();
    let mut orders = HashSet::new();

    for (index, block) in blocks.iter().enumerate() {
        if let Some(id) = &block.id {
            if id.trim().is_empty() {
                return Err(ApiError::Validation(format!("block {} has an empty id", index)));
            }
            if !ids.insert(id.as_str()) {
                return Err(ApiError::Validation(format!("duplicate block id '{}'", id)));
            }
        }

        let order = block.order.unwrap_or(index as i32);
        if !orders.insert(order) {
            return Err(ApiError::Validation(format!(
                "duplicate block order {} at position {}",
                order, index
            )));
        }

        match &block.kind {
            BlockKind::Heading { level, .. } if !(1..=6).contains(level) => {
                return Err(ApiError::Validation(format!(
                    "block {}: heading level must be between 1 and 6",
                    index
                )));
            }
            BlockKind::ProductRating {
                ratings: Some(ratings),
                ..
            } => {
                for (name, score) in ratings.scores() {
                    check_score(score, &format!("block {}: {} rating", index, name))?;
                }
            }
            BlockKind::Testimonials { reviews } => {
                for review in reviews {
                    check_score(review.rating, &format!("block {}: review rating", index))?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

async fn load(state: &AppState, slug: &str) -> Result<ArticleTree, ApiError> {
    check_slug(slug)?;
    state
        .store
        .fetch_article(slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Article '{}'", slug)))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/articles - List articles with pagination
pub async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ArticleListQuery>,
) -> Result<Json<ArticleListResponse>, ApiError> {
    let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
    // Bounded so the offset below cannot overflow.
    let page = query.page.clamp(1, i64::MAX / MAX_PAGE_SIZE);
    let offset = (page - 1) * page_size;

    let result = state.store.list_articles(page_size, offset).await?;

    Ok(Json(ArticleListResponse {
        items: result.items.into_iter().map(ArticleSummary::from).collect(),
        page,
        page_size,
        total: result.total,
    }))
}

/// GET /api/articles/:slug - Structured article with its ordered blocks
pub async fn get_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let tree = load(&state, &slug).await?;
    Ok(Json(structured_article(&tree)))
}

/// GET /api/articles/:slug/flat - Flattened legacy article view
pub async fn get_flat_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<FlatArticle>, ApiError> {
    let tree = load(&state, &slug).await?;
    Ok(Json(legacy_article(&tree)))
}

/// POST /api/articles - Create an article together with its blocks
pub async fn create_article(
    State(state): State<AppState>,
    payload: Result<Json<CreateArticleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ArticleResponse>), ApiError> {
    let payload = body(payload)?;

    let title = required(payload.title, "Title")?;
    let author = required(payload.author, "Author")?;
    let slug = match payload.slug {
        Some(slug) if !slug.trim().is_empty() => slug.trim().to_string(),
        _ => slugify(&title),
    };
    if slug.is_empty() {
        return Err(ApiError::Validation(
            "Slug could not be derived from the title".to_string(),
        ));
    }
    check_slug(&slug)?;
    validate_blocks(&payload.blocks)?;

    let id = Uuid::new_v4().to_string();
    let article = NewArticle {
        blocks: flatten_blocks(&id, &payload.blocks),
        id,
        title,
        slug,
        author,
        publish_date: payload.publish_date.unwrap_or_else(Utc::now),
        image_url: payload.image_url,
    };

    let tree = state.store.create_article(article).await?;
    Ok((StatusCode::CREATED, Json(structured_article(&tree))))
}

/// PUT /api/articles/:slug - Replace header fields and the whole block set
pub async fn update_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: Result<Json<UpdateArticleRequest>, JsonRejection>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let payload = body(payload)?;
    let existing = load(&state, &slug).await?;

    let title = match payload.title {
        Some(title) => required(Some(title), "Title")?,
        None => existing.article.title,
    };
    let author = match payload.author {
        Some(author) => required(Some(author), "Author")?,
        None => existing.article.author,
    };
    let new_slug = payload
        .slug
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| existing.article.slug.clone());
    check_slug(&new_slug)?;

    let blocks = match payload.blocks {
        Some(blocks) => blocks,
        None => {
            let kept = reconstruct_blocks(&existing.blocks);
            if kept.len() < existing.blocks.len() {
                tracing::warn!(
                    slug = %slug,
                    dropped = existing.blocks.len() - kept.len(),
                    "stored blocks with unknown types are dropped by this update"
                );
            }
            kept
        }
    };
    validate_blocks(&blocks)?;

    let id = existing.article.id;
    let article = NewArticle {
        blocks: flatten_blocks(&id, &blocks),
        id,
        title,
        slug: new_slug,
        author,
        publish_date: payload.publish_date.unwrap_or(existing.article.publish_date),
        image_url: payload.image_url.unwrap_or(existing.article.image_url),
    };

    let tree = state
        .store
        .replace_article(&slug, article)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Article '{}'", slug)))?;

    Ok(Json(structured_article(&tree)))
}

/// DELETE /api/articles/:slug - Delete an article and all of its blocks
pub async fn delete_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    check_slug(&slug)?;

    if state.store.delete_article(&slug).await? {
        tracing::info!(slug = %slug, "article deleted");
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(ApiError::NotFound(format!("Article '{}'", slug)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorResponse;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_router() -> Router {
        crate::create_app(AppState::in_memory(Default::default()))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn paragraph_blocks(prefix: &str, n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| json!({ "type": "paragraph", "content": format!("{}-{}", prefix, i) }))
                .collect(),
        )
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Vital Prime Review"), "vital-prime-review");
        assert_eq!(slugify("  Déjà vu -- 2024!  "), "d-j-vu-2024");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_validate_blocks_rejects_duplicate_orders() {
        let blocks: Vec<Block> = serde_json::from_value(json!([
            { "type": "divider", "order": 1 },
            { "type": "divider" }
        ]))
        .unwrap();
        assert!(matches!(validate_blocks(&blocks), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_validate_blocks_rejects_out_of_range_values() {
        let heading: Vec<Block> =
            serde_json::from_value(json!([{ "type": "heading", "content": "x", "level": 7 }])).unwrap();
        assert!(validate_blocks(&heading).is_err());

        let rating: Vec<Block> = serde_json::from_value(json!([
            { "type": "product-rating", "ratings": { "value": 5.5 } }
        ]))
        .unwrap();
        assert!(validate_blocks(&rating).is_err());

        let ok: Vec<Block> = serde_json::from_value(json!([
            { "type": "product-rating", "ratings": { "value": 5.0, "safety": 0.0 } }
        ]))
        .unwrap();
        assert!(validate_blocks(&ok).is_ok());
    }

    #[test]
    fn test_validate_blocks_rejects_duplicate_ids() {
        let blocks: Vec<Block> = serde_json::from_value(json!([
            { "id": "b1", "type": "divider" },
            { "id": "b1", "type": "divider" }
        ]))
        .unwrap();
        assert!(validate_blocks(&blocks).is_err());
    }

    #[tokio::test]
    async fn test_create_assigns_orders_and_derives_slug() {
        let app = test_router();
        let (status, body) = send(
            &app,
            "POST",
            "/api/articles",
            Some(json!({
                "title": "Vital Prime Review",
                "author": "Dana",
                "blocks": [
                    { "type": "heading", "content": "Intro", "level": 2 },
                    { "type": "paragraph", "content": "Body text" },
                    { "type": "cta", "ctaText": "Buy Now", "ctaLink": "https://x" }
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let article: ArticleResponse = serde_json::from_value(body).unwrap();
        assert_eq!(article.slug, "vital-prime-review");
        let orders: Vec<i32> = article.blocks.iter().filter_map(|b| b.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(article.blocks.iter().all(|b| b.id.is_some()));
    }

    #[tokio::test]
    async fn test_create_requires_title_and_author() {
        let app = test_router();
        let (status, body) = send(&app, "POST", "/api/articles", Some(json!({ "title": "X" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(error.message.as_deref(), Some("Author is required"));

        let (status, _) = send(&app, "POST", "/api/articles", Some(json!({ "author": "A" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_block_is_a_validation_failure() {
        let app = test_router();
        let (status, body) = send(
            &app,
            "POST",
            "/api/articles",
            Some(json!({ "title": "X", "author": "A", "blocks": [{ "type": "carousel" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let app = test_router();
        let article = json!({ "title": "Same", "author": "A" });
        let (status, _) = send(&app, "POST", "/api/articles", Some(article.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&app, "POST", "/api/articles", Some(article)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_update_replaces_the_whole_block_set() {
        let app = test_router();
        let (status, created) = send(
            &app,
            "POST",
            "/api/articles",
            Some(json!({
                "title": "Vital Prime Review",
                "slug": "vital-prime-review",
                "author": "Dana",
                "blocks": paragraph_blocks("old", 3)
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let old_ids: Vec<String> = created["blocks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_str().unwrap().to_string())
            .collect();

        let (status, _) = send(
            &app,
            "PUT",
            "/api/articles/vital-prime-review",
            Some(json!({ "blocks": paragraph_blocks("new", 5) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "GET", "/api/articles/vital-prime-review", None).await;
        assert_eq!(status, StatusCode::OK);
        let article: ArticleResponse = serde_json::from_value(body).unwrap();
        assert_eq!(article.title, "Vital Prime Review");
        assert_eq!(article.blocks.len(), 5);
        for (i, block) in article.blocks.iter().enumerate() {
            assert_eq!(
                block.kind,
                BlockKind::Paragraph {
                    content: format!("new-{}", i)
                }
            );
            assert!(!old_ids.contains(block.id.as_ref().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_update_without_blocks_keeps_them() {
        let app = test_router();
        send(
            &app,
            "POST",
            "/api/articles",
            Some(json!({ "title": "Keep", "author": "A", "blocks": paragraph_blocks("p", 2) })),
        )
        .await;

        let (status, body) = send(
            &app,
            "PUT",
            "/api/articles/keep",
            Some(json!({ "title": "Kept", "slug": "kept" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Kept");
        assert_eq!(body["blocks"].as_array().unwrap().len(), 2);

        let (status, _) = send(&app, "GET", "/api/articles/keep", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_slug_is_not_found() {
        let app = test_router();
        let (status, body) = send(&app, "GET", "/api/articles/does-not-exist", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");

        let (status, _) = send(&app, "GET", "/api/articles/does-not-exist/flat", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &app,
            "PUT",
            "/api/articles/does-not-exist",
            Some(json!({ "blocks": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", "/api/articles/does-not-exist", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_slug_is_rejected() {
        let app = test_router();
        let (status, _) = send(&app, "GET", "/api/articles/Not_A_Slug", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_flat_view_and_delete() {
        let app = test_router();
        send(
            &app,
            "POST",
            "/api/articles",
            Some(json!({
                "title": "Flat",
                "author": "A",
                "blocks": [
                    {
                        "type": "paragraph",
                        "content": "Overview text",
                        "customFields": [
                            { "name": "section", "value": "overview" },
                            { "name": "faq_question_1", "value": "Q" },
                            { "name": "faq_answer_1", "value": "A" },
                            { "name": "faq_question_2", "value": "Q2" }
                        ]
                    },
                    { "type": "pros-cons", "pros": ["good"] },
                    { "type": "product-rating", "ratings": { "value": 4.0 } }
                ]
            })),
        )
        .await;

        let (status, flat) = send(&app, "GET", "/api/articles/flat/flat", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(flat["overview"], "Overview text");
        assert_eq!(flat["pros"], json!(["good"]));
        assert_eq!(flat["cons"], json!([]));
        assert_eq!(flat["ratings"]["value"], 4.0);
        assert_eq!(flat["faqs"], json!([{ "question": "Q", "answer": "A" }]));
        assert_eq!(flat["structuredContent"].as_array().unwrap().len(), 3);

        let (status, body) = send(&app, "DELETE", "/api/articles/flat", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let (status, _) = send(&app, "GET", "/api/articles/flat", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let app = test_router();
        for title in ["One", "Two", "Three"] {
            send(
                &app,
                "POST",
                "/api/articles",
                Some(json!({ "title": title, "author": "A" })),
            )
            .await;
        }

        let (status, body) = send(&app, "GET", "/api/articles?page=2&pageSize=2", None).await;
        assert_eq!(status, StatusCode::OK);
        let list: ArticleListResponse = serde_json::from_value(body).unwrap();
        assert_eq!(list.total, 3);
        assert_eq!(list.page, 2);
        assert_eq!(list.items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_far_past_the_end_is_empty() {
        let app = test_router();
        send(&app, "POST", "/api/articles", Some(json!({ "title": "One", "author": "A" }))).await;

        let (status, body) = send(
            &app,
            "GET",
            "/api/articles?page=9223372036854775807&pageSize=100",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let list: ArticleListResponse = serde_json::from_value(body).unwrap();
        assert!(list.items.is_empty());
        assert_eq!(list.total, 1);
        assert_eq!(list.page_size, 100);
    }

    #[tokio::test]
    async fn test_update_image_url_null_clears_absent_keeps() {
        let app = test_router();
        send(
            &app,
            "POST",
            "/api/articles",
            Some(json!({ "title": "Hero", "author": "A", "imageUrl": "/uploads/blog/h.png" })),
        )
        .await;

        let (status, body) = send(
            &app,
            "PUT",
            "/api/articles/hero",
            Some(json!({ "title": "Hero Again" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["imageUrl"], "/uploads/blog/h.png");

        let (status, body) = send(
            &app,
            "PUT",
            "/api/articles/hero",
            Some(json!({ "imageUrl": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["imageUrl"], Value::Null);
        assert_eq!(body["title"], "Hero Again");
    }

    #[tokio::test]
    async fn test_update_without_blocks_drops_unknown_stored_types() {
        use crate::db::models::{BlockRow, BlockTree};

        let state = AppState::in_memory(Default::default());
        let app = crate::create_app(state.clone());

        let mut blocks = flatten_blocks(
            "a1",
            &[Block::new(BlockKind::Paragraph {
                content: "kept".to_string(),
            })],
        );
        blocks.push(BlockTree {
            row: BlockRow {
                id: "old".to_string(),
                article_id: "a1".to_string(),
                block_type: "carousel".to_string(),
                sort_order: 1,
                ..Default::default()
            },
            children: Default::default(),
        });
        state
            .store
            .create_article(NewArticle {
                id: "a1".to_string(),
                title: "Legacy".to_string(),
                slug: "legacy".to_string(),
                author: "A".to_string(),
                publish_date: Utc::now(),
                image_url: None,
                blocks,
            })
            .await
            .unwrap();

        let (status, body) = send(
            &app,
            "PUT",
            "/api/articles/legacy",
            Some(json!({ "title": "Legacy v2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["blocks"].as_array().unwrap().len(), 1);

        let stored = state.store.fetch_article("legacy").await.unwrap().unwrap();
        assert_eq!(stored.blocks.len(), 1);
        assert_eq!(stored.blocks[0].row.block_type, "paragraph");
    }
}
