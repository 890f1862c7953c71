/**
 * Public Pages
 * Server-rendered article pages
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::blocks::reconstruct::structured_article;
use crate::error::ApiError;
use crate::render::{escape_html, render_article_page};
use crate::AppState;

fn not_found_page(slug: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(format!(
            "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Not found</title></head>\
             <body><h1>Not found</h1><p>No article at <code>{}</code>.</p></body></html>\n",
            escape_html(slug)
        )),
    )
        .into_response()
}

/// GET /articles/:slug - Rendered article page
pub async fn article_page(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.store.fetch_article(&slug).await {
        Ok(Some(tree)) => {
            let article = structured_article(&tree);
            Html(render_article_page(&article, &state.config.site_title)).into_response()
        }
        Ok(None) => not_found_page(&slug),
        Err(e) => ApiError::from(e).into_response(),
    }
}
