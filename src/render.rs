//! HTML rendering of structured articles for the public pages.
//!
//! Text is escaped everywhere. `html` blocks are the only raw markup and go
//! through ammonia before they are emitted.

use std::fmt::Write;

use crate::blocks::reconstruct::ArticleResponse;
use crate::blocks::{Block, BlockKind, ListType, Ratings};

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Only http(s), mailto, root-relative and fragment links are emitted;
/// anything else renders as `#`.
fn safe_href(link: &str) -> String {
    let trimmed = link.trim();
    let lower = trimmed.to_ascii_lowercase();
    let allowed = lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || (trimmed.starts_with('/') && !trimmed.starts_with("//"))
        || trimmed.starts_with('#');
    if allowed {
        escape_html(trimmed)
    } else {
        "#".to_string()
    }
}

fn list(out: &mut String, class: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = write!(out, "<ul class=\"{}\">", class);
    for item in items {
        let _ = write!(out, "<li>{}</li>", escape_html(item));
    }
    out.push_str("</ul>");
}

fn ratings_table(out: &mut String, ratings: &Ratings) {
    out.push_str("<table class=\"ratings\">");
    for (label, score) in ratings.scores() {
        if let Some(score) = score {
            let _ = write!(
                out,
                "<tr><th>{}</th><td>{:.1} / {:.0}</td></tr>",
                label,
                score,
                Ratings::MAX
            );
        }
    }
    if let Some(overall) = ratings.overall() {
        let _ = write!(
            out,
            "<tr class=\"overall\"><th>overall</th><td>{:.1} / {:.0}</td></tr>",
            overall,
            Ratings::MAX
        );
    }
    out.push_str("</table>");
}

/// Markup for a single block.
pub fn render_block(block: &Block) -> String {
    let mut out = String::new();

    match &block.kind {
        BlockKind::Paragraph { content } => {
            let _ = write!(out, "<p>{}</p>", escape_html(content));
        }
        BlockKind::Heading { content, level } => {
            let level = (*level).clamp(1, 6);
            let _ = write!(out, "<h{0}>{1}</h{0}>", level, escape_html(content));
        }
        BlockKind::Image {
            image_url,
            alt_text,
            caption,
        } => {
            out.push_str("<figure>");
            let _ = write!(
                out,
                "<img src=\"{}\" alt=\"{}\">",
                safe_href(image_url),
                escape_html(alt_text.as_deref().unwrap_or(""))
            );
            if let Some(caption) = caption {
                let _ = write!(out, "<figcaption>{}</figcaption>", escape_html(caption));
            }
            out.push_str("</figure>");
        }
        BlockKind::Quote { content, citation } => {
            let _ = write!(out, "<blockquote><p>{}</p>", escape_html(content));
            if let Some(citation) = citation {
                let _ = write!(out, "<cite>{}</cite>", escape_html(citation));
            }
            out.push_str("</blockquote>");
        }
        BlockKind::List { list_type, items } => {
            let tag = match list_type {
                ListType::Ordered => "ol",
                ListType::Unordered => "ul",
            };
            let _ = write!(out, "<{}>", tag);
            for item in items {
                let _ = write!(out, "<li>{}</li>", escape_html(item));
            }
            let _ = write!(out, "</{}>", tag);
        }
        BlockKind::Divider => out.push_str("<hr>"),
        BlockKind::Code { content, language } => {
            match language {
                Some(lang) => {
                    let _ = write!(out, "<pre><code class=\"language-{}\">", escape_html(lang));
                }
                None => out.push_str("<pre><code>"),
            }
            out.push_str(&escape_html(content));
            out.push_str("</code></pre>");
        }
        BlockKind::Html { content } => out.push_str(&ammonia::clean(content)),
        BlockKind::Cta { cta_text, cta_link } => {
            let _ = write!(
                out,
                "<a class=\"cta\" href=\"{}\" rel=\"nofollow noopener\">{}</a>",
                safe_href(cta_link),
                escape_html(cta_text)
            );
        }
        BlockKind::ProductRating {
            product_name,
            ratings,
        } => {
            out.push_str("<section class=\"product-rating\">");
            if let Some(name) = product_name {
                let _ = write!(out, "<h3>{}</h3>", escape_html(name));
            }
            if let Some(ratings) = ratings {
                ratings_table(&mut out, ratings);
            }
            out.push_str("</section>");
        }
        BlockKind::ProsCons { pros, cons } => {
            out.push_str("<section class=\"pros-cons\">");
            list(&mut out, "pros", pros);
            list(&mut out, "cons", cons);
            out.push_str("</section>");
        }
        BlockKind::IngredientsSection {
            content,
            ingredients,
            ingredients_list,
        } => {
            out.push_str("<section class=\"ingredients\">");
            if let Some(intro) = content {
                let _ = write!(out, "<p>{}</p>", escape_html(intro));
            }
            list(&mut out, "key-ingredients", ingredients);
            for item in ingredients_list {
                out.push_str("<article class=\"ingredient\">");
                match item.number {
                    Some(n) => {
                        let _ = write!(out, "<h4>{}. {}</h4>", n, escape_html(&item.name));
                    }
                    None => {
                        let _ = write!(out, "<h4>{}</h4>", escape_html(&item.name));
                    }
                }
                if let Some(src) = &item.image_url {
                    let _ = write!(
                        out,
                        "<img src=\"{}\" alt=\"{}\">",
                        safe_href(src),
                        escape_html(&item.name)
                    );
                }
                if let Some(description) = &item.description {
                    let _ = write!(out, "<p>{}</p>", escape_html(description));
                }
                match (&item.study_title, &item.study_url) {
                    (Some(title), Some(url)) => {
                        let _ = write!(
                            out,
                            "<p class=\"study\"><a href=\"{}\">{}</a></p>",
                            safe_href(url),
                            escape_html(title)
                        );
                    }
                    (Some(title), None) => {
                        let _ = write!(out, "<p class=\"study\">{}</p>", escape_html(title));
                    }
                    (None, Some(url)) => {
                        let _ = write!(
                            out,
                            "<p class=\"study\"><a href=\"{0}\">{0}</a></p>",
                            safe_href(url)
                        );
                    }
                    (None, None) => {}
                }
                out.push_str("</article>");
            }
            out.push_str("</section>");
        }
        BlockKind::BrandHighlights { highlights } => {
            list(&mut out, "brand-highlights", highlights);
        }
        BlockKind::Faq { faqs } => {
            out.push_str("<section class=\"faq\">");
            for faq in faqs {
                let _ = write!(
                    out,
                    "<details><summary>{}</summary><p>{}</p></details>",
                    escape_html(&faq.question),
                    escape_html(&faq.answer)
                );
            }
            out.push_str("</section>");
        }
        BlockKind::Testimonials { reviews } => {
            out.push_str("<section class=\"testimonials\">");
            for review in reviews {
                let _ = write!(
                    out,
                    "<blockquote class=\"review\"><p>{}</p><footer>{}",
                    escape_html(&review.text),
                    escape_html(&review.name)
                );
                if let Some(location) = &review.location {
                    let _ = write!(out, ", {}", escape_html(location));
                }
                if let Some(rating) = review.rating {
                    let _ = write!(out, " <span class=\"stars\">{:.1}</span>", rating);
                }
                out.push_str("</footer></blockquote>");
            }
            out.push_str("</section>");
        }
        BlockKind::Pricing { tiers } => {
            out.push_str("<section class=\"pricing\">");
            for tier in tiers {
                let _ = write!(
                    out,
                    "<div class=\"tier\"><h4>{}</h4><p class=\"price\">{}</p>",
                    escape_html(&tier.label),
                    escape_html(&tier.price)
                );
                if let Some(note) = &tier.note {
                    let _ = write!(out, "<p class=\"note\">{}</p>", escape_html(note));
                }
                out.push_str("</div>");
            }
            out.push_str("</section>");
        }
    }

    out
}

/// Complete HTML document for an article.
pub fn render_article_page(article: &ArticleResponse, site_title: &str) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{} | {}</title>\n</head>\n<body>\n<article>\n<header>\n<h1>{}</h1>\n\
         <p class=\"byline\">By {} &middot; <time datetime=\"{}\">{}</time></p>\n",
        escape_html(&article.title),
        escape_html(site_title),
        escape_html(&article.title),
        escape_html(&article.author),
        article.publish_date.to_rfc3339(),
        article.publish_date.format("%B %-d, %Y"),
    );
    if let Some(image) = &article.image_url {
        let _ = writeln!(
            out,
            "<img class=\"hero\" src=\"{}\" alt=\"{}\">",
            safe_href(image),
            escape_html(&article.title)
        );
    }
    out.push_str("</header>\n");

    for block in &article.blocks {
        out.push_str(&render_block(block));
        out.push('\n');
    }

    out.push_str("</article>\n</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{FaqEntry, IngredientItem};
    use chrono::{TimeZone, Utc};

    fn block(kind: BlockKind) -> Block {
        Block::new(kind)
    }

    #[test]
    fn test_text_is_escaped() {
        let html = render_block(&block(BlockKind::Paragraph {
            content: "<script>alert(1)</script> & more".to_string(),
        }));
        assert_eq!(
            html,
            "<p>&lt;script&gt;alert(1)&lt;/script&gt; &amp; more</p>"
        );
    }

    #[test]
    fn test_heading_level_is_clamped() {
        let html = render_block(&block(BlockKind::Heading {
            content: "Intro".to_string(),
            level: 9,
        }));
        assert_eq!(html, "<h6>Intro</h6>");
    }

    #[test]
    fn test_html_block_is_sanitized() {
        let html = render_block(&block(BlockKind::Html {
            content: "<b>ok</b><script>bad()</script>".to_string(),
        }));
        assert!(html.contains("<b>ok</b>"));
        assert!(!html.contains("script"));
    }

    #[test]
    fn test_cta_rejects_javascript_links() {
        let html = render_block(&block(BlockKind::Cta {
            cta_text: "Buy Now".to_string(),
            cta_link: "javascript:alert(1)".to_string(),
        }));
        assert!(html.contains("href=\"#\""));
        assert!(html.contains(">Buy Now</a>"));

        let html = render_block(&block(BlockKind::Cta {
            cta_text: "Buy".to_string(),
            cta_link: "https://x".to_string(),
        }));
        assert!(html.contains("href=\"https://x\""));
    }

    #[test]
    fn test_ordered_list_and_divider() {
        let html = render_block(&block(BlockKind::List {
            list_type: ListType::Ordered,
            items: vec!["a".to_string(), "b".to_string()],
        }));
        assert_eq!(html, "<ol><li>a</li><li>b</li></ol>");
        assert_eq!(render_block(&block(BlockKind::Divider)), "<hr>");
    }

    #[test]
    fn test_rating_table_lists_present_scores_and_overall() {
        let html = render_block(&block(BlockKind::ProductRating {
            product_name: Some("Vital Prime".to_string()),
            ratings: Some(Ratings {
                value: Some(4.0),
                safety: Some(5.0),
                ..Default::default()
            }),
        }));
        assert!(html.contains("<h3>Vital Prime</h3>"));
        assert!(html.contains("<th>value</th><td>4.0 / 5</td>"));
        assert!(html.contains("<th>overall</th><td>4.5 / 5</td>"));
        assert!(!html.contains("manufacturer"));
    }

    #[test]
    fn test_ingredient_items_and_faqs() {
        let html = render_block(&block(BlockKind::IngredientsSection {
            content: None,
            ingredients: vec![],
            ingredients_list: vec![IngredientItem {
                number: Some(2),
                name: "Maca".to_string(),
                study_title: Some("Maca study".to_string()),
                study_url: Some("https://study.test".to_string()),
                ..Default::default()
            }],
        }));
        assert!(html.contains("<h4>2. Maca</h4>"));
        assert!(html.contains("<a href=\"https://study.test\">Maca study</a>"));

        let html = render_block(&block(BlockKind::Faq {
            faqs: vec![FaqEntry {
                question: "Safe?".to_string(),
                answer: "Yes".to_string(),
            }],
        }));
        assert!(html.contains("<summary>Safe?</summary><p>Yes</p>"));
    }

    #[test]
    fn test_page_renders_blocks_in_order() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let article = ArticleResponse {
            id: "a1".to_string(),
            title: "Vital Prime Review".to_string(),
            slug: "vital-prime-review".to_string(),
            author: "Dana".to_string(),
            publish_date: date,
            image_url: None,
            created_at: date,
            updated_at: date,
            blocks: vec![
                block(BlockKind::Heading {
                    content: "First".to_string(),
                    level: 2,
                }),
                block(BlockKind::Paragraph {
                    content: "Second".to_string(),
                }),
            ],
        };

        let html = render_article_page(&article, "Review CMS");
        assert!(html.contains("<title>Vital Prime Review | Review CMS</title>"));
        assert!(html.contains("March 5, 2024"));
        let first = html.find("First").unwrap();
        let second = html.find("Second").unwrap();
        assert!(first < second);
    }
}
