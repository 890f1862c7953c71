//! Block model - the typed, ordered content units an article is made of.
//!
//! Editors send and renderers receive blocks in this shape. Storage keeps a
//! wide row per block plus child tables; see [`flatten`] and [`reconstruct`]
//! for the conversion in each direction and [`legacy`] for the older
//! denormalized article view.

pub mod flatten;
pub mod legacy;
pub mod reconstruct;

use serde::{Deserialize, Serialize};

/// One content unit of an article.
///
/// `id` and `order` are optional on input: the flattener fills them in.
/// Reconstructed blocks always carry both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            id: None,
            order: None,
            custom_fields: Vec::new(),
            kind,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_custom_field(mut self, name: &str, value: &str) -> Self {
        self.custom_fields.push(CustomField {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Value of the first custom field called `name`.
    pub fn custom_field(&self, name: &str) -> Option<&str> {
        self.custom_fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Kind-specific block payload, discriminated by the JSON `type` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum BlockKind {
    Paragraph {
        content: String,
    },
    Heading {
        content: String,
        level: u8,
    },
    Image {
        image_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Quote {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        citation: Option<String>,
    },
    List {
        #[serde(default)]
        list_type: ListType,
        #[serde(default)]
        items: Vec<String>,
    },
    Divider,
    Code {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Html {
        content: String,
    },
    Cta {
        cta_text: String,
        cta_link: String,
    },
    ProductRating {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        product_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ratings: Option<Ratings>,
    },
    ProsCons {
        #[serde(default)]
        pros: Vec<String>,
        #[serde(default)]
        cons: Vec<String>,
    },
    IngredientsSection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default)]
        ingredients: Vec<String>,
        #[serde(default)]
        ingredients_list: Vec<IngredientItem>,
    },
    BrandHighlights {
        #[serde(default)]
        highlights: Vec<String>,
    },
    Faq {
        #[serde(default)]
        faqs: Vec<FaqEntry>,
    },
    Testimonials {
        #[serde(default)]
        reviews: Vec<CustomerReview>,
    },
    Pricing {
        #[serde(default)]
        tiers: Vec<PricingTier>,
    },
}

impl BlockKind {
    pub const PARAGRAPH: &'static str = "paragraph";
    pub const HEADING: &'static str = "heading";
    pub const IMAGE: &'static str = "image";
    pub const QUOTE: &'static str = "quote";
    pub const LIST: &'static str = "list";
    pub const DIVIDER: &'static str = "divider";
    pub const CODE: &'static str = "code";
    pub const HTML: &'static str = "html";
    pub const CTA: &'static str = "cta";
    pub const PRODUCT_RATING: &'static str = "product-rating";
    pub const PROS_CONS: &'static str = "pros-cons";
    pub const INGREDIENTS_SECTION: &'static str = "ingredients-section";
    pub const BRAND_HIGHLIGHTS: &'static str = "brand-highlights";
    pub const FAQ: &'static str = "faq";
    pub const TESTIMONIALS: &'static str = "testimonials";
    pub const PRICING: &'static str = "pricing";

    /// The type tag stored in `blocks.block_type` and sent as `type`.
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockKind::Paragraph { .. } => Self::PARAGRAPH,
            BlockKind::Heading { .. } => Self::HEADING,
            BlockKind::Image { .. } => Self::IMAGE,
            BlockKind::Quote { .. } => Self::QUOTE,
            BlockKind::List { .. } => Self::LIST,
            BlockKind::Divider => Self::DIVIDER,
            BlockKind::Code { .. } => Self::CODE,
            BlockKind::Html { .. } => Self::HTML,
            BlockKind::Cta { .. } => Self::CTA,
            BlockKind::ProductRating { .. } => Self::PRODUCT_RATING,
            BlockKind::ProsCons { .. } => Self::PROS_CONS,
            BlockKind::IngredientsSection { .. } => Self::INGREDIENTS_SECTION,
            BlockKind::BrandHighlights { .. } => Self::BRAND_HIGHLIGHTS,
            BlockKind::Faq { .. } => Self::FAQ,
            BlockKind::Testimonials { .. } => Self::TESTIMONIALS,
            BlockKind::Pricing { .. } => Self::PRICING,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Ordered,
    #[default]
    Unordered,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Ordered => "ordered",
            ListType::Unordered => "unordered",
        }
    }

    /// Unknown stored values read back as unordered.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("ordered") => ListType::Ordered,
            _ => ListType::Unordered,
        }
    }
}

/// Free-form name/value pair attached to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,
    pub value: String,
}

/// Product sub-scores, each on a 0-5 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ratings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effectiveness: Option<f64>,
}

impl Ratings {
    pub const MAX: f64 = 5.0;

    pub fn scores(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("ingredients", self.ingredients),
            ("value", self.value),
            ("manufacturer", self.manufacturer),
            ("safety", self.safety),
            ("effectiveness", self.effectiveness),
        ]
    }

    /// Mean of the scores that are present.
    pub fn overall(&self) -> Option<f64> {
        let present: Vec<f64> = self.scores().iter().filter_map(|(_, s)| *s).collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }
}

/// Detailed ingredient record of an `ingredients-section` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerReview {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    pub label: String,
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
