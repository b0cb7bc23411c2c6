//! Thumbnail selection over a rendered page.
//!
//! A [`PageSnapshot`] lists the image URLs a document exposes, grouped by where
//! they were found. [`evaluate`] walks those groups from the most trusted
//! (Open Graph metadata) to the least (any `<img>` on the page) and returns the
//! first URL that passes [`is_valid_candidate`].

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Substrings that mark layout chrome rather than article imagery.
const BLOCKED_FRAGMENTS: &[&str] = &[
    "spacer",
    "1x1",
    "logo",
    "icon",
    "hamburger",
    "menu",
    "header",
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

pub const OG_IMAGE_SELECTOR: &str = r#"meta[property="og:image"]"#;
pub const TWITTER_IMAGE_SELECTOR: &str = r#"meta[name="twitter:image"]"#;
pub const PICTURE_SOURCE_SELECTOR: &str = "picture source[srcset]";
/// Known content containers, searched in this order.
pub const CONTAINER_IMAGE_SELECTORS: &[&str] = &[".elementor-widget-container img", ".wJnIp img"];
pub const ARTICLE_IMAGE_SELECTOR: &str = "article img, .article img";
pub const ANY_IMAGE_SELECTOR: &str = "img";

/// Image URLs extracted from one document, grouped by source tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub og_image: Option<String>,
    pub twitter_image: Option<String>,
    /// Raw `srcset` values of `<picture><source>` elements
    pub picture_sources: Vec<String>,
    pub container_images: Vec<String>,
    pub article_images: Vec<String>,
    pub images: Vec<String>,
}

impl PageSnapshot {
    /// Build a snapshot from static markup.
    ///
    /// Image `src` attributes are resolved against `base` when given, the way a
    /// browser reports `img.src`. Meta contents and `srcset` values are kept as
    /// written.
    pub fn from_html(html: &str, base: Option<&Url>) -> Self {
        let document = Html::parse_document(html);

        let first_attr = |css: &str, attr: &str| -> Option<String> {
            let selector = Selector::parse(css).ok()?;
            document
                .select(&selector)
                .find_map(|el| el.value().attr(attr))
                .map(str::to_string)
        };

        let all_attrs = |css: &str, attr: &str| -> Vec<String> {
            let Ok(selector) = Selector::parse(css) else {
                return Vec::new();
            };
            document
                .select(&selector)
                .filter_map(|el| el.value().attr(attr))
                .map(|value| resolve(value, base))
                .collect()
        };

        let picture_sources = Selector::parse(PICTURE_SOURCE_SELECTOR)
            .map(|selector| {
                document
                    .select(&selector)
                    .filter_map(|el| el.value().attr("srcset"))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            og_image: first_attr(OG_IMAGE_SELECTOR, "content"),
            twitter_image: first_attr(TWITTER_IMAGE_SELECTOR, "content"),
            picture_sources,
            container_images: CONTAINER_IMAGE_SELECTORS
                .iter()
                .flat_map(|css| all_attrs(css, "src"))
                .collect(),
            article_images: all_attrs(ARTICLE_IMAGE_SELECTOR, "src"),
            images: all_attrs(ANY_IMAGE_SELECTOR, "src"),
        }
    }
}

fn resolve(value: &str, base: Option<&Url>) -> String {
    match base.and_then(|base| base.join(value.trim()).ok()) {
        Some(url) => url.to_string(),
        None => value.to_string(),
    }
}

/// Pick the thumbnail for a page, or `None` if nothing qualifies.
pub fn evaluate(snapshot: &PageSnapshot) -> Option<String> {
    let meta = snapshot
        .og_image
        .iter()
        .chain(snapshot.twitter_image.iter())
        .map(|value| value.trim());

    let sources = snapshot
        .picture_sources
        .iter()
        .filter_map(|srcset| first_url_token(srcset));

    let images = snapshot
        .container_images
        .iter()
        .chain(&snapshot.article_images)
        .chain(&snapshot.images)
        .map(|value| value.trim());

    meta.chain(sources)
        .chain(images)
        .find(|candidate| is_valid_candidate(candidate))
        .map(str::to_string)
}

/// First URL of a `srcset`-style list, without its width or density descriptor.
pub fn first_url_token(srcset: &str) -> Option<&str> {
    srcset.split(',').next()?.split_whitespace().next()
}

pub fn is_valid_candidate(candidate: &str) -> bool {
    let lower = candidate.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }

    if BLOCKED_FRAGMENTS.iter().any(|fragment| lower.contains(fragment)) {
        return false;
    }

    let path = lower.split(['?', '#']).next().unwrap_or_default();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
