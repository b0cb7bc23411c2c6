use std::time::Duration;

use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::config::FeedSettings;

/// Google News topic codes. `top` is the unfiltered front page.
pub const CATEGORIES: &[(&str, &str)] = &[
    ("top", ""),
    ("world", "CAAqJggKIiBDQkFTRWdvSUwyMHZNRGx1YlY4U0FtVnVHZ0pWVXlnQVAB"),
    ("local", "CAAqHAgKIhZDQklTQ2pvSWJHOWpZV3hmZGpJb0FBUAE"),
    ("business", "CAAqJggKIiBDQkFTRWdvSUwyMHZNRGx6TVdZU0FtVnVHZ0pWVXlnQVAB"),
    ("technology", "CAAqJggKIiBDQkFTRWdvSUwyMHZNRGRqTVhZU0FtVnVHZ0pWVXlnQVAB"),
    ("entertainment", "CAAqJggKIiBDQkFTRWdvSUwyMHZNREpxYW5RU0FtVnVHZ0pWVXlnQVAB"),
    ("sports", "CAAqJggKIiBDQkFTRWdvSUwyMHZNRFp1ZEdvU0FtVnVHZ0pWVXlnQVAB"),
    ("science", "CAAqJggKIiBDQkFTRWdvSUwyMHZNRFp0Y1RjU0FtVnVHZ0pWVXlnQVAB"),
    ("health", "CAAqIQgKIhtDQkFTRGdvSUwyMHZNR3QwTlRFU0FtVnVLQUFQAQ"),
];

const DESCRIPTION_LIMIT: usize = 200;

pub fn category_names() -> Vec<&'static str> {
    CATEGORIES.iter().map(|(name, _)| *name).collect()
}

pub fn topic_code(category: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, code)| *code)
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("invalid feed url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed returned status {0}")]
    Status(StatusCode),
    #[error("failed to parse feed: {0}")]
    Parse(#[from] parser::ParseFeedError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub title: String,
    pub source: String,
    pub published: String,
    pub description: String,
    pub link: Option<String>,
}

pub struct FeedClient {
    client: Client,
    base_url: String,
}

impl FeedClient {
    pub fn new(settings: &FeedSettings) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn feed_url(&self, country: &str, category: &str) -> Result<Url, FeedError> {
        let code = topic_code(category)
            .ok_or_else(|| FeedError::UnknownCategory(category.to_string()))?;

        let path = if code.is_empty() {
            format!("{}/rss", self.base_url)
        } else {
            format!("{}/rss/topics/{}", self.base_url, code)
        };

        let url = Url::parse_with_params(
            &path,
            &[
                ("hl", format!("en-{country}")),
                ("gl", country.to_string()),
                ("ceid", format!("{country}:en")),
            ],
        )?;
        Ok(url)
    }

    pub async fn fetch_entries(
        &self,
        country: &str,
        category: &str,
        limit: usize,
    ) -> Result<Vec<FeedEntry>, FeedError> {
        let url = self.feed_url(country, category)?;
        info!(%country, %category, %url, "Fetching feed");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status(response.status()));
        }
        let bytes = response.bytes().await?;

        let entries = Self::parse_entries(&bytes, limit)?;
        info!(count = entries.len(), %category, "Parsed feed entries");
        Ok(entries)
    }

    pub fn parse_entries(bytes: &[u8], limit: usize) -> Result<Vec<FeedEntry>, FeedError> {
        let parsed = parser::parse(bytes)?;

        Ok(parsed
            .entries
            .iter()
            .take(limit)
            .map(Self::normalize_entry)
            .collect())
    }

    pub fn normalize_entry(entry: &Entry) -> FeedEntry {
        let raw_title = entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| "Untitled".to_string());
        let (title, source) = Self::split_title(&raw_title);

        let published = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.to_rfc2822())
            .unwrap_or_else(|| "N/A".to_string());

        let description = entry
            .summary
            .as_ref()
            .map(|t| t.content.clone())
            .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
            .filter(|d| !d.is_empty())
            .map(|d| Self::truncate_chars(&d, DESCRIPTION_LIMIT))
            .unwrap_or_else(|| "N/A".to_string());

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .filter(|href| !href.is_empty());

        if link.is_none() {
            warn!("Feed entry has no link: {}", title);
        }

        FeedEntry {
            title,
            source,
            published,
            description,
            link,
        }
    }

    /// Aggregator titles read "Headline - Publisher".
    pub fn split_title(raw: &str) -> (String, String) {
        let mut parts = raw.split(" - ");
        match (parts.next(), parts.next()) {
            (Some(title), Some(source)) => (title.to_string(), source.to_string()),
            _ => (raw.to_string(), "Unknown".to_string()),
        }
    }

    pub fn truncate_chars(text: &str, max: usize) -> String {
        text.chars().take(max).collect()
    }
}
