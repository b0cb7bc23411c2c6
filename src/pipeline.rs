use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::browser::ChromeLauncher;
use crate::config::{Config, Renderer};
use crate::feed::{FeedClient, FeedEntry, FeedError};
use crate::navigator::Navigator;
use crate::orchestrator::{ArticleLink, ThumbnailFetcher, ThumbnailResult};
use crate::session::SessionLauncher;
use crate::static_page::StaticLauncher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub rank: usize,
    pub title: String,
    pub source: String,
    pub published: String,
    pub description: String,
    pub link: Option<String>,
    pub thumbnail: Option<String>,
}

pub struct NewsService {
    feed: FeedClient,
    thumbnails: ThumbnailFetcher,
}

impl NewsService {
    pub fn new(feed: FeedClient, thumbnails: ThumbnailFetcher) -> Self {
        Self { feed, thumbnails }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = &config.thumbnails;
        let launcher: Arc<dyn SessionLauncher> = match settings.renderer {
            Renderer::Chrome => Arc::new(ChromeLauncher::new(settings)),
            Renderer::Static => Arc::new(StaticLauncher::new(settings)?),
        };
        info!(
            renderer = ?settings.renderer,
            concurrency = settings.concurrency,
            "Thumbnail renderer configured"
        );

        let navigator = Navigator::new(launcher, settings);
        Ok(Self::new(
            FeedClient::new(&config.feed)?,
            ThumbnailFetcher::new(navigator, settings.concurrency),
        ))
    }

    /// Fetch a category's feed and attach a thumbnail to every entry that has a link.
    pub async fn scrape(
        &self,
        country: &str,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Article>, FeedError> {
        let entries = self.feed.fetch_entries(country, category, limit).await?;

        let links: Vec<ArticleLink> = entries
            .iter()
            .filter_map(|entry| entry.link.as_deref())
            .map(ArticleLink::from)
            .collect();
        let results = self.thumbnails.fetch_all(&links).await;

        Ok(merge_thumbnails(entries, results))
    }
}

/// Zip thumbnail results back onto the entries they were fetched for.
///
/// `results` holds one result per linked entry, in entry order. Entries without
/// a link were never fetched and get no thumbnail.
pub fn merge_thumbnails(entries: Vec<FeedEntry>, results: Vec<ThumbnailResult>) -> Vec<Article> {
    let mut results = results.into_iter();

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let thumbnail = match &entry.link {
                Some(link) => results
                    .next()
                    .filter(|result| &result.url == link)
                    .and_then(|result| result.thumbnail),
                None => None,
            };

            Article {
                rank: index + 1,
                title: entry.title,
                source: entry.source,
                published: entry.published,
                description: entry.description,
                link: entry.link,
                thumbnail,
            }
        })
        .collect()
}

pub fn report_file_name(country: &str, category: &str) -> String {
    format!("google_news_{country}_{category}.json")
}

/// Write articles as pretty-printed JSON into `dir`, returning the file path.
pub async fn write_report(
    dir: &Path,
    country: &str,
    category: &str,
    articles: &[Article],
) -> anyhow::Result<PathBuf> {
    let path = dir.join(report_file_name(country, category));
    let json = serde_json::to_string_pretty(articles)?;
    tokio::fs::write(&path, json).await?;

    info!(path = %path.display(), count = articles.len(), "Saved report");
    Ok(path)
}
