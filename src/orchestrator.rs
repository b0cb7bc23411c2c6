//! Bounded fan-out of thumbnail lookups over a batch of article links.
//!
//! Each link gets its own tokio task. A shared [`Semaphore`] caps how many of
//! them hold a page session at once; the rest wait for a permit. A permit is
//! only returned once its session has closed, including after a panic. Results are
//! gathered by awaiting the task handles in input order, so the output lines
//! up with the input no matter which lookups finish first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::navigator::Navigator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLink {
    pub url: String,
}

impl From<&str> for ArticleLink {
    fn from(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailResult {
    pub url: String,
    pub thumbnail: Option<String>,
}

pub struct ThumbnailFetcher {
    navigator: Arc<Navigator>,
    limiter: Arc<Semaphore>,
}

impl ThumbnailFetcher {
    pub fn new(navigator: Navigator, concurrency: usize) -> Self {
        Self::with_limiter(
            Arc::new(navigator),
            Arc::new(Semaphore::new(concurrency.max(1))),
        )
    }

    /// Share a limiter between fetchers, or hand in one prepared by a test.
    pub fn with_limiter(navigator: Arc<Navigator>, limiter: Arc<Semaphore>) -> Self {
        Self { navigator, limiter }
    }

    /// One result per link, in the order given. Never fails as a whole.
    pub async fn fetch_all(&self, links: &[ArticleLink]) -> Vec<ThumbnailResult> {
        info!(
            count = links.len(),
            available = self.limiter.available_permits(),
            "Fetching thumbnails"
        );

        let handles: Vec<_> = links
            .iter()
            .map(|link| {
                let navigator = self.navigator.clone();
                let limiter = self.limiter.clone();
                let url = link.url.clone();

                tokio::spawn(async move {
                    let permit = match limiter.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            warn!(%url, error = %e, "Thumbnail limiter closed");
                            return None;
                        }
                    };
                    navigator.fetch_thumbnail_holding(&url, permit).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(links.len());
        for (link, handle) in links.iter().zip(handles) {
            let thumbnail = match handle.await {
                Ok(thumbnail) => thumbnail,
                Err(e) => {
                    error!(url = %link.url, error = %e, "Thumbnail task failed");
                    None
                }
            };
            results.push(ThumbnailResult {
                url: link.url.clone(),
                thumbnail,
            });
        }

        let found = results.iter().filter(|r| r.thumbnail.is_some()).count();
        info!(found, total = results.len(), "Thumbnail fetch complete");

        results
    }
}
