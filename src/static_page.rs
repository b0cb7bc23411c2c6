//! Script-free page sessions over plain HTTP.
//!
//! Useful where no browser can be installed. Redirects are followed by the
//! HTTP client, so the session's current URL is the final article URL, but
//! client-rendered images are never seen.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::ThumbnailSettings;
use crate::evaluator::PageSnapshot;
use crate::session::{NavigationError, PageSession, SessionLauncher, WaitUntil};

pub struct StaticLauncher {
    client: Client,
}

impl StaticLauncher {
    pub fn new(settings: &ThumbnailSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.navigation_timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SessionLauncher for StaticLauncher {
    async fn open(&self) -> Result<Box<dyn PageSession>, NavigationError> {
        Ok(Box::new(StaticSession {
            client: self.client.clone(),
            user_agent: None,
            document: None,
        }))
    }
}

struct Document {
    /// The URL as requested when no redirect happened, else the final URL
    url: String,
    base: Url,
    body: String,
}

struct StaticSession {
    client: Client,
    user_agent: Option<String>,
    document: Option<Document>,
}

#[async_trait]
impl PageSession for StaticSession {
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), NavigationError> {
        self.user_agent = Some(user_agent.to_string());
        Ok(())
    }

    async fn navigate(&mut self, url: &str, _wait: WaitUntil) -> Result<(), NavigationError> {
        let failed = |reason: String| NavigationError::Navigate {
            url: url.to_string(),
            reason,
        };

        let mut request = self.client.get(url);
        if let Some(user_agent) = &self.user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        let response = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| failed(e.to_string()))?;

        let base = response.url().clone();
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;

        let redirected = Url::parse(url).map_or(true, |requested| requested != base);
        let current = if redirected {
            debug!(%url, final_url = %base, "Request was redirected");
            base.to_string()
        } else {
            url.to_string()
        };

        self.document = Some(Document {
            url: current,
            base,
            body,
        });
        Ok(())
    }

    async fn current_url(&mut self) -> Result<Option<String>, NavigationError> {
        Ok(self.document.as_ref().map(|doc| doc.url.clone()))
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, NavigationError> {
        let doc = self
            .document
            .as_ref()
            .ok_or_else(|| NavigationError::Snapshot("no document loaded".to_string()))?;

        Ok(PageSnapshot::from_html(&doc.body, Some(&doc.base)))
    }

    async fn close(&mut self) -> Result<(), NavigationError> {
        self.document = None;
        Ok(())
    }
}
