use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::ThumbnailSettings;
use crate::evaluator::evaluate;
use crate::session::{NavigationError, PageSession, SessionGuard, SessionLauncher, WaitUntil};

/// Finds the thumbnail for one article link.
///
/// The link is opened in a fresh session and inspected as soon as its DOM is
/// parsed. Aggregator wrapper pages often carry the image already. If they do
/// not and the page has forwarded to the publisher, the publisher's page is
/// loaded fully, given time to render client-side images, and inspected once
/// more.
pub struct Navigator {
    launcher: Arc<dyn SessionLauncher>,
    user_agent: String,
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl Navigator {
    pub fn new(launcher: Arc<dyn SessionLauncher>, settings: &ThumbnailSettings) -> Self {
        Self {
            launcher,
            user_agent: settings.user_agent.clone(),
            navigation_timeout: settings.navigation_timeout(),
            settle_delay: settings.settle_delay(),
        }
    }

    /// Never fails: any error is logged and reported as "no thumbnail".
    pub async fn fetch_thumbnail(&self, url: &str) -> Option<String> {
        self.fetch(url, None).await
    }

    /// Like [`Navigator::fetch_thumbnail`], holding `permit` until the page
    /// session is closed, even if the lookup panics.
    pub async fn fetch_thumbnail_holding(
        &self,
        url: &str,
        permit: OwnedSemaphorePermit,
    ) -> Option<String> {
        self.fetch(url, Some(permit)).await
    }

    async fn fetch(&self, url: &str, permit: Option<OwnedSemaphorePermit>) -> Option<String> {
        let session = match self.launcher.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!(%url, error = %e, "Thumbnail failed");
                return None;
            }
        };

        let mut guard = SessionGuard::new(session, url).with_permit(permit);
        let outcome = self.lookup(&mut guard, url).await;
        if timeout(self.navigation_timeout, guard.release()).await.is_err() {
            warn!(%url, timeout = ?self.navigation_timeout, "Page session close timed out");
        }

        match outcome {
            Ok(Some(thumbnail)) => {
                info!(%url, %thumbnail, "Thumbnail found");
                Some(thumbnail)
            }
            Ok(None) => {
                debug!(%url, "No qualifying image");
                None
            }
            Err(e) => {
                warn!(%url, error = %e, "Thumbnail failed");
                None
            }
        }
    }

    async fn lookup(
        &self,
        guard: &mut SessionGuard,
        url: &str,
    ) -> Result<Option<String>, NavigationError> {
        let session = guard.session_mut()?;
        self.bounded("setting user agent", session.set_user_agent(&self.user_agent))
            .await?;

        self.navigate(session, url, WaitUntil::DomContentLoaded)
            .await?;
        if let Some(thumbnail) = self.inspect(session).await? {
            return Ok(Some(thumbnail));
        }

        match self.bounded("reading current url", session.current_url()).await? {
            Some(final_url) if final_url != url => {
                debug!(%url, %final_url, "Following redirect to article");
                self.navigate(session, &final_url, WaitUntil::Load).await?;
                if !self.settle_delay.is_zero() {
                    sleep(self.settle_delay).await;
                }
                self.inspect(session).await
            }
            _ => Ok(None),
        }
    }

    async fn navigate(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        wait: WaitUntil,
    ) -> Result<(), NavigationError> {
        self.bounded(&format!("navigation to {url}"), session.navigate(url, wait))
            .await
    }

    async fn inspect(
        &self,
        session: &mut dyn PageSession,
    ) -> Result<Option<String>, NavigationError> {
        let snapshot = self.bounded("page inspection", session.snapshot()).await?;
        Ok(evaluate(&snapshot))
    }

    /// Run one session step under the navigation timeout.
    async fn bounded<T>(
        &self,
        action: &str,
        step: impl Future<Output = Result<T, NavigationError>>,
    ) -> Result<T, NavigationError> {
        timeout(self.navigation_timeout, step)
            .await
            .map_err(|_| NavigationError::Timeout {
                action: action.to_string(),
                timeout: self.navigation_timeout,
            })?
    }
}
