//! Page sessions: one isolated page, opened for one article and closed after.
//!
//! [`SessionLauncher`] hands out sessions, [`PageSession`] drives one, and
//! [`SessionGuard`] makes sure every session that was opened gets closed exactly
//! once, whether the caller finishes normally, bails out with an error, or is
//! cancelled mid-navigation.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, warn};

use crate::evaluator::PageSnapshot;

/// How far a navigation must progress before it counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The initial document has been parsed; subresources may still be loading.
    DomContentLoaded,
    /// The `load` event has fired.
    Load,
}

#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("failed to open page session: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigate { url: String, reason: String },
    #[error("{action} timed out after {timeout:?}")]
    Timeout { action: String, timeout: Duration },
    #[error("failed to inspect page: {0}")]
    Snapshot(String),
    #[error("failed to close page session: {0}")]
    Close(String),
    #[error("page session was already released")]
    Released,
}

#[async_trait]
pub trait PageSession: Send {
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), NavigationError>;

    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<(), NavigationError>;

    /// URL of the document currently shown, after any redirects.
    async fn current_url(&mut self) -> Result<Option<String>, NavigationError>;

    async fn snapshot(&mut self) -> Result<PageSnapshot, NavigationError>;

    async fn close(&mut self) -> Result<(), NavigationError>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>, NavigationError>;
}

/// Scoped owner of an open [`PageSession`].
///
/// Prefer [`SessionGuard::release`], which awaits the close. If the guard is
/// dropped while still holding the session (an early return or a cancelled
/// task), the close is spawned onto the current tokio runtime instead.
///
/// A concurrency permit handed to the guard is held until the close has
/// finished, on either path.
pub struct SessionGuard {
    session: Option<Box<dyn PageSession>>,
    permit: Option<OwnedSemaphorePermit>,
    url: String,
}

impl SessionGuard {
    pub fn new(session: Box<dyn PageSession>, url: &str) -> Self {
        Self {
            session: Some(session),
            permit: None,
            url: url.to_string(),
        }
    }

    pub fn with_permit(mut self, permit: Option<OwnedSemaphorePermit>) -> Self {
        self.permit = permit;
        self
    }

    pub fn session_mut(&mut self) -> Result<&mut dyn PageSession, NavigationError> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(NavigationError::Released),
        }
    }

    pub async fn release(mut self) {
        if let Some(mut session) = self.session.take() {
            match session.close().await {
                Ok(()) => debug!(url = %self.url, "Page session closed"),
                Err(e) => warn!(url = %self.url, error = %e, "Failed to close page session"),
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let url = std::mem::take(&mut self.url);
        let permit = self.permit.take();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!(%url, error = %e, "Deferred page session close failed");
                    } else {
                        debug!(%url, "Deferred page session close succeeded");
                    }
                    drop(permit);
                });
            }
            Err(_) => warn!(%url, "No runtime left to close abandoned page session"),
        }
    }
}
