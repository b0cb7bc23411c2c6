//! In-memory page sessions for tests.
//!
//! Pages are keyed by URL and served from canned HTML. A page can report a
//! redirect target as its current URL, stall for a while, fail, or panic. The
//! launcher counts opens, closes, navigations and the peak number of sessions
//! open at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::evaluator::PageSnapshot;
use crate::session::{NavigationError, PageSession, SessionLauncher, WaitUntil};

#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    pub html: String,
    pub redirect_to: Option<String>,
    pub delay: Duration,
    pub error: Option<String>,
    pub panic: bool,
    pub stall_current_url: bool,
    pub hang_on_close: bool,
}

impl ScriptedPage {
    pub fn html(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Default::default()
        }
    }

    pub fn og_image(image: &str) -> Self {
        Self::html(&format!(
            r#"<html><head><meta property="og:image" content="{image}"></head><body></body></html>"#
        ))
    }

    pub fn empty() -> Self {
        Self::html("<html><body><p>no pictures here</p></body></html>")
    }

    pub fn with_redirect(mut self, target: &str) -> Self {
        self.redirect_to = Some(target.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    /// Never answers `current_url` once loaded.
    pub fn with_stalled_url(mut self) -> Self {
        self.stall_current_url = true;
        self
    }

    /// Never finishes closing once loaded.
    pub fn hanging_on_close(mut self) -> Self {
        self.hang_on_close = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LauncherStats {
    pub opened: usize,
    pub closed: usize,
    pub double_closes: usize,
    pub max_in_flight: usize,
}

#[derive(Default)]
struct Shared {
    pages: HashMap<String, ScriptedPage>,
    fail_open: AtomicBool,
    stall_user_agent: AtomicBool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    double_closes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    navigations: Mutex<Vec<(String, WaitUntil)>>,
    user_agents: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub struct ScriptedLauncher {
    shared: Arc<Shared>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page. Must be called before the launcher is shared.
    pub fn with_page(mut self, url: &str, page: ScriptedPage) -> Self {
        Arc::get_mut(&mut self.shared)
            .expect("register pages before sharing the launcher")
            .pages
            .insert(url.to_string(), page);
        self
    }

    pub fn failing_to_open(self) -> Self {
        self.shared.fail_open.store(true, Ordering::SeqCst);
        self
    }

    /// Sessions never finish setting the user agent.
    pub fn stalling_user_agent(self) -> Self {
        self.shared.stall_user_agent.store(true, Ordering::SeqCst);
        self
    }

    pub fn stats(&self) -> LauncherStats {
        LauncherStats {
            opened: self.shared.opened.load(Ordering::SeqCst),
            closed: self.shared.closed.load(Ordering::SeqCst),
            double_closes: self.shared.double_closes.load(Ordering::SeqCst),
            max_in_flight: self.shared.max_in_flight.load(Ordering::SeqCst),
        }
    }

    pub fn navigations(&self) -> Vec<(String, WaitUntil)> {
        self.shared.navigations.lock().unwrap().clone()
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.shared.user_agents.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn open(&self) -> Result<Box<dyn PageSession>, NavigationError> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(NavigationError::Launch("browser binary not found".to_string()));
        }

        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_in_flight.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            shared: self.shared.clone(),
            current_url: None,
            html: None,
            stall_current_url: false,
            hang_on_close: false,
            closed: false,
        }))
    }
}

struct ScriptedSession {
    shared: Arc<Shared>,
    current_url: Option<String>,
    html: Option<String>,
    stall_current_url: bool,
    hang_on_close: bool,
    closed: bool,
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), NavigationError> {
        self.shared
            .user_agents
            .lock()
            .unwrap()
            .push(user_agent.to_string());
        if self.shared.stall_user_agent.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<(), NavigationError> {
        self.shared
            .navigations
            .lock()
            .unwrap()
            .push((url.to_string(), wait));

        let page = self
            .shared
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| NavigationError::Navigate {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            })?;

        if !page.delay.is_zero() {
            tokio::time::sleep(page.delay).await;
        }
        if page.panic {
            panic!("renderer crashed on {url}");
        }
        if let Some(reason) = page.error {
            return Err(NavigationError::Navigate {
                url: url.to_string(),
                reason,
            });
        }

        self.current_url = Some(page.redirect_to.unwrap_or_else(|| url.to_string()));
        self.html = Some(page.html);
        self.stall_current_url = page.stall_current_url;
        self.hang_on_close = page.hang_on_close;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<Option<String>, NavigationError> {
        if self.stall_current_url {
            std::future::pending::<()>().await;
        }
        Ok(self.current_url.clone())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, NavigationError> {
        self.html
            .as_deref()
            .map(|html| PageSnapshot::from_html(html, None))
            .ok_or_else(|| NavigationError::Snapshot("no document loaded".to_string()))
    }

    async fn close(&mut self) -> Result<(), NavigationError> {
        if self.closed {
            self.shared.double_closes.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
        self.closed = true;
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
