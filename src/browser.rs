//! Headless Chromium sessions via chromiumoxide.
//!
//! Every session launches its own browser process with a throwaway profile
//! directory, so cookies and storage never leak from one article to the next.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{HeadlessMode, ThumbnailSettings};
use crate::evaluator::PageSnapshot;
use crate::session::{NavigationError, PageSession, SessionLauncher, WaitUntil};

/// Collects every image source [`crate::evaluator::evaluate`] looks at.
///
/// `currentSrc` is preferred for article and page images so lazy-loaded
/// pictures report the source the browser actually picked.
const SNAPSHOT_SCRIPT: &str = r#"
(() => {
  const all = (selector, pick) =>
    Array.from(document.querySelectorAll(selector)).map(pick).filter(Boolean);
  const rendered = img => img.currentSrc || img.src;
  const meta = selector => document.querySelector(selector)?.content || null;
  return {
    og_image: meta('meta[property="og:image"]'),
    twitter_image: meta('meta[name="twitter:image"]'),
    picture_sources: all('picture source[srcset]', s => s.srcset),
    container_images: [
      ...all('.elementor-widget-container img', img => img.src),
      ...all('.wJnIp img', img => img.src),
    ],
    article_images: all('article img, .article img', rendered),
    images: all('img', rendered),
  };
})()
"#;

/// Resolves once the navigated document has been parsed.
const DOM_READY_SCRIPT: &str = r#"
new Promise(resolve => {
  const check = () =>
    location.href !== 'about:blank' && document.readyState !== 'loading'
      ? resolve(true)
      : setTimeout(check, 50);
  check();
})
"#;

const DOM_READY_ATTEMPTS: usize = 40;
const DOM_READY_RETRY: Duration = Duration::from_millis(50);
/// Time a browser gets to exit on its own before the process is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct ChromeLauncher {
    headless: HeadlessMode,
    executable: Option<PathBuf>,
    args: Vec<String>,
}

impl ChromeLauncher {
    pub fn new(settings: &ThumbnailSettings) -> Self {
        Self {
            headless: settings.headless,
            executable: settings.chrome_executable.clone(),
            args: settings.launch_args.clone(),
        }
    }

    fn browser_config(&self, profile: &TempDir) -> Result<BrowserConfig, NavigationError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .args(self.args.clone());

        builder = match self.headless {
            HeadlessMode::New => builder.new_headless_mode(),
            HeadlessMode::Legacy => builder,
            HeadlessMode::Off => builder.with_head(),
        };

        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(NavigationError::Launch)
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn open(&self) -> Result<Box<dyn PageSession>, NavigationError> {
        let profile = tempfile::Builder::new()
            .prefix("gnews-thumbs-")
            .tempdir()
            .map_err(|e| NavigationError::Launch(format!("profile directory: {e}")))?;
        let config = self.browser_config(&profile)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| NavigationError::Launch(e.to_string()))?;

        // Drive the CDP connection in the background.
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(NavigationError::Launch(format!("new page: {e}")));
            }
        };

        debug!(profile = %profile.path().display(), "Browser session opened");

        Ok(Box::new(ChromeSession {
            browser,
            page,
            handler_task,
            _profile: profile,
        }))
    }
}

struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    // Removed from disk when the session is dropped.
    _profile: TempDir,
}

impl ChromeSession {
    async fn wait_for_dom(&self, url: &str) -> Result<(), NavigationError> {
        let params = EvaluateParams::builder()
            .expression(DOM_READY_SCRIPT)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|reason| NavigationError::Navigate {
                url: url.to_string(),
                reason,
            })?;

        let mut last_error = String::new();
        for _ in 0..DOM_READY_ATTEMPTS {
            // The execution context is torn down while the new document
            // commits, so early evaluations can fail.
            match self.page.evaluate_expression(params.clone()).await {
                Ok(_) => return Ok(()),
                Err(e) => last_error = e.to_string(),
            }
            tokio::time::sleep(DOM_READY_RETRY).await;
        }

        Err(NavigationError::Navigate {
            url: url.to_string(),
            reason: format!("document never became ready: {last_error}"),
        })
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), NavigationError> {
        self.page
            .set_user_agent(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(|e| NavigationError::Launch(format!("user agent: {e}")))?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<(), NavigationError> {
        let failed = |e: chromiumoxide::error::CdpError| NavigationError::Navigate {
            url: url.to_string(),
            reason: e.to_string(),
        };

        match wait {
            WaitUntil::Load => {
                self.page.goto(url).await.map_err(failed)?;
            }
            WaitUntil::DomContentLoaded => {
                let params = NavigateParams::builder()
                    .url(url)
                    .build()
                    .map_err(|reason| NavigationError::Navigate {
                        url: url.to_string(),
                        reason,
                    })?;
                let response = self.page.execute(params).await.map_err(failed)?;
                if let Some(reason) = response.result.error_text.clone() {
                    return Err(NavigationError::Navigate {
                        url: url.to_string(),
                        reason,
                    });
                }
                self.wait_for_dom(url).await?;
            }
        }

        info!(%url, ?wait, "Page navigated");
        Ok(())
    }

    async fn current_url(&mut self) -> Result<Option<String>, NavigationError> {
        self.page
            .url()
            .await
            .map_err(|e| NavigationError::Snapshot(format!("current url: {e}")))
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, NavigationError> {
        let params = EvaluateParams::builder()
            .expression(SNAPSHOT_SCRIPT)
            .return_by_value(true)
            .build()
            .map_err(NavigationError::Snapshot)?;

        self.page
            .evaluate_expression(params)
            .await
            .map_err(|e| NavigationError::Snapshot(e.to_string()))?
            .into_value::<PageSnapshot>()
            .map_err(|e| NavigationError::Snapshot(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), NavigationError> {
        let outcome = tokio::time::timeout(
            SHUTDOWN_GRACE,
            shutdown(&self.page, &mut self.browser),
        )
        .await
        .unwrap_or_else(|_| {
            Err(NavigationError::Timeout {
                action: "browser shutdown".to_string(),
                timeout: SHUTDOWN_GRACE,
            })
        });

        if let Err(e) = &outcome {
            warn!(error = %e, "Browser did not exit cleanly, killing it");
            if let Some(Err(kill_error)) = self.browser.kill().await {
                warn!(error = %kill_error, "Failed to kill browser process");
            }
        }
        self.handler_task.abort();

        outcome
    }
}

async fn shutdown(page: &Page, browser: &mut Browser) -> Result<(), NavigationError> {
    if let Err(e) = page.clone().close().await {
        debug!(error = %e, "Page close failed, closing browser anyway");
    }
    browser
        .close()
        .await
        .map_err(|e| NavigationError::Close(format!("browser: {e}")))?;
    browser
        .wait()
        .await
        .map_err(|e| NavigationError::Close(format!("browser exit: {e}")))?;
    Ok(())
}
