//! Headless Chromium backend over the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{DriverError, PageDriver, PageLauncher, Target};
use crate::utils::fmt_duration;

/// Flags for running inside containers and keeping background pages responsive.
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-web-security",
    "--disable-features=VizDisplayCompositor",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-timer-throttling",
    "--disable-renderer-backgrounding",
    "--disable-backgrounding-occluded-windows",
];

/// Set on the current document right before a click. A document that still
/// carries it has not been replaced by a navigation yet.
const STALE_MARK_SCRIPT: &str = "window.__erpStaleDocument = true";
const DOCUMENT_STATE_SCRIPT: &str =
    "window.__erpStaleDocument === true ? 'stale' : document.readyState";
const NAVIGATION_POLL: Duration = Duration::from_millis(100);

/// Browser process settings, derived from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub user_agent: String,
    pub viewport: (u32, u32),
    /// Upper bound on a single CDP request.
    pub request_timeout: Duration,
}

/// Launches one Chromium process per page, so no state survives between sessions.
pub struct ChromiumLauncher {
    settings: LaunchSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: LaunchSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> Result<BrowserConfig, DriverError> {
        let (width, height) = self.settings.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            })
            .request_timeout(self.settings.request_timeout)
            .arg(format!("--user-agent={}", self.settings.user_agent));
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        if let Some(path) = &self.settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }
        builder.build().map_err(DriverError::Launch)
    }
}

#[async_trait]
impl PageLauncher for ChromiumLauncher {
    async fn open(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        let start = Instant::now();
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        let handler = HandlerTask(tokio::spawn(async move {
            while (handler.next().await).is_some() {}
        }));

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!(error = %close_err, "failed to close browser after page creation failed");
                }
                let _ = browser.wait().await;
                return Err(e.into());
            }
        };

        info!(
            headless = self.settings.headless,
            duration = fmt_duration(start.elapsed()),
            "browser launched"
        );
        Ok(Box::new(ChromiumPage {
            browser,
            page,
            _handler: handler,
        }))
    }
}

/// Drives the CDP event loop; aborted when the page is dropped.
struct HandlerTask(JoinHandle<()>);

impl Drop for HandlerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    _handler: HandlerTask,
}

impl ChromiumPage {
    async fn element(&self, target: &Target) -> Result<Element, DriverError> {
        let mut elements = self.page.find_elements(target.selector.as_str()).await?;
        if target.index < elements.len() {
            Ok(elements.swap_remove(target.index))
        } else {
            Err(DriverError::ElementMissing {
                selector: target.selector.clone(),
                index: target.index,
            })
        }
    }

    async fn document_state(&self) -> Result<DocumentState, DriverError> {
        let state = self
            .page
            .evaluate(DOCUMENT_STATE_SCRIPT)
            .await?
            .into_value::<String>()
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(DocumentState::parse(&state))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentState {
    /// The document that was current when the click happened.
    Stale,
    Loading,
    Complete,
}

impl DocumentState {
    fn parse(raw: &str) -> Self {
        match raw {
            "stale" => Self::Stale,
            "complete" => Self::Complete,
            _ => Self::Loading,
        }
    }
}

/// Poll until a document other than the marked one has fully loaded.
///
/// Errors while polling are expected mid-navigation, when the execution
/// context is being torn down. Unbounded; callers apply their own timeout.
async fn await_fresh_document<F, Fut>(mut check: F, interval: Duration)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<DocumentState, DriverError>>,
{
    loop {
        match check().await {
            Ok(DocumentState::Complete) => return,
            Ok(state) => trace!(?state, "waiting for new document"),
            Err(e) => trace!(error = %e, "document unavailable during navigation"),
        }
        tokio::time::sleep(interval).await;
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), DriverError> {
        await_fresh_document(|| self.document_state(), NAVIGATION_POLL).await;
        Ok(())
    }

    async fn url(&self) -> Result<String, DriverError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, DriverError> {
        Ok(self.page.content().await?)
    }

    async fn query_texts(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        let quoted =
            serde_json::to_string(selector).map_err(|e| DriverError::Script(e.to_string()))?;
        let script = format!(
            "Array.from(document.querySelectorAll({quoted})).map(el => (el.innerText || el.textContent || '').trim())"
        );
        self.page
            .evaluate(script)
            .await?
            .into_value::<Vec<String>>()
            .map_err(|e| DriverError::Script(e.to_string()))
    }

    async fn fill(&self, target: &Target, value: &str) -> Result<(), DriverError> {
        let element = self.element(target).await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await?;
        element.click().await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn click(&self, target: &Target) -> Result<(), DriverError> {
        let element = self.element(target).await?;
        if let Err(e) = self.page.evaluate(STALE_MARK_SCRIPT).await {
            debug!(error = %e, "could not mark document before click");
        }
        element.click().await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let ChromiumPage {
            mut browser,
            page,
            _handler: handler,
        } = *self;

        let page_closed = page.close().await;
        let browser_closed = browser.close().await.map(|_| ());
        match browser.wait().await {
            Ok(status) => debug!(?status, "browser process exited"),
            Err(e) => warn!(error = %e, "failed waiting for browser process"),
        }
        drop(handler);

        page_closed?;
        browser_closed?;
        Ok(())
    }
}
