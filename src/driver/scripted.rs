//! In-memory page used by tests: canned HTML screens, CSS evaluated with `scraper`.

use async_trait::async_trait;
use html_scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{DriverError, PageDriver, PageLauncher, Target};

/// One rendered page state.
#[derive(Debug, Clone)]
pub(crate) struct Screen {
    pub url: String,
    pub title: String,
    pub html: String,
    /// Clicking an element matching a trigger's selector switches screens.
    pub on_click: Vec<ClickTrigger>,
}

#[derive(Debug, Clone)]
pub(crate) struct ClickTrigger {
    pub selector: String,
    pub next_url: String,
    /// `false` swaps the content in place, like a partial postback, and no
    /// navigation is ever observed.
    pub navigates: bool,
}

impl Screen {
    pub fn new(url: &str, title: &str, html: &str) -> Self {
        Self {
            url: url.to_owned(),
            title: title.to_owned(),
            html: html.to_owned(),
            on_click: Vec::new(),
        }
    }

    pub fn on_click(self, selector: &str, next_url: &str) -> Self {
        self.trigger(selector, next_url, true)
    }

    pub fn swap_on_click(self, selector: &str, next_url: &str) -> Self {
        self.trigger(selector, next_url, false)
    }

    fn trigger(mut self, selector: &str, next_url: &str, navigates: bool) -> Self {
        self.on_click.push(ClickTrigger {
            selector: selector.to_owned(),
            next_url: next_url.to_owned(),
            navigates,
        });
        self
    }
}

#[derive(Debug)]
struct State {
    current: Screen,
    navigation_pending: bool,
}

/// Shared view of what a [`ScriptedPage`] was asked to do.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal {
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub fills: Arc<Mutex<Vec<(String, String)>>>,
    pub clicks: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.fills.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

pub(crate) struct ScriptedPage {
    screens: Vec<Screen>,
    /// URLs whose `goto` fails.
    broken_urls: Vec<String>,
    state: Mutex<State>,
    journal: Journal,
}

impl ScriptedPage {
    pub fn new(screens: Vec<Screen>) -> Self {
        Self::with_journal(screens, Vec::new(), Journal::default())
    }

    fn with_journal(screens: Vec<Screen>, broken_urls: Vec<String>, journal: Journal) -> Self {
        Self {
            screens,
            broken_urls,
            state: Mutex::new(State {
                current: Screen::new("about:blank", "", "<html><body></body></html>"),
                navigation_pending: false,
            }),
            journal,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn screen(&self, url: &str) -> Option<Screen> {
        self.screens.iter().find(|s| s.url == url).cloned()
    }

    /// Runs `f` on the element addressed by `target` in the current screen.
    fn with_element<T>(
        &self,
        target: &Target,
        f: impl FnOnce(ElementRef<'_>, &Screen) -> T,
    ) -> Result<T, DriverError> {
        let state = self.lock();
        let html = Html::parse_document(&state.current.html);
        let selector = parse(&target.selector)?;
        let element = html
            .select(&selector)
            .nth(target.index)
            .ok_or_else(|| DriverError::ElementMissing {
                selector: target.selector.clone(),
                index: target.index,
            })?;
        Ok(f(element, &state.current))
    }
}

fn parse(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector).map_err(|e| DriverError::Script(format!("{selector}: {e}")))
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        if self.broken_urls.iter().any(|u| u == url) {
            return Err(DriverError::Script(format!("net::ERR_CONNECTION_RESET at {url}")));
        }
        let next = self
            .screen(url)
            .unwrap_or_else(|| Screen::new(url, "Not Found", "<html><body>404</body></html>"));
        self.lock().current = next;
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), DriverError> {
        {
            let mut state = self.lock();
            if state.navigation_pending {
                state.navigation_pending = false;
                return Ok(());
            }
        }
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn url(&self) -> Result<String, DriverError> {
        Ok(self.lock().current.url.clone())
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self.lock().current.title.clone())
    }

    async fn content(&self) -> Result<String, DriverError> {
        Ok(self.lock().current.html.clone())
    }

    async fn query_texts(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        let html = Html::parse_document(&self.lock().current.html);
        let selector = parse(selector)?;
        Ok(html
            .select(&selector)
            .map(|el| el.text().collect::<String>().trim().to_owned())
            .collect())
    }

    async fn fill(&self, target: &Target, value: &str) -> Result<(), DriverError> {
        self.with_element(target, |_, _| ())?;
        if let Ok(mut fills) = self.journal.fills.lock() {
            fills.push((target.selector.clone(), value.to_owned()));
        }
        Ok(())
    }

    async fn click(&self, target: &Target) -> Result<(), DriverError> {
        let trigger = self.with_element(target, |element, screen| {
            screen
                .on_click
                .iter()
                .find(|trigger| {
                    Selector::parse(&trigger.selector).is_ok_and(|sel| sel.matches(&element))
                })
                .cloned()
        })?;

        if let Ok(mut clicks) = self.journal.clicks.lock() {
            clicks.push(target.selector.clone());
        }
        if let Some(trigger) = trigger {
            let mut state = self.lock();
            state.current = self
                .screen(&trigger.next_url)
                .unwrap_or_else(|| Screen::new(&trigger.next_url, "", "<html><body></body></html>"));
            state.navigation_pending = trigger.navigates;
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.journal.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`ScriptedPage`]s that share one [`Journal`].
#[derive(Clone, Default)]
pub(crate) struct ScriptedLauncher {
    screens: Vec<Screen>,
    broken_urls: Vec<String>,
    fail_open: bool,
    pub journal: Journal,
}

impl ScriptedLauncher {
    pub fn new(screens: Vec<Screen>) -> Self {
        Self {
            screens,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn with_broken_url(mut self, url: &str) -> Self {
        self.broken_urls.push(url.to_owned());
        self
    }
}

#[async_trait]
impl PageLauncher for ScriptedLauncher {
    async fn open(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        if self.fail_open {
            return Err(DriverError::Launch("chrome binary not found".to_owned()));
        }
        self.journal.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPage::with_journal(
            self.screens.clone(),
            self.broken_urls.clone(),
            self.journal.clone(),
        )))
    }
}
