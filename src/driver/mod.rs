//! Browser page abstraction.
//!
//! Every stage of the extraction pipeline talks to the portal through
//! [`PageDriver`]. Elements are addressed by a CSS selector plus the index of
//! the match in document order, so a [`Target`] found by one call can be acted
//! on by the next without holding a live element handle across awaits.

pub mod chromium;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Errors raised by a browser backend.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("no element matches `{selector}` at index {index}")]
    ElementMissing { selector: String, index: usize },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// The `index`-th element matching `selector`, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub selector: String,
    pub index: usize,
}

impl Target {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

/// A single open browser page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url` and wait for the load to finish.
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// Wait until the last click has replaced the document and the new one has loaded.
    ///
    /// Never returns while the clicked document is still current. Callers
    /// bound this with a timeout; a backend may wait indefinitely when
    /// nothing is navigating.
    async fn wait_for_navigation(&self) -> Result<(), DriverError>;

    async fn url(&self) -> Result<String, DriverError>;

    async fn title(&self) -> Result<String, DriverError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, DriverError>;

    /// Trimmed visible text of every element matching `selector`, in document order.
    async fn query_texts(&self, selector: &str) -> Result<Vec<String>, DriverError>;

    /// Replace the value of an input element.
    async fn fill(&self, target: &Target, value: &str) -> Result<(), DriverError>;

    async fn click(&self, target: &Target) -> Result<(), DriverError>;

    /// Tear down the page and everything backing it.
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Opens a fresh, isolated page. One call per session.
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageDriver>, DriverError>;
}

/// Result of waiting for a page transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Navigated,
    /// No navigation finished within the bound. Not a failure by itself.
    Stalled,
}

/// Wait up to `timeout` for a navigation to complete.
pub async fn wait_for_transition(page: &dyn PageDriver, timeout: Duration) -> Transition {
    match tokio::time::timeout(timeout, page.wait_for_navigation()).await {
        Ok(Ok(())) => Transition::Navigated,
        Ok(Err(e)) => {
            debug!(error = %e, "navigation wait failed");
            Transition::Stalled
        }
        Err(_) => Transition::Stalled,
    }
}

/// Navigate to `url`, failing with [`DriverError::Timeout`] after `timeout`.
pub async fn goto_within(
    page: &dyn PageDriver,
    url: &str,
    timeout: Duration,
) -> Result<(), DriverError> {
    match tokio::time::timeout(timeout, page.goto(url)).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout(timeout)),
    }
}
