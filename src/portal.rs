//! Portal addressing and a plain-HTTP reachability probe.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::utils::fmt_duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the ERP lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portal {
    base: Url,
    login: Url,
}

impl Portal {
    /// `base` is the application root, e.g. `https://host/GCET/`. A missing
    /// trailing slash is added so relative report paths resolve beneath it.
    pub fn new(base: &str, login_path: &str) -> Result<Self, url::ParseError> {
        let base = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{base}/"))?
        };
        let login = base.join(login_path)?;
        Ok(Self { base, login })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn login_url(&self) -> &Url {
        &self.login
    }

    /// Resolve a report path relative to the application root.
    pub fn page_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path)
    }

    /// Issue a GET against the login page without a browser.
    pub async fn probe(&self) -> PortalStatus {
        let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                return PortalStatus {
                    url: self.login.to_string(),
                    reachable: false,
                    status: None,
                    elapsed: String::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        let start = Instant::now();
        let result = client.get(self.login.clone()).send().await;
        let elapsed = fmt_duration(start.elapsed());
        match result {
            Ok(response) => {
                let status = response.status();
                debug!(url = %self.login, %status, elapsed, "portal probe answered");
                PortalStatus {
                    url: self.login.to_string(),
                    reachable: status.is_success(),
                    status: Some(status.as_u16()),
                    elapsed,
                    error: None,
                }
            }
            Err(e) => {
                warn!(url = %self.login, error = %e, "portal probe failed");
                PortalStatus {
                    url: self.login.to_string(),
                    reachable: false,
                    status: None,
                    elapsed,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Result of [`Portal::probe`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalStatus {
    pub url: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub elapsed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
