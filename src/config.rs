//! Configuration module for the extractor.
//!
//! Values come from `erp.toml` in the working directory, overridden by
//! `ERP_`-prefixed environment variables (a `.env` file is loaded first).

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

use crate::driver::chromium::LaunchSettings;
use crate::portal::Portal;

/// Main application configuration
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Log level for the application
    ///
    /// Controls the verbosity of this crate's logs. Other crates stay at `warn`.
    /// Valid values: "trace", "debug", "info", "warn", "error". Defaults to "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Application root of the ERP, e.g. `https://geethanjali-erp.com/GCET/`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Login page, relative to `base_url`
    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Chromium binary; auto-detected when unset
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// How long to wait for a login form field to appear
    ///
    /// Accepts plain seconds (`10`) or a duration string (`"10s"`, `"1500ms"`, `"1m"`).
    #[serde(
        default = "default_field_wait",
        deserialize_with = "deserialize_duration"
    )]
    pub field_wait: Duration,
    /// Bound on waiting for the page to change after a form step
    #[serde(
        default = "default_step_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub step_timeout: Duration,
    /// Bound on a full page load
    #[serde(
        default = "default_page_load_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub page_load_timeout: Duration,
    /// Pause used when a navigation could not be observed
    #[serde(
        default = "default_settle_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub settle_delay: Duration,
    /// How long to wait for the attendance grid to render
    #[serde(
        default = "default_grid_wait",
        deserialize_with = "deserialize_duration"
    )]
    pub grid_wait: Duration,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://geethanjali-erp.com/GCET/".to_string()
}

fn default_login_path() -> String {
    "Login.aspx".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_viewport_width() -> u32 {
    1366
}

fn default_viewport_height() -> u32 {
    768
}

fn default_field_wait() -> Duration {
    Duration::from_secs(10)
}

fn default_step_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_page_load_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_grid_wait() -> Duration {
    Duration::from_secs(10)
}

impl Config {
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("erp.toml"))
            .merge(Env::prefixed("ERP_"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            field_wait: self.field_wait,
            step_timeout: self.step_timeout,
            page_load_timeout: self.page_load_timeout,
            settle_delay: self.settle_delay,
            grid_wait: self.grid_wait,
        }
    }

    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            headless: self.headless,
            chrome_executable: self.chrome_executable.clone(),
            user_agent: self.user_agent.clone(),
            viewport: (self.viewport_width, self.viewport_height),
            request_timeout: self.page_load_timeout,
        }
    }

    pub fn portal(&self) -> Result<Portal, url::ParseError> {
        Portal::new(&self.base_url, &self.login_path)
    }
}

/// Every bounded wait used while driving the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub field_wait: Duration,
    pub step_timeout: Duration,
    pub page_load_timeout: Duration,
    pub settle_delay: Duration,
    pub grid_wait: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            field_wait: default_field_wait(),
            step_timeout: default_step_timeout(),
            page_load_timeout: default_page_load_timeout(),
            settle_delay: default_settle_delay(),
            grid_wait: default_grid_wait(),
        }
    }
}

#[cfg(test)]
impl Timeouts {
    /// Short enough that scripted flows finish instantly.
    pub(crate) fn fast() -> Self {
        Self {
            field_wait: Duration::from_millis(100),
            step_timeout: Duration::from_millis(50),
            page_load_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_millis(1),
            grid_wait: Duration::from_millis(100),
        }
    }
}

/// Parse a duration string such as `"10s"` or `"1500ms"`; a bare number means seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let parser =
        DurationParser::with_time_units(&[TimeUnit::MilliSecond, TimeUnit::Second, TimeUnit::Minute]);
    let parsed = parser
        .parse(input.trim())
        .map_err(|e| format!("invalid duration '{input}': {e}"))?;
    parsed
        .try_into()
        .map_err(|e| format!("duration '{input}' out of range: {e}"))
}

/// Custom deserializer accepting either whole seconds or a duration string
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DurationValue {
        Seconds(u64),
        Text(String),
    }

    match DurationValue::deserialize(deserializer)? {
        DurationValue::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
        DurationValue::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
