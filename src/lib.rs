//! Automated login and attendance extraction for an ASP.NET college ERP.
//!
//! The portal has no API. A headless browser walks its two-step login form,
//! a ranked rule set decides whether the login took, and the attendance report
//! is scraped and normalized into per-period and aggregate numbers.
//!
//! Entry point is [`pipeline::Extractor`].

pub mod attendance;
pub mod config;
pub mod credential;
pub mod driver;
pub mod error;
pub mod extract;
pub mod fmt;
pub mod locator;
pub mod login;
pub mod navigator;
pub mod pipeline;
pub mod portal;
pub mod session;
pub mod utils;
