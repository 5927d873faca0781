//! Post-submit decision: did the portal let us in?
//!
//! The portal gives no reliable status code, so the verdict is a ranked set of
//! rules over signals scraped from the landing page. Rules are evaluated in
//! order and the first one that fires decides. An explicit error message always
//! wins over any positive signal.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::LoginFailure;
use crate::driver::PageDriver;
use crate::locator::catalog;
use crate::session::Session;

/// URL or title fragments seen on pages only reachable after login.
pub const SUCCESS_KEYWORDS: &[&str] = &[
    "dashboard",
    "home",
    "student",
    "portal",
    "welcome",
    "attendance",
    "marks",
    "profile",
    "main",
];

/// URL fragments of the login page itself.
pub const LOGIN_PAGE_MARKERS: &[&str] = &["login.aspx", "/login", "signin", "sign-in"];

/// Which positive signals were observed. Always fully populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub url_match: bool,
    pub title_match: bool,
    pub logout_present: bool,
    pub welcome_present: bool,
}

impl Evidence {
    pub fn from_signals(signals: &PageSignals) -> Self {
        Self {
            url_match: contains_any(&signals.url, SUCCESS_KEYWORDS),
            title_match: contains_any(&signals.title, SUCCESS_KEYWORDS),
            logout_present: signals.has_logout,
            welcome_present: signals
                .welcome_text
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty()),
        }
    }

    pub fn any(&self) -> bool {
        self.url_match || self.title_match || self.logout_present || self.welcome_present
    }
}

/// How an authenticated verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SuccessBasis {
    /// At least one positive signal was present.
    Signals,
    /// Nothing positive, but we are no longer on the login page.
    NavigatedAway,
}

/// Raw observations of the landing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSignals {
    pub url: String,
    pub title: String,
    /// All non-empty error texts joined with a space.
    pub error_text: Option<String>,
    pub has_logout: bool,
    pub welcome_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Authenticated {
        evidence: Evidence,
        basis: SuccessBasis,
    },
    Rejected(LoginFailure),
}

type Rule = fn(&PageSignals, &Evidence) -> Option<Verdict>;

/// Evaluated top to bottom; the first `Some` decides.
const RULES: &[(&str, Rule)] = &[
    ("error surface", error_surface),
    ("positive evidence", positive_evidence),
    ("still on login page", still_on_login_page),
];

fn error_surface(signals: &PageSignals, _: &Evidence) -> Option<Verdict> {
    signals
        .error_text
        .as_ref()
        .filter(|text| !text.trim().is_empty())
        .map(|text| Verdict::Rejected(LoginFailure::CredentialRejected(text.clone())))
}

fn positive_evidence(_: &PageSignals, evidence: &Evidence) -> Option<Verdict> {
    evidence.any().then_some(Verdict::Authenticated {
        evidence: *evidence,
        basis: SuccessBasis::Signals,
    })
}

fn still_on_login_page(signals: &PageSignals, _: &Evidence) -> Option<Verdict> {
    contains_any(&signals.url, LOGIN_PAGE_MARKERS)
        .then_some(Verdict::Rejected(LoginFailure::StillOnLoginPage))
}

/// Decide the login outcome from page signals. Pure.
pub fn classify(signals: &PageSignals) -> Verdict {
    let evidence = Evidence::from_signals(signals);

    for (name, rule) in RULES {
        if let Some(verdict) = rule(signals, &evidence) {
            debug!(rule = name, ?evidence, "login rule fired");
            return verdict;
        }
    }

    warn!(
        url = %signals.url,
        title = %signals.title,
        "no login signals either way, assuming success because the login page was left"
    );
    Verdict::Authenticated {
        evidence,
        basis: SuccessBasis::NavigatedAway,
    }
}

/// Text of every visible error surface, joined with a space; `None` when there is none.
pub async fn error_text(page: &dyn PageDriver) -> Option<String> {
    let texts = catalog::ERROR_SURFACE.collect_texts(page).await;
    (!texts.is_empty()).then(|| texts.join(" "))
}

/// Scrape the current page for everything [`classify`] looks at.
pub async fn collect_signals(page: &dyn PageDriver) -> PageSignals {
    let url = page.url().await.unwrap_or_else(|e| {
        debug!(error = %e, "could not read page url");
        String::new()
    });
    let title = page.title().await.unwrap_or_else(|e| {
        debug!(error = %e, "could not read page title");
        String::new()
    });

    PageSignals {
        url,
        title,
        error_text: error_text(page).await,
        has_logout: catalog::LOGOUT_INDICATOR.locate(page).await.is_some(),
        welcome_text: catalog::WELCOME_INDICATOR
            .locate_where(page, |text| !text.is_empty())
            .await
            .map(|found| found.text),
    }
}

/// Classify the session's current page, marking the session authenticated on success.
pub async fn confirm(session: &mut Session) -> (Verdict, PageSignals) {
    let signals = collect_signals(session.page()).await;
    let verdict = classify(&signals);
    match &verdict {
        Verdict::Authenticated { evidence, basis } => {
            session.mark_authenticated();
            info!(
                url = %signals.url,
                ?basis,
                url_match = evidence.url_match,
                title_match = evidence.title_match,
                logout = evidence.logout_present,
                welcome = evidence.welcome_present,
                "login confirmed"
            );
        }
        Verdict::Rejected(reason) => info!(url = %signals.url, %reason, "login rejected"),
    }
    (verdict, signals)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|needle| haystack.contains(needle))
}
