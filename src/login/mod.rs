//! Two-step portal login: roll number first, then password on a second page.

pub mod classifier;

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Timeouts;
use crate::credential::Credential;
use crate::driver::{Transition, goto_within, wait_for_transition};
use crate::locator::catalog;
use crate::portal::Portal;
use crate::session::Session;
use crate::utils::fmt_duration;
pub use classifier::{Evidence, SuccessBasis, Verdict};

/// Why a login attempt ended without a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginFailure {
    #[error("{0} not found on login page")]
    FieldNotFound(&'static str),
    #[error("Password field not found - username may be invalid")]
    PasswordFieldNotFound,
    #[error("Login button not found on password page")]
    SubmitNotFound,
    #[error("Username validation failed: {0}")]
    UsernameRejected(String),
    #[error("Login failed at username step: {0}")]
    UsernameStepFailed(String),
    #[error("{0}")]
    CredentialRejected(String),
    #[error("Still on login page - invalid credentials or login failed")]
    StillOnLoginPage,
    #[error("Could not open login page: {0}")]
    Navigation(String),
    #[error("Login failed: {0}")]
    Interaction(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success {
        url: String,
        title: String,
        evidence: Evidence,
        basis: SuccessBasis,
    },
    Failure {
        reason: LoginFailure,
        url: String,
    },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Progress through the login form. Terminal states are [`LoginOutcome`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    UsernameEntered,
    AwaitingPasswordPage,
    PasswordEntered,
    AwaitingResult,
}

/// Drives one login attempt on a session.
pub struct LoginFlow<'a> {
    portal: &'a Portal,
    timeouts: &'a Timeouts,
}

impl<'a> LoginFlow<'a> {
    pub fn new(portal: &'a Portal, timeouts: &'a Timeouts) -> Self {
        Self { portal, timeouts }
    }

    pub async fn run(&self, session: &mut Session, credential: &Credential) -> LoginOutcome {
        let start = Instant::now();
        let login_url = self.portal.login_url();
        info!(url = %login_url, roll = %credential.masked(), "starting login");

        if let Err(e) = goto_within(
            session.page(),
            login_url.as_str(),
            self.timeouts.page_load_timeout,
        )
        .await
        {
            return self
                .fail(session, LoginFailure::Navigation(e.to_string()))
                .await;
        }

        let mut state = LoginState::Start;
        loop {
            let step = match state {
                LoginState::Start => self.enter_username(session, credential).await,
                LoginState::UsernameEntered => self.await_password_page(session).await,
                LoginState::AwaitingPasswordPage => self.enter_password(session, credential).await,
                LoginState::PasswordEntered => self.submit(session).await,
                LoginState::AwaitingResult => break,
            };
            match step {
                Ok(next) => {
                    debug!(from = ?state, to = ?next, "login state advanced");
                    state = next;
                }
                Err(reason) => {
                    info!(?state, %reason, "login attempt failed");
                    return self.fail(session, reason).await;
                }
            }
        }

        let (verdict, signals) = classifier::confirm(session).await;
        debug!(duration = fmt_duration(start.elapsed()), "login finished");
        match verdict {
            Verdict::Authenticated { evidence, basis } => LoginOutcome::Success {
                url: signals.url,
                title: signals.title,
                evidence,
                basis,
            },
            Verdict::Rejected(reason) => LoginOutcome::Failure {
                reason,
                url: signals.url,
            },
        }
    }

    async fn enter_username(
        &self,
        session: &Session,
        credential: &Credential,
    ) -> Result<LoginState, LoginFailure> {
        let page = session.page();
        let field = catalog::USERNAME_FIELD
            .locate_within(page, self.timeouts.field_wait)
            .await
            .ok_or(LoginFailure::FieldNotFound("Username field"))?;
        page.fill(&field.target, credential.expose())
            .await
            .map_err(|e| LoginFailure::Interaction(e.to_string()))?;

        let next = catalog::NEXT_BUTTON
            .locate(page)
            .await
            .ok_or(LoginFailure::FieldNotFound("Next button"))?;
        page.click(&next.target)
            .await
            .map_err(|e| LoginFailure::Interaction(e.to_string()))?;
        Ok(LoginState::UsernameEntered)
    }

    async fn await_password_page(&self, session: &Session) -> Result<LoginState, LoginFailure> {
        let page = session.page();
        if wait_for_transition(page, self.timeouts.step_timeout).await == Transition::Navigated {
            return Ok(LoginState::AwaitingPasswordPage);
        }

        if let Some(error) = classifier::error_text(page).await {
            return Err(LoginFailure::UsernameRejected(error));
        }

        warn!(
            timeout = fmt_duration(self.timeouts.step_timeout),
            "no page transition after username, continuing without one"
        );
        tokio::time::sleep(self.timeouts.settle_delay).await;
        Ok(LoginState::AwaitingPasswordPage)
    }

    async fn enter_password(
        &self,
        session: &Session,
        credential: &Credential,
    ) -> Result<LoginState, LoginFailure> {
        let page = session.page();
        let Some(field) = catalog::PASSWORD_FIELD
            .locate_within(page, self.timeouts.field_wait)
            .await
        else {
            let url = page.url().await.unwrap_or_default();
            warn!(%url, "password field not found");
            return Err(match classifier::error_text(page).await {
                Some(error) => LoginFailure::UsernameStepFailed(error),
                None => LoginFailure::PasswordFieldNotFound,
            });
        };

        page.fill(&field.target, credential.expose())
            .await
            .map_err(|e| LoginFailure::Interaction(e.to_string()))?;
        Ok(LoginState::PasswordEntered)
    }

    async fn submit(&self, session: &Session) -> Result<LoginState, LoginFailure> {
        let page = session.page();
        let button = catalog::SUBMIT_BUTTON
            .locate(page)
            .await
            .ok_or(LoginFailure::SubmitNotFound)?;
        page.click(&button.target)
            .await
            .map_err(|e| LoginFailure::Interaction(e.to_string()))?;

        if wait_for_transition(page, self.timeouts.step_timeout).await == Transition::Stalled {
            debug!("no navigation after submit, settling before classification");
            tokio::time::sleep(self.timeouts.settle_delay).await;
        }
        Ok(LoginState::AwaitingResult)
    }

    async fn fail(&self, session: &Session, reason: LoginFailure) -> LoginOutcome {
        let url = session.page().url().await.unwrap_or_default();
        LoginOutcome::Failure { reason, url }
    }
}
