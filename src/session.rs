//! Per-request browser sessions.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info_span, warn};
use ulid::Ulid;

use crate::driver::{PageDriver, PageLauncher};
use crate::error::ExtractError;
use crate::utils::{fmt_duration, log_if_slow};

/// Closing a browser normally takes well under this.
const SLOW_RELEASE: Duration = Duration::from_secs(5);

/// One browser page owned by one extraction request.
#[derive(custom_debug_derive::Debug)]
pub struct Session {
    id: Ulid,
    #[debug(skip)]
    page: Box<dyn PageDriver>,
    authenticated: bool,
}

impl Session {
    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Only the login classifier flips this.
    pub(crate) fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }
}

/// Hands out isolated sessions and guarantees they are closed.
#[derive(Clone)]
pub struct SessionDriver {
    launcher: Arc<dyn PageLauncher>,
}

impl SessionDriver {
    pub fn new(launcher: Arc<dyn PageLauncher>) -> Self {
        Self { launcher }
    }

    pub async fn acquire(&self) -> Result<Session, ExtractError> {
        let page = self.launcher.open().await.map_err(ExtractError::Launch)?;
        let session = Session {
            id: Ulid::new(),
            page,
            authenticated: false,
        };
        debug!(session_id = %session.id, "session acquired");
        Ok(session)
    }

    /// Close the session's page. Failures are logged and swallowed.
    pub async fn release(&self, session: Session) {
        let start = Instant::now();
        let Session {
            id,
            page,
            authenticated,
        } = session;
        match page.close().await {
            Ok(()) => debug!(
                session_id = %id,
                authenticated,
                duration = fmt_duration(start.elapsed()),
                "session released"
            ),
            Err(e) => warn!(session_id = %id, error = %e, "failed to close session cleanly"),
        }
        log_if_slow(start, SLOW_RELEASE, "session release");
    }

    /// Run `f` against a fresh session, releasing it on every exit path.
    ///
    /// A panic inside `f` is caught, the session is released, and the panic
    /// is then resumed.
    pub async fn scoped<T, F>(&self, f: F) -> Result<T, ExtractError>
    where
        F: AsyncFnOnce(&mut Session) -> Result<T, ExtractError>,
    {
        let mut session = self.acquire().await?;
        let span = info_span!("session", session_id = %session.id);

        let outcome = AssertUnwindSafe(f(&mut session))
            .catch_unwind()
            .instrument(span.clone())
            .await;
        self.release(session).instrument(span).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverError;
    use crate::driver::scripted::{ScriptedLauncher, Screen};

    fn driver() -> (SessionDriver, ScriptedLauncher) {
        let launcher = ScriptedLauncher::new(vec![Screen::new(
            "https://portal.test/",
            "Portal",
            "<p>hi</p>",
        )]);
        (SessionDriver::new(Arc::new(launcher.clone())), launcher)
    }

    #[tokio::test]
    async fn test_scoped_releases_after_success() {
        let (driver, launcher) = driver();
        let value = driver
            .scoped(async |session: &mut Session| {
                session.page().goto("https://portal.test/").await.ok();
                Ok(session.page().title().await.unwrap_or_default())
            })
            .await
            .unwrap();
        assert_eq!(value, "Portal");
        assert_eq!(launcher.journal.opened(), 1);
        assert_eq!(launcher.journal.closed(), 1);
    }

    #[tokio::test]
    async fn test_scoped_releases_after_error() {
        let (driver, launcher) = driver();
        let result: Result<(), _> = driver
            .scoped(async |_session: &mut Session| {
                Err(ExtractError::driver("reading page")(DriverError::Script(
                    "target closed".to_owned(),
                )))
            })
            .await;
        assert!(matches!(
            result,
            Err(ExtractError::Driver {
                stage: "reading page",
                ..
            })
        ));
        assert_eq!(launcher.journal.closed(), 1);
    }

    #[tokio::test]
    async fn test_scoped_releases_after_panic() {
        let (driver, launcher) = driver();
        let caught = AssertUnwindSafe(driver.scoped(
            async |_session: &mut Session| -> Result<(), ExtractError> {
                panic!("extraction blew up")
            },
        ))
        .catch_unwind()
        .await;
        assert!(caught.is_err());
        assert_eq!(launcher.journal.opened(), 1);
        assert_eq!(launcher.journal.closed(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_opens_nothing() {
        let launcher = ScriptedLauncher::failing();
        let driver = SessionDriver::new(Arc::new(launcher.clone()));
        let result: Result<(), _> = driver.scoped(async |_session: &mut Session| Ok(())).await;
        assert!(matches!(result, Err(ExtractError::Launch(_))));
        assert_eq!(launcher.journal.closed(), 0);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let (driver, launcher) = driver();
        let first = driver.acquire().await.unwrap();
        let second = driver.acquire().await.unwrap();
        assert_ne!(first.id(), second.id());
        assert!(!first.is_authenticated());
        driver.release(first).await;
        driver.release(second).await;
        assert_eq!(launcher.journal.closed(), 2);
    }
}
