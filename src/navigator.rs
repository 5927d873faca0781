//! Moving an authenticated session to a report page.

use tracing::{debug, info, warn};

use crate::config::Timeouts;
use crate::driver::{PageDriver, Transition, goto_within, wait_for_transition};
use crate::locator::{LocatorSpec, catalog};
use crate::portal::Portal;
use crate::session::Session;

/// Report pages reachable after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    OverallAttendance,
    Marks,
}

impl Report {
    /// Path below the portal root, when the page has a stable address.
    pub fn direct_path(self) -> Option<&'static str> {
        match self {
            Self::OverallAttendance => Some("StudentLogin/Student/StudentOverallAttendance.aspx"),
            Self::Marks => None,
        }
    }

    /// Case-insensitive URL fragment identifying the page.
    pub fn url_marker(self) -> Option<&'static str> {
        match self {
            Self::OverallAttendance => Some("studentoverallattendance"),
            Self::Marks => None,
        }
    }

    /// Case-insensitive title fragment identifying the page.
    pub fn title_keyword(self) -> &'static str {
        match self {
            Self::OverallAttendance => "attendance",
            Self::Marks => "marks",
        }
    }

    fn link(self) -> &'static LocatorSpec {
        match self {
            Self::OverallAttendance => &catalog::OVERALL_ATTENDANCE_LINK,
            Self::Marks => &catalog::MARKS_LINK,
        }
    }
}

pub struct Navigator<'a> {
    portal: &'a Portal,
    timeouts: &'a Timeouts,
}

impl<'a> Navigator<'a> {
    pub fn new(portal: &'a Portal, timeouts: &'a Timeouts) -> Self {
        Self { portal, timeouts }
    }

    /// Try to reach `report`. `false` means "stay on the current page"; never fails.
    pub async fn navigate(&self, session: &Session, report: Report) -> bool {
        let page = session.page();

        if let Some(path) = report.direct_path() {
            if self.direct(page, report, path).await {
                info!(?report, "reached report by direct url");
                return true;
            }
            warn!(?report, "direct navigation unconfirmed, trying the menu");
        }

        let reached = self.via_menu(page, report).await;
        if reached {
            info!(?report, "reached report through the menu");
        } else {
            warn!(?report, "could not reach report, staying on current page");
        }
        reached
    }

    async fn direct(&self, page: &dyn PageDriver, report: Report, path: &str) -> bool {
        let url = match self.portal.page_url(path) {
            Ok(url) => url,
            Err(e) => {
                warn!(path, error = %e, "invalid report path");
                return false;
            }
        };

        if let Err(e) = goto_within(page, url.as_str(), self.timeouts.page_load_timeout).await {
            debug!(url = %url, error = %e, "direct navigation failed");
            return false;
        }
        on_report(page, report).await
    }

    async fn via_menu(&self, page: &dyn PageDriver, report: Report) -> bool {
        let menu = catalog::ACADEMICS_MENU
            .locate_where(page, |text| text.to_lowercase().contains("academic"))
            .await;
        match menu {
            Some(menu) => match page.click(&menu.target).await {
                Ok(()) => {
                    debug!(text = %menu.text, "opened academics menu");
                    tokio::time::sleep(self.timeouts.settle_delay).await;
                }
                Err(e) => debug!(error = %e, "academics menu click failed"),
            },
            None => debug!("no academics menu, looking for the report link directly"),
        }

        let Some(link) = report.link().locate(page).await else {
            return false;
        };
        if let Err(e) = page.click(&link.target).await {
            debug!(text = %link.text, error = %e, "report link click failed");
            return false;
        }
        if wait_for_transition(page, self.timeouts.page_load_timeout).await == Transition::Stalled {
            debug!(text = %link.text, "report link clicked but no navigation observed");
        }
        true
    }
}

/// Whether the page's URL or title identifies `report`.
async fn on_report(page: &dyn PageDriver, report: Report) -> bool {
    let url = page.url().await.unwrap_or_default().to_lowercase();
    let title = page.title().await.unwrap_or_default().to_lowercase();
    report.url_marker().is_some_and(|marker| url.contains(marker))
        || title.contains(report.title_keyword())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::{ScriptedLauncher, Screen};
    use crate::login::tests::{HOME_URL, portal};
    use crate::session::SessionDriver;
    use std::sync::Arc;

    const ATTENDANCE_URL: &str =
        "https://erp.test/GCET/StudentLogin/Student/StudentOverallAttendance.aspx";
    const MARKS_URL: &str = "https://erp.test/GCET/StudentLogin/Student/Marks.aspx";

    fn home_with_menu() -> Screen {
        Screen::new(
            HOME_URL,
            "Student Home",
            r##"<ul>
                <li><a id="mnuAcademic" href="#academic">Academics</a></li>
                <li><a href="Student/StudentOverallAttendance.aspx">Overall Attendance</a></li>
                <li><a href="Student/Marks.aspx">Internal Marks</a></li>
            </ul>"##,
        )
        .on_click(r#"a[href*="Marks"]"#, MARKS_URL)
        .on_click(r#"a[href*="StudentOverallAttendance"]"#, ATTENDANCE_URL)
    }

    async fn navigate(
        launcher: ScriptedLauncher,
        start: &str,
        report: Report,
    ) -> (bool, String, ScriptedLauncher) {
        let driver = SessionDriver::new(Arc::new(launcher.clone()));
        let portal = portal();
        let timeouts = Timeouts::fast();
        let (reached, url) = driver
            .scoped(async |session: &mut Session| {
                session.page().goto(start).await.ok();
                let reached = Navigator::new(&portal, &timeouts)
                    .navigate(session, report)
                    .await;
                Ok((reached, session.page().url().await.unwrap_or_default()))
            })
            .await
            .unwrap();
        (reached, url, launcher)
    }

    #[tokio::test]
    async fn test_direct_url() {
        let launcher = ScriptedLauncher::new(vec![
            home_with_menu(),
            Screen::new(ATTENDANCE_URL, "Overall Attendance", "<table></table>"),
        ]);
        let (reached, url, launcher) = navigate(launcher, HOME_URL, Report::OverallAttendance).await;
        assert!(reached);
        assert_eq!(url, ATTENDANCE_URL);
        assert!(launcher.journal.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_menu_when_direct_fails() {
        let launcher = ScriptedLauncher::new(vec![
            home_with_menu(),
            Screen::new(ATTENDANCE_URL, "Overall Attendance", "<table></table>"),
        ])
        .with_broken_url(ATTENDANCE_URL);
        let (reached, url, launcher) = navigate(launcher, HOME_URL, Report::OverallAttendance).await;
        assert!(reached);
        assert_eq!(url, ATTENDANCE_URL);
        assert_eq!(
            launcher.journal.clicks(),
            vec![
                r#"a[href*="academic"]"#.to_owned(),
                r#"a[href*="StudentOverallAttendance"]"#.to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn test_marks_has_no_direct_url() {
        let launcher = ScriptedLauncher::new(vec![
            home_with_menu(),
            Screen::new(MARKS_URL, "Internal Marks", "<table></table>"),
        ]);
        let (reached, url, _) = navigate(launcher, HOME_URL, Report::Marks).await;
        assert!(reached);
        assert_eq!(url, MARKS_URL);
    }

    #[tokio::test]
    async fn test_nothing_found_stays_put() {
        let bare = "https://erp.test/GCET/Blank.aspx";
        let launcher = ScriptedLauncher::new(vec![Screen::new(bare, "ERP", "<p>empty</p>")]);
        let (reached, url, _) = navigate(launcher, bare, Report::Marks).await;
        assert!(!reached);
        assert_eq!(url, bare);
    }
}
