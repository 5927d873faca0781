//! One complete extraction: login, navigate, read, normalize.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::attendance::{AttendanceSummary, CurrentSemester, current_semester, normalize};
use crate::config::Timeouts;
use crate::credential::Credential;
use crate::driver::PageLauncher;
use crate::error::ExtractError;
use crate::extract::{
    MarksTable, RawGrid, StudentInfo, extract_grid, extract_marks, extract_student_info,
};
use crate::locator::catalog;
use crate::login::{LoginFlow, LoginOutcome};
use crate::navigator::{Navigator, Report};
use crate::portal::Portal;
use crate::session::{Session, SessionDriver};
use crate::utils::fmt_duration;

/// Everything read for one student.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student_info: StudentInfo,
    pub attendance: AttendanceSummary,
    pub current_semester: CurrentSemester,
    pub marks: MarksTable,
    /// Marks read from the dedicated marks page, when it could be reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_marks: Option<MarksTable>,
    pub raw_grid: RawGrid,
    pub extracted_at: DateTime<Utc>,
    pub page_url: String,
}

/// Result handed back to callers, serialized as `{"success": bool, ...}`.
#[derive(Debug, Clone)]
pub enum ExtractionResponse {
    Success(Box<StudentReport>),
    Failure { error: String },
}

impl ExtractionResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl Serialize for ExtractionResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a, T: Serialize> {
            success: bool,
            #[serde(flatten)]
            body: &'a T,
        }

        #[derive(Serialize)]
        struct FailureBody<'a> {
            error: &'a str,
        }

        match self {
            Self::Success(report) => Tagged {
                success: true,
                body: report.as_ref(),
            }
            .serialize(serializer),
            Self::Failure { error } => Tagged {
                success: false,
                body: &FailureBody { error },
            }
            .serialize(serializer),
        }
    }
}

/// Runs extractions, each in its own browser session.
#[derive(Clone)]
pub struct Extractor {
    sessions: SessionDriver,
    portal: Portal,
    timeouts: Timeouts,
}

impl Extractor {
    pub fn new(launcher: Arc<dyn PageLauncher>, portal: Portal, timeouts: Timeouts) -> Self {
        Self {
            sessions: SessionDriver::new(launcher),
            portal,
            timeouts,
        }
    }

    /// Log in as `credential` and read the student's reports.
    ///
    /// A rejected login is an `Ok` failure response; `Err` is reserved for
    /// browser failures. The session is closed in every case.
    pub async fn extract(&self, credential: &Credential) -> Result<ExtractionResponse, ExtractError> {
        let start = Instant::now();
        let response = self
            .sessions
            .scoped(async |session: &mut Session| self.run(session, credential).await)
            .await;
        info!(
            roll = %credential.masked(),
            success = response.as_ref().is_ok_and(ExtractionResponse::is_success),
            duration = fmt_duration(start.elapsed()),
            "extraction finished"
        );
        response
    }

    async fn run(
        &self,
        session: &mut Session,
        credential: &Credential,
    ) -> Result<ExtractionResponse, ExtractError> {
        let outcome = LoginFlow::new(&self.portal, &self.timeouts)
            .run(session, credential)
            .await;
        if let LoginOutcome::Failure { reason, url } = outcome {
            info!(%reason, %url, "login failed");
            return Ok(ExtractionResponse::failure(reason.to_string()));
        }

        let navigator = Navigator::new(&self.portal, &self.timeouts);
        if !navigator.navigate(session, Report::OverallAttendance).await {
            warn!("attendance page not confirmed, reading the current page");
        }

        let page = session.page();
        if catalog::ATTENDANCE_GRID
            .locate_within(page, self.timeouts.grid_wait)
            .await
            .is_none()
        {
            debug!("attendance grid did not render, scanning all tables");
        }

        let html = page
            .content()
            .await
            .map_err(ExtractError::driver("reading attendance page"))?;
        let page_url = page
            .url()
            .await
            .map_err(ExtractError::driver("reading attendance page"))?;

        let raw_grid = extract_grid(&html);
        let attendance = normalize(&raw_grid);
        let current_semester = current_semester(&raw_grid, &attendance);
        if attendance.is_empty() {
            info!(rows = raw_grid.len(), "no attendance records found");
        }
        let student_info = extract_student_info(&html);
        let marks = extract_marks(&html);

        let detailed_marks = self.detailed_marks(session, &navigator).await;

        Ok(ExtractionResponse::Success(Box::new(StudentReport {
            student_info,
            attendance,
            current_semester,
            marks,
            detailed_marks,
            raw_grid,
            extracted_at: Utc::now(),
            page_url,
        })))
    }

    /// Second pass over the marks page. Any failure just means no detailed marks.
    async fn detailed_marks(&self, session: &Session, navigator: &Navigator<'_>) -> Option<MarksTable> {
        if !navigator.navigate(session, Report::Marks).await {
            return None;
        }
        match session.page().content().await {
            Ok(html) => Some(extract_marks(&html)).filter(|marks| !marks.is_empty()),
            Err(e) => {
                warn!(error = %e, "could not read marks page");
                None
            }
        }
    }
}
