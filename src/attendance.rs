//! Turning a raw attendance grid into canonical numbers.
//!
//! The portal's grid has no stable column layout, so counts are recovered
//! with a tolerant heuristic over the cells after the first: the first integer
//! in [`CLASS_COUNT`] is taken as classes conducted, the next integer in range
//! that does not exceed it as classes attended, and any cell containing `%`
//! as the row's percentage (kept verbatim). Rows carrying extra numeric
//! columns in that range can be misread; this is a known limitation.

use serde::Serialize;
use std::ops::RangeInclusive;
use tracing::debug;

use crate::extract::RawGrid;

/// Plausible number of classes in one row.
pub const CLASS_COUNT: RangeInclusive<u32> = 10..=500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// First cell of the row, usually a month or subject.
    pub period: String,
    pub conducted: u32,
    pub attended: u32,
    /// Source text of the row's percentage cell, empty when there was none.
    pub percentage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_conducted: u32,
    pub total_attended: u32,
    /// `None` when nothing was conducted.
    pub overall_percentage: Option<f64>,
    pub records: Vec<AttendanceRecord>,
}

impl AttendanceSummary {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SemesterSource {
    /// Read from the last `Total` row of the grid.
    TotalRow,
    /// No usable `Total` row; taken from the summed records.
    Aggregate,
}

/// Attendance for the semester in progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSemester {
    pub present: u32,
    pub total: u32,
    pub absent: u32,
    pub percentage: f64,
    pub source: SemesterSource,
}

#[derive(Debug, Default)]
struct Counts<'a> {
    conducted: u32,
    attended: u32,
    percentage: Option<&'a str>,
    /// A bare decimal such as `"90.00"`, used only for `Total` rows.
    decimal: Option<f64>,
}

fn read_counts(cells: &[String]) -> Counts<'_> {
    let mut counts = Counts::default();
    for cell in cells {
        let cell = cell.trim();
        if cell.contains('%') {
            counts.percentage = Some(cell);
        } else if !cell.is_empty() && cell.bytes().all(|b| b.is_ascii_digit()) {
            let Ok(number) = cell.parse::<u32>() else {
                continue;
            };
            if !CLASS_COUNT.contains(&number) {
                continue;
            }
            if counts.conducted == 0 {
                counts.conducted = number;
            } else if counts.attended == 0 && number <= counts.conducted {
                counts.attended = number;
            }
        } else if counts.decimal.is_none() && cell.contains('.') {
            counts.decimal = cell.parse().ok();
        }
    }
    counts
}

/// Sum per-period rows into a summary. Pure; the header row and any row whose
/// first cell mentions "total" are skipped.
pub fn normalize(grid: &RawGrid) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();

    for row in grid.body() {
        let [first, rest @ ..] = row.as_slice() else {
            continue;
        };
        if row.len() < 3 || first.to_lowercase().contains("total") {
            continue;
        }

        let counts = read_counts(rest);
        if counts.conducted == 0 || counts.attended == 0 {
            debug!(?row, "row has no usable class counts");
            continue;
        }

        summary.total_conducted += counts.conducted;
        summary.total_attended += counts.attended;
        summary.records.push(AttendanceRecord {
            period: first.clone(),
            conducted: counts.conducted,
            attended: counts.attended,
            percentage: counts.percentage.unwrap_or_default().to_owned(),
        });
    }

    if summary.total_conducted > 0 {
        summary.overall_percentage = Some(percent(summary.total_attended, summary.total_conducted));
    }
    summary
}

/// Prefer the last row labelled exactly `Total`; otherwise fall back to `summary`.
///
/// The `Total` row is trusted as-is, so its counts are not limited to
/// [`CLASS_COUNT`]: the first adjacent pair of integer cells with
/// `attended <= conducted` is taken, which skips a leading semester number.
pub fn current_semester(grid: &RawGrid, summary: &AttendanceSummary) -> CurrentSemester {
    let total_row = grid
        .rows()
        .iter()
        .rev()
        .find(|row| row.len() >= 4 && row[0] == "Total");

    if let Some(row) = total_row {
        if let Some((conducted, attended)) = total_counts(&row[1..]) {
            let counts = read_counts(&row[1..]);
            let percentage = counts
                .percentage
                .and_then(|p| p.trim_end_matches('%').trim().parse().ok())
                .or(counts.decimal)
                .unwrap_or_else(|| percent(attended, conducted));
            return CurrentSemester {
                present: attended,
                total: conducted,
                absent: conducted - attended,
                percentage,
                source: SemesterSource::TotalRow,
            };
        }
        debug!(?row, "total row has no usable class counts, using aggregate");
    }

    CurrentSemester {
        present: summary.total_attended,
        total: summary.total_conducted,
        absent: summary.total_conducted - summary.total_attended,
        percentage: summary.overall_percentage.unwrap_or(0.0),
        source: SemesterSource::Aggregate,
    }
}

/// `(conducted, attended)` from a `Total` row's cells.
fn total_counts(cells: &[String]) -> Option<(u32, u32)> {
    let numbers: Vec<u32> = cells
        .iter()
        .map(|cell| cell.trim())
        .filter(|cell| !cell.is_empty() && cell.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|cell| cell.parse().ok())
        .collect();
    numbers
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .find(|&(conducted, attended)| conducted > 0 && attended <= conducted)
}

fn percent(part: u32, whole: u32) -> f64 {
    round2(100.0 * f64::from(part) / f64::from(whole))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
