//! Raw attendance grid extraction.

use html_scraper::{Html, Selector};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

use super::{ROW, row_cells};

/// Cells longer than this in the known grid are layout leakage.
const PRIMARY_MAX_CELL: usize = 50;
/// Stricter bound for tables found by scanning.
const FALLBACK_MAX_CELL: usize = 30;

static MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)january|february|march|april|may|june|july|august|september|october|november|december",
    )
    .unwrap()
});

static GRID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"table[id*="grdOverallAtt"]"#).unwrap());
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());

/// Rows of trimmed cell text. The first row is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawGrid(Vec<Vec<String>>);

impl RawGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self(rows)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn header(&self) -> Option<&[String]> {
        self.0.first().map(Vec::as_slice)
    }

    /// Rows after the header.
    pub fn body(&self) -> &[Vec<String>] {
        self.0.get(1..).unwrap_or_default()
    }
}

impl From<Vec<Vec<String>>> for RawGrid {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Self(rows)
    }
}

/// Pull the attendance grid out of page HTML.
///
/// The known grid (`table[id*="grdOverallAtt"]`) is used when present, even if
/// it yields nothing. Otherwise every table is scanned for plausible rows and
/// the first table with any wins. An empty grid is a valid result.
pub fn extract_grid(html: &str) -> RawGrid {
    let document = Html::parse_document(html);

    if let Some(table) = document.select(&GRID).next() {
        let rows: Vec<Vec<String>> = table
            .select(&ROW)
            .map(|row| {
                row_cells(row)
                    .into_iter()
                    .filter(|cell| !cell.is_empty() && cell.chars().count() <= PRIMARY_MAX_CELL)
                    .collect::<Vec<_>>()
            })
            .filter(|row| !row.is_empty())
            .collect();
        debug!(rows = rows.len(), "extracted attendance grid");
        return RawGrid(rows);
    }

    for (index, table) in document.select(&TABLE).enumerate() {
        let rows: Vec<Vec<String>> = table
            .select(&ROW)
            .map(|row| {
                row_cells(row)
                    .into_iter()
                    .filter(|cell| fallback_cell_allowed(cell))
                    .collect::<Vec<_>>()
            })
            .filter(|row| (2..10).contains(&row.len()) && looks_like_attendance(row))
            .collect();
        if !rows.is_empty() {
            debug!(table = index, rows = rows.len(), "using fallback attendance table");
            return RawGrid(rows);
        }
    }

    debug!("no plausible attendance table on page");
    RawGrid::default()
}

fn fallback_cell_allowed(cell: &str) -> bool {
    !cell.is_empty()
        && cell.chars().count() <= FALLBACK_MAX_CELL
        && !cell.contains("font-")
        && !cell.contains("css")
}

fn looks_like_attendance(row: &[String]) -> bool {
    row.iter().any(|cell| {
        (!cell.is_empty() && cell.chars().all(|c| c.is_ascii_digit()))
            || cell.contains('%')
            || MONTH.is_match(cell)
    })
}
