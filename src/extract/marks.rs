//! Marks / grades table extraction.

use html_scraper::Html;
use serde::Serialize;
use tracing::debug;

use super::{ROW, row_cells, selectors};

const MARKS_TABLES: &[&str] = &[
    r#"table[id*="marks"]"#,
    r#"table[class*="marks"]"#,
    r#"table[id*="Marks"]"#,
    r#"table[id*="grade"]"#,
    r#"table[class*="grade"]"#,
    ".marks-table",
    ".grades-table",
    ".results-table",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarksTable {
    pub rows: Vec<Vec<String>>,
}

impl MarksTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rows of the first marks-like table that has any non-empty row.
pub fn extract_marks(html: &str) -> MarksTable {
    let document = Html::parse_document(html);

    for selector in selectors(MARKS_TABLES) {
        for table in document.select(&selector) {
            let rows: Vec<Vec<String>> = table
                .select(&ROW)
                .map(|row| {
                    row_cells(row)
                        .into_iter()
                        .filter(|cell| !cell.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|row| !row.is_empty())
                .collect();
            if !rows.is_empty() {
                debug!(rows = rows.len(), "extracted marks table");
                return MarksTable { rows };
            }
        }
    }
    MarksTable::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_populated_table_wins() {
        let html = r#"
            <table id="grdMarksEmpty"></table>
            <table class="marks">
              <tr><th>Subject</th><th>Mid-1</th></tr>
              <tr><td>DBMS</td><td>24</td></tr>
            </table>
            <table class="grades"><tr><td>ignored</td></tr></table>"#;
        assert_eq!(
            extract_marks(html).rows,
            vec![vec!["Subject", "Mid-1"], vec!["DBMS", "24"]]
        );
    }

    #[test]
    fn test_no_marks_table() {
        assert!(extract_marks("<table><tr><td>1</td></tr></table>").is_empty());
    }
}
