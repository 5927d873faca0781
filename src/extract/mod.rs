//! Pure HTML extraction over a snapshot of the current page.

pub mod grid;
pub mod marks;
pub mod student;

use html_scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

pub use grid::{RawGrid, extract_grid};
pub use marks::{MarksTable, extract_marks};
pub use student::{StudentInfo, extract_student_info};

pub(crate) static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());

/// Trimmed text content of an element, including descendants.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

/// Every `td`/`th` of `row`, in order, as trimmed text.
pub(crate) fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.select(&CELL).map(text_of).collect()
}

/// Parse each selector, skipping any the parser rejects.
pub(crate) fn selectors(css: &[&str]) -> Vec<Selector> {
    css.iter().filter_map(|s| Selector::parse(s).ok()).collect()
}

/// Text of the first element with non-empty text matched by any of `selectors`, in order.
pub(crate) fn first_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document
            .select(selector)
            .map(text_of)
            .find(|text| !text.is_empty())
    })
}
