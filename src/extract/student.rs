//! Student profile labels shown on post-login pages.

use html_scraper::{Html, Selector};
use serde::Serialize;
use std::sync::LazyLock;

use super::{first_text, selectors};

static NAME: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        r#"[id*="name"]"#,
        r#"[class*="name"]"#,
        ".student-name",
        "#lblName",
        "#Name",
        ".info-name",
        r#"[data-field="name"]"#,
    ])
});

static ROLL_NUMBER: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        r#"[id*="roll"]"#,
        r#"[class*="roll"]"#,
        ".roll-number",
        "#lblRoll",
        "#RollNumber",
        ".info-roll",
        r#"[data-field="roll"]"#,
    ])
});

static BRANCH: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        r#"[id*="branch"]"#,
        r#"[class*="branch"]"#,
        ".branch",
        "#lblBranch",
        "#Branch",
        ".info-branch",
        r#"[data-field="branch"]"#,
    ])
});

static YEAR: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        r#"[id*="year"]"#,
        r#"[class*="year"]"#,
        ".year",
        "#lblYear",
        "#Year",
        ".info-year",
        r#"[data-field="year"]"#,
    ])
});

static SEMESTER: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    selectors(&[
        r#"[id*="sem"]"#,
        r#"[class*="sem"]"#,
        ".semester",
        "#lblSemester",
        "#Semester",
        ".info-semester",
        r#"[data-field="semester"]"#,
    ])
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
}

impl StudentInfo {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Each field takes the first non-empty text matched by its selectors, tried in order.
pub fn extract_student_info(html: &str) -> StudentInfo {
    let document = Html::parse_document(html);
    StudentInfo {
        name: first_text(&document, &NAME),
        roll_number: first_text(&document, &ROLL_NUMBER),
        branch: first_text(&document, &BRANCH),
        year: first_text(&document, &YEAR),
        semester: first_text(&document, &SEMESTER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let html = r#"
            <span id="ctl00_lblStudentname"></span>
            <span id="ctl00_lblname">R. SHARMA</span>
            <span id="lblrollno">22R11A0501</span>
            <div class="branch">CSE</div>
            <span id="lblyear">III</span>
            <span id="lblsem">II</span>"#;
        let info = extract_student_info(html);
        assert_eq!(
            info,
            StudentInfo {
                name: Some("R. SHARMA".to_owned()),
                roll_number: Some("22R11A0501".to_owned()),
                branch: Some("CSE".to_owned()),
                year: Some("III".to_owned()),
                semester: Some("II".to_owned()),
            }
        );
    }

    #[test]
    fn test_selector_order_decides() {
        let html = r#"<div class="student-name">Second</div><div id="studentname">First</div>"#;
        assert_eq!(extract_student_info(html).name.as_deref(), Some("First"));
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let info = extract_student_info("<p>nothing</p>");
        assert!(info.is_empty());
        assert_eq!(serde_json::to_value(&info).unwrap(), serde_json::json!({}));
    }
}
