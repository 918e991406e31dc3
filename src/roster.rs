use crate::error::{GradeError, Result};
use serde::Serialize;
use serde_json::json;
use std::path::Path;

/// Canonical column keys, in the positional order rows are read.
pub const REQUIRED_HEADERS: [&str; 3] = ["admissionNo", "surname", "name"];

pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerRecord {
    pub admission_no: String,
    pub surname: String,
    pub name: String,
}

impl LearnerRecord {
    pub fn cells(&self) -> [&str; 3] {
        [self.admission_no.as_str(), self.surname.as_str(), self.name.as_str()]
    }
}

/// Imported learners. Position in the list is the learner's identity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Roster {
    learners: Vec<LearnerRecord>,
}

impl Roster {
    pub fn new(learners: Vec<LearnerRecord>) -> Self {
        Self { learners }
    }

    pub fn learners(&self) -> &[LearnerRecord] {
        &self.learners
    }

    pub fn len(&self) -> usize {
        self.learners.len()
    }
}

pub fn header_display_name(key: &str) -> &'static str {
    match key {
        "admissionNo" => "Admission Number",
        "surname" => "Surname",
        "name" => "Name",
        _ => "",
    }
}

/// Accepts `.xlsx` / `.xls` names, or any media type that mentions a spreadsheet.
pub fn is_spreadsheet_candidate(file_name: &str, media_type: Option<&str>) -> bool {
    if media_type
        .map(|m| m.to_ascii_lowercase().contains("spreadsheet"))
        .unwrap_or(false)
    {
        return true;
    }
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|ok| e.eq_ignore_ascii_case(ok))
        })
        .unwrap_or(false)
}

/// Validate the header row of `rows` and read learners from columns 0, 1, 2.
///
/// Header matching is case-insensitive and order-insensitive; the columns
/// themselves are consumed positionally. Every data row is a learner, blank
/// ones included, so positions match the source sheet. Either every row is
/// accepted or the whole import fails.
pub fn import_rows(rows: &[Vec<String>]) -> Result<Roster> {
    if rows.len() < 2 {
        return Err(GradeError::validation_with(
            "workbook must have a header row and at least one data row",
            json!({ "rowCount": rows.len() }),
        ));
    }

    let lower_headers: Vec<String> = rows[0].iter().map(|h| h.to_lowercase()).collect();
    let missing: Vec<&str> = REQUIRED_HEADERS
        .iter()
        .copied()
        .filter(|h| !lower_headers.iter().any(|have| *have == h.to_lowercase()))
        .collect();
    if !missing.is_empty() {
        return Err(GradeError::validation_with(
            format!(
                "invalid headers: missing {} (expected admissionNo, surname, name)",
                missing.join(", ")
            ),
            json!({ "missing": missing, "found": rows[0] }),
        ));
    }

    let learners: Vec<LearnerRecord> = rows[1..]
        .iter()
        .map(|row| LearnerRecord {
            admission_no: cell(row, 0),
            surname: cell(row, 1),
            name: cell(row, 2),
        })
        .collect();

    Ok(Roster::new(learners))
}

fn cell(row: &[String], idx: usize) -> String {
    row.get(idx).cloned().unwrap_or_default()
}
