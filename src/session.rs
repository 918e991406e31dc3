use crate::error::{GradeError, Result};
use crate::marks::{MarkPolicy, MarkSheet};
use crate::roster::{self, Roster};
use crate::workbook;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Where the current roster came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSource {
    pub file_name: String,
    pub sha256: String,
    pub byte_len: usize,
    pub imported_at: DateTime<Utc>,
}

/// The dataset handed from import to mark entry to reporting.
///
/// The roster is fixed once imported; only the mark sheet changes.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    source: ImportSource,
    roster: Arc<Roster>,
    marks: MarkSheet,
}

fn ensure_spreadsheet(file_name: &str, media_type: Option<&str>) -> Result<()> {
    if roster::is_spreadsheet_candidate(file_name, media_type) {
        return Ok(());
    }
    Err(GradeError::validation_with(
        "please choose a valid Excel file (.xlsx or .xls)",
        json!({ "fileName": file_name, "mediaType": media_type }),
    ))
}

impl Session {
    /// Read the file at `path` and import it; `file_name` is the name the user picked.
    pub fn open(
        path: &Path,
        file_name: &str,
        media_type: Option<&str>,
        policy: MarkPolicy,
    ) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
        Self::import(file_name, media_type, &bytes, policy)
    }

    /// Decode, validate and adopt a roster workbook. Nothing is kept on failure.
    pub fn import(
        file_name: &str,
        media_type: Option<&str>,
        bytes: &[u8],
        policy: MarkPolicy,
    ) -> Result<Self> {
        ensure_spreadsheet(file_name, media_type)?;

        let grid = workbook::read_first_sheet(bytes)?;
        let roster = roster::import_rows(&grid)?;

        let source = ImportSource {
            file_name: file_name.to_string(),
            sha256: format!("{:x}", Sha256::digest(bytes)),
            byte_len: bytes.len(),
            imported_at: Utc::now(),
        };
        Ok(Self::from_roster(roster, source, policy))
    }

    pub fn from_roster(roster: Roster, source: ImportSource, policy: MarkPolicy) -> Self {
        let roster = Arc::new(roster);
        let marks = MarkSheet::for_roster(Arc::clone(&roster), policy);
        Self {
            id: Uuid::new_v4(),
            source,
            roster,
            marks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &ImportSource {
        &self.source
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn marks(&self) -> &MarkSheet {
        &self.marks
    }

    pub fn marks_mut(&mut self) -> &mut MarkSheet {
        &mut self.marks
    }
}
