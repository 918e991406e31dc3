use crate::calc::{self, GradeCode, Score};
use crate::error::{GradeError, Result};
use crate::marks::{MarkField, MarkSheet, TaskGroup};
use crate::roster::{LearnerRecord, Roster, REQUIRED_HEADERS};
use crate::xlsx::{Cell, Sheet, Workbook, WriteSummary};
use anyhow::Context;
use serde::Serialize;
use std::path::Path;

pub const ROSTER_EXPORT_FILE: &str = "learners_results.xlsx";
pub const RESULTS_EXPORT_FILE: &str = "results_with_summary.xlsx";

pub const ROSTER_SHEET: &str = "Sheet1";
pub const RESULTS_SHEET: &str = "Results";
pub const SUMMARY_SHEET: &str = "Summary Counts";

/// Rows taken by the grouped header on the results sheet.
pub const RESULTS_HEADER_ROWS: usize = 3;

const IDENTITY_HEADINGS: [&str; 3] = ["Admission No", "Surname", "Name"];
const SCORE_HEADINGS: [&str; 3] = ["Mark", "%", "Code"];
const AVERAGE_LABEL: &str = "Class Average";
const UNBANDED: &str = "-";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub key: MarkField,
    pub label: String,
    pub max: f64,
}

impl From<MarkField> for FieldInfo {
    fn from(field: MarkField) -> Self {
        Self {
            key: field,
            label: field.label(),
            max: field.max(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCell {
    pub field: MarkField,
    pub mark: f64,
    pub percentage: f64,
    pub percentage_text: String,
    pub code: GradeCode,
}

impl ScoreCell {
    fn new(field: MarkField, score: Score) -> Self {
        Self {
            field,
            mark: score.mark,
            percentage: score.percentage,
            percentage_text: calc::format_1_decimal(score.percentage),
            code: score.code,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub index: usize,
    pub learner: LearnerRecord,
    /// One per field, in `MarkField::ALL` order.
    pub scores: Vec<ScoreCell>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageCell {
    pub field: MarkField,
    pub mark: f64,
    pub mark_text: String,
    pub percentage: f64,
    pub percentage_text: String,
    pub code: &'static str,
    /// Learners the mean was taken over.
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDistribution {
    pub field: MarkField,
    /// Learner counts for codes 1..=7.
    pub counts: [usize; 7],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    pub learner_count: usize,
    pub fields: Vec<FieldInfo>,
    pub rows: Vec<ReportRow>,
    pub averages: Vec<AverageCell>,
    pub distribution: Vec<CodeDistribution>,
}

#[cfg(test)]
impl ReportModel {
    pub fn average(&self, field: MarkField) -> Option<&AverageCell> {
        self.averages.iter().find(|a| a.field == field)
    }

    pub fn counts(&self, field: MarkField) -> Option<&[usize; 7]> {
        self.distribution
            .iter()
            .find(|d| d.field == field)
            .map(|d| &d.counts)
    }
}

/// Scores, class averages and the per-code distribution for a mark sheet.
pub fn build_report(sheet: &MarkSheet) -> Result<ReportModel> {
    if sheet.is_empty() {
        return Err(GradeError::EmptyDataset {
            field: "learners".to_string(),
        });
    }

    let rows: Vec<ReportRow> = sheet
        .roster()
        .learners()
        .iter()
        .zip(sheet.entries())
        .enumerate()
        .map(|(index, (learner, entry))| ReportRow {
            index,
            learner: learner.clone(),
            scores: MarkField::ALL
                .iter()
                .map(|&f| ScoreCell::new(f, calc::score_of(entry.get(f), f.max())))
                .collect(),
        })
        .collect();

    let mut averages = Vec::with_capacity(MarkField::ALL.len());
    for field in MarkField::ALL {
        let avg = sheet.average_of(field)?;
        averages.push(AverageCell {
            field,
            mark: avg.avg_raw,
            mark_text: calc::format_1_decimal(avg.avg_raw),
            percentage: avg.avg_percent,
            percentage_text: calc::format_1_decimal(avg.avg_percent),
            code: UNBANDED,
            count: avg.count,
        });
    }

    let distribution = MarkField::ALL
        .iter()
        .enumerate()
        .map(|(slot, &field)| CodeDistribution {
            field,
            counts: calc::code_counts(rows.iter().map(|r| r.scores[slot].code)),
        })
        .collect();

    Ok(ReportModel {
        learner_count: rows.len(),
        fields: MarkField::ALL.iter().copied().map(FieldInfo::from).collect(),
        rows,
        averages,
        distribution,
    })
}

/// Single sheet: canonical header row, then one row per learner.
pub fn roster_workbook(roster: &Roster) -> Workbook {
    let mut sheet = Sheet::new(ROSTER_SHEET);
    sheet.push_row(REQUIRED_HEADERS.iter().map(|h| Cell::text(*h)).collect());
    for learner in roster.learners() {
        sheet.push_row(learner.cells().iter().map(|c| Cell::text(*c)).collect());
    }
    Workbook::new(vec![sheet])
}

pub fn results_workbook(report: &ReportModel) -> Workbook {
    Workbook::new(vec![results_sheet(report), summary_sheet(report)])
}

fn results_sheet(report: &ReportModel) -> Sheet {
    let identity_cols = IDENTITY_HEADINGS.len();
    let width = identity_cols + MarkField::ALL.len() * SCORE_HEADINGS.len();
    let mut sheet = Sheet::new(RESULTS_SHEET);

    let mut top = vec![Cell::header_blank(); width];
    let mut middle = vec![Cell::header_blank(); width];
    let mut bottom = vec![Cell::header_blank(); width];

    for (col, heading) in IDENTITY_HEADINGS.iter().enumerate() {
        top[col] = Cell::header(*heading);
        sheet.merge(0, col, RESULTS_HEADER_ROWS - 1, col);
    }

    let mut col = identity_cols;
    for group in TaskGroup::ALL {
        let group_width = group.fields().len() * SCORE_HEADINGS.len();
        top[col] = Cell::header(group.heading());
        sheet.merge(0, col, 0, col + group_width - 1);

        for &field in group.fields() {
            match field.question() {
                // Lone field: Mark / % / Code span rows 2-3.
                None => {
                    for (i, heading) in SCORE_HEADINGS.iter().enumerate() {
                        middle[col + i] = Cell::header(*heading);
                        sheet.merge(1, col + i, 2, col + i);
                    }
                }
                Some(question) => {
                    middle[col] = Cell::header(format!("{} ({})", question, field.max()));
                    sheet.merge(1, col, 1, col + SCORE_HEADINGS.len() - 1);
                    for (i, heading) in SCORE_HEADINGS.iter().enumerate() {
                        bottom[col + i] = Cell::header(*heading);
                    }
                }
            }
            col += SCORE_HEADINGS.len();
        }
    }

    sheet.push_row(top);
    sheet.push_row(middle);
    sheet.push_row(bottom);

    for row in &report.rows {
        let mut cells: Vec<Cell> = row.learner.cells().iter().map(|c| Cell::text(*c)).collect();
        for score in &row.scores {
            cells.push(Cell::number(score.mark));
            cells.push(Cell::one_decimal(score.percentage));
            cells.push(Cell::text(score.code.as_str()));
        }
        sheet.push_row(cells);
    }

    let mut avg_cells = vec![Cell::header(AVERAGE_LABEL), Cell::header_blank(), Cell::header_blank()];
    for avg in &report.averages {
        avg_cells.push(Cell::one_decimal(avg.mark));
        avg_cells.push(Cell::one_decimal(avg.percentage));
        avg_cells.push(Cell::text(avg.code));
    }
    let avg_row = sheet.push_row(avg_cells);
    sheet.merge(avg_row, 0, avg_row, identity_cols - 1);

    sheet
}

fn summary_sheet(report: &ReportModel) -> Sheet {
    let mut sheet = Sheet::new(SUMMARY_SHEET);

    let mut header = vec![Cell::header("Code")];
    header.extend(MarkField::ALL.iter().map(|f| Cell::header(f.label())));
    sheet.push_row(header);

    for code in GradeCode::all() {
        let mut cells = vec![Cell::text(code.as_str())];
        for d in &report.distribution {
            cells.push(Cell::number(d.counts[code.slot()] as f64));
        }
        sheet.push_row(cells);
    }

    sheet
}

pub fn export_roster(roster: &Roster, out_path: &Path) -> Result<WriteSummary> {
    let summary = roster_workbook(roster)
        .write_to_path(out_path)
        .with_context(|| format!("failed to export roster to {}", out_path.to_string_lossy()))?;
    Ok(summary)
}

pub fn export_results(report: &ReportModel, out_path: &Path) -> Result<WriteSummary> {
    let summary = results_workbook(report)
        .write_to_path(out_path)
        .with_context(|| format!("failed to export results to {}", out_path.to_string_lossy()))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GradeError;
    use crate::marks::MarkPolicy;
    use crate::xlsx::CellValue;
    use calamine::{open_workbook_auto, Data, Reader};
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> std::path::PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn learner(adm: &str, surname: &str, name: &str) -> LearnerRecord {
        LearnerRecord {
            admission_no: adm.into(),
            surname: surname.into(),
            name: name.into(),
        }
    }

    fn sample_sheet() -> MarkSheet {
        let roster = Arc::new(Roster::new(vec![
            learner("001", "Doe", "Jane"),
            learner("002", "Roe", "Rick"),
            learner("003", "Poe", "Edgar"),
        ]));
        let mut sheet = MarkSheet::for_roster(roster, MarkPolicy::Enforced);
        for (i, (t1, t2, q1)) in [("10", "24", "20"), ("8", "", "9"), ("6", "12", "x")]
            .iter()
            .enumerate()
        {
            sheet.set_field(i, MarkField::Task1, *t1).expect("task1");
            sheet.set_field(i, MarkField::Task2, *t2).expect("task2");
            sheet.set_field(i, MarkField::Task3Q1, *q1).expect("task3q1");
        }
        sheet
    }

    #[test]
    fn report_rows_and_averages() {
        let report = build_report(&sample_sheet()).expect("report");
        assert_eq!(report.learner_count, 3);
        assert_eq!(report.rows[0].scores.len(), 5);

        let jane_t2 = &report.rows[0].scores[1];
        assert_eq!(jane_t2.field, MarkField::Task2);
        assert_eq!(jane_t2.percentage_text, "80.0");
        assert_eq!(jane_t2.code.as_str(), "7");

        let rick_t2 = &report.rows[1].scores[1];
        assert_eq!(rick_t2.mark, 0.0);
        assert_eq!(rick_t2.percentage_text, "0.0");
        assert_eq!(rick_t2.code.as_str(), "1");

        let t1 = report.average(MarkField::Task1).expect("task1 average");
        assert_eq!(t1.mark_text, "8.0");
        assert_eq!(t1.percentage_text, "80.0");
        assert_eq!(t1.code, "-");

        // (24 + 0 + 12) / 3 = 12 -> 40% of 30
        let t2 = report.average(MarkField::Task2).expect("task2 average");
        assert_eq!(t2.mark, 12.0);
        assert_eq!(t2.percentage, 40.0);

        // 20, 9, "x"=0 -> 9.666.. -> 9.7 -> 48.5%
        let q1 = report.average(MarkField::Task3Q1).expect("q1 average");
        assert_eq!(q1.mark_text, "9.7");
        assert_eq!(q1.percentage_text, "48.5");
    }

    #[test]
    fn distribution_counts_every_learner_once_per_field() {
        let report = build_report(&sample_sheet()).expect("report");
        // task1: 100%, 80%, 60%
        assert_eq!(
            report.counts(MarkField::Task1),
            Some(&[0, 0, 0, 0, 1, 0, 2])
        );
        for d in &report.distribution {
            assert_eq!(d.counts.iter().sum::<usize>(), 3);
        }
        // unset task3q3 everywhere
        assert_eq!(report.counts(MarkField::Task3Q3), Some(&[3, 0, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn empty_roster_cannot_be_reported() {
        let sheet = MarkSheet::for_roster(Arc::new(Roster::default()), MarkPolicy::Enforced);
        assert!(matches!(
            build_report(&sheet),
            Err(GradeError::EmptyDataset { .. })
        ));
    }

    #[test]
    fn results_sheet_layout() {
        let report = build_report(&sample_sheet()).expect("report");
        let wb = results_workbook(&report);
        let results = &wb.sheets()[0];
        assert_eq!(results.name(), RESULTS_SHEET);
        assert_eq!(wb.sheets()[1].name(), SUMMARY_SHEET);

        let merges: Vec<String> = results.merges().iter().map(|m| m.a1()).collect();
        for expected in [
            "A1:A3", "B1:B3", "C1:C3", "D1:F1", "G1:I1", "J1:R1", "D2:D3", "I2:I3", "J2:L2",
            "M2:O2", "P2:R2", "A7:C7",
        ] {
            assert!(merges.iter().any(|m| m == expected), "missing merge {expected}");
        }

        let rows = results.rows();
        assert_eq!(rows.len(), RESULTS_HEADER_ROWS + 3 + 1);
        assert!(rows.iter().all(|r| r.len() == 18));
        assert_eq!(rows[1][9].value, CellValue::Text("Q1 (20)".into()));
        assert_eq!(rows[2][17].value, CellValue::Text("Code".into()));

        let avg_row = &rows[6];
        assert_eq!(avg_row[0].value, CellValue::Text("Class Average".into()));
        for code_col in [5, 8, 11, 14, 17] {
            assert_eq!(avg_row[code_col].value, CellValue::Text("-".into()));
        }
    }

    #[test]
    fn exported_results_read_back() {
        let dir = temp_dir("gradesheet-report-export");
        let out = dir.join(RESULTS_EXPORT_FILE);
        let report = build_report(&sample_sheet()).expect("report");
        let summary = export_results(&report, &out).expect("export");
        assert_eq!(summary.sheet_names, vec![RESULTS_SHEET, SUMMARY_SHEET]);

        let mut wb = open_workbook_auto(&out).expect("open export");
        assert_eq!(wb.sheet_names(), vec![RESULTS_SHEET.to_string(), SUMMARY_SHEET.to_string()]);

        let results = wb
            .worksheet_range_at(0)
            .expect("results sheet")
            .expect("results range");
        assert_eq!(
            results.get_value((0, 3)),
            Some(&Data::String("Task 1 (10)".into()))
        );
        assert_eq!(results.get_value((3, 0)), Some(&Data::String("001".into())));
        assert_eq!(results.get_value((3, 3)), Some(&Data::Float(10.0)));
        assert_eq!(results.get_value((3, 4)), Some(&Data::Float(100.0)));
        assert_eq!(results.get_value((3, 5)), Some(&Data::String("7".into())));
        assert_eq!(results.get_value((6, 4)), Some(&Data::Float(80.0)));
        assert_eq!(results.get_value((6, 5)), Some(&Data::String("-".into())));

        let counts = wb
            .worksheet_range_at(1)
            .expect("summary sheet")
            .expect("summary range");
        assert_eq!(counts.get_value((0, 1)), Some(&Data::String("Task 1".into())));
        // row for code 7, column task1
        assert_eq!(counts.get_value((7, 0)), Some(&Data::String("7".into())));
        assert_eq!(counts.get_value((7, 1)), Some(&Data::Float(2.0)));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn roster_export_reimports() {
        let dir = temp_dir("gradesheet-roster-export");
        let out = dir.join(ROSTER_EXPORT_FILE);
        let sheet = sample_sheet();
        export_roster(sheet.roster(), &out).expect("export");

        let bytes = std::fs::read(&out).expect("read export");
        let grid = crate::workbook::read_first_sheet(&bytes).expect("read grid");
        assert_eq!(grid[0], vec!["admissionNo", "surname", "name"]);
        let roster = crate::roster::import_rows(&grid).expect("reimport");
        assert_eq!(roster.learners(), sheet.roster().learners());

        let _ = std::fs::remove_dir_all(dir);
    }
}
