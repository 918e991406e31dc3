use crate::calc::{self, ClassAverage};
use crate::error::{GradeError, Result};
use crate::roster::Roster;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MarkField {
    #[serde(rename = "task1")]
    Task1,
    #[serde(rename = "task2")]
    Task2,
    #[serde(rename = "task3q1")]
    Task3Q1,
    #[serde(rename = "task3q2")]
    Task3Q2,
    #[serde(rename = "task3q3")]
    Task3Q3,
}

/// Report column grouping. Task 3 is split into three questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskGroup {
    Task1,
    Task2,
    Task3,
}

impl TaskGroup {
    pub const ALL: [TaskGroup; 3] = [TaskGroup::Task1, TaskGroup::Task2, TaskGroup::Task3];

    pub fn title(self) -> &'static str {
        match self {
            TaskGroup::Task1 => "Task 1",
            TaskGroup::Task2 => "Task 2",
            TaskGroup::Task3 => "Task 3",
        }
    }

    pub fn fields(self) -> &'static [MarkField] {
        match self {
            TaskGroup::Task1 => &[MarkField::Task1],
            TaskGroup::Task2 => &[MarkField::Task2],
            TaskGroup::Task3 => &[MarkField::Task3Q1, MarkField::Task3Q2, MarkField::Task3Q3],
        }
    }

    pub fn max(self) -> f64 {
        self.fields().iter().map(|f| f.max()).sum()
    }

    /// e.g. "Task 3 (40)"
    pub fn heading(self) -> String {
        format!("{} ({})", self.title(), self.max())
    }
}

impl MarkField {
    pub const ALL: [MarkField; 5] = [
        MarkField::Task1,
        MarkField::Task2,
        MarkField::Task3Q1,
        MarkField::Task3Q2,
        MarkField::Task3Q3,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MarkField::Task1 => "task1",
            MarkField::Task2 => "task2",
            MarkField::Task3Q1 => "task3q1",
            MarkField::Task3Q2 => "task3q2",
            MarkField::Task3Q3 => "task3q3",
        }
    }

    pub fn max(self) -> f64 {
        match self {
            MarkField::Task1 => 10.0,
            MarkField::Task2 => 30.0,
            MarkField::Task3Q1 => 20.0,
            MarkField::Task3Q2 => 10.0,
            MarkField::Task3Q3 => 10.0,
        }
    }

    pub fn group(self) -> TaskGroup {
        match self {
            MarkField::Task1 => TaskGroup::Task1,
            MarkField::Task2 => TaskGroup::Task2,
            MarkField::Task3Q1 | MarkField::Task3Q2 | MarkField::Task3Q3 => TaskGroup::Task3,
        }
    }

    pub fn question(self) -> Option<&'static str> {
        match self {
            MarkField::Task3Q1 => Some("Q1"),
            MarkField::Task3Q2 => Some("Q2"),
            MarkField::Task3Q3 => Some("Q3"),
            MarkField::Task1 | MarkField::Task2 => None,
        }
    }

    /// "Task 2" or "Task 3 Q1".
    pub fn label(self) -> String {
        match self.question() {
            Some(q) => format!("{} {}", self.group().title(), q),
            None => self.group().title().to_string(),
        }
    }
}

impl fmt::Display for MarkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MarkField {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self> {
        MarkField::ALL
            .iter()
            .copied()
            .find(|f| f.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                GradeError::validation_with(
                    format!("unknown mark field: {}", s),
                    json!({
                        "field": s,
                        "expected": MarkField::ALL.iter().map(|f| f.key()).collect::<Vec<_>>(),
                    }),
                )
            })
    }
}

/// Raw text of the five marks for one learner. Empty means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkEntry {
    pub task1: String,
    pub task2: String,
    pub task3q1: String,
    pub task3q2: String,
    pub task3q3: String,
}

impl MarkEntry {
    pub fn get(&self, field: MarkField) -> &str {
        match field {
            MarkField::Task1 => &self.task1,
            MarkField::Task2 => &self.task2,
            MarkField::Task3Q1 => &self.task3q1,
            MarkField::Task3Q2 => &self.task3q2,
            MarkField::Task3Q3 => &self.task3q3,
        }
    }

    fn slot_mut(&mut self, field: MarkField) -> &mut String {
        match field {
            MarkField::Task1 => &mut self.task1,
            MarkField::Task2 => &mut self.task2,
            MarkField::Task3Q1 => &mut self.task3q1,
            MarkField::Task3Q2 => &mut self.task3q2,
            MarkField::Task3Q3 => &mut self.task3q3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkPolicy {
    /// Numeric values outside `[0, max]` are rejected.
    #[default]
    Enforced,
    /// Maxima are advisory; anything is stored.
    Lenient,
}

impl MarkPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkPolicy::Enforced => "enforced",
            MarkPolicy::Lenient => "lenient",
        }
    }
}

/// Marks for every learner of a roster, co-indexed with it.
#[derive(Debug, Clone)]
pub struct MarkSheet {
    roster: Arc<Roster>,
    entries: Vec<MarkEntry>,
    policy: MarkPolicy,
}

impl MarkSheet {
    pub fn for_roster(roster: Arc<Roster>, policy: MarkPolicy) -> Self {
        let entries = vec![MarkEntry::default(); roster.len()];
        Self {
            roster,
            entries,
            policy,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn entries(&self) -> &[MarkEntry] {
        &self.entries
    }

    pub fn policy(&self) -> MarkPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace one field of one learner's entry.
    pub fn set_field(
        &mut self,
        index: usize,
        field: MarkField,
        value: impl Into<String>,
    ) -> Result<&MarkEntry> {
        let value = value.into();
        let len = self.entries.len();
        let Some(entry) = self.entries.get_mut(index) else {
            return Err(GradeError::not_found(
                "learner not found",
                json!({ "index": index, "learnerCount": len }),
            ));
        };

        if self.policy == MarkPolicy::Enforced {
            check_within_max(field, &value)?;
        }

        *entry.slot_mut(field) = value;
        Ok(entry)
    }

    /// Class average for `field` over every learner; unset marks count as 0.
    pub fn average_of(&self, field: MarkField) -> Result<ClassAverage> {
        calc::class_average(
            self.entries.iter().map(|e| calc::parse_mark(e.get(field))),
            field.max(),
        )
        .ok_or_else(|| GradeError::EmptyDataset {
            field: field.key().to_string(),
        })
    }
}

fn check_within_max(field: MarkField, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    let Ok(v) = trimmed.parse::<f64>() else {
        return Ok(());
    };
    if !v.is_finite() || v < 0.0 || v > field.max() {
        return Err(GradeError::validation_with(
            format!("{} must be between 0 and {}", field.label(), field.max()),
            json!({ "field": field.key(), "value": value, "max": field.max() }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::LearnerRecord;

    fn roster(n: usize) -> Arc<Roster> {
        Arc::new(Roster::new(
            (0..n)
                .map(|i| LearnerRecord {
                    admission_no: format!("{:03}", i + 1),
                    surname: format!("Surname{}", i),
                    name: format!("Name{}", i),
                })
                .collect(),
        ))
    }

    #[test]
    fn sheet_starts_blank_and_co_indexed() {
        let sheet = MarkSheet::for_roster(roster(3), MarkPolicy::Enforced);
        assert_eq!(sheet.len(), sheet.roster().len());
        assert!(sheet.entries().iter().all(|e| *e == MarkEntry::default()));
    }

    #[test]
    fn set_field_touches_only_one_cell() {
        let mut sheet = MarkSheet::for_roster(roster(2), MarkPolicy::Enforced);
        sheet.set_field(1, MarkField::Task2, "25").expect("set");
        assert_eq!(sheet.entries()[1].task2, "25");
        assert_eq!(sheet.entries()[1].task1, "");
        assert_eq!(sheet.entries()[0], MarkEntry::default());
    }

    #[test]
    fn set_field_out_of_range_is_not_found() {
        let mut sheet = MarkSheet::for_roster(roster(2), MarkPolicy::Lenient);
        let e = sheet
            .set_field(2, MarkField::Task1, "5")
            .expect_err("must fail");
        assert!(matches!(e, GradeError::NotFound { .. }));
        assert_eq!(e.details().expect("details")["learnerCount"], json!(2));
    }

    #[test]
    fn enforced_maxima_reject_and_keep_previous_value() {
        let mut sheet = MarkSheet::for_roster(roster(1), MarkPolicy::Enforced);
        sheet.set_field(0, MarkField::Task1, "7").expect("set");
        let e = sheet
            .set_field(0, MarkField::Task1, "11")
            .expect_err("above max");
        assert!(matches!(e, GradeError::Validation { .. }));
        assert!(sheet.set_field(0, MarkField::Task1, "-1").is_err());
        assert_eq!(sheet.entries()[0].task1, "7");

        sheet.set_field(0, MarkField::Task1, "10").expect("max is allowed");
        sheet.set_field(0, MarkField::Task1, "").expect("clear is allowed");
        sheet
            .set_field(0, MarkField::Task1, "absent")
            .expect("text degrades later");
    }

    #[test]
    fn lenient_policy_stores_over_max() {
        let mut sheet = MarkSheet::for_roster(roster(1), MarkPolicy::Lenient);
        sheet.set_field(0, MarkField::Task1, "15").expect("set");
        let avg = sheet.average_of(MarkField::Task1).expect("average");
        assert_eq!(avg.avg_percent, 150.0);
    }

    #[test]
    fn average_treats_blank_as_zero() {
        let mut sheet = MarkSheet::for_roster(roster(4), MarkPolicy::Enforced);
        for (i, m) in ["10", "8", "6"].iter().enumerate() {
            sheet.set_field(i, MarkField::Task1, *m).expect("set");
        }
        let avg = sheet.average_of(MarkField::Task1).expect("average");
        assert_eq!(avg.avg_raw, 6.0);
        assert_eq!(avg.avg_percent, 60.0);
    }

    #[test]
    fn average_over_empty_roster_is_an_error() {
        let sheet = MarkSheet::for_roster(roster(0), MarkPolicy::Enforced);
        let e = sheet.average_of(MarkField::Task3Q1).expect_err("empty");
        assert!(matches!(e, GradeError::EmptyDataset { ref field } if field == "task3q1"));
    }

    #[test]
    fn field_metadata() {
        assert_eq!("TASK3Q2".parse::<MarkField>().expect("parse"), MarkField::Task3Q2);
        assert!("task4".parse::<MarkField>().is_err());
        assert_eq!(MarkField::Task3Q1.label(), "Task 3 Q1");
        assert_eq!(MarkField::Task2.label(), "Task 2");
        assert_eq!(TaskGroup::Task3.heading(), "Task 3 (40)");
        assert_eq!(TaskGroup::Task1.heading(), "Task 1 (10)");
        let total: f64 = MarkField::ALL.iter().map(|f| f.max()).sum();
        assert_eq!(total, 80.0);
        assert_eq!(
            serde_json::to_value(MarkField::Task3Q3).expect("serialize"),
            json!("task3q3")
        );
    }
}
