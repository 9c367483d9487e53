use chrono::NaiveDate;
use std::collections::HashMap;

use crate::ledger::{AttendanceRecord, Method, Status};
use crate::roster::Student;

#[derive(Debug, Clone)]
pub struct ManualBatch {
    pub records: Vec<AttendanceRecord>,
    /// Marked IDs that are not on the roster, sorted.
    pub ignored: Vec<String>,
}

/// One Manual record per roster student, in roster order. Students without a
/// mark count as present, matching the pre-ticked attendance form.
pub fn manual_batch(
    roster: &[Student],
    date: NaiveDate,
    marks: &HashMap<String, bool>,
) -> ManualBatch {
    let records = roster
        .iter()
        .map(|s| {
            let present = marks.get(&s.id).copied().unwrap_or(true);
            AttendanceRecord::new(s, date, Status::from_present(present), Method::Manual)
        })
        .collect();
    let mut ignored: Vec<String> = marks
        .keys()
        .filter(|id| !roster.iter().any(|s| &s.id == *id))
        .cloned()
        .collect();
    ignored.sort();
    ManualBatch { records, ignored }
}
