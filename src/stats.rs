use serde::Serialize;
use std::collections::BTreeMap;

use crate::ledger::{AttendanceRecord, Method, Status};

/// One-decimal rounding with ties to even: `6.25 -> 6.2`, `6.75 -> 6.8`.
pub fn round_1_decimal(x: f64) -> f64 {
    (x * 10.0).round_ties_even() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub student_id: String,
    pub name: String,
    pub present: usize,
    pub absent: usize,
    pub total_sessions: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCount {
    pub method: Method,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionPoint {
    pub student_id: String,
    pub name: String,
    pub present: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentagePoint {
    pub name: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub students: Vec<StudentStats>,
    pub methods: Vec<MethodCount>,
    /// Presence share per student (pie series).
    pub distribution: Vec<DistributionPoint>,
    /// Students ordered by ascending percentage (bar series).
    pub percentage_ranking: Vec<PercentagePoint>,
}

/// Aggregates the ledger. Students appear only once they have a record, so
/// `total_sessions` is never zero.
pub fn summarize(records: &[AttendanceRecord]) -> StatsReport {
    let mut by_student: BTreeMap<(&str, &str), (usize, usize)> = BTreeMap::new();
    let mut by_method: BTreeMap<&'static str, (Method, usize)> = BTreeMap::new();

    for r in records {
        let counts = by_student
            .entry((r.student_id.as_str(), r.name.as_str()))
            .or_insert((0, 0));
        match r.status {
            Status::Present => counts.0 += 1,
            Status::Absent => counts.1 += 1,
        }
        by_method.entry(r.method.as_str()).or_insert((r.method, 0)).1 += 1;
    }

    let students: Vec<StudentStats> = by_student
        .into_iter()
        .map(|((student_id, name), (present, absent))| {
            let total = present + absent;
            StudentStats {
                student_id: student_id.to_string(),
                name: name.to_string(),
                present,
                absent,
                total_sessions: total,
                percentage: round_1_decimal(present as f64 / total as f64 * 100.0),
            }
        })
        .collect();

    let methods = by_method
        .into_values()
        .map(|(method, count)| MethodCount { method, count })
        .collect();

    let distribution = students
        .iter()
        .map(|s| DistributionPoint {
            student_id: s.student_id.clone(),
            name: s.name.clone(),
            present: s.present,
        })
        .collect();

    let mut percentage_ranking: Vec<PercentagePoint> = students
        .iter()
        .map(|s| PercentagePoint {
            name: s.name.clone(),
            percentage: s.percentage,
        })
        .collect();
    percentage_ranking.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));

    StatsReport {
        students,
        methods,
        distribution,
        percentage_ranking,
    }
}
