use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::roster::Student;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => "Present",
            Status::Absent => "Absent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Present" => Some(Status::Present),
            "Absent" => Some(Status::Absent),
            _ => None,
        }
    }

    pub fn from_present(present: bool) -> Self {
        if present {
            Status::Present
        } else {
            Status::Absent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Method {
    Manual,
    #[serde(rename = "QR")]
    Qr,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Manual => "Manual",
            Method::Qr => "QR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Manual" => Some(Method::Manual),
            "QR" => Some(Method::Qr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub name: String,
    pub date: NaiveDate,
    pub status: Status,
    pub method: Method,
}

impl AttendanceRecord {
    pub fn new(student: &Student, date: NaiveDate, status: Status, method: Method) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            student_id: student.id.clone(),
            name: student.name.clone(),
            date,
            status,
            method,
        }
    }
}

/// Appends a batch in one transaction, preserving slice order.
pub fn append(conn: &Connection, records: &[AttendanceRecord]) -> anyhow::Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin ledger transaction")?;
    for r in records {
        tx.execute(
            "INSERT INTO attendance_records(id, student_id, name, date, status, method)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &r.id,
                &r.student_id,
                &r.name,
                r.date.format("%Y-%m-%d").to_string(),
                r.status.as_str(),
                r.method.as_str(),
            ),
        )
        .with_context(|| format!("failed to append record for {}", r.student_id))?;
    }
    tx.commit().context("failed to commit ledger batch")?;
    Ok(())
}

pub fn list(conn: &Connection) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, name, date, status, method
         FROM attendance_records
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, student_id, name, date, status, method)| -> anyhow::Result<AttendanceRecord> {
            Ok(AttendanceRecord {
                date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .with_context(|| format!("record {id} has bad date {date}"))?,
                status: Status::parse(&status)
                    .ok_or_else(|| anyhow!("record {id} has bad status {status}"))?,
                method: Method::parse(&method)
                    .ok_or_else(|| anyhow!("record {id} has bad method {method}"))?,
                id,
                student_id,
                name,
            })
        })
        .collect()
}

pub fn count(conn: &Connection) -> anyhow::Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM attendance_records", [], |r| r.get(0))?;
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn append_preserves_order_and_allows_duplicates() {
        let conn = db::open_db().expect("open");
        let ann = Student::new("S1", "Ann", "a@x");
        let bo = Student::new("S2", "Bo", "b@x");
        let batch = vec![
            AttendanceRecord::new(&ann, day("2025-01-10"), Status::Present, Method::Manual),
            AttendanceRecord::new(&bo, day("2025-01-10"), Status::Absent, Method::Manual),
        ];
        append(&conn, &batch).expect("append");
        let remark =
            AttendanceRecord::new(&ann, day("2025-01-10"), Status::Present, Method::Manual);
        append(&conn, std::slice::from_ref(&remark)).expect("append again");

        let all = list(&conn).expect("list");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], batch[0]);
        assert_eq!(all[1], batch[1]);
        assert_eq!(all[2], remark);
        assert_eq!((&all[2].student_id, all[2].date), (&all[0].student_id, all[0].date));
        assert_eq!(count(&conn).expect("count"), 3);
    }

    #[test]
    fn enums_serialize_with_display_names() {
        assert_eq!(serde_json::to_value(Method::Qr).expect("json"), "QR");
        assert_eq!(serde_json::to_value(Status::Absent).expect("json"), "Absent");
        assert_eq!(Method::parse("QR"), Some(Method::Qr));
        assert_eq!(Status::from_present(false), Status::Absent);
    }
}
