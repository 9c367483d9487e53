use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

pub const COL_STUDENT_ID: &str = "Student ID";
pub const COL_NAME: &str = "Name";
pub const COL_EMAIL: &str = "Email";
pub const REQUIRED_COLUMNS: [&str; 3] = [COL_STUDENT_ID, COL_NAME, COL_EMAIL];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl Student {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("CSV must contain these columns: {}", REQUIRED_COLUMNS.join(", "))]
    MissingColumns { missing: Vec<String> },
    #[error("file is empty")]
    Empty,
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("student ID {id} appears more than once")]
    DuplicateId { id: String },
    #[error("error reading file: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::MissingColumns { .. } => "missing_columns",
            ImportError::Empty | ImportError::Parse { .. } => "parse_failed",
            ImportError::DuplicateId { .. } => "duplicate_student",
            ImportError::Io(_) => "io_failed",
        }
    }
}

/// Roster used when nothing has been imported yet.
pub fn sample_roster() -> Vec<Student> {
    vec![
        Student::new("S001", "John Doe", "john@edu.com"),
        Student::new("S002", "Jane Smith", "jane@edu.com"),
        Student::new("S003", "Robert Brown", "robert@edu.com"),
    ]
}

/// Splits CSV text into records tagged with the line each one starts on.
/// Quoted fields may span lines. Blank lines are skipped.
pub(crate) fn csv_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, ImportError> {
    let mut records: Vec<(usize, Vec<String>)> = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut start = 1;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut buf)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut buf));
                push_record(&mut records, start, std::mem::take(&mut fields));
                line += 1;
                start = line;
            }
            '\n' => {
                buf.push('\n');
                line += 1;
            }
            _ => buf.push(ch),
        }
    }
    if in_quotes {
        return Err(ImportError::Parse {
            line: start,
            message: "unterminated quoted field".to_string(),
        });
    }
    fields.push(buf);
    push_record(&mut records, start, fields);
    Ok(records)
}

fn push_record(records: &mut Vec<(usize, Vec<String>)>, line: usize, fields: Vec<String>) {
    if fields.iter().all(|f| f.trim().is_empty()) {
        return;
    }
    records.push((line, fields));
}

/// Parses roster CSV text. The header must name `Student ID`, `Name` and `Email`
/// (any order, extra columns ignored); only those three columns are kept.
/// Short rows are padded with empty cells; rows longer than the header fail.
pub fn parse_roster_csv(text: &str) -> Result<Vec<Student>, ImportError> {
    let mut records = csv_records(text.trim_start_matches('\u{feff}'))?.into_iter();

    let Some((_, header)) = records.next() else {
        return Err(ImportError::Empty);
    };
    let header: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();
    let position = |col: &str| header.iter().position(|h| h == col);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| position(*c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns { missing });
    }
    let (Some(id_idx), Some(name_idx), Some(email_idx)) =
        (position(COL_STUDENT_ID), position(COL_NAME), position(COL_EMAIL))
    else {
        return Err(ImportError::MissingColumns {
            missing: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        });
    };

    let mut students = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (line_no, mut fields) in records {
        if fields.len() > header.len() {
            return Err(ImportError::Parse {
                line: line_no,
                message: format!("expected {} fields, saw {}", header.len(), fields.len()),
            });
        }
        fields.resize(header.len(), String::new());
        let id = fields[id_idx].trim().to_string();
        if id.is_empty() {
            return Err(ImportError::Parse {
                line: line_no,
                message: format!("missing {}", COL_STUDENT_ID),
            });
        }
        if !seen.insert(id.clone()) {
            return Err(ImportError::DuplicateId { id });
        }
        students.push(Student {
            id,
            name: fields[name_idx].trim().to_string(),
            email: fields[email_idx].trim().to_string(),
        });
    }
    Ok(students)
}

pub fn read_roster_csv(path: &Path) -> Result<Vec<Student>, ImportError> {
    let text = std::fs::read_to_string(path)?;
    parse_roster_csv(&text)
}

pub fn list(conn: &Connection) -> anyhow::Result<Vec<Student>> {
    let mut stmt = conn.prepare("SELECT id, name, email FROM students ORDER BY sort_order")?;
    let students = stmt
        .query_map([], |r| {
            Ok(Student {
                id: r.get(0)?,
                name: r.get(1)?,
                email: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}

pub fn count(conn: &Connection) -> anyhow::Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))?;
    Ok(n as usize)
}

pub fn find(conn: &Connection, student_id: &str) -> anyhow::Result<Option<Student>> {
    let student = conn
        .query_row(
            "SELECT id, name, email FROM students WHERE id = ?",
            [student_id],
            |r| {
                Ok(Student {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    email: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(student)
}

/// Swaps the whole roster in one transaction.
pub fn replace(conn: &Connection, students: &[Student]) -> anyhow::Result<()> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin roster transaction")?;
    tx.execute("DELETE FROM students", [])
        .context("failed to clear roster")?;
    for (sort_order, s) in students.iter().enumerate() {
        tx.execute(
            "INSERT INTO students(id, name, email, sort_order) VALUES(?, ?, ?, ?)",
            (&s.id, &s.name, &s.email, sort_order as i64),
        )
        .with_context(|| format!("failed to insert student {}", s.id))?;
    }
    tx.commit().context("failed to commit roster")?;
    Ok(())
}

pub fn add(conn: &Connection, student: &Student) -> anyhow::Result<()> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students",
        [],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO students(id, name, email, sort_order) VALUES(?, ?, ?, ?)",
        (&student.id, &student.name, &student.email, next),
    )?;
    Ok(())
}

/// Seeds the sample roster when the roster is empty. Returns whether it did.
pub fn ensure_sample(conn: &Connection) -> anyhow::Result<bool> {
    if count(conn)? > 0 {
        return Ok(false);
    }
    replace(conn, &sample_roster())?;
    Ok(true)
}
