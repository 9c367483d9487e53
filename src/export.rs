use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::ledger::AttendanceRecord;

pub const HEADERS: [&str; 5] = ["Student ID", "Name", "Date", "Status", "Method"];
const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "xlsx" | "excel" => Some(ExportFormat::Xlsx),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub sha256: String,
}

pub fn export_file_name(format: ExportFormat, today: NaiveDate) -> String {
    format!("attendance_{}.{}", today.format("%Y-%m-%d"), format.extension())
}

fn record_cells(r: &AttendanceRecord) -> [String; 5] {
    [
        r.student_id.clone(),
        r.name.clone(),
        r.date.format("%Y-%m-%d").to_string(),
        r.status.as_str().to_string(),
        r.method.as_str().to_string(),
    ]
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn render_csv(records: &[AttendanceRecord]) -> String {
    let mut csv = HEADERS.join(",");
    csv.push('\n');
    for r in records {
        let cells = record_cells(r);
        let line: Vec<String> = cells.iter().map(|c| csv_quote(c)).collect();
        csv.push_str(&line.join(","));
        csv.push('\n');
    }
    csv
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn sheet_row(row_no: usize, cells: &[String]) -> String {
    let mut xml = format!("<row r=\"{row_no}\">");
    for (col, value) in cells.iter().enumerate() {
        // Five columns at most, so a single letter is enough.
        let letter = (b'A' + col as u8) as char;
        xml.push_str(&format!(
            "<c r=\"{letter}{row_no}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
            xml_escape(value)
        ));
    }
    xml.push_str("</row>");
    xml
}

fn sheet_xml(records: &[AttendanceRecord]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );
    let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    xml.push_str(&sheet_row(1, &headers));
    for (idx, r) in records.iter().enumerate() {
        xml.push_str(&sheet_row(idx + 2, &record_cells(r)));
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

const CONTENT_TYPES_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
</Types>";

const ROOT_RELS_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
</Relationships>";

const WORKBOOK_RELS_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
</Relationships>";

fn workbook_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
         xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
         <sheets><sheet name=\"{SHEET_NAME}\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>"
    )
}

/// Builds a single-sheet Office Open XML workbook.
pub fn render_xlsx(records: &[AttendanceRecord]) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("xl/workbook.xml", workbook_xml()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(records)),
    ];
    for (name, body) in parts {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start {name}"))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write {name}"))?;
    }
    let cursor = zip.finish().context("failed to finalize workbook")?;
    Ok(cursor.into_inner())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Writes the ledger to `<out_dir>/attendance_<today>.<ext>`.
pub fn write_export(
    records: &[AttendanceRecord],
    format: ExportFormat,
    out_dir: &Path,
    today: NaiveDate,
) -> anyhow::Result<ExportSummary> {
    if out_dir.as_os_str().is_empty() {
        return Err(anyhow!("output directory is empty"));
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.to_string_lossy()))?;

    let bytes = match format {
        ExportFormat::Csv => render_csv(records).into_bytes(),
        ExportFormat::Xlsx => render_xlsx(records)?,
    };
    let path = out_dir.join(export_file_name(format, today));
    std::fs::write(&path, &bytes)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;

    Ok(ExportSummary {
        path,
        rows: records.len(),
        sha256: sha256_hex(&bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Method, Status};
    use crate::roster::Student;
    use std::io::Read;
    use zip::ZipArchive;

    fn sample_records() -> Vec<AttendanceRecord> {
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).expect("date");
        vec![
            AttendanceRecord::new(
                &Student::new("S001", "Doe, John", ""),
                date,
                Status::Present,
                Method::Qr,
            ),
            AttendanceRecord::new(
                &Student::new("S002", "Tom & \"Jerry\"", ""),
                date,
                Status::Absent,
                Method::Manual,
            ),
        ]
    }

    #[test]
    fn file_name_carries_the_day() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 4).expect("date");
        assert_eq!(
            export_file_name(ExportFormat::Csv, today),
            "attendance_2026-03-04.csv"
        );
        assert_eq!(
            export_file_name(ExportFormat::Xlsx, today),
            "attendance_2026-03-04.xlsx"
        );
        assert_eq!(ExportFormat::parse("Excel"), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::parse("pdf"), None);
    }

    #[test]
    fn csv_quotes_names_with_commas_and_quotes() {
        let csv = render_csv(&sample_records());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Student ID,Name,Date,Status,Method");
        assert_eq!(lines[1], "S001,\"Doe, John\",2025-01-10,Present,QR");
        assert_eq!(lines[2], "S002,\"Tom & \"\"Jerry\"\"\",2025-01-10,Absent,Manual");
    }

    #[test]
    fn xlsx_contains_escaped_sheet() {
        let bytes = render_xlsx(&sample_records()).expect("render");
        let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("zip");
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        assert!(archive.by_name("xl/workbook.xml").is_ok());

        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .expect("sheet")
            .read_to_string(&mut sheet)
            .expect("read sheet");
        assert!(sheet.contains("<c r=\"A1\" t=\"inlineStr\"><is><t>Student ID</t></is></c>"));
        assert!(sheet.contains("Tom &amp; &quot;Jerry&quot;"));
        assert!(sheet.contains("<row r=\"3\">"));
    }

    #[test]
    fn write_export_reports_digest_of_written_bytes() {
        let dir = std::env::temp_dir().join(format!("attendd-export-{}", uuid::Uuid::new_v4()));
        let today = NaiveDate::from_ymd_opt(2025, 1, 11).expect("date");
        let summary = write_export(&sample_records(), ExportFormat::Csv, &dir, today)
            .expect("export");
        assert_eq!(summary.rows, 2);
        assert!(summary.path.ends_with("attendance_2025-01-11.csv"));
        let written = std::fs::read(&summary.path).expect("read back");
        assert_eq!(summary.sha256, sha256_hex(&written));
        let _ = std::fs::remove_dir_all(dir);
    }
}
