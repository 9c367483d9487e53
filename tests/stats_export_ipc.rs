use serde_json::json;
use sha2::{Digest, Sha256};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn spawn_sidecar_with_env(vars: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendd");
    let mut child = Command::new(exe)
        .envs(vars.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn temp_dir(prefix: &str) -> PathBuf {
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

fn file_sha256(path: &std::path::Path) -> String {
    let bytes = std::fs::read(path).expect("read export");
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn warning_code(result: &serde_json::Value) -> &str {
    result["warnings"][0]["code"].as_str().unwrap_or("")
}

#[test]
fn stats_combine_manual_and_qr_records() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.markManual",
        json!({ "date": "2025-01-10", "marks": { "S002": false } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.markManual",
        json!({ "date": "2025-01-11" }),
    );
    let created = request_ok(&mut stdin, &mut reader, "3", "sessions.create", json!({}));
    let token = created["session"]["token"].as_str().expect("token").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "sessions.checkIn",
        json!({ "token": token, "studentId": "S002" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.close",
        json!({ "token": token }),
    );

    let stats = request_ok(&mut stdin, &mut reader, "6", "stats.summary", json!({}));
    let students = stats["students"].as_array().cloned().unwrap_or_default();
    let rows: Vec<(String, u64, u64, u64, f64)> = students
        .iter()
        .map(|s| {
            (
                s["studentId"].as_str().unwrap_or("").to_string(),
                s["present"].as_u64().unwrap_or(0),
                s["absent"].as_u64().unwrap_or(0),
                s["totalSessions"].as_u64().unwrap_or(0),
                s["percentage"].as_f64().unwrap_or(-1.0),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("S001".to_string(), 2, 1, 3, 66.7),
            ("S002".to_string(), 2, 1, 3, 66.7),
            ("S003".to_string(), 2, 1, 3, 66.7),
        ]
    );
    for (_, present, absent, total, _) in &rows {
        assert_eq!(present + absent, *total);
    }
    assert_eq!(
        stats["methods"],
        json!([
            { "method": "Manual", "count": 6 },
            { "method": "QR", "count": 3 }
        ])
    );
    assert_eq!(stats["percentageRanking"].as_array().map(|v| v.len()), Some(3));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn export_writes_dated_csv_and_xlsx() {
    let out_dir = temp_dir("attendd-export");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.markManual",
        json!({ "date": "2025-01-10", "marks": { "S003": false } }),
    );

    let csv = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "records.export",
        json!({ "format": "csv", "outDir": out_dir.to_string_lossy() }),
    );
    assert_eq!(csv["rowsExported"], 3);
    assert_eq!(csv["mime"], "text/csv");
    let csv_path = PathBuf::from(csv["path"].as_str().expect("path"));
    let file_name = csv["fileName"].as_str().expect("fileName");
    assert!(file_name.starts_with("attendance_") && file_name.ends_with(".csv"));
    assert_eq!(file_name.len(), "attendance_YYYY-MM-DD.csv".len());
    let text = std::fs::read_to_string(&csv_path).expect("read csv");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Student ID,Name,Date,Status,Method");
    assert_eq!(lines[3], "S003,Robert Brown,2025-01-10,Absent,Manual");
    assert_eq!(csv["sha256"].as_str(), Some(file_sha256(&csv_path).as_str()));

    let xlsx = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "records.export",
        json!({ "format": "xlsx", "outDir": out_dir.to_string_lossy() }),
    );
    let xlsx_path = PathBuf::from(xlsx["path"].as_str().expect("path"));
    let head = std::fs::read(&xlsx_path).expect("read xlsx");
    assert_eq!(&head[..4], &[0x50, 0x4B, 0x03, 0x04]);

    let bad = request(
        &mut stdin,
        &mut reader,
        "4",
        "records.export",
        json!({ "format": "pdf", "outDir": out_dir.to_string_lossy() }),
    );
    assert_eq!(bad["error"]["code"], "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn empty_roster_and_ledger_degrade_to_warnings() {
    let out_dir = temp_dir("attendd-empty");
    let (mut child, mut stdin, mut reader) =
        spawn_sidecar_with_env(&[("ATTENDD_SAMPLE_ROSTER", "false")]);

    let roster = request_ok(&mut stdin, &mut reader, "1", "roster.list", json!({}));
    assert_eq!(roster["students"], json!([]));

    let manual = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.markManual",
        json!({ "date": "2025-01-10" }),
    );
    assert_eq!(warning_code(&manual), "empty_roster");
    assert_eq!(manual["saved"], 0);

    let session = request_ok(&mut stdin, &mut reader, "3", "sessions.create", json!({}));
    assert_eq!(warning_code(&session), "empty_roster");
    assert_eq!(session["created"], false);

    let records = request_ok(&mut stdin, &mut reader, "4", "records.list", json!({}));
    assert_eq!(warning_code(&records), "no_records");

    let stats = request_ok(&mut stdin, &mut reader, "5", "stats.summary", json!({}));
    assert_eq!(warning_code(&stats), "no_records");
    for key in ["students", "methods", "distribution", "percentageRanking"] {
        assert_eq!(stats[key], json!([]), "{key} should be an empty list");
    }

    let export = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "records.export",
        json!({ "outDir": out_dir.to_string_lossy() }),
    );
    assert_eq!(export["exported"], false);
    assert_eq!(
        std::fs::read_dir(&out_dir).map(|d| d.count()).unwrap_or(0),
        0
    );

    let health = request_ok(&mut stdin, &mut reader, "7", "health", json!({}));
    assert_eq!(health["students"], 0);
    assert_eq!(health["records"], 0);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(out_dir);
}
