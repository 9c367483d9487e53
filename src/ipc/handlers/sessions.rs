use chrono::NaiveDateTime;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::export::sha256_hex;
use crate::ipc::error::{respond, warning, HandlerErr, EMPTY_ROSTER_MESSAGE};
use crate::ipc::helpers::{get_optional_str, get_required_str, now};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::qr;
use crate::roster::{self, Student};
use crate::sessions::{checkin_url, qr_file_name, CheckIn, Session};

fn session_json(
    session: &Session,
    config: &AppConfig,
    names: &HashMap<&str, &str>,
    now: NaiveDateTime,
) -> serde_json::Value {
    let checked_in: Vec<serde_json::Value> = session
        .checked_in
        .iter()
        .map(|id| {
            json!({
                "studentId": id,
                "name": names.get(id.as_str()).copied().unwrap_or(""),
            })
        })
        .collect();
    json!({
        "token": session.token,
        "createdAt": session.created_at,
        "expiresAt": session.expires_at,
        "expired": session.is_expired(now),
        "checkinUrl": checkin_url(&config.checkin_base_url, &session.token),
        "qrFileName": qr_file_name(&session.token),
        "checkedIn": checked_in,
    })
}

fn qr_png(config: &AppConfig, token: &str) -> Result<Vec<u8>, HandlerErr> {
    qr::render_png(&checkin_url(&config.checkin_base_url, token))
        .map_err(|e| HandlerErr::new("qr_failed", format!("{e:#}")))
}

fn name_index(students: &[Student]) -> HashMap<&str, &str> {
    students
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect()
}

fn sessions_create(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let students = roster::list(&state.db).map_err(HandlerErr::db_query)?;
    if students.is_empty() {
        return Ok(json!({
            "created": false,
            "warnings": [warning("empty_roster", EMPTY_ROSTER_MESSAGE)],
        }));
    }
    let now = now();
    let session = state.sessions.create(now);
    tracing::info!(
        token = %session.token,
        expires_at = %session.expires_at,
        "attendance session created"
    );
    let png = qr_png(&state.config, &session.token)?;
    Ok(json!({
        "created": true,
        "session": session_json(session, &state.config, &name_index(&students), now),
        "qrPngBase64": qr::to_base64(&png),
    }))
}

/// Renders the session's check-in QR code. With `outDir` the PNG is also
/// written there under the session's suggested file name.
fn sessions_qr(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let token = get_required_str(params, "token")?;
    if state.sessions.get(&token).is_none() {
        return Err(HandlerErr::not_found(format!("session {token} not found"))
            .with_details(json!({ "token": token })));
    }
    let png = qr_png(&state.config, &token)?;
    let file_name = qr_file_name(&token);

    let mut result = json!({
        "token": token,
        "checkinUrl": checkin_url(&state.config.checkin_base_url, &token),
        "fileName": file_name,
        "mime": qr::PNG_MIME,
        "pngBase64": qr::to_base64(&png),
        "sha256": sha256_hex(&png),
    });
    if let Some(out_dir) = get_optional_str(params, "outDir") {
        let out_dir = PathBuf::from(out_dir);
        let path = out_dir.join(&file_name);
        std::fs::create_dir_all(&out_dir)
            .and_then(|_| std::fs::write(&path, &png))
            .map_err(|e| {
                HandlerErr::new("io_failed", e.to_string())
                    .with_details(json!({ "path": path.to_string_lossy() }))
            })?;
        tracing::info!(%token, path = %path.to_string_lossy(), "QR image written");
        result["path"] = json!(path.to_string_lossy());
    }
    Ok(result)
}

fn sessions_list(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let students = roster::list(&state.db).map_err(HandlerErr::db_query)?;
    let names = name_index(&students);
    let now = now();
    let sessions: Vec<serde_json::Value> = state
        .sessions
        .list()
        .into_iter()
        .map(|s| session_json(s, &state.config, &names, now))
        .collect();
    Ok(json!({ "sessions": sessions }))
}

fn sessions_check_in(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let token = get_required_str(params, "token")?;
    let student_id = get_required_str(params, "studentId")?;
    let student = roster::find(&state.db, &student_id)
        .map_err(HandlerErr::db_query)?
        .ok_or_else(|| {
            HandlerErr::not_found("student not on the roster")
                .with_details(json!({ "studentId": student_id }))
        })?;

    match state.sessions.check_in(&token, &student, now())? {
        CheckIn::Recorded(record) => {
            ledger::append(&state.db, std::slice::from_ref(&record))
                .map_err(HandlerErr::db_update)?;
            tracing::info!(%token, student_id = %student.id, "student checked in");
            Ok(json!({
                "checkedIn": true,
                "record": record,
                "message": format!("{} checked in successfully!", student.name),
            }))
        }
        CheckIn::AlreadyCheckedIn => {
            tracing::warn!(%token, student_id = %student.id, "repeat check-in ignored");
            Ok(json!({
                "checkedIn": false,
                "warnings": [warning("already_checked_in", "This student has already checked in")],
            }))
        }
    }
}

fn sessions_close(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let token = get_required_str(params, "token")?;
    let students = roster::list(&state.db).map_err(HandlerErr::db_query)?;
    let absentees = state.sessions.close(&token, &students)?;
    ledger::append(&state.db, &absentees).map_err(HandlerErr::db_update)?;
    tracing::info!(%token, absent = absentees.len(), "attendance session closed");
    Ok(json!({
        "closed": true,
        "token": token,
        "absentRecorded": absentees.len(),
        "records": absentees,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "sessions.create" => sessions_create(state),
        "sessions.list" => sessions_list(state),
        "sessions.checkIn" => sessions_check_in(state, &req.params),
        "sessions.close" => sessions_close(state, &req.params),
        "sessions.qr" => sessions_qr(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
