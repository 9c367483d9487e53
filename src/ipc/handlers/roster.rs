use serde_json::json;
use std::path::PathBuf;

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, Student};

fn roster_list(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let students = roster::list(&state.db).map_err(HandlerErr::db_query)?;
    Ok(json!({ "students": students }))
}

/// Replaces the roster from CSV given either as `inPath` or inline `text`.
/// Any failure leaves the current roster untouched.
fn roster_import_csv(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let students = if let Some(in_path) = get_optional_str(params, "inPath") {
        roster::read_roster_csv(&PathBuf::from(&in_path)).map_err(|e| {
            let mut out = HandlerErr::from(e);
            if out.details.is_none() {
                out.details = Some(json!({ "path": in_path }));
            }
            out
        })?
    } else if let Some(text) = params.get("text").and_then(|v| v.as_str()) {
        roster::parse_roster_csv(text)?
    } else {
        return Err(HandlerErr::bad_params("missing inPath or text"));
    };

    roster::replace(&state.db, &students).map_err(HandlerErr::db_update)?;
    tracing::info!(count = students.len(), "roster imported");
    Ok(json!({
        "imported": students.len(),
        "students": students,
    }))
}

fn roster_add(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let name = get_required_str(params, "name")?;
    let email = get_optional_str(params, "email").unwrap_or_default();

    if roster::find(&state.db, &student_id)
        .map_err(HandlerErr::db_query)?
        .is_some()
    {
        return Err(
            HandlerErr::new("duplicate_student", "student ID already on the roster")
                .with_details(json!({ "studentId": student_id })),
        );
    }
    let student = Student::new(student_id, name, email);
    roster::add(&state.db, &student).map_err(HandlerErr::db_update)?;
    tracing::info!(student_id = %student.id, "student added");
    Ok(json!({ "student": student }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "roster.list" => roster_list(state),
        "roster.importCsv" => roster_import_csv(state, &req.params),
        "roster.add" => roster_add(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
