use serde_json::json;
use std::collections::HashMap;

use crate::attendance::manual_batch;
use crate::ipc::error::{respond, warning, HandlerErr, EMPTY_ROSTER_MESSAGE};
use crate::ipc::helpers::get_date_or_today;
use crate::ipc::types::{AppState, Request};
use crate::{ledger, roster};

fn parse_marks(params: &serde_json::Value) -> Result<HashMap<String, bool>, HandlerErr> {
    let Some(raw) = params.get("marks").filter(|v| !v.is_null()) else {
        return Ok(HashMap::new());
    };
    let Some(obj) = raw.as_object() else {
        return Err(HandlerErr::bad_params(
            "marks must be an object of studentId -> present",
        ));
    };
    obj.iter()
        .map(|(id, v)| {
            v.as_bool().map(|present| (id.clone(), present)).ok_or_else(|| {
                HandlerErr::bad_params("marks values must be booleans")
                    .with_details(json!({ "studentId": id }))
            })
        })
        .collect()
}

fn attendance_mark_manual(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date_or_today(params, "date")?;
    let marks = parse_marks(params)?;
    let students = roster::list(&state.db).map_err(HandlerErr::db_query)?;
    if students.is_empty() {
        return Ok(json!({
            "saved": 0,
            "warnings": [warning("empty_roster", EMPTY_ROSTER_MESSAGE)],
        }));
    }

    let batch = manual_batch(&students, date, &marks);
    ledger::append(&state.db, &batch.records).map_err(HandlerErr::db_update)?;
    tracing::info!(%date, saved = batch.records.len(), "manual attendance saved");
    Ok(json!({
        "saved": batch.records.len(),
        "date": date,
        "records": batch.records,
        "ignored": batch.ignored,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.markManual" => attendance_mark_manual(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
