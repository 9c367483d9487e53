use serde_json::json;

use crate::ipc::error::{respond, warning, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::{ledger, stats};

fn stats_summary(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let records = ledger::list(&state.db).map_err(HandlerErr::db_query)?;
    let report = stats::summarize(&records);
    let mut result = serde_json::to_value(report)
        .map_err(|e| HandlerErr::new("serialize_failed", e.to_string()))?;
    if records.is_empty() {
        result["warnings"] = json!([warning("no_records", "No attendance records found.")]);
    }
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "stats.summary" => stats_summary(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
