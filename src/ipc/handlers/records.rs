use serde_json::json;
use std::path::PathBuf;

use crate::export::{self, ExportFormat};
use crate::ipc::error::{respond, warning, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, now};
use crate::ipc::types::{AppState, Request};
use crate::ledger;

fn no_records() -> serde_json::Value {
    warning("no_records", "No attendance records found.")
}

fn records_list(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let records = ledger::list(&state.db).map_err(HandlerErr::db_query)?;
    if records.is_empty() {
        return Ok(json!({ "records": [], "warnings": [no_records()] }));
    }
    Ok(json!({ "records": records }))
}

fn records_export(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let format_raw = get_optional_str(params, "format").unwrap_or_else(|| "csv".to_string());
    let format = ExportFormat::parse(&format_raw).ok_or_else(|| {
        HandlerErr::bad_params("format must be csv or xlsx")
            .with_details(json!({ "format": format_raw }))
    })?;
    let out_dir = get_required_str(params, "outDir")?;

    let records = ledger::list(&state.db).map_err(HandlerErr::db_query)?;
    if records.is_empty() {
        return Ok(json!({ "exported": false, "warnings": [no_records()] }));
    }

    let summary = export::write_export(&records, format, &PathBuf::from(&out_dir), now().date())
        .map_err(|e| {
            HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": out_dir }))
        })?;
    tracing::info!(path = %summary.path.display(), rows = summary.rows, "attendance exported");
    Ok(json!({
        "exported": true,
        "path": summary.path.to_string_lossy(),
        "fileName": summary.path.file_name().map(|n| n.to_string_lossy().to_string()),
        "mime": format.mime(),
        "rowsExported": summary.rows,
        "sha256": summary.sha256,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "records.list" => records_list(state),
        "records.export" => records_export(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
