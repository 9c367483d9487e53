use serde_json::json;

use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::{ledger, roster};

fn health(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let students = roster::count(&state.db).map_err(HandlerErr::db_query)?;
    let records = ledger::count(&state.db).map_err(HandlerErr::db_query)?;
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "students": students,
        "records": records,
        "activeSessions": state.sessions.len(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => health(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
