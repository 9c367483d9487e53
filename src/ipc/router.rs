use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use crate::roster;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    let resp = dispatch(state, &req);

    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let error = resp.get("error");
        tracing::warn!(
            id = %req.id,
            method = %req.method,
            code = error.and_then(|e| e.get("code")).and_then(|v| v.as_str()).unwrap_or(""),
            message = error.and_then(|e| e.get("message")).and_then(|v| v.as_str()).unwrap_or(""),
            "request failed"
        );
    }

    // The roster is never left empty between requests while sampling is on.
    if state.config.sample_roster {
        match roster::ensure_sample(&state.db) {
            Ok(true) => tracing::info!("empty roster replaced with sample students"),
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "failed to seed sample roster"),
        }
    }
    resp
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::roster::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::sessions::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::records::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::stats::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
