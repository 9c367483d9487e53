use serde_json::json;

use crate::roster::ImportError;
use crate::sessions::SessionError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub const EMPTY_ROSTER_MESSAGE: &str = "No students found. Please upload student list first.";

/// A `{code, message}` entry for the `warnings` list of a successful result.
pub fn warning(code: &str, message: impl Into<String>) -> serde_json::Value {
    json!({ "code": code, "message": message.into() })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn db_query(e: anyhow::Error) -> Self {
        Self::new("db_query_failed", format!("{e:#}"))
    }

    pub fn db_update(e: anyhow::Error) -> Self {
        Self::new("db_update_failed", format!("{e:#}"))
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ImportError> for HandlerErr {
    fn from(e: ImportError) -> Self {
        let out = HandlerErr::new(e.code(), e.to_string());
        match &e {
            ImportError::MissingColumns { missing } => {
                out.with_details(json!({ "missing": missing }))
            }
            ImportError::Parse { line, .. } => out.with_details(json!({ "line": line })),
            ImportError::DuplicateId { id } => out.with_details(json!({ "studentId": id })),
            ImportError::Empty | ImportError::Io(_) => out,
        }
    }
}

impl From<SessionError> for HandlerErr {
    fn from(e: SessionError) -> Self {
        let out = HandlerErr::new(e.code(), e.to_string());
        match &e {
            SessionError::NotFound(token) => out.with_details(json!({ "token": token })),
            SessionError::Expired { token, expires_at } => out.with_details(json!({
                "token": token,
                "expiresAt": expires_at,
            })),
        }
    }
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}
