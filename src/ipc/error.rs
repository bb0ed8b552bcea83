use serde_json::json;

use crate::gateway::GatewayError;
use crate::notify::Notice;

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

/// Failure envelope for a gateway error; the request's notices ride in `details`.
pub fn gateway_err(id: &str, e: &GatewayError, notices: Vec<Notice>) -> serde_json::Value {
    err(id, e.code(), e.to_string(), Some(json!({ "notices": notices })))
}
