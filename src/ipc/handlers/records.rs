//! `<prefix>.*` methods shared by every entity kind.

use serde_json::{json, Map, Value};

use crate::controller::ListController;
use crate::gateway::GatewayError;
use crate::ipc::error::{err, gateway_err, ok};
use crate::ipc::types::{AppState, Request};
use crate::notify::Notices;
use crate::record::{parse_record_id, Record};
use crate::schema::EntityKind;
use crate::screen::{project_rows, ListView};

pub(super) struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

fn get_id(params: &Value) -> Result<i64, HandlerErr> {
    params
        .get("id")
        .and_then(parse_record_id)
        .ok_or_else(|| HandlerErr::bad_params("missing or invalid id"))
}

fn get_fields(params: &Value) -> Result<Map<String, Value>, HandlerErr> {
    params
        .get("fields")
        .and_then(|v| v.as_object())
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing fields object"))
}

fn snapshot(c: &ListController) -> Value {
    json!({
        "records": c.records().iter().map(Record::to_json).collect::<Vec<_>>(),
        "isLoading": c.is_loading(),
        "error": c.error(),
    })
}

fn handle_list(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let reload = req
        .params
        .get("reload")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let mounted = state.is_mounted(kind);
    state.with_controller(kind, |c, gw| {
        if reload && mounted {
            if let Err(e) = c.load(gw) {
                return gateway_err(&req.id, &e, c.drain_notices());
            }
        }
        let mut result = snapshot(c);
        result["notices"] = json!(c.drain_notices());
        ok(&req.id, result)
    })
}

fn handle_state(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    if !state.is_mounted(kind) {
        return ok(
            &req.id,
            json!({ "mounted": false, "records": [], "isLoading": false, "error": null }),
        );
    }
    state.with_controller(kind, |c, _| {
        let mut result = snapshot(c);
        result["mounted"] = json!(true);
        ok(&req.id, result)
    })
}

fn handle_get(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let id = match get_id(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match state.gateway(kind).get_by_id(id) {
        Ok(Some(record)) => ok(&req.id, json!({ "record": record.to_json() })),
        Ok(None) => err(&req.id, "not_found", format!("{} not found", kind.label()), None),
        Err(e) => gateway_failure(&req.id, &e),
    }
}

/// Failure for a request served straight from the gateway, outside any controller.
pub(super) fn gateway_failure(id: &str, e: &GatewayError) -> Value {
    let mut notices = Notices::default();
    for m in e.notices() {
        notices.error(m);
    }
    gateway_err(id, e, notices.drain())
}

/// Required-field check done at submit time, before the service is involved.
fn validate(c: &mut ListController, kind: EntityKind, fields: &Map<String, Value>) -> Result<(), GatewayError> {
    let missing = kind.schema().missing_required(fields);
    if missing.is_empty() {
        return Ok(());
    }
    let e = GatewayError::MissingFields(missing);
    for m in e.notices() {
        c.notices().error(m);
    }
    Err(e)
}

fn handle_create(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let fields = match get_fields(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    state.with_controller(kind, |c, gw| {
        let created = validate(c, kind, &fields).and_then(|_| c.create(gw, &fields));
        match created {
            Ok(record) => {
                c.notices().success(format!("{} created successfully", kind.label()));
                ok(
                    &req.id,
                    json!({ "record": record.to_json(), "notices": c.drain_notices() }),
                )
            }
            Err(e) => gateway_err(&req.id, &e, c.drain_notices()),
        }
    })
}

fn handle_update(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let (id, fields) = match get_id(&req.params).and_then(|id| Ok((id, get_fields(&req.params)?))) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    state.with_controller(kind, |c, gw| {
        let updated = validate(c, kind, &fields).and_then(|_| c.update(gw, id, &fields));
        match updated {
            Ok(record) => {
                c.notices().success(format!("{} updated successfully", kind.label()));
                ok(
                    &req.id,
                    json!({ "record": record.to_json(), "notices": c.drain_notices() }),
                )
            }
            Err(e) => gateway_err(&req.id, &e, c.drain_notices()),
        }
    })
}

fn handle_delete(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let id = match get_id(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    state.with_controller(kind, |c, gw| match c.delete(gw, id) {
        Ok(()) => {
            c.notices().success(format!("{} deleted successfully", kind.label()));
            ok(&req.id, json!({ "deleted": id, "notices": c.drain_notices() }))
        }
        Err(e) => gateway_err(&req.id, &e, c.drain_notices()),
    })
}

fn handle_view(state: &mut AppState, req: &Request, kind: EntityKind) -> Value {
    let view: ListView = if req.params.is_null() {
        ListView::default()
    } else {
        match serde_json::from_value(req.params.clone()) {
            Ok(v) => v,
            Err(e) => return HandlerErr::bad_params(format!("invalid view params: {}", e)).response(&req.id),
        }
    };
    let schema = kind.schema();
    let unknown = view.unknown_filters(schema);
    if !unknown.is_empty() {
        return HandlerErr {
            code: "bad_params",
            message: format!("unknown filter field(s): {}", unknown.join(", ")),
            details: Some(json!({ "allowed": schema.filter_fields })),
        }
        .response(&req.id);
    }
    let pattern = req.params.get("datePattern").and_then(|v| v.as_str());
    state.with_controller(kind, |c, _| {
        let notices = c.drain_notices();
        let visible = view.apply(schema, c.records());
        ok(
            &req.id,
            json!({
                "rows": project_rows(schema, &visible, pattern),
                "total": c.records().len(),
                "matched": visible.len(),
                "isLoading": c.is_loading(),
                "error": c.error(),
                "notices": notices,
            }),
        )
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let (prefix, op) = req.method.split_once('.')?;
    let kind = EntityKind::from_prefix(prefix)?;
    match op {
        "list" => Some(handle_list(state, req, kind)),
        "state" => Some(handle_state(state, req, kind)),
        "get" => Some(handle_get(state, req, kind)),
        "create" => Some(handle_create(state, req, kind)),
        "update" => Some(handle_update(state, req, kind)),
        "delete" => Some(handle_delete(state, req, kind)),
        "view" => Some(handle_view(state, req, kind)),
        _ => None,
    }
}
