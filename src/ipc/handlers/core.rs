use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schema::EntityKind;
use crate::service::WorkspaceService;
use serde_json::json;
use std::path::PathBuf;
use tracing::warn;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backend": state.service.name(),
            "loadPolicy": state.policy.as_str(),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "entities": EntityKind::ALL.iter().map(|k| json!({
                "prefix": k.prefix(),
                "label": k.label(),
                "mounted": state.is_mounted(*k),
                "search": k.schema().supports_search(),
            })).collect::<Vec<_>>(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match WorkspaceService::open(&path) {
        Ok(service) => {
            state.use_workspace(service);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
