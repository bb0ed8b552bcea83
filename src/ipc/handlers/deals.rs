use serde_json::{json, Value};

use super::records::gateway_failure;
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::schema::EntityKind;
use crate::stats::deal_stats;

fn handle_deals_stats(state: &mut AppState, req: &Request) -> Value {
    match state.gateway(EntityKind::Deals).list() {
        Ok(deals) => ok(&req.id, json!(deal_stats(&deals))),
        Err(e) => gateway_failure(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "deals.stats" => Some(handle_deals_stats(state, req)),
        _ => None,
    }
}
