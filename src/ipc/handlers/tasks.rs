use chrono::{Local, NaiveDate};
use serde_json::{json, Value};

use super::records::{gateway_failure, HandlerErr};
use crate::ipc::error::{gateway_err, ok};
use crate::ipc::types::{AppState, Request};
use crate::record::Record;
use crate::schema::EntityKind;
use crate::screen::project_rows;
use crate::stats::upcoming_tasks;

const DEFAULT_UPCOMING_DAYS: i64 = 7;

fn handle_tasks_search(state: &mut AppState, req: &Request) -> Value {
    let query = req
        .params
        .get("query")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    state.with_controller(EntityKind::Tasks, |c, gw| match c.search(gw, &query) {
        Ok(()) => ok(
            &req.id,
            json!({
                "query": query,
                "records": c.records().iter().map(Record::to_json).collect::<Vec<_>>(),
                "notices": c.drain_notices(),
            }),
        ),
        Err(e) => gateway_err(&req.id, &e, c.drain_notices()),
    })
}

fn parse_today(params: &Value) -> Result<NaiveDate, HandlerErr> {
    match params.get("today").and_then(|v| v.as_str()) {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| HandlerErr::bad_params(format!("invalid today: {}", s))),
    }
}

fn handle_tasks_upcoming(state: &mut AppState, req: &Request) -> Value {
    let days = match req.params.get("days") {
        None | Some(Value::Null) => DEFAULT_UPCOMING_DAYS,
        Some(v) => match v.as_i64().filter(|d| *d >= 0) {
            Some(d) => d,
            None => return HandlerErr::bad_params("days must be a non-negative integer").response(&req.id),
        },
    };
    let today = match parse_today(&req.params) {
        Ok(d) => d,
        Err(e) => return e.response(&req.id),
    };
    // Over the full store, not the controller's possibly searched collection.
    let tasks = match state.gateway(EntityKind::Tasks).list() {
        Ok(v) => v,
        Err(e) => return gateway_failure(&req.id, &e),
    };
    let due = upcoming_tasks(&tasks, today, days);
    ok(
        &req.id,
        json!({
            "today": today.format("%Y-%m-%d").to_string(),
            "days": days,
            "rows": project_rows(EntityKind::Tasks.schema(), &due, None),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "tasks.search" => Some(handle_tasks_search(state, req)),
        "tasks.upcoming" => Some(handle_tasks_upcoming(state, req)),
        _ => None,
    }
}
