use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::format::parse_date;
use crate::record::Record;
use crate::schema::parse_float;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealStats {
    pub total_deals: usize,
    pub active_deals: usize,
    pub completed_deals: usize,
    pub total_value: f64,
    pub active_value: f64,
    pub average_value: f64,
}

pub fn deal_stats(deals: &[Record]) -> DealStats {
    let value = |r: &Record| r.get("value").and_then(parse_float).unwrap_or(0.0);
    let active: Vec<&Record> = deals.iter().filter(|d| d.text("status") == "active").collect();
    let total_value: f64 = deals.iter().map(value).sum();
    DealStats {
        total_deals: deals.len(),
        active_deals: active.len(),
        completed_deals: deals.iter().filter(|d| d.text("status") == "completed").count(),
        total_value,
        active_value: active.iter().map(|&d| value(d)).sum(),
        average_value: if deals.is_empty() {
            0.0
        } else {
            total_value / deals.len() as f64
        },
    }
}

const CLOSED_TASK_STATUSES: [&str; 2] = ["Completed", "Cancelled"];

/// Open tasks due between `today` and `today + days`, both inclusive.
pub fn upcoming_tasks(tasks: &[Record], today: NaiveDate, days: i64) -> Vec<&Record> {
    let horizon = Duration::try_days(days)
        .and_then(|d| today.checked_add_signed(d))
        .unwrap_or(NaiveDate::MAX);
    tasks
        .iter()
        .filter(|t| !CLOSED_TASK_STATUSES.contains(&t.text("status").as_str()))
        .filter(|t| {
            t.get("dueDate")
                .and_then(parse_date)
                .is_some_and(|due| due >= today && due <= horizon)
        })
        .collect()
}
