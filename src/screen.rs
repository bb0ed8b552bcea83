//! Entity screen derivation: which cached records a list view shows, and how
//! each row is rendered.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::format::{format_safe_date, DEFAULT_FALLBACK, DEFAULT_PATTERN};
use crate::record::Record;
use crate::schema::EntitySchema;

/// Filter value that disables a categorical filter.
pub const ALL: &str = "All";

const STAMP_FIELDS: [&str; 2] = ["createdAt", "updatedAt"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
}

#[cfg(test)]
impl ListView {
    pub fn new(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.insert(field.to_string(), value.into());
        self
    }
}

impl ListView {
    /// Filter keys the kind does not declare as categorical.
    pub fn unknown_filters(&self, schema: &EntitySchema) -> Vec<String> {
        self.filters
            .keys()
            .filter(|k| !schema.filter_fields.contains(&k.as_str()))
            .cloned()
            .collect()
    }

    fn active_filters(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.filters.iter().filter_map(|(field, value)| {
            let wanted = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if wanted.is_empty() || wanted == ALL {
                None
            } else {
                Some((field.as_str(), wanted))
            }
        })
    }

    pub fn matches(&self, schema: &EntitySchema, record: &Record) -> bool {
        let needle = self.search.to_lowercase();
        let found = needle.is_empty()
            || schema
                .search_fields
                .iter()
                .any(|f| record.text(f).to_lowercase().contains(&needle));
        found && self.active_filters().all(|(field, wanted)| record.text(field) == wanted)
    }

    /// Visible subset of `records`, in collection order.
    pub fn apply<'r>(&self, schema: &EntitySchema, records: &'r [Record]) -> Vec<&'r Record> {
        records.iter().filter(|r| self.matches(schema, r)).collect()
    }
}

/// A record as a table row: its fields plus a `display` map holding every
/// date-typed field rendered for humans.
pub fn project_row(schema: &EntitySchema, record: &Record, pattern: &str) -> Value {
    let mut display = Map::new();
    for field in schema.date_fields().chain(STAMP_FIELDS) {
        if display.contains_key(field) {
            continue;
        }
        if let Some(v) = record.get(field) {
            display.insert(
                field.to_string(),
                Value::String(format_safe_date(v, pattern, DEFAULT_FALLBACK)),
            );
        }
    }
    let mut row = record.to_json();
    if let Value::Object(obj) = &mut row {
        obj.insert("display".to_string(), Value::Object(display));
    }
    row
}

pub fn project_rows(schema: &EntitySchema, records: &[&Record], pattern: Option<&str>) -> Vec<Value> {
    let pattern = pattern.unwrap_or(DEFAULT_PATTERN);
    records.iter().map(|r| project_row(schema, r, pattern)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityKind;
    use serde_json::json;

    fn recs(values: Vec<Value>) -> Vec<Record> {
        values.iter().map(|v| Record::from_json(v).expect("record")).collect()
    }

    fn ids(rows: &[&Record]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn status_filter_selects_exact_matches() {
        let schema = EntityKind::Deals.schema();
        let records = recs(vec![
            json!({ "Id": 1, "name": "A", "status": "pending" }),
            json!({ "Id": 2, "name": "B", "status": "active" }),
        ]);
        let view = ListView::default().with_filter("status", "active");
        assert_eq!(ids(&view.apply(schema, &records)), vec![2]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let schema = EntityKind::Tasks.schema();
        let records = recs(vec![
            json!({ "Id": 1, "title": "Alpha Project" }),
            json!({ "Id": 2, "title": "Beta Task" }),
        ]);
        assert_eq!(ids(&ListView::new("alpha").apply(schema, &records)), vec![1]);
        assert_eq!(ids(&ListView::new("TASK").apply(schema, &records)), vec![2]);
    }

    #[test]
    fn all_and_empty_filters_are_inactive() {
        let schema = EntityKind::Tasks.schema();
        let records = recs(vec![
            json!({ "Id": 1, "status": "Pending", "priority": "high" }),
            json!({ "Id": 2, "status": "Completed", "priority": "low" }),
        ]);
        let view = ListView::default()
            .with_filter("status", ALL)
            .with_filter("priority", "")
            .with_filter("assignedTo", Value::Null);
        assert_eq!(ids(&view.apply(schema, &records)), vec![1, 2]);
    }

    #[test]
    fn search_and_filters_are_conjunctive() {
        let schema = EntityKind::Deals.schema();
        let records = recs(vec![
            json!({ "Id": 1, "name": "Campus network", "status": "active" }),
            json!({ "Id": 2, "name": "Campus solar", "status": "completed" }),
            json!({ "Id": 3, "name": "Library", "status": "active" }),
        ]);
        let view = ListView::new("campus").with_filter("status", "active");
        let once = ids(&view.apply(schema, &records));
        assert_eq!(once, vec![1]);
        assert_eq!(ids(&view.apply(schema, &records)), once);
    }

    #[test]
    fn numeric_filters_compare_as_text() {
        let schema = EntityKind::Students.schema();
        let records = recs(vec![
            json!({ "Id": 1, "department_c": 3 }),
            json!({ "Id": 2, "department_c": 4 }),
        ]);
        let view = ListView::default().with_filter("department_c", 3);
        assert_eq!(ids(&view.apply(schema, &records)), vec![1]);
        let view = ListView::default().with_filter("department_c", "4");
        assert_eq!(ids(&view.apply(schema, &records)), vec![2]);
    }

    #[test]
    fn unknown_filters_are_reported() {
        let view = ListView::default()
            .with_filter("status", "active")
            .with_filter("color", "red");
        assert_eq!(view.unknown_filters(EntityKind::Deals.schema()), vec!["color".to_string()]);
    }

    #[test]
    fn rows_carry_formatted_dates() {
        let schema = EntityKind::Tasks.schema();
        let records = recs(vec![json!({
            "Id": 7,
            "title": "Review",
            "dueDate": "2025-01-05",
            "createdAt": "2024-12-30T10:00:00Z"
        })]);
        let refs: Vec<&Record> = records.iter().collect();
        let rows = project_rows(schema, &refs, None);
        assert_eq!(rows[0]["Id"], json!(7));
        assert_eq!(rows[0]["display"]["dueDate"], json!("Jan 5, 2025"));
        assert_eq!(rows[0]["display"]["createdAt"], json!("Dec 30, 2024"));
        assert!(rows[0]["display"].get("title").is_none());
    }
}
