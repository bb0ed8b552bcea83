use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use super::{
    label, project, stamp, stamps, unknown_table, DeleteParams, DeleteResponse, DeleteResult,
    FetchParams, FetchResponse, GetResponse, MutationParams, MutationResponse, RecordResult,
    RecordService, ServiceResult,
};
use crate::record::parse_record_id;
use crate::schema::EntityKind;

/// Mock-data fallback for offline development. Each instance owns its tables;
/// nothing is shared between stores.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<Map<String, Value>>>,
}

impl MemoryStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store seeded with the bundled fixtures, one table per entity kind.
    pub fn seeded() -> ServiceResult<Self> {
        let mut store = Self::empty();
        for kind in EntityKind::ALL {
            let rows: Vec<Value> = serde_json::from_str(fixture(kind))?;
            store.insert_rows(kind.schema().table, rows);
        }
        Ok(store)
    }

    pub fn with_rows(table: &str, rows: Vec<Value>) -> Self {
        let mut store = Self::empty();
        store.insert_rows(table, rows);
        store
    }

    fn insert_rows(&mut self, table: &str, rows: Vec<Value>) {
        let objects = rows
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(o) => Some(o),
                _ => None,
            })
            .collect();
        self.tables.insert(table.to_string(), objects);
    }

    #[cfg(test)]
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map(Vec::len).unwrap_or(0)
    }

    fn next_id(rows: &[Map<String, Value>]) -> i64 {
        rows.iter()
            .filter_map(|r| r.get("Id").and_then(parse_record_id))
            .max()
            .unwrap_or(0)
            + 1
    }

    fn position(rows: &[Map<String, Value>], id: i64) -> Option<usize> {
        rows.iter()
            .position(|r| r.get("Id").and_then(parse_record_id) == Some(id))
    }
}

fn fixture(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Students => include_str!("../../fixtures/mock/students.json"),
        EntityKind::Faculty => include_str!("../../fixtures/mock/faculty.json"),
        EntityKind::Courses => include_str!("../../fixtures/mock/courses.json"),
        EntityKind::Departments => include_str!("../../fixtures/mock/departments.json"),
        EntityKind::Enrollment => include_str!("../../fixtures/mock/enrollment.json"),
        EntityKind::Attendance => include_str!("../../fixtures/mock/attendance.json"),
        EntityKind::Tasks => include_str!("../../fixtures/mock/tasks.json"),
        EntityKind::Deals => include_str!("../../fixtures/mock/deals.json"),
    }
}

impl RecordService for MemoryStore {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn fetch_records(&mut self, table: &str, params: &FetchParams) -> ServiceResult<FetchResponse> {
        let Some(rows) = self.tables.get(table) else {
            return Ok(FetchResponse {
                success: false,
                data: Vec::new(),
                message: Some(unknown_table(table)),
            });
        };
        // Fixture order, regardless of orderBy.
        let data = rows.iter().map(|r| project(r, &params.fields)).collect();
        Ok(FetchResponse::ok(data))
    }

    fn get_record_by_id(
        &mut self,
        table: &str,
        id: i64,
        params: &FetchParams,
    ) -> ServiceResult<GetResponse> {
        let found = self
            .tables
            .get(table)
            .and_then(|rows| Self::position(rows, id).map(|i| project(&rows[i], &params.fields)));
        Ok(match found {
            Some(data) => GetResponse {
                success: true,
                data: Some(data),
                message: None,
            },
            None => GetResponse {
                success: false,
                data: None,
                message: Some(format!("{} not found", label(table))),
            },
        })
    }

    fn create_record(
        &mut self,
        table: &str,
        params: &MutationParams,
    ) -> ServiceResult<MutationResponse> {
        let stamps = stamps(table);
        let rows = self.tables.entry(table.to_string()).or_default();
        let mut results = Vec::with_capacity(params.records.len());
        for submitted in &params.records {
            let id = Self::next_id(rows);
            let mut record = Map::new();
            record.insert("Id".to_string(), Value::from(id));
            for (k, v) in submitted {
                if k != "Id" {
                    record.insert(k.clone(), v.clone());
                }
            }
            stamp(&mut record, stamps, true);
            debug!(table, id, "mock store created record");
            results.push(RecordResult::saved(Value::Object(record.clone())));
            rows.push(record);
        }
        Ok(MutationResponse::with_results(results))
    }

    fn update_record(
        &mut self,
        table: &str,
        params: &MutationParams,
    ) -> ServiceResult<MutationResponse> {
        let stamps = stamps(table);
        let label = label(table);
        let Some(rows) = self.tables.get_mut(table) else {
            return Ok(MutationResponse {
                success: false,
                results: None,
                message: Some(unknown_table(table)),
            });
        };
        let mut results = Vec::with_capacity(params.records.len());
        for submitted in &params.records {
            let Some(id) = submitted.get("Id").and_then(parse_record_id) else {
                results.push(RecordResult::failed("Id is required"));
                continue;
            };
            let Some(index) = Self::position(rows, id) else {
                results.push(RecordResult::failed(format!("{} not found", label)));
                continue;
            };
            let record = &mut rows[index];
            for (k, v) in submitted {
                if k != "Id" {
                    record.insert(k.clone(), v.clone());
                }
            }
            stamp(record, stamps, false);
            results.push(RecordResult::saved(Value::Object(record.clone())));
        }
        Ok(MutationResponse::with_results(results))
    }

    fn delete_record(&mut self, table: &str, params: &DeleteParams) -> ServiceResult<DeleteResponse> {
        let label = label(table);
        let Some(rows) = self.tables.get_mut(table) else {
            return Ok(DeleteResponse {
                success: false,
                results: None,
                message: Some(unknown_table(table)),
            });
        };
        let results = params
            .record_ids
            .iter()
            .map(|&id| match Self::position(rows, id) {
                Some(index) => {
                    rows.remove(index);
                    DeleteResult {
                        success: true,
                        message: None,
                    }
                }
                None => DeleteResult {
                    success: false,
                    message: Some(format!("{} not found", label)),
                },
            })
            .collect();
        Ok(DeleteResponse {
            success: true,
            results: Some(results),
            message: None,
        })
    }
}
