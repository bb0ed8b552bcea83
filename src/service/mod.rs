//! The record service boundary: request/response envelopes and the trait every
//! backend implements.

mod memory;
mod workspace;

pub use memory::MemoryStore;
pub use workspace::WorkspaceService;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{EntityKind, Stamps};

/// Transport-level failure. Service-level failures come back as envelopes with
/// `success: false` instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub field_name: String,
    pub sorttype: SortType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchParams {
    pub fields: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationParams {
    pub records: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteParams {
    #[serde(rename = "RecordIds")]
    pub record_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field_label: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<FieldError>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Option<Vec<RecordResult>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Option<Vec<DeleteResult>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl FetchResponse {
    pub fn ok(data: Vec<Value>) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }
}

impl RecordResult {
    pub fn saved(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

impl MutationResponse {
    pub fn with_results(results: Vec<RecordResult>) -> Self {
        Self {
            success: true,
            results: Some(results),
            message: None,
        }
    }
}

/// The hosted record service, addressed by table name. Backends answer every
/// request with an envelope; `Err` is reserved for transport failures.
pub trait RecordService {
    fn name(&self) -> &'static str;

    fn fetch_records(&mut self, table: &str, params: &FetchParams) -> ServiceResult<FetchResponse>;

    fn get_record_by_id(
        &mut self,
        table: &str,
        id: i64,
        params: &FetchParams,
    ) -> ServiceResult<GetResponse>;

    fn create_record(
        &mut self,
        table: &str,
        params: &MutationParams,
    ) -> ServiceResult<MutationResponse>;

    fn update_record(
        &mut self,
        table: &str,
        params: &MutationParams,
    ) -> ServiceResult<MutationResponse>;

    fn delete_record(&mut self, table: &str, params: &DeleteParams) -> ServiceResult<DeleteResponse>;
}

/// Keeps only the requested fields (plus `Id`) of a stored record object.
fn project(record: &Map<String, Value>, fields: &[String]) -> Value {
    let mut out = Map::new();
    if let Some(id) = record.get("Id") {
        out.insert("Id".to_string(), id.clone());
    }
    for f in fields {
        if let Some(v) = record.get(f) {
            out.insert(f.clone(), v.clone());
        }
    }
    Value::Object(out)
}

fn label(table: &str) -> &'static str {
    EntityKind::from_table(table)
        .map(EntityKind::label)
        .unwrap_or("Record")
}

fn stamps(table: &str) -> Stamps {
    EntityKind::from_table(table)
        .map(|k| k.schema().stamps)
        .unwrap_or(Stamps::None)
}

fn unknown_table(table: &str) -> String {
    format!("unknown table: {}", table)
}

/// Applies the table's write stamps to a record about to be stored.
fn stamp(record: &mut Map<String, Value>, stamps: Stamps, creating: bool) {
    let now = Utc::now();
    match stamps {
        Stamps::None => {}
        Stamps::Timestamps => {
            let ts = Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true));
            if creating {
                record.insert("createdAt".to_string(), ts.clone());
            }
            record.insert("updatedAt".to_string(), ts);
        }
        Stamps::CreatedDate => {
            if creating {
                record.insert(
                    "createdAt".to_string(),
                    Value::String(now.format("%Y-%m-%d").to_string()),
                );
            }
        }
    }
}
