//! Record gateway: one generic translation layer between flat form data and the
//! record service, instantiated per entity kind from its schema.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::Record;
use crate::schema::{EntitySchema, Stamps};
use crate::service::{
    DeleteParams, FetchParams, FieldError, MutationParams, MutationResponse, OrderBy,
    RecordService, ServiceError, SortType,
};

/// One record the service refused in a bulk mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub message: Option<String>,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure; the service was never reached or never answered.
    #[error("{0}")]
    Unavailable(String),

    /// The service answered with `success: false`.
    #[error("{0}")]
    Rejected(String),

    /// Every submitted record failed.
    #[error("{} record(s) rejected", .0.len())]
    RecordsRejected(Vec<RecordFailure>),

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("{0} does not support search")]
    SearchUnsupported(&'static str),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "service_unavailable",
            Self::Rejected(_) => "rejected",
            Self::RecordsRejected(_) => "record_failed",
            Self::MissingFields(_) => "validation_failed",
            Self::SearchUnsupported(_) => "not_implemented",
        }
    }

    /// User-visible messages for this failure, one notification each.
    pub fn notices(&self) -> Vec<String> {
        match self {
            Self::Unavailable(m) | Self::Rejected(m) => vec![m.clone()],
            Self::RecordsRejected(failures) => failures.iter().flat_map(failure_notices).collect(),
            Self::MissingFields(fields) => fields.iter().map(|f| format!("{} is required", f)).collect(),
            Self::SearchUnsupported(_) => vec![self.to_string()],
        }
    }
}

fn failure_notices(f: &RecordFailure) -> Vec<String> {
    let mut out: Vec<String> = f
        .errors
        .iter()
        .map(|e| format!("{}: {}", e.field_label, e.message))
        .collect();
    if let Some(m) = &f.message {
        out.push(m.clone());
    }
    out
}

/// A committed mutation. `rejected` lists sibling records the service refused.
#[derive(Debug, Clone, PartialEq)]
pub struct Saved {
    pub record: Record,
    pub rejected: Vec<RecordFailure>,
}

pub struct Gateway<'a> {
    schema: &'static EntitySchema,
    service: &'a mut dyn RecordService,
}

impl<'a> Gateway<'a> {
    pub fn new(schema: &'static EntitySchema, service: &'a mut dyn RecordService) -> Self {
        Self { schema, service }
    }

    fn fetch_params(&self, ordered: bool) -> FetchParams {
        let mut fields: Vec<String> = self.schema.fields.iter().map(|f| f.name.to_string()).collect();
        match self.schema.stamps {
            Stamps::None => {}
            Stamps::CreatedDate => fields.push("createdAt".to_string()),
            Stamps::Timestamps => {
                fields.push("createdAt".to_string());
                fields.push("updatedAt".to_string());
            }
        }
        let order_by = if ordered {
            vec![OrderBy {
                field_name: "Id".to_string(),
                sorttype: SortType::Desc,
            }]
        } else {
            Vec::new()
        };
        FetchParams { fields, order_by }
    }

    fn unavailable(&self, op: &'static str, e: ServiceError) -> GatewayError {
        warn!(kind = self.schema.kind.prefix(), op, error = %e, "record service call failed");
        GatewayError::Unavailable(e.to_string())
    }

    fn rejected(&self, op: &'static str, message: Option<String>) -> GatewayError {
        let message = message.unwrap_or_else(|| {
            format!("Failed to {} {}", op, self.schema.kind.label().to_lowercase())
        });
        warn!(kind = self.schema.kind.prefix(), op, %message, "record service rejected request");
        GatewayError::Rejected(message)
    }

    fn records(&self, data: &[Value]) -> Vec<Record> {
        data.iter()
            .filter_map(|v| {
                let rec = Record::from_json(v);
                if rec.is_none() {
                    warn!(kind = self.schema.kind.prefix(), "dropping record without Id");
                }
                rec
            })
            .collect()
    }

    /// Every record of the kind, newest identifier first where the backend orders.
    pub fn list(&mut self) -> Result<Vec<Record>, GatewayError> {
        let params = self.fetch_params(true);
        let resp = self
            .service
            .fetch_records(self.schema.table, &params)
            .map_err(|e| self.unavailable("list", e))?;
        if !resp.success {
            return Err(self.rejected("list", resp.message));
        }
        Ok(self.records(&resp.data))
    }

    /// `Ok(None)` when the service does not know the identifier.
    pub fn get_by_id(&mut self, id: i64) -> Result<Option<Record>, GatewayError> {
        let params = self.fetch_params(false);
        let resp = self
            .service
            .get_record_by_id(self.schema.table, id, &params)
            .map_err(|e| self.unavailable("get", e))?;
        if !resp.success {
            debug!(kind = self.schema.kind.prefix(), id, message = ?resp.message, "record lookup failed");
            return Ok(None);
        }
        Ok(resp.data.as_ref().and_then(Record::from_json))
    }

    pub fn create(&mut self, form: &Map<String, Value>) -> Result<Saved, GatewayError> {
        let record = self.schema.coerce(form, true);
        let resp = self
            .service
            .create_record(self.schema.table, &MutationParams { records: vec![record] })
            .map_err(|e| self.unavailable("create", e))?;
        self.settle("create", resp)
    }

    /// Full-record update: every declared field is submitted, not a patch.
    pub fn update(&mut self, id: i64, form: &Map<String, Value>) -> Result<Saved, GatewayError> {
        let mut record = self.schema.coerce(form, false);
        record.insert("Id".to_string(), Value::from(id));
        let resp = self
            .service
            .update_record(self.schema.table, &MutationParams { records: vec![record] })
            .map_err(|e| self.unavailable("update", e))?;
        self.settle("update", resp)
    }

    fn settle(&self, op: &'static str, resp: MutationResponse) -> Result<Saved, GatewayError> {
        if !resp.success {
            return Err(self.rejected(op, resp.message));
        }
        let Some(results) = resp.results else {
            return Err(self.rejected(op, resp.message));
        };

        let mut saved: Option<Record> = None;
        let mut rejected = Vec::new();
        for r in results {
            if r.success {
                if saved.is_none() {
                    saved = r.data.as_ref().and_then(Record::from_json);
                }
            } else {
                rejected.push(RecordFailure {
                    message: r.message,
                    errors: r.errors,
                });
            }
        }
        if !rejected.is_empty() {
            warn!(
                kind = self.schema.kind.prefix(),
                op,
                failed = rejected.len(),
                "record service rejected records"
            );
        }
        match saved {
            Some(record) => Ok(Saved { record, rejected }),
            None if rejected.is_empty() => Err(self.rejected(op, resp.message)),
            None => Err(GatewayError::RecordsRejected(rejected)),
        }
    }

    /// Succeeds iff at least one deletion succeeded.
    pub fn delete(&mut self, id: i64) -> Result<(), GatewayError> {
        let resp = self
            .service
            .delete_record(self.schema.table, &DeleteParams { record_ids: vec![id] })
            .map_err(|e| self.unavailable("delete", e))?;
        if !resp.success {
            return Err(self.rejected("delete", resp.message));
        }
        let Some(results) = resp.results else {
            return Err(self.rejected("delete", resp.message));
        };
        let (ok, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.success);
        if !failed.is_empty() {
            warn!(
                kind = self.schema.kind.prefix(),
                id,
                failed = failed.len(),
                "record service rejected deletion"
            );
        }
        if !ok.is_empty() {
            return Ok(());
        }
        Err(GatewayError::RecordsRejected(
            failed
                .into_iter()
                .map(|r| RecordFailure {
                    message: r.message,
                    errors: Vec::new(),
                })
                .collect(),
        ))
    }

    /// Case-insensitive substring match over the kind's searchable fields.
    pub fn search(&mut self, query: &str) -> Result<Vec<Record>, GatewayError> {
        if !self.schema.supports_search() {
            return Err(GatewayError::SearchUnsupported(self.schema.kind.prefix()));
        }
        let needle = query.to_lowercase();
        let fields = self.schema.service_search_fields;
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| fields.iter().any(|f| r.text(f).to_lowercase().contains(&needle)))
            .collect())
    }
}
