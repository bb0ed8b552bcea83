use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{
    label, project, stamp, stamps, unknown_table, DeleteParams, DeleteResponse, DeleteResult,
    FetchParams, FetchResponse, GetResponse, MutationParams, MutationResponse, RecordResult,
    RecordService, ServiceResult, SortType,
};
use crate::record::parse_record_id;
use crate::schema::EntityKind;

pub const DB_FILE: &str = "campus.sqlite3";

/// Durable stand-in for the hosted service, kept in a workspace directory.
pub struct WorkspaceService {
    path: PathBuf,
    conn: Connection,
}

impl WorkspaceService {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join(DB_FILE))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records(
                kind TEXT NOT NULL,
                id INTEGER NOT NULL,
                fields TEXT NOT NULL,
                updated_at TEXT,
                PRIMARY KEY(kind, id)
            )",
            [],
        )?;

        info!(path = %workspace.display(), "opened workspace store");
        Ok(Self {
            path: workspace.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, table: &str, id: i64) -> ServiceResult<Option<Map<String, Value>>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT fields FROM records WHERE kind = ? AND id = ?",
                (table, id),
                |r| r.get(0),
            )
            .optional()?;
        raw.map(|s| decode(id, &s)).transpose()
    }

    fn store(&self, table: &str, id: i64, record: &Map<String, Value>) -> ServiceResult<()> {
        let mut fields = record.clone();
        fields.remove("Id");
        self.conn.execute(
            "INSERT INTO records(kind, id, fields, updated_at)
             VALUES(?, ?, ?, datetime('now'))
             ON CONFLICT(kind, id) DO UPDATE SET
               fields = excluded.fields,
               updated_at = excluded.updated_at",
            (table, id, serde_json::to_string(&fields)?),
        )?;
        Ok(())
    }
}

fn decode(id: i64, raw: &str) -> ServiceResult<Map<String, Value>> {
    let mut record = Map::new();
    record.insert("Id".to_string(), Value::from(id));
    let fields: Map<String, Value> = serde_json::from_str(raw)?;
    record.extend(fields);
    Ok(record)
}

fn known(table: &str) -> bool {
    EntityKind::from_table(table).is_some()
}

impl RecordService for WorkspaceService {
    fn name(&self) -> &'static str {
        "workspace"
    }

    fn fetch_records(&mut self, table: &str, params: &FetchParams) -> ServiceResult<FetchResponse> {
        if !known(table) {
            return Ok(FetchResponse {
                success: false,
                data: Vec::new(),
                message: Some(unknown_table(table)),
            });
        }
        let descending = params
            .order_by
            .iter()
            .any(|o| o.field_name == "Id" && o.sorttype == SortType::Desc);
        let sql = if descending {
            "SELECT id, fields FROM records WHERE kind = ? ORDER BY id DESC"
        } else {
            "SELECT id, fields FROM records WHERE kind = ? ORDER BY id"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([table], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        let data = rows
            .iter()
            .map(|(id, raw)| decode(*id, raw).map(|rec| project(&rec, &params.fields)))
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(FetchResponse::ok(data))
    }

    fn get_record_by_id(
        &mut self,
        table: &str,
        id: i64,
        params: &FetchParams,
    ) -> ServiceResult<GetResponse> {
        Ok(match self.load(table, id)? {
            Some(rec) => GetResponse {
                success: true,
                data: Some(project(&rec, &params.fields)),
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
        if !known(table) {
            return Ok(MutationResponse {
                success: false,
                results: None,
                message: Some(unknown_table(table)),
            });
        }
        let stamps = stamps(table);
        let mut results = Vec::with_capacity(params.records.len());
        for submitted in &params.records {
            let id: i64 = self.conn.query_row(
                "SELECT COALESCE(MAX(id), 0) + 1 FROM records WHERE kind = ?",
                [table],
                |r| r.get(0),
            )?;
            let mut record = Map::new();
            record.insert("Id".to_string(), Value::from(id));
            for (k, v) in submitted {
                if k != "Id" {
                    record.insert(k.clone(), v.clone());
                }
            }
            stamp(&mut record, stamps, true);
            self.store(table, id, &record)?;
            debug!(table, id, "workspace created record");
            results.push(RecordResult::saved(Value::Object(record)));
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
        let mut results = Vec::with_capacity(params.records.len());
        for submitted in &params.records {
            let Some(id) = submitted.get("Id").and_then(parse_record_id) else {
                results.push(RecordResult::failed("Id is required"));
                continue;
            };
            let Some(mut record) = self.load(table, id)? else {
                results.push(RecordResult::failed(format!("{} not found", label)));
                continue;
            };
            for (k, v) in submitted {
                if k != "Id" {
                    record.insert(k.clone(), v.clone());
                }
            }
            stamp(&mut record, stamps, false);
            self.store(table, id, &record)?;
            results.push(RecordResult::saved(Value::Object(record)));
        }
        Ok(MutationResponse::with_results(results))
    }

    fn delete_record(&mut self, table: &str, params: &DeleteParams) -> ServiceResult<DeleteResponse> {
        let label = label(table);
        let mut results = Vec::with_capacity(params.record_ids.len());
        for &id in &params.record_ids {
            let n = self
                .conn
                .execute("DELETE FROM records WHERE kind = ? AND id = ?", (table, id))?;
            results.push(if n > 0 {
                DeleteResult {
                    success: true,
                    message: None,
                }
            } else {
                DeleteResult {
                    success: false,
                    message: Some(format!("{} not found", label)),
                }
            });
        }
        Ok(DeleteResponse {
            success: true,
            results: Some(results),
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::OrderBy;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn params(desc: bool) -> FetchParams {
        FetchParams {
            fields: vec!["title".into(), "createdAt".into()],
            order_by: if desc {
                vec![OrderBy {
                    field_name: "Id".into(),
                    sorttype: SortType::Desc,
                }]
            } else {
                Vec::new()
            },
        }
    }

    fn create(svc: &mut WorkspaceService, title: &str) -> Value {
        let mut rec = Map::new();
        rec.insert("title".into(), json!(title));
        let resp = svc
            .create_record("task", &MutationParams { records: vec![rec] })
            .expect("create");
        resp.results.expect("results")[0].data.clone().expect("data")
    }

    #[test]
    fn records_survive_reopen_and_order_desc() {
        let dir = temp_dir("campusd-workspace-reopen");
        {
            let mut svc = WorkspaceService::open(&dir).expect("open");
            assert_eq!(create(&mut svc, "first")["Id"], json!(1));
            assert_eq!(create(&mut svc, "second")["Id"], json!(2));
        }
        let mut svc = WorkspaceService::open(&dir).expect("reopen");
        let resp = svc.fetch_records("task", &params(true)).expect("fetch");
        let titles: Vec<_> = resp.data.iter().map(|r| r["title"].clone()).collect();
        assert_eq!(titles, vec![json!("second"), json!("first")]);
        assert!(resp.data[0]["createdAt"].is_string());

        let asc = svc.fetch_records("task", &params(false)).expect("fetch");
        assert_eq!(asc.data[0]["Id"], json!(1));
    }

    #[test]
    fn update_and_delete_report_missing_ids() {
        let dir = temp_dir("campusd-workspace-mutate");
        let mut svc = WorkspaceService::open(&dir).expect("open");
        create(&mut svc, "only");

        let mut patch = Map::new();
        patch.insert("Id".into(), json!(1));
        patch.insert("title".into(), json!("renamed"));
        let mut missing = Map::new();
        missing.insert("Id".into(), json!(5));
        let resp = svc
            .update_record("task", &MutationParams { records: vec![patch, missing] })
            .expect("update");
        let results = resp.results.expect("results");
        assert_eq!(results[0].data.as_ref().expect("data")["title"], json!("renamed"));
        assert_eq!(results[1].message.as_deref(), Some("Task not found"));

        let resp = svc
            .delete_record("task", &DeleteParams { record_ids: vec![1, 1] })
            .expect("delete");
        let results = resp.results.expect("results");
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(!svc.get_record_by_id("task", 1, &params(false)).expect("get").success);
    }

    #[test]
    fn unknown_table_is_rejected() {
        let dir = temp_dir("campusd-workspace-unknown");
        let mut svc = WorkspaceService::open(&dir).expect("open");
        let resp = svc.fetch_records("grades", &params(false)).expect("fetch");
        assert!(!resp.success);
    }
}
