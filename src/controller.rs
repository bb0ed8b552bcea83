//! List-state controller: the in-memory collection behind one entity screen.
//!
//! The collection is a cache of the record service. It is filled by `load`,
//! reconciled in place after each successful mutation, and never invalidated
//! otherwise. Nothing here is transactional: when the service commits a
//! mutation the local reconcile follows unconditionally.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::gateway::{Gateway, GatewayError, RecordFailure};
use crate::notify::{Notice, Notices};
use crate::record::Record;
use crate::schema::EntityKind;

/// Which overlapping `load` response is allowed to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Responses to anything but the most recently issued load are discarded.
    #[default]
    LatestIssued,
    /// Every response lands; whichever resolves last wins.
    LastResolved,
}

impl LoadPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" | "latest-issued" => Some(Self::LatestIssued),
            "last-resolved" => Some(Self::LastResolved),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LatestIssued => "latest",
            Self::LastResolved => "last-resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug)]
pub struct ListController {
    kind: EntityKind,
    policy: LoadPolicy,
    records: Vec<Record>,
    is_loading: bool,
    error: Option<String>,
    issued: u64,
    notices: Notices,
}

impl ListController {
    pub fn new(kind: EntityKind, policy: LoadPolicy) -> Self {
        Self {
            kind,
            policy,
            records: Vec::new(),
            is_loading: false,
            error: None,
            issued: 0,
            notices: Notices::default(),
        }
    }

    /// Constructs the controller and runs its initial load.
    pub fn mount(kind: EntityKind, policy: LoadPolicy, gw: &mut Gateway<'_>) -> Self {
        let mut controller = Self::new(kind, policy);
        // A failed initial load is reflected in `error()` and the notices.
        let _ = controller.load(gw);
        controller
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notices(&mut self) -> &mut Notices {
        &mut self.notices
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.issued += 1;
        self.is_loading = true;
        self.error = None;
        LoadTicket(self.issued)
    }

    /// Applies a load response. `Ok(false)` means the response was stale and
    /// discarded under `LoadPolicy::LatestIssued`.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Record>, GatewayError>,
    ) -> Result<bool, GatewayError> {
        if self.policy == LoadPolicy::LatestIssued && ticket.0 != self.issued {
            debug!(
                kind = self.kind.prefix(),
                ticket = ticket.0,
                latest = self.issued,
                "discarding stale load"
            );
            return Ok(false);
        }
        self.is_loading = false;
        match result {
            Ok(records) => {
                self.records = unique_by_id(self.kind, records);
                debug!(kind = self.kind.prefix(), count = self.records.len(), "collection loaded");
                Ok(true)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                self.fail(&e);
                Err(e)
            }
        }
    }

    pub fn load(&mut self, gw: &mut Gateway<'_>) -> Result<(), GatewayError> {
        let ticket = self.begin_load();
        let result = gw.list();
        self.finish_load(ticket, result).map(|_| ())
    }

    /// Replaces the collection with the service's matches. A blank query reloads.
    pub fn search(&mut self, gw: &mut Gateway<'_>, query: &str) -> Result<(), GatewayError> {
        if query.trim().is_empty() {
            return self.load(gw);
        }
        let ticket = self.begin_load();
        let result = gw.search(query);
        self.finish_load(ticket, result).map(|_| ())
    }

    /// Appends the created record on success.
    pub fn create(
        &mut self,
        gw: &mut Gateway<'_>,
        form: &Map<String, Value>,
    ) -> Result<Record, GatewayError> {
        let saved = gw.create(form).inspect_err(|e| self.fail(e))?;
        self.report_rejected(&saved.rejected);
        let record = saved.record;
        match self.position(record.id) {
            Some(i) => {
                warn!(kind = self.kind.prefix(), id = record.id, "created record already cached");
                self.records[i] = record.clone();
            }
            None => self.records.push(record.clone()),
        }
        info!(kind = self.kind.prefix(), id = record.id, "record created");
        Ok(record)
    }

    /// Replaces the cached element with the returned record, keeping its position.
    pub fn update(
        &mut self,
        gw: &mut Gateway<'_>,
        id: i64,
        form: &Map<String, Value>,
    ) -> Result<Record, GatewayError> {
        let saved = gw.update(id, form).inspect_err(|e| self.fail(e))?;
        self.report_rejected(&saved.rejected);
        let record = saved.record;
        match self.position(id) {
            Some(i) => self.records[i] = record.clone(),
            None => {
                debug!(kind = self.kind.prefix(), id, "updated record was not cached");
                self.records.push(record.clone());
            }
        }
        info!(kind = self.kind.prefix(), id, "record updated");
        Ok(record)
    }

    pub fn delete(&mut self, gw: &mut Gateway<'_>, id: i64) -> Result<(), GatewayError> {
        gw.delete(id).inspect_err(|e| self.fail(e))?;
        self.records.retain(|r| r.id != id);
        info!(kind = self.kind.prefix(), id, "record deleted");
        Ok(())
    }

    fn fail(&mut self, e: &GatewayError) {
        for message in e.notices() {
            self.notices.error(message);
        }
    }

    fn report_rejected(&mut self, rejected: &[RecordFailure]) {
        if rejected.is_empty() {
            return;
        }
        self.fail(&GatewayError::RecordsRejected(rejected.to_vec()));
    }
}

fn unique_by_id(kind: EntityKind, records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut out = Vec::with_capacity(records.len());
    for r in records {
        if seen.insert(r.id) {
            out.push(r);
        } else {
            warn!(kind = kind.prefix(), id = r.id, "dropping duplicate record id");
        }
    }
    out
}
