use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::controller::{ListController, LoadPolicy};
use crate::gateway::Gateway;
use crate::schema::EntityKind;
use crate::service::{MemoryStore, RecordService, ServiceResult, WorkspaceService};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub service: Box<dyn RecordService>,
    pub policy: LoadPolicy,
    controllers: BTreeMap<EntityKind, ListController>,
}

impl AppState {
    /// Mock-backed state.
    pub fn mock(policy: LoadPolicy) -> ServiceResult<Self> {
        Ok(Self {
            workspace: None,
            service: Box::new(MemoryStore::seeded()?),
            policy,
            controllers: BTreeMap::new(),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut state = Self::mock(config.load_policy)?;
        if let Some(path) = &config.workspace {
            state.use_workspace(WorkspaceService::open(path)?);
        }
        Ok(state)
    }

    /// Swaps the backend and forgets every cached collection.
    pub fn use_workspace(&mut self, service: WorkspaceService) {
        info!(
            from = self.service.name(),
            path = %service.path().display(),
            dropped = self.controllers.len(),
            "switching record backend"
        );
        self.workspace = Some(service.path().to_path_buf());
        self.service = Box::new(service);
        self.controllers.clear();
    }

    pub fn is_mounted(&self, kind: EntityKind) -> bool {
        self.controllers.contains_key(&kind)
    }

    /// Runs `f` against the kind's controller, mounting it on first use.
    pub fn with_controller<T>(
        &mut self,
        kind: EntityKind,
        f: impl FnOnce(&mut ListController, &mut Gateway<'_>) -> T,
    ) -> T {
        let policy = self.policy;
        let mut gw = Gateway::new(kind.schema(), self.service.as_mut());
        let controller = self
            .controllers
            .entry(kind)
            .or_insert_with(|| ListController::mount(kind, policy, &mut gw));
        f(controller, &mut gw)
    }

    pub fn gateway(&mut self, kind: EntityKind) -> Gateway<'_> {
        Gateway::new(kind.schema(), self.service.as_mut())
    }
}
