use std::path::PathBuf;

use tracing::warn;

use crate::controller::LoadPolicy;

pub const WORKSPACE_VAR: &str = "CAMPUSD_WORKSPACE";
pub const LOAD_POLICY_VAR: &str = "CAMPUSD_LOAD_POLICY";

/// Startup settings read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Open the durable workspace store here instead of the mock data.
    pub workspace: Option<PathBuf>,
    pub load_policy: LoadPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let workspace = get(WORKSPACE_VAR)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let load_policy = match get(LOAD_POLICY_VAR) {
            None => LoadPolicy::default(),
            Some(raw) => LoadPolicy::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown {}, using default", LOAD_POLICY_VAR);
                LoadPolicy::default()
            }),
        };

        Self {
            workspace,
            load_policy,
        }
    }
}
