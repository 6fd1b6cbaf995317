//! Engine configuration: connector list, audit sink, policy action and the
//! default request timeout. Read from a JSON file, then overridden by env.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::access::DEFAULT_POLICY_ACTION;
use crate::error::{AuthzError, AuthzResult};
use crate::login::ConnectorConfig;
use crate::policy::StaticPolicy;

pub const ENV_CONFIG: &str = "IDM_ACCESS_CONFIG";
pub const ENV_AUDIT_LOG: &str = "IDM_ACCESS_AUDIT_LOG";
pub const ENV_TIMEOUT_MS: &str = "IDM_ACCESS_TIMEOUT_MS";

fn default_policy_action() -> String { DEFAULT_POLICY_ACTION.to_string() }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessConfig {
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
    #[serde(default = "default_policy_action")]
    pub policy_action: String,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Policy used when no external policy engine is wired in.
    #[serde(default)]
    pub policy: StaticPolicy,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self { connectors: Vec::new(), audit_log: None, policy_action: default_policy_action(), request_timeout_ms: None, policy: StaticPolicy::default() }
    }
}

fn parse_u64_env(name: &str) -> Option<u64> {
    match env::var(name) {
        Ok(val) => val.trim().parse::<u64>().ok(),
        Err(_) => None,
    }
}

impl AccessConfig {
    pub fn from_json(text: &str) -> AuthzResult<Self> {
        let cfg: AccessConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> AuthzResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AuthzError::config("config_unreadable", format!("cannot read '{}': {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// File named by `IDM_ACCESS_CONFIG` (defaults when unset), then env overrides.
    pub fn from_env() -> AuthzResult<Self> {
        let mut cfg = match env::var(ENV_CONFIG) {
            Ok(p) if !p.trim().is_empty() => Self::load(p.trim())?,
            _ => Self::default(),
        };
        if let Ok(p) = env::var(ENV_AUDIT_LOG) {
            if !p.trim().is_empty() { cfg.audit_log = Some(PathBuf::from(p.trim())); }
        }
        if let Some(ms) = parse_u64_env(ENV_TIMEOUT_MS) { cfg.request_timeout_ms = Some(ms); }
        Ok(cfg)
    }

    /// Connector ids are priorities and must be unique.
    pub fn validate(&self) -> AuthzResult<()> {
        let mut ids: Vec<i16> = self.connectors.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(AuthzError::config("duplicate_connector_id", format!("connector id {} is used twice", w[0])));
        }
        if self.policy_action.trim().is_empty() {
            return Err(AuthzError::config("empty_policy_action", "policy_action must not be empty"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> { self.request_timeout_ms.map(Duration::from_millis) }
}
