use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::{AuthzError, AuthzResult};
use crate::identity::Identity;

/// An identity source able to check passwords and revalidate identities.
#[async_trait]
pub trait Connector: Send + Sync {
    /// `Ok(None)` means the credentials were rejected.
    async fn bind(&self, ctx: &RequestContext, username: &str, password: &str) -> AuthzResult<Option<Identity>>;

    async fn refresh(&self, ctx: &RequestContext, identity: &Identity) -> AuthzResult<Identity>;
}

/// One entry of the connector list. `id` is the priority: highest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectorConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i16,
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

pub type ConnectorFactory = Box<dyn Fn(&ConnectorConfig) -> AuthzResult<Box<dyn Connector>> + Send + Sync>;

/// Named connector constructors, built at startup and passed to the
/// delegator. Unknown type tags are rejected when the delegator is built.
#[derive(Default)]
pub struct ConnectorRegistry {
    factories: HashMap<String, ConnectorFactory>,
}

impl ConnectorRegistry {
    pub fn new() -> Self { Self::default() }

    /// Registry with the connector types shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(super::local::STATIC_CONNECTOR_TYPE, |cfg| {
            let c = super::local::StaticConnector::from_config(cfg)?;
            Ok(Box::new(c) as Box<dyn Connector>)
        });
        reg
    }

    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&ConnectorConfig) -> AuthzResult<Box<dyn Connector>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    pub fn types(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        out.sort_unstable();
        out
    }

    pub fn open(&self, cfg: &ConnectorConfig) -> AuthzResult<Box<dyn Connector>> {
        let Some(factory) = self.factories.get(&cfg.kind) else {
            return Err(AuthzError::config("unknown_connector_type", format!("unknown connector type {:?}", cfg.kind)));
        };
        factory(cfg).map_err(|e| {
            AuthzError::config("connector_open_failed", format!("failed to create connector {} - {}: {}", cfg.id, cfg.name, e))
        })
    }
}

pub struct OpenConnector {
    pub id: i16,
    pub name: String,
    pub kind: String,
    pub connector: Box<dyn Connector>,
}
