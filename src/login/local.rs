//! Built-in `static` connector: a fixed list of logins with Argon2 PHC hashes.

use anyhow::anyhow;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};

use super::connector::{Connector, ConnectorConfig};
use crate::context::RequestContext;
use crate::error::{AuthzError, AuthzResult};
use crate::identity::Identity;

pub const STATIC_CONNECTOR_TYPE: &str = "static";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticUser {
    pub login: String,
    pub password_hash: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticConnectorConfig {
    #[serde(default)]
    pub users: Vec<StaticUser>,
}

pub struct StaticConnector {
    name: String,
    users: Vec<StaticUser>,
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

impl StaticConnector {
    pub fn new(name: impl Into<String>, users: Vec<StaticUser>) -> Self {
        Self { name: name.into(), users }
    }

    pub fn from_config(cfg: &ConnectorConfig) -> AuthzResult<Self> {
        let parsed: StaticConnectorConfig = if cfg.config.is_null() {
            StaticConnectorConfig::default()
        } else {
            serde_json::from_value(cfg.config.clone())?
        };
        for u in parsed.users.iter() {
            if PasswordHash::new(&u.password_hash).is_err() {
                return Err(AuthzError::config("invalid_password_hash", format!("user {} has no valid PHC hash", u.login)));
            }
        }
        Ok(Self::new(cfg.name.clone(), parsed.users))
    }

    fn find(&self, login: &str) -> Option<&StaticUser> {
        self.users.iter().find(|u| u.login.eq_ignore_ascii_case(login))
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn bind(&self, ctx: &RequestContext, username: &str, password: &str) -> AuthzResult<Option<Identity>> {
        ctx.check("bind")?;
        let Some(user) = self.find(username) else { return Ok(None); };
        if !verify_password(&user.password_hash, password) {
            return Ok(None);
        }
        let mut identity = Identity::bound(user.login.clone(), self.name.clone());
        identity.email = user.email.clone().unwrap_or_default();
        Ok(Some(identity))
    }

    async fn refresh(&self, ctx: &RequestContext, identity: &Identity) -> AuthzResult<Identity> {
        ctx.check("refresh")?;
        match self.find(&identity.username) {
            Some(_) => Ok(identity.clone()),
            None => Err(AuthzError::not_found("user_not_found", format!("user {} no longer known to {}", identity.username, self.name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> StaticConnector {
        let hash = hash_password("s3cret").unwrap();
        StaticConnector::new("local", vec![StaticUser { login: "alice".into(), password_hash: hash, email: Some("a@x.io".into()) }])
    }

    #[tokio::test]
    async fn bind_checks_argon2_hash() {
        let c = connector();
        let ctx = RequestContext::new();
        let id = c.bind(&ctx, "alice", "s3cret").await.unwrap().unwrap();
        assert_eq!(id.username, "alice");
        assert_eq!(id.auth_source, "local");
        assert_eq!(id.email, "a@x.io");
        assert!(c.bind(&ctx, "alice", "wrong").await.unwrap().is_none());
        assert!(c.bind(&ctx, "mallory", "s3cret").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_fails_for_removed_login() {
        let c = connector();
        let ctx = RequestContext::new();
        assert!(c.refresh(&ctx, &Identity::bound("alice", "local")).await.is_ok());
        assert!(c.refresh(&ctx, &Identity::bound("bob", "local")).await.unwrap_err().is_not_found());
    }

    #[test]
    fn config_rejects_plain_passwords() {
        let cfg = ConnectorConfig {
            kind: STATIC_CONNECTOR_TYPE.into(),
            id: 1,
            name: "local".into(),
            config: serde_json::json!({ "users": [{ "login": "bob", "password_hash": "hunter2" }] }),
        };
        let err = StaticConnector::from_config(&cfg).err().unwrap();
        assert_eq!(err.code_str(), "invalid_password_hash");
    }
}
