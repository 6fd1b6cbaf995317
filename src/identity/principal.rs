use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE: &str = "standard";

/// Authenticated principal handed back by a login or refresh. Built once,
/// never mutated, never persisted by this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub group_path: String,
    #[serde(default)]
    pub profile: String,
    /// Role uuids in the order the directory lists them.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub auth_source: String,
}

impl Identity {
    /// Identity as reported by a connector before the directory fills it in.
    pub fn bound(username: impl Into<String>, auth_source: impl Into<String>) -> Self {
        Self { username: username.into(), auth_source: auth_source.into(), ..Default::default() }
    }
}
