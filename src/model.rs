//! Directory objects handled by the engine: roles, users, ACL entries and workspaces.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Role {
    pub uuid: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub is_group_role: bool,
    #[serde(default)]
    pub is_user_role: bool,
}

impl Role {
    pub fn new(uuid: impl Into<String>, label: impl Into<String>) -> Self {
        Self { uuid: uuid.into(), label: label.into(), ..Default::default() }
    }

    /// Bare reference by uuid, as carried by a user before resolution.
    pub fn reference(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into(), ..Default::default() }
    }

    pub fn group(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into(), is_group_role: true, ..Default::default() }
    }

    pub fn user(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into(), is_user_role: true, ..Default::default() }
    }

    pub fn is_scoped(&self) -> bool { self.is_group_role || self.is_user_role }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub uuid: String,
    pub login: String,
    #[serde(default)]
    pub group_path: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl User {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AclAction {
    Read,
    Write,
    Deny,
    Policy,
}

impl AclAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AclAction::Read => "read",
            AclAction::Write => "write",
            AclAction::Deny => "deny",
            AclAction::Policy => "policy",
        }
    }
}

/// Actions a caller can ask about once an access list is flattened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

/// The single resource an ACL entry is scoped to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ResourceKey {
    Node(String),
    Workspace(String),
}

impl ResourceKey {
    pub fn node(id: impl Into<String>) -> Self { ResourceKey::Node(id.into()) }
    pub fn workspace(id: impl Into<String>) -> Self { ResourceKey::Workspace(id.into()) }

    pub fn id(&self) -> &str {
        match self {
            ResourceKey::Node(id) | ResourceKey::Workspace(id) => id.as_str(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AclEntry {
    pub role_id: String,
    pub resource: ResourceKey,
    pub action: AclAction,
    /// Workspace a node entry was granted through; root nodes are discovered from it.
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub policy_id: Option<String>,
}

impl AclEntry {
    pub fn node(role_id: impl Into<String>, node_id: impl Into<String>, action: AclAction) -> Self {
        Self { role_id: role_id.into(), resource: ResourceKey::node(node_id), action, workspace_id: None, policy_id: None }
    }

    pub fn workspace(role_id: impl Into<String>, workspace_id: impl Into<String>, action: AclAction) -> Self {
        Self { role_id: role_id.into(), resource: ResourceKey::workspace(workspace_id), action, workspace_id: None, policy_id: None }
    }

    pub fn in_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn with_policy(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id.into());
        self
    }

    /// Workspace this entry makes visible when granted.
    pub fn touched_workspace(&self) -> Option<&str> {
        match &self.resource {
            ResourceKey::Workspace(id) => Some(id.as_str()),
            ResourceKey::Node(_) => self.workspace_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    pub uuid: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub root_nodes: BTreeSet<String>,
}

impl Workspace {
    pub fn new(uuid: impl Into<String>, label: impl Into<String>) -> Self {
        Self { uuid: uuid.into(), label: label.into(), ..Default::default() }
    }
}
