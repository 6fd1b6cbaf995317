//! Per-request access list: raw ACL entries, the flattened decision table
//! and the workspaces it makes visible.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{AclEntry, Permission, ResourceKey, Role, Workspace};

pub const DEFAULT_POLICY_ACTION: &str = "read";

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ActionSet {
    pub read: bool,
    pub write: bool,
}

impl ActionSet {
    pub fn contains(&self, p: Permission) -> bool {
        match p {
            Permission::Read => self.read,
            Permission::Write => self.write,
        }
    }
}

/// Effective decision for one resource key once flattened.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "effect", rename_all = "lowercase")]
pub enum Decision {
    Denied,
    Granted(ActionSet),
}

/// Per-request aggregate of roles and ACL entries. Entries are appended
/// first, then `flatten` computes one decision per resource key; the
/// decision table and workspace visibility are read-only afterwards.
#[derive(Debug, Clone)]
pub struct AccessList {
    pub(super) roles: Vec<Role>,
    pub(super) principal_login: Option<String>,
    pub(super) policy_action: String,
    pub(super) entries: BTreeMap<ResourceKey, Vec<AclEntry>>,
    pub(super) table: BTreeMap<ResourceKey, Decision>,
    pub(super) workspace_nodes: BTreeMap<String, BTreeSet<String>>,
    pub(super) workspaces: BTreeMap<String, Workspace>,
    pub(super) flattened: bool,
}

impl AccessList {
    pub fn new(roles: Vec<Role>) -> Self {
        Self {
            roles,
            principal_login: None,
            policy_action: DEFAULT_POLICY_ACTION.to_string(),
            entries: BTreeMap::new(),
            table: BTreeMap::new(),
            workspace_nodes: BTreeMap::new(),
            workspaces: BTreeMap::new(),
            flattened: false,
        }
    }

    /// Login added as a `user:<login>` subject to policy requests.
    pub fn with_principal(mut self, login: impl Into<String>) -> Self {
        self.principal_login = Some(login.into()).filter(|l: &String| !l.is_empty());
        self
    }

    pub fn with_policy_action(mut self, action: impl Into<String>) -> Self {
        self.policy_action = action.into();
        self
    }

    /// Add raw entries. Precedence is applied by `flatten`, so order and
    /// duplicates do not matter.
    pub fn append<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = AclEntry>,
    {
        for e in entries {
            self.entries.entry(e.resource.clone()).or_default().push(e);
        }
        // Decisions no longer match the entries until the next flatten
        self.table.clear();
        self.workspace_nodes.clear();
        self.workspaces.clear();
        self.flattened = false;
    }

    pub fn roles(&self) -> &[Role] { &self.roles }

    pub fn entry_count(&self) -> usize { self.entries.values().map(|v| v.len()).sum() }

    pub fn is_flattened(&self) -> bool { self.flattened }

    pub fn decision(&self, key: &ResourceKey) -> Option<Decision> { self.table.get(key).copied() }

    pub fn allowed_actions(&self, key: &ResourceKey) -> ActionSet {
        match self.table.get(key) {
            Some(Decision::Granted(set)) => *set,
            _ => ActionSet::default(),
        }
    }

    pub fn is_allowed(&self, key: &ResourceKey, permission: Permission) -> bool {
        self.allowed_actions(key).contains(permission)
    }

    pub fn is_node_allowed(&self, node_id: &str, permission: Permission) -> bool {
        self.is_allowed(&ResourceKey::node(node_id), permission)
    }

    pub fn is_workspace_allowed(&self, workspace_id: &str, permission: Permission) -> bool {
        self.is_allowed(&ResourceKey::workspace(workspace_id), permission)
    }

    pub fn visible_workspace_ids(&self) -> BTreeSet<String> { self.workspace_nodes.keys().cloned().collect() }

    /// Granted node ids per visible workspace.
    pub fn workspace_nodes(&self) -> &BTreeMap<String, BTreeSet<String>> { &self.workspace_nodes }

    pub fn workspaces(&self) -> &BTreeMap<String, Workspace> { &self.workspaces }

    pub fn set_workspaces(&mut self, workspaces: Vec<Workspace>) {
        for ws in workspaces {
            self.workspaces.insert(ws.uuid.clone(), ws);
        }
    }

    pub fn report(&self) -> AccessReport {
        AccessReport {
            roles: self.roles.iter().map(|r| r.uuid.clone()).collect(),
            decisions: self.table.iter().map(|(k, d)| ResourceDecision { resource: k.clone(), decision: *d }).collect(),
            workspaces: self.workspaces.values().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResourceDecision {
    pub resource: ResourceKey,
    pub decision: Decision,
}

/// Serializable view of a flattened list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccessReport {
    pub roles: Vec<String>,
    pub decisions: Vec<ResourceDecision>,
    pub workspaces: Vec<Workspace>,
}
