//! Composable search queries: a list of single queries joined by AND / OR.
//! A single query matches when every predicate it sets matches; unset
//! predicates are ignored, so an entirely empty query matches everything.

use serde::{Deserialize, Serialize};

use crate::model::{AclAction, AclEntry, Role, User, Workspace};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    #[default]
    Or,
    And,
}

pub trait SingleQuery<T> {
    /// True when no predicate is set.
    fn is_empty(&self) -> bool;
    fn matches(&self, item: &T) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery<Q> {
    pub sub_queries: Vec<Q>,
    #[serde(default)]
    pub operation: Operation,
}

impl<Q> SearchQuery<Q> {
    pub fn single(q: Q) -> Self { Self { sub_queries: vec![q], operation: Operation::Or } }
    pub fn and(qs: Vec<Q>) -> Self { Self { sub_queries: qs, operation: Operation::And } }
    pub fn or(qs: Vec<Q>) -> Self { Self { sub_queries: qs, operation: Operation::Or } }

    /// A query without any predicate returns every object of its kind.
    pub fn is_unfiltered<T>(&self) -> bool
    where
        Q: SingleQuery<T>,
    {
        self.sub_queries.iter().all(|q| q.is_empty())
    }

    pub fn matches<T>(&self, item: &T) -> bool
    where
        Q: SingleQuery<T>,
    {
        let active: Vec<&Q> = self.sub_queries.iter().filter(|q| !q.is_empty()).collect();
        if active.is_empty() { return true; }
        match self.operation {
            Operation::And => active.iter().all(|q| q.matches(item)),
            Operation::Or => active.iter().any(|q| q.matches(item)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleSingleQuery {
    #[serde(default)]
    pub uuids: Vec<String>,
}

impl SingleQuery<Role> for RoleSingleQuery {
    fn is_empty(&self) -> bool { self.uuids.is_empty() }
    fn matches(&self, role: &Role) -> bool { self.uuids.iter().any(|u| *u == role.uuid) }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSingleQuery {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub attribute: Option<(String, String)>,
}

impl UserSingleQuery {
    pub fn login(login: impl Into<String>) -> Self { Self { login: Some(login.into()), ..Default::default() } }
    pub fn uuid(uuid: impl Into<String>) -> Self { Self { uuid: Some(uuid.into()), ..Default::default() } }
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { attribute: Some((name.into(), value.into())), ..Default::default() }
    }
}

impl SingleQuery<User> for UserSingleQuery {
    fn is_empty(&self) -> bool { self.login.is_none() && self.uuid.is_none() && self.attribute.is_none() }

    fn matches(&self, user: &User) -> bool {
        if let Some(l) = &self.login { if *l != user.login { return false; } }
        if let Some(u) = &self.uuid { if *u != user.uuid { return false; } }
        if let Some((k, v)) = &self.attribute {
            if user.attribute(k) != Some(v.as_str()) { return false; }
        }
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AclSingleQuery {
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub workspace_ids: Vec<String>,
    #[serde(default)]
    pub actions: Vec<AclAction>,
}

impl AclSingleQuery {
    pub fn roles(ids: Vec<String>) -> Self { Self { role_ids: ids, ..Default::default() } }
    pub fn workspaces(ids: Vec<String>) -> Self { Self { workspace_ids: ids, ..Default::default() } }
    pub fn actions(actions: &[AclAction]) -> Self { Self { actions: actions.to_vec(), ..Default::default() } }
}

impl SingleQuery<AclEntry> for AclSingleQuery {
    fn is_empty(&self) -> bool {
        self.role_ids.is_empty() && self.workspace_ids.is_empty() && self.actions.is_empty()
    }

    fn matches(&self, acl: &AclEntry) -> bool {
        if !self.role_ids.is_empty() && !self.role_ids.contains(&acl.role_id) { return false; }
        if !self.actions.is_empty() && !self.actions.contains(&acl.action) { return false; }
        if !self.workspace_ids.is_empty() {
            let ws = acl.touched_workspace();
            if !self.workspace_ids.iter().any(|w| Some(w.as_str()) == ws) { return false; }
        }
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceSingleQuery {
    #[serde(default)]
    pub uuid: Option<String>,
}

impl WorkspaceSingleQuery {
    pub fn uuid(uuid: impl Into<String>) -> Self { Self { uuid: Some(uuid.into()) } }
}

impl SingleQuery<Workspace> for WorkspaceSingleQuery {
    fn is_empty(&self) -> bool { self.uuid.is_none() }

    fn matches(&self, ws: &Workspace) -> bool {
        if let Some(u) = &self.uuid { if *u != ws.uuid { return false; } }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_requires_every_sub_query() {
        let acl = AclEntry::node("r1", "n1", AclAction::Read);
        let q = SearchQuery::and(vec![AclSingleQuery::roles(vec!["r1".into()]), AclSingleQuery::actions(&[AclAction::Deny])]);
        assert!(!q.matches(&acl));
        let q = SearchQuery::and(vec![AclSingleQuery::roles(vec!["r1".into()]), AclSingleQuery::actions(&[AclAction::Read, AclAction::Deny])]);
        assert!(q.matches(&acl));
    }

    #[test]
    fn or_over_workspace_ids() {
        let q = SearchQuery::or(vec![WorkspaceSingleQuery::uuid("a"), WorkspaceSingleQuery::uuid("b")]);
        assert!(q.matches(&Workspace::new("b", "B")));
        assert!(!q.matches(&Workspace::new("c", "C")));
    }

    #[test]
    fn empty_query_is_unfiltered() {
        let q: SearchQuery<WorkspaceSingleQuery> = SearchQuery::or(vec![]);
        assert!(q.is_unfiltered::<Workspace>());
        assert!(q.matches(&Workspace::new("anything", "")));
    }
}
