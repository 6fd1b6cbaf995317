//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use idm_access::directory::MemoryDirectory;
use idm_access::model::{AclAction, AclEntry, Role, User, Workspace};
use idm_access::policy::{PolicyClient, PolicyRequest, PolicyResponse};
use idm_access::{AuthzResult, RequestContext};

pub fn user(uuid: &str, login: &str, roles: &[&str]) -> User {
    User {
        uuid: uuid.to_string(),
        login: login.to_string(),
        group_path: "/".to_string(),
        roles: roles.iter().map(|r| Role::reference(*r)).collect(),
        ..Default::default()
    }
}

/// Directory with ws1 holding node1 (read for r1, denied for r2) and ws2 with
/// a workspace-level read for r2.
pub fn seeded_directory() -> Arc<MemoryDirectory> {
    let dir = Arc::new(MemoryDirectory::new());
    dir.insert_role(Role::new("r1", "Readers"));
    dir.insert_role(Role::new("r2", "Auditors"));
    dir.insert_user(user("u-alice", "alice", &["r1"]));
    dir.insert_user(user("u-bob", "bob", &["r1", "r2"]));
    dir.insert_workspace(Workspace::new("ws1", "Common Files"));
    dir.insert_workspace(Workspace::new("ws2", "Audit"));
    dir.insert_acl(AclEntry::node("r1", "node1", AclAction::Read).in_workspace("ws1"));
    dir.insert_acl(AclEntry::node("r1", "node1", AclAction::Write).in_workspace("ws1"));
    dir.insert_acl(AclEntry::workspace("r2", "ws2", AclAction::Read));
    dir
}

/// Policy engine that counts requests and answers from a fixed flag.
pub struct CountingPolicy {
    pub allow: bool,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<PolicyRequest>>,
}

impl CountingPolicy {
    pub fn new(allow: bool) -> Arc<Self> {
        Arc::new(Self { allow, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) })
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl PolicyClient for CountingPolicy {
    async fn is_allowed(&self, _ctx: &RequestContext, request: &PolicyRequest) -> AuthzResult<PolicyResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(request.clone());
        Ok(PolicyResponse { allowed: self.allow })
    }
}
