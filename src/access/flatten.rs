//! Reduce the entries of an access list to one decision per resource key.
//!
//! Precedence, per resource key:
//! 1. any `Deny` entry denies; no policy is evaluated for the key
//! 2. otherwise `Policy` entries trigger one policy request for the key;
//!    a denial or a failed evaluation denies, an allow grants the union of
//!    the co-present `Read`/`Write` entries
//! 3. otherwise the union of `Read`/`Write` entries is granted
//!
//! Policy requests for different keys run concurrently. The new table only
//! replaces the previous one once every key is decided.

use std::collections::{BTreeMap, BTreeSet};

use futures_util::future::join_all;
use tracing::debug;

use super::list::{AccessList, ActionSet, Decision};
use crate::context::RequestContext;
use crate::error::AuthzResult;
use crate::model::{AclAction, AclEntry, ResourceKey};
use crate::policy::{self, role_subject, user_subject, PolicyClient, PolicyRequest, Verdict};

/// Context key listing the policy ids referenced by the entries of a key.
pub const CTX_POLICY_IDS: &str = "PolicyIds";

#[derive(Default)]
struct GroupSummary {
    deny: bool,
    policy: bool,
    actions: ActionSet,
}

fn summarize(group: &[AclEntry]) -> GroupSummary {
    let mut s = GroupSummary::default();
    for e in group {
        match e.action {
            AclAction::Deny => s.deny = true,
            AclAction::Policy => s.policy = true,
            AclAction::Read => s.actions.read = true,
            AclAction::Write => s.actions.write = true,
        }
    }
    s
}

impl AccessList {
    fn policy_request(&self, ctx: &RequestContext, key: &ResourceKey, group: &[AclEntry]) -> PolicyRequest {
        // Every role holding an entry on the key speaks for it
        let role_ids: BTreeSet<&str> = group.iter().map(|e| e.role_id.as_str()).collect();
        let mut subjects: Vec<String> = role_ids.into_iter().map(role_subject).collect();
        if let Some(login) = self.principal_login.as_deref().or_else(|| ctx.login()) {
            subjects.push(user_subject(login));
        }
        let mut context = ctx.policy_context();
        let policy_ids: BTreeSet<&str> = group.iter().filter_map(|e| e.policy_id.as_deref()).collect();
        if !policy_ids.is_empty() {
            context.insert(CTX_POLICY_IDS.to_string(), policy_ids.into_iter().collect::<Vec<_>>().join(","));
        }
        PolicyRequest { subjects, resource: key.id().to_string(), action: self.policy_action.clone(), context }
    }

    pub async fn flatten(&mut self, ctx: &RequestContext, policy: &dyn PolicyClient) -> AuthzResult<()> {
        ctx.check("flatten")?;
        let mut table: BTreeMap<ResourceKey, Decision> = BTreeMap::new();
        let mut pending: Vec<(ResourceKey, ActionSet, PolicyRequest)> = Vec::new();

        for (key, group) in self.entries.iter() {
            let summary = summarize(group);
            if summary.deny {
                table.insert(key.clone(), Decision::Denied);
            } else if summary.policy {
                pending.push((key.clone(), summary.actions, self.policy_request(ctx, key, group)));
            } else {
                table.insert(key.clone(), Decision::Granted(summary.actions));
            }
        }

        if !pending.is_empty() {
            let checks = pending.iter().map(|(_, _, req)| policy::check(policy, ctx, req));
            let verdicts: Vec<Verdict> = ctx
                .run("flatten", async { join_all(checks).await.into_iter().collect::<AuthzResult<Vec<Verdict>>>() })
                .await?;
            for ((key, actions, _), verdict) in pending.into_iter().zip(verdicts) {
                let decision = match verdict {
                    Verdict::Allowed => Decision::Granted(actions),
                    Verdict::Denied | Verdict::Failed(_) => {
                        debug!(target: "idm_access::flatten", "policy denies resource='{}' verdict={:?}", key, verdict);
                        Decision::Denied
                    }
                };
                table.insert(key, decision);
            }
        }

        let mut workspace_nodes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (key, decision) in table.iter() {
            if *decision == Decision::Denied { continue; }
            let Some(group) = self.entries.get(key) else { continue; };
            for e in group {
                let Some(ws) = e.touched_workspace() else { continue; };
                let roots = workspace_nodes.entry(ws.to_string()).or_default();
                if let ResourceKey::Node(node) = key {
                    roots.insert(node.clone());
                }
            }
        }

        debug!(target: "idm_access::flatten", "flattened keys={} denied={} workspaces={}",
            table.len(), table.values().filter(|d| **d == Decision::Denied).count(), workspace_nodes.len());
        self.table = table;
        self.workspace_nodes = workspace_nodes;
        self.flattened = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::model::{Permission, Role};
    use crate::policy::PolicyResponse;

    #[derive(Default)]
    struct Recorder {
        allow: bool,
        calls: AtomicUsize,
        seen: Mutex<Vec<PolicyRequest>>,
    }

    #[async_trait]
    impl PolicyClient for Recorder {
        async fn is_allowed(&self, _ctx: &RequestContext, request: &PolicyRequest) -> AuthzResult<PolicyResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(request.clone());
            Ok(PolicyResponse { allowed: self.allow })
        }
    }

    fn list() -> AccessList { AccessList::new(vec![Role::new("r1", "R1"), Role::new("r2", "R2")]) }

    #[tokio::test]
    async fn deny_wins_in_either_order() {
        let ctx = RequestContext::new();
        let p = Recorder::default();
        let mut a = list();
        a.append(vec![AclEntry::node("r1", "n1", AclAction::Read), AclEntry::node("r2", "n1", AclAction::Deny)]);
        a.flatten(&ctx, &p).await.unwrap();
        let mut b = list();
        b.append(vec![AclEntry::node("r2", "n1", AclAction::Deny), AclEntry::node("r1", "n1", AclAction::Read)]);
        b.flatten(&ctx, &p).await.unwrap();
        assert!(!a.is_node_allowed("n1", Permission::Read));
        assert_eq!(a.decision(&ResourceKey::node("n1")), b.decision(&ResourceKey::node("n1")));
        assert_eq!(a.decision(&ResourceKey::node("n1")), Some(Decision::Denied));
    }

    #[tokio::test]
    async fn deny_skips_policy_evaluation() {
        let p = Recorder { allow: true, ..Default::default() };
        let mut a = list();
        a.append(vec![AclEntry::node("r1", "n1", AclAction::Policy), AclEntry::node("r2", "n1", AclAction::Deny)]);
        a.flatten(&RequestContext::new(), &p).await.unwrap();
        assert_eq!(p.calls.load(Ordering::SeqCst), 0);
        assert_eq!(a.decision(&ResourceKey::node("n1")), Some(Decision::Denied));
    }

    #[tokio::test]
    async fn policy_subjects_cover_every_role_on_the_key() {
        let p = Recorder { allow: true, ..Default::default() };
        let mut a = list().with_principal("alice").with_policy_action("download");
        a.append(vec![
            AclEntry::node("r2", "n1", AclAction::Policy).with_policy("p-2"),
            AclEntry::node("r1", "n1", AclAction::Read),
            AclEntry::node("r1", "n1", AclAction::Policy).with_policy("p-1"),
        ]);
        a.flatten(&RequestContext::new(), &p).await.unwrap();
        let seen = p.seen.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].subjects, vec!["role:r1", "role:r2", "user:alice"]);
        assert_eq!(seen[0].resource, "n1");
        assert_eq!(seen[0].action, "download");
        assert_eq!(seen[0].context.get(CTX_POLICY_IDS).map(String::as_str), Some("p-1,p-2"));
        assert!(a.is_node_allowed("n1", Permission::Read));
        assert!(!a.is_node_allowed("n1", Permission::Write));
    }

    #[tokio::test]
    async fn refused_policy_denies_co_present_grants() {
        let p = Arc::new(Recorder::default());
        let mut a = list();
        a.append(vec![AclEntry::node("r1", "n1", AclAction::Write), AclEntry::node("r1", "n1", AclAction::Policy)]);
        a.flatten(&RequestContext::new(), p.as_ref()).await.unwrap();
        assert_eq!(a.decision(&ResourceKey::node("n1")), Some(Decision::Denied));
    }

    #[tokio::test]
    async fn cancelled_flatten_leaves_list_unflattened() {
        let ctx = RequestContext::new();
        ctx.cancellation().cancel();
        let mut a = list();
        a.append(vec![AclEntry::node("r1", "n1", AclAction::Read)]);
        let err = a.flatten(&ctx, &Recorder::default()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!a.is_flattened());
        assert_eq!(a.decision(&ResourceKey::node("n1")), None);
    }

    #[tokio::test]
    async fn failed_reflatten_drops_previous_grants() {
        let mut a = list();
        a.append(vec![AclEntry::node("r1", "n1", AclAction::Read).in_workspace("ws1")]);
        a.flatten(&RequestContext::new(), &Recorder::default()).await.unwrap();
        assert!(a.is_node_allowed("n1", Permission::Read));

        a.append(vec![AclEntry::node("r2", "n1", AclAction::Deny)]);
        assert!(!a.is_node_allowed("n1", Permission::Read));
        assert_eq!(a.decision(&ResourceKey::node("n1")), None);
        assert!(a.visible_workspace_ids().is_empty());

        let ctx = RequestContext::new();
        ctx.cancellation().cancel();
        assert!(a.flatten(&ctx, &Recorder::default()).await.unwrap_err().is_cancelled());
        assert!(!a.is_flattened());
        assert!(!a.is_node_allowed("n1", Permission::Read));

        a.flatten(&RequestContext::new(), &Recorder::default()).await.unwrap();
        assert_eq!(a.decision(&ResourceKey::node("n1")), Some(Decision::Denied));
    }

    #[tokio::test]
    async fn denied_node_is_not_a_root() {
        let mut a = list();
        a.append(vec![
            AclEntry::workspace("r1", "ws1", AclAction::Read),
            AclEntry::node("r1", "n1", AclAction::Read).in_workspace("ws1"),
            AclEntry::node("r1", "n2", AclAction::Read).in_workspace("ws1"),
            AclEntry::node("r2", "n2", AclAction::Deny).in_workspace("ws1"),
            AclEntry::node("r1", "n3", AclAction::Deny).in_workspace("ws2"),
        ]);
        a.flatten(&RequestContext::new(), &Recorder::default()).await.unwrap();
        assert_eq!(a.visible_workspace_ids().into_iter().collect::<Vec<_>>(), vec!["ws1"]);
        let roots = a.workspace_nodes().get("ws1").cloned().unwrap_or_default();
        assert_eq!(roots.into_iter().collect::<Vec<_>>(), vec!["n1"]);
    }
}
