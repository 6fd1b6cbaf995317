//! Workspace resolution from flattened lists.

mod common;

use std::sync::Arc;

use anyhow::Result;

use idm_access::access::{acls_for_workspaces, resolve_workspaces, AccessList, ALL_ACTIONS};
use idm_access::directory::{DirectoryOp, Operation, WorkspaceSingleQuery};
use idm_access::model::{AclAction, AclEntry, Role};
use idm_access::policy::AllowAll;
use idm_access::RequestContext;

use common::seeded_directory;

#[tokio::test]
async fn nothing_visible_means_no_query() -> Result<()> {
    let dir = seeded_directory();
    let ctx = RequestContext::new();
    let mut list = AccessList::new(vec![Role::new("r1", "Readers")]);
    list.append(vec![AclEntry::node("r1", "node1", AclAction::Deny).in_workspace("ws1")]);
    list.flatten(&ctx, &AllowAll).await?;

    let found = resolve_workspaces(dir.as_ref(), &ctx, &list).await?;
    assert!(found.is_empty());
    assert_eq!(dir.calls(DirectoryOp::SearchWorkspaces), 0);
    Ok(())
}

#[tokio::test]
async fn granted_node_becomes_a_workspace_root() -> Result<()> {
    let dir = seeded_directory();
    let ctx = RequestContext::new();
    let mut list = AccessList::new(vec![Role::new("r1", "Readers"), Role::new("r2", "Auditors")]);
    list.append(vec![
        AclEntry::node("r1", "node1", AclAction::Read).in_workspace("ws1"),
        AclEntry::node("r1", "node2", AclAction::Read).in_workspace("ws1"),
        AclEntry::node("r2", "node2", AclAction::Deny).in_workspace("ws1"),
        AclEntry::workspace("r2", "ws2", AclAction::Read),
    ]);
    list.flatten(&ctx, &AllowAll).await?;

    let found = resolve_workspaces(dir.as_ref(), &ctx, &list).await?;
    assert_eq!(found.len(), 2);
    let ws1 = found.iter().find(|w| w.uuid == "ws1").expect("ws1");
    assert_eq!(ws1.root_nodes.iter().cloned().collect::<Vec<_>>(), vec!["node1".to_string()]);
    let ws2 = found.iter().find(|w| w.uuid == "ws2").expect("ws2");
    assert!(ws2.root_nodes.is_empty());

    let q = dir.last_workspace_query().expect("workspace query recorded");
    assert_eq!(q.operation, Operation::Or);
    assert_eq!(q.sub_queries, vec![WorkspaceSingleQuery::uuid("ws1"), WorkspaceSingleQuery::uuid("ws2")]);
    assert_eq!(dir.calls(DirectoryOp::SearchWorkspaces), 1);
    assert_eq!(dir.open_cursors(), 0);
    Ok(())
}

#[tokio::test]
async fn workspace_acls_need_at_least_one_id() -> Result<()> {
    let dir = seeded_directory();
    let ctx = RequestContext::new();
    let err = acls_for_workspaces(dir.as_ref(), &ctx, &[], ALL_ACTIONS).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
    assert_eq!(dir.total_calls(), 0);

    let entries = acls_for_workspaces(dir.as_ref(), &ctx, &["ws1".to_string()], ALL_ACTIONS).await?;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.touched_workspace() == Some("ws1")));
    Ok(())
}

#[tokio::test]
async fn unknown_workspace_ids_are_skipped() -> Result<()> {
    let dir = Arc::new(idm_access::directory::MemoryDirectory::new());
    let ctx = RequestContext::new();
    let mut list = AccessList::new(vec![Role::new("r1", "Readers")]);
    list.append(vec![AclEntry::workspace("r1", "gone", AclAction::Read)]);
    list.flatten(&ctx, &AllowAll).await?;
    assert_eq!(list.visible_workspace_ids().len(), 1);
    let found = resolve_workspaces(dir.as_ref(), &ctx, &list).await?;
    assert!(found.is_empty());
    Ok(())
}
