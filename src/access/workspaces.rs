//! Workspace resolution for a flattened access list.

use tracing::{debug, error};

use super::list::AccessList;
use crate::context::RequestContext;
use crate::directory::{DirectoryClient, SearchQuery, WorkspaceSingleQuery};
use crate::error::AuthzResult;
use crate::model::Workspace;

/// Fetch the workspaces made visible by `list` and attach their root nodes.
pub async fn resolve_workspaces(directory: &dyn DirectoryClient, ctx: &RequestContext, list: &AccessList) -> AuthzResult<Vec<Workspace>> {
    let nodes = list.workspace_nodes();
    let query = SearchQuery::or(nodes.keys().map(|id| WorkspaceSingleQuery::uuid(id.clone())).collect());
    if query.is_unfiltered::<Workspace>() {
        // An unfiltered query would list every workspace
        return Ok(Vec::new());
    }
    let cursor = ctx.run("search_workspaces", directory.search_workspaces(ctx, &query)).await.map_err(|e| {
        error!(target: "idm_access::workspaces", "search workspace request has failed: {}", e);
        e
    })?;
    let mut out = cursor.collect_all(ctx).await?;
    for ws in out.iter_mut() {
        if let Some(roots) = nodes.get(&ws.uuid) {
            ws.root_nodes.extend(roots.iter().cloned());
        }
    }
    debug!(target: "idm_access::workspaces", "resolved workspaces={} of visible={}", out.len(), nodes.len());
    Ok(out)
}

/// Resolve and store the workspaces in the list's workspace map.
pub async fn attach_workspaces(directory: &dyn DirectoryClient, ctx: &RequestContext, list: &mut AccessList) -> AuthzResult<()> {
    let workspaces = resolve_workspaces(directory, ctx, list).await?;
    list.set_workspaces(workspaces);
    Ok(())
}
