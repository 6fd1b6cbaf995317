//!
//! idm-access driver
//! -----------------
//! Runs a login or an access resolution against a directory snapshot file.
//!
//!   idm-access --directory dir.json login <username> <password>
//!   idm-access --directory dir.json access <login>
//!
//! Engine settings come from the file named by IDM_ACCESS_CONFIG.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use idm_access::audit::{AuditLog, JsonFileAuditSink, TracingAuditSink};
use idm_access::config::AccessConfig;
use idm_access::directory::{DirectorySnapshot, MemoryDirectory};
use idm_access::identity::to_request_principal;
use idm_access::{AccessResolver, ConnectorRegistry, LoginDelegator, RequestContext};

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

// Positional arguments with flag/value pairs removed
fn positionals(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i].starts_with("--") { i += 2; continue; }
        out.push(args[i].clone());
        i += 1;
    }
    out
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cfg = AccessConfig::from_env()?;
    let dir_path = parse_str_arg(&args, "--directory").ok_or_else(|| anyhow!("--directory <file> is required"))?;
    let snapshot: DirectorySnapshot = serde_json::from_str(&std::fs::read_to_string(&dir_path)?)?;
    info!(target: "idm_access", "idm-access starting: directory='{}' connectors={} audit_log={:?}", dir_path, cfg.connectors.len(), cfg.audit_log);

    let directory = Arc::new(MemoryDirectory::from_snapshot(snapshot));
    let policy = Arc::new(cfg.policy.clone());
    let mut audit = AuditLog::new().with_sink(Arc::new(TracingAuditSink));
    if let Some(p) = &cfg.audit_log {
        audit = audit.with_sink(Arc::new(JsonFileAuditSink::new(p)));
    }

    let mut ctx = RequestContext::new();
    if let Some(t) = cfg.request_timeout() { ctx = ctx.with_timeout(t); }

    let pos = positionals(&args);
    match pos.first().map(|s| s.as_str()) {
        Some("login") => {
            let (Some(user), Some(pass)) = (pos.get(1), pos.get(2)) else { return Err(anyhow!("usage: login <username> <password>")); };
            let registry = ConnectorRegistry::with_builtins();
            let delegator = LoginDelegator::from_config(&cfg.connectors, &registry, directory.clone(), policy.clone(), audit)?;
            let identity = delegator.login(&ctx, user, pass).await?;
            let resolver = AccessResolver::new(directory, policy).with_policy_action(cfg.policy_action.clone());
            let ctx = ctx.with_principal(to_request_principal(&identity));
            let list = resolver.access_list_from_context(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "identity": identity, "access": list.report() }))?);
        }
        Some("access") => {
            let Some(login) = pos.get(1) else { return Err(anyhow!("usage: access <login>")); };
            let resolver = AccessResolver::new(directory, policy).with_policy_action(cfg.policy_action.clone());
            let (list, user) = resolver.access_list_from_user(&ctx, login, false).await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "user": user.login, "access": list.report() }))?);
        }
        _ => return Err(anyhow!("expected a command: login | access")),
    }
    Ok(())
}
