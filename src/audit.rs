//! Login audit trail. Sinks are owned by an explicit `AuditLog` handed to the
//! login delegator; every event reaches every sink.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    LoginSucceeded,
    /// A connector accepted the password but the login policy refused.
    PolicyDenied,
    /// One connector rejected the credentials or failed.
    BindFailed,
    /// No connector accepted the credentials.
    LoginFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEvent {
    pub ts: DateTime<Utc>,
    pub kind: AuditKind,
    pub username: String,
    #[serde(default)]
    pub connector: Option<String>,
    #[serde(default)]
    pub user_uuid: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    pub message: String,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, username: &str, message: impl Into<String>) -> Self {
        Self { ts: Utc::now(), kind, username: username.to_string(), connector: None, user_uuid: None, request_id: None, message: message.into() }
    }

    pub fn connector(mut self, name: &str) -> Self {
        self.connector = Some(name.to_string());
        self
    }

    pub fn user_uuid(mut self, uuid: &str) -> Self {
        self.user_uuid = Some(uuid.to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn request_id(mut self, id: &str) -> Self {
        self.request_id = Some(id.to_string());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, ev: &AuditEvent);
}

#[derive(Clone, Default)]
pub struct AuditLog {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditLog {
    pub fn new() -> Self { Self::default() }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn emit(&self, ev: AuditEvent) {
        for s in self.sinks.iter() {
            // Sinks handle their own failures
            s.record(&ev);
        }
    }
}

/// Structured log record on target `idm_access::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, ev: &AuditEvent) {
        let connector = ev.connector.as_deref().unwrap_or("-");
        match ev.kind {
            AuditKind::LoginSucceeded => tracing::info!(target: "idm_access::audit", kind = ?ev.kind, user = %ev.username, connector, "{}", ev.message),
            AuditKind::BindFailed => tracing::debug!(target: "idm_access::audit", kind = ?ev.kind, user = %ev.username, connector, "{}", ev.message),
            AuditKind::PolicyDenied | AuditKind::LoginFailed => tracing::error!(target: "idm_access::audit", kind = ?ev.kind, user = %ev.username, connector, "{}", ev.message),
        }
    }
}

/// Appends one JSON line per event.
pub struct JsonFileAuditSink {
    path: PathBuf,
}

impl JsonFileAuditSink {
    pub fn new(path: impl AsRef<Path>) -> Self { Self { path: path.as_ref().to_path_buf() } }
}

impl AuditSink for JsonFileAuditSink {
    fn record(&self, ev: &AuditEvent) {
        let line = match serde_json::to_string(ev) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(target: "idm_access::audit", "audit event not serializable: {}", e);
                return;
            }
        };
        match std::fs::OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(mut f) => {
                if let Err(e) = writeln!(&mut f, "{}", line) {
                    tracing::warn!(target: "idm_access::audit", "audit write failed path='{}': {}", self.path.display(), e);
                }
            }
            Err(e) => tracing::warn!(target: "idm_access::audit", "audit open failed path='{}': {}", self.path.display(), e),
        }
    }
}

/// Keeps events in memory for inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self { Self::default() }

    pub fn events(&self) -> Vec<AuditEvent> { self.events.lock().clone() }

    pub fn kinds(&self) -> Vec<AuditKind> { self.events.lock().iter().map(|e| e.kind).collect() }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, ev: &AuditEvent) {
        self.events.lock().push(ev.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sink_receives_the_event() {
        let a = Arc::new(MemoryAuditSink::new());
        let b = Arc::new(MemoryAuditSink::new());
        let log = AuditLog::new().with_sink(a.clone()).with_sink(b.clone()).with_sink(Arc::new(TracingAuditSink));
        log.emit(AuditEvent::new(AuditKind::LoginFailed, "alice", "login attempt failed"));
        assert_eq!(a.kinds(), vec![AuditKind::LoginFailed]);
        assert_eq!(b.events()[0].username, "alice");
    }

    #[test]
    fn json_file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonFileAuditSink::new(&path);
        sink.record(&AuditEvent::new(AuditKind::BindFailed, "bob", "bad password").connector("ldap"));
        sink.record(&AuditEvent::new(AuditKind::LoginSucceeded, "bob", "logged in").connector("local").user_uuid("u-2"));
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.kind, AuditKind::LoginSucceeded);
        assert_eq!(second.connector.as_deref(), Some("local"));
        assert_eq!(second.user_uuid.as_deref(), Some("u-2"));
    }
}
