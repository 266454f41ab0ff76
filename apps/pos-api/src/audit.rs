//! # Audit Logger
//!
//! Append-only log files for every delete/modify event and every handled
//! error.
//!
//! ## Layout
//! ```text
//! static/log/
//! ├── delete/<entity>/<YYMMDD-T-HHmmss>_<actor>_<id>.log    one JSON line per event
//! ├── modify/<entity>/<YYMMDD-T-HHmmss>_<actor>_<id>.log
//! └── error/<YYYY-MM-DD>/<YYMMDD-HHmmss>-<6 alnum>.log      one text block per error
//! ```
//!
//! Files are opened in append mode with mode 0644, directories created 0755.
//! A failed write never changes the outcome of the request: callers use
//! [`AuditLogger::record`], which reports the failure through `tracing` with
//! the full payload.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::fs::{DirBuilder, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use pharma_core::Id;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("audit payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    Delete,
    Modify,
}

impl AuditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::Delete => "delete",
            AuditKind::Modify => "modify",
        }
    }

    /// Path of an event log relative to the static root.
    pub fn log_data(self, entity_type: &str, file_name: &str) -> String {
        format!("log/{}/{}/{}", self.as_str(), entity_type, file_name)
    }
}

/// Path of an error log relative to the static root, recovered from the
/// date prefix of its file name.
pub fn error_log_data(file_name: &str) -> Option<String> {
    let day = NaiveDate::parse_from_str(file_name.get(..6)?, "%y%m%d").ok()?;
    Some(format!("log/error/{}/{}", day.format("%Y-%m-%d"), file_name))
}

/// Writes under `<static>/log`.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    root: PathBuf,
}

impl AuditLogger {
    /// ## Arguments
    /// * `static_dir` - root of the static tree; logs go to `<static_dir>/log`
    pub fn new(static_dir: impl AsRef<Path>) -> Self {
        AuditLogger {
            root: static_dir.as_ref().join("log"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Entity events
    // =========================================================================

    /// Appends one event line and returns the log's file name.
    ///
    /// ## Arguments
    /// * `entity_type` - folder name, e.g. `invoice`, `medicine`
    /// * `payload` - the previous state of the entity
    pub async fn write(
        &self,
        kind: AuditKind,
        entity_type: &str,
        actor_name: &str,
        entity_id: Id,
        payload: &impl Serialize,
    ) -> Result<String, AuditError> {
        let now = Local::now();
        let dir = self.root.join(kind.as_str()).join(entity_type);
        let file_name = format!(
            "{}_{}_{}.log",
            now.format("%y%m%d-T-%H%M%S"),
            sanitize(actor_name),
            entity_id
        );

        let line = json!({
            "time": now.to_rfc3339(),
            "action": kind.as_str(),
            "entity": entity_type,
            "entityId": entity_id,
            "actor": actor_name,
            "data": serde_json::to_value(payload)?,
        });
        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');

        append(&dir, &file_name, &bytes).await?;
        debug!(kind = kind.as_str(), entity = entity_type, id = entity_id, file = %file_name, "Audit event written");
        Ok(file_name)
    }

    /// Like [`write`](Self::write) but never fails: a write error is
    /// reported through `tracing::error!` together with the payload.
    pub async fn record(
        &self,
        kind: AuditKind,
        entity_type: &str,
        actor_name: &str,
        entity_id: Id,
        payload: &impl Serialize,
    ) -> Option<String> {
        match self.write(kind, entity_type, actor_name, entity_id, payload).await {
            Ok(file) => Some(file),
            Err(e) => {
                let data = serde_json::to_string(payload).unwrap_or_default();
                error!(
                    error = %e,
                    kind = kind.as_str(),
                    entity = entity_type,
                    id = entity_id,
                    actor = actor_name,
                    data = %data,
                    "Audit log write failed"
                );
                None
            }
        }
    }

    // =========================================================================
    // Errors
    // =========================================================================

    /// Writes one error block and returns the file name.
    pub async fn write_error(
        &self,
        route: &str,
        actor_id: Option<Id>,
        aux: Option<&Value>,
        err: &str,
    ) -> Result<String, AuditError> {
        let now = Local::now();
        let dir = self.root.join("error").join(now.format("%Y-%m-%d").to_string());
        let file_name = format!("{}-{}.log", now.format("%y%m%d-%H%M%S"), correlation_code());

        let block = error_block(now, route, actor_id, aux, err);
        append(&dir, &file_name, block.as_bytes()).await?;
        Ok(file_name)
    }

    /// Best-effort [`write_error`](Self::write_error).
    pub async fn record_error(
        &self,
        route: &str,
        actor_id: Option<Id>,
        aux: Option<&Value>,
        err: &str,
    ) -> Option<String> {
        match self.write_error(route, actor_id, aux, err).await {
            Ok(file) => Some(file),
            Err(e) => {
                error!(error = %e, route = route, actor = ?actor_id, cause = err, "Error log write failed");
                None
            }
        }
    }
}

fn error_block(
    now: DateTime<Local>,
    route: &str,
    actor_id: Option<Id>,
    aux: Option<&Value>,
    err: &str,
) -> String {
    let actor = actor_id.map_or_else(|| "-".to_string(), |id| id.to_string());
    let aux = aux.map_or_else(|| "null".to_string(), |v| v.to_string());
    format!(
        "[{}]\nroute: {route}\nactor: {actor}\naux: {aux}\nerror: {err}\n\n",
        now.to_rfc3339()
    )
}

/// Six random alphanumerics.
fn correlation_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

/// Keeps actor names usable as file-name parts.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

async fn append(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<(), AuditError> {
    let io_err = |path: &Path| {
        let path = path.display().to_string();
        move |source| AuditError::Io { path, source }
    };

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(dir).await.map_err(io_err(dir))?;

    let path = dir.join(file_name);
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    options.mode(0o644);

    let mut file = options.open(&path).await.map_err(io_err(&path))?;
    file.write_all(bytes).await.map_err(io_err(&path))?;
    file.flush().await.map_err(io_err(&path))?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entity_event_path_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLogger::new(dir.path());

        let file = audit
            .write(AuditKind::Delete, "invoice", "ADMIN", 42, &json!({ "number": 7 }))
            .await
            .unwrap();
        assert!(file.ends_with("_ADMIN_42.log"));
        assert_eq!(file.len(), "240301-T-101500_ADMIN_42.log".len());

        let content = std::fs::read_to_string(audit.root().join("delete/invoice").join(&file)).unwrap();
        let line: Value = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(line["data"]["number"], 7);
        assert_eq!(line["entityId"], 42);
        assert_eq!(line["action"], "delete");
    }

    #[tokio::test]
    async fn test_same_second_events_append() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLogger::new(dir.path());

        let a = audit.write(AuditKind::Modify, "medicine", "ADMIN", 1, &json!(1)).await.unwrap();
        let b = audit.write(AuditKind::Modify, "medicine", "ADMIN", 1, &json!(2)).await.unwrap();
        if a == b {
            let content = std::fs::read_to_string(audit.root().join("modify/medicine").join(&a)).unwrap();
            assert_eq!(content.lines().count(), 2);
        }
    }

    #[tokio::test]
    async fn test_error_block() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLogger::new(dir.path());

        let file = audit
            .write_error("POST /invoice", Some(3), Some(&json!({ "number": 7 })), "Duplicate number")
            .await
            .unwrap();
        // YYMMDD-HHmmss-xxxxxx.log
        assert_eq!(file.len(), "240301-101500-ab12cd.log".len());

        let day = Local::now().format("%Y-%m-%d").to_string();
        let content = std::fs::read_to_string(audit.root().join("error").join(day).join(&file)).unwrap();
        assert!(content.contains("route: POST /invoice"));
        assert!(content.contains("actor: 3"));
        assert!(content.contains("error: Duplicate number"));

        let relative = error_log_data(&file).unwrap();
        assert!(dir.path().join(&relative).exists());
    }

    #[test]
    fn test_log_data_paths() {
        assert_eq!(
            AuditKind::Delete.log_data("invoice", "240301-T-101500_ADMIN_42.log"),
            "log/delete/invoice/240301-T-101500_ADMIN_42.log"
        );
        assert_eq!(
            error_log_data("240301-101500-ab12cd.log").as_deref(),
            Some("log/error/2024-03-01/240301-101500-ab12cd.log")
        );
        assert!(error_log_data("x.log").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLogger::new(dir.path());
        let file = audit.write(AuditKind::Delete, "unit", "ADMIN", 1, &json!({})).await.unwrap();

        let path = audit.root().join("delete/unit").join(file);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        // umask may only remove bits
        assert_eq!(mode & 0o133, 0);
    }

    #[tokio::test]
    async fn test_record_reports_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the log directory should be.
        std::fs::write(dir.path().join("log"), b"").unwrap();
        let audit = AuditLogger::new(dir.path());

        assert!(audit.record(AuditKind::Delete, "unit", "ADMIN", 1, &json!({})).await.is_none());
        assert!(audit.record_error("GET /x", None, None, "boom").await.is_none());
    }
}
