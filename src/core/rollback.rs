//! Rollback coordination: failure classification, the restore decision
//! table, and checksum-verified restoration from the backup store.
//!
//! Every public operation returns a structured outcome instead of bubbling
//! errors across the file boundary; one unrestorable file never aborts the
//! rest of a session rollback.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cli::{AppContext, RollbackArgs, RollbackSubcommand};
use crate::core::backup::{BackupConfig, BackupRecord, BackupStore, checksum_file};

/// What kind of failure a post-clean error message indicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackTrigger {
    SyntaxError,
    ImportError,
    ExportError,
    FileAccessError,
    ValidationError,
    None,
}

impl RollbackTrigger {
    pub fn label(&self) -> &'static str {
        match self {
            RollbackTrigger::SyntaxError => "syntax-error",
            RollbackTrigger::ImportError => "import-error",
            RollbackTrigger::ExportError => "export-error",
            RollbackTrigger::FileAccessError => "file-access-error",
            RollbackTrigger::ValidationError => "validation-error",
            RollbackTrigger::None => "none",
        }
    }
}

/// Keyword classification of an error message into a trigger.
///
/// Export-flavored messages fold into `ImportError`: both mean the module
/// graph broke, and the decision table treats them identically.
pub fn classify_failure(message: &str) -> RollbackTrigger {
    let lower = message.to_lowercase();

    let any = |keys: &[&str]| keys.iter().any(|k| lower.contains(k));

    if any(&["syntax", "unexpected token", "parse error", "parsing"]) {
        return RollbackTrigger::SyntaxError;
    }
    if any(&[
        "permission",
        "access denied",
        "eacces",
        "enoent",
        "no such file",
        "read-only",
    ]) {
        return RollbackTrigger::FileAccessError;
    }
    if any(&["import", "export", "cannot find module", "module not found"]) {
        return RollbackTrigger::ImportError;
    }
    if any(&["validation", "corrupt", "truncated"]) {
        return RollbackTrigger::ValidationError;
    }

    RollbackTrigger::None
}

/// When to restore, and how hard to try.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RollbackPolicy {
    pub on_syntax_error: bool,
    pub on_import_error: bool,
    pub max_attempts: usize,
}

impl Default for RollbackPolicy {
    fn default() -> Self {
        Self {
            on_syntax_error: true,
            on_import_error: true,
            max_attempts: 3,
        }
    }
}

/// Outcome of restoring a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileRollback {
    pub path: PathBuf,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Snapshot of the broken state taken before restoring, so the rollback
    /// itself is reversible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_record_id: Option<String>,
}

impl FileRollback {
    fn failure(path: &Path, error: String) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            error: Some(error),
            record_id: None,
            safety_record_id: None,
        }
    }
}

/// Outcome of restoring a whole session, path by path.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRollback {
    pub session_id: String,
    pub restored: Vec<PathBuf>,
    pub failed: Vec<FileRollback>,
}

impl SessionRollback {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of "undo the most recent batch, whatever it was".
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyRollback {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SessionRollback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RollbackCoordinator<'a> {
    store: &'a BackupStore,
    policy: RollbackPolicy,
}

impl<'a> RollbackCoordinator<'a> {
    pub fn new(store: &'a BackupStore, policy: RollbackPolicy) -> Self {
        Self { store, policy }
    }

    /// The decision table. File-access and validation failures always
    /// restore; syntax and import failures follow the policy switches.
    pub fn should_roll_back(&self, trigger: RollbackTrigger) -> bool {
        match trigger {
            RollbackTrigger::SyntaxError => self.policy.on_syntax_error,
            RollbackTrigger::ImportError | RollbackTrigger::ExportError => {
                self.policy.on_import_error
            }
            RollbackTrigger::FileAccessError | RollbackTrigger::ValidationError => true,
            RollbackTrigger::None => false,
        }
    }

    /// Restore `path` from its newest backup record.
    ///
    /// Selection happens before the safety snapshot, so the snapshot of the
    /// broken state can never shadow the record being restored. A checksum
    /// mismatch refuses the restore outright.
    pub fn rollback_file(&self, path: &Path) -> FileRollback {
        let record = match self.store.latest_record_for(path) {
            Ok(Some(record)) => record,
            Ok(None) => {
                return FileRollback::failure(
                    path,
                    format!("no backup record found for {}", path.display()),
                );
            }
            Err(e) => return FileRollback::failure(path, format!("{e:#}")),
        };

        if let Err(e) = self.store.verify(&record) {
            warn!(path = %path.display(), error = %e, "refusing restore");
            return FileRollback::failure(path, format!("{e:#}"));
        }

        // Preserve the broken state first; the rollback stays reversible.
        let safety_record_id = if path.exists() {
            match self.store.snapshot(path) {
                Ok(record) => Some(record.id),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "safety snapshot failed");
                    None
                }
            }
        } else {
            None
        };

        match self.restore_with_retries(&record, path) {
            Ok(()) => {
                info!(path = %path.display(), record = %record.id, "restored");
                FileRollback {
                    path: path.to_path_buf(),
                    success: true,
                    error: None,
                    record_id: Some(record.id),
                    safety_record_id,
                }
            }
            Err(e) => FileRollback {
                path: path.to_path_buf(),
                success: false,
                error: Some(format!("{e:#}")),
                record_id: Some(record.id),
                safety_record_id,
            },
        }
    }

    fn restore_with_retries(&self, record: &BackupRecord, path: &Path) -> Result<()> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            let result = fs::copy(&record.backup_path, path)
                .map_err(anyhow::Error::from)
                .and_then(|_| {
                    let restored = checksum_file(path)?;
                    if restored == record.checksum {
                        Ok(())
                    } else {
                        bail!("restored content does not match record checksum")
                    }
                });

            match result {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %e, "restore attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("restore failed")))
    }

    /// Restore every successfully backed-up path in a session. Each path is
    /// handled independently; failures accumulate in the outcome.
    pub fn rollback_session(&self, session_id: &str) -> Result<SessionRollback> {
        let session = self.store.read_session(session_id)?;

        let mut restored = Vec::new();
        let mut failed = Vec::new();

        for record in &session.successful {
            let outcome = self.rollback_file(&record.original_path);
            if outcome.success {
                restored.push(outcome.path);
            } else {
                failed.push(outcome);
            }
        }

        Ok(SessionRollback {
            session_id: session_id.to_string(),
            restored,
            failed,
        })
    }

    /// Undo the most recent session. An empty store is a structured failure,
    /// not a panic or an error return.
    pub fn emergency_rollback(&self) -> EmergencyRollback {
        let newest = match self.store.list_sessions() {
            Ok(sessions) => sessions.into_iter().next(),
            Err(e) => {
                return EmergencyRollback {
                    success: false,
                    session_id: None,
                    outcome: None,
                    error: Some(format!("{e:#}")),
                };
            }
        };

        let Some(session) = newest else {
            return EmergencyRollback {
                success: false,
                session_id: None,
                outcome: None,
                error: Some("backup store has no sessions to roll back".to_string()),
            };
        };

        match self.rollback_session(&session.id) {
            Ok(outcome) => EmergencyRollback {
                success: outcome.success(),
                session_id: Some(session.id),
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => EmergencyRollback {
                success: false,
                session_id: Some(session.id),
                outcome: None,
                error: Some(format!("{e:#}")),
            },
        }
    }
}

/// `tup rollback <subcommand>` entry point.
pub fn rollback_run(
    args: &RollbackArgs,
    config: BackupConfig,
    policy: RollbackPolicy,
    ctx: &AppContext,
) -> Result<()> {
    let store = BackupStore::new(config);
    let coordinator = RollbackCoordinator::new(&store, policy);

    match &args.command {
        RollbackSubcommand::File(file) => {
            let outcome = coordinator.rollback_file(&file.path);
            if file.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if !ctx.quiet {
                match (&outcome.success, &outcome.error) {
                    (true, _) => println!("restored {}", outcome.path.display()),
                    (false, Some(e)) => eprintln!("rollback failed: {e}"),
                    (false, None) => eprintln!("rollback failed"),
                }
            }
            if outcome.success {
                Ok(())
            } else {
                bail!("rollback of {} failed", file.path.display())
            }
        }
        RollbackSubcommand::Session(session) => {
            let outcome = coordinator.rollback_session(&session.id)?;
            if session.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if !ctx.quiet {
                println!(
                    "session {}: {} restored, {} failed",
                    outcome.session_id,
                    outcome.restored.len(),
                    outcome.failed.len()
                );
                for f in &outcome.failed {
                    eprintln!(
                        "  {}: {}",
                        f.path.display(),
                        f.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            if outcome.success() {
                Ok(())
            } else {
                bail!("{} file(s) could not be restored", outcome.failed.len())
            }
        }
        RollbackSubcommand::Emergency(em) => {
            let outcome = coordinator.emergency_rollback();
            if em.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if !ctx.quiet {
                match (&outcome.session_id, &outcome.error) {
                    (Some(id), None) => println!("rolled back session {id}"),
                    (_, Some(e)) => eprintln!("emergency rollback failed: {e}"),
                    _ => {}
                }
            }
            if outcome.success {
                Ok(())
            } else {
                bail!("emergency rollback failed")
            }
        }
    }
}
