//! Checksummed backup store.
//!
//! Every record is a directory under `<root>/records/<id>/` holding the
//! payload under its original file name plus a `meta.json` sidecar. Batch
//! runs additionally persist a session manifest under
//! `<root>/sessions/<id>.json`. Retention keeps the K newest records and the
//! K newest session manifests, evicting oldest-first.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use owo_colors::OwoColorize;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use xxhash_rust::xxh32::xxh32;

use crate::cli::{AppContext, BackupArgs, BackupSubcommand};
use crate::infra::io;

/// Records and session manifests retained after eviction.
pub const DEFAULT_RETENTION: usize = 10;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("no backup record found for {}", .0.display())]
    NoRecordFor(PathBuf),

    #[error("backup payload missing at {}", .0.display())]
    MissingPayload(PathBuf),

    #[error(
        "checksum mismatch for {}: recorded {recorded}, computed {computed}",
        path.display()
    )]
    ChecksumMismatch {
        path: PathBuf,
        recorded: String,
        computed: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BackupConfig {
    /// Store root; relative paths resolve against the working directory.
    pub root: PathBuf,
    pub retention: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".tidyup/backups"),
            retention: DEFAULT_RETENTION,
        }
    }
}

/// One preserved pre-write state of one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    /// RFC 3339, sub-second precision; ties break on `id`.
    pub timestamp: String,
    /// `xxh32:<8 hex digits>` over the payload bytes.
    pub checksum: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSnapshot {
    pub path: PathBuf,
    pub error: String,
}

/// Manifest of one batch run: which snapshots succeeded and which failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSession {
    pub id: String,
    pub timestamp: String,
    pub total_files: usize,
    pub successful: Vec<BackupRecord>,
    pub failed: Vec<FailedSnapshot>,
}

impl BackupSession {
    /// Fresh manifest over already-taken snapshots.
    pub fn assemble(successful: Vec<BackupRecord>, failed: Vec<FailedSnapshot>) -> Self {
        Self {
            id: generate_id(),
            timestamp: Utc::now().to_rfc3339(),
            total_files: successful.len() + failed.len(),
            successful,
            failed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EvictionReport {
    pub removed_records: Vec<String>,
    pub removed_sessions: Vec<String>,
    pub errors: Vec<String>,
}

pub struct BackupStore {
    config: BackupConfig,
}

impl BackupStore {
    pub fn new(config: BackupConfig) -> Self {
        Self { config }
    }

    pub fn retention(&self) -> usize {
        self.config.retention
    }

    fn records_dir(&self) -> PathBuf {
        self.config.root.join("records")
    }

    fn sessions_dir(&self) -> PathBuf {
        self.config.root.join("sessions")
    }

    /// Copy the current contents of `path` into a new record.
    pub fn snapshot(&self, path: &Path) -> Result<BackupRecord> {
        let original = io::canonical_or_self(path);
        let data = fs::read(&original)
            .with_context(|| format!("reading {} for backup", original.display()))?;

        let id = generate_id();
        let dir = self.records_dir().join(&id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating backup record dir {}", dir.display()))?;

        let file_name = original
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "file".into());
        let backup_path = dir.join(file_name);
        fs::write(&backup_path, &data)
            .with_context(|| format!("writing backup payload {}", backup_path.display()))?;

        let record = BackupRecord {
            id,
            original_path: original,
            backup_path,
            timestamp: Utc::now().to_rfc3339(),
            checksum: checksum_bytes(&data),
            size_bytes: data.len() as u64,
        };
        fs::write(dir.join("meta.json"), serde_json::to_vec_pretty(&record)?)
            .context("writing backup record sidecar")?;
        sync_dir(&dir);

        debug!(id = %record.id, path = %record.original_path.display(), "snapshot taken");
        Ok(record)
    }

    /// Snapshot a batch of files and persist one session manifest. A failed
    /// file never aborts the rest of the batch.
    pub fn snapshot_many(&self, paths: &[PathBuf]) -> Result<BackupSession> {
        let mut successful = Vec::new();
        let mut failed = Vec::new();

        for path in paths {
            match self.snapshot(path) {
                Ok(record) => successful.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "snapshot failed");
                    failed.push(FailedSnapshot {
                        path: path.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        let session = BackupSession::assemble(successful, failed);
        self.persist_session(&session)?;
        Ok(session)
    }

    pub fn persist_session(&self, session: &BackupSession) -> Result<PathBuf> {
        let dir = self.sessions_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating session dir {}", dir.display()))?;
        let path = dir.join(format!("{}.json", session.id));
        fs::write(&path, serde_json::to_vec_pretty(session)?)
            .with_context(|| format!("writing session manifest {}", path.display()))?;
        sync_dir(&dir);
        Ok(path)
    }

    /// All records, newest first. Unreadable sidecars are skipped with a
    /// warning rather than failing the listing.
    pub fn list_records(&self) -> Result<Vec<BackupRecord>> {
        let dir = self.records_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let meta = entry.path().join("meta.json");
            if !meta.is_file() {
                continue;
            }
            match fs::read_to_string(&meta)
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_json::from_str::<BackupRecord>(&s).map_err(Into::into))
            {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %meta.display(), error = %e, "skipping unreadable record"),
            }
        }

        records.sort_by(|a, b| (&b.timestamp, &b.id).cmp(&(&a.timestamp, &a.id)));
        Ok(records)
    }

    /// The newest record whose original path matches `path`.
    pub fn latest_record_for(&self, path: &Path) -> Result<Option<BackupRecord>> {
        let wanted = io::canonical_or_self(path);
        Ok(self
            .list_records()?
            .into_iter()
            .find(|r| r.original_path == wanted))
    }

    /// All session manifests, newest first.
    pub fn list_sessions(&self) -> Result<Vec<BackupSession>> {
        let dir = self.sessions_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(entry.path())
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_json::from_str::<BackupSession>(&s).map_err(Into::into))
            {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping unreadable session")
                }
            }
        }

        sessions.sort_by(|a, b| (&b.timestamp, &b.id).cmp(&(&a.timestamp, &a.id)));
        Ok(sessions)
    }

    pub fn read_session(&self, id: &str) -> Result<BackupSession> {
        let path = self.sessions_dir().join(format!("{id}.json"));
        let text = fs::read_to_string(&path)
            .with_context(|| format!("no session manifest {}", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Recompute the payload checksum and compare it to the sidecar. A
    /// mismatch means the record must not be restored.
    pub fn verify(&self, record: &BackupRecord) -> Result<()> {
        if !record.backup_path.is_file() {
            bail!(BackupError::MissingPayload(record.backup_path.clone()));
        }
        let computed = checksum_file(&record.backup_path)?;
        if computed != record.checksum {
            bail!(BackupError::ChecksumMismatch {
                path: record.backup_path.clone(),
                recorded: record.checksum.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Enforce retention: keep the newest K records and K session manifests.
    /// Eviction failures are reported, never fatal.
    pub fn evict_excess(&self) -> EvictionReport {
        let mut report = EvictionReport::default();
        let keep = self.config.retention;

        match self.list_records() {
            Ok(records) => {
                for record in records.iter().skip(keep) {
                    let dir = self.records_dir().join(&record.id);
                    match fs::remove_dir_all(&dir) {
                        Ok(()) => report.removed_records.push(record.id.clone()),
                        Err(e) => report.errors.push(format!("{}: {e}", dir.display())),
                    }
                }
            }
            Err(e) => report.errors.push(format!("listing records: {e:#}")),
        }

        match self.list_sessions() {
            Ok(sessions) => {
                for session in sessions.iter().skip(keep) {
                    let path = self.sessions_dir().join(format!("{}.json", session.id));
                    match fs::remove_file(&path) {
                        Ok(()) => report.removed_sessions.push(session.id.clone()),
                        Err(e) => report.errors.push(format!("{}: {e}", path.display())),
                    }
                }
            }
            Err(e) => report.errors.push(format!("listing sessions: {e:#}")),
        }

        if !report.removed_records.is_empty() || !report.removed_sessions.is_empty() {
            debug!(
                records = report.removed_records.len(),
                sessions = report.removed_sessions.len(),
                "retention eviction"
            );
        }
        report
    }
}

/// `xxh32:<8 hex digits>` over the given bytes.
pub fn checksum_bytes(data: &[u8]) -> String {
    format!("xxh32:{:08x}", xxh32(data, 0))
}

pub fn checksum_file(path: &Path) -> Result<String> {
    let data =
        fs::read(path).with_context(|| format!("reading {} for checksum", path.display()))?;
    Ok(checksum_bytes(&data))
}

/// Sortable id: UTC timestamp plus a random suffix for same-second runs.
fn generate_id() -> String {
    let ts = Utc::now().format("%Y-%m-%dT%H-%M-%SZ");
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{ts}_{suffix}")
}

/// Best-effort directory fsync so fresh records survive a crash.
fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}

/// `tup backup <subcommand>` entry point.
pub fn backup_run(args: &BackupArgs, config: BackupConfig, ctx: &AppContext) -> Result<()> {
    let store = BackupStore::new(config);

    match &args.command {
        BackupSubcommand::Create(create) => {
            let session = store.snapshot_many(&create.paths)?;
            if !ctx.quiet {
                println!(
                    "session {}: {}/{} files backed up",
                    session.id,
                    session.successful.len(),
                    session.total_files
                );
                for f in &session.failed {
                    eprintln!("  failed: {} ({})", f.path.display(), f.error);
                }
            }
            if !session.failed.is_empty() {
                bail!("{} of {} snapshots failed", session.failed.len(), session.total_files);
            }
            Ok(())
        }
        BackupSubcommand::List(list) => {
            let records = store.list_records()?;
            if list.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            if records.is_empty() {
                println!("no backup records");
                return Ok(());
            }
            for record in records.iter().take(list.limit) {
                let line = format!(
                    "{}  {}  {} bytes  {}",
                    record.id,
                    record.original_path.display(),
                    record.size_bytes,
                    record.checksum
                );
                if ctx.no_color {
                    println!("{line}");
                } else {
                    println!("{}", line.cyan());
                }
            }
            Ok(())
        }
        BackupSubcommand::Show(show) => {
            let session = store.read_session(&show.id)?;
            if show.json {
                println!("{}", serde_json::to_string_pretty(&session)?);
                return Ok(());
            }
            println!(
                "session {} ({}): {} files, {} ok, {} failed",
                session.id,
                session.timestamp,
                session.total_files,
                session.successful.len(),
                session.failed.len()
            );
            for record in &session.successful {
                println!("  {}  {}", record.id, record.original_path.display());
            }
            for f in &session.failed {
                println!("  failed: {} ({})", f.path.display(), f.error);
            }
            Ok(())
        }
        BackupSubcommand::Cleanup(cleanup) => {
            let mut store = store;
            if let Some(keep) = cleanup.retention {
                store.config.retention = keep;
            }
            let report = store.evict_excess();
            if !ctx.quiet {
                println!(
                    "evicted {} record(s), {} session manifest(s)",
                    report.removed_records.len(),
                    report.removed_sessions.len()
                );
                for e in &report.errors {
                    eprintln!("  error: {e}");
                }
            }
            if report.errors.is_empty() {
                Ok(())
            } else {
                bail!("{} eviction error(s)", report.errors.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store_in(tmp: &TempDir, retention: usize) -> BackupStore {
        BackupStore::new(BackupConfig {
            root: tmp.path().join("backups"),
            retention,
        })
    }

    #[test]
    fn snapshot_round_trip_with_checksum() -> Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp, 10);

        let src = tmp.path().join("app.js");
        fs::write(&src, "console.log('x');\n")?;

        let record = store.snapshot(&src)?;
        assert!(record.checksum.starts_with("xxh32:"));
        assert_eq!(record.size_bytes, 18);
        store.verify(&record)?;

        let listed = store.list_records()?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);

        let latest = store.latest_record_for(&src)?;
        assert_eq!(latest.unwrap().id, record.id);
        Ok(())
    }

    #[test]
    fn tampered_payload_fails_verification() -> Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp, 10);

        let src = tmp.path().join("app.js");
        fs::write(&src, "original")?;
        let record = store.snapshot(&src)?;

        fs::write(&record.backup_path, "tampered")?;
        let err = store.verify(&record).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
        Ok(())
    }

    #[test]
    fn snapshot_many_continues_past_failures() -> Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp, 10);

        let good = tmp.path().join("good.js");
        fs::write(&good, "ok")?;
        let missing = tmp.path().join("missing.js");

        let session = store.snapshot_many(&[good.clone(), missing])?;
        assert_eq!(session.total_files, 2);
        assert_eq!(session.successful.len(), 1);
        assert_eq!(session.failed.len(), 1);

        let reread = store.read_session(&session.id)?;
        assert_eq!(reread.successful.len(), 1);
        Ok(())
    }

    #[test]
    fn eviction_keeps_newest_k_records() -> Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp, 3);

        let src = tmp.path().join("app.js");
        for i in 0..5 {
            fs::write(&src, format!("version {i}"))?;
            store.snapshot(&src)?;
        }

        let report = store.evict_excess();
        assert_eq!(report.removed_records.len(), 2);
        assert!(report.errors.is_empty());

        let remaining = store.list_records()?;
        assert_eq!(remaining.len(), 3);
        // Newest survivor still restores the newest content.
        let data = fs::read_to_string(&remaining[0].backup_path)?;
        assert_eq!(data, "version 4");
        Ok(())
    }

    #[test]
    fn missing_payload_is_detected() -> Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp, 10);

        let src = tmp.path().join("app.js");
        fs::write(&src, "data")?;
        let record = store.snapshot(&src)?;
        fs::remove_file(&record.backup_path)?;

        let err = store.verify(&record).unwrap_err();
        assert!(err.to_string().contains("payload missing"));
        Ok(())
    }
}
