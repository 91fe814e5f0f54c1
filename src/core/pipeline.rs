//! Batch pipeline: scan -> plan -> backup -> rewrite -> validate.
//!
//! One file's failure never aborts the batch; every file ends up in either
//! the successful or the failed partition of the result. Writes are guarded
//! by a pre-write snapshot and a post-write validation read, and a failed
//! validation rolls the file back automatically.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use indicatif::ProgressBar;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::{AppContext, CleanArgs, PreviewArgs, ScanArgs};
use crate::core::backup::{BackupConfig, BackupSession, BackupStore, FailedSnapshot};
use crate::core::policy::{CleanOptions, DecisionPolicy};
use crate::core::rewrite::{ChangeRecord, LineRewriter, RewriteCounts, SourceDocument};
use crate::core::rollback::{
    RollbackCoordinator, RollbackPolicy, RollbackTrigger, classify_failure,
};
use crate::core::scan::{Artifact, ArtifactScanner};
use crate::infra::config::Config;
use crate::infra::io;
use crate::infra::walk::FileWalker;
use crate::report;

/// Per-file scan outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub path: PathBuf,
    pub artifacts: Vec<Artifact>,
}

/// A file the batch could not process. The rest of the batch continued.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
    pub rolled_back: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub results: Vec<AnalysisResult>,
    pub failed: Vec<FailedFile>,
    pub total_artifacts: usize,
}

/// Per-file clean outcome.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub artifacts_found: usize,
    pub counts: RewriteCounts,
    pub changes: Vec<ChangeRecord>,
    /// `None` when nothing needed writing or backups were disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    pub written: bool,
    /// Unified diff of what would change; populated in preview mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BatchTotals {
    pub files_processed: usize,
    pub files_failed: usize,
    pub artifacts_found: usize,
    pub removed: usize,
    pub preserved: usize,
    pub commented: usize,
    pub lines_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub successful: Vec<FileOutcome>,
    pub failed: Vec<FailedFile>,
    pub totals: BatchTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub dry_run: bool,
}

impl BatchResult {
    fn finish(
        successful: Vec<FileOutcome>,
        failed: Vec<FailedFile>,
        session_id: Option<String>,
        dry_run: bool,
    ) -> Self {
        let mut totals = BatchTotals {
            files_processed: successful.len(),
            files_failed: failed.len(),
            ..BatchTotals::default()
        };
        for o in &successful {
            totals.artifacts_found += o.artifacts_found;
            totals.removed += o.counts.removed;
            totals.preserved += o.counts.preserved;
            totals.commented += o.counts.commented;
            totals.lines_removed += o.counts.lines_removed;
        }

        Self {
            successful,
            failed,
            totals,
            session_id,
            dry_run,
        }
    }
}

pub struct Pipeline {
    scanner: ArtifactScanner,
    policy: DecisionPolicy,
    backup: BackupConfig,
    rollback: RollbackPolicy,
}

impl Pipeline {
    pub fn new(options: CleanOptions, backup: BackupConfig, rollback: RollbackPolicy) -> Result<Self> {
        Ok(Self {
            scanner: ArtifactScanner::new()?,
            policy: DecisionPolicy::new(options),
            backup,
            rollback,
        })
    }

    /// Read-only batch scan.
    pub fn scan(&self, files: &[PathBuf], progress: Option<&ProgressBar>) -> ScanReport {
        let mut results = Vec::new();
        let mut failed = Vec::new();
        let mut total = 0usize;

        for path in files {
            if let Some(pb) = progress {
                pb.inc(1);
            }
            match SourceDocument::load(path) {
                Ok(doc) => {
                    let artifacts = self.scanner.scan(path, &doc.lines);
                    total += artifacts.len();
                    results.push(AnalysisResult {
                        path: path.clone(),
                        artifacts,
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "scan skipped file");
                    failed.push(FailedFile {
                        path: path.clone(),
                        error: format!("{e:#}"),
                        rolled_back: false,
                    });
                }
            }
        }

        ScanReport {
            results,
            failed,
            total_artifacts: total,
        }
    }

    /// Batch clean. With `dry_run` nothing is written or backed up; each
    /// outcome instead carries a unified diff of the would-be change.
    pub fn clean(&self, files: &[PathBuf], dry_run: bool, progress: Option<&ProgressBar>) -> BatchResult {
        let store = (!dry_run && self.policy.options().create_backup)
            .then(|| BackupStore::new(self.backup.clone()));

        let mut successful = Vec::new();
        let mut failed = Vec::new();
        let mut session_records = Vec::new();
        let mut session_failures: Vec<FailedSnapshot> = Vec::new();

        for path in files {
            if let Some(pb) = progress {
                pb.inc(1);
            }
            match self.clean_one(path, store.as_ref(), dry_run, &mut session_records) {
                Ok(outcome) => successful.push(outcome),
                Err(failure) => {
                    if let Some(snap_error) = failure.snapshot_error {
                        session_failures.push(FailedSnapshot {
                            path: path.clone(),
                            error: snap_error,
                        });
                    }
                    failed.push(FailedFile {
                        path: path.clone(),
                        error: failure.error,
                        rolled_back: failure.rolled_back,
                    });
                }
            }
        }

        // One manifest per batch, then retention eviction.
        let mut session_id = None;
        if let Some(store) = &store {
            if !session_records.is_empty() || !session_failures.is_empty() {
                let session = BackupSession::assemble(session_records, session_failures);
                match store.persist_session(&session) {
                    Ok(_) => session_id = Some(session.id),
                    Err(e) => warn!(error = %e, "session manifest not persisted"),
                }
            }
            let evicted = store.evict_excess();
            for e in &evicted.errors {
                warn!(error = %e, "retention eviction");
            }
        }

        BatchResult::finish(successful, failed, session_id, dry_run)
    }

    fn clean_one(
        &self,
        path: &Path,
        store: Option<&BackupStore>,
        dry_run: bool,
        session_records: &mut Vec<crate::core::backup::BackupRecord>,
    ) -> Result<FileOutcome, CleanFailure> {
        let mut doc = SourceDocument::load(path).map_err(CleanFailure::plain)?;
        let artifacts = self.scanner.scan(path, &doc.lines);
        let artifacts_found = artifacts.len();
        let plan = self.policy.plan(artifacts);
        doc.mark_planned();

        if plan.is_noop() {
            // Count dispositions, but never write or back up untouched files.
            let report = LineRewriter::apply(&mut doc, &plan).map_err(CleanFailure::plain)?;
            debug!(path = %path.display(), "no changes needed");
            return Ok(FileOutcome {
                path: path.to_path_buf(),
                artifacts_found,
                counts: report.counts,
                changes: report.changes,
                backup_id: None,
                written: false,
                diff: None,
            });
        }

        let original = doc.render();

        // Backup precedes the first write, unconditionally.
        let mut backup_id = None;
        if !dry_run {
            if let Some(store) = store {
                let record = store.snapshot(path).map_err(|e| CleanFailure {
                    error: format!("backup failed, file left untouched: {e:#}"),
                    snapshot_error: Some(format!("{e:#}")),
                    rolled_back: false,
                })?;
                backup_id = Some(record.id.clone());
                session_records.push(record);
            }
        }

        let report = LineRewriter::apply(&mut doc, &plan).map_err(CleanFailure::plain)?;
        let new_text = doc.render();

        if dry_run {
            return Ok(FileOutcome {
                path: path.to_path_buf(),
                artifacts_found,
                counts: report.counts,
                changes: report.changes,
                backup_id: None,
                written: false,
                diff: Some(report::unified_diff(path, &original, &new_text)),
            });
        }

        if let Err(e) = io::write_atomic(path, new_text.as_bytes()) {
            let rolled_back = self.recover(path, store, &format!("{e:#}"));
            return Err(CleanFailure {
                error: format!("write failed: {e:#}"),
                snapshot_error: None,
                rolled_back,
            });
        }

        // Post-write validation: what landed on disk is what was rendered.
        let validation = match fs::read_to_string(path) {
            Ok(on_disk) if on_disk == new_text => Ok(()),
            Ok(_) => Err("validation failed: written content is truncated or corrupt".to_string()),
            Err(e) => Err(format!("{e}")),
        };
        if let Err(msg) = validation {
            let rolled_back = self.recover(path, store, &msg);
            return Err(CleanFailure {
                error: msg,
                snapshot_error: None,
                rolled_back,
            });
        }

        info!(
            path = %path.display(),
            removed = report.counts.removed,
            preserved = report.counts.preserved,
            commented = report.counts.commented,
            "cleaned"
        );
        Ok(FileOutcome {
            path: path.to_path_buf(),
            artifacts_found,
            counts: report.counts,
            changes: report.changes,
            backup_id,
            written: true,
            diff: None,
        })
    }

    /// Classify the failure and restore the file when the decision table
    /// says so. Returns whether a rollback actually succeeded.
    fn recover(&self, path: &Path, store: Option<&BackupStore>, message: &str) -> bool {
        let Some(store) = store else {
            return false;
        };

        let trigger = classify_failure(message);
        let coordinator = RollbackCoordinator::new(store, self.rollback.clone());
        // Unclassifiable post-write damage still counts as validation.
        let effective = if trigger == RollbackTrigger::None {
            RollbackTrigger::ValidationError
        } else {
            trigger
        };
        if !coordinator.should_roll_back(effective) {
            return false;
        }

        warn!(path = %path.display(), trigger = effective.label(), "rolling back");
        coordinator.rollback_file(path).success
    }
}

struct CleanFailure {
    error: String,
    snapshot_error: Option<String>,
    rolled_back: bool,
}

impl CleanFailure {
    fn plain(e: anyhow::Error) -> Self {
        Self {
            error: format!("{e:#}"),
            snapshot_error: None,
            rolled_back: false,
        }
    }
}

/// Expand CLI path arguments into a deterministic candidate file list.
pub fn expand_paths(
    paths: &[PathBuf],
    extra_ignores: &[String],
    extensions: &[String],
) -> Result<Vec<PathBuf>> {
    let walker = FileWalker::new(extra_ignores)?.with_extensions(extensions);

    let mut out = Vec::new();
    for raw in paths {
        let expanded = shellexpand::tilde(&raw.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        if path.is_dir() {
            out.extend(walker.walk_files(&path));
        } else if path.is_file() {
            out.push(path);
        } else {
            warn!(path = %path.display(), "path does not exist, skipping");
        }
    }

    Ok(out.into_iter().sorted().dedup().collect())
}

fn progress_for(ctx: &AppContext, json: bool, total: usize) -> Option<ProgressBar> {
    (!ctx.quiet && !json && total > 1).then(|| ProgressBar::new(total as u64))
}

/// `tup scan` entry point.
pub fn scan_run(args: &ScanArgs, config: &Config, ctx: &AppContext) -> Result<()> {
    let ignores = config.merged_ignores(&args.ignore);
    let extensions = config.merged_extensions(&args.extensions);
    let files = expand_paths(&args.paths, &ignores, &extensions)?;

    let pipeline = Pipeline::new(
        config.clean.clone(),
        config.backup.clone(),
        config.rollback.clone(),
    )?;
    let progress = progress_for(ctx, args.json, files.len());
    let report = pipeline.scan(&files, progress.as_ref());
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if args.json {
        println!("{}", report::render_scan_json(&report)?);
    } else {
        print!("{}", report::render_scan_text(&report, ctx.no_color));
    }
    Ok(())
}

/// `tup clean` entry point. Preview is the default; `--apply` writes.
pub fn clean_run(args: &CleanArgs, config: &Config, ctx: &AppContext) -> Result<()> {
    let options = args.merged_options(config);
    let mut backup = config.backup.clone();
    if let Some(dir) = &args.backup_dir {
        backup.root = dir.clone();
    }
    if let Some(keep) = args.retention {
        backup.retention = keep;
    }

    let ignores = config.merged_ignores(&args.ignore);
    let extensions = config.merged_extensions(&args.extensions);
    let files = expand_paths(&args.paths, &ignores, &extensions)?;

    let dry_run = ctx.dry_run || !args.apply;
    let pipeline = Pipeline::new(options, backup, config.rollback.clone())?;
    let progress = progress_for(ctx, args.json, files.len());
    let result = pipeline.clean(&files, dry_run, progress.as_ref());
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if args.json {
        println!("{}", report::render_batch_json(&result)?);
    } else {
        print!("{}", report::render_batch_text(&result, ctx.no_color, ctx.quiet));
        if dry_run && !args.apply && !ctx.quiet {
            println!("preview only; re-run with --apply to write changes");
        }
    }

    if result.failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} file(s) failed", result.failed.len())
    }
}

/// `tup preview` entry point: always a dry run with diffs.
pub fn preview_run(args: &PreviewArgs, config: &Config, ctx: &AppContext) -> Result<()> {
    let mut options = config.clean.clone();
    if let Some(min) = args.min_confidence {
        options.min_confidence = min;
    }

    let ignores = config.merged_ignores(&args.ignore);
    let extensions = config.merged_extensions(&args.extensions);
    let files = expand_paths(&args.paths, &ignores, &extensions)?;

    let pipeline = Pipeline::new(options, config.backup.clone(), config.rollback.clone())?;
    let progress = progress_for(ctx, args.json, files.len());
    let result = pipeline.clean(&files, true, progress.as_ref());
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if args.json {
        println!("{}", report::render_batch_json(&result)?);
    } else {
        for outcome in &result.successful {
            if let Some(diff) = &outcome.diff {
                print!("{diff}");
            }
        }
        print!("{}", report::render_batch_text(&result, ctx.no_color, ctx.quiet));
    }
    Ok(())
}
