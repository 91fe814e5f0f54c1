//! Report rendering: human text, machine JSON, and preview diffs.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use similar::TextDiff;

use crate::core::pipeline::{BatchResult, ScanReport};

/// Unified diff with git-style headers, used by preview mode.
pub fn unified_diff(path: &Path, old: &str, new: &str) -> String {
    let a = format!("a/{}", path.display());
    let b = format!("b/{}", path.display());
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&a, &b)
        .to_string()
}

pub fn render_scan_json(report: &ScanReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_scan_text(report: &ScanReport, no_color: bool) -> String {
    let mut out = String::new();

    for result in &report.results {
        if result.artifacts.is_empty() {
            continue;
        }
        if no_color {
            let _ = writeln!(out, "{}", result.path.display());
        } else {
            let _ = writeln!(out, "{}", result.path.display().bold());
        }
        for a in &result.artifacts {
            let span = if a.end_line > a.start_line {
                format!("{}-{}", a.start_line, a.end_line)
            } else {
                a.start_line.to_string()
            };
            let first_line = a.raw_text.lines().next().unwrap_or("").trim();
            let label = a.category.label();
            if no_color {
                let _ = writeln!(
                    out,
                    "  {span:>6}  [{label}] {} ({:.0}%)  {first_line}",
                    a.context.context_type.label(),
                    a.context.confidence * 100.0
                );
            } else {
                let _ = writeln!(
                    out,
                    "  {span:>6}  [{}] {} ({:.0}%)  {first_line}",
                    label.yellow(),
                    a.context.context_type.label(),
                    a.context.confidence * 100.0
                );
            }
        }
    }

    for f in &report.failed {
        let _ = writeln!(out, "skipped {}: {}", f.path.display(), f.error);
    }

    let files_with_findings = report
        .results
        .iter()
        .filter(|r| !r.artifacts.is_empty())
        .count();
    let _ = writeln!(
        out,
        "{} artifact(s) in {} of {} file(s)",
        report.total_artifacts,
        files_with_findings,
        report.results.len()
    );
    out
}

pub fn render_batch_json(result: &BatchResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn render_batch_text(result: &BatchResult, no_color: bool, quiet: bool) -> String {
    let mut out = String::new();
    let verb = if result.dry_run { "would clean" } else { "cleaned" };

    if !quiet {
        for o in &result.successful {
            if o.counts.removed == 0 && o.counts.commented == 0 {
                continue;
            }
            let line = format!(
                "{verb} {}: {} removed, {} preserved, {} commented ({} line(s) dropped)",
                o.path.display(),
                o.counts.removed,
                o.counts.preserved,
                o.counts.commented,
                o.counts.lines_removed
            );
            if no_color {
                let _ = writeln!(out, "{line}");
            } else {
                let _ = writeln!(out, "{}", line.green());
            }
        }
    }

    for f in &result.failed {
        let note = if f.rolled_back { " (rolled back)" } else { "" };
        let line = format!("failed {}: {}{note}", f.path.display(), f.error);
        if no_color {
            let _ = writeln!(out, "{line}");
        } else {
            let _ = writeln!(out, "{}", line.red());
        }
    }

    let t = &result.totals;
    let _ = writeln!(
        out,
        "{} file(s): {} artifact(s), {} removed, {} preserved, {} commented, {} failed",
        t.files_processed, t.artifacts_found, t.removed, t.preserved, t.commented, t.files_failed
    );
    if let Some(id) = &result.session_id {
        let _ = writeln!(out, "backup session: {id}");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::core::pipeline::{BatchResult, FailedFile};

    #[test]
    fn unified_diff_shows_removed_line() {
        let old = "const a = 1;\nconsole.log('x');\nconst b = 2;\n";
        let new = "const a = 1;\nconst b = 2;\n";
        let diff = unified_diff(&PathBuf::from("app.js"), old, new);
        assert!(diff.contains("a/app.js"));
        assert!(diff.contains("-console.log('x');"));
        assert!(!diff.contains("+console.log"));
    }

    #[test]
    fn batch_text_layout_is_stable() {
        use crate::core::pipeline::{BatchTotals, FileOutcome};
        use crate::core::rewrite::RewriteCounts;

        let result = BatchResult {
            successful: vec![FileOutcome {
                path: PathBuf::from("src/app.js"),
                artifacts_found: 3,
                counts: RewriteCounts {
                    removed: 2,
                    preserved: 1,
                    commented: 0,
                    lines_removed: 3,
                },
                changes: vec![],
                backup_id: Some("b1".to_string()),
                written: true,
                diff: None,
            }],
            failed: vec![FailedFile {
                path: PathBuf::from("src/util.js"),
                error: "backup failed".to_string(),
                rolled_back: true,
            }],
            totals: BatchTotals {
                files_processed: 1,
                files_failed: 1,
                artifacts_found: 3,
                removed: 2,
                preserved: 1,
                commented: 0,
                lines_removed: 3,
            },
            session_id: Some("2024-01-01T00-00-00Z_abc123".to_string()),
            dry_run: false,
        };

        insta::assert_snapshot!(render_batch_text(&result, true, false), @r"
        cleaned src/app.js: 2 removed, 1 preserved, 0 commented (3 line(s) dropped)
        failed src/util.js: backup failed (rolled back)
        1 file(s): 3 artifact(s), 2 removed, 1 preserved, 0 commented, 1 failed
        backup session: 2024-01-01T00-00-00Z_abc123
        ");
    }

    #[test]
    fn batch_text_reports_failures_and_totals() {
        let result = BatchResult {
            successful: vec![],
            failed: vec![FailedFile {
                path: PathBuf::from("broken.js"),
                error: "backup failed".to_string(),
                rolled_back: true,
            }],
            totals: Default::default(),
            session_id: Some("s1".to_string()),
            dry_run: false,
        };
        let text = render_batch_text(&result, true, false);
        assert!(text.contains("failed broken.js: backup failed (rolled back)"));
        assert!(text.contains("backup session: s1"));
    }
}
