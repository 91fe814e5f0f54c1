//! Line rewriter: applies an action plan to a source document.
//!
//! Edits are applied in descending end-line order so earlier line numbers
//! stay valid throughout the pass; no offset bookkeeping, no re-scanning.
//! The document moves through an explicit phase machine
//! (Scanned -> Planned -> Rewritten -> Compacted) and the rewriter refuses
//! to run out of order.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::trace;

use crate::core::policy::ActionPlan;
use crate::core::scan::{Action, ArtifactCategory};
use crate::infra::io;

/// Lifecycle of a document within one cleaning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocPhase {
    Scanned,
    Planned,
    Rewritten,
    Compacted,
}

/// An in-memory source file with its newline convention preserved.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub newline: &'static str,
    pub final_newline: bool,
    pub phase: DocPhase,
}

impl SourceDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let content = io::read_file_smart(path)?;
        Ok(Self::from_text(path, content.as_ref()))
    }

    pub fn from_text(path: &Path, text: &str) -> Self {
        let (newline, final_newline) = io::detect_newline(text);
        Self {
            path: path.to_path_buf(),
            lines: io::split_lines(text),
            newline,
            final_newline,
            phase: DocPhase::Scanned,
        }
    }

    pub fn mark_planned(&mut self) {
        self.phase = DocPhase::Planned;
    }

    /// Reassemble with the original newline style and EOF convention.
    pub fn render(&self) -> String {
        io::join_lines(&self.lines, self.newline, self.final_newline)
    }
}

/// One mutation the rewriter performed (preserves are counted, not logged).
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    pub category: ArtifactCategory,
    pub line: usize,
    pub action: Action,
    pub before: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    pub reason: String,
}

/// Disposition counters. `removed + preserved + commented` always equals the
/// number of artifacts the plan covered.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RewriteCounts {
    pub removed: usize,
    pub preserved: usize,
    pub commented: usize,
    pub lines_removed: usize,
}

impl RewriteCounts {
    pub fn dispositions(&self) -> usize {
        self.removed + self.preserved + self.commented
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RewriteReport {
    pub changes: Vec<ChangeRecord>,
    pub counts: RewriteCounts,
}

pub struct LineRewriter;

impl LineRewriter {
    /// Apply `plan` to `doc`. Requires the document to be in the `Planned`
    /// phase; leaves it `Compacted`.
    pub fn apply(doc: &mut SourceDocument, plan: &ActionPlan) -> Result<RewriteReport> {
        if doc.phase != DocPhase::Planned {
            bail!(
                "rewriter invoked on {} in phase {:?}, expected Planned",
                doc.path.display(),
                doc.phase
            );
        }

        let mut report = RewriteReport::default();

        // Descending end line keeps every pending index valid.
        let mut items: Vec<&crate::core::policy::PlannedItem> = plan.items.iter().collect();
        items.sort_by(|a, b| {
            (b.artifact.end_line, b.artifact.start_line)
                .cmp(&(a.artifact.end_line, a.artifact.start_line))
        });

        for item in items {
            let a = &item.artifact;
            if a.start_line == 0 || a.end_line > doc.lines.len() || a.start_line > a.end_line {
                bail!(
                    "plan references lines {}..{} outside {} ({} lines)",
                    a.start_line,
                    a.end_line,
                    doc.path.display(),
                    doc.lines.len()
                );
            }
            let start = a.start_line - 1;
            let end = a.end_line - 1;

            trace!(
                line = a.start_line,
                action = item.action.label(),
                "applying"
            );

            match item.action {
                Action::Preserve => {
                    report.counts.preserved += 1;
                }
                Action::Comment => {
                    let before = doc.lines[start..=end].join("\n");
                    let comment = comment_line(&doc.lines[start], &a.raw_text);
                    doc.lines.splice(start..=end, [comment.clone()]);
                    report.counts.commented += 1;
                    report.counts.lines_removed += end - start;
                    report.changes.push(ChangeRecord {
                        category: a.category,
                        line: a.start_line,
                        action: item.action,
                        before,
                        after: Some(comment),
                        reason: item.reason.clone(),
                    });
                }
                Action::RemoveLine | Action::RemoveBlock => {
                    let before = doc.lines[start..=end].join("\n");
                    doc.lines.drain(start..=end);
                    report.counts.removed += 1;
                    report.counts.lines_removed += end - start + 1;
                    report.changes.push(ChangeRecord {
                        category: a.category,
                        line: a.start_line,
                        action: item.action,
                        before,
                        after: None,
                        reason: item.reason.clone(),
                    });
                }
                Action::RemovePartial => {
                    let before = doc.lines[start..=end].join("\n");
                    let remainder = if start == end {
                        remove_partial(&doc.lines[start], &a.raw_text)
                    } else {
                        remove_partial_span(&doc.lines[start], &doc.lines[end], &a.raw_text)
                    };
                    match remainder {
                        Some(rest) if !rest.trim().is_empty() => {
                            doc.lines.splice(start..=end, [rest.clone()]);
                            report.counts.removed += 1;
                            report.counts.lines_removed += end - start;
                            report.changes.push(ChangeRecord {
                                category: a.category,
                                line: a.start_line,
                                action: item.action,
                                before,
                                after: Some(rest),
                                reason: item.reason.clone(),
                            });
                        }
                        Some(_) => {
                            // Nothing but the artifact on those lines after all.
                            doc.lines.drain(start..=end);
                            report.counts.removed += 1;
                            report.counts.lines_removed += end - start + 1;
                            report.changes.push(ChangeRecord {
                                category: a.category,
                                line: a.start_line,
                                action: Action::RemoveLine,
                                before,
                                after: None,
                                reason: item.reason.clone(),
                            });
                        }
                        None => {
                            // Statement text no longer matches; leave it be.
                            report.counts.preserved += 1;
                        }
                    }
                }
            }
        }
        doc.phase = DocPhase::Rewritten;

        report.counts.lines_removed += compact_blanks(&mut doc.lines);
        doc.phase = DocPhase::Compacted;

        Ok(report)
    }
}

/// Drop a matched statement from a shared line. Strips an orphan separator
/// at the seam and normalizes the junction to a single space.
fn remove_partial(line: &str, needle: &str) -> Option<String> {
    let pos = line.find(needle)?;
    let before = &line[..pos];
    let after = &line[pos + needle.len()..];
    Some(join_remainders(line, before, after))
}

/// Drop a multi-line statement whose first or last line is shared with other
/// code. The boundary remainders collapse onto one line; interior lines
/// belong entirely to the statement and are discarded.
fn remove_partial_span(first_line: &str, last_line: &str, raw_text: &str) -> Option<String> {
    let head = raw_text.lines().next()?;
    let tail = raw_text.lines().last()?;
    let pos = first_line.find(head)?;
    let tail_pos = last_line.find(tail)?;
    let before = &first_line[..pos];
    let after = &last_line[tail_pos + tail.len()..];
    Some(join_remainders(first_line, before, after))
}

fn join_remainders(source_line: &str, before: &str, after: &str) -> String {
    let mut b = before.trim_end().to_string();
    let mut a = after.trim_start().to_string();
    if b.ends_with(',') {
        b.pop();
        b.truncate(b.trim_end().len());
    } else if let Some(stripped) = a.strip_prefix([',', ';']) {
        a = stripped.trim_start().to_string();
    }

    if b.trim().is_empty() {
        let indent: String = source_line
            .chars()
            .take_while(|c| c.is_whitespace())
            .collect();
        format!("{indent}{a}")
    } else if a.is_empty() {
        b
    } else {
        format!("{b} {a}")
    }
}

/// Comment replacement text: the first string literal of the artifact if it
/// has one, otherwise its first line, truncated to 80 characters.
fn comment_line(original_line: &str, raw_text: &str) -> String {
    let indent: String = original_line
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();

    let mut content = extract_string_literal(raw_text)
        .unwrap_or_else(|| raw_text.lines().next().unwrap_or("").trim().to_string());
    content = unwrap_placeholders(&content);

    if content.chars().count() > 80 {
        content = content.chars().take(80).collect();
        content.push('…');
    }

    format!("{indent}// {}", content.trim())
}

/// Strip `${` / `}` wrappers from template placeholders, keeping the
/// expression inside. Braces that are not part of a placeholder stay.
fn unwrap_placeholders(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            depth += 1;
        } else if c == '}' && depth > 0 {
            depth -= 1;
        } else {
            out.push(c);
        }
    }
    out
}

fn extract_string_literal(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let open = text.find(['\'', '"', '`'])?;
    let quote = bytes[open];

    let mut out = String::new();
    let mut escaped = false;
    for &b in &bytes[open + 1..] {
        if escaped {
            out.push(b as char);
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            _ if b == quote => return Some(out),
            _ => out.push(b as char),
        }
    }
    None
}

/// Whole-document blank compaction: a blank line survives only between two
/// non-blank neighbors. Returns how many lines were dropped.
fn compact_blanks(lines: &mut Vec<String>) -> usize {
    let original = lines.len();
    let keep: Vec<bool> = (0..lines.len())
        .map(|i| {
            if !lines[i].trim().is_empty() {
                return true;
            }
            let prev_solid = i > 0 && !lines[i - 1].trim().is_empty();
            let next_solid = i + 1 < lines.len() && !lines[i + 1].trim().is_empty();
            prev_solid && next_solid
        })
        .collect();

    let mut idx = 0usize;
    lines.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
    original - lines.len()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::core::policy::{CleanOptions, DecisionPolicy};
    use crate::core::scan::ArtifactScanner;

    fn rewrite(src: &str, options: CleanOptions) -> (SourceDocument, RewriteReport) {
        let path = PathBuf::from("fixture.js");
        let mut doc = SourceDocument::from_text(&path, src);
        let scanner = ArtifactScanner::new().unwrap();
        let artifacts = scanner.scan(&path, &doc.lines);
        let total = artifacts.len();
        let plan = DecisionPolicy::new(options).plan(artifacts);
        doc.mark_planned();
        let report = LineRewriter::apply(&mut doc, &plan).unwrap();
        assert_eq!(report.counts.dispositions(), total);
        (doc, report)
    }

    #[test]
    fn removes_log_line_and_keeps_the_rest() {
        let (doc, report) = rewrite(
            "function f() {\n  console.log(\"debug value:\", x);\n  return x;\n}\n",
            CleanOptions::default(),
        );
        assert_eq!(doc.render(), "function f() {\n  return x;\n}\n");
        assert_eq!(report.counts.removed, 1);
        assert_eq!(report.counts.lines_removed, 1);
    }

    #[test]
    fn descending_application_keeps_line_numbers_valid() {
        let (doc, report) = rewrite(
            "debugger;\nconst a = 1;\nconsole.log('one');\nconst b = 2;\nconsole.log('two');\n",
            CleanOptions::default(),
        );
        assert_eq!(doc.render(), "const a = 1;\nconst b = 2;\n");
        assert_eq!(report.counts.removed, 3);
    }

    #[test]
    fn partial_removal_keeps_sibling_statement() {
        let (doc, _) = rewrite("doWork(); console.log('x');\n", CleanOptions::default());
        assert_eq!(doc.render(), "doWork();\n");
    }

    #[test]
    fn multiline_partial_removal_keeps_trailing_sibling() {
        let (doc, report) = rewrite(
            "console.log(\n  'debug'); doImportantWork();\n",
            CleanOptions::default(),
        );
        assert_eq!(doc.render(), "doImportantWork();\n");
        assert_eq!(report.counts.removed, 1);
        assert_eq!(report.counts.lines_removed, 1);
    }

    #[test]
    fn multiline_partial_removal_keeps_leading_sibling() {
        let (doc, _) = rewrite(
            "doImportantWork(); console.log(\n  'debug',\n  x,\n);\n",
            CleanOptions::default(),
        );
        assert_eq!(doc.render(), "doImportantWork();\n");
    }

    #[test]
    fn block_removal_takes_the_whole_conditional() {
        let (doc, report) = rewrite(
            "if (DEBUG) {\n  console.log('a');\n  console.log('b');\n}\nconst x = 1;\n",
            CleanOptions::default(),
        );
        assert_eq!(doc.render(), "const x = 1;\n");
        assert_eq!(report.counts.removed, 1);
        assert_eq!(report.counts.lines_removed, 4);
    }

    #[test]
    fn comment_conversion_keeps_the_message() {
        let options = CleanOptions {
            convert_important_to_comments: true,
            ..CleanOptions::default()
        };
        let (doc, report) = rewrite("  console.log('TODO: wire up retries');\n", options);
        assert_eq!(doc.render(), "  // TODO: wire up retries\n");
        assert_eq!(report.counts.commented, 1);
    }

    #[test]
    fn note_marker_converts_to_comment_when_opted_in() {
        let options = CleanOptions {
            convert_important_to_comments: true,
            ..CleanOptions::default()
        };
        let (doc, report) = rewrite(
            "console.log('NOTE: retries are disabled in staging');\n",
            options,
        );
        assert_eq!(doc.render(), "// NOTE: retries are disabled in staging\n");
        assert_eq!(report.counts.commented, 1);
        assert_eq!(report.counts.removed, 0);
    }

    #[test]
    fn comment_conversion_unwraps_placeholders_and_keeps_literal_braces() {
        let options = CleanOptions {
            convert_important_to_comments: true,
            ..CleanOptions::default()
        };
        let (doc, _) = rewrite("console.log(`TODO: saved ${count} items {ok}`);\n", options);
        assert_eq!(doc.render(), "// TODO: saved count items {ok}\n");
    }

    #[test]
    fn compaction_drops_orphaned_blanks() {
        let (doc, _) = rewrite(
            "const a = 1;\n\nconsole.log('x');\n\nconst b = 2;\n",
            CleanOptions::default(),
        );
        // Removing the middle statement leaves consecutive blanks; only a
        // single separating blank would survive between non-blank lines.
        assert_eq!(doc.render(), "const a = 1;\nconst b = 2;\n");
    }

    #[test]
    fn crlf_documents_render_with_crlf() {
        let (doc, _) = rewrite("const a = 1;\r\nconsole.log('x');\r\nconst b = 2;\r\n", CleanOptions::default());
        assert_eq!(doc.render(), "const a = 1;\r\nconst b = 2;\r\n");
    }

    #[test]
    fn rewriter_refuses_unplanned_documents() {
        let path = PathBuf::from("fixture.js");
        let mut doc = SourceDocument::from_text(&path, "const a = 1;\n");
        let err = LineRewriter::apply(&mut doc, &ActionPlan::default()).unwrap_err();
        assert!(err.to_string().contains("expected Planned"));
    }

    #[test]
    fn preserved_artifacts_leave_the_document_untouched() {
        let src = "try {\n  go();\n} catch (err) {\n  console.error('Failed:', err);\n}\n";
        let (doc, report) = rewrite(src, CleanOptions::default());
        assert_eq!(doc.render(), src);
        assert_eq!(report.counts.preserved, 1);
        assert_eq!(report.counts.removed, 0);
    }
}
