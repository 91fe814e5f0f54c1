//! Artifact scanner: lexically locates debugging/development constructs.
//!
//! Works on the line level with small explicit state machines for call and
//! block extents. No grammar-level parsing: a finding is a line range plus
//! classification metadata, and the rewriter treats it as such.

use std::path::Path;

use anyhow::Result;
use memchr::memmem::Finder;
use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::core::classify::{
    BREAKPOINT_RADIUS, ContextClassifier, ContextInfo, ContextType, DEFAULT_RADIUS,
    StructuralFlags,
};

/// What kind of artifact a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactCategory {
    Logging,
    Breakpoint,
    Dialog,
    DevConditional,
    DebugComment,
    DevImport,
    TestFunction,
}

impl ArtifactCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactCategory::Logging => "logging",
            ArtifactCategory::Breakpoint => "breakpoint",
            ArtifactCategory::Dialog => "dialog",
            ArtifactCategory::DevConditional => "dev-conditional",
            ArtifactCategory::DebugComment => "debug-comment",
            ArtifactCategory::DevImport => "dev-import",
            ArtifactCategory::TestFunction => "test-function",
        }
    }
}

/// Severity of a logging call, inferred from the method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallSeverity {
    Error,
    Warn,
    Info,
}

/// Importance bands derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceLevel {
    Low,
    Normal,
    Important,
    Critical,
}

/// Composite importance: severity + context + content keywords.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Importance {
    pub score: i32,
    pub level: ImportanceLevel,
    pub should_preserve: bool,
}

impl Importance {
    pub fn from_score(score: i32) -> Self {
        let level = if score >= 4 {
            ImportanceLevel::Critical
        } else if score >= 2 {
            ImportanceLevel::Important
        } else if score >= 0 {
            ImportanceLevel::Normal
        } else {
            ImportanceLevel::Low
        };
        Self {
            score,
            level,
            should_preserve: score >= 2,
        }
    }
}

/// Import-specific analysis attached to dev-import findings.
#[derive(Debug, Clone, Serialize)]
pub struct ImportInfo {
    pub module: String,
    pub symbols: Vec<String>,
    /// Uses of the imported symbols elsewhere in the file.
    pub usage_count: usize,
    /// How confident the scanner is that the module is development-only.
    pub confidence: f32,
}

/// Function-specific analysis attached to test/mock-function findings.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    pub body_lines: usize,
    pub branch_count: usize,
    pub has_utility_code: bool,
    pub touches_globals: bool,
}

/// The single action the rewriter will take for an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Preserve,
    Comment,
    RemoveLine,
    RemovePartial,
    RemoveBlock,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Preserve => "preserve",
            Action::Comment => "comment",
            Action::RemoveLine => "remove-line",
            Action::RemovePartial => "remove-partial",
            Action::RemoveBlock => "remove-block",
        }
    }
}

/// One located finding. Lines are 1-based and the range is inclusive.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub category: ArtifactCategory,
    pub start_line: usize,
    pub end_line: usize,
    /// For statement findings the matched statement text; for blocks the
    /// joined source of the whole extent.
    pub raw_text: String,
    pub context: ContextInfo,
    pub structure: StructuralFlags,
    pub importance: Importance,
    pub severity: CallSeverity,
    /// The call result feeds surrounding logic (assignment, condition, ...).
    pub functional_purpose: bool,
    /// Content carries a TODO-style marker worth keeping as a comment.
    pub keep_as_comment: bool,
    /// Unrelated code shares the start line with the finding.
    pub shares_line: bool,
    /// Mechanical removal shape the rewriter would use; the policy decides
    /// whether it actually happens.
    pub removal_shape: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionInfo>,
}

const LOGGING_CALLS: &[(&str, CallSeverity)] = &[
    ("console.error", CallSeverity::Error),
    ("console.warn", CallSeverity::Warn),
    ("console.log", CallSeverity::Info),
    ("console.info", CallSeverity::Info),
    ("console.debug", CallSeverity::Info),
    ("console.trace", CallSeverity::Info),
    ("console.table", CallSeverity::Info),
    ("console.dir", CallSeverity::Info),
];

// Longest-first so window.* wins over the bare form at the same site.
const DIALOG_CALLS: &[&str] = &[
    "window.alert",
    "window.confirm",
    "window.prompt",
    "alert",
    "confirm",
    "prompt",
];

const DEBUG_COMMENT_KEYWORDS: &[&str] = &[
    "debug",
    "console.log",
    "fixme",
    "todo",
    "hack",
    "temporary",
    "remove me",
    "xxx",
    "commented out",
];

// Comments carrying these are tool directives or real documentation.
const FUNCTIONAL_COMMENT_KEYWORDS: &[&str] = &[
    "eslint",
    "prettier",
    "biome",
    "ts-",
    "license",
    "copyright",
    "important",
    "@preserve",
];

const PRODUCTION_ALLOWLIST: &[&str] = &[
    "react", "vue", "angular", "svelte", "next", "express", "lodash", "axios", "moment", "dayjs",
    "rxjs", "redux", "jquery", "uuid", "classnames", "zod",
];

const DEV_LIBRARIES: &[(&str, f32)] = &[
    ("@faker-js/faker", 0.95),
    ("faker", 0.9),
    ("jest", 0.95),
    ("mocha", 0.95),
    ("chai", 0.95),
    ("sinon", 0.9),
    ("enzyme", 0.9),
    ("supertest", 0.9),
    ("@testing-library", 0.95),
    ("nock", 0.9),
    ("msw", 0.9),
    ("miragejs", 0.9),
    ("json-server", 0.85),
    ("redux-logger", 0.85),
    ("why-did-you-render", 0.9),
    ("debug", 0.8),
];

const BUILD_TOOLS: &[&str] = &["webpack", "rollup", "vite", "babel", "gulp", "grunt"];

const HELPER_NAME_PREFIXES: &[&str] = &["test", "mock", "debug", "stub", "fake", "dummy"];

const HELPER_NAME_SUFFIXES: &[&str] = &[
    "Helper", "Util", "Utils", "Setup", "Teardown", "Fixture", "Factory", "Mock", "Stub",
];

/// Complexity ceilings past which a helper is preserved instead of removed.
pub const MAX_REMOVABLE_BODY_LINES: usize = 50;
pub const MAX_REMOVABLE_BRANCHES: usize = 10;

struct CallPattern {
    name: &'static str,
    finder: Finder<'static>,
    severity: CallSeverity,
}

/// The per-file scanner. Construct once, reuse across a batch.
pub struct ArtifactScanner {
    classifier: ContextClassifier,
    logging: Vec<CallPattern>,
    dialogs: Vec<(&'static str, Finder<'static>)>,
    breakpoint_line: Regex,
    breakpoint_word: Regex,
    import_head: Regex,
    require_head: Regex,
    dev_cond: Regex,
    node_env_cond: Regex,
    func_decl: Regex,
    arrow_decl: Regex,
}

impl ArtifactScanner {
    pub fn new() -> Result<Self> {
        let logging = LOGGING_CALLS
            .iter()
            .map(|&(name, severity)| CallPattern {
                name,
                finder: Finder::new(name),
                severity,
            })
            .collect();
        let dialogs = DIALOG_CALLS
            .iter()
            .map(|&name| (name, Finder::new(name)))
            .collect();

        Ok(Self {
            classifier: ContextClassifier::new()?,
            logging,
            dialogs,
            breakpoint_line: Regex::new(r"^\s*debugger\s*;?\s*$")?,
            breakpoint_word: Regex::new(r"\bdebugger\s*;?")?,
            import_head: Regex::new(r#"^\s*import\s+(?:(.+?)\s+from\s+)?['"]([^'"]+)['"]"#)?,
            require_head: Regex::new(
                r#"^\s*(?:const|let|var)\s+(.+?)\s*=\s*require\(\s*['"]([^'"]+)['"]"#,
            )?,
            dev_cond: Regex::new(
                r"^\s*if\s*\(\s*(?:window\.)?(?:DEBUG|__DEV__|isDev(?:Mode)?|debugMode|debug)\b",
            )?,
            node_env_cond: Regex::new(
                r#"^\s*if\s*\(\s*process\.env\.NODE_ENV\s*[!=]==?\s*['"](?:development|dev)['"]"#,
            )?,
            func_decl: Regex::new(
                r"^\s*(?:export\s+)?(?:async\s+)?function\s+([A-Za-z_$][\w$]*)\s*\(",
            )?,
            arrow_decl: Regex::new(
                r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?(?:function\b|\([^)]*\)\s*=>\s*\{|[A-Za-z_$][\w$]*\s*=>\s*\{)",
            )?,
        })
    }

    /// Scan every line and return findings in ascending line order.
    ///
    /// Lines consumed by a block finding are skipped, so findings never
    /// overlap and the rewriter's descending application stays index-stable.
    pub fn scan(&self, path: &Path, lines: &[String]) -> Vec<Artifact> {
        let mut out = Vec::new();
        let mut i = 0usize;

        while i < lines.len() {
            let next = self
                .scan_comment(lines, i)
                .or_else(|| self.scan_import(lines, i))
                .or_else(|| self.scan_dev_conditional(lines, i))
                .or_else(|| self.scan_test_function(lines, i))
                .or_else(|| self.scan_breakpoint(lines, i))
                .or_else(|| self.scan_call_artifact(lines, i));

            match next {
                Some(artifact) => {
                    trace!(
                        path = %path.display(),
                        category = artifact.category.label(),
                        line = artifact.start_line,
                        "artifact located"
                    );
                    let resume = artifact.end_line; // 1-based inclusive
                    out.push(artifact);
                    i = resume; // next 0-based index after the extent
                }
                None => i += 1,
            }
        }

        out
    }

    fn base_artifact(
        &self,
        category: ArtifactCategory,
        lines: &[String],
        start_idx: usize,
        end_idx: usize,
        raw_text: String,
        severity: CallSeverity,
        radius: usize,
    ) -> Artifact {
        let context = self.classifier.classify(lines, start_idx, radius);
        let structure = self.classifier.structural_flags(lines, start_idx);
        let importance = score_importance(severity, context.context_type, &raw_text);

        Artifact {
            category,
            start_line: start_idx + 1,
            end_line: end_idx + 1,
            raw_text,
            context,
            structure,
            importance,
            severity,
            functional_purpose: false,
            keep_as_comment: false,
            shares_line: false,
            removal_shape: if end_idx > start_idx {
                Action::RemoveBlock
            } else {
                Action::RemoveLine
            },
            import: None,
            function: None,
        }
    }

    fn scan_comment(&self, lines: &[String], i: usize) -> Option<Artifact> {
        let trimmed = lines[i].trim_start();
        if !trimmed.starts_with("//") {
            return None;
        }
        let body = trimmed.trim_start_matches('/').to_lowercase();

        if FUNCTIONAL_COMMENT_KEYWORDS.iter().any(|k| body.contains(k)) {
            return None;
        }
        if !DEBUG_COMMENT_KEYWORDS.iter().any(|k| body.contains(k)) {
            return None;
        }

        let mut artifact = self.base_artifact(
            ArtifactCategory::DebugComment,
            lines,
            i,
            i,
            trimmed.to_string(),
            CallSeverity::Info,
            DEFAULT_RADIUS,
        );
        artifact.keep_as_comment =
            body.contains("todo") || body.contains("fixme") || body.contains("note");
        Some(artifact)
    }

    fn scan_import(&self, lines: &[String], i: usize) -> Option<Artifact> {
        let trimmed = lines[i].trim_start();
        let is_import = trimmed.starts_with("import ") || trimmed.starts_with("import{");
        let is_require = self.require_head.is_match(&lines[i]);
        if !is_import && !is_require {
            return None;
        }

        // Multi-line import clauses are joined before matching.
        let mut end_idx = i;
        let mut joined = lines[i].clone();
        if is_import && !self.import_head.is_match(&joined) {
            for (j, line) in lines.iter().enumerate().skip(i + 1).take(10) {
                joined.push(' ');
                joined.push_str(line.trim());
                end_idx = j;
                if self.import_head.is_match(&joined) {
                    break;
                }
            }
        }

        let re = if is_import { &self.import_head } else { &self.require_head };
        let caps = re.captures(&joined)?;
        let module = caps.get(2)?.as_str().to_string();
        let symbols = caps
            .get(1)
            .map(|m| parse_import_symbols(m.as_str()))
            .unwrap_or_default();

        let confidence = dev_import_confidence(&module)?;
        let usage_count = symbols
            .iter()
            .map(|sym| count_symbol_uses(lines, sym, i, end_idx))
            .sum();

        let raw_text = lines[i..=end_idx].join("\n");
        let mut artifact = self.base_artifact(
            ArtifactCategory::DevImport,
            lines,
            i,
            end_idx,
            raw_text,
            CallSeverity::Info,
            DEFAULT_RADIUS,
        );
        artifact.import = Some(ImportInfo {
            module,
            symbols,
            usage_count,
            confidence,
        });
        Some(artifact)
    }

    fn scan_dev_conditional(&self, lines: &[String], i: usize) -> Option<Artifact> {
        if !self.dev_cond.is_match(&lines[i]) && !self.node_env_cond.is_match(&lines[i]) {
            return None;
        }

        let end_idx = if lines[i].contains('{') {
            scan_block(lines, i)?
        } else if lines[i].trim_end().ends_with(')') {
            // Braceless form: the guarded statement sits on the next line.
            (i + 1).min(lines.len() - 1)
        } else {
            i
        };

        let raw_text = lines[i..=end_idx].join("\n");
        let mut artifact = self.base_artifact(
            ArtifactCategory::DevConditional,
            lines,
            i,
            end_idx,
            raw_text,
            CallSeverity::Info,
            DEFAULT_RADIUS,
        );
        artifact.removal_shape = Action::RemoveBlock;
        Some(artifact)
    }

    fn scan_test_function(&self, lines: &[String], i: usize) -> Option<Artifact> {
        let name = self
            .func_decl
            .captures(&lines[i])
            .or_else(|| self.arrow_decl.captures(&lines[i]))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())?;

        if !is_dev_helper_name(&name) {
            return None;
        }

        let end_idx = scan_block(lines, i)?;
        let body = &lines[i..=end_idx];
        let function = analyze_function(&name, body);

        let raw_text = body.join("\n");
        let mut artifact = self.base_artifact(
            ArtifactCategory::TestFunction,
            lines,
            i,
            end_idx,
            raw_text,
            CallSeverity::Info,
            DEFAULT_RADIUS,
        );
        artifact.removal_shape = Action::RemoveBlock;
        artifact.function = Some(function);
        Some(artifact)
    }

    fn scan_breakpoint(&self, lines: &[String], i: usize) -> Option<Artifact> {
        if self.breakpoint_line.is_match(&lines[i]) {
            return Some(self.base_artifact(
                ArtifactCategory::Breakpoint,
                lines,
                i,
                i,
                lines[i].trim().to_string(),
                CallSeverity::Info,
                BREAKPOINT_RADIUS,
            ));
        }

        let hit = self.breakpoint_word.find(&lines[i])?;
        // Not inside a comment or string (cheap check: skip commented lines).
        if lines[i].trim_start().starts_with("//") {
            return None;
        }
        let mut artifact = self.base_artifact(
            ArtifactCategory::Breakpoint,
            lines,
            i,
            i,
            hit.as_str().trim().to_string(),
            CallSeverity::Info,
            BREAKPOINT_RADIUS,
        );
        artifact.shares_line = true;
        artifact.removal_shape = Action::RemovePartial;
        Some(artifact)
    }

    /// Logging and dialog calls share the extraction path; the pattern table
    /// decides the category.
    fn scan_call_artifact(&self, lines: &[String], i: usize) -> Option<Artifact> {
        let line = &lines[i];
        if line.trim_start().starts_with("//") {
            return None;
        }

        // Earliest match wins; dialogs use longest-at-position precedence.
        let mut best: Option<(usize, &'static str, CallSeverity, ArtifactCategory)> = None;
        for pat in &self.logging {
            if let Some(pos) = pat.finder.find(line.as_bytes()) {
                if call_site_boundary(line, pos, false) && is_better_site(&best, pos, pat.name) {
                    best = Some((pos, pat.name, pat.severity, ArtifactCategory::Logging));
                }
            }
        }
        for (name, finder) in &self.dialogs {
            let bare = !name.contains('.');
            if let Some(pos) = finder.find(line.as_bytes()) {
                if call_site_boundary(line, pos, bare) && is_better_site(&best, pos, name) {
                    best = Some((pos, name, CallSeverity::Info, ArtifactCategory::Dialog));
                }
            }
        }
        let (pos, name, severity, category) = best?;

        // The name must be a call: optional whitespace then '('.
        let after = &line[pos + name.len()..];
        let ws = after.len() - after.trim_start().len();
        if !after.trim_start().starts_with('(') {
            return None;
        }
        let open_col = pos + name.len() + ws;

        let (end_idx, end_col) = scan_call(lines, i, open_col)?;

        // Statement text: the call plus a directly trailing semicolon.
        let mut stmt_end = end_col;
        let tail = &lines[end_idx][end_col..];
        if tail.starts_with(';') {
            stmt_end += 1;
        }
        let raw_text = if end_idx == i {
            line[pos..stmt_end].to_string()
        } else {
            let mut t = line[pos..].to_string();
            for l in &lines[i + 1..end_idx] {
                t.push('\n');
                t.push_str(l);
            }
            t.push('\n');
            t.push_str(&lines[end_idx][..stmt_end]);
            t
        };

        let prefix = &line[..pos];
        let tail_shares = !lines[end_idx][stmt_end..].trim().is_empty();
        let shares_line = !prefix.trim().is_empty() || tail_shares;

        let mut artifact =
            self.base_artifact(category, lines, i, end_idx, raw_text, severity, DEFAULT_RADIUS);
        artifact.shares_line = shares_line;
        artifact.functional_purpose = result_is_used(prefix);
        artifact.keep_as_comment = {
            let lower = artifact.raw_text.to_lowercase();
            lower.contains("todo") || lower.contains("fixme") || lower.contains("note")
        };
        // A shared boundary line forces partial surgery even for multi-line
        // calls; draining the block would take the sibling statement with it.
        artifact.removal_shape = if shares_line {
            Action::RemovePartial
        } else if end_idx > i {
            Action::RemoveBlock
        } else {
            Action::RemoveLine
        };
        Some(artifact)
    }
}

/// Importance score: severity weight + context weight + content keywords.
pub fn score_importance(severity: CallSeverity, context: ContextType, text: &str) -> Importance {
    let mut score = match severity {
        CallSeverity::Error => 3,
        CallSeverity::Warn => 1,
        CallSeverity::Info => 0,
    };
    score += match context {
        ContextType::ErrorHandling => 3,
        ContextType::Testing => -2,
        ContextType::Debugging => -1,
        ContextType::Development | ContextType::General => 0,
    };

    let lower = text.to_lowercase();
    if lower.contains("error") || lower.contains("fail") {
        score += 2;
    } else if lower.contains("success") {
        score += 1;
    }
    if lower.contains("debug") || lower.contains("test") {
        score -= 2;
    }

    Importance::from_score(score)
}

/// Quote-and-paren-aware forward scan from an opening parenthesis.
///
/// Tracks single/double/backtick quoting, escapes, and `${...}` template
/// interpolation so a `)` inside a string argument never terminates the call
/// early. Returns the 0-based end line and the byte column just past the
/// closing parenthesis, or `None` for an unterminated call.
pub fn scan_call(lines: &[String], line_idx: usize, open_col: usize) -> Option<(usize, usize)> {
    #[derive(Clone, Copy, PartialEq)]
    enum Ctx {
        Code { braces: usize },
        Single,
        Double,
        Template,
    }

    let mut stack = vec![Ctx::Code { braces: 0 }];
    let mut depth = 0usize;
    let mut escaped = false;

    for (li, line) in lines.iter().enumerate().skip(line_idx) {
        let bytes = line.as_bytes();
        let mut j = if li == line_idx { open_col } else { 0 };

        while j < bytes.len() {
            let b = bytes[j];
            if escaped {
                escaped = false;
                j += 1;
                continue;
            }
            let top = stack.len() - 1;
            match stack[top] {
                Ctx::Code { braces } => match b {
                    b'\'' => stack.push(Ctx::Single),
                    b'"' => stack.push(Ctx::Double),
                    b'`' => stack.push(Ctx::Template),
                    b'(' => depth += 1,
                    b')' => {
                        depth = depth.checked_sub(1)?;
                        if depth == 0 {
                            return Some((li, j + 1));
                        }
                    }
                    b'{' => stack[top] = Ctx::Code { braces: braces + 1 },
                    b'}' => {
                        if braces > 0 {
                            stack[top] = Ctx::Code { braces: braces - 1 };
                        } else if top > 0 {
                            // Closing a `${...}` interpolation frame.
                            stack.pop();
                        }
                    }
                    _ => {}
                },
                Ctx::Single => match b {
                    b'\\' => escaped = true,
                    b'\'' => {
                        stack.pop();
                    }
                    _ => {}
                },
                Ctx::Double => match b {
                    b'\\' => escaped = true,
                    b'"' => {
                        stack.pop();
                    }
                    _ => {}
                },
                Ctx::Template => match b {
                    b'\\' => escaped = true,
                    b'`' => {
                        stack.pop();
                    }
                    b'$' if bytes.get(j + 1) == Some(&b'{') => {
                        stack.push(Ctx::Code { braces: 0 });
                        j += 1;
                    }
                    _ => {}
                },
            }
            j += 1;
        }
        // Plain quotes do not span lines; template literals do.
        while matches!(stack.last(), Some(Ctx::Single | Ctx::Double)) {
            stack.pop();
        }
        escaped = false;
    }

    None
}

/// Brace-matched block extent starting at the declaration line. Returns the
/// 0-based index of the line holding the closing brace.
pub fn scan_block(lines: &[String], start_idx: usize) -> Option<usize> {
    #[derive(PartialEq)]
    enum Ctx {
        Code,
        Single,
        Double,
        Template,
    }

    let mut ctx = Ctx::Code;
    let mut depth = 0usize;
    let mut opened = false;
    let mut escaped = false;

    for (li, line) in lines.iter().enumerate().skip(start_idx) {
        let bytes = line.as_bytes();
        let mut j = 0usize;
        while j < bytes.len() {
            let b = bytes[j];
            if escaped {
                escaped = false;
                j += 1;
                continue;
            }
            match ctx {
                Ctx::Code => match b {
                    b'\'' => ctx = Ctx::Single,
                    b'"' => ctx = Ctx::Double,
                    b'`' => ctx = Ctx::Template,
                    b'/' if bytes.get(j + 1) == Some(&b'/') => break, // line comment
                    b'{' => {
                        depth += 1;
                        opened = true;
                    }
                    b'}' => {
                        depth = depth.checked_sub(1)?;
                        if opened && depth == 0 {
                            return Some(li);
                        }
                    }
                    _ => {}
                },
                Ctx::Single => match b {
                    b'\\' => escaped = true,
                    b'\'' => ctx = Ctx::Code,
                    _ => {}
                },
                Ctx::Double => match b {
                    b'\\' => escaped = true,
                    b'"' => ctx = Ctx::Code,
                    _ => {}
                },
                Ctx::Template => match b {
                    b'\\' => escaped = true,
                    b'`' => ctx = Ctx::Code,
                    _ => {}
                },
            }
            j += 1;
        }
        if matches!(ctx, Ctx::Single | Ctx::Double) {
            ctx = Ctx::Code;
        }
        escaped = false;
    }

    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// A pattern hit is a call site only when it is not a suffix of a longer
/// identifier. Bare dialog names additionally reject a preceding dot, so
/// `window.alert` is matched once by the longer pattern.
fn call_site_boundary(line: &str, pos: usize, reject_dot: bool) -> bool {
    if pos == 0 {
        return true;
    }
    let prev = line.as_bytes()[pos - 1];
    if is_ident_byte(prev) {
        return false;
    }
    !(reject_dot && prev == b'.')
}

fn is_better_site(
    best: &Option<(usize, &'static str, CallSeverity, ArtifactCategory)>,
    pos: usize,
    name: &str,
) -> bool {
    match best {
        None => true,
        Some((bpos, bname, _, _)) => pos < *bpos || (pos == *bpos && name.len() > bname.len()),
    }
}

/// The call result feeds surrounding logic when the preceding text ends in
/// an operator, assignment, or flow keyword.
fn result_is_used(prefix: &str) -> bool {
    let p = prefix.trim_end();
    if p.is_empty() {
        return false;
    }
    p.ends_with('=')
        || p.ends_with('(')
        || p.ends_with('!')
        || p.ends_with("&&")
        || p.ends_with("||")
        || p.ends_with('?')
        || p.ends_with(':')
        || p.ends_with(',')
        || p.ends_with("return")
        || p.ends_with("if")
        || p.ends_with("while")
}

fn parse_import_symbols(clause: &str) -> Vec<String> {
    clause
        .replace(['{', '}'], ",")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "*")
        .map(|s| {
            // `orig as alias` binds the alias; `* as ns` binds the namespace.
            match s.rsplit_once(" as ") {
                Some((_, alias)) => alias.trim().to_string(),
                None => s.to_string(),
            }
        })
        .filter(|s| s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'))
        .collect()
}

/// `None` means the module is not a development dependency.
fn dev_import_confidence(module: &str) -> Option<f32> {
    let matches_name = |name: &str| module == name || module.starts_with(&format!("{name}/"));

    if PRODUCTION_ALLOWLIST.iter().any(|n| matches_name(n)) {
        return None;
    }
    if let Some(&(_, conf)) = DEV_LIBRARIES.iter().find(|(n, _)| matches_name(n)) {
        return Some(conf);
    }

    let lower = module.to_lowercase();
    if lower.contains("test") || lower.contains("spec") || lower.contains("mock") {
        return Some(0.8);
    }
    if lower.contains("debug") {
        return Some(0.7);
    }
    if lower.contains("lint") || lower.contains("prettier") || lower.contains("format") {
        return Some(0.6);
    }
    if BUILD_TOOLS.iter().any(|n| lower.contains(n)) {
        return Some(0.6);
    }
    if lower.contains("dev") {
        return Some(0.6);
    }
    None
}

/// Word-boundary uses of `symbol` outside the import extent itself.
fn count_symbol_uses(lines: &[String], symbol: &str, start_idx: usize, end_idx: usize) -> usize {
    if symbol.is_empty() {
        return 0;
    }
    let finder = Finder::new(symbol);
    let mut count = 0usize;

    for (i, line) in lines.iter().enumerate() {
        if (start_idx..=end_idx).contains(&i) {
            continue;
        }
        let bytes = line.as_bytes();
        let mut at = 0usize;
        while let Some(pos) = finder.find(&bytes[at..]) {
            let abs = at + pos;
            let before_ok = abs == 0 || !is_ident_byte(bytes[abs - 1]);
            let after = abs + symbol.len();
            let after_ok = after >= bytes.len() || !is_ident_byte(bytes[after]);
            if before_ok && after_ok {
                count += 1;
            }
            at = abs + symbol.len().max(1);
        }
    }
    count
}

fn is_dev_helper_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    for prefix in HELPER_NAME_PREFIXES {
        if lower.starts_with(prefix) && name.len() > prefix.len() {
            // Camel or snake boundary after the prefix, so `testimonial`
            // does not count as a test helper.
            let next = name.as_bytes()[prefix.len()];
            if next.is_ascii_uppercase() || next == b'_' {
                return true;
            }
        }
    }
    HELPER_NAME_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn analyze_function(name: &str, extent: &[String]) -> FunctionInfo {
    let body = if extent.len() > 2 {
        &extent[1..extent.len() - 1]
    } else {
        &extent[..0]
    };

    let mut branch_count = 0usize;
    let mut has_utility_code = false;
    let mut touches_globals = false;

    for line in body {
        let t = line.trim_start();
        for token in ["if ", "if(", "else", "for ", "for(", "while", "switch", "case ", "catch"] {
            branch_count += line.matches(token).count();
        }
        if (t.starts_with("return ") && t.trim_end() != "return;")
            || t.starts_with("class ")
            || t.starts_with("export ")
            || t.starts_with("function ")
            || is_constant_decl(t)
        {
            has_utility_code = true;
        }
        if line.contains("window.")
            || line.contains("global.")
            || line.contains("globalThis.")
            || line.contains("process.env")
        {
            touches_globals = true;
        }
    }

    FunctionInfo {
        name: name.to_string(),
        body_lines: extent.len(),
        branch_count,
        has_utility_code,
        touches_globals,
    }
}

fn is_constant_decl(trimmed: &str) -> bool {
    let rest = trimmed
        .strip_prefix("export ")
        .unwrap_or(trimmed)
        .strip_prefix("const ");
    match rest {
        Some(tail) => {
            let ident: String = tail
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            !ident.is_empty() && ident.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    }
}
