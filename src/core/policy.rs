//! Decision policy: configuration + finding -> exactly one action.
//!
//! The policy is the only place that turns scanner metadata into a rewrite
//! action, and anything it cannot confidently decide falls back to
//! `Preserve`. Deleting user code is the one mistake this tool must not make.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::scan::{
    Action, Artifact, ArtifactCategory, CallSeverity, MAX_REMOVABLE_BODY_LINES,
    MAX_REMOVABLE_BRANCHES,
};
use crate::core::classify::ContextType;

/// Per-category enable switches. Everything on by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CategoryToggles {
    pub logging: bool,
    pub breakpoints: bool,
    pub dialogs: bool,
    pub dev_conditionals: bool,
    pub debug_comments: bool,
    pub dev_imports: bool,
    pub test_functions: bool,
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            logging: true,
            breakpoints: true,
            dialogs: true,
            dev_conditionals: true,
            debug_comments: true,
            dev_imports: true,
            test_functions: true,
        }
    }
}

impl CategoryToggles {
    pub fn enabled(&self, category: ArtifactCategory) -> bool {
        match category {
            ArtifactCategory::Logging => self.logging,
            ArtifactCategory::Breakpoint => self.breakpoints,
            ArtifactCategory::Dialog => self.dialogs,
            ArtifactCategory::DevConditional => self.dev_conditionals,
            ArtifactCategory::DebugComment => self.debug_comments,
            ArtifactCategory::DevImport => self.dev_imports,
            ArtifactCategory::TestFunction => self.test_functions,
        }
    }
}

/// Explicit options for a cleaning run. No global state: callers construct
/// one (from file config plus CLI flags) and pass it down.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CleanOptions {
    /// Snapshot every file before its first write.
    pub create_backup: bool,
    /// Keep error-severity logging inside error-handling context.
    pub preserve_error_handling: bool,
    /// Turn marker-bearing artifacts into comments instead of deleting.
    pub convert_important_to_comments: bool,
    /// Only remove imports whose symbols are unused in the file.
    pub remove_unused_imports_only: bool,
    /// Minimum dev-import confidence required to touch an import.
    pub min_confidence: f32,
    pub categories: CategoryToggles,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            preserve_error_handling: true,
            convert_important_to_comments: false,
            remove_unused_imports_only: true,
            min_confidence: 0.7,
            categories: CategoryToggles::default(),
        }
    }
}

/// An artifact bound to its final action and a human-readable reason.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedItem {
    pub artifact: Artifact,
    pub action: Action,
    pub reason: String,
}

/// The full decision set for one file, in scanner (ascending line) order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionPlan {
    pub items: Vec<PlannedItem>,
}

impl ActionPlan {
    pub fn is_noop(&self) -> bool {
        self.items.iter().all(|i| i.action == Action::Preserve)
    }
}

pub struct DecisionPolicy {
    options: CleanOptions,
}

impl DecisionPolicy {
    pub fn new(options: CleanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CleanOptions {
        &self.options
    }

    pub fn plan(&self, artifacts: Vec<Artifact>) -> ActionPlan {
        let items = artifacts
            .into_iter()
            .map(|artifact| {
                let (action, reason) = self.decide(&artifact);
                debug!(
                    category = artifact.category.label(),
                    line = artifact.start_line,
                    action = action.label(),
                    reason = %reason,
                    "decision"
                );
                PlannedItem {
                    artifact,
                    action,
                    reason,
                }
            })
            .collect();
        ActionPlan { items }
    }

    fn decide(&self, a: &Artifact) -> (Action, String) {
        if !self.options.categories.enabled(a.category) {
            return (Action::Preserve, format!("{} category disabled", a.category.label()));
        }

        // Hard preserves come first and are never overridden.
        if a.functional_purpose {
            return (
                Action::Preserve,
                "call result feeds surrounding logic".to_string(),
            );
        }
        if a.importance.should_preserve {
            return (
                Action::Preserve,
                format!("importance {:?} (score {})", a.importance.level, a.importance.score),
            );
        }
        if a.category == ArtifactCategory::Logging
            && self.options.preserve_error_handling
            && a.severity == CallSeverity::Error
            && a.context.context_type == ContextType::ErrorHandling
        {
            return (
                Action::Preserve,
                "error logging inside error-handling context".to_string(),
            );
        }

        // Comment conversion. Commenting a comment is an identity transform,
        // so debug comments never take this branch.
        if self.options.convert_important_to_comments
            && a.category != ArtifactCategory::DebugComment
            && a.keep_as_comment
        {
            return (Action::Comment, "marker content kept as a comment".to_string());
        }

        match a.category {
            ArtifactCategory::DevImport => self.decide_import(a),
            ArtifactCategory::TestFunction => decide_function(a),
            ArtifactCategory::DevConditional => {
                (Action::RemoveBlock, "development-only conditional".to_string())
            }
            ArtifactCategory::DebugComment => {
                (Action::RemoveLine, "debugging leftover comment".to_string())
            }
            ArtifactCategory::Logging
            | ArtifactCategory::Breakpoint
            | ArtifactCategory::Dialog => {
                (a.removal_shape, format!("removable {}", a.category.label()))
            }
        }
    }

    fn decide_import(&self, a: &Artifact) -> (Action, String) {
        let Some(info) = &a.import else {
            return (Action::Preserve, "import analysis missing".to_string());
        };

        if info.confidence < self.options.min_confidence {
            return (
                Action::Preserve,
                format!(
                    "confidence {:.2} below threshold {:.2}",
                    info.confidence, self.options.min_confidence
                ),
            );
        }
        if info.usage_count > 0 && self.options.remove_unused_imports_only {
            return (
                Action::Preserve,
                format!("{} use(s) of imported symbols remain", info.usage_count),
            );
        }

        (a.removal_shape, format!("unused development import of {}", info.module))
    }
}

fn decide_function(a: &Artifact) -> (Action, String) {
    let Some(info) = &a.function else {
        return (Action::Preserve, "function analysis missing".to_string());
    };

    if info.has_utility_code {
        return (
            Action::Preserve,
            "body returns values or declares reusable code".to_string(),
        );
    }
    if info.touches_globals {
        return (Action::Preserve, "body references ambient global state".to_string());
    }
    if info.body_lines > MAX_REMOVABLE_BODY_LINES || info.branch_count > MAX_REMOVABLE_BRANCHES {
        return (
            Action::Preserve,
            format!(
                "too complex to remove safely ({} lines, {} branches)",
                info.body_lines, info.branch_count
            ),
        );
    }

    (Action::RemoveBlock, format!("dev-only helper {}", info.name))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::core::scan::ArtifactScanner;

    fn plan_src(src: &str, options: CleanOptions) -> ActionPlan {
        let lines: Vec<String> = src.lines().map(|s| s.to_string()).collect();
        let scanner = ArtifactScanner::new().unwrap();
        let artifacts = scanner.scan(&PathBuf::from("fixture.js"), &lines);
        DecisionPolicy::new(options).plan(artifacts)
    }

    #[test]
    fn plain_debug_log_is_removed() {
        let plan = plan_src(
            "function f() {\n  console.log(\"debug value:\", x);\n  return x;\n}",
            CleanOptions::default(),
        );
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].action, Action::RemoveLine);
    }

    #[test]
    fn error_log_in_catch_is_preserved() {
        let plan = plan_src(
            "try {\n  await save(data);\n} catch (err) {\n  console.error('Failed to save:', err);\n  throw err;\n}",
            CleanOptions::default(),
        );
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].action, Action::Preserve);
    }

    #[test]
    fn todo_comment_removed_under_default_config() {
        let plan = plan_src("// TODO: remove this debug hack\nconst a = 1;", CleanOptions::default());
        assert_eq!(plan.items[0].action, Action::RemoveLine);
    }

    #[test]
    fn disabled_category_preserves_everything_in_it() {
        let options = CleanOptions {
            categories: CategoryToggles {
                logging: false,
                ..CategoryToggles::default()
            },
            ..CleanOptions::default()
        };
        let plan = plan_src("console.log('x');", options);
        assert_eq!(plan.items[0].action, Action::Preserve);
        assert!(plan.is_noop());
    }

    #[test]
    fn used_import_preserved_unless_opted_in() {
        let src = "const sinon = require('sinon');\nsinon.stub(api);";

        let plan = plan_src(src, CleanOptions::default());
        assert_eq!(plan.items[0].action, Action::Preserve);

        let opted = CleanOptions {
            remove_unused_imports_only: false,
            ..CleanOptions::default()
        };
        let plan = plan_src(src, opted);
        assert_eq!(plan.items[0].action, Action::RemoveLine);
    }

    #[test]
    fn low_confidence_import_is_preserved() {
        // Build-tool heuristic confidence (0.6) sits below the 0.7 default.
        let plan = plan_src("import { transform } from 'babel-core';", CleanOptions::default());
        assert_eq!(plan.items[0].action, Action::Preserve);
        assert!(plan.items[0].reason.contains("confidence"));
    }

    #[test]
    fn marker_call_becomes_comment_when_opted_in() {
        let options = CleanOptions {
            convert_important_to_comments: true,
            ..CleanOptions::default()
        };
        let plan = plan_src("console.log('TODO: wire up retries');", options);
        assert_eq!(plan.items[0].action, Action::Comment);
    }

    #[test]
    fn helper_with_utility_code_is_preserved() {
        let plan = plan_src(
            "function testFixture() {\n  return { id: 1 };\n}",
            CleanOptions::default(),
        );
        assert_eq!(plan.items[0].action, Action::Preserve);
    }
}
