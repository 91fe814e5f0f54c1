//! End-to-end behavior of the clean pipeline on representative sources.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use tempfile::TempDir;

use tidyup::core::backup::{BackupConfig, BackupStore};
use tidyup::core::pipeline::Pipeline;
use tidyup::core::policy::CleanOptions;
use tidyup::core::rollback::{RollbackCoordinator, RollbackPolicy};

fn pipeline_in(tmp: &TempDir, options: CleanOptions) -> Pipeline {
    Pipeline::new(
        options,
        BackupConfig {
            root: tmp.path().join("backups"),
            retention: 10,
        },
        RollbackPolicy::default(),
    )
    .unwrap()
}

fn write_fixture(tmp: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn plain_debug_log_in_general_context_is_removed() -> Result<()> {
    let tmp = TempDir::new()?;
    let pipeline = pipeline_in(&tmp, CleanOptions::default());

    let src = write_fixture(
        &tmp,
        "calc.js",
        "function calculateTotal(items) {\n  const sum = items.reduce(add, 0);\n  console.log(\"debug value:\", sum);\n  return sum;\n}\n",
    );

    let result = pipeline.clean(&[src.clone()], false, None);
    assert!(result.failed.is_empty());
    assert_eq!(result.totals.removed, 1);
    assert_eq!(
        fs::read_to_string(&src)?,
        "function calculateTotal(items) {\n  const sum = items.reduce(add, 0);\n  return sum;\n}\n"
    );
    Ok(())
}

#[test]
fn error_logging_in_catch_block_survives() -> Result<()> {
    let tmp = TempDir::new()?;
    let pipeline = pipeline_in(&tmp, CleanOptions::default());

    let original = "async function persist(data) {\n  try {\n    await save(data);\n  } catch (err) {\n    console.error('Failed to save:', err);\n    throw err;\n  }\n}\n";
    let src = write_fixture(&tmp, "persist.js", original);

    let result = pipeline.clean(&[src.clone()], false, None);
    assert!(result.failed.is_empty());
    assert_eq!(result.totals.preserved, 1);
    assert_eq!(result.totals.removed, 0);
    assert_eq!(fs::read_to_string(&src)?, original);
    Ok(())
}

#[test]
fn debug_todo_comment_is_deleted_by_default() -> Result<()> {
    let tmp = TempDir::new()?;
    let pipeline = pipeline_in(&tmp, CleanOptions::default());

    let src = write_fixture(
        &tmp,
        "hack.js",
        "// TODO: remove this debug hack\nconst result = compute();\n",
    );

    let result = pipeline.clean(&[src.clone()], false, None);
    assert_eq!(result.totals.removed, 1);
    assert_eq!(fs::read_to_string(&src)?, "const result = compute();\n");
    Ok(())
}

#[test]
fn dialog_with_used_result_is_kept_bare_alert_is_not() -> Result<()> {
    let tmp = TempDir::new()?;
    let pipeline = pipeline_in(&tmp, CleanOptions::default());

    let src = write_fixture(
        &tmp,
        "dialogs.js",
        "const ok = confirm('Delete this item?');\nalert('debug: reached here');\nif (ok) remove(item);\n",
    );

    let result = pipeline.clean(&[src.clone()], false, None);
    assert_eq!(result.totals.preserved, 1);
    assert_eq!(result.totals.removed, 1);
    assert_eq!(
        fs::read_to_string(&src)?,
        "const ok = confirm('Delete this item?');\nif (ok) remove(item);\n"
    );
    Ok(())
}

#[test]
fn mixed_file_batch_counts_balance_and_rollback_restores_bytes() -> Result<()> {
    let tmp = TempDir::new()?;
    let pipeline = pipeline_in(&tmp, CleanOptions::default());

    let original = concat!(
        "import { faker } from '@faker-js/faker';\n",
        "import axios from 'axios';\n",
        "\n",
        "// debug: temporary instrumentation\n",
        "function mockResponseData() {\n",
        "  console.log('building mock');\n",
        "}\n",
        "\n",
        "function submit(payload) {\n",
        "  debugger;\n",
        "  console.log('debug payload', payload);\n",
        "  if (DEBUG) {\n",
        "    console.table(payload.items);\n",
        "  }\n",
        "  try {\n",
        "    return axios.post('/api', payload);\n",
        "  } catch (err) {\n",
        "    console.error('Failed to submit:', err);\n",
        "    throw err;\n",
        "  }\n",
        "}\n",
    );
    let src = write_fixture(&tmp, "mixed.js", original);

    let result = pipeline.clean(&[src.clone()], false, None);
    assert!(result.failed.is_empty(), "failed: {:?}", result.failed);

    let t = result.totals;
    assert_eq!(t.artifacts_found, t.removed + t.preserved + t.commented);
    assert!(t.removed >= 5, "removed only {}", t.removed);
    assert!(t.preserved >= 1);

    let cleaned = fs::read_to_string(&src)?;
    assert!(!cleaned.contains("debugger"));
    assert!(!cleaned.contains("faker"));
    assert!(!cleaned.contains("mockResponseData"));
    assert!(!cleaned.contains("if (DEBUG)"));
    assert!(cleaned.contains("console.error('Failed to submit:', err);"));
    assert!(cleaned.contains("axios.post"));

    // Session rollback restores the original byte-for-byte.
    let store = BackupStore::new(BackupConfig {
        root: tmp.path().join("backups"),
        retention: 10,
    });
    let coordinator = RollbackCoordinator::new(&store, RollbackPolicy::default());
    let outcome = coordinator.rollback_session(&result.session_id.unwrap())?;
    assert!(outcome.success());
    assert_eq!(fs::read_to_string(&src)?, original);
    Ok(())
}

#[test]
fn preview_reports_identical_counts_without_writing() -> Result<()> {
    let tmp = TempDir::new()?;
    let pipeline = pipeline_in(&tmp, CleanOptions::default());

    let original = "debugger;\nconsole.log('debug');\nconst a = 1;\n";
    let src = write_fixture(&tmp, "preview.js", original);

    let preview = pipeline.clean(&[src.clone()], true, None);
    assert_eq!(fs::read_to_string(&src)?, original);

    let applied = pipeline.clean(&[src.clone()], false, None);
    assert_eq!(preview.totals.removed, applied.totals.removed);
    assert_eq!(preview.totals.preserved, applied.totals.preserved);
    assert_ne!(fs::read_to_string(&src)?, original);
    Ok(())
}

#[test]
fn disabled_categories_leave_their_artifacts_alone() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut options = CleanOptions::default();
    options.categories.breakpoints = false;
    let pipeline = pipeline_in(&tmp, options);

    let src = write_fixture(&tmp, "skip.js", "debugger;\nconsole.log('debug');\n");

    let result = pipeline.clean(&[src.clone()], false, None);
    assert_eq!(result.totals.preserved, 1);
    assert_eq!(result.totals.removed, 1);
    assert_eq!(fs::read_to_string(&src)?, "debugger;\n");
    Ok(())
}
