//! Backup store and rollback coordinator working together on real files.

use std::fs;

use anyhow::Result;
use tempfile::TempDir;

use tidyup::core::backup::{BackupConfig, BackupStore, checksum_bytes};
use tidyup::core::rollback::{RollbackCoordinator, RollbackPolicy};

fn store_in(tmp: &TempDir, retention: usize) -> BackupStore {
    BackupStore::new(BackupConfig {
        root: tmp.path().join("backups"),
        retention,
    })
}

#[test]
fn checksums_are_stable_and_prefixed() {
    let sum = checksum_bytes(b"hello world");
    assert!(sum.starts_with("xxh32:"));
    assert_eq!(sum.len(), "xxh32:".len() + 8);
    assert_eq!(sum, checksum_bytes(b"hello world"));
    assert_ne!(sum, checksum_bytes(b"hello worlds"));
}

#[test]
fn record_and_session_listings_are_newest_first() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = store_in(&tmp, 10);

    let src = tmp.path().join("app.js");
    let mut ids = Vec::new();
    for i in 0..3 {
        fs::write(&src, format!("v{i}"))?;
        ids.push(store.snapshot(&src)?.id);
    }

    let listed: Vec<String> = store.list_records()?.into_iter().map(|r| r.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);
    Ok(())
}

#[test]
fn retention_evicts_oldest_records_and_sessions() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = store_in(&tmp, 2);

    let src = tmp.path().join("app.js");
    fs::write(&src, "content")?;
    let mut session_ids = Vec::new();
    for _ in 0..4 {
        session_ids.push(store.snapshot_many(&[src.clone()])?.id);
    }

    let report = store.evict_excess();
    assert_eq!(report.removed_records.len(), 2);
    assert_eq!(report.removed_sessions.len(), 2);
    assert!(report.errors.is_empty());

    let sessions = store.list_sessions()?;
    assert_eq!(sessions.len(), 2);
    // The two newest sessions survive.
    assert_eq!(sessions[0].id, session_ids[3]);
    assert_eq!(sessions[1].id, session_ids[2]);
    Ok(())
}

#[test]
fn restore_prefers_the_newest_record_for_a_path() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = store_in(&tmp, 10);

    let src = tmp.path().join("app.js");
    fs::write(&src, "first")?;
    store.snapshot(&src)?;
    fs::write(&src, "second")?;
    store.snapshot(&src)?;
    fs::write(&src, "broken")?;

    let coordinator = RollbackCoordinator::new(&store, RollbackPolicy::default());
    let outcome = coordinator.rollback_file(&src);
    assert!(outcome.success);
    assert_eq!(fs::read_to_string(&src)?, "second");
    Ok(())
}

#[test]
fn rollback_of_rollback_returns_the_broken_state() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = store_in(&tmp, 10);

    let src = tmp.path().join("app.js");
    fs::write(&src, "good")?;
    store.snapshot(&src)?;
    fs::write(&src, "broken")?;

    let coordinator = RollbackCoordinator::new(&store, RollbackPolicy::default());
    let first = coordinator.rollback_file(&src);
    assert!(first.success);
    assert_eq!(fs::read_to_string(&src)?, "good");

    // The safety snapshot of the broken state is now the newest record.
    let second = coordinator.rollback_file(&src);
    assert!(second.success);
    assert_eq!(fs::read_to_string(&src)?, "broken");
    Ok(())
}

#[test]
fn emergency_targets_the_most_recent_session() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = store_in(&tmp, 10);

    let a = tmp.path().join("a.js");
    let b = tmp.path().join("b.js");
    fs::write(&a, "a v1")?;
    fs::write(&b, "b v1")?;
    store.snapshot_many(&[a.clone()])?;
    fs::write(&a, "a v2")?;
    store.snapshot_many(&[a.clone(), b.clone()])?;

    fs::write(&a, "a broken")?;
    fs::write(&b, "b broken")?;

    let coordinator = RollbackCoordinator::new(&store, RollbackPolicy::default());
    let outcome = coordinator.emergency_rollback();
    assert!(outcome.success, "error: {:?}", outcome.error);

    // The newest session covered both files, at their second versions.
    assert_eq!(fs::read_to_string(&a)?, "a v2");
    assert_eq!(fs::read_to_string(&b)?, "b v1");
    Ok(())
}

#[test]
fn sidecar_metadata_survives_a_fresh_store_handle() -> Result<()> {
    let tmp = TempDir::new()?;
    {
        let store = store_in(&tmp, 10);
        let src = tmp.path().join("app.js");
        fs::write(&src, "persisted")?;
        store.snapshot(&src)?;
    }

    // A new handle over the same root sees the same records.
    let reopened = store_in(&tmp, 10);
    let records = reopened.list_records()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].size_bytes, 9);
    reopened.verify(&records[0])?;
    Ok(())
}

#[test]
fn unreadable_sidecars_do_not_poison_listings() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = store_in(&tmp, 10);

    let src = tmp.path().join("app.js");
    fs::write(&src, "fine")?;
    let record = store.snapshot(&src)?;

    // Corrupt a second record's sidecar by hand.
    let bogus = tmp.path().join("backups/records/zzz_bogus");
    fs::create_dir_all(&bogus)?;
    fs::write(bogus.join("meta.json"), "{ not json")?;

    let records = store.list_records()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record.id);
    Ok(())
}
