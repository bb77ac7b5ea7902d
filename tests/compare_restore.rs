use anyhow::Result;
use std::fs;

use statevault::metrics;
use statevault::{
    IntegrityVerifier, NumericVector, RestoreEngine, SnapshotManager, SnapshotRecord, VaultConfig,
};

mod common;
use common::{full_host, init_logger, unique_root, FakeHost, FakeLoop, FakeWorkspace};

#[test]
fn phi_delta_between_two_snapshots() -> Result<()> {
    init_logger();
    let root = unique_root("cmp-phi");
    let mgr = SnapshotManager::open(VaultConfig::new(&root))?;

    let id1 = mgr.create_full_snapshot(&full_host(0.3), None, None)?;
    let mut later = full_host(0.5);
    if let Some(ws) = later.workspace.as_mut() {
        ws.embeddings
            .insert("visual".into(), NumericVector::F32(vec![0.5, 0.25, 1.0]));
        ws.embeddings
            .insert("audio".into(), NumericVector::F64(vec![1.0, 1.0]));
        ws.cycles = 50;
    }
    let id2 = mgr.create_full_snapshot(&later, None, None)?;

    let c = mgr.compare_snapshots(&id1, &id2).expect("both snapshots exist");
    assert_eq!(c.snapshot_id1, id1);
    assert_eq!(c.snapshot_id2, id2);
    assert!((c.metrics_delta["phi"] - 0.2).abs() < 1e-9);
    assert_eq!(c.metrics_delta["psi"], 0.0);

    // identical visual embedding → similarity ~1, audio only in second → omitted
    assert!((c.embeddings_similarity["visual"] - 1.0).abs() < 1e-6);
    assert!(!c.embeddings_similarity.contains_key("audio"));
    assert_eq!(c.differences["workspace_cycle_count_delta"], serde_json::Value::from(10));
    assert_eq!(c.differences["embedding_modules_delta"], serde_json::Value::from(1));
    assert!(c.differences["elapsed_seconds"].as_f64().unwrap_or(-1.0) >= 0.0);

    let r = mgr.compare_snapshots(&id2, &id1).expect("reverse compare");
    for (k, v) in &c.metrics_delta {
        assert_eq!(*v, -r.metrics_delta[k]);
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn compare_with_missing_snapshot_is_none() -> Result<()> {
    init_logger();
    let root = unique_root("cmp-missing");
    let mgr = SnapshotManager::open(VaultConfig::new(&root))?;
    let id = mgr.create_full_snapshot(&full_host(0.3), None, None)?;
    assert!(mgr.compare_snapshots(&id, "no-such-snapshot").is_none());
    assert!(mgr.compare_snapshots("no-such-snapshot", &id).is_none());
    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn restore_overwrites_workspace_and_loop_counters() -> Result<()> {
    init_logger();
    let root = unique_root("restore-ok");
    let mgr = SnapshotManager::open(VaultConfig::new(&root))?;
    let id = mgr.create_full_snapshot(&full_host(0.4), None, None)?;

    let mut host = FakeHost {
        workspace: Some(FakeWorkspace::default()),
        looop: Some(FakeLoop::default()),
        ..FakeHost::default()
    };
    assert!(mgr.restore_full_snapshot(&id, &mut host));

    let ws = host.workspace.as_ref().expect("workspace");
    assert_eq!(ws.cycles, 40);
    assert_eq!(
        ws.embeddings.get("visual"),
        Some(&NumericVector::F64(vec![0.5, 0.25, 1.0]))
    );
    let lp = host.looop.as_ref().expect("loop");
    assert_eq!(lp.cycles, 41);
    assert_eq!(lp.total, 41);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn restore_onto_host_without_capabilities_succeeds() -> Result<()> {
    init_logger();
    let mut r = SnapshotRecord::empty(None);
    r.loop_cycle_count = 5;
    IntegrityVerifier::seal(&mut r)?;
    let mut host = FakeHost::default();
    assert!(RestoreEngine::restore(&r, &mut host));
    let ok_before = metrics::snapshot().restores_ok;
    let rep = RestoreEngine::try_restore(&r, &mut host)?;
    assert!(metrics::snapshot().restores_ok > ok_before);
    assert!(!rep.workspace_restored && !rep.loop_restored);
    assert!(rep.steps.is_empty());
    Ok(())
}

#[test]
fn failed_restore_reports_false_and_leaves_partial_state() -> Result<()> {
    init_logger();
    let mut r = SnapshotRecord::empty(None);
    r.workspace_embeddings.insert("visual".into(), vec![1.0, 2.0]);
    r.workspace_cycle_count = 9;
    r.loop_cycle_count = 9;
    r.loop_total_cycles_executed = 99;
    IntegrityVerifier::seal(&mut r)?;

    let mut host = FakeHost {
        workspace: Some(FakeWorkspace::default()),
        looop: Some(FakeLoop {
            fail_set_total: true,
            ..FakeLoop::default()
        }),
        ..FakeHost::default()
    };
    assert!(!RestoreEngine::restore(&r, &mut host));

    // steps before the failure were applied, the failing one was not
    let ws = host.workspace.as_ref().expect("workspace");
    assert_eq!(ws.cycles, 9);
    assert!(ws.embeddings.contains_key("visual"));
    let lp = host.looop.as_ref().expect("loop");
    assert_eq!(lp.cycles, 9);
    assert_eq!(lp.total, 0);

    let failed_before = metrics::snapshot().restores_failed;
    let err = RestoreEngine::try_restore(&r, &mut host).expect_err("must fail again");
    assert!(metrics::snapshot().restores_failed > failed_before);
    assert!(format!("{err:#}").contains("total cycles"));
    Ok(())
}

#[test]
fn restore_of_missing_snapshot_leaves_host_untouched() -> Result<()> {
    init_logger();
    let root = unique_root("restore-missing");
    let mgr = SnapshotManager::open(VaultConfig::new(&root))?;
    let mut host = full_host(0.1);
    let before = host.workspace.as_ref().map(|w| w.cycles);
    assert!(!mgr.restore_full_snapshot("absent", &mut host));
    assert_eq!(host.workspace.as_ref().map(|w| w.cycles), before);
    let _ = fs::remove_dir_all(&root);
    Ok(())
}
