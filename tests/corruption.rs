use anyhow::Result;
use std::fs::{self, OpenOptions};

use statevault::metrics;
use statevault::store::io::decode_body;
use statevault::{IntegrityVerifier, SnapshotManager, SnapshotRecord, VaultConfig};

mod common;
use common::{full_host, init_logger, unique_root};

#[test]
fn truncated_gzip_body_loads_as_absent() -> Result<()> {
    init_logger();
    let root = unique_root("corrupt-trunc");
    let mgr = SnapshotManager::open(VaultConfig::new(&root).with_compress(true))?;
    let id = mgr.create_full_snapshot(&full_host(0.42), None, None)?;

    let path = mgr.store().body_path(&id, true);
    let len = fs::metadata(&path)?.len();
    let before = metrics::snapshot().loads_corrupt;
    {
        let f = OpenOptions::new().write(true).open(&path)?;
        f.set_len(len / 2)?;
    }

    assert!(mgr.load_snapshot(&id).is_none());
    assert!(metrics::snapshot().loads_corrupt > before);
    // still indexed: a corrupt body is reported by doctor, not silently dropped
    assert!(mgr.index().get(&id)?.is_some());
    let rep = mgr.doctor()?;
    assert_eq!(rep.corrupt, vec![id.clone()]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn every_single_byte_mutation_is_detected() -> Result<()> {
    init_logger();
    let root = unique_root("corrupt-byte");
    let mgr = SnapshotManager::open(VaultConfig::new(&root).with_compress(false))?;
    let id = mgr.create_full_snapshot(&full_host(0.5), None, None)?;

    let path = mgr.store().body_path(&id, false);
    let original = fs::read(&path)?;

    for pos in 0..original.len() {
        let mut bytes = original.clone();
        bytes[pos] ^= 0x01;
        fs::write(&path, &bytes)?;
        assert!(
            mgr.load_snapshot(&id).is_none(),
            "mutation at byte {pos} ({:?} -> {:?}) went undetected",
            original[pos] as char,
            bytes[pos] as char
        );
        // where the mutated body still parses, the record itself must fail verification
        if let Ok(rec) = decode_body(&bytes, false) {
            assert!(rec.snapshot_id != id || !IntegrityVerifier::verify(&rec));
        }
    }

    fs::write(&path, &original)?;
    assert!(mgr.load_snapshot(&id).is_some());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn random_gzip_byte_flips_never_yield_a_wrong_record() -> Result<()> {
    init_logger();
    let root = unique_root("corrupt-gz-rand");
    let mgr = SnapshotManager::open(VaultConfig::new(&root).with_compress(true))?;
    let id = mgr.create_full_snapshot(&full_host(0.7), None, None)?;
    let good = mgr.load_snapshot(&id).expect("fresh snapshot must load");

    let path = mgr.store().body_path(&id, true);
    let original = fs::read(&path)?;
    let mut rng = oorandom::Rand64::new(0xC0FFEE);
    for _ in 0..64 {
        let mut bytes = original.clone();
        let pos = (rng.rand_u64() % bytes.len() as u64) as usize;
        let bit = 1u8 << (rng.rand_u64() % 8);
        bytes[pos] ^= bit;
        fs::write(&path, &bytes)?;
        // gzip header bytes (mtime, OS) are not covered by the CRC, so a flip there can still
        // decode to the exact original record; anything else must be rejected
        if let Some(r) = mgr.load_snapshot(&id) {
            assert_eq!(r, good);
        }
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn tampered_record_with_stale_hash_is_rejected() -> Result<()> {
    init_logger();
    let root = unique_root("corrupt-tamper");
    let mgr = SnapshotManager::open(VaultConfig::new(&root).with_compress(false))?;
    let id = mgr.create_full_snapshot(&full_host(0.3), None, None)?;

    let path = mgr.store().body_path(&id, false);
    let mut rec: SnapshotRecord = serde_json::from_slice(&fs::read(&path)?)?;
    rec.phi_value = 0.99;
    fs::write(&path, serde_json::to_vec(&rec)?)?;

    let before = metrics::snapshot().integrity_failures;
    assert!(mgr.load_snapshot(&id).is_none());
    assert!(metrics::snapshot().integrity_failures > before);
    assert!(!IntegrityVerifier::verify(&rec));

    // stripping the hash fails closed
    rec.content_hash = None;
    fs::write(&path, serde_json::to_vec(&rec)?)?;
    assert!(mgr.load_snapshot(&id).is_none());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn unsealed_records_are_not_persisted() -> Result<()> {
    init_logger();
    let root = unique_root("corrupt-unsealed");
    let mgr = SnapshotManager::open(VaultConfig::new(&root))?;

    let r = SnapshotRecord::empty(None);
    assert!(mgr.persist(&r).is_err());
    assert!(mgr.store().find_body(&r.snapshot_id).is_none());
    assert!(mgr.index().get(&r.snapshot_id)?.is_none());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
