//! integrity: content hash over a snapshot's canonical serialization.
//!
//! Canonical form: serde_json value of the record with `content_hash` removed, object keys sorted
//! recursively, compact encoding. Digest: SHA-256, lowercase hex (64 chars).
//!
//! verify() never errors: a missing hash fails closed, a mismatch is reported with the first
//! 16 hex chars of both digests.

use anyhow::{Context, Result};
use log::warn;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::record::SnapshotRecord;

/// Length of digest prefixes printed in diagnostics.
const DIGEST_PREFIX: usize = 16;

pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Canonical bytes the hash is computed over.
    pub fn canonical_bytes(record: &SnapshotRecord) -> Result<Vec<u8>> {
        let mut v = serde_json::to_value(record).context("serialize record for hashing")?;
        if let Value::Object(m) = &mut v {
            m.remove("content_hash");
        }
        let v = canonicalize(v);
        serde_json::to_vec(&v).context("encode canonical record")
    }

    /// SHA-256 hex digest of the record content (content_hash excluded).
    pub fn hash(record: &SnapshotRecord) -> Result<String> {
        let bytes = Self::canonical_bytes(record)?;
        Ok(sha256_hex(&bytes))
    }

    /// Assign the content hash. Called once, at the end of extraction.
    pub fn seal(record: &mut SnapshotRecord) -> Result<()> {
        let h = Self::hash(record)?;
        record.content_hash = Some(h);
        Ok(())
    }

    /// Recompute and compare against the stored hash.
    pub fn verify(record: &SnapshotRecord) -> bool {
        let stored = match &record.content_hash {
            Some(h) => h,
            None => {
                warn!(
                    "integrity: snapshot {} has no content_hash, refusing to verify",
                    record.snapshot_id
                );
                return false;
            }
        };
        let actual = match Self::hash(record) {
            Ok(h) => h,
            Err(e) => {
                warn!(
                    "integrity: snapshot {} could not be hashed: {e:#}",
                    record.snapshot_id
                );
                return false;
            }
        };
        if actual.as_bytes() != stored.as_bytes() {
            warn!(
                "integrity: snapshot {} hash mismatch: stored={} computed={}",
                record.snapshot_id,
                prefix(stored),
                prefix(&actual)
            );
            return false;
        }
        true
    }
}

/// Rebuild objects with keys in sorted order, independent of serde_json's map backend.
fn canonicalize(v: Value) -> Value {
    match v {
        Value::Object(m) => {
            let mut pairs: Vec<(String, Value)> = m.into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = Map::new();
            for (k, v) in pairs {
                out.insert(k, canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(a) => Value::Array(a.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn prefix(h: &str) -> &str {
    h.get(..DIGEST_PREFIX).unwrap_or(h)
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
