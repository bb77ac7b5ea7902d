//! store/io: encode/decode of snapshot bodies and atomic file replacement.
//!
//! Writes go tmp → sync_all → rename (index) or tmp → sync_all → hard link (bodies), so a crash
//! never leaves a partial file under its final name. A body is never replaced: linking onto an
//! existing name fails, whichever process got there first wins.
//! Bodies are JSON, optionally gzip-wrapped (flate2).

use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::record::SnapshotRecord;

/// Sibling temp path: "<name>.tmp" (keeps multi-part extensions like .json.gz intact).
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tmp");
    PathBuf::from(s)
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Per-writer temp path: "<name>.<pid>.<seq>.tmp", so concurrent writers of one name never share it.
fn unique_tmp_path(path: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut s = path.as_os_str().to_os_string();
    s.push(format!(".{}.{}.tmp", std::process::id(), seq));
    PathBuf::from(s)
}

fn write_synced(tmp: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp)
        .with_context(|| format!("open tmp {}", tmp.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("write tmp {}", tmp.display()))?;
    f.sync_all()
        .with_context(|| format!("fsync tmp {}", tmp.display()))?;
    Ok(())
}

/// Create `path` with `bytes`. Fails if `path` already exists; an existing file is never touched.
pub fn write_new(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = unique_tmp_path(path);
    if let Err(e) = write_synced(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    let linked = fs::hard_link(&tmp, path);
    let _ = fs::remove_file(&tmp);
    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(anyhow!("{} already exists", path.display()))
        }
        Err(e) => Err(e).with_context(|| format!("link {} -> {}", tmp.display(), path.display())),
    }
}

/// Replace `path` with `bytes` atomically.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    if let Err(e) = write_synced(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()));
    }
    Ok(())
}

/// Serialize a record (optionally pretty, optionally gzip).
pub fn encode_body(record: &SnapshotRecord, compress: bool, pretty: bool) -> Result<Vec<u8>> {
    let json = if pretty {
        serde_json::to_vec_pretty(record)
    } else {
        serde_json::to_vec(record)
    }
    .with_context(|| format!("serialize snapshot {}", record.snapshot_id))?;

    if !compress {
        return Ok(json);
    }
    let mut enc = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    enc.write_all(&json).context("gzip snapshot body")?;
    enc.finish().context("finish gzip stream")
}

/// Inverse of encode_body. Fails on a truncated/corrupt stream or malformed JSON.
pub fn decode_body(bytes: &[u8], compressed: bool) -> Result<SnapshotRecord> {
    if compressed {
        let mut dec = GzDecoder::new(bytes);
        let mut json = Vec::new();
        dec.read_to_end(&mut json).context("gunzip snapshot body")?;
        serde_json::from_slice(&json).context("parse snapshot json")
    } else {
        serde_json::from_slice(bytes).context("parse snapshot json")
    }
}
