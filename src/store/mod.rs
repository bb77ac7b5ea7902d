//! store: durable snapshot bodies plus the lightweight index.
//!
//! Layout under <storage_root>:
//! - snapshot_<id>.json | snapshot_<id>.json.gz  : one body per record (created once, never replaced)
//! - snapshots_index.json                         : see index.rs
//! - snapshots_index.lock                         : fs2 lock for index read-modify-write
//!
//! Behaviour:
//! - save(): the only loud operation; any I/O error propagates so an unwritten body is never indexed.
//! - load(): missing → warn + None; undecodable → error + None; integrity failure → warn + None.
//!   A body that fails verification is indistinguishable from an absent one to callers.
//! - Both file names are probed on load, so toggling compression keeps older bodies readable.

pub mod index;
pub mod io;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::integrity::IntegrityVerifier;
use crate::metrics;
use crate::record::SnapshotRecord;

pub use index::{IndexMap, SnapshotIndex, INDEX_FILE};
use io::{decode_body, encode_body, write_new};

const BODY_PREFIX: &str = "snapshot_";
const EXT_PLAIN: &str = ".json";
const EXT_GZ: &str = ".json.gz";

/// Result of reading a body, before collapsing to Option.
#[derive(Debug)]
pub enum LoadOutcome {
    Verified(SnapshotRecord),
    Missing,
    Corrupt(String),
    IntegrityFailed,
}

impl LoadOutcome {
    pub fn into_record(self) -> Option<SnapshotRecord> {
        match self {
            LoadOutcome::Verified(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, LoadOutcome::Verified(_))
    }
}

pub struct SnapshotStore {
    root: PathBuf,
    compress: bool,
    pretty: bool,
}

impl SnapshotStore {
    /// Open (and create if needed) the storage root.
    pub fn open_or_create(root: &Path, compress: bool, pretty: bool) -> Result<Self> {
        if !root.exists() {
            fs::create_dir_all(root).with_context(|| format!("create {}", root.display()))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            compress,
            pretty,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    /// Body path for `id` under the given compression mode.
    pub fn body_path(&self, id: &str, compressed: bool) -> PathBuf {
        let ext = if compressed { EXT_GZ } else { EXT_PLAIN };
        self.root.join(format!("{BODY_PREFIX}{id}{ext}"))
    }

    /// Existing body for `id`, with its compression flag.
    pub fn find_body(&self, id: &str) -> Option<(PathBuf, bool)> {
        let order = [self.compress, !self.compress];
        for compressed in order {
            let p = self.body_path(id, compressed);
            if p.exists() {
                return Some((p, compressed));
            }
        }
        None
    }

    /// Write a sealed record under a new id. Returns the number of bytes written.
    pub fn save(&self, record: &SnapshotRecord) -> Result<u64> {
        validate_id(&record.snapshot_id)?;
        if record.content_hash.is_none() {
            return Err(anyhow!(
                "refusing to persist unsealed snapshot {}",
                record.snapshot_id
            ));
        }
        if let Some(field) = record.non_finite_field() {
            return Err(anyhow!(
                "snapshot {} has a non-finite value in {}",
                record.snapshot_id,
                field
            ));
        }
        // either encoding counts: a stored record is never replaced
        if let Some((existing, _)) = self.find_body(&record.snapshot_id) {
            return Err(anyhow!(
                "snapshot {} already stored at {}",
                record.snapshot_id,
                existing.display()
            ));
        }
        let bytes = encode_body(record, self.compress, self.pretty)?;
        let path = self.body_path(&record.snapshot_id, self.compress);
        write_new(&path, &bytes)
            .with_context(|| format!("persist snapshot {}", record.snapshot_id))?;
        metrics::record_snapshot_written(bytes.len());
        debug!(
            "store: wrote {} ({} bytes, compressed={})",
            path.display(),
            bytes.len(),
            self.compress
        );
        Ok(bytes.len() as u64)
    }

    /// Read, decode and verify a body, reporting why it is unusable.
    pub fn load_checked(&self, id: &str) -> LoadOutcome {
        if validate_id(id).is_err() {
            return LoadOutcome::Missing;
        }
        let (path, compressed) = match self.find_body(id) {
            Some(x) => x,
            None => return LoadOutcome::Missing,
        };
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) => return LoadOutcome::Corrupt(format!("read {}: {e}", path.display())),
        };
        let record = match decode_body(&bytes, compressed) {
            Ok(r) => r,
            Err(e) => return LoadOutcome::Corrupt(format!("{}: {e:#}", path.display())),
        };
        if record.snapshot_id != id {
            return LoadOutcome::Corrupt(format!(
                "{}: body carries id {}",
                path.display(),
                record.snapshot_id
            ));
        }
        if !IntegrityVerifier::verify(&record) {
            return LoadOutcome::IntegrityFailed;
        }
        LoadOutcome::Verified(record)
    }

    /// Load a verified record; anything else is None (logged).
    pub fn load(&self, id: &str) -> Option<SnapshotRecord> {
        match self.load_checked(id) {
            LoadOutcome::Verified(r) => {
                metrics::record_load_ok();
                Some(r)
            }
            LoadOutcome::Missing => {
                metrics::record_load_missing();
                warn!("store: snapshot {} not found", id);
                None
            }
            LoadOutcome::Corrupt(why) => {
                metrics::record_load_corrupt();
                error!("store: snapshot {} could not be decoded: {}", id, why);
                None
            }
            LoadOutcome::IntegrityFailed => {
                metrics::record_integrity_failure();
                warn!("store: snapshot {} failed integrity verification", id);
                None
            }
        }
    }

    /// Remove every body file for `id`. Returns whether anything was removed.
    pub fn delete_body(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let mut removed = false;
        for compressed in [true, false] {
            let p = self.body_path(id, compressed);
            if p.exists() {
                fs::remove_file(&p).with_context(|| format!("remove {}", p.display()))?;
                removed = true;
            }
        }
        Ok(removed)
    }

    /// Ids of all body files present on disk (sorted, deduplicated).
    pub fn body_ids(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for e in fs::read_dir(&self.root).with_context(|| format!("read_dir {}", self.root.display()))? {
            let name = e?.file_name();
            let name = match name.to_str() {
                Some(s) => s,
                None => continue,
            };
            if let Some(id) = body_id_from_name(name) {
                out.push(id.to_string());
            }
        }
        out.sort();
        out.dedup();
        Ok(out)
    }
}

fn body_id_from_name(name: &str) -> Option<&str> {
    let rest = name.strip_prefix(BODY_PREFIX)?;
    let id = rest
        .strip_suffix(EXT_GZ)
        .or_else(|| rest.strip_suffix(EXT_PLAIN))?;
    if validate_id(id).is_ok() {
        Some(id)
    } else {
        None
    }
}

/// Ids become file names; only [A-Za-z0-9_-] is accepted.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty()
        || !id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(anyhow!("invalid snapshot id {:?}", id));
    }
    Ok(())
}
