//! store/index: snapshots_index.json: snapshot_id -> SnapshotIndexEntry.
//!
//! Format (pretty JSON object, keys sorted):
//! {
//!   "<uuid>": {"snapshot_id":"<uuid>","timestamp":"<ISO-8601>","tag":null,"phi_value":0.4,"size_bytes":812},
//!   ...
//! }
//!
//! Notes:
//! - Every mutation is a read-modify-write under an in-process Mutex and the fs2 exclusive lock,
//!   so concurrent creators (threads or processes sharing the root) never drop entries.
//! - The file is replaced atomically via tmp+rename.
//! - The fs2 lock lives in snapshots_index.lock next to the index.
//! - A missing file is an empty index.

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::io::write_atomic;
use crate::record::{ListFilter, SnapshotIndexEntry};

pub const INDEX_FILE: &str = "snapshots_index.json";
pub const INDEX_LOCK_FILE: &str = "snapshots_index.lock";

pub type IndexMap = BTreeMap<String, SnapshotIndexEntry>;

pub struct SnapshotIndex {
    path: PathBuf,
    lock_path: PathBuf,
    guard: Mutex<()>,
}

impl SnapshotIndex {
    pub fn open(root: &Path) -> Self {
        Self {
            path: root.join(INDEX_FILE),
            lock_path: root.join(INDEX_LOCK_FILE),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full index (consistent view under a shared lock).
    pub fn load(&self) -> Result<IndexMap> {
        let _g = self
            .guard
            .lock()
            .map_err(|_| anyhow!("index mutex poisoned"))?;
        let _lk = self.lock_file(false)?;
        self.read_unlocked()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.load()?.is_empty())
    }

    pub fn get(&self, id: &str) -> Result<Option<SnapshotIndexEntry>> {
        Ok(self.load()?.remove(id))
    }

    /// Read-modify-write. The closure sees the current map; the map is persisted after it returns Ok.
    pub fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut IndexMap) -> Result<T>,
    {
        let _g = self
            .guard
            .lock()
            .map_err(|_| anyhow!("index mutex poisoned"))?;
        let _lk = self.lock_file(true)?;
        let mut map = self.read_unlocked()?;
        let out = f(&mut map)?;
        self.write_unlocked(&map)?;
        Ok(out)
    }

    /// Entries passing the filter, newest first, truncated to filter.limit.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<SnapshotIndexEntry>> {
        Ok(filter_entries(self.load()?.into_values(), filter))
    }

    /// fs2 advisory lock on the lock file; released when the returned handle is dropped.
    fn lock_file(&self, exclusive: bool) -> Result<File> {
        let f = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .with_context(|| format!("open lock file {}", self.lock_path.display()))?;
        let locked = if exclusive {
            f.lock_exclusive()
        } else {
            f.lock_shared()
        };
        locked.with_context(|| format!("lock {}", self.lock_path.display()))?;
        Ok(f)
    }

    fn read_unlocked(&self) -> Result<IndexMap> {
        if !self.path.exists() {
            return Ok(IndexMap::new());
        }
        let bytes =
            fs::read(&self.path).with_context(|| format!("read {}", self.path.display()))?;
        if bytes.is_empty() {
            return Ok(IndexMap::new());
        }
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", self.path.display()))
    }

    fn write_unlocked(&self, map: &IndexMap) -> Result<()> {
        let data = serde_json::to_vec_pretty(map).context("serialize snapshots index")?;
        write_atomic(&self.path, &data)
    }
}

pub fn filter_entries<I>(entries: I, filter: &ListFilter) -> Vec<SnapshotIndexEntry>
where
    I: IntoIterator<Item = SnapshotIndexEntry>,
{
    let mut out: Vec<SnapshotIndexEntry> = entries.into_iter().filter(|e| filter.matches(e)).collect();
    out.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.snapshot_id.cmp(&b.snapshot_id))
    });
    if let Some(n) = filter.limit {
        out.truncate(n);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SnapshotTag;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(id: &str, secs: i64, tag: Option<&str>) -> SnapshotIndexEntry {
        SnapshotIndexEntry {
            snapshot_id: id.into(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            tag: tag.map(SnapshotTag::new),
            phi_value: 0.0,
            size_bytes: 1,
        }
    }

    #[test]
    fn filter_by_tag_range_and_limit() {
        let all = vec![
            entry("a", 0, Some("x")),
            entry("b", 10, Some("y")),
            entry("c", 20, Some("x")),
            entry("d", 30, None),
        ];
        let got = filter_entries(all.clone(), &ListFilter::all().with_tag("x"));
        let ids: Vec<_> = got.iter().map(|e| e.snapshot_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let t0 = Utc.timestamp_opt(1_700_000_010, 0).unwrap();
        let got = filter_entries(
            all.clone(),
            &ListFilter::all().with_date_range(t0, t0 + Duration::seconds(10)),
        );
        let ids: Vec<_> = got.iter().map(|e| e.snapshot_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let got = filter_entries(all, &ListFilter::all().with_limit(2));
        let ids: Vec<_> = got.iter().map(|e| e.snapshot_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c"]);
    }

    #[test]
    fn mutate_persists_only_on_ok() -> Result<()> {
        let root = std::env::temp_dir().join(format!(
            "statevault-index-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        fs::create_dir_all(&root)?;
        let idx = SnapshotIndex::open(&root);
        assert!(idx.is_empty()?);

        idx.mutate(|m| {
            m.insert("a".into(), entry("a", 0, None));
            Ok(())
        })?;
        assert!(root.join(INDEX_LOCK_FILE).exists());
        assert_eq!(idx.len()?, 1);

        let failed: Result<()> = idx.mutate(|m| {
            m.remove("a");
            Err(anyhow!("abort"))
        });
        assert!(failed.is_err());
        assert!(idx.get("a")?.is_some());

        let _ = fs::remove_dir_all(&root);
        Ok(())
    }
}
