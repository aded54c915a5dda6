use crate::error::Error;
use crate::staging::DateBucket;
use chrono::{DateTime, FixedOffset};
use dashmap::DashMap;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub const DIRECTORY_FILE_TYPE: &str = "directory";

/// Distinguishes temp files written by one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One relocation event. `(original_path, deleted_at)` identifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub original_path: PathBuf,
    pub original_name: String,
    pub current_name: String,
    #[serde(default)]
    pub file_size: u64,
    pub deleted_at: DateTime<FixedOffset>,
    pub file_type: String,
}

impl JournalEntry {
    pub fn is_directory(&self) -> bool {
        self.file_type == DIRECTORY_FILE_TYPE
    }

    pub fn matches(&self, original_path: &Path, deleted_at: &DateTime<FixedOffset>) -> bool {
        self.original_path == original_path && self.deleted_at == *deleted_at
    }
}

/// Registry of per-bucket journal locks. Clones share the same registry.
///
/// A read-modify-write cycle on a `metadata.json` first takes the in-process
/// mutex for that path, then an exclusive `flock` on the sidecar
/// `.metadata.json.lock`, so concurrent `cbin` processes serialize too.
#[derive(Debug, Clone, Default)]
pub struct JournalLocks {
    locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl JournalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_lock<T>(&self, path: &Path, f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
        // Clone the Arc out so the DashMap shard guard is released before blocking.
        let lock = self.locks.entry(path.to_path_buf()).or_default().clone();
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let lock_path = sidecar_path(path, "lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::journal(&lock_path, e))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| Error::journal(&lock_path, e))?;

        let result = f();
        // Closing the file releases the lock as well.
        let _ = lock_file.unlock();
        result
    }
}

/// `.<journal file name>.<suffix>` next to the journal.
fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}", file_name, suffix))
}

/// The `metadata.json` of one DateBucket: an indented JSON array rewritten
/// wholesale on every mutation.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
    locks: JournalLocks,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>, locks: JournalLocks) -> Self {
        Self {
            path: path.into(),
            locks,
        }
    }

    pub fn for_bucket(bucket: &DateBucket, locks: &JournalLocks) -> Self {
        Self::new(bucket.journal_path(), locks.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Missing file means no entries. A file that exists but cannot be read
    /// or parsed is an error: history is never silently dropped.
    pub fn load(&self) -> Result<Vec<JournalEntry>, Error> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::journal(&self.path, e)),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        // Older writers emit `null` once the last entry is removed.
        let entries: Option<Vec<JournalEntry>> =
            serde_json::from_slice(&data).map_err(|e| Error::journal(&self.path, e))?;
        Ok(entries.unwrap_or_default())
    }

    pub fn append(&self, entry: JournalEntry) -> Result<(), Error> {
        self.locks.with_lock(&self.path, || {
            let mut entries = self.load()?;
            entries.push(entry);
            self.store(&entries)?;
            debug!("Journal {} now holds {} entries", self.path.display(), entries.len());
            Ok(())
        })
    }

    /// Drop the entry recorded for `(original_path, deleted_at)`. Returns
    /// whether anything was removed.
    pub fn remove(&self, original_path: &Path, deleted_at: &DateTime<FixedOffset>) -> Result<bool, Error> {
        self.locks.with_lock(&self.path, || {
            let mut entries = self.load()?;
            let before = entries.len();
            entries.retain(|entry| !entry.matches(original_path, deleted_at));
            if entries.len() == before {
                return Ok(false);
            }
            self.store(&entries)?;
            info!("Journal {} updated", self.path.display());
            Ok(true)
        })
    }

    fn store(&self, entries: &[JournalEntry]) -> Result<(), Error> {
        let data = serde_json::to_vec_pretty(entries).map_err(|e| Error::journal(&self.path, e))?;

        let tmp_path = sidecar_path(
            &self.path,
            &format!(
                "{}.{}.tmp",
                process::id(),
                TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
            ),
        );

        fs::write(&tmp_path, &data).map_err(|e| Error::journal(&tmp_path, e))?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::journal(&self.path, e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn entry(name: &str, second: u32) -> JournalEntry {
        let offset = FixedOffset::east_opt(0).unwrap();
        JournalEntry {
            original_path: PathBuf::from(format!("/srv/data/{}", name)),
            original_name: name.to_string(),
            current_name: format!("{}_10:00:{:02}", name, second),
            file_size: 12,
            deleted_at: offset.with_ymd_and_hms(2024, 11, 2, 10, 0, second).unwrap(),
            file_type: "text/plain; charset=utf-8".to_string(),
        }
    }

    #[test]
    fn test_load_missing_journal_is_empty() {
        let dir = tempdir().unwrap();
        let journal = Journal::new(dir.path().join("metadata.json"), JournalLocks::new());
        assert!(journal.load().unwrap().is_empty());
        assert!(!journal.exists());
    }

    #[test]
    fn test_append_preserves_order() {
        let dir = tempdir().unwrap();
        let journal = Journal::new(dir.path().join("metadata.json"), JournalLocks::new());

        journal.append(entry("a.txt", 0)).unwrap();
        journal.append(entry("b.txt", 1)).unwrap();

        let names: Vec<String> = journal
            .load()
            .unwrap()
            .into_iter()
            .map(|e| e.original_name)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_remove_matches_path_and_timestamp() {
        let dir = tempdir().unwrap();
        let journal = Journal::new(dir.path().join("metadata.json"), JournalLocks::new());
        let first = entry("a.txt", 0);
        let second = entry("a.txt", 30);
        journal.append(first.clone()).unwrap();
        journal.append(second.clone()).unwrap();

        assert!(journal.remove(&first.original_path, &first.deleted_at).unwrap());
        assert!(!journal.remove(&first.original_path, &first.deleted_at).unwrap());

        let remaining = journal.load().unwrap();
        assert_eq!(remaining, vec![second]);
    }

    #[test]
    fn test_corrupt_journal_fails_loudly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, "[{ not json").unwrap();
        let journal = Journal::new(&path, JournalLocks::new());

        assert!(matches!(journal.load(), Err(Error::Journal { .. })));
        assert!(journal.append(entry("a.txt", 0)).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "[{ not json");
    }

    #[test]
    fn test_independent_registries_do_not_lose_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        std::thread::scope(|scope| {
            for worker in 0..4u32 {
                let path = path.clone();
                scope.spawn(move || {
                    // A fresh registry per thread: only the file lock serializes them.
                    let journal = Journal::new(&path, JournalLocks::new());
                    for i in 0..10 {
                        journal
                            .append(entry(&format!("w{}_{}.txt", worker, i), i))
                            .unwrap();
                    }
                });
            }
        });

        let journal = Journal::new(&path, JournalLocks::new());
        assert_eq!(journal.load().unwrap().len(), 40);
        assert!(dir.path().join(".metadata.json.lock").exists());
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_null_journal_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, "null").unwrap();
        let journal = Journal::new(&path, JournalLocks::new());
        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn test_reads_go_style_timestamps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(
            &path,
            r#"[
  {
    "original_path": "/home/ops/notes.txt",
    "original_name": "notes.txt",
    "current_name": "notes.txt_09:15:42.txt",
    "file_size": 120,
    "deleted_at": "2024-11-02T09:15:42.123456789+05:30",
    "file_type": "text/plain; charset=utf-8"
  },
  {
    "original_path": "/home/ops/build",
    "original_name": "build",
    "current_name": "build_09:16:00",
    "deleted_at": "2024-11-02T09:16:00.5+05:30",
    "file_type": "directory"
  }
]"#,
        )
        .unwrap();

        let entries = Journal::new(&path, JournalLocks::new()).load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_size, 120);
        assert!(entries[1].is_directory());
        assert_eq!(entries[1].file_size, 0);
    }

    #[test]
    fn test_written_journal_is_indented_json_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let journal = Journal::new(&path, JournalLocks::new());
        journal.append(entry("a.txt", 0)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  {\n    \"original_path\""));
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw[0]["current_name"], "a.txt_10:00:00");
    }
}
