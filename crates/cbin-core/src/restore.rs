use crate::error::Error;
use crate::journal::{Journal, JournalEntry, JournalLocks};
use crate::relocate::{relocate, ModePolicy, Relocation};
use crate::staging::{self, DateBucket, StagingRoot};
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use tracing::{error, info, info_span, warn, Span};

#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<JournalEntry>,
    /// Entries left alone: backing file missing or original path occupied.
    pub skipped: usize,
    pub failed: usize,
    /// Restored entries whose recycled copy could not be removed.
    pub left_in_bin: usize,
}

/// How a single entry came back.
enum Restored {
    Complete,
    /// Copied back, but the recycled item could not be removed, so the
    /// journal entry stays to keep describing it.
    LeftoverInBin,
}

/// Reverses relocations recorded in the journals of a StagingRoot.
/// Runs sequentially; it never needs to share a bucket with itself.
pub struct Restorer {
    root: StagingRoot,
    locks: JournalLocks,
    span: Span,
}

impl Restorer {
    pub fn new(root: StagingRoot, locks: JournalLocks) -> Self {
        let span = info_span!("restorer", staging_root = %root.path().display());
        Self { root, locks, span }
    }

    /// Restore journaled items. `date` limits the walk to one DateBucket,
    /// `name` to entries whose original base name matches; with a name,
    /// at most one item is restored.
    pub fn restore(&self, date: Option<&str>, name: Option<&str>) -> Result<RestoreReport, Error> {
        let _enter = self.span.enter();
        let mut report = RestoreReport::default();

        for bucket in self.select_buckets(date)? {
            let journal = Journal::for_bucket(&bucket, &self.locks);
            if !journal.exists() {
                warn!(metadata_file = %journal.path().display(), "Metadata file not found, skipping directory");
                continue;
            }
            let entries = match journal.load() {
                Ok(entries) => entries,
                Err(e) => {
                    error!(error = %e, "Failed to read metadata, skipping directory");
                    continue;
                }
            };

            for entry in entries {
                if name.is_some_and(|name| entry.original_name != name) {
                    continue;
                }

                match self.restore_entry(&bucket, &journal, &entry) {
                    Ok(restored) => {
                        if let Restored::LeftoverInBin = restored {
                            report.left_in_bin += 1;
                        }
                        report.restored.push(entry);
                        if name.is_some() {
                            return Ok(report);
                        }
                    }
                    Err(Error::NotFound(current_path)) => {
                        warn!(
                            original_path = %entry.original_path.display(),
                            current_path = %current_path.display(),
                            "File to be restored not found in recycle bin, skipping"
                        );
                        report.skipped += 1;
                    }
                    Err(Error::Conflict(path)) => {
                        warn!(
                            original_path = %path.display(),
                            "Original path is occupied, skipping"
                        );
                        report.skipped += 1;
                    }
                    Err(e) => {
                        error!(original_path = %entry.original_path.display(), error = %e, "Failed to restore");
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Journal contents per DateBucket, oldest bucket first.
    pub fn list(&self, date: Option<&str>) -> Result<Vec<(NaiveDate, Vec<JournalEntry>)>, Error> {
        let mut listing = Vec::new();
        for bucket in self.select_buckets(date)? {
            match Journal::for_bucket(&bucket, &self.locks).load() {
                Ok(entries) if entries.is_empty() => {}
                Ok(entries) => listing.push((bucket.date(), entries)),
                Err(e) => error!(error = %e, "Failed to read metadata, skipping directory"),
            }
        }
        Ok(listing)
    }

    fn select_buckets(&self, date: Option<&str>) -> Result<Vec<DateBucket>, Error> {
        match date {
            Some(date) => Ok(vec![self.root.bucket(staging::parse_date(date)?)]),
            None => self.root.buckets(),
        }
    }

    fn restore_entry(
        &self,
        bucket: &DateBucket,
        journal: &Journal,
        entry: &JournalEntry,
    ) -> Result<Restored, Error> {
        let current_path = bucket.item_path(&entry.current_name);
        if let Err(e) = fs::symlink_metadata(&current_path) {
            return Err(match e.kind() {
                ErrorKind::NotFound => Error::NotFound(current_path),
                _ => e.into(),
            });
        }

        let original_path = &entry.original_path;
        match fs::symlink_metadata(original_path) {
            Ok(_) => return Err(Error::Conflict(original_path.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = original_path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(
            original_path = %original_path.display(),
            current_path = %current_path.display(),
            "Restoring file"
        );

        match relocate(&current_path, original_path, ModePolicy::Permissive)? {
            Relocation::Renamed | Relocation::Copied => {
                journal.remove(original_path, &entry.deleted_at)?;
                info!(original_path = %original_path.display(), "File successfully restored");
                Ok(Restored::Complete)
            }
            Relocation::CopiedSourceRemains(e) => {
                warn!(
                    current_path = %current_path.display(),
                    error = %e,
                    "Restored a copy but failed to delete it from the recycle bin; journal entry kept"
                );
                Ok(Restored::LeftoverInBin)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_restore_invalid_date_is_rejected() {
        let dir = tempdir().unwrap();
        let root = StagingRoot::open(dir.path().join("root")).unwrap();
        let restorer = Restorer::new(root, JournalLocks::new());

        assert!(matches!(
            restorer.restore(Some("02-11-2024"), None),
            Err(Error::InvalidDate(_))
        ));
    }

    #[test]
    fn test_restore_missing_bucket_is_nothing_to_do() {
        let dir = tempdir().unwrap();
        let root = StagingRoot::open(dir.path().join("root")).unwrap();
        let restorer = Restorer::new(root, JournalLocks::new());

        let report = restorer.restore(Some("2024-11-02"), None).unwrap();
        assert!(report.restored.is_empty());
        assert_eq!(report.skipped + report.failed, 0);
    }

    #[test]
    fn test_list_skips_empty_buckets() {
        let dir = tempdir().unwrap();
        let root = StagingRoot::open(dir.path().join("root")).unwrap();
        fs::create_dir(root.path().join("2024-11-02")).unwrap();
        let restorer = Restorer::new(root, JournalLocks::new());

        assert!(restorer.list(None).unwrap().is_empty());
    }
}
