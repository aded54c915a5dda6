use crate::dispatch::{self, BatchReport};
use crate::error::Error;
use crate::journal::{Journal, JournalEntry, JournalLocks, DIRECTORY_FILE_TYPE};
use crate::mime;
use crate::progress::RecycleReporter;
use crate::relocate::{relocate, ModePolicy, Relocation};
use crate::staging::{self, DateBucket, StagingRoot};
use chrono::{Local, NaiveTime};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{self as std_path, Path, PathBuf};
use tracing::{error, info, info_span, warn, Span};

/// Upper bound on `_<n>` suffixes tried for one destination name.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyTarget,
    NotFound,
}

/// Result of recycling one target. Never aborts the rest of a batch.
#[derive(Debug)]
pub enum RecycleOutcome {
    Recycled(JournalEntry),
    /// Copied and journaled, but the source could not be deleted.
    PartiallyRecycled {
        entry: JournalEntry,
        source_error: io::Error,
    },
    Skipped {
        target: String,
        reason: SkipReason,
    },
    Failed {
        target: String,
        error: Error,
    },
}

impl RecycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RecycleOutcome::Failed { .. })
    }

    pub fn entry(&self) -> Option<&JournalEntry> {
        match self {
            RecycleOutcome::Recycled(entry) | RecycleOutcome::PartiallyRecycled { entry, .. } => {
                Some(entry)
            }
            _ => None,
        }
    }
}

/// The move engine: relocates single targets into today's DateBucket and
/// journals them.
pub struct Recycler {
    root: StagingRoot,
    locks: JournalLocks,
    span: Span,
}

impl Recycler {
    pub fn new(root: StagingRoot, locks: JournalLocks) -> Self {
        let span = info_span!("recycler", staging_root = %root.path().display());
        Self { root, locks, span }
    }

    pub fn staging_root(&self) -> &StagingRoot {
        &self.root
    }

    /// Recycle every target across at most `worker_count` workers.
    pub fn recycle(
        &self,
        targets: &[String],
        worker_count: usize,
        reporter: &dyn RecycleReporter,
    ) -> Result<BatchReport, Error> {
        dispatch::dispatch(self, targets, worker_count, reporter)
    }

    pub fn recycle_one(&self, target: &str) -> RecycleOutcome {
        let _enter = self.span.enter();

        let trimmed = target.trim();
        if trimmed.is_empty() {
            warn!("Skipping empty target");
            return RecycleOutcome::Skipped {
                target: target.to_string(),
                reason: SkipReason::EmptyTarget,
            };
        }

        match self.try_recycle(Path::new(trimmed)) {
            Ok(outcome) => outcome,
            Err(Error::NotFound(path)) => {
                warn!(file = %path.display(), "File or directory does not exist");
                RecycleOutcome::Skipped {
                    target: trimmed.to_string(),
                    reason: SkipReason::NotFound,
                }
            }
            Err(error) => {
                error!(file = trimmed, %error, "Failed to recycle");
                RecycleOutcome::Failed {
                    target: trimmed.to_string(),
                    error,
                }
            }
        }
    }

    fn try_recycle(&self, target: &Path) -> Result<RecycleOutcome, Error> {
        let original_path = std_path::absolute(target)?;
        let metadata = match fs::symlink_metadata(&original_path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::NotFound(original_path)),
            Err(e) => return Err(e.into()),
        };

        let original_name = original_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("{} has no file name", original_path.display()),
                )
            })?;

        let now = Local::now();
        let bucket = self.root.bucket(now.date_naive());
        bucket.ensure()?;

        let is_dir = metadata.is_dir();
        let (file_type, file_size, extension) = if is_dir {
            (DIRECTORY_FILE_TYPE.to_string(), 0, "")
        } else if metadata.is_file() {
            let file_type = mime::detect_file_type(&original_path).unwrap_or_else(|e| {
                warn!(file = %original_path.display(), error = %e, "Failed to detect file type");
                mime::OCTET_STREAM.to_string()
            });
            (file_type, metadata.len(), staging::extension_suffix(&original_name))
        } else {
            // Opening a FIFO or a tty blocks, so special files are never read.
            (
                mime::special_file_type(&metadata.file_type()).to_string(),
                metadata.len(),
                staging::extension_suffix(&original_name),
            )
        };

        let destination = reserve_destination(&bucket, &original_name, extension, now.time(), is_dir)?;
        info!(
            file = %original_path.display(),
            destination = %destination.display(),
            "Moving {} to recycle bin",
            if is_dir { "directory" } else { "file" }
        );

        let relocation = match relocate(&original_path, &destination, ModePolicy::Preserve) {
            Ok(relocation) => relocation,
            Err(e) => {
                release_reservation(&destination, is_dir);
                return Err(e);
            }
        };

        let current_name = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry = JournalEntry {
            original_path: original_path.clone(),
            original_name,
            current_name,
            file_size,
            deleted_at: now.fixed_offset(),
            file_type,
        };

        let journal = Journal::for_bucket(&bucket, &self.locks);
        if let Err(e) = journal.append(entry.clone()) {
            error!(
                journal = %journal.path().display(),
                error = %e,
                "Failed to journal recycled item, moving it back"
            );
            roll_back(&destination, &original_path, &relocation);
            return Err(e);
        }

        Ok(match relocation {
            Relocation::Renamed | Relocation::Copied => {
                info!(file = %original_path.display(), "Successfully moved to recycle bin");
                RecycleOutcome::Recycled(entry)
            }
            Relocation::CopiedSourceRemains(source_error) => {
                error!(
                    file = %original_path.display(),
                    error = %source_error,
                    "Copied to recycle bin but failed to delete original"
                );
                RecycleOutcome::PartiallyRecycled {
                    entry,
                    source_error,
                }
            }
        })
    }
}

/// Claim a unique name in `bucket` by creating an empty placeholder
/// exclusively. The relocation then replaces the placeholder.
fn reserve_destination(
    bucket: &DateBucket,
    original_name: &str,
    extension: &str,
    time: NaiveTime,
    is_dir: bool,
) -> Result<PathBuf, Error> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = bucket.item_path(&staging::destination_name(
            original_name,
            extension,
            time,
            attempt,
        ));
        let reserved = if is_dir {
            fs::create_dir(&candidate)
        } else {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .map(|_| ())
        };
        match reserved {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::Io(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name for {} in {}", original_name, bucket.path().display()),
    )))
}

fn release_reservation(destination: &Path, is_dir: bool) {
    let released = if is_dir {
        fs::remove_dir(destination)
    } else {
        fs::remove_file(destination)
    };
    if let Err(e) = released {
        if e.kind() != ErrorKind::NotFound {
            warn!(destination = %destination.display(), error = %e, "Failed to release reserved name");
        }
    }
}

/// Undo a relocation whose journal entry could not be written.
fn roll_back(destination: &Path, original_path: &Path, relocation: &Relocation) {
    let restored = match relocation {
        // The source is still in place; only the copy needs to go.
        Relocation::CopiedSourceRemains(_) => fs::remove_file(destination).map_err(Error::from),
        Relocation::Renamed | Relocation::Copied => {
            relocate(destination, original_path, ModePolicy::Preserve).map(|_| ())
        }
    };
    if let Err(e) = restored {
        error!(
            file = %original_path.display(),
            destination = %destination.display(),
            error = %e,
            "Rollback failed; item is in the recycle bin without a journal entry"
        );
    }
}
