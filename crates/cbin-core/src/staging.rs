use crate::error::Error;
use crate::platform::HostIdentity;
use chrono::{NaiveDate, NaiveTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const JOURNAL_FILE_NAME: &str = "metadata.json";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Per-host directory holding every DateBucket: `<recycleBinDir>/<ip>_<hostname>`.
#[derive(Debug, Clone)]
pub struct StagingRoot {
    path: PathBuf,
}

impl StagingRoot {
    pub fn for_host(recycle_bin_dir: &Path, host: &HostIdentity) -> Result<Self, Error> {
        Self::open(recycle_bin_dir.join(host.dir_name()))
    }

    /// Use `path` as the staging root, creating it if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        debug!("Staging root ready at {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bucket(&self, date: NaiveDate) -> DateBucket {
        DateBucket {
            date,
            path: self.path.join(date.format(DATE_FORMAT).to_string()),
        }
    }

    /// All DateBuckets currently on disk, oldest first. Anything that is not a
    /// directory named `YYYY-MM-DD` is ignored.
    pub fn buckets(&self) -> Result<Vec<DateBucket>, Error> {
        let mut buckets = Vec::new();
        for entry in WalkDir::new(&self.path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "staging walk failed")
                })
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            match parse_date(&name) {
                Ok(date) => buckets.push(self.bucket(date)),
                Err(_) => debug!("Ignoring non-bucket directory {}", entry.path().display()),
            }
        }
        buckets.sort_by_key(|bucket| bucket.date);
        Ok(buckets)
    }
}

/// One calendar day's recycled items plus their journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBucket {
    date: NaiveDate,
    path: PathBuf,
}

impl DateBucket {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE_NAME)
    }

    pub fn item_path(&self, current_name: &str) -> PathBuf {
        self.path.join(current_name)
    }

    /// `mkdir -p`; safe to race with other workers creating the same bucket.
    pub fn ensure(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }
}

/// Strict `YYYY-MM-DD` parse (zero padded, no trailing junk).
pub fn parse_date(value: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .filter(|date| date.format(DATE_FORMAT).to_string() == value)
        .ok_or_else(|| Error::InvalidDate(value.to_string()))
}

/// Everything from the last dot of a base name, dot included (`.bashrc` for
/// `.bashrc`, `.gz` for `a.tar.gz`, empty when there is no dot).
pub fn extension_suffix(name: &str) -> &str {
    name.rfind('.').map(|idx| &name[idx..]).unwrap_or("")
}

/// `<name>_<HH:MM:SS><ext>` for the first attempt, `<name>_<HH:MM:SS>_<n><ext>`
/// after a collision.
pub fn destination_name(original_name: &str, extension: &str, time: NaiveTime, attempt: u32) -> String {
    let stamp = time.format(TIME_FORMAT);
    if attempt == 0 {
        format!("{}_{}{}", original_name, stamp, extension)
    } else {
        format!("{}_{}_{}{}", original_name, stamp, attempt, extension)
    }
}
