use crate::error::Error;
use crate::platform::{self, PERMISSIVE_MODE};
use std::fs::{self, Metadata};
use std::io::{self, ErrorKind};
use std::path::Path;
use tracing::{debug, warn};

/// Permission bits given to a fallback copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModePolicy {
    /// Copy keeps the source's permission bits exactly.
    Preserve,
    /// Copy is created rwx for everyone, minus umask.
    Permissive,
}

#[derive(Debug)]
pub enum Relocation {
    Renamed,
    Copied,
    /// The copy is complete but the source could not be removed.
    CopiedSourceRemains(io::Error),
}

/// Move `from` to `to`. A failed rename of a regular file falls back to
/// read-all, write, then remove the source. The source is never removed
/// unless the copy was fully written. Directories and other special files
/// only ever move by rename.
///
/// `to` may already exist as an empty placeholder reserved by the caller.
pub fn relocate(from: &Path, to: &Path, policy: ModePolicy) -> Result<Relocation, Error> {
    let metadata = match fs::symlink_metadata(from) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::NotFound(from.to_path_buf())),
        Err(e) => return Err(e.into()),
    };

    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(Relocation::Renamed),
        Err(e) => e,
    };

    if !metadata.file_type().is_file() {
        return Err(relocation_error(from, to, rename_err));
    }

    debug!(
        "Rename {} -> {} failed ({}), copying instead",
        from.display(),
        to.display(),
        rename_err
    );
    copy_then_remove(from, to, &metadata, policy)
}

/// The fallback half of [`relocate`]: full copy first, source removal last.
fn copy_then_remove(
    from: &Path,
    to: &Path,
    metadata: &Metadata,
    policy: ModePolicy,
) -> Result<Relocation, Error> {
    let data = fs::read(from).map_err(|e| relocation_error(from, to, e))?;

    let mode = match policy {
        ModePolicy::Preserve => platform::file_mode(metadata),
        ModePolicy::Permissive => PERMISSIVE_MODE,
    };
    let written = platform::write_file_with_mode(to, &data, mode).and_then(|()| match policy {
        ModePolicy::Preserve => platform::set_mode(to, mode),
        ModePolicy::Permissive => Ok(()),
    });
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(to) {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!("Could not remove partial copy {}: {}", to.display(), cleanup);
            }
        }
        return Err(relocation_error(from, to, e));
    }

    match fs::remove_file(from) {
        Ok(()) => Ok(Relocation::Copied),
        Err(e) => Ok(Relocation::CopiedSourceRemains(e)),
    }
}

fn relocation_error(from: &Path, to: &Path, source: io::Error) -> Error {
    Error::Relocation {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}
