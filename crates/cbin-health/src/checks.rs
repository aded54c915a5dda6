use crate::error::HealthError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ALIAS_LINE: &str = "alias rm='/usr/local/bin/cbin'";
pub const PROGRAM_NAME: &str = "cbin";

/// Where the probe looks. Swapped out in tests.
#[derive(Debug, Clone)]
pub struct HostPaths {
    pub proc_dir: PathBuf,
    pub mounts: PathBuf,
    pub executable: PathBuf,
    pub bashrc: PathBuf,
}

impl HostPaths {
    pub fn system() -> Self {
        Self {
            proc_dir: PathBuf::from("/proc"),
            mounts: PathBuf::from("/proc/mounts"),
            executable: PathBuf::from("/usr/local/bin/cbin"),
            bashrc: PathBuf::from("/etc/bash.bashrc"),
        }
    }
}

/// True when some process other than `own_pid` was started as `cbin`
/// (its argv[0] has that base name).
pub fn process_running(proc_dir: &Path, own_pid: u32) -> Result<bool, HealthError> {
    let entries = fs::read_dir(proc_dir).map_err(|source| HealthError::Read {
        path: proc_dir.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(pid) = file_name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        if pid == own_pid {
            continue;
        }
        // Processes can exit between read_dir and read.
        let Ok(cmdline) = fs::read(entry.path().join("cmdline")) else {
            continue;
        };
        if is_program(&cmdline) {
            debug!(pid, "Found running cbin process");
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_program(cmdline: &[u8]) -> bool {
    let argv0 = cmdline.split(|&b| b == 0).next().unwrap_or_default();
    let argv0 = String::from_utf8_lossy(argv0);
    Path::new(&*argv0)
        .file_name()
        .is_some_and(|name| name == PROGRAM_NAME)
}

pub fn path_exists(path: &Path) -> Result<bool, HealthError> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(HealthError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// True when the mount table lists at least one `nfs` or `nfs4` filesystem.
pub fn has_nfs_mount(mounts: &str) -> bool {
    mounts
        .lines()
        .filter_map(|line| line.split_whitespace().nth(2))
        .any(|fstype| fstype == "nfs" || fstype == "nfs4")
}

pub fn nfs_mounted(mounts_path: &Path) -> Result<bool, HealthError> {
    let mounts = fs::read_to_string(mounts_path).map_err(|source| HealthError::Read {
        path: mounts_path.to_path_buf(),
        source,
    })?;
    Ok(has_nfs_mount(&mounts))
}

pub fn alias_exists(bashrc: &Path) -> Result<bool, HealthError> {
    let content = read_bashrc(bashrc)?;
    Ok(content.lines().any(|line| line.contains(ALIAS_LINE)))
}

/// Drop every line carrying the `rm` alias. Returns whether the file changed;
/// an unchanged file is not rewritten.
pub fn strip_alias(bashrc: &Path) -> Result<bool, HealthError> {
    let content = read_bashrc(bashrc)?;
    let kept: Vec<&str> = content
        .split('\n')
        .filter(|line| !line.contains(ALIAS_LINE))
        .collect();
    let stripped = kept.join("\n");
    if stripped == content {
        return Ok(false);
    }

    fs::write(bashrc, stripped).map_err(|source| HealthError::Write {
        path: bashrc.to_path_buf(),
        source,
    })?;
    Ok(true)
}

fn read_bashrc(bashrc: &Path) -> Result<String, HealthError> {
    fs::read_to_string(bashrc).map_err(|source| HealthError::Read {
        path: bashrc.to_path_buf(),
        source,
    })
}
