use crate::error::Error;
use std::fs::{self, Metadata, OpenOptions};
use std::io::{self, Write};
use std::net::IpAddr;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

/// Mode used when no source mode should be carried over (rwx for all, umask applies).
pub const PERMISSIVE_MODE: u32 = 0o777;

/// The identity a host's StagingRoot is named after: `<ip>_<hostname>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub ip: IpAddr,
    pub hostname: String,
}

impl HostIdentity {
    /// First non-loopback IPv4 address plus the system hostname.
    pub fn resolve() -> Result<Self, Error> {
        let interfaces = if_addrs::get_if_addrs()
            .map_err(|e| Error::HostIdentity(format!("failed to list interfaces: {}", e)))?;

        let ip = interfaces
            .iter()
            .map(|iface| iface.ip())
            .find(|ip| ip.is_ipv4() && !ip.is_loopback())
            .ok_or_else(|| Error::HostIdentity("no private IP found".to_string()))?;

        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        if hostname.is_empty() {
            return Err(Error::HostIdentity("empty hostname".to_string()));
        }

        Ok(Self { ip, hostname })
    }

    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.ip, self.hostname)
    }
}

pub fn file_mode(metadata: &Metadata) -> u32 {
    metadata.permissions().mode() & 0o7777
}

/// Write `data` to `path`, creating it with `mode` (subject to umask) or
/// truncating an existing placeholder.
pub fn write_file_with_mode(path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Set the exact permission bits, ignoring umask.
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tempfile::tempdir;

    #[test]
    fn test_dir_name_format() {
        let host = HostIdentity {
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 12)),
            hostname: "web-01".to_string(),
        };
        assert_eq!(host.dir_name(), "10.0.0.12_web-01");
    }

    #[test]
    fn test_write_file_then_set_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("script.sh");
        fs::write(&path, b"").unwrap();

        write_file_with_mode(&path, b"#!/bin/sh\n", 0o750).unwrap();
        set_mode(&path, 0o750).unwrap();

        let meta = fs::metadata(&path).unwrap();
        assert_eq!(file_mode(&meta), 0o750);
        assert_eq!(fs::read(&path).unwrap(), b"#!/bin/sh\n");
    }
}
