use crate::checks::{self, HostPaths};
use crate::config::HealthConfig;
use crate::error::HealthError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub timestamp: DateTime<Local>,
    pub program_running: bool,
    pub recycle_bin_exists: bool,
    pub recycle_file_exists: bool,
    pub alias_exists: bool,
    pub nfs_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl HealthStatus {
    /// State served before the first check completes.
    pub fn pending() -> Self {
        Self {
            timestamp: Local::now(),
            program_running: false,
            recycle_bin_exists: false,
            recycle_file_exists: false,
            alias_exists: false,
            nfs_exists: false,
            last_error: None,
        }
    }

    fn record(&mut self, message: String) {
        warn!("{}", message);
        self.last_error = Some(message);
    }
}

pub type SharedStatus = Arc<RwLock<HealthStatus>>;

pub struct HealthChecker {
    config: HealthConfig,
    paths: HostPaths,
    status: SharedStatus,
}

impl HealthChecker {
    pub fn new(config: HealthConfig, paths: HostPaths) -> Self {
        Self {
            config,
            paths,
            status: Arc::new(RwLock::new(HealthStatus::pending())),
        }
    }

    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    /// Check every `checkIntervalSec`, starting immediately. Runs until the
    /// task is aborted.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.check_interval_sec));
        loop {
            interval.tick().await;
            let status = self.check().await;
            *self.status.write().await = status;
        }
    }

    /// One full round of checks. Strips the `rm` alias when cbin is not
    /// running or no NFS mount is present.
    pub async fn check(&self) -> HealthStatus {
        let mut status = HealthStatus::pending();

        let paths = self.paths.clone();
        let recycle_bin_dir = self.config.recycle_bin_dir.clone();
        let local = tokio::task::spawn_blocking(move || {
            (
                checks::process_running(&paths.proc_dir, std::process::id()),
                checks::path_exists(&recycle_bin_dir),
                checks::path_exists(&paths.executable),
                checks::alias_exists(&paths.bashrc),
            )
        })
        .await;

        match local {
            Ok((running, bin, executable, alias)) => {
                let running = flag(&mut status, running, "cbin process not running");
                let bin = flag(&mut status, bin, "recycle bin directory not accessible");
                let executable = flag(&mut status, executable, "cbin executable not found");
                status.program_running = running;
                status.recycle_bin_exists = bin;
                status.recycle_file_exists = executable;
                status.alias_exists = match alias {
                    Ok(exists) => exists,
                    Err(e) => {
                        status.record(e.to_string());
                        false
                    }
                };
            }
            Err(e) => status.record(format!("health check task failed: {}", e)),
        }

        let nfs_exists = self.check_nfs_with_retries(&mut status).await;
        status.nfs_exists = nfs_exists;

        if !status.program_running || !status.nfs_exists {
            warn!("Critical health check failed, removing rm alias");
            if let Err(e) = self.remove_alias().await {
                error!(error = %e, "Failed to remove alias");
            }
        }

        info!(
            program_running = status.program_running,
            recycle_bin_exists = status.recycle_bin_exists,
            recycle_file_exists = status.recycle_file_exists,
            alias_exists = status.alias_exists,
            nfs_exists = status.nfs_exists,
            last_error = status.last_error.as_deref().unwrap_or(""),
            "Health check completed"
        );
        status
    }

    async fn check_nfs_with_retries(&self, status: &mut HealthStatus) -> bool {
        let max_retries = self.config.max_retries;
        for attempt in 1..=max_retries {
            match checks::nfs_mounted(&self.paths.mounts) {
                Ok(true) => return true,
                Ok(false) => debug!("No NFS mount present"),
                Err(e) => error!(error = %e, "Failed to check NFS mount"),
            }
            warn!("NFS check failed, attempt {}/{}", attempt, max_retries);
            if attempt < max_retries {
                tokio::time::sleep(Duration::from_secs(self.config.retry_delay_sec)).await;
            }
        }
        status.record("NFS mount check failed after max retries".to_string());
        false
    }

    async fn remove_alias(&self) -> Result<bool, HealthError> {
        let bashrc = self.paths.bashrc.clone();
        match tokio::task::spawn_blocking(move || checks::strip_alias(&bashrc)).await {
            Ok(result) => {
                if let Ok(true) = result {
                    info!(bashrc = %self.paths.bashrc.display(), "Removed rm alias");
                }
                result
            }
            Err(e) => {
                error!(error = %e, "Alias removal task failed");
                Ok(false)
            }
        }
    }
}

/// Unwrap a check result, recording `what` when it is false or errored.
fn flag(status: &mut HealthStatus, result: Result<bool, HealthError>, what: &str) -> bool {
    match result {
        Ok(true) => true,
        Ok(false) => {
            status.record(what.to_string());
            false
        }
        Err(e) => {
            status.record(format!("{}: {}", what, e));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn fake_host(root: &Path, mounts: &str, cbin_running: bool) -> (HealthConfig, HostPaths) {
        let proc_dir = root.join("proc");
        fs::create_dir_all(proc_dir.join("4242")).unwrap();
        let argv0: &[u8] = if cbin_running {
            b"/usr/local/bin/cbin\0"
        } else {
            b"/usr/bin/bash\0"
        };
        fs::write(proc_dir.join("4242").join("cmdline"), argv0).unwrap();

        let paths = HostPaths {
            proc_dir,
            mounts: root.join("mounts"),
            executable: root.join("cbin"),
            bashrc: root.join("bash.bashrc"),
        };
        fs::write(&paths.mounts, mounts).unwrap();
        fs::write(&paths.executable, b"").unwrap();
        fs::write(&paths.bashrc, format!("{}\n", checks::ALIAS_LINE)).unwrap();

        let config = HealthConfig {
            recycle_bin_dir: root.to_path_buf(),
            check_interval_sec: 60,
            max_retries: 2,
            retry_delay_sec: 0,
        };
        (config, paths)
    }

    #[tokio::test]
    async fn test_healthy_host_keeps_alias() {
        let dir = tempdir().unwrap();
        let (config, paths) = fake_host(dir.path(), "srv:/x /mnt/x nfs4 rw 0 0\n", true);
        let checker = HealthChecker::new(config, paths.clone());

        let status = checker.check().await;
        assert!(status.program_running);
        assert!(status.recycle_bin_exists);
        assert!(status.recycle_file_exists);
        assert!(status.alias_exists);
        assert!(status.nfs_exists);
        assert!(status.last_error.is_none());
        assert!(checks::alias_exists(&paths.bashrc).unwrap());
    }

    #[tokio::test]
    async fn test_missing_nfs_strips_alias() {
        let dir = tempdir().unwrap();
        let (config, paths) = fake_host(dir.path(), "/dev/sda1 / ext4 rw 0 0\n", true);
        let checker = HealthChecker::new(config, paths.clone());

        let status = checker.check().await;
        assert!(!status.nfs_exists);
        assert_eq!(
            status.last_error.as_deref(),
            Some("NFS mount check failed after max retries")
        );
        assert!(!checks::alias_exists(&paths.bashrc).unwrap());
    }

    #[tokio::test]
    async fn test_stopped_program_strips_alias() {
        let dir = tempdir().unwrap();
        let (config, paths) = fake_host(dir.path(), "srv:/x /mnt/x nfs rw 0 0\n", false);
        let checker = HealthChecker::new(config, paths.clone());

        let status = checker.check().await;
        assert!(!status.program_running);
        assert!(status.nfs_exists);
        assert!(!checks::alias_exists(&paths.bashrc).unwrap());
    }

    #[test]
    fn test_status_json_omits_empty_last_error() {
        let status = HealthStatus::pending();
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("last_error").is_none());
        assert_eq!(json["program_running"], false);
        assert!(json["timestamp"].is_string());
    }
}
