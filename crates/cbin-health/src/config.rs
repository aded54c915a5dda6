use config::{Config, ConfigError, File as ConfigFile, FileFormat};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CHECK_INTERVAL_SEC: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SEC: u64 = 60;

/// The probe reads the same config file as `cbin`; it ignores `numWorkers`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(rename = "recycleBinDir", alias = "recyclebindir")]
    pub recycle_bin_dir: PathBuf,
    #[serde(rename = "checkIntervalSec", alias = "checkintervalsec", default)]
    pub check_interval_sec: u64,
    #[serde(rename = "maxRetries", alias = "maxretries", default)]
    pub max_retries: u32,
    #[serde(rename = "retryDelaySec", alias = "retrydelaysec", default)]
    pub retry_delay_sec: u64,
}

impl HealthConfig {
    /// Zero means "use the default" for every tunable.
    fn with_defaults(mut self) -> Self {
        if self.check_interval_sec == 0 {
            self.check_interval_sec = DEFAULT_CHECK_INTERVAL_SEC;
        }
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.retry_delay_sec == 0 {
            self.retry_delay_sec = DEFAULT_RETRY_DELAY_SEC;
        }
        self
    }
}

pub fn load_configuration(path: &Path) -> Result<HealthConfig, ConfigError> {
    let config = Config::builder()
        .add_source(ConfigFile::new(&path.to_string_lossy(), FileFormat::Json).required(true))
        .set_override_option("recycleBinDir", env::var("CBIN_RECYCLE_BIN_DIR").ok())?
        .build()?;
    Ok(config.try_deserialize::<HealthConfig>()?.with_defaults())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_tunables_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.conf");
        fs::write(
            &path,
            r#"{ "recycleBinDir": "/mnt/recycle", "numWorkers": 8, "maxRetries": 0 }"#,
        )
        .unwrap();

        let config = load_configuration(&path).unwrap();
        assert_eq!(config.check_interval_sec, DEFAULT_CHECK_INTERVAL_SEC);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.retry_delay_sec, DEFAULT_RETRY_DELAY_SEC);
    }

    #[test]
    fn test_explicit_tunables_are_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.conf");
        fs::write(
            &path,
            r#"{ "recycleBinDir": "/mnt/recycle", "checkIntervalSec": 10, "maxRetries": 2, "retryDelaySec": 1 }"#,
        )
        .unwrap();

        let config = load_configuration(&path).unwrap();
        assert_eq!(config.check_interval_sec, 10);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay_sec, 1);
    }
}
