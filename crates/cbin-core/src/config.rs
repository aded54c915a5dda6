use config::{Config, ConfigError, File as ConfigFile, FileFormat};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/cbin/config.conf";
pub const DEFAULT_NUM_WORKERS: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "recycleBinDir", alias = "recyclebindir")]
    pub recycle_bin_dir: PathBuf,
    #[serde(
        rename = "numWorkers",
        alias = "numworkers",
        default = "default_num_workers"
    )]
    pub num_workers: usize,
}

fn default_num_workers() -> usize {
    DEFAULT_NUM_WORKERS
}

/// Resolve which config file to read: explicit path, then `CBIN_CONFIG`,
/// then the system default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => env::var_os("CBIN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
    }
}

/// Load the JSON config file. `CBIN_RECYCLE_BIN_DIR` and `CBIN_NUM_WORKERS`
/// override the file values.
pub fn load_configuration(path: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::new(&path.to_string_lossy(), FileFormat::Json).required(true))
        .set_override_option("recycleBinDir", env::var("CBIN_RECYCLE_BIN_DIR").ok())?
        .set_override_option("numWorkers", env::var("CBIN_NUM_WORKERS").ok())?
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_configuration_reads_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.conf");
        fs::write(
            &path,
            r#"{ "recycleBinDir": "/mnt/recycle", "numWorkers": 8 }"#,
        )
        .unwrap();

        let config = load_configuration(&path).unwrap();
        assert_eq!(config.recycle_bin_dir, PathBuf::from("/mnt/recycle"));
        assert_eq!(config.num_workers, 8);
    }

    #[test]
    fn test_load_configuration_defaults_workers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.conf");
        fs::write(&path, r#"{ "recycleBinDir": "/mnt/recycle" }"#).unwrap();

        let config = load_configuration(&path).unwrap();
        assert_eq!(config.num_workers, DEFAULT_NUM_WORKERS);
    }

    #[test]
    fn test_load_configuration_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(load_configuration(&dir.path().join("absent.conf")).is_err());
    }

    #[test]
    fn test_config_path_prefers_explicit() {
        let explicit = Path::new("/tmp/explicit.conf");
        assert_eq!(config_path(Some(explicit)), explicit.to_path_buf());
    }
}
