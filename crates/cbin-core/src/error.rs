use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unable to resolve host identity: {0}")]
    HostIdentity(String),

    #[error("No such file or directory: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to relocate {} to {}: {source}", .from.display(), .to.display())]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Journal error at {}: {message}", .path.display())]
    Journal { path: PathBuf, message: String },

    #[error("Refusing to overwrite existing path {}", .0.display())]
    Conflict(PathBuf),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

impl Error {
    pub(crate) fn journal(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Journal {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
