use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A filesystem entry that could not be listed or stat'd.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("walk error under {path}: {message}")]
    Walk { path: PathBuf, message: String },
    #[error("scan did not finish within {0:?}")]
    Timeout(Duration),
}

impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walk(path: impl Into<PathBuf>, err: &walkdir::Error) -> Self {
        let path = err
            .path()
            .map_or_else(|| path.into(), std::path::Path::to_path_buf);
        ScanError::Walk {
            path,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("USER_DIR is not set")]
    MissingRoot,
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("mail configuration incomplete: {0} is not set")]
    Incomplete(&'static str),
    #[error("invalid schedule: {0}")]
    Schedule(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("cannot read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("transport failure: {0}")]
    Transport(String),
}
