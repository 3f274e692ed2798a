use std::path::PathBuf;
use thiserror::Error;

/// Local notes directory exists but cannot be enumerated. Fatal.
#[derive(Debug, Error)]
#[error("cannot read notes directory {path}: {source}")]
pub struct ScanError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The remote note inventory cannot be obtained. Fatal.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid payload for media {media} in snapshot {path}: {source}")]
    Payload {
        path: PathBuf,
        media: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// A single attachment could not be retrieved. Degrades the owning note,
/// never aborts the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("media {0} is not present in the snapshot")]
    Missing(String),
    #[error("timed out fetching media {0}")]
    Timeout(String),
    #[error("cannot read media bytes: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base64 media payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Remote note content could not be rendered to markdown. The note is
/// skipped and reported.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("frontmatter serialization failed: {0}")]
    Frontmatter(#[from] serde_yaml::Error),
}

/// A filesystem write failed. Non-fatal per note; the temp-file-then-rename
/// discipline guarantees no truncated file is left at the final path.
#[derive(Debug, Error)]
#[error("cannot write {path}: {source}")]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl WriteError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Inventory-level failures that abort the whole run with a non-zero exit.
/// Everything else is isolated per note or per attachment and collected
/// into the run summary instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("cannot prepare output directory {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
