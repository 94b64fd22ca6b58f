use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("database not ready after {0}ms")]
    DatabaseNotReady(u64),

    #[error("malformed archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("resource write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("translations entry missing from archive")]
    MissingTranslations,
}
