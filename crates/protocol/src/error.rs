use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Frame-level failures. None of these abort the connection; the caller
/// logs the error, drops the frame, and keeps reading.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("missing version")]
    MissingVersion,

    #[error("invalid version")]
    InvalidVersion,

    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("truncated binary frame: {0}")]
    Truncated(&'static str),

    #[error("zero-length field in binary header")]
    ZeroLength,

    #[error("binary type name is not valid UTF-8")]
    TypeNotUtf8,
}
