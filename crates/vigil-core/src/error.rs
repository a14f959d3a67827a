use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open storage: {0}")]
    Open(String),
    #[error("failed to write: {0}")]
    Write(String),
    #[error("failed to read: {0}")]
    Read(String),
    #[error("corrupt index entry: {0}")]
    CorruptIndex(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Error)]
#[error("invalid trace id: {0:?}")]
pub struct InvalidTraceId(pub String);
