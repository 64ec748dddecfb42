use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid record: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("timestamp out of range: {0}")]
    Timestamp(i64),
}
