use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataProviderError {
    #[error("index {index} out of bounds for dataset of {len} samples")]
    OutOfBounds { index: usize, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
