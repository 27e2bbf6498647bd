use egret_data_provider::{DataProviderError, Split};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("cannot draw {count} distinct indices from a pool of {pool_size}")]
    SubsetExceedsPool { count: usize, pool_size: usize },

    #[error("task {task} expected a {expected} sample, got {id}")]
    WrongSampleKind {
        task: String,
        expected: &'static str,
        id: String,
    },

    #[error("sample {id} has an empty answer list")]
    MissingAnswers { id: String },

    #[error("dataset constructed for split {actual:?}, expected {expected:?}")]
    WrongSplit { expected: Split, actual: Split },

    #[error(
        "candidate prefix of {prefix_len} tokens never occurs in the \
         {sequence_len}-token scored sequence"
    )]
    PrefixNotAligned {
        prefix_len: usize,
        sequence_len: usize,
    },

    #[error("dataset error: {0}")]
    Dataset(#[from] DataProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model inference failed: {0}")]
    Model(#[source] anyhow::Error),

    #[error("tokenizer failed: {0}")]
    Tokenizer(#[source] anyhow::Error),

    #[error("corpus scorer failed: {0}")]
    Scorer(#[source] anyhow::Error),
}

impl EvalError {
    /// Whether this is a configuration problem (bad sizes, mismatched task
    /// and dataset) rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EvalError::SubsetExceedsPool { .. }
                | EvalError::WrongSampleKind { .. }
                | EvalError::MissingAnswers { .. }
                | EvalError::WrongSplit { .. }
        )
    }
}
