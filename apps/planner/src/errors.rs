use thiserror::Error;

use crate::catalog::LoadError;
use crate::corpus::CorpusError;
use crate::model_client::ModelError;
use crate::ranking::RankError;

/// Application-level error type.
/// `main` logs it with its `code()` and exits with a failure status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Catalog error: {0}")]
    Load(#[from] LoadError),

    #[error("Model service error: {0}")]
    Model(#[from] ModelError),

    #[error("Ranking error: {0}")]
    Rank(#[from] RankError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Load(_) => "LOAD_ERROR",
            AppError::Model(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Rank(_) => "RANK_ERROR",
            AppError::Corpus(_) => "CORPUS_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
