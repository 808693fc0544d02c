use std::path::PathBuf;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("invalid product `{product_id}`: {reason}")]
    InvalidProduct { product_id: String, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("encoder `{encoder}` is unavailable: {message}")]
    Unavailable { encoder: String, message: String },
    #[error("encoder transport failure: {0}")]
    Transport(String),
    #[error("encoder returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("cannot encode empty text")]
    EmptyInput,
    #[error("encoder returned {actual} embeddings for {expected} inputs")]
    BatchSizeMismatch { expected: usize, actual: usize },
    #[error("encoder produced a {actual}-dimensional vector, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog is unavailable: {0}")]
    Unavailable(String),
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("catalog contains duplicate product id `{0}`")]
    DuplicateProduct(String),
    #[error(transparent)]
    InvalidProduct(#[from] DomainError),
}

/// Failure while scoring one catalog entry. The engine records it and moves
/// on to the next product.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProcessingError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl ProcessingError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "invalid_record",
            Self::Encode(_) => "encoding",
        }
    }
}
