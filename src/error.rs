//! Crate-wide error taxonomy.
use thiserror::Error as ThisError;

/// Errors produced by this crate.
///
/// Only `MapperMiss`/`MapperFailure` are locally recoverable; every other
/// variant aborts the in-progress `add`/`init`/`open` call. `query` never
/// returns `MapperMiss`/`MapperFailure` to its caller directly — those are
/// logged and folded into the returned `QueryReport` instead.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("vector has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("index is already initialised")]
    AlreadyInitialised,
    #[error("index has not been initialised")]
    Uninitialised,
    #[error("vector id must not be empty")]
    EmptyId,
    #[error("hash_size {hash_size} does not fit in a u32 hash code (max 31)")]
    HashSizeTooLarge { hash_size: usize },
    #[error("storage failure: {0}")]
    StorageFailure(String),
    #[error("mapper reported no vector for id {0:?}")]
    MapperMiss(String),
    #[error(transparent)]
    MapperFailure(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by a [`Mapper`](crate::mapper::Mapper) implementation.
///
/// Distinct from [`Error`] because a miss (id not found) and a failure
/// (the lookup itself errored) carry different dispositions at the query
/// level, even though both ultimately just skip the candidate.
#[derive(Debug, ThisError)]
pub enum MapperError {
    #[error("no embedding found for id {0:?}")]
    Miss(String),
    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}
