//!A universal, project-wide error wrapper that is also able to retain the nested cause of an [`Error`].

use itertools::Itertools;
use thiserror::Error;

/// Outcome of a request that the [`RequestExecutor`](crate::github::client::executor::RequestExecutor)
/// could not turn into a valid payload.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Gave up on [{request}] after {attempts} attempt(s); last failure = {last_failure}")]
    RetriesExhausted {
        request: String,
        attempts: u32,
        last_failure: String,
    },
    #[error("GitHub rejected [{request}] with status {status}: {body}")]
    Rejected {
        request: String,
        status: u16,
        body: String,
    },
    #[error("GitHub reported query errors for [{request}]: {}", .messages.iter().join("; "))]
    Query {
        request: String,
        messages: Vec<String>,
    },
    #[error("Could not decode response for [{request}]; nested = {nested:#?}")]
    Decode {
        request: String,
        #[source]
        nested: anyhow::Error,
    },
}

#[derive(Error, Debug)]
pub enum MineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Invalid repository identifier [{0}]; expected 'owner/name'")]
    InvalidRepositoryName(String),
    #[error("Repository [{0}] not found (renamed, deleted or private?)")]
    RepositoryNotFound(String),
    #[error("Could not clone [{repository}]; nested = {nested:#?}")]
    CloneError {
        repository: String,
        #[source]
        nested: anyhow::Error,
    },
    #[error("Static analysis failed for [{repository}]: {msg}")]
    StaticAnalysisError {
        repository: String,
        msg: String,
    },
    #[error("I/O error: {msg}; nested = {nested:#?}")]
    IoError {
        msg: String,
        #[source]
        nested: anyhow::Error,
    },
    #[error("CSV error: {msg}; nested = {nested:#?}")]
    CsvError {
        msg: String,
        #[source]
        nested: anyhow::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[macro_export]
/// Wraps a dynamic error type into an [`anyhow::Error`]. Useful in a plethora of cases for constructing
/// [`MineError`]s.
macro_rules! nested {
    ($source:expr) => {
        anyhow::Error::new($source)
    };
}
