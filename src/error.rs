// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong during a run.
///
/// The first group aborts the whole batch before any pipeline starts; the
/// second group is attached to a single [`PipelineOutcome`](crate::model::PipelineOutcome).
#[derive(Error, Debug)]
pub enum Error {
    /// Repository or ref list could not be read
    #[error("cannot read {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Nothing to work on
    #[error("no repositories provided")]
    NoRepositories,

    #[error("invalid date '{0}', expected YYYY/MM/DD")]
    InvalidDate(String),

    #[error("--since {since} is after --until {until}")]
    EmptyWindow { since: String, until: String },

    /// Locator resolved to an unusable identifier
    #[error("repository '{0}' does not resolve to a usable name")]
    InvalidLocator(String),

    #[error("repositories '{first}' and '{second}' both resolve to '{identifier}'")]
    IdentifierCollision {
        identifier: String,
        first: String,
        second: String,
    },

    /// Two pipelines would write the same report file
    #[error("{first} and {second} would both write report '{report}'")]
    ReportCollision {
        report: String,
        first: String,
        second: String,
    },

    #[error("repository '{locator}' is not reachable: {source}")]
    UnreachableRepository {
        locator: String,
        #[source]
        source: git2::Error,
    },

    #[error("cannot prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    // --- per pipeline ---
    #[error("checkout of '{reference}' in {identifier} failed: {detail}")]
    CheckoutFailed {
        identifier: String,
        reference: String,
        detail: String,
    },

    #[error("analysis of {target} failed: {detail}")]
    AnalysisFailed { target: String, detail: String },

    #[error("writing {path} failed: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// True for problems with what the operator passed in, as opposed to
    /// problems with the repositories themselves.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::Input { .. }
                | Error::NoRepositories
                | Error::InvalidDate(_)
                | Error::EmptyWindow { .. }
                | Error::InvalidLocator(_)
                | Error::IdentifierCollision { .. }
                | Error::ReportCollision { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
