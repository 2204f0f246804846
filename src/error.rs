use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Raised before any network call when the form cannot be submitted.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Please log in before submitting.")]
    NotLoggedIn,

    #[error("Please enter an access token.")]
    MissingToken,

    #[error("Please select a file.")]
    MissingFile,

    #[error("Failed to read credential file {path}: {source}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Please enter a prompt.")]
    EmptyPrompt,

    #[error("{tool} has no field named {field}")]
    UnknownField { tool: String, field: String },
}

/// Job creation failed. Never retried.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Job submission rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Job submission failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Job submission returned an empty job key")]
    EmptyKey,
}

/// Terminal failure while waiting on a job result.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Result lookup for job {key} failed with status {status}: {body}")]
    Failed { key: String, status: u16, body: String },

    #[error("Result lookup failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Job {key} did not finish within {waited:?}")]
    TimedOut { key: String, waited: Duration },
}

/// Session cookie could not be decoded. Only ever logged.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("session cookie is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("session cookie is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session cookie has an unreadable expiry: {0}")]
    Expiry(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("A submission is already in progress")]
    Busy,

    #[error("Job task was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
