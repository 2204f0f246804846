use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque correlation token returned by the job-creation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey(String);

impl JobKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Ready,
    Failed,
}

/// A submitted job, alive only until it reaches a terminal status
#[derive(Debug, Clone)]
pub struct Job {
    pub key: JobKey,
    pub status: JobStatus,
    /// Number of result lookups issued so far
    pub polls: u32,
}

impl Job {
    pub fn pending(key: JobKey) -> Self {
        Self {
            key,
            status: JobStatus::Pending,
            polls: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != JobStatus::Pending
    }
}

/// Outcome of a single result lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResponse {
    NotReady,
    Ready(String),
}
