use crate::models::domain::{FailureKind, JobId, JobStatus};
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The edge table had no rows at all, not even a header.
    #[error("empty input: no header row")]
    InputEmpty,

    #[error("{0}")]
    ToolUnavailable(String),

    #[error("capture timed out after {}s", .0.as_secs())]
    CaptureTimeout(Duration),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("parse error: {0}")]
    ParseFailed(String),

    #[error("unsupported capture file {0}: expected .pcap or .pcapng")]
    UnsupportedArtifact(String),

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("job {id} not completed (status: {status})")]
    JobNotReady { id: JobId, status: JobStatus },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    /// How a capture job records this error once it reaches the `error` state.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::ToolUnavailable(_) => FailureKind::ToolUnavailable,
            Error::CaptureTimeout(_) => FailureKind::CaptureTimeout,
            Error::ParseFailed(_) | Error::UnsupportedArtifact(_) | Error::Csv(_) => {
                FailureKind::ParseFailed
            }
            _ => FailureKind::CaptureFailed,
        }
    }
}

/// Why a single edge-table row was left out of the graph.
///
/// These never escape the aggregator; they only feed the skipped counter and
/// debug logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowDefect {
    #[error("count {0:?} is not a non-negative integer")]
    BadCount(String),

    #[error("found {0} valid address(es), need 2")]
    TooFewAddresses(usize),

    #[error("record could not be decoded: {0}")]
    Undecodable(String),
}
