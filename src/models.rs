pub mod domain {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::str::FromStr;
    use uuid::Uuid;

    /// Opaque handle of a capture job.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct JobId(Uuid);

    impl JobId {
        pub fn new() -> Self {
            JobId(Uuid::new_v4())
        }
    }

    impl Default for JobId {
        fn default() -> Self {
            Self::new()
        }
    }

    impl fmt::Display for JobId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Display::fmt(&self.0, f)
        }
    }

    impl FromStr for JobId {
        type Err = uuid::Error;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Uuid::parse_str(s).map(JobId)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum JobStatus {
        Pending,
        Running,
        Completed,
        Error,
    }

    impl JobStatus {
        pub fn is_terminal(self) -> bool {
            matches!(self, JobStatus::Completed | JobStatus::Error)
        }

        pub fn as_str(self) -> &'static str {
            match self {
                JobStatus::Pending => "pending",
                JobStatus::Running => "running",
                JobStatus::Completed => "completed",
                JobStatus::Error => "error",
            }
        }
    }

    impl fmt::Display for JobStatus {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Category of a failed capture job.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum FailureKind {
        ToolUnavailable,
        CaptureTimeout,
        CaptureFailed,
        ParseFailed,
    }
}

pub mod dto {
    use super::domain::{FailureKind, JobId, JobStatus};
    use crate::address::Address;
    use chrono::{DateTime, Utc};
    use serde::Serialize;

    #[derive(Debug, Serialize, Clone, PartialEq, Eq)]
    pub struct NodeRecord {
        pub id: String,
        pub label: String,
    }

    #[derive(Debug, Serialize, Clone, PartialEq, Eq)]
    pub struct EdgeRecord {
        pub from: String,
        pub to: String,
        pub title: String,
    }

    /// List-of-records view of a packet-derived graph.
    #[derive(Debug, Serialize, Clone)]
    pub struct GraphView {
        pub nodes: Vec<NodeRecord>,
        pub edges: Vec<EdgeRecord>,
        pub parsed: bool,
        pub host_count: usize,
        pub connection_count: usize,
    }

    #[derive(Debug, Serialize, Clone, PartialEq, Eq)]
    pub struct WeightedEdge {
        pub source: Address,
        pub destination: Address,
        pub weight: u64,
    }

    /// Counts and heaviest edges of an aggregated edge table.
    #[derive(Debug, Serialize, Clone)]
    pub struct GraphSummary {
        pub unique_ips: usize,
        pub directed_edges: usize,
        pub undirected_edges: usize,
        pub rows_repaired: usize,
        pub rows_skipped: usize,
        pub top_directed: Vec<WeightedEdge>,
        pub top_undirected: Vec<WeightedEdge>,
    }

    #[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
    pub struct PeerCount {
        pub peer: Address,
        pub packets: u64,
    }

    /// Ranked neighbors of one address.
    #[derive(Debug, Serialize, Clone, PartialEq, Eq)]
    pub struct HostPeers {
        pub ip: Address,
        pub outbound: Vec<PeerCount>,
        pub inbound: Vec<PeerCount>,
    }

    #[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
    pub struct CaptureTicket {
        pub job_id: JobId,
        pub duration_seconds: u64,
    }

    #[derive(Debug, Serialize, Clone, PartialEq, Eq)]
    pub struct StatusReport {
        pub status: JobStatus,
        pub error: Option<String>,
    }

    #[derive(Debug, Serialize, Clone)]
    pub struct JobSnapshot {
        pub id: JobId,
        pub status: JobStatus,
        pub duration_seconds: u64,
        pub interface: Option<String>,
        pub failure: Option<FailureKind>,
        pub error: Option<String>,
        pub created_at: DateTime<Utc>,
        pub finished_at: Option<DateTime<Utc>>,
    }
}
