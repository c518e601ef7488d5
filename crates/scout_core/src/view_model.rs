use serde::Serialize;

use crate::{JobId, JobStats, JobStatus};

/// Number of trailing log lines returned by a status query.
pub const LOG_TAIL_LINES: usize = 200;

/// Read-only copy of a job, shaped like the `/status/{job_id}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub stats: JobStats,
    pub log: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
