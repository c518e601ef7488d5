use serde::Serialize;

use crate::view_model::{JobSnapshot, LOG_TAIL_LINES};

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Cooldown,
    Completed,
    Stopped,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Cooldown => "cooldown",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct JobStats {
    pub batch_completed: usize,
    pub batch_limit: usize,
    pub total_completed: usize,
    pub total_errors: usize,
    pub cooldown_remaining_seconds: u64,
}

/// Mutable record of one job. Only [`crate::update`] changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    job_id: JobId,
    status: JobStatus,
    progress: u8,
    stats: JobStats,
    log: Vec<String>,
    error: Option<String>,
    total_rows: Option<usize>,
    rows_finished: usize,
    cooldown_secs: u64,
    pause_after_cooldown: bool,
}

impl JobState {
    /// A zero `batch_limit` is treated as 1.
    pub fn new(job_id: impl Into<JobId>, batch_limit: usize, cooldown_secs: u64) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            progress: 0,
            stats: JobStats {
                batch_limit: batch_limit.max(1),
                ..JobStats::default()
            },
            log: Vec::new(),
            error: None,
            total_rows: None,
            rows_finished: 0,
            cooldown_secs,
            pause_after_cooldown: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn stats(&self) -> &JobStats {
        &self.stats
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn total_rows(&self) -> Option<usize> {
        self.total_rows
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let skip = self.log.len().saturating_sub(LOG_TAIL_LINES);
        JobSnapshot {
            job_id: self.job_id.clone(),
            status: self.status,
            progress: self.progress,
            stats: self.stats.clone(),
            log: self.log[skip..].to_vec(),
            error: self.error.clone(),
        }
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        self.status = status;
    }

    pub(crate) fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }

    pub(crate) fn set_total_rows(&mut self, total_rows: Option<usize>) {
        self.total_rows = total_rows;
    }

    pub(crate) fn stats_mut(&mut self) -> &mut JobStats {
        &mut self.stats
    }

    pub(crate) fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    pub(crate) fn batch_is_full(&self) -> bool {
        self.stats.batch_completed >= self.stats.batch_limit
    }

    pub(crate) fn set_pause_after_cooldown(&mut self, value: bool) {
        self.pause_after_cooldown = value;
    }

    pub(crate) fn take_pause_after_cooldown(&mut self) -> bool {
        std::mem::take(&mut self.pause_after_cooldown)
    }

    pub(crate) fn pause_after_cooldown(&self) -> bool {
        self.pause_after_cooldown
    }

    /// Counts a finished row and raises progress; progress never goes down.
    pub(crate) fn record_row(&mut self, succeeded: bool) {
        self.rows_finished += 1;
        self.stats.batch_completed += 1;
        if succeeded {
            self.stats.total_completed += 1;
        } else {
            self.stats.total_errors += 1;
        }

        let pct = match self.total_rows {
            Some(total) if total > 0 => self.rows_finished * 100 / total,
            _ => self.stats.batch_completed * 100 / self.stats.batch_limit,
        };
        let pct = pct.min(100) as u8;
        self.progress = self.progress.max(pct);
    }

    pub(crate) fn mark_progress_complete(&mut self) {
        self.progress = 100;
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new(JobId::new(), 1, 0)
    }
}
