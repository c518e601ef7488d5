use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scout_core::{
    normalize_site_for_dedupe, update, Effect, JobSnapshot, JobState, JobStatus, Msg, RowOutcome,
};
use scout_logging::{scout_error, scout_info};

use crate::clock::Clock;
use crate::error::ScoutError;
use crate::row::RowHandler;
use crate::sheet::{cell_ref, SheetLayout, Spreadsheet, OUTPUT_HEADERS};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Rows per batch before a cooldown.
    pub batch_limit: usize,
    pub cooldown_secs: u64,
    /// Length of one cooldown countdown step.
    pub tick: Duration,
    /// How often a paused job checks for resume or stop.
    pub pause_poll: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            batch_limit: 80,
            cooldown_secs: 300,
            tick: Duration::from_secs(1),
            pause_poll: Duration::from_secs(1),
        }
    }
}

impl OrchestratorSettings {
    /// Fresh job record using these limits.
    pub fn new_job(&self, job_id: impl Into<String>) -> JobState {
        JobState::new(job_id, self.batch_limit, self.cooldown_secs)
    }
}

/// One pending spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub row: usize,
    pub url: String,
}

/// Shared handle on a job record. Every change goes through
/// [`scout_core::update`] under the lock; the worker and HTTP handlers hold
/// clones.
#[derive(Debug, Clone)]
pub struct JobControl {
    state: Arc<Mutex<JobState>>,
}

impl JobControl {
    pub fn new(state: JobState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn job_id(&self) -> String {
        self.lock().job_id().to_string()
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status()
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.lock().snapshot()
    }

    pub fn pause(&self) {
        self.apply(Msg::PauseRequested);
    }

    pub fn resume(&self) {
        self.apply(Msg::ResumeRequested);
    }

    pub fn stop(&self) {
        self.apply(Msg::StopRequested);
    }

    /// Apply `msg` and return the resulting effects. New job log lines are
    /// mirrored to the process log.
    pub fn apply(&self, msg: Msg) -> Vec<Effect> {
        let mut guard = self.lock();
        let before = guard.log().len();
        let (next, effects) = update(std::mem::take(&mut *guard), msg);
        *guard = next;
        for line in &guard.log()[before..] {
            scout_info!("[{}] {}", guard.job_id(), line);
        }
        effects
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Runs the row loop of one job: builds the work list, feeds row
/// boundaries into the state machine and carries out its effects.
pub struct BatchOrchestrator {
    sheet: Arc<dyn Spreadsheet>,
    rows: Arc<dyn RowHandler>,
    clock: Arc<dyn Clock>,
    layout: SheetLayout,
    settings: OrchestratorSettings,
}

impl BatchOrchestrator {
    pub fn new(
        sheet: Arc<dyn Spreadsheet>,
        rows: Arc<dyn RowHandler>,
        clock: Arc<dyn Clock>,
        layout: SheetLayout,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            sheet,
            rows,
            clock,
            layout,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Drive `job` until it reaches a terminal state.
    pub async fn run(&self, job: JobControl) {
        let work = match self.prepare(&job).await {
            Ok(work) => work,
            Err(e) => {
                scout_error!("Job {} could not start: {}", job.job_id(), e);
                job.apply(Msg::Failed {
                    message: e.to_string(),
                });
                return;
            }
        };

        let mut pending: VecDeque<WorkItem> = work.into();
        job.apply(Msg::Started {
            total_rows: Some(pending.len()),
        });

        loop {
            let effects = job.apply(Msg::Boundary {
                has_more_rows: !pending.is_empty(),
            });
            let Some(effect) = effects.first().copied() else {
                break;
            };
            match effect {
                Effect::ProcessNextRow => {
                    let Some(item) = pending.pop_front() else {
                        continue;
                    };
                    if let Err(e) = self.process(&job, item).await {
                        scout_error!("Job {} failed: {}", job.job_id(), e);
                        job.apply(Msg::Failed {
                            message: e.to_string(),
                        });
                    }
                }
                Effect::AwaitResume => self.clock.sleep(self.settings.pause_poll).await,
                Effect::Cooldown { seconds } => self.cool_down(&job, seconds).await,
                Effect::Halt => break,
            }
        }
    }

    /// Input URLs at or below the first data row whose site is not yet in
    /// the output column, in sheet order and without repeats.
    pub async fn work_list(&self) -> Result<Vec<WorkItem>, ScoutError> {
        let inputs = self.sheet.column_values(&self.layout.input_column).await?;
        let outputs = self.sheet.column_values(&self.layout.output_column).await?;

        let mut seen: HashSet<String> = outputs
            .iter()
            .skip(self.layout.header_row)
            .filter(|v| !v.trim().is_empty())
            .map(|v| normalize_site_for_dedupe(v))
            .collect();

        Ok(inputs
            .iter()
            .enumerate()
            .map(|(i, url)| (i + 1, url.trim()))
            .filter(|(row, url)| *row >= self.layout.first_data_row && !url.is_empty())
            .filter(|(_, url)| seen.insert(normalize_site_for_dedupe(url)))
            .map(|(row, url)| WorkItem {
                row,
                url: url.to_string(),
            })
            .collect())
    }

    async fn prepare(&self, job: &JobControl) -> Result<Vec<WorkItem>, ScoutError> {
        let header_cell = cell_ref(&self.layout.output_column, self.layout.header_row);
        if self.sheet.read_cell(&header_cell).await?.is_empty() {
            let headers: Vec<String> = OUTPUT_HEADERS.iter().map(|h| h.to_string()).collect();
            self.sheet.write_row(self.layout.header_row, &headers).await?;
            job.apply(Msg::Log("Wrote header row.".to_string()));
        }

        let work = self.work_list().await?;
        if work.is_empty() {
            job.apply(Msg::Log("No new URLs found in the input column.".to_string()));
        }
        Ok(work)
    }

    /// Process one row and write it back. Only fatal errors are returned.
    async fn process(&self, job: &JobControl, item: WorkItem) -> Result<(), ScoutError> {
        let job_id = job.job_id();
        let facts = match self.rows.process_row(&job_id, item.row, &item.url).await {
            Ok(facts) => facts,
            Err(e) => {
                job.apply(Msg::RowFinished {
                    row: item.row,
                    url: item.url,
                    outcome: RowOutcome::Failed {
                        reason: e.to_string(),
                    },
                });
                return if e.is_fatal() { Err(e) } else { Ok(()) };
            }
        };

        let target = self.sheet.find_next_empty_row().await.map_err(as_sheet_error)?;
        self.sheet
            .write_row(target, &facts.to_row(&item.url))
            .await
            .map_err(as_sheet_error)?;
        job.apply(Msg::RowFinished {
            row: item.row,
            url: item.url,
            outcome: RowOutcome::Written {
                summary: facts.summary(),
            },
        });
        Ok(())
    }

    /// Count the cooldown down one tick at a time; a stop ends it early.
    async fn cool_down(&self, job: &JobControl, seconds: u64) {
        let mut remaining = seconds;
        while remaining > 0 {
            if job.status() != JobStatus::Cooldown {
                return;
            }
            self.clock.sleep(self.settings.tick).await;
            remaining -= 1;
            job.apply(Msg::CooldownTick {
                remaining_secs: remaining,
            });
        }
        job.apply(Msg::CooldownFinished);
    }
}

/// Write-back failures end the job.
fn as_sheet_error(e: ScoutError) -> ScoutError {
    if e.is_fatal() {
        e
    } else {
        ScoutError::Sheet(e.to_string())
    }
}
