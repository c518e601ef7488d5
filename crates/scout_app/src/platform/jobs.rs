//! In-memory registry of jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use scout_core::JobState;
use scout_engine::JobControl;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("job {0} is still active")]
    Busy(String),
}

/// Every job started since launch, by id. At most one is active.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<String, JobControl>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job under a fresh UUID unless another one is still
    /// active. `make_state` builds the initial record from the id.
    pub fn create(
        &self,
        make_state: impl FnOnce(String) -> JobState,
    ) -> Result<JobControl, JobStoreError> {
        let mut jobs = self.lock();
        if let Some(active) = jobs.values().find(|j| j.is_active()) {
            return Err(JobStoreError::Busy(active.job_id()));
        }
        let id = Uuid::new_v4().to_string();
        let job = JobControl::new(make_state(id.clone()));
        jobs.insert(id, job.clone());
        Ok(job)
    }

    pub fn get(&self, job_id: &str) -> Option<JobControl> {
        self.lock().get(job_id).cloned()
    }

    pub fn active(&self) -> Option<JobControl> {
        self.lock().values().find(|j| j.is_active()).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobControl>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}
