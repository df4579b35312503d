//! Job processor
//!
//! Receives newly detected jobs and acts on each one for the worker
//! account: claim work that is open, report failed tasks, ignore the rest.

use async_trait::async_trait;
use nocturne_client::{ClientError, JobContract};
use nocturne_core::domain::job::{IndexedJob, JobStatus};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::scheduler::watcher::{HandlerError, NewItemsHandler};

/// Action taken for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Claim,
    Fail { task_id: u64 },
    Skip,
}

/// Chooses the action for a job in the given status
pub fn decide(status: JobStatus, task_id: u64) -> JobAction {
    match status {
        JobStatus::Created | JobStatus::InProgress => JobAction::Claim,
        JobStatus::Failed => JobAction::Fail { task_id },
        JobStatus::Completed => JobAction::Skip,
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("could not read status of job {job_id}: {source}")]
    StatusUnavailable {
        job_id: u64,
        #[source]
        source: ClientError,
    },

    #[error("{action:?} on job {job_id} failed: {source}")]
    WriteFailed {
        job_id: u64,
        action: JobAction,
        #[source]
        source: ClientError,
    },
}

pub struct JobProcessor {
    contract: JobContract,
    task_id: u64,
}

impl JobProcessor {
    /// # Arguments
    /// * `contract` - Registry the jobs belong to
    /// * `task_id` - Task reported when failing a job
    pub fn new(contract: JobContract, task_id: u64) -> Self {
        Self { contract, task_id }
    }

    /// Reads the job's status and performs the matching write
    pub async fn process(&self, job: &IndexedJob) -> Result<JobAction, ProcessError> {
        let job_id = job.id;
        info!("Processing job {} (manifest {})", job_id, job.job.cid_manifest);

        let status = self
            .contract
            .get_job_status(job_id)
            .await
            .map_err(|source| ProcessError::StatusUnavailable { job_id, source })?;

        let action = decide(status, self.task_id);
        debug!("Job {} is {}, action {:?}", job_id, status, action);

        let write = match action {
            JobAction::Claim => self.contract.claim(job_id).await,
            JobAction::Fail { task_id } => self.contract.fail(job_id, task_id).await,
            JobAction::Skip => {
                info!("Job {} status not handled: {}", job_id, status);
                return Ok(action);
            }
        };

        let receipt = write.map_err(|source| ProcessError::WriteFailed {
            job_id,
            action,
            source,
        })?;
        info!("Job {}: {:?} committed ({})", job_id, action, receipt.hash);

        Ok(action)
    }
}

#[async_trait]
impl NewItemsHandler<IndexedJob> for JobProcessor {
    /// Jobs are processed one at a time in feed order. A failure on one job is
    /// logged and does not stop the rest; the batch is only rejected when no
    /// job's status could be read at all.
    async fn on_new_items(&self, jobs: Vec<IndexedJob>) -> Result<(), HandlerError> {
        info!("{} new job(s) detected", jobs.len());

        let mut unreadable = 0;

        for job in &jobs {
            match self.process(job).await {
                Ok(_) => {}
                Err(e @ ProcessError::StatusUnavailable { .. }) => {
                    error!("{}", e);
                    unreadable += 1;
                }
                Err(ProcessError::WriteFailed {
                    job_id,
                    action,
                    source,
                }) => match source.abort_code() {
                    Some(code) => warn!(
                        "{:?} on job {} rejected by registry: {}",
                        action, job_id, code
                    ),
                    None => error!("{:?} on job {} failed: {}", action, job_id, source),
                },
            }
        }

        if !jobs.is_empty() && unreadable == jobs.len() {
            return Err(HandlerError::new(format!(
                "status of all {} job(s) unavailable",
                unreadable
            )));
        }

        Ok(())
    }
}
