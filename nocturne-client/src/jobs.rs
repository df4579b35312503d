//! Job registry contract

use std::sync::Arc;

use nocturne_core::domain::job::{Job, JobStatus};
use nocturne_core::domain::ledger::{FunctionId, MoveOption, TransactionReceipt};
use serde_json::{Value, json};
use tracing::info;

use crate::LedgerClient;
use crate::error::{ClientError, Result};

/// Module name of the registry inside the contract account
pub const JOB_MODULE: &str = "job";

/// Typed access to the job registry contract
#[derive(Clone)]
pub struct JobContract {
    client: Arc<dyn LedgerClient>,
    address: String,
}

impl JobContract {
    /// # Arguments
    /// * `client` - Ledger access used for both views and writes
    /// * `address` - Account the registry module is published under
    pub fn new(client: Arc<dyn LedgerClient>, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn function(&self, name: &str) -> FunctionId {
        FunctionId::new(&self.address, JOB_MODULE, name)
    }

    async fn view(&self, name: &str, arguments: Vec<Value>) -> Result<Value> {
        let mut values = self.client.view(&self.function(name), arguments).await?;
        if values.is_empty() {
            return Err(ClientError::ParseError(format!(
                "view function {} returned no values",
                name
            )));
        }
        Ok(values.swap_remove(0))
    }

    async fn invoke(&self, name: &str, arguments: Vec<Value>) -> Result<TransactionReceipt> {
        let receipt = self.client.invoke(&self.function(name), arguments).await?;
        info!("{} committed in transaction {}", name, receipt.hash);
        Ok(receipt)
    }

    // =============================================================================
    // Views
    // =============================================================================

    /// Every job in the registry, in submission order
    pub async fn get_jobs(&self) -> Result<Vec<Job>> {
        let value = self.view("get_jobs", Vec::new()).await?;
        decode_job_list(value)
    }

    /// A single job, or `None` if the index is past the end of the list
    pub async fn get_job(&self, job_id: u64) -> Result<Option<Job>> {
        let value = self.view("get_job", vec![json!(job_id.to_string())]).await?;
        if value.is_null() {
            return Ok(None);
        }
        let job: MoveOption<Job> = decode(value)?;
        Ok(job.into_option())
    }

    /// Aggregate status of a job
    pub async fn get_job_status(&self, job_id: u64) -> Result<JobStatus> {
        let value = self
            .view("get_job_status", vec![json!(job_id.to_string())])
            .await?;
        JobStatus::from_json(&value).map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// Jobs submitted by `creator`, optionally filtered by status
    pub async fn get_jobs_by_creator(
        &self,
        creator: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>> {
        let value = self
            .view("get_jobs_by_creator", vec![json!(creator), status_argument(status)])
            .await?;
        decode_job_list(value)
    }

    /// Jobs with a task held by `worker`, optionally filtered by task status
    pub async fn get_jobs_by_worker(
        &self,
        worker: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>> {
        let value = self
            .view("get_jobs_by_worker", vec![json!(worker), status_argument(status)])
            .await?;
        decode_job_list(value)
    }

    /// Whether `worker` holds a task of the given status in the job
    pub async fn has_worker(
        &self,
        worker: &str,
        task_status: JobStatus,
        job_id: u64,
    ) -> Result<bool> {
        let value = self
            .view(
                "has_worker",
                vec![json!(worker), json!(task_status.code()), json!(job_id.to_string())],
            )
            .await?;
        decode(value)
    }

    // =============================================================================
    // Writes
    // =============================================================================

    pub async fn submit(
        &self,
        cid_manifest: &str,
        task_count: u32,
        tip: Option<u64>,
    ) -> Result<TransactionReceipt> {
        self.invoke(
            "submit",
            vec![
                json!(cid_manifest),
                json!(task_count),
                json!(tip.unwrap_or(0).to_string()),
            ],
        )
        .await
    }

    /// Claims the first open task of a job for the sender
    pub async fn claim(&self, job_id: u64) -> Result<TransactionReceipt> {
        self.invoke("claim", vec![json!(job_id.to_string())]).await
    }

    /// Claims the oldest job that still has open tasks
    pub async fn claim_first(&self) -> Result<TransactionReceipt> {
        self.invoke("claim_first", Vec::new()).await
    }

    pub async fn complete(
        &self,
        job_id: u64,
        task_id: u64,
        cid_result: &str,
    ) -> Result<TransactionReceipt> {
        self.invoke(
            "complete",
            vec![
                json!(job_id.to_string()),
                json!(task_id.to_string()),
                json!(cid_result),
            ],
        )
        .await
    }

    /// Reports a task as failed; the registry re-opens it until retries run out
    pub async fn fail(&self, job_id: u64, task_id: u64) -> Result<TransactionReceipt> {
        self.invoke(
            "fail",
            vec![json!(job_id.to_string()), json!(task_id.to_string())],
        )
        .await
    }

    pub async fn cancel(&self, job_id: u64) -> Result<TransactionReceipt> {
        self.invoke("cancel", vec![json!(job_id.to_string())]).await
    }
}

fn status_argument(status: Option<JobStatus>) -> Value {
    json!(MoveOption::from(status.map(JobStatus::code)))
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ClientError::ParseError(e.to_string()))
}

/// Job lists come back either bare or wrapped in an option; `null` and an
/// empty option both mean no jobs.
fn decode_job_list(value: Value) -> Result<Vec<Job>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => decode(value),
        Value::Object(_) => {
            let wrapped: MoveOption<Vec<Job>> = decode(value)?;
            Ok(wrapped.into_option().unwrap_or_default())
        }
        other => Err(ClientError::ParseError(format!(
            "expected job list, got {}",
            other
        ))),
    }
}
