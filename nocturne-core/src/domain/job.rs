//! Job domain types
//!
//! Jobs live in an append-only list owned by the registry contract and are
//! addressed by their position in that list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::domain::ledger::{MoveOption, parse_u64};

/// Job record as stored by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Account that submitted the job
    pub creator: String,
    /// Content id of the manifest describing the work
    pub cid_manifest: String,
    /// Content ids of task results, once any are reported
    #[serde(default)]
    pub cid_results: MoveOption<Vec<String>>,
    /// Total tip offered to workers (decimal string)
    #[serde(default)]
    pub tip: MoveOption<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Microseconds since the epoch (decimal string)
    pub created_at: String,
    #[serde(default)]
    pub updated_at: MoveOption<String>,
    #[serde(default)]
    pub completed_at: MoveOption<String>,
}

impl Job {
    /// Aggregates task statuses into a job status.
    ///
    /// Any failed task fails the job; otherwise any task in progress keeps the
    /// job in progress; otherwise any created task leaves it created. A job
    /// without tasks is reported as failed.
    pub fn status(&self) -> JobStatus {
        if self.tasks.is_empty() {
            return JobStatus::Failed;
        }

        let mut has_in_progress = false;
        let mut has_created = false;

        for status in self.tasks.iter().filter_map(|t| t.status) {
            match status {
                JobStatus::Failed => return JobStatus::Failed,
                JobStatus::InProgress => has_in_progress = true,
                JobStatus::Created => has_created = true,
                JobStatus::Completed => {}
            }
        }

        if has_in_progress {
            JobStatus::InProgress
        } else if has_created {
            JobStatus::Created
        } else {
            JobStatus::Completed
        }
    }

    /// First task still waiting for a worker
    pub fn claimable_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.status == Some(JobStatus::Created))
    }

    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        micros_to_time(&self.created_at)
    }

    pub fn completed_at_time(&self) -> Option<DateTime<Utc>> {
        self.completed_at.as_option().and_then(|s| micros_to_time(s))
    }

    pub fn tip_amount(&self) -> Option<u64> {
        self.tip.as_option().and_then(|s| s.parse().ok())
    }

    pub fn result_cids(&self) -> &[String] {
        self.cid_results
            .as_option()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn micros_to_time(raw: &str) -> Option<DateTime<Utc>> {
    let micros: i64 = raw.parse().ok()?;
    DateTime::from_timestamp_micros(micros)
}

/// A single unit of work inside a job
///
/// Every field is optional on the wire; older contract versions omit some.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "deserialize_opt_u64")]
    pub id: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub worker: MoveOption<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default, deserialize_with = "deserialize_opt_u64")]
    pub retries: Option<u64>,
}

/// A job together with its index in the registry
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedJob {
    pub id: u64,
    pub job: Job,
}

/// Job and task status codes used by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Created,
    InProgress,
    Failed,
    Completed,
}

impl JobStatus {
    pub fn code(self) -> u8 {
        match self {
            JobStatus::Created => 11,
            JobStatus::InProgress => 12,
            JobStatus::Failed => 13,
            JobStatus::Completed => 14,
        }
    }

    pub fn from_code(code: u64) -> Result<Self, StatusDecodeError> {
        match code {
            11 => Ok(JobStatus::Created),
            12 => Ok(JobStatus::InProgress),
            13 => Ok(JobStatus::Failed),
            14 => Ok(JobStatus::Completed),
            other => Err(StatusDecodeError::UnknownStatus(other)),
        }
    }

    /// Decodes a status from a JSON number or decimal string
    pub fn from_json(value: &serde_json::Value) -> Result<Self, StatusDecodeError> {
        let code = parse_u64(value)
            .ok_or_else(|| StatusDecodeError::InvalidValue(value.to_string()))?;
        Self::from_code(code)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => write!(f, "Created"),
            JobStatus::InProgress => write!(f, "InProgress"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        JobStatus::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Error codes the registry aborts with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorCode {
    SubmitFailed,
    ClaimFailed,
    NoJobs,
    UpdateFailed,
    NotOwner,
    NotWorker,
    CallerBusy,
}

impl JobErrorCode {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(JobErrorCode::SubmitFailed),
            2 => Some(JobErrorCode::ClaimFailed),
            3 => Some(JobErrorCode::NoJobs),
            4 => Some(JobErrorCode::UpdateFailed),
            5 => Some(JobErrorCode::NotOwner),
            6 => Some(JobErrorCode::NotWorker),
            7 => Some(JobErrorCode::CallerBusy),
            _ => None,
        }
    }

    /// Extracts the abort code from a VM status such as
    /// `"Move abort in 0xabc::job: 0x7"` or `"... abort code 2"`.
    pub fn from_vm_status(vm_status: &str) -> Option<Self> {
        let token = vm_status
            .rsplit(|c: char| c == ':' || c.is_whitespace())
            .find(|s| !s.is_empty())?;

        let code = match token.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok()?,
            None => token.parse().ok()?,
        };

        Self::from_code(code)
    }
}

impl fmt::Display for JobErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobErrorCode::SubmitFailed => "submit failed",
            JobErrorCode::ClaimFailed => "claim failed",
            JobErrorCode::NoJobs => "no jobs",
            JobErrorCode::UpdateFailed => "update failed",
            JobErrorCode::NotOwner => "not owner",
            JobErrorCode::NotWorker => "not worker",
            JobErrorCode::CallerBusy => "caller busy",
        };
        f.write_str(name)
    }
}

/// Errors decoding a status value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusDecodeError {
    #[error("unknown job status code: {0}")]
    UnknownStatus(u64),

    #[error("invalid status value: {0}")]
    InvalidValue(String),
}

fn deserialize_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => parse_u64(&v)
            .map(Some)
            .ok_or_else(|| {
                serde::de::Error::custom(format!("expected unsigned integer, got {}", v))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(status: JobStatus) -> Task {
        Task {
            status: Some(status),
            ..Default::default()
        }
    }

    fn job_with(tasks: Vec<Task>) -> Job {
        Job {
            creator: "0x1".to_string(),
            cid_manifest: "bafy-manifest".to_string(),
            cid_results: MoveOption::none(),
            tip: MoveOption::none(),
            tasks,
            created_at: "1700000000000000".to_string(),
            updated_at: MoveOption::none(),
            completed_at: MoveOption::none(),
        }
    }

    #[test]
    fn test_decode_job_from_node_json() {
        let raw = json!({
            "creator": "0xcafe",
            "cid_manifest": "bafy-manifest",
            "cid_results": { "vec": [["bafy-result-0"]] },
            "tip": { "vec": ["250"] },
            "tasks": [
                { "id": "0", "worker": { "vec": [] }, "status": 11, "retries": "0" },
                { "id": 1, "status": "12" }
            ],
            "created_at": "1700000000000000",
            "updated_at": { "vec": [] },
            "completed_at": { "vec": [] }
        });

        let job: Job = serde_json::from_value(raw).unwrap();
        assert_eq!(job.creator, "0xcafe");
        assert_eq!(job.tip_amount(), Some(250));
        assert_eq!(job.result_cids().to_vec(), vec!["bafy-result-0".to_string()]);
        assert_eq!(job.tasks[0].id, Some(0));
        assert_eq!(job.tasks[1].status, Some(JobStatus::InProgress));
        assert_eq!(job.status(), JobStatus::InProgress);
        assert_eq!(
            job.created_at_time().map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(job.completed_at_time(), None);
    }

    #[test]
    fn test_decode_job_with_missing_optional_fields() {
        let raw = json!({
            "creator": "0xcafe",
            "cid_manifest": "bafy",
            "created_at": "1"
        });
        let job: Job = serde_json::from_value(raw).unwrap();
        assert!(job.tasks.is_empty());
        assert!(job.result_cids().is_empty());
        assert_eq!(job.tip_amount(), None);
    }

    #[test]
    fn test_aggregate_status() {
        assert_eq!(job_with(vec![]).status(), JobStatus::Failed);
        assert_eq!(
            job_with(vec![task(JobStatus::Completed), task(JobStatus::Failed)]).status(),
            JobStatus::Failed
        );
        assert_eq!(
            job_with(vec![task(JobStatus::Created), task(JobStatus::InProgress)]).status(),
            JobStatus::InProgress
        );
        assert_eq!(
            job_with(vec![task(JobStatus::Completed), task(JobStatus::Created)]).status(),
            JobStatus::Created
        );
        assert_eq!(
            job_with(vec![task(JobStatus::Completed), task(JobStatus::Completed)]).status(),
            JobStatus::Completed
        );
    }

    #[test]
    fn test_claimable_task_is_first_created() {
        let mut second = task(JobStatus::Created);
        second.id = Some(1);
        let job = job_with(vec![task(JobStatus::InProgress), second]);
        assert_eq!(job.claimable_task().and_then(|t| t.id), Some(1));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(JobStatus::from_json(&json!(13)), Ok(JobStatus::Failed));
        assert_eq!(JobStatus::from_json(&json!("14")), Ok(JobStatus::Completed));
        assert_eq!(
            JobStatus::from_json(&json!(99)),
            Err(StatusDecodeError::UnknownStatus(99))
        );
        assert!(JobStatus::from_json(&json!(true)).is_err());
        assert_eq!(serde_json::to_value(JobStatus::Created).unwrap(), json!(11));
    }

    #[test]
    fn test_error_code_from_vm_status() {
        assert_eq!(
            JobErrorCode::from_vm_status("Move abort in 0xabc::job: 0x7"),
            Some(JobErrorCode::CallerBusy)
        );
        assert_eq!(
            JobErrorCode::from_vm_status("execution aborted with code 2"),
            Some(JobErrorCode::ClaimFailed)
        );
        assert_eq!(JobErrorCode::from_vm_status("Executed successfully"), None);
    }
}
