//! In-memory ledger used by the listener's tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use nocturne_client::{ClientError, LedgerClient, Result};
use nocturne_core::domain::ledger::{FunctionId, TransactionReceipt};
use nocturne_core::dto::LedgerInfo;
use serde_json::{Value, json};

#[derive(Default)]
pub struct FakeLedger {
    jobs: Mutex<Option<Vec<Value>>>,
    statuses: Mutex<HashMap<u64, u8>>,
    failing_writes: Mutex<HashMap<String, String>>,
    pub unreachable_status: Mutex<HashSet<u64>>,
    pub writes: Mutex<Vec<(String, Vec<Value>)>>,
    pub info_failures: Mutex<usize>,
    pub info_rejected: Mutex<bool>,
}

impl FakeLedger {
    /// Registry holding `count` minimal jobs
    pub fn with_jobs(count: usize) -> Self {
        let ledger = Self::default();
        ledger.set_jobs(count);
        ledger
    }

    pub fn set_jobs(&self, count: usize) {
        let jobs = (0..count)
            .map(|i| {
                json!({
                    "creator": format!("0xcreator{}", i),
                    "cid_manifest": format!("bafy-{}", i),
                    "tasks": [{ "id": "0", "status": 11 }],
                    "created_at": "1700000000000000"
                })
            })
            .collect();
        *self.jobs.lock().unwrap() = Some(jobs);
    }

    /// Makes `get_jobs` fail until jobs are set again
    pub fn go_offline(&self) {
        *self.jobs.lock().unwrap() = None;
    }

    pub fn set_status(&self, job_id: u64, code: u8) {
        self.statuses.lock().unwrap().insert(job_id, code);
    }

    pub fn fail_write(&self, function: &str, vm_status: &str) {
        self.failing_writes
            .lock()
            .unwrap()
            .insert(function.to_string(), vm_status.to_string());
    }

    /// Recorded writes as (function name, arguments)
    pub fn writes(&self) -> Vec<(String, Vec<Value>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn view(&self, function: &FunctionId, arguments: Vec<Value>) -> Result<Vec<Value>> {
        match function.function.as_str() {
            "get_jobs" => match self.jobs.lock().unwrap().clone() {
                Some(jobs) => Ok(vec![Value::Array(jobs)]),
                None => Err(ClientError::api_error(503, "node unavailable")),
            },
            "get_job_status" => {
                let job_id: u64 = arguments
                    .first()
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| ClientError::InvalidRequest("missing job id".into()))?;
                if self.unreachable_status.lock().unwrap().contains(&job_id) {
                    return Err(ClientError::api_error(503, "node unavailable"));
                }
                let code = self.statuses.lock().unwrap().get(&job_id).copied().unwrap_or(11);
                Ok(vec![json!(code)])
            }
            other => Err(ClientError::api_error(404, format!("unknown view {}", other))),
        }
    }

    async fn invoke(
        &self,
        function: &FunctionId,
        arguments: Vec<Value>,
    ) -> Result<TransactionReceipt> {
        self.writes
            .lock()
            .unwrap()
            .push((function.function.clone(), arguments));

        if let Some(vm_status) = self.failing_writes.lock().unwrap().get(&function.function) {
            return Err(ClientError::TransactionFailed {
                hash: "0xdead".to_string(),
                vm_status: vm_status.clone(),
            });
        }

        Ok(TransactionReceipt {
            hash: "0xbeef".to_string(),
            success: true,
            vm_status: "Executed successfully".to_string(),
            version: None,
        })
    }

    async fn ledger_info(&self) -> Result<LedgerInfo> {
        if *self.info_rejected.lock().unwrap() {
            return Err(ClientError::api_error(404, "no such endpoint"));
        }
        let mut failing = self.info_failures.lock().unwrap();
        if *failing > 0 {
            *failing -= 1;
            return Err(ClientError::api_error(503, "starting up"));
        }
        Ok(LedgerInfo {
            chain_id: 27,
            ledger_version: "1".to_string(),
            block_height: None,
        })
    }
}
