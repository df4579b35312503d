//! Job feed
//!
//! Exposes the registry's job list as a watchable feed. Jobs are numbered by
//! their position in the list, which is how the contract addresses them.

use async_trait::async_trait;
use nocturne_client::JobContract;
use nocturne_core::domain::job::IndexedJob;

use crate::scheduler::watcher::{FeedSource, FetchError};

pub struct JobFeed {
    contract: JobContract,
}

impl JobFeed {
    pub fn new(contract: JobContract) -> Self {
        Self { contract }
    }
}

#[async_trait]
impl FeedSource for JobFeed {
    type Item = IndexedJob;

    async fn fetch_all(&self) -> Result<Vec<IndexedJob>, FetchError> {
        let jobs = self.contract.get_jobs().await.map_err(FetchError::new)?;

        Ok(jobs
            .into_iter()
            .enumerate()
            .map(|(index, job)| IndexedJob {
                id: index as u64,
                job,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLedger;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_jobs_are_numbered_by_position() {
        let ledger = Arc::new(FakeLedger::with_jobs(3));
        let feed = JobFeed::new(JobContract::new(ledger, "0xreg"));

        let jobs = feed.fetch_all().await.unwrap();
        let ids: Vec<u64> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(jobs[2].job.cid_manifest, "bafy-2");
    }

    #[tokio::test]
    async fn test_ledger_errors_become_fetch_errors() {
        let ledger = Arc::new(FakeLedger::default());
        ledger.go_offline();
        let feed = JobFeed::new(JobContract::new(ledger, "0xreg"));

        let err = feed.fetch_all().await.unwrap_err();
        assert!(err.to_string().contains("node unavailable"));
    }
}
