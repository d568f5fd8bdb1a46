use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::{
    application::handlers::dispatch_worker::{DispatchWorker, WorkerStats},
    domain::{errors::DomainResult, repositories::ScheduledMessageRepository},
};

#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub enabled: bool,
    pub pending: u64,
    pub processing: u64,
    pub failed_last_24h: u64,
    pub worker: WorkerStats,
}

pub struct QueueHealthUseCase {
    repo: Arc<dyn ScheduledMessageRepository>,
    worker: Arc<DispatchWorker>,
}

impl QueueHealthUseCase {
    pub fn new(repo: Arc<dyn ScheduledMessageRepository>, worker: Arc<DispatchWorker>) -> Self {
        Self { repo, worker }
    }

    pub async fn execute(&self) -> DomainResult<QueueHealth> {
        let stats = self.repo.stats(Utc::now()).await?;
        let worker = self.worker.stats();
        Ok(QueueHealth {
            enabled: self.worker.is_enabled(),
            pending: stats.pending,
            processing: stats.processing,
            failed_last_24h: stats.failed_last_24h,
            worker,
        })
    }
}
