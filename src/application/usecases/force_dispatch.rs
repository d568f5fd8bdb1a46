use std::sync::Arc;

use tracing::info;

use crate::{
    application::handlers::dispatch_worker::{DispatchWorker, PassSummary},
    domain::errors::DomainResult,
};

/// Operator trigger: one claim-and-dispatch pass right now, even when the
/// background loops are disabled.
pub struct ForceDispatchUseCase {
    worker: Arc<DispatchWorker>,
}

impl ForceDispatchUseCase {
    pub fn new(worker: Arc<DispatchWorker>) -> Self {
        Self { worker }
    }

    pub async fn execute(&self) -> DomainResult<PassSummary> {
        let summary = self.worker.run_once().await?;
        info!(worker = self.worker.name(), ?summary, "forced dispatch pass");
        Ok(summary)
    }
}
