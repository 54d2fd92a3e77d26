//! The integration request pipeline: data model, step executor, and the
//! manager that dispatches pipeline workers and retries.

mod executor;
pub mod types;

use std::sync::Arc;

use anyhow::{Result, bail};

pub use types::{
    ConversationEvent, Request, RequestStatus, Step, StepResult, StepStatus, StepType,
};

use crate::core::adapters::Adapters;
use crate::core::hub::RequestHub;

/// Creates, runs, and retries pipeline requests. Each run happens on its
/// own worker task; state changes flow through the [`RequestHub`].
pub struct PipelineManager {
    adapters: Adapters,
    hub: Arc<RequestHub>,
}

impl PipelineManager {
    pub fn new(adapters: Adapters, hub: Arc<RequestHub>) -> Self {
        Self { adapters, hub }
    }

    /// Register a new request for `event` and run it in the background.
    /// Returns the request id immediately.
    pub async fn submit(&self, event: ConversationEvent) -> Result<String> {
        let request = Request::new(event);
        let id = request.id.clone();
        self.hub.register(request.clone()).await?;
        self.spawn_worker(request);
        Ok(id)
    }

    /// Like [`submit`](Self::submit), but awaits the terminal snapshot.
    pub async fn submit_and_wait(&self, event: ConversationEvent) -> Result<Request> {
        let request = Request::new(event);
        self.hub.register(request.clone()).await?;
        Ok(executor::run_request(request, &self.adapters, &self.hub).await)
    }

    /// Reset one step (and everything after it) or, with `step` absent,
    /// the whole request, then re-run in the background.
    pub async fn retry(&self, id: &str, step: Option<StepType>) -> Result<()> {
        let request = self.prepare_retry(id, step).await?;
        self.spawn_worker(request);
        Ok(())
    }

    /// Like [`retry`](Self::retry), but awaits the terminal snapshot.
    pub async fn retry_and_wait(&self, id: &str, step: Option<StepType>) -> Result<Request> {
        let request = self.prepare_retry(id, step).await?;
        Ok(executor::run_request(request, &self.adapters, &self.hub).await)
    }

    async fn prepare_retry(&self, id: &str, step: Option<StepType>) -> Result<Request> {
        let Some(mut request) = self.hub.get(id).await else {
            bail!("request {} not found", id);
        };
        if request.status == RequestStatus::Running {
            bail!("request {} is still running", id);
        }

        match step {
            Some(step_type) => request.reset_from(step_type),
            None => request.reset_all(),
        }
        request.touch();
        self.hub.broadcast_update(&request).await;
        Ok(request)
    }

    fn spawn_worker(&self, request: Request) {
        let adapters = self.adapters.clone();
        let hub = Arc::clone(&self.hub);
        tokio::spawn(async move {
            executor::run_request(request, &adapters, &hub).await;
        });
    }
}

#[cfg(test)]
mod tests;
