//! The daemon's HTTP edge: inbound webhooks from the helpdesk and the
//! tracker, plus a small read/retry surface over the request registry.

pub mod handlers;
mod router;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

pub use router::build_router;

use crate::core::adapters::KnowledgeBase;
use crate::core::hub::RequestHub;
use crate::core::notifier::DoneNotifier;
use crate::core::pipeline::PipelineManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PipelineManager>,
    pub hub: Arc<RequestHub>,
    pub notifier: Arc<DoneNotifier>,
    pub knowledge_base: Arc<dyn KnowledgeBase>,
    /// Property id the tracker webhook watches for.
    pub done_property_id: String,
}

pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
}

impl ApiServer {
    pub fn new(state: AppState, host: String, port: u16) -> Self {
        Self { state, host, port }
    }

    pub async fn serve(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("API server running at http://{}", addr);
        axum::serve(listener, router::build_router(self.state)).await?;
        Ok(())
    }
}
