use std::sync::Arc;

use anyhow::Result;

use deskbridge::config::AppConfig;
use deskbridge::core::adapters::Adapters;
use deskbridge::core::hub::RequestHub;
use deskbridge::core::notifier::DoneNotifier;
use deskbridge::core::pipeline::PipelineManager;
use deskbridge::interfaces::web::{ApiServer, AppState};
use deskbridge::logging;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = AppConfig::from_env()?;
    let adapters = Adapters::from_config(&config)?;

    let hub = Arc::new(RequestHub::new());
    let manager = Arc::new(PipelineManager::new(adapters.clone(), Arc::clone(&hub)));
    let notifier = Arc::new(DoneNotifier::new(
        adapters.helpdesk.clone(),
        adapters.chat.clone(),
        config.done_notify_channel.clone(),
    ));

    let state = AppState {
        manager,
        hub,
        notifier,
        knowledge_base: adapters.knowledge_base.clone(),
        done_property_id: config.knowledge_base.done_property_id.clone(),
    };

    ApiServer::new(state, config.api_host.clone(), config.api_port)
        .serve()
        .await
}
