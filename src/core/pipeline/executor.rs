//! Step execution. One request runs on one worker: steps strictly in
//! canonical order, each snapshot broadcast through the hub, and the
//! first failure halts the run with every later step left pending.

use chrono::Utc;
use tracing::{debug, error, info};

use crate::core::adapters::Adapters;
use crate::core::error::{AdapterError, AdapterResult};
use crate::core::hub::RequestHub;
use crate::core::matcher::match_users;
use crate::core::pipeline::types::{
    Request, RequestStatus, Step, StepResult, StepStatus, StepType,
};
use crate::core::ticket::{AiDecision, ChannelInfo, TicketDraft, TicketPatch, extract_channel_id};

/// Drive `request` to a terminal state against `adapters`, broadcasting
/// every state change through `hub`. Completed steps are skipped, which
/// is what makes retry re-entry safe: their stored results feed the
/// steps that do run.
pub(crate) async fn run_request(
    mut request: Request,
    adapters: &Adapters,
    hub: &RequestHub,
) -> Request {
    request.status = RequestStatus::Running;
    request.touch();
    hub.broadcast_update(&request).await;

    for index in 0..request.steps.len() {
        if request.steps[index].status == StepStatus::Completed {
            debug!(
                "request {}: skipping completed step {}",
                request.id,
                request.steps[index].step_type.as_str()
            );
            continue;
        }
        if request.steps[..index].iter().any(|s| s.status == StepStatus::Failed) {
            break;
        }

        let step_type = request.steps[index].step_type;
        request.steps[index].status = StepStatus::Running;
        request.steps[index].started_at = Some(Utc::now());
        request.touch();
        hub.broadcast_update(&request).await;
        info!("request {}: step {} started", request.id, step_type.as_str());

        let outcome = execute_step(step_type, &request, adapters).await;

        let step: &mut Step = &mut request.steps[index];
        step.completed_at = Some(Utc::now());
        let failed = match outcome {
            Ok(result) => {
                step.status = StepStatus::Completed;
                step.result = Some(result);
                info!("request {}: step {} completed", request.id, step_type.as_str());
                false
            }
            Err(err) => {
                step.status = StepStatus::Failed;
                step.error = Some(err.to_string());
                error!(
                    "request {}: step {} failed: {}",
                    request.id,
                    step_type.as_str(),
                    err
                );
                true
            }
        };
        request.touch();
        hub.broadcast_update(&request).await;

        if failed {
            break;
        }
    }

    request.status = if request.has_failure() {
        RequestStatus::Failed
    } else {
        RequestStatus::Completed
    };
    request.touch();
    hub.broadcast_update(&request).await;
    request
}

async fn execute_step(
    step_type: StepType,
    request: &Request,
    adapters: &Adapters,
) -> AdapterResult<StepResult> {
    match step_type {
        StepType::CheckExistingTickets => {
            let tickets = adapters.knowledge_base.list_tickets().await?;
            Ok(StepResult::Tickets(tickets))
        }

        StepType::AiAnalysis => {
            let candidates = request
                .result_of(StepType::CheckExistingTickets)
                .and_then(StepResult::as_tickets)
                .ok_or_else(|| missing_input(step_type))?;
            let conversation = adapters
                .helpdesk
                .get_conversation(&request.source_conversation_id)
                .await?;
            let decision = adapters
                .decision
                .find_or_create_ticket(candidates, &request.message_body, &conversation)
                .await?;
            Ok(StepResult::Decision(decision))
        }

        StepType::CreateOrUpdateTracker => {
            let decision = request
                .result_of(StepType::AiAnalysis)
                .and_then(StepResult::as_decision)
                .ok_or_else(|| missing_input(step_type))?;

            match decision {
                AiDecision::Existing { ticket } => {
                    if ticket.links_conversation(&request.source_conversation_url) {
                        // Conversation already on the record; nothing to write.
                        return Ok(StepResult::Ticket(ticket.clone()));
                    }
                    let patch = TicketPatch {
                        linked_conversations: Some(
                            ticket.linked_conversations_with(&request.source_conversation_url),
                        ),
                        ..TicketPatch::default()
                    };
                    let updated = adapters
                        .knowledge_base
                        .update_ticket(&ticket.tracker_id, patch)
                        .await?;
                    Ok(StepResult::Ticket(updated))
                }
                AiDecision::New { title, summary, .. } => {
                    let created = adapters
                        .knowledge_base
                        .create_ticket(TicketDraft {
                            title: title.clone(),
                            summary: summary.clone(),
                            linked_conversations: request.source_conversation_url.clone(),
                        })
                        .await?;
                    Ok(StepResult::Ticket(created))
                }
            }
        }

        StepType::MaybeCreateChatChannel => {
            let decision = request
                .result_of(StepType::AiAnalysis)
                .and_then(StepResult::as_decision)
                .ok_or_else(|| missing_input(step_type))?;
            let ticket = request
                .result_of(StepType::CreateOrUpdateTracker)
                .and_then(StepResult::as_ticket)
                .ok_or_else(|| missing_input(step_type))?;

            match decision {
                AiDecision::Existing { .. } => {
                    let channel = ticket
                        .chat_channel
                        .as_deref()
                        .filter(|c| !c.trim().is_empty())
                        .ok_or_else(|| AdapterError::InvalidInput {
                            field: "chat_channel",
                            detail: format!(
                                "ticket {} has no chat channel to reuse",
                                ticket.ticket_id
                            ),
                        })?;
                    let channel_id = extract_channel_id(channel)?;
                    Ok(StepResult::Channel(ChannelInfo {
                        channel_id,
                        url: channel.to_string(),
                    }))
                }
                AiDecision::New { slug, .. } => {
                    let name = format!("{}-{}", ticket.ticket_id, slug).to_lowercase();
                    let channel = adapters.chat.create_channel(&name).await?;
                    Ok(StepResult::Channel(channel))
                }
            }
        }

        StepType::MaybeUpdateTrackerWithChat => {
            let ticket = request
                .result_of(StepType::CreateOrUpdateTracker)
                .and_then(StepResult::as_ticket)
                .ok_or_else(|| missing_input(step_type))?;
            let channel = request
                .result_of(StepType::MaybeCreateChatChannel)
                .and_then(StepResult::as_channel)
                .ok_or_else(|| missing_input(step_type))?;

            if ticket.chat_channel.as_deref() == Some(channel.url.as_str()) {
                // The record already points at this channel.
                return Ok(StepResult::Ticket(ticket.clone()));
            }
            let patch = TicketPatch {
                chat_channel: Some(channel.url.clone()),
                ..TicketPatch::default()
            };
            let updated = adapters
                .knowledge_base
                .update_ticket(&ticket.tracker_id, patch)
                .await?;
            Ok(StepResult::Ticket(updated))
        }

        StepType::AddOperatorsToChat => {
            let decision = request
                .result_of(StepType::AiAnalysis)
                .and_then(StepResult::as_decision)
                .ok_or_else(|| missing_input(step_type))?;
            let channel = request
                .result_of(StepType::MaybeCreateChatChannel)
                .and_then(StepResult::as_channel)
                .ok_or_else(|| missing_input(step_type))?;
            let ticket = request
                .result_of(StepType::MaybeUpdateTrackerWithChat)
                .and_then(StepResult::as_ticket)
                .ok_or_else(|| missing_input(step_type))?;

            let operators = adapters
                .helpdesk
                .get_participating_operators(&request.source_conversation_id)
                .await?;
            let chat_users = adapters.chat.list_all_users().await?;
            let matched = match_users(&operators, &chat_users);

            match decision {
                AiDecision::Existing { .. } => {
                    let members = adapters
                        .chat
                        .list_channel_members(&channel.channel_id)
                        .await?;
                    let targets: Vec<String> = matched
                        .into_iter()
                        .filter(|id| !members.contains(id))
                        .collect();
                    if !targets.is_empty() {
                        adapters
                            .chat
                            .invite_users(&channel.channel_id, &targets)
                            .await?;
                    }
                }
                AiDecision::New { .. } => {
                    // Channel is fresh, no member diff needed.
                    if !matched.is_empty() {
                        adapters
                            .chat
                            .invite_users(&channel.channel_id, &matched)
                            .await?;
                    }
                    adapters
                        .chat
                        .set_channel_topic(&channel.channel_id, &ticket.tracker_url)
                        .await?;
                }
            }
            Ok(StepResult::Unit)
        }
    }
}

fn missing_input(step_type: StepType) -> AdapterError {
    AdapterError::MissingStepInput {
        step: step_type.as_str(),
    }
}
