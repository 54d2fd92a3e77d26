use std::sync::Arc;

use crate::core::hub::RequestHub;
use crate::core::pipeline::tests::mocks::MockSet;
use crate::core::pipeline::types::{
    ConversationEvent, Request, RequestStatus, StepStatus, StepType,
};
use crate::core::pipeline::PipelineManager;
use crate::core::ticket::{AiDecision, Ticket};

fn event() -> ConversationEvent {
    ConversationEvent {
        conversation_id: "555".to_string(),
        conversation_url: "https://app.hd.io/a/apps/XY/conversations/555".to_string(),
        message_body: "the export is broken again".to_string(),
    }
}

/// Existing-ticket script whose tracker update can be made to fail.
fn script(mocks: &MockSet) {
    let ticket = Ticket {
        ticket_id: "JMP-7".to_string(),
        tracker_id: "page-7".to_string(),
        tracker_url: "https://kb.example/page-7".to_string(),
        title: "Export failures".to_string(),
        summary: "intermittent export errors".to_string(),
        linked_conversations: None,
        chat_channel: Some("https://app.slack.com/archives/C7/p1".to_string()),
    };
    mocks.knowledge_base.seed(ticket.clone());
    *mocks.decision.verdict.lock().unwrap() = Some(AiDecision::Existing { ticket });
}

#[tokio::test]
async fn failed_step_halts_and_retry_step_resumes() {
    let mocks = MockSet::new();
    script(&mocks);
    *mocks.knowledge_base.fail_updates.lock().unwrap() = 1;

    let manager = PipelineManager::new(mocks.adapters(), Arc::new(RequestHub::new()));
    let request = manager.submit_and_wait(event()).await.unwrap();

    assert_eq!(request.status, RequestStatus::Failed);
    let failed = request.step(StepType::CreateOrUpdateTracker).unwrap();
    assert_eq!(failed.status, StepStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("update rejected"));
    for later in [
        StepType::MaybeCreateChatChannel,
        StepType::MaybeUpdateTrackerWithChat,
        StepType::AddOperatorsToChat,
    ] {
        assert_eq!(request.step(later).unwrap().status, StepStatus::Pending);
    }

    let retried = manager
        .retry_and_wait(&request.id, Some(StepType::CreateOrUpdateTracker))
        .await
        .unwrap();

    assert_eq!(retried.status, RequestStatus::Completed);
    assert!(retried
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed));

    // Earlier steps were fed from their stored results, not re-run.
    assert_eq!(*mocks.knowledge_base.list_calls.lock().unwrap(), 1);
    assert_eq!(*mocks.helpdesk.conversation_calls.lock().unwrap(), 1);
    assert_eq!(*mocks.decision.calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn retry_step_preserves_earlier_timestamps_and_results() {
    let mocks = MockSet::new();
    script(&mocks);
    *mocks.knowledge_base.fail_updates.lock().unwrap() = 1;

    let manager = PipelineManager::new(mocks.adapters(), Arc::new(RequestHub::new()));
    let request = manager.submit_and_wait(event()).await.unwrap();

    let first_started = request
        .step(StepType::CheckExistingTickets)
        .unwrap()
        .started_at;
    let analysis_result = request.result_of(StepType::AiAnalysis).cloned();
    assert!(analysis_result.is_some());

    let retried = manager
        .retry_and_wait(&request.id, Some(StepType::CreateOrUpdateTracker))
        .await
        .unwrap();

    assert_eq!(
        retried
            .step(StepType::CheckExistingTickets)
            .unwrap()
            .started_at,
        first_started
    );
    assert_eq!(retried.result_of(StepType::AiAnalysis).cloned(), analysis_result);
}

#[tokio::test]
async fn retry_all_re_executes_every_step() {
    let mocks = MockSet::new();
    script(&mocks);

    let manager = PipelineManager::new(mocks.adapters(), Arc::new(RequestHub::new()));
    let request = manager.submit_and_wait(event()).await.unwrap();
    assert_eq!(request.status, RequestStatus::Completed);

    let retried = manager.retry_and_wait(&request.id, None).await.unwrap();

    assert_eq!(retried.status, RequestStatus::Completed);
    assert_eq!(*mocks.knowledge_base.list_calls.lock().unwrap(), 2);
    assert_eq!(*mocks.helpdesk.conversation_calls.lock().unwrap(), 2);
    assert_eq!(*mocks.decision.calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn retry_of_unknown_request_is_rejected() {
    let mocks = MockSet::new();
    let manager = PipelineManager::new(mocks.adapters(), Arc::new(RequestHub::new()));
    let err = manager.retry("nope", None).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn retry_of_running_request_is_rejected() {
    let mocks = MockSet::new();
    let hub = Arc::new(RequestHub::new());
    let manager = PipelineManager::new(mocks.adapters(), hub.clone());

    let mut request = Request::new(event());
    request.status = RequestStatus::Running;
    hub.register(request.clone()).await.unwrap();

    let err = manager.retry(&request.id, None).await.unwrap_err();
    assert!(err.to_string().contains("still running"));
}

#[test]
fn reset_from_clears_step_and_everything_after() {
    let mut request = Request::new(event());
    for step in &mut request.steps {
        step.status = StepStatus::Completed;
        step.started_at = Some(chrono::Utc::now());
        step.completed_at = Some(chrono::Utc::now());
        step.result = Some(crate::core::pipeline::types::StepResult::Unit);
    }
    request.status = RequestStatus::Completed;

    request.reset_from(StepType::MaybeCreateChatChannel);

    assert_eq!(request.status, RequestStatus::Pending);
    for earlier in [
        StepType::CheckExistingTickets,
        StepType::AiAnalysis,
        StepType::CreateOrUpdateTracker,
    ] {
        assert_eq!(request.step(earlier).unwrap().status, StepStatus::Completed);
        assert!(request.step(earlier).unwrap().result.is_some());
    }
    for cleared in [
        StepType::MaybeCreateChatChannel,
        StepType::MaybeUpdateTrackerWithChat,
        StepType::AddOperatorsToChat,
    ] {
        let step = request.step(cleared).unwrap();
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.started_at.is_none());
        assert!(step.completed_at.is_none());
        assert!(step.result.is_none());
        assert!(step.error.is_none());
    }
}
