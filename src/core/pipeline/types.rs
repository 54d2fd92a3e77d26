use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ticket::{AiDecision, ChannelInfo, Ticket};

/// The six units of work, in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    CheckExistingTickets,
    AiAnalysis,
    CreateOrUpdateTracker,
    MaybeCreateChatChannel,
    MaybeUpdateTrackerWithChat,
    AddOperatorsToChat,
}

impl StepType {
    pub const CANONICAL_ORDER: [StepType; 6] = [
        StepType::CheckExistingTickets,
        StepType::AiAnalysis,
        StepType::CreateOrUpdateTracker,
        StepType::MaybeCreateChatChannel,
        StepType::MaybeUpdateTrackerWithChat,
        StepType::AddOperatorsToChat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepType::CheckExistingTickets => "check_existing_tickets",
            StepType::AiAnalysis => "ai_analysis",
            StepType::CreateOrUpdateTracker => "create_or_update_tracker",
            StepType::MaybeCreateChatChannel => "maybe_create_chat_channel",
            StepType::MaybeUpdateTrackerWithChat => "maybe_update_tracker_with_chat",
            StepType::AddOperatorsToChat => "add_operators_to_chat",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "check_existing_tickets" => Some(StepType::CheckExistingTickets),
            "ai_analysis" => Some(StepType::AiAnalysis),
            "create_or_update_tracker" => Some(StepType::CreateOrUpdateTracker),
            "maybe_create_chat_channel" => Some(StepType::MaybeCreateChatChannel),
            "maybe_update_tracker_with_chat" => Some(StepType::MaybeUpdateTrackerWithChat),
            "add_operators_to_chat" => Some(StepType::AddOperatorsToChat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Typed payload of a completed step. Each step type produces exactly
/// one of these shapes; later steps pattern-match on the accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepResult {
    Tickets(Vec<Ticket>),
    Decision(AiDecision),
    Ticket(Ticket),
    Channel(ChannelInfo),
    Unit,
}

impl StepResult {
    pub fn as_tickets(&self) -> Option<&[Ticket]> {
        match self {
            StepResult::Tickets(tickets) => Some(tickets),
            _ => None,
        }
    }

    pub fn as_decision(&self) -> Option<&AiDecision> {
        match self {
            StepResult::Decision(decision) => Some(decision),
            _ => None,
        }
    }

    pub fn as_ticket(&self) -> Option<&Ticket> {
        match self {
            StepResult::Ticket(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelInfo> {
        match self {
            StepResult::Channel(channel) => Some(channel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<StepResult>,
    pub error: Option<String>,
}

impl Step {
    fn new(step_type: StepType) -> Self {
        Self {
            step_type,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Back to pristine pending state.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.result = None;
        self.error = None;
    }
}

/// The inbound event one pipeline run is triggered by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub conversation_id: String,
    pub conversation_url: String,
    pub message_body: String,
}

/// One pipeline invocation: six steps in canonical order plus the
/// triggering event and lifecycle timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub source_conversation_id: String,
    pub source_conversation_url: String,
    pub message_body: String,
    pub status: RequestStatus,
    pub steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    pub fn new(event: ConversationEvent) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_conversation_id: event.conversation_id,
            source_conversation_url: event.conversation_url,
            message_body: event.message_body,
            status: RequestStatus::Pending,
            steps: StepType::CANONICAL_ORDER.iter().copied().map(Step::new).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn step(&self, step_type: StepType) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_type == step_type)
    }

    /// Stored result of a completed step, if any.
    pub fn result_of(&self, step_type: StepType) -> Option<&StepResult> {
        self.step(step_type).and_then(|s| s.result.as_ref())
    }

    pub fn has_failure(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Reset `step_type` and everything after it; earlier results stay
    /// in place to feed the re-run.
    pub fn reset_from(&mut self, step_type: StepType) {
        let Some(start) = self.steps.iter().position(|s| s.step_type == step_type) else {
            return;
        };
        for step in &mut self.steps[start..] {
            step.reset();
        }
        self.status = RequestStatus::Pending;
    }

    pub fn reset_all(&mut self) {
        for step in &mut self.steps {
            step.reset();
        }
        self.status = RequestStatus::Pending;
    }
}
