use crate::{MacaeError, MacaeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Generate a fresh record identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// --- Agent types ---

/// Discriminator for agent variants.
///
/// The wire string doubles as the per-session cache key and the `source`
/// recorded on persisted messages, so every value must stay unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentType {
    /// Human resources: onboarding, benefits, payroll.
    #[serde(rename = "Hr_Agent")]
    Hr,
    /// Campaigns, press releases and launch messaging.
    #[serde(rename = "Marketing_Agent")]
    Marketing,
    /// Purchasing of equipment, licenses and supplies.
    #[serde(rename = "Procurement_Agent")]
    Procurement,
    /// Product catalog, features and plans.
    #[serde(rename = "Product_Agent")]
    Product,
    /// IT setup, accounts and troubleshooting.
    #[serde(rename = "Tech_Support_Agent")]
    TechSupport,
    /// Catch-all worker for steps no other agent claims.
    #[serde(rename = "Generic_Agent")]
    Generic,
    /// Stand-in for the human reviewing the plan.
    #[serde(rename = "Human_Agent")]
    Human,
    /// Turns an input task into a plan.
    #[serde(rename = "Planner_Agent")]
    Planner,
    /// Routes approved steps to their owners.
    #[serde(rename = "Group_Chat_Manager")]
    GroupChatManager,
}

impl AgentType {
    /// Every agent type, in construction order.
    pub const ALL: [AgentType; 9] = [
        AgentType::Hr,
        AgentType::Marketing,
        AgentType::Procurement,
        AgentType::Product,
        AgentType::TechSupport,
        AgentType::Generic,
        AgentType::Human,
        AgentType::Planner,
        AgentType::GroupChatManager,
    ];

    /// Agent types that can own plan steps.
    pub const DOMAIN: [AgentType; 6] = [
        AgentType::Hr,
        AgentType::Marketing,
        AgentType::Procurement,
        AgentType::Product,
        AgentType::TechSupport,
        AgentType::Generic,
    ];

    /// Wire name, e.g. `Hr_Agent`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Hr => "Hr_Agent",
            AgentType::Marketing => "Marketing_Agent",
            AgentType::Procurement => "Procurement_Agent",
            AgentType::Product => "Product_Agent",
            AgentType::TechSupport => "Tech_Support_Agent",
            AgentType::Generic => "Generic_Agent",
            AgentType::Human => "Human_Agent",
            AgentType::Planner => "Planner_Agent",
            AgentType::GroupChatManager => "Group_Chat_Manager",
        }
    }

    /// Planner and GroupChatManager hold references to the other agents and
    /// are therefore constructed last.
    pub fn is_coordinator(&self) -> bool {
        matches!(self, AgentType::Planner | AgentType::GroupChatManager)
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = MacaeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MacaeError::UnknownAgentType(s.to_string()))
    }
}

// --- Status enums ---

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting tasks and decisions.
    Active,
    /// Its plan has finished.
    Completed,
}

/// Aggregate status of a plan, always derived from its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// No step has been decided yet.
    Planned,
    /// At least one step is approved or done, and the plan is not finished.
    InProgress,
    /// Every step is terminal and none failed.
    Completed,
    /// At least one step failed.
    Failed,
}

impl PlanStatus {
    /// Wire name, e.g. `in_progress`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Planned => "planned",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Waiting for a human decision.
    Planned,
    /// Blocked until the plan's clarification request is answered.
    AwaitingFeedback,
    /// Approved and about to be executed.
    Approved,
    /// Rejected by the human. Terminal.
    Rejected,
    /// Executed by its agent. Terminal.
    Completed,
    /// Execution failed. Terminal.
    Failed,
}

impl StepStatus {
    /// Wire name, e.g. `awaiting_feedback`.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Planned => "planned",
            StepStatus::AwaitingFeedback => "awaiting_feedback",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human decision recorded on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanApprovalStatus {
    /// No decision yet.
    Requested,
    /// Approved.
    Accepted,
    /// Rejected.
    Rejected,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The end user.
    User,
    /// An agent replying to the user.
    Assistant,
    /// System prompt or notice.
    System,
}

/// Persisted discriminator for every document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// A [`Session`].
    Session,
    /// A [`Plan`].
    Plan,
    /// A [`Step`].
    Step,
    /// An [`AgentMessage`].
    AgentMessage,
    /// A [`ChatMessage`].
    ChatMessage,
}

impl DataType {
    /// Every persisted data type.
    pub const ALL: [DataType; 5] = [
        DataType::Session,
        DataType::Plan,
        DataType::Step,
        DataType::AgentMessage,
        DataType::ChatMessage,
    ];

    /// Wire name used as the `data_type` discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Session => "session",
            DataType::Plan => "plan",
            DataType::Step => "step",
            DataType::AgentMessage => "agent_message",
            DataType::ChatMessage => "chat_message",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = MacaeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MacaeError::Validation(format!("unknown data type: {s}")))
    }
}

// --- Records ---

/// A user's conversation with the system; holds at most one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session id, supplied by the caller or generated.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Current status.
    pub status: SessionStatus,
    /// Last message surfaced to the user.
    #[serde(default)]
    pub message_to_user: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an active session.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            status: SessionStatus::Active,
            message_to_user: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The top-level unit of work derived from one input task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan id.
    pub id: String,
    /// Session the plan belongs to.
    pub session_id: String,
    /// Owning user.
    pub user_id: String,
    /// The task description the plan was derived from.
    pub initial_goal: String,
    /// The agent that produced this plan.
    pub agent_type: AgentType,
    /// Aggregate status, recomputed from the steps.
    pub overall_status: PlanStatus,
    /// Number of steps.
    pub total_steps: usize,
    /// Number of completed steps.
    pub completed: usize,
    /// Short summary of the plan.
    #[serde(default)]
    pub summary: Option<String>,
    /// Question asked of the human before work can start.
    #[serde(default)]
    pub human_clarification_request: Option<String>,
    /// The human's answer to the clarification request.
    #[serde(default)]
    pub human_clarification_response: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Create an empty plan in `Planned` status.
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        initial_goal: impl Into<String>,
        agent_type: AgentType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            initial_goal: initial_goal.into(),
            agent_type,
            overall_status: PlanStatus::Planned,
            total_steps: 0,
            completed: 0,
            summary: None,
            human_clarification_request: None,
            human_clarification_response: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One ordered sub-task of a plan, owned by a specific agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step id.
    pub id: String,
    /// Plan the step belongs to.
    pub plan_id: String,
    /// Session of the owning plan.
    pub session_id: String,
    /// Owning user.
    pub user_id: String,
    /// 1-based position within the plan.
    pub sequence: u32,
    /// What the agent should do.
    pub action: String,
    /// Agent that owns and executes the step.
    pub agent: AgentType,
    /// Current status.
    pub status: StepStatus,
    /// Whether a human must decide before execution.
    pub requires_human_feedback: bool,
    /// Free-text feedback from the human.
    #[serde(default)]
    pub human_feedback: Option<String>,
    /// Human decision.
    pub human_approval_status: HumanApprovalStatus,
    /// Action rewritten by the human, used instead of `action`.
    #[serde(default)]
    pub updated_action: Option<String>,
    /// Output of the owning agent once executed.
    #[serde(default)]
    pub agent_reply: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Step {
    /// Create a planned step for `plan`, awaiting a human decision.
    pub fn new(plan: &Plan, sequence: u32, agent: AgentType, action: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            plan_id: plan.id.clone(),
            session_id: plan.session_id.clone(),
            user_id: plan.user_id.clone(),
            sequence,
            action: action.into(),
            agent,
            status: StepStatus::Planned,
            requires_human_feedback: true,
            human_feedback: None,
            human_approval_status: HumanApprovalStatus::Requested,
            updated_action: None,
            agent_reply: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The action to execute: the human's rewrite when one was given.
    pub fn effective_action(&self) -> &str {
        self.updated_action.as_deref().unwrap_or(&self.action)
    }
}

/// Append-only log entry written by agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Message id.
    pub id: String,
    /// Session the message belongs to.
    pub session_id: String,
    /// Owning user.
    pub user_id: String,
    /// Plan the message refers to, if any.
    #[serde(default)]
    pub plan_id: Option<String>,
    /// Step the message refers to, if any.
    #[serde(default)]
    pub step_id: Option<String>,
    /// Message text.
    pub content: String,
    /// Wire name of the agent that wrote the message.
    pub source: String,
    /// When the message was written.
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    /// Create a message written by `source`.
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        source: AgentType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            plan_id: None,
            step_id: None,
            content: content.into(),
            source: source.as_str().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Attach the message to a plan.
    pub fn for_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    /// Attach the message to a step.
    pub fn for_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }
}

/// A turn of the user-facing conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id.
    pub id: String,
    /// Session the message belongs to.
    pub session_id: String,
    /// Author.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
    /// When the message was written.
    pub timestamp: DateTime<Utc>,
    /// Free-form extra attributes.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChatMessage {
    /// Create a message with the given role.
    pub fn new(session_id: impl Into<String>, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// A message from the user.
    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, ChatRole::User, content)
    }

    /// A message from an agent.
    pub fn assistant(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, ChatRole::Assistant, content)
    }
}

// --- Requests ---

/// The initial free-text task submitted by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTask {
    /// Session to attach the task to; a new one is created when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Free-text task.
    pub description: String,
}

impl InputTask {
    /// A task for a new session.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            session_id: None,
            description: description.into(),
        }
    }

    /// Attach the task to an existing session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Which steps a [`HumanFeedback`] applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackTarget {
    /// One step, by id.
    Step(String),
    /// Every non-terminal step of the plan.
    AllSteps,
}

/// Approval decision (and optional free-text feedback) from a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanFeedback {
    /// Target step; absent or blank targets every step.
    #[serde(default)]
    pub step_id: Option<String>,
    /// Plan being decided on.
    pub plan_id: String,
    /// Session of the plan.
    pub session_id: String,
    /// Approve (`true`) or reject (`false`).
    pub approved: bool,
    /// Free-text feedback.
    #[serde(default)]
    pub human_feedback: Option<String>,
    /// Replacement action for the step.
    #[serde(default)]
    pub updated_action: Option<String>,
}

impl HumanFeedback {
    /// Decision on one step.
    pub fn for_step(
        session_id: impl Into<String>,
        plan_id: impl Into<String>,
        step_id: impl Into<String>,
        approved: bool,
    ) -> Self {
        Self {
            step_id: Some(step_id.into()),
            plan_id: plan_id.into(),
            session_id: session_id.into(),
            approved,
            human_feedback: None,
            updated_action: None,
        }
    }

    /// Bulk decision applied to every open step of the plan.
    pub fn for_all_steps(
        session_id: impl Into<String>,
        plan_id: impl Into<String>,
        approved: bool,
    ) -> Self {
        Self {
            step_id: None,
            plan_id: plan_id.into(),
            session_id: session_id.into(),
            approved,
            human_feedback: None,
            updated_action: None,
        }
    }

    /// Attach free-text feedback.
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.human_feedback = Some(feedback.into());
        self
    }

    /// Replace the step's action.
    pub fn with_updated_action(mut self, action: impl Into<String>) -> Self {
        self.updated_action = Some(action.into());
        self
    }

    /// A missing or blank `step_id` targets every step of the plan.
    pub fn target(&self) -> FeedbackTarget {
        match self.step_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => FeedbackTarget::Step(id.to_string()),
            _ => FeedbackTarget::AllSteps,
        }
    }

    /// Reject requests without a plan or session.
    pub fn validate(&self) -> MacaeResult<()> {
        if self.plan_id.trim().is_empty() {
            return Err(MacaeError::Validation("plan_id is required".into()));
        }
        if self.session_id.trim().is_empty() {
            return Err(MacaeError::Validation("session_id is required".into()));
        }
        Ok(())
    }
}

/// Answer to a plan's clarification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanClarification {
    /// Plan whose request is answered.
    pub plan_id: String,
    /// Session of the plan.
    pub session_id: String,
    /// The answer.
    pub human_clarification: String,
}

impl HumanClarification {
    /// Reject requests without a plan or with an empty answer.
    pub fn validate(&self) -> MacaeResult<()> {
        if self.plan_id.trim().is_empty() {
            return Err(MacaeError::Validation("plan_id is required".into()));
        }
        if self.human_clarification.trim().is_empty() {
            return Err(MacaeError::Validation(
                "human_clarification must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// An approved step dispatched to its owning agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Step being executed.
    pub step_id: String,
    /// Plan of the step.
    pub plan_id: String,
    /// Session of the plan.
    pub session_id: String,
    /// The action to perform.
    pub action: String,
    /// Owning agent.
    pub agent: AgentType,
}

impl ActionRequest {
    /// Build the request for a step, using its updated action if any.
    pub fn from_step(step: &Step) -> Self {
        Self {
            step_id: step.id.clone(),
            plan_id: step.plan_id.clone(),
            session_id: step.session_id.clone(),
            action: step.effective_action().to_string(),
            agent: step.agent,
        }
    }
}

/// What an agent reports after executing an [`ActionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Executed step.
    pub step_id: String,
    /// Plan of the step.
    pub plan_id: String,
    /// Session of the plan.
    pub session_id: String,
    /// Agent output, or the failure reason.
    pub result: String,
    /// Either `Completed` or `Failed`.
    pub status: StepStatus,
}

impl ActionResponse {
    /// A successful execution.
    pub fn completed(request: &ActionRequest, result: impl Into<String>) -> Self {
        Self {
            step_id: request.step_id.clone(),
            plan_id: request.plan_id.clone(),
            session_id: request.session_id.clone(),
            result: result.into(),
            status: StepStatus::Completed,
        }
    }

    /// A failed execution.
    pub fn failed(request: &ActionRequest, reason: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            ..Self::completed(request, reason)
        }
    }
}

/// Result of handing an input task to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// A plan was created and persisted.
    PlanCreated {
        /// Session holding the plan.
        session_id: String,
        /// The new plan.
        plan_id: String,
    },
    /// No plan was created.
    NotCreated {
        /// Why, e.g. a missing planner.
        reason: String,
    },
    /// The agent does not create plans (stubs, workers).
    Skipped {
        /// The agent the task was handed to.
        agent: AgentType,
    },
}

/// Per-status step tallies for a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounts {
    /// Number of steps.
    pub total: usize,
    /// Steps still `Planned`.
    pub planned: usize,
    /// Steps waiting on a clarification.
    pub awaiting_feedback: usize,
    /// Steps `Approved`.
    pub approved: usize,
    /// Steps `Rejected`.
    pub rejected: usize,
    /// Steps `Completed`.
    pub completed: usize,
    /// Steps `Failed`.
    pub failed: usize,
}

impl StepCounts {
    /// Count the statuses of `steps`.
    pub fn from_steps(steps: &[Step]) -> Self {
        let mut counts = StepCounts {
            total: steps.len(),
            ..Default::default()
        };
        for step in steps {
            match step.status {
                StepStatus::Planned => counts.planned += 1,
                StepStatus::AwaitingFeedback => counts.awaiting_feedback += 1,
                StepStatus::Approved => counts.approved += 1,
                StepStatus::Rejected => counts.rejected += 1,
                StepStatus::Completed => counts.completed += 1,
                StepStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// A plan together with its ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanWithSteps {
    /// The plan itself.
    #[serde(flatten)]
    pub plan: Plan,
    /// Its steps, ordered by sequence.
    pub steps: Vec<Step>,
    /// Status tallies of the steps.
    pub counts: StepCounts,
}

impl PlanWithSteps {
    /// Pair a plan with its steps, sorting them by sequence.
    pub fn new(plan: Plan, mut steps: Vec<Step>) -> Self {
        steps.sort_by_key(|s| s.sequence);
        let counts = StepCounts::from_steps(&steps);
        Self {
            plan,
            steps,
            counts,
        }
    }
}

// --- Stored documents ---

/// Every document kind the memory context persists.
///
/// Documents carry a `data_type` discriminator; anything with an unknown
/// discriminator decodes to `Unsupported`, which stores log and ignore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "data_type", rename_all = "snake_case")]
pub enum StoredItem {
    /// A [`Session`].
    Session(Session),
    /// A [`Plan`].
    Plan(Plan),
    /// A [`Step`].
    Step(Step),
    /// An [`AgentMessage`].
    AgentMessage(AgentMessage),
    /// A [`ChatMessage`].
    ChatMessage(ChatMessage),
    /// A document with an unknown `data_type`.
    #[serde(other)]
    Unsupported,
}

impl StoredItem {
    /// Data type of the document; `None` when unsupported.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            StoredItem::Session(_) => Some(DataType::Session),
            StoredItem::Plan(_) => Some(DataType::Plan),
            StoredItem::Step(_) => Some(DataType::Step),
            StoredItem::AgentMessage(_) => Some(DataType::AgentMessage),
            StoredItem::ChatMessage(_) => Some(DataType::ChatMessage),
            StoredItem::Unsupported => None,
        }
    }

    /// Document id.
    pub fn id(&self) -> Option<&str> {
        match self {
            StoredItem::Session(s) => Some(&s.id),
            StoredItem::Plan(p) => Some(&p.id),
            StoredItem::Step(s) => Some(&s.id),
            StoredItem::AgentMessage(m) => Some(&m.id),
            StoredItem::ChatMessage(m) => Some(&m.id),
            StoredItem::Unsupported => None,
        }
    }

    /// Session the document belongs to.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            StoredItem::Session(s) => Some(&s.id),
            StoredItem::Plan(p) => Some(&p.session_id),
            StoredItem::Step(s) => Some(&s.session_id),
            StoredItem::AgentMessage(m) => Some(&m.session_id),
            StoredItem::ChatMessage(m) => Some(&m.session_id),
            StoredItem::Unsupported => None,
        }
    }

    /// Plan the document belongs to, if any.
    pub fn plan_id(&self) -> Option<&str> {
        match self {
            StoredItem::Plan(p) => Some(&p.id),
            StoredItem::Step(s) => Some(&s.plan_id),
            StoredItem::AgentMessage(m) => m.plan_id.as_deref(),
            _ => None,
        }
    }

    /// Owning user; chat messages carry none.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            StoredItem::Session(s) => Some(&s.user_id),
            StoredItem::Plan(p) => Some(&p.user_id),
            StoredItem::Step(s) => Some(&s.user_id),
            StoredItem::AgentMessage(m) => Some(&m.user_id),
            StoredItem::ChatMessage(_) | StoredItem::Unsupported => None,
        }
    }
}

/// A record type that can be stored as a [`StoredItem`].
pub trait Item: Sized {
    /// Data type this record is stored under.
    const DATA_TYPE: DataType;

    /// Record id.
    fn item_id(&self) -> &str;
    /// Wrap into a [`StoredItem`].
    fn into_stored(self) -> StoredItem;
    /// Unwrap from a [`StoredItem`]; `None` for another kind.
    fn from_stored(item: StoredItem) -> Option<Self>;
}

macro_rules! impl_item {
    ($ty:ident, $data_type:expr) => {
        impl Item for $ty {
            const DATA_TYPE: DataType = $data_type;

            fn item_id(&self) -> &str {
                &self.id
            }

            fn into_stored(self) -> StoredItem {
                StoredItem::$ty(self)
            }

            fn from_stored(item: StoredItem) -> Option<Self> {
                match item {
                    StoredItem::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for StoredItem {
            fn from(value: $ty) -> Self {
                StoredItem::$ty(value)
            }
        }
    };
}

impl_item!(Session, DataType::Session);
impl_item!(Plan, DataType::Plan);
impl_item!(Step, DataType::Step);
impl_item!(AgentMessage, DataType::AgentMessage);
impl_item!(ChatMessage, DataType::ChatMessage);
