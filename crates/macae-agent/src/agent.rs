use async_trait::async_trait;
use macae_core::{
    ActionRequest, ActionResponse, AgentType, HumanClarification, HumanFeedback, InputTask,
    MacaeResult, TaskOutcome,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Agents of one session keyed by type, in construction order.
pub type AgentMap = BTreeMap<AgentType, Arc<dyn Agent>>;

/// The capability set every agent variant exposes.
///
/// Default bodies are no-ops so a variant only implements what it handles;
/// an action request an agent cannot execute is answered with a failed
/// response rather than an error.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Display name, unique within the session.
    fn name(&self) -> &str;

    /// Variant discriminator.
    fn agent_type(&self) -> AgentType;

    /// Session the agent serves.
    fn session_id(&self) -> &str;

    /// User owning the session.
    fn user_id(&self) -> &str;

    /// `true` for placeholders substituted after a construction failure.
    fn is_stub(&self) -> bool {
        false
    }

    /// Handle a new task. Only the planner produces a plan.
    async fn handle_input_task(&self, task: &InputTask) -> MacaeResult<TaskOutcome> {
        debug!(agent_type = %self.agent_type(), len = task.description.len(), "Input task ignored");
        Ok(TaskOutcome::Skipped {
            agent: self.agent_type(),
        })
    }

    /// React to a human decision on a plan.
    async fn handle_human_feedback(&self, feedback: &HumanFeedback) -> MacaeResult<()> {
        debug!(agent_type = %self.agent_type(), plan_id = %feedback.plan_id, "Human feedback ignored");
        Ok(())
    }

    /// React to an answer to a plan's clarification request.
    async fn handle_human_clarification(
        &self,
        clarification: &HumanClarification,
    ) -> MacaeResult<()> {
        debug!(
            agent_type = %self.agent_type(),
            plan_id = %clarification.plan_id,
            "Human clarification ignored"
        );
        Ok(())
    }

    /// Execute an approved step owned by this agent.
    async fn handle_action_request(&self, request: &ActionRequest) -> MacaeResult<ActionResponse> {
        Ok(ActionResponse::failed(
            request,
            format!("{} cannot execute actions", self.agent_type()),
        ))
    }
}
