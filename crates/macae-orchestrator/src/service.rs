use crate::factory::{AgentFactory, AgentSet};
use futures_util::future::join_all;
use macae_agent::{ChatCompletionsClient, ClientConfig, ProjectClient};
use macae_core::{
    AgentMessage, DataType, ErrorCode, HumanClarification, HumanFeedback, InputTask, MacaeError,
    MacaeResult, Plan, PlanWithSteps, Step, StoredItem, TaskOutcome,
};
use macae_memory::{MemoryContext, MemoryProvider};
use macae_security::{rai_success, ContentSafety, SanitizeResult, Sanitizer};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Session key used for reads that span every session of a user.
const USER_SCOPE: &str = "";

/// Structured acknowledgement of a write operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceResponse {
    /// Human-readable outcome, e.g. `Plan created with ID: ...`.
    pub status: String,
    /// Session the request touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Plan the request touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    /// Step the request touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Extra detail for the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Why the request had no effect, when it was accepted without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ServiceResponse {
    /// A response with only a status.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            session_id: None,
            plan_id: None,
            step_id: None,
            message: None,
            code: None,
        }
    }

    /// Attach the session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach the plan id.
    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    /// Attach the step id, if any.
    pub fn with_step(mut self, step_id: Option<String>) -> Self {
        self.step_id = step_id;
        self
    }

    /// Attach extra detail.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Code explaining why a request was acknowledged without effect.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Whether a task submission produced a plan.
    pub fn is_plan_created(&self) -> bool {
        self.plan_id.is_some()
    }
}

/// Error reported to callers: a stable code plus a readable message.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{code}: {message}")]
pub struct ServiceError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Readable description.
    pub message: String,
}

impl ServiceError {
    /// An error with the given code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<MacaeError> for ServiceError {
    fn from(e: MacaeError) -> Self {
        Self::new(e.error_code(), e.to_string())
    }
}

/// Result of a [`TaskService`] operation.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Request boundary: validates and screens input, wires the session's
/// memory, client and agents, and translates every failure into a
/// [`ServiceError`].
pub struct TaskService {
    factory: Arc<AgentFactory>,
    memory: Arc<MemoryProvider>,
    safety: Arc<dyn ContentSafety>,
    sanitizer: Sanitizer,
    client_config: Option<ClientConfig>,
}

impl TaskService {
    /// A service over the given factory, memory provider and content check.
    pub fn new(
        factory: Arc<AgentFactory>,
        memory: Arc<MemoryProvider>,
        safety: Arc<dyn ContentSafety>,
    ) -> Self {
        Self {
            factory,
            memory,
            safety,
            sanitizer: Sanitizer::default(),
            client_config: None,
        }
    }

    /// Replace the input sanitizer.
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Project client settings; ignored unless an endpoint and deployment
    /// are configured.
    pub fn with_client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = config.is_configured().then_some(config);
        self
    }

    /// The agent factory.
    pub fn factory(&self) -> &Arc<AgentFactory> {
        &self.factory
    }

    /// The memory provider.
    pub fn memory(&self) -> &Arc<MemoryProvider> {
        &self.memory
    }

    fn require_user(&self, user_id: &str) -> ServiceResult<String> {
        let user = self.sanitizer.sanitize_identifier(user_id);
        if user.is_empty() {
            return Err(ServiceError::new(ErrorCode::ValidationError, "no user"));
        }
        Ok(user)
    }

    /// The session's project client: the one already registered for it, or
    /// a new one when a client is configured.
    fn session_client(&self, session_id: &str) -> MacaeResult<Option<Arc<dyn ProjectClient>>> {
        if let Some(client) = self.factory.registry().session_client(session_id) {
            return Ok(Some(client));
        }
        match &self.client_config {
            Some(config) => Ok(Some(Arc::new(ChatCompletionsClient::new(config)?))),
            None => Ok(None),
        }
    }

    /// The plan, provided it belongs to `user_id`. Plans owned by anyone
    /// else are reported as missing.
    async fn owned_plan(&self, session_id: &str, user_id: &str, plan_id: &str) -> MacaeResult<Plan> {
        let memory = self.memory.context_for(session_id, user_id).await?;
        memory
            .get_plan(plan_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| MacaeError::not_found("plan", plan_id))
    }

    async fn session_agents(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> MacaeResult<(Arc<dyn MemoryContext>, AgentSet)> {
        let memory = self.memory.context_for(session_id, user_id).await?;
        let client = self.session_client(session_id)?;
        let agents = self
            .factory
            .create_all_agents(session_id, user_id, Arc::clone(&memory), client)
            .await?;
        Ok((memory, agents))
    }

    /// Screen, plan and persist a new task.
    ///
    /// Content that fails screening is not an error: the response carries
    /// a "Plan not created" status and no plan id.
    pub async fn submit_task(&self, user_id: &str, task: InputTask) -> ServiceResult<ServiceResponse> {
        let user_id = self.require_user(user_id)?;
        let description = match self.sanitizer.sanitize(&task.description) {
            SanitizeResult::Rejected(reason) => {
                return Err(ServiceError::new(ErrorCode::ValidationError, reason))
            }
            cleaned => cleaned.into_string().unwrap_or_default(),
        };
        let session_id = task
            .session_id
            .as_deref()
            .map(|s| self.sanitizer.sanitize_identifier(s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(macae_core::new_id);

        if !rai_success(self.safety.as_ref(), &description).await {
            warn!(session_id = %session_id, "Task rejected by content safety");
            return Ok(ServiceResponse::new("Plan not created")
                .with_session(session_id)
                .with_message("Request contains content that is not allowed")
                .with_code(ErrorCode::ContentRejected));
        }

        let task = InputTask::new(description.clone()).with_session(session_id.clone());
        match self.plan_task(&session_id, &user_id, &task).await {
            Ok(response) => Ok(response),
            Err(e @ (MacaeError::Validation(_) | MacaeError::NotFound { .. })) => Err(e.into()),
            Err(e) => {
                error!(
                    session_id = %session_id,
                    description = %description,
                    error = %e,
                    "Error creating plan"
                );
                Err(ServiceError::new(ErrorCode::TaskError, "Error creating plan"))
            }
        }
    }

    async fn plan_task(
        &self,
        session_id: &str,
        user_id: &str,
        task: &InputTask,
    ) -> MacaeResult<ServiceResponse> {
        let (memory, agents) = self.session_agents(session_id, user_id).await?;
        match agents.group_chat_manager()?.handle_input_task(task).await? {
            TaskOutcome::PlanCreated {
                session_id,
                plan_id,
            } => {
                if memory.get_plan(&plan_id).await?.is_none() {
                    return Err(MacaeError::not_found("plan", plan_id));
                }
                info!(session_id = %session_id, plan_id = %plan_id, "Plan created");
                Ok(ServiceResponse::new(format!("Plan created with ID: {plan_id}"))
                    .with_session(session_id)
                    .with_plan(plan_id))
            }
            TaskOutcome::NotCreated { reason } => Ok(ServiceResponse::new("Plan not created")
                .with_session(session_id)
                .with_message(reason)),
            TaskOutcome::Skipped { agent } => Err(MacaeError::Orchestrator(format!(
                "task was not handled by {agent}"
            ))),
        }
    }

    /// Record feedback on a step (or every step) without approving it.
    pub async fn human_feedback(
        &self,
        user_id: &str,
        feedback: HumanFeedback,
    ) -> ServiceResult<ServiceResponse> {
        let user_id = self.require_user(user_id)?;
        feedback.validate()?;
        self.owned_plan(&feedback.session_id, &user_id, &feedback.plan_id)
            .await?;
        let (_, agents) = self.session_agents(&feedback.session_id, &user_id).await?;
        agents.human()?.handle_human_feedback(&feedback).await?;
        Ok(ServiceResponse::new("Feedback received")
            .with_session(feedback.session_id)
            .with_plan(feedback.plan_id)
            .with_step(feedback.step_id))
    }

    /// Approve or reject one step, or every open step when `step_id` is
    /// absent.
    pub async fn approve_step_or_steps(
        &self,
        user_id: &str,
        feedback: HumanFeedback,
    ) -> ServiceResult<ServiceResponse> {
        let user_id = self.require_user(user_id)?;
        feedback.validate()?;
        self.owned_plan(&feedback.session_id, &user_id, &feedback.plan_id)
            .await?;
        let (_, agents) = self.session_agents(&feedback.session_id, &user_id).await?;
        agents
            .group_chat_manager()?
            .handle_human_feedback(&feedback)
            .await?;

        let status = match &feedback.step_id {
            Some(step_id) if !step_id.trim().is_empty() => {
                format!("Step {} - Approval:{}.", step_id, feedback.approved)
            }
            _ if feedback.approved => "All steps approved".to_string(),
            _ => "All steps rejected".to_string(),
        };
        Ok(ServiceResponse::new(status)
            .with_session(feedback.session_id)
            .with_plan(feedback.plan_id)
            .with_step(feedback.step_id))
    }

    /// Answer a plan's clarification request and release its steps.
    pub async fn human_clarification(
        &self,
        user_id: &str,
        clarification: HumanClarification,
    ) -> ServiceResult<ServiceResponse> {
        let user_id = self.require_user(user_id)?;
        clarification.validate()?;
        self.owned_plan(&clarification.session_id, &user_id, &clarification.plan_id)
            .await?;
        let (_, agents) = self
            .session_agents(&clarification.session_id, &user_id)
            .await?;
        agents
            .group_chat_manager()?
            .handle_human_clarification(&clarification)
            .await?;
        Ok(ServiceResponse::new("Clarification received")
            .with_session(clarification.session_id)
            .with_plan(clarification.plan_id))
    }

    /// Plans of a user with their steps, optionally narrowed to one session.
    pub async fn get_plans(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> ServiceResult<Vec<PlanWithSteps>> {
        let user_id = self.require_user(user_id)?;
        let memory = self.memory.context_for(USER_SCOPE, &user_id).await?;

        let plans = match session_id {
            Some(sid) => {
                let plan = memory
                    .get_plan_by_session(sid)
                    .await?
                    .filter(|p| p.user_id == user_id)
                    .ok_or_else(|| MacaeError::not_found("plan", sid))?;
                vec![plan]
            }
            None => memory.get_all_plans().await?,
        };

        let step_lists = join_all(plans.iter().map(|p| memory.get_steps_by_plan(&p.id))).await;
        let mut result = Vec::with_capacity(plans.len());
        for (plan, steps) in plans.into_iter().zip(step_lists) {
            result.push(PlanWithSteps::new(plan, steps?));
        }
        result.sort_by(|a, b| b.plan.created_at.cmp(&a.plan.created_at));
        Ok(result)
    }

    /// Steps of a plan owned by the user, ordered by sequence.
    pub async fn get_steps(&self, user_id: &str, plan_id: &str) -> ServiceResult<Vec<Step>> {
        let user_id = self.require_user(user_id)?;
        let memory = self.memory.context_for(USER_SCOPE, &user_id).await?;
        let plan = memory
            .get_plan(plan_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| MacaeError::not_found("plan", plan_id))?;
        Ok(memory.get_steps_by_plan(&plan.id).await?)
    }

    /// Agent messages of a session that belong to the user.
    pub async fn get_agent_messages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> ServiceResult<Vec<AgentMessage>> {
        let user_id = self.require_user(user_id)?;
        let memory = self.memory.context_for(session_id, &user_id).await?;
        let messages = memory.get_agent_messages(session_id).await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.user_id == user_id)
            .collect())
    }

    /// Every stored document belonging to the user's sessions.
    pub async fn get_all_messages(&self, user_id: &str) -> ServiceResult<Vec<StoredItem>> {
        let user_id = self.require_user(user_id)?;
        let memory = self.memory.context_for(USER_SCOPE, &user_id).await?;
        let items = memory.get_all_items().await?;

        let sessions: HashSet<String> = items
            .iter()
            .filter(|item| item.user_id() == Some(user_id.as_str()))
            .filter_map(|item| item.session_id().map(str::to_string))
            .collect();
        Ok(items
            .into_iter()
            .filter(|item| match item.user_id() {
                Some(owner) => owner == user_id,
                None => item.session_id().is_some_and(|sid| sessions.contains(sid)),
            })
            .collect())
    }

    /// Delete every stored document and reset the agent and memory caches.
    pub async fn delete_all_messages(&self, user_id: &str) -> ServiceResult<ServiceResponse> {
        let user_id = self.require_user(user_id)?;
        let memory = self.memory.context_for(USER_SCOPE, &user_id).await?;
        for data_type in DataType::ALL {
            memory.delete_all_items(data_type).await?;
        }
        self.factory.clear_cache(None).await;
        self.memory.clear();
        info!(user_id = %user_id, "All messages deleted");
        Ok(ServiceResponse::new("All messages deleted"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_response_omits_missing_ids() {
        let response = ServiceResponse::new("Plan not created").with_session("s1");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "Plan not created", "session_id": "s1"})
        );
        assert!(!response.is_plan_created());
    }

    #[test]
    fn test_rejection_code_is_serialized() {
        let response = ServiceResponse::new("Plan not created")
            .with_session("s1")
            .with_code(ErrorCode::ContentRejected);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["code"], "CONTENT_REJECTED");
        assert!(!response.is_plan_created());
    }

    #[test]
    fn test_error_carries_code() {
        let err: ServiceError = MacaeError::not_found("plan", "p1").into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.to_string(), "NOT_FOUND: plan not found: p1");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
    }
}
