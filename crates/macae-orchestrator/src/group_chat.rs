use async_trait::async_trait;
use macae_agent::{record_clarification, Agent, AgentBuilder, AgentConfig, AgentMap};
use macae_core::{
    ActionRequest, ActionResponse, AgentMessage, AgentType, ChatMessage, FeedbackTarget,
    HumanClarification, HumanFeedback, InputTask, MacaeError, MacaeResult, PlanStatus, Session,
    SessionStatus, Step, StepStatus, TaskOutcome,
};
use macae_memory::{MemoryContext, MemoryContextExt};
use std::sync::Arc;
use tracing::{info, warn};

/// Coordinates a session: hands new tasks to the planner and drives step
/// approval, execution and the plan aggregate.
pub struct GroupChatManager {
    name: String,
    session_id: String,
    user_id: String,
    memory: Arc<dyn MemoryContext>,
    agent_instances: AgentMap,
}

impl GroupChatManager {
    /// Build from a construction config; `agent_instances` must hold the workers.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            name: config.name,
            session_id: config.session_id,
            user_id: config.user_id,
            memory: config.memory,
            agent_instances: config.extensions.agent_instances,
        }
    }

    fn live_agent(&self, agent_type: AgentType) -> Option<&Arc<dyn Agent>> {
        self.agent_instances
            .get(&agent_type)
            .filter(|agent| !agent.is_stub())
    }

    async fn ensure_session(&self, session_id: &str) -> MacaeResult<()> {
        if self.memory.get_session(session_id).await?.is_none() {
            self.memory
                .add(Session::new(session_id, &self.user_id))
                .await?;
            info!(session_id, "Session created");
        }
        Ok(())
    }

    /// Send an approved step to its owner, or to Generic when the owner is
    /// missing or a stub.
    async fn dispatch(&self, step: &Step) -> ActionResponse {
        let request = ActionRequest::from_step(step);
        let owner = self
            .live_agent(step.agent)
            .or_else(|| self.live_agent(AgentType::Generic));
        let Some(agent) = owner else {
            warn!(step_id = %step.id, agent_type = %step.agent, "No agent available for step");
            return ActionResponse::failed(&request, format!("no agent available for {}", step.agent));
        };
        if agent.agent_type() != step.agent {
            warn!(
                step_id = %step.id,
                agent_type = %step.agent,
                "Owner unavailable, rerouting step to Generic_Agent"
            );
        }
        match agent.handle_action_request(&request).await {
            Ok(response) => response,
            Err(e) => ActionResponse::failed(&request, e.to_string()),
        }
    }

    async fn log(&self, plan_id: &str, step_id: &str, content: String) -> MacaeResult<()> {
        let message = AgentMessage::new(
            &self.session_id,
            &self.user_id,
            AgentType::GroupChatManager,
            content,
        )
        .for_plan(plan_id)
        .for_step(step_id);
        self.memory.add(message).await
    }
}

#[async_trait]
impl Agent for GroupChatManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn agent_type(&self) -> AgentType {
        AgentType::GroupChatManager
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn handle_input_task(&self, task: &InputTask) -> MacaeResult<TaskOutcome> {
        let session_id = task
            .session_id
            .clone()
            .unwrap_or_else(|| self.session_id.clone());
        self.ensure_session(&session_id).await?;
        self.memory
            .add(ChatMessage::user(&session_id, &task.description))
            .await?;

        match self.live_agent(AgentType::Planner) {
            Some(planner) => planner.handle_input_task(task).await,
            None => {
                warn!(session_id = %session_id, "Planner unavailable");
                Ok(TaskOutcome::NotCreated {
                    reason: "planner unavailable".into(),
                })
            }
        }
    }

    async fn handle_human_feedback(&self, feedback: &HumanFeedback) -> MacaeResult<()> {
        feedback.validate()?;
        let mut plan = self
            .memory
            .get_plan(&feedback.plan_id)
            .await?
            .ok_or_else(|| MacaeError::not_found("plan", &feedback.plan_id))?;
        let mut steps = self.memory.get_steps_by_plan(&plan.id).await?;

        let targets: Vec<usize> = match feedback.target() {
            FeedbackTarget::Step(step_id) => {
                let idx = steps
                    .iter()
                    .position(|s| s.id == step_id)
                    .ok_or_else(|| MacaeError::not_found("step", &step_id))?;
                if steps[idx].status.is_terminal() {
                    return Err(MacaeError::InvalidTransition(format!(
                        "step {} is already {}",
                        step_id, steps[idx].status
                    )));
                }
                vec![idx]
            }
            FeedbackTarget::AllSteps => (0..steps.len())
                .filter(|i| !steps[*i].status.is_terminal())
                .collect(),
        };

        for idx in targets {
            let step = &mut steps[idx];
            step.apply_decision(
                feedback.approved,
                feedback.human_feedback.as_deref(),
                feedback.updated_action.as_deref(),
            )?;
            if feedback.approved {
                let response = self.dispatch(step).await;
                match response.status {
                    StepStatus::Completed => step.complete(response.result)?,
                    _ => step.fail(response.result)?,
                }
            }
            self.memory.upsert(step.clone()).await?;
            self.log(
                &plan.id,
                &step.id,
                format!("Step {} is now {}", step.sequence, step.status),
            )
            .await?;
            info!(
                session_id = %self.session_id,
                plan_id = %plan.id,
                step_id = %step.id,
                status = %step.status,
                "Step updated"
            );
        }

        plan.refresh_from_steps(&steps)?;
        let status = plan.overall_status;
        let summary = plan.summary.clone();
        self.memory.upsert(plan.clone()).await?;

        if status == PlanStatus::Completed {
            if let Some(mut session) = self.memory.get_session(&plan.session_id).await? {
                session.status = SessionStatus::Completed;
                session.message_to_user = summary;
                session.updated_at = chrono::Utc::now();
                self.memory.upsert(session).await?;
            }
        }
        info!(
            session_id = %self.session_id,
            plan_id = %plan.id,
            completed = plan.completed,
            total_steps = plan.total_steps,
            status = %status,
            "Plan aggregate refreshed"
        );
        Ok(())
    }

    async fn handle_human_clarification(
        &self,
        clarification: &HumanClarification,
    ) -> MacaeResult<()> {
        match self.live_agent(AgentType::Human) {
            Some(human) => human.handle_human_clarification(clarification).await,
            None => {
                warn!(session_id = %self.session_id, "Human agent unavailable, recording clarification directly");
                record_clarification(self.memory.as_ref(), clarification)
                    .await
                    .map(|_| ())
            }
        }
    }
}

/// Builds the [`GroupChatManager`] after every other agent.
pub struct GroupChatManagerBuilder;

#[async_trait]
impl AgentBuilder for GroupChatManagerBuilder {
    fn agent_type(&self) -> AgentType {
        AgentType::GroupChatManager
    }

    async fn create(&self, config: AgentConfig) -> MacaeResult<Arc<dyn Agent>> {
        Ok(Arc::new(GroupChatManager::new(config)))
    }
}
