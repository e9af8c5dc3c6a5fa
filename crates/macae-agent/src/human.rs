use crate::agent::Agent;
use crate::config::AgentConfig;
use async_trait::async_trait;
use macae_core::{
    AgentMessage, AgentType, FeedbackTarget, HumanClarification, HumanFeedback, MacaeError,
    MacaeResult, Step, StoredItem,
};
use macae_memory::{MemoryContext, MemoryContextExt};
use std::sync::Arc;
use tracing::info;

/// Stands in for the person driving the session.
///
/// Records free-text feedback and rewritten actions on steps, and answers a
/// plan's clarification request. Approval decisions themselves go through the
/// group chat manager.
pub struct HumanAgent {
    name: String,
    session_id: String,
    user_id: String,
    memory: Arc<dyn MemoryContext>,
}

impl HumanAgent {
    /// Build from a construction config.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            name: config.name,
            session_id: config.session_id,
            user_id: config.user_id,
            memory: config.memory,
        }
    }

    async fn log(&self, plan_id: &str, step_id: Option<&str>, content: String) -> MacaeResult<()> {
        let mut message = AgentMessage::new(&self.session_id, &self.user_id, AgentType::Human, content)
            .for_plan(plan_id);
        if let Some(step_id) = step_id {
            message = message.for_step(step_id);
        }
        self.memory.add_item(StoredItem::from(message)).await
    }
}

/// Record a clarification on a plan and release the steps waiting for it.
///
/// Used by the human agent and, when that agent is a stub, directly by the
/// group chat manager.
pub async fn record_clarification(
    memory: &dyn MemoryContext,
    clarification: &HumanClarification,
) -> MacaeResult<usize> {
    clarification.validate()?;
    let mut plan = memory
        .get_plan(&clarification.plan_id)
        .await?
        .ok_or_else(|| MacaeError::not_found("plan", &clarification.plan_id))?;
    let mut steps = memory.get_steps_by_plan(&plan.id).await?;

    let released = plan.apply_clarification(&clarification.human_clarification, &mut steps)?;
    plan.refresh_from_steps(&steps)?;
    for step in steps {
        memory.upsert(step).await?;
    }
    memory.upsert(plan).await?;
    Ok(released)
}

#[async_trait]
impl Agent for HumanAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn agent_type(&self) -> AgentType {
        AgentType::Human
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn handle_human_feedback(&self, feedback: &HumanFeedback) -> MacaeResult<()> {
        feedback.validate()?;
        let text = feedback.human_feedback.as_deref();
        let updated = feedback.updated_action.as_deref();

        let targets: Vec<Step> = match feedback.target() {
            FeedbackTarget::Step(step_id) => {
                let step = self
                    .memory
                    .get_step(&step_id)
                    .await?
                    .filter(|s| s.plan_id == feedback.plan_id)
                    .ok_or_else(|| MacaeError::not_found("step", &step_id))?;
                vec![step]
            }
            FeedbackTarget::AllSteps => self
                .memory
                .get_steps_by_plan(&feedback.plan_id)
                .await?
                .into_iter()
                .filter(|s| !s.status.is_terminal())
                .collect(),
        };

        for mut step in targets {
            step.record_feedback(text, updated);
            let step_id = step.id.clone();
            self.memory.upsert(step).await?;
            self.log(
                &feedback.plan_id,
                Some(&step_id),
                format!(
                    "Received human feedback for step: {}",
                    text.unwrap_or("(no comment)")
                ),
            )
            .await?;
            info!(
                session_id = %self.session_id,
                plan_id = %feedback.plan_id,
                step_id = %step_id,
                "Human feedback recorded"
            );
        }
        Ok(())
    }

    async fn handle_human_clarification(
        &self,
        clarification: &HumanClarification,
    ) -> MacaeResult<()> {
        let released = record_clarification(self.memory.as_ref(), clarification).await?;
        self.log(
            &clarification.plan_id,
            None,
            format!(
                "Clarification received: {}",
                clarification.human_clarification
            ),
        )
        .await?;
        info!(
            session_id = %self.session_id,
            plan_id = %clarification.plan_id,
            released,
            "Clarification recorded"
        );
        Ok(())
    }
}
