use async_trait::async_trait;
use macae_agent::{
    profile, Agent, AgentBuilder, AgentConfig, AgentMap, CompletionRequest, ProjectClient,
};
use macae_core::{
    AgentMessage, AgentType, InputTask, MacaeError, MacaeResult, Plan, Step, StepStatus,
    TaskOutcome,
};
use macae_memory::{MemoryContext, MemoryContextExt};
use std::sync::Arc;
use tracing::{info, warn};

/// Descriptions shorter than this many words get a clarification request.
pub const MIN_WORDS_FOR_PLAN: usize = 3;

const PLANNER_SYSTEM_MESSAGE: &str = "You are the Planner. Break the user's task into short, \
    ordered steps. Write one step per line as `<Agent_Name>: <action>`, choosing agents from \
    the list you are given.";

const CONNECTORS: [&str; 3] = ["and", "then", "also"];

/// Decomposes an input task into a persisted plan of ordered steps.
pub struct PlannerAgent {
    name: String,
    session_id: String,
    user_id: String,
    memory: Arc<dyn MemoryContext>,
    client: Option<Arc<dyn ProjectClient>>,
    system_message: String,
    temperature: f32,
    agent_instances: AgentMap,
}

impl PlannerAgent {
    /// Build from a construction config; `agent_instances` must hold the workers.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            name: config.name,
            session_id: config.session_id,
            user_id: config.user_id,
            memory: config.memory,
            client: config.client,
            system_message: config
                .system_message
                .unwrap_or_else(|| PLANNER_SYSTEM_MESSAGE.to_string()),
            temperature: config.temperature,
            agent_instances: config.extensions.agent_instances,
        }
    }

    fn is_eligible(&self, agent_type: AgentType) -> bool {
        profile(agent_type).is_some() && self.agent_instances.contains_key(&agent_type)
    }

    /// Owner for one clause: the first eligible specialist whose keywords
    /// match, otherwise Generic.
    fn route(&self, clause: &str) -> AgentType {
        AgentType::DOMAIN
            .into_iter()
            .filter(|t| *t != AgentType::Generic && self.is_eligible(*t))
            .find(|t| profile(*t).is_some_and(|p| p.matches(clause)))
            .unwrap_or(AgentType::Generic)
    }

    /// Keyword-routed decomposition used when no client is available or
    /// the client's answer cannot be parsed.
    pub fn draft_steps(&self, description: &str) -> Vec<(AgentType, String)> {
        let clauses = split_clauses(description);
        if clauses.len() > 1 {
            return clauses
                .into_iter()
                .map(|clause| (self.route(&clause), capitalize(&clause)))
                .collect();
        }

        let owners: Vec<AgentType> = AgentType::DOMAIN
            .into_iter()
            .filter(|t| *t != AgentType::Generic && self.is_eligible(*t))
            .filter(|t| profile(*t).is_some_and(|p| p.matches(description)))
            .collect();
        if owners.is_empty() {
            let action = profile(AgentType::Generic)
                .map(|p| p.step_action(description))
                .unwrap_or_else(|| description.trim().to_string());
            return vec![(AgentType::Generic, action)];
        }
        owners
            .into_iter()
            .filter_map(|t| profile(t).map(|p| (t, p.step_action(description))))
            .collect()
    }

    async fn client_steps(&self, description: &str) -> Option<Vec<(AgentType, String)>> {
        let client = self.client.as_ref()?;
        let roster: Vec<&str> = self
            .agent_instances
            .keys()
            .filter(|t| self.is_eligible(**t))
            .map(|t| t.as_str())
            .collect();
        let request = CompletionRequest {
            system: self.system_message.clone(),
            prompt: format!(
                "Available agents: {}\nTask: {}",
                roster.join(", "),
                description
            ),
            temperature: self.temperature,
        };
        match client.complete(request).await {
            Ok(text) => {
                let steps = parse_plan_lines(&text, |t| self.is_eligible(t));
                if steps.is_empty() {
                    warn!(session_id = %self.session_id, "Planner reply had no usable steps");
                    None
                } else {
                    Some(steps)
                }
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Planner client failed, using keyword routing");
                None
            }
        }
    }
}

/// Parse `<Agent_Name>: <action>` lines, ignoring list markers and lines
/// naming an agent that is not eligible.
pub fn parse_plan_lines(
    text: &str,
    eligible: impl Fn(AgentType) -> bool,
) -> Vec<(AgentType, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line
                .trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*'))
                .trim();
            let (agent, action) = line.split_once(':')?;
            let agent_type: AgentType = agent.trim().trim_matches('*').parse().ok()?;
            let action = action.trim();
            (eligible(agent_type) && !action.is_empty()).then(|| (agent_type, action.to_string()))
        })
        .collect()
}

/// Split a description into clauses on punctuation and connector words.
pub fn split_clauses(text: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    for part in text.split([',', ';', '.', '\n']) {
        let mut current: Vec<&str> = Vec::new();
        for word in part.split_whitespace() {
            if CONNECTORS.contains(&word.to_lowercase().as_str()) {
                if !current.is_empty() {
                    clauses.push(current.join(" "));
                    current.clear();
                }
            } else {
                current.push(word);
            }
        }
        if !current.is_empty() {
            clauses.push(current.join(" "));
        }
    }
    clauses
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn agent_type(&self) -> AgentType {
        AgentType::Planner
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn handle_input_task(&self, task: &InputTask) -> MacaeResult<TaskOutcome> {
        let description = task.description.trim();
        if description.is_empty() {
            return Err(MacaeError::Validation("description must not be empty".into()));
        }
        let session_id = task
            .session_id
            .clone()
            .unwrap_or_else(|| self.session_id.clone());

        let drafted = match self.client_steps(description).await {
            Some(steps) => steps,
            None => self.draft_steps(description),
        };

        let mut plan = Plan::new(&session_id, &self.user_id, description, AgentType::Planner);
        let needs_clarification = description.split_whitespace().count() < MIN_WORDS_FOR_PLAN;
        if needs_clarification {
            plan.human_clarification_request = Some(format!(
                "Could you share more detail about \"{description}\" so the steps can be refined?"
            ));
        }

        let mut steps = Vec::with_capacity(drafted.len());
        for (seq, (agent, action)) in (1u32..).zip(drafted) {
            let mut step = Step::new(&plan, seq, agent, action);
            if needs_clarification {
                step.transition(StepStatus::AwaitingFeedback)?;
            }
            steps.push(step);
        }
        plan.refresh_from_steps(&steps)?;
        plan.summary = Some(format!(
            "{} step(s) planned for: {}",
            plan.total_steps, description
        ));

        let plan_id = plan.id.clone();
        let total_steps = plan.total_steps;
        self.memory.add(plan).await?;
        for step in steps {
            self.memory.add(step).await?;
        }
        let message = AgentMessage::new(
            &session_id,
            &self.user_id,
            AgentType::Planner,
            format!("Created a plan with {total_steps} step(s)"),
        )
        .for_plan(&plan_id);
        self.memory.add(message).await?;

        info!(
            session_id = %session_id,
            plan_id = %plan_id,
            total_steps,
            needs_clarification,
            "Plan created"
        );
        Ok(TaskOutcome::PlanCreated {
            session_id,
            plan_id,
        })
    }
}

/// Builds the [`PlannerAgent`] after the workers.
pub struct PlannerBuilder;

#[async_trait]
impl AgentBuilder for PlannerBuilder {
    fn agent_type(&self) -> AgentType {
        AgentType::Planner
    }

    async fn create(&self, config: AgentConfig) -> MacaeResult<Arc<dyn Agent>> {
        Ok(Arc::new(PlannerAgent::new(config)))
    }
}
