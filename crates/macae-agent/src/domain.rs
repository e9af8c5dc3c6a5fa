use crate::agent::Agent;
use crate::client::{CompletionRequest, ProjectClient};
use crate::config::AgentConfig;
use async_trait::async_trait;
use macae_core::{
    ActionRequest, ActionResponse, AgentMessage, AgentType, MacaeError, MacaeResult, StoredItem,
};
use macae_memory::MemoryContext;
use std::sync::Arc;
use tracing::{error, info};

/// Static routing and prompting data for one worker agent type.
#[derive(Debug, Clone, Copy)]
pub struct DomainProfile {
    /// Worker type the profile describes.
    pub agent_type: AgentType,
    /// Default system message for the worker.
    pub system_message: &'static str,
    /// Word prefixes that route a task clause to this agent.
    pub keywords: &'static [&'static str],
    /// How the planner phrases a whole-task step for this agent.
    pub step_template: &'static str,
}

const PROFILES: [DomainProfile; 6] = [
    DomainProfile {
        agent_type: AgentType::Hr,
        system_message: "You are an AI Agent specialized in HR. You help with onboarding, \
                         benefits, payroll and employee records.",
        keywords: &[
            "hr", "hire", "hiring", "onboard", "employee", "payroll", "benefit", "orientation",
            "recruit", "mentor", "training", "staff",
        ],
        step_template: "Coordinate the HR tasks for: {task}",
    },
    DomainProfile {
        agent_type: AgentType::Marketing,
        system_message: "You are an AI Agent specialized in marketing. You help with \
                         campaigns, press releases, social media and brand messaging.",
        keywords: &[
            "marketing", "campaign", "press", "social", "advertis", "brand", "launch", "promot",
            "newsletter", "audience",
        ],
        step_template: "Prepare the marketing campaign for: {task}",
    },
    DomainProfile {
        agent_type: AgentType::Procurement,
        system_message: "You are an AI Agent specialized in procurement. You help order \
                         equipment and supplies and manage vendors.",
        keywords: &[
            "order", "purchase", "procure", "supplier", "vendor", "buy", "swag", "inventory",
            "equipment", "supplies",
        ],
        step_template: "Source and order what is needed for: {task}",
    },
    DomainProfile {
        agent_type: AgentType::Product,
        system_message: "You are an AI Agent specialized in product management. You help \
                         with features, roadmaps, pricing and releases.",
        keywords: &[
            "product", "feature", "roadmap", "pricing", "release", "catalog", "plan", "mobile",
        ],
        step_template: "Define the product requirements for: {task}",
    },
    DomainProfile {
        agent_type: AgentType::TechSupport,
        system_message: "You are an AI Agent specialized in technical support. You help \
                         set up laptops, accounts, email, VPN and software.",
        keywords: &[
            "laptop", "email", "account", "password", "network", "vpn", "install", "software",
            "computer", "setup", "configure", "device", "wifi",
        ],
        step_template: "Provide the technical setup for: {task}",
    },
    DomainProfile {
        agent_type: AgentType::Generic,
        system_message: "You are an AI Agent that handles general tasks which do not belong \
                         to a specialist.",
        keywords: &[],
        step_template: "Complete the task: {task}",
    },
];

/// Routing profile for a worker type, `None` for Human and coordinators.
pub fn profile(agent_type: AgentType) -> Option<&'static DomainProfile> {
    PROFILES.iter().find(|p| p.agent_type == agent_type)
}

impl DomainProfile {
    /// Whether any word of `text` starts with one of this profile's keywords.
    pub fn matches(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .any(|word| self.keywords.iter().any(|k| word.starts_with(k)))
    }

    /// The step action for `task`, phrased for this domain.
    pub fn step_action(&self, task: &str) -> String {
        self.step_template.replace("{task}", task.trim())
    }
}

/// Worker agent owning steps in one business domain.
pub struct DomainAgent {
    profile: &'static DomainProfile,
    name: String,
    session_id: String,
    user_id: String,
    memory: Arc<dyn MemoryContext>,
    system_message: String,
    client: Option<Arc<dyn ProjectClient>>,
    temperature: f32,
}

impl DomainAgent {
    /// Build a worker; fails for types without a domain profile.
    pub fn new(config: AgentConfig) -> MacaeResult<Self> {
        let profile = profile(config.agent_type).ok_or_else(|| {
            MacaeError::Agent(format!("{} is not a domain agent", config.agent_type))
        })?;
        Ok(Self {
            profile,
            name: config.name,
            session_id: config.session_id,
            user_id: config.user_id,
            memory: config.memory,
            system_message: config
                .system_message
                .unwrap_or_else(|| profile.system_message.to_string()),
            client: config.client,
            temperature: config.temperature,
        })
    }

    /// The routing profile of this worker.
    pub fn profile(&self) -> &'static DomainProfile {
        self.profile
    }

    /// The system message in effect.
    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    async fn run_action(&self, action: &str) -> MacaeResult<String> {
        match &self.client {
            Some(client) => {
                client
                    .complete(CompletionRequest {
                        system: self.system_message.clone(),
                        prompt: format!("Carry out this step and report the result: {action}"),
                        temperature: self.temperature,
                    })
                    .await
            }
            None => Ok(format!("{} completed: {}", self.name, action)),
        }
    }
}

#[async_trait]
impl Agent for DomainAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn agent_type(&self) -> AgentType {
        self.profile.agent_type
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn handle_action_request(&self, request: &ActionRequest) -> MacaeResult<ActionResponse> {
        let response = match self.run_action(&request.action).await {
            Ok(reply) => {
                info!(
                    session_id = %self.session_id,
                    agent_type = %self.profile.agent_type,
                    step_id = %request.step_id,
                    "Step executed"
                );
                ActionResponse::completed(request, reply)
            }
            Err(e) => {
                error!(
                    session_id = %self.session_id,
                    agent_type = %self.profile.agent_type,
                    step_id = %request.step_id,
                    error = %e,
                    "Step execution failed"
                );
                ActionResponse::failed(request, e.to_string())
            }
        };

        let message = AgentMessage::new(
            &self.session_id,
            &self.user_id,
            self.profile.agent_type,
            &response.result,
        )
        .for_plan(&request.plan_id)
        .for_step(&request.step_id);
        self.memory.add_item(StoredItem::from(message)).await?;
        Ok(response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_domain_type_has_profile() {
        for t in AgentType::DOMAIN {
            assert!(profile(t).is_some(), "{t}");
        }
        assert!(profile(AgentType::Human).is_none());
        assert!(profile(AgentType::Planner).is_none());
    }

    #[test]
    fn test_keyword_matching_uses_word_prefixes() {
        let hr = profile(AgentType::Hr).unwrap();
        assert!(hr.matches("Onboarding Jessica Smith"));
        assert!(!hr.matches("shrink the budget"));

        let tech = profile(AgentType::TechSupport).unwrap();
        assert!(tech.matches("set up her EMAIL account"));

        let generic = profile(AgentType::Generic).unwrap();
        assert!(!generic.matches("anything"));
    }

    #[test]
    fn test_step_action_template() {
        let marketing = profile(AgentType::Marketing).unwrap();
        assert_eq!(
            marketing.step_action(" Plan a product launch "),
            "Prepare the marketing campaign for: Plan a product launch"
        );
    }
}
