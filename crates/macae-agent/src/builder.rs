use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::domain::DomainAgent;
use crate::human::HumanAgent;
use async_trait::async_trait;
use macae_core::{AgentType, MacaeError, MacaeResult};
use std::sync::Arc;

/// Uniform asynchronous constructor for one agent variant.
#[async_trait]
pub trait AgentBuilder: Send + Sync {
    /// The type this builder produces.
    fn agent_type(&self) -> AgentType;

    /// Build the agent for one session.
    async fn create(&self, config: AgentConfig) -> MacaeResult<Arc<dyn Agent>>;
}

/// Builds a [`DomainAgent`] for one worker type.
pub struct DomainAgentBuilder {
    agent_type: AgentType,
}

impl DomainAgentBuilder {
    /// A builder for the given worker type.
    pub fn new(agent_type: AgentType) -> Self {
        Self { agent_type }
    }
}

#[async_trait]
impl AgentBuilder for DomainAgentBuilder {
    fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    async fn create(&self, config: AgentConfig) -> MacaeResult<Arc<dyn Agent>> {
        if config.agent_type != self.agent_type {
            return Err(MacaeError::Agent(format!(
                "builder for {} asked to build {}",
                self.agent_type, config.agent_type
            )));
        }
        Ok(Arc::new(DomainAgent::new(config)?))
    }
}

/// Builds the [`HumanAgent`].
pub struct HumanAgentBuilder;

#[async_trait]
impl AgentBuilder for HumanAgentBuilder {
    fn agent_type(&self) -> AgentType {
        AgentType::Human
    }

    async fn create(&self, config: AgentConfig) -> MacaeResult<Arc<dyn Agent>> {
        Ok(Arc::new(HumanAgent::new(config)))
    }
}

/// Builders for every worker type plus the human agent.
pub fn worker_builders() -> Vec<Arc<dyn AgentBuilder>> {
    let mut builders: Vec<Arc<dyn AgentBuilder>> = AgentType::DOMAIN
        .iter()
        .map(|t| Arc::new(DomainAgentBuilder::new(*t)) as Arc<dyn AgentBuilder>)
        .collect();
    builders.push(Arc::new(HumanAgentBuilder));
    builders
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use macae_memory::LocalMemoryContext;

    #[tokio::test]
    async fn test_worker_builders_cover_non_coordinators() {
        let types: Vec<AgentType> = worker_builders().iter().map(|b| b.agent_type()).collect();
        let expected: Vec<AgentType> = AgentType::ALL
            .into_iter()
            .filter(|t| !t.is_coordinator())
            .collect();
        assert_eq!(types, expected);
    }

    #[tokio::test]
    async fn test_mismatched_type_rejected() {
        let memory = Arc::new(LocalMemoryContext::new("s1", "u1"));
        let config = AgentConfig::new(AgentType::Hr, "s1", "u1", memory);
        let err = DomainAgentBuilder::new(AgentType::Marketing)
            .create(config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MacaeError::Agent(_)));
    }
}
