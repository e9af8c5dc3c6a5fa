use crate::agent::{Agent, AgentMap};
use crate::client::ProjectClient;
use macae_core::AgentType;
use macae_memory::MemoryContext;
use std::sync::Arc;

/// Default sampling temperature for agent completions.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Extra construction inputs beyond the common parameters.
#[derive(Clone, Default)]
pub struct AgentExtensions {
    /// Agents already built for the session. Coordinators route through
    /// these; workers receive an empty map.
    pub agent_instances: AgentMap,
    /// Free-form extras for variant-specific settings.
    pub extras: serde_json::Map<String, serde_json::Value>,
}

impl AgentExtensions {
    /// Extensions carrying the already-built agents.
    pub fn with_agents(agent_instances: AgentMap) -> Self {
        Self {
            agent_instances,
            extras: serde_json::Map::new(),
        }
    }

    /// An already-built agent of the session.
    pub fn agent(&self, agent_type: AgentType) -> Option<&Arc<dyn Agent>> {
        self.agent_instances.get(&agent_type)
    }

    /// A string extra, if present.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(|v| v.as_str())
    }
}

/// Everything an [`AgentBuilder`](crate::AgentBuilder) needs to construct
/// one agent for a session.
#[derive(Clone)]
pub struct AgentConfig {
    /// Variant to build.
    pub agent_type: AgentType,
    /// Display name; defaults to the wire name.
    pub name: String,
    /// Session the agent serves.
    pub session_id: String,
    /// User owning the session.
    pub user_id: String,
    /// The session's Memory Context.
    pub memory: Arc<dyn MemoryContext>,
    /// System message override.
    pub system_message: Option<String>,
    /// Shared project client, if one is configured.
    pub client: Option<Arc<dyn ProjectClient>>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Extra construction inputs.
    pub extensions: AgentExtensions,
}

impl AgentConfig {
    /// Configuration with defaults for everything but the session wiring.
    pub fn new(
        agent_type: AgentType,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        memory: Arc<dyn MemoryContext>,
    ) -> Self {
        Self {
            agent_type,
            name: agent_type.as_str().to_string(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            memory,
            system_message: None,
            client: None,
            temperature: DEFAULT_TEMPERATURE,
            extensions: AgentExtensions::default(),
        }
    }

    /// Attach the session's project client.
    pub fn with_client(mut self, client: Option<Arc<dyn ProjectClient>>) -> Self {
        self.client = client;
        self
    }

    /// Override the system message.
    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Attach extra construction inputs.
    pub fn with_extensions(mut self, extensions: AgentExtensions) -> Self {
        self.extensions = extensions;
        self
    }
}
