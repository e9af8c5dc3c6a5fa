use crate::group_chat::GroupChatManagerBuilder;
use crate::planner::PlannerBuilder;
use crate::registry::OrchestrationRegistry;
use futures_util::future::join_all;
use macae_agent::{
    worker_builders, Agent, AgentBuilder, AgentConfig, AgentExtensions, AgentMap, NullAgent,
    ProjectClient, DEFAULT_TEMPERATURE,
};
use macae_core::{AgentType, MacaeError, MacaeResult};
use macae_memory::MemoryContext;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-session construction parameters shared by every agent type.
#[derive(Clone)]
pub struct AgentRequest {
    /// Session the agents serve.
    pub session_id: String,
    /// User owning the session.
    pub user_id: String,
    /// The session's Memory Context.
    pub memory: Arc<dyn MemoryContext>,
    /// Shared project client, if one is configured.
    pub client: Option<Arc<dyn ProjectClient>>,
    /// System message override applied to every agent.
    pub system_message: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Extra construction inputs.
    pub extensions: AgentExtensions,
}

impl AgentRequest {
    /// A request with default client, prompt and temperature.
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        memory: Arc<dyn MemoryContext>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            memory,
            client: None,
            system_message: None,
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

    /// Attach extra construction inputs.
    pub fn with_extensions(mut self, extensions: AgentExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    fn into_config(self, agent_type: AgentType) -> AgentConfig {
        let mut config = AgentConfig::new(agent_type, self.session_id, self.user_id, self.memory)
            .with_client(self.client)
            .with_temperature(self.temperature)
            .with_extensions(self.extensions);
        config.system_message = self.system_message;
        config
    }
}

/// Every agent of one session, keyed by type.
#[derive(Clone)]
pub struct AgentSet {
    agents: AgentMap,
}

impl AgentSet {
    /// Wrap a map of built agents.
    pub fn new(agents: AgentMap) -> Self {
        Self { agents }
    }

    /// The agent of a type, if built.
    pub fn get(&self, agent_type: AgentType) -> Option<&Arc<dyn Agent>> {
        self.agents.get(&agent_type)
    }

    /// Like [`get`](Self::get) but a missing agent is a not-found error.
    pub fn require(&self, agent_type: AgentType) -> MacaeResult<&Arc<dyn Agent>> {
        self.get(agent_type)
            .ok_or_else(|| MacaeError::not_found("agent", agent_type.as_str()))
    }

    /// The planner.
    pub fn planner(&self) -> MacaeResult<&Arc<dyn Agent>> {
        self.require(AgentType::Planner)
    }

    /// The group chat manager.
    pub fn group_chat_manager(&self) -> MacaeResult<&Arc<dyn Agent>> {
        self.require(AgentType::GroupChatManager)
    }

    /// The human agent.
    pub fn human(&self) -> MacaeResult<&Arc<dyn Agent>> {
        self.require(AgentType::Human)
    }

    /// Types that were substituted with a stub.
    pub fn stubs(&self) -> Vec<AgentType> {
        self.agents
            .iter()
            .filter(|(_, a)| a.is_stub())
            .map(|(t, _)| *t)
            .collect()
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent was built.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents in construction order.
    pub fn iter(&self) -> impl Iterator<Item = (&AgentType, &Arc<dyn Agent>)> {
        self.agents.iter()
    }

    /// The underlying map.
    pub fn into_map(self) -> AgentMap {
        self.agents
    }
}

/// Builds, caches and hands out the agents of each session.
pub struct AgentFactory {
    registry: Arc<OrchestrationRegistry>,
    builders: RwLock<HashMap<AgentType, Arc<dyn AgentBuilder>>>,
}

impl AgentFactory {
    /// A factory with a builder for every agent type.
    pub fn new(registry: Arc<OrchestrationRegistry>) -> Self {
        let factory = Self::empty(registry);
        for builder in worker_builders() {
            factory.register(builder);
        }
        factory.register(Arc::new(PlannerBuilder));
        factory.register(Arc::new(GroupChatManagerBuilder));
        factory
    }

    /// A factory with no builders; every type resolves to a stub.
    pub fn empty(registry: Arc<OrchestrationRegistry>) -> Self {
        Self {
            registry,
            builders: RwLock::new(HashMap::new()),
        }
    }

    /// Registry holding the session caches.
    pub fn registry(&self) -> &Arc<OrchestrationRegistry> {
        &self.registry
    }

    /// Map (or remap) the builder for its agent type.
    pub fn register(&self, builder: Arc<dyn AgentBuilder>) {
        self.builders.write().insert(builder.agent_type(), builder);
    }

    /// Remove the builder for a type; later requests for it get a stub.
    pub fn unregister(&self, agent_type: AgentType) -> Option<Arc<dyn AgentBuilder>> {
        self.builders.write().remove(&agent_type)
    }

    /// Strict builder lookup.
    pub fn get_agent_class(&self, agent_type: AgentType) -> MacaeResult<Arc<dyn AgentBuilder>> {
        self.builders
            .read()
            .get(&agent_type)
            .cloned()
            .ok_or_else(|| MacaeError::UnknownAgentType(agent_type.as_str().to_string()))
    }

    /// The cached agent for `(session, type)`, constructing it on a miss.
    ///
    /// Construction failures and unmapped types yield a [`NullAgent`]; this
    /// only errors on an invalid request.
    pub async fn create_agent(
        &self,
        agent_type: AgentType,
        request: AgentRequest,
    ) -> MacaeResult<Arc<dyn Agent>> {
        if request.user_id.trim().is_empty() {
            return Err(MacaeError::Validation("user_id is required".into()));
        }
        let session_id = request.session_id.clone();
        if let Some(agent) = self.registry.get(&session_id, agent_type) {
            debug!(session_id = %session_id, agent_type = %agent_type, "Agent cache hit");
            return Ok(agent);
        }

        let user_id = request.user_id.clone();
        let client = request.client.clone();
        let builder = self.builders.read().get(&agent_type).cloned();
        let agent: Arc<dyn Agent> = match builder {
            None => {
                warn!(
                    session_id = %session_id,
                    agent_type = %agent_type,
                    "No builder mapped, substituting stub"
                );
                Arc::new(NullAgent::new(agent_type, &session_id, &user_id))
            }
            Some(builder) => match builder.create(request.into_config(agent_type)).await {
                Ok(agent) => agent,
                Err(e) => {
                    error!(
                        session_id = %session_id,
                        agent_type = %agent_type,
                        error = %e,
                        "Agent construction failed, substituting stub"
                    );
                    Arc::new(NullAgent::new(agent_type, &session_id, &user_id))
                }
            },
        };

        if let Some(client) = client {
            self.registry.register_client(&session_id, agent_type, client);
        }
        Ok(self.registry.insert_if_absent(&session_id, agent_type, agent))
    }

    /// Build every agent of a session in three phases: workers, then the
    /// planner over the workers, then the group chat manager over both.
    pub async fn create_all_agents(
        &self,
        session_id: &str,
        user_id: &str,
        memory: Arc<dyn MemoryContext>,
        client: Option<Arc<dyn ProjectClient>>,
    ) -> MacaeResult<AgentSet> {
        if user_id.trim().is_empty() {
            return Err(MacaeError::Validation("user_id is required".into()));
        }
        let base = AgentRequest::new(session_id, user_id, memory).with_client(client);

        let worker_types: Vec<AgentType> = AgentType::ALL
            .into_iter()
            .filter(|t| !t.is_coordinator())
            .collect();
        let built = join_all(
            worker_types
                .iter()
                .map(|t| self.create_agent(*t, base.clone())),
        )
        .await;
        let mut workers = AgentMap::new();
        for (agent_type, agent) in worker_types.into_iter().zip(built) {
            workers.insert(agent_type, agent?);
        }

        let planner = self
            .create_agent(
                AgentType::Planner,
                base.clone()
                    .with_extensions(AgentExtensions::with_agents(workers.clone())),
            )
            .await?;

        let mut coordinated = workers;
        coordinated.insert(AgentType::Planner, planner);
        let manager = self
            .create_agent(
                AgentType::GroupChatManager,
                base.with_extensions(AgentExtensions::with_agents(coordinated.clone())),
            )
            .await?;
        coordinated.insert(AgentType::GroupChatManager, manager);

        let set = AgentSet::new(coordinated);
        info!(
            session_id,
            agents = set.len(),
            stubs = set.stubs().len(),
            "Session agents ready"
        );
        Ok(set)
    }

    /// Forget cached agents for one session, or for all sessions, closing
    /// the project clients they used.
    pub async fn clear_cache(&self, session_id: Option<&str>) {
        let clients = match session_id {
            Some(sid) => self.registry.remove_session(sid),
            None => self.registry.remove_all(),
        };
        for client in clients {
            if let Err(e) = client.close().await {
                warn!(error = %e, "Failed to close project client");
            }
        }
        info!(session_id = session_id.unwrap_or("*"), "Agent cache cleared");
    }
}
