use macae_agent::{Agent, AgentMap, ProjectClient};
use macae_core::AgentType;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-session caches of constructed agents and their project clients.
///
/// One registry is owned by the process (or by a test); nothing here is
/// global. Locks are only held for map operations, never across an await.
#[derive(Default)]
pub struct OrchestrationRegistry {
    agents: RwLock<HashMap<String, AgentMap>>,
    clients: RwLock<HashMap<String, HashMap<AgentType, Arc<dyn ProjectClient>>>>,
}

impl OrchestrationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached agent of a type for a session.
    pub fn get(&self, session_id: &str, agent_type: AgentType) -> Option<Arc<dyn Agent>> {
        self.agents
            .read()
            .get(session_id)
            .and_then(|agents| agents.get(&agent_type))
            .cloned()
    }

    /// Cache `agent` unless another instance got there first; either way
    /// return the cached instance.
    pub fn insert_if_absent(
        &self,
        session_id: &str,
        agent_type: AgentType,
        agent: Arc<dyn Agent>,
    ) -> Arc<dyn Agent> {
        let mut agents = self.agents.write();
        Arc::clone(
            agents
                .entry(session_id.to_string())
                .or_default()
                .entry(agent_type)
                .or_insert(agent),
        )
    }

    /// Snapshot of every cached agent for a session.
    pub fn session_agents(&self, session_id: &str) -> AgentMap {
        self.agents
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Remember the client an agent of the session was built with. The first
    /// client registered for a type wins.
    pub fn register_client(
        &self,
        session_id: &str,
        agent_type: AgentType,
        client: Arc<dyn ProjectClient>,
    ) {
        self.clients
            .write()
            .entry(session_id.to_string())
            .or_default()
            .entry(agent_type)
            .or_insert(client);
    }

    /// The client registered for one agent of a session.
    pub fn client(
        &self,
        session_id: &str,
        agent_type: AgentType,
    ) -> Option<Arc<dyn ProjectClient>> {
        self.clients
            .read()
            .get(session_id)
            .and_then(|clients| clients.get(&agent_type))
            .cloned()
    }

    /// Any client already registered for the session.
    pub fn session_client(&self, session_id: &str) -> Option<Arc<dyn ProjectClient>> {
        self.clients
            .read()
            .get(session_id)
            .and_then(|clients| clients.values().next())
            .cloned()
    }

    /// Number of sessions with cached agents.
    pub fn session_count(&self) -> usize {
        self.agents.read().len()
    }

    /// Whether the session has cached agents.
    pub fn contains_session(&self, session_id: &str) -> bool {
        self.agents.read().contains_key(session_id)
    }

    /// Drop one session's entries and return its distinct clients.
    pub fn remove_session(&self, session_id: &str) -> Vec<Arc<dyn ProjectClient>> {
        self.agents.write().remove(session_id);
        let removed = self.clients.write().remove(session_id);
        dedup_clients(removed.into_iter().flat_map(|m| m.into_values()))
    }

    /// Drop everything and return every distinct client.
    pub fn remove_all(&self) -> Vec<Arc<dyn ProjectClient>> {
        self.agents.write().clear();
        let removed: Vec<_> = self.clients.write().drain().collect();
        dedup_clients(removed.into_iter().flat_map(|(_, m)| m.into_values()))
    }
}

fn dedup_clients(
    clients: impl Iterator<Item = Arc<dyn ProjectClient>>,
) -> Vec<Arc<dyn ProjectClient>> {
    let mut unique: Vec<Arc<dyn ProjectClient>> = Vec::new();
    for client in clients {
        if !unique.iter().any(|c| Arc::ptr_eq(c, &client)) {
            unique.push(client);
        }
    }
    unique
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use macae_agent::{CompletionRequest, NullAgent};
    use macae_core::MacaeResult;

    struct EchoClient;

    #[async_trait::async_trait]
    impl ProjectClient for EchoClient {
        async fn complete(&self, request: CompletionRequest) -> MacaeResult<String> {
            Ok(request.prompt)
        }
    }

    #[test]
    fn test_first_insert_wins() {
        let registry = OrchestrationRegistry::new();
        let first: Arc<dyn Agent> = Arc::new(NullAgent::new(AgentType::Hr, "s1", "u1"));
        let second: Arc<dyn Agent> = Arc::new(NullAgent::new(AgentType::Hr, "s1", "u1"));

        let a = registry.insert_if_absent("s1", AgentType::Hr, Arc::clone(&first));
        let b = registry.insert_if_absent("s1", AgentType::Hr, second);
        assert!(Arc::ptr_eq(&a, &first));
        assert!(Arc::ptr_eq(&b, &first));
        assert!(Arc::ptr_eq(&registry.get("s1", AgentType::Hr).unwrap(), &first));
    }

    #[test]
    fn test_remove_session_is_isolated() {
        let registry = OrchestrationRegistry::new();
        for sid in ["s1", "s2"] {
            registry.insert_if_absent(sid, AgentType::Hr, Arc::new(NullAgent::new(AgentType::Hr, sid, "u1")));
        }
        let client: Arc<dyn ProjectClient> = Arc::new(EchoClient);
        registry.register_client("s1", AgentType::Hr, Arc::clone(&client));
        registry.register_client("s1", AgentType::Generic, Arc::clone(&client));

        let removed = registry.remove_session("s1");
        assert_eq!(removed.len(), 1);
        assert!(!registry.contains_session("s1"));
        assert!(registry.contains_session("s2"));
        assert!(registry.session_client("s1").is_none());
    }

    #[test]
    fn test_remove_all() {
        let registry = OrchestrationRegistry::new();
        registry.insert_if_absent("s1", AgentType::Hr, Arc::new(NullAgent::new(AgentType::Hr, "s1", "u1")));
        registry.register_client("s2", AgentType::Hr, Arc::new(EchoClient));
        assert_eq!(registry.remove_all().len(), 1);
        assert_eq!(registry.session_count(), 0);
    }
}
