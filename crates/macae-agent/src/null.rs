use crate::agent::Agent;
use macae_core::AgentType;

/// Placeholder substituted when an agent cannot be constructed.
///
/// Carries the requested type tag so routing and logs still make sense; all
/// handlers are the [`Agent`] no-op defaults.
#[derive(Debug, Clone)]
pub struct NullAgent {
    agent_type: AgentType,
    session_id: String,
    user_id: String,
}

impl NullAgent {
    /// A stub standing in for `agent_type` in one session.
    pub fn new(
        agent_type: AgentType,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            agent_type,
            session_id: session_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl Agent for NullAgent {
    fn name(&self) -> &str {
        self.agent_type.as_str()
    }

    fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn is_stub(&self) -> bool {
        true
    }
}
