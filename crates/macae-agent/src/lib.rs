//! Agent variants and their construction.
//!
//! Every agent exposes the same capability set ([`Agent`]) and is built
//! through the same asynchronous constructor ([`AgentBuilder::create`]) from
//! an [`AgentConfig`]. The coordinating agents (planner, group chat manager)
//! live in `macae-orchestrator`.

/// The agent capability trait.
pub mod agent;
/// Asynchronous agent constructors.
pub mod builder;
/// Project client and its configuration.
pub mod client;
/// Agent construction parameters.
pub mod config;
/// Domain worker agents.
pub mod domain;
/// The human agent.
pub mod human;
/// Placeholder agents.
pub mod null;

pub use agent::{Agent, AgentMap};
pub use builder::{worker_builders, AgentBuilder, DomainAgentBuilder, HumanAgentBuilder};
pub use client::{ChatCompletionsClient, ClientConfig, CompletionRequest, ProjectClient};
pub use config::{AgentConfig, AgentExtensions, DEFAULT_TEMPERATURE};
pub use domain::{profile, DomainAgent, DomainProfile};
pub use human::{record_clarification, HumanAgent};
pub use null::NullAgent;
