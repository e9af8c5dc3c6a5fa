//! Session orchestration for MACAE.
//!
//! Builds and caches the agents of each session, turns an input task into a
//! persisted plan, and drives step approval until the plan completes.
//!
//! # Main types
//!
//! - [`AgentFactory`]: Builds agents in three phases and caches them per session.
//! - [`OrchestrationRegistry`]: Process-owned agent and project client caches.
//! - [`PlannerAgent`]: Decomposes a task into ordered steps.
//! - [`GroupChatManager`]: Coordinates planning, approval and execution.
//! - [`TaskService`]: Request boundary returning structured responses.

/// Agent construction and per-session caching.
pub mod factory;
/// Session coordinator.
pub mod group_chat;
/// Task decomposition.
pub mod planner;
/// Agent and client caches.
pub mod registry;
/// Request boundary.
pub mod service;

pub use factory::{AgentFactory, AgentRequest, AgentSet};
pub use group_chat::{GroupChatManager, GroupChatManagerBuilder};
pub use planner::{parse_plan_lines, split_clauses, PlannerAgent, PlannerBuilder, MIN_WORDS_FOR_PLAN};
pub use registry::OrchestrationRegistry;
pub use service::{ServiceError, ServiceResponse, ServiceResult, TaskService};
