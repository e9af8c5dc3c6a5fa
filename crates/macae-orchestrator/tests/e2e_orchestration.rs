#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end orchestration tests.
//!
//! Drives the factory and the task service against local and file-backed
//! memory: caching and construction phases, the plan/approval lifecycle,
//! store fallback, cache clearing and error surfacing.

use async_trait::async_trait;
use macae_agent::{Agent, AgentBuilder, AgentConfig, DomainAgentBuilder};
use macae_core::{
    AgentType, ErrorCode, HumanClarification, HumanFeedback, InputTask, MacaeError, MacaeResult,
    PlanStatus, SessionStatus, StepStatus,
};
use macae_memory::{MemoryConfig, MemoryContext, MemoryProvider};
use macae_orchestrator::*;
use macae_security::BlockedTermsCheck;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const USER: &str = "user-1";

// ---------------------------------------------------------------------------
// Test builders
// ---------------------------------------------------------------------------

/// Always fails to construct its agent type.
struct FailingBuilder(AgentType);

#[async_trait]
impl AgentBuilder for FailingBuilder {
    fn agent_type(&self) -> AgentType {
        self.0
    }

    async fn create(&self, _config: AgentConfig) -> MacaeResult<Arc<dyn Agent>> {
        Err(MacaeError::Agent(format!("{} is misconfigured", self.0)))
    }
}

/// Records construction order and the agents each construction was given.
struct RecordingBuilder {
    inner: Arc<dyn AgentBuilder>,
    log: Arc<Mutex<Vec<(AgentType, Vec<AgentType>)>>>,
}

#[async_trait]
impl AgentBuilder for RecordingBuilder {
    fn agent_type(&self) -> AgentType {
        self.inner.agent_type()
    }

    async fn create(&self, config: AgentConfig) -> MacaeResult<Arc<dyn Agent>> {
        let seen: Vec<AgentType> = config.extensions.agent_instances.keys().copied().collect();
        self.log.lock().unwrap().push((self.agent_type(), seen));
        self.inner.create(config).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn local_provider() -> Arc<MemoryProvider> {
    Arc::new(MemoryProvider::new(MemoryConfig::local()))
}

fn file_provider(dir: PathBuf) -> Arc<MemoryProvider> {
    Arc::new(MemoryProvider::new(MemoryConfig {
        data_dir: dir,
        ..MemoryConfig::default()
    }))
}

fn service_with(factory: AgentFactory, memory: Arc<MemoryProvider>) -> TaskService {
    TaskService::new(
        Arc::new(factory),
        memory,
        Arc::new(BlockedTermsCheck::default()),
    )
}

fn local_service() -> TaskService {
    service_with(
        AgentFactory::new(Arc::new(OrchestrationRegistry::new())),
        local_provider(),
    )
}

async fn memory_for(provider: &MemoryProvider, session: &str) -> Arc<dyn MemoryContext> {
    provider.context_for(session, USER).await.unwrap()
}

async fn submit(service: &TaskService, session: &str, description: &str) -> String {
    let response = service
        .submit_task(USER, InputTask::new(description).with_session(session))
        .await
        .unwrap();
    response.plan_id.expect("plan should be created")
}

// ---------------------------------------------------------------------------
// 1. Factory caching and construction phases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_agent_is_idempotent_per_session() {
    let provider = local_provider();
    let factory = AgentFactory::new(Arc::new(OrchestrationRegistry::new()));
    let request = AgentRequest::new("s1", USER, memory_for(&provider, "s1").await);

    let first = factory
        .create_agent(AgentType::Hr, request.clone())
        .await
        .unwrap();
    let second = factory.create_agent(AgentType::Hr, request).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = factory
        .create_agent(
            AgentType::Hr,
            AgentRequest::new("s2", USER, memory_for(&provider, "s2").await),
        )
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(other.session_id(), "s2");
}

#[tokio::test]
async fn create_agent_requires_user() {
    let provider = local_provider();
    let factory = AgentFactory::new(Arc::new(OrchestrationRegistry::new()));
    let err = factory
        .create_agent(
            AgentType::Hr,
            AgentRequest::new("s1", " ", memory_for(&provider, "s1").await),
        )
        .await
        .err()
        .unwrap();
    assert!(matches!(err, MacaeError::Validation(_)));

    let err = factory
        .create_all_agents("s1", "", memory_for(&provider, "s1").await, None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, MacaeError::Validation(_)));
}

#[tokio::test]
async fn coordinators_are_built_after_workers() {
    let provider = local_provider();
    let factory = AgentFactory::new(Arc::new(OrchestrationRegistry::new()));
    let log = Arc::new(Mutex::new(Vec::new()));
    for agent_type in [AgentType::Planner, AgentType::GroupChatManager] {
        let inner = factory.get_agent_class(agent_type).unwrap();
        factory.register(Arc::new(RecordingBuilder {
            inner,
            log: Arc::clone(&log),
        }));
    }

    let set = factory
        .create_all_agents("s1", USER, memory_for(&provider, "s1").await, None)
        .await
        .unwrap();
    assert_eq!(set.len(), AgentType::ALL.len());
    assert!(set.stubs().is_empty());

    let log = log.lock().unwrap().clone();
    assert_eq!(log.len(), 2);
    let (planner_type, planner_saw) = &log[0];
    assert_eq!(*planner_type, AgentType::Planner);
    assert_eq!(planner_saw.len(), 7);
    assert!(!planner_saw.contains(&AgentType::Planner));

    let (manager_type, manager_saw) = &log[1];
    assert_eq!(*manager_type, AgentType::GroupChatManager);
    assert_eq!(manager_saw.len(), 8);
    assert!(manager_saw.contains(&AgentType::Planner));

    // The planner handed to the manager is the cached one.
    let cached = factory.registry().get("s1", AgentType::Planner).unwrap();
    assert!(Arc::ptr_eq(set.planner().unwrap(), &cached));
}

#[tokio::test]
async fn failing_builder_is_isolated() {
    let provider = local_provider();
    let factory = AgentFactory::new(Arc::new(OrchestrationRegistry::new()));
    factory.register(Arc::new(FailingBuilder(AgentType::Hr)));

    let set = factory
        .create_all_agents("s1", USER, memory_for(&provider, "s1").await, None)
        .await
        .unwrap();
    assert_eq!(set.stubs(), vec![AgentType::Hr]);
    assert_eq!(set.len(), AgentType::ALL.len());
    assert!(!set.group_chat_manager().unwrap().is_stub());
}

#[tokio::test]
async fn unmapped_type_is_unknown_but_still_stubbed() {
    let provider = local_provider();
    let factory = AgentFactory::new(Arc::new(OrchestrationRegistry::new()));
    factory.unregister(AgentType::Marketing);

    assert!(matches!(
        factory.get_agent_class(AgentType::Marketing),
        Err(MacaeError::UnknownAgentType(_))
    ));
    let agent = factory
        .create_agent(
            AgentType::Marketing,
            AgentRequest::new("s1", USER, memory_for(&provider, "s1").await),
        )
        .await
        .unwrap();
    assert!(agent.is_stub());
}

#[tokio::test]
async fn same_session_race_returns_one_instance() {
    let provider = local_provider();
    let factory = Arc::new(AgentFactory::new(Arc::new(OrchestrationRegistry::new())));
    let memory = memory_for(&provider, "s1").await;

    let (a, b) = tokio::join!(
        factory.create_all_agents("s1", USER, Arc::clone(&memory), None),
        factory.create_all_agents("s1", USER, Arc::clone(&memory), None),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    for (agent_type, agent) in a.iter() {
        assert!(Arc::ptr_eq(agent, b.get(*agent_type).unwrap()));
    }
    assert_eq!(factory.registry().session_count(), 1);
}

#[tokio::test]
async fn clear_cache_is_isolated_per_session() {
    let provider = local_provider();
    let factory = AgentFactory::new(Arc::new(OrchestrationRegistry::new()));
    let s1 = factory
        .create_all_agents("s1", USER, memory_for(&provider, "s1").await, None)
        .await
        .unwrap();
    let s2 = factory
        .create_all_agents("s2", USER, memory_for(&provider, "s2").await, None)
        .await
        .unwrap();

    factory.clear_cache(Some("s1")).await;
    assert!(!factory.registry().contains_session("s1"));
    assert!(factory.registry().contains_session("s2"));

    let s1_again = factory
        .create_agent(
            AgentType::Hr,
            AgentRequest::new("s1", USER, memory_for(&provider, "s1").await),
        )
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(s1.get(AgentType::Hr).unwrap(), &s1_again));

    let s2_again = factory.registry().get("s2", AgentType::Hr).unwrap();
    assert!(Arc::ptr_eq(s2.get(AgentType::Hr).unwrap(), &s2_again));

    factory.clear_cache(None).await;
    assert_eq!(factory.registry().session_count(), 0);
}

// ---------------------------------------------------------------------------
// 2. Plan lifecycle through the service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn product_launch_bulk_approval_completes_plan() {
    let service = local_service();
    let plan_id = submit(&service, "s1", "Plan a product launch").await;

    let plans = service.get_plans(USER, Some("s1")).await.unwrap();
    assert_eq!(plans.len(), 1);
    let created = &plans[0];
    assert_eq!(created.plan.id, plan_id);
    assert_eq!(created.plan.session_id, "s1");
    assert_eq!(created.plan.overall_status, PlanStatus::Planned);
    assert!(created.plan.total_steps > 0);
    assert_eq!(created.steps.len(), created.plan.total_steps);

    let response = service
        .approve_step_or_steps(USER, HumanFeedback::for_all_steps("s1", &plan_id, true))
        .await
        .unwrap();
    assert_eq!(response.status, "All steps approved");

    let plans = service.get_plans(USER, Some("s1")).await.unwrap();
    let done = &plans[0];
    assert!(done
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed && s.agent_reply.is_some()));
    assert_eq!(done.plan.completed, done.plan.total_steps);
    assert_eq!(done.plan.overall_status, PlanStatus::Completed);

    let memory = memory_for(service.memory(), "s1").await;
    let session = memory.get_session("s1").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);

    let messages = service.get_agent_messages(USER, "s1").await.unwrap();
    assert!(messages.iter().any(|m| m.source == "Planner_Agent"));
    assert!(messages.iter().any(|m| m.source == "Group_Chat_Manager"));
}

#[tokio::test]
async fn single_step_decisions_update_the_aggregate() {
    let service = local_service();
    let plan_id = submit(
        &service,
        "s1",
        "Onboard Jessica, order her a laptop and set up her email",
    )
    .await;
    let steps = service.get_steps(USER, &plan_id).await.unwrap();
    assert_eq!(steps.len(), 3);

    let response = service
        .approve_step_or_steps(
            USER,
            HumanFeedback::for_step("s1", &plan_id, &steps[0].id, true),
        )
        .await
        .unwrap();
    assert_eq!(response.status, format!("Step {} - Approval:true.", steps[0].id));

    service
        .approve_step_or_steps(
            USER,
            HumanFeedback::for_step("s1", &plan_id, &steps[1].id, false)
                .with_feedback("Use the existing laptop"),
        )
        .await
        .unwrap();

    let plan = &service.get_plans(USER, Some("s1")).await.unwrap()[0];
    assert_eq!(plan.plan.completed, 1);
    assert_eq!(plan.plan.overall_status, PlanStatus::InProgress);
    assert_eq!(plan.steps[1].status, StepStatus::Rejected);
    assert_eq!(
        plan.steps[1].human_feedback.as_deref(),
        Some("Use the existing laptop")
    );

    // Terminal steps cannot be decided again.
    let err = service
        .approve_step_or_steps(
            USER,
            HumanFeedback::for_step("s1", &plan_id, &steps[1].id, true),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    // Bulk approval only touches what is still open.
    service
        .approve_step_or_steps(USER, HumanFeedback::for_all_steps("s1", &plan_id, true))
        .await
        .unwrap();
    let plan = &service.get_plans(USER, Some("s1")).await.unwrap()[0];
    assert_eq!(plan.plan.completed, 2);
    assert!(plan.plan.completed <= plan.plan.total_steps);
    assert_eq!(plan.plan.overall_status, PlanStatus::Completed);
}

#[tokio::test]
async fn stub_owner_is_rerouted_to_generic() {
    let factory = AgentFactory::new(Arc::new(OrchestrationRegistry::new()));
    factory.register(Arc::new(FailingBuilder(AgentType::Marketing)));
    let service = service_with(factory, local_provider());

    let plan_id = submit(&service, "s1", "Plan a product launch").await;
    service
        .approve_step_or_steps(USER, HumanFeedback::for_all_steps("s1", &plan_id, true))
        .await
        .unwrap();

    let steps = service.get_steps(USER, &plan_id).await.unwrap();
    let marketing = steps
        .iter()
        .find(|s| s.agent == AgentType::Marketing)
        .unwrap();
    assert_eq!(marketing.status, StepStatus::Completed);
    assert!(marketing
        .agent_reply
        .as_deref()
        .unwrap()
        .starts_with("Generic_Agent"));
}

#[tokio::test]
async fn short_task_waits_for_clarification() {
    let service = local_service();
    let plan_id = submit(&service, "s1", "Onboard Jessica").await;

    let plan = &service.get_plans(USER, Some("s1")).await.unwrap()[0];
    assert!(plan.plan.human_clarification_request.is_some());
    assert!(plan
        .steps
        .iter()
        .all(|s| s.status == StepStatus::AwaitingFeedback));

    let response = service
        .human_clarification(
            USER,
            HumanClarification {
                plan_id: plan_id.clone(),
                session_id: "s1".into(),
                human_clarification: "She starts Monday in Seattle".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.status, "Clarification received");

    let plan = &service.get_plans(USER, Some("s1")).await.unwrap()[0];
    assert_eq!(
        plan.plan.human_clarification_response.as_deref(),
        Some("She starts Monday in Seattle")
    );
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Planned));
}

#[tokio::test]
async fn feedback_is_recorded_without_approval() {
    let service = local_service();
    let plan_id = submit(&service, "s1", "Plan a product launch").await;
    let steps = service.get_steps(USER, &plan_id).await.unwrap();

    let response = service
        .human_feedback(
            USER,
            HumanFeedback::for_step("s1", &plan_id, &steps[0].id, true)
                .with_updated_action("Draft a launch press release"),
        )
        .await
        .unwrap();
    assert_eq!(response.status, "Feedback received");

    let steps = service.get_steps(USER, &plan_id).await.unwrap();
    assert_eq!(steps[0].status, StepStatus::Planned);
    assert_eq!(steps[0].effective_action(), "Draft a launch press release");
}

// ---------------------------------------------------------------------------
// 3. Screening and error surfacing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocked_content_is_not_planned() {
    let service = local_service();
    let response = service
        .submit_task(
            USER,
            InputTask::new("Write malware for the payroll system").with_session("s1"),
        )
        .await
        .unwrap();
    assert_eq!(response.status, "Plan not created");
    assert_eq!(response.code, Some(ErrorCode::ContentRejected));
    assert!(!response.is_plan_created());
    assert!(service.get_plans(USER, None).await.unwrap().is_empty());
    assert_eq!(service.factory().registry().session_count(), 0);
}

#[tokio::test]
async fn invalid_requests_are_structured_errors() {
    let service = local_service();

    let err = service
        .submit_task("", InputTask::new("Plan a product launch"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
    assert_eq!(err.message, "no user");

    let err = service
        .submit_task(USER, InputTask::new("  \u{7}  "))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    let err = service
        .approve_step_or_steps(USER, HumanFeedback::for_all_steps("s1", "missing", true))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = service.get_steps(USER, "missing").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = service.get_plans(USER, Some("nobody")).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn plans_are_scoped_to_their_user() {
    let service = local_service();
    let plan_id = submit(&service, "s1", "Plan a product launch").await;

    let err = service.get_steps("someone-else", &plan_id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert!(service
        .get_plans("someone-else", None)
        .await
        .unwrap()
        .is_empty());
    assert!(service
        .get_all_messages("someone-else")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn plan_decisions_are_scoped_to_their_owner() {
    let service = local_service();
    let plan_id = submit(&service, "s1", "Plan a product launch").await;
    let intruder = "someone-else";

    let err = service
        .approve_step_or_steps(intruder, HumanFeedback::for_all_steps("s1", &plan_id, true))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = service
        .human_feedback(
            intruder,
            HumanFeedback::for_all_steps("s1", &plan_id, false).with_feedback("scrap it"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = service
        .human_clarification(
            intruder,
            HumanClarification {
                plan_id: plan_id.clone(),
                session_id: "s1".into(),
                human_clarification: "Launch it next week".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let plan = &service.get_plans(USER, Some("s1")).await.unwrap()[0];
    assert_eq!(plan.plan.completed, 0);
    assert!(plan
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Planned && s.human_feedback.is_none()));
    assert!(plan.plan.human_clarification_response.is_none());
}

// ---------------------------------------------------------------------------
// 4. Storage backends
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fallback_store_is_transparent() {
    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, "occupied").unwrap();

    let provider = file_provider(blocker);
    let service = service_with(
        AgentFactory::new(Arc::new(OrchestrationRegistry::new())),
        Arc::clone(&provider),
    );
    let plan_id = submit(&service, "s1", "Plan a product launch").await;
    assert_eq!(memory_for(&provider, "s1").await.backend(), "local");

    service
        .approve_step_or_steps(USER, HumanFeedback::for_all_steps("s1", &plan_id, true))
        .await
        .unwrap();
    let plan = &service.get_plans(USER, Some("s1")).await.unwrap()[0];
    assert_eq!(plan.plan.overall_status, PlanStatus::Completed);
}

#[tokio::test]
async fn fallback_holds_when_durable_store_recovers() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    std::fs::write(&data_dir, "occupied").unwrap();

    let provider = file_provider(data_dir.clone());
    let service = service_with(
        AgentFactory::new(Arc::new(OrchestrationRegistry::new())),
        Arc::clone(&provider),
    );
    let plan_id = submit(&service, "s1", "Plan a product launch").await;

    std::fs::remove_file(&data_dir).unwrap();
    std::fs::create_dir(&data_dir).unwrap();

    let plans = service.get_plans(USER, Some("s1")).await.unwrap();
    assert_eq!(plans[0].plan.id, plan_id);
    assert_eq!(service.get_steps(USER, &plan_id).await.unwrap().len(), 2);
    assert_eq!(provider.backend_name(), Some("local"));
}

#[tokio::test]
async fn durable_store_survives_a_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let first = service_with(
        AgentFactory::new(Arc::new(OrchestrationRegistry::new())),
        file_provider(tmp.path().to_path_buf()),
    );
    let plan_id = submit(&first, "s1", "Plan a product launch").await;
    drop(first);

    let second = service_with(
        AgentFactory::new(Arc::new(OrchestrationRegistry::new())),
        file_provider(tmp.path().to_path_buf()),
    );
    let plans = second.get_plans(USER, None).await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].plan.id, plan_id);

    second
        .approve_step_or_steps(USER, HumanFeedback::for_all_steps("s1", &plan_id, true))
        .await
        .unwrap();
    let plan = &second.get_plans(USER, Some("s1")).await.unwrap()[0];
    assert_eq!(plan.plan.completed, plan.plan.total_steps);
}

#[tokio::test]
async fn delete_all_messages_resets_everything() {
    let service = local_service();
    submit(&service, "s1", "Plan a product launch").await;
    submit(&service, "s2", "Order new laptops for the design team").await;
    assert_eq!(service.get_plans(USER, None).await.unwrap().len(), 2);
    assert!(!service.get_all_messages(USER).await.unwrap().is_empty());

    service.delete_all_messages(USER).await.unwrap();
    assert!(service.get_plans(USER, None).await.unwrap().is_empty());
    assert!(service.get_all_messages(USER).await.unwrap().is_empty());
    assert_eq!(service.factory().registry().session_count(), 0);
}

#[tokio::test]
async fn domain_builder_can_be_swapped_per_type() {
    let provider = local_provider();
    let factory = AgentFactory::empty(Arc::new(OrchestrationRegistry::new()));
    factory.register(Arc::new(DomainAgentBuilder::new(AgentType::Generic)));

    let set = factory
        .create_all_agents("s1", USER, memory_for(&provider, "s1").await, None)
        .await
        .unwrap();
    assert_eq!(set.stubs().len(), AgentType::ALL.len() - 1);
    assert!(!set.get(AgentType::Generic).unwrap().is_stub());
}
